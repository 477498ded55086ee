use core::fmt;

/// Internal protocol errors.
///
/// These never appear on the wire. On the server they mean a frame could not
/// be answered at all (the handler logs and drops it); on the client they mean
/// a reply did not match the request that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Malformed bytes, a failed field cross-check, or a value outside its
    /// domain.
    BadData,
    /// Fewer bytes than the layout requires, or a buffer/length mismatch.
    BadDataSize,
    /// An exception byte outside the known taxonomy.
    BadException,
    /// An exception was expected but the reply carries none.
    NoException,
    /// A data-table address or index outside the block bounds.
    OutOfRange,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadData => f.write_str("bad data"),
            Self::BadDataSize => f.write_str("bad data size"),
            Self::BadException => f.write_str("bad exception"),
            Self::NoException => f.write_str("no exception"),
            Self::OutOfRange => f.write_str("out of range"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ProtocolError {}
