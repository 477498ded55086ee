//! Application Data Units: an MBAP header paired with a PDU, and the
//! client-side reply classifier.

use core::fmt;

use alloc::vec::Vec;

use crate::encoding::Reader;
use crate::exception::Exception;
use crate::frame::{MbapHeader, HEADER_LEN, MAX_ADU_LEN};
use crate::pdu::{FunctionCode, Request, Response};
use crate::ProtocolError;

/// A request with its framing header.
///
/// `header.length` is whatever the constructor or decoder left there; encoding
/// always recomputes it from the serialized PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestAdu {
    pub header: MbapHeader,
    pub pdu: Request,
}

impl RequestAdu {
    pub fn new(transaction_id: u16, unit_id: u8, pdu: Request) -> Self {
        Self {
            header: MbapHeader::new(transaction_id, unit_id),
            pdu,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        encode_adu(&self.header, |buf| self.pdu.encode_pdu(buf))
    }

    /// Decode a full request frame. Used by the server handler's happy path
    /// and by round-trip tests; the handler itself decodes stepwise so it can
    /// keep the header when the PDU is malformed.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = Reader::new(bytes);
        let header = MbapHeader::decode(&mut r)?;
        if usize::from(header.length) != bytes.len() - (HEADER_LEN - 1) {
            return Err(ProtocolError::BadDataSize);
        }
        let function =
            FunctionCode::from_u8(r.read_u8()?).ok_or(ProtocolError::BadData)?;
        let pdu = Request::decode_pdu(function, &mut r)?;
        if !r.is_empty() {
            return Err(ProtocolError::BadData);
        }
        Ok(Self { header, pdu })
    }
}

/// A successful response with its framing header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseAdu {
    pub header: MbapHeader,
    pub pdu: Response,
}

impl ResponseAdu {
    pub fn new(header: MbapHeader, pdu: Response) -> Self {
        Self { header, pdu }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        encode_adu(&self.header, |buf| self.pdu.encode_pdu(buf))
    }
}

fn encode_adu(
    header: &MbapHeader,
    encode_pdu: impl FnOnce(&mut Vec<u8>) -> Result<(), ProtocolError>,
) -> Result<Vec<u8>, ProtocolError> {
    let mut pdu = Vec::new();
    encode_pdu(&mut pdu)?;

    let mut frame = Vec::with_capacity(HEADER_LEN + pdu.len());
    let header = MbapHeader {
        // The PDU buffer already carries the function byte.
        length: MbapHeader::length_for(pdu.len() - 1),
        ..*header
    };
    header.encode(&mut frame);
    frame.extend_from_slice(&pdu);

    if frame.len() != HEADER_LEN + pdu.len() || frame.len() > MAX_ADU_LEN {
        return Err(ProtocolError::BadDataSize);
    }
    Ok(frame)
}

/// Classification of an inbound reply against its request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Function byte matches; decode the success tail.
    Passed,
    /// Function byte carries the exception bit; decode the exception code.
    Error,
    /// Framing or pairing mismatch; the reply is not for this request.
    Bad,
}

/// Stage check: framing, pairing and function-byte classification.
pub fn classify(request: &RequestAdu, bytes: &[u8]) -> Stage {
    if bytes.len() <= HEADER_LEN {
        return Stage::Bad;
    }
    let mut r = Reader::new(bytes);
    let header = match MbapHeader::decode(&mut r) {
        Ok(header) => header,
        Err(_) => return Stage::Bad,
    };
    if header.transaction_id != request.header.transaction_id
        || header.unit_id != request.header.unit_id
        || usize::from(header.length) != bytes.len() - (HEADER_LEN - 1)
    {
        return Stage::Bad;
    }

    let expected = request.pdu.function().as_u8();
    match bytes[HEADER_LEN] {
        f if f == expected => Stage::Passed,
        f if f == expected | 0x80 => Stage::Error,
        _ => Stage::Bad,
    }
}

/// What went wrong while decoding a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseError {
    /// The reply is malformed or does not pair with the request.
    Protocol(ProtocolError),
    /// The server answered with an error ADU.
    Exception(Exception),
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(err) => write!(f, "protocol error: {err}"),
            Self::Exception(exc) => write!(f, "{exc}"),
        }
    }
}

impl From<ProtocolError> for ResponseError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ResponseError {}

/// Decode a reply frame against the request that produced it.
///
/// Three stages: classify, then either decode the success tail with
/// field-for-field cross-checks, or decode the exception byte and surface it
/// as an error. A `Bad` stage is `BadData`.
pub fn decode_response(request: &RequestAdu, bytes: &[u8]) -> Result<ResponseAdu, ResponseError> {
    match classify(request, bytes) {
        Stage::Bad => Err(ProtocolError::BadData.into()),
        Stage::Error => {
            let mut r = Reader::new(bytes);
            let header = MbapHeader::decode(&mut r)?;
            let function_byte = r.read_u8()?;
            let exception = Exception::decode_tail(function_byte, header, &mut r)?;
            if !r.is_empty() {
                return Err(ProtocolError::BadData.into());
            }
            Err(ResponseError::Exception(exception))
        }
        Stage::Passed => {
            if bytes.len() != request.pdu.expected_response_len() {
                return Err(ProtocolError::BadData.into());
            }
            let mut r = Reader::new(bytes);
            let header = MbapHeader::decode(&mut r)?;
            let _function_byte = r.read_u8()?;
            let pdu = Response::decode_pdu(&request.pdu, &mut r)?;
            if !r.is_empty() {
                return Err(ProtocolError::BadData.into());
            }
            Ok(ResponseAdu { header, pdu })
        }
    }
}
