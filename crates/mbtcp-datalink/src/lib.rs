//! Modbus TCP transports: the server session layer, the client transport,
//! and the shared data table they dispatch against.

#![forbid(unsafe_code)]

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tracing::trace;

use mbtcp_core::encoding::Reader;
use mbtcp_core::frame::{MbapHeader, HEADER_LEN, MAX_PDU_LEN};
use mbtcp_core::ProtocolError;

pub mod handler;
pub mod server;
pub mod table;

pub use server::ModbusTcpServer;
pub use table::{Block, BlockConfig, DataTable, TableConfig};

#[derive(Debug, Error)]
pub enum DataLinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("invalid frame: {0}")]
    InvalidFrame(&'static str),
}

/// One request/reply exchange over some byte transport.
///
/// Takes and returns full ADUs; pairing and payload checks belong to the
/// caller, which knows the originating request.
#[async_trait]
pub trait DataLink: Send + Sync {
    async fn exchange(&self, request_adu: &[u8]) -> Result<Vec<u8>, DataLinkError>;
}

/// Client-side TCP transport. One request is in flight at a time; the stream
/// lock serializes concurrent callers.
#[derive(Debug)]
pub struct TcpTransport {
    stream: Mutex<TcpStream>,
}

impl TcpTransport {
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, DataLinkError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::from_stream(stream))
    }

    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            stream: Mutex::new(stream),
        }
    }
}

async fn read_exact_or_closed(
    stream: &mut TcpStream,
    buf: &mut [u8],
) -> Result<(), DataLinkError> {
    if let Err(err) = stream.read_exact(buf).await {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            return Err(DataLinkError::ConnectionClosed);
        }
        return Err(DataLinkError::Io(err));
    }
    Ok(())
}

#[async_trait]
impl DataLink for TcpTransport {
    async fn exchange(&self, request_adu: &[u8]) -> Result<Vec<u8>, DataLinkError> {
        if request_adu.len() <= HEADER_LEN {
            return Err(DataLinkError::InvalidFrame("request adu too short"));
        }

        let mut stream = self.stream.lock().await;
        trace!(adu_len = request_adu.len(), "sending modbus tcp request");
        stream.write_all(request_adu).await?;

        let mut reply = vec![0u8; HEADER_LEN];
        read_exact_or_closed(&mut stream, &mut reply).await?;
        let header = MbapHeader::decode(&mut Reader::new(&reply))?;

        let pdu_len = usize::from(header.length) - 1;
        if pdu_len == 0 {
            return Err(DataLinkError::InvalidFrame("empty response pdu"));
        }

        reply.resize(HEADER_LEN + pdu_len, 0);
        read_exact_or_closed(&mut stream, &mut reply[HEADER_LEN..]).await?;

        // Drained either way so the stream stays framed; reject afterwards.
        if pdu_len > MAX_PDU_LEN {
            return Err(DataLinkError::InvalidFrame("response pdu too large"));
        }

        trace!(
            transaction_id = header.transaction_id,
            adu_len = reply.len(),
            "received modbus tcp response"
        );
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const REQ: &[u8] = &[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x6B, 0x00, 0x01];

    #[tokio::test]
    async fn exchange_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 12];
            socket.read_exact(&mut request).await.unwrap();
            assert_eq!(&request, REQ);
            socket
                .write_all(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0x02, 0x2B])
                .await
                .unwrap();
        });

        let transport = TcpTransport::connect(addr).await.unwrap();
        let reply = transport.exchange(REQ).await.unwrap();
        assert_eq!(
            reply,
            &[0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0x02, 0x2B]
        );

        peer.await.unwrap();
    }

    #[tokio::test]
    async fn exchange_rejects_oversized_reply_and_recovers() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            let mut request = [0u8; 12];
            socket.read_exact(&mut request).await.unwrap();
            // Declares a 254-byte PDU, one past the maximum.
            let mut oversized = vec![0u8; HEADER_LEN + 254];
            oversized[..7].copy_from_slice(&[0x00, 0x01, 0x00, 0x00, 0x00, 0xFF, 0x01]);
            oversized[7] = 0x03;
            socket.write_all(&oversized).await.unwrap();

            let mut request = [0u8; 12];
            socket.read_exact(&mut request).await.unwrap();
            socket
                .write_all(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0x00, 0x2A])
                .await
                .unwrap();
        });

        let transport = TcpTransport::connect(addr).await.unwrap();
        let err = transport.exchange(REQ).await.unwrap_err();
        assert!(matches!(
            err,
            DataLinkError::InvalidFrame("response pdu too large")
        ));

        let reply = transport.exchange(REQ).await.unwrap();
        assert_eq!(&reply[9..], &[0x00, 0x2A]);

        peer.await.unwrap();
    }

    #[tokio::test]
    async fn exchange_reports_closed_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let transport = TcpTransport::connect(addr).await.unwrap();
        let err = transport.exchange(REQ).await.unwrap_err();
        assert!(matches!(
            err,
            DataLinkError::ConnectionClosed | DataLinkError::Io(_)
        ));

        peer.await.unwrap();
    }
}
