//! Async TCP session layer for the request handler.
//!
//! The server owns the framing only: it reads one MBAP header plus body per
//! request, hands the full ADU to [`handler::handle`], and writes whatever
//! bytes come back. An empty reply means no answer is sent and the connection
//! keeps going.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, warn};

use mbtcp_core::encoding::Reader;
use mbtcp_core::frame::{MbapHeader, HEADER_LEN, MAX_PDU_LEN};

use crate::handler;
use crate::table::DataTable;
use crate::DataLinkError;

pub struct ModbusTcpServer {
    listener: TcpListener,
    table: Arc<DataTable>,
}

impl ModbusTcpServer {
    pub async fn bind<A: ToSocketAddrs>(
        addr: A,
        table: Arc<DataTable>,
    ) -> Result<Self, DataLinkError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self::from_listener(listener, table))
    }

    pub fn from_listener(listener: TcpListener, table: Arc<DataTable>) -> Self {
        Self { listener, table }
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr, DataLinkError> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self) -> Result<(), DataLinkError> {
        loop {
            let (socket, peer) = self.listener.accept().await?;
            let table = Arc::clone(&self.table);

            tokio::spawn(async move {
                if let Err(err) = handle_connection(socket, table).await {
                    warn!(%peer, error = %err, "modbus tcp connection ended with error");
                }
            });
        }
    }
}

async fn handle_connection(
    mut socket: TcpStream,
    table: Arc<DataTable>,
) -> Result<(), DataLinkError> {
    loop {
        let mut frame = vec![0u8; HEADER_LEN];
        if let Err(err) = socket.read_exact(&mut frame).await {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                return Ok(());
            }
            return Err(DataLinkError::Io(err));
        }

        let header = MbapHeader::decode(&mut Reader::new(&frame))?;
        let pdu_len = usize::from(header.length) - 1;
        if pdu_len == 0 || pdu_len > MAX_PDU_LEN {
            return Err(DataLinkError::InvalidFrame("request pdu length"));
        }

        frame.resize(HEADER_LEN + pdu_len, 0);
        socket.read_exact(&mut frame[HEADER_LEN..]).await?;

        let reply = handler::handle(&table, &frame);
        if reply.is_empty() {
            debug!(
                transaction_id = header.transaction_id,
                "request dropped, no reply this round"
            );
            continue;
        }

        debug!(
            transaction_id = header.transaction_id,
            unit_id = header.unit_id,
            reply_len = reply.len(),
            "sending reply"
        );
        socket.write_all(&reply).await?;
    }
}
