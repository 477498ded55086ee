//! High-level Modbus TCP client.
//!
//! One method per function code, over any [`DataLink`]. Every reply is run
//! through the core classifier against the request that produced it, so a
//! mispaired, malformed or truncated frame never reaches the caller as data.

#![forbid(unsafe_code)]

pub mod sync;

pub use sync::{SyncClientError, SyncModbusTcpClient};

use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use mbtcp_core::adu::{decode_response, RequestAdu, ResponseError};
use mbtcp_core::exception::Exception;
use mbtcp_core::pdu::request::{
    MaskWriteRegisterRequest, ReadCoilsRequest, ReadDiscreteInputsRequest,
    ReadHoldingRegistersRequest, ReadInputRegistersRequest, ReadWriteMultipleRegistersRequest,
    WriteMultipleCoilsRequest, WriteMultipleRegistersRequest, WriteSingleCoilRequest,
    WriteSingleRegisterRequest,
};
use mbtcp_core::pdu::{Request, Response};
use mbtcp_core::types::{Address, CoilState, Mask, ReadBitCount, ReadRegCount, RegValue};
use mbtcp_core::ProtocolError;
use mbtcp_datalink::{DataLink, DataLinkError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    Never,
    ReadOnly,
    All,
}

#[derive(Debug, Clone, Copy)]
pub struct ClientConfig {
    pub response_timeout: Duration,
    pub retry_count: u8,
    pub throttle_delay: Option<Duration>,
    pub retry_policy: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(5),
            retry_count: 3,
            throttle_delay: None,
            retry_policy: RetryPolicy::ReadOnly,
        }
    }
}

impl ClientConfig {
    pub fn with_response_timeout(mut self, response_timeout: Duration) -> Self {
        self.response_timeout = response_timeout;
        self
    }

    pub fn with_retry_count(mut self, retry_count: u8) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_throttle_delay(mut self, throttle_delay: Option<Duration>) -> Self {
        self.throttle_delay = throttle_delay;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("datalink error: {0}")]
    DataLink(#[from] DataLinkError),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("{0}")]
    Exception(Exception),
    #[error("request timed out")]
    Timeout,
}

impl From<ResponseError> for ClientError {
    fn from(err: ResponseError) -> Self {
        match err {
            ResponseError::Protocol(err) => Self::Protocol(err),
            ResponseError::Exception(exc) => Self::Exception(exc),
        }
    }
}

pub struct ModbusClient<D: DataLink> {
    datalink: D,
    config: ClientConfig,
    next_transaction: AtomicU16,
    last_request_at: Mutex<Option<Instant>>,
}

impl<D: DataLink> ModbusClient<D> {
    pub fn new(datalink: D) -> Self {
        Self::with_config(datalink, ClientConfig::default())
    }

    pub fn with_config(datalink: D, config: ClientConfig) -> Self {
        Self {
            datalink,
            config,
            next_transaction: AtomicU16::new(1),
            last_request_at: Mutex::new(None),
        }
    }

    pub fn config(&self) -> ClientConfig {
        self.config
    }

    fn next_tid(&self) -> u16 {
        self.next_transaction.fetch_add(1, Ordering::Relaxed)
    }

    async fn apply_throttle(&self) {
        let Some(delay) = self.config.throttle_delay else {
            return;
        };

        let mut last = self.last_request_at.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < delay {
                sleep(delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    fn is_retryable(err: &DataLinkError) -> bool {
        matches!(
            err,
            DataLinkError::Io(_) | DataLinkError::ConnectionClosed
        )
    }

    fn retry_eligible(&self, request: &Request) -> bool {
        match self.config.retry_policy {
            RetryPolicy::Never => false,
            RetryPolicy::All => true,
            RetryPolicy::ReadOnly => matches!(
                request,
                Request::ReadCoils(_)
                    | Request::ReadDiscreteInputs(_)
                    | Request::ReadHoldingRegisters(_)
                    | Request::ReadInputRegisters(_)
            ),
        }
    }

    async fn send_request(&self, unit_id: u8, pdu: Request) -> Result<Response, ClientError> {
        self.apply_throttle().await;

        let retry_eligible = self.retry_eligible(&pdu);
        let request = RequestAdu::new(self.next_tid(), unit_id, pdu);
        let request_bytes = request.encode()?;

        debug!(
            transaction_id = request.header.transaction_id,
            unit_id,
            function = request.pdu.function().name(),
            adu_len = request_bytes.len(),
            "dispatching modbus request"
        );

        let attempts = usize::from(self.config.retry_count) + 1;
        for attempt in 1..=attempts {
            let result = timeout(
                self.config.response_timeout,
                self.datalink.exchange(&request_bytes),
            )
            .await;

            match result {
                Ok(Ok(reply)) => {
                    let adu = decode_response(&request, &reply)?;
                    return Ok(adu.pdu);
                }
                Ok(Err(err)) => {
                    if attempt < attempts && retry_eligible && Self::is_retryable(&err) {
                        warn!(
                            transaction_id = request.header.transaction_id,
                            attempt,
                            error = %err,
                            "retrying modbus request after transport error"
                        );
                        continue;
                    }
                    return Err(ClientError::DataLink(err));
                }
                Err(_) => {
                    if attempt < attempts && retry_eligible {
                        warn!(
                            transaction_id = request.header.transaction_id,
                            attempt,
                            "retrying modbus request after timeout"
                        );
                        continue;
                    }
                    return Err(ClientError::Timeout);
                }
            }
        }
        unreachable!("retry loop always returns")
    }

    pub async fn read_coils(
        &self,
        unit_id: u8,
        start: u16,
        count: u16,
    ) -> Result<Vec<bool>, ClientError> {
        let request = Request::ReadCoils(ReadCoilsRequest {
            start: Address::new(start),
            count: ReadBitCount::new(count),
        });
        match self.send_request(unit_id, request).await? {
            Response::ReadCoils(resp) => Ok(resp.bits),
            _ => Err(ProtocolError::BadData.into()),
        }
    }

    pub async fn read_discrete_inputs(
        &self,
        unit_id: u8,
        start: u16,
        count: u16,
    ) -> Result<Vec<bool>, ClientError> {
        let request = Request::ReadDiscreteInputs(ReadDiscreteInputsRequest {
            start: Address::new(start),
            count: ReadBitCount::new(count),
        });
        match self.send_request(unit_id, request).await? {
            Response::ReadDiscreteInputs(resp) => Ok(resp.bits),
            _ => Err(ProtocolError::BadData.into()),
        }
    }

    pub async fn read_holding_registers(
        &self,
        unit_id: u8,
        start: u16,
        count: u16,
    ) -> Result<Vec<u16>, ClientError> {
        let request = Request::ReadHoldingRegisters(ReadHoldingRegistersRequest {
            start: Address::new(start),
            count: ReadRegCount::new(count),
        });
        match self.send_request(unit_id, request).await? {
            Response::ReadHoldingRegisters(resp) => Ok(resp.values),
            _ => Err(ProtocolError::BadData.into()),
        }
    }

    pub async fn read_input_registers(
        &self,
        unit_id: u8,
        start: u16,
        count: u16,
    ) -> Result<Vec<u16>, ClientError> {
        let request = Request::ReadInputRegisters(ReadInputRegistersRequest {
            start: Address::new(start),
            count: ReadRegCount::new(count),
        });
        match self.send_request(unit_id, request).await? {
            Response::ReadInputRegisters(resp) => Ok(resp.values),
            _ => Err(ProtocolError::BadData.into()),
        }
    }

    pub async fn write_single_coil(
        &self,
        unit_id: u8,
        address: u16,
        value: bool,
    ) -> Result<(), ClientError> {
        let request = Request::WriteSingleCoil(WriteSingleCoilRequest {
            address: Address::new(address),
            value: CoilState::from(value),
        });
        match self.send_request(unit_id, request).await? {
            Response::WriteSingleCoil(_) => Ok(()),
            _ => Err(ProtocolError::BadData.into()),
        }
    }

    pub async fn write_single_register(
        &self,
        unit_id: u8,
        address: u16,
        value: u16,
    ) -> Result<(), ClientError> {
        let request = Request::WriteSingleRegister(WriteSingleRegisterRequest {
            address: Address::new(address),
            value: RegValue::new(value),
        });
        match self.send_request(unit_id, request).await? {
            Response::WriteSingleRegister(_) => Ok(()),
            _ => Err(ProtocolError::BadData.into()),
        }
    }

    pub async fn write_multiple_coils(
        &self,
        unit_id: u8,
        start: u16,
        values: &[bool],
    ) -> Result<(), ClientError> {
        let request = Request::WriteMultipleCoils(WriteMultipleCoilsRequest {
            start: Address::new(start),
            values: values.to_vec(),
        });
        match self.send_request(unit_id, request).await? {
            Response::WriteMultipleCoils(_) => Ok(()),
            _ => Err(ProtocolError::BadData.into()),
        }
    }

    pub async fn write_multiple_registers(
        &self,
        unit_id: u8,
        start: u16,
        values: &[u16],
    ) -> Result<(), ClientError> {
        let request = Request::WriteMultipleRegisters(WriteMultipleRegistersRequest {
            start: Address::new(start),
            values: values.to_vec(),
        });
        match self.send_request(unit_id, request).await? {
            Response::WriteMultipleRegisters(_) => Ok(()),
            _ => Err(ProtocolError::BadData.into()),
        }
    }

    pub async fn mask_write_register(
        &self,
        unit_id: u8,
        address: u16,
        and_mask: u16,
        or_mask: u16,
    ) -> Result<(), ClientError> {
        let request = Request::MaskWriteRegister(MaskWriteRegisterRequest {
            address: Address::new(address),
            and_mask: Mask::new(and_mask),
            or_mask: Mask::new(or_mask),
        });
        match self.send_request(unit_id, request).await? {
            Response::MaskWriteRegister(_) => Ok(()),
            _ => Err(ProtocolError::BadData.into()),
        }
    }

    pub async fn read_write_multiple_registers(
        &self,
        unit_id: u8,
        read_start: u16,
        read_count: u16,
        write_start: u16,
        write_values: &[u16],
    ) -> Result<Vec<u16>, ClientError> {
        let request = Request::ReadWriteMultipleRegisters(ReadWriteMultipleRegistersRequest {
            read_start: Address::new(read_start),
            read_count: ReadRegCount::new(read_count),
            write_start: Address::new(write_start),
            values: write_values.to_vec(),
        });
        match self.send_request(unit_id, request).await? {
            Response::ReadWriteMultipleRegisters(resp) => Ok(resp.values),
            _ => Err(ProtocolError::BadData.into()),
        }
    }
}
