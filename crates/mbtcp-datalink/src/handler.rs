//! The request handler: one framed request in, one reply out.
//!
//! `handle` is a pure function of the data table and the request bytes.
//! Specification errors become 9-byte error ADUs; internal errors are logged
//! and answered with an empty byte sequence, which the session layer treats
//! as "no reply this round".

use mbtcp_core::encoding::Reader;
use mbtcp_core::exception::{Exception, ExceptionCode};
use mbtcp_core::frame::{MbapHeader, HEADER_LEN};
use mbtcp_core::pdu::request::Request;
use mbtcp_core::pdu::response::{
    MaskWriteRegisterResponse, ReadCoilsResponse, ReadDiscreteInputsResponse,
    ReadHoldingRegistersResponse, ReadInputRegistersResponse,
    ReadWriteMultipleRegistersResponse, Response, WriteMultipleCoilsResponse,
    WriteMultipleRegistersResponse, WriteSingleCoilResponse, WriteSingleRegisterResponse,
};
use mbtcp_core::pdu::FunctionCode;
use mbtcp_core::{ProtocolError, ResponseAdu};
use tracing::{debug, warn};

use crate::table::DataTable;

enum Failure {
    /// Observable on the wire as an error ADU.
    Spec(Exception),
    /// Never on the wire; the request is dropped.
    Internal(ProtocolError),
}

impl From<Exception> for Failure {
    fn from(exc: Exception) -> Self {
        Self::Spec(exc)
    }
}

impl From<ProtocolError> for Failure {
    fn from(err: ProtocolError) -> Self {
        Self::Internal(err)
    }
}

/// Handle one framed request against the table and return the reply bytes.
///
/// An empty return value means the frame could not be answered at all.
pub fn handle(table: &DataTable, frame: &[u8]) -> Vec<u8> {
    match process(table, frame) {
        Ok(reply) => reply,
        Err(Failure::Spec(exc)) => exc.encode(),
        Err(Failure::Internal(err)) => {
            warn!(error = %err, frame_len = frame.len(), "dropping unanswerable request");
            Vec::new()
        }
    }
}

fn process(table: &DataTable, frame: &[u8]) -> Result<Vec<u8>, Failure> {
    if frame.len() <= HEADER_LEN {
        return Err(ProtocolError::BadDataSize.into());
    }

    let mut r = Reader::new(frame);
    let header = MbapHeader::decode(&mut r)?;
    let function_byte = r.read_u8()?;

    let Some(function) = FunctionCode::from_u8(function_byte) else {
        return Err(Exception::new(
            ExceptionCode::IllegalFunction,
            function_byte & 0x7F,
            header,
        )
        .into());
    };

    debug!(
        transaction_id = header.transaction_id,
        unit_id = header.unit_id,
        function = function.name(),
        "handling request"
    );

    // Decoder boundary: parse failures answer with server-device-failure so
    // the client sees the originating transaction.
    let pdu = decode_body(function, header, frame, &mut r)
        .map_err(|_| Exception::new(ExceptionCode::ServerDeviceFailure, function.as_u8(), header))?;

    let response = execute(table, &pdu, header)?;
    ResponseAdu::new(header, response)
        .encode()
        .map_err(|_| Failure::Spec(Exception::new(
            ExceptionCode::ServerDeviceFailure,
            function.as_u8(),
            header,
        )))
}

fn decode_body(
    function: FunctionCode,
    header: MbapHeader,
    frame: &[u8],
    r: &mut Reader<'_>,
) -> Result<Request, ProtocolError> {
    if usize::from(header.length) != frame.len() - (HEADER_LEN - 1) {
        return Err(ProtocolError::BadDataSize);
    }
    let pdu = Request::decode_pdu(function, r)?;
    if !r.is_empty() {
        return Err(ProtocolError::BadData);
    }
    Ok(pdu)
}

fn execute(table: &DataTable, request: &Request, header: MbapHeader) -> Result<Response, Exception> {
    let exc = |code| Exception::new(code, request.function().as_u8(), header);

    match request {
        Request::ReadCoils(req) => {
            if !req.count.validate() {
                return Err(exc(ExceptionCode::IllegalDataValue));
            }
            let count = usize::from(req.count.get());
            if !table.coils().validate(req.start, count) {
                return Err(exc(ExceptionCode::IllegalDataAddress));
            }
            let bits = table
                .coils()
                .get_range(req.start, count)
                .map_err(|_| exc(ExceptionCode::IllegalDataAddress))?;
            Ok(Response::ReadCoils(ReadCoilsResponse { bits }))
        }
        Request::ReadDiscreteInputs(req) => {
            if !req.count.validate() {
                return Err(exc(ExceptionCode::IllegalDataValue));
            }
            let count = usize::from(req.count.get());
            if !table.discrete_inputs().validate(req.start, count) {
                return Err(exc(ExceptionCode::IllegalDataAddress));
            }
            let bits = table
                .discrete_inputs()
                .get_range(req.start, count)
                .map_err(|_| exc(ExceptionCode::IllegalDataAddress))?;
            Ok(Response::ReadDiscreteInputs(ReadDiscreteInputsResponse {
                bits,
            }))
        }
        Request::ReadHoldingRegisters(req) => {
            if !req.count.validate() {
                return Err(exc(ExceptionCode::IllegalDataValue));
            }
            let count = usize::from(req.count.get());
            if !table.holding_registers().validate(req.start, count) {
                return Err(exc(ExceptionCode::IllegalDataAddress));
            }
            let values = table
                .holding_registers()
                .get_range(req.start, count)
                .map_err(|_| exc(ExceptionCode::IllegalDataAddress))?;
            Ok(Response::ReadHoldingRegisters(ReadHoldingRegistersResponse {
                values,
            }))
        }
        Request::ReadInputRegisters(req) => {
            if !req.count.validate() {
                return Err(exc(ExceptionCode::IllegalDataValue));
            }
            let count = usize::from(req.count.get());
            if !table.input_registers().validate(req.start, count) {
                return Err(exc(ExceptionCode::IllegalDataAddress));
            }
            let values = table
                .input_registers()
                .get_range(req.start, count)
                .map_err(|_| exc(ExceptionCode::IllegalDataAddress))?;
            Ok(Response::ReadInputRegisters(ReadInputRegistersResponse {
                values,
            }))
        }
        Request::WriteSingleCoil(req) => {
            if !table.coils().validate(req.address, 1) {
                return Err(exc(ExceptionCode::IllegalDataAddress));
            }
            table
                .coils()
                .set(req.address, req.value.as_bool())
                .map_err(|_| exc(ExceptionCode::IllegalDataAddress))?;
            // The echo reports the post-write state, which the atomic set
            // just made equal to the requested value.
            Ok(Response::WriteSingleCoil(WriteSingleCoilResponse {
                address: req.address,
                value: req.value,
            }))
        }
        Request::WriteSingleRegister(req) => {
            if !table.holding_registers().validate(req.address, 1) {
                return Err(exc(ExceptionCode::IllegalDataAddress));
            }
            table
                .holding_registers()
                .set(req.address, req.value.get())
                .map_err(|_| exc(ExceptionCode::IllegalDataAddress))?;
            Ok(Response::WriteSingleRegister(WriteSingleRegisterResponse {
                address: req.address,
                value: req.value,
            }))
        }
        Request::WriteMultipleCoils(req) => {
            let count = req
                .count()
                .map_err(|_| exc(ExceptionCode::IllegalDataValue))?;
            if !count.validate() {
                return Err(exc(ExceptionCode::IllegalDataValue));
            }
            if !table.coils().validate(req.start, req.values.len()) {
                return Err(exc(ExceptionCode::IllegalDataAddress));
            }
            table
                .coils()
                .set_range(req.start, &req.values)
                .map_err(|_| exc(ExceptionCode::IllegalDataAddress))?;
            Ok(Response::WriteMultipleCoils(WriteMultipleCoilsResponse {
                start: req.start,
                count: count.get(),
            }))
        }
        Request::WriteMultipleRegisters(req) => {
            let count = req
                .count()
                .map_err(|_| exc(ExceptionCode::IllegalDataValue))?;
            if !count.validate() {
                return Err(exc(ExceptionCode::IllegalDataValue));
            }
            if !table.holding_registers().validate(req.start, req.values.len()) {
                return Err(exc(ExceptionCode::IllegalDataAddress));
            }
            table
                .holding_registers()
                .set_range(req.start, &req.values)
                .map_err(|_| exc(ExceptionCode::IllegalDataAddress))?;
            Ok(Response::WriteMultipleRegisters(WriteMultipleRegistersResponse {
                start: req.start,
                count: count.get(),
            }))
        }
        Request::MaskWriteRegister(req) => {
            if !table.holding_registers().validate(req.address, 1) {
                return Err(exc(ExceptionCode::IllegalDataAddress));
            }
            let and_mask = req.and_mask.get();
            let or_mask = req.or_mask.get();
            // Read-compute-write under one exclusive lock.
            table
                .holding_registers()
                .update(req.address, |v| (v & and_mask) | or_mask)
                .map_err(|_| exc(ExceptionCode::IllegalDataAddress))?;
            Ok(Response::MaskWriteRegister(MaskWriteRegisterResponse {
                address: req.address,
                and_mask: req.and_mask,
                or_mask: req.or_mask,
            }))
        }
        Request::ReadWriteMultipleRegisters(req) => {
            let write_count = req
                .write_count()
                .map_err(|_| exc(ExceptionCode::IllegalDataValue))?;
            if !write_count.validate() || !req.read_count.validate() {
                return Err(exc(ExceptionCode::IllegalDataValue));
            }
            let read_count = usize::from(req.read_count.get());
            let holding = table.holding_registers();
            if !holding.validate(req.write_start, req.values.len())
                || !holding.validate(req.read_start, read_count)
            {
                return Err(exc(ExceptionCode::IllegalDataAddress));
            }
            // Write first, then read. Each phase is atomic on its own; no
            // cross-phase atomicity is promised.
            holding
                .set_range(req.write_start, &req.values)
                .map_err(|_| exc(ExceptionCode::IllegalDataAddress))?;
            let values = holding
                .get_range(req.read_start, read_count)
                .map_err(|_| exc(ExceptionCode::IllegalDataAddress))?;
            Ok(Response::ReadWriteMultipleRegisters(
                ReadWriteMultipleRegistersResponse { values },
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{BlockConfig, TableConfig};
    use mbtcp_core::types::Address;

    fn table() -> DataTable {
        DataTable::default()
    }

    #[test]
    fn short_frames_are_dropped_silently() {
        assert!(handle(&table(), &[]).is_empty());
        assert!(handle(&table(), &[0u8; 7]).is_empty());
    }

    #[test]
    fn unknown_function_answers_illegal_function() {
        // FC 0x2B is outside the supported set.
        let frame = [0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0x11, 0x2B];
        let reply = handle(&table(), &frame);
        assert_eq!(
            reply,
            &[0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0x11, 0xAB, 0x01]
        );
    }

    #[test]
    fn malformed_body_answers_server_device_failure() {
        // FC16 with a byte count that disagrees with the register count.
        let frame = [
            0x00, 0x07, 0x00, 0x00, 0x00, 0x0A, 0x01, 0x10, 0x00, 0x00, 0x00, 0x02, 0x03, 0x12,
            0x34, 0x56,
        ];
        let reply = handle(&table(), &frame);
        assert_eq!(
            reply,
            &[0x00, 0x07, 0x00, 0x00, 0x00, 0x03, 0x01, 0x90, 0x04]
        );
    }

    #[test]
    fn write_then_read_coils() {
        let table = table();
        // Write coil 0x00AC on.
        let write = [0x00, 0x10, 0x00, 0x00, 0x00, 0x06, 0x01, 0x05, 0x00, 0xAC, 0xFF, 0x00];
        let reply = handle(&table, &write);
        // Echo is byte-for-byte the request.
        assert_eq!(reply, &write);
        assert!(table.coils().get(Address::new(0x00AC)).unwrap());
    }

    #[test]
    fn read_outside_block_answers_illegal_data_address() {
        let table = DataTable::new(TableConfig {
            holding_registers: BlockConfig {
                start: Address::new(0),
                capacity: 0x10000,
                default: 0,
            },
            ..TableConfig::default()
        });
        // addr 0xFFFE count 5 runs past the end of the address space.
        let frame = [
            0x00, 0x20, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0xFF, 0xFE, 0x00, 0x05,
        ];
        let reply = handle(&table, &frame);
        assert_eq!(
            reply,
            &[0x00, 0x20, 0x00, 0x00, 0x00, 0x03, 0x01, 0x83, 0x02]
        );
    }

    #[test]
    fn zero_count_answers_illegal_data_value() {
        let frame = [0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x00];
        let reply = handle(&table(), &frame);
        assert_eq!(
            reply,
            &[0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0x83, 0x03]
        );
    }
}
