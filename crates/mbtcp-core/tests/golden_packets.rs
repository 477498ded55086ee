use mbtcp_core::adu::{decode_response, RequestAdu, ResponseAdu, ResponseError};
use mbtcp_core::exception::{Exception, ExceptionCode};
use mbtcp_core::frame::MbapHeader;
use mbtcp_core::pdu::request::{
    ReadCoilsRequest, ReadHoldingRegistersRequest, ReadWriteMultipleRegistersRequest,
    WriteMultipleRegistersRequest, WriteSingleCoilRequest,
};
use mbtcp_core::pdu::response::{
    ReadCoilsResponse, WriteMultipleRegistersResponse, WriteSingleCoilResponse,
};
use mbtcp_core::pdu::{Request, Response};
use mbtcp_core::types::{Address, CoilState, ReadBitCount, ReadRegCount};

const READ_COILS_REQ: &[u8] = &[
    0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x02, 0x01, 0x00, 0x00, 0x00, 0x0A,
];
const READ_COILS_RESP: &[u8] = &[
    0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x02, 0x01, 0x02, 0x55, 0x01,
];
const WRITE_COIL_FRAME: &[u8] = &[
    0x00, 0x10, 0x00, 0x00, 0x00, 0x06, 0x01, 0x05, 0x00, 0xAC, 0xFF, 0x00,
];
const ILLEGAL_ADDRESS_RESP: &[u8] = &[0x00, 0x20, 0x00, 0x00, 0x00, 0x03, 0x01, 0x83, 0x02];

fn assert_framing_invariants(frame: &[u8]) {
    assert_eq!(&frame[2..4], &[0x00, 0x00]);
    let declared = u16::from_be_bytes([frame[4], frame[5]]);
    assert_eq!(usize::from(declared), frame.len() - 6);
    assert!(frame.len() <= 260);
}

#[test]
fn read_coils_request_golden() {
    let request = RequestAdu::new(
        0x0001,
        0x02,
        Request::ReadCoils(ReadCoilsRequest {
            start: Address::new(0x0000),
            count: ReadBitCount::new(0x000A),
        }),
    );
    let bytes = request.encode().unwrap();
    assert_eq!(bytes, READ_COILS_REQ);
    assert_framing_invariants(&bytes);
}

#[test]
fn read_coils_response_golden_decode() {
    let request = RequestAdu::new(
        0x0001,
        0x02,
        Request::ReadCoils(ReadCoilsRequest {
            start: Address::new(0x0000),
            count: ReadBitCount::new(0x000A),
        }),
    );
    let adu = decode_response(&request, READ_COILS_RESP).unwrap();
    match adu.pdu {
        Response::ReadCoils(ReadCoilsResponse { bits }) => {
            // First ten coils alternate 1010101010.
            assert_eq!(
                bits,
                vec![true, false, true, false, true, false, true, false, true, false]
            );
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[test]
fn write_single_coil_request_and_response_bytes_match() {
    let request = RequestAdu::new(
        0x0010,
        0x01,
        Request::WriteSingleCoil(WriteSingleCoilRequest {
            address: Address::new(0x00AC),
            value: CoilState::On,
        }),
    );
    let request_bytes = request.encode().unwrap();
    assert_eq!(request_bytes, WRITE_COIL_FRAME);

    let response = ResponseAdu::new(
        MbapHeader::new(0x0010, 0x01),
        Response::WriteSingleCoil(WriteSingleCoilResponse {
            address: Address::new(0x00AC),
            value: CoilState::On,
        }),
    );
    assert_eq!(response.encode().unwrap(), WRITE_COIL_FRAME);

    let decoded = decode_response(&request, WRITE_COIL_FRAME).unwrap();
    assert_eq!(decoded.header.transaction_id, 0x0010);
}

#[test]
fn illegal_data_address_error_adu() {
    let exc = Exception::new(
        ExceptionCode::IllegalDataAddress,
        0x03,
        MbapHeader::new(0x0020, 0x01),
    );
    let bytes = exc.encode();
    assert_eq!(bytes, ILLEGAL_ADDRESS_RESP);
    assert_framing_invariants(&bytes);

    let request = RequestAdu::new(
        0x0020,
        0x01,
        Request::ReadHoldingRegisters(ReadHoldingRegistersRequest {
            start: Address::new(0xFFFE),
            count: ReadRegCount::new(0x0005),
        }),
    );
    match decode_response(&request, &bytes).unwrap_err() {
        ResponseError::Exception(decoded) => {
            assert_eq!(decoded.code, ExceptionCode::IllegalDataAddress);
            assert_eq!(decoded.header.transaction_id, 0x0020);
            assert_eq!(decoded.header.unit_id, 0x01);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn write_multiple_registers_golden() {
    let request = RequestAdu::new(
        0x1234,
        0x01,
        Request::WriteMultipleRegisters(WriteMultipleRegistersRequest {
            start: Address::new(0x0000),
            values: vec![0x000A, 0x0102],
        }),
    );
    let bytes = request.encode().unwrap();
    assert_eq!(
        &bytes[7..],
        &[0x10, 0x00, 0x00, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02]
    );
    assert_framing_invariants(&bytes);

    let response = ResponseAdu::new(
        MbapHeader::new(0x1234, 0x01),
        Response::WriteMultipleRegisters(WriteMultipleRegistersResponse {
            start: Address::new(0x0000),
            count: 2,
        }),
    );
    let response_bytes = response.encode().unwrap();
    assert_eq!(&response_bytes[7..], &[0x10, 0x00, 0x00, 0x00, 0x02]);
    assert!(decode_response(&request, &response_bytes).is_ok());
}

#[test]
fn read_write_multiple_registers_request_layout() {
    let request = RequestAdu::new(
        0x1234,
        0x01,
        Request::ReadWriteMultipleRegisters(ReadWriteMultipleRegistersRequest {
            read_start: Address::new(0x0001),
            read_count: ReadRegCount::new(0x0005),
            write_start: Address::new(0x0000),
            values: vec![1, 2, 3, 4, 5],
        }),
    );
    let bytes = request.encode().unwrap();
    assert_eq!(
        &bytes[7..17],
        &[0x17, 0x00, 0x01, 0x00, 0x05, 0x00, 0x00, 0x00, 0x05, 0x0A]
    );
    assert_eq!(bytes.len(), 17 + 10);
    assert_framing_invariants(&bytes);
    // Reply carries bytecount 0x0A plus five registers.
    assert_eq!(request.pdu.expected_response_len(), 7 + 1 + 1 + 10);
}
