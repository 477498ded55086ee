//! Request PDU codecs, one per function code.
//!
//! Encoders validate every bounded field before serializing and fail with
//! `BadData` on any domain violation. Decoders parse structure only: declared
//! byte counts must match the derived ones, but count domains are checked by
//! the executor so they surface as the right wire exception.

use alloc::vec::Vec;

use crate::bits;
use crate::encoding::{put_u16, Reader};
use crate::frame::HEADER_LEN;
use crate::pdu::FunctionCode;
use crate::types::{
    Address, CoilState, Mask, ReadBitCount, ReadRegCount, RegValue, WriteBitCount, WriteRegCount,
};
use crate::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadCoilsRequest {
    pub start: Address,
    pub count: ReadBitCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadDiscreteInputsRequest {
    pub start: Address,
    pub count: ReadBitCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadHoldingRegistersRequest {
    pub start: Address,
    pub count: ReadRegCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadInputRegistersRequest {
    pub start: Address,
    pub count: ReadRegCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSingleCoilRequest {
    pub address: Address,
    pub value: CoilState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSingleRegisterRequest {
    pub address: Address,
    pub value: RegValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteMultipleCoilsRequest {
    pub start: Address,
    pub values: Vec<bool>,
}

impl WriteMultipleCoilsRequest {
    pub fn count(&self) -> Result<WriteBitCount, ProtocolError> {
        let raw = u16::try_from(self.values.len()).map_err(|_| ProtocolError::BadData)?;
        Ok(WriteBitCount::new(raw))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteMultipleRegistersRequest {
    pub start: Address,
    pub values: Vec<u16>,
}

impl WriteMultipleRegistersRequest {
    pub fn count(&self) -> Result<WriteRegCount, ProtocolError> {
        let raw = u16::try_from(self.values.len()).map_err(|_| ProtocolError::BadData)?;
        Ok(WriteRegCount::new(raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskWriteRegisterRequest {
    pub address: Address,
    pub and_mask: Mask,
    pub or_mask: Mask,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadWriteMultipleRegistersRequest {
    pub read_start: Address,
    pub read_count: ReadRegCount,
    pub write_start: Address,
    pub values: Vec<u16>,
}

impl ReadWriteMultipleRegistersRequest {
    pub fn write_count(&self) -> Result<WriteRegCount, ProtocolError> {
        let raw = u16::try_from(self.values.len()).map_err(|_| ProtocolError::BadData)?;
        Ok(WriteRegCount::new(raw))
    }
}

/// A decoded or to-be-encoded request PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ReadCoils(ReadCoilsRequest),
    ReadDiscreteInputs(ReadDiscreteInputsRequest),
    ReadHoldingRegisters(ReadHoldingRegistersRequest),
    ReadInputRegisters(ReadInputRegistersRequest),
    WriteSingleCoil(WriteSingleCoilRequest),
    WriteSingleRegister(WriteSingleRegisterRequest),
    WriteMultipleCoils(WriteMultipleCoilsRequest),
    WriteMultipleRegisters(WriteMultipleRegistersRequest),
    MaskWriteRegister(MaskWriteRegisterRequest),
    ReadWriteMultipleRegisters(ReadWriteMultipleRegistersRequest),
}

impl Request {
    pub fn function(&self) -> FunctionCode {
        match self {
            Self::ReadCoils(_) => FunctionCode::ReadCoils,
            Self::ReadDiscreteInputs(_) => FunctionCode::ReadDiscreteInputs,
            Self::ReadHoldingRegisters(_) => FunctionCode::ReadHoldingRegisters,
            Self::ReadInputRegisters(_) => FunctionCode::ReadInputRegisters,
            Self::WriteSingleCoil(_) => FunctionCode::WriteSingleCoil,
            Self::WriteSingleRegister(_) => FunctionCode::WriteSingleRegister,
            Self::WriteMultipleCoils(_) => FunctionCode::WriteMultipleCoils,
            Self::WriteMultipleRegisters(_) => FunctionCode::WriteMultipleRegisters,
            Self::MaskWriteRegister(_) => FunctionCode::MaskWriteRegister,
            Self::ReadWriteMultipleRegisters(_) => FunctionCode::ReadWriteMultipleRegisters,
        }
    }

    /// Check every bounded field against its domain.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let ok = match self {
            Self::ReadCoils(req) => req.count.validate(),
            Self::ReadDiscreteInputs(req) => req.count.validate(),
            Self::ReadHoldingRegisters(req) => req.count.validate(),
            Self::ReadInputRegisters(req) => req.count.validate(),
            Self::WriteSingleCoil(_) | Self::WriteSingleRegister(_) | Self::MaskWriteRegister(_) => {
                true
            }
            Self::WriteMultipleCoils(req) => req.count()?.validate(),
            Self::WriteMultipleRegisters(req) => req.count()?.validate(),
            Self::ReadWriteMultipleRegisters(req) => {
                req.read_count.validate() && req.write_count()?.validate()
            }
        };
        if ok {
            Ok(())
        } else {
            Err(ProtocolError::BadData)
        }
    }

    /// Append the function byte and body to `buf`.
    pub fn encode_pdu(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
        self.validate()?;
        buf.push(self.function().as_u8());
        match self {
            Self::ReadCoils(ReadCoilsRequest { start, count }) => {
                put_u16(buf, start.get());
                put_u16(buf, count.get());
            }
            Self::ReadDiscreteInputs(ReadDiscreteInputsRequest { start, count }) => {
                put_u16(buf, start.get());
                put_u16(buf, count.get());
            }
            Self::ReadHoldingRegisters(ReadHoldingRegistersRequest { start, count }) => {
                put_u16(buf, start.get());
                put_u16(buf, count.get());
            }
            Self::ReadInputRegisters(ReadInputRegistersRequest { start, count }) => {
                put_u16(buf, start.get());
                put_u16(buf, count.get());
            }
            Self::WriteSingleCoil(req) => {
                put_u16(buf, req.address.get());
                put_u16(buf, req.value.as_u16());
            }
            Self::WriteSingleRegister(req) => {
                put_u16(buf, req.address.get());
                put_u16(buf, req.value.get());
            }
            Self::WriteMultipleCoils(req) => {
                let count = req.count()?;
                let packed = bits::pack_bits(&req.values);
                put_u16(buf, req.start.get());
                put_u16(buf, count.get());
                buf.push(packed.len() as u8);
                buf.extend_from_slice(&packed);
            }
            Self::WriteMultipleRegisters(req) => {
                let count = req.count()?;
                put_u16(buf, req.start.get());
                put_u16(buf, count.get());
                buf.push((req.values.len() * 2) as u8);
                for value in &req.values {
                    put_u16(buf, *value);
                }
            }
            Self::MaskWriteRegister(req) => {
                put_u16(buf, req.address.get());
                put_u16(buf, req.and_mask.get());
                put_u16(buf, req.or_mask.get());
            }
            Self::ReadWriteMultipleRegisters(req) => {
                let write_count = req.write_count()?;
                put_u16(buf, req.read_start.get());
                put_u16(buf, req.read_count.get());
                put_u16(buf, req.write_start.get());
                put_u16(buf, write_count.get());
                buf.push((req.values.len() * 2) as u8);
                for value in &req.values {
                    put_u16(buf, *value);
                }
            }
        }
        Ok(())
    }

    /// Parse the body following an already-consumed function byte.
    pub fn decode_pdu(function: FunctionCode, r: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        match function {
            FunctionCode::ReadCoils => Ok(Self::ReadCoils(ReadCoilsRequest {
                start: Address::new(r.read_u16()?),
                count: ReadBitCount::new(r.read_u16()?),
            })),
            FunctionCode::ReadDiscreteInputs => {
                Ok(Self::ReadDiscreteInputs(ReadDiscreteInputsRequest {
                    start: Address::new(r.read_u16()?),
                    count: ReadBitCount::new(r.read_u16()?),
                }))
            }
            FunctionCode::ReadHoldingRegisters => {
                Ok(Self::ReadHoldingRegisters(ReadHoldingRegistersRequest {
                    start: Address::new(r.read_u16()?),
                    count: ReadRegCount::new(r.read_u16()?),
                }))
            }
            FunctionCode::ReadInputRegisters => {
                Ok(Self::ReadInputRegisters(ReadInputRegistersRequest {
                    start: Address::new(r.read_u16()?),
                    count: ReadRegCount::new(r.read_u16()?),
                }))
            }
            FunctionCode::WriteSingleCoil => {
                let address = Address::new(r.read_u16()?);
                let value = CoilState::from_u16(r.read_u16()?)?;
                Ok(Self::WriteSingleCoil(WriteSingleCoilRequest {
                    address,
                    value,
                }))
            }
            FunctionCode::WriteSingleRegister => {
                Ok(Self::WriteSingleRegister(WriteSingleRegisterRequest {
                    address: Address::new(r.read_u16()?),
                    value: RegValue::new(r.read_u16()?),
                }))
            }
            FunctionCode::WriteMultipleCoils => {
                let start = Address::new(r.read_u16()?);
                let count = r.read_u16()?;
                let byte_count = usize::from(r.read_u8()?);
                if byte_count != bits::byte_count(count) {
                    return Err(ProtocolError::BadData);
                }
                let packed = r.read_exact(byte_count)?;
                let mut values = bits::unpack_bits(packed);
                values.truncate(usize::from(count));
                Ok(Self::WriteMultipleCoils(WriteMultipleCoilsRequest {
                    start,
                    values,
                }))
            }
            FunctionCode::WriteMultipleRegisters => {
                let start = Address::new(r.read_u16()?);
                let count = r.read_u16()?;
                let byte_count = usize::from(r.read_u8()?);
                if byte_count != usize::from(count) * 2 {
                    return Err(ProtocolError::BadData);
                }
                let values = decode_registers(r, usize::from(count))?;
                Ok(Self::WriteMultipleRegisters(WriteMultipleRegistersRequest {
                    start,
                    values,
                }))
            }
            FunctionCode::MaskWriteRegister => {
                Ok(Self::MaskWriteRegister(MaskWriteRegisterRequest {
                    address: Address::new(r.read_u16()?),
                    and_mask: Mask::new(r.read_u16()?),
                    or_mask: Mask::new(r.read_u16()?),
                }))
            }
            FunctionCode::ReadWriteMultipleRegisters => {
                let read_start = Address::new(r.read_u16()?);
                let read_count = ReadRegCount::new(r.read_u16()?);
                let write_start = Address::new(r.read_u16()?);
                let write_count = r.read_u16()?;
                let byte_count = usize::from(r.read_u8()?);
                if byte_count != usize::from(write_count) * 2 {
                    return Err(ProtocolError::BadData);
                }
                let values = decode_registers(r, usize::from(write_count))?;
                Ok(Self::ReadWriteMultipleRegisters(
                    ReadWriteMultipleRegistersRequest {
                        read_start,
                        read_count,
                        write_start,
                        values,
                    },
                ))
            }
        }
    }

    /// Exact size of a successful reply ADU, so a client can reject a
    /// truncated or extended frame before parsing it.
    pub fn expected_response_len(&self) -> usize {
        match self {
            Self::ReadCoils(req) => HEADER_LEN + 2 + bits::byte_count(req.count.get()),
            Self::ReadDiscreteInputs(req) => HEADER_LEN + 2 + bits::byte_count(req.count.get()),
            Self::ReadHoldingRegisters(req) => HEADER_LEN + 2 + usize::from(req.count.get()) * 2,
            Self::ReadInputRegisters(req) => HEADER_LEN + 2 + usize::from(req.count.get()) * 2,
            Self::WriteSingleCoil(_)
            | Self::WriteSingleRegister(_)
            | Self::WriteMultipleCoils(_)
            | Self::WriteMultipleRegisters(_) => HEADER_LEN + 1 + 4,
            Self::MaskWriteRegister(_) => HEADER_LEN + 1 + 6,
            Self::ReadWriteMultipleRegisters(req) => {
                HEADER_LEN + 2 + usize::from(req.read_count.get()) * 2
            }
        }
    }
}

fn decode_registers(r: &mut Reader<'_>, count: usize) -> Result<Vec<u16>, ProtocolError> {
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        values.push(r.read_u16()?);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn encode(request: &Request) -> Vec<u8> {
        let mut buf = Vec::new();
        request.encode_pdu(&mut buf).unwrap();
        buf
    }

    fn decode(bytes: &[u8]) -> Result<Request, ProtocolError> {
        let mut r = Reader::new(bytes);
        let function =
            FunctionCode::from_u8(r.read_u8()?).ok_or(ProtocolError::BadData)?;
        let request = Request::decode_pdu(function, &mut r)?;
        assert!(r.is_empty());
        Ok(request)
    }

    #[test]
    fn read_holding_golden() {
        let request = Request::ReadHoldingRegisters(ReadHoldingRegistersRequest {
            start: Address::new(0x006B),
            count: ReadRegCount::new(3),
        });
        let bytes = encode(&request);
        assert_eq!(bytes, &[0x03, 0x00, 0x6B, 0x00, 0x03]);
        assert_eq!(decode(&bytes).unwrap(), request);
    }

    #[test]
    fn encode_rejects_zero_count() {
        let request = Request::ReadCoils(ReadCoilsRequest {
            start: Address::new(0),
            count: ReadBitCount::new(0),
        });
        let mut buf = Vec::new();
        assert_eq!(
            request.encode_pdu(&mut buf).unwrap_err(),
            ProtocolError::BadData
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn encode_rejects_too_many_write_registers() {
        let request = Request::WriteMultipleRegisters(WriteMultipleRegistersRequest {
            start: Address::new(0),
            values: vec![0u16; 0x7C],
        });
        let mut buf = Vec::new();
        assert_eq!(
            request.encode_pdu(&mut buf).unwrap_err(),
            ProtocolError::BadData
        );
    }

    #[test]
    fn write_multiple_coils_roundtrip() {
        let request = Request::WriteMultipleCoils(WriteMultipleCoilsRequest {
            start: Address::new(0x0013),
            values: vec![true, false, true, true, false, false, true, false, true],
        });
        let bytes = encode(&request);
        assert_eq!(
            bytes,
            &[0x0F, 0x00, 0x13, 0x00, 0x09, 0x02, 0b0100_1101, 0b0000_0001]
        );
        assert_eq!(decode(&bytes).unwrap(), request);
    }

    #[test]
    fn write_multiple_registers_golden() {
        let request = Request::WriteMultipleRegisters(WriteMultipleRegistersRequest {
            start: Address::new(0x0000),
            values: vec![0x000A, 0x0102],
        });
        assert_eq!(
            encode(&request),
            &[0x10, 0x00, 0x00, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02]
        );
    }

    #[test]
    fn decode_rejects_byte_count_mismatch() {
        // FC16: declares two registers but carries three payload bytes.
        assert_eq!(
            decode(&[0x10, 0x00, 0x00, 0x00, 0x02, 0x03, 0x12, 0x34, 0x56]).unwrap_err(),
            ProtocolError::BadData
        );
        // FC15: declares nine coils but a one-byte payload.
        assert_eq!(
            decode(&[0x0F, 0x00, 0x00, 0x00, 0x09, 0x01, 0xFF]).unwrap_err(),
            ProtocolError::BadData
        );
        // FC23: write count and byte count disagree.
        assert_eq!(
            decode(&[0x17, 0x00, 0x10, 0x00, 0x01, 0x00, 0x20, 0x00, 0x01, 0x01, 0x12])
                .unwrap_err(),
            ProtocolError::BadData
        );
    }

    #[test]
    fn decode_rejects_invalid_coil_value() {
        assert_eq!(
            decode(&[0x05, 0x00, 0x01, 0x12, 0x34]).unwrap_err(),
            ProtocolError::BadData
        );
    }

    #[test]
    fn read_write_multiple_roundtrip() {
        let request = Request::ReadWriteMultipleRegisters(ReadWriteMultipleRegistersRequest {
            read_start: Address::new(0x0001),
            read_count: ReadRegCount::new(5),
            write_start: Address::new(0x0000),
            values: vec![1, 2, 3, 4, 5],
        });
        let bytes = encode(&request);
        assert_eq!(
            &bytes[..10],
            &[0x17, 0x00, 0x01, 0x00, 0x05, 0x00, 0x00, 0x00, 0x05, 0x0A]
        );
        assert_eq!(decode(&bytes).unwrap(), request);
    }

    #[test]
    fn expected_response_sizes() {
        let read_bits = Request::ReadCoils(ReadCoilsRequest {
            start: Address::new(0),
            count: ReadBitCount::new(10),
        });
        assert_eq!(read_bits.expected_response_len(), 7 + 1 + 1 + 2);

        let read_regs = Request::ReadHoldingRegisters(ReadHoldingRegistersRequest {
            start: Address::new(0),
            count: ReadRegCount::new(5),
        });
        assert_eq!(read_regs.expected_response_len(), 7 + 1 + 1 + 10);

        let single = Request::WriteSingleCoil(WriteSingleCoilRequest {
            address: Address::new(0),
            value: CoilState::On,
        });
        assert_eq!(single.expected_response_len(), 12);

        let mask = Request::MaskWriteRegister(MaskWriteRegisterRequest {
            address: Address::new(0),
            and_mask: Mask::new(0),
            or_mask: Mask::new(0),
        });
        assert_eq!(mask.expected_response_len(), 14);
    }
}
