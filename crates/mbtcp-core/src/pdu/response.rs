//! Response PDU codecs.
//!
//! Server-side encoding writes the success tail for each function. Client-side
//! decoding cross-checks every echoed field against the originating request
//! and fails with `BadData` on any mismatch.

use alloc::vec::Vec;

use crate::bits;
use crate::encoding::{put_u16, Reader};
use crate::pdu::request::Request;
use crate::pdu::FunctionCode;
use crate::types::{Address, CoilState, Mask, RegValue};
use crate::ProtocolError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadCoilsResponse {
    pub bits: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadDiscreteInputsResponse {
    pub bits: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadHoldingRegistersResponse {
    pub values: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadInputRegistersResponse {
    pub values: Vec<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSingleCoilResponse {
    pub address: Address,
    /// The post-write state of the coil.
    pub value: CoilState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSingleRegisterResponse {
    pub address: Address,
    pub value: RegValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteMultipleCoilsResponse {
    pub start: Address,
    pub count: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteMultipleRegistersResponse {
    pub start: Address,
    pub count: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskWriteRegisterResponse {
    pub address: Address,
    pub and_mask: Mask,
    pub or_mask: Mask,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadWriteMultipleRegistersResponse {
    pub values: Vec<u16>,
}

/// A successful response PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    ReadCoils(ReadCoilsResponse),
    ReadDiscreteInputs(ReadDiscreteInputsResponse),
    ReadHoldingRegisters(ReadHoldingRegistersResponse),
    ReadInputRegisters(ReadInputRegistersResponse),
    WriteSingleCoil(WriteSingleCoilResponse),
    WriteSingleRegister(WriteSingleRegisterResponse),
    WriteMultipleCoils(WriteMultipleCoilsResponse),
    WriteMultipleRegisters(WriteMultipleRegistersResponse),
    MaskWriteRegister(MaskWriteRegisterResponse),
    ReadWriteMultipleRegisters(ReadWriteMultipleRegistersResponse),
}

impl Response {
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

    /// Append the function byte and success tail to `buf`.
    pub fn encode_pdu(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
        buf.push(self.function().as_u8());
        match self {
            Self::ReadCoils(ReadCoilsResponse { bits })
            | Self::ReadDiscreteInputs(ReadDiscreteInputsResponse { bits }) => {
                let packed = bits::pack_bits(bits);
                let byte_count =
                    u8::try_from(packed.len()).map_err(|_| ProtocolError::BadDataSize)?;
                buf.push(byte_count);
                buf.extend_from_slice(&packed);
            }
            Self::ReadHoldingRegisters(ReadHoldingRegistersResponse { values })
            | Self::ReadInputRegisters(ReadInputRegistersResponse { values })
            | Self::ReadWriteMultipleRegisters(ReadWriteMultipleRegistersResponse { values }) => {
                let byte_count =
                    u8::try_from(values.len() * 2).map_err(|_| ProtocolError::BadDataSize)?;
                buf.push(byte_count);
                for value in values {
                    put_u16(buf, *value);
                }
            }
            Self::WriteSingleCoil(resp) => {
                put_u16(buf, resp.address.get());
                put_u16(buf, resp.value.as_u16());
            }
            Self::WriteSingleRegister(resp) => {
                put_u16(buf, resp.address.get());
                put_u16(buf, resp.value.get());
            }
            Self::WriteMultipleCoils(resp) => {
                put_u16(buf, resp.start.get());
                put_u16(buf, resp.count);
            }
            Self::WriteMultipleRegisters(resp) => {
                put_u16(buf, resp.start.get());
                put_u16(buf, resp.count);
            }
            Self::MaskWriteRegister(resp) => {
                put_u16(buf, resp.address.get());
                put_u16(buf, resp.and_mask.get());
                put_u16(buf, resp.or_mask.get());
            }
        }
        Ok(())
    }

    /// Parse the success tail following an already-consumed function byte,
    /// cross-checking every echoed field against `request`.
    pub fn decode_pdu(request: &Request, r: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        match request {
            Request::ReadCoils(req) => {
                let bits = decode_bit_tail(r, req.count.get())?;
                Ok(Self::ReadCoils(ReadCoilsResponse { bits }))
            }
            Request::ReadDiscreteInputs(req) => {
                let bits = decode_bit_tail(r, req.count.get())?;
                Ok(Self::ReadDiscreteInputs(ReadDiscreteInputsResponse { bits }))
            }
            Request::ReadHoldingRegisters(req) => {
                let values = decode_register_tail(r, req.count.get())?;
                Ok(Self::ReadHoldingRegisters(ReadHoldingRegistersResponse {
                    values,
                }))
            }
            Request::ReadInputRegisters(req) => {
                let values = decode_register_tail(r, req.count.get())?;
                Ok(Self::ReadInputRegisters(ReadInputRegistersResponse {
                    values,
                }))
            }
            Request::WriteSingleCoil(req) => {
                let address = Address::new(r.read_u16()?);
                let value = CoilState::from_u16(r.read_u16()?)?;
                if address != req.address || value != req.value {
                    return Err(ProtocolError::BadData);
                }
                Ok(Self::WriteSingleCoil(WriteSingleCoilResponse {
                    address,
                    value,
                }))
            }
            Request::WriteSingleRegister(req) => {
                let address = Address::new(r.read_u16()?);
                let value = RegValue::new(r.read_u16()?);
                if address != req.address || value != req.value {
                    return Err(ProtocolError::BadData);
                }
                Ok(Self::WriteSingleRegister(WriteSingleRegisterResponse {
                    address,
                    value,
                }))
            }
            Request::WriteMultipleCoils(req) => {
                let start = Address::new(r.read_u16()?);
                let count = r.read_u16()?;
                if start != req.start || count != req.count()?.get() {
                    return Err(ProtocolError::BadData);
                }
                Ok(Self::WriteMultipleCoils(WriteMultipleCoilsResponse {
                    start,
                    count,
                }))
            }
            Request::WriteMultipleRegisters(req) => {
                let start = Address::new(r.read_u16()?);
                let count = r.read_u16()?;
                if start != req.start || count != req.count()?.get() {
                    return Err(ProtocolError::BadData);
                }
                Ok(Self::WriteMultipleRegisters(WriteMultipleRegistersResponse {
                    start,
                    count,
                }))
            }
            Request::MaskWriteRegister(req) => {
                let address = Address::new(r.read_u16()?);
                let and_mask = Mask::new(r.read_u16()?);
                let or_mask = Mask::new(r.read_u16()?);
                if address != req.address || and_mask != req.and_mask || or_mask != req.or_mask {
                    return Err(ProtocolError::BadData);
                }
                Ok(Self::MaskWriteRegister(MaskWriteRegisterResponse {
                    address,
                    and_mask,
                    or_mask,
                }))
            }
            Request::ReadWriteMultipleRegisters(req) => {
                let values = decode_register_tail(r, req.read_count.get())?;
                Ok(Self::ReadWriteMultipleRegisters(
                    ReadWriteMultipleRegistersResponse { values },
                ))
            }
        }
    }
}

fn decode_bit_tail(r: &mut Reader<'_>, count: u16) -> Result<Vec<bool>, ProtocolError> {
    let byte_count = usize::from(r.read_u8()?);
    if byte_count != bits::byte_count(count) {
        return Err(ProtocolError::BadData);
    }
    let mut values = bits::unpack_bits(r.read_exact(byte_count)?);
    values.truncate(usize::from(count));
    Ok(values)
}

fn decode_register_tail(r: &mut Reader<'_>, count: u16) -> Result<Vec<u16>, ProtocolError> {
    let byte_count = usize::from(r.read_u8()?);
    if byte_count != usize::from(count) * 2 {
        return Err(ProtocolError::BadData);
    }
    let mut values = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        values.push(r.read_u16()?);
    }
    Ok(values)
}
