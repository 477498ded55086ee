//! The Modbus exception taxonomy and the 9-byte error ADU.

use core::fmt;

use crate::encoding::Reader;
use crate::frame::MbapHeader;
use crate::ProtocolError;
use alloc::vec::Vec;

/// Wire-encodable exception codes from the Modbus application protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    ServerDeviceFailure,
    Acknowledge,
    ServerDeviceBusy,
    NegativeAcknowledge,
    MemoryParityError,
    GatewayPathUnavailable,
    GatewayTargetDeviceFailedToRespond,
}

impl ExceptionCode {
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::IllegalFunction => 0x01,
            Self::IllegalDataAddress => 0x02,
            Self::IllegalDataValue => 0x03,
            Self::ServerDeviceFailure => 0x04,
            Self::Acknowledge => 0x05,
            Self::ServerDeviceBusy => 0x06,
            Self::NegativeAcknowledge => 0x07,
            Self::MemoryParityError => 0x08,
            Self::GatewayPathUnavailable => 0x0A,
            Self::GatewayTargetDeviceFailedToRespond => 0x0B,
        }
    }

    /// Bytes outside the taxonomy are a protocol failure, not a new code.
    pub const fn from_u8(raw: u8) -> Result<Self, ProtocolError> {
        match raw {
            0x01 => Ok(Self::IllegalFunction),
            0x02 => Ok(Self::IllegalDataAddress),
            0x03 => Ok(Self::IllegalDataValue),
            0x04 => Ok(Self::ServerDeviceFailure),
            0x05 => Ok(Self::Acknowledge),
            0x06 => Ok(Self::ServerDeviceBusy),
            0x07 => Ok(Self::NegativeAcknowledge),
            0x08 => Ok(Self::MemoryParityError),
            0x0A => Ok(Self::GatewayPathUnavailable),
            0x0B => Ok(Self::GatewayTargetDeviceFailedToRespond),
            _ => Err(ProtocolError::BadException),
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::IllegalFunction => "illegal function",
            Self::IllegalDataAddress => "illegal data address",
            Self::IllegalDataValue => "illegal data value",
            Self::ServerDeviceFailure => "server device failure",
            Self::Acknowledge => "acknowledge",
            Self::ServerDeviceBusy => "server device busy",
            Self::NegativeAcknowledge => "negative acknowledge",
            Self::MemoryParityError => "memory parity error",
            Self::GatewayPathUnavailable => "gateway path unavailable",
            Self::GatewayTargetDeviceFailedToRespond => {
                "gateway target device failed to respond"
            }
        };
        f.write_str(text)
    }
}

/// A specification error: an exception code bound to the request it answers.
///
/// Carries the raw function byte and the request header so the error ADU can
/// echo the originating transaction and unit ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exception {
    pub code: ExceptionCode,
    /// Raw function byte of the request, without the exception bit.
    pub function: u8,
    pub header: MbapHeader,
}

impl Exception {
    pub const fn new(code: ExceptionCode, function: u8, header: MbapHeader) -> Self {
        Self {
            code,
            function,
            header,
        }
    }

    /// Encode the error ADU: `header(7) | function | 0x80 | code`.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(9);
        let header = MbapHeader {
            length: MbapHeader::length_for(1),
            ..self.header
        };
        header.encode(&mut buf);
        buf.push(self.function | 0x80);
        buf.push(self.code.as_u8());
        buf
    }

    /// Decode the exception byte of an error ADU whose header and function
    /// byte have already been read.
    pub fn decode_tail(
        function_byte: u8,
        header: MbapHeader,
        r: &mut Reader<'_>,
    ) -> Result<Self, ProtocolError> {
        if (function_byte & 0x80) == 0 {
            return Err(ProtocolError::NoException);
        }
        let code = ExceptionCode::from_u8(r.read_u8()?)?;
        Ok(Self {
            code,
            function: function_byte & 0x7F,
            header,
        })
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "modbus exception {:#04x} ({}) for function {:#04x}",
            self.code.as_u8(),
            self.code,
            self.function
        )
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Exception {}
