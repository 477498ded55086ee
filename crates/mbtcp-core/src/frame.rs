//! MBAP framing: the 7-byte header every Modbus TCP ADU starts with.

use crate::encoding::{put_u16, Reader};
use crate::ProtocolError;
use alloc::vec::Vec;

/// Wire size of the MBAP header.
pub const HEADER_LEN: usize = 7;
/// Largest ADU Modbus TCP allows.
pub const MAX_ADU_LEN: usize = 260;
/// Largest PDU (function byte + body) that fits in an ADU.
pub const MAX_PDU_LEN: usize = MAX_ADU_LEN - HEADER_LEN;

/// The MBAP header: `transaction(2) | protocol(2) | length(2) | unit(1)`,
/// big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    pub transaction_id: u16,
    /// Fixed at 0 for Modbus TCP.
    pub protocol_id: u16,
    /// Unit byte + function byte + PDU body length. Recomputed by encoders.
    pub length: u16,
    pub unit_id: u8,
}

impl MbapHeader {
    /// Header for a fresh request or response; `length` is filled in at
    /// encode time.
    pub const fn new(transaction_id: u16, unit_id: u8) -> Self {
        Self {
            transaction_id,
            protocol_id: 0,
            length: 0,
            unit_id,
        }
    }

    /// `length` for a PDU body of `pdu_body_len` bytes (unit + function +
    /// body).
    pub const fn length_for(pdu_body_len: usize) -> u16 {
        (1 + 1 + pdu_body_len) as u16
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        put_u16(buf, self.transaction_id);
        put_u16(buf, self.protocol_id);
        put_u16(buf, self.length);
        buf.push(self.unit_id);
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        let transaction_id = r.read_u16()?;
        let protocol_id = r.read_u16()?;
        let length = r.read_u16()?;
        let unit_id = r.read_u8()?;

        if protocol_id != 0 {
            return Err(ProtocolError::BadData);
        }
        // Shortest legal tail is unit + function.
        if length < 2 {
            return Err(ProtocolError::BadDataSize);
        }

        Ok(Self {
            transaction_id,
            protocol_id,
            length,
            unit_id,
        })
    }
}
