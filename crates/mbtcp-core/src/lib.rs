//! Modbus TCP (MBAP) protocol engine in pure Rust.
//!
//! `mbtcp-core` implements the wire protocol only: bounded value types,
//! LSB-first bit packing, the 7-byte MBAP header, per-function request and
//! response codecs, the exception taxonomy, and the client-side reply
//! classifier. It performs no I/O and holds no shared state; transports and
//! the server-side data table live in `mbtcp-datalink`.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub mod adu;
pub mod bits;
pub mod encoding;
pub mod error;
pub mod exception;
pub mod frame;
pub mod pdu;
pub mod types;

pub use adu::{decode_response, RequestAdu, ResponseAdu, ResponseError, Stage};
pub use error::ProtocolError;
pub use exception::{Exception, ExceptionCode};
pub use frame::{MbapHeader, HEADER_LEN, MAX_ADU_LEN, MAX_PDU_LEN};
pub use pdu::{FunctionCode, Request, Response};
