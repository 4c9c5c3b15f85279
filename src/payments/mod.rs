// Payments: PIX BR Code generation and verification

pub mod crc16;
pub mod error;
pub mod pix;
pub mod service;
pub mod tlv;

pub use crc16::{crc16_ccitt, crc16_hex};
pub use error::PixError;
pub use pix::{decode, encode, PixEncoder, PixPayload, PixRequest};
pub use service::{ChargeRequest, PaymentService, PixCharge};
