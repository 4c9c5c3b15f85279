//! PIX static BR Code (EMV-QR Merchant Presented Mode) encoder and decoder.
//!
//! The payload is an ordered run of TLV fields closed by a CRC16 tag:
//!
//! ```text
//! 00 payload format | 26 { 00 GUI, 01 key } | 52 MCC | 53 currency
//! 54 amount?        | 58 country           | 59 name
//! 62 { 05 reference }?                     | 63 CRC16
//! ```
//!
//! Omitting tag 54 produces an open-amount charge, which is a different
//! charge from one with a fixed amount, so a zero amount is never encoded.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::payments::crc16::crc16_hex;
use crate::payments::error::PixError;
use crate::payments::tlv::{encode_all, parse_tlv, TlvField};

pub const TAG_PAYLOAD_FORMAT: &str = "00";
pub const TAG_MERCHANT_ACCOUNT: &str = "26";
pub const TAG_MCC: &str = "52";
pub const TAG_CURRENCY: &str = "53";
pub const TAG_AMOUNT: &str = "54";
pub const TAG_COUNTRY: &str = "58";
pub const TAG_MERCHANT_NAME: &str = "59";
pub const TAG_ADDITIONAL_DATA: &str = "62";
pub const TAG_CRC: &str = "63";

const SUB_GUI: &str = "00";
const SUB_KEY: &str = "01";
const SUB_REFERENCE_LABEL: &str = "05";

pub const PAYLOAD_FORMAT: &str = "01";
pub const PIX_GUI: &str = "br.gov.bcb.pix";
pub const MCC_UNDEFINED: &str = "0000";
pub const CURRENCY_BRL: &str = "986";
pub const COUNTRY_BR: &str = "BR";

/// Input for a single static charge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PixRequest {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
    /// Accepted for callers that send it; not part of the encoded payload
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

impl PixRequest {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }
}

/// Fields read back out of an encoded BR Code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixPayload {
    pub key: String,
    pub name: String,
    pub amount: Option<Decimal>,
    pub transaction_id: Option<String>,
    pub merchant_category_code: String,
    pub currency: String,
    pub country: String,
    pub crc: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PixEncoder {
    /// Reject non-ASCII key, name and reference instead of counting UTF-8 bytes
    pub ascii_only: bool,
}

impl PixEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ascii_only() -> Self {
        Self { ascii_only: true }
    }

    pub fn encode(&self, request: &PixRequest) -> Result<String, PixError> {
        if request.key.is_empty() {
            return Err(PixError::MissingField("key"));
        }
        if request.name.is_empty() {
            return Err(PixError::MissingField("name"));
        }

        if self.ascii_only {
            check_ascii("key", &request.key)?;
            check_ascii("name", &request.name)?;
            if let Some(txid) = &request.transaction_id {
                check_ascii("transaction_id", txid)?;
            }
        }

        let mut fields = vec![
            TlvField::new(TAG_PAYLOAD_FORMAT, PAYLOAD_FORMAT),
            TlvField::nested(
                TAG_MERCHANT_ACCOUNT,
                &[
                    TlvField::new(SUB_GUI, PIX_GUI),
                    TlvField::new(SUB_KEY, request.key.as_str()),
                ],
            )?,
            TlvField::new(TAG_MCC, MCC_UNDEFINED),
            TlvField::new(TAG_CURRENCY, CURRENCY_BRL),
        ];

        if let Some(amount) = format_amount(request.amount)? {
            fields.push(TlvField::new(TAG_AMOUNT, amount));
        }

        fields.push(TlvField::new(TAG_COUNTRY, COUNTRY_BR));
        fields.push(TlvField::new(TAG_MERCHANT_NAME, request.name.as_str()));

        if let Some(txid) = request.transaction_id.as_deref().filter(|t| !t.is_empty()) {
            fields.push(TlvField::nested(
                TAG_ADDITIONAL_DATA,
                &[TlvField::new(SUB_REFERENCE_LABEL, txid)],
            )?);
        }

        let mut payload = encode_all(&fields)?;
        payload.push_str(TAG_CRC);
        payload.push_str("04");
        let crc = crc16_hex(payload.as_bytes());
        payload.push_str(&crc);

        tracing::debug!(len = payload.len(), crc = %crc, "Encoded PIX payload");
        Ok(payload)
    }
}

/// Encode with default options (UTF-8 byte lengths, no ASCII restriction)
pub fn encode(request: &PixRequest) -> Result<String, PixError> {
    PixEncoder::new().encode(request)
}

fn check_ascii(field: &'static str, value: &str) -> Result<(), PixError> {
    if value.is_ascii() {
        Ok(())
    } else {
        Err(PixError::NonAscii { field })
    }
}

/// Two fixed decimals; `None` when the tag must be left out
fn format_amount(amount: Option<Decimal>) -> Result<Option<String>, PixError> {
    let amount = match amount {
        Some(a) if !a.is_zero() => a,
        _ => return Ok(None),
    };

    if amount.is_sign_negative() {
        return Err(PixError::InvalidAmount(format!("{} is negative", amount)));
    }

    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_zero() {
        return Err(PixError::InvalidAmount(format!(
            "{} rounds to zero at two decimals",
            amount
        )));
    }
    rounded.rescale(2);
    Ok(Some(rounded.to_string()))
}

/// Parse a BR Code, verify its CRC and tag order, and extract the charge fields
pub fn decode(code: &str) -> Result<PixPayload, PixError> {
    let code = code.trim();
    let fields = parse_tlv(code)?;

    let last = fields
        .last()
        .ok_or_else(|| PixError::Malformed("empty payload".into()))?;
    if last.id != TAG_CRC || last.value.len() != 4 {
        return Err(PixError::Malformed(
            "payload must end with a 4 digit CRC field (6304)".into(),
        ));
    }

    // CRC covers everything up to and including "6304"
    let covered = &code[..code.len() - 4];
    let computed = crc16_hex(covered.as_bytes());
    if !computed.eq_ignore_ascii_case(&last.value) {
        return Err(PixError::CrcMismatch {
            declared: last.value.clone(),
            computed,
        });
    }

    let mut previous: Option<u8> = None;
    for field in &fields {
        let id: u8 = field
            .id
            .parse()
            .map_err(|_| PixError::Malformed(format!("bad tag {}", field.id)))?;
        if let Some(prev) = previous {
            if id <= prev {
                return Err(PixError::Malformed(format!(
                    "tag {} appears after tag {:02}",
                    field.id, prev
                )));
            }
        }
        previous = Some(id);
    }

    let find = |tag: &str| fields.iter().find(|f| f.id == tag).map(|f| f.value.as_str());

    match find(TAG_PAYLOAD_FORMAT) {
        Some(PAYLOAD_FORMAT) => {}
        Some(other) => {
            return Err(PixError::Malformed(format!(
                "unsupported payload format {}",
                other
            )))
        }
        None => return Err(PixError::MissingField("payload_format")),
    }

    let account = find(TAG_MERCHANT_ACCOUNT).ok_or(PixError::MissingField("merchant_account"))?;
    let account = parse_tlv(account)?;
    let gui = account.iter().find(|f| f.id == SUB_GUI).map(|f| f.value.as_str());
    if !gui.is_some_and(|g| g.eq_ignore_ascii_case(PIX_GUI)) {
        return Err(PixError::Malformed("merchant account is not a PIX account".into()));
    }
    let key = account
        .iter()
        .find(|f| f.id == SUB_KEY)
        .map(|f| f.value.clone())
        .ok_or(PixError::MissingField("key"))?;

    let amount = match find(TAG_AMOUNT) {
        Some(raw) => Some(
            raw.parse::<Decimal>()
                .map_err(|_| PixError::InvalidAmount(raw.to_string()))?,
        ),
        None => None,
    };

    let transaction_id = match find(TAG_ADDITIONAL_DATA) {
        Some(raw) => parse_tlv(raw)?
            .into_iter()
            .find(|f| f.id == SUB_REFERENCE_LABEL)
            .map(|f| f.value),
        None => None,
    };

    Ok(PixPayload {
        key,
        name: find(TAG_MERCHANT_NAME)
            .ok_or(PixError::MissingField("name"))?
            .to_string(),
        amount,
        transaction_id,
        merchant_category_code: find(TAG_MCC).unwrap_or_default().to_string(),
        currency: find(TAG_CURRENCY).unwrap_or_default().to_string(),
        country: find(TAG_COUNTRY).unwrap_or_default().to_string(),
        crc: last.value.to_ascii_uppercase(),
    })
}
