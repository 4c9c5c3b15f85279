// EMV-QR tag-length-value fields
//
// Lengths are two decimal digits counting UTF-8 bytes, so a single field
// carries at most 99 bytes.

use crate::payments::error::PixError;

pub const MAX_FIELD_LEN: usize = 99;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvField {
    pub id: String,
    pub value: String,
}

impl TlvField {
    pub fn new(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
        }
    }

    /// Build a template field whose value is the concatenation of nested fields
    pub fn nested(id: impl Into<String>, children: &[TlvField]) -> Result<Self, PixError> {
        let value = encode_all(children)?;
        Ok(Self::new(id, value))
    }

    pub fn encode(&self) -> Result<String, PixError> {
        let len = self.value.len();
        if len > MAX_FIELD_LEN {
            return Err(PixError::FieldTooLong {
                tag: self.id.clone(),
                len,
            });
        }
        Ok(format!("{}{:02}{}", self.id, len, self.value))
    }
}

pub fn encode_all(fields: &[TlvField]) -> Result<String, PixError> {
    let mut out = String::new();
    for field in fields {
        out.push_str(&field.encode()?);
    }
    Ok(out)
}

/// Split a TLV string back into its fields
pub fn parse_tlv(input: &str) -> Result<Vec<TlvField>, PixError> {
    let bytes = input.as_bytes();
    let mut fields = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        if pos + 4 > bytes.len() {
            return Err(PixError::Malformed(format!(
                "truncated field header at offset {}",
                pos
            )));
        }

        let header = &bytes[pos..pos + 4];
        if !header.iter().all(u8::is_ascii_digit) {
            return Err(PixError::Malformed(format!(
                "non-numeric tag or length at offset {}",
                pos
            )));
        }

        // Header is four ASCII digits, so slicing on these boundaries is safe
        let id = &input[pos..pos + 2];
        let len: usize = input[pos + 2..pos + 4]
            .parse()
            .map_err(|_| PixError::Malformed(format!("bad length at offset {}", pos + 2)))?;

        let start = pos + 4;
        let end = start + len;
        if end > bytes.len() {
            return Err(PixError::Malformed(format!(
                "field {} declares {} bytes but only {} remain",
                id,
                len,
                bytes.len() - start
            )));
        }

        let value = input.get(start..end).ok_or_else(|| {
            PixError::Malformed(format!("field {} splits a UTF-8 character", id))
        })?;

        fields.push(TlvField::new(id, value));
        pos = end;
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_zero_padded_length() {
        let field = TlvField::new("00", "01");
        assert_eq!(field.encode().unwrap(), "000201");

        let field = TlvField::new("59", "LOJA TESTE");
        assert_eq!(field.encode().unwrap(), "5910LOJA TESTE");
    }

    #[test]
    fn length_counts_bytes_not_chars() {
        let field = TlvField::new("59", "SÃO");
        assert_eq!(field.encode().unwrap(), "5904SÃO");
    }

    #[test]
    fn rejects_values_over_99_bytes() {
        let field = TlvField::new("01", "x".repeat(100));
        let err = field.encode().unwrap_err();
        assert_eq!(
            err,
            PixError::FieldTooLong {
                tag: "01".into(),
                len: 100
            }
        );

        assert!(TlvField::new("01", "x".repeat(99)).encode().is_ok());
    }

    #[test]
    fn nested_template() {
        let gui = TlvField::new("00", "br.gov.bcb.pix");
        let key = TlvField::new("01", "a@b.c");
        let mai = TlvField::nested("26", &[gui, key]).unwrap();
        assert_eq!(mai.encode().unwrap(), "26270014br.gov.bcb.pix0105a@b.c");
    }

    #[test]
    fn parse_reconstructs_fields() {
        let fields = parse_tlv("0002015303986").unwrap();
        assert_eq!(
            fields,
            vec![TlvField::new("00", "01"), TlvField::new("53", "986")]
        );
    }

    #[test]
    fn parse_rejects_overrun_and_garbage() {
        assert!(matches!(parse_tlv("0005ab"), Err(PixError::Malformed(_))));
        assert!(matches!(parse_tlv("00"), Err(PixError::Malformed(_))));
        assert!(matches!(parse_tlv("0A0201"), Err(PixError::Malformed(_))));
    }

    #[test]
    fn parse_rejects_split_code_point() {
        // "Ã" is two bytes; a length of 1 cuts it in half
        assert!(matches!(parse_tlv("5901Ã"), Err(PixError::Malformed(_))));
    }
}
