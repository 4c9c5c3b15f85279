use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::PixConfig;
use crate::payments::error::PixError;
use crate::payments::pix::{PixEncoder, PixRequest};

/// BR Code reference labels are limited to 25 characters
pub const TRANSACTION_ID_LEN: usize = 25;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChargeRequest {
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixCharge {
    pub code: String,
    pub transaction_id: String,
    pub amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

/// Issues static PIX charges for the configured merchant
#[derive(Debug, Clone)]
pub struct PaymentService {
    config: PixConfig,
    encoder: PixEncoder,
}

impl PaymentService {
    pub fn new(config: PixConfig) -> Self {
        let encoder = PixEncoder {
            ascii_only: config.ascii_only,
        };
        Self { config, encoder }
    }

    pub fn config(&self) -> &PixConfig {
        &self.config
    }

    pub fn create_charge(&self, request: ChargeRequest) -> Result<PixCharge, PixError> {
        if self.config.merchant_key.is_empty() {
            return Err(PixError::MissingField("merchant_key"));
        }

        let transaction_id = request
            .transaction_id
            .filter(|t| !t.is_empty())
            .unwrap_or_else(generate_transaction_id);

        let pix_request = PixRequest {
            key: self.config.merchant_key.clone(),
            name: self.config.merchant_name.clone(),
            amount: request.amount,
            description: request.description,
            transaction_id: Some(transaction_id.clone()),
        };

        let code = self.encoder.encode(&pix_request)?;

        tracing::info!(
            transaction_id = %transaction_id,
            amount = ?request.amount,
            "Created PIX charge"
        );

        Ok(PixCharge {
            code,
            transaction_id,
            amount: request.amount,
            created_at: Utc::now(),
        })
    }
}

/// 25 uppercase alphanumerics taken from a random UUID
pub fn generate_transaction_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
    id.truncate(TRANSACTION_ID_LEN);
    id
}
