use clap::Subcommand;
use rust_decimal::Decimal;
use serde_json::json;

use crate::cli::utils::{output_success, print_fields};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::payments::{self, crc16_hex, PixEncoder, PixRequest};

#[derive(Subcommand)]
pub enum PixCommands {
    #[command(about = "Build a BR Code (key and name default to PIX_MERCHANT_KEY / PIX_MERCHANT_NAME)")]
    Encode {
        #[arg(long, help = "PIX key")]
        key: Option<String>,
        #[arg(long, help = "Merchant name")]
        name: Option<String>,
        #[arg(long, help = "Fixed amount, e.g. 10.50; omit for an open amount")]
        amount: Option<Decimal>,
        #[arg(long = "txid", help = "Transaction reference label")]
        transaction_id: Option<String>,
        #[arg(long, help = "Reject non-ASCII key, name and reference")]
        ascii_only: bool,
    },

    #[command(about = "Verify a BR Code and print its fields")]
    Decode {
        #[arg(help = "BR Code payload")]
        code: String,
    },

    #[command(about = "CRC16-CCITT of a string, as used by BR Codes")]
    Crc {
        #[arg(help = "Input text")]
        input: String,
    },
}

pub fn handle(cmd: PixCommands, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        PixCommands::Encode {
            key,
            name,
            amount,
            transaction_id,
            ascii_only,
        } => {
            let mut request = PixRequest::new(
                key.unwrap_or_else(|| config.pix.merchant_key.clone()),
                name.unwrap_or_else(|| config.pix.merchant_name.clone()),
            );
            request.amount = amount;
            request.transaction_id = transaction_id;

            let encoder = if ascii_only || config.pix.ascii_only {
                PixEncoder::ascii_only()
            } else {
                PixEncoder::new()
            };
            let code = encoder.encode(&request)?;

            match output_format {
                OutputFormat::Json => output_success(&output_format, "BR Code generated", Some(json!({ "code": code }))),
                OutputFormat::Text => {
                    println!("{}", code);
                    Ok(())
                }
            }
        }
        PixCommands::Decode { code } => {
            let payload = payments::decode(code.trim())?;

            match output_format {
                OutputFormat::Json => output_success(
                    &output_format,
                    "BR Code is valid",
                    Some(json!({ "payload": payload })),
                ),
                OutputFormat::Text => {
                    println!("✓ BR Code is valid");
                    print_fields(&[
                        ("Key", json!(payload.key)),
                        ("Name", json!(payload.name)),
                        ("Amount", json!(payload.amount.map(|a| a.to_string()))),
                        ("Reference", json!(payload.transaction_id)),
                        ("CRC", json!(payload.crc)),
                    ]);
                    Ok(())
                }
            }
        }
        PixCommands::Crc { input } => {
            let crc = crc16_hex(input.as_bytes());

            match output_format {
                OutputFormat::Json => output_success(&output_format, "CRC computed", Some(json!({ "crc": crc }))),
                OutputFormat::Text => {
                    println!("{}", crc);
                    Ok(())
                }
            }
        }
    }
}
