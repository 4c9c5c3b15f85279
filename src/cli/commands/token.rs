use clap::Subcommand;
use serde_json::json;

use crate::auth::JwtService;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Issue a bearer token signed with JWT_SECRET")]
    Issue {
        #[arg(long, help = "Subject (user id)")]
        sub: String,
        #[arg(long, help = "Email claim")]
        email: String,
        #[arg(long, default_value = "user", help = "Role claim")]
        role: String,
    },
}

pub fn handle(cmd: TokenCommands, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TokenCommands::Issue { sub, email, role } => {
            let jwt = JwtService::from_config(&config.security);
            let token = jwt.issue(&sub, &email, &role)?;

            match output_format {
                OutputFormat::Json => output_success(
                    &output_format,
                    "Token issued",
                    Some(json!({
                        "token": token,
                        "expires_in_hours": config.security.jwt_expiry_hours,
                    })),
                ),
                OutputFormat::Text => {
                    println!("{}", token);
                    Ok(())
                }
            }
        }
    }
}
