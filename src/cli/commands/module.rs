use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{output_empty_collection, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::marketplace::{InstalledModule, Marketplace};

#[derive(Subcommand)]
pub enum ModuleCommands {
    #[command(about = "Show the install order for a module without installing")]
    Resolve {
        #[arg(help = "Module name")]
        name: String,
        #[arg(long, help = "Exact version (default: newest)")]
        version: Option<String>,
    },

    #[command(about = "Install a module and its dependencies")]
    Install {
        #[arg(help = "Module name")]
        name: String,
        #[arg(long, help = "Exact version (default: newest)")]
        version: Option<String>,
    },

    #[command(about = "Move an installed module to another version")]
    Update {
        #[arg(help = "Module name")]
        name: String,
        #[arg(long, help = "Exact version (default: newest)")]
        version: Option<String>,
    },

    #[command(about = "Restore the module as it was before the last update or uninstall")]
    Rollback {
        #[arg(help = "Module name")]
        name: String,
    },

    #[command(about = "Remove a module no other module depends on")]
    Uninstall {
        #[arg(help = "Module name")]
        name: String,
    },

    #[command(about = "List installed modules")]
    List,
}

pub fn handle(cmd: ModuleCommands, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let market = Marketplace::from_config(&config.marketplace);

    match cmd {
        ModuleCommands::Resolve { name, version } => {
            let resolution = market.plan(&name, version.as_deref())?;
            let order: Vec<String> = resolution
                .order
                .iter()
                .map(|m| format!("{}@{}", m.name, m.version))
                .collect();

            match output_format {
                OutputFormat::Json => output_success(
                    &output_format,
                    &format!("Resolved {}", name),
                    Some(json!({ "order": order })),
                ),
                OutputFormat::Text => {
                    for (i, entry) in order.iter().enumerate() {
                        println!("{:>3}. {}", i + 1, entry);
                    }
                    Ok(())
                }
            }
        }
        ModuleCommands::Install { name, version } => {
            let installed = market.install(&name, version.as_deref())?;
            report_changes(&output_format, &format!("Installed {}", name), &installed)
        }
        ModuleCommands::Update { name, version } => {
            let changed = market.update(&name, version.as_deref())?;
            if changed.is_empty() {
                return output_success(&output_format, &format!("{} is already up to date", name), None);
            }
            report_changes(&output_format, &format!("Updated {}", name), &changed)
        }
        ModuleCommands::Rollback { name } => {
            let restored = market.rollback(&name)?;
            output_success(
                &output_format,
                &format!("Rolled back {} to {}", restored.name, restored.version),
                Some(json!({ "module": restored })),
            )
        }
        ModuleCommands::Uninstall { name } => {
            market.uninstall(&name)?;
            output_success(&output_format, &format!("Uninstalled {}", name), None)
        }
        ModuleCommands::List => {
            let modules = market.list()?;
            if modules.is_empty() {
                return output_empty_collection(&output_format, "modules", "No modules installed");
            }

            match output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&json!({ "modules": modules }))?);
                }
                OutputFormat::Text => {
                    for m in &modules {
                        let state = if m.enabled { "" } else { " (disabled)" };
                        println!("{:<20} {}{}", m.name, m.version, state);
                    }
                }
            }
            Ok(())
        }
    }
}

fn report_changes(output_format: &OutputFormat, message: &str, modules: &[InstalledModule]) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => output_success(output_format, message, Some(json!({ "modules": modules }))),
        OutputFormat::Text => {
            for m in modules {
                println!("  + {} {}", m.name, m.version);
            }
            output_success(output_format, message, None)
        }
    }
}
