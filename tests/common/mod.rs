#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use tempfile::TempDir;

use nexus_api::auth::JwtService;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const WEBHOOK_SOURCE: &str = "billing";
pub const WEBHOOK_SECRET: &str = "billing-secret";
pub const MERCHANT_KEY: &str = "loja@pix.com.br";
pub const MERCHANT_NAME: &str = "LOJA TESTE";

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
    // Marketplace directories live as long as the server
    _workdir: TempDir,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let workdir = tempfile::tempdir().context("failed to create work dir")?;

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_nexus-api"));
        cmd.env("APP_ENV", "development")
            .env("NEXUS_HOST", "127.0.0.1")
            .env("NEXUS_PORT", port.to_string())
            .env("JWT_SECRET", JWT_SECRET)
            .env("PIX_MERCHANT_KEY", MERCHANT_KEY)
            .env("PIX_MERCHANT_NAME", MERCHANT_NAME)
            .env("WEBHOOK_SOURCES", WEBHOOK_SOURCE)
            .env("WEBHOOK_SECRET_BILLING", WEBHOOK_SECRET)
            .env("WEBHOOK_SCHEME_BILLING", "hex")
            .env("SLACK_WEBHOOK_URL", "")
            .env("DISCORD_WEBHOOK_URL", "")
            .env("MARKETPLACE_SOURCE_DIR", workdir.path().join("marketplace"))
            .env("MARKETPLACE_MODULES_DIR", workdir.path().join("modules"))
            .env("MARKETPLACE_CONFIG_FILE", workdir.path().join("nexus.json"))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self {
            port,
            base_url,
            child,
            _workdir: workdir,
        })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Bearer token the running server will accept
pub fn token(role: &str) -> Result<String> {
    let jwt = JwtService::new(JWT_SECRET, 1);
    Ok(jwt.issue("user-1", "tester@example.com", role)?)
}
