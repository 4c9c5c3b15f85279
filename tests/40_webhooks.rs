mod common;

use anyhow::Result;
use reqwest::StatusCode;

use nexus_api::integrations::sign;

#[tokio::test]
async fn signed_delivery_is_accepted() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let body = r#"{"type":"invoice.paid","id":"inv_1"}"#;
    let signature = sign(common::WEBHOOK_SECRET.as_bytes(), body.as_bytes());

    let res = client
        .post(server.url(&format!("/api/webhooks/{}", common::WEBHOOK_SOURCE)))
        .header("content-type", "application/json")
        .header("x-signature", signature)
        .body(body)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK, "unexpected status: {}", res.status());

    let json = res.json::<serde_json::Value>().await?;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["received"], true);
    Ok(())
}

#[tokio::test]
async fn bad_signature_is_unauthorized() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let body = r#"{"type":"invoice.paid"}"#;
    let signature = sign(b"wrong-secret", body.as_bytes());

    let res = client
        .post(server.url(&format!("/api/webhooks/{}", common::WEBHOOK_SOURCE)))
        .header("x-signature", signature)
        .body(body)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn missing_signature_is_unauthorized() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url(&format!("/api/webhooks/{}", common::WEBHOOK_SOURCE)))
        .body("{}")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn unknown_source_is_not_found() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/api/webhooks/nobody"))
        .body("{}")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}
