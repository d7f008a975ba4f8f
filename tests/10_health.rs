mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::Client::new()
        .get(format!("{}/health", server.base_url))
        .send()
        .await?;

    // Without a reachable database the server still answers, degraded.
    let status = res.status();
    assert!(
        status == StatusCode::OK || status == StatusCode::SERVICE_UNAVAILABLE,
        "unexpected status: {}",
        status
    );

    let body = res.json::<Value>().await?;
    if status == StatusCode::OK {
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["database"], "ok");
    } else {
        assert_eq!(body["success"], false);
    }
    Ok(())
}

#[tokio::test]
async fn errors_use_json_envelope() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::Client::new()
        .get(format!("{}/_api/user", server.base_url))
        .send()
        .await?;

    // 401 with a tenant, 404 without one, 500 on an unmigrated database,
    // 503 when no database is reachable.
    let status = res.status();
    let expected = [
        StatusCode::UNAUTHORIZED,
        StatusCode::NOT_FOUND,
        StatusCode::INTERNAL_SERVER_ERROR,
        StatusCode::SERVICE_UNAVAILABLE,
    ];
    assert!(
        expected.contains(&status),
        "unexpected status: {}",
        status
    );
    let body = res.json::<Value>().await?;
    assert_eq!(body["success"], false);
    assert!(body["error"]["message"].is_string());
    Ok(())
}
