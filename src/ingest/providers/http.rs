// src/ingest/providers/http.rs
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, StatusCode};

use crate::error::SourceFault;

pub const USER_AGENT: &str = "ticker-news-sentiment/0.1";

/// Whether the request carries an API key. Only keyed requests read 401/403 as a
/// credential problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    Keyed,
    Keyless,
}

/// Shared client for providers, the price source and the remote scorer.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(timeout.min(Duration::from_secs(4)))
        .timeout(timeout)
        .build()
        .context("building http client")
}

/// Send and read the body, classifying failures into the adapter taxonomy.
/// 401/403 on a keyed request → `Unauthenticated`; everything else → `Unavailable`.
pub async fn fetch_body(req: RequestBuilder, auth: Auth) -> std::result::Result<String, SourceFault> {
    // without_url(): query strings may carry credentials
    let resp = req
        .send()
        .await
        .map_err(|e| SourceFault::Unavailable(e.without_url().to_string()))?;

    let status = resp.status();
    let denied = status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN;
    if denied && auth == Auth::Keyed {
        return Err(SourceFault::Unauthenticated);
    }
    if !status.is_success() {
        return Err(SourceFault::Unavailable(format!("http status {status}")));
    }

    resp.text()
        .await
        .map_err(|e| SourceFault::Unavailable(e.without_url().to_string()))
}

/// Local server answering every request with `status_line` and an empty body.
/// Returns its base url.
#[cfg(test)]
pub(crate) async fn serve_status(status_line: &'static str) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut sock, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let _ = sock.read(&mut buf).await;
            let resp = format!("HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            let _ = sock.write_all(resp.as_bytes()).await;
            let _ = sock.shutdown().await;
        }
    });
    format!("http://{addr}/feed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn forbidden_is_a_credential_fault_only_for_keyed_requests() {
        let url = serve_status("403 Forbidden").await;
        let client = build_client(Duration::from_secs(5)).unwrap();

        let keyed = fetch_body(client.get(&url), Auth::Keyed).await;
        assert_eq!(keyed, Err(SourceFault::Unauthenticated));

        let keyless = fetch_body(client.get(&url), Auth::Keyless).await;
        assert_eq!(
            keyless,
            Err(SourceFault::Unavailable("http status 403 Forbidden".into()))
        );
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let url = serve_status("503 Service Unavailable").await;
        let client = build_client(Duration::from_secs(5)).unwrap();
        let res = fetch_body(client.get(&url), Auth::Keyed).await;
        assert!(matches!(res, Err(SourceFault::Unavailable(_))));
    }
}
