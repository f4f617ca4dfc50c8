//! Retry, backoff, and error-classification tests against a scripted
//! HTTP endpoint.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use voxpop::config::ProviderConfig;
use voxpop::provider::openai::OpenAiGateway;
use voxpop::provider::{ChatGateway, ChatRequest, ProviderError, TEMPERATURE};

/// Serve one canned HTTP response per scripted entry, in order.
async fn serve_script(responses: Vec<(&'static str, String)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("listener should expose addr");

    tokio::spawn(async move {
        for (status_line, body) in responses {
            let accepted = listener.accept().await;
            if let Ok((mut socket, _)) = accepted {
                let mut read_buf = [0_u8; 4096];
                let _ = socket.read(&mut read_buf).await;

                let response = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        }
    });

    format!("http://{addr}")
}

fn gateway_for(base_url: &str, max_retries: u32) -> OpenAiGateway {
    let config = ProviderConfig {
        api_key: "sk-test".to_owned(),
        base_url: base_url.to_owned(),
        max_retries,
        request_timeout_seconds: 5,
        ..ProviderConfig::default()
    };
    OpenAiGateway::new(&config).expect("gateway should build")
}

fn request() -> ChatRequest {
    ChatRequest {
        system: "role".to_owned(),
        user: "task".to_owned(),
        temperature: TEMPERATURE,
        max_tokens: Some(64),
    }
}

fn completion_body(text: &str) -> String {
    serde_json::json!({
        "choices": [{ "message": { "content": text } }]
    })
    .to_string()
}

#[tokio::test]
async fn transient_server_error_is_retried_until_success() {
    let base = serve_script(vec![
        ("500 Internal Server Error", "overloaded".to_owned()),
        ("200 OK", completion_body("second try worked")),
    ])
    .await;

    let gateway = gateway_for(&base, 2);
    let text = gateway
        .complete(request())
        .await
        .expect("retry should recover");
    assert_eq!(text, "second try worked");
}

#[tokio::test]
async fn auth_failure_is_not_retried() {
    let base = serve_script(vec![("401 Unauthorized", "bad key".to_owned())]).await;

    let gateway = gateway_for(&base, 3);
    let err = match gateway.complete(request()).await {
        Err(err) => err,
        Ok(text) => panic!("401 should fail, got {text:?}"),
    };
    match err {
        ProviderError::Status { status, .. } => assert_eq!(status, 401),
        other => panic!("expected status error, got: {other}"),
    }
}

#[tokio::test]
async fn retries_exhausted_surface_the_last_error() {
    let base = serve_script(vec![
        ("503 Service Unavailable", "down".to_owned()),
        ("503 Service Unavailable", "still down".to_owned()),
    ])
    .await;

    let gateway = gateway_for(&base, 1);
    let err = match gateway.complete(request()).await {
        Err(err) => err,
        Ok(text) => panic!("exhausted retries should fail, got {text:?}"),
    };
    assert!(matches!(err, ProviderError::Status { status: 503, .. }));
}

#[tokio::test]
async fn malformed_envelope_is_not_retried() {
    let base = serve_script(vec![("200 OK", "plain text, not an envelope".to_owned())]).await;

    let gateway = gateway_for(&base, 3);
    let err = match gateway.complete(request()).await {
        Err(err) => err,
        Ok(text) => panic!("bad envelope should fail, got {text:?}"),
    };
    assert!(matches!(err, ProviderError::Envelope(_)));
}
