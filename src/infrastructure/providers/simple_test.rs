use anyhow::Result;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::Simple;
use crate::domain::models::Message;
use crate::domain::models::Provider;
use crate::domain::models::ProviderError;
use crate::domain::models::Reply;
use crate::domain::models::Role;

impl Simple {
    fn with_url(url: String) -> Simple {
        return Simple { url };
    }
}

fn history() -> Vec<Message> {
    return vec![
        Message::new(Role::Assistant, "Hi!"),
        Message::new(Role::User, "What is Rust?"),
    ];
}

fn immediate(reply: Reply) -> String {
    match reply {
        Reply::Immediate(text) => return text,
        Reply::Stream(_) => panic!("Expected an immediate reply"),
    }
}

#[tokio::test]
async fn it_gets_a_reply() -> Result<()> {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/api/chat")
        .match_body(mockito::Matcher::Json(json!({
            "messages": [
                {"role": "assistant", "content": "Hi!"},
                {"role": "user", "content": "What is Rust?"},
            ]
        })))
        .with_status(200)
        .with_body(r#"{"reply":"A systems programming language."}"#)
        .create();

    let provider = Simple::with_url(server.url());
    let reply = provider
        .get_reply(&history(), CancellationToken::new())
        .await?;

    assert_eq!(immediate(reply), "A systems programming language.");
    mock.assert();

    return Ok(());
}

#[tokio::test]
async fn it_allows_extra_response_fields() -> Result<()> {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body(r#"{"reply":"hello","model":"tiny"}"#)
        .create();

    let provider = Simple::with_url(server.url());
    let reply = provider
        .get_reply(&history(), CancellationToken::new())
        .await?;

    assert_eq!(immediate(reply), "hello");
    mock.assert();

    return Ok(());
}

#[tokio::test]
async fn it_fails_on_error_status() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/api/chat")
        .with_status(503)
        .create();

    let provider = Simple::with_url(server.url());
    let res = provider
        .get_reply(&history(), CancellationToken::new())
        .await;

    assert_eq!(res.err(), Some(ProviderError::Status(503)));
    mock.assert();
}

#[tokio::test]
async fn it_fails_on_unexpected_shape() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body(r#"{"answer":"hello"}"#)
        .create();

    let provider = Simple::with_url(server.url());
    let res = provider
        .get_reply(&history(), CancellationToken::new())
        .await;

    assert!(matches!(res, Err(ProviderError::Malformed(_))));
    mock.assert();
}

#[tokio::test]
async fn it_fails_when_the_server_is_unreachable() {
    let provider = Simple::with_url("http://127.0.0.1:1".to_string());
    let res = provider
        .get_reply(&history(), CancellationToken::new())
        .await;

    assert!(matches!(res, Err(ProviderError::Transport(_))));
}

#[tokio::test]
async fn it_aborts_when_cancelled() {
    let provider = Simple::with_url("http://127.0.0.1:1".to_string());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let res = provider.get_reply(&history(), cancel).await;

    assert_eq!(res.err(), Some(ProviderError::Aborted));
}

#[tokio::test]
async fn it_rejects_empty_history() {
    let provider = Simple::with_url("http://127.0.0.1:1".to_string());
    let res = provider.get_reply(&[], CancellationToken::new()).await;

    assert_eq!(res.err(), Some(ProviderError::EmptyHistory));
}
