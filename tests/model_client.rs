mod common;

use serde_json::Value;

use common::*;
use shiftBot::clients::openai_client::{ChatMessage, OpenAIHttpClient};
use shiftBot::error::LlmError;

fn client(url: &str) -> OpenAIHttpClient {
    OpenAIHttpClient::new("test-key".to_string(), "gpt-4o-mini".to_string())
        .unwrap()
        .with_url(format!("{}/chat/completions", url))
}

#[tokio::test]
async fn json_turn_is_posted_and_decoded() {
    let (url, requests) = responder(vec![(
        200,
        r#"{"choices":[{"message":{"role":"assistant","content":"{\"is_shift_request\":false,\"requests\":[]}"}}]}"#,
    )])
    .await;

    let reply = client(&url)
        .chat(
            &[ChatMessage::system("classify"), ChatMessage::user("42 has no crew tonight")],
            &[],
            true,
        )
        .await
        .unwrap();

    assert_eq!(reply.role, "assistant");
    assert!(reply.text().contains("is_shift_request"));

    let seen = requests.lock().unwrap()[0].clone();
    assert!(seen.line.starts_with("POST /v1/chat/completions"));
    assert!(seen.headers.to_lowercase().contains("authorization: bearer test-key"));
    let body: Value = serde_json::from_str(&seen.body).unwrap();
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["response_format"]["type"], "json_object");
    assert_eq!(body["messages"][1]["content"], "42 has no crew tonight");
    assert!(body.get("tools").is_none());
}

#[tokio::test]
async fn error_status_carries_the_body() {
    let (url, _) = responder(vec![(429, r#"{"error":{"message":"rate limited"}}"#)]).await;

    let err = client(&url)
        .chat(&[ChatMessage::user("hello")], &[], true)
        .await
        .unwrap_err();

    match err {
        LlmError::Status { status, body } => {
            assert_eq!(status, 429);
            assert!(body.contains("rate limited"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn reply_without_choices_is_empty() {
    let (url, _) = responder(vec![(200, r#"{"choices":[]}"#)]).await;

    let err = client(&url)
        .chat(&[ChatMessage::user("hello")], &[], false)
        .await
        .unwrap_err();

    assert!(matches!(err, LlmError::EmptyResponse));
}
