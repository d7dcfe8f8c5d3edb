use mentor_core::config::LlmConfig;
use mentor_core::error::MentorError;
use mentor_core::types::Turn;
use mentor_llm::{CompletionGateway, GroundingBlock, OpenAiCompletion, PromptContext};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> OpenAiCompletion {
    let config = LlmConfig {
        base_url: format!("{}/v1", server.uri()),
        ..LlmConfig::default()
    };
    OpenAiCompletion::new(&config, "sk-test").unwrap()
}

fn context() -> PromptContext {
    PromptContext::new("You are a study assistant.", "When should I study?")
        .with_grounding(GroundingBlock::new(
            "Known facts",
            vec!["prefers morning study sessions".to_string()],
        ))
        .with_history(vec![Turn::user("hi"), Turn::assistant("hello!")])
}

#[tokio::test]
async fn test_complete_sends_model_settings_and_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-3.5-turbo",
            "max_tokens": 500,
            "messages": [
                {"role": "system", "content": "You are a study assistant."},
                {"role": "system", "content": "Known facts:\n- prefers morning study sessions"},
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello!"},
                {"role": "user", "content": "When should I study?"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "  Try 8am.  "}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client_for(&server).complete(&context()).await.unwrap();
    assert_eq!(reply, "Try 8am.");
}

#[tokio::test]
async fn test_rate_limit_is_completion_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let err = client_for(&server).complete(&context()).await.unwrap_err();
    match err {
        MentorError::CompletionFailed(msg) => assert!(msg.contains("rate limit")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_choices_is_completion_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = client_for(&server).complete(&context()).await.unwrap_err();
    assert!(matches!(err, MentorError::CompletionFailed(_)));
}

#[tokio::test]
async fn test_blank_content_is_completion_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "   "}}]
        })))
        .mount(&server)
        .await;

    let err = client_for(&server).complete(&context()).await.unwrap_err();
    assert!(matches!(err, MentorError::CompletionFailed(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_completion_failed() {
    let config = LlmConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        timeout_secs: 2,
        ..LlmConfig::default()
    };
    let client = OpenAiCompletion::new(&config, "sk-test").unwrap();
    let err = client.complete(&context()).await.unwrap_err();
    assert!(matches!(err, MentorError::CompletionFailed(_)));
}
