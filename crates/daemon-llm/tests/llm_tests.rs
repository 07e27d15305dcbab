//! Tests for daemon-llm: request types, provider factory, mock cognition, live OpenRouter

use daemon_llm::*;
use std::time::Duration;

// ===========================================================================
// CognitionRequest / ResponseSchema
// ===========================================================================

#[test]
fn cognition_request_builder() {
    let req = CognitionRequest::new("system", "user", "openai/gpt-4o-mini")
        .with_max_tokens(64)
        .with_temperature(0.2);
    assert_eq!(req.system, "system");
    assert_eq!(req.user, "user");
    assert_eq!(req.model, "openai/gpt-4o-mini");
    assert_eq!(req.max_tokens, Some(64));
    assert_eq!(req.temperature, Some(0.2));
    assert!(req.response_schema.is_none());
}

#[test]
fn response_schema_format_shape() {
    let schema = ResponseSchema::strict(
        "memory_classification",
        serde_json::json!({"type": "object", "required": ["mnemonic"]}),
    );
    let format = schema.to_response_format();
    assert_eq!(format["type"], "json_schema");
    assert_eq!(format["json_schema"]["name"], "memory_classification");
    assert_eq!(format["json_schema"]["strict"], true);
    assert_eq!(format["json_schema"]["schema"]["required"][0], "mnemonic");
}

#[test]
fn cognition_response_constructors() {
    assert_eq!(CognitionResponse::text("hi").content.as_deref(), Some("hi"));
    assert!(CognitionResponse::empty().content.is_none());
}

// ===========================================================================
// ProviderKind / build_provider
// ===========================================================================

#[test]
fn provider_kind_parses_known_names() {
    assert_eq!("openrouter".parse::<ProviderKind>().unwrap(), ProviderKind::OpenRouter);
    assert_eq!("LMStudio".parse::<ProviderKind>().unwrap(), ProviderKind::LmStudio);
    assert_eq!(" lmproxy ".parse::<ProviderKind>().unwrap(), ProviderKind::LmProxy);
    assert_eq!("anthropic".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
}

#[test]
fn provider_kind_rejects_unknown() {
    let err = "ollama".parse::<ProviderKind>().unwrap_err();
    assert!(matches!(err, CognitionError::UnknownProvider(ref p) if p == "ollama"));
}

#[test]
fn provider_kind_display_roundtrip() {
    for kind in [
        ProviderKind::OpenRouter,
        ProviderKind::LmStudio,
        ProviderKind::LmProxy,
        ProviderKind::Anthropic,
    ] {
        assert_eq!(kind.to_string().parse::<ProviderKind>().unwrap(), kind);
    }
}

#[test]
fn build_openrouter_requires_key() {
    let settings = ProviderSettings::default();
    let err = build_provider(ProviderKind::OpenRouter, &settings).err().unwrap();
    assert!(matches!(err, CognitionError::AuthFailed(_)));
}

#[test]
fn build_anthropic_requires_key() {
    let settings = ProviderSettings {
        anthropic_api_key: Some("   ".into()),
        ..Default::default()
    };
    assert!(build_provider(ProviderKind::Anthropic, &settings).is_err());
}

#[test]
fn build_local_providers_without_keys() {
    let settings = ProviderSettings {
        timeout: Duration::from_secs(5),
        ..Default::default()
    };
    let studio = build_provider(ProviderKind::LmStudio, &settings).unwrap();
    assert_eq!(studio.name(), "lmstudio");
    let proxy = build_provider(ProviderKind::LmProxy, &settings).unwrap();
    assert_eq!(proxy.name(), "lmproxy");
}

#[test]
fn build_openrouter_with_key() {
    let settings = ProviderSettings {
        openrouter_api_key: Some("sk-or-test".into()),
        ..Default::default()
    };
    let provider = build_provider(ProviderKind::OpenRouter, &settings).unwrap();
    assert_eq!(provider.name(), "openrouter");
}

// ===========================================================================
// CognitionError
// ===========================================================================

#[test]
fn error_from_status_mapping() {
    assert!(matches!(CognitionError::from_status(401, "no".into()), CognitionError::AuthFailed(_)));
    assert!(matches!(
        CognitionError::from_status(429, "slow".into()),
        CognitionError::RateLimited { retry_after_ms: 60_000 }
    ));
    assert!(matches!(CognitionError::from_status(503, "down".into()), CognitionError::Unavailable(_)));
    assert!(matches!(CognitionError::from_status(400, "bad".into()), CognitionError::RequestFailed(_)));
}

// ===========================================================================
// MockCognition
// ===========================================================================

#[tokio::test]
async fn mock_constant_content() {
    let mock = MockCognition::constant(MockBehavior::Content("hello world".into()));
    let resp = mock.invoke(CognitionRequest::new("s", "u", "m")).await.unwrap();
    assert_eq!(resp.content.as_deref(), Some("hello world"));
    let resp = mock.invoke(CognitionRequest::new("s", "u", "m")).await.unwrap();
    assert_eq!(resp.content.as_deref(), Some("hello world"));
    assert_eq!(mock.call_count().await, 2);
}

#[tokio::test]
async fn mock_sequence_then_exhausted() {
    let mock = MockCognition::sequence(vec![
        MockBehavior::Content("first".into()),
        MockBehavior::Error("API down".into()),
    ]);

    let first = mock.invoke(CognitionRequest::new("s", "1", "m")).await.unwrap();
    assert_eq!(first.content.as_deref(), Some("first"));

    let second = mock.invoke(CognitionRequest::new("s", "2", "m")).await;
    assert!(matches!(second, Err(CognitionError::Unavailable(_))));

    // Exhausted: replies with no content
    let third = mock.invoke(CognitionRequest::new("s", "3", "m")).await.unwrap();
    assert!(third.content.is_none());

    let users: Vec<String> = mock.requests().await.into_iter().map(|r| r.user).collect();
    assert_eq!(users, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn mock_json_shorthand() {
    let mock = MockCognition::json(serde_json::json!({"mnemonic": "x"}));
    let resp = mock.invoke(CognitionRequest::new("s", "u", "m")).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_str(resp.content.as_deref().unwrap()).unwrap();
    assert_eq!(parsed["mnemonic"], "x");
}

#[tokio::test]
async fn mock_validates_connection_by_default() {
    let mock = MockCognition::constant(MockBehavior::NoContent);
    assert!(mock.validate_connection().await);
}

// ===========================================================================
// OpenRouter: real API integration
// ===========================================================================

#[tokio::test]
async fn openrouter_simple_text_response() {
    let api_key = match std::env::var("OPENROUTER_API_KEY") {
        Ok(k) if !k.is_empty() => k,
        _ => {
            eprintln!("SKIP: no OPENROUTER_API_KEY");
            return;
        }
    };

    let provider = OpenAiCompatProvider::openrouter(api_key).with_timeout(Duration::from_secs(60));
    let request = CognitionRequest::new(
        "You are terse.",
        "Reply with exactly the word 'pong' and nothing else.",
        "openai/gpt-4o-mini",
    )
    .with_max_tokens(16);

    let resp = provider.invoke(request).await.expect("API call failed");
    let text = resp.content.unwrap_or_default().to_lowercase();
    assert!(text.contains("pong"), "Expected 'pong' in response, got: {}", text);
}
