//! Persona-chat pipeline tests.

use std::time::Duration;

use voxpop::service::PipelineError;

use crate::support::{service_with, ScriptedGateway};

#[tokio::test]
async fn chat_returns_the_model_reply_trimmed() {
    let gateway = ScriptedGateway::queued(vec![Ok(
        "  I'd say it depends on the season, honestly. ".to_owned()
    )]);
    let (service, _cache) = service_with(gateway.clone(), Duration::from_secs(60));

    let reply = service
        .persona_chat("Alice", "Do you cycle to work?")
        .await
        .expect("chat should succeed");
    assert_eq!(reply, "I'd say it depends on the season, honestly.");
    assert_eq!(gateway.call_count(), 1);

    let request = gateway.last_request().expect("gateway should see a request");
    assert!(request.system.contains("Alice"));
    assert!(request.user.contains("Do you cycle to work?"));
}

#[tokio::test]
async fn chat_replies_are_sanitized() {
    let gateway =
        ScriptedGateway::queued(vec![Ok("<b>Absolutely</b> — every day.".to_owned())]);
    let (service, _cache) = service_with(gateway, Duration::from_secs(60));

    let reply = service
        .persona_chat("John", "Do you drive?")
        .await
        .expect("chat should succeed");
    assert_eq!(reply, "Absolutely — every day.");
}

#[tokio::test]
async fn chat_is_never_cached() {
    let gateway = ScriptedGateway::repeating("Same question, same answer.");
    let (service, cache) = service_with(gateway.clone(), Duration::from_secs(60));

    service
        .persona_chat("Alice", "hello?")
        .await
        .expect("first turn should succeed");
    service
        .persona_chat("Alice", "hello?")
        .await
        .expect("second turn should succeed");
    assert_eq!(gateway.call_count(), 2);
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn chat_rejects_empty_fields_before_any_model_call() {
    let gateway = ScriptedGateway::repeating("unused");
    let (service, _cache) = service_with(gateway.clone(), Duration::from_secs(60));

    let no_name = service.persona_chat("", "hi").await;
    assert!(matches!(no_name, Err(PipelineError::Validation(_))));

    let no_message = service.persona_chat("Alice", "   ").await;
    assert!(matches!(no_message, Err(PipelineError::Validation(_))));

    let markup_only = service.persona_chat("Alice", "<b></b>").await;
    assert!(matches!(markup_only, Err(PipelineError::Validation(_))));

    assert_eq!(gateway.call_count(), 0);
}
