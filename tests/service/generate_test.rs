//! Persona-generation pipeline tests.

use std::time::Duration;

use voxpop::panel::{AGE_MAX, INCOME_LEVEL_MAX, INCOME_LEVEL_MIN, PANEL_SIZE};
use voxpop::service::PipelineError;

use crate::support::{panel_response_json, service_with, ScriptedGateway};

#[tokio::test]
async fn generate_returns_full_panel_with_ids() {
    let gateway = ScriptedGateway::queued(vec![Ok(panel_response_json())]);
    let (service, _cache) = service_with(gateway.clone(), Duration::from_secs(60));

    let generated = service
        .generate_personas("universal basic income")
        .await
        .expect("generation should succeed");

    assert_eq!(generated.personas.len(), PANEL_SIZE);
    assert_eq!(generated.topic, "universal basic income");
    for persona in &generated.personas {
        assert!(!persona.id.is_empty());
        assert!(!persona.name.is_empty());
        assert!(!persona.description.is_empty());
        assert!(persona.age <= AGE_MAX);
        assert!(persona.income_level >= INCOME_LEVEL_MIN);
        assert!(persona.income_level <= INCOME_LEVEL_MAX);
    }
    assert_eq!(gateway.call_count(), 1);
}

#[tokio::test]
async fn second_call_within_ttl_is_served_from_cache() {
    let gateway = ScriptedGateway::queued(vec![Ok(panel_response_json())]);
    let (service, _cache) = service_with(gateway.clone(), Duration::from_secs(60));

    let first = service
        .generate_personas("rent control")
        .await
        .expect("first call should succeed");
    let second = service
        .generate_personas("rent control")
        .await
        .expect("second call should hit the cache");

    assert_eq!(first.personas, second.personas);
    assert_eq!(gateway.call_count(), 1);
}

#[tokio::test]
async fn topics_differing_only_in_markup_share_a_cache_entry() {
    let gateway = ScriptedGateway::queued(vec![Ok(panel_response_json())]);
    let (service, _cache) = service_with(gateway.clone(), Duration::from_secs(60));

    let first = service
        .generate_personas("<script>x</script>speed limits")
        .await
        .expect("should succeed");
    assert_eq!(first.topic, "speed limits");

    let second = service
        .generate_personas("speed limits")
        .await
        .expect("should hit the cache");
    assert_eq!(second.personas, first.personas);
    assert_eq!(gateway.call_count(), 1);
}

#[tokio::test]
async fn expired_entry_triggers_a_fresh_model_call() {
    let gateway = ScriptedGateway::repeating(&panel_response_json());
    let (service, _cache) = service_with(gateway.clone(), Duration::from_millis(20));

    service
        .generate_personas("congestion pricing")
        .await
        .expect("first call should succeed");
    tokio::time::sleep(Duration::from_millis(50)).await;
    service
        .generate_personas("congestion pricing")
        .await
        .expect("second call should regenerate");

    assert_eq!(gateway.call_count(), 2);
}

#[tokio::test]
async fn fenced_model_output_still_parses() {
    let fenced = format!("```json\n{}\n```", panel_response_json());
    let gateway = ScriptedGateway::queued(vec![Ok(fenced)]);
    let (service, _cache) = service_with(gateway, Duration::from_secs(60));

    let generated = service
        .generate_personas("night trains")
        .await
        .expect("fenced output should parse");
    assert_eq!(generated.personas.len(), PANEL_SIZE);
}

#[tokio::test]
async fn non_json_output_fails_and_caches_nothing() {
    let gateway = ScriptedGateway::queued(vec![Ok(
        "I'm sorry, I cannot produce personas for that.".to_owned(),
    )]);
    let (service, cache) = service_with(gateway.clone(), Duration::from_secs(60));

    let result = service.generate_personas("cash bail").await;
    assert!(matches!(result, Err(PipelineError::Parse(_))));
    assert!(cache.is_empty().await);

    // A retry reaches the model again; no poisoned cache entry.
    let _ = service.generate_personas("cash bail").await;
    assert_eq!(gateway.call_count(), 2);
}

#[tokio::test]
async fn wrong_persona_count_is_a_parse_failure() {
    let two = serde_json::json!([
        {
            "name": "A", "age": 30, "gender": "Female", "location": "Lyon",
            "education": "BA", "maritalStatus": "Single", "occupation": "Clerk",
            "incomeLevel": 5, "ethnicGroup": "White", "religion": "None",
            "description": "First."
        },
        {
            "name": "B", "age": 40, "gender": "Male", "location": "Lille",
            "education": "MA", "maritalStatus": "Married", "occupation": "Chef",
            "incomeLevel": 6, "ethnicGroup": "White", "religion": "None",
            "description": "Second."
        }
    ])
    .to_string();
    let gateway = ScriptedGateway::queued(vec![Ok(two)]);
    let (service, cache) = service_with(gateway, Duration::from_secs(60));

    let result = service.generate_personas("olive subsidies").await;
    assert!(matches!(result, Err(PipelineError::Parse(_))));
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn out_of_range_model_persona_is_a_parse_failure() {
    let mut personas: serde_json::Value =
        serde_json::from_str(&panel_response_json()).expect("fixture should parse");
    personas[0]["incomeLevel"] = serde_json::json!(14);
    let gateway = ScriptedGateway::queued(vec![Ok(personas.to_string())]);
    let (service, cache) = service_with(gateway, Duration::from_secs(60));

    let result = service.generate_personas("wind farms").await;
    assert!(matches!(result, Err(PipelineError::Parse(_))));
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn empty_topic_is_rejected_before_any_model_call() {
    let gateway = ScriptedGateway::repeating(&panel_response_json());
    let (service, _cache) = service_with(gateway.clone(), Duration::from_secs(60));

    let result = service.generate_personas("   ").await;
    assert!(matches!(result, Err(PipelineError::Validation(_))));
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn markup_only_topic_is_rejected_after_sanitization() {
    let gateway = ScriptedGateway::repeating(&panel_response_json());
    let (service, _cache) = service_with(gateway.clone(), Duration::from_secs(60));

    let result = service.generate_personas("<b></b>").await;
    assert!(matches!(result, Err(PipelineError::Validation(_))));
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn model_markup_is_sanitized_out_of_personas() {
    let mut personas: serde_json::Value =
        serde_json::from_str(&panel_response_json()).expect("fixture should parse");
    personas[0]["description"] = serde_json::json!("<script>x</script>Grew up nearby.");
    let gateway = ScriptedGateway::queued(vec![Ok(personas.to_string())]);
    let (service, _cache) = service_with(gateway, Duration::from_secs(60));

    let generated = service
        .generate_personas("harbour expansion")
        .await
        .expect("should succeed");
    assert_eq!(generated.personas[0].description, "Grew up nearby.");
}
