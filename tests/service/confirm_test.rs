//! Panel-confirmation pipeline tests.

use std::time::Duration;

use voxpop::cache::{cache_key, CacheStage, CachedPayload};
use voxpop::panel::default_panel;
use voxpop::service::PipelineError;

use crate::support::{panel_response_json, service_with, ScriptedGateway};

#[tokio::test]
async fn confirm_stores_the_panel_without_a_model_call() {
    let gateway = ScriptedGateway::repeating(&panel_response_json());
    let (service, cache) = service_with(gateway.clone(), Duration::from_secs(60));

    let personas = service
        .confirm_personas("heat pumps", default_panel())
        .await
        .expect("confirmation should succeed");

    assert_eq!(gateway.call_count(), 0);
    assert_eq!(personas.len(), 3);

    let stored = cache
        .get(&cache_key("heat pumps", CacheStage::Confirmed))
        .await
        .expect("confirmed entry should exist");
    assert_eq!(stored, CachedPayload::Personas(personas));
}

#[tokio::test]
async fn confirm_assigns_missing_ids() {
    let gateway = ScriptedGateway::repeating(&panel_response_json());
    let (service, _cache) = service_with(gateway, Duration::from_secs(60));

    let mut panel = default_panel();
    for persona in &mut panel {
        persona.id = String::new();
    }
    let personas = service
        .confirm_personas("heat pumps", panel)
        .await
        .expect("confirmation should succeed");
    for persona in &personas {
        assert!(!persona.id.is_empty());
    }
}

#[tokio::test]
async fn confirm_sanitizes_edited_fields() {
    let gateway = ScriptedGateway::repeating(&panel_response_json());
    let (service, _cache) = service_with(gateway, Duration::from_secs(60));

    let mut panel = default_panel();
    panel[0].occupation = "<i>Union organiser</i>".to_owned();
    let personas = service
        .confirm_personas("heat pumps", panel)
        .await
        .expect("confirmation should succeed");
    assert_eq!(personas[0].occupation, "Union organiser");
}

#[tokio::test]
async fn confirm_rejects_a_field_that_sanitizes_to_empty() {
    let gateway = ScriptedGateway::repeating(&panel_response_json());
    let (service, cache) = service_with(gateway, Duration::from_secs(60));

    let mut panel = default_panel();
    panel[1].religion = "<script>alert(1)</script>".to_owned();
    let result = service.confirm_personas("heat pumps", panel).await;
    assert!(matches!(result, Err(PipelineError::Validation(_))));
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn confirm_rejects_out_of_range_fields() {
    let gateway = ScriptedGateway::repeating(&panel_response_json());
    let (service, _cache) = service_with(gateway, Duration::from_secs(60));

    let mut panel = default_panel();
    panel[2].age = 121;
    let result = service.confirm_personas("heat pumps", panel).await;
    assert!(matches!(result, Err(PipelineError::Validation(_))));
}
