//! Orchestration service: composes validation, sanitization, caching,
//! prompt construction, the model gateway, and output parsing into the
//! per-operation pipelines.
//!
//! Each operation is a short, independent pipeline; the only state
//! shared across concurrent requests is the injected response cache.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::{cache_key, CacheStage, CachedPayload, ResponseCache};
use crate::panel::{default_panel, Opinion, Persona};
use crate::parse::{self, ParseError};
use crate::prompt::{self, Stage};
use crate::provider::{ChatGateway, ChatRequest, ProviderError};
use crate::sanitize::Sanitizer;
use crate::validate::{self, ValidationError};

/// Error taxonomy of the pipeline, mapped to HTTP statuses at the edge.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Malformed or out-of-range client input.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The external model call failed.
    #[error("model call failed: {0}")]
    Provider(#[from] ProviderError),
    /// The model's output violated the output contract.
    #[error("model output rejected: {0}")]
    Parse(#[from] ParseError),
}

/// Result of persona generation: the panel plus the sanitized topic it
/// was generated for.
#[derive(Debug, Clone)]
pub struct GeneratedPanel {
    /// The generated panel.
    pub personas: Vec<Persona>,
    /// The sanitized topic, echoed back to the client.
    pub topic: String,
}

/// The orchestration service owning persona/opinion construction and all
/// cache entries.
pub struct PanelService {
    gateway: Arc<dyn ChatGateway>,
    cache: Arc<ResponseCache>,
    sanitizer: Sanitizer,
    max_output_tokens: Option<u32>,
}

impl PanelService {
    /// Build a service over an injected gateway and cache.
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        cache: Arc<ResponseCache>,
        max_output_tokens: Option<u32>,
    ) -> Self {
        Self {
            gateway,
            cache,
            sanitizer: Sanitizer::new(),
            max_output_tokens,
        }
    }

    /// The injected cache (for the health endpoint).
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Generate a persona panel for a topic, serving a cached panel when
    /// one is live.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] on validation, model-call, or parse
    /// failure. Nothing is cached on failure.
    pub async fn generate_personas(&self, topic: &str) -> Result<GeneratedPanel, PipelineError> {
        let stage = Stage::GeneratePersonas;
        validate::validate_topic(topic)?;
        let topic = self.sanitize_topic(topic)?;

        let key = cache_key(&topic, CacheStage::Generated);
        if let Some(CachedPayload::Personas(personas)) = self.cache.get(&key).await {
            info!(stage = stage.as_str(), topic = %topic, "cache hit");
            return Ok(GeneratedPanel { personas, topic });
        }

        let started = Instant::now();
        let raw = self
            .complete(stage, prompt::generate_personas_prompt(&topic))
            .await?;

        let mut personas = self.check_parse(stage, &topic, parse::parse_personas(&raw))?;
        for persona in &mut personas {
            self.sanitizer.sanitize_persona(persona);
        }
        self.check_parse(stage, &topic, self.check_panel_invariants(&personas, &raw))?;

        self.cache
            .set(&key, CachedPayload::Personas(personas.clone()))
            .await;
        info!(
            stage = stage.as_str(),
            topic = %topic,
            elapsed_ms = elapsed_ms(started),
            "panel generated"
        );
        Ok(GeneratedPanel { personas, topic })
    }

    /// Store a client-confirmed (possibly edited) panel for a topic.
    /// No model call.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] on malformed input.
    pub async fn confirm_personas(
        &self,
        topic: &str,
        mut personas: Vec<Persona>,
    ) -> Result<Vec<Persona>, PipelineError> {
        validate::validate_topic(topic)?;
        validate::validate_panel(&personas)?;
        let topic = self.sanitize_topic(topic)?;

        for persona in &mut personas {
            self.sanitizer.sanitize_persona(persona);
            if persona.id.trim().is_empty() {
                persona.id = Uuid::new_v4().to_string();
            }
        }
        // Edits may have emptied a field once markup is stripped.
        self.check_client_panel(&personas)?;

        let key = cache_key(&topic, CacheStage::Confirmed);
        self.cache
            .set(&key, CachedPayload::Personas(personas.clone()))
            .await;
        info!(stage = "confirm-personas", topic = %topic, "panel confirmed");
        Ok(personas)
    }

    /// Simulate opinions for a topic, serving a cached result when one is
    /// live. Without an explicit panel the built-in panel is used.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] on validation, model-call, or parse
    /// failure. Nothing is cached on failure.
    pub async fn simulate(
        &self,
        topic: &str,
        personas: Option<Vec<Persona>>,
    ) -> Result<Vec<Opinion>, PipelineError> {
        validate::validate_topic(topic)?;
        let topic = self.sanitize_topic(topic)?;
        let panel = self.prepare_panel(personas)?;

        let key = cache_key(&topic, CacheStage::Simulated);
        if let Some(CachedPayload::Opinions(opinions)) = self.cache.get(&key).await {
            info!(stage = Stage::SimulateOpinions.as_str(), topic = %topic, "cache hit");
            return Ok(opinions);
        }

        let opinions = self.run_simulation(&topic, &panel).await?;
        self.cache
            .set(&key, CachedPayload::Opinions(opinions.clone()))
            .await;
        Ok(opinions)
    }

    /// Re-roll semantics: sanitize the full persona schema and simulate
    /// unconditionally, skipping the cache read. The result still
    /// overwrites the simulated entry for the topic.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] on validation, model-call, or parse
    /// failure.
    pub async fn update_personas_and_simulate(
        &self,
        topic: &str,
        personas: Vec<Persona>,
    ) -> Result<Vec<Opinion>, PipelineError> {
        validate::validate_topic(topic)?;
        let topic = self.sanitize_topic(topic)?;
        let panel = self.prepare_panel(Some(personas))?;

        let opinions = self.run_simulation(&topic, &panel).await?;
        self.cache
            .set(
                &cache_key(&topic, CacheStage::Simulated),
                CachedPayload::Opinions(opinions.clone()),
            )
            .await;
        Ok(opinions)
    }

    /// One conversational turn with a named persona. Never cached.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] on validation or model-call failure.
    pub async fn persona_chat(
        &self,
        persona_name: &str,
        user_message: &str,
    ) -> Result<String, PipelineError> {
        validate::validate_chat(persona_name, user_message)?;
        let name = self.sanitizer.sanitize(persona_name);
        let message = self.sanitizer.sanitize(user_message);
        if name.is_empty() || message.is_empty() {
            return Err(ValidationError::new(vec![
                "personaName and userMessage must be non-empty after sanitization".to_owned(),
            ])
            .into());
        }

        let reply = self
            .complete(Stage::PersonaChat, prompt::persona_chat_prompt(&name, &message))
            .await?;
        Ok(self.sanitizer.sanitize(&reply))
    }

    // -- internals ---------------------------------------------------------

    async fn run_simulation(
        &self,
        topic: &str,
        panel: &[Persona],
    ) -> Result<Vec<Opinion>, PipelineError> {
        let stage = Stage::SimulateOpinions;
        let started = Instant::now();
        let raw = self
            .complete(stage, prompt::simulate_opinions_prompt(topic, panel))
            .await?;

        let mut opinions = self.check_parse(stage, topic, parse::parse_opinions(&raw, panel))?;
        for opinion in &mut opinions {
            opinion.opinion = self.sanitizer.sanitize(&opinion.opinion);
        }
        info!(
            stage = stage.as_str(),
            topic = %topic,
            elapsed_ms = elapsed_ms(started),
            "opinions simulated"
        );
        Ok(opinions)
    }

    async fn complete(
        &self,
        stage: Stage,
        prompt: prompt::ChatPrompt,
    ) -> Result<String, ProviderError> {
        tracing::debug!(
            stage = stage.as_str(),
            template_revision = prompt::TEMPLATE_REVISION,
            "dispatching model call"
        );
        let request = ChatRequest::from_prompt(prompt, self.max_output_tokens);
        match self.gateway.complete(request).await {
            Ok(raw) => Ok(raw),
            Err(error) => {
                warn!(stage = stage.as_str(), error = %error, "model call failed");
                Err(error)
            }
        }
    }

    fn sanitize_topic(&self, topic: &str) -> Result<String, ValidationError> {
        let sanitized = self.sanitizer.sanitize(topic);
        if sanitized.is_empty() {
            return Err(ValidationError::new(vec![
                "topic is empty after sanitization".to_owned(),
            ]));
        }
        Ok(sanitized)
    }

    fn prepare_panel(
        &self,
        personas: Option<Vec<Persona>>,
    ) -> Result<Vec<Persona>, PipelineError> {
        match personas {
            Some(mut panel) => {
                validate::validate_panel(&panel)?;
                for persona in &mut panel {
                    self.sanitizer.sanitize_persona(persona);
                    if persona.id.trim().is_empty() {
                        persona.id = Uuid::new_v4().to_string();
                    }
                }
                self.check_client_panel(&panel)?;
                Ok(panel)
            }
            None => Ok(default_panel()),
        }
    }

    /// Re-check persona invariants after sanitizing *client* input;
    /// violations here are still the client's fault.
    fn check_client_panel(&self, panel: &[Persona]) -> Result<(), ValidationError> {
        let violations: Vec<String> = panel
            .iter()
            .enumerate()
            .flat_map(|(index, persona)| {
                validate::persona_violations(persona)
                    .into_iter()
                    .map(move |v| format!("persona {}: {v} after sanitization", index.saturating_add(1)))
            })
            .collect();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(violations))
        }
    }

    /// Re-check persona invariants on *model* output; violations here
    /// are a contract breach by the model, not the client.
    fn check_panel_invariants(
        &self,
        panel: &[Persona],
        raw: &str,
    ) -> Result<(), ParseError> {
        let violations: Vec<String> = panel
            .iter()
            .flat_map(validate::persona_violations)
            .collect();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ParseError::Invalid {
                detail: violations.join("; "),
                raw: raw.to_owned(),
            })
        }
    }

    fn check_parse<T>(
        &self,
        stage: Stage,
        topic: &str,
        result: Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        result.map_err(|error| {
            warn!(
                stage = stage.as_str(),
                topic = %topic,
                error = %error,
                raw_preview = %parse::preview(error.raw()),
                "model output rejected"
            );
            error
        })
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
