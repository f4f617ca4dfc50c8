//! Normalizes raw model text and parses it into typed panel records.
//!
//! Normalization is limited to fence stripping and trimming. Anything
//! else (invalid JSON, a wrong field set, a wrong array length, an
//! inconsistent name set) is a parse failure carrying the offending raw
//! text for diagnostics. A model that violates the output contract is a
//! service failure, never coerced into partial data.

use std::collections::HashSet;

use uuid::Uuid;

use crate::panel::{Opinion, Persona, PANEL_SIZE};

/// Maximum characters of raw model text included in log previews.
const PREVIEW_CHARS: usize = 200;

/// Failure to turn model text into the expected typed shape.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Not valid JSON of the expected shape.
    #[error("model output is not a valid {expected} array: {reason}")]
    Malformed {
        /// Human name of the expected record type.
        expected: &'static str,
        /// Deserializer failure detail.
        reason: String,
        /// Offending raw model text.
        raw: String,
    },
    /// Valid records, wrong count.
    #[error("model returned {got} {expected} records, expected {want}")]
    Cardinality {
        /// Human name of the expected record type.
        expected: &'static str,
        /// Required record count.
        want: usize,
        /// Actual record count.
        got: usize,
        /// Offending raw model text.
        raw: String,
    },
    /// Opinion names do not match the panel exactly.
    #[error("opinion names inconsistent with the panel: {detail}")]
    NameMismatch {
        /// What differed.
        detail: String,
        /// Offending raw model text.
        raw: String,
    },
    /// Records parsed but violate persona field invariants.
    #[error("model personas violate field constraints: {detail}")]
    Invalid {
        /// The violated constraints.
        detail: String,
        /// Offending raw model text.
        raw: String,
    },
}

impl ParseError {
    /// The raw model text that failed to parse (for logging only).
    pub fn raw(&self) -> &str {
        match self {
            Self::Malformed { raw, .. }
            | Self::Cardinality { raw, .. }
            | Self::NameMismatch { raw, .. }
            | Self::Invalid { raw, .. } => raw,
        }
    }
}

/// Truncated preview of raw model text, safe for structured logs.
pub fn preview(raw: &str) -> String {
    if raw.chars().count() <= PREVIEW_CHARS {
        return raw.to_owned();
    }
    let head: String = raw.chars().take(PREVIEW_CHARS).collect();
    format!("{head}…")
}

/// Strip fenced-code-block markers the model may add despite
/// instructions, then trim.
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();

    let without_open = match trimmed.strip_prefix("```") {
        // Drop the info string ("json", "JSON", …) up to the newline.
        Some(rest) => match rest.find('\n') {
            Some(newline) => rest.get(newline.saturating_add(1)..).unwrap_or(""),
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        },
        None => trimmed,
    };

    let tail_trimmed = without_open.trim_end();
    tail_trimmed
        .strip_suffix("```")
        .unwrap_or(tail_trimmed)
        .trim()
        .to_owned()
}

/// Parse a persona-generation response into a full panel.
///
/// Missing ids are assigned fresh UUIDs; nothing else is repaired.
///
/// # Errors
///
/// Returns [`ParseError`] on malformed JSON or wrong cardinality.
pub fn parse_personas(raw: &str) -> Result<Vec<Persona>, ParseError> {
    let cleaned = strip_code_fences(raw);
    let mut personas: Vec<Persona> =
        serde_json::from_str(&cleaned).map_err(|e| ParseError::Malformed {
            expected: "persona",
            reason: e.to_string(),
            raw: raw.to_owned(),
        })?;

    if personas.len() != PANEL_SIZE {
        return Err(ParseError::Cardinality {
            expected: "persona",
            want: PANEL_SIZE,
            got: personas.len(),
            raw: raw.to_owned(),
        });
    }

    for persona in &mut personas {
        if persona.id.trim().is_empty() {
            persona.id = Uuid::new_v4().to_string();
        }
    }

    Ok(personas)
}

/// Parse an opinion-simulation response and check it against the panel.
///
/// The opinion array must have the panel's cardinality and its name set
/// must equal the panel's name set exactly: no extras, no omissions, no
/// duplicates.
///
/// # Errors
///
/// Returns [`ParseError`] on malformed JSON, wrong cardinality, or a
/// name-set mismatch.
pub fn parse_opinions(raw: &str, panel: &[Persona]) -> Result<Vec<Opinion>, ParseError> {
    let cleaned = strip_code_fences(raw);
    let opinions: Vec<Opinion> =
        serde_json::from_str(&cleaned).map_err(|e| ParseError::Malformed {
            expected: "opinion",
            reason: e.to_string(),
            raw: raw.to_owned(),
        })?;

    if opinions.len() != panel.len() {
        return Err(ParseError::Cardinality {
            expected: "opinion",
            want: panel.len(),
            got: opinions.len(),
            raw: raw.to_owned(),
        });
    }

    let panel_names: HashSet<&str> = panel.iter().map(|p| p.name.as_str()).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    for opinion in &opinions {
        let name = opinion.name_of_persona.as_str();
        if !panel_names.contains(name) {
            return Err(ParseError::NameMismatch {
                detail: format!("'{name}' is not a panel member"),
                raw: raw.to_owned(),
            });
        }
        if !seen.insert(name) {
            return Err(ParseError::NameMismatch {
                detail: format!("duplicate opinion for '{name}'"),
                raw: raw.to_owned(),
            });
        }
    }
    if seen.len() != panel_names.len() {
        let missing: Vec<&str> = panel_names.difference(&seen).copied().collect();
        return Err(ParseError::NameMismatch {
            detail: format!("no opinion for: {}", missing.join(", ")),
            raw: raw.to_owned(),
        });
    }

    Ok(opinions)
}
