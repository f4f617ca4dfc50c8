//! Pure shape and range validation over client-supplied input.
//!
//! Validation runs before sanitization and before any model call; a
//! failure carries every violated constraint so the client sees them all
//! at once.

use crate::panel::{Persona, AGE_MAX, INCOME_LEVEL_MAX, INCOME_LEVEL_MIN, PANEL_SIZE};

/// A failed validation, carrying the violated constraints.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", .violations.join("; "))]
pub struct ValidationError {
    /// Human-readable description of each violated constraint.
    pub violations: Vec<String>,
}

impl ValidationError {
    /// Build an error from a non-empty violation list.
    pub fn new(violations: Vec<String>) -> Self {
        Self { violations }
    }
}

/// Check that a topic is present and non-empty.
pub fn validate_topic(topic: &str) -> Result<(), ValidationError> {
    if topic.trim().is_empty() {
        return Err(ValidationError::new(vec![
            "topic must be a non-empty string".to_owned(),
        ]));
    }
    Ok(())
}

/// Check a client-supplied panel: exact cardinality plus per-persona
/// field constraints.
pub fn validate_panel(personas: &[Persona]) -> Result<(), ValidationError> {
    let mut violations = Vec::new();

    if personas.len() != PANEL_SIZE {
        violations.push(format!(
            "a panel must contain exactly {PANEL_SIZE} personas, got {}",
            personas.len()
        ));
    }

    for (index, persona) in personas.iter().enumerate() {
        for violation in persona_violations(persona) {
            violations.push(format!("persona {}: {violation}", index.saturating_add(1)));
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(violations))
    }
}

/// Constraint violations for a single persona.
///
/// Shared between client-input validation and the post-parse invariant
/// check on model output (where violations are a parse failure instead).
pub fn persona_violations(persona: &Persona) -> Vec<String> {
    let mut violations = Vec::new();

    let required = [
        ("name", &persona.name),
        ("gender", &persona.gender),
        ("location", &persona.location),
        ("education", &persona.education),
        ("maritalStatus", &persona.marital_status),
        ("occupation", &persona.occupation),
        ("ethnicGroup", &persona.ethnic_group),
        ("religion", &persona.religion),
        ("description", &persona.description),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            violations.push(format!("{field} must be a non-empty string"));
        }
    }

    if persona.age > AGE_MAX {
        violations.push(format!("age must be between 0 and {AGE_MAX}"));
    }
    if persona.income_level < INCOME_LEVEL_MIN || persona.income_level > INCOME_LEVEL_MAX {
        violations.push(format!(
            "incomeLevel must be between {INCOME_LEVEL_MIN} and {INCOME_LEVEL_MAX}"
        ));
    }

    violations
}

/// Check a persona-chat request: the persona name and the visitor
/// message must both be present.
pub fn validate_chat(persona_name: &str, user_message: &str) -> Result<(), ValidationError> {
    let mut violations = Vec::new();
    if persona_name.trim().is_empty() {
        violations.push("personaName must be a non-empty string".to_owned());
    }
    if user_message.trim().is_empty() {
        violations.push("userMessage must be a non-empty string".to_owned());
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(violations))
    }
}
