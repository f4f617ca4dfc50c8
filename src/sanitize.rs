//! Markup and control-character stripping for free-text fields.
//!
//! Every free-text value that will be interpolated into a prompt, used as
//! a cache key, or echoed back to a client passes through here first.
//! Sanitization is total and deterministic: malformed markup is removed
//! where it can be recognized and passed through otherwise, never
//! rejected.

use regex::Regex;

use crate::panel::Persona;

/// Strips markup elements, tags, and control characters from text.
///
/// Script and style elements are removed together with their content;
/// all remaining tags lose only the tag itself.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    element_patterns: Vec<Regex>,
    tag_patterns: Vec<Regex>,
}

impl Sanitizer {
    /// Create a sanitizer with the default pattern set.
    pub fn new() -> Self {
        // Elements whose *content* must go too; a stripped <script> tag
        // leaving its body behind would still reach the prompt.
        let element_patterns = [
            r"(?is)<script\b[^>]*>.*?</script\s*>",
            r"(?is)<style\b[^>]*>.*?</style\s*>",
        ];
        // Any remaining tag, opening or closing, with attributes.
        let tag_patterns = [r"(?s)<[^>]*>"];

        Self {
            element_patterns: compile(&element_patterns),
            tag_patterns: compile(&tag_patterns),
        }
    }

    /// Strip markup and control characters, then trim.
    pub fn sanitize(&self, text: &str) -> String {
        let mut cleaned = text.to_owned();
        for pattern in &self.element_patterns {
            cleaned = pattern.replace_all(&cleaned, "").into_owned();
        }
        for pattern in &self.tag_patterns {
            cleaned = pattern.replace_all(&cleaned, "").into_owned();
        }
        cleaned
            .chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
            .collect::<String>()
            .trim()
            .to_owned()
    }

    /// Sanitize every free-text field of a persona in place.
    ///
    /// Numeric fields and the opaque id pass through unchanged.
    pub fn sanitize_persona(&self, persona: &mut Persona) {
        for field in persona.text_fields_mut() {
            *field = self.sanitize(field);
        }
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
}
