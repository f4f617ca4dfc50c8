//! Panel domain types: demographic personas and their simulated opinions.

use serde::{Deserialize, Serialize};

/// Number of personas in every opinion panel.
pub const PANEL_SIZE: usize = 3;

/// Upper bound for [`Persona::age`].
pub const AGE_MAX: u32 = 120;

/// Lower bound for [`Persona::income_level`].
pub const INCOME_LEVEL_MIN: u32 = 1;

/// Upper bound for [`Persona::income_level`].
pub const INCOME_LEVEL_MAX: u32 = 10;

/// One simulated demographic individual.
///
/// Wire representation is camelCase to match the JSON contract of the
/// HTTP API. String fields are sanitized before they reach a prompt, the
/// cache, or a response; after sanitization every string field must be
/// non-empty and the numeric fields must sit inside their bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    /// Opaque identifier, unique per persona instance.
    ///
    /// Assigned at parse/confirmation time when the model or the client
    /// omits it; clients echo it back when editing a panel.
    #[serde(default)]
    pub id: String,
    /// Display name, also the join key for [`Opinion::name_of_persona`].
    pub name: String,
    /// Age in years, 0–120.
    pub age: u32,
    /// Self-described gender.
    pub gender: String,
    /// Where the persona lives.
    pub location: String,
    /// Highest education attained.
    pub education: String,
    /// Marital status.
    pub marital_status: String,
    /// Current occupation.
    pub occupation: String,
    /// Ordinal income bracket, 1–10.
    pub income_level: u32,
    /// Ethnic group.
    pub ethnic_group: String,
    /// Religion (may be "None").
    pub religion: String,
    /// One-paragraph background narrative.
    pub description: String,
}

impl Persona {
    /// Mutable references to every free-text field, for sanitization.
    pub fn text_fields_mut(&mut self) -> [&mut String; 9] {
        [
            &mut self.name,
            &mut self.gender,
            &mut self.location,
            &mut self.education,
            &mut self.marital_status,
            &mut self.occupation,
            &mut self.ethnic_group,
            &mut self.religion,
            &mut self.description,
        ]
    }
}

/// One persona's stance on a topic.
///
/// Immutable once parsed; the name must match a panel member exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opinion {
    /// Name of the panel member holding this opinion.
    pub name_of_persona: String,
    /// The opinion text, in the persona's own voice.
    pub opinion: String,
}

/// The built-in panel used by persona-less simulation requests.
///
/// A fixed trio so that `/api/simulate` without an explicit panel stays
/// deterministic apart from the model call itself.
pub fn default_panel() -> Vec<Persona> {
    vec![
        Persona {
            id: "builtin-alice".to_owned(),
            name: "Alice".to_owned(),
            age: 35,
            gender: "Female".to_owned(),
            location: "California".to_owned(),
            education: "Master's degree in education".to_owned(),
            marital_status: "Married".to_owned(),
            occupation: "Schoolteacher".to_owned(),
            income_level: 6,
            ethnic_group: "White".to_owned(),
            religion: "Protestant".to_owned(),
            description: "A public-school teacher who follows local politics closely \
                          and votes in every election."
                .to_owned(),
        },
        Persona {
            id: "builtin-john".to_owned(),
            name: "John".to_owned(),
            age: 45,
            gender: "Male".to_owned(),
            location: "Texas".to_owned(),
            education: "Bachelor's degree".to_owned(),
            marital_status: "Single".to_owned(),
            occupation: "Software engineer".to_owned(),
            income_level: 8,
            ethnic_group: "White".to_owned(),
            religion: "None".to_owned(),
            description: "A pragmatic engineer who distrusts sweeping claims and wants \
                          to see the numbers before forming a view."
                .to_owned(),
        },
        Persona {
            id: "builtin-alex".to_owned(),
            name: "Alex".to_owned(),
            age: 28,
            gender: "Non-binary".to_owned(),
            location: "New York".to_owned(),
            education: "PhD in sociology".to_owned(),
            marital_status: "Living with a partner".to_owned(),
            occupation: "Researcher".to_owned(),
            income_level: 7,
            ethnic_group: "Hispanic".to_owned(),
            religion: "Agnostic".to_owned(),
            description: "An academic who treats every public debate as a case study \
                          and rarely takes the mainstream framing at face value."
                .to_owned(),
        },
    ]
}
