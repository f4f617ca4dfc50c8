//! Prompt templates for the model-call stages.
//!
//! Templates are data: fixed constants with explicit placeholder
//! substitution, so a prompt change is auditable and testable without
//! touching orchestration code. The model's raw text is the only channel
//! back, so every structured stage ends with an explicit schema block and
//! a JSON-only instruction, the central reliability lever of the whole
//! pipeline.

use crate::panel::{Persona, AGE_MAX, INCOME_LEVEL_MAX, INCOME_LEVEL_MIN, PANEL_SIZE};

/// Revision of the template set, logged with every model call so prompt
/// changes stay auditable across log history.
pub const TEMPLATE_REVISION: u32 = 2;

/// A model-call stage, used for routing and structured logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Invent a persona panel for a topic.
    GeneratePersonas,
    /// Simulate each panel member's opinion on a topic.
    SimulateOpinions,
    /// Free-form chat with a single persona.
    PersonaChat,
}

impl Stage {
    /// Stable name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GeneratePersonas => "generate-personas",
            Self::SimulateOpinions => "simulate-opinions",
            Self::PersonaChat => "persona-chat",
        }
    }
}

/// A two-message chat payload ready for the model gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPrompt {
    /// System message setting the model's role.
    pub system: String,
    /// User message carrying instructions, data, and the schema block.
    pub user: String,
}

const GENERATE_SYSTEM: &str = "You are a demographic research assistant. You invent \
realistic, varied survey personas for opinion research.";

const SIMULATE_SYSTEM: &str = "You are an opinion simulator. Given a topic and a panel \
of personas, you write each persona's personal opinion in their own voice.";

const JSON_ONLY: &str = "Respond with ONLY that JSON array. No surrounding prose, no \
markdown, no code fences.";

/// Build the persona-generation prompt for a sanitized topic.
pub fn generate_personas_prompt(topic: &str) -> ChatPrompt {
    let user = format!(
        "Invent exactly {PANEL_SIZE} personas who could plausibly be surveyed about the \
         topic below.\n\
         Topic: {topic}\n\n\
         Diversity requirement: the {PANEL_SIZE} profiles must differ markedly in how \
         they relate to the topic: one close to the mainstream position on it, one at \
         a moderate distance from it, and one entirely external to the debate.\n\n\
         Each persona is a JSON object with exactly these fields:\n\
         - \"name\": string\n\
         - \"age\": integer, 0-{AGE_MAX}\n\
         - \"gender\": string\n\
         - \"location\": string\n\
         - \"education\": string\n\
         - \"maritalStatus\": string\n\
         - \"occupation\": string\n\
         - \"incomeLevel\": integer income bracket, {INCOME_LEVEL_MIN}-{INCOME_LEVEL_MAX}\n\
         - \"ethnicGroup\": string\n\
         - \"religion\": string\n\
         - \"description\": one-paragraph background narrative, string\n\n\
         Expected output: a JSON array of exactly {PANEL_SIZE} such objects. {JSON_ONLY}"
    );
    ChatPrompt {
        system: GENERATE_SYSTEM.to_owned(),
        user,
    }
}

/// Build the opinion-simulation prompt for a sanitized topic and panel.
pub fn simulate_opinions_prompt(topic: &str, personas: &[Persona]) -> ChatPrompt {
    let mut user = format!(
        "Simulate the personal opinion of each panel member below on this topic.\n\
         Topic: {topic}\n\nPanel:\n"
    );
    for persona in personas {
        user.push_str(&persona_block(persona));
    }
    user.push_str(&format!(
        "\nWrite each persona's opinion in their own voice, consistent with their \
         profile. Expected output: a JSON array with exactly one object per panel \
         member listed above, each shaped as \
         {{\"nameOfPersona\": \"<name copied verbatim>\", \"opinion\": \"<their opinion>\"}}. \
         {JSON_ONLY}"
    ));
    ChatPrompt {
        system: SIMULATE_SYSTEM.to_owned(),
        user,
    }
}

/// Build the free-form chat prompt for a single persona.
pub fn persona_chat_prompt(persona_name: &str, user_message: &str) -> ChatPrompt {
    ChatPrompt {
        system: format!(
            "You are {persona_name}, one of the simulated survey panelists. Stay in \
             character, answer in the first person, and keep replies short and \
             conversational."
        ),
        user: user_message.to_owned(),
    }
}

fn persona_block(persona: &Persona) -> String {
    format!(
        "{name}:\n\
         - age {age}, {gender}, lives in {location}\n\
         - education: {education}; marital status: {marital}; occupation: {occupation}\n\
         - income level {income}/{income_max}; ethnic group: {ethnic}; religion: {religion}\n\
         - background: {description}\n",
        name = persona.name,
        age = persona.age,
        gender = persona.gender,
        location = persona.location,
        education = persona.education,
        marital = persona.marital_status,
        occupation = persona.occupation,
        income = persona.income_level,
        income_max = INCOME_LEVEL_MAX,
        ethnic = persona.ethnic_group,
        religion = persona.religion,
        description = persona.description,
    )
}
