//! Council configuration: persona registry, fallback subset, chairman.
//!
//! Modeled as an explicit value injected at construction so tests can
//! override every field. The built-in registry is the starting point; a TOML
//! overlay and environment overrides layer on top of it in the binary.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::client::DEFAULT_TIMEOUT;
use crate::error::ConfigError;
use crate::persona::Persona;

/// Model used for planning and final synthesis when nothing overrides it.
pub const DEFAULT_CHAIRMAN_MODEL: &str = "google/gemini-3-pro-preview";
/// Fast, cheap model used for conversation title generation.
pub const DEFAULT_TITLE_MODEL: &str = "google/gemini-2.5-flash";

/// Registry entry: a persona definition keyed by its id.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PersonaSpec {
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub style: String,
    pub system_prompt: String,
    pub model: String,
}

impl PersonaSpec {
    /// Bind this registry entry to its id, producing a pipeline persona.
    pub fn to_persona(&self, id: &str) -> Persona {
        Persona {
            id: id.to_string(),
            name: self.name.clone(),
            role: self.role.clone(),
            icon: self.icon.clone(),
            style: self.style.clone(),
            system_prompt: self.system_prompt.clone(),
            model: self.model.clone(),
        }
    }
}

/// Top-level council configuration.
#[derive(Debug, Clone)]
pub struct CouncilConfig {
    /// Persona registry, keyed by persona id.
    pub personas: BTreeMap<String, PersonaSpec>,
    /// Ids of the fallback subset used when dynamic planning fails.
    pub default_personas: Vec<String>,
    /// Model used for persona planning and final synthesis.
    pub chairman_model: String,
    /// Model used for conversation title generation.
    pub title_model: String,
    /// Per-call timeout for stage requests.
    pub request_timeout: Duration,
    /// Per-call timeout for title generation.
    pub title_timeout: Duration,
}

impl Default for CouncilConfig {
    fn default() -> Self {
        Self {
            personas: builtin_personas(),
            default_personas: vec![
                "skeptic".to_string(),
                "visionary".to_string(),
                "pragmatist".to_string(),
            ],
            chairman_model: DEFAULT_CHAIRMAN_MODEL.to_string(),
            title_model: DEFAULT_TITLE_MODEL.to_string(),
            request_timeout: DEFAULT_TIMEOUT,
            title_timeout: Duration::from_secs(30),
        }
    }
}

/// TOML overlay file shape: every field optional, absent fields keep the
/// built-in defaults.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    chairman_model: Option<String>,
    title_model: Option<String>,
    default_personas: Option<Vec<String>>,
    request_timeout_secs: Option<u64>,
    #[serde(default)]
    personas: BTreeMap<String, PersonaSpec>,
}

impl CouncilConfig {
    /// Load the default configuration with a TOML overlay applied.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Apply a TOML overlay to the default configuration.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(raw)?;
        let mut config = Self::default();

        if let Some(chairman) = file.chairman_model {
            config.chairman_model = chairman;
        }
        if let Some(title) = file.title_model {
            config.title_model = title;
        }
        if let Some(defaults) = file.default_personas {
            config.default_personas = defaults;
        }
        if let Some(secs) = file.request_timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        for (id, spec) in file.personas {
            config.personas.insert(id, spec);
        }

        if config.fallback_personas().is_empty() {
            return Err(ConfigError::EmptyDefaults);
        }
        Ok(config)
    }

    /// Apply environment overrides (`COUNCIL_CHAIRMAN_MODEL`,
    /// `COUNCIL_TITLE_MODEL`).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(chairman) = std::env::var("COUNCIL_CHAIRMAN_MODEL") {
            self.chairman_model = chairman;
        }
        if let Ok(title) = std::env::var("COUNCIL_TITLE_MODEL") {
            self.title_model = title;
        }
        self
    }

    /// Resolve the configured fallback subset against the registry.
    /// Ids missing from the registry are skipped.
    pub fn fallback_personas(&self) -> Vec<Persona> {
        self.default_personas
            .iter()
            .filter_map(|id| self.personas.get(id).map(|spec| spec.to_persona(id)))
            .collect()
    }

    /// Distinct model ids across the registry, used to tell the planner
    /// which models it may assign.
    pub fn registry_models(&self) -> Vec<&str> {
        let mut models: Vec<&str> = self.personas.values().map(|s| s.model.as_str()).collect();
        models.sort_unstable();
        models.dedup();
        models
    }
}

fn spec(
    name: &str,
    role: &str,
    icon: &str,
    style: &str,
    model: &str,
    system_prompt: &str,
) -> PersonaSpec {
    PersonaSpec {
        name: name.to_string(),
        role: role.to_string(),
        icon: icon.to_string(),
        style: style.to_string(),
        system_prompt: system_prompt.to_string(),
        model: model.to_string(),
    }
}

/// Built-in persona registry.
fn builtin_personas() -> BTreeMap<String, PersonaSpec> {
    let mut personas = BTreeMap::new();
    personas.insert(
        "skeptic".to_string(),
        spec(
            "The Skeptic",
            "Critical Analyst",
            "🧐",
            "critical, questioning, looking for flaws",
            "anthropic/claude-sonnet-4.5",
            "You are The Skeptic. Your role is to critically analyze every claim. \
             Look for logical fallacies, missing evidence, and potential downsides. \
             Do not just agree; challenge the premise and ask tough questions.",
        ),
    );
    personas.insert(
        "visionary".to_string(),
        spec(
            "The Visionary",
            "Future Thinker",
            "🚀",
            "optimistic, forward-looking, creative",
            "openai/gpt-5.1",
            "You are The Visionary. Your role is to look at the big picture and \
             future possibilities. Focus on innovation, potential impact, and \
             creative solutions. Be optimistic and inspiring.",
        ),
    );
    personas.insert(
        "pragmatist".to_string(),
        spec(
            "The Pragmatist",
            "Practical Implementer",
            "🛠️",
            "practical, realistic, actionable",
            "google/gemini-3-pro-preview",
            "You are The Pragmatist. Your role is to focus on what is actually \
             doable. Prioritize practical steps, feasibility, and real-world \
             constraints. Avoid pie-in-the-sky ideas if they aren't actionable.",
        ),
    );
    personas.insert(
        "historian".to_string(),
        spec(
            "The Historian",
            "Context Provider",
            "📚",
            "contextual, analytical, drawing from history",
            "anthropic/claude-sonnet-4.5",
            "You are The Historian. Your role is to provide context and historical \
             precedents. Analyze the current situation by comparing it to past \
             events and trends. What can we learn from history?",
        ),
    );
    personas.insert(
        "devil_advocate".to_string(),
        spec(
            "Devil's Advocate",
            "Contrarian",
            "😈",
            "contrarian, challenging, alternative",
            "x-ai/grok-4",
            "You are the Devil's Advocate. Your role is to argue the opposite of \
             the common consensus. Even if you agree, find a way to represent the \
             opposing view to ensure a robust debate.",
        ),
    );
    personas
}
