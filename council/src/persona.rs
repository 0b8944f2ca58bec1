//! Persona schema shared by configured and dynamically planned personas.
//!
//! Both origins flow through the same validated type; nothing enters the
//! pipeline without passing [`Persona::validate`].

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Hard ceiling on council size, fixed by the single-letter anonymization
/// scheme used for peer ranking.
pub const MAX_COUNCIL_SIZE: usize = 26;

/// A role definition bound to one underlying model, used for a single turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Persona {
    /// Short unique identifier, e.g. `legal_expert`.
    pub id: String,
    /// Display name, e.g. `Legal Expert`.
    pub name: String,
    /// Short role description.
    #[serde(default)]
    pub role: String,
    /// Single emoji representing the persona.
    #[serde(default)]
    pub icon: String,
    /// Tone/style description.
    #[serde(default)]
    pub style: String,
    /// System prompt instructing the model how to behave as this persona.
    pub system_prompt: String,
    /// Model id the persona is bound to.
    pub model: String,
}

impl Persona {
    /// Check the fields the pipeline cannot operate without.
    pub fn validate(&self) -> Result<(), String> {
        fn required(field: &str, value: &str) -> Result<(), String> {
            if value.trim().is_empty() {
                Err(format!("missing required field `{field}`"))
            } else {
                Ok(())
            }
        }

        required("id", &self.id)?;
        required("name", &self.name)?;
        required("system_prompt", &self.system_prompt)?;
        required("model", &self.model)?;
        Ok(())
    }
}

/// Filter a candidate list down to valid personas, capped at
/// [`MAX_COUNCIL_SIZE`]. Invalid entries are dropped with a warning.
pub fn sanitize_personas(candidates: Vec<Persona>) -> Vec<Persona> {
    let mut valid = Vec::new();
    for persona in candidates {
        if valid.len() == MAX_COUNCIL_SIZE {
            warn!("persona list exceeds {MAX_COUNCIL_SIZE} entries, capping");
            break;
        }
        match persona.validate() {
            Ok(()) => valid.push(persona),
            Err(reason) => {
                warn!(persona = %persona.id, reason = %reason, "dropping invalid persona");
            }
        }
    }
    valid
}
