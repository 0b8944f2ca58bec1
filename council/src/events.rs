//! Turn event stream for incremental consumers.
//!
//! Events are emitted in a strict order per turn. `error` is terminal:
//! nothing follows it. `title_complete` appears only on a conversation's
//! first turn, between `stage3_complete` and `complete`.

use serde::{Deserialize, Serialize};

use crate::orchestrator::TurnMetadata;
use crate::persona::Persona;
use crate::stages::{Stage1Result, Stage2Result, SynthesisResult};

/// Incremental events for one council turn, in emission order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CouncilEvent {
    PersonasStart,
    PersonasComplete { personas: Vec<Persona> },
    Stage1Start,
    Stage1Complete { results: Vec<Stage1Result> },
    Stage2Start,
    Stage2Complete {
        results: Vec<Stage2Result>,
        metadata: TurnMetadata,
    },
    Stage3Start,
    Stage3Complete { result: SynthesisResult },
    TitleComplete { title: String },
    Complete,
    Error { message: String },
}

impl CouncilEvent {
    /// The event type tag, as serialized.
    pub fn event_type(&self) -> &'static str {
        match self {
            CouncilEvent::PersonasStart => "personas_start",
            CouncilEvent::PersonasComplete { .. } => "personas_complete",
            CouncilEvent::Stage1Start => "stage1_start",
            CouncilEvent::Stage1Complete { .. } => "stage1_complete",
            CouncilEvent::Stage2Start => "stage2_start",
            CouncilEvent::Stage2Complete { .. } => "stage2_complete",
            CouncilEvent::Stage3Start => "stage3_start",
            CouncilEvent::Stage3Complete { .. } => "stage3_complete",
            CouncilEvent::TitleComplete { .. } => "title_complete",
            CouncilEvent::Complete => "complete",
            CouncilEvent::Error { .. } => "error",
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CouncilEvent::Complete | CouncilEvent::Error { .. })
    }
}
