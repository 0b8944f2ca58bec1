//! The three pipeline stages.
//!
//! ```text
//! Stage 1: query ──┬─> persona 1 ──┐
//!                  ├─> persona 2 ──┤  join-all, failures omitted
//!                  └─> persona N ──┘
//!                        │
//! Stage 2: labeled transcript ──> same personas rank blind ──> parsed orders
//!                        │
//! Stage 3: chairman synthesizes the final answer from everything above
//! ```
//!
//! Every stage call is an isolated conversation; nothing is shared between
//! concurrent calls, and no failure cancels a sibling.

pub mod stage1;
pub mod stage2;
pub mod stage3;

pub use stage1::{collect_responses, Stage1Result};
pub use stage2::{collect_rankings, Stage2Result};
pub use stage3::{synthesize_final, SynthesisResult, CHAIRMAN_NAME};
