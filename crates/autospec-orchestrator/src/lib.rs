//! The stage orchestrator and phase/task implement engine (spec.md
//! §4.4–§4.6): resolving which spec a command targets, driving the
//! canonical `constitution -> specify -> clarify -> plan -> tasks ->
//! checklist -> analyze -> implement` order through validate-retry-advance
//! semantics, and subdividing `implement` into phases or tasks.

pub mod error;
pub mod lock;
pub mod phase_engine;
pub mod pipeline;
pub mod prompt;
pub mod spec_ref;
pub mod stage_machine;

pub use error::{OrchestratorError, Result};
pub use phase_engine::{ImplementOutcome, PhaseEngine};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use prompt::{build_prompt, PromptContext, RetryContext};
pub use spec_ref::SpecRef;
pub use stage_machine::{StageOrchestrator, StageOutcome, StageState};
