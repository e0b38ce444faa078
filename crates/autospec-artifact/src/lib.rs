//! Typed YAML artifact definitions, validation, and atomic I/O for the
//! autospec workflow (`constitution.yaml`, `spec.yaml`, `plan.yaml`,
//! `tasks.yaml`, `checklist.yaml`, `analysis.yaml`).
//!
//! Every artifact shares a required `_meta` block (schema version,
//! generator identity, creation time, declared kind) and a typed body.
//! [`store::ArtifactStore`] is the only supported way to read or write
//! an artifact: it enforces the two-pass validation contract (syntax,
//! then schema) and writes atomically via temp-file-then-rename.

pub mod analysis_artifact;
pub mod body;
pub mod checklist_artifact;
pub mod constitution;
pub mod error;
pub mod ids;
pub mod meta;
pub mod plan_artifact;
pub mod spec_artifact;
pub mod store;
pub mod task;

pub use analysis_artifact::{AnalysisArtifact, Finding, Severity};
pub use body::ArtifactBody;
pub use checklist_artifact::{ChecklistArtifact, ChecklistItem};
pub use constitution::{ConstitutionArtifact, Principle};
pub use error::{ArtifactError, Result, ValidationError};
pub use ids::{is_ears_id, is_spec_dir_name, is_task_id, is_user_story_id};
pub use meta::{ArtifactMeta, ArtifactType, CURRENT_SCHEMA_VERSION};
pub use plan_artifact::{ImplementationPhase, PlanArtifact};
pub use spec_artifact::{Requirement, SpecArtifact, UserStory};
pub use store::{AppliedFix, ArtifactDocument, ArtifactStore, AutoFixReport};
pub use task::{Phase, Task, TaskStatus, TaskType, TasksArtifact};
