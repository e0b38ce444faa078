//! Multi-spec DAG workflow scheduling and execution (spec.md §4.7–§4.10):
//! parsing a workflow file, laying it out into dependency-respecting
//! layers, and driving those layers through isolated Git worktrees with
//! commit-verified, resumable, single-writer-persisted run state.

pub mod commit_recovery;
pub mod error;
pub mod executor;
pub mod log_store;
pub mod merge;
pub mod run_state;
pub mod scheduler;
pub mod workflow;

pub use error::{DagError, Result};
pub use executor::{DagExecutor, DagRunOptions, DagRunOutcome};
pub use merge::{merge_to_base, MergeOptions, MergeOutcome};
pub use run_state::{CommitStatus, DagRunState, RunStateHandle, SpecRunState, SpecStatus};
pub use scheduler::build_schedule;
pub use workflow::{resolve_dag_id, DagFile, DagMeta, ExecutionSection, FeatureInput, LayerInput};
