//! Maps the closed [`FailureKind`] taxonomy to the exit-code table
//! (spec.md §6): the CLI boundary is the only place that turns a
//! category into a process exit status.

use autospec_dag::DagError;
use autospec_orchestrator::OrchestratorError;
use autospec_retry::FailureKind;

pub const SUCCESS: i32 = 0;
pub const VALIDATION_FAILED: i32 = 1;
pub const RETRY_EXHAUSTED: i32 = 2;
pub const INVALID_ARGUMENTS: i32 = 3;
pub const MISSING_DEPENDENCY: i32 = 4;
pub const TIMEOUT: i32 = 5;

pub fn for_failure_kind(kind: FailureKind) -> i32 {
    match kind {
        FailureKind::Preflight => INVALID_ARGUMENTS,
        FailureKind::Validation => VALIDATION_FAILED,
        FailureKind::Agent => MISSING_DEPENDENCY,
        FailureKind::CommitVerification => VALIDATION_FAILED,
        FailureKind::State => RETRY_EXHAUSTED,
        FailureKind::Cancelled => TIMEOUT,
    }
}

/// `RetryExhausted` is not itself a [`FailureKind`] member (it rides on
/// top of `Agent`/`Validation`), so it has to be special-cased ahead of
/// the generic mapping to reach exit code 2 instead of its underlying
/// kind's code.
pub fn for_orchestrator_error(err: &OrchestratorError) -> i32 {
    if err.is_retry_exhausted() {
        RETRY_EXHAUSTED
    } else {
        for_failure_kind(err.failure_kind())
    }
}

pub fn for_dag_error(err: &DagError) -> i32 {
    if err.is_retry_exhausted() {
        RETRY_EXHAUSTED
    } else {
        for_failure_kind(err.failure_kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_failure_kind_maps_to_a_nonzero_code() {
        for kind in [
            FailureKind::Preflight,
            FailureKind::Validation,
            FailureKind::Agent,
            FailureKind::CommitVerification,
            FailureKind::State,
            FailureKind::Cancelled,
        ] {
            assert_ne!(for_failure_kind(kind), SUCCESS);
        }
    }

    #[test]
    fn retry_exhausted_maps_to_exit_code_2() {
        let err = OrchestratorError::RetryExhausted {
            stage: "specify".to_string(),
            attempts: 4,
        };
        assert_eq!(for_orchestrator_error(&err), RETRY_EXHAUSTED);
    }

    #[test]
    fn non_retry_exhausted_orchestrator_errors_use_the_generic_mapping() {
        let err = OrchestratorError::SpecNotResolved("no spec given".to_string());
        assert_eq!(for_orchestrator_error(&err), INVALID_ARGUMENTS);
    }
}
