//! `tasks.yaml` domain types: tasks, phases, status transitions.
//!
//! Modeled after the dependency-graph shape of `TaskDag` in the teacher
//! repo's `cortex-agents::task::dag` module, adapted to spec.md §3's task
//! entity: string `T\d+` identifiers, a closed `{Pending, InProgress,
//! Completed, Blocked}` status set, and phase-grouping rather than a flat
//! graph.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::ids::is_task_id;

/// Status of a task. Transitions allowed: `Pending -> InProgress ->
/// Completed`, `Pending -> Blocked` (reason required). `Completed` is
/// terminal within a phase-run but may be re-opened by explicit user
/// action (modeled as a direct field write, not a method on this type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Blocked,
}

impl TaskStatus {
    /// Whether `self -> next` is one of the allowed transitions.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress) | (InProgress, Completed) | (Pending, Blocked)
                | (InProgress, Blocked)
        )
    }

    pub fn is_terminal_for_phase(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Blocked)
    }
}

/// Kind of work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Setup,
    Implementation,
    Test,
    Documentation,
    Refactor,
}

/// A single task within `tasks.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub blocked_reason: Option<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub parallel: bool,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>, task_type: TaskType) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status: TaskStatus::Pending,
            task_type,
            dependencies: Vec::new(),
            blocked_reason: None,
            acceptance_criteria: Vec::new(),
            parallel: false,
        }
    }
}

/// An ordered grouping of tasks within `tasks.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub number: u32,
    pub name: String,
    pub tasks: Vec<Task>,
}

impl Phase {
    /// A phase is complete iff every contained task is Completed or Blocked.
    pub fn is_complete(&self) -> bool {
        self.tasks.iter().all(|t| t.status.is_terminal_for_phase())
    }

    /// A phase is actionable iff at least one task is Pending or InProgress.
    pub fn is_actionable(&self) -> bool {
        self.tasks
            .iter()
            .any(|t| matches!(t.status, TaskStatus::Pending | TaskStatus::InProgress))
    }

    /// Tasks that are not yet Completed, for roster injection into a phase prompt.
    pub fn actionable_tasks(&self) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| !matches!(t.status, TaskStatus::Completed))
            .collect()
    }
}

/// The `tasks.yaml` document body (the `_meta` wrapper lives in the store).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksArtifact {
    pub summary: String,
    pub phases: Vec<Phase>,
}

impl TasksArtifact {
    /// Flat iterator over every task across every phase, in phase order.
    pub fn all_tasks(&self) -> impl Iterator<Item = &Task> {
        self.phases.iter().flat_map(|p| p.tasks.iter())
    }

    pub fn find_task(&self, id: &str) -> Option<&Task> {
        self.all_tasks().find(|t| t.id == id)
    }

    pub fn find_phase(&self, number: u32) -> Option<&Phase> {
        self.phases.iter().find(|p| p.number == number)
    }

    /// Validate the schema-level invariants named in spec.md §3:
    /// ID format, duplicate-ID detection, referential integrity of
    /// `dependencies`, acyclicity, and `blocked_reason` required when
    /// `status == Blocked`. Collects every violation rather than
    /// failing fast.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut seen_ids: HashSet<&str> = HashSet::new();
        let mut all_ids: HashSet<&str> = HashSet::new();

        for phase in &self.phases {
            for task in &phase.tasks {
                all_ids.insert(task.id.as_str());
            }
        }

        for (phase_idx, phase) in self.phases.iter().enumerate() {
            for (task_idx, task) in phase.tasks.iter().enumerate() {
                let path = format!("phases[{}].tasks[{}]", phase_idx, task_idx);

                if !is_task_id(&task.id) {
                    errors.push(ValidationError::new(
                        format!("{}.id", path),
                        format!("'{}' does not match the required T\\d+ format", task.id),
                    ));
                }

                if !seen_ids.insert(task.id.as_str()) {
                    errors.push(ValidationError::new(
                        format!("{}.id", path),
                        format!("duplicate task id '{}'", task.id),
                    ));
                }

                for dep in &task.dependencies {
                    if !all_ids.contains(dep.as_str()) {
                        errors.push(ValidationError::new(
                            format!("{}.dependencies", path),
                            format!("dependency '{}' does not name an existing task", dep),
                        ));
                    }
                    if dep == &task.id {
                        errors.push(ValidationError::new(
                            format!("{}.dependencies", path),
                            format!("task '{}' lists itself as a dependency", task.id),
                        ));
                    }
                }

                if task.status == TaskStatus::Blocked && task.blocked_reason.is_none() {
                    errors.push(ValidationError::new(
                        format!("{}.blocked_reason", path),
                        "blocked_reason is required when status is blocked".to_string(),
                    ));
                }
            }
        }

        if let Some(cycle) = self.find_cycle() {
            errors.push(ValidationError::new(
                "phases[*].tasks[*].dependencies",
                format!("dependency graph contains a cycle: {}", cycle.join(" -> ")),
            ));
        }

        errors
    }

    /// Detect a cycle in the dependency graph via Kahn's algorithm;
    /// returns the ids involved in the first residual cycle found, if any.
    fn find_cycle(&self) -> Option<Vec<String>> {
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut in_degree: HashMap<&str, usize> = HashMap::new();

        for task in self.all_tasks() {
            in_degree.entry(task.id.as_str()).or_insert(0);
            for dep in &task.dependencies {
                // edge dep -> task (dep must run first)
                adjacency.entry(dep.as_str()).or_default().push(task.id.as_str());
                *in_degree.entry(task.id.as_str()).or_insert(0) += 1;
                in_degree.entry(dep.as_str()).or_insert(0);
            }
        }

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&id, _)| id)
            .collect();
        let mut visited = 0usize;

        while let Some(id) = queue.pop_front() {
            visited += 1;
            if let Some(dependents) = adjacency.get(id) {
                for &dep in dependents {
                    let degree = in_degree.get_mut(dep).unwrap();
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dep);
                    }
                }
            }
        }

        if visited == in_degree.len() {
            None
        } else {
            let residual: Vec<String> = in_degree
                .into_iter()
                .filter(|(_, deg)| *deg > 0)
                .map(|(id, _)| id.to_string())
                .collect();
            Some(residual)
        }
    }

    /// Count tasks within `phase` that are not yet Completed.
    pub fn actionable_count(&self, phase_number: u32) -> usize {
        self.find_phase(phase_number)
            .map(|p| p.actionable_tasks().len())
            .unwrap_or(0)
    }

    /// Every dependency of `task_id` (possibly in an earlier phase) has status Completed.
    pub fn dependencies_satisfied(&self, task_id: &str) -> bool {
        let Some(task) = self.find_task(task_id) else {
            return false;
        };
        task.dependencies.iter().all(|dep| {
            self.find_task(dep)
                .map(|t| t.status == TaskStatus::Completed)
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, deps: &[&str]) -> Task {
        let mut t = Task::new(id, format!("Task {id}"), TaskType::Implementation);
        t.dependencies = deps.iter().map(|s| s.to_string()).collect();
        t
    }

    #[test]
    fn phase_complete_iff_all_terminal() {
        let mut phase = Phase {
            number: 1,
            name: "P1".into(),
            tasks: vec![task("T1", &[]), task("T2", &[])],
        };
        assert!(!phase.is_complete());
        phase.tasks[0].status = TaskStatus::Completed;
        phase.tasks[1].status = TaskStatus::Blocked;
        phase.tasks[1].blocked_reason = Some("waiting on design review".into());
        assert!(phase.is_complete());
    }

    #[test]
    fn phase_actionable_iff_pending_or_in_progress() {
        let phase = Phase {
            number: 1,
            name: "P1".into(),
            tasks: vec![task("T1", &[])],
        };
        assert!(phase.is_actionable());
    }

    #[test]
    fn validate_rejects_missing_dependency() {
        let artifact = TasksArtifact {
            summary: "s".into(),
            phases: vec![Phase {
                number: 1,
                name: "P1".into(),
                tasks: vec![task("T1", &["T99"])],
            }],
        };
        let errors = artifact.validate();
        assert!(errors.iter().any(|e| e.message.contains("does not name an existing task")));
    }

    #[test]
    fn validate_rejects_self_dependency() {
        let artifact = TasksArtifact {
            summary: "s".into(),
            phases: vec![Phase {
                number: 1,
                name: "P1".into(),
                tasks: vec![task("T1", &["T1"])],
            }],
        };
        let errors = artifact.validate();
        assert!(errors.iter().any(|e| e.message.contains("lists itself")));
    }

    #[test]
    fn validate_detects_cycle() {
        let artifact = TasksArtifact {
            summary: "s".into(),
            phases: vec![Phase {
                number: 1,
                name: "P1".into(),
                tasks: vec![task("T1", &["T2"]), task("T2", &["T1"])],
            }],
        };
        let errors = artifact.validate();
        assert!(errors.iter().any(|e| e.message.contains("cycle")));
    }

    #[test]
    fn validate_requires_blocked_reason() {
        let mut t = task("T1", &[]);
        t.status = TaskStatus::Blocked;
        let artifact = TasksArtifact {
            summary: "s".into(),
            phases: vec![Phase {
                number: 1,
                name: "P1".into(),
                tasks: vec![t],
            }],
        };
        let errors = artifact.validate();
        assert!(errors.iter().any(|e| e.path.ends_with("blocked_reason")));
    }

    #[test]
    fn dependencies_satisfied_checks_status() {
        let mut t1 = task("T1", &[]);
        t1.status = TaskStatus::Completed;
        let t2 = task("T2", &["T1"]);
        let artifact = TasksArtifact {
            summary: "s".into(),
            phases: vec![Phase {
                number: 1,
                name: "P1".into(),
                tasks: vec![t1, t2],
            }],
        };
        assert!(artifact.dependencies_satisfied("T2"));
    }

    #[test]
    fn zero_dependency_task_always_startable() {
        let t = task("T1", &[]);
        let artifact = TasksArtifact {
            summary: "s".into(),
            phases: vec![Phase {
                number: 1,
                name: "P1".into(),
                tasks: vec![t],
            }],
        };
        assert!(artifact.dependencies_satisfied("T1"));
    }
}
