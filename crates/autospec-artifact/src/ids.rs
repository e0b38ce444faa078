//! ID formats shared across artifact types.
//!
//! spec.md §4.1 names three closed ID grammars checked during schema
//! validation: `T\d+` for tasks, `US-\d+` for user stories, `EARS-\d+` for
//! EARS-style requirements.

use once_cell::sync::Lazy;
use regex::Regex;

static TASK_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^T\d+$").unwrap());
static USER_STORY_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^US-\d+$").unwrap());
static EARS_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^EARS-\d+$").unwrap());
static SPEC_DIR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{3}-.+$").unwrap());

pub fn is_task_id(s: &str) -> bool {
    TASK_ID_RE.is_match(s)
}

pub fn is_user_story_id(s: &str) -> bool {
    USER_STORY_ID_RE.is_match(s)
}

pub fn is_ears_id(s: &str) -> bool {
    EARS_ID_RE.is_match(s)
}

pub fn is_spec_dir_name(s: &str) -> bool {
    SPEC_DIR_RE.is_match(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_ids() {
        assert!(is_task_id("T1"));
        assert!(is_task_id("T042"));
        assert!(!is_task_id("task-1"));
        assert!(!is_task_id("T"));
    }

    #[test]
    fn user_story_ids() {
        assert!(is_user_story_id("US-001"));
        assert!(!is_user_story_id("US001"));
    }

    #[test]
    fn spec_dir_names() {
        assert!(is_spec_dir_name("001-add-caching-layer"));
        assert!(!is_spec_dir_name("add-caching-layer"));
        assert!(!is_spec_dir_name("01-too-short"));
    }
}
