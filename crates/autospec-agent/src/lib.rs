//! Runs the external AI coding agent as a subprocess: template
//! rendering, environment/cwd setup, timeout and cancellation
//! enforcement, and ANSI-stripped tail capture for retry context.

pub mod error;
pub mod invoker;
pub mod tail;
pub mod template;

pub use error::{AgentError, Result};
pub use invoker::{
    AgentInvocation, AgentInvoker, AgentOutcome, StopReason, CANCEL_GRACE_PERIOD, DEFAULT_TAIL_CAPACITY,
};
pub use tail::{strip_ansi_codes, TailBuffer};
pub use template::{render_agent_command, TemplateVars};
