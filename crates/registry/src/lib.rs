//! Config-time components of the orchestration kernel: the agent registry
//! (§4.B), the condition evaluator (§4.C), and the template renderer
//! (§4.D). Everything here is pure/read-only at turn time — the only
//! mutation is `AgentRegistry::reload`, which atomically swaps an
//! immutable snapshot.

pub mod condition;
pub mod loader;
pub mod path;
pub mod registry;
pub mod template;

pub use registry::{AgentRegistry, ToolRoute};
