//! Token-budgeted prompt assembly (§4.E): turns an agent, a user's
//! context, flow state and recent conversation history into the exact
//! request package the LLM client sends upstream.

pub mod builder;
pub mod messages;
pub mod sections;
pub mod tokens;
pub mod tools;

pub use builder::{AssembleInput, AssembledContext, ContextAssembler};
