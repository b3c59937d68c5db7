//! Session store (§4.F): CRUD over sessions, append-only conversation
//! history, compacted history and per-user product context. Conversational
//! semantics — agent stacks, flows, confirmations — belong to the state
//! manager; this crate only persists and retrieves them.

pub mod store;

pub use store::SessionStore;
