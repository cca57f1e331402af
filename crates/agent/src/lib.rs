//! Conversation engine for the shopping assistant.
//!
//! A turn flows through:
//! 1. **Shortcuts** (`shortcuts`) - deterministic rules for checkout
//!    confirmations, implicit tracking and canned replies
//! 2. **Planner** (`planner`) - bounded single-action fallback driven by a
//!    pluggable `CapabilitySelector`
//! 3. **Capabilities** (`capabilities`) - search, cart, checkout, tracking
//! 4. **Runtime** (`runtime`) - per-session serialization, persistence and
//!    cart mirroring
//!
//! The language model only chooses which capability to run and may word
//! search listings. Cart contents, totals and orders are decided here.

pub mod capabilities;
pub mod llm;
pub mod planner;
pub mod runtime;
pub mod shortcuts;

pub use capabilities::{Capabilities, CapabilityKind};
pub use llm::{HttpLlmClient, LlmClient, LlmError};
pub use planner::{
    BoundedPlanner, CapabilitySelector, KeywordSelector, LlmCapabilitySelector, PlannerStep,
    ScriptedSelector, SelectorError,
};
pub use runtime::{AgentRuntime, RuntimeSettings, SessionLocks, TurnError, TurnReply};
pub use shortcuts::{Shortcut, ShortcutResolver};
