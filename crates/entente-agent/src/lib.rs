//! # entente-agent
//!
//! A Diplomacy power's private state and the actions that consult its model.
//!
//! - [`AgentState`]: goals, relationships and diary
//! - [`Agent`]: `generate_orders`, `update_state` and `write_diary`, each
//!   falling back to a safe default when the model's answer is unusable

#![deny(unsafe_code)]

pub mod agent;
pub mod prompts;
pub mod state;

pub use agent::{Agent, DIARY_PLACEHOLDER, hold_orders};
pub use state::{AgentState, DiaryEntry};
