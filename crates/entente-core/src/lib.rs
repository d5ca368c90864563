//! # entente-core
//!
//! Shared types for the Diplomacy LLM coordination core.
//!
//! - [`CallIdentity`]: the game/agent/phase tuple used for usage attribution
//! - [`LlmError`]: transport and configuration error taxonomy
//! - [`ModelClient`]: the trait every model backend implements
//! - [`LlmCallResult`]: the non-throwing outcome of a structured call
//! - [`Power`] and [`Relationship`]: the Diplomacy vocabulary agents reason in

#![deny(unsafe_code)]

pub mod client;
pub mod errors;
pub mod identity;
pub mod power;
pub mod result;
pub mod text;

pub use client::{Completion, ModelClient, TokenUsage};
pub use errors::LlmError;
pub use identity::CallIdentity;
pub use power::{Power, Relationship};
pub use result::LlmCallResult;
pub use text::truncate_chars;
