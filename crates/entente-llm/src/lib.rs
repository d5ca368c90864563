//! # entente-llm
//!
//! Everything between an agent's prompt and a model's answer:
//!
//! - [`spec`]: `backend/model[@base_url]` identifiers
//! - [`openai`], [`anthropic`]: HTTP backends implementing [`ModelClient`]
//! - [`retry`]: backoff wrapper for transport failures
//! - [`factory`]: builds handles from identifiers
//! - [`pool`]: one cached handle per identifier
//! - [`gate`]: serializes local models
//! - [`coordinator`]: raw and structured calls with usage recording
//! - [`mock`]: scripted doubles for tests
//!
//! [`ModelClient`]: entente_core::ModelClient

#![deny(unsafe_code)]

pub mod anthropic;
pub mod coordinator;
pub mod factory;
pub mod gate;
mod http;
pub mod mock;
pub mod openai;
pub mod pool;
pub mod retry;
pub mod spec;

pub use coordinator::{Coordinator, EMPTY_RESPONSE, PARSE_FAILURE};
pub use factory::{BackendFactory, ModelFactory};
pub use gate::{GatePermit, SerializationGate};
pub use http::RequestParams;
pub use pool::ModelPool;
pub use retry::{RetryConfig, RetryingClient};
pub use spec::{Backend, ModelSpec};
