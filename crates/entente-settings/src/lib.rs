//! # entente-settings
//!
//! Layered configuration: compiled defaults, then `~/.entente/settings.json`
//! (deep-merged), then `ENTENTE_*` environment overrides.
//!
//! Settings are loaded once by the binary and passed down explicitly; there
//! is no global instance.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_from, deep_merge, entente_home, load_settings,
    load_settings_from_path, settings_path,
};
pub use types::*;
