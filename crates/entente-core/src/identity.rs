//! Attribution for model calls.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Who a model call is made on behalf of.
///
/// Used only for usage attribution and diagnostic logging; it never changes
/// how a call behaves.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallIdentity {
    /// Opaque game identifier.
    pub game_id: String,
    /// Usually the power name.
    pub agent_id: String,
    /// Game phase, e.g. `S1901M`.
    pub phase: String,
}

impl CallIdentity {
    /// Build an identity from its three parts.
    pub fn new(
        game_id: impl Into<String>,
        agent_id: impl Into<String>,
        phase: impl Into<String>,
    ) -> Self {
        Self {
            game_id: game_id.into(),
            agent_id: agent_id.into(),
            phase: phase.into(),
        }
    }
}

impl fmt::Display for CallIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.game_id, self.agent_id, self.phase)
    }
}
