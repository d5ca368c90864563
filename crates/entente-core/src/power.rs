//! Diplomacy powers and the relationships between them.

use serde::{Deserialize, Serialize};

/// The seven great powers of standard Diplomacy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Power {
    /// Austria-Hungary.
    Austria,
    /// England.
    England,
    /// France.
    France,
    /// Germany.
    Germany,
    /// Italy.
    Italy,
    /// Russia.
    Russia,
    /// The Ottoman Empire.
    Turkey,
}

impl Power {
    /// Every power in alphabetical order.
    pub const ALL: [Power; 7] = [
        Self::Austria,
        Self::England,
        Self::France,
        Self::Germany,
        Self::Italy,
        Self::Russia,
        Self::Turkey,
    ];

    /// Upper-case name as used on the board, e.g. `FRANCE`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Austria => "AUSTRIA",
            Self::England => "ENGLAND",
            Self::France => "FRANCE",
            Self::Germany => "GERMANY",
            Self::Italy => "ITALY",
            Self::Russia => "RUSSIA",
            Self::Turkey => "TURKEY",
        }
    }
}

impl std::fmt::Display for Power {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Power {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == upper)
            .ok_or_else(|| format!("unknown power: {s}"))
    }
}

/// How one power regards another in an agent's private state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relationship {
    /// Actively hostile.
    Enemy,
    /// Wary, expecting hostility.
    Unfriendly,
    /// No stance either way.
    #[default]
    Neutral,
    /// Cooperative without commitment.
    Friendly,
    /// Coordinating moves.
    Ally,
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enemy => write!(f, "Enemy"),
            Self::Unfriendly => write!(f, "Unfriendly"),
            Self::Neutral => write!(f, "Neutral"),
            Self::Friendly => write!(f, "Friendly"),
            Self::Ally => write!(f, "Ally"),
        }
    }
}

impl std::str::FromStr for Relationship {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enemy" => Ok(Self::Enemy),
            "unfriendly" => Ok(Self::Unfriendly),
            "neutral" => Ok(Self::Neutral),
            "friendly" => Ok(Self::Friendly),
            "ally" => Ok(Self::Ally),
            other => Err(format!("unknown relationship: {other}")),
        }
    }
}
