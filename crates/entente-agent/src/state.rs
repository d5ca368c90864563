//! An agent's private memory of a game.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use entente_core::{Power, Relationship};

/// One phase-tagged diary entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiaryEntry {
    /// Phase the entry was written in, e.g. `S1901M`.
    pub phase: String,
    /// Entry text.
    pub text: String,
}

/// What an agent privately believes and intends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentState {
    /// The power this state belongs to.
    pub power: Power,
    /// Current goals, most important first.
    pub goals: Vec<String>,
    /// Stance toward every other power.
    pub relationships: BTreeMap<Power, Relationship>,
    /// Entries in the order they were written.
    pub diary: Vec<DiaryEntry>,
}

impl AgentState {
    /// No goals, an empty diary, and every other power neutral.
    pub fn new(power: Power) -> Self {
        let relationships = Power::ALL
            .iter()
            .filter(|p| **p != power)
            .map(|p| (*p, Relationship::Neutral))
            .collect();
        Self {
            power,
            goals: Vec::new(),
            relationships,
            diary: Vec::new(),
        }
    }

    /// Apply `{"FRANCE": "Ally", ...}` updates. Unknown powers, the agent's
    /// own power and unrecognized labels are skipped. Returns how many
    /// entries changed state.
    pub fn apply_relationships(&mut self, updates: &Map<String, Value>) -> usize {
        let mut applied = 0;
        for (name, label) in updates {
            let Ok(power) = name.parse::<Power>() else {
                debug!(power = %name, "ignoring relationship for unknown power");
                continue;
            };
            if power == self.power {
                continue;
            }
            let Some(relationship) = label.as_str().and_then(|l| l.parse::<Relationship>().ok()) else {
                debug!(power = %name, label = %label, "ignoring invalid relationship label");
                continue;
            };
            if self.relationships.insert(power, relationship) != Some(relationship) {
                applied += 1;
            }
        }
        applied
    }

    /// Replace the goal list; blank goals are dropped.
    pub fn set_goals(&mut self, goals: Vec<String>) {
        self.goals = goals
            .into_iter()
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect();
    }

    /// Append an entry for `phase`.
    pub fn add_diary_entry(&mut self, phase: &str, text: impl Into<String>) {
        self.diary.push(DiaryEntry {
            phase: phase.to_string(),
            text: text.into(),
        });
    }

    /// `ENGLAND: Friendly, GERMANY: Enemy, ...` for prompts.
    pub fn relationships_summary(&self) -> String {
        self.relationships
            .iter()
            .map(|(p, r)| format!("{p}: {r}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
