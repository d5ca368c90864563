//! Agent actions: one structured call each, folded into the agent's state.

use serde_json::Value;
use tracing::{info, warn};

use entente_core::{CallIdentity, LlmCallResult, Power};
use entente_extract::{GOAL_KEYS, RELATIONSHIP_KEYS, extract_goals_with, extract_relationships_with};
use entente_llm::Coordinator;
use entente_settings::ExtractionSettings;

use crate::prompts;
use crate::state::AgentState;

/// Diary text recorded when the model gives nothing usable.
pub const DIARY_PLACEHOLDER: &str = "(diary entry unavailable: the model response could not be used)";

/// One power's agent: its model, its private state, and the actions that
/// drive the model through the [`Coordinator`].
///
/// Every action degrades to a safe default instead of failing.
pub struct Agent {
    power: Power,
    model: String,
    state: AgentState,
    relationship_keys: Vec<String>,
    goal_keys: Vec<String>,
}

impl Agent {
    /// Fresh state for `power`, consulting `model`.
    pub fn new(power: Power, model: impl Into<String>) -> Self {
        Self {
            power,
            model: model.into(),
            state: AgentState::new(power),
            relationship_keys: RELATIONSHIP_KEYS.iter().map(ToString::to_string).collect(),
            goal_keys: GOAL_KEYS.iter().map(ToString::to_string).collect(),
        }
    }

    /// Use configured key priority lists for goal and relationship lookups.
    #[must_use]
    pub fn with_extraction(mut self, extraction: &ExtractionSettings) -> Self {
        self.relationship_keys.clone_from(&extraction.relationship_keys);
        self.goal_keys.clone_from(&extraction.goal_keys);
        self
    }

    /// The power this agent plays.
    pub fn power(&self) -> Power {
        self.power
    }

    /// Identifier of the model this agent consults.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Goals, relationships and diary.
    pub fn state(&self) -> &AgentState {
        &self.state
    }

    /// Mutable access, for seeding state before a game.
    pub fn state_mut(&mut self) -> &mut AgentState {
        &mut self.state
    }

    fn identity(&self, game_id: &str, phase: &str) -> CallIdentity {
        CallIdentity::new(game_id, self.power.as_str(), phase)
    }

    /// Ask the model for one order per unit.
    ///
    /// Falls back to holding every unit when the response lacks a usable
    /// `orders` list.
    pub async fn generate_orders(
        &self,
        coordinator: &Coordinator,
        game_id: &str,
        phase: &str,
        units: &[String],
        context: &str,
    ) -> Vec<String> {
        let result = coordinator
            .call_structured(
                &self.model,
                &prompts::orders_prompt(&self.state, phase, units, context),
                Some(&prompts::system_prompt(&self.state)),
                &self.identity(game_id, phase),
                &["orders"],
                "orders",
            )
            .await;

        match orders_from(&result) {
            Some(orders) => orders,
            None => {
                warn!(
                    power = %self.power,
                    phase,
                    error = %result.error_message(),
                    "using hold orders"
                );
                hold_orders(units)
            }
        }
    }

    /// Revise goals and relationships from the model's assessment.
    ///
    /// Returns whether anything was applied. On failure the state is left
    /// exactly as it was.
    pub async fn update_state(
        &mut self,
        coordinator: &Coordinator,
        game_id: &str,
        phase: &str,
        context: &str,
    ) -> bool {
        let result = coordinator
            .call_structured(
                &self.model,
                &prompts::state_update_prompt(&self.state, phase, context),
                Some(&prompts::system_prompt(&self.state)),
                &self.identity(game_id, phase),
                &[],
                "state_update",
            )
            .await;

        let Some(data) = result.parsed_json().filter(|_| result.is_success()) else {
            warn!(power = %self.power, phase, error = %result.error_message(), "state unchanged");
            return false;
        };

        let mut touched = false;
        if let Some(goals) = extract_goals_with(data, &self.goal_keys) {
            self.state.set_goals(goals);
            touched = true;
        }
        if let Some(updates) = extract_relationships_with(data, &self.relationship_keys) {
            let applied = self.state.apply_relationships(&updates);
            info!(power = %self.power, phase, applied, "relationships updated");
            touched = true;
        }
        touched
    }

    /// Record a private diary entry for `phase`.
    ///
    /// A placeholder entry is recorded when the model's answer is unusable.
    pub async fn write_diary(
        &mut self,
        coordinator: &Coordinator,
        game_id: &str,
        phase: &str,
        negotiations: &str,
    ) -> &str {
        let result = coordinator
            .call_structured(
                &self.model,
                &prompts::diary_prompt(&self.state, phase, negotiations),
                Some(&prompts::system_prompt(&self.state)),
                &self.identity(game_id, phase),
                &["negotiation_summary"],
                "diary",
            )
            .await;

        let text = match diary_text(&result) {
            Some(text) => {
                if let Some(updates) = result
                    .parsed_json()
                    .and_then(|data| extract_relationships_with(data, &self.relationship_keys))
                {
                    let _ = self.state.apply_relationships(&updates);
                }
                text
            }
            None => {
                warn!(power = %self.power, phase, error = %result.error_message(), "diary placeholder recorded");
                DIARY_PLACEHOLDER.to_string()
            }
        };
        self.state.add_diary_entry(phase, text);
        self.state.diary.last().map_or("", |entry| entry.text.as_str())
    }
}

fn orders_from(result: &LlmCallResult) -> Option<Vec<String>> {
    if !result.is_success() {
        return None;
    }
    let orders: Vec<String> = result
        .field("orders")?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect();
    (!orders.is_empty()).then_some(orders)
}

fn diary_text(result: &LlmCallResult) -> Option<String> {
    if !result.is_success() {
        return None;
    }
    let summary = result.field("negotiation_summary")?.as_str()?.trim();
    if summary.is_empty() {
        return None;
    }
    match result.field("intent").and_then(Value::as_str).map(str::trim) {
        Some(intent) if !intent.is_empty() => Some(format!("{summary}\nIntent: {intent}")),
        _ => Some(summary.to_string()),
    }
}

/// `"A PAR"` becomes `"A PAR H"`.
pub fn hold_orders(units: &[String]) -> Vec<String> {
    units
        .iter()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .map(|u| format!("{u} H"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use entente_core::{LlmError, Relationship};
    use entente_llm::SerializationGate;
    use entente_llm::mock::{MockClient, MockResponse, ScriptedFactory};
    use entente_settings::GateScope;
    use serde_json::json;

    fn coordinator(script: Vec<MockResponse>) -> Coordinator {
        let script = parking_lot::Mutex::new(Some(script));
        let factory = ScriptedFactory::new(move |model| {
            script.lock().take().map(|s| MockClient::scripted(model, s))
        });
        Coordinator::new(factory, SerializationGate::new(&["ollama/"], GateScope::Global))
    }

    fn units() -> Vec<String> {
        vec!["A PAR".into(), "A MAR".into(), "F BRE".into()]
    }

    #[test]
    fn hold_orders_per_unit() {
        assert_eq!(
            hold_orders(&["A PAR".into(), " ".into(), "F BRE ".into()]),
            ["A PAR H", "F BRE H"]
        );
    }

    #[tokio::test]
    async fn orders_from_model() {
        let c = coordinator(vec![MockResponse::text(
            r#"{"orders": ["A PAR - BUR", "A MAR - SPA", "F BRE - MAO"]}"#,
        )]);
        let agent = Agent::new(Power::France, "ollama/llama3");
        let orders = agent.generate_orders(&c, "g1", "S1901M", &units(), "").await;
        assert_eq!(orders, ["A PAR - BUR", "A MAR - SPA", "F BRE - MAO"]);
    }

    #[tokio::test]
    async fn orders_survive_braces_quoted_in_reasoning() {
        let c = coordinator(vec![MockResponse::text(
            r#"{"reasoning": "reply in JSON: {orders} only", "orders": ["A PAR - PIC"]}"#,
        )]);
        let agent = Agent::new(Power::France, "ollama/llama3");
        let orders = agent
            .generate_orders(&c, "g1", "S1901M", &["A PAR".into()], "")
            .await;
        assert_eq!(orders, ["A PAR - PIC"]);
    }

    #[tokio::test]
    async fn orders_fall_back_to_holds() {
        let c = coordinator(vec![MockResponse::text(r#"{"reasoning": "thinking"}"#)]);
        let agent = Agent::new(Power::France, "ollama/llama3");
        let orders = agent.generate_orders(&c, "g1", "S1901M", &units(), "").await;
        assert_eq!(orders, ["A PAR H", "A MAR H", "F BRE H"]);
    }

    #[tokio::test]
    async fn orders_fall_back_on_transport_error() {
        let c = coordinator(vec![MockResponse::Error(LlmError::Network("refused".into()))]);
        let agent = Agent::new(Power::France, "ollama/llama3");
        let orders = agent.generate_orders(&c, "g1", "S1901M", &units(), "").await;
        assert_eq!(orders, ["A PAR H", "A MAR H", "F BRE H"]);
    }

    #[tokio::test]
    async fn empty_order_list_falls_back() {
        let c = coordinator(vec![MockResponse::text(r#"{"orders": []}"#)]);
        let agent = Agent::new(Power::England, "ollama/llama3");
        let orders = agent
            .generate_orders(&c, "g1", "S1901M", &["F LON".into()], "")
            .await;
        assert_eq!(orders, ["F LON H"]);
    }

    #[tokio::test]
    async fn update_state_applies_goals_and_relationships() {
        let reply = json!({
            "reasoning": "Germany moved on Burgundy",
            "updated_goals": ["Hold Burgundy", "Court England"],
            "updated_relationships": {"GERMANY": "Enemy", "ENGLAND": "Friendly", "ITALY": "Bestie"}
        });
        let c = coordinator(vec![MockResponse::text(&reply.to_string())]);
        let mut agent = Agent::new(Power::France, "ollama/llama3");
        assert!(agent.update_state(&c, "g1", "F1901M", "").await);
        let state = agent.state();
        assert_eq!(state.goals, ["Hold Burgundy", "Court England"]);
        assert_eq!(state.relationships[&Power::Germany], Relationship::Enemy);
        assert_eq!(state.relationships[&Power::England], Relationship::Friendly);
        assert_eq!(state.relationships[&Power::Italy], Relationship::Neutral);
    }

    #[tokio::test]
    async fn update_state_unchanged_on_failure() {
        let c = coordinator(vec![MockResponse::text("I'd rather not say.")]);
        let mut agent = Agent::new(Power::France, "ollama/llama3");
        agent.state_mut().set_goals(vec!["Take Belgium".into()]);
        let before = agent.state().clone();
        assert!(!agent.update_state(&c, "g1", "F1901M", "").await);
        assert_eq!(agent.state(), &before);
    }

    #[tokio::test]
    async fn update_state_honors_configured_keys() {
        let c = coordinator(vec![MockResponse::text(
            r#"{"objectives": ["Take Munich"], "stance": {"AUSTRIA": "Ally"}}"#,
        )]);
        let extraction = ExtractionSettings {
            relationship_keys: vec!["stance".into()],
            goal_keys: vec!["objectives".into()],
        };
        let mut agent = Agent::new(Power::Russia, "ollama/llama3").with_extraction(&extraction);
        assert!(agent.update_state(&c, "g1", "S1902M", "").await);
        assert_eq!(agent.state().goals, ["Take Munich"]);
        assert_eq!(agent.state().relationships[&Power::Austria], Relationship::Ally);
    }

    #[tokio::test]
    async fn diary_records_summary_and_intent() {
        let c = coordinator(vec![MockResponse::text(
            r#"{"negotiation_summary": "England offered a DMZ in the Channel.", "intent": "Accept, watch Belgium.", "updated_relationships": {"ENGLAND": "Friendly"}}"#,
        )]);
        let mut agent = Agent::new(Power::France, "ollama/llama3");
        let text = agent.write_diary(&c, "g1", "S1901M", "ENGLAND: DMZ?").await.to_string();
        assert_eq!(text, "England offered a DMZ in the Channel.\nIntent: Accept, watch Belgium.");
        assert_eq!(agent.state().diary.len(), 1);
        assert_eq!(agent.state().diary[0].phase, "S1901M");
        assert_eq!(agent.state().relationships[&Power::England], Relationship::Friendly);
    }

    #[tokio::test]
    async fn diary_placeholder_on_missing_summary() {
        let c = coordinator(vec![MockResponse::text(r#"{"intent": "attack"}"#)]);
        let mut agent = Agent::new(Power::Turkey, "ollama/llama3");
        let text = agent.write_diary(&c, "g1", "S1901M", "").await.to_string();
        assert_eq!(text, DIARY_PLACEHOLDER);
        assert_eq!(agent.state().diary.len(), 1);
        assert!(agent.state().relationships.values().all(|r| *r == Relationship::Neutral));
    }
}
