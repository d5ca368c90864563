//! Prompt text for agent actions.
//!
//! Every prompt ends with the JSON shape the model is asked to answer in,
//! naming exactly the fields the matching action validates.

use std::fmt::Write as _;

use crate::state::AgentState;

/// Who the agent is, what it wants and whom it trusts.
pub fn system_prompt(state: &AgentState) -> String {
    format!(
        "You are playing {} in a game of Diplomacy. Think strategically, keep your \
         commitments when they serve you, and answer only in the JSON format requested.",
        state.power
    )
}

fn state_block(state: &AgentState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Your relationships: {}", state.relationships_summary());
    if state.goals.is_empty() {
        out.push_str("Your goals: none yet\n");
    } else {
        out.push_str("Your goals:\n");
        for goal in &state.goals {
            let _ = writeln!(out, "- {goal}");
        }
    }
    if let Some(last) = state.diary.last() {
        let _ = writeln!(out, "Your latest diary entry ({}): {}", last.phase, last.text);
    }
    out
}

/// Asks for one order per unit as a JSON `orders` list.
pub fn orders_prompt(state: &AgentState, phase: &str, units: &[String], context: &str) -> String {
    format!(
        "Phase: {phase}\n{}Your units: {}\n\n{context}\n\n\
         Choose one order for each of your units.\n\
         Respond with JSON: {{\"orders\": [\"A PAR - BUR\", ...]}}",
        state_block(state),
        units.join(", ")
    )
}

/// Asks for revised goals and relationships after a phase.
pub fn state_update_prompt(state: &AgentState, phase: &str, context: &str) -> String {
    format!(
        "Phase: {phase}\n{}\n{context}\n\n\
         Review what happened and revise your goals and how you regard each power \
         (Enemy, Unfriendly, Neutral, Friendly, Ally).\n\
         Respond with JSON: {{\"reasoning\": \"...\", \"updated_goals\": [\"...\"], \
         \"updated_relationships\": {{\"POWER\": \"Label\"}}}}",
        state_block(state)
    )
}

/// Asks for a short diary entry about this phase's negotiations.
pub fn diary_prompt(state: &AgentState, phase: &str, negotiations: &str) -> String {
    format!(
        "Phase: {phase}\n{}\nMessages exchanged this phase:\n{negotiations}\n\n\
         Write a private diary entry summarizing the negotiations and what you intend to do.\n\
         Respond with JSON: {{\"negotiation_summary\": \"...\", \"intent\": \"...\", \
         \"updated_relationships\": {{\"POWER\": \"Label\"}}}}",
        state_block(state)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use entente_core::Power;

    #[test]
    fn orders_prompt_lists_units_and_shape() {
        let state = AgentState::new(Power::France);
        let p = orders_prompt(&state, "S1901M", &["A PAR".into(), "F BRE".into()], "board");
        assert!(p.contains("A PAR, F BRE"));
        assert!(p.contains("\"orders\""));
        assert!(p.contains("Your goals: none yet"));
    }

    #[test]
    fn state_block_includes_latest_diary() {
        let mut state = AgentState::new(Power::Russia);
        state.add_diary_entry("S1901M", "old");
        state.add_diary_entry("F1901M", "newest");
        let p = diary_prompt(&state, "S1902M", "none");
        assert!(p.contains("(F1901M): newest"));
        assert!(!p.contains(": old"));
    }
}
