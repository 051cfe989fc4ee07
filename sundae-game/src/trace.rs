//! Append-only reasoning trace recorded while a player is processed.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write as _;

/// One recorded pipeline step: what ran, what it saw, and what it concluded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    /// Assigned by the trace at append time; always `len + 1`.
    pub step_number: u32,
    pub action: String,
    pub input: Value,
    pub output: Value,
    pub reasoning: String,
    /// Reference to the game data that influenced the decision.
    #[serde(default)]
    pub game_context: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub tool_calls: Option<Vec<String>>,
}

impl ReasoningStep {
    #[must_use]
    pub fn new(action: &str, input: Value, output: Value, reasoning: impl Into<String>) -> Self {
        Self {
            step_number: 0,
            action: action.to_string(),
            input,
            output,
            reasoning: reasoning.into(),
            game_context: None,
            timestamp: Utc::now(),
            tool_calls: None,
        }
    }

    #[must_use]
    pub fn with_context(mut self, game_context: impl Into<String>) -> Self {
        self.game_context = Some(game_context.into());
        self
    }

    /// Human-readable rendering for debug reports.
    #[must_use]
    pub fn debug_string(&self) -> String {
        let mut out = format!("Step {}: {}\n", self.step_number, self.action);
        let _ = writeln!(out, "Timestamp: {}", self.timestamp.to_rfc3339());
        let _ = writeln!(out, "Reasoning: {}", self.reasoning);
        if let Some(context) = &self.game_context {
            let _ = writeln!(out, "Game Context: {context}");
        }
        if let Some(tool_calls) = &self.tool_calls {
            let _ = writeln!(out, "Tool Calls: {}", tool_calls.join(", "));
        }
        let _ = writeln!(out, "Input: {}", self.input);
        let _ = writeln!(out, "Output: {}", self.output);
        out
    }
}

/// Ordered, append-only log of [`ReasoningStep`]s for one player's run.
///
/// Step numbers are reassigned at append time, so out-of-order insertion is
/// impossible by construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasoningTrace {
    steps: Vec<ReasoningStep>,
}

impl ReasoningTrace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step, assigning it the next step number.
    pub fn push(&mut self, mut step: ReasoningStep) {
        step.step_number = u32::try_from(self.steps.len()).unwrap_or(u32::MAX).saturating_add(1);
        self.steps.push(step);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Read-only view of the recorded steps.
    #[must_use]
    pub fn steps(&self) -> &[ReasoningStep] {
        &self.steps
    }

    /// Consume the trace, yielding the ordered steps.
    #[must_use]
    pub fn into_steps(self) -> Vec<ReasoningStep> {
        self.steps
    }

    /// Render the whole trace for debugging.
    #[must_use]
    pub fn debug_report(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            out.push_str(&step.debug_string());
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn push_renumbers_steps_monotonically() {
        let mut trace = ReasoningTrace::new();
        let mut rogue = ReasoningStep::new("first", json!({}), json!({}), "one");
        rogue.step_number = 99;
        trace.push(rogue);
        trace.push(ReasoningStep::new("second", json!({}), json!({}), "two"));

        let numbers: Vec<u32> = trace.steps().iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn debug_report_includes_context_and_actions() {
        let mut trace = ReasoningTrace::new();
        trace.push(
            ReasoningStep::new(
                "interpret_selections",
                json!({"selections": ["Rich"]}),
                json!({"flavors": 2}),
                "mapped selections",
            )
            .with_context("Player Ada selected: Rich"),
        );
        let report = trace.debug_report();
        assert!(report.contains("Step 1: interpret_selections"));
        assert!(report.contains("Game Context: Player Ada selected: Rich"));
    }
}
