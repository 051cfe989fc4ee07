//! Per-player and batch processing results.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::constants::COST_DISCREPANCY_EPSILON;
use crate::image::ImageInstructions;
use crate::trace::ReasoningStep;

/// How the claimed frontend cost was treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    /// Created but not yet priced.
    Pending,
    /// Priced authoritatively from the catalog; the frontend value was ignored.
    FrontendIgnored,
    /// Pricing failed; the result carries defaults.
    Error,
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationStatus::Pending => write!(f, "PENDING"),
            ValidationStatus::FrontendIgnored => write!(f, "FRONTEND_IGNORED"),
            ValidationStatus::Error => write!(f, "ERROR"),
        }
    }
}

fn default_calculation_method() -> String {
    "ingredient_database".to_string()
}

/// Comparison between the ignored frontend cost and the authoritative
/// backend calculation.
///
/// `calculated_cost` is derived solely from catalog and selections; it never
/// reads `frontend_cost`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostValidation {
    /// Value from the frontend, for reference only.
    pub frontend_cost: f64,
    /// Authoritative cost calculated by the backend.
    pub calculated_cost: f64,
    /// `calculated_cost - frontend_cost`, for analysis only.
    pub difference: f64,
    pub validation_status: ValidationStatus,
    #[serde(default = "default_calculation_method")]
    pub calculation_method: String,
    #[serde(default)]
    pub details: Option<String>,
}

impl CostValidation {
    #[must_use]
    pub fn pending(frontend_cost: f64) -> Self {
        Self {
            frontend_cost,
            calculated_cost: 0.0,
            difference: 0.0,
            validation_status: ValidationStatus::Pending,
            calculation_method: default_calculation_method(),
            details: None,
        }
    }

    /// Whether frontend and backend disagree beyond floating-point noise.
    #[must_use]
    pub fn has_discrepancy(&self) -> bool {
        self.difference.abs() > COST_DISCREPANCY_EPSILON
    }

    /// Difference as a percentage of the frontend cost, for analysis only.
    #[must_use]
    pub fn discrepancy_percentage(&self) -> f64 {
        if self.frontend_cost == 0.0 {
            return 0.0;
        }
        (self.difference / self.frontend_cost).abs() * 100.0
    }
}

/// Complete result for one player with the authoritative backend cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub player_id: String,
    pub player_name: String,
    pub image_instructions: ImageInstructions,
    /// Authoritative cost calculated by the backend.
    pub total_cost: f64,
    /// Per-ingredient costs from the catalog.
    #[serde(default)]
    pub cost_breakdown: BTreeMap<String, f64>,
    pub cost_validation: CostValidation,
    /// Deduplicated, first-seen order preserved.
    #[serde(default)]
    pub selected_ingredients: Vec<String>,
    #[serde(default)]
    pub allergy_warnings: Vec<String>,
    #[serde(default)]
    pub personality_influence: BTreeMap<String, String>,
    #[serde(default)]
    pub reasoning_steps: Vec<ReasoningStep>,
    /// Wall-clock seconds spent on this player.
    #[serde(default)]
    pub processing_time: f64,
    #[serde(default)]
    pub processing_errors: Vec<String>,
    #[serde(default)]
    pub generated_image_url: Option<String>,
    #[serde(default)]
    pub generated_image_path: Option<String>,
    #[serde(default)]
    pub image_generation_success: bool,
}

impl ProcessingResult {
    /// Fresh result with placeholder defaults: one scoop of vanilla, zero
    /// cost, pending validation.
    #[must_use]
    pub fn placeholder(player_id: &str, player_name: &str, frontend_cost: f64) -> Self {
        Self {
            player_id: player_id.to_string(),
            player_name: player_name.to_string(),
            image_instructions: ImageInstructions::default(),
            total_cost: 0.0,
            cost_breakdown: BTreeMap::new(),
            cost_validation: CostValidation::pending(frontend_cost),
            selected_ingredients: Vec::new(),
            allergy_warnings: Vec::new(),
            personality_influence: BTreeMap::new(),
            reasoning_steps: Vec::new(),
            processing_time: 0.0,
            processing_errors: Vec::new(),
            generated_image_url: None,
            generated_image_path: None,
            image_generation_success: false,
        }
    }

    /// Minimal error result for a player that could not be processed at all.
    #[must_use]
    pub fn error(player_id: &str, player_name: &str, frontend_cost: f64, message: &str) -> Self {
        let mut result = Self::placeholder(player_id, player_name, frontend_cost);
        result.cost_validation = CostValidation {
            frontend_cost,
            calculated_cost: 0.0,
            difference: -frontend_cost,
            validation_status: ValidationStatus::Error,
            calculation_method: default_calculation_method(),
            details: None,
        };
        result.processing_errors.push(message.to_string());
        result
    }

    /// Append a reasoning step, keeping step numbers consistent with order.
    pub fn add_reasoning_step(&mut self, mut step: ReasoningStep) {
        step.step_number = u32::try_from(self.reasoning_steps.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1);
        self.reasoning_steps.push(step);
    }

    /// Whether the player was processed without recorded errors.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.processing_errors.is_empty()
    }

    /// Comprehensive human-readable debug report.
    #[must_use]
    pub fn debug_report(&self) -> String {
        let mut out = format!(
            "Processing Report for Player {} ({})\n",
            self.player_name, self.player_id
        );
        out.push_str(&"=".repeat(60));
        out.push_str("\n\n");

        let _ = writeln!(out, "Final Cost: ${:.2}", self.total_cost);
        let _ = writeln!(out, "Cost Validation: {}", self.cost_validation.validation_status);
        if self.cost_validation.has_discrepancy() {
            let _ = writeln!(
                out,
                "Cost Discrepancy: ${:.2} ({:.1}%)",
                self.cost_validation.difference,
                self.cost_validation.discrepancy_percentage()
            );
        }

        let _ = writeln!(
            out,
            "\nSelected Ingredients: {}",
            self.selected_ingredients.join(", ")
        );
        if !self.allergy_warnings.is_empty() {
            let _ = writeln!(out, "Allergy Warnings: {}", self.allergy_warnings.join(", "));
        }

        if !self.personality_influence.is_empty() {
            out.push_str("\nPersonality Influence:\n");
            for (key, value) in &self.personality_influence {
                let _ = writeln!(out, "  {key}: {value}");
            }
        }

        if !self.processing_errors.is_empty() {
            out.push_str("\nProcessing Errors:\n");
            for error in &self.processing_errors {
                let _ = writeln!(out, "  - {error}");
            }
        }

        let _ = writeln!(out, "\nProcessing Time: {:.2} seconds", self.processing_time);
        let _ = writeln!(out, "\nReasoning Steps ({}):", self.reasoning_steps.len());
        out.push_str(&"-".repeat(40));
        out.push('\n');
        for step in &self.reasoning_steps {
            out.push_str(&step.debug_string());
            out.push('\n');
        }
        out
    }
}

/// Cost aggregates across a batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CostSummary {
    pub total_frontend_cost: f64,
    pub total_calculated_cost: f64,
    pub total_difference: f64,
    pub players_with_discrepancies: usize,
    /// Largest absolute frontend-vs-backend difference among discrepant
    /// players.
    pub largest_discrepancy: f64,
}

/// One selection-popularity histogram bucket; the bucket list preserves
/// first-encountered order, which also breaks popularity ties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionCount {
    pub selection: String,
    pub count: usize,
}

/// Selection popularity across a batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectionSummary {
    pub total_non_skip_selections: usize,
    pub unique_selections: usize,
    pub counts: Vec<SelectionCount>,
    pub most_popular: Option<String>,
}

/// Per-player timing aggregates, in seconds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimingSummary {
    pub average_seconds: f64,
    pub fastest_seconds: f64,
    pub slowest_seconds: f64,
}

/// Batch-level rollup computed after all players are processed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GroupSummary {
    pub successful_players: usize,
    pub failed_players: usize,
    pub players_with_valid_selections: usize,
    pub players_with_all_skips: usize,
    pub cost: CostSummary,
    pub selections: SelectionSummary,
    pub timing: TimingSummary,
}

/// Result for processing an entire game batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameProcessingResult {
    pub game_date: String,
    pub total_players: usize,
    pub player_results: Vec<ProcessingResult>,
    #[serde(default)]
    pub group_summary: Option<GroupSummary>,
    /// Sum of the per-player authoritative totals.
    pub total_cost: f64,
    pub total_processing_time: f64,
    #[serde(default)]
    pub processing_errors: Vec<String>,
    pub session_id: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl GameProcessingResult {
    /// Cost validation rollup over the per-player results.
    #[must_use]
    pub fn cost_summary(&self) -> CostSummary {
        let total_frontend_cost: f64 = self
            .player_results
            .iter()
            .map(|r| r.cost_validation.frontend_cost)
            .sum();
        let total_calculated_cost: f64 = self
            .player_results
            .iter()
            .map(|r| r.cost_validation.calculated_cost)
            .sum();
        let discrepant: Vec<&ProcessingResult> = self
            .player_results
            .iter()
            .filter(|r| r.cost_validation.has_discrepancy())
            .collect();
        CostSummary {
            total_frontend_cost,
            total_calculated_cost,
            total_difference: total_calculated_cost - total_frontend_cost,
            players_with_discrepancies: discrepant.len(),
            largest_discrepancy: discrepant
                .iter()
                .map(|r| r.cost_validation.difference.abs())
                .fold(0.0, f64::max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn placeholder_defaults_to_one_vanilla_scoop() {
        let result = ProcessingResult::placeholder("p1", "Ada", 9.0);
        assert_eq!(result.image_instructions.scoops, 1);
        assert_eq!(result.image_instructions.flavors, vec!["vanilla"]);
        assert!((result.total_cost - 0.0).abs() < f64::EPSILON);
        assert_eq!(
            result.cost_validation.validation_status,
            ValidationStatus::Pending
        );
        assert!((result.cost_validation.frontend_cost - 9.0).abs() < f64::EPSILON);
        assert!(result.is_success());
    }

    #[test]
    fn error_result_records_status_and_message() {
        let result = ProcessingResult::error("p1", "Ada", 4.0, "backend unavailable");
        assert_eq!(
            result.cost_validation.validation_status,
            ValidationStatus::Error
        );
        assert!((result.cost_validation.difference - -4.0).abs() < f64::EPSILON);
        assert_eq!(result.processing_errors, vec!["backend unavailable"]);
        assert!(!result.is_success());
    }

    #[test]
    fn discrepancy_detection_ignores_float_noise() {
        let mut validation = CostValidation::pending(10.0);
        validation.difference = 0.005;
        assert!(!validation.has_discrepancy());
        validation.difference = -0.02;
        assert!(validation.has_discrepancy());
        assert!((validation.discrepancy_percentage() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn add_reasoning_step_renumbers() {
        let mut result = ProcessingResult::placeholder("p1", "Ada", 0.0);
        let mut step =
            crate::trace::ReasoningStep::new("interpret", json!({}), json!({}), "first");
        step.step_number = 42;
        result.add_reasoning_step(step);
        result.add_reasoning_step(crate::trace::ReasoningStep::new(
            "cost",
            json!({}),
            json!({}),
            "second",
        ));
        assert_eq!(result.reasoning_steps[0].step_number, 1);
        assert_eq!(result.reasoning_steps[1].step_number, 2);
    }

    #[test]
    fn cost_summary_finds_largest_discrepancy() {
        let mut a = ProcessingResult::placeholder("a", "A", 10.0);
        a.cost_validation.calculated_cost = 12.0;
        a.cost_validation.difference = 2.0;
        a.cost_validation.validation_status = ValidationStatus::FrontendIgnored;
        let mut b = ProcessingResult::placeholder("b", "B", 5.0);
        b.cost_validation.calculated_cost = 5.0;
        b.cost_validation.difference = 0.0;
        b.cost_validation.validation_status = ValidationStatus::FrontendIgnored;

        let batch = GameProcessingResult {
            game_date: "2025-06-01".to_string(),
            total_players: 2,
            player_results: vec![a, b],
            group_summary: None,
            total_cost: 17.0,
            total_processing_time: 0.1,
            processing_errors: Vec::new(),
            session_id: "game_test".to_string(),
            metadata: BTreeMap::new(),
        };
        let summary = batch.cost_summary();
        assert_eq!(summary.players_with_discrepancies, 1);
        assert!((summary.largest_discrepancy - 2.0).abs() < 1e-9);
        assert!((summary.total_difference - 2.0).abs() < 1e-9);
    }

    #[test]
    fn debug_report_mentions_errors_and_ingredients() {
        let mut result = ProcessingResult::error("p1", "Ada", 0.0, "stage failed");
        result.selected_ingredients = vec!["Mascarpone".to_string()];
        let report = result.debug_report();
        assert!(report.contains("Processing Report for Player Ada"));
        assert!(report.contains("stage failed"));
        assert!(report.contains("Mascarpone"));
    }
}
