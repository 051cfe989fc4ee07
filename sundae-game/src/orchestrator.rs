//! Batch orchestration: every player processed in input order, failures
//! isolated, results aggregated into a group summary.
use chrono::Utc;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::catalog::IngredientCatalog;
use crate::cost::CostEngine;
use crate::game::{GameData, PlayerData};
use crate::image::{GenerationRegistry, ImageProvider};
use crate::numbers::{ratio, round2, usize_to_f64};
use crate::pipeline::{PipelineConfig, PlayerPipeline};
use crate::result::{
    CostSummary, GameProcessingResult, GroupSummary, ProcessingResult, SelectionCount,
    SelectionSummary, TimingSummary,
};
use crate::selection::is_skip;

/// Skip-rate classification for one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipPattern {
    /// More than 75% of selections were skips.
    HighSkipper,
    /// More than 50% of selections were skips.
    ModerateSkipper,
    ActivePlayer,
}

impl SkipPattern {
    #[must_use]
    fn classify(skip_percentage: f64) -> Self {
        if skip_percentage > 75.0 {
            Self::HighSkipper
        } else if skip_percentage > 50.0 {
            Self::ModerateSkipper
        } else {
            Self::ActivePlayer
        }
    }
}

/// Skip behavior of one player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSkipProfile {
    pub player_id: String,
    pub skip_count: usize,
    pub skip_percentage: f64,
    pub classification: SkipPattern,
}

/// How varied the batch's real selections were.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectionDiversity {
    pub total_selections: usize,
    pub unique_selections: usize,
    /// `unique / total`, 0.0 for an empty batch.
    pub diversity: f64,
}

/// One personality-name histogram bucket, in first-encountered order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalityCount {
    pub name: String,
    pub count: usize,
}

/// Distribution of flat authoritative costs across the batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CostStats {
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
}

/// Read-only pattern analysis over a game batch. No side effects on stored
/// results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternReport {
    pub skip_profiles: Vec<PlayerSkipProfile>,
    pub selection_diversity: SelectionDiversity,
    pub personality_counts: Vec<PersonalityCount>,
    pub cost_stats: CostStats,
}

/// Runs the per-player pipeline over a whole batch.
pub struct GameOrchestrator<'a, C: IngredientCatalog, I: ImageProvider> {
    catalog: &'a C,
    images: &'a I,
    registry: Option<&'a GenerationRegistry>,
    config: PipelineConfig,
}

impl<'a, C: IngredientCatalog, I: ImageProvider> GameOrchestrator<'a, C, I> {
    #[must_use]
    pub const fn new(catalog: &'a C, images: &'a I, config: PipelineConfig) -> Self {
        Self {
            catalog,
            images,
            registry: None,
            config,
        }
    }

    #[must_use]
    pub const fn with_registry(mut self, registry: &'a GenerationRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    fn pipeline(&self) -> PlayerPipeline<'a, C, I> {
        let pipeline = PlayerPipeline::new(self.catalog, self.images, self.config.clone());
        match self.registry {
            Some(registry) => pipeline.with_registry(registry),
            None => pipeline,
        }
    }

    /// Process a whole game batch. Always returns exactly one result per
    /// input player, in input order; a single player's failure never aborts
    /// the batch.
    #[must_use]
    pub fn process_game(&self, game: &GameData) -> GameProcessingResult {
        let started = Instant::now();
        let session_id = format!("game_{}", Utc::now().format("%Y%m%d_%H%M%S"));
        let pipeline = self.pipeline();

        let mut processing_errors = Vec::new();
        if game.total_players != game.players.len() {
            processing_errors.push(format!(
                "player count mismatch: payload says {}, found {}",
                game.total_players,
                game.players.len()
            ));
        }

        let mut player_results = Vec::with_capacity(game.players.len());
        for player in &game.players {
            debug!("processing player {} ({})", player.name, player.id);
            player_results.push(pipeline.process(player));
        }

        let group_summary = self.summarize(game, &player_results);
        let total_cost = player_results.iter().map(|r| r.total_cost).sum();

        let mut metadata = BTreeMap::new();
        metadata.insert("workflow_type".to_string(), "pipeline".to_string());
        metadata.insert(
            "has_errors".to_string(),
            player_results
                .iter()
                .any(|r| !r.is_success())
                .to_string(),
        );

        GameProcessingResult {
            game_date: game.game_date.clone(),
            total_players: game.players.len(),
            player_results,
            group_summary: Some(group_summary),
            total_cost,
            total_processing_time: started.elapsed().as_secs_f64(),
            processing_errors,
            session_id,
            metadata,
        }
    }

    /// Process one player outside a batch.
    #[must_use]
    pub fn process_single_player(&self, player: &PlayerData) -> ProcessingResult {
        self.pipeline().process(player)
    }

    /// Batch rollup: success/failure counts, cost aggregates, selection
    /// popularity, and timing stats.
    #[must_use]
    pub fn summarize(&self, game: &GameData, results: &[ProcessingResult]) -> GroupSummary {
        let successful = results.iter().filter(|r| r.is_success()).count();
        let with_valid = game
            .players
            .iter()
            .filter(|p| p.has_valid_selections())
            .count();

        GroupSummary {
            successful_players: successful,
            failed_players: results.len() - successful,
            players_with_valid_selections: with_valid,
            players_with_all_skips: game.players.len() - with_valid,
            cost: cost_summary(results),
            selections: selection_summary(game),
            timing: timing_summary(results),
        }
    }

    /// Read-only pattern analysis: skip-rate classification, selection
    /// diversity, personality histogram, and authoritative cost spread.
    #[must_use]
    pub fn analyze_patterns(&self, game: &GameData) -> PatternReport {
        let engine = CostEngine::new(self.catalog);

        let skip_profiles = game
            .players
            .iter()
            .map(|player| {
                let skip_count = player.skip_count();
                let skip_percentage = if player.selections.is_empty() {
                    // An empty ballot contributes nothing, like all skips.
                    100.0
                } else {
                    ratio(skip_count, player.selections.len()) * 100.0
                };
                PlayerSkipProfile {
                    player_id: player.id.clone(),
                    skip_count,
                    skip_percentage,
                    classification: SkipPattern::classify(skip_percentage),
                }
            })
            .collect();

        let all_non_skip: Vec<String> = game
            .players
            .iter()
            .flat_map(PlayerData::non_skip_selections)
            .collect();
        let mut unique = Vec::new();
        for selection in &all_non_skip {
            if !unique.contains(selection) {
                unique.push(selection.clone());
            }
        }
        let selection_diversity = SelectionDiversity {
            total_selections: all_non_skip.len(),
            unique_selections: unique.len(),
            diversity: ratio(unique.len(), all_non_skip.len()),
        };

        let mut personality_counts: Vec<PersonalityCount> = Vec::new();
        for player in &game.players {
            let Some(profile) = &player.personality else {
                continue;
            };
            if let Some(bucket) = personality_counts
                .iter_mut()
                .find(|c| c.name == profile.name)
            {
                bucket.count += 1;
            } else {
                personality_counts.push(PersonalityCount {
                    name: profile.name.clone(),
                    count: 1,
                });
            }
        }

        let costs: Vec<f64> = game
            .players
            .iter()
            .map(|player| engine.authoritative_cost(&player.selections))
            .collect();
        let cost_stats = if costs.is_empty() {
            CostStats::default()
        } else {
            let min = costs.iter().copied().fold(f64::INFINITY, f64::min);
            let max = costs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            CostStats {
                average: round2(costs.iter().sum::<f64>() / usize_to_f64(costs.len())),
                min,
                max,
                range: round2(max - min),
            }
        };

        PatternReport {
            skip_profiles,
            selection_diversity,
            personality_counts,
            cost_stats,
        }
    }

    /// Per-player flat authoritative cost, keyed by player id.
    #[must_use]
    pub fn calculate_all_player_costs(&self, game: &GameData) -> BTreeMap<String, f64> {
        let engine = CostEngine::new(self.catalog);
        game.players
            .iter()
            .map(|player| {
                (
                    player.id.clone(),
                    engine.authoritative_cost(&player.selections),
                )
            })
            .collect()
    }
}

fn cost_summary(results: &[ProcessingResult]) -> CostSummary {
    let total_frontend_cost: f64 = results
        .iter()
        .map(|r| r.cost_validation.frontend_cost)
        .sum();
    let total_calculated_cost: f64 = results
        .iter()
        .map(|r| r.cost_validation.calculated_cost)
        .sum();
    let discrepant: Vec<&ProcessingResult> = results
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

/// Popularity histogram in first-encountered order; the first bucket to
/// reach the top count stays the most popular on ties.
fn selection_summary(game: &GameData) -> SelectionSummary {
    let mut counts: Vec<SelectionCount> = Vec::new();
    let mut total = 0usize;
    for player in &game.players {
        for selection in &player.selections {
            if is_skip(selection) {
                continue;
            }
            total += 1;
            if let Some(bucket) = counts.iter_mut().find(|c| &c.selection == selection) {
                bucket.count += 1;
            } else {
                counts.push(SelectionCount {
                    selection: selection.clone(),
                    count: 1,
                });
            }
        }
    }

    let mut most_popular: Option<&SelectionCount> = None;
    for bucket in &counts {
        if most_popular.is_none_or(|current| bucket.count > current.count) {
            most_popular = Some(bucket);
        }
    }

    SelectionSummary {
        total_non_skip_selections: total,
        unique_selections: counts.len(),
        most_popular: most_popular.map(|bucket| bucket.selection.clone()),
        counts,
    }
}

fn timing_summary(results: &[ProcessingResult]) -> TimingSummary {
    if results.is_empty() {
        return TimingSummary::default();
    }
    let times: Vec<f64> = results.iter().map(|r| r.processing_time).collect();
    TimingSummary {
        average_seconds: times.iter().sum::<f64>() / usize_to_f64(times.len()),
        fastest_seconds: times.iter().copied().fold(f64::INFINITY, f64::min),
        slowest_seconds: times.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::image::MockImageProvider;
    use crate::personality::PersonalityProfile;

    fn player(id: &str, selections: &[&str]) -> PlayerData {
        PlayerData {
            id: id.to_string(),
            name: format!("Player {id}"),
            selections: selections.iter().map(ToString::to_string).collect(),
            total_cost: 0.0,
            ai_interactions: Vec::new(),
            personality: None,
        }
    }

    fn game(players: Vec<PlayerData>) -> GameData {
        GameData {
            game_date: "2025-06-01".to_string(),
            total_players: players.len(),
            players,
            game_version: "1.0.0".to_string(),
        }
    }

    #[test]
    fn batch_returns_one_result_per_player_in_input_order() {
        let catalog = MemoryCatalog::with_default_inventory();
        let images = MockImageProvider;
        let orchestrator =
            GameOrchestrator::new(&catalog, &images, PipelineConfig::default());

        let batch = game(vec![
            player("a", &["Rich"]),
            player("b", &["skip"]),
            player("", &["Sweet"]), // structurally invalid
            player("d", &["Crunchy", "Fruity"]),
        ]);
        let result = orchestrator.process_game(&batch);

        assert_eq!(result.total_players, 4);
        assert_eq!(result.player_results.len(), 4);
        let ids: Vec<&str> = result
            .player_results
            .iter()
            .map(|r| r.player_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "", "d"]);

        let summary = result.group_summary.unwrap();
        assert_eq!(summary.failed_players, 1);
        assert_eq!(summary.successful_players, 3);
        assert_eq!(summary.players_with_all_skips, 1);
        assert_eq!(summary.players_with_valid_selections, 3);
    }

    #[test]
    fn total_cost_sums_player_totals() {
        let catalog = MemoryCatalog::with_default_inventory();
        let images = MockImageProvider;
        let orchestrator =
            GameOrchestrator::new(&catalog, &images, PipelineConfig::default());

        let batch = game(vec![player("a", &["Rich"]), player("b", &["Sweet"])]);
        let result = orchestrator.process_game(&batch);
        let expected: f64 = result.player_results.iter().map(|r| r.total_cost).sum();
        assert!((result.total_cost - expected).abs() < 1e-9);
        assert_eq!(
            result.metadata.get("workflow_type").map(String::as_str),
            Some("pipeline")
        );
    }

    #[test]
    fn player_count_mismatch_is_reported_not_fatal() {
        let catalog = MemoryCatalog::with_default_inventory();
        let images = MockImageProvider;
        let orchestrator =
            GameOrchestrator::new(&catalog, &images, PipelineConfig::default());

        let mut batch = game(vec![player("a", &["Rich"])]);
        batch.total_players = 5;
        let result = orchestrator.process_game(&batch);
        assert_eq!(result.player_results.len(), 1);
        assert!(
            result
                .processing_errors
                .iter()
                .any(|e| e.contains("player count mismatch"))
        );
    }

    #[test]
    fn most_popular_selection_breaks_ties_by_first_seen() {
        let catalog = MemoryCatalog::with_default_inventory();
        let images = MockImageProvider;
        let orchestrator =
            GameOrchestrator::new(&catalog, &images, PipelineConfig::default());

        let batch = game(vec![
            player("a", &["Crunchy", "Rich"]),
            player("b", &["Rich", "Crunchy"]),
        ]);
        let summary = orchestrator.summarize(&batch, &[]);
        // Crunchy and Rich both count 2; Crunchy was seen first.
        assert_eq!(summary.selections.most_popular.as_deref(), Some("Crunchy"));
        assert_eq!(summary.selections.total_non_skip_selections, 4);
        assert_eq!(summary.selections.unique_selections, 2);
    }

    #[test]
    fn skip_patterns_classify_by_rate() {
        let catalog = MemoryCatalog::with_default_inventory();
        let images = MockImageProvider;
        let orchestrator =
            GameOrchestrator::new(&catalog, &images, PipelineConfig::default());

        let batch = game(vec![
            player("high", &["skip", "skip", "skip", "skip", "Rich"]),
            player("boundary", &["skip", "skip", "skip", "Rich"]),
            player("moderate", &["skip", "skip", "Rich"]),
            player("active", &["Rich", "Crunchy"]),
            player("empty", &[]),
        ]);
        let report = orchestrator.analyze_patterns(&batch);
        let classifications: Vec<SkipPattern> = report
            .skip_profiles
            .iter()
            .map(|p| p.classification)
            .collect();
        assert_eq!(
            classifications,
            vec![
                SkipPattern::HighSkipper,
                // Exactly 75% is not "more than 75%".
                SkipPattern::ModerateSkipper,
                SkipPattern::ModerateSkipper,
                SkipPattern::ActivePlayer,
                SkipPattern::HighSkipper
            ]
        );
    }

    #[test]
    fn pattern_report_covers_diversity_personalities_and_costs() {
        let catalog = MemoryCatalog::with_default_inventory();
        let images = MockImageProvider;
        let orchestrator =
            GameOrchestrator::new(&catalog, &images, PipelineConfig::default());

        let mut a = player("a", &["Rich", "Crunchy"]);
        a.personality = Some(PersonalityProfile {
            name: "Bold".to_string(),
            insights: vec!["x".to_string()],
            ..PersonalityProfile::default()
        });
        let mut b = player("b", &["Rich", "skip"]);
        b.personality = Some(PersonalityProfile {
            name: "Bold".to_string(),
            insights: vec!["y".to_string()],
            ..PersonalityProfile::default()
        });

        let batch = game(vec![a, b]);
        let report = orchestrator.analyze_patterns(&batch);

        assert_eq!(report.selection_diversity.total_selections, 3);
        assert_eq!(report.selection_diversity.unique_selections, 2);
        assert!((report.selection_diversity.diversity - 2.0 / 3.0).abs() < 1e-9);

        assert_eq!(report.personality_counts.len(), 1);
        assert_eq!(report.personality_counts[0].count, 2);

        assert!(report.cost_stats.min <= report.cost_stats.max);
        assert!(
            (report.cost_stats.range - round2(report.cost_stats.max - report.cost_stats.min))
                .abs()
                < 1e-9
        );

        let costs = orchestrator.calculate_all_player_costs(&batch);
        assert_eq!(costs.len(), 2);
        assert!(costs.values().all(|c| *c >= 0.0));
    }
}
