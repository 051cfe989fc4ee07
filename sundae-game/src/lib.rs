//! Sundae Game Engine
//!
//! Platform-agnostic core logic for the Sundae party game backend: abstract
//! player selections ("Rich", "Crunchy", "Skip") become concrete ice-cream
//! builds with authoritative catalog-derived pricing, deterministic
//! personality embellishments, and image-generation instructions. This crate
//! provides the whole processing pipeline without HTTP or provider-specific
//! dependencies.

pub mod catalog;
pub mod constants;
pub mod cost;
pub mod game;
pub mod image;
pub mod numbers;
pub mod orchestrator;
pub mod personality;
pub mod pipeline;
pub mod result;
pub mod selection;
pub mod session;
pub mod trace;

// Re-export commonly used types
pub use catalog::{IngredientCatalog, IngredientRecord, MemoryCatalog, allergy_warnings};
pub use cost::{
    Assessment, BulkDiscount, ClaimedCostCheck, CostBreakdown, CostEngine, CostError,
    ReasonablenessReport, bulk_discount, markup_percentage, preparation_cost,
    validate_cost_reasonableness,
};
pub use game::{AiInteraction, GameData, PlayerData};
pub use image::{
    GenerationRegistry, ImageInstructions, ImageOutcome, ImageProvider, MockImageProvider,
    RenderSpec,
};
pub use orchestrator::{
    CostStats, GameOrchestrator, PatternReport, PersonalityCount, PlayerSkipProfile,
    SelectionDiversity, SkipPattern,
};
pub use personality::{
    EnhancedSpec, PersonalityEnhancer, PersonalityProfile, should_skip_enhancement,
};
pub use pipeline::{PipelineConfig, PlayerPipeline, SelectionRoute};
pub use result::{
    CostSummary, CostValidation, GameProcessingResult, GroupSummary, ProcessingResult,
    SelectionCount, SelectionSummary, TimingSummary, ValidationStatus,
};
pub use selection::{
    IceCreamSpec, ResolutionKind, ResolvedSelection, SelectionInfo, SelectionResolver,
    available_selection_mappings, is_skip,
};
pub use session::{
    GameSession, PlayerSessionData, SessionStatus, SessionStore, SessionStoreStats,
};
pub use trace::{ReasoningStep, ReasoningTrace};

use std::collections::BTreeMap;

/// Main engine binding a catalog and an image provider to the processing
/// pipeline. This is the surface the HTTP layer talks to.
pub struct GameEngine<C, I>
where
    C: IngredientCatalog,
    I: ImageProvider,
{
    catalog: C,
    images: I,
    registry: GenerationRegistry,
    config: PipelineConfig,
}

impl<C, I> GameEngine<C, I>
where
    C: IngredientCatalog,
    I: ImageProvider,
{
    /// Create an engine with the provided collaborators and default config.
    #[must_use]
    pub fn new(catalog: C, images: I) -> Self {
        Self::with_config(catalog, images, PipelineConfig::default())
    }

    #[must_use]
    pub fn with_config(catalog: C, images: I, config: PipelineConfig) -> Self {
        Self {
            catalog,
            images,
            registry: GenerationRegistry::new(),
            config,
        }
    }

    fn orchestrator(&self) -> GameOrchestrator<'_, C, I> {
        GameOrchestrator::new(&self.catalog, &self.images, self.config.clone())
            .with_registry(&self.registry)
    }

    /// Process a complete game batch. One result per player, in input order.
    #[must_use]
    pub fn process_game(&self, game: &GameData) -> GameProcessingResult {
        self.orchestrator().process_game(game)
    }

    /// Process a single player outside a batch.
    #[must_use]
    pub fn process_single_player(&self, player: &PlayerData) -> ProcessingResult {
        self.orchestrator().process_single_player(player)
    }

    /// Real-time authoritative price for a selection list (flat formula).
    #[must_use]
    pub fn authoritative_cost(&self, selections: &[String]) -> f64 {
        CostEngine::new(&self.catalog).authoritative_cost(selections)
    }

    /// Check a client-claimed total against the backend price.
    #[must_use]
    pub fn validate_cost(&self, selections: &[String], claimed_total: f64) -> ClaimedCostCheck {
        CostEngine::new(&self.catalog).validate_cost(selections, claimed_total)
    }

    /// The available abstract selections and their example ingredients.
    #[must_use]
    pub fn available_selection_mappings(&self) -> Vec<SelectionInfo> {
        available_selection_mappings()
    }

    /// Read-only pattern analysis over a batch.
    #[must_use]
    pub fn analyze_patterns(&self, game: &GameData) -> PatternReport {
        self.orchestrator().analyze_patterns(game)
    }

    /// Per-player flat authoritative cost, keyed by player id.
    #[must_use]
    pub fn calculate_all_player_costs(&self, game: &GameData) -> BTreeMap<String, f64> {
        self.orchestrator().calculate_all_player_costs(game)
    }

    #[must_use]
    pub const fn catalog(&self) -> &C {
        &self.catalog
    }

    #[must_use]
    pub const fn images(&self) -> &I {
        &self.images
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_game() -> GameData {
        GameData {
            game_date: "2025-06-01".to_string(),
            total_players: 2,
            game_version: "1.0.0".to_string(),
            players: vec![
                PlayerData {
                    id: "p1".to_string(),
                    name: "Ada".to_string(),
                    selections: vec!["Rich".to_string(), "skip".to_string()],
                    total_cost: 11.0,
                    ai_interactions: Vec::new(),
                    personality: None,
                },
                PlayerData {
                    id: "p2".to_string(),
                    name: "Grace".to_string(),
                    selections: vec!["skip".to_string()],
                    total_cost: 0.0,
                    ai_interactions: Vec::new(),
                    personality: None,
                },
            ],
        }
    }

    #[test]
    fn engine_processes_batches_end_to_end() {
        let engine = GameEngine::new(MemoryCatalog::with_default_inventory(), MockImageProvider);
        let result = engine.process_game(&demo_game());
        assert_eq!(result.player_results.len(), 2);
        assert!(result.player_results[0].total_cost > 0.0);
        assert!((result.player_results[1].total_cost - 0.0).abs() < f64::EPSILON);
        assert!(result.group_summary.is_some());
    }

    #[test]
    fn engine_pricing_surface_is_consistent() {
        let engine = GameEngine::new(MemoryCatalog::with_default_inventory(), MockImageProvider);
        let selections = vec!["Rich".to_string()];
        let cost = engine.authoritative_cost(&selections);
        let check = engine.validate_cost(&selections, cost);
        assert!(check.is_valid);
        assert!((check.backend_cost - cost).abs() < 1e-9);

        assert_eq!(engine.available_selection_mappings().len(), 6);
    }

    #[test]
    fn engine_exposes_single_player_processing() {
        let engine = GameEngine::new(MemoryCatalog::with_default_inventory(), MockImageProvider);
        let mut game = demo_game();
        let player = game.players.remove(0);
        let result = engine.process_single_player(&player);
        assert_eq!(result.player_id, "p1");
        assert!(result.is_success());
    }
}
