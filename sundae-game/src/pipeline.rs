//! The fixed per-player processing pipeline.
//!
//! Every player runs the same stage sequence: interpret selections (with an
//! all-skip short-circuit), apply personality, calculate the authoritative
//! cost, synthesize image instructions, generate the image, finalize. A
//! failure in one stage is recorded on that player's result and the run
//! proceeds with defaults; it never aborts the batch.
use log::warn;
use serde_json::json;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use crate::catalog::{IngredientCatalog, allergy_warnings};
use crate::constants::{MAX_IMAGE_FLAVORS, MAX_IMAGE_TOPPINGS, MAX_SCOOPS, MIN_SCOOPS};
use crate::cost::CostEngine;
use crate::game::PlayerData;
use crate::image::{GenerationRegistry, ImageInstructions, ImageOutcome, ImageProvider};
use crate::personality::{EnhancedSpec, PersonalityEnhancer, should_skip_enhancement};
use crate::result::{CostValidation, ProcessingResult, ValidationStatus};
use crate::selection::{IceCreamSpec, SelectionResolver, dedup_preserving};
use crate::trace::{ReasoningStep, ReasoningTrace};

/// Caller-controlled knobs for a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Skip personality enhancement for the whole run.
    pub skip_personality_enhancement: bool,
    /// Skip the external image-generation stage (instructions are still
    /// synthesized).
    pub skip_image_generation: bool,
    /// Session key used to scope the duplicate-generation guard.
    pub session_key: Option<String>,
}

/// Which processing route a player's selections put them on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRoute {
    /// No real selections; short-circuits to the minimal result.
    AllSkips,
    /// A single real selection.
    Standard,
    /// Two or more real selections.
    Full,
}

impl SelectionRoute {
    #[must_use]
    pub const fn classify(non_skip_count: usize) -> Self {
        match non_skip_count {
            0 => Self::AllSkips,
            1 => Self::Standard,
            _ => Self::Full,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AllSkips => "all_skips",
            Self::Standard => "standard_processing",
            Self::Full => "full_processing",
        }
    }
}

/// Runs one player through the fixed stage sequence.
pub struct PlayerPipeline<'a, C: IngredientCatalog, I: ImageProvider> {
    catalog: &'a C,
    images: &'a I,
    registry: Option<&'a GenerationRegistry>,
    config: PipelineConfig,
}

impl<'a, C: IngredientCatalog, I: ImageProvider> PlayerPipeline<'a, C, I> {
    #[must_use]
    pub const fn new(catalog: &'a C, images: &'a I, config: PipelineConfig) -> Self {
        Self {
            catalog,
            images,
            registry: None,
            config,
        }
    }

    /// Attach the duplicate-generation guard shared across requests.
    #[must_use]
    pub const fn with_registry(mut self, registry: &'a GenerationRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Process one player, always returning a result.
    ///
    /// Structurally unusable player entries (missing id or name) yield an
    /// ERROR result; everything else runs the stage sequence with per-stage
    /// failure isolation.
    #[must_use]
    pub fn process(&self, player: &PlayerData) -> ProcessingResult {
        let started = Instant::now();

        if player.id.trim().is_empty() || player.name.trim().is_empty() {
            let mut result = ProcessingResult::error(
                &player.id,
                &player.name,
                player.total_cost,
                "player entry is missing an id or name",
            );
            result.processing_time = started.elapsed().as_secs_f64();
            return result;
        }

        let mut result = ProcessingResult::placeholder(&player.id, &player.name, player.total_cost);
        let mut trace = ReasoningTrace::new();

        let non_skip = player.non_skip_selections();
        let route = SelectionRoute::classify(non_skip.len());
        trace.push(
            ReasoningStep::new(
                "interpret_selections",
                json!({ "selections": &player.selections, "non_skip_count": non_skip.len() }),
                json!({ "route": route.as_str() }),
                format!(
                    "Mapped {} selections to route {}",
                    player.selections.len(),
                    route.as_str()
                ),
            )
            .with_context(format!(
                "Player {} selected: {}",
                player.name,
                player.selections.join(", ")
            )),
        );

        if route == SelectionRoute::AllSkips {
            return self.finalize_all_skips(player, result, trace, started);
        }

        let spec = self.interpret(&non_skip, &mut trace);
        let enhanced = self.apply_personality(player, &spec, &mut trace);
        self.calculate_cost(player, &enhanced, &mut result, &mut trace);
        let instructions = self.image_instructions(&enhanced, &mut trace);
        result.image_instructions = instructions.clone();
        if !self.config.skip_image_generation {
            self.generate_image(player, &instructions, &mut result, &mut trace);
        }

        self.finalize(&enhanced, result, trace, started)
    }

    /// Short-circuit for all-skip players: one scoop of vanilla, zero
    /// ingredients, zero cost. Personality, cost, and image stages are
    /// skipped entirely.
    fn finalize_all_skips(
        &self,
        player: &PlayerData,
        mut result: ProcessingResult,
        mut trace: ReasoningTrace,
        started: Instant,
    ) -> ProcessingResult {
        result.image_instructions = ImageInstructions::default();
        result.cost_validation = CostValidation {
            frontend_cost: player.total_cost,
            calculated_cost: 0.0,
            difference: -player.total_cost,
            validation_status: ValidationStatus::FrontendIgnored,
            calculation_method: "ingredient_database".to_string(),
            details: Some("all skips".to_string()),
        };
        trace.push(ReasoningStep::new(
            "handle_all_skips",
            json!({ "selections": &player.selections }),
            json!({ "scoops": 1, "flavors": ["vanilla"], "cost": 0.0 }),
            "Player skipped all selections, defaulting to simple vanilla",
        ));
        result.reasoning_steps = trace.into_steps();
        result.processing_time = started.elapsed().as_secs_f64();
        result
    }

    /// Resolve each non-skip selection and union the results, preserving
    /// first-seen order. Resolution misses are fallbacks, never errors.
    fn interpret(&self, non_skip: &[String], trace: &mut ReasoningTrace) -> IceCreamSpec {
        let resolver = SelectionResolver::new(self.catalog);
        let mut flavors = Vec::new();
        let mut toppings = Vec::new();
        let mut notes = Vec::new();

        for selection in non_skip {
            let resolved = resolver.resolve(selection);
            notes.push(format!(
                "'{}' -> flavors: [{}], toppings: [{}]",
                selection,
                resolved.flavors.join(", "),
                resolved.toppings.join(", ")
            ));
            flavors.extend(resolved.flavors);
            toppings.extend(resolved.toppings);
        }

        let mut flavors = dedup_preserving(flavors);
        let toppings = dedup_preserving(toppings);
        if flavors.is_empty() {
            flavors.push(crate::selection::default_flavor());
        }
        let scoops = u32::try_from(non_skip.len())
            .unwrap_or(MAX_SCOOPS)
            .clamp(MIN_SCOOPS, MAX_SCOOPS);

        let spec = IceCreamSpec {
            flavors,
            toppings,
            scoops,
            interpretation: notes.join("; "),
        };
        trace.push(ReasoningStep::new(
            "map_to_ingredients",
            json!({ "non_skip": non_skip }),
            json!({
                "flavors": &spec.flavors,
                "toppings": &spec.toppings,
                "scoops": spec.scoops,
            }),
            spec.interpretation.clone(),
        ));
        spec
    }

    /// Personality stage; skipped for absent, empty, or sentinel profiles
    /// and for caller opt-out.
    fn apply_personality(
        &self,
        player: &PlayerData,
        spec: &IceCreamSpec,
        trace: &mut ReasoningTrace,
    ) -> EnhancedSpec {
        let profile = player.personality.as_ref();
        if should_skip_enhancement(profile, self.config.skip_personality_enhancement) {
            trace.push(ReasoningStep::new(
                "apply_personality_influence",
                json!({ "personality": profile.map(|p| p.name.clone()) }),
                json!({ "applied": false }),
                "Personality enhancement skipped",
            ));
            return EnhancedSpec::unchanged(spec);
        }

        // should_skip_enhancement returned false, so the profile is present.
        let Some(profile) = profile else {
            return EnhancedSpec::unchanged(spec);
        };

        let enhancer = PersonalityEnhancer::new(self.catalog);
        let enhanced = enhancer.enhance(spec, profile);
        trace.push(
            ReasoningStep::new(
                "apply_personality_influence",
                json!({ "personality": &profile.name, "base_flavors": &spec.flavors }),
                json!({
                    "applied": true,
                    "enhancements": &enhanced.enhancements,
                    "suggested_ingredients": &enhanced.suggested_ingredients,
                }),
                format!(
                    "Applied personality '{}' ({} enhancements)",
                    profile.name,
                    enhanced.enhancements.len()
                ),
            )
            .with_context(format!(
                "Personality insights: {}",
                profile.insights.join(", ")
            )),
        );
        enhanced
    }

    /// Price the enhanced build with the full-breakdown formula. The client
    /// claimed total is never an input.
    fn calculate_cost(
        &self,
        player: &PlayerData,
        enhanced: &EnhancedSpec,
        result: &mut ProcessingResult,
        trace: &mut ReasoningTrace,
    ) {
        let engine = CostEngine::new(self.catalog);
        let breakdown =
            engine.cost_with_breakdown(&enhanced.flavors, &enhanced.toppings, enhanced.scoops);

        result.total_cost = breakdown.total_cost;
        result.cost_validation = CostValidation {
            frontend_cost: player.total_cost,
            calculated_cost: breakdown.total_cost,
            difference: breakdown.total_cost - player.total_cost,
            validation_status: ValidationStatus::FrontendIgnored,
            calculation_method: "ingredient_database".to_string(),
            details: Some(format!(
                "subtotal ${:.2}, markup {:.0}%",
                breakdown.subtotal, breakdown.markup_percentage
            )),
        };
        trace.push(ReasoningStep::new(
            "calculate_costs_from_database",
            json!({ "flavors": &enhanced.flavors, "toppings": &enhanced.toppings, "scoops": enhanced.scoops }),
            json!({
                "total_cost": breakdown.total_cost,
                "markup_percentage": breakdown.markup_percentage,
                "scoop_multiplier": breakdown.scoop_multiplier,
            }),
            format!(
                "Backend calculated cost: ${:.2} (frontend ignored)",
                breakdown.total_cost
            ),
        ));
    }

    /// Cap the build to what fits in one image: three flavors, five toppings.
    fn image_instructions(
        &self,
        enhanced: &EnhancedSpec,
        trace: &mut ReasoningTrace,
    ) -> ImageInstructions {
        let instructions = ImageInstructions {
            scoops: enhanced.scoops,
            flavors: enhanced
                .flavors
                .iter()
                .take(MAX_IMAGE_FLAVORS)
                .cloned()
                .collect(),
            toppings: enhanced
                .toppings
                .iter()
                .take(MAX_IMAGE_TOPPINGS)
                .cloned()
                .collect(),
        };
        trace.push(ReasoningStep::new(
            "generate_image_instructions",
            json!({ "flavors": enhanced.flavors.len(), "toppings": enhanced.toppings.len() }),
            json!({
                "scoops": instructions.scoops,
                "flavors": &instructions.flavors,
                "toppings": &instructions.toppings,
            }),
            format!(
                "Image instructions: {} scoops with {} flavors",
                instructions.scoops,
                instructions.flavors.len()
            ),
        ));
        instructions
    }

    /// External image generation. Guarded against duplicate in-flight
    /// generation per player/session key; provider failures (including
    /// panics across the collaborator boundary) degrade to the placeholder.
    fn generate_image(
        &self,
        player: &PlayerData,
        instructions: &ImageInstructions,
        result: &mut ProcessingResult,
        trace: &mut ReasoningTrace,
    ) {
        let key = match &self.config.session_key {
            Some(session) => format!("{session}:{}", player.id),
            None => player.id.clone(),
        };

        if let Some(registry) = self.registry
            && !registry.try_begin(&key)
        {
            trace.push(ReasoningStep::new(
                "generate_actual_image",
                json!({ "key": key }),
                json!({ "skipped": "generation already in progress" }),
                "Skipped image generation: another request is already generating for this key",
            ));
            return;
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.images.generate(instructions, &player.name)
        }))
        .unwrap_or_else(|_| {
            result
                .processing_errors
                .push("image provider panicked during generation".to_string());
            ImageOutcome::failure()
        });

        if let Some(registry) = self.registry {
            registry.complete(&key);
        }

        result.image_generation_success = outcome.success;
        result.generated_image_url = outcome.url.clone();
        result.generated_image_path = outcome.path.clone();
        if !outcome.success {
            warn!("image generation failed for player {}", player.id);
        }

        trace.push(ReasoningStep::new(
            "generate_actual_image",
            json!({
                "ingredients": instructions.ingredients(),
                "scoops": instructions.scoops,
            }),
            json!({
                "success": outcome.success,
                "image_url": outcome.url,
                "local_path": outcome.path,
            }),
            format!(
                "Generated ice cream image for {} ingredients with {} scoops",
                instructions.ingredients().len(),
                instructions.scoops
            ),
        ));
    }

    /// Collect the final ingredient set, allergy warnings, per-ingredient
    /// costs, and timing.
    fn finalize(
        &self,
        enhanced: &EnhancedSpec,
        mut result: ProcessingResult,
        trace: ReasoningTrace,
        started: Instant,
    ) -> ProcessingResult {
        let engine = CostEngine::new(self.catalog);
        result.selected_ingredients = enhanced.ingredients();
        result.allergy_warnings = allergy_warnings(self.catalog, &result.selected_ingredients);
        result.cost_breakdown = engine.ingredients_cost(&result.selected_ingredients);
        result.personality_influence = enhanced.enhancements.clone();
        result.reasoning_steps = trace.into_steps();
        result.processing_time = started.elapsed().as_secs_f64();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::image::MockImageProvider;
    use crate::personality::PersonalityProfile;

    fn player(id: &str, name: &str, selections: &[&str]) -> PlayerData {
        PlayerData {
            id: id.to_string(),
            name: name.to_string(),
            selections: selections.iter().map(ToString::to_string).collect(),
            total_cost: 0.0,
            ai_interactions: Vec::new(),
            personality: None,
        }
    }

    fn rich_personality() -> PersonalityProfile {
        PersonalityProfile {
            name: "The Rich Connoisseur".to_string(),
            description: "loves rich desserts".to_string(),
            insights: vec!["indulgent".to_string()],
            ..PersonalityProfile::default()
        }
    }

    struct PanickingProvider;
    impl ImageProvider for PanickingProvider {
        fn generate(&self, _: &ImageInstructions, _: &str) -> ImageOutcome {
            panic!("provider exploded");
        }
    }

    struct FailingProvider;
    impl ImageProvider for FailingProvider {
        fn generate(&self, _: &ImageInstructions, _: &str) -> ImageOutcome {
            ImageOutcome::failure()
        }
    }

    #[test]
    fn all_skip_players_short_circuit_to_minimal_result() {
        let catalog = MemoryCatalog::with_default_inventory();
        let images = MockImageProvider;
        let pipeline = PlayerPipeline::new(&catalog, &images, PipelineConfig::default());

        let mut p = player("p1", "Ada", &["Skip", "skip", "SKIP"]);
        p.total_cost = 7.5;
        let result = pipeline.process(&p);

        assert_eq!(result.image_instructions.scoops, 1);
        assert_eq!(result.image_instructions.flavors, vec!["vanilla"]);
        assert!(result.image_instructions.toppings.is_empty());
        assert!((result.total_cost - 0.0).abs() < f64::EPSILON);
        assert!(result.selected_ingredients.is_empty());
        assert_eq!(
            result.cost_validation.details.as_deref(),
            Some("all skips")
        );
        assert!((result.cost_validation.difference - -7.5).abs() < 1e-9);
        assert!(result.is_success());
        // No personality, cost, or image stages ran.
        assert!(
            result
                .reasoning_steps
                .iter()
                .all(|s| s.action != "generate_actual_image")
        );
    }

    #[test]
    fn scoops_clamp_to_the_non_skip_selection_count() {
        let catalog = MemoryCatalog::with_default_inventory();
        let images = MockImageProvider;
        let pipeline = PlayerPipeline::new(&catalog, &images, PipelineConfig::default());

        let one = pipeline.process(&player("p1", "Ada", &["Rich"]));
        assert_eq!(one.image_instructions.scoops, 1);

        let many = pipeline.process(&player(
            "p2",
            "Grace",
            &["Rich", "Crunchy", "Sweet", "Fruity"],
        ));
        assert_eq!(many.image_instructions.scoops, 3);
    }

    #[test]
    fn cost_is_computed_from_ingredients_not_the_claimed_total() {
        let catalog = MemoryCatalog::with_default_inventory();
        let images = MockImageProvider;
        let pipeline = PlayerPipeline::new(&catalog, &images, PipelineConfig::default());

        let mut honest = player("p1", "Ada", &["Rich"]);
        honest.total_cost = 3.0;
        let mut inflated = player("p1", "Ada", &["Rich"]);
        inflated.total_cost = 99.0;

        let a = pipeline.process(&honest);
        let b = pipeline.process(&inflated);
        assert!((a.total_cost - b.total_cost).abs() < 1e-9);
        assert_eq!(
            a.cost_validation.validation_status,
            ValidationStatus::FrontendIgnored
        );
        assert!(b.cost_validation.has_discrepancy());
    }

    #[test]
    fn image_instructions_cap_flavors_and_toppings() {
        let catalog = MemoryCatalog::with_default_inventory();
        let images = MockImageProvider;
        let pipeline = PlayerPipeline::new(&catalog, &images, PipelineConfig::default());

        let result = pipeline.process(&player(
            "p1",
            "Ada",
            &["Rich", "Crunchy", "Sweet", "Fruity", "Creamy"],
        ));
        assert!(result.image_instructions.flavors.len() <= 3);
        assert!(result.image_instructions.toppings.len() <= 5);
        assert_eq!(result.image_instructions.scoops, 3);
        // The full ingredient set is preserved outside the image cap.
        assert!(result.selected_ingredients.len() >= result.image_instructions.flavors.len());
    }

    #[test]
    fn personality_gets_applied_only_when_meaningful() {
        let catalog = MemoryCatalog::with_default_inventory();
        let images = MockImageProvider;
        let pipeline = PlayerPipeline::new(&catalog, &images, PipelineConfig::default());

        let mut with = player("p1", "Ada", &["Crunchy"]);
        with.personality = Some(rich_personality());
        let enhanced = pipeline.process(&with);
        assert!(enhanced.personality_influence.contains_key("enhancement"));

        let mut sentinel = player("p2", "Grace", &["Crunchy"]);
        sentinel.personality = Some(PersonalityProfile {
            name: "Empty".to_string(),
            insights: vec!["x".to_string()],
            ..PersonalityProfile::default()
        });
        let plain = pipeline.process(&sentinel);
        assert!(plain.personality_influence.is_empty());

        let config = PipelineConfig {
            skip_personality_enhancement: true,
            ..PipelineConfig::default()
        };
        let opted_out = PlayerPipeline::new(&catalog, &images, config);
        let mut again = player("p3", "Joan", &["Crunchy"]);
        again.personality = Some(rich_personality());
        let skipped = opted_out.process(&again);
        assert!(skipped.personality_influence.is_empty());
    }

    #[test]
    fn provider_panic_is_isolated_to_the_player() {
        let catalog = MemoryCatalog::with_default_inventory();
        let images = PanickingProvider;
        let pipeline = PlayerPipeline::new(&catalog, &images, PipelineConfig::default());

        let result = pipeline.process(&player("p1", "Ada", &["Rich"]));
        assert!(!result.image_generation_success);
        assert!(result.generated_image_url.is_none());
        assert!(
            result
                .processing_errors
                .iter()
                .any(|e| e.contains("panicked"))
        );
        // Cost and ingredients survived the image failure.
        assert!(result.total_cost > 0.0);
        assert!(!result.selected_ingredients.is_empty());
    }

    #[test]
    fn provider_failure_degrades_without_marking_the_player_failed() {
        let catalog = MemoryCatalog::with_default_inventory();
        let images = FailingProvider;
        let pipeline = PlayerPipeline::new(&catalog, &images, PipelineConfig::default());

        let result = pipeline.process(&player("p1", "Ada", &["Rich"]));
        assert!(!result.image_generation_success);
        assert!(result.is_success());
    }

    #[test]
    fn duplicate_generation_is_blocked_by_the_registry() {
        let catalog = MemoryCatalog::with_default_inventory();
        let images = MockImageProvider;
        let registry = GenerationRegistry::new();
        let config = PipelineConfig {
            session_key: Some("session-1".to_string()),
            ..PipelineConfig::default()
        };
        let pipeline =
            PlayerPipeline::new(&catalog, &images, config).with_registry(&registry);

        // Simulate a generation already in flight for this key.
        assert!(registry.try_begin("session-1:p1"));
        let blocked = pipeline.process(&player("p1", "Ada", &["Rich"]));
        assert!(!blocked.image_generation_success);

        registry.complete("session-1:p1");
        let allowed = pipeline.process(&player("p1", "Ada", &["Rich"]));
        assert!(allowed.image_generation_success);
    }

    #[test]
    fn structurally_invalid_players_become_error_results() {
        let catalog = MemoryCatalog::with_default_inventory();
        let images = MockImageProvider;
        let pipeline = PlayerPipeline::new(&catalog, &images, PipelineConfig::default());

        let result = pipeline.process(&player("", "", &["Rich"]));
        assert_eq!(
            result.cost_validation.validation_status,
            ValidationStatus::Error
        );
        assert!(!result.is_success());
        assert_eq!(result.image_instructions.scoops, 1);
    }

    #[test]
    fn reasoning_trace_is_ordered_and_complete() {
        let catalog = MemoryCatalog::with_default_inventory();
        let images = MockImageProvider;
        let pipeline = PlayerPipeline::new(&catalog, &images, PipelineConfig::default());

        let result = pipeline.process(&player("p1", "Ada", &["Rich", "Crunchy"]));
        let numbers: Vec<u32> = result
            .reasoning_steps
            .iter()
            .map(|s| s.step_number)
            .collect();
        let expected: Vec<u32> = (1..=numbers.len() as u32).collect();
        assert_eq!(numbers, expected);

        let actions: Vec<&str> = result
            .reasoning_steps
            .iter()
            .map(|s| s.action.as_str())
            .collect();
        assert!(actions.contains(&"interpret_selections"));
        assert!(actions.contains(&"calculate_costs_from_database"));
        assert!(actions.contains(&"generate_actual_image"));
    }
}
