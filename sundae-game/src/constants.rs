//! Centralized pricing and tuning constants for Sundae game logic.
//!
//! These values define the deterministic math for cost calculation and
//! selection resolution. Keeping them together ensures that pricing can only
//! be adjusted via code changes reviewed in version control, rather than
//! through external assets.

// Per-category fallback costs -----------------------------------------------
/// Cost assumed for a flavor-level ingredient with no catalog price.
pub(crate) const FLAVOR_FALLBACK_COST: f64 = 5.0;
/// Cost assumed for a topping with no catalog price.
pub(crate) const TOPPING_FALLBACK_COST: f64 = 2.0;

// Full-breakdown formula -----------------------------------------------------
pub(crate) const SERVICE_COST: f64 = 1.0;
pub(crate) const PREP_BASE_COST: f64 = 0.5;
/// Mixing complexity surcharge per flavor beyond the first.
pub(crate) const PREP_EXTRA_FLAVOR_COST: f64 = 0.3;
/// Assembly surcharge per topping beyond [`PREP_FREE_TOPPINGS`].
pub(crate) const PREP_EXTRA_TOPPING_COST: f64 = 0.2;
pub(crate) const PREP_FREE_TOPPINGS: usize = 2;
/// Each scoop adds this fraction of the base flavor cost; floored at 1x.
pub(crate) const SCOOP_COST_FACTOR: f64 = 0.8;
pub(crate) const BASE_MARKUP_PCT: f64 = 15.0;
pub(crate) const PREMIUM_MARKUP_STEP_PCT: f64 = 5.0;
pub(crate) const MARKUP_CAP_PCT: f64 = 35.0;

// Flat real-time pricing formula ---------------------------------------------
pub(crate) const FLAT_BASE_COST: f64 = 1.5;
pub(crate) const FLAT_MARKUP_FACTOR: f64 = 1.15;

// Bulk discount tiers --------------------------------------------------------
pub(crate) const BULK_TIER_LARGE_ITEMS: u32 = 10;
pub(crate) const BULK_TIER_LARGE_PCT: f64 = 15.0;
pub(crate) const BULK_TIER_MEDIUM_ITEMS: u32 = 5;
pub(crate) const BULK_TIER_MEDIUM_PCT: f64 = 10.0;
pub(crate) const BULK_TIER_SMALL_ITEMS: u32 = 3;
pub(crate) const BULK_TIER_SMALL_PCT: f64 = 5.0;

// Reasonableness thresholds --------------------------------------------------
pub(crate) const MIN_REASONABLE_COST_PER_SCOOP: f64 = 3.0;
pub(crate) const MAX_REASONABLE_COST_PER_SCOOP: f64 = 12.0;
pub(crate) const MAX_REASONABLE_FLAVORS: usize = 4;
pub(crate) const MAX_REASONABLE_TOPPINGS: usize = 6;

// Cost validation ------------------------------------------------------------
/// Differences below this threshold are floating-point noise, not discrepancies.
pub(crate) const COST_DISCREPANCY_EPSILON: f64 = 0.01;
/// Claimed totals within this fraction of the backend cost are accepted.
pub(crate) const CLAIMED_COST_TOLERANCE: f64 = 0.10;

// Pipeline shape -------------------------------------------------------------
pub(crate) const MIN_SCOOPS: u32 = 1;
pub(crate) const MAX_SCOOPS: u32 = 3;
pub(crate) const MAX_IMAGE_FLAVORS: usize = 3;
pub(crate) const MAX_IMAGE_TOPPINGS: usize = 5;
pub(crate) const DEFAULT_FLAVOR: &str = "vanilla";

// Selection resolution -------------------------------------------------------
/// Maximum catalog matches returned for an unmapped selection.
pub(crate) const FUZZY_MATCH_LIMIT: usize = 3;

// Keyword tables -------------------------------------------------------------
/// Ingredient names containing any of these count as premium for markup.
pub(crate) const PREMIUM_KEYWORDS: &[&str] =
    &["mascarpone", "espresso", "premium", "artisan", "organic"];

/// Resolved ingredient names containing any of these are toppings; the rest
/// are flavors.
pub(crate) const TOPPING_KEYWORDS: &[&str] = &[
    "sauce",
    "drizzle",
    "chips",
    "sprinkles",
    "nuts",
    "crumbs",
    "pieces",
];

// Personality enhancement ----------------------------------------------------
/// Profile names that disable enhancement entirely.
pub(crate) const PERSONALITY_SKIP_SENTINELS: &[&str] = &["empty", "none", "basic"];
pub(crate) const MAX_SUGGESTED_INGREDIENTS: usize = 5;
/// At most this many suggested ingredients are appended to the flavor list.
pub(crate) const MAX_ENHANCEMENT_FLAVORS: usize = 2;

// Sessions -------------------------------------------------------------------
pub(crate) const SESSION_TTL_HOURS: i64 = 24;
