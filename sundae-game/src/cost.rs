//! Authoritative cost computation from the ingredient catalog.
//!
//! Client-submitted totals are never an input to any price here; every number
//! is derived from catalog lookups plus the fixed formula constants.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::catalog::{IngredientCatalog, contains_ci};
use crate::constants::{
    BASE_MARKUP_PCT, BULK_TIER_LARGE_ITEMS, BULK_TIER_LARGE_PCT, BULK_TIER_MEDIUM_ITEMS,
    BULK_TIER_MEDIUM_PCT, BULK_TIER_SMALL_ITEMS, BULK_TIER_SMALL_PCT, CLAIMED_COST_TOLERANCE,
    FLAT_BASE_COST, FLAT_MARKUP_FACTOR, FLAVOR_FALLBACK_COST, MARKUP_CAP_PCT,
    MAX_REASONABLE_COST_PER_SCOOP, MAX_REASONABLE_FLAVORS, MAX_REASONABLE_TOPPINGS,
    MIN_REASONABLE_COST_PER_SCOOP, PREMIUM_KEYWORDS, PREMIUM_MARKUP_STEP_PCT, PREP_BASE_COST,
    PREP_EXTRA_FLAVOR_COST, PREP_EXTRA_TOPPING_COST, PREP_FREE_TOPPINGS, SCOOP_COST_FACTOR,
    SERVICE_COST, TOPPING_FALLBACK_COST,
};
use crate::numbers::{round2, u32_to_f64, usize_to_f64};
use crate::selection::{SelectionResolver, dedup_preserving, is_skip};

/// Input-validation failures. These reject the call outright; they are never
/// converted into fallback values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CostError {
    #[error("cost and quantity lists must have the same length ({costs} vs {quantities})")]
    MismatchedLengths { costs: usize, quantities: usize },
}

/// Complete cost analysis produced by the full-breakdown formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub flavor_costs: BTreeMap<String, f64>,
    pub topping_costs: BTreeMap<String, f64>,
    /// Flavor portion after the scoop multiplier.
    pub flavor_total: f64,
    pub topping_total: f64,
    pub preparation_cost: f64,
    pub service_cost: f64,
    pub markup_percentage: f64,
    pub markup_amount: f64,
    pub subtotal: f64,
    /// Authoritative total, rounded to two decimals.
    pub total_cost: f64,
    pub scoops: u32,
    pub scoop_multiplier: f64,
    pub cost_per_scoop: f64,
}

/// Result of checking a client-claimed total against the backend price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimedCostCheck {
    pub is_valid: bool,
    pub backend_cost: f64,
    pub discrepancy: f64,
    /// Accepted relative deviation from the backend cost.
    pub tolerance: f64,
}

/// Bulk discount applied to a group order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkDiscount {
    pub original_total: f64,
    pub discount_percentage: f64,
    pub discount_amount: f64,
    pub final_total: f64,
    pub savings: f64,
    pub average_per_item: f64,
}

/// Overall verdict of the reasonableness validator. Advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Assessment {
    Reasonable,
    AcceptableWithNotes,
    NeedsReview,
}

/// Advisory report on a computed total; never blocks processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonablenessReport {
    pub assessment: Assessment,
    pub cost_per_scoop: f64,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub is_reasonable: bool,
}

/// Computes authoritative prices from catalog lookups.
#[derive(Debug, Clone, Copy)]
pub struct CostEngine<'a, C: IngredientCatalog> {
    catalog: &'a C,
}

impl<'a, C: IngredientCatalog> CostEngine<'a, C> {
    #[must_use]
    pub const fn new(catalog: &'a C) -> Self {
        Self { catalog }
    }

    /// Per-flavor costs: catalog unit cost, or the flavor fallback when the
    /// ingredient is unknown or unpriced.
    #[must_use]
    pub fn flavor_costs(&self, flavors: &[String]) -> BTreeMap<String, f64> {
        flavors
            .iter()
            .map(|name| (name.clone(), self.unit_cost_or(name, FLAVOR_FALLBACK_COST)))
            .collect()
    }

    /// Per-topping costs with the cheaper topping fallback.
    #[must_use]
    pub fn topping_costs(&self, toppings: &[String]) -> BTreeMap<String, f64> {
        toppings
            .iter()
            .map(|name| (name.clone(), self.unit_cost_or(name, TOPPING_FALLBACK_COST)))
            .collect()
    }

    fn unit_cost_or(&self, name: &str, fallback: f64) -> f64 {
        self.catalog
            .get_by_name(name)
            .and_then(|record| record.unit_cost())
            .unwrap_or(fallback)
    }

    /// The full-breakdown price for a resolved ingredient set.
    ///
    /// Flavor cost scales with the scoop multiplier `max(1.0, scoops * 0.8)`;
    /// preparation cost grows with flavor and topping counts; markup rises 5%
    /// per premium ingredient from a 15% base, capped at 35%.
    #[must_use]
    pub fn cost_with_breakdown(
        &self,
        flavors: &[String],
        toppings: &[String],
        scoops: u32,
    ) -> CostBreakdown {
        let flavor_costs = self.flavor_costs(flavors);
        let topping_costs = self.topping_costs(toppings);

        let base_flavor_cost: f64 = flavor_costs.values().sum();
        let topping_total: f64 = topping_costs.values().sum();

        let scoop_multiplier = (u32_to_f64(scoops) * SCOOP_COST_FACTOR).max(1.0);
        let flavor_total = base_flavor_cost * scoop_multiplier;

        let preparation_cost = preparation_cost(flavors.len(), toppings.len());
        let subtotal = flavor_total + topping_total + preparation_cost + SERVICE_COST;

        let markup_percentage = markup_percentage(flavors, toppings);
        let markup_amount = subtotal * (markup_percentage / 100.0);
        let total_cost = round2(subtotal + markup_amount);

        let cost_per_scoop = if scoops > 0 {
            round2(total_cost / u32_to_f64(scoops))
        } else {
            0.0
        };

        CostBreakdown {
            flavor_costs,
            topping_costs,
            flavor_total,
            topping_total,
            preparation_cost,
            service_cost: SERVICE_COST,
            markup_percentage,
            markup_amount,
            subtotal,
            total_cost,
            scoops,
            scoop_multiplier,
            cost_per_scoop,
        }
    }

    /// Full-breakdown price straight from a selection list: skips are
    /// dropped, the remainder is resolved to ingredients, and the resolved
    /// set is priced with [`Self::cost_with_breakdown`].
    #[must_use]
    pub fn breakdown_for_selections(&self, selections: &[String], scoops: u32) -> CostBreakdown {
        let resolver = SelectionResolver::new(self.catalog);
        let mut flavors = Vec::new();
        let mut toppings = Vec::new();
        for selection in selections {
            if is_skip(selection) {
                continue;
            }
            let resolved = resolver.resolve(selection);
            flavors.extend(resolved.flavors);
            toppings.extend(resolved.toppings);
        }
        let flavors = dedup_preserving(flavors);
        let toppings = dedup_preserving(toppings);
        self.cost_with_breakdown(&flavors, &toppings, scoops)
    }

    /// Per-ingredient costs for a resolved selection, including only
    /// ingredients with a known catalog price.
    #[must_use]
    pub fn selection_cost_breakdown(&self, selection: &str) -> BTreeMap<String, f64> {
        let resolver = SelectionResolver::new(self.catalog);
        let resolved = resolver.resolve(selection);
        resolved
            .ingredients()
            .into_iter()
            .filter_map(|name| {
                self.catalog
                    .get_by_name(&name)
                    .and_then(|record| record.unit_cost())
                    .map(|cost| (name, cost))
            })
            .collect()
    }

    /// Known catalog costs for a list of specific ingredient names.
    #[must_use]
    pub fn ingredients_cost(&self, ingredients: &[String]) -> BTreeMap<String, f64> {
        ingredients
            .iter()
            .filter_map(|name| {
                self.catalog
                    .get_by_name(name)
                    .and_then(|record| record.unit_cost())
                    .map(|cost| (name.clone(), cost))
            })
            .collect()
    }

    /// The flat real-time pricing formula: summed per-selection ingredient
    /// costs, a 1.5 base, and a flat 15% markup.
    ///
    /// This is intentionally a different, simpler formula than
    /// [`Self::cost_with_breakdown`]; call sites depend on each independently.
    #[must_use]
    pub fn authoritative_cost(&self, selections: &[String]) -> f64 {
        let mut total: f64 = 0.0;
        for selection in selections {
            if is_skip(selection) {
                continue;
            }
            total += self.selection_cost_breakdown(selection).values().sum::<f64>();
        }
        total += FLAT_BASE_COST;
        round2(total * FLAT_MARKUP_FACTOR)
    }

    /// Compare a client-claimed total against the flat backend price.
    #[must_use]
    pub fn validate_cost(&self, selections: &[String], claimed_total: f64) -> ClaimedCostCheck {
        let backend_cost = self.authoritative_cost(selections);
        let discrepancy = round2((claimed_total - backend_cost).abs());
        let is_valid = discrepancy <= backend_cost * CLAIMED_COST_TOLERANCE;
        ClaimedCostCheck {
            is_valid,
            backend_cost,
            discrepancy,
            tolerance: CLAIMED_COST_TOLERANCE,
        }
    }
}

/// Preparation cost: a 0.5 base plus mixing complexity for extra flavors and
/// assembly time beyond two toppings. Both surcharges floor at zero.
#[must_use]
pub fn preparation_cost(num_flavors: usize, num_toppings: usize) -> f64 {
    let flavor_complexity =
        usize_to_f64(num_flavors.saturating_sub(1)) * PREP_EXTRA_FLAVOR_COST;
    let topping_complexity =
        usize_to_f64(num_toppings.saturating_sub(PREP_FREE_TOPPINGS)) * PREP_EXTRA_TOPPING_COST;
    PREP_BASE_COST + flavor_complexity + topping_complexity
}

/// Markup percentage: 15% base plus 5% per premium ingredient, capped at 35%.
/// An ingredient is premium when its name contains a luxury keyword.
#[must_use]
pub fn markup_percentage(flavors: &[String], toppings: &[String]) -> f64 {
    let premium_count = flavors
        .iter()
        .chain(toppings.iter())
        .filter(|name| {
            PREMIUM_KEYWORDS
                .iter()
                .any(|keyword| contains_ci(name, keyword))
        })
        .count();
    (BASE_MARKUP_PCT + usize_to_f64(premium_count) * PREMIUM_MARKUP_STEP_PCT).min(MARKUP_CAP_PCT)
}

/// Bulk discount for a group order: weighted total with a step-function
/// discount by total item count. The discount is never compounded with
/// markup and never exceeds the undiscounted total.
///
/// # Errors
///
/// Returns [`CostError::MismatchedLengths`] when the two lists differ in
/// length; mismatched input is rejected, never guessed at.
pub fn bulk_discount(
    individual_costs: &[f64],
    quantities: &[u32],
) -> Result<BulkDiscount, CostError> {
    if individual_costs.len() != quantities.len() {
        return Err(CostError::MismatchedLengths {
            costs: individual_costs.len(),
            quantities: quantities.len(),
        });
    }

    let total_individual: f64 = individual_costs
        .iter()
        .zip(quantities.iter())
        .map(|(cost, qty)| cost * u32_to_f64(*qty))
        .sum();
    let total_items: u32 = quantities.iter().sum();

    let discount_percentage = if total_items >= BULK_TIER_LARGE_ITEMS {
        BULK_TIER_LARGE_PCT
    } else if total_items >= BULK_TIER_MEDIUM_ITEMS {
        BULK_TIER_MEDIUM_PCT
    } else if total_items >= BULK_TIER_SMALL_ITEMS {
        BULK_TIER_SMALL_PCT
    } else {
        0.0
    };

    let discount_amount = total_individual * (discount_percentage / 100.0);
    let final_total = total_individual - discount_amount;
    let average_per_item = if total_items > 0 {
        round2(final_total / u32_to_f64(total_items))
    } else {
        0.0
    };

    Ok(BulkDiscount {
        original_total: round2(total_individual),
        discount_percentage,
        discount_amount: round2(discount_amount),
        final_total: round2(final_total),
        savings: round2(discount_amount),
        average_per_item,
    })
}

/// Flag totals that look too cheap or too expensive for their build.
/// Advisory only; never blocks processing.
#[must_use]
pub fn validate_cost_reasonableness(
    total_cost: f64,
    scoops: u32,
    flavors: &[String],
    toppings: &[String],
) -> ReasonablenessReport {
    let mut warnings = Vec::new();
    let mut recommendations = Vec::new();

    let cost_per_scoop = if scoops > 0 {
        total_cost / u32_to_f64(scoops)
    } else {
        total_cost
    };

    if cost_per_scoop < MIN_REASONABLE_COST_PER_SCOOP {
        warnings.push("Cost per scoop seems unusually low".to_string());
        recommendations
            .push("Consider increasing portion sizes or ingredient quality".to_string());
    } else if cost_per_scoop > MAX_REASONABLE_COST_PER_SCOOP {
        warnings.push("Cost per scoop is quite high".to_string());
        recommendations.push("Consider optimizing ingredient selection or portions".to_string());
    }

    if flavors.len() > MAX_REASONABLE_FLAVORS {
        warnings.push("Many flavors may create confusing taste profile".to_string());
        recommendations.push("Consider limiting to 3-4 complementary flavors".to_string());
    }

    if toppings.len() > MAX_REASONABLE_TOPPINGS {
        warnings.push("Too many toppings may overwhelm the ice cream".to_string());
        recommendations.push("Focus on 3-5 key toppings for better balance".to_string());
    }

    let assessment = match warnings.len() {
        0 => Assessment::Reasonable,
        1 | 2 => Assessment::AcceptableWithNotes,
        _ => Assessment::NeedsReview,
    };

    ReasonablenessReport {
        assessment,
        cost_per_scoop: round2(cost_per_scoop),
        warnings,
        recommendations,
        is_reasonable: matches!(
            assessment,
            Assessment::Reasonable | Assessment::AcceptableWithNotes
        ),
    }
}
