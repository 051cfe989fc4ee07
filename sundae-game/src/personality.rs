//! Deterministic personality-driven embellishment of a base build.
//!
//! Personality profiles are rule *input* only: keyword containment against
//! the profile text drives a fixed, ordered rule set. Nothing here is
//! free-text interpretation.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::IngredientCatalog;
use crate::constants::{
    MAX_ENHANCEMENT_FLAVORS, MAX_SUGGESTED_INGREDIENTS, PERSONALITY_SKIP_SENTINELS,
};
use crate::selection::{IceCreamSpec, dedup_preserving};

/// Generated personality data attached to a player.
///
/// `emoji`, `color`, and `gradient` are presentation passthrough from the
/// frontend; core logic only reads `name`, `description`, and `insights`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersonalityProfile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub emoji: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub gradient: String,
}

impl PersonalityProfile {
    /// The lowercased text the enhancement rules match against.
    #[must_use]
    fn rule_text(&self) -> String {
        format!("{} {}", self.name, self.description).to_lowercase()
    }

    /// The lowercased text the ingredient-suggestion table matches against,
    /// which additionally includes the insight tags.
    #[must_use]
    fn suggestion_text(&self) -> String {
        format!(
            "{} {} {}",
            self.name,
            self.description,
            self.insights.join(" ")
        )
        .to_lowercase()
    }
}

/// Trait keywords mapped to ingredient-keyword preferences, applied in order.
const TRAIT_SUGGESTIONS: &[(&str, &[&str])] = &[
    ("mysterious", &["dark chocolate", "blackberry", "espresso"]),
    ("unpredictable", &["exotic fruits", "unusual flavors"]),
    ("skip", &["vanilla", "simple"]),
    ("rich", &["mascarpone", "chocolate", "caramel"]),
    ("crunchy", &["nuts", "cookies", "chips"]),
    ("sweet", &["vanilla", "strawberry", "honey"]),
    ("dramatic", &["bold colors", "intense flavors"]),
    ("minimalist", &["vanilla", "simple", "clean"]),
];

/// Whether enhancement should be skipped for this profile.
///
/// Enhancement is skipped when the profile is absent, carries no insights,
/// has a sentinel name ("empty"/"none"/"basic"), or the caller opted out for
/// the whole run.
#[must_use]
pub fn should_skip_enhancement(
    profile: Option<&PersonalityProfile>,
    requested_skip: bool,
) -> bool {
    if requested_skip {
        return true;
    }
    let Some(profile) = profile else {
        return true;
    };
    if profile.insights.is_empty() {
        return true;
    }
    let name = profile.name.to_lowercase();
    PERSONALITY_SKIP_SENTINELS
        .iter()
        .any(|sentinel| name.contains(sentinel))
}

/// A base build plus the personality flags and suggestions layered onto it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancedSpec {
    pub flavors: Vec<String>,
    pub toppings: Vec<String>,
    pub scoops: u32,
    pub interpretation: String,
    /// Flag name -> description of each applied embellishment.
    pub enhancements: BTreeMap<String, String>,
    /// Full suggestion list, before the append cap.
    pub suggested_ingredients: Vec<String>,
}

impl EnhancedSpec {
    /// The base build carried through untouched (personality skipped).
    #[must_use]
    pub fn unchanged(spec: &IceCreamSpec) -> Self {
        Self {
            flavors: spec.flavors.clone(),
            toppings: spec.toppings.clone(),
            scoops: spec.scoops,
            interpretation: spec.interpretation.clone(),
            enhancements: BTreeMap::new(),
            suggested_ingredients: Vec::new(),
        }
    }

    /// Flavors and toppings in one deduplicated list, flavors first.
    #[must_use]
    pub fn ingredients(&self) -> Vec<String> {
        dedup_preserving(
            self.flavors
                .iter()
                .chain(self.toppings.iter())
                .cloned(),
        )
    }
}

/// Applies the ordered personality rule set against the catalog.
#[derive(Debug, Clone, Copy)]
pub struct PersonalityEnhancer<'a, C: IngredientCatalog> {
    catalog: &'a C,
}

impl<'a, C: IngredientCatalog> PersonalityEnhancer<'a, C> {
    #[must_use]
    pub const fn new(catalog: &'a C) -> Self {
        Self { catalog }
    }

    /// Catalog ingredients suggested for a profile, deduplicated in table
    /// order and capped at five.
    #[must_use]
    pub fn suggested_ingredients(&self, profile: &PersonalityProfile) -> Vec<String> {
        let text = profile.suggestion_text();
        let mut suggestions = Vec::new();
        for (trait_keyword, ingredient_keywords) in TRAIT_SUGGESTIONS {
            if !text.contains(trait_keyword) {
                continue;
            }
            for keyword in *ingredient_keywords {
                if let Some(record) = self.catalog.find_by_keyword(keyword)
                    && !suggestions.contains(&record.name)
                {
                    suggestions.push(record.name);
                }
            }
        }
        suggestions.truncate(MAX_SUGGESTED_INGREDIENTS);
        suggestions
    }

    /// Apply the fixed rule sequence to a base build.
    ///
    /// Pure function of the two inputs; rule order is part of the contract.
    #[must_use]
    pub fn enhance(&self, spec: &IceCreamSpec, profile: &PersonalityProfile) -> EnhancedSpec {
        let mut enhanced = EnhancedSpec::unchanged(spec);
        let text = profile.rule_text();
        let suggestions = self.suggested_ingredients(profile);

        if text.contains("mysterious") {
            enhanced
                .enhancements
                .insert("color_theme".to_string(), "dark and mysterious".to_string());
            enhanced
                .enhancements
                .insert("visual_style".to_string(), "dramatic contrast".to_string());
        }

        if text.contains("unpredictable") || text.contains("skip") {
            enhanced.enhancements.insert(
                "surprise_element".to_string(),
                "unexpected color combinations".to_string(),
            );
        }

        if text.contains("rich") && !suggestions.is_empty() {
            enhanced
                .flavors
                .extend(suggestions.iter().take(MAX_ENHANCEMENT_FLAVORS).cloned());
            enhanced.enhancements.insert(
                "enhancement".to_string(),
                "added premium ingredients".to_string(),
            );
        }

        enhanced.suggested_ingredients = suggestions;
        enhanced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;

    fn base_spec() -> IceCreamSpec {
        IceCreamSpec {
            flavors: vec!["Vanilla extract".to_string()],
            toppings: vec![],
            scoops: 1,
            interpretation: "test build".to_string(),
        }
    }

    fn profile(name: &str, description: &str, insights: &[&str]) -> PersonalityProfile {
        PersonalityProfile {
            name: name.to_string(),
            description: description.to_string(),
            insights: insights.iter().map(ToString::to_string).collect(),
            ..PersonalityProfile::default()
        }
    }

    #[test]
    fn mysterious_profiles_get_dark_theme_flags() {
        let catalog = MemoryCatalog::with_default_inventory();
        let enhancer = PersonalityEnhancer::new(&catalog);
        let enhanced = enhancer.enhance(
            &base_spec(),
            &profile("The Mysterious One", "keeps secrets", &["quiet"]),
        );
        assert_eq!(
            enhanced.enhancements.get("color_theme").map(String::as_str),
            Some("dark and mysterious")
        );
        assert_eq!(
            enhanced.enhancements.get("visual_style").map(String::as_str),
            Some("dramatic contrast")
        );
        // The flavor list itself is untouched by this rule.
        assert_eq!(enhanced.flavors, base_spec().flavors);
    }

    #[test]
    fn unpredictable_or_skip_profiles_get_a_surprise_flag() {
        let catalog = MemoryCatalog::with_default_inventory();
        let enhancer = PersonalityEnhancer::new(&catalog);
        for description in ["wildly unpredictable", "tends to skip rounds"] {
            let enhanced = enhancer.enhance(&base_spec(), &profile("Wildcard", description, &["x"]));
            assert!(enhanced.enhancements.contains_key("surprise_element"));
        }
    }

    #[test]
    fn rich_profiles_append_at_most_two_suggestions() {
        let catalog = MemoryCatalog::with_default_inventory();
        let enhancer = PersonalityEnhancer::new(&catalog);
        let rich = profile("The Rich Connoisseur", "loves rich desserts", &["indulgent"]);

        let enhanced = enhancer.enhance(&base_spec(), &rich);
        assert_eq!(enhanced.flavors.len(), base_spec().flavors.len() + 2);
        assert!(enhanced.enhancements.contains_key("enhancement"));
        // The full suggestion list is preserved before the append cap.
        assert!(enhanced.suggested_ingredients.len() >= 2);
        assert!(enhanced.suggested_ingredients.len() <= 5);
    }

    #[test]
    fn enhancement_is_deterministic() {
        let catalog = MemoryCatalog::with_default_inventory();
        let enhancer = PersonalityEnhancer::new(&catalog);
        let p = profile("Mysterious and rich", "unpredictable", &["bold"]);
        let first = enhancer.enhance(&base_spec(), &p);
        let second = enhancer.enhance(&base_spec(), &p);
        assert_eq!(first, second);
    }

    #[test]
    fn skip_predicate_covers_all_sentinels() {
        let with_insights = profile("Empty Slate", "nothing", &["tag"]);
        assert!(should_skip_enhancement(Some(&with_insights), false));

        let no_insights = profile("Vivid", "colorful", &[]);
        assert!(should_skip_enhancement(Some(&no_insights), false));

        assert!(should_skip_enhancement(None, false));

        let normal = profile("Vivid", "colorful", &["bright"]);
        assert!(!should_skip_enhancement(Some(&normal), false));
        assert!(should_skip_enhancement(Some(&normal), true));
    }
}
