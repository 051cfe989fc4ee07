//! Mapping of abstract player selections to concrete catalog ingredients.
use serde::{Deserialize, Serialize};

use crate::catalog::{IngredientCatalog, contains_ci};
use crate::constants::{DEFAULT_FLAVOR, FUZZY_MATCH_LIMIT, TOPPING_KEYWORDS};

/// The sentinel selection meaning "no contribution this round".
pub const SKIP_SELECTION: &str = "skip";

/// Whether a selection token is the skip sentinel (case-insensitive).
#[must_use]
pub fn is_skip(selection: &str) -> bool {
    selection.eq_ignore_ascii_case(SKIP_SELECTION)
}

/// All non-skip selections, in order.
#[must_use]
pub fn non_skip_selections(selections: &[String]) -> Vec<String> {
    selections
        .iter()
        .filter(|s| !is_skip(s))
        .cloned()
        .collect()
}

/// Static mapping from an abstract selection token to ingredient keywords.
///
/// Keywords use `_` as a word joiner and are resolved against the catalog at
/// lookup time; a keyword with no catalog match is silently dropped.
#[derive(Debug, Clone, Copy)]
pub struct SelectionMapping {
    pub selection: &'static str,
    pub flavors: &'static [&'static str],
    pub toppings: &'static [&'static str],
    pub premium_factor: f64,
    pub description: &'static str,
}

pub(crate) const SELECTION_MAPPINGS: &[SelectionMapping] = &[
    SelectionMapping {
        selection: "rich",
        flavors: &["chocolate", "mascarpone", "caramel", "espresso"],
        toppings: &["chocolate_sauce", "caramel_drizzle", "brownie_pieces"],
        premium_factor: 1.5,
        description: "Rich, indulgent flavors with premium ingredients",
    },
    SelectionMapping {
        selection: "crunchy",
        flavors: &["cookies", "nuts", "praline"],
        toppings: &[
            "chocolate_chips",
            "crushed_cookies",
            "hazelnuts",
            "almonds",
            "granola",
        ],
        premium_factor: 1.0,
        description: "Textured ingredients with satisfying crunch",
    },
    SelectionMapping {
        selection: "sweet",
        flavors: &["vanilla", "strawberry", "caramel", "honey"],
        toppings: &[
            "sprinkles",
            "caramel_drizzle",
            "honey_drizzle",
            "sugar_crystals",
        ],
        premium_factor: 1.0,
        description: "Classic sweet flavors and toppings",
    },
    SelectionMapping {
        selection: "fruity",
        flavors: &["strawberry", "lemon", "raspberry", "mango"],
        toppings: &["fresh_berries", "fruit_syrup", "citrus_zest"],
        premium_factor: 1.0,
        description: "Fresh, fruity flavors with natural sweetness",
    },
    SelectionMapping {
        selection: "creamy",
        flavors: &["vanilla", "mascarpone", "cream", "custard"],
        toppings: &["whipped_cream", "cream_sauce"],
        premium_factor: 1.0,
        description: "Smooth, creamy textures and mild flavors",
    },
    SelectionMapping {
        selection: "spicy",
        flavors: &["cinnamon", "ginger", "cardamom"],
        toppings: &["spiced_nuts", "cinnamon_dust"],
        premium_factor: 1.0,
        description: "Warm spices for adventurous palates",
    },
];

/// Look up the mapping-table entry for a selection token (case-insensitive).
#[must_use]
pub fn mapping_for(selection: &str) -> Option<&'static SelectionMapping> {
    SELECTION_MAPPINGS
        .iter()
        .find(|mapping| mapping.selection.eq_ignore_ascii_case(selection))
}

/// How a selection was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    /// Resolved through the static mapping table.
    Mapped,
    /// Unknown token matched against the catalog by substring; low confidence.
    Fuzzy,
    /// Nothing matched; the selection itself became a flavor name.
    Custom,
}

/// Concrete ingredients resolved for one selection token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSelection {
    pub selection: String,
    pub flavors: Vec<String>,
    pub toppings: Vec<String>,
    pub kind: ResolutionKind,
    pub description: String,
}

impl ResolvedSelection {
    /// Flavors and toppings in one list, flavors first.
    #[must_use]
    pub fn ingredients(&self) -> Vec<String> {
        let mut all = self.flavors.clone();
        all.extend(self.toppings.iter().cloned());
        all
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flavors.is_empty() && self.toppings.is_empty()
    }
}

/// Split resolved ingredient names into flavors and toppings using the fixed
/// topping keyword list.
#[must_use]
pub fn categorize_ingredients(names: &[String]) -> (Vec<String>, Vec<String>) {
    let mut flavors = Vec::new();
    let mut toppings = Vec::new();
    for name in names {
        if TOPPING_KEYWORDS
            .iter()
            .any(|keyword| contains_ci(name, keyword))
        {
            toppings.push(name.clone());
        } else {
            flavors.push(name.clone());
        }
    }
    (flavors, toppings)
}

/// Deduplicate while preserving first-seen order.
#[must_use]
pub fn dedup_preserving(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = Vec::new();
    for item in items {
        if !seen.contains(&item) {
            seen.push(item);
        }
    }
    seen
}

/// Resolves abstract selection tokens against an ingredient catalog.
#[derive(Debug, Clone, Copy)]
pub struct SelectionResolver<'a, C: IngredientCatalog> {
    catalog: &'a C,
}

impl<'a, C: IngredientCatalog> SelectionResolver<'a, C> {
    #[must_use]
    pub const fn new(catalog: &'a C) -> Self {
        Self { catalog }
    }

    /// Resolve one selection token to concrete ingredients.
    ///
    /// The skip sentinel resolves to nothing. Mapped tokens look each keyword
    /// up in the catalog (name first, then description) and drop keywords with
    /// no match. Unknown tokens fall back to a catalog-wide substring search;
    /// when even that finds nothing, the lowercased selection itself becomes a
    /// custom flavor entry.
    #[must_use]
    pub fn resolve(&self, selection: &str) -> ResolvedSelection {
        if is_skip(selection) {
            return ResolvedSelection {
                selection: selection.to_string(),
                flavors: Vec::new(),
                toppings: Vec::new(),
                kind: ResolutionKind::Mapped,
                description: "No impact or minimal vanilla base".to_string(),
            };
        }

        if let Some(mapping) = mapping_for(selection) {
            let mut names = Vec::new();
            for keyword in mapping.flavors.iter().chain(mapping.toppings.iter()) {
                if let Some(record) = self.catalog.find_by_keyword(keyword) {
                    names.push(record.name);
                }
            }
            let names = dedup_preserving(names);
            let (flavors, toppings) = categorize_ingredients(&names);
            return ResolvedSelection {
                selection: selection.to_string(),
                flavors,
                toppings,
                kind: ResolutionKind::Mapped,
                description: mapping.description.to_string(),
            };
        }

        self.resolve_unknown(selection)
    }

    fn resolve_unknown(&self, selection: &str) -> ResolvedSelection {
        let matches: Vec<String> = self
            .catalog
            .search(selection)
            .into_iter()
            .take(FUZZY_MATCH_LIMIT)
            .map(|record| record.name)
            .collect();

        if matches.is_empty() {
            ResolvedSelection {
                selection: selection.to_string(),
                flavors: vec![selection.to_lowercase()],
                toppings: Vec::new(),
                kind: ResolutionKind::Custom,
                description: format!("Custom interpretation of '{selection}'"),
            }
        } else {
            ResolvedSelection {
                selection: selection.to_string(),
                flavors: matches,
                toppings: Vec::new(),
                kind: ResolutionKind::Fuzzy,
                description: format!("Close inventory matches for '{selection}'"),
            }
        }
    }

    /// Human-readable description of a selection, including the resolved
    /// ingredient names.
    #[must_use]
    pub fn selection_description(&self, selection: &str) -> String {
        let resolved = self.resolve(selection);
        let ingredients = resolved.ingredients();
        if ingredients.is_empty() {
            resolved.description
        } else {
            format!(
                "{} Includes: {}",
                resolved.description,
                ingredients.join(", ")
            )
        }
    }
}

/// The interpreted build for one player: resolved flavors and toppings plus
/// the scoop count derived from how many real selections they made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCreamSpec {
    pub flavors: Vec<String>,
    pub toppings: Vec<String>,
    pub scoops: u32,
    /// Notes describing how each selection was interpreted.
    pub interpretation: String,
}

/// One entry of the public mapping listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionInfo {
    pub selection: String,
    pub description: String,
    pub example_flavors: Vec<String>,
    pub example_toppings: Vec<String>,
}

/// The available abstract selections and their example keywords, excluding
/// the skip sentinel.
#[must_use]
pub fn available_selection_mappings() -> Vec<SelectionInfo> {
    SELECTION_MAPPINGS
        .iter()
        .map(|mapping| SelectionInfo {
            selection: mapping.selection.to_string(),
            description: mapping.description.to_string(),
            example_flavors: mapping
                .flavors
                .iter()
                .take(3)
                .map(ToString::to_string)
                .collect(),
            example_toppings: mapping
                .toppings
                .iter()
                .take(3)
                .map(ToString::to_string)
                .collect(),
        })
        .collect()
}

/// The default single-flavor build used for all-skip players.
#[must_use]
pub fn default_flavor() -> String {
    DEFAULT_FLAVOR.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;

    #[test]
    fn skip_resolves_to_nothing_in_any_case() {
        let catalog = MemoryCatalog::with_default_inventory();
        let resolver = SelectionResolver::new(&catalog);
        for token in ["skip", "SKIP", "Skip"] {
            let resolved = resolver.resolve(token);
            assert!(resolved.is_empty(), "{token} should resolve to nothing");
        }
    }

    #[test]
    fn rich_resolves_to_premium_inventory_entries() {
        let catalog = MemoryCatalog::with_default_inventory();
        let resolver = SelectionResolver::new(&catalog);
        let resolved = resolver.resolve("Rich");
        assert_eq!(resolved.kind, ResolutionKind::Mapped);
        assert!(!resolved.flavors.is_empty());
        assert!(
            resolved
                .flavors
                .iter()
                .any(|name| name.contains("Mascarpone")),
            "expected mascarpone among {:?}",
            resolved.flavors
        );
        // Keywords with no inventory match are dropped, not errors.
        assert!(!resolved.ingredients().iter().any(|n| n.contains("brownie")));
    }

    #[test]
    fn unknown_selection_falls_back_to_fuzzy_search() {
        let catalog = MemoryCatalog::with_default_inventory();
        let resolver = SelectionResolver::new(&catalog);
        let resolved = resolver.resolve("mint");
        assert_eq!(resolved.kind, ResolutionKind::Fuzzy);
        assert!(resolved.flavors.len() <= 3);
        assert!(resolved.flavors[0].contains("Mint"));
        assert!(resolved.toppings.is_empty());
    }

    #[test]
    fn unmatched_selection_becomes_custom_flavor() {
        let catalog = MemoryCatalog::with_default_inventory();
        let resolver = SelectionResolver::new(&catalog);
        let resolved = resolver.resolve("Galaxy Swirl");
        assert_eq!(resolved.kind, ResolutionKind::Custom);
        assert_eq!(resolved.flavors, vec!["galaxy swirl".to_string()]);
        assert!(resolved.toppings.is_empty());
    }

    #[test]
    fn categorization_uses_the_topping_keyword_list() {
        let names = vec![
            "Rich chocolate sauce".to_string(),
            "Hazelnuts (roasted)".to_string(),
            "Vanilla extract".to_string(),
            "Pineapple pieces".to_string(),
        ];
        let (flavors, toppings) = categorize_ingredients(&names);
        assert_eq!(flavors, vec!["Vanilla extract"]);
        assert_eq!(
            toppings,
            vec![
                "Rich chocolate sauce",
                "Hazelnuts (roasted)",
                "Pineapple pieces"
            ]
        );
    }

    #[test]
    fn selection_descriptions_name_the_resolved_ingredients() {
        let catalog = MemoryCatalog::with_default_inventory();
        let resolver = SelectionResolver::new(&catalog);
        let description = resolver.selection_description("rich");
        assert!(description.starts_with("Rich, indulgent"));
        assert!(description.contains("Includes:"));
        assert!(description.contains("Mascarpone"));

        let skip = resolver.selection_description("skip");
        assert!(!skip.contains("Includes:"));
    }

    #[test]
    fn dedup_preserves_first_seen_order() {
        let deduped = dedup_preserving(
            ["b", "a", "b", "c", "a"]
                .into_iter()
                .map(ToString::to_string),
        );
        assert_eq!(deduped, vec!["b", "a", "c"]);
    }

    #[test]
    fn mapping_listing_excludes_skip() {
        let listing = available_selection_mappings();
        assert_eq!(listing.len(), 6);
        assert!(listing.iter().all(|info| info.selection != SKIP_SELECTION));
        assert!(
            listing
                .iter()
                .all(|info| info.example_flavors.len() <= 3 && info.example_toppings.len() <= 3)
        );
    }
}
