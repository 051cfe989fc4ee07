//! Ingredient inventory records and the catalog collaborator seam.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock};

/// A single ingredient held in inventory.
///
/// Costs are per-portion and expressed as a range; `cost_max` equals
/// `cost_min` for fixed prices and both may be absent for ingredients that
/// have not been priced yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientRecord {
    pub name: String,
    pub description: String,
    /// Recipe names this ingredient is used on.
    #[serde(default)]
    pub used_on: Vec<String>,
    /// Allergy tags carried by this ingredient.
    #[serde(default)]
    pub allergies: Vec<String>,
    /// Purchase pack size / unit, e.g. "946 ml bottle".
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub cost_min: Option<f64>,
    #[serde(default)]
    pub cost_max: Option<f64>,
    /// Number of packs on hand.
    #[serde(default)]
    pub stock: u32,
}

impl IngredientRecord {
    /// Authoritative per-use cost: the mean of the cost range, `cost_min`
    /// alone when no maximum is recorded, or `None` when unpriced.
    #[must_use]
    pub fn unit_cost(&self) -> Option<f64> {
        self.cost_min
            .map(|min| (min + self.cost_max.unwrap_or(min)) / 2.0)
    }
}

/// Read (and stock-decrement) access to the ingredient inventory.
///
/// Implementations must be safe for concurrent readers; `decrement_stock` is
/// the only mutating call and must be atomic per ingredient.
pub trait IngredientCatalog {
    /// Look up an ingredient by case-insensitive substring match on its name.
    /// The first inventory entry that matches wins.
    fn get_by_name(&self, name: &str) -> Option<IngredientRecord>;

    /// All ingredients whose name or description contains `needle`
    /// (case-insensitive), in inventory order.
    fn search(&self, needle: &str) -> Vec<IngredientRecord>;

    /// The full inventory in insertion order.
    fn get_all(&self) -> Vec<IngredientRecord>;

    /// Decrement stock for an exact ingredient name. Returns `false` when the
    /// ingredient is unknown or has insufficient stock; stock never goes
    /// negative.
    fn decrement_stock(&self, name: &str, amount: u32) -> bool;

    /// Find the ingredient matching a mapping-table keyword: name matches are
    /// preferred over description matches.
    fn find_by_keyword(&self, keyword: &str) -> Option<IngredientRecord> {
        let needle = keyword.replace('_', " ");
        let all = self.get_all();
        all.iter()
            .find(|record| contains_ci(&record.name, &needle))
            .or_else(|| {
                all.iter()
                    .find(|record| contains_ci(&record.description, &needle))
            })
            .cloned()
    }
}

/// Case-insensitive substring containment.
#[must_use]
pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Union of allergy tags for the given ingredient names, sorted for
/// deterministic output.
#[must_use]
pub fn allergy_warnings<C: IngredientCatalog + ?Sized>(
    catalog: &C,
    ingredients: &[String],
) -> Vec<String> {
    let mut tags = BTreeSet::new();
    for name in ingredients {
        if let Some(record) = catalog.get_by_name(name) {
            tags.extend(record.allergies);
        }
    }
    tags.into_iter().collect()
}

/// In-memory [`IngredientCatalog`] preserving insertion order.
///
/// Reads take a shared lock so the catalog can be shared across concurrently
/// processed players; the stock decrement holds the write lock for the whole
/// check-and-update.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    records: RwLock<Vec<IngredientRecord>>,
}

impl MemoryCatalog {
    #[must_use]
    pub fn new(records: Vec<IngredientRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Catalog seeded with the reference 23-ingredient shop inventory.
    #[must_use]
    pub fn with_default_inventory() -> Self {
        Self::new(default_inventory())
    }

    pub fn insert(&self, record: IngredientRecord) {
        let mut records = self
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = records.iter_mut().find(|r| r.name == record.name) {
            *existing = record;
        } else {
            records.push(record);
        }
    }

    fn read(&self) -> Vec<IngredientRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl IngredientCatalog for MemoryCatalog {
    fn get_by_name(&self, name: &str) -> Option<IngredientRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|record| contains_ci(&record.name, name))
            .cloned()
    }

    fn search(&self, needle: &str) -> Vec<IngredientRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|record| {
                contains_ci(&record.name, needle) || contains_ci(&record.description, needle)
            })
            .cloned()
            .collect()
    }

    fn get_all(&self) -> Vec<IngredientRecord> {
        self.read()
    }

    fn decrement_stock(&self, name: &str, amount: u32) -> bool {
        let mut records = self
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match records.iter_mut().find(|record| record.name == name) {
            Some(record) if record.stock >= amount => {
                record.stock -= amount;
                true
            }
            _ => false,
        }
    }
}

fn record(
    name: &str,
    description: &str,
    used_on: &[&str],
    allergies: &[&str],
    quantity: &str,
    cost_min: Option<f64>,
    cost_max: Option<f64>,
    stock: u32,
) -> IngredientRecord {
    IngredientRecord {
        name: name.to_string(),
        description: description.to_string(),
        used_on: used_on.iter().map(ToString::to_string).collect(),
        allergies: allergies.iter().map(ToString::to_string).collect(),
        quantity: Some(quantity.to_string()),
        cost_min,
        cost_max,
        stock,
    }
}

/// The reference shop inventory used by the tester and the test suite.
#[must_use]
pub fn default_inventory() -> Vec<IngredientRecord> {
    vec![
        record(
            "Vanilla extract",
            "Pure vanilla extract for base flavoring",
            &["Vanilla (Superman)", "Stevia-sweetened vanilla (Spock)"],
            &["alcohol"],
            "946 ml bottle",
            Some(0.25),
            Some(0.25),
            7,
        ),
        record(
            "Rum flavoring (extract)",
            "Rum flavor/extract to soak raisins",
            &["Rum raisin (Indiana Jones)"],
            &["alcohol"],
            "473 ml bottle",
            None,
            None,
            3,
        ),
        record(
            "Raisins",
            "Seedless raisins for rum-raisin mix-in",
            &["Rum raisin (Indiana Jones)"],
            &["sulfites"],
            "5 kg bag",
            None,
            None,
            4,
        ),
        record(
            "Lemons (fresh)",
            "Juice + zest for bright sorbet",
            &["Lemon sorbet (Mary Poppins)"],
            &["citrus"],
            "5 kg case (~35 pcs)",
            Some(0.15),
            Some(0.15),
            2,
        ),
        record(
            "Mint leaves (fresh)",
            "Fresh mint for infusion or garnish",
            &["Mint (Elsa)"],
            &[],
            "250 g clamshell",
            Some(0.10),
            Some(0.10),
            6,
        ),
        record(
            "Mint extract",
            "Alternative to fresh leaves",
            &["Mint (Elsa)"],
            &["alcohol"],
            "473 ml bottle",
            Some(0.10),
            Some(0.10),
            2,
        ),
        record(
            "Dark chocolate (70%+ callets)",
            "Premium dark chocolate for shavings/chunks and sauces",
            &[
                "Dark chocolate (Iron Man)",
                "Chocolate chips (Willy Wonka)",
                "Silky chocolate mousse ribbon (James Bond)",
                "Rich chocolate sauce (Vianne Rocher)",
            ],
            &["milk", "soy", "caffeine"],
            "5 kg box",
            Some(0.50),
            Some(0.50),
            3,
        ),
        record(
            "Mascarpone",
            "Soft Italian cheese for tiramisu swirl",
            &["Tiramisu swirl (Holly Golightly)"],
            &["dairy"],
            "2 kg tub",
            Some(0.40),
            Some(0.55),
            5,
        ),
        record(
            "Cocoa powder (unsweetened)",
            "For tiramisu drizzle and chocolate sauce",
            &[
                "Tiramisu swirl (Holly Golightly)",
                "Rich chocolate sauce (Vianne Rocher)",
            ],
            &["caffeine"],
            "1 kg bag",
            Some(0.10),
            Some(0.10),
            8,
        ),
        record(
            "Espresso beans",
            "Pulled as espresso for tiramisu drizzle",
            &["Tiramisu swirl (Holly Golightly)"],
            &["caffeine"],
            "5 kg bag",
            Some(0.10),
            Some(0.15),
            2,
        ),
        record(
            "Hazelnuts (roasted)",
            "Crunchy nut mix-in",
            &["Hazelnuts (Scrat)"],
            &["tree_nuts"],
            "2 kg bag",
            Some(0.40),
            Some(0.50),
            5,
        ),
        record(
            "Oreo-style sandwich cookies",
            "Crushed cookie chunks",
            &["Oreo cookie chunks (Cookie Monster)"],
            &["gluten", "soy", "milk"],
            "4.5 kg case",
            Some(0.25),
            Some(0.25),
            2,
        ),
        record(
            "Chocolate chips (semi-sweet)",
            "Small chips for texture",
            &["Chocolate chips (Willy Wonka)"],
            &["milk", "soy"],
            "10 kg bag",
            Some(0.20),
            Some(0.30),
            1,
        ),
        record(
            "Heavy cream (35-40%)",
            "For whipped cream, mousse, and caramel",
            &[
                "Whipped cream (Donkey)",
                "Silky chocolate mousse ribbon (James Bond)",
                "Sea-salt caramel drizzle (Jack Sparrow)",
            ],
            &["dairy"],
            "12x1 L case",
            None,
            None,
            4,
        ),
        record(
            "Granulated sugar",
            "Base sweetener; sauces and sorbet",
            &[
                "Lemon sorbet (Mary Poppins)",
                "Rich chocolate sauce (Vianne Rocher)",
                "Sea-salt caramel drizzle (Jack Sparrow)",
                "Silky chocolate mousse ribbon (James Bond)",
            ],
            &[],
            "25 kg sack",
            None,
            None,
            3,
        ),
        record(
            "Eggs (pasteurized)",
            "For safe chocolate mousse",
            &["Silky chocolate mousse ribbon (James Bond)"],
            &["egg"],
            "180-egg case",
            None,
            None,
            1,
        ),
        record(
            "Pineapple (fresh or canned)",
            "Chunks for topping",
            &["Pineapple pieces (Moana)"],
            &[],
            "12 kg fresh case or 6x3 kg cans",
            Some(0.25),
            Some(0.25),
            3,
        ),
        record(
            "Butter (unsalted)",
            "For sea-salt caramel",
            &["Sea-salt caramel drizzle (Jack Sparrow)"],
            &["dairy"],
            "5 kg block",
            None,
            None,
            2,
        ),
        record(
            "Sea salt flakes",
            "Finishing salt for caramel",
            &["Sea-salt caramel drizzle (Jack Sparrow)"],
            &[],
            "1 kg box",
            Some(0.01),
            Some(0.01),
            6,
        ),
        record(
            "Mini marshmallows",
            "Soft topping",
            &["Mini marshmallows (Stay Puft)"],
            &["gelatin"],
            "2 kg bag",
            Some(0.15),
            Some(0.15),
            4,
        ),
        record(
            "Coconut milk (full-fat)",
            "Dairy-free base option",
            &["Coconut milk base (Po)"],
            &["coconut", "tree_nuts"],
            "12x400 ml cans",
            Some(0.40),
            Some(0.50),
            5,
        ),
        record(
            "Stevia packets",
            "Non-sugar sweetener for vanilla swap",
            &["Stevia-sweetened vanilla (Spock)"],
            &[],
            "Box (200 pkts)",
            Some(0.15),
            Some(0.15),
            2,
        ),
        record(
            "Sunflower seed butter",
            "Nut-free butter swirl",
            &["Sunflower seed butter swirl (Spider-Man)"],
            &["sunflower_seed"],
            "2 kg tub",
            Some(0.35),
            Some(0.40),
            3,
        ),
    ]
}
