//! Image instructions, the image-provider seam, and generation bookkeeping.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::selection::default_flavor;

/// The sole interface handed to an image-generation provider: what to draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInstructions {
    pub scoops: u32,
    pub flavors: Vec<String>,
    pub toppings: Vec<String>,
}

impl Default for ImageInstructions {
    fn default() -> Self {
        Self {
            scoops: 1,
            flavors: vec![default_flavor()],
            toppings: Vec::new(),
        }
    }
}

impl ImageInstructions {
    /// All ingredients to draw, flavors first.
    #[must_use]
    pub fn ingredients(&self) -> Vec<String> {
        let mut all = self.flavors.clone();
        all.extend(self.toppings.iter().cloned());
        all
    }

    /// The full versioned render document sent to image providers.
    #[must_use]
    pub fn render_spec(&self) -> RenderSpec {
        RenderSpec::for_instructions(self)
    }
}

/// Versioned image-generation document; field values are part of the wire
/// contract with providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSpec {
    pub version: String,
    pub task: String,
    pub subject: RenderSubject,
    pub look: RenderLook,
    pub composition: RenderComposition,
    pub camera: RenderCamera,
    pub background: RenderBackground,
    pub output: RenderOutput,
    pub negative_prompt: Vec<String>,
    pub constraints: RenderConstraints,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSubject {
    #[serde(rename = "type")]
    pub kind: String,
    pub scoops: u32,
    pub flavors: Vec<String>,
    pub container: String,
    pub toppings: Vec<String>,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderLook {
    pub style: String,
    pub lighting: String,
    pub surface_detail: String,
    pub color_palette: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderComposition {
    pub framing: String,
    pub shot: String,
    pub angle: String,
    pub negative_space: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderCamera {
    pub focal_length_mm: u32,
    pub aperture_f: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderBackground {
    #[serde(rename = "type")]
    pub kind: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderOutput {
    pub aspect_ratio: String,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub seed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConstraints {
    pub brand_safe: bool,
    pub no_background_clutter: bool,
}

impl RenderSpec {
    fn for_instructions(instructions: &ImageInstructions) -> Self {
        Self {
            version: "1.0".to_string(),
            task: "generate_image".to_string(),
            subject: RenderSubject {
                kind: "ice_cream_cone".to_string(),
                scoops: instructions.scoops,
                flavors: instructions.flavors.clone(),
                container: "waffle_cone".to_string(),
                toppings: instructions.toppings.clone(),
                state: "slightly_melting".to_string(),
            },
            look: RenderLook {
                style: "photorealistic".to_string(),
                lighting: "soft_diffused_front".to_string(),
                surface_detail: "high".to_string(),
                color_palette: vec![
                    "#F7F3E9".to_string(),
                    "#C57A40".to_string(),
                    "#3A2B1A".to_string(),
                ],
            },
            composition: RenderComposition {
                framing: "centered".to_string(),
                shot: "close_up".to_string(),
                angle: "eye_level".to_string(),
                negative_space: "ample".to_string(),
            },
            camera: RenderCamera {
                focal_length_mm: 50,
                aperture_f: 2.8,
            },
            background: RenderBackground {
                kind: "solid_color".to_string(),
                color: "#F5F7FB".to_string(),
            },
            output: RenderOutput {
                aspect_ratio: "1:1".to_string(),
                width: 512,
                height: 512,
                format: "png".to_string(),
                seed: 42,
            },
            negative_prompt: vec![
                "hands".to_string(),
                "text".to_string(),
                "logos".to_string(),
                "watermarks".to_string(),
                "multiple_cones".to_string(),
                "deformed_ice_cream".to_string(),
                "plastic_or_cartoon_style".to_string(),
            ],
            constraints: RenderConstraints {
                brand_safe: true,
                no_background_clutter: true,
            },
        }
    }
}

/// Outcome of one image-generation attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOutcome {
    pub url: Option<String>,
    pub path: Option<String>,
    pub success: bool,
}

impl ImageOutcome {
    #[must_use]
    pub fn failure() -> Self {
        Self::default()
    }
}

/// External image-generation collaborator.
///
/// Implementations must never panic: any failure, including a network
/// timeout, is reported as `success = false` and the pipeline degrades to a
/// placeholder. Network-backed implementations own their own deadline.
pub trait ImageProvider {
    fn generate(&self, instructions: &ImageInstructions, player_name: &str) -> ImageOutcome;
}

/// Placeholder provider for development and fallback. Always succeeds with a
/// deterministic placeholder URL built from the leading ingredients.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockImageProvider;

impl ImageProvider for MockImageProvider {
    fn generate(&self, instructions: &ImageInstructions, player_name: &str) -> ImageOutcome {
        let ingredients = instructions.ingredients();
        let label = if ingredients.is_empty() {
            "Ice+Cream".to_string()
        } else {
            ingredients
                .iter()
                .take(2)
                .map(|name| name.replace(' ', "+"))
                .collect::<Vec<_>>()
                .join("+")
        };
        let player = player_name.replace(' ', "+");
        ImageOutcome {
            url: Some(format!(
                "https://via.placeholder.com/512x512/FFB6C1/FFFFFF?text={label}+for+{player}"
            )),
            path: None,
            success: true,
        }
    }
}

/// Generation state tracked per player/session key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GenerationStatus {
    InProgress,
    Completed,
}

/// Keyed check-and-set registry preventing duplicate concurrent generation
/// for the same player/session key.
#[derive(Debug, Default)]
pub struct GenerationRegistry {
    entries: Mutex<HashMap<String, GenerationStatus>>,
}

impl GenerationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim a key for generation. Returns `false` when a
    /// generation for the key is already in flight.
    pub fn try_begin(&self, key: &str) -> bool {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(GenerationStatus::InProgress) => false,
            _ => {
                entries.insert(key.to_string(), GenerationStatus::InProgress);
                true
            }
        }
    }

    /// Mark a claimed key as finished, allowing later regeneration.
    pub fn complete(&self, key: &str) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), GenerationStatus::Completed);
    }

    /// Drop a key entirely.
    pub fn clear(&self, key: &str) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
    }

    #[must_use]
    pub fn is_in_progress(&self, key: &str) -> bool {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        matches!(entries.get(key), Some(GenerationStatus::InProgress))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_instructions_are_one_vanilla_scoop() {
        let instructions = ImageInstructions::default();
        assert_eq!(instructions.scoops, 1);
        assert_eq!(instructions.flavors, vec!["vanilla"]);
        assert!(instructions.toppings.is_empty());
    }

    #[test]
    fn render_spec_carries_the_subject_through() {
        let instructions = ImageInstructions {
            scoops: 2,
            flavors: vec!["Mascarpone".to_string()],
            toppings: vec!["Mini marshmallows".to_string()],
        };
        let spec = instructions.render_spec();
        assert_eq!(spec.version, "1.0");
        assert_eq!(spec.subject.scoops, 2);
        assert_eq!(spec.subject.flavors, vec!["Mascarpone"]);
        assert_eq!(spec.subject.toppings, vec!["Mini marshmallows"]);
        assert_eq!(spec.output.width, 512);

        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["subject"]["type"], "ice_cream_cone");
        assert_eq!(json["background"]["type"], "solid_color");
    }

    #[test]
    fn mock_provider_is_deterministic_and_never_fails() {
        let provider = MockImageProvider;
        let instructions = ImageInstructions::default();
        let first = provider.generate(&instructions, "Ada Lovelace");
        let second = provider.generate(&instructions, "Ada Lovelace");
        assert!(first.success);
        assert_eq!(first, second);
        assert!(first.url.unwrap().contains("Ada+Lovelace"));
    }

    #[test]
    fn registry_blocks_duplicate_in_flight_generation() {
        let registry = GenerationRegistry::new();
        assert!(registry.try_begin("session-1:player-1"));
        assert!(!registry.try_begin("session-1:player-1"));
        assert!(registry.is_in_progress("session-1:player-1"));

        registry.complete("session-1:player-1");
        assert!(!registry.is_in_progress("session-1:player-1"));
        // Completed keys may be regenerated later.
        assert!(registry.try_begin("session-1:player-1"));

        registry.clear("session-1:player-1");
        assert!(registry.try_begin("session-1:player-1"));
    }
}
