//! Matching options.
//!
//! Every heuristic constant the matchers rely on lives here as a named field so
//! callers can tune it per deployment. The defaults are empirically tuned values,
//! not derived ones.

use serde::{Deserialize, Serialize};

/// Options for controlling comment matching behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchOptions {
    /// Acceptance threshold when the catalog holds a single product.
    pub single_product_threshold: f64,

    /// Acceptance threshold for every other catalog.
    pub multi_product_threshold: f64,

    /// Minimum BoxPattern confidence that short-circuits the pipeline
    /// when a catalog title carries a box keyword.
    pub box_priority_threshold: f64,

    /// Maximum recursion depth of the recursive segmenter.
    pub max_recursion_depth: usize,

    /// Largest quantity the price optimizer will build a DP table for.
    pub max_dp_quantity: u32,

    /// Largest bare quantity the Simple-Number matcher accepts.
    pub max_simple_quantity: u32,

    /// Largest quantity extracted next to a product name.
    pub max_item_quantity: u32,

    /// Largest bare number BoxPattern reads as a box count.
    pub max_bare_box_quantity: u32,

    /// Requests of at least this many boxes go to the full-box product
    /// when the catalog mixes half and full boxes.
    pub box_full_bias_min: u32,

    /// Minimum similarity for the Product-Name matcher to accept a title.
    pub name_similarity_threshold: f64,

    /// Minimum token overlap between a comment and a tier description.
    pub tier_overlap_threshold: f64,

    /// Minimum confidence of a recursive multi-segment result.
    pub recursive_min_confidence: f64,

    /// Confidence of the exact-quantity-in-title shortcut.
    pub exact_title_confidence: f64,

    /// Confidence floor for a quantity-only comment on a single product.
    pub single_quantity_floor: f64,

    /// Run the exact-quantity and weight-bounded pre-passes.
    pub enable_prepasses: bool,

    /// Append the Similarity matcher as a last resort.
    pub enable_similarity_fallback: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            single_product_threshold: 0.5,
            multi_product_threshold: 0.7,
            box_priority_threshold: 0.5,
            max_recursion_depth: 10,
            max_dp_quantity: 999,
            max_simple_quantity: 100,
            max_item_quantity: 99,
            max_bare_box_quantity: 10,
            box_full_bias_min: 2,
            name_similarity_threshold: 0.5,
            tier_overlap_threshold: 0.1,
            recursive_min_confidence: 0.5,
            exact_title_confidence: 0.99,
            single_quantity_floor: 0.9,
            enable_prepasses: true,
            enable_similarity_fallback: true,
        }
    }
}

impl MatchOptions {
    /// Creates new options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that only accept confident matches (no fuzzy last resort).
    pub fn strict() -> Self {
        Self {
            single_product_threshold: 0.7,
            multi_product_threshold: 0.85,
            name_similarity_threshold: 0.7,
            recursive_min_confidence: 0.7,
            enable_similarity_fallback: false,
            ..Self::default()
        }
    }

    /// Options that accept lower-confidence matches before flagging a fallback.
    pub fn lenient() -> Self {
        Self {
            single_product_threshold: 0.4,
            multi_product_threshold: 0.55,
            name_similarity_threshold: 0.4,
            recursive_min_confidence: 0.4,
            ..Self::default()
        }
    }

    /// Sets both acceptance thresholds (clamped to 0.0-1.0).
    pub fn with_thresholds(mut self, single: f64, multi: f64) -> Self {
        self.single_product_threshold = single.clamp(0.0, 1.0);
        self.multi_product_threshold = multi.clamp(0.0, 1.0);
        self
    }

    /// Sets the maximum recursion depth (1-10).
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth.clamp(1, 10);
        self
    }

    /// Sets the price optimizer's quantity cap.
    pub fn with_max_dp_quantity(mut self, quantity: u32) -> Self {
        self.max_dp_quantity = quantity.max(1);
        self
    }

    /// Sets the half/full box bias threshold.
    pub fn with_box_full_bias(mut self, min_boxes: u32) -> Self {
        self.box_full_bias_min = min_boxes.max(1);
        self
    }

    /// Disables the exact-quantity and weight-bounded pre-passes.
    pub fn without_prepasses(mut self) -> Self {
        self.enable_prepasses = false;
        self
    }

    /// Disables the Similarity last-resort matcher.
    pub fn without_similarity(mut self) -> Self {
        self.enable_similarity_fallback = false;
        self
    }

    /// Returns the acceptance threshold for a catalog of the given size.
    pub fn threshold_for(&self, catalog_len: usize) -> f64 {
        if catalog_len <= 1 {
            self.single_product_threshold
        } else {
            self.multi_product_threshold
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_for_catalog_size() {
        let options = MatchOptions::default();
        assert_eq!(options.threshold_for(1), 0.5);
        assert_eq!(options.threshold_for(3), 0.7);
    }

    #[test]
    fn test_builder_clamps() {
        let options = MatchOptions::new()
            .with_thresholds(1.4, -0.2)
            .with_max_depth(40)
            .with_max_dp_quantity(0);
        assert_eq!(options.single_product_threshold, 1.0);
        assert_eq!(options.multi_product_threshold, 0.0);
        assert_eq!(options.max_recursion_depth, 10);
        assert_eq!(options.max_dp_quantity, 1);
    }

    #[test]
    fn test_presets() {
        let strict = MatchOptions::strict();
        assert!(!strict.enable_similarity_fallback);
        assert!(strict.multi_product_threshold > MatchOptions::default().multi_product_threshold);

        let lenient = MatchOptions::lenient();
        assert!(lenient.multi_product_threshold < MatchOptions::default().multi_product_threshold);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let options: MatchOptions =
            serde_json::from_str(r#"{ "multi_product_threshold": 0.6 }"#).unwrap();
        assert_eq!(options.multi_product_threshold, 0.6);
        assert_eq!(options.max_recursion_depth, 10);
    }
}
