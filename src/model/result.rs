//! Match candidates and results.

use super::{PatternType, Product};
use serde::{Deserialize, Serialize};

/// The strategy that produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatcherKind {
    /// Bare or unit-suffixed quantity
    SimpleNumber,
    /// "N번" ordinal references
    NumberBased,
    /// Box, half-box, set and counted units
    BoxPattern,
    /// Product-name search with quantity extraction
    ProductName,
    /// Multi-item segmentation
    RecursiveSegment,
    /// Last-resort fuzzy scoring
    Similarity,
    /// Orchestrator pre-pass (exact title quantity, weight-bounded rules)
    Prepass,
}

impl MatcherKind {
    /// Stable name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            MatcherKind::SimpleNumber => "simple_number",
            MatcherKind::NumberBased => "number_based",
            MatcherKind::BoxPattern => "box_pattern",
            MatcherKind::ProductName => "product_name",
            MatcherKind::RecursiveSegment => "recursive_segment",
            MatcherKind::Similarity => "similarity",
            MatcherKind::Prepass => "prepass",
        }
    }
}

impl std::fmt::Display for MatcherKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One product/quantity decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    /// Matched product identifier
    pub product_id: u32,
    /// Matched product title
    pub title: String,
    /// Ordered quantity (always positive)
    pub quantity: u32,
    /// Price of one unit
    pub unit_price: f64,
    /// Total price of the candidate
    pub total_price: f64,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Strategy that produced the candidate
    pub matcher: MatcherKind,
    /// Free-text diagnostics
    #[serde(default)]
    pub note: String,
}

impl MatchCandidate {
    /// Creates a candidate priced linearly at the product's unit price.
    pub fn new(product: &Product, quantity: u32, confidence: f64, matcher: MatcherKind) -> Self {
        let quantity = quantity.max(1);
        let unit_price = product.unit_price().unwrap_or(0.0);
        Self {
            product_id: product.id,
            title: product.title.clone(),
            quantity,
            unit_price,
            total_price: unit_price * quantity as f64,
            confidence: confidence.clamp(0.0, 1.0),
            matcher,
            note: String::new(),
        }
    }

    /// Overrides the total price (e.g. with an optimizer result).
    pub fn with_total(mut self, total: f64) -> Self {
        self.total_price = total;
        if self.quantity > 0 {
            self.unit_price = total / self.quantity as f64;
        }
        self
    }

    /// Attaches a diagnostic note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }
}

/// The outcome of matching one comment against a catalog.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchResult {
    /// Candidates in comment order
    pub candidates: Vec<MatchCandidate>,
    /// Overall confidence in [0, 1]
    pub confidence: f64,
    /// True when the result fell below the acceptance threshold
    pub fallback_used: bool,
    /// Catalog pattern the result was produced under
    pub pattern: Option<PatternType>,
    /// True when the box-priority pass short-circuited the pipeline
    #[serde(default)]
    pub box_priority: bool,
    /// Strategy that produced the result
    pub matcher: Option<MatcherKind>,
    /// Diagnostic lines
    #[serde(default)]
    pub diagnostics: Vec<String>,
}

impl MatchResult {
    /// An empty result (not an order, or nothing matched).
    pub fn empty(pattern: Option<PatternType>) -> Self {
        Self {
            pattern,
            ..Self::default()
        }
    }

    /// A result built from candidates.
    pub fn from_candidates(
        candidates: Vec<MatchCandidate>,
        confidence: f64,
        matcher: MatcherKind,
    ) -> Self {
        Self {
            candidates,
            confidence: confidence.clamp(0.0, 1.0),
            matcher: Some(matcher),
            ..Self::default()
        }
    }

    /// A single-candidate result carrying the candidate's confidence.
    pub fn single(candidate: MatchCandidate) -> Self {
        let confidence = candidate.confidence;
        let matcher = candidate.matcher;
        Self::from_candidates(vec![candidate], confidence, matcher)
    }

    /// Appends a diagnostic line.
    pub fn with_diagnostic(mut self, line: impl Into<String>) -> Self {
        self.diagnostics.push(line.into());
        self
    }

    /// Returns true if nothing was matched.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Sum of candidate quantities.
    pub fn total_quantity(&self) -> u32 {
        self.candidates.iter().map(|c| c.quantity).sum()
    }

    /// Sum of candidate totals.
    pub fn total_price(&self) -> f64 {
        self.candidates.iter().map(|c| c.total_price).sum()
    }

    /// Returns true when the caller should hand the comment to an external fallback.
    pub fn needs_escalation(&self, threshold: f64) -> bool {
        self.is_empty() || self.fallback_used || self.confidence < threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_linear_pricing() {
        let product = Product::new(1, "감자 1봉").with_base_price(3500.0);
        let candidate = MatchCandidate::new(&product, 3, 1.4, MatcherKind::SimpleNumber);
        assert_eq!(candidate.total_price, 10500.0);
        assert_eq!(candidate.confidence, 1.0);
    }

    #[test]
    fn test_candidate_with_total() {
        let product = Product::new(1, "감자 1봉").with_base_price(3500.0);
        let candidate =
            MatchCandidate::new(&product, 2, 0.9, MatcherKind::SimpleNumber).with_total(6000.0);
        assert_eq!(candidate.unit_price, 3000.0);
    }

    #[test]
    fn test_needs_escalation() {
        assert!(MatchResult::empty(None).needs_escalation(0.7));

        let product = Product::new(1, "감자 1봉").with_base_price(3500.0);
        let result =
            MatchResult::single(MatchCandidate::new(&product, 1, 0.95, MatcherKind::SimpleNumber));
        assert!(!result.needs_escalation(0.7));
        assert!(result.needs_escalation(0.99));

        let mut fallback = result.clone();
        fallback.fallback_used = true;
        assert!(fallback.needs_escalation(0.5));
    }

    #[test]
    fn test_result_serializes() {
        let product = Product::new(2, "복숭아 1박스").with_base_price(23900.0);
        let result =
            MatchResult::single(MatchCandidate::new(&product, 2, 0.92, MatcherKind::BoxPattern));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["candidates"][0]["matcher"], "box_pattern");
        assert_eq!(json["candidates"][0]["total_price"], 47800.0);
    }
}
