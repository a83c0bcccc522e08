//! # ordermatch
//!
//! A pattern-matching engine that turns free-form Korean group-buy comments
//! ("사과2 배3", "반박스 하나요", "2번 3개") into structured orders against the
//! product catalog of one post.
//!
//! ## Pipeline
//!
//! - **Normalize**: markup, full-width forms, look-alike digits and Korean
//!   numerals are folded into one canonical text
//! - **Classify**: the catalog is reduced to a [`PatternType`] that decides
//!   which matchers run and in which order
//! - **Match**: matchers are tried in priority order until one clears the
//!   acceptance threshold
//! - **Price**: every candidate is priced with the cheapest tier combination
//!
//! ## Quick Start
//!
//! ```
//! use ordermatch::{Catalog, OrderMatcher, Product};
//!
//! let catalog = Catalog::new(vec![
//!     Product::new(1, "복숭아 반박스").with_base_price(12900.0),
//!     Product::new(2, "복숭아 1박스").with_base_price(23900.0),
//! ])?;
//!
//! let matcher = OrderMatcher::new();
//! let result = matcher.match_comment("2박스 주세요", &catalog);
//!
//! assert_eq!(result.candidates[0].product_id, 2);
//! assert_eq!(result.candidates[0].quantity, 2);
//! # Ok::<(), ordermatch::Error>(())
//! ```
//!
//! Matching never fails. A comment that is not an order, or that nothing
//! matches, comes back as an empty [`MatchResult`] whose diagnostics say why;
//! [`MatchResult::needs_escalation`] tells the caller when to hand the comment
//! to an external fallback.

pub mod analyzer;
pub mod classifier;
pub mod error;
pub mod matchers;
pub mod model;
pub mod normalize;
pub mod options;
pub mod orchestrator;
pub mod pricing;
pub mod units;

// Re-exports
pub use analyzer::{analyze, CommentAnalysis, CommentType, PatternKind};
pub use classifier::{classify, CatalogPattern, PatternCache};
pub use error::{Error, Result};
pub use model::{Catalog, MatchCandidate, MatchResult, MatcherKind, PatternType, PriceTier, Product};
pub use normalize::{normalize, normalize_with, NormalizeOptions};
pub use options::MatchOptions;
pub use orchestrator::{match_comment, match_comment_with};
pub use pricing::{best_option, PriceOption};

use rayon::prelude::*;
use std::sync::Arc;

/// Builder for configuring and running comment matching.
///
/// The matcher owns a [`PatternCache`], so repeated calls against the same
/// catalog classify it only once. Cloning shares the cache.
///
/// # Example
///
/// ```
/// use ordermatch::{Catalog, OrderMatcher, Product};
///
/// let catalog = Catalog::new(vec![
///     Product::new(1, "사과 1봉").with_base_price(5000.0),
///     Product::new(2, "배 1봉").with_base_price(7000.0),
/// ])?;
///
/// let matcher = OrderMatcher::new().strict().with_max_depth(5);
/// let results = matcher.match_batch(&["사과2", "배 3개요", "감사합니다"], &catalog);
///
/// assert_eq!(results.len(), 3);
/// assert!(results[2].is_empty());
/// # Ok::<(), ordermatch::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct OrderMatcher {
    options: MatchOptions,
    cache: Arc<PatternCache>,
}

impl Default for OrderMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderMatcher {
    /// Creates a new matcher with default options and an empty cache.
    pub fn new() -> Self {
        Self {
            options: MatchOptions::default(),
            cache: Arc::new(PatternCache::new()),
        }
    }

    /// Replaces all options.
    pub fn with_options(mut self, options: MatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Shares an existing pattern cache.
    pub fn with_cache(mut self, cache: Arc<PatternCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Raises the acceptance thresholds (fewer fallbacks, more escalations).
    pub fn strict(mut self) -> Self {
        self.options = MatchOptions {
            max_recursion_depth: self.options.max_recursion_depth,
            ..MatchOptions::strict()
        };
        self
    }

    /// Lowers the acceptance thresholds.
    pub fn lenient(mut self) -> Self {
        self.options = MatchOptions {
            max_recursion_depth: self.options.max_recursion_depth,
            ..MatchOptions::lenient()
        };
        self
    }

    /// Sets the acceptance thresholds for single-product and other catalogs.
    pub fn with_thresholds(mut self, single: f64, multi: f64) -> Self {
        self.options = self.options.with_thresholds(single, multi);
        self
    }

    /// Sets the recursion limit of the segmenting matcher.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.options = self.options.with_max_depth(depth);
        self
    }

    /// Disables the exact-quantity and weight-bounded pre-passes.
    pub fn without_prepasses(mut self) -> Self {
        self.options = self.options.without_prepasses();
        self
    }

    /// Disables the last-resort fuzzy matcher.
    pub fn without_similarity(mut self) -> Self {
        self.options = self.options.without_similarity();
        self
    }

    /// Returns the active options.
    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    /// Returns the shared pattern cache.
    pub fn cache(&self) -> &PatternCache {
        &self.cache
    }

    /// Matches one comment.
    pub fn match_comment(&self, comment: &str, catalog: &Catalog) -> MatchResult {
        match_comment_with(comment, catalog, &self.options, Some(&self.cache))
    }

    /// Matches many comments against one catalog in parallel.
    ///
    /// Results come back in input order.
    pub fn match_batch<S>(&self, comments: &[S], catalog: &Catalog) -> Vec<MatchResult>
    where
        S: AsRef<str> + Sync,
    {
        log::debug!("matching batch of {} comment(s)", comments.len());
        comments
            .par_iter()
            .map(|comment| self.match_comment(comment.as_ref(), catalog))
            .collect()
    }

    /// Analyzes a comment without matching it.
    pub fn analyze(&self, comment: &str, catalog: &Catalog) -> CommentAnalysis {
        analyze(comment, catalog)
    }

    /// Classifies a catalog through the shared cache.
    pub fn classify(&self, catalog: &Catalog) -> Arc<CatalogPattern> {
        self.cache.get_or_classify(catalog)
    }
}

/// Matches many comments against one catalog in parallel with default options.
///
/// # Example
///
/// ```
/// use ordermatch::{match_batch, Catalog, Product};
///
/// let catalog = Catalog::new(vec![Product::new(1, "대추방울토마토 2kg").with_base_price(15000.0)])?;
/// let results = match_batch(&["1", "3개요"], &catalog);
/// assert_eq!(results[1].total_quantity(), 3);
/// # Ok::<(), ordermatch::Error>(())
/// ```
pub fn match_batch<S>(comments: &[S], catalog: &Catalog) -> Vec<MatchResult>
where
    S: AsRef<str> + Sync,
{
    OrderMatcher::new().match_batch(comments, catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orchard() -> Catalog {
        Catalog::new(vec![
            Product::new(1, "사과 1봉").with_base_price(5000.0),
            Product::new(2, "배 1봉").with_base_price(7000.0),
            Product::new(3, "단감 1봉").with_base_price(6000.0),
        ])
        .unwrap()
    }

    fn peaches() -> Catalog {
        Catalog::new(vec![
            Product::new(1, "복숭아 반박스").with_base_price(12900.0),
            Product::new(2, "복숭아 1박스").with_base_price(23900.0),
        ])
        .unwrap()
    }

    fn picked(result: &MatchResult) -> Vec<(u32, u32)> {
        result
            .candidates
            .iter()
            .map(|c| (c.product_id, c.quantity))
            .collect()
    }

    #[test]
    fn test_builder_defaults() {
        let matcher = OrderMatcher::new();
        assert_eq!(matcher.options(), &MatchOptions::default());
        assert!(matcher.cache().is_empty());
    }

    #[test]
    fn test_builder_presets_keep_depth() {
        let matcher = OrderMatcher::new().with_max_depth(3).strict();
        assert_eq!(matcher.options().max_recursion_depth, 3);
        assert_eq!(
            matcher.options().multi_product_threshold,
            MatchOptions::strict().multi_product_threshold
        );
    }

    #[test]
    fn test_batch_preserves_order_and_shares_cache() {
        let matcher = OrderMatcher::new();
        let catalog = orchard();
        let results = matcher.match_batch(&["사과2", "안녕하세요", "단감 4개"], &catalog);

        assert_eq!(picked(&results[0]), vec![(1, 2)]);
        assert!(results[1].is_empty());
        assert_eq!(picked(&results[2]), vec![(3, 4)]);
        assert_eq!(matcher.cache().len(), 1);
    }

    #[test]
    fn test_cloned_matcher_shares_cache() {
        let matcher = OrderMatcher::new();
        let clone = matcher.clone();
        clone.match_comment("사과2", &orchard());
        assert_eq!(matcher.cache().len(), 1);
    }

    #[test]
    fn test_engine_types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Catalog>();
        assert_send_sync::<CatalogPattern>();
        assert_send_sync::<PatternCache>();
        assert_send_sync::<OrderMatcher>();
    }

    // ==================== Edge Case Tests ====================

    #[test]
    fn test_single_product_determinism() {
        let catalog =
            Catalog::new(vec![Product::new(1, "대추방울토마토 2kg").with_base_price(15000.0)])
                .unwrap();
        let matcher = OrderMatcher::new();
        for n in 1..=99u32 {
            let result = matcher.match_comment(&n.to_string(), &catalog);
            assert_eq!(picked(&result), vec![(1, n)], "comment {}", n);
            assert!(result.confidence >= 0.9, "comment {}", n);
        }
    }

    #[test]
    fn test_recursive_coverage() {
        let result = OrderMatcher::new().match_comment("사과2 단감3", &orchard());
        assert_eq!(picked(&result), vec![(1, 2), (3, 3)]);
        assert_eq!(result.total_price(), 28000.0);
    }

    #[test]
    fn test_box_bias_prefers_full_boxes() {
        let result = OrderMatcher::new().match_comment("2박스", &peaches());
        assert_eq!(picked(&result), vec![(2, 2)]);
        assert_eq!(result.total_price(), 47800.0);
    }

    #[test]
    fn test_greeting_is_empty_without_fallback() {
        for greeting in ["안녕하세요", "감사합니다~", "ㅋㅋㅋ", "   "] {
            let result = OrderMatcher::new().match_comment(greeting, &orchard());
            assert!(result.is_empty(), "comment {:?}", greeting);
            assert!(!result.fallback_used, "comment {:?}", greeting);
        }
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = Catalog::new(Vec::new()).unwrap();
        let result = OrderMatcher::new().match_comment("사과2", &catalog);
        assert!(result.is_empty());
        assert!(!result.fallback_used);
    }

    #[test]
    fn test_repeated_hits_are_merged() {
        let result = OrderMatcher::new().match_comment("사과2, 사과3", &orchard());
        assert_eq!(picked(&result), vec![(1, 5)]);
    }

    #[test]
    fn test_phone_number_never_becomes_quantity() {
        let catalog =
            Catalog::new(vec![Product::new(1, "사과 1박스").with_base_price(20000.0)]).unwrap();
        let matcher = OrderMatcher::new();
        for comment in ["01012345678", "010-1234-5678", "7219", "0123"] {
            let result = matcher.match_comment(comment, &catalog);
            assert!(
                result.candidates.iter().all(|c| c.quantity < 100),
                "comment {:?} gave {:?}",
                comment,
                picked(&result)
            );
        }
    }

    #[test]
    fn test_phone_number_next_to_items_on_mixed_catalog() {
        let _ = env_logger::builder().is_test(true).try_init();
        let matcher = OrderMatcher::new();
        let comments = ["사과0105", "1번 0123", "사과 10 0123", "김철수 7933 사과2, 배1"];
        let results = matcher.match_batch(&comments, &orchard());
        for (comment, result) in comments.iter().zip(&results) {
            assert!(!result.is_empty(), "comment {:?} matched nothing", comment);
            assert!(
                result
                    .candidates
                    .iter()
                    .all(|c| ![105, 123, 7933].contains(&c.quantity)),
                "comment {:?} gave {:?}",
                comment,
                picked(result)
            );
        }
    }

    #[test]
    fn test_catalog_validation() {
        let duplicate = Catalog::new(vec![Product::new(1, "사과"), Product::new(1, "배")]);
        assert!(matches!(duplicate, Err(Error::DuplicateProduct(1))));

        let zero_tier = Catalog::new(vec![Product::new(1, "사과").with_tier(0, 5000.0)]);
        assert!(matches!(zero_tier, Err(Error::InvalidTier { product: 1, .. })));

        let negative = Catalog::new(vec![Product::new(1, "사과").with_tier(2, -1.0)]);
        assert!(matches!(negative, Err(Error::InvalidTier { product: 1, .. })));
    }

    #[test]
    fn test_malformed_catalog_json() {
        assert!(matches!(Catalog::from_json("{ not json"), Err(Error::Json(_))));
    }

    #[test]
    fn test_needs_escalation() {
        let matcher = OrderMatcher::new();
        let empty = matcher.match_comment("수박3", &orchard());
        assert!(empty.needs_escalation(0.7));

        let confident = matcher.match_comment("단감 4개", &orchard());
        assert!(!confident.needs_escalation(0.7));
    }

    #[test]
    fn test_very_long_comment() {
        let comment = "사과2 ".repeat(500);
        let result = OrderMatcher::new().match_comment(&comment, &orchard());
        assert!(result.confidence <= 1.0);
        assert!(result.candidates.len() <= 1);
    }
}
