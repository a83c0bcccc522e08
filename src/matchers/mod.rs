//! Matching strategies.
//!
//! Each strategy is one variant of the closed [`Matcher`] enum and exposes a
//! single capability, [`Matcher::attempt`]. Which strategies run, and in which
//! order, is decided by [`priority`], a pure function of the catalog pattern.
//!
//! ## Strategies
//!
//! - [`Matcher::SimpleNumber`]: bare quantities on single-product and
//!   quantity-variant catalogs
//! - [`Matcher::NumberBased`]: "N번" ordinal references
//! - [`Matcher::BoxPattern`]: half boxes, full boxes, sets and counted units
//! - [`Matcher::ProductName`]: product-name search with quantity extraction
//! - [`Matcher::RecursiveSegment`]: multi-item comments, one segment at a time
//! - [`Matcher::Similarity`]: last-resort fuzzy scoring

pub mod box_pattern;
pub mod number_based;
pub mod product_name;
pub mod recursive;
pub mod similarity;
pub mod simple_number;

use crate::classifier::CatalogPattern;
use crate::model::{Catalog, MatchCandidate, MatchResult, MatcherKind, PatternType, Product};
use crate::options::MatchOptions;
use crate::pricing::PriceCalculator;
use regex::Regex;
use std::sync::LazyLock;

/// Why a matcher produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Miss {
    /// The catalog or comment shape is outside the matcher's domain
    NotApplicable,
    /// The matcher ran but found no product
    NoMatch,
    /// Recursion depth exhausted
    DepthExceeded,
}

impl std::fmt::Display for Miss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Miss::NotApplicable => write!(f, "not applicable"),
            Miss::NoMatch => write!(f, "no match"),
            Miss::DepthExceeded => write!(f, "recursion depth exceeded"),
        }
    }
}

/// Outcome of one matcher attempt.
pub type Attempt = std::result::Result<MatchResult, Miss>;

/// Everything a matcher may consult for one call.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    /// Catalog of the post
    pub catalog: &'a Catalog,
    /// Classification of the catalog
    pub pattern: &'a CatalogPattern,
    /// Matching options
    pub options: &'a MatchOptions,
    /// Tier optimizer
    pub pricing: &'a PriceCalculator,
    /// Current recursion depth
    pub depth: usize,
}

impl<'a> MatchContext<'a> {
    /// Creates a top-level context.
    pub fn new(
        catalog: &'a Catalog,
        pattern: &'a CatalogPattern,
        options: &'a MatchOptions,
        pricing: &'a PriceCalculator,
    ) -> Self {
        Self {
            catalog,
            pattern,
            options,
            pricing,
            depth: 0,
        }
    }

    /// The same context one recursion level down.
    pub fn deeper(&self) -> Self {
        Self {
            depth: self.depth + 1,
            ..*self
        }
    }

    /// Acceptance threshold for this catalog.
    pub fn threshold(&self) -> f64 {
        self.options.threshold_for(self.catalog.len())
    }

    /// Builds a candidate priced through the tier optimizer.
    pub fn candidate(
        &self,
        product: &Product,
        quantity: u32,
        confidence: f64,
        matcher: MatcherKind,
        comment: &str,
    ) -> MatchCandidate {
        let candidate = MatchCandidate::new(product, quantity, confidence, matcher);
        match self
            .pricing
            .best_for_product(candidate.quantity, product, Some(comment))
        {
            Some(option) => candidate.with_total(option.total_price),
            None => candidate,
        }
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// A matching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Matcher {
    SimpleNumber,
    NumberBased,
    BoxPattern,
    ProductName,
    RecursiveSegment,
    Similarity,
}

impl Matcher {
    /// The result-level kind of this strategy.
    pub fn kind(self) -> MatcherKind {
        match self {
            Matcher::SimpleNumber => MatcherKind::SimpleNumber,
            Matcher::NumberBased => MatcherKind::NumberBased,
            Matcher::BoxPattern => MatcherKind::BoxPattern,
            Matcher::ProductName => MatcherKind::ProductName,
            Matcher::RecursiveSegment => MatcherKind::RecursiveSegment,
            Matcher::Similarity => MatcherKind::Similarity,
        }
    }

    /// Runs the strategy on normalized comment text.
    pub fn attempt(self, text: &str, ctx: &MatchContext<'_>) -> Attempt {
        let outcome = match self {
            Matcher::SimpleNumber => simple_number::attempt(text, ctx),
            Matcher::NumberBased => number_based::attempt(text, ctx),
            Matcher::BoxPattern => box_pattern::attempt(text, ctx),
            Matcher::ProductName => product_name::attempt(text, ctx),
            Matcher::RecursiveSegment => recursive::attempt(text, ctx),
            Matcher::Similarity => similarity::attempt(text, ctx),
        }
        .map(|result| matchable_only(result, ctx.catalog));
        match &outcome {
            Ok(result) => log::debug!(
                "{} matched {} candidate(s) at {:.2} (depth {})",
                self.kind(),
                result.candidates.len(),
                result.confidence,
                ctx.depth
            ),
            Err(miss) => log::debug!("{}: {} (depth {})", self.kind(), miss, ctx.depth),
        }
        outcome
    }
}

impl std::fmt::Display for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind().name())
    }
}

/// Drops candidates whose product has no positive price.
pub(crate) fn matchable_only(mut result: MatchResult, catalog: &Catalog) -> MatchResult {
    result.candidates.retain(|c| {
        let matchable = catalog.get(c.product_id).is_some_and(Product::is_matchable);
        if !matchable {
            log::debug!("product {} has no price; candidate dropped", c.product_id);
        }
        matchable
    });
    result
}

/// Matcher priority for a catalog pattern.
///
/// Similarity is not part of any table; the orchestrator appends it as a
/// last resort.
pub fn priority(pattern: PatternType) -> &'static [Matcher] {
    use Matcher::*;
    match pattern {
        PatternType::SingleProduct => &[SimpleNumber, RecursiveSegment],
        PatternType::BoxProducts => &[BoxPattern, NumberBased, RecursiveSegment],
        PatternType::SizeVariant | PatternType::QuantityVariant => {
            &[NumberBased, SimpleNumber, RecursiveSegment]
        }
        PatternType::MixedProducts => &[NumberBased, RecursiveSegment, BoxPattern, SimpleNumber],
    }
}

/// Outcome of running a matcher table.
#[derive(Debug, Clone, Default)]
pub struct Cascade {
    /// First result meeting the acceptance threshold
    pub accepted: Option<MatchResult>,
    /// Best result below the threshold
    pub best: Option<MatchResult>,
    /// One line per attempted matcher
    pub diagnostics: Vec<String>,
}

/// Runs matchers in order until one meets the acceptance threshold.
pub fn cascade(text: &str, ctx: &MatchContext<'_>, table: &[Matcher]) -> Cascade {
    let threshold = ctx.threshold();
    let mut cascade = Cascade::default();

    for &matcher in table {
        match matcher.attempt(text, ctx) {
            Ok(result) if result.is_empty() => {
                cascade.diagnostics.push(format!("{}: no candidates", matcher));
            }
            Ok(result) if result.confidence >= threshold => {
                cascade
                    .diagnostics
                    .push(format!("{}: accepted at {:.2}", matcher, result.confidence));
                cascade.accepted = Some(result);
                break;
            }
            Ok(result) => {
                cascade.diagnostics.push(format!(
                    "{}: {:.2} below threshold {:.2}",
                    matcher, result.confidence, threshold
                ));
                if cascade
                    .best
                    .as_ref()
                    .map_or(true, |best| result.confidence > best.confidence)
                {
                    cascade.best = Some(result);
                }
            }
            Err(miss) => cascade.diagnostics.push(format!("{}: {}", matcher, miss)),
        }
    }

    cascade
}

// ============================================================================
// Shared helpers
// ============================================================================

static RE_BRACKET_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]|\([^)]*월[^)]*\)").unwrap());

/// Lowercased title with bracketed tags ("[8월28일]") removed.
pub fn clean_title(title: &str) -> String {
    RE_BRACKET_TAG
        .replace_all(&title.to_lowercase(), " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// [`clean_title`] followed by the product's search keywords.
pub fn searchable_title(product: &Product) -> String {
    let title = clean_title(&product.title);
    if product.keywords.is_empty() {
        return title;
    }
    let keywords = product
        .keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    format!("{} {}", title, keywords).trim().to_string()
}

/// Returns true if `text` contains the count `n` immediately followed by
/// `unit`, without a digit directly before it ("3봉" matches "감자 3봉",
/// not "감자 13봉").
pub fn has_count(text: &str, n: u32, unit: &str) -> bool {
    let needle = format!("{}{}", n, unit);
    let spaced = format!("{} {}", n, unit);
    [needle, spaced].iter().any(|needle| {
        text.match_indices(needle.as_str()).any(|(idx, _)| {
            !text[..idx]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_digit())
        })
    })
}

/// Korean native numeral prefix used in titles ("한박스", "두봉").
pub fn korean_prefix(n: u32) -> Option<&'static str> {
    match n {
        1 => Some("한"),
        2 => Some("두"),
        3 => Some("세"),
        4 => Some("네"),
        5 => Some("다섯"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_table() {
        assert_eq!(
            priority(PatternType::SingleProduct),
            &[Matcher::SimpleNumber, Matcher::RecursiveSegment]
        );
        assert_eq!(priority(PatternType::BoxProducts)[0], Matcher::BoxPattern);
        assert_eq!(
            priority(PatternType::QuantityVariant),
            priority(PatternType::SizeVariant)
        );
        let all = [
            PatternType::SingleProduct,
            PatternType::QuantityVariant,
            PatternType::SizeVariant,
            PatternType::BoxProducts,
            PatternType::MixedProducts,
        ];
        assert!(all
            .iter()
            .all(|p| !priority(*p).contains(&Matcher::Similarity)));
    }

    #[test]
    fn test_has_count_respects_digit_boundary() {
        assert!(has_count("햇감자 3봉", 3, "봉"));
        assert!(!has_count("햇감자 13봉", 3, "봉"));
        assert!(has_count("계란 30 구", 30, "구"));
        assert!(!has_count("계란 1판", 3, "판"));
    }

    #[test]
    fn test_clean_title_drops_date_tags() {
        assert_eq!(clean_title("[8월28일] 복숭아 1박스"), "복숭아 1박스");
        assert_eq!(clean_title("Apple BOX"), "apple box");
    }

    #[test]
    fn test_searchable_title_appends_keywords() {
        let product = Product::new(1, "[특가] 국내산 한돈 앞다리살 1kg").with_keywords(["제육", " "]);
        assert_eq!(searchable_title(&product), "국내산 한돈 앞다리살 1kg 제육");
        assert_eq!(searchable_title(&Product::new(2, "사과 1봉")), "사과 1봉");
    }

    #[test]
    fn test_unpriced_candidates_are_dropped() {
        let catalog = Catalog::new(vec![
            Product::new(1, "사과 1봉"),
            Product::new(2, "배 1봉").with_base_price(7000.0),
        ])
        .unwrap();
        let candidates = catalog
            .products()
            .map(|p| MatchCandidate::new(p, 2, 0.9, MatcherKind::ProductName))
            .collect();
        let result = matchable_only(
            MatchResult::from_candidates(candidates, 0.9, MatcherKind::ProductName),
            &catalog,
        );
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.candidates[0].product_id, 2);
    }

    #[test]
    fn test_miss_display() {
        assert_eq!(Miss::NotApplicable.to_string(), "not applicable");
        assert_eq!(Miss::DepthExceeded.to_string(), "recursion depth exceeded");
    }
}
