//! Top-level matching pipeline.
//!
//! ## Flow
//!
//! 1. Normalize, strip customer metadata, classify the catalog
//! 2. Refuse cancellations and comments that carry no order signal
//!    (greetings, thanks)
//! 3. Pre-passes: an exact `N개` title hit, and weight-bounded titles
//!    ("수박 8kg 이하")
//! 4. Box priority: BoxPattern first whenever a title carries a box keyword
//!    and the comment holds a single item
//! 5. The matcher cascade for the catalog pattern, with Similarity appended
//! 6. Drop unpriced products, deduplicate candidates by product and reprice
//!    merged quantities
//!
//! Steps 2 to 5 also run for every segment of a multi-item comment.

use crate::classifier::{base_name, classify, CatalogPattern, PatternCache};
use crate::matchers::recursive::Segmenter;
use crate::matchers::{cascade, has_count, matchable_only, priority, Cascade, MatchContext, Matcher};
use crate::model::{Catalog, MatchCandidate, MatchResult, MatcherKind, Product};
use crate::normalize::{normalize, parse_quantity, strip_customer_metadata, strip_order_endings};
use crate::options::MatchOptions;
use crate::pricing::PriceCalculator;
use crate::units::{alternation, has_box_keyword, PACKAGING_UNITS};
use indexmap::IndexMap;
use regex::Regex;
use std::sync::{Arc, LazyLock};

const CANCELLATION_WORDS: &[&str] = &["취소", "마감", "완판", "품절"];

const COURTESY_WORDS: &[&str] = &["감사", "잘받았", "수고"];

static RE_NUMERAL_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?:한|두|세|네|다섯|반)\s*(?:{})",
        alternation(PACKAGING_UNITS)
    ))
    .unwrap()
});

static RE_STANDALONE_NUMERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:하나|둘|셋|넷)(?:요|이요|만|씩)?$").unwrap());

static RE_QUANTITY_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*(?:개|봉지|봉|세트|박스|포|팩|통)?$").unwrap());

static RE_EXACT_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*개?\s*(?:요|이요)?$").unwrap());

static RE_HANGUL_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[가-힣]{2,}").unwrap());

/// Matches a comment with default options and no cache.
///
/// # Example
///
/// ```
/// use ordermatch::{match_comment, Catalog, Product};
///
/// let catalog = Catalog::new(vec![Product::new(1, "대추방울토마토 2kg").with_base_price(15000.0)])?;
/// let result = match_comment("3개요", &catalog);
/// assert_eq!(result.candidates[0].quantity, 3);
/// assert_eq!(result.total_price(), 45000.0);
/// # Ok::<(), ordermatch::Error>(())
/// ```
pub fn match_comment(comment: &str, catalog: &Catalog) -> MatchResult {
    match_comment_with(comment, catalog, &MatchOptions::default(), None)
}

/// Matches a comment against a catalog.
///
/// Never fails: text that is not an order, or that nothing matches, yields an
/// empty result whose diagnostics say why.
pub fn match_comment_with(
    comment: &str,
    catalog: &Catalog,
    options: &MatchOptions,
    cache: Option<&PatternCache>,
) -> MatchResult {
    let pattern: Arc<CatalogPattern> = match cache {
        Some(cache) => cache.get_or_classify(catalog),
        None => Arc::new(classify(catalog)),
    };
    let pattern_type = pattern.pattern_type;

    let text = strip_customer_metadata(&normalize(comment));
    if catalog.is_empty() || text.is_empty() {
        return MatchResult::empty(Some(pattern_type)).with_diagnostic("empty comment or catalog");
    }

    if let Some(word) = CANCELLATION_WORDS.iter().find(|w| text.contains(**w)) {
        log::debug!("comment {:?} cancels ({})", text, word);
        return MatchResult::empty(Some(pattern_type))
            .with_diagnostic(format!("cancellation word '{}'", word));
    }

    let pricing = PriceCalculator::new(options);
    let ctx = MatchContext::new(catalog, &pattern, options, &pricing);

    let outcome = run_pipeline(&text, &ctx);
    let result = match (outcome.accepted, outcome.best) {
        (Some(accepted), _) => finalize(accepted, &text, &ctx),
        (None, Some(best)) => {
            log::info!(
                "no matcher reached {:.2}; falling back at {:.2}",
                ctx.threshold(),
                best.confidence
            );
            let mut result = finalize(best, &text, &ctx);
            result.fallback_used = true;
            result
        }
        (None, None) => {
            log::info!("nothing matched {:?}", text);
            MatchResult::empty(Some(pattern_type))
        }
    };

    outcome
        .diagnostics
        .into_iter()
        .fold(result, |result, line| result.with_diagnostic(line))
}

/// Everything after normalization: the order-signal gate, the pre-passes,
/// box priority and the matcher cascade with Similarity appended.
///
/// Runs once for a comment and again, one level deeper, for every segment of
/// a multi-item comment.
pub(crate) fn run_pipeline(text: &str, ctx: &MatchContext<'_>) -> Cascade {
    let mut outcome = Cascade::default();
    if !has_order_signal(text, ctx.catalog) {
        log::debug!("comment {:?} carries no order signal", text);
        outcome.diagnostics.push("no order signal".to_string());
        return outcome;
    }

    if ctx.options.enable_prepasses {
        let prepass = exact_count_prepass(text, ctx)
            .map(|result| (result, "exact-count pre-pass"))
            .or_else(|| weight_bounded_prepass(text, ctx).map(|result| (result, "weight-bounded pre-pass")));
        if let Some((result, name)) = prepass {
            let result = matchable_only(result, ctx.catalog);
            if !result.is_empty() {
                outcome.accepted = Some(result);
                outcome.diagnostics.push(name.to_string());
                return outcome;
            }
        }
    }

    let has_boxes = ctx.catalog.products().any(|p| has_box_keyword(&p.title));
    if has_boxes && !Segmenter::for_catalog(ctx.catalog).looks_multi(text) {
        if let Ok(mut result) = Matcher::BoxPattern.attempt(text, ctx) {
            if !result.is_empty() && result.confidence >= ctx.options.box_priority_threshold {
                result.box_priority = true;
                outcome.accepted = Some(result);
                outcome.diagnostics.push("box priority".to_string());
                return outcome;
            }
        }
    }

    let mut table = priority(ctx.pattern.pattern_type).to_vec();
    if ctx.options.enable_similarity_fallback && !COURTESY_WORDS.iter().any(|w| text.contains(w)) {
        table.push(Matcher::Similarity);
    }
    cascade(text, ctx, &table)
}

// ============================================================================
// Order signal
// ============================================================================

/// Returns true if a comment could be an order: it carries a number, a Korean
/// quantity, a word of a catalog title or a product keyword.
fn has_order_signal(text: &str, catalog: &Catalog) -> bool {
    if text.chars().any(|c| c.is_ascii_digit()) || RE_NUMERAL_UNIT.is_match(text) {
        return true;
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.iter().any(|w| RE_STANDALONE_NUMERAL.is_match(w)) {
        return true;
    }
    let keyword_hit = catalog
        .products()
        .flat_map(|p| p.keywords.iter())
        .any(|k| !k.trim().is_empty() && text.contains(k.trim()));
    if keyword_hit {
        return true;
    }
    catalog.products().any(|p| {
        let name = base_name(&p.title);
        name.split_whitespace().any(|part| {
            if part.chars().count() >= 2 {
                RE_HANGUL_WORD.is_match(part) && text.contains(part)
            } else {
                words.contains(&part)
            }
        })
    })
}

// ============================================================================
// Pre-passes
// ============================================================================

/// "3" / "3개요" when exactly one title sells `3개`.
fn exact_count_prepass(text: &str, ctx: &MatchContext<'_>) -> Option<MatchResult> {
    if ctx.catalog.len() < 2 {
        return None;
    }
    let caps = RE_EXACT_COUNT.captures(text)?;
    let count = parse_quantity(&caps[1])?;
    let hits: Vec<&Product> = ctx
        .catalog
        .products()
        .filter(|p| has_count(&p.title, count, "개"))
        .collect();
    let [product] = hits.as_slice() else {
        return None;
    };
    let candidate = ctx.candidate(
        product,
        1,
        ctx.options.exact_title_confidence,
        MatcherKind::Prepass,
        text,
    );
    Some(MatchResult::single(candidate))
}

static RE_TITLE_BOUND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(?:kg|키로)이하").unwrap());

static RE_BOUND_WEIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*(?:kg|키로)$").unwrap());

static RE_BOUND_UNDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*(?:kg|키로)\s*이하$").unwrap());

static RE_BOUND_UNDER_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s*(?:kg|키로)\s*이하\s*(\d+)\s*(?:통|개)$").unwrap()
});

static RE_TRAILING_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*(?:통|개)").unwrap());

/// A product sold under a weight bound ("수박 8kg 이하").
struct Bounded<'c> {
    product: &'c Product,
    weight: u32,
    name: String,
}

fn bounded_products<'c>(catalog: &'c Catalog) -> Vec<Bounded<'c>> {
    catalog
        .products()
        .filter_map(|product| {
            let compact = product.title.to_lowercase().replace(' ', "");
            let weight = RE_TITLE_BOUND
                .captures(&compact)
                .and_then(|c| parse_quantity(&c[1]))?;
            let name = RE_HANGUL_WORD.find(&product.title)?.as_str().to_string();
            Some(Bounded {
                product,
                weight,
                name,
            })
        })
        .collect()
}

/// Watermelon-style catalogs: products bounded by weight, ordered by weight.
fn weight_bounded_prepass(text: &str, ctx: &MatchContext<'_>) -> Option<MatchResult> {
    let bounded = bounded_products(ctx.catalog);
    if bounded.is_empty() {
        return None;
    }
    let text = strip_order_endings(text);
    let by_weight = |w: u32| bounded.iter().find(|b| b.weight == w);
    let accept = |b: &Bounded<'_>, quantity: u32, confidence: f64| {
        MatchResult::single(ctx.candidate(b.product, quantity, confidence, MatcherKind::Prepass, &text))
    };

    if let Some(caps) = RE_BOUND_WEIGHT.captures(&text) {
        let b = by_weight(parse_quantity(&caps[1])?)?;
        return Some(accept(b, 1, 0.93));
    }
    if let Some(caps) = RE_BOUND_UNDER.captures(&text) {
        let b = by_weight(parse_quantity(&caps[1])?)?;
        return Some(accept(b, 1, 0.95));
    }
    if let Some(caps) = RE_BOUND_UNDER_COUNT.captures(&text) {
        let b = by_weight(parse_quantity(&caps[1])?)?;
        let quantity = parse_quantity(&caps[2])?;
        return Some(accept(b, quantity, 0.9));
    }

    for b in &bounded {
        let name = regex::escape(&b.name);
        let named_bound = Regex::new(&format!(r"^{}\s*(\d+)\s*(?:kg|키로)\s*이하(.*)$", name)).ok()?;
        if let Some(caps) = named_bound.captures(&text) {
            let target = by_weight(parse_quantity(&caps[1])?)?;
            let quantity = RE_TRAILING_COUNT
                .captures(&caps[2])
                .and_then(|c| parse_quantity(&c[1]))
                .unwrap_or(1);
            return Some(accept(target, quantity, 0.92));
        }
    }

    let first = bounded.first()?;
    let named_count =
        Regex::new(&format!(r"^{}\s*(\d+)\s*(?:통|개)$", regex::escape(&first.name))).ok()?;
    let caps = named_count.captures(&text)?;
    Some(accept(first, parse_quantity(&caps[1])?, 0.85))
}

// ============================================================================
// Finalization
// ============================================================================

/// Drops unpriced products, merges candidates of the same product and applies
/// the single-product floor.
fn finalize(result: MatchResult, text: &str, ctx: &MatchContext<'_>) -> MatchResult {
    let mut result = matchable_only(result, ctx.catalog);
    if result.is_empty() {
        result.confidence = 0.0;
    }
    let mut merged: IndexMap<u32, (MatchCandidate, bool)> = IndexMap::new();
    for candidate in std::mem::take(&mut result.candidates) {
        match merged.get_mut(&candidate.product_id) {
            Some((kept, repeated)) => {
                kept.quantity += candidate.quantity;
                kept.confidence = kept.confidence.max(candidate.confidence);
                *repeated = true;
            }
            None => {
                merged.insert(candidate.product_id, (candidate, false));
            }
        }
    }

    result.candidates = merged
        .into_values()
        .map(|(candidate, repeated)| {
            if !repeated {
                return candidate;
            }
            log::debug!(
                "merged repeated product {} into quantity {}",
                candidate.product_id,
                candidate.quantity
            );
            match ctx.catalog.get(candidate.product_id).and_then(|p| {
                ctx.pricing
                    .best_for_product(candidate.quantity, p, Some(text))
            }) {
                Some(option) => candidate.with_total(option.total_price),
                None => {
                    let total = candidate.unit_price * candidate.quantity as f64;
                    candidate.with_total(total)
                }
            }
        })
        .collect();

    let quantity_only = RE_QUANTITY_ONLY.is_match(&strip_order_endings(text));
    if ctx.catalog.len() == 1 && quantity_only && !result.is_empty() {
        let floor = ctx.options.single_quantity_floor;
        result.confidence = result.confidence.max(floor);
        for candidate in &mut result.candidates {
            candidate.confidence = candidate.confidence.max(floor);
        }
    }

    result.pattern = Some(ctx.pattern.pattern_type);
    result
}
