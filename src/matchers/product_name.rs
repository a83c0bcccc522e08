//! Product-name search with quantity extraction.
//!
//! Structural shapes are handled before any name search:
//!
//! - weight arithmetic on single-product catalogs ("6키로" against "고구마 3kg"),
//!   and a bare "N키로" as N of the 1kg product elsewhere
//! - half requests ("반통")
//! - box requests with the half/full bias
//! - pure quantities resolved by price among unit-count titles
//! - unit expressions ("3봉") against titles
//! - piece counts against composite titles ("10알" against "5알(1세트)")
//!
//! Anything else goes through noun extraction and [`title_similarity`] against
//! the title and the product's search keywords.

use super::similarity::title_similarity;
use super::{has_count, korean_prefix, searchable_title, Attempt, MatchContext, Miss};
use crate::model::{MatchCandidate, MatchResult, MatcherKind, Product};
use crate::normalize::{korean_number, parse_quantity, strip_order_endings, USAGE_KEYWORDS};
use crate::units::{
    alternation, composite_rule, is_full_box, is_half_box, requested_kilos, units_compatible,
    units_for_kilos, weight_in_kg,
};
use regex::Regex;
use std::sync::LazyLock;

const NAME_UNITS: &[&str] = &[
    "박스", "상자", "봉지", "봉", "개", "통", "팩", "세트", "묶음", "키로", "킬로", "kg", "알",
    "마리", "병", "판", "송이",
];

static RE_KILO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*(?:kg|키로|킬로)$").unwrap());

static RE_HALF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^반\s*(박스|통|봉지)$").unwrap());

static RE_BOX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+|한|두|세)\s*박스").unwrap());

static RE_PURE_QUANTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*개?$").unwrap());

static RE_TITLE_COUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*개").unwrap());

static RE_UNIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*(봉지|봉|박스|개|통|팩|세트|묶음)$").unwrap());

static RE_PIECES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)\s*알$").unwrap());

static RE_ORDINAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+\s*번").unwrap());

static RE_NUMBER_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(\d+)\s*({})", alternation(NAME_UNITS))).unwrap()
});

static RE_KOREAN_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(하나|한|두|둘|세|셋|네|넷|다섯)\s*({})?",
        alternation(NAME_UNITS)
    ))
    .unwrap()
});

static RE_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

static RE_PUNCT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s가-힣]+").unwrap());

pub fn attempt(text: &str, ctx: &MatchContext<'_>) -> Attempt {
    if ctx.catalog.is_empty() {
        return Err(Miss::NotApplicable);
    }
    let clean = strip_order_endings(text);
    if clean.is_empty() {
        return Err(Miss::NoMatch);
    }

    if let Some(result) = weight_request(&clean, text, ctx)
        .or_else(|| half_request(&clean, text, ctx))
        .or_else(|| box_request(&clean, text, ctx))
        .or_else(|| pure_quantity(&clean, text, ctx))
        .or_else(|| unit_request(&clean, text, ctx))
        .or_else(|| piece_request(&clean, text, ctx))
    {
        return Ok(result);
    }

    name_search(&clean, text, ctx)
}

fn single(
    product: &Product,
    quantity: u32,
    confidence: f64,
    comment: &str,
    ctx: &MatchContext<'_>,
) -> MatchResult {
    MatchResult::single(ctx.candidate(product, quantity, confidence, MatcherKind::ProductName, comment))
}

// ============================================================================
// Structural shapes
// ============================================================================

fn weight_request(clean: &str, comment: &str, ctx: &MatchContext<'_>) -> Option<MatchResult> {
    if let Some(product) = ctx.catalog.single() {
        let kilos = requested_kilos(clean)?;
        let units = units_for_kilos(kilos, &product.title)?;
        log::debug!("{}kg covered by {} x '{}'", kilos, units, product.title);
        return Some(single(product, units, 0.95, comment, ctx));
    }

    let caps = RE_KILO.captures(clean)?;
    let kilos = parse_quantity(&caps[1])?;
    let product = ctx
        .catalog
        .products()
        .find(|p| weight_in_kg(&p.title) == Some(1.0))?;
    log::debug!("{}kg as {} x '{}'", kilos, kilos, product.title);
    Some(single(product, kilos, 0.95, comment, ctx))
}

fn half_request(clean: &str, comment: &str, ctx: &MatchContext<'_>) -> Option<MatchResult> {
    let caps = RE_HALF.captures(clean)?;
    let half = format!("반{}", &caps[1]);
    if let Some(product) = ctx
        .catalog
        .products()
        .find(|p| p.title.replace(' ', "").contains(&half))
    {
        return Some(single(product, 1, 0.95, comment, ctx));
    }
    let product = ctx.catalog.products().find(|p| p.title.contains(&caps[1]))?;
    Some(single(product, 1, 0.8, comment, ctx))
}

fn box_request(clean: &str, comment: &str, ctx: &MatchContext<'_>) -> Option<MatchResult> {
    let caps = RE_BOX.captures(clean)?;
    let quantity = parse_quantity(&caps[1]).or_else(|| korean_number(&caps[1]))?;

    let has_half = ctx.catalog.products().any(|p| is_half_box(&p.title));
    let full = ctx.catalog.products().find(|p| is_full_box(&p.title));
    if quantity >= ctx.options.box_full_bias_min && has_half {
        if let Some(full) = full {
            return Some(single(full, quantity, 0.95, comment, ctx));
        }
    }

    let product = ctx.catalog.products().find(|p| {
        has_count(&p.title, quantity, "박스")
            || has_count(&p.title, quantity, "박")
            || (quantity == 1 && p.title.contains("한박스"))
    })?;
    Some(single(product, 1, 0.95, comment, ctx))
}

/// Unit count of a title ("계란 30개" → 30).
fn title_count(product: &Product) -> Option<u32> {
    let caps = RE_TITLE_COUNT.captures(&product.title)?;
    parse_quantity(&caps[1])
}

fn pure_quantity(clean: &str, comment: &str, ctx: &MatchContext<'_>) -> Option<MatchResult> {
    let caps = RE_PURE_QUANTITY.captures(clean)?;
    let requested = parse_quantity(&caps[1])?;
    let counted: Vec<(&Product, u32)> = ctx
        .catalog
        .products()
        .filter_map(|p| title_count(p).map(|c| (p, c)))
        .collect();
    if counted.is_empty() {
        return None;
    }

    let mut options: Vec<Vec<MatchCandidate>> = Vec::new();
    for &(product, count) in &counted {
        if requested % count == 0 {
            let units = requested / count;
            options.push(vec![ctx.candidate(product, units, 0.95, MatcherKind::ProductName, comment)]);
        }
    }
    for (i, &(a, ca)) in counted.iter().enumerate() {
        for &(b, cb) in &counted[i + 1..] {
            if a.id != b.id && ca + cb == requested {
                options.push(vec![
                    ctx.candidate(a, 1, 0.9, MatcherKind::ProductName, comment),
                    ctx.candidate(b, 1, 0.9, MatcherKind::ProductName, comment),
                ]);
            }
        }
    }

    let total = |option: &Vec<MatchCandidate>| option.iter().map(|c| c.total_price).sum::<f64>();
    let cheapest = options
        .into_iter()
        .min_by(|a, b| total(a).total_cmp(&total(b)))?;
    let confidence = cheapest.iter().map(|c| c.confidence).fold(1.0, f64::min);
    Some(MatchResult::from_candidates(cheapest, confidence, MatcherKind::ProductName))
}

fn unit_request(clean: &str, comment: &str, ctx: &MatchContext<'_>) -> Option<MatchResult> {
    let caps = RE_UNIT.captures(clean)?;
    let quantity = parse_quantity(&caps[1])?;
    let unit = &caps[2];

    if let Some(product) = ctx.catalog.products().find(|p| has_count(&p.title, quantity, unit)) {
        return Some(single(product, 1, 0.9, comment, ctx));
    }
    if let Some(prefix) = korean_prefix(quantity) {
        let spelled = format!("{}{}", prefix, unit);
        if let Some(product) = ctx.catalog.products().find(|p| p.title.contains(&spelled)) {
            return Some(single(product, 1, 0.9, comment, ctx));
        }
    }
    let product = ctx.catalog.products().find(|p| {
        RE_NUMBER_UNIT
            .captures_iter(&p.title)
            .any(|c| units_compatible(unit, &c[2]))
    })?;
    Some(single(product, quantity, 0.7, comment, ctx))
}

fn piece_request(clean: &str, comment: &str, ctx: &MatchContext<'_>) -> Option<MatchResult> {
    let caps = RE_PIECES.captures(clean)?;
    let pieces = parse_quantity(&caps[1])?;

    if let Some(product) = ctx.catalog.products().find(|p| has_count(&p.title, pieces, "알")) {
        return Some(single(product, 1, 0.95, comment, ctx));
    }
    let (product, rule) = ctx
        .catalog
        .products()
        .find_map(|p| composite_rule(&p.title).map(|rule| (p, rule)))?;
    let sets = rule.sets_for(pieces);
    log::debug!(
        "{}{} → {} {} of '{}'",
        pieces,
        rule.piece_unit,
        sets,
        rule.set_unit,
        product.title
    );
    Some(single(product, sets, 0.9, comment, ctx))
}

// ============================================================================
// Name search
// ============================================================================

/// Extracts the product-name phrase of an order comment.
///
/// Politeness endings, ordinals, number+unit expressions, stray digits and
/// branch words ("상무점") are removed.
///
/// ```
/// use ordermatch::matchers::product_name::extract_name;
///
/// assert_eq!(extract_name("고등어 2마리 주세요"), "고등어");
/// assert_eq!(extract_name("상무점 한우국거리 1"), "한우국거리");
/// ```
pub fn extract_name(text: &str) -> String {
    let clean = strip_order_endings(text);
    let clean = RE_ORDINAL.replace_all(&clean, " ");
    let clean = RE_NUMBER_UNIT.replace_all(&clean, " ");
    let clean = RE_DIGITS.replace_all(&clean, " ");
    let clean = RE_PUNCT.replace_all(&clean, " ");
    clean
        .split_whitespace()
        .filter(|w| !(w.chars().count() >= 2 && w.ends_with('점')))
        .collect::<Vec<_>>()
        .join(" ")
}

/// The name plus its usage-keyword spelling ("찌개" → "찌개용").
fn name_variants(name: &str) -> Vec<String> {
    let mut variants = vec![name.to_string()];
    let usage = format!("{}용", name);
    if USAGE_KEYWORDS.contains(&usage.as_str()) {
        variants.push(usage);
    }
    variants
}

fn name_quantity(name: &str, clean: &str, ctx: &MatchContext<'_>) -> u32 {
    let max = ctx.options.max_item_quantity;
    let after_name = name
        .split_whitespace()
        .last()
        .and_then(|last| Regex::new(&format!(r"{}\s*(\d+)", regex::escape(last))).ok())
        .and_then(|re| re.captures(clean).and_then(|c| parse_quantity(&c[1])))
        .filter(|&q| q <= max);

    after_name
        .or_else(|| {
            RE_NUMBER_UNIT
                .captures(clean)
                .and_then(|c| parse_quantity(&c[1]))
                .filter(|&q| q <= max)
        })
        .or_else(|| {
            RE_KOREAN_UNIT
                .captures_iter(clean)
                .find(|c| c.get(2).is_some() || matches!(&c[1], "하나" | "둘" | "셋" | "넷"))
                .and_then(|c| korean_number(&c[1]))
        })
        .unwrap_or(1)
}

fn name_search(clean: &str, comment: &str, ctx: &MatchContext<'_>) -> Attempt {
    let name = extract_name(clean);
    if name.is_empty() {
        return Err(Miss::NoMatch);
    }

    let mut best: Option<(&Product, f64, String)> = None;
    for variant in name_variants(&name) {
        for product in ctx.catalog.products() {
            let similarity = title_similarity(&variant, &searchable_title(product));
            if best.as_ref().map_or(true, |(_, s, _)| similarity > *s) {
                best = Some((product, similarity, variant.clone()));
            }
        }
    }

    let (product, similarity, matched_name) = best.ok_or(Miss::NoMatch)?;
    if similarity < ctx.options.name_similarity_threshold {
        log::debug!("'{}' is not a catalog name ({:.2})", name, similarity);
        return Err(Miss::NoMatch);
    }

    let mut confidence = similarity;
    if searchable_title(product).contains(&matched_name) {
        confidence = (confidence + 0.1).min(1.0);
    }
    if name.chars().count() < 2 {
        confidence = (confidence - 0.2).max(0.3);
    }

    let quantity = name_quantity(&name, clean, ctx);
    Ok(single(product, quantity, confidence, comment, ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::model::Catalog;
    use crate::options::MatchOptions;
    use crate::pricing::PriceCalculator;

    fn run(text: &str, catalog: &Catalog) -> Attempt {
        let pattern = classify(catalog);
        let options = MatchOptions::default();
        let pricing = PriceCalculator::new(&options);
        let ctx = MatchContext::new(catalog, &pattern, &options, &pricing);
        attempt(text, &ctx)
    }

    fn picked(result: &MatchResult) -> Vec<(u32, u32)> {
        result
            .candidates
            .iter()
            .map(|c| (c.product_id, c.quantity))
            .collect()
    }

    fn butcher() -> Catalog {
        Catalog::new(vec![
            Product::new(1, "한우 국거리 500g").with_base_price(18000.0),
            Product::new(2, "돼지 찌개용 1kg").with_base_price(12000.0),
            Product::new(3, "고등어 2마리").with_base_price(9000.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_weight_arithmetic() {
        let catalog =
            Catalog::new(vec![Product::new(1, "고구마 3kg").with_base_price(15000.0)]).unwrap();
        let result = run("6키로", &catalog).unwrap();
        assert_eq!(picked(&result), vec![(1, 2)]);
        assert_eq!(result.candidates[0].total_price, 30000.0);
        assert_eq!(result.confidence, 0.95);
    }

    #[test]
    fn test_weight_arithmetic_with_name() {
        let catalog =
            Catalog::new(vec![Product::new(1, "고구마 2kg").with_base_price(12000.0)]).unwrap();
        assert_eq!(picked(&run("고구마 4키로 주세요", &catalog).unwrap()), vec![(1, 2)]);
    }

    #[test]
    fn test_kilos_on_multi_product_catalog() {
        let catalog = Catalog::new(vec![
            Product::new(1, "한우 불고기 1kg").with_base_price(39000.0),
            Product::new(2, "돼지 목살 500g").with_base_price(9000.0),
        ])
        .unwrap();
        let result = run("3키로", &catalog).unwrap();
        assert_eq!(picked(&result), vec![(1, 3)]);
        assert_eq!(result.confidence, 0.95);
        assert_eq!(result.candidates[0].total_price, 117000.0);
    }

    #[test]
    fn test_half_request() {
        let catalog = Catalog::new(vec![
            Product::new(1, "수박 반통").with_base_price(12000.0),
            Product::new(2, "수박 1통").with_base_price(22000.0),
        ])
        .unwrap();
        assert_eq!(picked(&run("반통 주세요", &catalog).unwrap()), vec![(1, 1)]);
    }

    // Approximation point: tuned bias constant, not guaranteed semantics.
    #[test]
    fn test_box_bias() {
        let catalog = Catalog::new(vec![
            Product::new(1, "복숭아 반박스").with_base_price(12900.0),
            Product::new(2, "복숭아 1박스").with_base_price(23900.0),
        ])
        .unwrap();
        let result = run("2박스", &catalog).unwrap();
        assert_eq!(picked(&result), vec![(2, 2)]);
        assert_eq!(result.candidates[0].total_price, 47800.0);
        assert_eq!(picked(&run("1박스", &catalog).unwrap()), vec![(2, 1)]);
    }

    #[test]
    fn test_pure_quantity_prefers_cheapest() {
        let catalog = Catalog::new(vec![
            Product::new(1, "계란 10개").with_base_price(4000.0),
            Product::new(2, "계란 30개").with_base_price(10000.0),
        ])
        .unwrap();
        assert_eq!(picked(&run("30", &catalog).unwrap()), vec![(2, 1)]);

        let result = run("40개", &catalog).unwrap();
        assert_eq!(picked(&result), vec![(1, 1), (2, 1)]);
        assert_eq!(result.confidence, 0.9);
    }

    #[test]
    fn test_unit_request() {
        let catalog = Catalog::new(vec![
            Product::new(1, "대파 1단").with_base_price(3000.0),
            Product::new(2, "쪽파 두봉").with_base_price(5000.0),
        ])
        .unwrap();
        assert_eq!(picked(&run("2봉", &catalog).unwrap()), vec![(2, 1)]);
    }

    #[test]
    fn test_composite_pieces() {
        let catalog =
            Catalog::new(vec![Product::new(1, "아보카도 5알(1세트)").with_base_price(9000.0)])
                .unwrap();
        let result = run("10알", &catalog).unwrap();
        assert_eq!(picked(&result), vec![(1, 2)]);
    }

    #[test]
    fn test_name_with_quantity() {
        let result = run("고등어 3", &butcher()).unwrap();
        assert_eq!(picked(&result), vec![(3, 3)]);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_usage_keyword_name() {
        let result = run("찌개 2개", &butcher()).unwrap();
        assert_eq!(picked(&result), vec![(2, 2)]);
    }

    #[test]
    fn test_keyword_name() {
        let catalog = Catalog::new(vec![
            Product::new(1, "국내산 한돈 앞다리살 1kg")
                .with_base_price(11000.0)
                .with_keywords(["제육"]),
            Product::new(2, "고등어 2마리").with_base_price(9000.0),
        ])
        .unwrap();
        assert_eq!(picked(&run("제육 2", &catalog).unwrap()), vec![(1, 2)]);
    }

    #[test]
    fn test_extract_name_drops_noise() {
        assert_eq!(extract_name("2번 사과 3개요"), "사과");
        assert_eq!(extract_name("봉선점 배추김치 4키로"), "배추김치");
    }

    #[test]
    fn test_unknown_name() {
        assert_eq!(run("감사합니다", &butcher()), Err(Miss::NoMatch));
    }
}
