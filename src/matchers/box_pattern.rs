//! Box, half-box, set and counted-unit requests.
//!
//! Half boxes and full boxes are separate buckets: a half-box request never
//! lands on a full-box product and vice versa. Requests for several boxes on a
//! catalog that sells both go to the full box.
//!
//! Rules, first hit wins:
//!
//! 1. half request ("반박스") → half product, 0.95
//! 2. "N번" → N-th box product, 0.95
//! 3. grade "N수" → product titled "(N수)", 0.91
//! 4. "N세트" → set product, 0.9
//! 5. explicit boxes ("2박스", "박스 2") → full box, 0.92
//! 6. counted unit ("2송이") → product sold in that unit, 0.95
//! 7. bare number 1..=10 → full box, 0.8

use super::{has_count, Attempt, MatchContext, Miss};
use crate::classifier::base_name;
use crate::model::{MatchResult, MatcherKind, Product};
use crate::normalize::{korean_number, last_line, parse_quantity, strip_order_endings};
use crate::units::{
    alternation, has_box_keyword, is_full_box, is_half_box, COUNT_UNITS, SET_KEYWORDS,
};
use regex::Regex;
use std::sync::LazyLock;

static RE_SPECIALS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s가-힣]|[ㄱ-ㅎㅏ-ㅣ]").unwrap());

static RE_HALF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:반|하프)\s*(?:박스|상자|통|개)(?:\s*(\d+)\s*(?:개|박스|상자)?)?").unwrap()
});

static RE_BOX_ORDINAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*번\s*(.*)$").unwrap());

static RE_AFTER_ORDINAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*(?:수|박스|상자|박|개)?").unwrap());

static RE_GRADE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*수\s*(\d*)\s*(?:박스|상자)?$").unwrap());

static RE_SET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*(?:세트|셋|set)").unwrap());

static RE_EXPLICIT_BOX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*(?:박스|상자|박)|(?:박스|상자)\s*(\d+)").unwrap());

static RE_KOREAN_BOX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(한|두|세|네|다섯)\s*(?:박스|상자)").unwrap());

static RE_COUNTED_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(\d+)\s*({})(?:이?요?)?$", alternation(COUNT_UNITS))).unwrap()
});

static RE_BARE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)$").unwrap());

fn has_set_keyword(title: &str) -> bool {
    let lower = title.to_lowercase();
    SET_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn has_count_unit(title: &str) -> bool {
    COUNT_UNITS.iter().any(|u| title.contains(u))
}

/// The order part of a comment: last line, endings and decoration removed.
fn order_text(text: &str) -> String {
    let line = strip_order_endings(last_line(text));
    RE_SPECIALS
        .replace_all(&line, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn attempt(text: &str, ctx: &MatchContext<'_>) -> Attempt {
    let applicable = ctx
        .catalog
        .products()
        .any(|p| has_box_keyword(&p.title) || has_set_keyword(&p.title) || has_count_unit(&p.title));
    if !applicable {
        return Err(Miss::NotApplicable);
    }

    let order = order_text(text);
    if order.is_empty() {
        return Err(Miss::NoMatch);
    }

    half_request(&order, text, ctx)
        .or_else(|| box_ordinal(&order, text, ctx))
        .or_else(|| grade_request(&order, text, ctx))
        .or_else(|| set_request(&order, text, ctx))
        .or_else(|| explicit_boxes(&order, text, ctx))
        .or_else(|| counted_unit(&order, text, ctx))
        .or_else(|| bare_number(&order, text, ctx))
        .ok_or(Miss::NoMatch)
}

fn accept(
    product: &Product,
    quantity: u32,
    confidence: f64,
    comment: &str,
    ctx: &MatchContext<'_>,
) -> MatchResult {
    MatchResult::single(ctx.candidate(product, quantity, confidence, MatcherKind::BoxPattern, comment))
}

fn half_request(order: &str, comment: &str, ctx: &MatchContext<'_>) -> Option<MatchResult> {
    let caps = RE_HALF.captures(order)?;
    let product = ctx.catalog.products().find(|p| is_half_box(&p.title) || p.title.contains("반통"))?;
    let quantity = caps
        .get(1)
        .and_then(|m| parse_quantity(m.as_str()))
        .unwrap_or(1);
    log::debug!("half request {:?} → '{}'", order, product.title);
    Some(accept(product, quantity, 0.95, comment, ctx))
}

fn box_ordinal(order: &str, comment: &str, ctx: &MatchContext<'_>) -> Option<MatchResult> {
    let caps = RE_BOX_ORDINAL.captures(order)?;
    let index = parse_quantity(&caps[1])? as usize;
    let boxes: Vec<&Product> = ctx
        .catalog
        .products()
        .filter(|p| has_box_keyword(&p.title))
        .collect();
    let product = boxes.get(index.checked_sub(1)?)?;
    let quantity = RE_AFTER_ORDINAL
        .captures(caps[2].trim())
        .and_then(|c| parse_quantity(&c[1]))
        .filter(|&q| q <= ctx.options.max_item_quantity)
        .unwrap_or(1);
    Some(accept(product, quantity, 0.95, comment, ctx))
}

fn grade_request(order: &str, comment: &str, ctx: &MatchContext<'_>) -> Option<MatchResult> {
    let caps = RE_GRADE.captures(order)?;
    let grade = format!("{}수", &caps[1]);
    let product = ctx
        .catalog
        .products()
        .find(|p| p.title.replace(' ', "").contains(&grade))?;
    let quantity = parse_quantity(&caps[2]).unwrap_or(1);
    Some(accept(product, quantity, 0.91, comment, ctx))
}

fn set_request(order: &str, comment: &str, ctx: &MatchContext<'_>) -> Option<MatchResult> {
    let caps = RE_SET.captures(order)?;
    let quantity = parse_quantity(&caps[1])?;
    if let Some(product) = ctx
        .catalog
        .products()
        .find(|p| has_count(&p.title, quantity, "세트"))
    {
        return Some(accept(product, 1, 0.9, comment, ctx));
    }
    let product = ctx.catalog.products().find(|p| has_set_keyword(&p.title))?;
    Some(accept(product, quantity, 0.9, comment, ctx))
}

fn explicit_boxes(order: &str, comment: &str, ctx: &MatchContext<'_>) -> Option<MatchResult> {
    let quantity = match RE_EXPLICIT_BOX.captures(order) {
        Some(caps) => caps
            .get(1)
            .or_else(|| caps.get(2))
            .and_then(|m| parse_quantity(m.as_str()))?,
        None => {
            let caps = RE_KOREAN_BOX.captures(order)?;
            korean_number(&caps[1])?
        }
    };

    if quantity > 1 {
        if let Some(product) = ctx
            .catalog
            .products()
            .find(|p| has_count(&p.title, quantity, "박스") && !is_half_box(&p.title))
        {
            return Some(accept(product, 1, 0.92, comment, ctx));
        }
    }

    let product = pick_full_box(order, ctx)?;
    Some(accept(product, quantity, 0.92, comment, ctx))
}

fn counted_unit(order: &str, comment: &str, ctx: &MatchContext<'_>) -> Option<MatchResult> {
    let caps = RE_COUNTED_UNIT.captures(order)?;
    let quantity = parse_quantity(&caps[1])?;
    let unit = &caps[2];

    if let Some(product) = ctx.catalog.products().find(|p| has_count(&p.title, quantity, unit)) {
        return Some(accept(product, 1, 0.95, comment, ctx));
    }
    let product = ctx.catalog.products().find(|p| p.title.contains(unit))?;
    Some(accept(product, quantity, 0.95, comment, ctx))
}

fn bare_number(order: &str, comment: &str, ctx: &MatchContext<'_>) -> Option<MatchResult> {
    let caps = RE_BARE.captures(order)?;
    let quantity = parse_quantity(&caps[1]).filter(|&q| q <= ctx.options.max_bare_box_quantity)?;
    let product = pick_full_box(order, ctx)?;
    Some(accept(product, quantity, 0.8, comment, ctx))
}

/// Picks the full-box product a box request refers to.
///
/// With several full boxes the one whose name appears in the comment wins;
/// when none is named, full boxes of one product line resolve to the first and
/// unrelated ones stay ambiguous.
fn pick_full_box<'c>(order: &str, ctx: &MatchContext<'c>) -> Option<&'c Product> {
    let full: Vec<&'c Product> = ctx
        .catalog
        .products()
        .filter(|p| is_full_box(&p.title))
        .collect();

    match full.as_slice() {
        [] => None,
        [only] => Some(*only),
        several => {
            let named = several.iter().find(|p| {
                let name = base_name(&p.title);
                !name.is_empty() && name.split_whitespace().any(|w| order.contains(w))
            });
            if let Some(product) = named {
                return Some(*product);
            }
            let first = base_name(&several[0].title);
            several
                .iter()
                .all(|p| base_name(&p.title) == first)
                .then_some(several[0])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::model::Catalog;
    use crate::options::MatchOptions;
    use crate::pricing::PriceCalculator;

    fn peaches() -> Catalog {
        Catalog::new(vec![
            Product::new(1, "복숭아 반박스").with_base_price(12900.0),
            Product::new(2, "복숭아 1박스").with_base_price(23900.0),
        ])
        .unwrap()
    }

    fn run(text: &str, catalog: &Catalog) -> Attempt {
        let pattern = classify(catalog);
        let options = MatchOptions::default();
        let pricing = PriceCalculator::new(&options);
        let ctx = MatchContext::new(catalog, &pattern, &options, &pricing);
        attempt(text, &ctx)
    }

    fn picked(result: &MatchResult) -> (u32, u32) {
        (result.candidates[0].product_id, result.candidates[0].quantity)
    }

    #[test]
    fn test_half_box() {
        let result = run("반박스 주세요", &peaches()).unwrap();
        assert_eq!(picked(&result), (1, 1));
        assert_eq!(result.confidence, 0.95);
    }

    // Approximation point: full-box bias follows `box_full_bias_min`.
    #[test]
    fn test_several_boxes_go_to_full_box() {
        let result = run("2박스", &peaches()).unwrap();
        assert_eq!(picked(&result), (2, 2));
        assert_eq!(result.candidates[0].total_price, 47800.0);
        assert_eq!(result.confidence, 0.92);
    }

    #[test]
    fn test_one_box_is_not_half_box() {
        let result = run("1박스요", &peaches()).unwrap();
        assert_eq!(picked(&result), (2, 1));
    }

    #[test]
    fn test_multi_box_title() {
        let catalog = Catalog::new(vec![
            Product::new(1, "사과 1박스").with_base_price(20000.0),
            Product::new(2, "사과 2박스").with_base_price(38000.0),
        ])
        .unwrap();
        let result = run("2박스", &catalog).unwrap();
        assert_eq!(picked(&result), (2, 1));
    }

    #[test]
    fn test_box_ordinal() {
        let result = run("2번 3박스", &peaches()).unwrap();
        assert_eq!(picked(&result), (2, 3));
    }

    #[test]
    fn test_grade_request() {
        let catalog = Catalog::new(vec![
            Product::new(1, "사과 (11수) 1박스").with_base_price(30000.0),
            Product::new(2, "사과 (13수) 1박스").with_base_price(27000.0),
        ])
        .unwrap();
        let result = run("13수 2박스", &catalog).unwrap();
        assert_eq!(picked(&result), (2, 2));
        assert_eq!(result.confidence, 0.91);
    }

    #[test]
    fn test_counted_unit() {
        let catalog = Catalog::new(vec![
            Product::new(1, "청포도 1송이").with_base_price(8000.0),
            Product::new(2, "청포도 2송이").with_base_price(15000.0),
        ])
        .unwrap();
        assert_eq!(picked(&run("2송이", &catalog).unwrap()), (2, 1));
        assert_eq!(picked(&run("3송이 주세요", &catalog).unwrap()), (1, 3));
    }

    #[test]
    fn test_bare_number_is_box_count() {
        let result = run("3", &peaches()).unwrap();
        assert_eq!(picked(&result), (2, 3));
        assert_eq!(result.confidence, 0.8);
        assert_eq!(run("30", &peaches()), Err(Miss::NoMatch));
    }

    #[test]
    fn test_unnamed_box_among_unrelated_products_is_ambiguous() {
        let catalog = Catalog::new(vec![
            Product::new(1, "사과 1박스").with_base_price(20000.0),
            Product::new(2, "배 1박스").with_base_price(30000.0),
        ])
        .unwrap();
        assert_eq!(run("1박스", &catalog), Err(Miss::NoMatch));
        assert_eq!(picked(&run("배 1박스", &catalog).unwrap()), (2, 1));
    }

    #[test]
    fn test_not_applicable_without_box_titles() {
        let catalog = Catalog::new(vec![Product::new(1, "두부").with_base_price(2000.0)]).unwrap();
        assert_eq!(run("2박스", &catalog), Err(Miss::NotApplicable));
    }
}
