//! Bare quantities ("3", "2개", "세개요").
//!
//! Only meaningful when every number in a comment is a quantity of the same
//! product: single-product catalogs and quantity-variant catalogs.

use super::{has_count, Attempt, MatchContext, Miss};
use crate::classifier::is_quantity_catalog;
use crate::model::{MatchResult, MatcherKind};
use crate::normalize::{korean_number, parse_quantity, quantity_tokens, strip_order_endings};
use crate::units::{compatible_units, requested_kilos, units_for_kilos};
use regex::Regex;
use std::sync::LazyLock;

static RE_KOREAN_QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(하나|한|두|둘|세|셋|네|넷|다섯|여섯|일곱|여덟|아홉|열)\s*(세트|개|봉|박스|포)?$")
        .unwrap()
});

static RE_BARE_QUANTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*(세트|개|봉|박스|포)?$").unwrap());

pub fn attempt(text: &str, ctx: &MatchContext<'_>) -> Attempt {
    let single = ctx.catalog.len() == 1;
    if !single && !is_quantity_catalog(ctx.catalog, ctx.pattern) {
        return Err(Miss::NotApplicable);
    }

    let clean = strip_order_endings(text);

    if let Some(product) = ctx.catalog.single() {
        if let Some(units) = requested_kilos(&clean).and_then(|k| units_for_kilos(k, &product.title)) {
            log::debug!("weight request {:?} covered by {} x '{}'", clean, units, product.title);
            return resolve(units, 0.95, text, ctx);
        }
    }

    if let Some(caps) = RE_KOREAN_QUANTITY.captures(&clean) {
        if let Some(quantity) = korean_number(&caps[1]) {
            return resolve(quantity, 0.95, text, ctx);
        }
    }

    if let Some(caps) = RE_BARE_QUANTITY.captures(&clean) {
        let quantity = parse_quantity(&caps[1])
            .filter(|&q| q <= ctx.options.max_simple_quantity)
            .ok_or(Miss::NoMatch)?;
        return resolve(quantity, 0.95, text, ctx);
    }

    let quantity = quantity_tokens(&clean)
        .into_iter()
        .find(|&q| q <= ctx.options.max_simple_quantity)
        .ok_or(Miss::NoMatch)?;
    resolve(quantity, 0.9, text, ctx)
}

/// Returns true if `title` sells exactly `quantity` of `unit` or one of its synonyms.
fn sells_count(title: &str, quantity: u32, unit: &str) -> bool {
    if unit.is_empty() || unit == "mixed" {
        return false;
    }
    let title = title.to_lowercase();
    std::iter::once(unit)
        .chain(compatible_units(unit).iter().copied())
        .any(|u| has_count(&title, quantity, u))
}

fn resolve(quantity: u32, confidence: f64, comment: &str, ctx: &MatchContext<'_>) -> Attempt {
    if let Some(product) = ctx.catalog.single() {
        let candidate = ctx.candidate(product, quantity, confidence, MatcherKind::SimpleNumber, comment);
        return Ok(MatchResult::single(candidate));
    }

    let catalog_unit = ctx.pattern.unit.as_str();
    if let Some(product) = ctx.catalog.products().find(|p| {
        let unit = p.unit.as_deref().unwrap_or(catalog_unit);
        sells_count(&p.title, quantity, unit)
    }) {
        log::debug!("title '{}' sells exactly {}", product.title, quantity);
        let candidate = ctx.candidate(product, 1, 0.98, MatcherKind::SimpleNumber, comment);
        return Ok(MatchResult::single(candidate));
    }

    let option = ctx
        .pricing
        .best_option(quantity, ctx.catalog, Some(comment))
        .ok_or(Miss::NoMatch)?;
    let product = ctx.catalog.get(option.product_id).ok_or(Miss::NoMatch)?;
    let candidate = ctx
        .candidate(product, option.quantity, confidence, MatcherKind::SimpleNumber, comment)
        .with_total(option.total_price)
        .with_note(format!("{:?} pricing", option.reason));
    Ok(MatchResult::single(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::model::{Catalog, PatternType, Product};
    use crate::options::MatchOptions;
    use crate::pricing::PriceCalculator;

    fn run(text: &str, catalog: &Catalog) -> Attempt {
        let pattern = classify(catalog);
        let options = MatchOptions::default();
        let pricing = PriceCalculator::new(&options);
        let ctx = MatchContext::new(catalog, &pattern, &options, &pricing);
        attempt(text, &ctx)
    }

    fn potatoes() -> Catalog {
        Catalog::new(vec![
            Product::new(1, "햇감자 1봉").with_base_price(3000.0),
            Product::new(2, "햇감자 3봉").with_base_price(8000.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_single_product_quantity() {
        let catalog =
            Catalog::new(vec![Product::new(1, "대추방울토마토 2kg").with_base_price(15000.0)]).unwrap();
        let result = run("3", &catalog).unwrap();
        assert_eq!(result.candidates[0].quantity, 3);
        assert_eq!(result.candidates[0].total_price, 45000.0);
        assert_eq!(result.confidence, 0.95);
    }

    #[test]
    fn test_korean_quantity_word() {
        let catalog = Catalog::new(vec![Product::new(1, "두부").with_base_price(2000.0)]).unwrap();
        let result = run("둘", &catalog).unwrap();
        assert_eq!(result.candidates[0].quantity, 2);
    }

    #[test]
    fn test_embedded_number() {
        let catalog = Catalog::new(vec![Product::new(1, "두부").with_base_price(2000.0)]).unwrap();
        let result = run("저도 2개 주문이요", &catalog).unwrap();
        assert_eq!(result.candidates[0].quantity, 2);
        assert_eq!(result.confidence, 0.9);
    }

    #[test]
    fn test_quantity_variant_title_hit() {
        let result = run("3", &potatoes()).unwrap();
        assert_eq!(result.candidates[0].product_id, 2);
        assert_eq!(result.candidates[0].quantity, 1);
        assert_eq!(result.confidence, 0.98);
    }

    #[test]
    fn test_quantity_variant_uses_optimizer() {
        let result = run("2", &potatoes()).unwrap();
        let candidate = &result.candidates[0];
        assert_eq!(candidate.product_id, 1);
        assert_eq!(candidate.quantity, 2);
        assert_eq!(candidate.total_price, 6000.0);
    }

    #[test]
    fn test_single_product_weight_request() {
        let catalog =
            Catalog::new(vec![Product::new(1, "고구마 2kg").with_base_price(12000.0)]).unwrap();
        for comment in ["4키로", "4kg", "고구마 4키로"] {
            let result = run(comment, &catalog).unwrap();
            assert_eq!(result.candidates[0].quantity, 2, "comment {}", comment);
            assert_eq!(result.confidence, 0.95);
        }
        // 3kg does not split into 2kg products; the number stays a quantity
        assert_eq!(run("3키로", &catalog).unwrap().candidates[0].quantity, 3);
    }

    #[test]
    fn test_declared_unit_finds_title_count() {
        let catalog = Catalog::new(vec![
            Product::new(1, "햇감자 1봉")
                .with_base_price(3000.0)
                .with_unit("봉")
                .with_variant(PatternType::QuantityVariant),
            Product::new(2, "햇감자 3팩")
                .with_base_price(8000.0)
                .with_unit("팩")
                .with_variant(PatternType::QuantityVariant),
        ])
        .unwrap();
        let result = run("3", &catalog).unwrap();
        assert_eq!(result.candidates[0].product_id, 2);
        assert_eq!(result.candidates[0].quantity, 1);
        assert_eq!(result.confidence, 0.98);
    }

    #[test]
    fn test_synonym_unit_finds_title_count() {
        assert!(sells_count("햇감자 3봉지", 3, "봉"));
        assert!(sells_count("사과 2상자", 2, "박스"));
        assert!(!sells_count("사과 2상자", 2, "mixed"));
    }

    #[test]
    fn test_not_applicable_on_mixed_catalog() {
        let catalog = Catalog::new(vec![
            Product::new(1, "사과").with_base_price(5000.0),
            Product::new(2, "배").with_base_price(7000.0),
        ])
        .unwrap();
        assert_eq!(run("2", &catalog), Err(Miss::NotApplicable));
    }

    #[test]
    fn test_phone_like_number_is_refused() {
        let catalog = Catalog::new(vec![Product::new(1, "두부").with_base_price(2000.0)]).unwrap();
        assert_eq!(run("1234", &catalog), Err(Miss::NoMatch));
        assert_eq!(run("010", &catalog), Err(Miss::NoMatch));
    }
}
