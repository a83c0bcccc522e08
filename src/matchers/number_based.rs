//! Ordinal references ("2번", "1번 3개", "2번 하나", "1번 2개 3번 1개").

use super::{Attempt, MatchContext, Miss};
use crate::model::{MatchResult, MatcherKind};
use crate::normalize::{korean_number, parse_quantity, quantity_tokens};
use regex::Regex;
use std::sync::LazyLock;

static RE_ORDINAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*번").unwrap());

static RE_EXPLICIT_QUANTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*(개|봉지|봉|박스|세트|팩|통|병|묶음)?").unwrap());

static RE_KOREAN_QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(하나|한|두|둘|세|셋|네|넷|다섯)\s*(개|봉지|봉|박스|세트|팩|통|병|묶음)?")
        .unwrap()
});

/// One "N번" reference with the text that follows it.
struct Reference<'t> {
    id: u32,
    tail: &'t str,
}

fn references<'t>(text: &'t str, ctx: &MatchContext<'_>) -> Vec<Reference<'t>> {
    let matches: Vec<_> = RE_ORDINAL.captures_iter(text).collect();
    let mut refs = Vec::new();

    for (i, caps) in matches.iter().enumerate() {
        let (Some(whole), Some(id)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Some(id) = parse_quantity(id.as_str()).filter(|&id| ctx.catalog.contains(id)) else {
            continue;
        };
        let end = matches
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(text.len(), |m| m.start());
        refs.push(Reference {
            id,
            tail: &text[whole.end()..end],
        });
    }

    refs
}

fn explicit_quantity(tail: &str) -> Option<u32> {
    let caps = RE_EXPLICIT_QUANTITY.captures(tail)?;
    parse_quantity(&caps[1])
}

fn korean_quantity(tail: &str) -> Option<u32> {
    let caps = RE_KOREAN_QUANTITY.captures(tail)?;
    if tail[caps.get(0)?.end()..].starts_with('트') {
        return None;
    }
    korean_number(&caps[1])
}

pub fn attempt(text: &str, ctx: &MatchContext<'_>) -> Attempt {
    if !RE_ORDINAL.is_match(text) {
        return Err(Miss::NotApplicable);
    }

    let refs = references(text, ctx);
    if refs.is_empty() {
        log::debug!("ordinals in {:?} name no catalog product", text);
        return Err(Miss::NoMatch);
    }

    let max = ctx.options.max_item_quantity;

    if refs.len() > 1 {
        let candidates: Vec<_> = refs
            .iter()
            .filter_map(|r| {
                let product = ctx.catalog.get(r.id)?;
                let quantity = explicit_quantity(r.tail)
                    .or_else(|| korean_quantity(r.tail))
                    .filter(|&q| q <= max)
                    .unwrap_or(1);
                Some(ctx.candidate(product, quantity, 0.8, MatcherKind::NumberBased, text))
            })
            .collect();
        let confidence =
            candidates.iter().map(|c| c.confidence).sum::<f64>() / candidates.len() as f64;
        return Ok(MatchResult::from_candidates(
            candidates,
            confidence,
            MatcherKind::NumberBased,
        ));
    }

    let reference = &refs[0];
    let product = ctx.catalog.get(reference.id).ok_or(Miss::NoMatch)?;

    let (quantity, confidence) = if let Some(q) = explicit_quantity(reference.tail) {
        (q, 0.95)
    } else if let Some(q) = korean_quantity(reference.tail) {
        (q, 0.9)
    } else {
        let without_ordinal = RE_ORDINAL.replace_all(text, " ");
        let context = quantity_tokens(&without_ordinal).into_iter().next();
        (context.unwrap_or(1), 0.85)
    };

    if quantity > max {
        return Err(Miss::NoMatch);
    }

    let candidate = ctx.candidate(product, quantity, confidence, MatcherKind::NumberBased, text);
    Ok(MatchResult::single(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::model::{Catalog, Product};
    use crate::options::MatchOptions;
    use crate::pricing::PriceCalculator;

    fn catalog() -> Catalog {
        Catalog::new(vec![
            Product::new(1, "사과 1봉").with_base_price(5000.0),
            Product::new(2, "배 1봉").with_base_price(7000.0),
            Product::new(3, "단감 1봉").with_base_price(6000.0),
        ])
        .unwrap()
    }

    fn run(text: &str) -> Attempt {
        let catalog = catalog();
        let pattern = classify(&catalog);
        let options = MatchOptions::default();
        let pricing = PriceCalculator::new(&options);
        let ctx = MatchContext::new(&catalog, &pattern, &options, &pricing);
        attempt(text, &ctx)
    }

    #[test]
    fn test_ordinal_with_quantity() {
        let result = run("2번 3개").unwrap();
        assert_eq!(result.candidates[0].product_id, 2);
        assert_eq!(result.candidates[0].quantity, 3);
        assert_eq!(result.candidates[0].total_price, 21000.0);
        assert_eq!(result.confidence, 0.95);
    }

    #[test]
    fn test_ordinal_with_korean_quantity() {
        let result = run("1번 두개요").unwrap();
        assert_eq!(result.candidates[0].quantity, 2);
        assert_eq!(result.confidence, 0.9);
    }

    #[test]
    fn test_ordinal_alone() {
        let result = run("3번이요").unwrap();
        assert_eq!(result.candidates[0].product_id, 3);
        assert_eq!(result.candidates[0].quantity, 1);
        assert_eq!(result.confidence, 0.85);
    }

    #[test]
    fn test_several_ordinals() {
        let result = run("1번 2개 3번 1개").unwrap();
        let picked: Vec<(u32, u32)> = result
            .candidates
            .iter()
            .map(|c| (c.product_id, c.quantity))
            .collect();
        assert_eq!(picked, vec![(1, 2), (3, 1)]);
        assert!((result.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_ordinal() {
        assert_eq!(run("9번"), Err(Miss::NoMatch));
        assert_eq!(run("사과 2개"), Err(Miss::NotApplicable));
    }
}
