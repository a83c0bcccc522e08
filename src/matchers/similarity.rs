//! Fuzzy title scoring, the last-resort matcher.
//!
//! Comment and titles are tokenized; every title is scored on several kinds of
//! token agreement and the best-ranked title wins. Confidence stays within
//! `0.3..=0.75` so a fuzzy hit never outranks a structural one.

use super::{searchable_title, Attempt, MatchContext, Miss};
use crate::classifier::base_name;
use crate::model::{MatchResult, MatcherKind, Product};
use crate::normalize::{
    korean_number, quantity_tokens, strip_order_endings, syllable_bigrams, tokenize,
};
use crate::units::TITLE_UNIT_WORDS;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::LazyLock;

static RE_PUNCT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s가-힣]+").unwrap());

static RE_OPTION_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d+|반|한|두|세)(?:박스|상자|통|팩|봉지|봉|세트|키로|kg)$").unwrap()
});

// ============================================================================
// Title similarity
// ============================================================================

fn simplify(text: &str) -> String {
    RE_PUNCT
        .replace_all(&text.to_lowercase(), " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity of two product names in `0.0..=1.0`.
///
/// Containment in either direction scores 1.0. Otherwise the better of a
/// word-overlap score and the normalized edit similarity of the base names.
///
/// ```
/// use ordermatch::matchers::similarity::title_similarity;
///
/// assert_eq!(title_similarity("사과", "꿀사과 1박스"), 1.0);
/// assert!(title_similarity("감자", "양파") < 0.5);
/// ```
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let a = simplify(a);
    let b = simplify(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a.contains(&b) || b.contains(&a) {
        return 1.0;
    }

    let words_a: Vec<&str> = a.split_whitespace().collect();
    let words_b: Vec<&str> = b.split_whitespace().collect();
    let matched = words_a
        .iter()
        .filter(|wa| {
            let wa: &str = wa;
            words_b
                .iter()
                .any(|wb| wa == *wb || wa.contains(*wb) || wb.contains(wa))
        })
        .count();

    let word_score = if matched == 0 {
        0.0
    } else {
        let max_words = words_a.len().max(words_b.len()) as f64;
        let match_ratio = matched as f64 / words_a.len() as f64;
        let (la, lb) = (a.chars().count() as f64, b.chars().count() as f64);
        let length_ratio = la.min(lb) / la.max(lb);
        (matched as f64 / max_words) * 0.5 + match_ratio * 0.3 + length_ratio * 0.2
    };

    let edit = strsim::normalized_levenshtein(&base_name(&a), &base_name(&b));
    word_score.max(edit)
}

// ============================================================================
// Token scoring
// ============================================================================

/// Name-bearing tokens: numbers and bare unit words dropped.
fn name_tokens(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .filter(|t| !TITLE_UNIT_WORDS.contains(&t.as_str()))
        .collect()
}

/// Compact option words of the comment ("1박스", "반통").
fn option_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .filter(|w| RE_OPTION_WORD.is_match(w))
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Default)]
struct Score<'c> {
    product: Option<&'c Product>,
    exact_name: bool,
    bigram: f64,
    match_ratio: f64,
    accuracy: f64,
    score: f64,
    matches: usize,
    compound: bool,
    coverage: f64,
    matched_len: usize,
    title_len: usize,
}

impl Score<'_> {
    /// Higher ranks first.
    fn rank(&self, other: &Self) -> Ordering {
        self.exact_name
            .cmp(&other.exact_name)
            .then_with(|| self.bigram.total_cmp(&other.bigram))
            .then_with(|| self.match_ratio.total_cmp(&other.match_ratio))
            .then_with(|| self.accuracy.total_cmp(&other.accuracy))
            .then_with(|| self.score.total_cmp(&other.score))
            .then_with(|| self.matches.cmp(&other.matches))
            .then_with(|| self.compound.cmp(&other.compound))
            .then_with(|| self.coverage.total_cmp(&other.coverage))
            .then_with(|| self.matched_len.cmp(&other.matched_len))
            .then_with(|| other.title_len.cmp(&self.title_len))
            .then_with(|| {
                let (a, b) = (self.product.map(|p| p.id), other.product.map(|p| p.id));
                b.cmp(&a)
            })
    }

    fn confidence(&self) -> f64 {
        (0.6 * self.accuracy + 0.4 * self.score).clamp(0.3, 0.75)
    }
}

fn score_product<'c>(
    product: &'c Product,
    comment: &[String],
    options: &[String],
    comment_name: &str,
) -> Score<'c> {
    let title = searchable_title(product);
    let title_tokens = name_tokens(&title);
    let compact_title = title.replace(' ', "");

    let mut matched: HashSet<usize> = HashSet::new();
    let mut title_hit: HashSet<usize> = HashSet::new();
    let mut matches = 0;
    let mut matched_len = 0;

    for (i, token) in comment.iter().enumerate() {
        let exact = title_tokens.iter().position(|t| t == token);
        let partial = exact.or_else(|| {
            title_tokens.iter().position(|t| {
                (token.chars().count() >= 2 && t.contains(token.as_str()))
                    || (t.chars().count() >= 2 && token.contains(t.as_str()))
            })
        });
        if let Some(j) = partial {
            matches += 1;
            matched_len += token.chars().count();
            matched.insert(i);
            title_hit.insert(j);
        }
    }

    let mut compound = false;
    for pair in comment.windows(2) {
        let joined = format!("{}{}", pair[0], pair[1]);
        if title_tokens.iter().any(|t| *t == joined) {
            compound = true;
            matches += 1;
        }
    }
    for pair in title_tokens.windows(2) {
        let joined = format!("{}{}", pair[0], pair[1]);
        if comment.iter().any(|t| *t == joined) {
            compound = true;
            matches += 1;
        }
    }

    matches += options.iter().filter(|o| compact_title.contains(o.as_str())).count();

    let comment_bigrams: Vec<String> = comment.iter().flat_map(|t| syllable_bigrams(t)).collect();
    let title_bigrams: HashSet<String> =
        title_tokens.iter().flat_map(|t| syllable_bigrams(t)).collect();
    let bigram = if comment_bigrams.is_empty() {
        0.0
    } else {
        comment_bigrams
            .iter()
            .filter(|b| title_bigrams.contains(*b))
            .count() as f64
            / comment_bigrams.len() as f64
    };
    if matches == 0 && bigram >= 0.5 {
        matches = 1;
    }

    let comment_coverage = matched.len() as f64 / comment.len().max(1) as f64;
    let title_coverage = title_hit.len() as f64 / title_tokens.len().max(1) as f64;
    let base = base_name(&product.title).replace(' ', "");

    Score {
        product: Some(product),
        exact_name: !comment_name.is_empty() && comment_name == base,
        bigram,
        match_ratio: comment_coverage,
        accuracy: 0.6 * comment_coverage + 0.4 * title_coverage,
        score: 0.6 * title_similarity(comment_name, &title) + 0.4 * title_coverage,
        matches,
        compound,
        coverage: title_coverage,
        matched_len,
        title_len: title.chars().count(),
    }
}

fn quantity(text: &str, ctx: &MatchContext<'_>) -> u32 {
    quantity_tokens(text)
        .into_iter()
        .find(|&q| q <= ctx.options.max_item_quantity)
        .or_else(|| tokenize(text).iter().find_map(|t| korean_number(t)))
        .unwrap_or(1)
}

pub fn attempt(text: &str, ctx: &MatchContext<'_>) -> Attempt {
    let clean = strip_order_endings(text);
    let comment = name_tokens(&clean);
    if comment.is_empty() {
        return Err(Miss::NoMatch);
    }
    let options = option_words(&clean);
    let comment_name: String = comment.concat();

    let best = ctx
        .catalog
        .products()
        .map(|p| score_product(p, &comment, &options, &comment_name))
        .filter(|s| s.matches > 0)
        .max_by(|a, b| a.rank(b))
        .ok_or(Miss::NoMatch)?;
    let product = best.product.ok_or(Miss::NoMatch)?;

    log::debug!(
        "similarity picked '{}' (bigram {:.2}, accuracy {:.2}, {} match(es))",
        product.title,
        best.bigram,
        best.accuracy,
        best.matches
    );

    let candidate = ctx.candidate(
        product,
        quantity(&clean, ctx),
        best.confidence(),
        MatcherKind::Similarity,
        text,
    );
    Ok(MatchResult::single(candidate))
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

    fn shop() -> Catalog {
        Catalog::new(vec![
            Product::new(1, "새송이버섯 1봉").with_base_price(2500.0),
            Product::new(2, "느타리버섯 1봉").with_base_price(2000.0),
            Product::new(3, "양파 3kg").with_base_price(6000.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_title_similarity_containment() {
        assert_eq!(title_similarity("양파", "양파 3kg"), 1.0);
        assert_eq!(title_similarity("", "양파"), 0.0);
    }

    #[test]
    fn test_title_similarity_partial_words() {
        let score = title_similarity("햇 양파", "양파 3kg");
        assert!(score > 0.3 && score < 1.0, "score {}", score);
    }

    #[test]
    fn test_bigram_match() {
        let result = run("새송이 2개요", &shop()).unwrap();
        let candidate = &result.candidates[0];
        assert_eq!(candidate.product_id, 1);
        assert_eq!(candidate.quantity, 2);
        assert!((0.3..=0.75).contains(&result.confidence));
    }

    #[test]
    fn test_exact_token() {
        let result = run("양파 주세요", &shop()).unwrap();
        assert_eq!(result.candidates[0].product_id, 3);
        assert_eq!(result.candidates[0].quantity, 1);
    }

    #[test]
    fn test_keyword_token() {
        let catalog = Catalog::new(vec![
            Product::new(1, "새송이버섯 1봉").with_base_price(2500.0),
            Product::new(2, "국내산 한돈 앞다리살 1kg")
                .with_base_price(11000.0)
                .with_keywords(["제육"]),
        ])
        .unwrap();
        let result = run("제육 2개요", &catalog).unwrap();
        assert_eq!(result.candidates[0].product_id, 2);
        assert_eq!(result.candidates[0].quantity, 2);
    }

    #[test]
    fn test_nothing_in_common() {
        assert_eq!(run("감사합니다", &shop()), Err(Miss::NoMatch));
        assert_eq!(run("3", &shop()), Err(Miss::NoMatch));
    }
}
