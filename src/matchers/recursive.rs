//! Multi-item comments ("사과2 단감3", "오이6개 파프리카 3봉 당근").
//!
//! A comment that looks like a single item is resolved directly against the
//! catalog. Anything else is split into segments and every segment goes
//! through the full matching pipeline one level deeper. Segments that still fail
//! fall back to the Product-Name matcher, whose consumed text is removed before
//! the remainder is tried again.
//!
//! ## Segmentation
//!
//! 1. Unit expressions such as "배추김치2키로 1" are never split
//! 2. Explicit delimiters (`,` `.` `;` `/` `|`)
//! 3. Name+number boundaries, attached ("오이6") or separated ("파프리카 3봉"),
//!    together with known product words that carry no number
//! 4. Whitespace, for pure-Hangul text made only of names
//!
//! A name is a Hangul run of two or more syllables, or a single syllable that
//! is a known product word, a catalog title word or a product keyword
//! ("배2 사과3").
//!
//! ## Confidence
//!
//! The mean candidate confidence scaled by coverage:
//! `mean × (0.5 + 0.5 × min(matched / expected, 1))`, where `expected` is the
//! number of quantity tokens in the comment ("N번 M개" counts as one).

use super::product_name::{self, extract_name};
use super::{Attempt, MatchContext, Miss};
use crate::classifier::is_quantity_catalog;
use crate::model::{Catalog, MatchCandidate, MatchResult, MatcherKind, PatternType, Product};
use crate::normalize::{
    count_numeric_tokens, parse_quantity, quantity_tokens, strip_customer_metadata,
    strip_order_endings, syllable_bigrams,
};
use crate::orchestrator::run_pipeline;
use crate::units::{has_box_keyword, PACKAGING_UNITS};
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

const DELIMITERS: &[char] = &[',', '.', ';', '/', '|'];

/// Product words recognized in a segment even without a quantity.
const KNOWN_PRODUCTS: &[&str] = &[
    "찌개용", "제육용", "불고기용", "국거리", "구이용", "스테이크용", "샤브용",
    "오이소박이김치", "열무김치", "배추김치", "얼갈이겉절이김치",
    "새송이버섯", "팽이버섯", "표고버섯", "느타리버섯", "적양배추", "양배추",
    "앞다리살", "후지살", "등갈비", "목살", "삼겹살", "안심", "등심", "채끝살", "부채살",
    "당근", "브로콜리", "파프리카", "오이", "청경채", "애호박", "가지", "양파", "대파", "쪽파",
    "상추", "깻잎", "시금치", "고구마", "감자", "토마토", "호박", "연근", "도라지", "마늘",
    "생강", "콩나물", "숙주", "돼지고기", "소고기", "닭고기", "생선", "고등어", "삼치", "갈치",
    "명태", "조기", "전복", "새우", "오징어", "꽃게", "게", "홍합", "바지락", "굴", "부추",
    "오이맛고추", "무", "배추", "버섯", "김치", "표고", "새송이", "팽이",
];

static RE_UNIT_PROTECTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[가-힣]{2,}\d+\s*(?:키로|kg|개|봉지|봉|박스|팩|통|마리|병)\s*\d+").unwrap()
});

static RE_BRANCH_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[가-힣]+점\d{4}|[가-힣]+\d{4}\s+").unwrap());

static RE_ATTACHED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([가-힣]+)\d+").unwrap());

static RE_SEPARATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([가-힣]+)\s+(\d+)(?:개|봉지|봉|박스|키로)?").unwrap()
});

static RE_ORDINAL_QUANTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\s*번\s*\d+").unwrap());

static RE_PURE_HANGUL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[가-힣\s]+$").unwrap());

static RE_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+").unwrap());

// Direct shapes
static RE_BARE_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)$").unwrap());

static RE_NAME_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([가-힣]+)(\d+)$").unwrap());

static RE_NAME_SPACE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([가-힣]+)\s+(\d+)\s*(?:개|봉지|봉|박스|팩|통|키로|kg|세트|마리|병)?$").unwrap()
});

static RE_NAME_NUMBER_EXTRA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([가-힣]+)(\d+)\s*[가-힣]+$").unwrap());

static RE_PURE_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([가-힣]{1,10})$").unwrap());

static RE_TITLE_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[[^\]]*\]|\([^)]*\)|\d+(?:\.\d+)?\s*kg|\d+\s*[가-힣]+|\d+").unwrap()
});

pub fn attempt(text: &str, ctx: &MatchContext<'_>) -> Attempt {
    if ctx.depth >= ctx.options.max_recursion_depth {
        return Err(Miss::DepthExceeded);
    }

    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let text = strip_customer_metadata(&flat);
    if text.is_empty() {
        return Err(Miss::NoMatch);
    }

    let segmenter = Segmenter::for_catalog(ctx.catalog);
    if !segmenter.looks_multi(&text) {
        if let Some(result) = direct(&text, ctx) {
            return Ok(result);
        }
    }

    segment_match(&text, &segmenter, ctx)
}

// ============================================================================
// Segmentation
// ============================================================================

fn delimited(text: &str) -> Option<Vec<String>> {
    for &delimiter in DELIMITERS {
        if !text.contains(delimiter) {
            continue;
        }
        let segments: Vec<String> = text
            .split(delimiter)
            .map(str::trim)
            .filter(|s| !s.is_empty() && s.chars().any(is_hangul))
            .map(str::to_string)
            .collect();
        if segments.len() > 1 {
            return Some(segments);
        }
    }
    None
}

fn is_hangul(c: char) -> bool {
    ('가'..='힣').contains(&c)
}

fn overlaps(found: &[(Range<usize>, String)], range: &Range<usize>) -> bool {
    found
        .iter()
        .any(|(r, _)| r.start < range.end && range.start < r.end)
}

/// Number of items a comment is expected to carry.
fn expected_items(text: &str) -> usize {
    if RE_ORDINAL_QUANTITY.is_match(text) {
        return 1;
    }
    count_numeric_tokens(text).max(1)
}

/// Finds item boundaries in a comment.
///
/// Product words come from a fixed grocery vocabulary plus, when built with
/// [`Segmenter::for_catalog`], the catalog's title words and keywords.
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    words: Vec<String>,
}

impl Segmenter {
    /// A segmenter that also knows the catalog's title words and keywords.
    pub fn for_catalog(catalog: &Catalog) -> Self {
        let mut words: Vec<String> = Vec::new();
        for product in catalog.products() {
            let title = comparable_title(&product.title);
            let keywords = product.keywords.iter().map(|k| k.trim().to_lowercase());
            for word in title.split_whitespace().map(str::to_string).chain(keywords) {
                let usable = !word.is_empty()
                    && word.chars().all(is_hangul)
                    && !PACKAGING_UNITS.contains(&word.as_str())
                    && !has_box_keyword(&word);
                if usable && !words.contains(&word) {
                    words.push(word);
                }
            }
        }
        Self { words }
    }

    /// Returns true if `word` is a product word on its own.
    pub fn is_word(&self, word: &str) -> bool {
        KNOWN_PRODUCTS.contains(&word) || self.words.iter().any(|w| w == word)
    }

    fn is_name(&self, name: &str) -> bool {
        name.chars().count() >= 2 || self.is_word(name)
    }

    /// Name+number items, attached ("오이6") or separated ("파프리카 3봉").
    fn numbered(&self, text: &str) -> Vec<(Range<usize>, String)> {
        let mut found: Vec<(Range<usize>, String)> = Vec::new();
        for caps in RE_ATTACHED.captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if self.is_name(name.as_str()) {
                found.push((whole.range(), whole.as_str().to_string()));
            }
        }
        for caps in RE_SEPARATED.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            if self.is_name(&caps[1]) && !overlaps(&found, &whole.range()) {
                found.push((whole.range(), format!("{}{}", &caps[1], &caps[2])));
            }
        }
        found
    }

    /// Returns true if the comment carries more than one item.
    pub fn looks_multi(&self, text: &str) -> bool {
        if RE_UNIT_PROTECTED.is_match(text) {
            return false;
        }
        self.numbered(text).len() >= 2 || delimited(text).is_some()
    }

    /// Splits a comment into independently matchable segments.
    pub fn split(&self, text: &str) -> Vec<String> {
        if RE_UNIT_PROTECTED.is_match(text) {
            return vec![text.to_string()];
        }

        let cleaned = RE_BRANCH_DIGITS.replace_all(text, "");
        let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

        if let Some(segments) = delimited(&cleaned) {
            return segments;
        }

        let mut found = self.numbered(&cleaned);
        for m in RE_WORD.find_iter(&cleaned) {
            if self.is_word(m.as_str()) && !overlaps(&found, &m.range()) {
                found.push((m.range(), m.as_str().to_string()));
            }
        }
        if !found.is_empty() {
            found.sort_by_key(|(range, _)| range.start);
            return found.into_iter().map(|(_, segment)| segment).collect();
        }

        if RE_PURE_HANGUL.is_match(&cleaned) {
            let words: Vec<&str> = cleaned.split_whitespace().collect();
            if words.len() > 1 && words.iter().all(|w| self.is_name(w)) {
                return words.into_iter().map(str::to_string).collect();
            }
        }

        vec![cleaned]
    }
}

/// Splits a comment with the built-in product vocabulary only.
///
/// ```
/// use ordermatch::matchers::recursive::split_segments;
///
/// assert_eq!(split_segments("사과2 단감3"), vec!["사과2", "단감3"]);
/// assert_eq!(split_segments("배추김치2키로 1"), vec!["배추김치2키로 1"]);
/// ```
pub fn split_segments(text: &str) -> Vec<String> {
    Segmenter::default().split(text)
}

// ============================================================================
// Direct resolution
// ============================================================================

/// A title with brackets, weights, counted units and digits removed.
fn comparable_title(title: &str) -> String {
    RE_TITLE_NOISE
        .replace_all(&title.to_lowercase(), " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// How well a bare name fits a title, 0.0 when it does not.
fn name_fit(name: &str, title: &str) -> f64 {
    let cleaned = comparable_title(title);
    let compact = cleaned.replace(' ', "");
    if compact.is_empty() {
        return 0.0;
    }
    if name == cleaned || name == compact {
        return 1.0;
    }
    if name.chars().count() < 2 {
        return 0.0;
    }
    if compact.contains(name) || name.contains(compact.as_str()) {
        return 0.8;
    }
    let similarity = strsim::normalized_levenshtein(name, &compact);
    if similarity > 0.2 {
        similarity
    } else {
        0.0
    }
}

/// Best fit of a name against a product's title and keywords.
fn product_fit(name: &str, product: &Product) -> f64 {
    product
        .keywords
        .iter()
        .map(|keyword| name_fit(name, keyword))
        .fold(name_fit(name, &product.title), f64::max)
}

/// Parses the single-item shapes: `(name, quantity)`.
fn single_item(text: &str) -> Option<(Option<String>, Option<u32>)> {
    if let Some(caps) = RE_BARE_NUMBER.captures(text) {
        return Some((None, Some(parse_quantity(&caps[1])?)));
    }
    for re in [&*RE_NAME_NUMBER, &*RE_NAME_SPACE_NUMBER, &*RE_NAME_NUMBER_EXTRA] {
        if let Some(caps) = re.captures(text) {
            let quantity = parse_quantity(&caps[2])?;
            return Some((Some(caps[1].to_string()), Some(quantity)));
        }
    }
    let caps = RE_PURE_NAME.captures(text)?;
    Some((Some(caps[1].to_string()), None))
}

fn direct(text: &str, ctx: &MatchContext<'_>) -> Option<MatchResult> {
    let shape = strip_order_endings(text);
    let (name, quantity) = single_item(&shape)?;

    let Some(name) = name else {
        let product = ctx.catalog.single()?;
        return Some(resolved(vec![candidate(product, quantity?, 0.95, text, ctx)]));
    };

    let fits: Vec<(&Product, f64)> = ctx
        .catalog
        .products()
        .map(|p| (p, product_fit(&name, p)))
        .filter(|(_, fit)| *fit > 0.0)
        .collect();
    let best_fit = fits.iter().map(|(_, fit)| *fit).fold(0.0, f64::max);
    let named: Vec<&Product> = fits
        .iter()
        .filter(|(_, fit)| *fit >= best_fit)
        .map(|(p, _)| *p)
        .collect();

    if let Some(quantity) = quantity {
        if is_quantity_catalog(ctx.catalog, ctx.pattern) {
            return cheapest(&named, quantity, text, ctx);
        }
        if ctx.pattern.pattern_type == PatternType::SizeVariant {
            return size_variant(&named, quantity, text, ctx);
        }
    }

    let quantity = quantity.unwrap_or(1);
    match named.first() {
        Some(product) => {
            let confidence = 0.95 * best_fit;
            log::debug!("direct '{}' → '{}' ({:.2})", name, product.title, confidence);
            Some(resolved(vec![candidate(product, quantity, confidence, text, ctx)]))
        }
        None => overlap(&name, quantity, text, ctx),
    }
}

fn candidate(
    product: &Product,
    quantity: u32,
    confidence: f64,
    comment: &str,
    ctx: &MatchContext<'_>,
) -> MatchCandidate {
    ctx.candidate(product, quantity, confidence, MatcherKind::RecursiveSegment, comment)
}

fn resolved(candidates: Vec<MatchCandidate>) -> MatchResult {
    let confidence = mean_confidence(&candidates);
    MatchResult::from_candidates(candidates, confidence, MatcherKind::RecursiveSegment)
}

fn mean_confidence(candidates: &[MatchCandidate]) -> f64 {
    if candidates.is_empty() {
        return 0.0;
    }
    candidates.iter().map(|c| c.confidence).sum::<f64>() / candidates.len() as f64
}

/// Quantity variants: the cheapest way to buy `quantity` among the named products.
fn cheapest(
    named: &[&Product],
    quantity: u32,
    comment: &str,
    ctx: &MatchContext<'_>,
) -> Option<MatchResult> {
    let pool: Vec<&Product> = if named.is_empty() {
        ctx.catalog.products().collect()
    } else {
        named.to_vec()
    };
    let (product, option) = pool
        .iter()
        .filter_map(|p| {
            ctx.pricing
                .best_for_product(quantity, p, Some(comment))
                .map(|o| (*p, o))
        })
        .min_by(|(_, a), (_, b)| a.total_price.total_cmp(&b.total_price))?;
    let confidence = if named.is_empty() { 0.9 } else { 0.95 };
    let candidate = MatchCandidate::new(product, option.quantity, confidence, MatcherKind::RecursiveSegment)
        .with_total(option.total_price);
    Some(resolved(vec![candidate]))
}

/// Size variants: a title carrying the number, else the largest product.
fn size_variant(
    named: &[&Product],
    quantity: u32,
    comment: &str,
    ctx: &MatchContext<'_>,
) -> Option<MatchResult> {
    let pool: Vec<&Product> = if named.is_empty() {
        ctx.catalog.products().collect()
    } else {
        named.to_vec()
    };
    if let Some(product) = pool
        .iter()
        .find(|p| quantity_tokens(&p.title).contains(&quantity))
    {
        return Some(resolved(vec![candidate(product, 1, 0.9, comment, ctx)]));
    }
    let largest = pool
        .iter()
        .max_by(|a, b| a.linear_price(1).total_cmp(&b.linear_price(1)))?;
    Some(resolved(vec![candidate(largest, quantity, 0.9, comment, ctx)]))
}

/// Mixed catalogs: any title sharing a syllable pair with the name.
fn overlap(name: &str, quantity: u32, comment: &str, ctx: &MatchContext<'_>) -> Option<MatchResult> {
    let pairs = syllable_bigrams(name);
    let product = ctx.catalog.products().find(|p| {
        let title = comparable_title(&p.title).replace(' ', "");
        pairs.iter().any(|pair| title.contains(pair.as_str()))
    })?;
    Some(resolved(vec![candidate(product, quantity, 0.75, comment, ctx)]))
}

// ============================================================================
// Segments
// ============================================================================

fn segment_match(text: &str, segmenter: &Segmenter, ctx: &MatchContext<'_>) -> Attempt {
    let segments = segmenter.split(text);
    if segments.len() <= 1 {
        return single_segment(text, segmenter, ctx);
    }

    let deeper = ctx.deeper();
    let mut candidates = Vec::new();

    for segment in &segments {
        let segment = strip_customer_metadata(segment);
        let outcome = run_pipeline(&segment, &deeper);
        if let Some(accepted) = outcome.accepted {
            candidates.extend(accepted.candidates);
            continue;
        }

        if RE_PURE_HANGUL.is_match(&segment) && segment.contains(' ') {
            let before = candidates.len();
            for word in segment.split_whitespace() {
                if let Some(accepted) = run_pipeline(word, &deeper).accepted {
                    candidates.extend(accepted.candidates);
                }
            }
            if candidates.len() > before {
                continue;
            }
        }

        match outcome.best {
            Some(best) if best.confidence >= ctx.options.recursive_min_confidence => {
                candidates.extend(best.candidates);
            }
            _ => log::debug!("segment {:?} dropped", segment),
        }
    }

    if candidates.is_empty() {
        return Err(Miss::NoMatch);
    }
    Ok(finish(candidates, text))
}

/// Product-Name fallback with consumed-text removal.
fn single_segment(text: &str, segmenter: &Segmenter, ctx: &MatchContext<'_>) -> Attempt {
    let found = product_name::attempt(text, ctx)?;
    let mut candidates = found.candidates;
    let Some(first) = candidates.first() else {
        return Err(Miss::NoMatch);
    };

    let remainder = consume(text, &extract_name(text), first.quantity);
    let worth_trying = remainder != text
        && remainder.chars().any(is_hangul)
        && (remainder.chars().count() >= 2 || segmenter.is_word(&remainder));
    if worth_trying {
        log::debug!("retrying remainder {:?}", remainder);
        if let Ok(rest) = attempt(&remainder, &ctx.deeper()) {
            candidates.extend(rest.candidates);
        }
    }

    Ok(finish(candidates, text))
}

/// Removes the text a match consumed: the exact `name+qty`, else looser forms.
fn consume(text: &str, name: &str, quantity: u32) -> String {
    let name = regex::escape(name.trim());
    if name.is_empty() {
        return text.to_string();
    }
    let forms = [
        format!(r"{}\s*{}(?:개|봉|박스)?", name, quantity),
        format!(r"{}(?:개|봉|박스)?\s*{}", quantity, name),
        name.clone(),
    ];
    for form in &forms {
        let Ok(re) = Regex::new(form) else { continue };
        if re.is_match(text) {
            let rest = re.replace(text, " ");
            return rest.split_whitespace().collect::<Vec<_>>().join(" ");
        }
    }
    text.to_string()
}

/// Scales the mean confidence by how many expected items were found.
///
/// Repeated products stay separate; the orchestrator merges them.
fn finish(candidates: Vec<MatchCandidate>, text: &str) -> MatchResult {
    let expected = expected_items(text) as f64;
    let coverage = (candidates.len() as f64 / expected).min(1.0);
    let confidence = mean_confidence(&candidates) * (0.5 + 0.5 * coverage);
    MatchResult::from_candidates(candidates, confidence, MatcherKind::RecursiveSegment)
}
