//! Comment analysis.
//!
//! The analyzer looks at a comment before any matcher runs and reports which
//! order shapes it contains ("2번", "3박스", "사과2", ...), a coarse comment
//! type, whether it reads as a multi-item order and which matcher is most
//! likely to handle it. The recommendation is advisory; the orchestrator's
//! priority table stays authoritative.
//!
//! ## Detectors
//!
//! | Detector            | Example            | Confidence |
//! |---------------------|--------------------|------------|
//! | bare integer        | "3"                | 0.95       |
//! | ordinal             | "2번"              | 0.9        |
//! | unit quantity       | "3박스", "두 봉지" | 0.85       |
//! | Korean quantity     | "하나", "두 개"    | 0.8        |
//! | product name        | "사과"             | 0.75       |
//! | half/size qualifier | "반박스"           | 0.85       |
//! | color option        | "네이비 1"         | 0.9        |
//! | slash compound      | "홍길동/1234/본점/사과2" | 0.95 |
//! | product + number    | "사과2"            | 0.9        |

use crate::model::{Catalog, MatcherKind};
use crate::normalize::{count_numeric_tokens, is_phone_like, normalize};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Kind of a detected order shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    SimpleNumber,
    Ordinal,
    UnitQuantity,
    KoreanQuantity,
    ProductName,
    SpecialQuantity,
    ColorOption,
    SlashCompound,
    ProductWithNumber,
}

impl PatternKind {
    /// Base confidence of the detector.
    pub fn weight(self) -> f64 {
        match self {
            PatternKind::SimpleNumber => 0.95,
            PatternKind::Ordinal => 0.9,
            PatternKind::ColorOption => 0.9,
            PatternKind::UnitQuantity => 0.85,
            PatternKind::SpecialQuantity => 0.85,
            PatternKind::KoreanQuantity => 0.8,
            PatternKind::ProductName => 0.75,
            PatternKind::SlashCompound => 0.95,
            PatternKind::ProductWithNumber => 0.9,
        }
    }
}

/// One detector hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedPattern {
    /// Detector that fired
    pub kind: PatternKind,
    /// Matched substring
    pub matched: String,
    /// Detector confidence
    pub confidence: f64,
}

/// Coarse shape of a whole comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentType {
    ProductWithNumber,
    SlashCompound,
    SimpleNumber,
    Ordinal,
    ColorOption,
    UnitQuantity,
    ProductName,
    Mixed,
    Unknown,
}

impl CommentType {
    fn bonus(self) -> f64 {
        match self {
            CommentType::SimpleNumber => 0.05,
            CommentType::Ordinal => 0.1,
            CommentType::ColorOption => 0.1,
            CommentType::UnitQuantity => 0.05,
            CommentType::Mixed => -0.1,
            CommentType::Unknown => -0.2,
            _ => 0.0,
        }
    }
}

impl std::fmt::Display for CommentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CommentType::ProductWithNumber => "product_with_number",
            CommentType::SlashCompound => "slash_compound",
            CommentType::SimpleNumber => "simple_number",
            CommentType::Ordinal => "ordinal",
            CommentType::ColorOption => "color_option",
            CommentType::UnitQuantity => "unit_quantity",
            CommentType::ProductName => "product_name",
            CommentType::Mixed => "mixed",
            CommentType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// The analysis of one comment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentAnalysis {
    /// Normalized comment text
    pub normalized: String,
    /// Whitespace tokens of the normalized text
    pub tokens: Vec<String>,
    /// Detector hits in detector order
    pub patterns: Vec<DetectedPattern>,
    /// Coarse comment type
    pub comment_type: CommentType,
    /// True when the catalog holds at most one product
    pub single_product_catalog: bool,
    /// True when the comment looks like several items
    pub multi_product: bool,
    /// Recommended matcher; `None` means escalate
    pub recommended: Option<MatcherKind>,
    /// Numeric tokens, phone-like runs excluded
    pub numeric_count: usize,
    /// Overall analysis confidence
    pub confidence: f64,
}

impl CommentAnalysis {
    /// Returns true if a detector of this kind fired.
    pub fn has(&self, kind: PatternKind) -> bool {
        self.patterns.iter().any(|p| p.kind == kind)
    }
}

// ============================================================================
// Detectors
// ============================================================================

static RE_SIMPLE_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());

static RE_ORDINAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*번").unwrap());

static RE_UNIT_QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+|한|두|세|네|다섯)\s*(박스|봉지|개|통|팩|세트|묶음|kg|키로|병|알)").unwrap()
});

static RE_KOREAN_QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"하나|둘|셋|한\s*개|두\s*개|세\s*개|한\s*봉지|두\s*봉지").unwrap()
});

static RE_HANGUL_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[가-힣]{2,}").unwrap());

static RE_SPECIAL_QUANTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"반\s*(박스|통|봉지)").unwrap());

static RE_COLOR_OPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(네이비|레드|블랙|화이트|블루|그린|옐로우|핑크|퍼플|오렌지|브라운|그레이|베이지|아이보리|카키|와인|민트|크림|차콜|실버|골드|navy|red|black|white|blue|green|yellow|pink|purple|orange|brown|gray|grey|beige|ivory|khaki|wine|mint|cream|charcoal|silver|gold)\s*\d+",
    )
    .unwrap()
});

static RE_SLASH_COMPOUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([가-힣]+)/(\d{3,4})/([가-힣]+점?)/([가-힣]+\d*)").unwrap()
});

static RE_PRODUCT_WITH_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([가-힣]{2,})\s*(\d+)").unwrap());

static RE_NAME_SPACE_NUMBER_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[가-힣]{2,}\s+\d+\s*(개|봉지|봉|팩|세트|통|병|박스|kg|키로)").unwrap()
});

static RE_ANALYSIS_PUNCT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]").unwrap());

fn detect_patterns(text: &str) -> Vec<DetectedPattern> {
    let mut patterns = Vec::new();
    let mut push = |kind: PatternKind, matched: &str, confidence: f64| {
        patterns.push(DetectedPattern {
            kind,
            matched: matched.to_string(),
            confidence,
        });
    };
    let detectors: [(PatternKind, &Regex); 3] = [
        (PatternKind::Ordinal, &*RE_ORDINAL),
        (PatternKind::UnitQuantity, &*RE_UNIT_QUANTITY),
        (PatternKind::KoreanQuantity, &*RE_KOREAN_QUANTITY),
    ];

    if RE_SIMPLE_NUMBER.is_match(text) {
        push(PatternKind::SimpleNumber, text, PatternKind::SimpleNumber.weight());
    }
    for (kind, re) in detectors {
        if let Some(m) = re.find(text) {
            push(kind, m.as_str(), kind.weight());
        }
    }
    if let Some(m) = RE_HANGUL_WORD.find_iter(text).find(|m| is_product_word(m.as_str())) {
        push(PatternKind::ProductName, m.as_str(), PatternKind::ProductName.weight());
    }
    let detectors: [(PatternKind, &Regex); 3] = [
        (PatternKind::SpecialQuantity, &*RE_SPECIAL_QUANTITY),
        (PatternKind::ColorOption, &*RE_COLOR_OPTION),
        (PatternKind::SlashCompound, &*RE_SLASH_COMPOUND),
    ];
    for (kind, re) in detectors {
        if let Some(m) = re.find(text) {
            push(kind, m.as_str(), kind.weight());
        }
    }
    if let Some(m) = RE_PRODUCT_WITH_NUMBER.find(text) {
        push(PatternKind::ProductWithNumber, m.as_str(), 0.9);
    } else if let Some(m) = RE_NAME_SPACE_NUMBER_UNIT.find(text) {
        push(PatternKind::ProductWithNumber, m.as_str(), 0.85);
    }

    patterns
}

fn is_product_word(word: &str) -> bool {
    !RE_KOREAN_QUANTITY.is_match(word) && !word.contains("주세요") && !word.contains("부탁")
}

fn comment_type(patterns: &[DetectedPattern], text: &str) -> CommentType {
    let has = |kind: PatternKind| patterns.iter().any(|p| p.kind == kind);

    if patterns.is_empty() {
        return CommentType::Unknown;
    }
    if has(PatternKind::ProductWithNumber) {
        return CommentType::ProductWithNumber;
    }
    if has(PatternKind::SlashCompound) {
        return if text.contains(',') {
            CommentType::ProductWithNumber
        } else {
            CommentType::SlashCompound
        };
    }
    if has(PatternKind::SimpleNumber) && patterns.len() == 1 {
        return CommentType::SimpleNumber;
    }
    if has(PatternKind::Ordinal) {
        return CommentType::Ordinal;
    }
    if has(PatternKind::ColorOption) {
        return CommentType::ColorOption;
    }
    if has(PatternKind::UnitQuantity) {
        return CommentType::UnitQuantity;
    }
    if has(PatternKind::ProductName) {
        return CommentType::ProductName;
    }
    if patterns.len() > 2 {
        return CommentType::Mixed;
    }
    CommentType::Unknown
}

fn confidence(patterns: &[DetectedPattern], comment_type: CommentType) -> f64 {
    if patterns.is_empty() {
        return 0.1;
    }
    let max = patterns
        .iter()
        .map(|p| p.confidence)
        .fold(f64::MIN, f64::max);
    (max + comment_type.bonus()).clamp(0.0, 1.0)
}

// ============================================================================
// Multi-item detection
// ============================================================================

static RE_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

static RE_HANGUL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[가-힣]+").unwrap());

static RE_NAME_NUMBER_NAME_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[가-힣]+\s+\d+\s+[가-힣]+\s+\d+").unwrap());

static RE_ATTACHED_PAIRS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[가-힣]+\d+\s+[가-힣]+\d+").unwrap());

static RE_LEADING_NUMBER_PAIRS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+[가-힣]+\s+\d+[가-힣]+").unwrap());

static RE_NAME_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[가-힣]+\s*\d+").unwrap());

/// Removes phone-like digit runs so customer phone tails never count as quantities.
fn without_phone_runs(text: &str) -> String {
    let cleaned = RE_DIGITS.replace_all(text, |caps: &regex::Captures| {
        if is_phone_like(&caps[0]) {
            String::new()
        } else {
            caps[0].to_string()
        }
    });
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns true if the comment reads as several items.
pub fn is_multi_product(text: &str) -> bool {
    let clean = without_phone_runs(text);
    let numbers = RE_DIGITS.find_iter(&clean).count();
    if numbers > 1 {
        return true;
    }

    RE_NAME_NUMBER_NAME_NUMBER.is_match(&clean)
        || RE_ATTACHED_PAIRS.is_match(&clean)
        || RE_LEADING_NUMBER_PAIRS.is_match(&clean)
        || RE_NAME_NUMBER.find_iter(&clean).count() > 1
        || (RE_HANGUL.find_iter(&clean).count() >= 2 && numbers >= 2)
}

// ============================================================================
// Recommendation
// ============================================================================

fn recommend(
    comment_type: CommentType,
    single_product: bool,
    multi_product: bool,
    patterns: &[DetectedPattern],
) -> Option<MatcherKind> {
    if !single_product && multi_product {
        return Some(MatcherKind::RecursiveSegment);
    }

    if single_product {
        return Some(match comment_type {
            CommentType::SimpleNumber => MatcherKind::SimpleNumber,
            CommentType::UnitQuantity => MatcherKind::BoxPattern,
            _ => MatcherKind::ProductName,
        });
    }

    match comment_type {
        CommentType::SlashCompound | CommentType::ColorOption => {
            return Some(MatcherKind::ProductName)
        }
        CommentType::Ordinal => return Some(MatcherKind::NumberBased),
        CommentType::ProductWithNumber => return Some(MatcherKind::RecursiveSegment),
        _ => {}
    }

    let box_or_piece = patterns
        .iter()
        .any(|p| p.matched.contains("박스") || p.matched.contains('알'));
    if box_or_piece {
        return Some(MatcherKind::RecursiveSegment);
    }
    if patterns.iter().any(|p| p.kind == PatternKind::ProductName) {
        return Some(MatcherKind::ProductName);
    }

    match comment_type {
        CommentType::UnitQuantity => Some(MatcherKind::BoxPattern),
        CommentType::Mixed | CommentType::SimpleNumber => Some(MatcherKind::RecursiveSegment),
        _ => None,
    }
}

/// Analyzes a comment against a catalog.
///
/// # Example
///
/// ```
/// use ordermatch::analyzer::{analyze, CommentType};
/// use ordermatch::{Catalog, MatcherKind, Product};
///
/// let catalog = Catalog::new(vec![
///     Product::new(1, "사과 1봉").with_base_price(5000.0),
///     Product::new(2, "배 1봉").with_base_price(7000.0),
/// ])?;
/// let analysis = analyze("2번 3개요", &catalog);
/// assert_eq!(analysis.comment_type, CommentType::Ordinal);
/// assert!(analysis.multi_product);
/// # Ok::<(), ordermatch::Error>(())
/// ```
pub fn analyze(comment: &str, catalog: &Catalog) -> CommentAnalysis {
    let normalized = normalize(comment);
    let text = RE_ANALYSIS_PUNCT.replace_all(&normalized, "").trim().to_string();
    let tokens: Vec<String> = text.split_whitespace().map(str::to_string).collect();

    let patterns = detect_patterns(&text);
    let comment_type = comment_type(&patterns, &text);
    let single_product_catalog = catalog.len() <= 1;
    let multi_product = is_multi_product(&text);
    let recommended = recommend(comment_type, single_product_catalog, multi_product, &patterns);
    let confidence = confidence(&patterns, comment_type);

    log::debug!(
        "analyzed {:?}: type={}, multi={}, recommended={:?}",
        text,
        comment_type,
        multi_product,
        recommended
    );

    CommentAnalysis {
        numeric_count: count_numeric_tokens(&text),
        normalized,
        tokens,
        patterns,
        comment_type,
        single_product_catalog,
        multi_product,
        recommended,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Product;

    fn single() -> Catalog {
        Catalog::new(vec![Product::new(1, "대추방울토마토 2kg").with_base_price(15000.0)]).unwrap()
    }

    fn mixed() -> Catalog {
        Catalog::new(vec![
            Product::new(1, "사과 1봉").with_base_price(5000.0),
            Product::new(2, "배 1봉").with_base_price(7000.0),
            Product::new(3, "단감 1봉").with_base_price(6000.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_bare_number_on_single_product() {
        let analysis = analyze("3", &single());
        assert_eq!(analysis.comment_type, CommentType::SimpleNumber);
        assert_eq!(analysis.recommended, Some(MatcherKind::SimpleNumber));
        assert!((analysis.confidence - 1.0).abs() < 1e-9);
        assert_eq!(analysis.numeric_count, 1);
    }

    #[test]
    fn test_unit_quantity_on_single_product() {
        let analysis = analyze("2박스", &single());
        assert_eq!(analysis.comment_type, CommentType::UnitQuantity);
        assert_eq!(analysis.recommended, Some(MatcherKind::BoxPattern));
    }

    #[test]
    fn test_product_with_number() {
        let analysis = analyze("사과2", &mixed());
        assert!(analysis.has(PatternKind::ProductWithNumber));
        assert_eq!(analysis.comment_type, CommentType::ProductWithNumber);
        assert_eq!(analysis.recommended, Some(MatcherKind::RecursiveSegment));
    }

    #[test]
    fn test_multi_product_goes_recursive() {
        let analysis = analyze("사과2 배3", &mixed());
        assert!(analysis.multi_product);
        assert_eq!(analysis.recommended, Some(MatcherKind::RecursiveSegment));
        assert_eq!(analysis.numeric_count, 2);
    }

    #[test]
    fn test_phone_runs_do_not_make_multi_product() {
        assert!(!is_multi_product("홍길동 1234 사과"));
        assert!(is_multi_product("사과 1 배 2"));
        assert!(is_multi_product("1사과 2배"));
    }

    #[test]
    fn test_color_option() {
        let catalog = Catalog::new(vec![
            Product::new(1, "티셔츠 네이비").with_base_price(9900.0),
            Product::new(2, "티셔츠 블랙").with_base_price(9900.0),
        ])
        .unwrap();
        let analysis = analyze("네이비 1", &catalog);
        assert!(analysis.has(PatternKind::ColorOption));
        assert_eq!(analysis.comment_type, CommentType::ProductWithNumber);
    }

    #[test]
    fn test_greeting_has_name_pattern_only() {
        let analysis = analyze("감사합니다", &mixed());
        assert_eq!(analysis.comment_type, CommentType::ProductName);
        assert_eq!(analysis.recommended, Some(MatcherKind::ProductName));
        assert_eq!(analysis.numeric_count, 0);
    }

    #[test]
    fn test_unknown_comment_escalates() {
        let analysis = analyze("^^", &mixed());
        assert!(analysis.patterns.is_empty());
        assert_eq!(analysis.comment_type, CommentType::Unknown);
        assert_eq!(analysis.recommended, None);
        assert!((analysis.confidence - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_numeric_count_excludes_phone_runs() {
        let analysis = analyze("홍길동 0105 사과 2", &mixed());
        assert_eq!(analysis.numeric_count, 1);
    }
}
