//! # Comment Normalizer
//!
//! A staged pipeline that turns a raw customer comment into a canonical form the
//! matchers can reason about.
//!
//! ## Pipeline Stages
//!
//! 1. **Stage 1: Markup Removal** - user-reference tags, other inline tags, NFC, control characters, fullwidth forms
//! 2. **Stage 2: Collapsing** - whitespace runs, repeated punctuation, laughter jamo, ASCII lowercase
//! 3. **Stage 3: Look-alike Digits** - `ㅣ`, `l`, `|` standing in for 1, `o` standing in for 0
//! 4. **Stage 4: Korean Numerals** - "한팩" → "1팩", "하나" → "1"
//! 5. **Stage 5: Set Typos** - "셋트", "쎄트", "세뜨", "2셋" → "세트"
//!
//! The pipeline is re-run until it reaches a fixpoint, so [`normalize`] is idempotent.
//!
//! Customer-metadata stripping ([`strip_customer_metadata`]) and the phone-like
//! digit-run rule ([`is_phone_like`], [`parse_quantity`]) live here too; every
//! matcher extracts quantities through [`parse_quantity`].

use crate::units::{alternation, starts_with_unit, PACKAGING_UNITS};
use regex::{Captures, Regex};
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Normalizer configuration options
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Enable Stage 1: markup removal
    pub strip_markup: bool,
    /// Enable Stage 2: whitespace and punctuation collapsing
    pub collapse: bool,
    /// Enable Stage 3: look-alike digit substitution
    pub substitute_lookalikes: bool,
    /// Enable Stage 4: Korean numeral expansion
    pub expand_numerals: bool,
    /// Enable Stage 5: set typo correction
    pub correct_set_typos: bool,
    /// Maximum number of pipeline passes while searching for a fixpoint
    pub max_passes: usize,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            strip_markup: true,
            collapse: true,
            substitute_lookalikes: true,
            expand_numerals: true,
            correct_set_typos: true,
            max_passes: 6,
        }
    }
}

impl NormalizeOptions {
    /// Creates options for minimal normalization (markup and whitespace only)
    pub fn minimal() -> Self {
        Self {
            substitute_lookalikes: false,
            expand_numerals: false,
            correct_set_typos: false,
            ..Self::default()
        }
    }
}

// ============================================================================
// Stage 1: Markup Removal
// ============================================================================

static RE_USER_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<band:refer[^>]*>.*?</band:refer>\s*").unwrap());

static RE_MARKUP_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^<>]+>").unwrap());

/// Stage 1: Remove markup artifacts
///
/// - Inline user-reference tags (the referenced name is dropped with the tag)
/// - Any other angle-bracket tag
/// - Unicode NFC normalization
/// - Control character removal
/// - Fullwidth form normalization
pub fn stage1_strip_markup(input: &str) -> String {
    let without_refs = RE_USER_REFERENCE.replace_all(input, "");
    let without_tags = RE_MARKUP_TAG.replace_all(&without_refs, " ");

    let mut result = String::with_capacity(without_tags.len());
    for c in without_tags.nfc() {
        match c {
            '\n' => result.push('\n'),
            '\t' => result.push(' '),
            c if c.is_control() || c == '\u{FEFF}' || c == '\u{200B}' => {}
            c => result.push(normalize_fullwidth(c).unwrap_or(c)),
        }
    }
    result
}

/// Normalize fullwidth characters to ASCII
fn normalize_fullwidth(c: char) -> Option<char> {
    match c {
        '\u{3000}' => Some(' '),
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0),
        _ => None,
    }
}

// ============================================================================
// Stage 2: Collapsing
// ============================================================================

/// Punctuation whose repeated runs collapse to a single character.
/// `/` is excluded so the double-slash metadata marker survives.
const REPEATABLE_PUNCT: &[char] = &['!', '?', '~', '.', ',', ';', '^', '-', '*'];

/// Laughter and crying jamo that never carry order information.
const LAUGHTER_JAMO: &[char] = &['ㅋ', 'ㅎ', 'ㅠ', 'ㅜ', 'ㅡ'];

/// Stage 2: Collapse whitespace and punctuation
///
/// - Whitespace runs become one space, lines are trimmed, blank lines dropped
/// - Repeated punctuation collapses to one character
/// - Laughter jamo removed
/// - ASCII lowercase
pub fn stage2_collapse(input: &str) -> String {
    let mut lines = Vec::new();

    for line in input.lines() {
        let mut out = String::with_capacity(line.len());
        let mut prev: Option<char> = None;

        for c in line.chars() {
            let c = c.to_ascii_lowercase();
            if LAUGHTER_JAMO.contains(&c) {
                continue;
            }
            if c.is_whitespace() {
                if matches!(prev, None | Some(' ')) {
                    continue;
                }
                out.push(' ');
                prev = Some(' ');
                continue;
            }
            if REPEATABLE_PUNCT.contains(&c) && prev == Some(c) {
                continue;
            }
            out.push(c);
            prev = Some(c);
        }

        let trimmed = out.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }

    lines.join("\n")
}

// ============================================================================
// Stage 3: Look-alike Digits
// ============================================================================

/// Stage 3: Substitute look-alike characters for digits
///
/// - `ㅣ` and superscript digits always
/// - `l`/`i` when they form a quantity token ("l개", "I 팩") or sit between digits
/// - `|` when it directly precedes a unit word or is the whole comment
/// - `o` after a digit when the number continues or ends ("1o개" → "10개")
pub fn stage3_substitute_lookalikes(input: &str) -> String {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut out = String::with_capacity(input.len());

    for (pos, &(byte_idx, c)) in chars.iter().enumerate() {
        let prev = out.chars().next_back();
        let next = chars.get(pos + 1).map(|&(_, n)| n);
        let rest = &input[byte_idx + c.len_utf8()..];

        let replacement = match c {
            'ㅣ' | '¹' => Some('1'),
            '²' => Some('2'),
            '³' => Some('3'),
            'l' | 'L' | 'i' | 'I' => looks_like_one(prev, next, rest).then_some('1'),
            '|' => {
                let whole = prev.is_none() && next.is_none();
                let before_unit = is_token_start(prev) && starts_with_unit(rest).is_some();
                (whole || before_unit).then_some('1')
            }
            'o' | 'O' => looks_like_zero(prev, next, rest).then_some('0'),
            _ => None,
        };
        out.push(replacement.unwrap_or(c));
    }

    out
}

fn is_token_start(prev: Option<char>) -> bool {
    match prev {
        None => true,
        Some(p) => p.is_whitespace(),
    }
}

fn ends_quantity(next: Option<char>, rest: &str) -> bool {
    match next {
        None => true,
        Some(n) if n.is_whitespace() || n.is_ascii_digit() => true,
        Some(_) => starts_with_unit(rest).is_some(),
    }
}

fn looks_like_one(prev: Option<char>, next: Option<char>, rest: &str) -> bool {
    match prev {
        Some(p) if p.is_ascii_digit() => next.is_some_and(|n| n.is_ascii_digit()),
        p if is_token_start(p) => ends_quantity(next, rest),
        _ => false,
    }
}

fn looks_like_zero(prev: Option<char>, next: Option<char>, rest: &str) -> bool {
    prev.is_some_and(|p| p.is_ascii_digit())
        && (matches!(next, Some('o') | Some('O')) || ends_quantity(next, rest))
}

// ============================================================================
// Stage 4: Korean Numerals
// ============================================================================

/// Numeral words and their values, longest first.
const KOREAN_NUMERALS: &[(&str, u32)] = &[
    ("다섯", 5),
    ("여섯", 6),
    ("일곱", 7),
    ("여덟", 8),
    ("아홉", 9),
    ("하나", 1),
    ("한", 1),
    ("둘", 2),
    ("두", 2),
    ("셋", 3),
    ("세", 3),
    ("넷", 4),
    ("네", 4),
    ("열", 10),
];

/// Numeral words that stand alone as a whole token ("하나요").
/// "셋" is left alone: it reads as three pieces or as one set depending on the catalog.
const STANDALONE_NUMERALS: &[&str] = &["하나", "둘", "넷", "다섯"];

static RE_NUMERAL_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    let units: Vec<&str> = PACKAGING_UNITS
        .iter()
        .copied()
        .filter(|u| *u != "g")
        .collect();
    Regex::new(&format!(
        r"(다섯|여섯|일곱|여덟|아홉|한|두|세|네|열)( ?)({})",
        alternation(&units)
    ))
    .unwrap()
});

static RE_STANDALONE_NUMERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(하나|둘|넷|다섯)(요|이요|만|씩)?$").unwrap());

/// Returns the value of a Korean numeral word ("한", "하나", "두", "셋", "열", ...).
pub fn korean_number(word: &str) -> Option<u32> {
    KOREAN_NUMERALS
        .iter()
        .find(|(w, _)| *w == word)
        .map(|(_, n)| *n)
}

/// Stage 4: Expand Korean numerals
///
/// - Numeral + unit contractions: "한팩" → "1팩", "두 박스" → "2 박스"
/// - Standalone numeral tokens: "하나" → "1", "둘이요" → "2이요"
pub fn stage4_expand_numerals(input: &str) -> String {
    let expanded = RE_NUMERAL_UNIT.replace_all(input, |caps: &Captures| {
        match korean_number(&caps[1]) {
            Some(n) => format!("{}{}{}", n, &caps[2], &caps[3]),
            None => caps[0].to_string(),
        }
    });

    expanded
        .lines()
        .map(|line| {
            line.split(' ')
                .map(|token| match RE_STANDALONE_NUMERAL.captures(token) {
                    Some(caps) if STANDALONE_NUMERALS.contains(&&caps[1]) => {
                        let n = korean_number(&caps[1]).unwrap_or(1);
                        format!("{}{}", n, caps.get(2).map_or("", |m| m.as_str()))
                    }
                    _ => token.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Stage 5: Set Typos
// ============================================================================

static RE_SET_TYPO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:셋|쎄|세)(?:트|뜨)+").unwrap());

static RE_COUNTED_SET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d)( ?)셋").unwrap());

/// Stage 5: Correct known typo variants of "세트"
pub fn stage5_correct_set_typos(input: &str) -> String {
    let fixed = RE_SET_TYPO.replace_all(input, "세트");
    RE_COUNTED_SET
        .replace_all(&fixed, "${1}${2}세트")
        .into_owned()
}

// ============================================================================
// Main Pipeline
// ============================================================================

fn run_stages(input: &str, options: &NormalizeOptions) -> String {
    let mut result = input.to_string();

    if options.strip_markup {
        result = stage1_strip_markup(&result);
    }
    if options.collapse {
        result = stage2_collapse(&result);
    }
    if options.substitute_lookalikes {
        result = stage3_substitute_lookalikes(&result);
    }
    if options.expand_numerals {
        result = stage4_expand_numerals(&result);
    }
    if options.correct_set_typos {
        result = stage5_correct_set_typos(&result);
    }
    if options.collapse {
        result = stage2_collapse(&result);
    }

    result
}

/// Run the normalization pipeline to a fixpoint
///
/// # Example
///
/// ```
/// use ordermatch::normalize::{normalize_with, NormalizeOptions};
///
/// let text = normalize_with("한팩   주세요!!!", &NormalizeOptions::default());
/// assert_eq!(text, "1팩 주세요!");
/// ```
pub fn normalize_with(input: &str, options: &NormalizeOptions) -> String {
    let mut current = run_stages(input, options);
    for _ in 1..options.max_passes.max(1) {
        let next = run_stages(&current, options);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Run normalization with default options
pub fn normalize(input: &str) -> String {
    normalize_with(input, &NormalizeOptions::default())
}

// ============================================================================
// Phone-like Digit Runs
// ============================================================================

static RE_DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Returns true if a digit run looks like a phone number or branch code:
/// four or more digits, or three or more starting with zero.
pub fn is_phone_like(digits: &str) -> bool {
    let len = digits.chars().count();
    len >= 4 || (len >= 3 && digits.starts_with('0'))
}

/// Parses a quantity from a digit run, refusing zero and phone-like runs.
pub fn parse_quantity(digits: &str) -> Option<u32> {
    let digits = digits.trim();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) || is_phone_like(digits) {
        return None;
    }
    digits.parse::<u32>().ok().filter(|&n| n > 0)
}

/// Every numeric token of `text` usable as a quantity, in order.
pub fn quantity_tokens(text: &str) -> Vec<u32> {
    RE_DIGIT_RUN
        .find_iter(text)
        .filter_map(|m| parse_quantity(m.as_str()))
        .collect()
}

/// Counts digit runs that are not phone-like (zero included).
pub fn count_numeric_tokens(text: &str) -> usize {
    RE_DIGIT_RUN
        .find_iter(text)
        .filter(|m| !is_phone_like(m.as_str()))
        .count()
}

// ============================================================================
// Customer-Metadata Stripping
// ============================================================================

/// How much a metadata rule trusts its digit run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DigitCheck {
    /// The surrounding shape (delimiters or a branch name) is enough.
    Shape,
    /// The digit run itself must be phone-like.
    PhoneLike,
}

struct MetadataRule {
    name: &'static str,
    pattern: Regex,
    digits: Option<usize>,
    check: DigitCheck,
    product: usize,
    needs_hangul_word: bool,
}

impl MetadataRule {
    fn new(
        name: &'static str,
        pattern: &str,
        digits: Option<usize>,
        check: DigitCheck,
        product: usize,
        needs_hangul_word: bool,
    ) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).unwrap(),
            digits,
            check,
            product,
            needs_hangul_word,
        }
    }

    fn apply<'a>(&self, text: &'a str) -> Option<&'a str> {
        let caps = self.pattern.captures(text)?;
        if let Some(group) = self.digits {
            let run = caps.get(group)?.as_str();
            if self.check == DigitCheck::PhoneLike && !is_phone_like(run) {
                return None;
            }
        }
        let product = caps.get(self.product)?.as_str().trim();
        if product.is_empty() {
            return None;
        }
        if self.needs_hangul_word && !RE_HANGUL_WORD.is_match(product) {
            return None;
        }
        Some(product)
    }
}

static RE_HANGUL_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[가-힣]{2,}").unwrap());

static RE_LEADING_BRANCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^[가-힣]{1,6}점\s+(.+)$").unwrap());

static RE_LEADING_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[,\s]+").unwrap());

/// Metadata shape rules in priority order.
static METADATA_RULES: LazyLock<Vec<MetadataRule>> = LazyLock::new(|| {
    use DigitCheck::{PhoneLike, Shape};
    vec![
        // 김혜선/0089/봉선점/국거리1
        MetadataRule::new("slash", r"(?s)^[가-힣]+\s*/\s*(\d{3,4})\s*/\s*[가-힣]+\s*/\s*(.+)$", Some(1), Shape, 2, false),
        // 강지연 1601 운암점 //우리밀단팥빵
        MetadataRule::new("double_slash", r"(?s)^[가-힣]+\s+(\d{3,4})\s+[가-힣]+\s*//\s*(.+)$", Some(1), Shape, 2, false),
        // 김수연0662~상무점~오징어2
        MetadataRule::new("tilde", r"(?s)^[가-힣]+(\d{3,4})~[가-힣]+\s*~\s*(.+)$", Some(1), Shape, 2, false),
        // 김수연.0662상무점.오징어2
        MetadataRule::new("dot", r"(?s)^[가-힣]+\.(\d{3,4})[가-힣]+\.(.+)$", Some(1), Shape, 2, false),
        // 이민자상무점3934한우국거리2
        MetadataRule::new("name_branch_digits", r"(?s)^[가-힣]+점(\d{3,4})\s*([,가-힣].*)$", Some(1), Shape, 2, false),
        // 이홍임 상무점2673단팥4
        MetadataRule::new("name_space_branch_digits", r"(?s)^[가-힣]+\s+[가-힣]+점(\d{3,4})\s*(.+)$", Some(1), Shape, 2, false),
        // 남현경 7933 상무점 불고기4
        MetadataRule::new("space_branch", r"(?s)^[가-힣]+\s+(\d{3,4})\s+[가-힣]+점\s+(.+)$", Some(1), Shape, 2, true),
        // 소성남1234 봉선점 배추김치 4키로
        MetadataRule::new("name_digits_branch", r"(?s)^[가-힣]{2,4}\s*(\d{4})\s*[가-힣]+점\s+(.+)$", Some(1), Shape, 2, false),
        // 최선미 3397 자반2, 꽃게1
        MetadataRule::new("space_digits", r"(?s)^[가-힣]+\s+(\d{3,4})\s+(.+)$", Some(1), PhoneLike, 2, true),
        // 김수연 0662상무점 오징어2
        MetadataRule::new("space_digits_attached", r"(?s)^[가-힣]+\s+(\d{3,4})([가-힣].*)$", Some(1), PhoneLike, 2, false),
        // 이영옥7219 상무점 배1봉
        MetadataRule::new("name_digits", r"(?s)^[가-힣]{2,4}(\d{4})\s+(.+)$", Some(1), PhoneLike, 2, false),
        // 소성남 봉선점 배추김치 4키로
        MetadataRule::new("name_branch", r"(?s)^[가-힣]{3,4}\s+[가-힣]{1,5}점\s+(.+)$", None, Shape, 1, true),
    ]
});

/// Strips a leading "name / phone-like digits / branch" segment from a comment.
///
/// Rules are tried in priority order and the first that fires wins; a branch
/// token left at the start of the remainder is removed as well. Text without a
/// recognizable metadata prefix is returned unchanged.
///
/// ```
/// use ordermatch::normalize::strip_customer_metadata;
///
/// assert_eq!(strip_customer_metadata("김혜선/0089/봉선점/국거리1"), "국거리1");
/// assert_eq!(strip_customer_metadata("남현경 7933 상무점 불고기4"), "불고기4");
/// assert_eq!(strip_customer_metadata("사과 100개"), "사과 100개");
/// ```
pub fn strip_customer_metadata(text: &str) -> String {
    let trimmed = text.trim();

    for rule in METADATA_RULES.iter() {
        if let Some(rest) = rule.apply(trimmed) {
            log::debug!("metadata rule '{}' stripped prefix of {:?}", rule.name, trimmed);
            let rest = RE_LEADING_COMMA.replace(rest, "");
            let rest = match RE_LEADING_BRANCH.captures(&rest) {
                Some(caps) if RE_HANGUL_WORD.is_match(&caps[1]) => caps[1].to_string(),
                _ => rest.into_owned(),
            };
            return rest.trim().to_string();
        }
    }

    trimmed.to_string()
}

// ============================================================================
// Endings and Tokens
// ============================================================================

static RE_ORDER_ENDING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:\s*(?:부탁드립니다|부탁드려요|부탁해요|해주세요|주세요|입니다|이에요|예요|에요|이요|해줘|해요|줘요|줘|요|욧|여|[.!?~^]))+$",
    )
    .unwrap()
});

/// Removes politeness endings and trailing punctuation ("2박스 주세요!" → "2박스").
pub fn strip_order_endings(text: &str) -> String {
    RE_ORDER_ENDING.replace(text.trim(), "").trim().to_string()
}

/// Returns the last non-empty line of a comment.
pub fn last_line(text: &str) -> &str {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
}

/// Usage keywords that name a cut or dish rather than a product.
pub const USAGE_KEYWORDS: &[&str] = &[
    "찌개용",
    "제육용",
    "불고기용",
    "국거리",
    "구이용",
    "스테이크용",
    "샤브용",
];

static RE_NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w가-힣]+").unwrap());

static RE_NUMBER_UNIT_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)(상자|박스|통|팩|봉지|봉|개|알|키로|kg|g|판|세트)$").unwrap()
});

static RE_KOREAN_UNIT_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(반|한|두|세|네|다섯)(상자|박스|통|팩|봉지|봉|개|세트)$").unwrap()
});

static RE_NAME_NUMBER_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([가-힣]+)(\d+)$").unwrap());

/// Tokenizes text for overlap scoring.
///
/// Splits on non-word characters, then splits number+unit ("2박스" → "2", "박스"),
/// Korean quantity+unit ("반박스" → "반", "박스"), usage-keyword suffixes
/// ("돼지찌개용1" → "돼지", "찌개용", "1") and name+number ("사과2" → "사과", "2").
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let cleaned = RE_NON_WORD.replace_all(&lower, " ");
    let mut tokens = Vec::new();

    for word in cleaned.split_whitespace() {
        if let Some(caps) = RE_NUMBER_UNIT_WORD
            .captures(word)
            .or_else(|| RE_KOREAN_UNIT_WORD.captures(word))
        {
            tokens.push(caps[1].to_string());
            tokens.push(caps[2].to_string());
            continue;
        }
        if let Some(parts) = split_usage_word(word) {
            tokens.extend(parts);
            continue;
        }
        if let Some(caps) = RE_NAME_NUMBER_WORD.captures(word) {
            tokens.push(caps[1].to_string());
            tokens.push(caps[2].to_string());
            continue;
        }
        tokens.push(word.to_string());
    }

    tokens
}

fn split_usage_word(word: &str) -> Option<Vec<String>> {
    for usage in USAGE_KEYWORDS {
        let Some(idx) = word.find(usage) else {
            continue;
        };
        let base = &word[..idx];
        let tail = &word[idx + usage.len()..];
        if base.is_empty() || !tail.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let mut parts = vec![base.to_string(), usage.to_string()];
        if !tail.is_empty() {
            parts.push(tail.to_string());
        }
        return Some(parts);
    }
    None
}

/// Every two-character window of a word ("새송이" → ["새송", "송이"]).
pub fn syllable_bigrams(word: &str) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars.windows(2).map(|w| w.iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_user_reference_removal() {
        let input = "<band:refer user_key=\"abc\">홍길동</band:refer> 2개요";
        assert_eq!(normalize(input), "2개요");
    }

    #[test]
    fn test_markup_tag_removal() {
        assert_eq!(normalize("<b>사과</b> 3"), "사과 3");
    }

    #[test]
    fn test_fullwidth_normalization() {
        assert_eq!(normalize("２박스"), "2박스");
    }

    #[test]
    fn test_whitespace_and_punctuation_collapse() {
        assert_eq!(stage2_collapse("  사과   2개!!!  "), "사과 2개!");
        assert_eq!(stage2_collapse("배추\n\n\n  무 1"), "배추\n무 1");
    }

    #[test]
    fn test_laughter_removal() {
        assert_eq!(normalize("ㅋㅋㅋ 2개요 ㅎㅎ"), "2개요");
    }

    #[test]
    fn test_lookalike_one() {
        assert_eq!(normalize("ㅣ대"), "1대");
        assert_eq!(normalize("l개"), "1개");
        assert_eq!(normalize("I 팩"), "1 팩");
        assert_eq!(normalize("|"), "1");
    }

    #[test]
    fn test_lookalike_preserves_words() {
        assert_eq!(normalize("large 사이즈"), "large 사이즈");
        assert_eq!(normalize("사과2 | 배3"), "사과2 | 배3");
        assert_eq!(normalize("box"), "box");
    }

    #[test]
    fn test_lookalike_zero() {
        assert_eq!(normalize("1o개"), "10개");
        assert_eq!(normalize("2oo"), "200");
    }

    #[test]
    fn test_korean_numeral_expansion() {
        assert_eq!(normalize("한팩"), "1팩");
        assert_eq!(normalize("두 박스요"), "2 박스요");
        assert_eq!(normalize("세세트"), "3세트");
        assert_eq!(normalize("다섯봉지"), "5봉지");
        assert_eq!(normalize("하나요"), "1요");
    }

    #[test]
    fn test_korean_numeral_protects_words() {
        assert_eq!(normalize("한우 불고기"), "한우 불고기");
        assert_eq!(normalize("두부"), "두부");
        assert_eq!(normalize("열무김치"), "열무김치");
    }

    #[test]
    fn test_set_typo_correction() {
        assert_eq!(normalize("1셋트"), "1세트");
        assert_eq!(normalize("2쎄트"), "2세트");
        assert_eq!(normalize("세뜨"), "세트");
        assert_eq!(normalize("2셋"), "2세트");
        assert_eq!(normalize("한셋"), "1세트");
        assert_eq!(normalize("세트트트"), "세트");
    }

    #[test]
    fn test_normalize_idempotent_examples() {
        let samples = [
            "ㅣ대요~~",
            "1o2o개",
            "l1l",
            "한두개",
            "셋트트 두셋",
            "<band:refer>김</band:refer>   I  개 ",
            "김혜선/0089/봉선점/국거리1",
            "사과2 | 배3\n\n\n무 1",
        ];
        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_normalize_idempotent_randomized() {
        const ALPHABET: &[&str] = &[
            "한", "두", "세", "셋", "트", "뜨", "팩", "개", "박스", "l", "I", "o", "|", "ㅣ", "1",
            "0", "5", " ", "\n", "!", "~", "사과", "요", "<b>", "</b>", "ㅋ",
        ];
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let len = rng.gen_range(1..12);
            let sample: String = (0..len)
                .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())])
                .collect();
            let once = normalize(&sample);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_minimal_options_skip_substitutions() {
        let text = normalize_with("한팩  ㅣ개", &NormalizeOptions::minimal());
        assert_eq!(text, "한팩 ㅣ개");
    }

    #[test]
    fn test_phone_like_rule() {
        assert!(is_phone_like("1234"));
        assert!(is_phone_like("010"));
        assert!(!is_phone_like("100"));
        assert!(!is_phone_like("12"));
    }

    #[test]
    fn test_parse_quantity_refuses_phone_like() {
        assert_eq!(parse_quantity("3"), Some(3));
        assert_eq!(parse_quantity("0"), None);
        assert_eq!(parse_quantity("0662"), None);
        assert_eq!(parse_quantity("7933"), None);
        assert_eq!(parse_quantity("050"), None);
    }

    #[test]
    fn test_quantity_tokens() {
        assert_eq!(quantity_tokens("사과2 배 3 010-1234-5678"), vec![2, 3]);
        assert_eq!(count_numeric_tokens("김철수 7933 사과2"), 1);
    }

    #[test]
    fn test_strip_metadata_rules() {
        assert_eq!(strip_customer_metadata("김혜선/0089/봉선점/국거리1돼지앞다리1"), "국거리1돼지앞다리1");
        assert_eq!(strip_customer_metadata("강지연 1601 운암점 //우리밀단팥빵 우리밀모닝빵"), "우리밀단팥빵 우리밀모닝빵");
        assert_eq!(strip_customer_metadata("이민자상무점3934한우국거리2,한우불고기2"), "한우국거리2,한우불고기2");
        assert_eq!(strip_customer_metadata("최선미 3397 자반2, 꽃게1"), "자반2, 꽃게1");
        assert_eq!(strip_customer_metadata("김수연 0662상무점 오징어2"), "오징어2");
        assert_eq!(strip_customer_metadata("이영옥7219 상무점 배1봉"), "배1봉");
        assert_eq!(strip_customer_metadata("소성남 봉선점 배추김치 4키로"), "배추김치 4키로");
    }

    #[test]
    fn test_strip_metadata_keeps_orders() {
        assert_eq!(strip_customer_metadata("안심2 봉선점"), "안심2 봉선점");
        assert_eq!(strip_customer_metadata("사과 100개"), "사과 100개");
        assert_eq!(strip_customer_metadata("2박스"), "2박스");
    }

    #[test]
    fn test_strip_order_endings() {
        assert_eq!(strip_order_endings("2박스 주세요!"), "2박스");
        assert_eq!(strip_order_endings("3개요"), "3개");
        assert_eq!(strip_order_endings("반박스 부탁드려요~"), "반박스");
    }

    #[test]
    fn test_tokenize_splits() {
        assert_eq!(tokenize("사과2 2박스"), vec!["사과", "2", "2", "박스"]);
        assert_eq!(tokenize("돼지찌개용1"), vec!["돼지", "찌개용", "1"]);
        assert_eq!(tokenize("반박스, 한통!"), vec!["반", "박스", "한", "통"]);
    }

    #[test]
    fn test_syllable_bigrams() {
        assert_eq!(syllable_bigrams("새송이"), vec!["새송", "송이"]);
        assert!(syllable_bigrams("무").is_empty());
    }
}
