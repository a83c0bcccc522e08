//! Packaging-unit vocabulary and compatibility tables.
//!
//! Group-buy sellers and customers rarely agree on a unit word: a seller lists
//! "1봉지" and the customer asks for "한봉" or "1개". The tables here decide which
//! unit words may stand in for one another and how composite units
//! ("5알 = 1세트") convert.

use regex::Regex;
use std::sync::LazyLock;

// ============================================================================
// Vocabulary
// ============================================================================

/// Every packaging unit the engine recognizes, longest first so that regex
/// alternations built from it prefer "박스" over "박" and "봉지" over "봉".
pub const PACKAGING_UNITS: &[&str] = &[
    "박스", "상자", "봉지", "세트", "묶음", "송이", "마리", "키로", "킬로", "그램", "토막", "kg",
    "개", "대", "봉", "팩", "통", "병", "박", "포", "셋", "근", "캔", "장", "단", "줄", "알",
    "입", "잔", "쪽", "망", "판", "g",
];

/// Half-box keywords. A half box is its own product bucket.
pub const HALF_BOX_KEYWORDS: &[&str] = &["반박스", "반상자", "반개", "하프박스", "하프상자"];

/// Full-box keywords used when picking the full product of a half/full pair.
pub const FULL_BOX_KEYWORDS: &[&str] = &["박스", "상자", "통", "box"];

/// Keywords that mark a catalog title as box-packaged.
pub const BOX_TITLE_KEYWORDS: &[&str] = &["박스", "상자", "box"];

/// Set keywords.
pub const SET_KEYWORDS: &[&str] = &["세트", "셋", "set"];

/// Counted units (bunch, head, fish, ...).
pub const COUNT_UNITS: &[&str] = &[
    "송이", "마리", "근", "병", "캔", "봉지", "포", "장", "묶음", "단", "줄", "알", "입", "잔",
    "토막", "쪽", "망",
];

/// Size qualifiers that turn an otherwise identical catalog into size variants.
pub const SIZE_WORDS: &[&str] = &[
    "반박스", "하프", "대", "중", "소", "large", "medium", "small", "big", "kg", "키로", "g",
];

/// Words removed from titles when computing a catalog base name.
pub const TITLE_UNIT_WORDS: &[&str] = &[
    "반박스", "박스", "하프", "세트", "마리", "키로", "대", "중", "소", "봉", "개", "팩", "통",
    "알", "병", "줄", "입", "kg", "g",
];

/// Unit-compatibility table: a request in the key unit may be satisfied by a
/// product listed in any of the value units.
const UNIT_COMPATIBILITY: &[(&str, &[&str])] = &[
    ("개", &["개", "대", "봉", "봉지"]),
    ("대", &["개", "대", "봉", "봉지"]),
    ("봉", &["봉", "봉지", "개", "대"]),
    ("봉지", &["봉", "봉지", "개", "대"]),
    ("팩", &["팩", "pack"]),
    ("통", &["통", "tong"]),
    ("병", &["병", "본", "봉"]),
    ("상자", &["상자", "박스", "box", "박"]),
    ("박스", &["박스", "상자", "box", "박"]),
    ("박", &["박스", "상자", "box", "박"]),
    ("box", &["박스", "상자", "box", "박"]),
    ("포", &["포", "봉"]),
    ("묶음", &["묶음", "세트", "set", "셋"]),
    ("세트", &["세트", "묶음", "set", "셋"]),
    ("셋", &["세트", "묶음", "set", "셋"]),
    ("set", &["세트", "묶음", "set", "셋"]),
    ("kg", &["kg", "키로", "킬로"]),
    ("키로", &["kg", "키로", "킬로"]),
    ("킬로", &["kg", "키로", "킬로"]),
    ("g", &["g", "그램"]),
    ("그램", &["g", "그램"]),
];

/// Canonical spelling of each synonym group.
const CANONICAL_UNITS: &[(&str, &[&str])] = &[
    ("박스", &["박스", "상자", "box", "박"]),
    ("세트", &["세트", "셋", "set", "묶음"]),
    ("봉지", &["봉지", "봉"]),
    ("팩", &["팩", "pack"]),
    ("개", &["개", "대"]),
    ("kg", &["kg", "키로", "킬로"]),
    ("g", &["g", "그램"]),
];

// ============================================================================
// Lookups
// ============================================================================

/// Returns the units a request in `unit` is compatible with.
pub fn compatible_units(unit: &str) -> &'static [&'static str] {
    UNIT_COMPATIBILITY
        .iter()
        .find(|(key, _)| *key == unit)
        .map(|(_, units)| *units)
        .unwrap_or(&[])
}

/// Returns true when a request in `requested` can be served by a product sold in `offered`.
pub fn units_compatible(requested: &str, offered: &str) -> bool {
    if requested == offered
        || compatible_units(requested).contains(&offered)
        || compatible_units(offered).contains(&requested)
    {
        return true;
    }
    matches!(
        (canonical_unit(requested), canonical_unit(offered)),
        (Some(a), Some(b)) if a == b
    )
}

/// Returns the canonical spelling of a unit word, if it belongs to a synonym group.
pub fn canonical_unit(unit: &str) -> Option<&'static str> {
    CANONICAL_UNITS
        .iter()
        .find(|(_, members)| members.contains(&unit))
        .map(|(head, _)| *head)
}

/// Returns the packaging unit `text` starts with, preferring the longest word.
pub fn starts_with_unit(text: &str) -> Option<&'static str> {
    PACKAGING_UNITS.iter().copied().find(|unit| text.starts_with(unit))
}

/// Builds a regex alternation (`박스|상자|...`) from a word list, longest first.
pub fn alternation(words: &[&str]) -> String {
    let mut sorted: Vec<&str> = words.to_vec();
    sorted.sort_by_key(|w| std::cmp::Reverse(w.chars().count()));
    sorted
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|")
}

/// Returns true if `title` mentions any box keyword.
pub fn has_box_keyword(title: &str) -> bool {
    let lower = title.to_lowercase();
    BOX_TITLE_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Returns true if `title` names a half box.
pub fn is_half_box(title: &str) -> bool {
    let lower = title.to_lowercase();
    HALF_BOX_KEYWORDS.iter().any(|k| lower.contains(k)) || lower.contains("하프")
}

/// Returns true if `title` names a full box (and not a half box).
pub fn is_full_box(title: &str) -> bool {
    let lower = title.to_lowercase();
    !is_half_box(&lower) && FULL_BOX_KEYWORDS.iter().any(|k| lower.contains(k))
}

// ============================================================================
// Weights
// ============================================================================

static RE_WEIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*(kg|키로|킬로|그램|g)").unwrap());

/// Extracts the first weight expression of `text`, in kilograms.
///
/// ```
/// use ordermatch::units::weight_in_kg;
///
/// assert_eq!(weight_in_kg("고구마 3kg"), Some(3.0));
/// assert_eq!(weight_in_kg("멸치 500g"), Some(0.5));
/// assert_eq!(weight_in_kg("사과 1박스"), None);
/// ```
pub fn weight_in_kg(text: &str) -> Option<f64> {
    let lower = text.to_lowercase();
    let caps = RE_WEIGHT.captures(&lower)?;
    let value: f64 = caps[1].parse().ok()?;
    match &caps[2] {
        "g" | "그램" => Some(value / 1000.0),
        _ => Some(value),
    }
}

static RE_KILO_REQUEST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*(?:kg|키로|킬로)").unwrap());

/// Whole kilograms requested anywhere in a comment ("고구마 4키로" → 4).
pub fn requested_kilos(text: &str) -> Option<u32> {
    let lowered = text.to_lowercase();
    let caps = RE_KILO_REQUEST.captures(&lowered)?;
    caps[1].parse().ok().filter(|&kilos| kilos > 0)
}

/// Number of `title` products that add up to `kilos`, when the title's
/// whole-kilogram weight divides it evenly.
///
/// ```
/// use ordermatch::units::units_for_kilos;
///
/// assert_eq!(units_for_kilos(4, "고구마 2kg"), Some(2));
/// assert_eq!(units_for_kilos(4, "고구마 3kg"), None);
/// assert_eq!(units_for_kilos(2, "멸치 500g"), None);
/// ```
pub fn units_for_kilos(kilos: u32, title: &str) -> Option<u32> {
    let per_unit = weight_in_kg(title)?;
    if per_unit < 1.0 || per_unit.fract() != 0.0 {
        return None;
    }
    let per_unit = per_unit as u32;
    (kilos % per_unit == 0).then_some(kilos / per_unit)
}

// ============================================================================
// Composite units
// ============================================================================

/// A composite unit declared in a product title, e.g. "5알(1세트)".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeRule {
    /// Number of pieces in one sold unit.
    pub pieces_per_set: u32,
    /// The piece unit ("알", "개", "입").
    pub piece_unit: String,
    /// The sold unit ("세트", "팩", ...).
    pub set_unit: String,
}

impl CompositeRule {
    /// Number of sold units needed to cover `pieces` pieces.
    pub fn sets_for(&self, pieces: u32) -> u32 {
        if self.pieces_per_set == 0 {
            return pieces;
        }
        pieces.div_ceil(self.pieces_per_set)
    }
}

static RE_PIECES_THEN_SET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s*(알|개|입)\s*[\(\[]?\s*[=/]?\s*1\s*(세트|팩|박스|봉지|봉)").unwrap()
});

static RE_SET_THEN_PIECES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"1\s*(세트|팩|박스|봉지|봉)\s*[\(\[]?\s*[=/]?\s*(\d+)\s*(알|개|입)").unwrap()
});

static RE_PIECES_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*(알|입)").unwrap());

/// Parses a composite unit rule from a product title.
///
/// Recognizes "5알 1세트", "1세트(5개)" and a bare "5알" (one set of five).
pub fn composite_rule(title: &str) -> Option<CompositeRule> {
    if let Some(caps) = RE_SET_THEN_PIECES.captures(title) {
        return Some(CompositeRule {
            pieces_per_set: caps[2].parse().ok()?,
            piece_unit: caps[3].to_string(),
            set_unit: caps[1].to_string(),
        });
    }
    if let Some(caps) = RE_PIECES_THEN_SET.captures(title) {
        return Some(CompositeRule {
            pieces_per_set: caps[1].parse().ok()?,
            piece_unit: caps[2].to_string(),
            set_unit: caps[3].to_string(),
        });
    }
    let caps = RE_PIECES_ONLY.captures(title)?;
    let pieces: u32 = caps[1].parse().ok()?;
    (pieces > 1).then(|| CompositeRule {
        pieces_per_set: pieces,
        piece_unit: caps[2].to_string(),
        set_unit: "세트".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_compatible() {
        assert!(units_compatible("개", "봉지"));
        assert!(units_compatible("상자", "박스"));
        assert!(units_compatible("set", "세트"));
        assert!(!units_compatible("박스", "개"));
        assert!(units_compatible("pack", "팩"));
        assert!(units_compatible("대", "개"));
    }

    #[test]
    fn test_canonical_unit() {
        assert_eq!(canonical_unit("상자"), Some("박스"));
        assert_eq!(canonical_unit("셋"), Some("세트"));
        assert_eq!(canonical_unit("송이"), None);
    }

    #[test]
    fn test_starts_with_unit_prefers_longest() {
        assert_eq!(starts_with_unit("박스요"), Some("박스"));
        assert_eq!(starts_with_unit("봉지"), Some("봉지"));
        assert_eq!(starts_with_unit("사과"), None);
    }

    #[test]
    fn test_alternation_longest_first() {
        let alt = alternation(&["봉", "봉지"]);
        assert_eq!(alt, "봉지|봉");
    }

    #[test]
    fn test_half_and_full_boxes() {
        assert!(is_half_box("복숭아 반박스"));
        assert!(!is_full_box("복숭아 반박스"));
        assert!(is_full_box("복숭아 1박스"));
        assert!(has_box_keyword("사과 BOX"));
    }

    #[test]
    fn test_requested_kilos_anywhere_in_comment() {
        assert_eq!(requested_kilos("4키로"), Some(4));
        assert_eq!(requested_kilos("고구마 4KG 주세요"), Some(4));
        assert_eq!(requested_kilos("고구마 2개"), None);
        assert_eq!(requested_kilos("0kg"), None);
    }

    #[test]
    fn test_units_for_kilos() {
        assert_eq!(units_for_kilos(6, "고구마 3kg"), Some(2));
        assert_eq!(units_for_kilos(3, "한우 불고기 1kg"), Some(3));
        assert_eq!(units_for_kilos(3, "감자 1.5kg"), None);
        assert_eq!(units_for_kilos(3, "사과 1박스"), None);
    }

    #[test]
    fn test_composite_rules() {
        let rule = composite_rule("황도 복숭아 5알").unwrap();
        assert_eq!(rule.pieces_per_set, 5);
        assert_eq!(rule.sets_for(6), 2);
        assert_eq!(rule.sets_for(5), 1);

        let rule = composite_rule("계란 1세트(30개)").unwrap();
        assert_eq!(rule.pieces_per_set, 30);
        assert_eq!(rule.set_unit, "세트");

        assert!(composite_rule("사과 1박스").is_none());
    }
}
