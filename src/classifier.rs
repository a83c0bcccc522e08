//! Catalog pattern classification.
//!
//! A post's products are classified once into a [`PatternType`]; the
//! orchestrator picks its matcher priority from the result. Classifying a
//! catalog is cheap, but matching a whole comment thread re-uses one catalog
//! hundreds of times, so [`PatternCache`] keeps results keyed by the catalog
//! fingerprint.

use crate::model::{Catalog, PatternType};
use crate::units::{alternation, has_box_keyword, SIZE_WORDS, TITLE_UNIT_WORDS};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};

/// The classification of one catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogPattern {
    /// Pattern type
    pub pattern_type: PatternType,
    /// Dominant unit label ("봉", "박스", "개")
    pub unit: String,
    /// Informational confidence
    pub confidence: f64,
    /// Whether bare numbers in comments read as quantities
    pub numbers_mean_quantity: bool,
    /// Whether the price optimizer should pick tiers
    pub use_optimal_price: bool,
}

impl CatalogPattern {
    fn new(pattern_type: PatternType, unit: impl Into<String>, confidence: f64) -> Self {
        let quantity_like = matches!(
            pattern_type,
            PatternType::SingleProduct | PatternType::QuantityVariant
        );
        Self {
            pattern_type,
            unit: unit.into(),
            confidence,
            numbers_mean_quantity: quantity_like,
            use_optimal_price: quantity_like,
        }
    }
}

// ============================================================================
// Classification
// ============================================================================

static RE_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

static RE_TITLE_UNIT_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&alternation(TITLE_UNIT_WORDS)).unwrap());

static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static RE_COMPOSITE_SET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)세트\s*(\d+)봉지").unwrap());

static RE_COUNT_UNIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)([가-힣]+)").unwrap());

/// Title with digits and size/unit words removed.
pub fn base_name(title: &str) -> String {
    let lower = title.to_lowercase();
    let without_digits = RE_DIGITS.replace_all(&lower, "");
    let without_units = RE_TITLE_UNIT_WORDS.replace_all(&without_digits, "");
    RE_WHITESPACE
        .replace_all(&without_units, " ")
        .trim()
        .to_string()
}

/// Classifies a catalog.
///
/// # Example
///
/// ```
/// use ordermatch::{classify, Catalog, PatternType, Product};
///
/// let catalog = Catalog::new(vec![
///     Product::new(1, "햇감자 1봉").with_base_price(3000.0),
///     Product::new(2, "햇감자 3봉").with_base_price(8000.0),
/// ])?;
/// assert_eq!(classify(&catalog).pattern_type, PatternType::QuantityVariant);
/// # Ok::<(), ordermatch::Error>(())
/// ```
pub fn classify(catalog: &Catalog) -> CatalogPattern {
    let titles: Vec<&str> = catalog.products().map(|p| p.title.as_str()).collect();

    if titles.len() <= 1 {
        let unit = catalog.products().next().map_or("개".to_string(), |p| {
            p.unit
                .clone()
                .unwrap_or_else(|| dominant_unit(&p.title))
        });
        return CatalogPattern::new(PatternType::SingleProduct, unit, 1.0);
    }

    let first_base = base_name(titles[0]);
    if titles.iter().skip(1).any(|t| base_name(t) != first_base) {
        log::debug!("catalog classified as mixed products");
        return CatalogPattern::new(PatternType::MixedProducts, "mixed", 0.8);
    }

    if titles.iter().any(|t| has_box_keyword(t)) {
        log::debug!("catalog '{}' classified as box products", first_base);
        return CatalogPattern::new(PatternType::BoxProducts, "박스", 0.95);
    }

    if let Some(unit) = shared_varying_unit(&titles) {
        log::debug!(
            "catalog '{}' classified as quantity variant (unit {})",
            first_base,
            unit
        );
        return CatalogPattern::new(PatternType::QuantityVariant, unit, 0.95);
    }

    let has_size_word = titles.iter().any(|t| {
        let lower = t.to_lowercase();
        SIZE_WORDS.iter().any(|w| lower.contains(w))
    });
    let confidence = if has_size_word { 0.9 } else { 0.85 };
    CatalogPattern::new(PatternType::SizeVariant, "mixed", confidence)
}

/// Returns the packaging unit every title shares, provided its counts vary.
fn shared_varying_unit(titles: &[&str]) -> Option<String> {
    let mut units: IndexMap<String, Vec<u32>> = IndexMap::new();

    for title in titles {
        let composite: Vec<u32> = RE_COMPOSITE_SET
            .captures_iter(title)
            .filter_map(|caps| caps[1].parse().ok())
            .collect();
        if !composite.is_empty() {
            units.entry("세트".to_string()).or_default().extend(composite);
            continue;
        }

        for caps in RE_COUNT_UNIT.captures_iter(title) {
            let unit = &caps[2];
            if unit == "월" || unit == "일" || unit.contains("박스") || unit.contains('반') {
                continue;
            }
            if let Ok(count) = caps[1].parse::<u32>() {
                units.entry(unit.to_string()).or_default().push(count);
            }
        }
    }

    if units.len() != 1 {
        return None;
    }
    let (unit, counts) = units.into_iter().next()?;
    let first = counts.first().copied();
    counts
        .iter()
        .any(|c| Some(*c) != first)
        .then_some(unit)
}

static RE_FIRST_UNIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+([가-힣]+)").unwrap());

/// Dominant unit of a title: the first `\d+<hangul>` unit, else a keyword unit, else "개".
pub fn dominant_unit(title: &str) -> String {
    let lower = title.to_lowercase();
    if let Some(caps) = RE_FIRST_UNIT.captures(&lower) {
        return caps[1].to_string();
    }
    const KEYWORD_UNITS: &[(&str, &str)] = &[
        ("box", "박스"),
        ("pack", "팩"),
        ("set", "세트"),
        ("kg", "kg"),
        ("bundle", "묶음"),
    ];
    KEYWORD_UNITS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map_or("개".to_string(), |(_, unit)| unit.to_string())
}

/// Returns true if bare numbers should go through quantity-variant handling:
/// the catalog is classified so, or a product is explicitly tagged so.
pub fn is_quantity_catalog(catalog: &Catalog, pattern: &CatalogPattern) -> bool {
    pattern.pattern_type == PatternType::QuantityVariant
        || catalog
            .products()
            .any(|p| p.variant == Some(PatternType::QuantityVariant))
}

// ============================================================================
// Cache
// ============================================================================

/// Classification cache keyed by catalog fingerprint.
///
/// Safe to share across threads; entries are replaced only through
/// [`PatternCache::invalidate`] or [`PatternCache::clear`].
#[derive(Debug, Default)]
pub struct PatternCache {
    entries: RwLock<HashMap<u64, Arc<CatalogPattern>>>,
}

impl PatternCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached classification, classifying on a miss.
    pub fn get_or_classify(&self, catalog: &Catalog) -> Arc<CatalogPattern> {
        let key = catalog.fingerprint();

        if let Ok(entries) = self.entries.read() {
            if let Some(pattern) = entries.get(&key) {
                return Arc::clone(pattern);
            }
        }

        let pattern = Arc::new(classify(catalog));
        match self.entries.write() {
            Ok(mut entries) => Arc::clone(entries.entry(key).or_insert(pattern)),
            Err(_) => pattern,
        }
    }

    /// Drops the entry for one catalog fingerprint.
    pub fn invalidate(&self, fingerprint: u64) -> bool {
        self.entries
            .write()
            .map(|mut entries| entries.remove(&fingerprint).is_some())
            .unwrap_or(false)
    }

    /// Drops every entry.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    /// Number of cached classifications.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
