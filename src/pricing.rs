//! Least-cost tier pricing.
//!
//! A product may be sold in several tiers ("1봉 3,500원", "3봉 9,900원"). For a
//! requested quantity the calculator prefers, in order:
//!
//! 1. A tier whose description overlaps the comment ("반통 주세요" → "반통" tier)
//! 2. A tier whose quantity equals the request
//! 3. The cheapest unbounded combination of tiers, found bottom-up
//! 4. Linear pricing on the cheapest per-unit tier when no combination reaches the request
//!
//! Tier prices are totals for the tier's quantity. A base price acts as an
//! implicit single-unit tier.

use crate::model::{Catalog, PriceTier, Product};
use crate::options::MatchOptions;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Why a price was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceReason {
    /// The comment named a tier
    CommentOption,
    /// A tier sells exactly the requested quantity
    ExactTier,
    /// Cheapest tier combination
    Optimal,
    /// Cheapest per-unit tier applied linearly
    Linear,
}

/// One tier used in a priced combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierUse {
    /// Units per use of the tier
    pub quantity: u32,
    /// Price per use of the tier
    pub price: f64,
    /// How many times the tier is used
    pub count: u32,
    /// Tier description
    pub description: String,
}

/// A priced order for one product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceOption {
    /// Product identifier
    pub product_id: u32,
    /// Ordered quantity
    pub quantity: u32,
    /// Total price
    pub total_price: f64,
    /// Effective price of one unit
    pub unit_price: f64,
    /// Tiers used
    pub breakdown: Vec<TierUse>,
    /// Why this price was chosen
    pub reason: PriceReason,
}

/// Tier optimizer with the configured quantity cap.
#[derive(Debug, Clone)]
pub struct PriceCalculator {
    max_quantity: u32,
    overlap_threshold: f64,
}

impl Default for PriceCalculator {
    fn default() -> Self {
        Self::new(&MatchOptions::default())
    }
}

impl PriceCalculator {
    /// Creates a calculator from matching options.
    pub fn new(options: &MatchOptions) -> Self {
        Self {
            max_quantity: options.max_dp_quantity.max(1),
            overlap_threshold: options.tier_overlap_threshold,
        }
    }

    /// Cheapest option across every product of the catalog.
    pub fn best_option(
        &self,
        quantity: u32,
        catalog: &Catalog,
        comment: Option<&str>,
    ) -> Option<PriceOption> {
        if quantity == 0 {
            return None;
        }
        let mut best: Option<PriceOption> = None;
        for product in catalog.products() {
            if let Some(option) = self.best_for_product(quantity, product, comment) {
                if best
                    .as_ref()
                    .map_or(true, |b| option.total_price < b.total_price)
                {
                    best = Some(option);
                }
            }
        }
        best
    }

    /// Cheapest option for one product.
    pub fn best_for_product(
        &self,
        quantity: u32,
        product: &Product,
        comment: Option<&str>,
    ) -> Option<PriceOption> {
        if quantity == 0 {
            return None;
        }
        let tiers = pricing_tiers(product);
        if tiers.is_empty() {
            return None;
        }

        if let Some(comment) = comment {
            if let Some(tier) = self.tier_named_in(comment, &tiers) {
                log::debug!(
                    "product {}: comment names tier '{}'",
                    product.id,
                    tier.description
                );
                let total = if tier.quantity == quantity {
                    tier.price
                } else {
                    tier.per_unit() * quantity as f64
                };
                let uses = vec![TierUse::from_tier(tier, quantity.div_ceil(tier.quantity))];
                return Some(PriceOption::new(
                    product,
                    quantity,
                    total,
                    uses,
                    PriceReason::CommentOption,
                ));
            }
        }

        if let Some(tier) = tiers.iter().find(|t| t.quantity == quantity) {
            return Some(PriceOption::new(
                product,
                quantity,
                tier.price,
                vec![TierUse::from_tier(tier, 1)],
                PriceReason::ExactTier,
            ));
        }

        if quantity <= self.max_quantity {
            if let Some((total, uses)) = optimal_combination(quantity, &tiers) {
                return Some(PriceOption::new(
                    product,
                    quantity,
                    total,
                    uses,
                    PriceReason::Optimal,
                ));
            }
        } else {
            log::debug!(
                "product {}: quantity {} above optimizer cap {}",
                product.id,
                quantity,
                self.max_quantity
            );
        }

        let cheapest = tiers
            .iter()
            .min_by(|a, b| a.per_unit().total_cmp(&b.per_unit()))?;
        Some(PriceOption::new(
            product,
            quantity,
            cheapest.per_unit() * quantity as f64,
            vec![TierUse::from_tier(cheapest, quantity.div_ceil(cheapest.quantity))],
            PriceReason::Linear,
        ))
    }

    /// The tier whose description best overlaps the comment, if the overlap is significant.
    fn tier_named_in<'a>(&self, comment: &str, tiers: &'a [PriceTier]) -> Option<&'a PriceTier> {
        let comment_tokens: Vec<String> = description_tokens(comment)
            .into_iter()
            .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
            .collect();
        if comment_tokens.is_empty() {
            return None;
        }

        let mut best: Option<(&PriceTier, usize)> = None;
        for tier in tiers {
            let tier_tokens = description_tokens(&tier.description);
            if tier_tokens.is_empty() {
                continue;
            }
            let hits = comment_tokens
                .iter()
                .filter(|c| {
                    tier_tokens
                        .iter()
                        .any(|t| t.contains(c.as_str()) || c.contains(t.as_str()))
                })
                .count();
            if hits > 0 && best.map_or(true, |(_, h)| hits > h) {
                best = Some((tier, hits));
            }
        }

        let (tier, hits) = best?;
        let overlap = hits as f64 / comment_tokens.len() as f64;
        (overlap >= self.overlap_threshold).then_some(tier)
    }
}

impl TierUse {
    fn from_tier(tier: &PriceTier, count: u32) -> Self {
        Self {
            quantity: tier.quantity,
            price: tier.price,
            count,
            description: tier.description.clone(),
        }
    }
}

impl PriceOption {
    fn new(
        product: &Product,
        quantity: u32,
        total_price: f64,
        breakdown: Vec<TierUse>,
        reason: PriceReason,
    ) -> Self {
        Self {
            product_id: product.id,
            quantity,
            total_price,
            unit_price: total_price / quantity as f64,
            breakdown,
            reason,
        }
    }
}

/// Valid tiers plus the base price as an implicit single-unit tier.
fn pricing_tiers(product: &Product) -> Vec<PriceTier> {
    let mut tiers: Vec<PriceTier> = product.valid_tiers().cloned().collect();
    if let Some(base) = product.base_price.filter(|p| p.is_finite() && *p > 0.0) {
        if !tiers.iter().any(|t| t.quantity == 1 && t.price <= base) {
            tiers.push(PriceTier::new(1, base));
        }
    }
    tiers
}

/// Unbounded least-cost combination reaching exactly `quantity`.
fn optimal_combination(quantity: u32, tiers: &[PriceTier]) -> Option<(f64, Vec<TierUse>)> {
    let target = quantity as usize;
    let mut cost = vec![f64::INFINITY; target + 1];
    let mut choice: Vec<Option<usize>> = vec![None; target + 1];
    cost[0] = 0.0;

    for q in 1..=target {
        for (idx, tier) in tiers.iter().enumerate() {
            let size = tier.quantity as usize;
            if size > q || !cost[q - size].is_finite() {
                continue;
            }
            let candidate = cost[q - size] + tier.price;
            if candidate < cost[q] {
                cost[q] = candidate;
                choice[q] = Some(idx);
            }
        }
    }

    if !cost[target].is_finite() {
        return None;
    }

    let mut counts = vec![0u32; tiers.len()];
    let mut q = target;
    while q > 0 {
        let idx = choice[q]?;
        counts[idx] += 1;
        q -= tiers[idx].quantity as usize;
    }

    let uses = tiers
        .iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .map(|(tier, count)| TierUse::from_tier(tier, count))
        .collect();
    Some((cost[target], uses))
}

static RE_NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w가-힣]+").unwrap());

static RE_DIGIT_HANGUL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)([가-힣]+)").unwrap());

static RE_HANGUL_DIGIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([가-힣]+)(\d+)").unwrap());

fn description_tokens(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let spaced = RE_NON_WORD.replace_all(&lower, " ");
    let spaced = RE_DIGIT_HANGUL.replace_all(&spaced, "$1 $2");
    let spaced = RE_HANGUL_DIGIT.replace_all(&spaced, "$1 $2");
    spaced.split_whitespace().map(str::to_string).collect()
}

/// Cheapest option across a catalog with default options.
pub fn best_option(quantity: u32, catalog: &Catalog, comment: Option<&str>) -> Option<PriceOption> {
    PriceCalculator::default().best_option(quantity, catalog, comment)
}

/// Cheapest option for one product with default options.
pub fn best_for_product(
    quantity: u32,
    product: &Product,
    comment: Option<&str>,
) -> Option<PriceOption> {
    PriceCalculator::default().best_for_product(quantity, product, comment)
}
