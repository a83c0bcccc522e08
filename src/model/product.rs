//! Product and price tier definitions.

use serde::{Deserialize, Serialize};

/// Structural relationship among the products of one post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternType {
    /// A single product; every number is a quantity of it.
    SingleProduct,
    /// One product sold in several pack counts ("1봉", "2봉", "3봉").
    QuantityVariant,
    /// One product sold in several sizes ("대", "중", "3kg", "5kg").
    SizeVariant,
    /// Box-packaged products, typically half and full boxes.
    BoxProducts,
    /// Unrelated products in one post.
    MixedProducts,
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternType::SingleProduct => write!(f, "SINGLE_PRODUCT"),
            PatternType::QuantityVariant => write!(f, "QUANTITY_VARIANT"),
            PatternType::SizeVariant => write!(f, "SIZE_VARIANT"),
            PatternType::BoxProducts => write!(f, "BOX_PRODUCTS"),
            PatternType::MixedProducts => write!(f, "MIXED_PRODUCTS"),
        }
    }
}

/// A (quantity, price) pairing. The price is the total for `quantity` units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTier {
    /// Number of units this tier sells
    pub quantity: u32,
    /// Total price for `quantity` units
    pub price: f64,
    /// Seller's description ("2봉 묶음", "반박스")
    #[serde(default)]
    pub description: String,
}

impl PriceTier {
    /// Creates a tier without a description.
    pub fn new(quantity: u32, price: f64) -> Self {
        Self {
            quantity,
            price,
            description: String::new(),
        }
    }

    /// Creates a tier with a description.
    pub fn described(quantity: u32, price: f64, description: impl Into<String>) -> Self {
        Self {
            quantity,
            price,
            description: description.into(),
        }
    }

    /// Returns true if the tier can take part in pricing.
    pub fn is_valid(&self) -> bool {
        self.quantity > 0 && self.price.is_finite() && self.price >= 0.0
    }

    /// Price of one unit within this tier.
    pub fn per_unit(&self) -> f64 {
        if self.quantity == 0 {
            return f64::INFINITY;
        }
        self.price / self.quantity as f64
    }
}

/// A product listed in a group-buy post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Identifier, stable within one post (customers refer to it as "N번")
    pub id: u32,
    /// Display title
    pub title: String,
    /// Price tiers in seller order
    #[serde(default, alias = "price_options")]
    pub tiers: Vec<PriceTier>,
    /// Base price of one unit
    #[serde(default)]
    pub base_price: Option<f64>,
    /// Quantity unit label ("봉지", "박스")
    #[serde(default)]
    pub unit: Option<String>,
    /// Seller-assigned pattern tag
    #[serde(default)]
    pub variant: Option<PatternType>,
    /// Extra search keywords
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Product {
    /// Creates a product with no price information.
    pub fn new(id: u32, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            tiers: Vec::new(),
            base_price: None,
            unit: None,
            variant: None,
            keywords: Vec::new(),
        }
    }

    /// Sets the base price.
    pub fn with_base_price(mut self, price: f64) -> Self {
        self.base_price = Some(price);
        self
    }

    /// Appends a price tier.
    pub fn with_tier(mut self, quantity: u32, price: f64) -> Self {
        self.tiers.push(PriceTier::new(quantity, price));
        self
    }

    /// Appends a described price tier.
    pub fn with_described_tier(
        mut self,
        quantity: u32,
        price: f64,
        description: impl Into<String>,
    ) -> Self {
        self.tiers
            .push(PriceTier::described(quantity, price, description));
        self
    }

    /// Sets the quantity unit label.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Sets the seller-assigned pattern tag.
    pub fn with_variant(mut self, variant: PatternType) -> Self {
        self.variant = Some(variant);
        self
    }

    /// Sets the keyword list.
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Tiers usable for pricing.
    pub fn valid_tiers(&self) -> impl Iterator<Item = &PriceTier> {
        self.tiers.iter().filter(|t| t.is_valid())
    }

    /// Resolves the price of one unit: base price first, then the first valid tier.
    pub fn unit_price(&self) -> Option<f64> {
        if let Some(base) = self.base_price.filter(|p| p.is_finite() && *p > 0.0) {
            return Some(base);
        }
        self.valid_tiers()
            .next()
            .map(PriceTier::per_unit)
            .filter(|p| *p > 0.0)
    }

    /// Returns true if some price source resolves to a positive amount.
    pub fn is_matchable(&self) -> bool {
        self.unit_price().is_some()
    }

    /// Linear price of `quantity` units at the unit price.
    pub fn linear_price(&self, quantity: u32) -> f64 {
        self.unit_price().unwrap_or(0.0) * quantity as f64
    }
}
