//! Product catalog of one post.

use super::Product;
use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// The products of a single post, keyed by identifier in listing order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: IndexMap<u32, Product>,
}

/// Accepted JSON shapes for a catalog file.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    List(Vec<Product>),
    Wrapped { products: Vec<Product> },
}

impl Catalog {
    /// Builds a catalog, validating identifiers and prices.
    ///
    /// # Example
    ///
    /// ```
    /// use ordermatch::{Catalog, Product};
    ///
    /// let catalog = Catalog::new(vec![
    ///     Product::new(1, "복숭아 반박스").with_base_price(12900.0),
    ///     Product::new(2, "복숭아 1박스").with_base_price(23900.0),
    /// ])?;
    /// assert_eq!(catalog.len(), 2);
    /// # Ok::<(), ordermatch::Error>(())
    /// ```
    pub fn new(products: Vec<Product>) -> Result<Self> {
        let mut map = IndexMap::with_capacity(products.len());

        for product in products {
            validate_product(&product)?;
            if map.contains_key(&product.id) {
                return Err(Error::DuplicateProduct(product.id));
            }
            map.insert(product.id, product);
        }

        Ok(Self { products: map })
    }

    /// Parses a catalog from JSON: either an array of products or `{ "products": [...] }`.
    pub fn from_json(json: &str) -> Result<Self> {
        let products = match serde_json::from_str::<CatalogFile>(json)? {
            CatalogFile::List(products) => products,
            CatalogFile::Wrapped { products } => products,
        };
        Self::new(products)
    }

    /// Loads a catalog from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Number of products.
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Returns true if the catalog holds no products.
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Looks up a product by identifier.
    pub fn get(&self, id: u32) -> Option<&Product> {
        self.products.get(&id)
    }

    /// Returns true if a product with this identifier exists.
    pub fn contains(&self, id: u32) -> bool {
        self.products.contains_key(&id)
    }

    /// Products in listing order.
    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }

    /// The first listed product.
    pub fn first(&self) -> Option<&Product> {
        self.products.values().next()
    }

    /// The sole product of a single-product catalog.
    pub fn single(&self) -> Option<&Product> {
        if self.products.len() == 1 {
            self.first()
        } else {
            None
        }
    }

    /// Content fingerprint used as the catalog's cache identity.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.products.len().hash(&mut hasher);
        for product in self.products.values() {
            product.id.hash(&mut hasher);
            product.title.hash(&mut hasher);
            product.unit.hash(&mut hasher);
            product.variant.hash(&mut hasher);
            product.base_price.map(f64::to_bits).hash(&mut hasher);
            for tier in &product.tiers {
                tier.quantity.hash(&mut hasher);
                tier.price.to_bits().hash(&mut hasher);
                tier.description.hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}

impl Serialize for Catalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.products.values())
    }
}

fn validate_product(product: &Product) -> Result<()> {
    for tier in &product.tiers {
        if tier.quantity == 0 {
            return Err(Error::InvalidTier {
                product: product.id,
                message: "tier quantity must be positive".into(),
            });
        }
        if !tier.price.is_finite() || tier.price < 0.0 {
            return Err(Error::InvalidTier {
                product: product.id,
                message: format!("tier price {} is not a non-negative amount", tier.price),
            });
        }
    }

    if let Some(base) = product.base_price {
        if !base.is_finite() || base < 0.0 {
            return Err(Error::InvalidCatalog(format!(
                "product {} has invalid base price {}",
                product.id, base
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peaches() -> Vec<Product> {
        vec![
            Product::new(1, "복숭아 반박스").with_base_price(12900.0),
            Product::new(2, "복숭아 1박스").with_base_price(23900.0),
        ]
    }

    #[test]
    fn test_catalog_preserves_order() {
        let catalog = Catalog::new(peaches()).unwrap();
        let ids: Vec<u32> = catalog.products().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(catalog.single().is_none());
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let mut products = peaches();
        products.push(Product::new(1, "복숭아 2박스"));
        assert!(matches!(
            Catalog::new(products),
            Err(Error::DuplicateProduct(1))
        ));
    }

    #[test]
    fn test_rejects_zero_quantity_tier() {
        let products = vec![Product::new(1, "감자").with_tier(0, 3000.0)];
        assert!(matches!(
            Catalog::new(products),
            Err(Error::InvalidTier { product: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_negative_prices() {
        let products = vec![Product::new(1, "감자").with_tier(1, -100.0)];
        assert!(Catalog::new(products).is_err());

        let products = vec![Product::new(1, "감자").with_base_price(-1.0)];
        assert!(matches!(
            Catalog::new(products),
            Err(Error::InvalidCatalog(_))
        ));
    }

    #[test]
    fn test_from_json_shapes() {
        let list = r#"[{ "id": 1, "title": "사과", "base_price": 5000 }]"#;
        let wrapped = r#"{ "products": [{ "id": 1, "title": "사과", "base_price": 5000 }] }"#;
        let a = Catalog::from_json(list).unwrap();
        let b = Catalog::from_json(wrapped).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.single().map(|p| p.title.as_str()), Some("사과"));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = Catalog::new(peaches()).unwrap();
        let mut changed = peaches();
        changed[1].base_price = Some(24900.0);
        let b = Catalog::new(changed).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), Catalog::new(peaches()).unwrap().fingerprint());
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, r#"[{ "id": 7, "title": "대파 1단", "base_price": 2500 }]"#).unwrap();
        let catalog = Catalog::from_path(&path).unwrap();
        assert!(catalog.contains(7));
    }
}
