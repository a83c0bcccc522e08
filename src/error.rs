//! Error types for ordermatch library.

use std::io;
use thiserror::Error;

/// Result type alias for ordermatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ordermatch library.
///
/// Matching itself never fails: noisy or adversarial comments degrade to an
/// empty or low-confidence [`MatchResult`](crate::MatchResult). Errors are
/// raised only when a caller hands over a catalog that breaks the data model.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error while loading a catalog or comment file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Catalog or options JSON could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Two products share the same identifier.
    #[error("Duplicate product identifier: {0}")]
    DuplicateProduct(u32),

    /// A price tier violates the tier invariants (positive quantity, non-negative price).
    #[error("Invalid price tier on product {product}: {message}")]
    InvalidTier { product: u32, message: String },

    /// The catalog is malformed for a reason not covered above.
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),
}
