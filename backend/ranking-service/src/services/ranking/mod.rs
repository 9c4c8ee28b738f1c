/// Ranking Module
///
/// Turns a listing's approved reviews into the scalar `position` used to
/// order listings in search and as the search-index boost.
///
/// # Architecture
/// - **Trust Layer**: per-reviewer multiplier from trust signals (`trust`)
/// - **Engine Layer**: parametric formula or legacy fallback, pure (`engine`)
/// - **Service Layer**: loads inputs through collaborators, persists results (`service`)
///
/// # Workflow
/// 1. Disqualified companies short-circuit to position 0
/// 2. Resolve the region's parameter set (or use an explicit one)
/// 3. Parametric formula over reviews, or legacy formula over company stats
/// 4. Store the position unless the computation was a partial preview
pub mod engine;
pub mod service;
pub mod trust;

pub use engine::{PositionInputs, RankingEngine};
pub use service::{PositionRequest, RankingService};
pub use trust::ReviewerTrustScorer;

use crate::services::data_access::DataAccessError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RankingError {
    #[error("Invalid ranking parameters: {0}")]
    InvalidParameters(String),

    #[error("Numeric domain error: {0}")]
    NumericDomain(String),

    #[error("Data access failed: {0}")]
    DataAccess(#[from] DataAccessError),
}

pub type Result<T> = std::result::Result<T, RankingError>;
