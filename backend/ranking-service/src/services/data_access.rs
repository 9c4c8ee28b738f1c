// ============================================
// Data Access Contracts
// ============================================
//
// Storage, eligibility queries and analytics live outside this crate.
// The ranking and sponsor services only talk to them through these traits.

use crate::models::{
    CategoryId, CompanyId, LegacyStats, ListingId, OrganicScope, RankingParameterSet,
    RegionId, ReviewRecord, ReviewerTrustAttributes, SponsorCandidate, UserId,
};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataAccessError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Data access failed: {0}")]
    Other(String),
}

pub type DataResult<T> = std::result::Result<T, DataAccessError>;

/// Approved reviews and their authors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn load_approved_reviews(&self, listing_id: ListingId) -> DataResult<Vec<ReviewRecord>>;

    async fn load_reviewer_trust_attributes(
        &self,
        user_id: UserId,
    ) -> DataResult<ReviewerTrustAttributes>;
}

/// Company-level facts the ranking needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompanyDirectory: Send + Sync {
    /// Companies flagged as bad actors always rank at zero.
    async fn is_disqualified_company(&self, company_id: CompanyId) -> DataResult<bool>;

    async fn company_legacy_stats(&self, company_id: CompanyId) -> DataResult<LegacyStats>;

    /// Company-wide position used when a region has no parameter set.
    async fn company_position(&self, company_id: CompanyId) -> DataResult<f64>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ParameterResolver: Send + Sync {
    /// At most one set applies to a region at a time.
    async fn resolve_applicable_parameter_set(
        &self,
        region_id: RegionId,
    ) -> DataResult<Option<RankingParameterSet>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PositionSink: Send + Sync {
    async fn store_position(&self, listing_id: ListingId, position: f64) -> DataResult<()>;
}

/// Eligibility queries for the sponsor tiers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SponsorCandidateSource: Send + Sync {
    /// Listings of companies with an active paid subscription in the category,
    /// near the requesting listing's city.
    async fn query_paid_sponsor_candidates(
        &self,
        listing_id: ListingId,
        category_id: CategoryId,
    ) -> DataResult<Vec<SponsorCandidate>>;

    /// Listings of reviewed companies in the category, in the closest city or
    /// closest launched city of the same province.
    async fn query_organic_sponsor_candidates(
        &self,
        listing_id: ListingId,
        category_id: CategoryId,
        scope: OrganicScope,
    ) -> DataResult<Vec<SponsorCandidate>>;

    /// The subset of `ids` held by paid subscribers.
    async fn paid_candidates_among(&self, ids: &[ListingId]) -> DataResult<Vec<SponsorCandidate>>;

    /// Candidate rows for ids that were resolved earlier (cache hits).
    async fn load_candidates(&self, ids: &[ListingId]) -> DataResult<Vec<SponsorCandidate>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImpressionSink: Send + Sync {
    async fn record_impressions(&self, ids: &[ListingId], topic: &str) -> DataResult<()>;
}
