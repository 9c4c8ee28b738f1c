use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ListingId = i64;
pub type CompanyId = i64;
pub type UserId = i64;
pub type RegionId = i64;
pub type CityId = i64;
pub type CategoryId = i64;

/// Region-scoped tuning constants for the parametric position formula.
///
/// Field names follow the formula:
/// `trust = ln(b1 + min(n1_upper, reviews / n1_lower)) * (1 + Σ alpha·signal - beta·suspicious) * quality`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingParameterSet {
    pub b1: f64,
    pub n1_lower: f64,
    pub n1_upper: f64,
    pub b2: f64,
    pub n2_lower: f64,
    pub n2_upper: f64,
    pub alpha1: f64,
    pub alpha2: f64,
    pub alpha3: f64,
    pub alpha4: f64,
    pub beta: f64,
    pub lambda1: f64,
    pub lambda2: f64,
    pub p: f64,
}

/// Snapshot of a review author's trust signals, taken at scoring time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewerTrustAttributes {
    pub approved_review_count: u32,
    pub has_uploaded_photo: bool,
    pub has_avatar: bool,
    pub participated_in_forum: bool,
    pub has_valid_email: bool,
    pub has_suspicious_reviews: bool,
}

/// One approved review as stored, before its author is resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub raw_score: f64,
    pub age_weeks: f64,
    pub quality_factor: f64,
    pub author_id: UserId,
}

/// One review contributing to a position.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewInput {
    /// Midpoint of the scale is 5.
    pub raw_score: f64,
    pub age_weeks: f64,
    pub quality_factor: f64,
    pub author: ReviewerTrustAttributes,
}

impl ReviewInput {
    pub fn from_record(record: &ReviewRecord, author: ReviewerTrustAttributes) -> Self {
        Self {
            raw_score: record.raw_score,
            age_weeks: record.age_weeks,
            quality_factor: record.quality_factor,
            author,
        }
    }
}

/// Company-level aggregates used by the legacy formula.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyStats {
    pub avg_rating: Option<f64>,
    pub approved_review_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringModel {
    Parametric,
    Legacy,
    Disqualified,
}

impl ScoringModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringModel::Parametric => "parametric",
            ScoringModel::Legacy => "legacy",
            ScoringModel::Disqualified => "disqualified",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankingResult {
    pub listing_id: ListingId,
    pub position: f64,
    pub model: ScoringModel,
    /// False for partial-review previews.
    pub persisted: bool,
}

/// Search projection row. Optional fields are decided when the hit is built.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub listing_id: ListingId,
    pub score: Option<f64>,
    pub distance: Option<f64>,
}

impl SearchHit {
    pub fn new(listing_id: ListingId, score: Option<f64>, distance: Option<f64>) -> Self {
        Self {
            listing_id,
            score,
            distance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyState {
    Approved,
    Claimed,
    Pending,
    Rejected,
    Other,
}

impl CompanyState {
    /// Only approved or claimed companies may be shown as sponsors.
    pub fn is_sponsorable(&self) -> bool {
        matches!(self, CompanyState::Approved | CompanyState::Claimed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Premium,
    Standard,
}

/// A listing that may be shown as a sponsor. Built per selection request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SponsorCandidate {
    pub id: ListingId,
    pub owner_id: CompanyId,
    pub company_state: CompanyState,
    pub subscription_tier: Option<SubscriptionTier>,
    pub approved_review_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityTier {
    Paid,
    Organic,
}

impl EligibilityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            EligibilityTier::Paid => "paid",
            EligibilityTier::Organic => "organic",
        }
    }
}

/// Geographic anchor of the requesting listing's city.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoReference {
    pub closest_city_id: Option<CityId>,
    pub closest_launched_city_id: Option<CityId>,
    pub province_id: Option<RegionId>,
}

/// Where the organic tier may look for candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganicScope {
    pub province_id: RegionId,
    pub closest_city_id: CityId,
    pub closest_launched_city_id: Option<CityId>,
}

impl GeoReference {
    /// The organic tier needs at least the closest city and the province.
    pub fn organic_scope(&self) -> Option<OrganicScope> {
        match (self.closest_city_id, self.province_id) {
            (Some(closest_city_id), Some(province_id)) => Some(OrganicScope {
                province_id,
                closest_city_id,
                closest_launched_city_id: self.closest_launched_city_id,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecomputeReason {
    ReviewChanged,
    CityReassigned,
    StateTransition,
    Manual,
}

impl RecomputeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecomputeReason::ReviewChanged => "review_changed",
            RecomputeReason::CityReassigned => "city_reassigned",
            RecomputeReason::StateTransition => "state_transition",
            RecomputeReason::Manual => "manual",
        }
    }
}

/// Descriptor of a deferred position recomputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecomputeJob {
    pub job_id: Uuid,
    pub listing_id: ListingId,
    pub company_id: CompanyId,
    pub region_id: Option<RegionId>,
    pub reason: RecomputeReason,
    pub enqueued_at: DateTime<Utc>,
}

impl RecomputeJob {
    pub fn new(
        listing_id: ListingId,
        company_id: CompanyId,
        region_id: Option<RegionId>,
        reason: RecomputeReason,
    ) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            listing_id,
            company_id,
            region_id,
            reason,
            enqueued_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_organic_scope_requires_city_and_province() {
        let geo = GeoReference {
            closest_city_id: Some(10),
            closest_launched_city_id: None,
            province_id: None,
        };
        assert!(geo.organic_scope().is_none());

        let geo = GeoReference {
            closest_city_id: Some(10),
            closest_launched_city_id: Some(11),
            province_id: Some(3),
        };
        let scope = geo.organic_scope().unwrap();
        assert_eq!(scope.closest_city_id, 10);
        assert_eq!(scope.closest_launched_city_id, Some(11));
        assert_eq!(scope.province_id, 3);
    }

    #[test]
    fn test_sponsorable_states() {
        assert!(CompanyState::Approved.is_sponsorable());
        assert!(CompanyState::Claimed.is_sponsorable());
        assert!(!CompanyState::Pending.is_sponsorable());
        assert!(!CompanyState::Rejected.is_sponsorable());
    }

    #[test]
    fn test_recompute_job_serializes() {
        let job = RecomputeJob::new(7, 70, Some(3), RecomputeReason::CityReassigned);
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"reason\":\"city_reassigned\""));

        let back: RecomputeJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back, job);
    }
}
