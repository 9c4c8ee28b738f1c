// ============================================
// Sponsor Selection
// ============================================
//
// Picks a few listings to show as sponsored placements.
//
// Tiers:
// 1. Paid: active paid subscribers in the category near the listing's city
// 2. Organic: reviewed companies in the closest (launched) city of the province
//
// Premium subscribers (paid tier) and reviewed companies (organic tier)
// get double weight in the draw.

pub mod cache;

pub use cache::{
    CacheError, CachedEligibility, EligibilityCache, InMemoryEligibilityCache,
    RedisEligibilityCache,
};

use crate::config::SponsorConfig;
use crate::models::{
    CategoryId, CompanyId, EligibilityTier, GeoReference, ListingId, SponsorCandidate,
    SubscriptionTier,
};
use crate::services::data_access::{DataAccessError, ImpressionSink, SponsorCandidateSource};
use crate::services::selection::WeightedRandomSelector;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const SPONSOR_IMPRESSION_TOPIC: &str = "sponsor";

const BOOSTED_WEIGHT: f64 = 2.0;
const BASE_WEIGHT: f64 = 1.0;

#[derive(Debug, Error)]
pub enum SponsorError {
    #[error("Data access failed: {0}")]
    DataAccess(#[from] DataAccessError),
}

pub type Result<T> = std::result::Result<T, SponsorError>;

/// The listing a sponsor block is shown next to
#[derive(Debug, Clone)]
pub struct ListingAnchor {
    pub listing_id: ListingId,
    pub company_id: CompanyId,
    pub category_id: Option<CategoryId>,
    /// `None` when the listing's city has no location
    pub geo: Option<GeoReference>,
}

#[derive(Debug, Clone)]
pub enum EligibilitySource {
    /// Paid tier near the listing, organic tier as fallback
    Listing(ListingAnchor),
    /// Paid subscribers among an explicit set, e.g. a page of search results
    Among(Vec<ListingId>),
}

#[derive(Debug, Clone)]
pub struct SponsorRequest {
    pub source: EligibilitySource,
    /// Listings of this company are never shown as its own sponsors
    pub requester_company_id: Option<CompanyId>,
    pub num_sponsors: usize,
    pub cache_key: Option<String>,
    pub cache_ttl: Duration,
    /// Evict the cached set before resolving, for this call only
    pub force_refresh: bool,
}

impl SponsorRequest {
    pub fn for_listing(anchor: ListingAnchor, config: &SponsorConfig) -> Self {
        let requester_company_id = Some(anchor.company_id);
        Self {
            source: EligibilitySource::Listing(anchor),
            requester_company_id,
            num_sponsors: config.default_num_sponsors,
            cache_key: None,
            cache_ttl: config.cache_ttl(),
            force_refresh: false,
        }
    }

    pub fn among(ids: Vec<ListingId>, config: &SponsorConfig) -> Self {
        Self {
            source: EligibilitySource::Among(ids),
            requester_company_id: None,
            num_sponsors: config.default_num_sponsors,
            cache_key: None,
            cache_ttl: config.cache_ttl(),
            force_refresh: false,
        }
    }

    pub fn with_num_sponsors(mut self, num_sponsors: usize) -> Self {
        self.num_sponsors = num_sponsors;
        self
    }

    pub fn with_cache(mut self, key: impl Into<String>, ttl: Duration) -> Self {
        self.cache_key = Some(key.into());
        self.cache_ttl = ttl;
        self
    }

    pub fn with_requester(mut self, company_id: CompanyId) -> Self {
        self.requester_company_id = Some(company_id);
        self
    }

    pub fn force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }
}

/// Candidates of one tier, before exclusion and weighting
#[derive(Debug)]
struct EligiblePool {
    tier: EligibilityTier,
    candidates: Vec<SponsorCandidate>,
}

/// Sponsor Selection Service - tiered eligibility + weighted draw
pub struct SponsorSelectionService {
    source: Arc<dyn SponsorCandidateSource>,
    cache: Arc<dyn EligibilityCache>,
    impressions: Arc<dyn ImpressionSink>,
    selector: WeightedRandomSelector,
    config: SponsorConfig,
}

impl SponsorSelectionService {
    pub fn new(
        source: Arc<dyn SponsorCandidateSource>,
        cache: Arc<dyn EligibilityCache>,
        impressions: Arc<dyn ImpressionSink>,
        config: SponsorConfig,
    ) -> Self {
        Self {
            source,
            cache,
            impressions,
            selector: WeightedRandomSelector::new(),
            config,
        }
    }

    pub fn config(&self) -> &SponsorConfig {
        &self.config
    }

    /// Choose up to `num_sponsors` sponsor listings.
    ///
    /// An empty pool is an empty result, not an error.
    pub async fn choose_sponsors(&self, request: &SponsorRequest) -> Result<Vec<ListingId>> {
        let cache_key = request.cache_key.as_deref().map(|key| self.namespaced(key));

        if request.force_refresh {
            if let Some(key) = &cache_key {
                self.evict_cached(key).await;
            }
        }

        let pool = match self.resolve_eligible(request, cache_key.as_deref()).await? {
            Some(pool) => pool,
            None => {
                debug!("No sponsor tier could be resolved");
                return Ok(Vec::new());
            }
        };

        let weighted: Vec<(ListingId, f64)> = pool
            .candidates
            .iter()
            .filter(|candidate| candidate.company_state.is_sponsorable())
            .filter(|candidate| Some(candidate.owner_id) != request.requester_company_id)
            .map(|candidate| (candidate.id, sponsor_weight(pool.tier, candidate)))
            .collect();

        if weighted.is_empty() {
            debug!(tier = pool.tier.as_str(), "Sponsor pool empty after exclusions");
            return Ok(Vec::new());
        }

        let mut chosen = self.selector.select(&weighted, request.num_sponsors);
        self.selector.shuffle(&mut chosen, &mut rand::thread_rng());

        if !chosen.is_empty() {
            self.impressions
                .record_impressions(&chosen, SPONSOR_IMPRESSION_TOPIC)
                .await?;
        }

        info!(
            tier = pool.tier.as_str(),
            eligible = weighted.len(),
            chosen = chosen.len(),
            "Sponsors chosen"
        );

        Ok(chosen)
    }

    async fn resolve_eligible(
        &self,
        request: &SponsorRequest,
        cache_key: Option<&str>,
    ) -> Result<Option<EligiblePool>> {
        if let Some(key) = cache_key {
            if let Some(entry) = self.cached(key).await {
                let candidates = self.hydrate(&entry).await?;
                return Ok(Some(EligiblePool {
                    tier: entry.tier,
                    candidates,
                }));
            }
        }

        let pool = match &request.source {
            EligibilitySource::Among(ids) => {
                let candidates = if ids.is_empty() {
                    Vec::new()
                } else {
                    self.source.paid_candidates_among(ids).await?
                };
                EligiblePool {
                    tier: EligibilityTier::Paid,
                    candidates,
                }
            }
            EligibilitySource::Listing(anchor) => match self.query_tiers(anchor).await? {
                Some(pool) => pool,
                None => return Ok(None),
            },
        };

        if let Some(key) = cache_key {
            let ids = pool.candidates.iter().map(|candidate| candidate.id).collect();
            let entry = CachedEligibility::new(pool.tier, ids);
            self.store_cached(key, &entry, request.cache_ttl).await;
        }

        Ok(Some(pool))
    }

    async fn query_tiers(&self, anchor: &ListingAnchor) -> Result<Option<EligiblePool>> {
        let (category_id, geo) = match (anchor.category_id, anchor.geo) {
            (Some(category_id), Some(geo)) => (category_id, geo),
            _ => {
                debug!(
                    listing_id = anchor.listing_id,
                    "Listing has no category or located city, no sponsors"
                );
                return Ok(None);
            }
        };

        let paid = self
            .source
            .query_paid_sponsor_candidates(anchor.listing_id, category_id)
            .await?;
        if !paid.is_empty() {
            return Ok(Some(EligiblePool {
                tier: EligibilityTier::Paid,
                candidates: paid,
            }));
        }

        let scope = match geo.organic_scope() {
            Some(scope) => scope,
            None => {
                debug!(
                    listing_id = anchor.listing_id,
                    "No paid sponsors and no closest city/province for organic fallback"
                );
                return Ok(None);
            }
        };

        let organic = self
            .source
            .query_organic_sponsor_candidates(anchor.listing_id, category_id, scope)
            .await?;

        Ok(Some(EligiblePool {
            tier: EligibilityTier::Organic,
            candidates: organic,
        }))
    }

    async fn hydrate(&self, entry: &CachedEligibility) -> Result<Vec<SponsorCandidate>> {
        if entry.ids.is_empty() {
            return Ok(Vec::new());
        }

        let candidates = match entry.tier {
            EligibilityTier::Paid => self.source.paid_candidates_among(&entry.ids).await?,
            EligibilityTier::Organic => self.source.load_candidates(&entry.ids).await?,
        };
        Ok(candidates)
    }

    /// Read failures degrade to a miss
    async fn cached(&self, key: &str) -> Option<CachedEligibility> {
        match self.cache.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, error = %e, "Eligibility cache read failed, recomputing");
                None
            }
        }
    }

    /// Write failures are logged and ignored
    async fn store_cached(&self, key: &str, entry: &CachedEligibility, ttl: Duration) {
        if let Err(e) = self.cache.put(key, entry, ttl).await {
            warn!(key = %key, error = %e, "Eligibility cache write failed");
        }
    }

    async fn evict_cached(&self, key: &str) {
        if let Err(e) = self.cache.evict(key).await {
            warn!(key = %key, error = %e, "Eligibility cache evict failed");
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.config.cache_key_prefix, key)
    }
}

/// Double weight for premium subscribers (paid) or reviewed companies (organic)
pub fn sponsor_weight(tier: EligibilityTier, candidate: &SponsorCandidate) -> f64 {
    let boosted = match tier {
        EligibilityTier::Paid => candidate.subscription_tier == Some(SubscriptionTier::Premium),
        EligibilityTier::Organic => candidate.approved_review_count > 0,
    };

    if boosted {
        BOOSTED_WEIGHT
    } else {
        BASE_WEIGHT
    }
}
