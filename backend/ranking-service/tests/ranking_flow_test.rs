use async_trait::async_trait;
use service_area_ranking::config::SponsorConfig;
use service_area_ranking::jobs::{AsyncRecomputeTrigger, RecomputeWorker, TokioJobQueue};
use service_area_ranking::models::{
    CategoryId, CompanyId, CompanyState, GeoReference, LegacyStats, ListingId, OrganicScope,
    RankingParameterSet, RecomputeReason, RegionId, ReviewRecord, ReviewerTrustAttributes,
    ScoringModel, SponsorCandidate, SubscriptionTier, UserId,
};
use service_area_ranking::services::data_access::{
    CompanyDirectory, DataAccessError, DataResult, ImpressionSink, ParameterResolver,
    PositionSink, ReviewStore, SponsorCandidateSource,
};
use service_area_ranking::services::ranking::PositionRequest;
use service_area_ranking::services::sponsor::{
    InMemoryEligibilityCache, ListingAnchor, SponsorRequest,
};
use service_area_ranking::{RankingService, SponsorSelectionService};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SCORED_REGION: RegionId = 1;
const UNSCORED_REGION: RegionId = 2;

fn region_params() -> RankingParameterSet {
    RankingParameterSet {
        b1: 1.0,
        n1_lower: 10.0,
        n1_upper: 5.0,
        b2: 1.0,
        n2_lower: 10.0,
        n2_upper: 5.0,
        alpha1: 0.0,
        alpha2: 0.0,
        alpha3: 0.0,
        alpha4: 0.0,
        beta: 0.0,
        lambda1: 0.0,
        lambda2: 0.0,
        p: 1.0,
    }
}

/// In-memory stand-in for the review, company and position tables
#[derive(Default)]
struct FakeDirectory {
    reviews: HashMap<ListingId, Vec<ReviewRecord>>,
    authors: HashMap<UserId, ReviewerTrustAttributes>,
    disqualified: HashSet<CompanyId>,
    legacy: HashMap<CompanyId, LegacyStats>,
    company_positions: HashMap<CompanyId, f64>,
    positions: Mutex<HashMap<ListingId, f64>>,
}

impl FakeDirectory {
    fn stored(&self, listing_id: ListingId) -> Option<f64> {
        self.positions.lock().unwrap().get(&listing_id).copied()
    }
}

#[async_trait]
impl ReviewStore for FakeDirectory {
    async fn load_approved_reviews(&self, listing_id: ListingId) -> DataResult<Vec<ReviewRecord>> {
        Ok(self.reviews.get(&listing_id).cloned().unwrap_or_default())
    }

    async fn load_reviewer_trust_attributes(
        &self,
        user_id: UserId,
    ) -> DataResult<ReviewerTrustAttributes> {
        self.authors
            .get(&user_id)
            .copied()
            .ok_or_else(|| DataAccessError::NotFound(format!("user {}", user_id)))
    }
}

#[async_trait]
impl CompanyDirectory for FakeDirectory {
    async fn is_disqualified_company(&self, company_id: CompanyId) -> DataResult<bool> {
        Ok(self.disqualified.contains(&company_id))
    }

    async fn company_legacy_stats(&self, company_id: CompanyId) -> DataResult<LegacyStats> {
        Ok(self.legacy.get(&company_id).copied().unwrap_or_default())
    }

    async fn company_position(&self, company_id: CompanyId) -> DataResult<f64> {
        Ok(self.company_positions.get(&company_id).copied().unwrap_or(0.0))
    }
}

#[async_trait]
impl ParameterResolver for FakeDirectory {
    async fn resolve_applicable_parameter_set(
        &self,
        region_id: RegionId,
    ) -> DataResult<Option<RankingParameterSet>> {
        Ok((region_id == SCORED_REGION).then(region_params))
    }
}

#[async_trait]
impl PositionSink for FakeDirectory {
    async fn store_position(&self, listing_id: ListingId, position: f64) -> DataResult<()> {
        self.positions.lock().unwrap().insert(listing_id, position);
        Ok(())
    }
}

fn directory() -> Arc<FakeDirectory> {
    let mut directory = FakeDirectory::default();
    directory.reviews.insert(
        10,
        vec![ReviewRecord {
            raw_score: 8.0,
            age_weeks: 0.0,
            quality_factor: 1.0,
            author_id: 500,
        }],
    );
    directory.authors.insert(
        500,
        ReviewerTrustAttributes {
            approved_review_count: 20,
            ..Default::default()
        },
    );
    directory.legacy.insert(
        2,
        LegacyStats {
            avg_rating: Some(8.0),
            approved_review_count: 1000,
        },
    );
    directory.disqualified.insert(3);
    directory.company_positions.insert(2, 42.0);
    Arc::new(directory)
}

fn ranking_service(directory: &Arc<FakeDirectory>) -> Arc<RankingService> {
    Arc::new(RankingService::new(
        directory.clone(),
        directory.clone(),
        directory.clone(),
        directory.clone(),
    ))
}

#[tokio::test]
async fn test_recompute_jobs_update_stored_positions() {
    let directory = directory();
    let ranking = ranking_service(&directory);

    let (queue, receiver) = TokioJobQueue::channel(8);
    let worker = tokio::spawn(RecomputeWorker::new(ranking, 2).run(receiver));
    let trigger = AsyncRecomputeTrigger::new(Arc::new(queue));

    trigger
        .trigger(10, 1, Some(SCORED_REGION), RecomputeReason::ReviewChanged)
        .await;
    trigger
        .trigger(20, 2, Some(UNSCORED_REGION), RecomputeReason::CityReassigned)
        .await;
    trigger
        .trigger(30, 3, Some(SCORED_REGION), RecomputeReason::StateTransition)
        .await;
    drop(trigger);

    let stats = worker.await.unwrap();
    assert_eq!(stats.jobs_received, 3);
    assert_eq!(stats.jobs_succeeded, 3);

    let parametric = ((1.1f64.ln() * 3.0 + 7.0) / 2.0) * 16.26;
    assert!((directory.stored(10).unwrap() - parametric).abs() < 1e-9);
    assert!((directory.stored(20).unwrap() - 11.0).abs() < 1e-9);
    assert_eq!(directory.stored(30), Some(0.0));
}

#[tokio::test]
async fn test_partial_preview_leaves_stored_position_alone() {
    let directory = directory();
    let ranking = ranking_service(&directory);

    let full = ranking
        .compute_position(&PositionRequest::for_listing(10, 1, Some(SCORED_REGION)))
        .await
        .unwrap();
    assert_eq!(full.model, ScoringModel::Parametric);
    assert!(full.persisted);

    let preview = PositionRequest::for_listing(10, 1, Some(SCORED_REGION)).with_review_subset(
        vec![ReviewRecord {
            raw_score: 2.0,
            age_weeks: 0.0,
            quality_factor: 1.0,
            author_id: 500,
        }],
    );
    let partial = ranking.compute_position(&preview).await.unwrap();

    assert!(!partial.persisted);
    assert!(partial.position < full.position);
    assert_eq!(directory.stored(10), Some(full.position));
}

#[tokio::test]
async fn test_unknown_author_fails_without_storing() {
    let directory = directory();
    let ranking = ranking_service(&directory);

    let request = PositionRequest::for_listing(10, 1, Some(SCORED_REGION)).with_review_subset(
        vec![ReviewRecord {
            raw_score: 9.0,
            age_weeks: 1.0,
            quality_factor: 1.0,
            author_id: 999,
        }],
    );

    assert!(ranking.compute_position(&request).await.is_err());
    assert_eq!(directory.stored(10), None);
}

#[tokio::test]
async fn test_search_boost_falls_back_to_company_position() {
    let directory = directory();
    let ranking = ranking_service(&directory);

    let scored = ranking
        .search_boost(10, 1, Some(SCORED_REGION), 57.5)
        .await
        .unwrap();
    assert_eq!(scored.score, Some(57.5));

    let unscored = ranking
        .search_boost(20, 2, Some(UNSCORED_REGION), 57.5)
        .await
        .unwrap();
    assert_eq!(unscored.score, Some(42.0));
    assert_eq!(unscored.listing_id, 20);
}

/// Candidate tables keyed by listing id, with call counters
#[derive(Default)]
struct FakeSponsorSource {
    paid: Vec<SponsorCandidate>,
    organic: Vec<SponsorCandidate>,
    paid_queries: AtomicUsize,
    organic_queries: AtomicUsize,
    impressions: Mutex<Vec<(Vec<ListingId>, String)>>,
}

fn candidate(
    id: ListingId,
    owner_id: CompanyId,
    company_state: CompanyState,
    subscription_tier: Option<SubscriptionTier>,
) -> SponsorCandidate {
    SponsorCandidate {
        id,
        owner_id,
        company_state,
        subscription_tier,
        approved_review_count: 1,
    }
}

impl FakeSponsorSource {
    fn by_ids(&self, pool: &[SponsorCandidate], ids: &[ListingId]) -> Vec<SponsorCandidate> {
        pool.iter()
            .filter(|candidate| ids.contains(&candidate.id))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SponsorCandidateSource for FakeSponsorSource {
    async fn query_paid_sponsor_candidates(
        &self,
        _listing_id: ListingId,
        _category_id: CategoryId,
    ) -> DataResult<Vec<SponsorCandidate>> {
        self.paid_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.paid.clone())
    }

    async fn query_organic_sponsor_candidates(
        &self,
        _listing_id: ListingId,
        _category_id: CategoryId,
        _scope: OrganicScope,
    ) -> DataResult<Vec<SponsorCandidate>> {
        self.organic_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.organic.clone())
    }

    async fn paid_candidates_among(&self, ids: &[ListingId]) -> DataResult<Vec<SponsorCandidate>> {
        Ok(self.by_ids(&self.paid, ids))
    }

    async fn load_candidates(&self, ids: &[ListingId]) -> DataResult<Vec<SponsorCandidate>> {
        let mut all = self.paid.clone();
        all.extend(self.organic.iter().cloned());
        Ok(self.by_ids(&all, ids))
    }
}

#[async_trait]
impl ImpressionSink for FakeSponsorSource {
    async fn record_impressions(&self, ids: &[ListingId], topic: &str) -> DataResult<()> {
        self.impressions
            .lock()
            .unwrap()
            .push((ids.to_vec(), topic.to_string()));
        Ok(())
    }
}

fn anchor(company_id: CompanyId) -> ListingAnchor {
    ListingAnchor {
        listing_id: 1,
        company_id,
        category_id: Some(7),
        geo: Some(GeoReference {
            closest_city_id: Some(100),
            closest_launched_city_id: Some(101),
            province_id: Some(9),
        }),
    }
}

fn sponsor_service(source: &Arc<FakeSponsorSource>) -> SponsorSelectionService {
    SponsorSelectionService::new(
        source.clone(),
        Arc::new(InMemoryEligibilityCache::new()),
        source.clone(),
        SponsorConfig::default(),
    )
}

#[tokio::test]
async fn test_paid_sponsors_exclude_requester_and_unsponsorable() {
    let source = Arc::new(FakeSponsorSource {
        paid: vec![
            candidate(11, 50, CompanyState::Approved, Some(SubscriptionTier::Premium)),
            candidate(12, 51, CompanyState::Claimed, Some(SubscriptionTier::Standard)),
            candidate(13, 52, CompanyState::Pending, Some(SubscriptionTier::Premium)),
            candidate(14, 99, CompanyState::Approved, Some(SubscriptionTier::Premium)),
        ],
        ..Default::default()
    });
    let service = sponsor_service(&source);
    let request = SponsorRequest::for_listing(anchor(99), service.config());

    for _ in 0..20 {
        let mut chosen = service.choose_sponsors(&request).await.unwrap();
        chosen.sort();
        assert_eq!(chosen, vec![11, 12]);
    }

    let impressions = source.impressions.lock().unwrap();
    assert_eq!(impressions.len(), 20);
    assert!(impressions.iter().all(|(_, topic)| topic == "sponsor"));
    assert_eq!(source.organic_queries.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_organic_fallback_is_cached_between_calls() {
    let source = Arc::new(FakeSponsorSource {
        organic: vec![
            candidate(21, 60, CompanyState::Approved, None),
            candidate(22, 61, CompanyState::Approved, None),
        ],
        ..Default::default()
    });
    let service = sponsor_service(&source);
    let request = SponsorRequest::for_listing(anchor(99), service.config())
        .with_num_sponsors(1)
        .with_cache("listing:1", Duration::from_secs(60));

    let first = service.choose_sponsors(&request).await.unwrap();
    let second = service.choose_sponsors(&request).await.unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert!([21, 22].contains(&second[0]));
    assert_eq!(source.paid_queries.load(Ordering::SeqCst), 1);
    assert_eq!(source.organic_queries.load(Ordering::SeqCst), 1);

    let refreshed = request.clone().force_refresh();
    service.choose_sponsors(&refreshed).await.unwrap();
    assert_eq!(source.paid_queries.load(Ordering::SeqCst), 2);
    assert_eq!(source.organic_queries.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_explicit_ids_choose_paid_subscribers_only() {
    let source = Arc::new(FakeSponsorSource {
        paid: vec![
            candidate(31, 70, CompanyState::Approved, Some(SubscriptionTier::Standard)),
            candidate(32, 71, CompanyState::Approved, Some(SubscriptionTier::Premium)),
        ],
        organic: vec![candidate(33, 72, CompanyState::Approved, None)],
        ..Default::default()
    });
    let service = sponsor_service(&source);
    let request = SponsorRequest::among(vec![31, 33, 34], service.config());

    let chosen = service.choose_sponsors(&request).await.unwrap();
    assert_eq!(chosen, vec![31]);
}
