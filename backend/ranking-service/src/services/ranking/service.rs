use super::engine::{PositionInputs, RankingEngine};
use super::Result;
use crate::models::{
    CompanyId, ListingId, RankingParameterSet, RankingResult, RegionId, ReviewInput,
    ReviewRecord, ReviewerTrustAttributes, ScoringModel, SearchHit, UserId,
};
use crate::services::data_access::{CompanyDirectory, ParameterResolver, PositionSink, ReviewStore};
use futures::future::try_join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// What to compute a position for
#[derive(Debug, Clone)]
pub struct PositionRequest {
    pub listing_id: ListingId,
    pub company_id: CompanyId,
    pub region_id: Option<RegionId>,
    /// Skips region resolution when set
    pub parameters: Option<RankingParameterSet>,
    /// Preview over these reviews only; the result is never stored
    pub review_subset: Option<Vec<ReviewRecord>>,
}

impl PositionRequest {
    pub fn for_listing(
        listing_id: ListingId,
        company_id: CompanyId,
        region_id: Option<RegionId>,
    ) -> Self {
        Self {
            listing_id,
            company_id,
            region_id,
            parameters: None,
            review_subset: None,
        }
    }

    pub fn with_parameters(mut self, parameters: RankingParameterSet) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_review_subset(mut self, reviews: Vec<ReviewRecord>) -> Self {
        self.review_subset = Some(reviews);
        self
    }

    pub fn is_partial(&self) -> bool {
        self.review_subset.is_some()
    }
}

/// Ranking Service - computes and persists listing positions
pub struct RankingService {
    engine: RankingEngine,
    reviews: Arc<dyn ReviewStore>,
    companies: Arc<dyn CompanyDirectory>,
    parameters: Arc<dyn ParameterResolver>,
    sink: Arc<dyn PositionSink>,
}

impl RankingService {
    pub fn new(
        reviews: Arc<dyn ReviewStore>,
        companies: Arc<dyn CompanyDirectory>,
        parameters: Arc<dyn ParameterResolver>,
        sink: Arc<dyn PositionSink>,
    ) -> Self {
        Self {
            engine: RankingEngine::new(),
            reviews,
            companies,
            parameters,
            sink,
        }
    }

    /// Compute a listing's position and store it unless the request is a partial preview.
    ///
    /// Any failure returns before the sink is called, so the stored position is untouched.
    pub async fn compute_position(&self, request: &PositionRequest) -> Result<RankingResult> {
        let listing_id = request.listing_id;

        let (position, model) = if self
            .companies
            .is_disqualified_company(request.company_id)
            .await?
        {
            (self.engine.compute(PositionInputs::Disqualified)?, ScoringModel::Disqualified)
        } else if let Some(params) = self.applicable_parameters(request).await? {
            let records = match &request.review_subset {
                Some(subset) => subset.clone(),
                None => self.reviews.load_approved_reviews(listing_id).await?,
            };
            let reviews = self.resolve_authors(&records).await?;
            let inputs = PositionInputs::Parametric {
                reviews: &reviews,
                params: &params,
            };
            (self.engine.compute(inputs)?, ScoringModel::Parametric)
        } else {
            let stats = self.companies.company_legacy_stats(request.company_id).await?;
            (self.engine.compute(PositionInputs::Legacy(stats))?, ScoringModel::Legacy)
        };

        let persisted = !request.is_partial();
        if persisted {
            self.sink.store_position(listing_id, position).await?;
        }

        info!(
            listing_id = listing_id,
            company_id = request.company_id,
            model = model.as_str(),
            position = position,
            persisted = persisted,
            "Listing position computed"
        );

        Ok(RankingResult {
            listing_id,
            position,
            model,
            persisted,
        })
    }

    /// Search-index boost: the listing's own position when its region is scored
    /// parametrically, otherwise the company-wide position.
    pub async fn search_boost(
        &self,
        listing_id: ListingId,
        company_id: CompanyId,
        region_id: Option<RegionId>,
        stored_position: f64,
    ) -> Result<SearchHit> {
        let region_scored = match region_id {
            Some(region_id) => self
                .parameters
                .resolve_applicable_parameter_set(region_id)
                .await?
                .is_some(),
            None => false,
        };

        let score = if region_scored {
            stored_position
        } else {
            self.companies.company_position(company_id).await?
        };

        debug!(
            listing_id = listing_id,
            region_scored = region_scored,
            score = score,
            "Search boost resolved"
        );

        Ok(SearchHit::new(listing_id, Some(score), None))
    }

    async fn applicable_parameters(
        &self,
        request: &PositionRequest,
    ) -> Result<Option<RankingParameterSet>> {
        if let Some(params) = &request.parameters {
            return Ok(Some(params.clone()));
        }

        match request.region_id {
            Some(region_id) => Ok(self
                .parameters
                .resolve_applicable_parameter_set(region_id)
                .await?),
            None => Ok(None),
        }
    }

    /// Join reviews with their authors' trust attributes, one lookup per author.
    async fn resolve_authors(&self, records: &[ReviewRecord]) -> Result<Vec<ReviewInput>> {
        let mut seen = HashSet::new();
        let author_ids: Vec<UserId> = records
            .iter()
            .map(|record| record.author_id)
            .filter(|id| seen.insert(*id))
            .collect();

        let lookups = author_ids.iter().map(|&user_id| async move {
            self.reviews
                .load_reviewer_trust_attributes(user_id)
                .await
                .map(|attributes| (user_id, attributes))
        });
        let authors: HashMap<UserId, ReviewerTrustAttributes> =
            try_join_all(lookups).await?.into_iter().collect();

        Ok(records
            .iter()
            .map(|record| {
                let author = authors.get(&record.author_id).copied().unwrap_or_default();
                ReviewInput::from_record(record, author)
            })
            .collect())
    }
}
