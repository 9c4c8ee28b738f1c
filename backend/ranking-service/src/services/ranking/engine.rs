// ============================================
// Position Engine
// ============================================
//
// Parametric formula (region has a parameter set):
//   trust_i  = ln(b1 + min(n1_upper, N_author / n1_lower)) * signals_i * quality_i
//   weight_i = trust_i * exp(-λ1 * age_i)
//   term_i   = weight_i * ((score_i - 5) * exp(-λ2 * age_i))^p
//   raw      = ln(b2 + min(n2_upper, N) / n2_lower) * (Σterm / Σweight)^(1/p)
//   position = ((raw + 7) / 2) * min(1.23, N) * 16.26
//
// Legacy formula (no parameter set):
//   position = R + (R - 5) * log_1000(N)
//
// The rescaling constants map the parametric output onto the same ~0-20
// range the legacy formula produced and must not change.

use super::trust::ReviewerTrustScorer;
use super::{RankingError, Result};
use crate::models::{LegacyStats, RankingParameterSet, ReviewInput, ScoringModel};
use crate::utils::{exponential_decay, log_base, real_pow};
use tracing::debug;

/// Midpoint of the review score scale
pub const SCORE_MIDPOINT: f64 = 5.0;

const POSITION_OFFSET: f64 = 7.0;
const VOLUME_MULTIPLIER_CAP: f64 = 1.23;
const POSITION_SCALE: f64 = 16.26;

const LEGACY_LOG_BASE: f64 = 1000.0;
const LEGACY_DEFAULT_POSITION: f64 = 1.0;

/// What the engine scores a listing from
#[derive(Debug, Clone, Copy)]
pub enum PositionInputs<'a> {
    Parametric {
        reviews: &'a [ReviewInput],
        params: &'a RankingParameterSet,
    },
    Legacy(LegacyStats),
    Disqualified,
}

impl PositionInputs<'_> {
    pub fn model(&self) -> ScoringModel {
        match self {
            PositionInputs::Parametric { .. } => ScoringModel::Parametric,
            PositionInputs::Legacy(_) => ScoringModel::Legacy,
            PositionInputs::Disqualified => ScoringModel::Disqualified,
        }
    }
}

impl RankingParameterSet {
    /// Reject sets that would divide by zero or take the log of a non-positive value.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("b1", self.b1),
            ("n1_lower", self.n1_lower),
            ("n1_upper", self.n1_upper),
            ("b2", self.b2),
            ("n2_lower", self.n2_lower),
            ("n2_upper", self.n2_upper),
            ("alpha1", self.alpha1),
            ("alpha2", self.alpha2),
            ("alpha3", self.alpha3),
            ("alpha4", self.alpha4),
            ("beta", self.beta),
            ("lambda1", self.lambda1),
            ("lambda2", self.lambda2),
            ("p", self.p),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, value)| !value.is_finite()) {
            return Err(RankingError::InvalidParameters(format!(
                "{} must be finite",
                name
            )));
        }

        for (name, value) in [
            ("n1_lower", self.n1_lower),
            ("n2_lower", self.n2_lower),
            ("p", self.p),
        ] {
            if value == 0.0 {
                return Err(RankingError::InvalidParameters(format!(
                    "{} must be non-zero",
                    name
                )));
            }
        }

        if self.b1 <= 0.0 {
            return Err(RankingError::InvalidParameters(format!(
                "b1 must be positive, got {}",
                self.b1
            )));
        }

        Ok(())
    }
}

/// Stateless position calculator. Safe to share across tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankingEngine;

impl RankingEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn compute(&self, inputs: PositionInputs<'_>) -> Result<f64> {
        match inputs {
            PositionInputs::Parametric { reviews, params } => {
                self.parametric_position(reviews, params)
            }
            PositionInputs::Legacy(stats) => Ok(self.legacy_position(&stats)),
            PositionInputs::Disqualified => Ok(0.0),
        }
    }

    pub fn parametric_position(
        &self,
        reviews: &[ReviewInput],
        params: &RankingParameterSet,
    ) -> Result<f64> {
        params.validate()?;
        let scorer = ReviewerTrustScorer::new(params);

        let mut wsum = 0.0;
        let mut ssum = 0.0;

        for review in reviews {
            let trust = scorer.score(&review.author)? * review.quality_factor;
            let weight = trust * exponential_decay(review.age_weeks, params.lambda1);
            // A weightless review adds nothing to either sum, so its power is never taken
            if weight == 0.0 {
                continue;
            }

            let centered = (review.raw_score - SCORE_MIDPOINT)
                * exponential_decay(review.age_weeks, params.lambda2);
            let powered = real_pow(centered, params.p).ok_or_else(|| {
                RankingError::NumericDomain(format!(
                    "({})^{} has no real value",
                    centered, params.p
                ))
            })?;

            wsum += weight;
            ssum += weight * powered;
        }

        if !(wsum > 0.0) {
            debug!(
                reviews = reviews.len(),
                wsum = wsum,
                "No positive review weight, position is zero"
            );
            return Ok(0.0);
        }

        let review_count = reviews.len() as f64;
        let volume_arg = params.b2 + review_count.min(params.n2_upper) / params.n2_lower;
        if !(volume_arg > 0.0) {
            return Err(RankingError::InvalidParameters(format!(
                "listing volume log argument must be positive, got {}",
                volume_arg
            )));
        }

        let ratio = ssum / wsum;
        let mean = real_pow(ratio, 1.0 / params.p).ok_or_else(|| {
            RankingError::NumericDomain(format!(
                "({})^(1/{}) has no real value",
                ratio, params.p
            ))
        })?;

        let raw = volume_arg.ln() * mean;
        let position = ((raw + POSITION_OFFSET) / 2.0)
            * review_count.min(VOLUME_MULTIPLIER_CAP)
            * POSITION_SCALE;

        debug!(
            reviews = reviews.len(),
            wsum = wsum,
            ssum = ssum,
            raw = raw,
            position = position,
            "Parametric position computed"
        );

        if !position.is_finite() {
            return Err(RankingError::NumericDomain(format!(
                "position is not finite: {}",
                position
            )));
        }

        Ok(position)
    }

    pub fn legacy_position(&self, stats: &LegacyStats) -> f64 {
        match stats.avg_rating {
            Some(rating) if stats.approved_review_count > 0 => {
                rating
                    + (rating - SCORE_MIDPOINT)
                        * log_base(stats.approved_review_count as f64, LEGACY_LOG_BASE)
            }
            _ => LEGACY_DEFAULT_POSITION,
        }
    }
}
