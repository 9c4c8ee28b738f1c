use super::{RankingError, Result};
use crate::models::{RankingParameterSet, ReviewerTrustAttributes};

/// Converts one reviewer's trust attributes into a multiplier
///
/// `ln(b1 + min(n1_upper, reviews / n1_lower)) * (1 + α1·photo + α2·avatar + α3·forum + α4·email - β·suspicious)`
///
/// The review's own quality factor is applied by the engine.
pub struct ReviewerTrustScorer<'a> {
    params: &'a RankingParameterSet,
}

impl<'a> ReviewerTrustScorer<'a> {
    pub fn new(params: &'a RankingParameterSet) -> Self {
        Self { params }
    }

    /// Reviewer volume, scaled by `n1_lower` and capped at `n1_upper`
    pub fn capped_review_volume(&self, author: &ReviewerTrustAttributes) -> f64 {
        (author.approved_review_count as f64 / self.params.n1_lower).min(self.params.n1_upper)
    }

    pub fn signal_multiplier(&self, author: &ReviewerTrustAttributes) -> f64 {
        let p = self.params;
        1.0 + p.alpha1 * indicator(author.has_uploaded_photo)
            + p.alpha2 * indicator(author.has_avatar)
            + p.alpha3 * indicator(author.participated_in_forum)
            + p.alpha4 * indicator(author.has_valid_email)
            - p.beta * indicator(author.has_suspicious_reviews)
    }

    pub fn score(&self, author: &ReviewerTrustAttributes) -> Result<f64> {
        let log_arg = self.params.b1 + self.capped_review_volume(author);
        if !(log_arg > 0.0) {
            return Err(RankingError::InvalidParameters(format!(
                "reviewer volume log argument must be positive, got {}",
                log_arg
            )));
        }

        Ok(log_arg.ln() * self.signal_multiplier(author))
    }
}

fn indicator(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}
