use super::LearningLoop;
use crate::domain::{AnalyticsResult, FeedbackDecision, RetrainingAssessment};
use chrono::{DateTime, Duration, Utc};

impl LearningLoop {
    /// Decides whether the recent feedback window warrants retraining.
    ///
    /// The window covers `retraining_window_days` ending at `as_of`. Rates are
    /// still reported when the sample is too small, but retraining is never
    /// recommended from them.
    pub async fn evaluate_retraining(
        &self,
        as_of: DateTime<Utc>,
    ) -> AnalyticsResult<RetrainingAssessment> {
        let window_days = self.config.retraining_window_days;
        let from = as_of - Duration::days(window_days);
        let events = self.stores.feedback.feedback_between(from, as_of).await?;

        let sample_size = events.len();
        let rate = |decision: FeedbackDecision| {
            if sample_size == 0 {
                0.0
            } else {
                events.iter().filter(|e| e.decision == decision).count() as f64
                    / sample_size as f64
            }
        };
        let rejection_rate = rate(FeedbackDecision::Reject);
        let modification_rate = rate(FeedbackDecision::Modify);
        let sufficient_data = sample_size >= self.config.retraining_min_samples;

        let mut reasons = Vec::new();
        if sufficient_data {
            if rejection_rate > self.config.max_rejection_rate {
                reasons.push(format!(
                    "Rejection rate {:.1}% exceeds {:.1}%",
                    rejection_rate * 100.0,
                    self.config.max_rejection_rate * 100.0
                ));
            }
            if modification_rate > self.config.max_modification_rate {
                reasons.push(format!(
                    "Modification rate {:.1}% exceeds {:.1}%",
                    modification_rate * 100.0,
                    self.config.max_modification_rate * 100.0
                ));
            }
        } else {
            log::debug!(
                "Retraining check: {} feedback event(s) in {} days, need {}",
                sample_size,
                window_days,
                self.config.retraining_min_samples
            );
        }

        let should_retrain = !reasons.is_empty();
        if should_retrain {
            log::info!("Retraining recommended: {}", reasons.join("; "));
        }

        Ok(RetrainingAssessment {
            window_days,
            sample_size,
            sufficient_data,
            rejection_rate,
            modification_rate,
            should_retrain,
            reasons,
        })
    }
}
