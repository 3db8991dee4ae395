//! Baseline predictive scorer: one linear head per output, loaded from JSON.
//!
//! ```json
//! {
//!   "feature_width": 24,
//!   "confidence": { "weights": [...], "bias": 0.0 },
//!   "sessions_per_week": { "weights": [...], "bias": 2.0 },
//!   "session_minutes": { "weights": [...], "bias": 45.0 },
//!   "approaches": [{ "weights": [...], "bias": 0.0 }]
//! }
//! ```
//!
//! `confidence` and approach priorities pass through a sigmoid; the session
//! heads are linear and floored at zero.

use crate::application::ports::PredictiveScorer;
use crate::domain::ScorerPrediction;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearHead {
    pub weights: Vec<f64>,
    #[serde(default)]
    pub bias: f64,
}

impl LinearHead {
    fn eval(&self, features: &[f64]) -> f64 {
        self.bias
            + self
                .weights
                .iter()
                .zip(features)
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearWeights {
    pub feature_width: usize,
    pub confidence: LinearHead,
    pub sessions_per_week: LinearHead,
    pub session_minutes: LinearHead,
    #[serde(default)]
    pub approaches: Vec<LinearHead>,
}

impl LinearWeights {
    fn check(&self) -> Result<()> {
        let heads = [&self.confidence, &self.sessions_per_week, &self.session_minutes]
            .into_iter()
            .chain(self.approaches.iter());
        for (i, head) in heads.enumerate() {
            if head.weights.len() != self.feature_width {
                bail!(
                    "head {} has {} weights, expected {}",
                    i,
                    head.weights.len(),
                    self.feature_width
                );
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct LinearScorer {
    weights: RwLock<Option<LinearWeights>>,
}

impl LinearScorer {
    /// A scorer with nothing loaded; `predict` fails until weights arrive.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_weights(weights: LinearWeights) -> Result<Self> {
        weights.check()?;
        Ok(Self {
            weights: RwLock::new(Some(weights)),
        })
    }

    pub fn load_from_path(&self, path: &Path) -> Result<()> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read scorer weights {}", path.display()))?;
        let weights: LinearWeights = serde_json::from_str(&raw)
            .with_context(|| format!("parse scorer weights {}", path.display()))?;
        weights.check()?;
        log::info!(
            "Loaded linear scorer ({} features, {} approaches) from {}",
            weights.feature_width,
            weights.approaches.len(),
            path.display()
        );
        *self
            .weights
            .write()
            .expect("LinearScorer: failed to acquire weights lock") = Some(weights);
        Ok(())
    }

    pub fn dispose(&self) {
        *self
            .weights
            .write()
            .expect("LinearScorer: failed to acquire weights lock") = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.weights
            .read()
            .expect("LinearScorer: failed to acquire weights lock")
            .is_some()
    }
}

#[async_trait]
impl PredictiveScorer for LinearScorer {
    /// Zero while unloaded.
    fn feature_width(&self) -> usize {
        self.weights
            .read()
            .expect("LinearScorer: failed to acquire weights lock")
            .as_ref()
            .map_or(0, |w| w.feature_width)
    }

    async fn predict(&self, features: &[f64]) -> Result<ScorerPrediction> {
        let guard = self
            .weights
            .read()
            .expect("LinearScorer: failed to acquire weights lock");
        let Some(weights) = guard.as_ref() else {
            bail!("linear scorer has no weights loaded");
        };
        if features.len() != weights.feature_width {
            bail!(
                "feature vector has {} values, scorer expects {}",
                features.len(),
                weights.feature_width
            );
        }

        Ok(ScorerPrediction {
            confidence: sigmoid(weights.confidence.eval(features)),
            sessions_per_week: weights.sessions_per_week.eval(features).max(0.0),
            session_minutes: weights.session_minutes.eval(features).max(0.0),
            approach_priorities: weights
                .approaches
                .iter()
                .map(|head| sigmoid(head.eval(features)))
                .collect(),
        })
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
