use crate::domain::Decimal;
use serde::{Deserialize, Serialize};

/// Actions that earn reputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Swap,
    Lend,
    Governance,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::Swap => write!(f, "swap"),
            ActionKind::Lend => write!(f, "lend"),
            ActionKind::Governance => write!(f, "governance"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReputationParams {
    pub baseline: Decimal,
    pub min_score: Decimal,
    pub max_score: Decimal,
    pub swap_delta: Decimal,
    pub lend_delta: Decimal,
    pub governance_delta: Decimal,
}

impl Default for ReputationParams {
    fn default() -> Self {
        Self {
            baseline: Decimal::from_i64(120),
            min_score: Decimal::zero(),
            max_score: Decimal::from_i64(200),
            swap_delta: Decimal::from_parts(12, 1),
            lend_delta: Decimal::from_i64(5),
            governance_delta: Decimal::from_i64(10),
        }
    }
}

/// Score that saturates at the configured bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReputationTracker {
    params: ReputationParams,
    score: Decimal,
}

impl ReputationTracker {
    pub fn new(params: ReputationParams) -> Self {
        Self {
            score: params.baseline,
            params,
        }
    }

    /// Resume from a persisted score, clamped into bounds.
    pub fn with_score(params: ReputationParams, score: Decimal) -> Self {
        let score = score.clamp(params.min_score, params.max_score);
        Self { params, score }
    }

    pub fn score(&self) -> Decimal {
        self.score
    }

    pub fn params(&self) -> &ReputationParams {
        &self.params
    }

    pub fn delta_for(&self, action: ActionKind) -> Decimal {
        match action {
            ActionKind::Swap => self.params.swap_delta,
            ActionKind::Lend => self.params.lend_delta,
            ActionKind::Governance => self.params.governance_delta,
        }
    }

    pub fn apply(&mut self, action: ActionKind) -> Decimal {
        self.score = (self.score + self.delta_for(action))
            .clamp(self.params.min_score, self.params.max_score);
        self.score
    }

    pub fn reset(&mut self) {
        self.score = self.params.baseline;
    }
}

impl Default for ReputationTracker {
    fn default() -> Self {
        Self::new(ReputationParams::default())
    }
}
