//! Random-walk reference price for the primary asset.

use super::random::RandomSource;
use super::SimError;
use crate::domain::{Decimal, Token};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleParams {
    /// Starting and reset value of the IFX/USD price.
    pub baseline_price: Decimal,
    /// Fixed WORLD/USD reference price.
    pub secondary_price: Decimal,
    /// Multiplier applied to `volatility` for the per-tick shock.
    pub shock_scale: Decimal,
    /// Half-width of the independent drift term.
    pub drift_bound: Decimal,
    /// Lower bound the price can never cross.
    pub floor: Decimal,
    pub default_volatility: Decimal,
    pub history_capacity: usize,
}

impl Default for OracleParams {
    fn default() -> Self {
        Self {
            baseline_price: Decimal::from_parts(45, 2),
            secondary_price: Decimal::from_parts(225, 2),
            shock_scale: Decimal::from_parts(2, 2),
            drift_bound: Decimal::from_parts(2, 3),
            floor: Decimal::from_parts(1, 4),
            default_volatility: Decimal::from_parts(35, 2),
            history_capacity: 60,
        }
    }
}

/// Noisy IFX/USD price feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Oracle {
    params: OracleParams,
    reference_price: Decimal,
    history: VecDeque<Decimal>,
    volatility: Decimal,
    running: bool,
}

impl Oracle {
    pub fn new(params: OracleParams) -> Self {
        let mut oracle = Self {
            reference_price: params.baseline_price,
            history: VecDeque::with_capacity(params.history_capacity.max(1)),
            volatility: params.default_volatility,
            running: true,
            params,
        };
        oracle.reset();
        oracle
    }

    /// Restore persisted state. History is trimmed to capacity, oldest first.
    pub fn restore(
        params: OracleParams,
        price: Decimal,
        history: Vec<Decimal>,
        volatility: Decimal,
        running: bool,
    ) -> Result<Self, SimError> {
        if !price.is_positive() {
            return Err(SimError::InvalidInput(format!(
                "oracle price must be positive, got {}",
                price
            )));
        }
        let mut oracle = Self::new(params);
        oracle.set_volatility(volatility)?;
        oracle.reference_price = price.max(oracle.params.floor);
        oracle.history.clear();
        for entry in history {
            oracle.push_history(entry);
        }
        if oracle.history.is_empty() {
            oracle.push_history(oracle.reference_price);
        }
        oracle.running = running;
        Ok(oracle)
    }

    pub fn params(&self) -> &OracleParams {
        &self.params
    }

    pub fn reference_price(&self) -> Decimal {
        self.reference_price
    }

    pub fn history(&self) -> impl ExactSizeIterator<Item = &Decimal> + '_ {
        self.history.iter()
    }

    pub fn volatility(&self) -> Decimal {
        self.volatility
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn set_volatility(&mut self, volatility: Decimal) -> Result<(), SimError> {
        if !volatility.is_positive() || volatility > Decimal::one() {
            return Err(SimError::InvalidInput(format!(
                "volatility must be in (0, 1], got {}",
                volatility
            )));
        }
        self.volatility = volatility;
        Ok(())
    }

    /// USD price of a token as seen by the quote engine.
    pub fn price_of(&self, token: Token) -> Decimal {
        match token {
            Token::Ifx => self.reference_price,
            Token::World => self.params.secondary_price,
            Token::Usd => Decimal::one(),
        }
    }

    /// Price change between the two most recent history entries.
    pub fn last_delta(&self) -> Decimal {
        let mut recent = self.history.iter().rev();
        match (recent.next(), recent.next()) {
            (Some(last), Some(prev)) => *last - *prev,
            _ => Decimal::zero(),
        }
    }

    /// Advance the random walk by one step.
    ///
    /// Returns the new price, or `None` when paused. Paused ticks consume no
    /// randomness so a seeded run stays aligned across pause/resume.
    pub fn tick(&mut self, rng: &mut dyn RandomSource) -> Option<Decimal> {
        if !self.running {
            return None;
        }
        let shock = Decimal::from_f64_lossy(rng.signed_unit()) * self.volatility
            * self.params.shock_scale;
        let drift = Decimal::from_f64_lossy(rng.signed_unit()) * self.params.drift_bound;
        let next = self.reference_price * (Decimal::one() + shock + drift);
        self.reference_price = next.max(self.params.floor);
        self.push_history(self.reference_price);
        Some(self.reference_price)
    }

    /// Back to the baseline price with a single-entry history.
    pub fn reset(&mut self) {
        self.reference_price = self.params.baseline_price;
        self.history.clear();
        self.history.push_back(self.reference_price);
    }

    fn push_history(&mut self, price: Decimal) {
        let capacity = self.params.history_capacity.max(1);
        while self.history.len() >= capacity {
            self.history.pop_front();
        }
        self.history.push_back(price);
    }
}

impl Default for Oracle {
    fn default() -> Self {
        Self::new(OracleParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::random::{ScriptedRandom, SeededRandom};

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_tick_applies_shock_and_drift() {
        let mut oracle = Oracle::default();
        // signed draws: 0.5 for the shock, 0 for the drift
        let mut rng = ScriptedRandom::new(vec![0.75, 0.5]);
        let price = oracle.tick(&mut rng).unwrap();
        // shock = 0.5 * 0.35 * 0.02 = 0.0035
        assert_eq!(price, d("0.45") * d("1.0035"));
        assert_eq!(oracle.history().len(), 2);
    }

    #[test]
    fn test_paused_tick_is_noop() {
        let mut oracle = Oracle::default();
        oracle.set_running(false);
        let mut rng = ScriptedRandom::constant(0.9);
        assert!(oracle.tick(&mut rng).is_none());
        assert_eq!(oracle.reference_price(), d("0.45"));
        assert_eq!(oracle.history().len(), 1);
    }

    #[test]
    fn test_price_never_below_floor() {
        let params = OracleParams {
            shock_scale: d("2"),
            ..OracleParams::default()
        };
        let mut oracle = Oracle::new(params);
        oracle.set_volatility(d("1")).unwrap();
        let mut rng = ScriptedRandom::constant(0.0);
        for _ in 0..50 {
            oracle.tick(&mut rng);
        }
        assert_eq!(oracle.reference_price(), d("0.0001"));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut oracle = Oracle::default();
        let mut rng = SeededRandom::from_seed(1);
        for _ in 0..200 {
            oracle.tick(&mut rng);
        }
        assert_eq!(oracle.history().len(), 60);
        assert_eq!(oracle.history().last().copied(), Some(oracle.reference_price()));
    }

    #[test]
    fn test_reset_seeds_single_entry() {
        let mut oracle = Oracle::default();
        let mut rng = SeededRandom::from_seed(3);
        for _ in 0..5 {
            oracle.tick(&mut rng);
        }
        oracle.reset();
        assert_eq!(oracle.reference_price(), d("0.45"));
        assert_eq!(oracle.history().collect::<Vec<_>>(), vec![&d("0.45")]);
    }

    #[test]
    fn test_volatility_bounds() {
        let mut oracle = Oracle::default();
        assert!(oracle.set_volatility(d("0")).is_err());
        assert!(oracle.set_volatility(d("1.01")).is_err());
        assert!(oracle.set_volatility(d("1")).is_ok());
    }

    #[test]
    fn test_price_of_tokens() {
        let oracle = Oracle::default();
        assert_eq!(oracle.price_of(Token::Ifx), d("0.45"));
        assert_eq!(oracle.price_of(Token::World), d("2.25"));
        assert_eq!(oracle.price_of(Token::Usd), d("1"));
    }
}
