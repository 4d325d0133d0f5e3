//! Account balances and pool reserves.

use super::SimError;
use crate::domain::{Decimal, Token};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserves of the two pool assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct PoolReserves {
    pub ifx: Decimal,
    pub world: Decimal,
}

impl PoolReserves {
    pub fn get(&self, token: Token) -> Option<Decimal> {
        match token {
            Token::Ifx => Some(self.ifx),
            Token::World => Some(self.world),
            Token::Usd => None,
        }
    }

    fn slot_mut(&mut self, token: Token) -> Option<&mut Decimal> {
        match token {
            Token::Ifx => Some(&mut self.ifx),
            Token::World => Some(&mut self.world),
            Token::Usd => None,
        }
    }

    /// Product of both reserves.
    pub fn product(&self) -> Decimal {
        self.ifx * self.world
    }
}

/// Balance changes produced by a confirmed swap, applied as one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapSettlement {
    pub from: Token,
    pub to: Token,
    pub amount_in: Decimal,
    pub amount_in_effective: Decimal,
    pub amount_out: Decimal,
}

/// Balance changes produced by a confirmed collateral deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositSettlement {
    pub token: Token,
    pub amount: Decimal,
    pub bonus_token: Token,
    pub bonus: Decimal,
}

/// Token balances of the single simulated account plus pool reserves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    balances: BTreeMap<Token, Decimal>,
    pool: PoolReserves,
}

impl Ledger {
    pub fn default_balances() -> BTreeMap<Token, Decimal> {
        BTreeMap::from([
            (Token::Ifx, Decimal::from_i64(10_000)),
            (Token::World, Decimal::from_i64(5_000)),
            (Token::Usd, Decimal::from_i64(20_000)),
        ])
    }

    pub fn default_pool() -> PoolReserves {
        PoolReserves {
            ifx: Decimal::from_i64(500_000),
            world: Decimal::from_i64(225_000),
        }
    }

    pub fn new() -> Self {
        Self {
            balances: Self::default_balances(),
            pool: Self::default_pool(),
        }
    }

    /// Rebuild a ledger from persisted parts, rejecting values that break
    /// the non-negative balance and positive reserve invariants.
    pub fn from_parts(
        balances: BTreeMap<Token, Decimal>,
        pool: PoolReserves,
    ) -> Result<Self, SimError> {
        if let Some((token, amount)) = balances.iter().find(|(_, a)| a.is_negative()) {
            return Err(SimError::InvalidInput(format!(
                "negative {} balance {}",
                token, amount
            )));
        }
        if !pool.ifx.is_positive() || !pool.world.is_positive() {
            return Err(SimError::InvalidInput(
                "pool reserves must be positive".to_string(),
            ));
        }
        let mut ledger = Self {
            balances: BTreeMap::new(),
            pool,
        };
        for token in Token::ALL {
            ledger
                .balances
                .insert(token, balances.get(&token).copied().unwrap_or_default());
        }
        Ok(ledger)
    }

    pub fn balance(&self, token: Token) -> Decimal {
        self.balances.get(&token).copied().unwrap_or_default()
    }

    pub fn balances(&self) -> &BTreeMap<Token, Decimal> {
        &self.balances
    }

    pub fn pool(&self) -> PoolReserves {
        self.pool
    }

    pub fn credit(&mut self, token: Token, amount: Decimal) -> Result<(), SimError> {
        if amount.is_negative() {
            return Err(SimError::InvalidInput(format!(
                "cannot credit negative amount {}",
                amount
            )));
        }
        *self.balances.entry(token).or_default() += amount;
        Ok(())
    }

    /// Debit a balance. Fails without mutating when the balance is short.
    pub fn debit(&mut self, token: Token, amount: Decimal) -> Result<(), SimError> {
        if amount.is_negative() {
            return Err(SimError::InvalidInput(format!(
                "cannot debit negative amount {}",
                amount
            )));
        }
        self.ensure_balance(token, amount)?;
        *self.balances.entry(token).or_default() -= amount;
        Ok(())
    }

    pub fn ensure_balance(&self, token: Token, amount: Decimal) -> Result<(), SimError> {
        let available = self.balance(token);
        if amount > available {
            return Err(SimError::InsufficientBalance {
                token,
                requested: amount,
                available,
            });
        }
        Ok(())
    }

    /// Apply a swap settlement. Every check runs before the first write.
    pub(crate) fn apply_swap(&mut self, s: &SwapSettlement) -> Result<(), SimError> {
        self.ensure_balance(s.from, s.amount_in)?;
        let reserve_out = self
            .pool
            .get(s.to)
            .ok_or_else(|| SimError::InvalidInput(format!("{} has no pool reserve", s.to)))?;
        if self.pool.get(s.from).is_none() {
            return Err(SimError::InvalidInput(format!(
                "{} has no pool reserve",
                s.from
            )));
        }
        if s.amount_out >= reserve_out || !s.amount_out.is_positive() {
            return Err(SimError::PoolExhausted { token: s.to });
        }

        *self.balances.entry(s.from).or_default() -= s.amount_in;
        *self.balances.entry(s.to).or_default() += s.amount_out;
        if let Some(slot) = self.pool.slot_mut(s.from) {
            *slot += s.amount_in_effective;
        }
        if let Some(slot) = self.pool.slot_mut(s.to) {
            *slot -= s.amount_out;
        }
        Ok(())
    }

    /// Move collateral from the account into the pool and pay the bonus.
    pub(crate) fn apply_deposit(&mut self, s: &DepositSettlement) -> Result<(), SimError> {
        self.ensure_balance(s.token, s.amount)?;
        if self.pool.get(s.token).is_none() {
            return Err(SimError::InvalidInput(format!(
                "{} has no pool reserve",
                s.token
            )));
        }
        if s.bonus.is_negative() {
            return Err(SimError::InvalidInput("negative deposit bonus".to_string()));
        }

        *self.balances.entry(s.token).or_default() -= s.amount;
        if let Some(slot) = self.pool.slot_mut(s.token) {
            *slot += s.amount;
        }
        *self.balances.entry(s.bonus_token).or_default() += s.bonus;
        Ok(())
    }

    /// Restore the documented starting balances and reserves in one step.
    pub fn reset_to_defaults(&mut self) {
        *self = Self::new();
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_defaults() {
        let ledger = Ledger::new();
        assert_eq!(ledger.balance(Token::Ifx), d("10000"));
        assert_eq!(ledger.balance(Token::World), d("5000"));
        assert_eq!(ledger.balance(Token::Usd), d("20000"));
        assert_eq!(ledger.pool().ifx, d("500000"));
        assert_eq!(ledger.pool().world, d("225000"));
    }

    #[test]
    fn test_debit_insufficient_leaves_balance_untouched() {
        let mut ledger = Ledger::new();
        let err = ledger.debit(Token::World, d("5000.01")).unwrap_err();
        assert!(matches!(err, SimError::InsufficientBalance { token: Token::World, .. }));
        assert_eq!(ledger.balance(Token::World), d("5000"));
    }

    #[test]
    fn test_debit_exact_balance_reaches_zero() {
        let mut ledger = Ledger::new();
        ledger.debit(Token::Usd, d("20000")).unwrap();
        assert!(ledger.balance(Token::Usd).is_zero());
    }

    #[test]
    fn test_credit_rejects_negative() {
        let mut ledger = Ledger::new();
        assert!(ledger.credit(Token::Ifx, d("-1")).is_err());
        assert_eq!(ledger.balance(Token::Ifx), d("10000"));
    }

    #[test]
    fn test_apply_swap_rejects_before_any_write() {
        let mut ledger = Ledger::new();
        let before = ledger.clone();
        let settlement = SwapSettlement {
            from: Token::Ifx,
            to: Token::World,
            amount_in: d("100"),
            amount_in_effective: d("99.7"),
            amount_out: d("225000"),
        };
        let err = ledger.apply_swap(&settlement).unwrap_err();
        assert!(matches!(err, SimError::PoolExhausted { token: Token::World }));
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_apply_deposit_moves_collateral_into_pool() {
        let mut ledger = Ledger::new();
        ledger
            .apply_deposit(&DepositSettlement {
                token: Token::Ifx,
                amount: d("1000"),
                bonus_token: Token::Usd,
                bonus: d("0.9"),
            })
            .unwrap();
        assert_eq!(ledger.balance(Token::Ifx), d("9000"));
        assert_eq!(ledger.pool().ifx, d("501000"));
        assert_eq!(ledger.balance(Token::Usd), d("20000.9"));
    }

    #[test]
    fn test_from_parts_rejects_negative_balance() {
        let mut balances = Ledger::default_balances();
        balances.insert(Token::Usd, d("-5"));
        assert!(Ledger::from_parts(balances, Ledger::default_pool()).is_err());
    }

    #[test]
    fn test_from_parts_fills_missing_tokens() {
        let balances = BTreeMap::from([(Token::Ifx, d("1"))]);
        let ledger = Ledger::from_parts(balances, Ledger::default_pool()).unwrap();
        assert_eq!(ledger.balance(Token::World), Decimal::zero());
        assert_eq!(ledger.balances().len(), 3);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut ledger = Ledger::new();
        ledger.debit(Token::Ifx, d("123")).unwrap();
        ledger.reset_to_defaults();
        let once = ledger.clone();
        ledger.reset_to_defaults();
        assert_eq!(ledger, once);
        assert_eq!(ledger, Ledger::new());
    }
}
