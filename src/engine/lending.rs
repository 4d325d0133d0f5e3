//! Collateral valuation and the one-sided pool deposit.

use super::ledger::{DepositSettlement, Ledger};
use super::oracle::Oracle;
use super::SimError;
use crate::domain::{Decimal, Token};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LendingParams {
    /// Collateral asset; must have a pool reserve.
    pub collateral_token: Token,
    pub base_apy: Decimal,
    /// APY percentage points per unit of LTV fraction.
    pub apy_slope: Decimal,
    /// Fraction of the deposit's USD value paid out as a bonus.
    pub bonus_rate: Decimal,
    pub max_ltv_percent: Decimal,
}

impl Default for LendingParams {
    fn default() -> Self {
        Self {
            collateral_token: Token::Ifx,
            base_apy: Decimal::from_i64(5),
            apy_slope: Decimal::from_i64(20),
            bonus_rate: Decimal::from_parts(2, 3),
            max_ltv_percent: Decimal::hundred(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LendingEstimate {
    pub collateral_amount: Decimal,
    pub ltv_percent: Decimal,
    pub collateral_value_quote: Decimal,
    pub max_borrow_quote: Decimal,
    pub borrow_apy: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositReceipt {
    pub token: Token,
    pub collateral_amount: Decimal,
    pub bonus_usd: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct LendingEstimator {
    params: LendingParams,
}

impl LendingEstimator {
    pub fn new(params: LendingParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &LendingParams {
        &self.params
    }

    pub fn estimate(
        &self,
        oracle: &Oracle,
        collateral_amount: Decimal,
        ltv_percent: Decimal,
    ) -> Result<LendingEstimate, SimError> {
        if collateral_amount.is_negative() {
            return Err(SimError::InvalidInput(format!(
                "collateral must not be negative, got {}",
                collateral_amount
            )));
        }
        if ltv_percent.is_negative() || ltv_percent > self.params.max_ltv_percent {
            return Err(SimError::InvalidInput(format!(
                "ltv must be in [0, {}], got {}",
                self.params.max_ltv_percent, ltv_percent
            )));
        }
        let ltv = ltv_percent / Decimal::hundred();
        let collateral_value_quote = collateral_amount
            .checked_mul(oracle.price_of(self.params.collateral_token))
            .ok_or_else(|| SimError::InvalidInput("collateral out of range".to_string()))?;
        Ok(LendingEstimate {
            collateral_amount,
            ltv_percent,
            collateral_value_quote,
            max_borrow_quote: collateral_value_quote * ltv,
            borrow_apy: self.params.base_apy + ltv * self.params.apy_slope,
        })
    }

    pub fn validate_request(&self, collateral_amount: Decimal) -> Result<(), SimError> {
        if !collateral_amount.is_positive() {
            return Err(SimError::InvalidInput(format!(
                "collateral must be positive, got {}",
                collateral_amount
            )));
        }
        Ok(())
    }

    /// Deposit collateral into the pool and credit the USD bonus.
    pub fn execute(
        &self,
        ledger: &mut Ledger,
        oracle: &Oracle,
        collateral_amount: Decimal,
    ) -> Result<DepositReceipt, SimError> {
        self.validate_request(collateral_amount)?;
        let token = self.params.collateral_token;
        ledger.ensure_balance(token, collateral_amount)?;
        let bonus_usd = collateral_amount * oracle.price_of(token) * self.params.bonus_rate;
        ledger.apply_deposit(&DepositSettlement {
            token,
            amount: collateral_amount,
            bonus_token: Token::Usd,
            bonus: bonus_usd,
        })?;
        Ok(DepositReceipt {
            token,
            collateral_amount,
            bonus_usd,
        })
    }
}
