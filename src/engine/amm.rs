//! Constant-product pricing with fee-on-input.

use super::ledger::{Ledger, SwapSettlement};
use super::oracle::Oracle;
use super::SimError;
use crate::domain::{Decimal, Token};
use serde::{Deserialize, Serialize};

/// Decimal places kept on swap outputs. Truncation always favours the pool.
pub const AMOUNT_DP: u32 = 18;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmmParams {
    /// Fraction of the input withheld as fee, in `[0, 1)`.
    pub fee_rate: Decimal,
}

impl Default for AmmParams {
    fn default() -> Self {
        Self {
            fee_rate: Decimal::from_parts(3, 3),
        }
    }
}

/// Derived swap figures. Never mutates anything by itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapQuote {
    pub from: Token,
    pub to: Token,
    pub amount_in: Decimal,
    pub amount_in_effective: Decimal,
    pub amount_out: Decimal,
    pub fee_amount: Decimal,
    /// Input paid per unit of output, from the unrounded curve output.
    pub executed_price: Decimal,
    /// `price(from) / price(to)` from the oracle references.
    pub mid_price: Decimal,
    /// Floored at zero; favourable executions report no impact.
    pub price_impact_percent: Decimal,
}

impl SwapQuote {
    fn settlement(&self) -> SwapSettlement {
        SwapSettlement {
            from: self.from,
            to: self.to,
            amount_in: self.amount_in,
            amount_in_effective: self.amount_in_effective,
            amount_out: self.amount_out,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AmmEngine {
    params: AmmParams,
}

impl AmmEngine {
    pub fn new(params: AmmParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &AmmParams {
        &self.params
    }

    /// Quote a swap against the current reserves.
    ///
    /// `None` means no quote is available: same asset on both legs, a
    /// non-positive amount, a token without a reserve, or an amount so
    /// small or so large that the output degenerates.
    pub fn quote(
        &self,
        ledger: &Ledger,
        oracle: &Oracle,
        from: Token,
        to: Token,
        amount_in: Decimal,
    ) -> Option<SwapQuote> {
        self.try_quote(ledger, oracle, from, to, amount_in).ok()
    }

    /// Validate the pair and amount without pricing.
    pub fn validate_request(from: Token, to: Token, amount_in: Decimal) -> Result<(), SimError> {
        if from == to {
            return Err(SimError::InvalidInput(format!(
                "cannot swap {} for itself",
                from
            )));
        }
        if !from.is_pool_asset() || !to.is_pool_asset() {
            return Err(SimError::InvalidInput(format!(
                "no pool for {}/{}",
                from, to
            )));
        }
        if !amount_in.is_positive() {
            return Err(SimError::InvalidInput(format!(
                "swap amount must be positive, got {}",
                amount_in
            )));
        }
        Ok(())
    }

    /// Like [`AmmEngine::quote`] but says why no quote is available.
    pub fn try_quote(
        &self,
        ledger: &Ledger,
        oracle: &Oracle,
        from: Token,
        to: Token,
        amount_in: Decimal,
    ) -> Result<SwapQuote, SimError> {
        Self::validate_request(from, to, amount_in)?;
        let pool = ledger.pool();
        let (reserve_in, reserve_out) = match (pool.get(from), pool.get(to)) {
            (Some(r_in), Some(r_out)) => (r_in, r_out),
            _ => return Err(SimError::InvalidInput(format!("no pool for {}/{}", from, to))),
        };
        let out_of_range = || SimError::InvalidInput(format!("amount {} out of range", amount_in));

        let fee_rate = self.params.fee_rate;
        let amount_in_effective = amount_in
            .checked_mul(Decimal::one() - fee_rate)
            .ok_or_else(out_of_range)?;
        let k = reserve_in * reserve_out;
        let new_reserve_in = reserve_in
            .checked_add(amount_in_effective)
            .ok_or_else(out_of_range)?;
        let new_reserve_out = k.checked_div(new_reserve_in).ok_or_else(out_of_range)?;

        let curve_out = reserve_out - new_reserve_out;
        let mut amount_out = curve_out.trunc_dp(AMOUNT_DP);
        // Division rounding must never shrink the product below k.
        if new_reserve_in * (reserve_out - amount_out) < k {
            amount_out -= Decimal::ulp(AMOUNT_DP);
        }
        if !amount_out.is_positive() || amount_out >= reserve_out {
            return Err(SimError::PoolExhausted { token: to });
        }

        // Price figures follow the curve, not the settled rounding.
        let executed_price = amount_in.checked_div(curve_out).ok_or_else(out_of_range)?;
        let mid_price = oracle.price_of(from) / oracle.price_of(to);
        let price_impact_percent = ((executed_price - mid_price) / mid_price).max(Decimal::zero())
            * Decimal::hundred();

        Ok(SwapQuote {
            from,
            to,
            amount_in,
            amount_in_effective,
            amount_out,
            fee_amount: amount_in * fee_rate,
            executed_price,
            mid_price,
            price_impact_percent,
        })
    }

    /// Re-price against current reserves and settle in one step.
    pub fn execute(
        &self,
        ledger: &mut Ledger,
        oracle: &Oracle,
        from: Token,
        to: Token,
        amount_in: Decimal,
    ) -> Result<SwapQuote, SimError> {
        Self::validate_request(from, to, amount_in)?;
        ledger.ensure_balance(from, amount_in)?;
        let quote = self.try_quote(ledger, oracle, from, to, amount_in)?;
        ledger.apply_swap(&quote.settlement())?;
        tracing::debug!(
            "swap settled: {} {} -> {} {} (impact {}%)",
            quote.amount_in,
            from,
            quote.amount_out,
            to,
            quote.price_impact_percent.trunc_dp(3)
        );
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn setup() -> (AmmEngine, Ledger, Oracle) {
        (AmmEngine::default(), Ledger::new(), Oracle::default())
    }

    #[test]
    fn test_reference_scenario() {
        let (amm, ledger, oracle) = setup();
        let quote = amm
            .quote(&ledger, &oracle, Token::Ifx, Token::World, d("1000"))
            .unwrap();
        assert_eq!(quote.amount_in_effective, d("997"));
        assert_eq!(quote.fee_amount, d("3"));
        // 225000 - 1.125e11 / 500997 = 447.757172198635919975568...
        assert_eq!(quote.amount_out, d("447.757172198635919975"));
        assert_eq!(quote.mid_price, d("0.2"));
        assert!(quote.price_impact_percent.is_positive());
    }

    #[test]
    fn test_no_quote_cases() {
        let (amm, ledger, oracle) = setup();
        assert!(amm.quote(&ledger, &oracle, Token::Ifx, Token::Ifx, d("10")).is_none());
        assert!(amm.quote(&ledger, &oracle, Token::Ifx, Token::World, d("0")).is_none());
        assert!(amm.quote(&ledger, &oracle, Token::Ifx, Token::World, d("-5")).is_none());
        assert!(amm.quote(&ledger, &oracle, Token::Usd, Token::World, d("5")).is_none());
    }

    #[test]
    fn test_execute_moves_balances_and_reserves() {
        let (amm, mut ledger, oracle) = setup();
        let quote = amm
            .execute(&mut ledger, &oracle, Token::Ifx, Token::World, d("1000"))
            .unwrap();
        assert_eq!(ledger.balance(Token::Ifx), d("9000"));
        assert_eq!(ledger.balance(Token::World), d("5000") + quote.amount_out);
        assert_eq!(ledger.pool().ifx, d("500997"));
        assert_eq!(ledger.pool().world, d("225000") - quote.amount_out);
        assert!(ledger.pool().product() >= d("112500000000"));
    }

    #[test]
    fn test_execute_insufficient_balance_no_mutation() {
        let (amm, mut ledger, oracle) = setup();
        let before = ledger.clone();
        let err = amm
            .execute(&mut ledger, &oracle, Token::World, Token::Ifx, d("5000.5"))
            .unwrap_err();
        assert!(matches!(err, SimError::InsufficientBalance { token: Token::World, .. }));
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_round_trip_loses_value() {
        let (amm, mut ledger, oracle) = setup();
        let there = amm
            .execute(&mut ledger, &oracle, Token::Ifx, Token::World, d("1000"))
            .unwrap();
        let back = amm
            .execute(&mut ledger, &oracle, Token::World, Token::Ifx, there.amount_out)
            .unwrap();
        assert!(back.amount_out < d("1000"));
    }

    #[test]
    fn test_impact_grows_with_size() {
        let (amm, ledger, oracle) = setup();
        let small = amm
            .quote(&ledger, &oracle, Token::Ifx, Token::World, d("10"))
            .unwrap();
        let large = amm
            .quote(&ledger, &oracle, Token::Ifx, Token::World, d("9000"))
            .unwrap();
        assert!(large.amount_out > small.amount_out);
        assert!(large.executed_price > small.executed_price);
        assert!(large.price_impact_percent > small.price_impact_percent);
    }

    #[test]
    fn test_favourable_execution_reports_zero_impact() {
        // WORLD -> IFX: mid price 5 IFX per WORLD, pool pays ~0.45 WORLD per IFX
        let (amm, ledger, oracle) = setup();
        let quote = amm
            .quote(&ledger, &oracle, Token::World, Token::Ifx, d("1"))
            .unwrap();
        assert_eq!(quote.mid_price, d("5"));
        assert!(quote.executed_price < quote.mid_price);
        assert_eq!(quote.price_impact_percent, Decimal::zero());
    }

    #[test]
    fn test_dust_amount_has_no_quote() {
        let (amm, ledger, oracle) = setup();
        let dust = Decimal::ulp(20);
        assert!(amm.quote(&ledger, &oracle, Token::Ifx, Token::World, dust).is_none());
    }

    #[test]
    fn test_fine_grained_inputs_stay_monotonic() {
        let (amm, ledger, oracle) = setup();
        let step = Decimal::ulp(12);
        let mut amount = d("1000");
        let mut prev = amm
            .quote(&ledger, &oracle, Token::Ifx, Token::World, amount)
            .unwrap();
        for _ in 0..2_000 {
            amount += step;
            let next = amm
                .quote(&ledger, &oracle, Token::Ifx, Token::World, amount)
                .unwrap();
            assert!(next.amount_out > prev.amount_out, "output stalled at {}", amount);
            assert!(
                next.price_impact_percent >= prev.price_impact_percent,
                "impact fell at {}",
                amount
            );
            prev = next;
        }
    }

    #[test]
    fn test_sub_ulp_input_difference_still_moves_output() {
        let (amm, ledger, oracle) = setup();
        let base = amm
            .quote(&ledger, &oracle, Token::Ifx, Token::World, d("1000"))
            .unwrap();
        let nudged = amm
            .quote(&ledger, &oracle, Token::Ifx, Token::World, d("1000.0000000000001"))
            .unwrap();
        assert!(nudged.amount_out > base.amount_out);
    }
}
