//! Two-phase transaction controller owning one simulated session.

use super::events::{Notifier, SessionEvent};
use super::log::TransactionLog;
use super::scheduler::Scheduler;
use crate::domain::{Address, Decimal, TimeMs, Token, TransactionRecord, TxId, TxKind, TxPhase};
use crate::engine::{
    ActionKind, AmmEngine, AmmParams, DepositReceipt, LendingEstimate, LendingEstimator,
    LendingParams, Ledger, Oracle, OracleParams, PoolReserves, RandomSource, ReputationParams,
    ReputationTracker, SimError, SwapQuote,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Decimal places used in human-readable log messages.
const DISPLAY_DP: u32 = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimParams {
    pub amm: AmmParams,
    pub oracle: OracleParams,
    pub lending: LendingParams,
    pub reputation: ReputationParams,
    pub oracle_tick_ms: i64,
    pub confirm_delay_min_ms: i64,
    pub confirm_delay_max_ms: i64,
    pub log_retention: usize,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            amm: AmmParams::default(),
            oracle: OracleParams::default(),
            lending: LendingParams::default(),
            reputation: ReputationParams::default(),
            oracle_tick_ms: 2500,
            confirm_delay_min_ms: 900,
            confirm_delay_max_ms: 2300,
            log_retention: 200,
        }
    }
}

/// Everything a confirmed transaction can mutate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub ledger: Ledger,
    pub oracle: Oracle,
    pub reputation: ReputationTracker,
    pub identity: Option<Address>,
}

/// Persistable view of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub balances: BTreeMap<Token, Decimal>,
    pub pool: PoolReserves,
    pub reputation: Decimal,
    pub oracle_price: Decimal,
    pub oracle_history: Vec<Decimal>,
    pub oracle_volatility: Decimal,
    pub oracle_running: bool,
    /// Confirmations still queued, in firing order.
    pub pending: Vec<PendingSnapshot>,
}

/// A queued confirmation, with its due time relative to the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSnapshot {
    pub id: TxId,
    pub action: PendingAction,
    pub due_in_ms: i64,
}

/// A requested mutation waiting for its confirmation timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum PendingAction {
    #[serde(rename_all = "camelCase")]
    Swap {
        from: Token,
        to: Token,
        amount_in: Decimal,
    },
    Lend {
        collateral: Decimal,
    },
    Governance,
}

impl PendingAction {
    fn kind(&self) -> TxKind {
        match self {
            PendingAction::Swap { .. } => TxKind::Swap,
            PendingAction::Lend { .. } => TxKind::Lend,
            PendingAction::Governance => TxKind::Reputation,
        }
    }

    fn reputation_action(&self) -> ActionKind {
        match self {
            PendingAction::Swap { .. } => ActionKind::Swap,
            PendingAction::Lend { .. } => ActionKind::Lend,
            PendingAction::Governance => ActionKind::Governance,
        }
    }
}

/// Returned to the caller as soon as a request is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingReceipt {
    pub id: TxId,
    pub action: PendingAction,
    pub requested_at: TimeMs,
    pub confirms_at: TimeMs,
    /// Optimistic swap figures at request time; settlement re-prices.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<SwapQuote>,
}

enum Task {
    OracleTick,
    Confirm { id: TxId, action: PendingAction },
}

/// Single-threaded simulation session.
///
/// All mutation happens through `&mut self`, so a confirmation's ledger
/// update is never observable half-applied.
pub struct Session {
    params: SimParams,
    state: SessionState,
    amm: AmmEngine,
    lending: LendingEstimator,
    scheduler: Scheduler<Task>,
    log: TransactionLog,
    rng: Box<dyn RandomSource>,
    notifier: Notifier,
    dirty: bool,
}

impl Session {
    pub fn new(params: SimParams, rng: Box<dyn RandomSource>) -> Self {
        let state = SessionState {
            ledger: Ledger::new(),
            oracle: Oracle::new(params.oracle.clone()),
            reputation: ReputationTracker::new(params.reputation.clone()),
            identity: None,
        };
        let mut scheduler = Scheduler::new();
        scheduler.schedule_after(params.oracle_tick_ms, Task::OracleTick);
        Self {
            amm: AmmEngine::new(params.amm.clone()),
            lending: LendingEstimator::new(params.lending.clone()),
            log: TransactionLog::new(params.log_retention),
            notifier: Notifier::default(),
            params,
            state,
            scheduler,
            rng,
            dirty: false,
        }
    }

    /// Start from persisted state; an invalid snapshot falls back to defaults.
    pub fn from_snapshot(
        params: SimParams,
        rng: Box<dyn RandomSource>,
        snapshot: Option<SessionSnapshot>,
    ) -> Self {
        let mut session = Self::new(params, rng);
        if let Some(snapshot) = snapshot {
            if let Err(e) = session.restore(snapshot) {
                warn!("Ignoring unusable snapshot, starting from defaults: {}", e);
            }
        }
        session.dirty = false;
        session
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn ledger(&self) -> &Ledger {
        &self.state.ledger
    }

    pub fn oracle(&self) -> &Oracle {
        &self.state.oracle
    }

    pub fn reputation(&self) -> &ReputationTracker {
        &self.state.reputation
    }

    pub fn identity(&self) -> Option<&Address> {
        self.state.identity.as_ref()
    }

    pub fn now(&self) -> TimeMs {
        self.scheduler.now()
    }

    pub fn transactions(&self) -> &TransactionLog {
        &self.log
    }

    pub fn pending_count(&self) -> usize {
        self.scheduler
            .count(|t| matches!(t, Task::Confirm { .. }))
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SessionEvent> {
        self.notifier.subscribe()
    }

    /// Identity is informational only; every operation works without it.
    pub fn connect(&mut self, address: Address) {
        self.state.identity = Some(address);
    }

    pub fn disconnect(&mut self) {
        self.state.identity = None;
    }

    /// Whether state changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn quote_swap(&self, from: Token, to: Token, amount_in: Decimal) -> Option<SwapQuote> {
        let quote = self
            .amm
            .quote(&self.state.ledger, &self.state.oracle, from, to, amount_in);
        self.notifier.emit(SessionEvent::QuoteUpdated {
            quote: quote.clone(),
        });
        quote
    }

    pub fn estimate_lending(
        &self,
        collateral: Decimal,
        ltv_percent: Decimal,
    ) -> Result<LendingEstimate, SimError> {
        self.lending
            .estimate(&self.state.oracle, collateral, ltv_percent)
    }

    pub fn request_swap(
        &mut self,
        from: Token,
        to: Token,
        amount_in: Decimal,
    ) -> Result<PendingReceipt, SimError> {
        let estimate = AmmEngine::validate_request(from, to, amount_in)
            .and_then(|_| self.state.ledger.ensure_balance(from, amount_in))
            .and_then(|_| {
                self.amm
                    .try_quote(&self.state.ledger, &self.state.oracle, from, to, amount_in)
            });
        let estimate = match estimate {
            Ok(q) => q,
            Err(e) => return Err(self.reject(e)),
        };
        let action = PendingAction::Swap {
            from,
            to,
            amount_in,
        };
        let message = format!(
            "{} -> ~{} {} (est.)",
            self.describe_pending(&action),
            estimate.amount_out.trunc_dp(DISPLAY_DP),
            to
        );
        Ok(self.enqueue(action, message, Some(estimate)))
    }

    pub fn request_lend(&mut self, collateral: Decimal) -> Result<PendingReceipt, SimError> {
        let token = self.lending.params().collateral_token;
        let checked = self
            .lending
            .validate_request(collateral)
            .and_then(|_| self.state.ledger.ensure_balance(token, collateral));
        if let Err(e) = checked {
            return Err(self.reject(e));
        }
        let action = PendingAction::Lend { collateral };
        let message = self.describe_pending(&action);
        Ok(self.enqueue(action, message, None))
    }

    pub fn request_governance(&mut self) -> PendingReceipt {
        let action = PendingAction::Governance;
        let message = self.describe_pending(&action);
        self.enqueue(action, message, None)
    }

    /// Restore starting balances, reserves and reputation.
    pub fn reset_wallet(&mut self) {
        self.state.ledger.reset_to_defaults();
        self.state.reputation.reset();
        let id = self.new_id();
        self.record(id, TxKind::Info, TxPhase::Notice, "wallet reset".to_string());
        self.emit_balances();
        self.notifier.emit(SessionEvent::ReputationUpdated {
            score: self.state.reputation.score(),
        });
        self.dirty = true;
        info!("Wallet reset to defaults");
    }

    pub fn reset_oracle(&mut self) {
        self.state.oracle.reset();
        self.emit_price();
        self.dirty = true;
    }

    pub fn set_oracle_running(&mut self, running: bool) {
        self.state.oracle.set_running(running);
        self.dirty = true;
        info!("Oracle {}", if running { "resumed" } else { "paused" });
    }

    pub fn set_volatility(&mut self, volatility: Decimal) -> Result<(), SimError> {
        self.state.oracle.set_volatility(volatility)?;
        self.dirty = true;
        Ok(())
    }

    /// Run every task due up to `until` in due order, then park the clock there.
    pub fn advance_to(&mut self, until: TimeMs) {
        while let Some((_, task)) = self.scheduler.pop_due(until) {
            self.run(task);
        }
        self.scheduler.advance_clock(until);
    }

    pub fn advance_by(&mut self, ms: i64) {
        let until = self.now().plus(ms.max(0));
        self.advance_to(until);
    }

    /// Advance far enough that every currently pending confirmation fires.
    pub fn settle_pending(&mut self) {
        self.advance_by(self.params.confirm_delay_max_ms);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let oracle = &self.state.oracle;
        let now = self.now();
        let pending = self
            .scheduler
            .entries()
            .into_iter()
            .filter_map(|(due, task)| match *task {
                Task::Confirm { id, action } => Some(PendingSnapshot {
                    id,
                    action,
                    due_in_ms: (due.as_ms() - now.as_ms()).max(0),
                }),
                Task::OracleTick => None,
            })
            .collect();
        SessionSnapshot {
            balances: self.state.ledger.balances().clone(),
            pool: self.state.ledger.pool(),
            reputation: self.state.reputation.score(),
            oracle_price: oracle.reference_price(),
            oracle_history: oracle.history().copied().collect(),
            oracle_volatility: oracle.volatility(),
            oracle_running: oracle.is_running(),
            pending,
        }
    }

    /// Replace ledger, oracle, reputation and queued confirmations.
    /// Validates everything before touching the live state.
    pub fn restore(&mut self, snapshot: SessionSnapshot) -> Result<(), SimError> {
        for p in &snapshot.pending {
            match p.action {
                PendingAction::Swap {
                    from,
                    to,
                    amount_in,
                } => AmmEngine::validate_request(from, to, amount_in)?,
                PendingAction::Lend { collateral } => self.lending.validate_request(collateral)?,
                PendingAction::Governance => {}
            }
        }
        let ledger = Ledger::from_parts(snapshot.balances, snapshot.pool)?;
        let oracle = Oracle::restore(
            self.params.oracle.clone(),
            snapshot.oracle_price,
            snapshot.oracle_history,
            snapshot.oracle_volatility,
            snapshot.oracle_running,
        )?;
        let reputation =
            ReputationTracker::with_score(self.params.reputation.clone(), snapshot.reputation);
        self.state.ledger = ledger;
        self.state.oracle = oracle;
        self.state.reputation = reputation;

        self.scheduler.retain(|t| matches!(t, Task::OracleTick));
        let max_delay = self.params.confirm_delay_max_ms.max(0);
        for p in snapshot.pending {
            self.scheduler.schedule_after(
                p.due_in_ms.clamp(0, max_delay),
                Task::Confirm {
                    id: p.id,
                    action: p.action,
                },
            );
            let message = format!("{} (restored)", self.describe_pending(&p.action));
            self.record(p.id, p.action.kind(), TxPhase::Pending, message);
        }
        self.dirty = true;
        Ok(())
    }

    fn new_id(&mut self) -> TxId {
        let mut bytes = [0u8; 16];
        self.rng.fill_bytes(&mut bytes);
        TxId::from_random_bytes(bytes)
    }

    fn confirmation_delay(&mut self) -> i64 {
        let min = self.params.confirm_delay_min_ms;
        let max = self.params.confirm_delay_max_ms.max(min);
        let drawn = self.rng.uniform(min as f64, (max + 1) as f64).floor() as i64;
        drawn.clamp(min, max)
    }

    fn describe_pending(&self, action: &PendingAction) -> String {
        match *action {
            PendingAction::Swap { from, amount_in, .. } => {
                format!("swap pending: -{} {}", amount_in.trunc_dp(DISPLAY_DP), from)
            }
            PendingAction::Lend { collateral } => format!(
                "collateral deposit pending: {} {}",
                collateral.trunc_dp(DISPLAY_DP),
                self.lending.params().collateral_token
            ),
            PendingAction::Governance => "governance vote pending".to_string(),
        }
    }

    fn reject(&self, err: SimError) -> SimError {
        debug!("Request rejected: {}", err);
        self.notifier.emit(SessionEvent::Rejected {
            reason: err.to_string(),
        });
        err
    }

    fn enqueue(
        &mut self,
        action: PendingAction,
        message: String,
        estimate: Option<SwapQuote>,
    ) -> PendingReceipt {
        let id = self.new_id();
        let delay = self.confirmation_delay();
        let requested_at = self.now();
        let confirms_at = self
            .scheduler
            .schedule_after(delay, Task::Confirm { id, action });
        self.record(id, action.kind(), TxPhase::Pending, message);
        self.dirty = true;
        info!("Transaction {} pending, confirms at {}ms", id, confirms_at.as_ms());
        PendingReceipt {
            id,
            action,
            requested_at,
            confirms_at,
            estimate,
        }
    }

    fn run(&mut self, task: Task) {
        match task {
            Task::OracleTick => {
                if let Some(price) = self.state.oracle.tick(self.rng.as_mut()) {
                    debug!("Oracle tick: IFX/USD {}", price);
                    self.emit_price();
                    self.dirty = true;
                }
                self.scheduler
                    .schedule_after(self.params.oracle_tick_ms.max(1), Task::OracleTick);
            }
            Task::Confirm { id, action } => self.confirm(id, action),
        }
    }

    fn confirm(&mut self, id: TxId, action: PendingAction) {
        let settled = match action {
            PendingAction::Swap {
                from,
                to,
                amount_in,
            } => self
                .amm
                .execute(
                    &mut self.state.ledger,
                    &self.state.oracle,
                    from,
                    to,
                    amount_in,
                )
                .map(|q| {
                    format!(
                        "swap confirmed: -{} {} -> +{} {} | impact {}%",
                        q.amount_in.trunc_dp(DISPLAY_DP),
                        from,
                        q.amount_out.trunc_dp(DISPLAY_DP),
                        to,
                        q.price_impact_percent.trunc_dp(3)
                    )
                }),
            PendingAction::Lend { collateral } => self
                .lending
                .execute(&mut self.state.ledger, &self.state.oracle, collateral)
                .map(|r: DepositReceipt| {
                    format!(
                        "collateral deposited: {} {} | bonus {} USD",
                        r.collateral_amount.trunc_dp(2),
                        r.token,
                        r.bonus_usd.trunc_dp(2)
                    )
                }),
            PendingAction::Governance => Ok("governance vote confirmed".to_string()),
        };

        let kind = action.kind();
        match settled {
            Ok(message) => {
                info!("Transaction {} confirmed", id);
                self.record(id, kind, TxPhase::Confirmed, message);
                if kind != TxKind::Reputation {
                    self.emit_balances();
                }
                self.credit_reputation(id, action.reputation_action());
            }
            Err(e) => {
                warn!("Transaction {} failed at confirmation: {}", id, e);
                self.record(id, kind, TxPhase::Failed, format!("failed: {}", e));
            }
        }
        self.dirty = true;
    }

    fn credit_reputation(&mut self, id: TxId, action: ActionKind) {
        let delta = self.state.reputation.delta_for(action);
        let score = self.state.reputation.apply(action);
        self.record(
            id,
            TxKind::Reputation,
            TxPhase::Notice,
            format!("action '{}' recorded: +{} RP", action, delta),
        );
        self.notifier
            .emit(SessionEvent::ReputationUpdated { score });
    }

    fn record(&mut self, id: TxId, kind: TxKind, phase: TxPhase, message: String) {
        let now = self.now();
        let record: TransactionRecord = self.log.append(id, now, kind, phase, message).clone();
        self.notifier
            .emit(SessionEvent::TransactionRecorded { record });
    }

    fn emit_balances(&self) {
        self.notifier.emit(SessionEvent::BalancesUpdated {
            balances: self.state.ledger.balances().clone(),
            pool: self.state.ledger.pool(),
        });
    }

    fn emit_price(&self) {
        self.notifier.emit(SessionEvent::PriceUpdated {
            price: self.state.oracle.reference_price(),
            delta: self.state.oracle.last_delta(),
        });
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("now", &self.now())
            .field("state", &self.state)
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}
