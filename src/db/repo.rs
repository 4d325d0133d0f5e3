//! SQLite-backed snapshot repository.

use super::{PersistenceError, SnapshotStore};
use crate::domain::{Decimal, Token, TxId};
use crate::engine::PoolReserves;
use crate::lifecycle::{PendingAction, PendingSnapshot, SessionSnapshot};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Stores the single session snapshot as canonical decimal strings.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Overwrite the stored snapshot in one transaction.
    pub async fn write_snapshot(&self, snapshot: &SessionSnapshot) -> Result<(), PersistenceError> {
        let history: Vec<String> = snapshot
            .oracle_history
            .iter()
            .map(Decimal::to_canonical_string)
            .collect();
        let history_json = serde_json::to_string(&history)
            .map_err(|e| PersistenceError::Corrupt(e.to_string()))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO session_state (
                id, reputation, oracle_price, oracle_volatility,
                oracle_running, oracle_history, saved_at
            ) VALUES (1, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                reputation = excluded.reputation,
                oracle_price = excluded.oracle_price,
                oracle_volatility = excluded.oracle_volatility,
                oracle_running = excluded.oracle_running,
                oracle_history = excluded.oracle_history,
                saved_at = excluded.saved_at
            "#,
        )
        .bind(snapshot.reputation.to_canonical_string())
        .bind(snapshot.oracle_price.to_canonical_string())
        .bind(snapshot.oracle_volatility.to_canonical_string())
        .bind(snapshot.oracle_running)
        .bind(history_json)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM session_balances")
            .execute(&mut *tx)
            .await?;
        for (token, amount) in &snapshot.balances {
            sqlx::query("INSERT INTO session_balances (token, amount) VALUES (?, ?)")
                .bind(token.as_str())
                .bind(amount.to_canonical_string())
                .execute(&mut *tx)
                .await?;
        }

        for (token, amount) in [
            (Token::Ifx, snapshot.pool.ifx),
            (Token::World, snapshot.pool.world),
        ] {
            sqlx::query(
                r#"
                INSERT INTO session_reserves (token, amount) VALUES (?, ?)
                ON CONFLICT(token) DO UPDATE SET amount = excluded.amount
                "#,
            )
            .bind(token.as_str())
            .bind(amount.to_canonical_string())
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM session_pending")
            .execute(&mut *tx)
            .await?;
        for (position, pending) in snapshot.pending.iter().enumerate() {
            let (action, from, to, amount) = match pending.action {
                PendingAction::Swap {
                    from,
                    to,
                    amount_in,
                } => ("swap", Some(from.as_str()), Some(to.as_str()), Some(amount_in)),
                PendingAction::Lend { collateral } => ("lend", None, None, Some(collateral)),
                PendingAction::Governance => ("governance", None, None, None),
            };
            sqlx::query(
                r#"
                INSERT INTO session_pending (
                    position, tx_id, action, from_token, to_token, amount, due_in_ms
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(position as i64)
            .bind(pending.id.to_string())
            .bind(action)
            .bind(from)
            .bind(to)
            .bind(amount.map(|a| a.to_canonical_string()))
            .bind(pending.due_in_ms)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn read_snapshot(&self) -> Result<Option<SessionSnapshot>, PersistenceError> {
        let Some(row) = sqlx::query(
            r#"
            SELECT reputation, oracle_price, oracle_volatility, oracle_running, oracle_history
            FROM session_state WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let history_json: String = row.get("oracle_history");
        let history: Vec<String> = serde_json::from_str(&history_json)
            .map_err(|e| PersistenceError::Corrupt(format!("oracle_history: {}", e)))?;
        let oracle_history = history
            .iter()
            .map(|s| parse_decimal("oracle_history", s))
            .collect::<Result<Vec<_>, _>>()?;

        let mut balances = BTreeMap::new();
        for row in sqlx::query("SELECT token, amount FROM session_balances")
            .fetch_all(&self.pool)
            .await?
        {
            let (token, amount) = parse_token_row(&row)?;
            balances.insert(token, amount);
        }

        let mut reserves = BTreeMap::new();
        for row in sqlx::query("SELECT token, amount FROM session_reserves")
            .fetch_all(&self.pool)
            .await?
        {
            let (token, amount) = parse_token_row(&row)?;
            reserves.insert(token, amount);
        }
        let reserve = |token: Token| {
            reserves
                .get(&token)
                .copied()
                .ok_or_else(|| PersistenceError::Corrupt(format!("missing {} reserve", token)))
        };
        let pool = PoolReserves {
            ifx: reserve(Token::Ifx)?,
            world: reserve(Token::World)?,
        };

        let pending = sqlx::query(
            r#"
            SELECT tx_id, action, from_token, to_token, amount, due_in_ms
            FROM session_pending ORDER BY position
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(parse_pending_row)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(SessionSnapshot {
            balances,
            pool,
            reputation: parse_decimal("reputation", row.get("reputation"))?,
            oracle_price: parse_decimal("oracle_price", row.get("oracle_price"))?,
            oracle_history,
            oracle_volatility: parse_decimal("oracle_volatility", row.get("oracle_volatility"))?,
            oracle_running: row.get("oracle_running"),
            pending,
        }))
    }
}

fn parse_decimal(column: &str, value: &str) -> Result<Decimal, PersistenceError> {
    Decimal::from_str(value)
        .map_err(|e| PersistenceError::Corrupt(format!("{}: {} ({})", column, value, e)))
}

fn parse_token_row(row: &sqlx::sqlite::SqliteRow) -> Result<(Token, Decimal), PersistenceError> {
    let symbol: String = row.get("token");
    let token = Token::from_str(&symbol)
        .map_err(|e| PersistenceError::Corrupt(e.to_string()))?;
    let amount: String = row.get("amount");
    Ok((token, parse_decimal("amount", &amount)?))
}

fn parse_pending_row(row: &sqlx::sqlite::SqliteRow) -> Result<PendingSnapshot, PersistenceError> {
    let raw_id: String = row.get("tx_id");
    let id = TxId::parse_str(&raw_id)
        .map_err(|e| PersistenceError::Corrupt(format!("tx_id: {} ({})", raw_id, e)))?;

    let token = |column: &str| -> Result<Token, PersistenceError> {
        let symbol: Option<String> = row.get(column);
        let symbol = symbol.ok_or_else(|| PersistenceError::Corrupt(format!("{}: missing", column)))?;
        Token::from_str(&symbol).map_err(|e| PersistenceError::Corrupt(e.to_string()))
    };
    let amount = || -> Result<Decimal, PersistenceError> {
        let raw: Option<String> = row.get("amount");
        let raw = raw.ok_or_else(|| PersistenceError::Corrupt("amount: missing".to_string()))?;
        parse_decimal("amount", &raw)
    };

    let kind: String = row.get("action");
    let action = match kind.as_str() {
        "swap" => PendingAction::Swap {
            from: token("from_token")?,
            to: token("to_token")?,
            amount_in: amount()?,
        },
        "lend" => PendingAction::Lend {
            collateral: amount()?,
        },
        "governance" => PendingAction::Governance,
        other => return Err(PersistenceError::Corrupt(format!("action: {}", other))),
    };

    Ok(PendingSnapshot {
        id,
        action,
        due_in_ms: row.get("due_in_ms"),
    })
}

#[async_trait]
impl SnapshotStore for Repository {
    async fn load_snapshot(&self) -> Result<Option<SessionSnapshot>, PersistenceError> {
        self.read_snapshot().await
    }

    async fn save_snapshot(&self, snapshot: &SessionSnapshot) -> Result<(), PersistenceError> {
        self.write_snapshot(snapshot).await
    }
}
