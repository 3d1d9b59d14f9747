//! Credit ledger.
//!
//! Every credit movement appends an immutable row to `credit_transactions`
//! and adjusts the materialized `users.credit` balance in the same write
//! transaction, so the balance always equals the sum of the user's entries.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use carebook_shared::{CoreError, Plan, Role, TransactionType};

use crate::codec::{parse_enum, parse_ts, parse_uuid, ts};
use crate::database::Database;
use crate::error::Result;
use crate::models::{Balances, CreditTransaction, User};
use crate::users::{missing_user, user_by_id};

const TRANSACTION_COLUMNS: &str = "id, user_id, amount, type, package_id, created_at";

impl Database {
    /// Move `amount` credits from one user to another atomically.
    pub fn transfer(&mut self, from: Uuid, to: Uuid, amount: i64) -> Result<Balances> {
        let tx = self.write_tx()?;
        let balances = transfer_in(&tx, from, to, amount, Utc::now())?;
        tx.commit()?;

        tracing::info!(from = %from, to = %to, amount, "credits transferred");
        Ok(balances)
    }

    /// Grant the monthly credits of `plan` unless they were already granted
    /// this calendar month for the same plan.
    ///
    /// Users other than patients, and callers without an active plan, are
    /// returned unchanged. `now` decides the calendar month (in its own time
    /// zone) and stamps the new entry.
    pub fn allocate_if_due<Tz: TimeZone>(
        &mut self,
        user_id: Uuid,
        plan: Option<Plan>,
        now: &DateTime<Tz>,
    ) -> Result<User> {
        let tx = self.write_tx()?;
        let user = user_by_id(&tx, user_id).map_err(missing_user)?;
        let latest = latest_allocation(&tx, user_id)?;

        let Some(plan) = allocation_due(user.role, plan, latest.as_ref(), now) else {
            return Ok(user);
        };

        let credits = plan.monthly_credits();
        append_entry(
            &tx,
            user_id,
            credits,
            TransactionType::CreditPurchase,
            Some(plan.id()),
            now.with_timezone(&Utc),
        )?;
        adjust_balance(&tx, user_id, credits)?;
        let user = user_by_id(&tx, user_id)?;
        tx.commit()?;

        tracing::info!(user = %user_id, plan = %plan, credits, "monthly credits allocated");
        Ok(user)
    }

    /// Ledger entries of a user, newest first.
    pub fn transactions_for_user(&self, user_id: Uuid) -> Result<Vec<CreditTransaction>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS}
             FROM credit_transactions
             WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(params![user_id.to_string()], row_to_transaction)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn balance(&self, user_id: Uuid) -> Result<i64> {
        Ok(self.get_user(user_id).map_err(missing_user)?.credit)
    }
}

/// Decide whether a monthly allocation is owed, and for which plan.
///
/// Pure function of the user's role, the active plan and the most recent
/// allocation entry: the ledger itself records what was already granted.
pub fn allocation_due<Tz: TimeZone>(
    role: Role,
    plan: Option<Plan>,
    latest_allocation: Option<&CreditTransaction>,
    now: &DateTime<Tz>,
) -> Option<Plan> {
    if !role.receives_plan_credits() {
        return None;
    }
    let plan = plan?;

    if let Some(latest) = latest_allocation {
        let granted = latest.created_at.with_timezone(&now.timezone());
        let same_month = granted.year() == now.year() && granted.month() == now.month();
        if same_month && latest.package_id.as_deref() == Some(plan.id()) {
            return None;
        }
    }

    Some(plan)
}

/// Transfer inside an open write transaction. The caller commits.
pub(crate) fn transfer_in(
    conn: &Connection,
    from: Uuid,
    to: Uuid,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<Balances> {
    if amount <= 0 {
        return Err(CoreError::InvalidInput("transfer amount must be positive").into());
    }
    if from == to {
        return Err(CoreError::InvalidInput("cannot transfer credits to the same user").into());
    }

    let payer = user_by_id(conn, from).map_err(missing_user)?;
    let payee = user_by_id(conn, to).map_err(missing_user)?;
    if payer.credit < amount {
        return Err(CoreError::InsufficientCredit.into());
    }

    append_entry(conn, from, -amount, TransactionType::AppointmentDeduction, None, now)?;
    append_entry(conn, to, amount, TransactionType::AppointmentDeduction, None, now)?;
    adjust_balance(conn, from, -amount)?;
    adjust_balance(conn, to, amount)?;

    Ok(Balances {
        from_balance: payer.credit - amount,
        to_balance: payee.credit + amount,
    })
}

fn append_entry(
    conn: &Connection,
    user_id: Uuid,
    amount: i64,
    kind: TransactionType,
    package_id: Option<&str>,
    created_at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO credit_transactions (id, user_id, amount, type, package_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            Uuid::new_v4().to_string(),
            user_id.to_string(),
            amount,
            kind.as_str(),
            package_id,
            ts(&created_at),
        ],
    )?;
    Ok(())
}

fn adjust_balance(conn: &Connection, user_id: Uuid, delta: i64) -> Result<()> {
    conn.execute(
        "UPDATE users SET credit = credit + ?1, updated_at = ?2 WHERE id = ?3",
        params![delta, ts(&Utc::now()), user_id.to_string()],
    )?;
    Ok(())
}

fn latest_allocation(conn: &Connection, user_id: Uuid) -> Result<Option<CreditTransaction>> {
    let found = conn
        .query_row(
            &format!(
                "SELECT {TRANSACTION_COLUMNS}
                 FROM credit_transactions
                 WHERE user_id = ?1 AND type = ?2
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT 1"
            ),
            params![
                user_id.to_string(),
                TransactionType::CreditPurchase.as_str()
            ],
            row_to_transaction,
        )
        .optional()?;
    Ok(found)
}

fn row_to_transaction(row: &rusqlite::Row<'_>) -> rusqlite::Result<CreditTransaction> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let kind: String = row.get(3)?;
    let created: String = row.get(5)?;

    Ok(CreditTransaction {
        id: parse_uuid(0, &id)?,
        user_id: parse_uuid(1, &user_id)?,
        amount: row.get(2)?,
        kind: parse_enum(3, &kind, TransactionType::parse)?,
        package_id: row.get(4)?,
        created_at: parse_ts(5, &created)?,
    })
}
