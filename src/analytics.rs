use rusqlite::ToSql;
use serde::Serialize;

use crate::error::{CleanError, CleanResult};
use crate::lexicon::KEY_COUNTERPARTY_KEYWORDS;
use crate::store::TransactionStore;

/// Monthly inflow/outflow totals, both reported as positive magnitudes.
#[derive(Debug, Clone, Serialize)]
pub struct TrendPoint {
    pub month: String,
    pub inflow_cents: i64,
    pub outflow_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CounterpartyStat {
    pub counterparty_name: String,
    pub tx_count: i64,
    pub net_cents: i64,
    pub income_count: i64,
    pub income_cents: i64,
    pub expense_count: i64,
    pub expense_cents: i64,
}

/// A counterparty whose name matches one of the fixed investigation
/// keywords (tobacco shops, repair shops, scrap metal buyers and the like).
#[derive(Debug, Clone, Serialize)]
pub struct KeyCounterparty {
    pub counterparty_name: String,
    pub keyword: String,
    pub tx_count: i64,
    pub income_cents: i64,
    pub expense_cents: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatFilter {
    All,
    IncomeOnly,
    ExpenseOnly,
    /// One direction dominates the other by more than 3:1, both present.
    HighRatio,
}

fn push_amount_bounds(
    sql: &mut String,
    args: &mut Vec<Box<dyn ToSql>>,
    owner: Option<&str>,
    min_abs_cents: Option<i64>,
    max_abs_cents: Option<i64>,
) {
    if let Some(owner) = owner {
        args.push(Box::new(owner.to_string()));
        sql.push_str(&format!(" AND owner_name = ?{}", args.len()));
    }
    if let Some(min) = min_abs_cents {
        args.push(Box::new(min));
        sql.push_str(&format!(" AND ABS(amount_cents) >= ?{}", args.len()));
    }
    if let Some(max) = max_abs_cents {
        args.push(Box::new(max));
        sql.push_str(&format!(" AND ABS(amount_cents) <= ?{}", args.len()));
    }
}

/// Per-month inflow and outflow for a case, optionally restricted to one
/// owner and an |amount| band. Months are `%Y-%m`, ascending.
pub fn get_trend(
    store: &TransactionStore,
    case_id: &str,
    owner: Option<&str>,
    min_abs_cents: Option<i64>,
    max_abs_cents: Option<i64>,
) -> CleanResult<Vec<TrendPoint>> {
    let mut sql = String::from(
        "SELECT substr(trans_time, 1, 7) AS month,
                COALESCE(SUM(CASE WHEN amount_cents > 0 THEN amount_cents ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN amount_cents < 0 THEN -amount_cents ELSE 0 END), 0)
         FROM transactions WHERE case_id = ?1",
    );
    let mut args: Vec<Box<dyn ToSql>> = vec![Box::new(case_id.to_string())];
    push_amount_bounds(&mut sql, &mut args, owner, min_abs_cents, max_abs_cents);
    sql.push_str(" GROUP BY month ORDER BY month ASC");

    let mut stmt = store
        .connection()
        .prepare(&sql)
        .map_err(CleanError::StoreReadFailure)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(args.iter()), |row| {
            Ok(TrendPoint {
                month: row.get(0)?,
                inflow_cents: row.get(1)?,
                outflow_cents: row.get(2)?,
            })
        })
        .map_err(CleanError::StoreReadFailure)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(CleanError::StoreReadFailure)?);
    }
    Ok(out)
}

fn load_counterparty_stats(
    store: &TransactionStore,
    case_id: &str,
    owner: Option<&str>,
) -> CleanResult<Vec<CounterpartyStat>> {
    let mut sql = String::from(
        "SELECT counterparty_name,
                COUNT(*),
                COALESCE(SUM(amount_cents), 0),
                COALESCE(SUM(CASE WHEN amount_cents > 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN amount_cents > 0 THEN amount_cents ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN amount_cents < 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN amount_cents < 0 THEN -amount_cents ELSE 0 END), 0)
         FROM transactions WHERE case_id = ?1 AND counterparty_name != ''",
    );
    let mut args: Vec<Box<dyn ToSql>> = vec![Box::new(case_id.to_string())];
    push_amount_bounds(&mut sql, &mut args, owner, None, None);
    sql.push_str(" GROUP BY counterparty_name ORDER BY ABS(SUM(amount_cents)) DESC, counterparty_name ASC");

    let mut stmt = store
        .connection()
        .prepare(&sql)
        .map_err(CleanError::StoreReadFailure)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(args.iter()), |row| {
            Ok(CounterpartyStat {
                counterparty_name: row.get(0)?,
                tx_count: row.get(1)?,
                net_cents: row.get(2)?,
                income_count: row.get(3)?,
                income_cents: row.get(4)?,
                expense_count: row.get(5)?,
                expense_cents: row.get(6)?,
            })
        })
        .map_err(CleanError::StoreReadFailure)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(CleanError::StoreReadFailure)?);
    }
    Ok(out)
}

/// Per-counterparty aggregates ordered by |net| descending.
pub fn get_statistics(
    store: &TransactionStore,
    case_id: &str,
    owner: Option<&str>,
    filter: StatFilter,
) -> CleanResult<Vec<CounterpartyStat>> {
    let stats = load_counterparty_stats(store, case_id, owner)?;
    let kept = stats
        .into_iter()
        .filter(|s| match filter {
            StatFilter::All => true,
            StatFilter::IncomeOnly => s.income_count > 0 && s.expense_count == 0,
            StatFilter::ExpenseOnly => s.expense_count > 0 && s.income_count == 0,
            StatFilter::HighRatio => {
                (s.income_cents > s.expense_cents * 3 && s.expense_cents > 0)
                    || (s.expense_cents > s.income_cents * 3 && s.income_cents > 0)
            }
        })
        .collect();
    Ok(kept)
}

/// Counterparties whose name contains a fixed investigation keyword,
/// ordered by transaction count descending. The first matching keyword is
/// reported.
pub fn get_key_counterparties(
    store: &TransactionStore,
    case_id: &str,
) -> CleanResult<Vec<KeyCounterparty>> {
    let stats = load_counterparty_stats(store, case_id, None)?;
    let mut out: Vec<KeyCounterparty> = stats
        .into_iter()
        .filter_map(|s| {
            let keyword = KEY_COUNTERPARTY_KEYWORDS
                .iter()
                .find(|kw| s.counterparty_name.contains(*kw))?;
            Some(KeyCounterparty {
                counterparty_name: s.counterparty_name,
                keyword: (*keyword).to_string(),
                tx_count: s.tx_count,
                income_cents: s.income_cents,
                expense_cents: s.expense_cents,
            })
        })
        .collect();
    out.sort_by(|a, b| {
        b.tx_count
            .cmp(&a.tx_count)
            .then_with(|| a.counterparty_name.cmp(&b.counterparty_name))
    });
    Ok(out)
}
