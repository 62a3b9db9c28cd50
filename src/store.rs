use chrono::NaiveDateTime;
use rusqlite::{params, Connection, ToSql};
use std::path::Path;

use crate::error::{CleanError, CleanResult};
use crate::types::{CanonicalTransaction, PersonRole};

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY,
    case_id TEXT NOT NULL,
    case_name TEXT NOT NULL,
    person_role TEXT NOT NULL,
    bill_source TEXT NOT NULL DEFAULT '',
    owner_name TEXT NOT NULL DEFAULT '',
    owner_id TEXT NOT NULL DEFAULT '',
    owner_account TEXT NOT NULL DEFAULT '',
    trans_time TEXT NOT NULL,
    amount_cents INTEGER NOT NULL,
    trans_type TEXT NOT NULL DEFAULT '',
    direction TEXT NOT NULL DEFAULT '',
    method TEXT NOT NULL DEFAULT '',
    counterparty_name TEXT NOT NULL DEFAULT '',
    counterparty_account TEXT NOT NULL DEFAULT '',
    trans_order_id TEXT NOT NULL DEFAULT '',
    merchant_order_id TEXT NOT NULL DEFAULT '',
    remark TEXT NOT NULL DEFAULT '',
    raw_file_name TEXT NOT NULL DEFAULT '',
    import_batch TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS import_batches (
    id TEXT PRIMARY KEY,
    case_id TEXT NOT NULL,
    source_file TEXT NOT NULL,
    file_sha1 TEXT NOT NULL,
    imported_count INTEGER NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_tx_case ON transactions(case_id);
CREATE INDEX IF NOT EXISTS idx_tx_time ON transactions(case_id, trans_time);
CREATE INDEX IF NOT EXISTS idx_tx_owner ON transactions(case_id, owner_name);
CREATE INDEX IF NOT EXISTS idx_tx_counterparty ON transactions(case_id, counterparty_name);
CREATE INDEX IF NOT EXISTS idx_tx_order ON transactions(trans_order_id);
CREATE INDEX IF NOT EXISTS idx_tx_merchant_order ON transactions(merchant_order_id);
"#;

/// Identity of one committed import. `imported_count` is the number of rows
/// that survived validation, not the raw row count.
#[derive(Debug, Clone)]
pub struct BatchMeta {
    pub id: String,
    pub case_id: String,
    pub source_file: String,
    pub file_sha1: String,
}

/// Query predicates for `TransactionStore::query`. All are optional and
/// combine with AND; amount bounds apply to |amount_cents|.
#[derive(Debug, Clone, Default)]
pub struct TxFilter {
    pub owner_name: Option<String>,
    pub time_from: Option<NaiveDateTime>,
    pub time_to: Option<NaiveDateTime>,
    pub min_abs_cents: Option<i64>,
    pub max_abs_cents: Option<i64>,
}

/// Case transaction store over one SQLite connection. The schema is
/// bootstrapped on open; committed rows are immutable and only removed via
/// `purge_case`.
pub struct TransactionStore {
    conn: Connection,
}

impl TransactionStore {
    pub fn open(db_path: &Path) -> CleanResult<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path).map_err(CleanError::StoreWriteFailure)?;
        Self::bootstrap(conn)
    }

    pub fn open_in_memory() -> CleanResult<Self> {
        let conn = Connection::open_in_memory().map_err(CleanError::StoreWriteFailure)?;
        Self::bootstrap(conn)
    }

    fn bootstrap(conn: Connection) -> CleanResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .and_then(|_| conn.execute_batch(SCHEMA_SQL))
            .map_err(CleanError::StoreWriteFailure)?;
        Ok(TransactionStore { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Commit one file's surviving rows plus its batch row. All-or-nothing:
    /// any insert failure rolls the whole batch back.
    pub fn append(
        &mut self,
        batch: &BatchMeta,
        records: &[CanonicalTransaction],
    ) -> CleanResult<usize> {
        self.append_batch(batch, records)
            .map_err(CleanError::StoreWriteFailure)?;
        log::info!(
            "store: batch {} committed {} rows ({})",
            batch.id,
            records.len(),
            batch.source_file
        );
        Ok(records.len())
    }

    fn append_batch(
        &mut self,
        batch: &BatchMeta,
        records: &[CanonicalTransaction],
    ) -> rusqlite::Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO import_batches (id, case_id, source_file, file_sha1, imported_count)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                batch.id,
                batch.case_id,
                batch.source_file,
                batch.file_sha1,
                records.len() as i64
            ],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO transactions (
                    id, case_id, case_name, person_role, bill_source,
                    owner_name, owner_id, owner_account, trans_time, amount_cents,
                    trans_type, direction, method, counterparty_name, counterparty_account,
                    trans_order_id, merchant_order_id, remark, raw_file_name, import_batch
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                          ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            )?;
            for r in records {
                stmt.execute(params![
                    r.id,
                    r.case_id,
                    r.case_name,
                    r.person_role.label(),
                    r.bill_source,
                    r.owner_name,
                    r.owner_id,
                    r.owner_account,
                    r.trans_time.format(TIME_FORMAT).to_string(),
                    r.amount_cents,
                    r.trans_type,
                    r.direction,
                    r.method,
                    r.counterparty_name,
                    r.counterparty_account,
                    r.trans_order_id,
                    r.merchant_order_id,
                    r.remark,
                    r.raw_file_name,
                    r.import_batch,
                ])?;
            }
        }
        tx.commit()
    }

    pub fn query(
        &self,
        case_id: &str,
        filter: &TxFilter,
    ) -> CleanResult<Vec<CanonicalTransaction>> {
        let mut sql = String::from(
            "SELECT id, case_id, case_name, person_role, bill_source,
                    owner_name, owner_id, owner_account, trans_time, amount_cents,
                    trans_type, direction, method, counterparty_name, counterparty_account,
                    trans_order_id, merchant_order_id, remark, raw_file_name, import_batch
             FROM transactions WHERE case_id = ?1",
        );
        let mut args: Vec<Box<dyn ToSql>> = vec![Box::new(case_id.to_string())];
        if let Some(owner) = &filter.owner_name {
            args.push(Box::new(owner.clone()));
            sql.push_str(&format!(" AND owner_name = ?{}", args.len()));
        }
        if let Some(from) = filter.time_from {
            args.push(Box::new(from.format(TIME_FORMAT).to_string()));
            sql.push_str(&format!(" AND trans_time >= ?{}", args.len()));
        }
        if let Some(to) = filter.time_to {
            args.push(Box::new(to.format(TIME_FORMAT).to_string()));
            sql.push_str(&format!(" AND trans_time <= ?{}", args.len()));
        }
        if let Some(min) = filter.min_abs_cents {
            args.push(Box::new(min));
            sql.push_str(&format!(" AND ABS(amount_cents) >= ?{}", args.len()));
        }
        if let Some(max) = filter.max_abs_cents {
            args.push(Box::new(max));
            sql.push_str(&format!(" AND ABS(amount_cents) <= ?{}", args.len()));
        }
        sql.push_str(" ORDER BY trans_time ASC, id ASC");

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(CleanError::StoreReadFailure)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), row_to_transaction)
            .map_err(CleanError::StoreReadFailure)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(CleanError::StoreReadFailure)?);
        }
        Ok(out)
    }

    /// The only destruction path: remove a case's transactions and batch
    /// rows together.
    pub fn purge_case(&mut self, case_id: &str) -> CleanResult<(usize, usize)> {
        let (tx_rows, batch_rows) = self
            .purge_rows(case_id)
            .map_err(CleanError::StoreWriteFailure)?;
        log::info!("store: purged case {case_id} ({tx_rows} rows, {batch_rows} batches)");
        Ok((tx_rows, batch_rows))
    }

    fn purge_rows(&mut self, case_id: &str) -> rusqlite::Result<(usize, usize)> {
        let tx = self.conn.transaction()?;
        let tx_rows = tx.execute("DELETE FROM transactions WHERE case_id = ?1", [case_id])?;
        let batch_rows = tx.execute("DELETE FROM import_batches WHERE case_id = ?1", [case_id])?;
        tx.commit()?;
        Ok((tx_rows, batch_rows))
    }

    pub fn count_case(&self, case_id: &str) -> CleanResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM transactions WHERE case_id = ?1",
                [case_id],
                |row| row.get(0),
            )
            .map_err(CleanError::StoreReadFailure)
    }
}

fn row_to_transaction(row: &rusqlite::Row<'_>) -> rusqlite::Result<CanonicalTransaction> {
    let role_text: String = row.get(3)?;
    let person_role = PersonRole::parse(&role_text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            Box::<dyn std::error::Error + Send + Sync>::from(e.to_string()),
        )
    })?;
    let time_text: String = row.get(8)?;
    let trans_time = NaiveDateTime::parse_from_str(&time_text, TIME_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(CanonicalTransaction {
        id: row.get(0)?,
        case_id: row.get(1)?,
        case_name: row.get(2)?,
        person_role,
        bill_source: row.get(4)?,
        owner_name: row.get(5)?,
        owner_id: row.get(6)?,
        owner_account: row.get(7)?,
        trans_time,
        amount_cents: row.get(9)?,
        trans_type: row.get(10)?,
        direction: row.get(11)?,
        method: row.get(12)?,
        counterparty_name: row.get(13)?,
        counterparty_account: row.get(14)?,
        trans_order_id: row.get(15)?,
        merchant_order_id: row.get(16)?,
        remark: row.get(17)?,
        raw_file_name: row.get(18)?,
        import_batch: row.get(19)?,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    pub fn tx(
        case_id: &str,
        role: PersonRole,
        owner: &str,
        counterparty: &str,
        time: &str,
        amount_cents: i64,
    ) -> CanonicalTransaction {
        let day = NaiveDateTime::parse_from_str(time, TIME_FORMAT)
            .unwrap_or_else(|_| {
                NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
            });
        CanonicalTransaction {
            id: Uuid::new_v4().to_string(),
            case_id: case_id.to_string(),
            case_name: "测试案件".to_string(),
            person_role: role,
            bill_source: "微信".to_string(),
            owner_name: owner.to_string(),
            owner_id: String::new(),
            owner_account: String::new(),
            trans_time: day,
            amount_cents,
            trans_type: String::new(),
            direction: if amount_cents < 0 { "支出" } else { "收入" }.to_string(),
            method: String::new(),
            counterparty_name: counterparty.to_string(),
            counterparty_account: String::new(),
            trans_order_id: String::new(),
            merchant_order_id: String::new(),
            remark: String::new(),
            raw_file_name: "test.csv".to_string(),
            import_batch: "batch-test".to_string(),
        }
    }

    pub fn batch(case_id: &str) -> BatchMeta {
        BatchMeta {
            id: Uuid::new_v4().to_string(),
            case_id: case_id.to_string(),
            source_file: "test.csv".to_string(),
            file_sha1: "0000000000000000000000000000000000000000".to_string(),
        }
    }
}
