use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::CleanError;

/// The canonical statement schema, in fixed order. Every source profile must
/// materialize exactly these 17 columns; unmapped fields stay empty rather
/// than being omitted.
pub const CANONICAL_FIELDS: &[&str] = &[
    "case_name",
    "case_id",
    "person_role",
    "bill_source",
    "owner_name",
    "owner_id",
    "owner_account",
    "trans_order_id",
    "trans_time",
    "trans_type",
    "direction",
    "method",
    "amount",
    "counterparty_name",
    "counterparty_account",
    "merchant_order_id",
    "remark",
];

/// Validation threshold: records below 100 yuan in absolute value are
/// discarded as investigative noise (business rule, not a parsing artifact).
pub const MIN_VALID_AMOUNT_CENTS: i64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PersonRole {
    Thief,
    Fence,
    Investigatee,
}

impl PersonRole {
    /// Statement-facing label, as stored and as accepted at ingestion.
    pub fn label(self) -> &'static str {
        match self {
            PersonRole::Thief => "盗窃人员",
            PersonRole::Fence => "收脏人员",
            PersonRole::Investigatee => "排查人员",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, CleanError> {
        match raw.trim() {
            "盗窃人员" | "THIEF" | "thief" => Ok(PersonRole::Thief),
            "收脏人员" | "FENCE" | "fence" => Ok(PersonRole::Fence),
            "排查人员" | "INVESTIGATEE" | "investigatee" => Ok(PersonRole::Investigatee),
            other => Err(CleanError::InvalidPersonRole(other.to_string())),
        }
    }

    /// Known-role owners are the ones the case already classifies as actors.
    pub fn is_known(self) -> bool {
        matches!(self, PersonRole::Thief | PersonRole::Fence)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmountUnit {
    Base,
    Tenth,
    Hundredth,
}

impl AmountUnit {
    pub fn divisor(self) -> i64 {
        match self {
            AmountUnit::Base => 1,
            AmountUnit::Tenth => 10,
            AmountUnit::Hundredth => 100,
        }
    }
}

/// Case metadata attached to every record of one ingest request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseContext {
    pub case_name: String,
    pub case_id: String,
    pub person_role: PersonRole,
    pub bill_source: String,
}

/// A rectangular table lifted out of one source file.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One source row after alias mapping, before value coercion. All values are
/// trimmed strings; case metadata is carried separately in `CaseContext`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordDraft {
    pub owner_name: String,
    pub owner_id: String,
    pub owner_account: String,
    pub trans_order_id: String,
    pub trans_time: String,
    pub trans_type: String,
    pub direction: String,
    pub method: String,
    pub amount: String,
    pub counterparty_name: String,
    pub counterparty_account: String,
    pub merchant_order_id: String,
    pub remark: String,
}

/// Draft plus coerced values. `None` means unparsable, not zero; the
/// validator drops such rows instead of silently keeping them.
#[derive(Debug, Clone)]
pub struct CoercedRow {
    pub draft: RecordDraft,
    pub amount_cents: Option<i64>,
    pub trans_time: Option<NaiveDateTime>,
}

/// A fully normalized transaction. Never mutated after commit; destroyed
/// only by an explicit case-level purge.
#[derive(Debug, Clone, Serialize)]
pub struct CanonicalTransaction {
    pub id: String,
    pub case_id: String,
    pub case_name: String,
    pub person_role: PersonRole,
    pub bill_source: String,
    pub owner_name: String,
    pub owner_id: String,
    pub owner_account: String,
    pub trans_time: NaiveDateTime,
    pub amount_cents: i64,
    pub trans_type: String,
    pub direction: String,
    pub method: String,
    pub counterparty_name: String,
    pub counterparty_account: String,
    pub trans_order_id: String,
    pub merchant_order_id: String,
    pub remark: String,
    pub raw_file_name: String,
    pub import_batch: String,
}

/// A directed fund-flow edge derived from order-id cross-reference.
/// `amount_cents` is the absolute transferred amount; direction is carried
/// by source/target. Computed on demand, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct InteractionEdge {
    pub source: String,
    pub source_role: PersonRole,
    pub target: String,
    pub target_role: PersonRole,
    pub time: NaiveDateTime,
    pub amount_cents: i64,
    pub order_id: String,
}

/// A counterparty ranked by time-window co-occurrence with known-role
/// activity. Heuristic signal, not proof of participation.
#[derive(Debug, Clone, Serialize)]
pub struct ProximityCandidate {
    pub counterparty_name: String,
    pub freq: i64,
    pub total_amount_cents: i64,
}
