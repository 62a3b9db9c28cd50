use uuid::Uuid;

use crate::error::{CleanError, CleanResult};
use crate::types::{CanonicalTransaction, CaseContext, CoercedRow, MIN_VALID_AMOUNT_CENTS};

/// Per-file validation outcome: the surviving transactions plus drop
/// counters for the ingest report.
#[derive(Debug)]
pub struct ValidationOutcome {
    pub transactions: Vec<CanonicalTransaction>,
    pub dropped_no_amount: usize,
    pub dropped_no_time: usize,
    pub dropped_below_threshold: usize,
}

impl ValidationOutcome {
    pub fn dropped_total(&self) -> usize {
        self.dropped_no_amount + self.dropped_no_time + self.dropped_below_threshold
    }
}

/// Filter coerced rows down to committable transactions. Rows with an
/// unparsable amount or time are dropped, as are rows whose absolute amount
/// falls under the 100-yuan investigation threshold. Surviving values pass
/// through untouched; an all-dropped file is an error, not an empty success.
pub fn validate_rows(
    rows: Vec<CoercedRow>,
    case: &CaseContext,
    raw_file_name: &str,
    import_batch: &str,
) -> CleanResult<ValidationOutcome> {
    let mut outcome = ValidationOutcome {
        transactions: Vec::with_capacity(rows.len()),
        dropped_no_amount: 0,
        dropped_no_time: 0,
        dropped_below_threshold: 0,
    };

    for row in rows {
        let amount_cents = match row.amount_cents {
            Some(v) => v,
            None => {
                outcome.dropped_no_amount += 1;
                continue;
            }
        };
        let trans_time = match row.trans_time {
            Some(t) => t,
            None => {
                outcome.dropped_no_time += 1;
                continue;
            }
        };
        if amount_cents.abs() < MIN_VALID_AMOUNT_CENTS {
            outcome.dropped_below_threshold += 1;
            continue;
        }

        let draft = row.draft;
        outcome.transactions.push(CanonicalTransaction {
            id: Uuid::new_v4().to_string(),
            case_id: case.case_id.clone(),
            case_name: case.case_name.clone(),
            person_role: case.person_role,
            bill_source: case.bill_source.clone(),
            owner_name: draft.owner_name,
            owner_id: draft.owner_id,
            owner_account: draft.owner_account,
            trans_time,
            amount_cents,
            trans_type: draft.trans_type,
            direction: draft.direction,
            method: draft.method,
            counterparty_name: draft.counterparty_name,
            counterparty_account: draft.counterparty_account,
            trans_order_id: draft.trans_order_id,
            merchant_order_id: draft.merchant_order_id,
            remark: draft.remark,
            raw_file_name: raw_file_name.to_string(),
            import_batch: import_batch.to_string(),
        });
    }

    if outcome.transactions.is_empty() {
        return Err(CleanError::EmptyAfterFilter(format!(
            "{raw_file_name} (共丢弃 {} 行)",
            outcome.dropped_total()
        )));
    }

    log::debug!(
        "validate: {} kept, {} dropped ({})",
        outcome.transactions.len(),
        outcome.dropped_total(),
        raw_file_name
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PersonRole, RecordDraft};
    use chrono::NaiveDate;

    fn case() -> CaseContext {
        CaseContext {
            case_name: "测试案件".to_string(),
            case_id: "case-01".to_string(),
            person_role: PersonRole::Thief,
            bill_source: "微信".to_string(),
        }
    }

    fn row(amount: Option<i64>, with_time: bool) -> CoercedRow {
        CoercedRow {
            draft: RecordDraft {
                counterparty_name: " 张三*超市 ".to_string(),
                ..Default::default()
            },
            amount_cents: amount,
            trans_time: with_time.then(|| {
                NaiveDate::from_ymd_opt(2024, 3, 1)
                    .unwrap()
                    .and_hms_opt(10, 0, 0)
                    .unwrap()
            }),
        }
    }

    #[test]
    fn unparsable_and_small_rows_are_dropped() {
        let rows = vec![
            row(Some(-50_000), true),
            row(None, true),
            row(Some(25_000), false),
            row(Some(9_999), true),
            row(Some(-9_999), true),
        ];
        let outcome = validate_rows(rows, &case(), "a.csv", "batch-1").unwrap();
        assert_eq!(outcome.transactions.len(), 1);
        assert_eq!(outcome.dropped_no_amount, 1);
        assert_eq!(outcome.dropped_no_time, 1);
        assert_eq!(outcome.dropped_below_threshold, 2);
    }

    #[test]
    fn threshold_is_inclusive_at_exactly_100_yuan() {
        let rows = vec![row(Some(-10_000), true)];
        let outcome = validate_rows(rows, &case(), "a.csv", "batch-1").unwrap();
        assert_eq!(outcome.transactions[0].amount_cents, -10_000);
    }

    #[test]
    fn all_dropped_is_an_error() {
        let rows = vec![row(None, true), row(Some(100), true)];
        let err = validate_rows(rows, &case(), "a.csv", "batch-1").unwrap_err();
        assert!(matches!(err, CleanError::EmptyAfterFilter(_)));
    }

    #[test]
    fn committed_rows_carry_case_context_and_untouched_values() {
        let rows = vec![row(Some(-50_000), true)];
        let outcome = validate_rows(rows, &case(), "a.csv", "batch-1").unwrap();
        let tx = &outcome.transactions[0];
        assert_eq!(tx.case_id, "case-01");
        assert_eq!(tx.person_role, PersonRole::Thief);
        assert_eq!(tx.counterparty_name, " 张三*超市 ");
        assert_eq!(tx.raw_file_name, "a.csv");
        assert_eq!(tx.import_batch, "batch-1");
        assert!(!tx.id.is_empty());
    }
}
