use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};

use crate::error::{CleanError, CleanResult};
use crate::store::{TransactionStore, TIME_FORMAT};
use crate::types::ProximityCandidate;

pub const DEFAULT_WINDOW_MINUTES: i64 = 30;
pub const DEFAULT_TOP_K: usize = 20;

const KNOWN_ROLE_SQL: &str = "
SELECT owner_name, trans_time FROM transactions
WHERE case_id = ?1 AND person_role IN ('盗窃人员', '收脏人员')
ORDER BY trans_time ASC";

const CANDIDATE_SQL: &str = "
SELECT counterparty_name, trans_time, amount_cents FROM transactions
WHERE case_id = ?1 AND counterparty_name != ''
ORDER BY trans_time ASC, id ASC";

/// Rank counterparties by how often they transact close in time to known
/// thief or fence activity. Co-occurrence within the window on the same
/// calendar day counts a transaction once; counterparties who are themselves
/// known-role owners are excluded. This is an investigation lead, not
/// evidence of participation.
pub fn find_hidden_partners(
    store: &TransactionStore,
    case_id: &str,
    window_minutes: i64,
    top_k: usize,
) -> CleanResult<Vec<ProximityCandidate>> {
    let conn = store.connection();

    let mut known_owners: HashSet<String> = HashSet::new();
    let mut known_times: Vec<NaiveDateTime> = Vec::new();
    {
        let mut stmt = conn
            .prepare(KNOWN_ROLE_SQL)
            .map_err(CleanError::StoreReadFailure)?;
        let rows = stmt
            .query_map([case_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(CleanError::StoreReadFailure)?;
        for row in rows {
            let (owner, time) = row.map_err(CleanError::StoreReadFailure)?;
            known_owners.insert(owner);
            if let Ok(t) = NaiveDateTime::parse_from_str(&time, TIME_FORMAT) {
                known_times.push(t);
            }
        }
    }
    if known_times.is_empty() {
        return Ok(Vec::new());
    }

    // freq, total |amount|, first appearance
    let mut stats: HashMap<String, (i64, i64, usize)> = HashMap::new();
    let mut stmt = conn
        .prepare(CANDIDATE_SQL)
        .map_err(CleanError::StoreReadFailure)?;
    let rows = stmt
        .query_map([case_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })
        .map_err(CleanError::StoreReadFailure)?;
    for (order, row) in rows.enumerate() {
        let (counterparty, time, amount_cents) = row.map_err(CleanError::StoreReadFailure)?;
        if known_owners.contains(&counterparty) {
            continue;
        }
        let time = match NaiveDateTime::parse_from_str(&time, TIME_FORMAT) {
            Ok(t) => t,
            Err(_) => continue,
        };
        let near_known = known_times.iter().any(|kt| {
            kt.date() == time.date()
                && (time - *kt).num_minutes().abs() <= window_minutes
        });
        if !near_known {
            continue;
        }
        let entry = stats.entry(counterparty).or_insert((0, 0, order));
        entry.0 += 1;
        entry.1 += amount_cents.abs();
    }

    let mut ranked: Vec<(String, (i64, i64, usize))> = stats.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .2.cmp(&b.1 .2)));
    ranked.truncate(top_k);
    Ok(ranked
        .into_iter()
        .map(|(counterparty_name, (freq, total_amount_cents, _))| ProximityCandidate {
            counterparty_name,
            freq,
            total_amount_cents,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::{batch, tx};
    use crate::types::PersonRole;

    #[test]
    fn counterparty_inside_window_is_counted() {
        let mut store = TransactionStore::open_in_memory().unwrap();
        let records = vec![
            tx("c1", PersonRole::Thief, "张三", "王五", "2024-03-01 10:00:00", -50_000),
            tx("c1", PersonRole::Investigatee, "赵六", "神秘商户", "2024-03-01 10:20:00", -30_000),
        ];
        store.append(&batch("c1"), &records).unwrap();

        let partners = find_hidden_partners(&store, "c1", DEFAULT_WINDOW_MINUTES, DEFAULT_TOP_K).unwrap();
        let hit = partners.iter().find(|p| p.counterparty_name == "神秘商户").unwrap();
        assert_eq!(hit.freq, 1);
        assert_eq!(hit.total_amount_cents, 30_000);
    }

    #[test]
    fn counterparty_outside_window_is_not_counted() {
        let mut store = TransactionStore::open_in_memory().unwrap();
        let records = vec![
            tx("c1", PersonRole::Thief, "张三", "王五", "2024-03-01 10:00:00", -50_000),
            tx("c1", PersonRole::Investigatee, "赵六", "神秘商户", "2024-03-01 11:00:00", -30_000),
        ];
        store.append(&batch("c1"), &records).unwrap();

        let partners = find_hidden_partners(&store, "c1", 30, DEFAULT_TOP_K).unwrap();
        assert!(partners.iter().all(|p| p.counterparty_name != "神秘商户"));
    }

    #[test]
    fn same_minutes_across_days_do_not_match() {
        let mut store = TransactionStore::open_in_memory().unwrap();
        let records = vec![
            tx("c1", PersonRole::Thief, "张三", "王五", "2024-03-01 23:50:00", -50_000),
            tx("c1", PersonRole::Investigatee, "赵六", "神秘商户", "2024-03-02 00:10:00", -30_000),
        ];
        store.append(&batch("c1"), &records).unwrap();

        let partners = find_hidden_partners(&store, "c1", 30, DEFAULT_TOP_K).unwrap();
        assert!(partners.iter().all(|p| p.counterparty_name != "神秘商户"));
    }

    #[test]
    fn known_role_owners_are_excluded_as_candidates() {
        let mut store = TransactionStore::open_in_memory().unwrap();
        let records = vec![
            tx("c1", PersonRole::Thief, "张三", "王五", "2024-03-01 10:00:00", -50_000),
            tx("c1", PersonRole::Fence, "王五", "张三", "2024-03-01 10:05:00", 50_000),
        ];
        store.append(&batch("c1"), &records).unwrap();

        let partners = find_hidden_partners(&store, "c1", 30, DEFAULT_TOP_K).unwrap();
        assert!(partners.is_empty());
    }

    #[test]
    fn ranking_is_frequency_then_first_appearance() {
        let mut store = TransactionStore::open_in_memory().unwrap();
        let records = vec![
            tx("c1", PersonRole::Thief, "张三", "", "2024-03-01 10:00:00", -50_000),
            tx("c1", PersonRole::Investigatee, "赵六", "甲商户", "2024-03-01 10:05:00", -10_000),
            tx("c1", PersonRole::Investigatee, "赵六", "乙商户", "2024-03-01 10:10:00", -10_000),
            tx("c1", PersonRole::Investigatee, "赵六", "乙商户", "2024-03-01 10:15:00", -10_000),
        ];
        store.append(&batch("c1"), &records).unwrap();

        let partners = find_hidden_partners(&store, "c1", 30, DEFAULT_TOP_K).unwrap();
        let names: Vec<_> = partners.iter().map(|p| p.counterparty_name.as_str()).collect();
        assert_eq!(names, vec!["乙商户", "甲商户"]);
    }

    #[test]
    fn top_k_truncates_the_ranking() {
        let mut store = TransactionStore::open_in_memory().unwrap();
        let mut records = vec![tx(
            "c1",
            PersonRole::Thief,
            "张三",
            "",
            "2024-03-01 10:00:00",
            -50_000,
        )];
        for i in 0..5 {
            records.push(tx(
                "c1",
                PersonRole::Investigatee,
                "赵六",
                &format!("商户{i}"),
                "2024-03-01 10:05:00",
                -10_000,
            ));
        }
        store.append(&batch("c1"), &records).unwrap();

        let partners = find_hidden_partners(&store, "c1", 30, 2).unwrap();
        assert_eq!(partners.len(), 2);
    }
}
