use chrono::NaiveDateTime;
use std::collections::HashSet;

use crate::error::{CleanError, CleanResult};
use crate::store::{TransactionStore, TIME_FORMAT};
use crate::types::{InteractionEdge, PersonRole};

const INTERACTION_SQL: &str = "
SELECT a.owner_name, a.person_role, b.owner_name, b.person_role,
       a.trans_time, ABS(a.amount_cents),
       CASE WHEN a.merchant_order_id != '' AND a.merchant_order_id = b.trans_order_id
            THEN a.merchant_order_id
            ELSE a.trans_order_id
       END AS matched_order_id
FROM transactions a
JOIN transactions b
  ON b.case_id = a.case_id
 AND ((a.merchant_order_id != '' AND a.merchant_order_id = b.trans_order_id)
   OR (a.trans_order_id != '' AND a.trans_order_id = b.merchant_order_id))
WHERE a.case_id = ?1
  AND a.amount_cents < 0
  AND a.owner_name != b.owner_name
ORDER BY a.trans_time ASC, matched_order_id ASC, a.owner_name ASC, b.owner_name ASC";

/// Directed fund-flow edges for a case, derived by cross-referencing each
/// outflow's order ids against every other owner's statement. The payer side
/// is always the source and the edge carries the absolute amount. Duplicate
/// statement copies of the same transfer collapse into one edge.
pub fn get_interactions(store: &TransactionStore, case_id: &str) -> CleanResult<Vec<InteractionEdge>> {
    let conn = store.connection();
    let mut stmt = conn
        .prepare(INTERACTION_SQL)
        .map_err(CleanError::StoreReadFailure)?;
    let rows = stmt.query_map([case_id], |row| {
        let source: String = row.get(0)?;
        let source_role: String = row.get(1)?;
        let target: String = row.get(2)?;
        let target_role: String = row.get(3)?;
        let time: String = row.get(4)?;
        let amount_cents: i64 = row.get(5)?;
        let order_id: String = row.get(6)?;
        Ok((source, source_role, target, target_role, time, amount_cents, order_id))
    })
    .map_err(CleanError::StoreReadFailure)?;

    let mut seen: HashSet<(String, String, String, String)> = HashSet::new();
    let mut edges = Vec::new();
    for row in rows {
        let (source, source_role, target, target_role, time, amount_cents, order_id) =
            row.map_err(CleanError::StoreReadFailure)?;
        let key = (source.clone(), target.clone(), order_id.clone(), time.clone());
        if !seen.insert(key) {
            continue;
        }
        let source_role = match PersonRole::parse(&source_role) {
            Ok(r) => r,
            Err(_) => continue,
        };
        let target_role = match PersonRole::parse(&target_role) {
            Ok(r) => r,
            Err(_) => continue,
        };
        let time = match NaiveDateTime::parse_from_str(&time, TIME_FORMAT) {
            Ok(t) => t,
            Err(_) => continue,
        };
        edges.push(InteractionEdge {
            source,
            source_role,
            target,
            target_role,
            time,
            amount_cents,
            order_id,
        });
    }
    log::debug!("correlation: case {case_id} -> {} edges", edges.len());
    Ok(edges)
}

/// The distribution view: edges where a fence pays a thief.
pub fn get_known_distribution(
    store: &TransactionStore,
    case_id: &str,
) -> CleanResult<Vec<InteractionEdge>> {
    let edges = get_interactions(store, case_id)?;
    Ok(edges
        .into_iter()
        .filter(|e| e.source_role == PersonRole::Fence && e.target_role == PersonRole::Thief)
        .collect())
}
