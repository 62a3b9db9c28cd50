use std::collections::HashMap;

use crate::error::{CleanError, CleanResult};
use crate::types::{RawTable, RecordDraft};

/// Maps one canonical field to the source column names that may carry it,
/// in priority order: the first alias present in the table wins.
#[derive(Debug)]
pub struct AliasSpec {
    pub field: &'static str,
    pub aliases: &'static [&'static str],
}

/// External alias table; entries take precedence over the built-in aliases
/// for the same canonical field.
pub type AliasOverrides = HashMap<String, Vec<String>>;

/// Alias table for generic delimited text, covering the column-name drift
/// observed across bank and platform exports.
pub const GENERIC_ALIAS_SPECS: &[AliasSpec] = &[
    AliasSpec {
        field: "owner_name",
        aliases: &["姓名", "户名", "持卡人", "客户名称", "账户名称", "用户侧账号名称"],
    },
    AliasSpec {
        field: "owner_id",
        aliases: &["身份证", "身份证号", "证件号码"],
    },
    AliasSpec {
        field: "owner_account",
        aliases: &["微信号", "用户id", "交易账号", "账号", "账户"],
    },
    AliasSpec {
        field: "trans_order_id",
        aliases: &["交易单号", "流水号"],
    },
    AliasSpec {
        field: "trans_time",
        aliases: &["交易时间", "交易日期", "记账日期", "入账时间", "日期", "时间", "time", "date"],
    },
    AliasSpec {
        field: "trans_type",
        aliases: &["交易类型", "交易用途类型"],
    },
    AliasSpec {
        field: "direction",
        aliases: &["收/支/其他", "收/支", "借贷类型"],
    },
    AliasSpec {
        field: "method",
        aliases: &["交易方式", "交易业务类型"],
    },
    AliasSpec {
        field: "amount",
        aliases: &["金额(元)", "交易金额", "操作金额", "金额", "发生额", "amount", "money"],
    },
    AliasSpec {
        field: "counterparty_name",
        aliases: &[
            "交易对方",
            "对方名称",
            "微信昵称",
            "对端",
            "对手侧账户名称",
            "第三方账户名称",
            "对方户名",
            "收款方",
        ],
    },
    AliasSpec {
        field: "counterparty_account",
        aliases: &["对方账号", "对手方银行卡号"],
    },
    AliasSpec {
        field: "merchant_order_id",
        aliases: &["商户单号", "大单号"],
    },
    AliasSpec {
        field: "remark",
        aliases: &["备注", "备注1"],
    },
];

/// Wallet/payment-platform text exports (tenpay-style column set).
pub const WALLET_ALIAS_SPECS: &[AliasSpec] = &[
    AliasSpec {
        field: "owner_name",
        aliases: &["用户侧账号名称"],
    },
    AliasSpec {
        field: "owner_account",
        aliases: &["用户id"],
    },
    AliasSpec {
        field: "trans_order_id",
        aliases: &["交易单号"],
    },
    AliasSpec {
        field: "trans_time",
        aliases: &["交易时间"],
    },
    AliasSpec {
        field: "trans_type",
        aliases: &["交易用途类型"],
    },
    AliasSpec {
        field: "direction",
        aliases: &["借贷类型"],
    },
    AliasSpec {
        field: "method",
        aliases: &["交易业务类型"],
    },
    AliasSpec {
        field: "amount",
        aliases: &["交易金额(分)", "金额(分)", "交易金额"],
    },
    AliasSpec {
        field: "counterparty_name",
        aliases: &["对手侧账户名称", "第三方账户名称", "对手方id"],
    },
    AliasSpec {
        field: "counterparty_account",
        aliases: &["对手方银行卡号"],
    },
    AliasSpec {
        field: "merchant_order_id",
        aliases: &["大单号"],
    },
    AliasSpec {
        field: "remark",
        aliases: &["备注1", "备注2", "备注"],
    },
];

/// Bank spreadsheet exports; note the debit/credit amount column variants.
pub const SPREADSHEET_ALIAS_SPECS: &[AliasSpec] = &[
    AliasSpec {
        field: "owner_name",
        aliases: &["姓名", "持卡人", "户名", "客户名称", "账户名称", "用户侧账号名称"],
    },
    AliasSpec {
        field: "owner_id",
        aliases: &["身份证", "身份证号", "证件号码"],
    },
    AliasSpec {
        field: "owner_account",
        aliases: &["微信号", "用户id", "交易账号", "账户", "账号"],
    },
    AliasSpec {
        field: "trans_order_id",
        aliases: &["交易单号", "流水号"],
    },
    AliasSpec {
        field: "trans_time",
        aliases: &["交易时间", "交易日期", "记账日期", "入账时间", "日期", "时间"],
    },
    AliasSpec {
        field: "trans_type",
        aliases: &["交易类型", "摘要"],
    },
    AliasSpec {
        field: "direction",
        aliases: &["收/支/其他", "收/支", "借贷标志", "借贷类型"],
    },
    AliasSpec {
        field: "method",
        aliases: &["交易方式", "交易渠道"],
    },
    AliasSpec {
        field: "amount",
        aliases: &["交易金额", "金额(元)", "金额", "发生额", "借方金额", "贷方金额"],
    },
    AliasSpec {
        field: "counterparty_name",
        aliases: &["交易对方", "对端", "对方名称", "微信昵称", "对手侧账户名称", "对方户名"],
    },
    AliasSpec {
        field: "counterparty_account",
        aliases: &["对方账号", "对方卡号"],
    },
    AliasSpec {
        field: "merchant_order_id",
        aliases: &["商户单号"],
    },
    AliasSpec {
        field: "remark",
        aliases: &["备注", "摘要说明"],
    },
];

/// Certified wallet PDF statements carry the canonical column names already.
pub const PDF_ALIAS_SPECS: &[AliasSpec] = &[
    AliasSpec {
        field: "trans_order_id",
        aliases: &["交易单号"],
    },
    AliasSpec {
        field: "trans_time",
        aliases: &["交易时间"],
    },
    AliasSpec {
        field: "trans_type",
        aliases: &["交易类型"],
    },
    AliasSpec {
        field: "direction",
        aliases: &["收/支/其他", "收/支"],
    },
    AliasSpec {
        field: "method",
        aliases: &["交易方式"],
    },
    AliasSpec {
        field: "amount",
        aliases: &["金额(元)", "金额"],
    },
    AliasSpec {
        field: "counterparty_name",
        aliases: &["交易对方"],
    },
    AliasSpec {
        field: "merchant_order_id",
        aliases: &["商户单号"],
    },
    AliasSpec {
        field: "remark",
        aliases: &["备注"],
    },
];

const REQUIRED_FIELDS: &[&str] = &["trans_time", "amount"];

/// Trim, strip BOM, lowercase and collapse whitespace before alias matching.
pub fn normalize_key(key: &str) -> String {
    key.trim()
        .trim_start_matches('\u{feff}')
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

fn resolve_mapping(
    headers: &[String],
    specs: &[AliasSpec],
    overrides: Option<&AliasOverrides>,
) -> HashMap<&'static str, usize> {
    let mut normalized: HashMap<String, usize> = HashMap::new();
    for (idx, cell) in headers.iter().enumerate() {
        let key = normalize_key(cell);
        if !key.is_empty() {
            normalized.entry(key).or_insert(idx);
        }
    }

    let mut mapping = HashMap::new();
    for spec in specs {
        if let Some(over) = overrides.and_then(|o| o.get(spec.field)) {
            if let Some(idx) = first_alias_hit(&normalized, over.iter().map(String::as_str)) {
                mapping.insert(spec.field, idx);
                continue;
            }
        }
        if let Some(idx) = first_alias_hit(&normalized, spec.aliases.iter().copied()) {
            mapping.insert(spec.field, idx);
        }
    }
    mapping
}

fn first_alias_hit<'a>(
    normalized: &HashMap<String, usize>,
    aliases: impl Iterator<Item = &'a str>,
) -> Option<usize> {
    for alias in aliases {
        if let Some(idx) = normalized.get(&normalize_key(alias)) {
            return Some(*idx);
        }
    }
    None
}

fn row_get(row: &[String], idx: Option<&usize>) -> String {
    idx.and_then(|i| row.get(*i).cloned())
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Map a raw table onto the canonical field set. Every canonical field is
/// materialized (empty when no alias matched) so downstream stages can
/// assume full column presence; only the required time/amount columns must
/// actually resolve.
pub fn map_table(
    table: &RawTable,
    specs: &[AliasSpec],
    overrides: Option<&AliasOverrides>,
) -> CleanResult<Vec<RecordDraft>> {
    let mapping = resolve_mapping(&table.headers, specs, overrides);

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .filter(|f| !mapping.contains_key(**f))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(CleanError::MissingRequiredFields(missing.join(", ")));
    }
    log::debug!(
        "schema: mapped {} of 13 source-backed fields",
        mapping.len()
    );

    let mut drafts = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        drafts.push(RecordDraft {
            owner_name: row_get(row, mapping.get("owner_name")),
            owner_id: row_get(row, mapping.get("owner_id")),
            owner_account: row_get(row, mapping.get("owner_account")),
            trans_order_id: row_get(row, mapping.get("trans_order_id")),
            trans_time: row_get(row, mapping.get("trans_time")),
            trans_type: row_get(row, mapping.get("trans_type")),
            direction: row_get(row, mapping.get("direction")),
            method: row_get(row, mapping.get("method")),
            amount: row_get(row, mapping.get("amount")),
            counterparty_name: row_get(row, mapping.get("counterparty_name")),
            counterparty_account: row_get(row, mapping.get("counterparty_account")),
            merchant_order_id: row_get(row, mapping.get("merchant_order_id")),
            remark: row_get(row, mapping.get("remark")),
        });
    }
    Ok(drafts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn first_alias_wins_as_priority_not_merge() {
        // Both 姓名 and 户名 map to owner_name; 姓名 is listed first and wins.
        let t = table(
            &["户名", "姓名", "交易时间", "金额"],
            &[&["备用", "张三", "2024-01-02 10:00:00", "300"]],
        );
        let drafts = map_table(&t, GENERIC_ALIAS_SPECS, None).unwrap();
        assert_eq!(drafts[0].owner_name, "张三");
    }

    #[test]
    fn header_names_are_normalized_before_matching() {
        let t = table(
            &["\u{feff} 交易 时间 ", "金 额", "交易对方"],
            &[&["2024-01-02", "300", "李四"]],
        );
        let drafts = map_table(&t, GENERIC_ALIAS_SPECS, None).unwrap();
        assert_eq!(drafts[0].trans_time, "2024-01-02");
        assert_eq!(drafts[0].amount, "300");
    }

    #[test]
    fn unmapped_fields_materialize_empty() {
        let t = table(&["交易时间", "金额"], &[&["2024-01-02", "300"]]);
        let drafts = map_table(&t, GENERIC_ALIAS_SPECS, None).unwrap();
        assert_eq!(drafts[0].counterparty_name, "");
        assert_eq!(drafts[0].merchant_order_id, "");
        assert_eq!(drafts[0].remark, "");
    }

    #[test]
    fn missing_time_or_amount_is_fatal() {
        let t = table(&["交易对方", "备注"], &[&["张三", "x"]]);
        assert!(matches!(
            map_table(&t, GENERIC_ALIAS_SPECS, None),
            Err(CleanError::MissingRequiredFields(_))
        ));
    }

    #[test]
    fn overrides_outrank_builtin_aliases() {
        let t = table(
            &["自定义对方", "交易对方", "交易时间", "金额"],
            &[&["王五", "内置", "2024-01-02", "300"]],
        );
        let mut overrides = AliasOverrides::new();
        overrides.insert(
            "counterparty_name".to_string(),
            vec!["自定义对方".to_string()],
        );
        let drafts = map_table(&t, GENERIC_ALIAS_SPECS, Some(&overrides)).unwrap();
        assert_eq!(drafts[0].counterparty_name, "王五");
    }

    #[test]
    fn wallet_specs_map_fen_amount_and_order_ids() {
        let t = table(
            &["用户ID", "交易单号", "大单号", "借贷类型", "交易金额(分)", "交易时间", "对手侧账户名称"],
            &[&["wxid_1", "T1", "M1", "出", "15000", "2024-01-02 10:00:00", "张三超市"]],
        );
        let drafts = map_table(&t, WALLET_ALIAS_SPECS, None).unwrap();
        assert_eq!(drafts[0].amount, "15000");
        assert_eq!(drafts[0].trans_order_id, "T1");
        assert_eq!(drafts[0].merchant_order_id, "M1");
        assert_eq!(drafts[0].direction, "出");
    }

    #[test]
    fn alias_tables_target_canonical_fields_only() {
        for specs in [
            GENERIC_ALIAS_SPECS,
            WALLET_ALIAS_SPECS,
            SPREADSHEET_ALIAS_SPECS,
            PDF_ALIAS_SPECS,
        ] {
            for spec in specs {
                assert!(crate::types::CANONICAL_FIELDS.contains(&spec.field));
            }
        }
    }

    #[test]
    fn blank_rows_are_skipped() {
        let t = table(
            &["交易时间", "金额"],
            &[&["", ""], &["2024-01-02", "300"]],
        );
        let drafts = map_table(&t, GENERIC_ALIAS_SPECS, None).unwrap();
        assert_eq!(drafts.len(), 1);
    }
}
