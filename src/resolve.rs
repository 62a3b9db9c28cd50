use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::lexicon::Lexicon;
use crate::types::CoercedRow;

fn declared_name_res() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"兹证明[:：\s]*([^\s（(，。]+)",
            r"姓名[:：\s]*([^\s（(，。]+)",
            r"户名[:：\s]*([^\s（(，。]+)",
            r"客户名称[:：\s]*([^\s（(，。]+)",
            r"([一-龥]{2,4})[\s　]*(?:先生|女士)",
            r"([一-龥]{2,4})的微信支付",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("name regex"))
        .collect()
    })
}

fn filename_name_res() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"([一-龥]{2,4})（[^）]*）\s*微信支付交易明细证明",
            r"([一-龥]{2,4})\([^)]*\)\s*微信支付交易明细证明",
            r"([一-龥]{2,4})\d*\s*微信支付交易明细证明",
            r"([一-龥]{2,4})\s*微信支付交易明细证明",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("filename regex"))
        .collect()
    })
}

fn id_card_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:身份证号?|证件号码)[:：\s]*([0-9Xx]{15,18})").expect("id card regex")
    })
}

fn account_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"微信号[:：\s]*([a-zA-Z0-9_\-]+)").expect("account regex"))
}

fn noise_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w一-龥]+").expect("noise regex"))
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&c)
}

/// A candidate is a plausible personal name when it is 2-4 CJK characters
/// and not a fragment of statement boilerplate.
fn is_plausible_name(candidate: &str) -> bool {
    let n = candidate.chars().count();
    if !(2..=4).contains(&n) || !candidate.chars().all(is_cjk) {
        return false;
    }
    !["交易", "明细", "证明", "支付"]
        .iter()
        .any(|w| candidate.contains(w))
}

/// Owner names the resolver may replace: blank, too short, or one of the
/// fixed placeholder tokens.
pub fn is_placeholder_name(name: &str, lex: &Lexicon) -> bool {
    let name = name.trim();
    if name.chars().count() < 2 {
        return true;
    }
    let lower = name.to_lowercase();
    lex.placeholder_names.iter().any(|p| p == &lower || p == name)
}

/// Search unstructured statement text for an explicit name declaration.
/// The first plausible, length-bounded match wins.
pub fn extract_name_from_text(text: &str) -> Option<String> {
    for re in declared_name_res() {
        for caps in re.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                let candidate = m.as_str().trim();
                if is_plausible_name(candidate) {
                    return Some(candidate.to_string());
                }
            }
        }
    }
    None
}

/// Certified wallet statements often carry the owner's name in the file
/// name itself.
pub fn extract_name_from_filename(file_name: &str) -> Option<String> {
    for re in filename_name_res() {
        if let Some(caps) = re.captures(file_name) {
            let candidate = caps.get(1)?.as_str().trim();
            if is_plausible_name(candidate) {
                return Some(candidate.to_string());
            }
        }
    }
    None
}

pub fn extract_id_card(text: &str) -> Option<String> {
    id_card_re()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn extract_account(text: &str) -> Option<String> {
    account_re()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Infer the statement owner from the counterparty column: drop
/// payment-channel noise, count the rest, and take the most frequent value.
/// Ties resolve to the value appearing first in original row order.
pub fn infer_owner_from_counterparties<'a, I>(values: I, lex: &Lexicon) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (idx, value) in values.into_iter().enumerate() {
        let value = value.trim();
        if lex.is_counterparty_noise(value) {
            continue;
        }
        let entry = counts.entry(value).or_insert((0, idx));
        entry.0 += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1 .0.cmp(&b.1 .0).then(b.1 .1.cmp(&a.1 .1)))
        .map(|(name, _)| name.to_string())
}

/// Strip characters outside word/CJK classes from a counterparty name.
pub fn scrub_counterparty(name: &str) -> String {
    noise_re().replace_all(name, "").trim().to_string()
}

/// Strip noise characters from every row's counterparty name.
pub fn scrub_counterparties(rows: &mut [CoercedRow]) {
    for row in rows.iter_mut() {
        row.draft.counterparty_name = scrub_counterparty(&row.draft.counterparty_name);
    }
}

/// Fill in the owner columns for a cleaned file. A row whose own owner name
/// is plausible is never touched; only blank/placeholder rows receive the
/// resolved name. Resolution order: document text, the file name, a
/// plausible sibling row, counterparty frequency.
pub fn resolve_owner(rows: &mut [CoercedRow], doc_text: &str, file_name: &str, lex: &Lexicon) {
    if rows.iter().any(|r| is_placeholder_name(&r.draft.owner_name, lex)) {
        let declared = rows
            .iter()
            .map(|r| r.draft.owner_name.trim())
            .find(|n| !is_placeholder_name(n, lex))
            .map(|n| n.to_string());
        let resolved = extract_name_from_text(doc_text)
            .or_else(|| extract_name_from_filename(file_name))
            .or(declared)
            .or_else(|| {
                infer_owner_from_counterparties(
                    rows.iter().map(|r| r.draft.counterparty_name.as_str()),
                    lex,
                )
            });
        if let Some(name) = resolved {
            log::info!("resolve: owner name inferred as {name}");
            for row in rows.iter_mut() {
                if is_placeholder_name(&row.draft.owner_name, lex) {
                    row.draft.owner_name = name.clone();
                }
            }
        }
    }

    if rows.iter().all(|r| r.draft.owner_id.trim().is_empty()) {
        if let Some(id) = extract_id_card(doc_text) {
            for row in rows.iter_mut() {
                row.draft.owner_id = id.clone();
            }
        }
    }
    if rows.iter().all(|r| r.draft.owner_account.trim().is_empty()) {
        if let Some(account) = extract_account(doc_text) {
            for row in rows.iter_mut() {
                row.draft.owner_account = account.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordDraft;

    fn lex() -> Lexicon {
        Lexicon::default()
    }

    fn row(owner: &str, counterparty: &str) -> CoercedRow {
        CoercedRow {
            draft: RecordDraft {
                owner_name: owner.to_string(),
                counterparty_name: counterparty.to_string(),
                ..Default::default()
            },
            amount_cents: Some(-20_000),
            trans_time: None,
        }
    }

    #[test]
    fn declared_name_wins_over_everything() {
        let text = "微信支付交易明细证明\n兹证明：张三（账号 wxid_1）";
        assert_eq!(extract_name_from_text(text).as_deref(), Some("张三"));
    }

    #[test]
    fn boilerplate_fragments_are_rejected() {
        assert_eq!(extract_name_from_text("姓名：交易明细"), None);
        assert_eq!(extract_name_from_text("户名：支付宝"), None);
    }

    #[test]
    fn filename_patterns_recover_owner() {
        assert_eq!(
            extract_name_from_filename("李四（wxid_9）微信支付交易明细证明.pdf").as_deref(),
            Some("李四")
        );
        assert_eq!(extract_name_from_filename("report_2024.pdf"), None);
    }

    #[test]
    fn frequency_inference_filters_stopwords_and_counts() {
        let values = ["张三超市", "张三超市", "李四维修", "零钱通"];
        let name = infer_owner_from_counterparties(values.iter().copied(), &lex());
        assert_eq!(name.as_deref(), Some("张三超市"));
    }

    #[test]
    fn frequency_ties_resolve_to_first_seen() {
        let values = ["李四维修", "张三超市", "张三超市", "李四维修"];
        let name = infer_owner_from_counterparties(values.iter().copied(), &lex());
        assert_eq!(name.as_deref(), Some("李四维修"));
    }

    #[test]
    fn existing_plausible_owner_is_never_overwritten() {
        let mut rows = vec![row("李四", "张三超市"), row("李四", "张三超市")];
        resolve_owner(&mut rows, "兹证明：王五", "x.txt", &lex());
        assert!(rows.iter().all(|r| r.draft.owner_name == "李四"));
    }

    #[test]
    fn placeholder_owner_is_resolved_from_counterparties() {
        let mut rows = vec![
            row("未知", "张三超市"),
            row("未知", "张三超市"),
            row("未知", "零钱通"),
        ];
        resolve_owner(&mut rows, "", "bill.txt", &lex());
        assert!(rows.iter().all(|r| r.draft.owner_name == "张三超市"));
    }

    #[test]
    fn plausible_rows_survive_beside_placeholder_rows() {
        let mut rows = vec![row("未知", "张三超市"), row("李四", "张三超市")];
        resolve_owner(&mut rows, "", "bill.txt", &lex());
        assert_eq!(rows[0].draft.owner_name, "李四");
        assert_eq!(rows[1].draft.owner_name, "李四");
    }

    #[test]
    fn doc_text_outranks_frequency_inference() {
        let mut rows = vec![row("", "张三超市"), row("", "张三超市")];
        resolve_owner(&mut rows, "兹证明：王五（证明专用）", "bill.txt", &lex());
        assert!(rows.iter().all(|r| r.draft.owner_name == "王五"));
    }

    #[test]
    fn id_card_and_account_fill_from_doc_text() {
        let mut rows = vec![row("李四", "张三超市")];
        let doc = "姓名：李四\n身份证号：11010119900101123X\n微信号：wxid_abc_1";
        resolve_owner(&mut rows, doc, "bill.txt", &lex());
        assert_eq!(rows[0].draft.owner_id, "11010119900101123X");
        assert_eq!(rows[0].draft.owner_account, "wxid_abc_1");
    }

    #[test]
    fn scrub_removes_non_word_noise() {
        assert_eq!(scrub_counterparty(" 张三*超市! "), "张三超市");
        assert_eq!(scrub_counterparty("Shop-01 (微信)"), "Shop01微信");
    }

    #[test]
    fn scrub_counterparties_cleans_every_row() {
        let mut rows = vec![row("李四", " 张三*超市 "), row("李四", "Shop-01 (微信)")];
        scrub_counterparties(&mut rows);
        assert_eq!(rows[0].draft.counterparty_name, "张三超市");
        assert_eq!(rows[1].draft.counterparty_name, "Shop01微信");
    }
}
