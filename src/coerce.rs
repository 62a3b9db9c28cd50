use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::lexicon::Lexicon;
use crate::types::{AmountUnit, CoercedRow, RecordDraft};

/// Strip everything except digits, a leading sign and the decimal point.
fn strip_amount_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for (i, c) in raw.trim().chars().enumerate() {
        match c {
            '0'..='9' | '.' => out.push(c),
            '-' | '+' if i == 0 || out.is_empty() => out.push(c),
            _ => {}
        }
    }
    out
}

/// Integer parse to hundredths of the written unit. Unparsable input is
/// `None`, never zero: zero would pass the non-null check and only fail the
/// magnitude filter, which hides the parse failure.
fn parse_hundredths(raw: &str) -> Option<i64> {
    let s = strip_amount_text(raw);
    if s.is_empty() {
        return None;
    }
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(&s)),
    };
    let mut parts = digits.split('.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next().unwrap_or("");
    if parts.next().is_some() {
        return None;
    }
    let int_part = if int_part.is_empty() { "0" } else { int_part };
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    let int_val = int_part.parse::<i64>().ok()?;
    // Tolerate long fractions by truncating past two places.
    let frac = &frac_part[..frac_part.len().min(2)];
    let frac_val = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().ok()? * 10,
        _ => frac.parse::<i64>().ok()?,
    };
    let mut hundredths = int_val.checked_mul(100)?.checked_add(frac_val)?;
    if negative {
        hundredths = -hundredths;
    }
    Some(hundredths)
}

/// Parse an amount into signed cents of the base unit, applying the source
/// unit divisor (1/10/100 for yuan/jiao/fen).
pub fn parse_amount_cents(raw: &str, unit: AmountUnit) -> Option<i64> {
    parse_hundredths(raw).map(|h| h / unit.divisor())
}

/// Repair the mojibake debit/credit markers seen in legacy tenpay exports
/// decoded under the wrong codepage.
pub fn repair_direction(raw: &str) -> String {
    let raw = raw.trim();
    if raw.contains("³ö") {
        return "出".to_string();
    }
    if raw.contains("Èë") {
        return "入".to_string();
    }
    raw.to_string()
}

/// The resolved sign of a row: true = outflow (negative).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignHint {
    Outflow,
    Inflow,
}

/// Sign priority: an explicit debit/credit marker overrides everything;
/// otherwise the transaction-type text is matched against the expense and
/// income keyword lists (substring, first match wins); otherwise the parsed
/// sign stands.
pub fn determine_sign(direction: &str, trans_type: &str, lex: &Lexicon) -> Option<SignHint> {
    let marker = direction.trim();
    if !marker.is_empty() {
        if lex.credit_markers.iter().any(|m| m == marker) {
            return Some(SignHint::Inflow);
        }
        if lex.debit_markers.iter().any(|m| m == marker) {
            return Some(SignHint::Outflow);
        }
    }
    if lex
        .expense_type_keywords
        .iter()
        .any(|k| trans_type.contains(k.as_str()))
    {
        return Some(SignHint::Outflow);
    }
    if lex
        .income_type_keywords
        .iter()
        .any(|k| trans_type.contains(k.as_str()))
    {
        return Some(SignHint::Inflow);
    }
    None
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y.%m.%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y%m%d%H%M%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y%m%d"];

/// Tolerant timestamp parser: the common export formats, then date-only
/// (midnight), then spreadsheet serial dates. Unparsable input is `None`.
pub fn parse_time_flexible(raw: &str) -> Option<NaiveDateTime> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    // Spreadsheet serial date (days since 1899-12-30, fraction = time).
    let serial = text.parse::<f64>().ok()?;
    if !serial.is_finite() || serial <= 0.0 {
        return None;
    }
    let days = serial.floor() as i64;
    let secs = ((serial - serial.floor()) * 86_400.0).round() as i64;
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let date = base.checked_add_signed(Duration::days(days))?;
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt + Duration::seconds(secs))
}

/// Coerce drafted rows into typed values. Row-level failures (amount or
/// timestamp unparsable) are recorded as messages and leave `None` in the
/// row; the validator drops those rows without aborting the file.
pub fn coerce_rows(
    drafts: Vec<RecordDraft>,
    unit: AmountUnit,
    lex: &Lexicon,
) -> (Vec<CoercedRow>, Vec<String>) {
    let mut rows = Vec::with_capacity(drafts.len());
    let mut errors = Vec::new();

    for (idx, mut draft) in drafts.into_iter().enumerate() {
        let line_no = idx + 2; // header is line 1
        draft.direction = repair_direction(&draft.direction);

        let parsed = parse_amount_cents(&draft.amount, unit);
        if parsed.is_none() && !draft.amount.is_empty() {
            errors.push(format!("第{line_no}行: 金额无法解析: {}", draft.amount));
        }
        let sign = determine_sign(&draft.direction, &draft.trans_type, lex);
        let amount_cents = parsed.map(|cents| match sign {
            Some(SignHint::Outflow) => -cents.abs(),
            Some(SignHint::Inflow) => cents.abs(),
            None => cents,
        });
        match sign {
            Some(SignHint::Outflow) => draft.direction = "支出".to_string(),
            Some(SignHint::Inflow) => draft.direction = "收入".to_string(),
            None => {}
        }

        let trans_time = parse_time_flexible(&draft.trans_time);
        if trans_time.is_none() && !draft.trans_time.is_empty() {
            errors.push(format!(
                "第{line_no}行: 交易时间无法解析: {}",
                draft.trans_time
            ));
        }

        rows.push(CoercedRow {
            draft,
            amount_cents,
            trans_time,
        });
    }
    (rows, errors)
}
