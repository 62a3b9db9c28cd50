use calamine::{open_workbook_auto, Reader};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

use crate::error::{CleanError, CleanResult};
use crate::lexicon::{AMOUNT_HEADER_KEYWORDS, PDF_KEY_FIELDS, TIME_HEADER_KEYWORDS};
use crate::types::RawTable;

/// How many leading lines/rows are scanned for a header before giving up.
const HEADER_SCAN_LIMIT: usize = 50;
/// Delimiters probed for delimited text, in fixed order.
const DELIMITER_CANDIDATES: &[u8] = &[b'\t', b',', b';', b'|'];
/// A PDF page table needs more than this many columns to be accepted.
const MIN_PDF_COLUMNS: usize = 4;

/// A table plus the unstructured text that surrounded it (statement header
/// preamble, PDF cover text). The resolver mines that text for the owner.
#[derive(Debug, Clone, Default)]
pub struct ExtractedTable {
    pub table: RawTable,
    pub doc_text: String,
}

fn ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("ws regex"))
}

fn date_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{4}[-/]\d{1,2}[-/]\d{1,2}").expect("date token regex"))
}

fn time_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,2}:\d{2}(:\d{2})?$").expect("time token regex"))
}

/// Whitespace-split a PDF data line, re-joining a date token with the time
/// token that follows it so a timestamp occupies one cell.
fn split_pdf_row(line: &str) -> Vec<String> {
    let tokens: Vec<&str> = line.split(' ').collect();
    let mut cells: Vec<String> = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        if i + 1 < tokens.len()
            && date_token_re().is_match(tokens[i])
            && time_token_re().is_match(tokens[i + 1])
        {
            cells.push(format!("{} {}", tokens[i], tokens[i + 1]));
            i += 2;
        } else {
            cells.push(tokens[i].to_string());
            i += 1;
        }
    }
    cells
}

fn trim_cell(text: &str) -> String {
    text.trim()
        .trim_start_matches('\u{feff}')
        .trim()
        .to_string()
}

fn is_header_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    let has_time = TIME_HEADER_KEYWORDS.iter().any(|k| lower.contains(&k.to_lowercase()));
    let has_amount = AMOUNT_HEADER_KEYWORDS
        .iter()
        .any(|k| lower.contains(&k.to_lowercase()));
    has_time && has_amount
}

/// Locate the header row of a delimited export and parse the rest with the
/// first delimiter that yields a consistent column count. Lines before the
/// header are preamble and come back as document text.
pub fn extract_delimited(text: &str) -> CleanResult<ExtractedTable> {
    let lines: Vec<&str> = text.lines().collect();
    let header_idx = lines
        .iter()
        .take(HEADER_SCAN_LIMIT)
        .position(|line| is_header_line(line))
        .ok_or_else(|| {
            CleanError::EmptyTable(format!(
                "前 {HEADER_SCAN_LIMIT} 行内未找到同时包含时间列与金额列的表头"
            ))
        })?;

    let doc_text = lines[..header_idx].join("\n");
    let body = lines[header_idx..].join("\n");

    for &delim in DELIMITER_CANDIDATES {
        match parse_with_delimiter(&body, delim) {
            Some(table) => {
                log::debug!(
                    "table: delimiter {:?} accepted ({} columns, {} rows)",
                    delim as char,
                    table.headers.len(),
                    table.rows.len()
                );
                return Ok(ExtractedTable { table, doc_text });
            }
            None => log::debug!("table: delimiter {:?} rejected", delim as char),
        }
    }
    Err(CleanError::EmptyTable(
        "没有任何候选分隔符能产生一致的列数".to_string(),
    ))
}

fn parse_with_delimiter(body: &str, delim: u8) -> Option<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delim)
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut parsed: Vec<Vec<String>> = Vec::new();
    for rec in reader.records() {
        let rec = rec.ok()?;
        parsed.push(rec.iter().map(trim_cell).collect());
    }

    let headers = parsed.first()?.clone();
    if headers.len() < 2 {
        return None;
    }
    let mut rows = Vec::new();
    for cells in parsed.into_iter().skip(1) {
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        if cells.len() != headers.len() {
            return None;
        }
        rows.push(cells);
    }
    Some(RawTable { headers, rows })
}

/// Read the first worksheet of a spreadsheet export and locate its header
/// row with the same time/amount keyword scan used for delimited text.
pub fn extract_spreadsheet(path: &Path) -> CleanResult<ExtractedTable> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| CleanError::UnsupportedFormat(format!("打开表格文件失败: {e}")))?;
    let sheet_names = workbook.sheet_names().to_owned();
    let first_sheet = sheet_names
        .first()
        .cloned()
        .ok_or_else(|| CleanError::EmptyTable("表格文件中没有工作表".to_string()))?;
    let range = workbook
        .worksheet_range(&first_sheet)
        .map_err(|e| CleanError::EmptyTable(format!("读取工作表失败: {e}")))?;

    let all_rows: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(|cell| trim_cell(&cell.to_string())).collect())
        .collect();

    let header_idx = all_rows
        .iter()
        .take(HEADER_SCAN_LIMIT)
        .position(|row| is_header_line(&row.join(" ")))
        .ok_or_else(|| {
            CleanError::EmptyTable("工作表内未找到同时包含时间列与金额列的表头".to_string())
        })?;

    let doc_text = all_rows[..header_idx]
        .iter()
        .map(|row| row.join(" ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let headers = all_rows[header_idx].clone();
    let width = headers.len();
    let mut rows = Vec::new();
    for cells in all_rows.into_iter().skip(header_idx + 1) {
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        let mut cells = cells;
        cells.resize(width, String::new());
        rows.push(cells);
    }

    Ok(ExtractedTable {
        table: RawTable { headers, rows },
        doc_text,
    })
}

/// Extract one table per PDF page from already-extracted text and
/// concatenate the accepted pages in order.
///
/// A page is accepted when a header line mentions at least one key
/// transaction field and splits into more than `MIN_PDF_COLUMNS` - 1 columns.
/// Data rows are recognized by a date token; continuation lines fold into
/// the previous row. This is a documented heuristic over linearized PDF
/// text, with known imprecision for exotic layouts.
pub fn extract_pdf_text_tables(full_text: &str) -> CleanResult<ExtractedTable> {
    let pages: Vec<&str> = full_text
        .split('\u{000C}')
        .filter(|p| !p.trim().is_empty())
        .collect();
    if pages.is_empty() {
        return Err(CleanError::EmptyTable("PDF 没有可用页面".to_string()));
    }

    let doc_text = pages
        .iter()
        .take(3)
        .map(|p| (*p).to_string())
        .collect::<Vec<_>>()
        .join("\n");

    let mut headers: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut accepted_pages = 0usize;

    for (page_no, page) in pages.iter().enumerate() {
        let lines: Vec<String> = page
            .lines()
            .map(|l| ws_re().replace_all(l.trim(), " ").trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();

        let header_pos = lines.iter().position(|line| {
            PDF_KEY_FIELDS.iter().any(|k| line.contains(k))
                && line.split(' ').count() >= MIN_PDF_COLUMNS
        });
        let Some(header_pos) = header_pos else {
            log::debug!("table: pdf page {} rejected (no candidate header)", page_no + 1);
            continue;
        };

        let page_headers: Vec<String> =
            lines[header_pos].split(' ').map(|c| c.to_string()).collect();
        if headers.is_empty() {
            headers = page_headers.clone();
        }
        let width = headers.len();
        accepted_pages += 1;

        let mut current: Option<Vec<String>> = None;
        for line in &lines[header_pos + 1..] {
            if date_token_re().is_match(line) {
                if let Some(cells) = current.take() {
                    rows.push(fit_row(cells, width));
                }
                current = Some(split_pdf_row(line));
            } else if let Some(cells) = current.as_mut() {
                // Continuation of a wrapped cell; glue onto the last column.
                if let Some(last) = cells.last_mut() {
                    last.push_str(line);
                }
            }
        }
        if let Some(cells) = current.take() {
            rows.push(fit_row(cells, width));
        }
    }

    if accepted_pages == 0 || rows.is_empty() {
        return Err(CleanError::EmptyTable(
            "PDF 各页均未识别出有效表格".to_string(),
        ));
    }
    Ok(ExtractedTable {
        table: RawTable { headers, rows },
        doc_text,
    })
}

fn fit_row(mut cells: Vec<String>, width: usize) -> Vec<String> {
    if cells.len() > width {
        let tail = cells.split_off(width - 1).join("");
        cells.push(tail);
    }
    cells.resize(width, String::new());
    cells.into_iter().map(|c| trim_cell(&c)).collect()
}

/// Run `pdf_extract` over the file and lift the page tables out of the text.
pub fn extract_pdf(path: &Path) -> CleanResult<ExtractedTable> {
    let full_text =
        pdf_extract::extract_text(path).map_err(|e| CleanError::Pdf(e.to_string()))?;
    extract_pdf_text_tables(&full_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimited_skips_preamble_and_finds_tab_header() {
        let text = "微信支付交易明细证明\n兹证明：张三\n\n交易时间\t交易类型\t金额(元)\t交易对方\n2024-01-02 10:00:00\t商户消费\t-120.00\t张三超市\n";
        let out = extract_delimited(text).unwrap();
        assert_eq!(out.table.headers.len(), 4);
        assert_eq!(out.table.rows.len(), 1);
        assert!(out.doc_text.contains("兹证明"));
        assert_eq!(out.table.rows[0][3], "张三超市");
    }

    #[test]
    fn delimiter_probe_falls_through_to_comma() {
        let text = "交易时间,金额,交易对方\n2024-01-02,300,李四\n2024-01-03,-450,王五\n";
        let out = extract_delimited(text).unwrap();
        assert_eq!(out.table.headers, vec!["交易时间", "金额", "交易对方"]);
        assert_eq!(out.table.rows.len(), 2);
    }

    #[test]
    fn missing_header_is_empty_table() {
        let text = "随便一些文字\n没有表头\n1,2,3\n";
        assert!(matches!(
            extract_delimited(text),
            Err(CleanError::EmptyTable(_))
        ));
    }

    #[test]
    fn inconsistent_column_counts_reject_every_delimiter() {
        let text = "交易时间,金额\n2024-01-02,300,多余列,再多\nbroken\u{1},row\n";
        // Comma parse sees ragged rows; no other delimiter splits the header.
        assert!(matches!(
            extract_delimited(text),
            Err(CleanError::EmptyTable(_))
        ));
    }

    #[test]
    fn pdf_pages_concatenate_in_order() {
        let page1 = "微信支付交易明细证明\n兹证明：李四\n交易单号 交易时间 交易类型 金额(元) 交易对方\n1001 2024-01-02 10:00:00 商户消费 -150.00 张三超市\n";
        let page2 = "交易单号 交易时间 交易类型 金额(元) 交易对方\n1002 2024-01-03 11:00:00 转账 -300.00 李四维修\n";
        let text = format!("{page1}\u{000C}{page2}");
        let out = extract_pdf_text_tables(&text).unwrap();
        assert_eq!(out.table.headers.len(), 5);
        assert_eq!(out.table.rows.len(), 2);
        assert_eq!(out.table.rows[0][0], "1001");
        assert_eq!(out.table.rows[1][0], "1002");
        assert!(out.doc_text.contains("兹证明"));
    }

    #[test]
    fn pdf_continuation_lines_fold_into_previous_row() {
        let text = "交易单号 交易时间 金额(元) 交易对方\n1001 2024-01-02 10:00:00 -150.00 张三\n超市\n";
        let out = extract_pdf_text_tables(text).unwrap();
        assert_eq!(out.table.rows.len(), 1);
        let last = out.table.rows[0].last().unwrap();
        assert!(last.contains("张三") && last.contains("超市"));
    }

    #[test]
    fn pdf_without_any_table_is_empty_table() {
        let text = "只是封面\n没有表格\u{000C}备注页";
        assert!(matches!(
            extract_pdf_text_tables(text),
            Err(CleanError::EmptyTable(_))
        ));
    }
}
