use serde::Serialize;
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::coerce::coerce_rows;
use crate::decode::decode_bytes;
use crate::error::{CleanError, CleanResult};
use crate::lexicon::Lexicon;
use crate::profile::{detect_profile, is_text_extension, SourceProfile};
use crate::resolve::{resolve_owner, scrub_counterparties};
use crate::schema_map::{map_table, AliasOverrides};
use crate::store::{BatchMeta, TransactionStore};
use crate::table_extract::{extract_delimited, extract_pdf, extract_spreadsheet, ExtractedTable};
use crate::types::{AmountUnit, CaseContext};
use crate::validate::validate_rows;

const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "csv", "xls", "xlsx", "pdf"];

/// Outcome of one committed file import.
#[derive(Debug, Serialize)]
pub struct FileIngestReport {
    pub file: String,
    pub profile: SourceProfile,
    pub batch_id: String,
    pub imported: usize,
    pub dropped: usize,
    pub row_errors: Vec<String>,
    pub owner_name: String,
}

#[derive(Debug, Serialize)]
pub struct FailedFile {
    pub file: String,
    pub error: String,
}

/// Per-file outcomes of a multi-file import. A failed file never hides
/// another file's result.
#[derive(Debug, Serialize, Default)]
pub struct BatchIngestReport {
    pub succeeded: Vec<FileIngestReport>,
    pub failed: Vec<FailedFile>,
}

impl BatchIngestReport {
    pub fn imported_total(&self) -> usize {
        self.succeeded.iter().map(|r| r.imported).sum()
    }
}

fn file_sha1(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn extract_for_profile(
    profile: SourceProfile,
    path: &Path,
    text: Option<&str>,
) -> CleanResult<ExtractedTable> {
    match profile {
        SourceProfile::Spreadsheet => extract_spreadsheet(path),
        SourceProfile::CertifiedPdf => extract_pdf(path),
        SourceProfile::WalletText | SourceProfile::GenericText => {
            let text = text.ok_or_else(|| {
                CleanError::UnsupportedFormat(format!("{} (文本内容缺失)", path.display()))
            })?;
            extract_delimited(text)
        }
    }
}

/// Run the whole cleaning pipeline for one statement file and commit the
/// survivors atomically. Row-level amount/time failures are reported, not
/// fatal; file-level failures abort this file only.
pub fn ingest_file(
    store: &mut TransactionStore,
    path: &Path,
    case: &CaseContext,
    declared_unit: Option<AmountUnit>,
    overrides: Option<&AliasOverrides>,
) -> CleanResult<FileIngestReport> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    log::info!("ingest: {} ({})", file_name, case.case_id);

    let bytes = std::fs::read(path)?;
    let fingerprint = file_sha1(&bytes);

    let text = if is_text_extension(path) {
        Some(decode_bytes(&bytes)?)
    } else {
        None
    };
    let profile = detect_profile(path, text.as_deref())?;
    let extracted = extract_for_profile(profile, path, text.as_deref())?;

    let unit = declared_unit
        .or_else(|| profile.inferred_unit(&extracted.table.headers))
        .unwrap_or(AmountUnit::Base);

    let drafts = map_table(&extracted.table, profile.alias_specs(), overrides)?;
    let lex = Lexicon::default();
    let (mut rows, row_errors) = coerce_rows(drafts, unit, &lex);
    scrub_counterparties(&mut rows);
    resolve_owner(&mut rows, &extracted.doc_text, &file_name, &lex);

    let batch_id = Uuid::new_v4().to_string();
    let outcome = validate_rows(rows, case, &file_name, &batch_id)?;
    let owner_name = outcome
        .transactions
        .first()
        .map(|t| t.owner_name.clone())
        .unwrap_or_default();

    let meta = BatchMeta {
        id: batch_id.clone(),
        case_id: case.case_id.clone(),
        source_file: file_name.clone(),
        file_sha1: fingerprint,
    };
    let imported = store.append(&meta, &outcome.transactions)?;

    Ok(FileIngestReport {
        file: file_name,
        profile,
        batch_id,
        imported,
        dropped: outcome.dropped_total(),
        row_errors,
        owner_name,
    })
}

/// Import many files with per-file error isolation.
pub fn ingest_batch(
    store: &mut TransactionStore,
    paths: &[PathBuf],
    case: &CaseContext,
    declared_unit: Option<AmountUnit>,
    overrides: Option<&AliasOverrides>,
) -> BatchIngestReport {
    let mut report = BatchIngestReport::default();
    for path in paths {
        match ingest_file(store, path, case, declared_unit, overrides) {
            Ok(file_report) => report.succeeded.push(file_report),
            Err(err) => {
                log::warn!("ingest: {} 失败: {err}", path.display());
                report.failed.push(FailedFile {
                    file: path.display().to_string(),
                    error: err.to_string(),
                });
            }
        }
    }
    report
}

/// Discover supported statement files under a directory, recursively,
/// in stable path order.
pub fn collect_statement_files(dir: &Path) -> CleanResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            CleanError::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::Other, "目录遍历失败")
            }))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let ext = entry
            .path()
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
