use std::path::Path;

use crate::error::{CleanError, CleanResult};
use crate::lexicon::{WALLET_HEADER_KEYWORDS, WALLET_KEYWORD_MIN_HITS};
use crate::schema_map::{
    AliasSpec, GENERIC_ALIAS_SPECS, PDF_ALIAS_SPECS, SPREADSHEET_ALIAS_SPECS, WALLET_ALIAS_SPECS,
};
use crate::types::AmountUnit;

const SNIFF_LINE_LIMIT: usize = 50;

/// Closed set of statement layouts the pipeline understands. Each profile
/// decides the extractor, the alias table, and the inferred amount unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum SourceProfile {
    Spreadsheet,
    WalletText,
    CertifiedPdf,
    GenericText,
}

impl SourceProfile {
    pub fn label(self) -> &'static str {
        match self {
            SourceProfile::Spreadsheet => "spreadsheet",
            SourceProfile::WalletText => "wallet-text",
            SourceProfile::CertifiedPdf => "certified-pdf",
            SourceProfile::GenericText => "generic-text",
        }
    }

    pub fn alias_specs(self) -> &'static [AliasSpec] {
        match self {
            SourceProfile::Spreadsheet => SPREADSHEET_ALIAS_SPECS,
            SourceProfile::WalletText => WALLET_ALIAS_SPECS,
            SourceProfile::CertifiedPdf => PDF_ALIAS_SPECS,
            SourceProfile::GenericText => GENERIC_ALIAS_SPECS,
        }
    }

    /// Wallet exports carry amounts in fen; a 金额(分) style header confirms
    /// it. A declared unit from the caller always wins over this.
    pub fn inferred_unit(self, headers: &[String]) -> Option<AmountUnit> {
        if self != SourceProfile::WalletText {
            return None;
        }
        let fen_header = headers
            .iter()
            .any(|h| h.contains("金额(分)") || h.contains("金额（分）"));
        fen_header.then_some(AmountUnit::Hundredth)
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// True when the file needs text decoding before routing can finish.
pub fn is_text_extension(path: &Path) -> bool {
    matches!(extension_of(path).as_str(), "txt" | "csv" | "")
}

/// Route a statement file by extension; text files additionally sniff the
/// decoded content for the wallet-export keyword set.
pub fn detect_profile(path: &Path, decoded_text: Option<&str>) -> CleanResult<SourceProfile> {
    let profile = match extension_of(path).as_str() {
        "xlsx" | "xls" => SourceProfile::Spreadsheet,
        "pdf" => SourceProfile::CertifiedPdf,
        "txt" | "csv" | "" => {
            let text = decoded_text.ok_or_else(|| {
                CleanError::UnsupportedFormat(format!("{} (文本内容缺失)", path.display()))
            })?;
            classify_text(text)
        }
        other => {
            return Err(CleanError::UnsupportedFormat(format!(
                "{} (.{other})",
                path.display()
            )))
        }
    };
    log::debug!("profile: {} -> {}", path.display(), profile.label());
    Ok(profile)
}

/// Count distinct wallet header keywords within the first lines; three or
/// more hits mark the file as a wallet export.
fn classify_text(text: &str) -> SourceProfile {
    let head: String = text
        .lines()
        .take(SNIFF_LINE_LIMIT)
        .collect::<Vec<_>>()
        .join("\n");
    let hits = WALLET_HEADER_KEYWORDS
        .iter()
        .filter(|kw| head.contains(*kw))
        .count();
    if hits >= WALLET_KEYWORD_MIN_HITS {
        SourceProfile::WalletText
    } else {
        SourceProfile::GenericText
    }
}
