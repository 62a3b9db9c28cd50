use thiserror::Error;

/// Errors that abort processing of a single statement file. Row-level
/// problems (an unparsable amount or timestamp) are not represented here:
/// they exclude the affected row and surface as messages in the file's
/// ingest report.
#[derive(Debug, Error)]
pub enum CleanError {
    #[error("不支持的文件格式: {0}")]
    UnsupportedFormat(String),

    #[error("无法使用任何候选编码解码文件内容")]
    EncodingUnresolved,

    #[error("未找到有效的表格数据: {0}")]
    EmptyTable(String),

    #[error("缺少必需列: {0}")]
    MissingRequiredFields(String),

    #[error("过滤后数据为空: {0}")]
    EmptyAfterFilter(String),

    #[error("人员身份必须为 盗窃人员/收脏人员/排查人员 之一，收到: {0}")]
    InvalidPersonRole(String),

    #[error("写入交易库失败: {0}")]
    StoreWriteFailure(rusqlite::Error),

    #[error("读取交易库失败: {0}")]
    StoreReadFailure(rusqlite::Error),

    #[error("读取文件失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF 解析失败: {0}")]
    Pdf(String),
}

pub type CleanResult<T> = Result<T, CleanError>;
