pub mod analytics;
pub mod coerce;
pub mod correlation;
pub mod decode;
pub mod error;
pub mod ingest;
pub mod lexicon;
pub mod profile;
pub mod proximity;
pub mod resolve;
pub mod schema_map;
pub mod store;
pub mod table_extract;
pub mod types;
pub mod validate;

pub use analytics::{
    get_key_counterparties, get_statistics, get_trend, CounterpartyStat, KeyCounterparty,
    StatFilter, TrendPoint,
};
pub use correlation::{get_interactions, get_known_distribution};
pub use error::{CleanError, CleanResult};
pub use ingest::{
    collect_statement_files, ingest_batch, ingest_file, BatchIngestReport, FileIngestReport,
};
pub use lexicon::Lexicon;
pub use profile::SourceProfile;
pub use proximity::{find_hidden_partners, DEFAULT_TOP_K, DEFAULT_WINDOW_MINUTES};
pub use schema_map::AliasOverrides;
pub use store::{BatchMeta, TransactionStore, TxFilter};
pub use types::{
    AmountUnit, CanonicalTransaction, CaseContext, InteractionEdge, PersonRole,
    ProximityCandidate, MIN_VALID_AMOUNT_CENTS,
};
