pub mod archive;
pub mod download;

pub use archive::{extract_if_missing, ExtractOutcome};
pub use download::{ensure_downloaded, DownloadOutcome, Fetcher, HttpFetcher};
