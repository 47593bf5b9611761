use crate::discover::ImageRecord;
use crate::persist::Persistence;
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

const ACCEPT_IMAGES: &str = "image/*";
const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    pub delay: Duration,
    pub user_agent: String,
}

/// Outcome for one record. Never changed once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalResult {
    #[serde(flatten)]
    pub record: ImageRecord,
    pub success: bool,
    pub byte_size: Option<u64>,
    pub error_message: Option<String>,
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RetrievalRun {
    pub results: Vec<RetrievalResult>,
    pub stats: RunStats,
    /// Set when the batch stopped early because cancellation was requested.
    pub canceled: bool,
}

impl RetrievalRun {
    pub fn total_bytes(&self) -> u64 {
        self.results
            .iter()
            .filter(|r| r.success)
            .filter_map(|r| r.byte_size)
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RetrievalResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

#[derive(Debug, Error)]
enum ItemFailure {
    #[error("{0}")]
    Transport(String),

    #[error("HTTP {status}: {status_text}")]
    BadStatus { status: u16, status_text: String },

    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    #[error("{0}")]
    Persistence(String),
}

/// Retrieves `records` one at a time, in order, pausing for `options.delay` between items.
///
/// Every record yields exactly one result; a failing item is recorded and the batch moves
/// on. `should_cancel` is polled before each item and ends the batch early when it returns
/// true; it is polled again before each pause so a stop request never waits out the delay.
/// `pause` is the sleep primitive (`std::thread::sleep` outside of tests) and is never
/// called after the last item or for a zero delay.
pub fn retrieve_all<T, P, FPause, FShouldCancel>(
    records: &[ImageRecord],
    options: &RetrievalOptions,
    transport: &T,
    persistence: &P,
    mut pause: FPause,
    mut should_cancel: FShouldCancel,
) -> RetrievalRun
where
    T: Transport + ?Sized,
    P: Persistence + ?Sized,
    FPause: FnMut(Duration),
    FShouldCancel: FnMut() -> bool,
{
    let mut run = RetrievalRun {
        results: Vec::with_capacity(records.len()),
        ..RetrievalRun::default()
    };
    if records.is_empty() {
        return run;
    }

    let total = records.len();
    info!(
        count = total,
        delay_ms = options.delay.as_millis() as u64,
        "image_batch_begin"
    );

    for (i, record) in records.iter().enumerate() {
        if should_cancel() {
            warn!(done = i, total, "image_batch_canceled");
            run.canceled = true;
            break;
        }

        info!(
            position = i + 1,
            total,
            file_name = %record.file_name,
            url = %record.canonical_url,
            "image_fetch_begin"
        );

        let result = match retrieve_one(record, options, transport, persistence) {
            Ok((byte_size, digest)) => {
                run.stats.succeeded += 1;
                info!(file_name = %record.file_name, bytes = byte_size, "image_saved");
                RetrievalResult {
                    record: record.clone(),
                    success: true,
                    byte_size: Some(byte_size),
                    error_message: None,
                    sha256: Some(digest),
                }
            }
            Err(failure) => {
                run.stats.failed += 1;
                warn!(file_name = %record.file_name, error = %failure, "image_failed");
                RetrievalResult {
                    record: record.clone(),
                    success: false,
                    byte_size: None,
                    error_message: Some(failure.to_string()),
                    sha256: None,
                }
            }
        };
        run.results.push(result);

        if i + 1 < total && !options.delay.is_zero() {
            if should_cancel() {
                warn!(done = i + 1, total, "image_batch_canceled");
                run.canceled = true;
                break;
            }
            pause(options.delay);
        }
    }

    info!(
        succeeded = run.stats.succeeded,
        failed = run.stats.failed,
        bytes = run.total_bytes(),
        "image_batch_done"
    );
    run
}

fn retrieve_one<T, P>(
    record: &ImageRecord,
    options: &RetrievalOptions,
    transport: &T,
    persistence: &P,
) -> std::result::Result<(u64, String), ItemFailure>
where
    T: Transport + ?Sized,
    P: Persistence + ?Sized,
{
    let headers = [
        ("Accept", ACCEPT_IMAGES),
        ("User-Agent", options.user_agent.as_str()),
    ];
    let response = transport
        .fetch_binary(&record.canonical_url, &headers)
        .map_err(|err| ItemFailure::Transport(err.to_string()))?;

    if !response.ok {
        return Err(ItemFailure::BadStatus {
            status: response.status,
            status_text: response.status_text,
        });
    }

    let content_type = response
        .content_type
        .as_deref()
        .unwrap_or(DEFAULT_CONTENT_TYPE);
    if !content_type.to_ascii_lowercase().starts_with("image/") {
        return Err(ItemFailure::InvalidContentType(content_type.to_string()));
    }

    persistence
        .save_locally(&response.bytes, &record.file_name)
        .map_err(|err| ItemFailure::Persistence(err.to_string()))?;

    let digest = hex::encode(Sha256::digest(&response.bytes));
    Ok((response.bytes.len() as u64, digest))
}
