//! Post-run processing.
//!
//! After a run completes the server's run history is reloaded so presentation layers can show
//! the new entry.

use crate::api::ServerApi;
use crate::model::BackupHistoryEntry;
use log::warn;

/// Number of history entries reloaded after a completed run.
pub(crate) const HISTORY_REFRESH_LIMIT: usize = 50;

/// Result of post-run processing, ready for presentation layers.
#[derive(Debug, Default)]
pub(crate) struct ProcessedRun {
    pub history: Option<Vec<BackupHistoryEntry>>,
    pub warnings: Vec<String>,
}

/// Reload recent run history. Failures are reported as warnings, never as run failures.
pub(crate) async fn process_run_completion<A: ServerApi + ?Sized>(
    api: &A,
    history_load: usize,
) -> ProcessedRun {
    match api.load_backup_history(history_load).await {
        Ok(history) => ProcessedRun {
            history: Some(history.entries),
            warnings: Vec::new(),
        },
        Err(e) => {
            warn!("history refresh failed: {e}");
            ProcessedRun {
                history: None,
                warnings: vec![format!("백업 기록을 불러오지 못했습니다: {e}")],
            }
        }
    }
}
