//! Maps one progress event to the display delta it causes.
//!
//! Pure: nothing here remembers the previous event.

use crate::model::{CopyAction, LogLevel, ProgressEvent, RunSummary};

/// Scan progress is logged only on every Nth file.
pub const SCAN_LOG_EVERY: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressBar {
    Indeterminate,
    Percent(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: LogLevel,
    pub message: String,
}

impl LogLine {
    fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub progress: ProgressBar,
    pub text: String,
    pub log: Option<LogLine>,
    /// Entry appended to the processed-file list.
    pub processed: Option<String>,
    /// Clear the processed-file list before applying this projection.
    pub clear_processed: bool,
    pub summary: Option<RunSummary>,
    /// Blocking notice for the user.
    pub notice: Option<String>,
}

impl Projection {
    fn new(progress: ProgressBar, text: impl Into<String>) -> Self {
        Self {
            progress,
            text: text.into(),
            log: None,
            processed: None,
            clear_processed: false,
            summary: None,
            notice: None,
        }
    }

    /// Zeroed progress with the file list cleared.
    pub fn reset(text: impl Into<String>) -> Self {
        Self {
            clear_processed: true,
            ..Self::new(ProgressBar::Percent(0), text)
        }
    }
}

/// `round(current / total * 100)`, 0 for an empty total, capped at 100.
pub fn percent(current: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (current as f64 / total as f64 * 100.0).round();
    pct.min(100.0) as u8
}

pub fn action_label(action: Option<CopyAction>) -> &'static str {
    match action {
        Some(CopyAction::Copied) => "[복사]",
        Some(CopyAction::Skipped) => "[건너뜀]",
        Some(CopyAction::Renamed) => "[이름변경]",
        Some(CopyAction::Overwritten) => "[덮어쓰기]",
        Some(CopyAction::Quarantined) => "[격리]",
        Some(CopyAction::Failed) => "[실패]",
        Some(CopyAction::Other) | None => "[처리]",
    }
}

pub fn project(event: &ProgressEvent) -> Projection {
    match event {
        ProgressEvent::Status { message } => Projection {
            log: Some(LogLine::new(LogLevel::Info, message.clone())),
            ..Projection::new(ProgressBar::Indeterminate, message.clone())
        },
        ProgressEvent::ScanProgress {
            message,
            current,
            total,
        } => {
            let text = format!("{message} ({current}/{total})");
            let log = (current % SCAN_LOG_EVERY == 0).then(|| LogLine::new(LogLevel::Info, &text));
            Projection {
                log,
                ..Projection::new(ProgressBar::Percent(percent(*current, *total)), text)
            }
        }
        ProgressEvent::CopyProgress {
            current,
            total,
            filename,
            action,
            error,
        } => {
            let log = match action {
                Some(CopyAction::Failed) => Some(LogLine::new(
                    LogLevel::Error,
                    format!(
                        "실패: {filename} - {}",
                        error.as_deref().unwrap_or("Unknown error")
                    ),
                )),
                Some(CopyAction::Quarantined) => Some(LogLine::new(
                    LogLevel::Warning,
                    format!("격리됨: {filename}"),
                )),
                _ => None,
            };
            Projection {
                log,
                processed: Some(format!("{} {filename}", action_label(*action))),
                ..Projection::new(
                    ProgressBar::Percent(percent(*current, *total)),
                    format!("복사 중: {filename} ({current}/{total})"),
                )
            }
        }
        ProgressEvent::Complete { summary } => Projection {
            log: Some(LogLine::new(LogLevel::Success, "백업 작업이 완료되었습니다.")),
            summary: Some(summary.clone()),
            ..Projection::new(ProgressBar::Percent(100), "완료!")
        },
        ProgressEvent::Error { error } => Projection {
            log: Some(LogLine::new(LogLevel::Error, format!("오류 발생: {error}"))),
            notice: Some(format!("오류: {error}")),
            ..Projection::reset("오류 발생")
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn copy(current: u64, total: u64, action: Option<CopyAction>) -> ProgressEvent {
        ProgressEvent::CopyProgress {
            current,
            total,
            filename: "IMG_0001.ARW".into(),
            action,
            error: None,
        }
    }

    #[test]
    fn copy_progress_half_way_is_fifty_percent() {
        let p = project(&copy(250, 500, Some(CopyAction::Copied)));
        assert_eq!(p.progress, ProgressBar::Percent(50));
        assert_eq!(p.text, "복사 중: IMG_0001.ARW (250/500)");
        assert_eq!(p.processed.as_deref(), Some("[복사] IMG_0001.ARW"));
        assert_eq!(p.log, None);
    }

    #[test]
    fn percent_edges() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(7, 5), 100);
    }

    #[test]
    fn every_action_has_its_own_label() {
        let labels: Vec<&str> = [
            CopyAction::Copied,
            CopyAction::Skipped,
            CopyAction::Renamed,
            CopyAction::Overwritten,
            CopyAction::Quarantined,
            CopyAction::Failed,
        ]
        .into_iter()
        .map(|a| action_label(Some(a)))
        .collect();
        let mut unique = labels.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), labels.len());
        assert_eq!(action_label(Some(CopyAction::Other)), "[처리]");
        assert_eq!(action_label(None), "[처리]");
    }

    #[test]
    fn failed_and_quarantined_emit_log_lines() {
        let failed = project(&ProgressEvent::CopyProgress {
            current: 1,
            total: 2,
            filename: "a.jpg".into(),
            action: Some(CopyAction::Failed),
            error: Some("permission denied".into()),
        });
        assert_eq!(
            failed.log,
            Some(LogLine::new(LogLevel::Error, "실패: a.jpg - permission denied"))
        );

        let quarantined = project(&ProgressEvent::CopyProgress {
            current: 2,
            total: 2,
            filename: "b.jpg".into(),
            action: Some(CopyAction::Quarantined),
            error: None,
        });
        assert_eq!(
            quarantined.log,
            Some(LogLine::new(LogLevel::Warning, "격리됨: b.jpg"))
        );

        let unknown = project(&copy(1, 1, Some(CopyAction::Failed)));
        assert_eq!(
            unknown.log.map(|l| l.message),
            Some("실패: IMG_0001.ARW - Unknown error".to_string())
        );
    }

    #[test]
    fn scan_progress_logs_every_500th() {
        let scan = |current| ProgressEvent::ScanProgress {
            message: "메타데이터 분석 중".into(),
            current,
            total: 2000,
        };
        assert!(project(&scan(499)).log.is_none());
        assert!(project(&scan(500)).log.is_some());
        assert!(project(&scan(1000)).log.is_some());
        assert_eq!(project(&scan(1000)).progress, ProgressBar::Percent(50));
    }

    #[test]
    fn status_is_indeterminate() {
        let p = project(&ProgressEvent::Status {
            message: "파일 스캔 중...".into(),
        });
        assert_eq!(p.progress, ProgressBar::Indeterminate);
        assert_eq!(p.text, "파일 스캔 중...");
        assert_eq!(p.log.map(|l| l.level), Some(LogLevel::Info));
    }

    #[test]
    fn error_resets_and_raises_notice() {
        let p = project(&ProgressEvent::Error {
            error: "destination not writable".into(),
        });
        assert_eq!(p.progress, ProgressBar::Percent(0));
        assert!(p.clear_processed);
        assert_eq!(p.notice.as_deref(), Some("오류: destination not writable"));
        assert!(p.summary.is_none());
    }

    #[test]
    fn complete_carries_summary() {
        let summary = RunSummary {
            copied: 4,
            ..Default::default()
        };
        let p = project(&ProgressEvent::Complete {
            summary: summary.clone(),
        });
        assert_eq!(p.progress, ProgressBar::Percent(100));
        assert_eq!(p.summary, Some(summary));
        assert!(p.notice.is_none());
    }
}
