//! Text summary builders for CLI output.
//!
//! Formats a finished run's summary and the server's run history as human-readable lines.

use crate::format::{format_bytes, format_duration_nanos, format_speed, short_path};
use crate::model::{BackupHistoryEntry, HistoryFilter, RunSummary};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Two groups: file counts, then performance.
pub(crate) fn build_text_summary(summary: &RunSummary) -> TextSummary {
    let counts = [
        ("스캔됨", summary.scanned_files),
        ("처리 대상", summary.eligible),
        ("복사됨", summary.copied),
        ("건너뜀", summary.skipped),
        ("이름 변경", summary.renamed),
        ("덮어쓰기", summary.overwritten),
        ("격리됨", summary.quarantined),
        ("실패", summary.failed),
        ("분류 불가", summary.unclassified),
    ];

    let mut lines = vec!["파일 처리".to_string()];
    lines.extend(counts.iter().map(|(label, n)| format!("  {label}: {n}")));
    lines.push("성능".to_string());
    lines.push(format!(
        "  소요 시간: {}",
        format_duration_nanos(summary.duration_ns)
    ));
    lines.push(format!(
        "  복사량: {}",
        format_bytes(summary.bytes_copied as f64)
    ));
    lines.push(format!("  속도: {}", format_speed(summary.bytes_per_second)));

    TextSummary { lines }
}

/// One block per entry that passes `filter`, newest first as delivered by the server.
pub(crate) fn build_history_summary(
    entries: &[BackupHistoryEntry],
    filter: HistoryFilter,
) -> TextSummary {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let mut lines = Vec::new();
    for entry in entries.iter().filter(|e| filter.matches(e)) {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.extend(history_entry_lines(entry, offset));
    }
    if lines.is_empty() {
        lines.push("백업 이력이 없습니다".to_string());
    }
    TextSummary { lines }
}

fn history_entry_lines(entry: &BackupHistoryEntry, offset: UtcOffset) -> Vec<String> {
    let s = &entry.summary;
    let status = if entry.succeeded() {
        "✓ 성공"
    } else {
        "✗ 실패"
    };
    let badge = if entry.config.dry_run {
        " 시뮬레이션"
    } else {
        ""
    };
    vec![
        format!(
            "{} [{status}]{badge}",
            format_start_time(&s.start_time, offset)
        ),
        format!(
            "  {} → {}",
            short_path(&entry.config.source),
            short_path(&entry.config.dest)
        ),
        format!(
            "  복사: {}  스킵: {}  실패: {}  분류불가: {}  소요시간: {}",
            s.copied,
            s.skipped,
            s.failed,
            s.unclassified,
            format_duration_nanos(s.duration_ns)
        ),
        format!(
            "  {} (약 {})",
            format_bytes(s.bytes_copied as f64),
            format_speed(s.bytes_per_second)
        ),
    ]
}

/// RFC 3339 timestamp rendered in `offset`; unparseable input is shown as-is.
fn format_start_time(raw: &str, offset: UtcOffset) -> String {
    let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    OffsetDateTime::parse(raw, &Rfc3339)
        .ok()
        .and_then(|t| t.to_offset(offset).format(fmt).ok())
        .unwrap_or_else(|| raw.to_string())
}
