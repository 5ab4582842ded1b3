use serde::{Deserialize, Serialize};

/// Extensions the server copies when the user has not narrowed the list.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "heic", "heif", "png", "raw", "arw", "cr2", "nef", "dng", "mp4", "mov", "avi",
    "mkv", "mxf", "xml",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OrganizeStrategy {
    /// YYYY/MM/DD folders
    #[default]
    Date,
    /// YYYY/YYMMDD-EventName/FileType folders
    Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    #[default]
    Skip,
    Rename,
    Overwrite,
    Quarantine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DedupMethod {
    #[default]
    NameSize,
    Hash,
}

/// Job configuration posted to `/api/run`. Also the shape of the saved settings blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub source: String,
    pub dest: String,
    pub organize_strategy: OrganizeStrategy,
    pub event_name: String,
    pub conflict_policy: ConflictPolicy,
    pub dedup_method: DedupMethod,
    pub dry_run: bool,
    pub hash_verify: bool,
    pub ignore_state: bool,
    /// `YYYY-MM-DD`, compared as a calendar date without timezone.
    pub date_filter_start: Option<String>,
    pub date_filter_end: Option<String>,
    pub include_extensions: Vec<String>,
    /// Worker count hint; 0 lets the server decide.
    pub jobs: u32,
    pub unclassified_dir: String,
    pub quarantine_dir: String,
    pub state_file: String,
    pub log_file: String,
    pub log_json: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            source: String::new(),
            dest: String::new(),
            organize_strategy: OrganizeStrategy::Date,
            event_name: String::new(),
            conflict_policy: ConflictPolicy::Skip,
            dedup_method: DedupMethod::NameSize,
            dry_run: false,
            hash_verify: false,
            ignore_state: false,
            date_filter_start: None,
            date_filter_end: None,
            include_extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            jobs: 0,
            unclassified_dir: "unclassified".into(),
            quarantine_dir: "quarantine".into(),
            state_file: String::new(),
            log_file: String::new(),
            log_json: false,
        }
    }
}

/// What the server did with one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyAction {
    Copied,
    Skipped,
    Renamed,
    Overwritten,
    Quarantined,
    Failed,
    #[serde(other)]
    Other,
}

/// Statistics for a finished run. Field names follow the server's Go struct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RunSummary {
    pub scanned_files: u64,
    /// Files that passed the extension/date filters.
    #[serde(rename = "TotalFiles")]
    pub eligible: u64,
    pub copied: u64,
    pub skipped: u64,
    pub renamed: u64,
    pub overwritten: u64,
    pub quarantined: u64,
    pub failed: u64,
    pub unclassified: u64,
    pub start_time: String,
    pub end_time: String,
    /// Nanoseconds.
    #[serde(rename = "Duration")]
    pub duration_ns: u64,
    pub bytes_copied: u64,
    pub bytes_per_second: f64,
}

/// Tagged message pushed by the server over the progress channel.
///
/// The server omits zero-valued fields, so every payload field defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Status {
        #[serde(default)]
        message: String,
    },
    #[serde(rename = "analysis_progress")]
    ScanProgress {
        #[serde(default)]
        message: String,
        #[serde(default)]
        current: u64,
        #[serde(default)]
        total: u64,
    },
    #[serde(rename = "progress")]
    CopyProgress {
        #[serde(default)]
        current: u64,
        #[serde(default)]
        total: u64,
        #[serde(default)]
        filename: String,
        #[serde(default)]
        action: Option<CopyAction>,
        #[serde(default)]
        error: Option<String>,
    },
    Complete {
        #[serde(default)]
        summary: RunSummary,
    },
    Error {
        #[serde(default)]
        error: String,
    },
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Complete { .. } | ProgressEvent::Error { .. })
    }
}

/// Key of a per-field path list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Source,
    Dest,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Source => "source",
            Field::Dest => "dest",
        }
    }
}

/// Ordered path lists keyed by field. Backs both path history and bookmarks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathLists {
    #[serde(default)]
    pub source: Vec<String>,
    #[serde(default)]
    pub dest: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl PathLists {
    pub fn get(&self, field: Field) -> &[String] {
        match field {
            Field::Source => &self.source,
            Field::Dest => &self.dest,
        }
    }

    pub fn get_mut(&mut self, field: Field) -> &mut Vec<String> {
        match field {
            Field::Source => &mut self.source,
            Field::Dest => &mut self.dest,
        }
    }
}

pub type PathHistory = PathLists;
pub type Bookmarks = PathLists;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupHistoryEntry {
    #[serde(default)]
    pub config: JobConfig,
    #[serde(default)]
    pub summary: RunSummary,
    #[serde(default)]
    pub status: String,
}

impl BackupHistoryEntry {
    pub fn succeeded(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupHistory {
    #[serde(default)]
    pub entries: Vec<BackupHistoryEntry>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum HistoryFilter {
    #[default]
    All,
    DryRun,
    Real,
}

impl HistoryFilter {
    pub fn matches(self, entry: &BackupHistoryEntry) -> bool {
        match self {
            HistoryFilter::All => true,
            HistoryFilter::DryRun => entry.config.dry_run,
            HistoryFilter::Real => !entry.config.dry_run,
        }
    }
}

/// Severity of a user-visible log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn copy_progress_decodes_with_omitted_fields() {
        let ev: ProgressEvent =
            serde_json::from_str(r#"{"type":"progress","total":3,"filename":"a.jpg","action":"copied"}"#)
                .unwrap();
        assert_eq!(
            ev,
            ProgressEvent::CopyProgress {
                current: 0,
                total: 3,
                filename: "a.jpg".into(),
                action: Some(CopyAction::Copied),
                error: None,
            }
        );
    }

    #[test]
    fn unknown_copy_action_maps_to_other() {
        let ev: ProgressEvent =
            serde_json::from_str(r#"{"type":"progress","current":1,"total":1,"action":"linked"}"#)
                .unwrap();
        match ev {
            ProgressEvent::CopyProgress { action, .. } => assert_eq!(action, Some(CopyAction::Other)),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn complete_summary_uses_server_field_names() {
        let raw = r#"{"type":"complete","summary":{"ScannedFiles":10,"TotalFiles":8,"Copied":7,
            "Failed":1,"Duration":90000000000,"BytesCopied":2097152,"BytesPerSecond":1024.5,
            "StartTime":"2025-01-02T03:04:05Z"}}"#;
        let ev: ProgressEvent = serde_json::from_str(raw).unwrap();
        let ProgressEvent::Complete { summary } = ev else {
            panic!("expected complete");
        };
        assert_eq!(summary.scanned_files, 10);
        assert_eq!(summary.eligible, 8);
        assert_eq!(summary.copied, 7);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.duration_ns, 90_000_000_000);
        assert_eq!(summary.bytes_copied, 2_097_152);
        assert_eq!(summary.start_time, "2025-01-02T03:04:05Z");
    }

    #[test]
    fn scan_progress_uses_analysis_tag() {
        let ev: ProgressEvent = serde_json::from_str(
            r#"{"type":"analysis_progress","message":"분석 중","current":500,"total":1000}"#,
        )
        .unwrap();
        assert!(matches!(ev, ProgressEvent::ScanProgress { current: 500, total: 1000, .. }));
        assert!(!ev.is_terminal());
    }

    #[test]
    fn job_config_serializes_missing_dates_as_null() {
        let cfg = JobConfig {
            source: "/a".into(),
            dest: "/b".into(),
            ..Default::default()
        };
        let v = serde_json::to_value(&cfg).unwrap();
        assert_eq!(v["date_filter_start"], serde_json::Value::Null);
        assert_eq!(v["dedup_method"], "name-size");
        assert_eq!(v["organize_strategy"], "date");
        assert_eq!(v["unclassified_dir"], "unclassified");
    }

    #[test]
    fn settings_blob_fills_defaults() {
        let cfg: JobConfig = serde_json::from_str(r#"{"source":"/in","conflict_policy":"rename"}"#).unwrap();
        assert_eq!(cfg.source, "/in");
        assert_eq!(cfg.conflict_policy, ConflictPolicy::Rename);
        assert_eq!(cfg.quarantine_dir, "quarantine");
        assert_eq!(cfg.include_extensions.len(), DEFAULT_EXTENSIONS.len());
    }

    #[test]
    fn history_filter_splits_dry_runs() {
        let mut entry = BackupHistoryEntry {
            config: JobConfig::default(),
            summary: RunSummary::default(),
            status: "success".into(),
        };
        assert!(HistoryFilter::Real.matches(&entry));
        entry.config.dry_run = true;
        assert!(HistoryFilter::DryRun.matches(&entry));
        assert!(!HistoryFilter::Real.matches(&entry));
        assert!(HistoryFilter::All.matches(&entry));
    }
}
