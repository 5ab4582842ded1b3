use crate::model::RunSummary;
use crate::orchestrator::Phase;
use crate::projector::ProgressBar;

/// Processed-file entries kept for display.
const PROCESSED_MAX: usize = 500;

pub struct ConsoleState {
    pub phase: Phase,
    pub progress: ProgressBar,
    pub text: String,
    pub processed: Vec<String>,
    pub last_summary: Option<RunSummary>,
    pub notices: Vec<String>,
}

impl Default for ConsoleState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            progress: ProgressBar::Percent(0),
            text: "대기 중".into(),
            processed: Vec::new(),
            last_summary: None,
            notices: Vec::new(),
        }
    }
}

impl ConsoleState {
    pub fn push_processed(&mut self, entry: String) {
        self.processed.push(entry);
        if self.processed.len() > PROCESSED_MAX {
            let _ = self.processed.drain(0..(self.processed.len() - PROCESSED_MAX));
        }
    }
}
