//! Line-oriented terminal presentation of a run.
//!
//! Consumes [`UiEvent`]s from the controller, keeps a [`ConsoleState`] and writes log lines,
//! notices and per-file progress to stderr. The final summary goes to stdout.

mod state;

pub use state::ConsoleState;

use crate::cli::OutputLine;
use crate::model::HistoryFilter;
use crate::orchestrator::UiEvent;
use crate::projector::{LogLine, ProgressBar, Projection};
use crate::text_summary::{build_history_summary, build_text_summary};
use log::debug;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// `[HH:MM:SS] message`.
fn render_log_line(line: &LogLine, now: OffsetDateTime) -> String {
    let stamp = now
        .format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_default();
    format!("[{stamp}] {}", line.message)
}

fn local_now() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    match UtcOffset::current_local_offset() {
        Ok(offset) => now.to_offset(offset),
        Err(_) => now,
    }
}

fn progress_prefix(progress: ProgressBar) -> String {
    match progress {
        ProgressBar::Indeterminate => "[ ... ]".to_string(),
        ProgressBar::Percent(p) => format!("[{p:>3}%]"),
    }
}

/// Apply one event to `state` and return the lines it produces.
fn apply_event(
    state: &mut ConsoleState,
    ev: UiEvent,
    json: bool,
    now: OffsetDateTime,
) -> Vec<OutputLine> {
    let mut out = Vec::new();
    match ev {
        UiEvent::Log { level, message } => {
            out.push(OutputLine::Stderr(render_log_line(
                &LogLine { level, message },
                now,
            )));
        }
        UiEvent::Notice(notice) => {
            out.push(OutputLine::Stderr(format!("! {notice}")));
            state.notices.push(notice);
        }
        UiEvent::PhaseChanged(phase) => {
            debug!("phase -> {phase:?}");
            state.phase = phase;
        }
        UiEvent::Projection(p) => apply_projection(state, p, json, now, &mut out),
        UiEvent::HistoryRefreshed(entries) => {
            out.push(OutputLine::Stderr(format!(
                "백업 기록 갱신: {}건",
                entries.len()
            )));
            // Newest first; show only the run that just finished.
            if let Some(newest) = entries.first() {
                out.extend(
                    build_history_summary(std::slice::from_ref(newest), HistoryFilter::All)
                        .lines
                        .into_iter()
                        .map(OutputLine::Stderr),
                );
            }
        }
    }
    out
}

fn apply_projection(
    state: &mut ConsoleState,
    p: Projection,
    json: bool,
    now: OffsetDateTime,
    out: &mut Vec<OutputLine>,
) {
    if p.clear_processed {
        state.processed.clear();
    }
    state.progress = p.progress;
    state.text = p.text;

    if let Some(entry) = p.processed {
        out.push(OutputLine::Stderr(format!(
            "{} {entry}",
            progress_prefix(state.progress)
        )));
        state.push_processed(entry);
    }
    if let Some(line) = p.log.as_ref() {
        out.push(OutputLine::Stderr(render_log_line(line, now)));
    }
    if let Some(notice) = p.notice {
        out.push(OutputLine::Stderr(format!("! {notice}")));
        state.notices.push(notice);
    }
    if let Some(summary) = p.summary {
        if !json {
            out.extend(
                build_text_summary(&summary)
                    .lines
                    .into_iter()
                    .map(OutputLine::Stdout),
            );
        }
        state.last_summary = Some(summary);
    }
}

/// Render events until the controller drops its sender.
pub async fn run_console(
    mut rx: UnboundedReceiver<UiEvent>,
    out_tx: UnboundedSender<OutputLine>,
    json: bool,
) -> ConsoleState {
    let mut state = ConsoleState::default();
    while let Some(ev) = rx.recv().await {
        for line in apply_event(&mut state, ev, json, local_now()) {
            let _ = out_tx.send(line);
        }
    }
    state
}
