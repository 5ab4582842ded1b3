//! Run lifecycle controller.
//!
//! Sequences channel open -> start request -> event stream, and is the only consumer of
//! channel events. Presentation layers receive [`UiEvent`]s and never touch the run state.

use super::post_process::{process_run_completion, HISTORY_REFRESH_LIMIT};
use super::state::{Phase, RunState};
use crate::api::{ApiError, ServerApi};
use crate::model::{BackupHistoryEntry, JobConfig, LogLevel, ProgressEvent, RunSummary};
use crate::projector::{project, Projection};
use crate::transport::{Channel, ChannelEvent, Transport};
use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

pub const DISCONNECT_NOTICE: &str =
    "서버와의 연결이 끊어졌습니다. 백업이 계속 진행 중일 수 있으므로 상태를 확인하세요.";

/// Events emitted to presentation layers, in the order they happen.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Log { level: LogLevel, message: String },
    /// Blocking, user-facing notice.
    Notice(String),
    PhaseChanged(Phase),
    Projection(Projection),
    HistoryRefreshed(Vec<BackupHistoryEntry>),
}

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("이미 백업이 실행 중입니다.")]
    AlreadyRunning,
    #[error("원본 경로와 목적지를 입력해주세요.")]
    MissingPaths,
    #[error("서버 연결 실패: {0}")]
    ChannelFailed(String),
    #[error("시작 요청 전에 서버 연결이 끊어졌습니다.")]
    ChannelClosedBeforeRequest,
    #[error("백업 시작 실패: {0}")]
    Rejected(#[source] ApiError),
}

/// How a driven run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(Box<RunSummary>),
    Failed(String),
    /// Observability was lost; the job may still be executing on the server.
    Disconnected,
}

pub struct RunController<A: ServerApi, T: Transport> {
    api: Arc<A>,
    transport: T,
    state: RunState,
    channel: Option<Channel>,
    ui_tx: UnboundedSender<UiEvent>,
    outcome: Option<RunOutcome>,
}

/// Next event of the current channel; pends forever when there is none.
async fn next_event(channel: &mut Option<Channel>) -> Option<ChannelEvent> {
    match channel {
        Some(ch) => ch.recv().await,
        None => futures::future::pending().await,
    }
}

impl<A: ServerApi, T: Transport> RunController<A, T> {
    pub fn new(api: Arc<A>, transport: T, ui_tx: UnboundedSender<UiEvent>) -> Self {
        Self {
            api,
            transport,
            state: RunState::default(),
            channel: None,
            ui_tx,
            outcome: None,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &RunState {
        &self.state
    }

    fn emit(&self, event: UiEvent) {
        let _ = self.ui_tx.send(event);
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(UiEvent::Log {
            level,
            message: message.into(),
        });
    }

    fn set_phase_idle(&mut self) {
        self.state.reset();
        self.emit(UiEvent::PhaseChanged(Phase::Idle));
    }

    fn discard_channel(&mut self) {
        if let Some(mut ch) = self.channel.take() {
            ch.close();
        }
    }

    /// Start one run. Returns once the server accepted (or rejected) the start request;
    /// progress that arrives meanwhile is already handled.
    pub async fn start(&mut self, config: &JobConfig) -> Result<(), StartError> {
        if !self.state.is_idle() {
            self.log(LogLevel::Warning, StartError::AlreadyRunning.to_string());
            self.emit(UiEvent::Notice(StartError::AlreadyRunning.to_string()));
            return Err(StartError::AlreadyRunning);
        }
        if config.source.is_empty() || config.dest.is_empty() {
            self.log(
                LogLevel::Warning,
                "경로 미입력: 원본 또는 목적지 경로가 비어있습니다.",
            );
            self.emit(UiEvent::Notice(StartError::MissingPaths.to_string()));
            return Err(StartError::MissingPaths);
        }

        self.state.begin();
        self.outcome = None;
        self.emit(UiEvent::PhaseChanged(Phase::Starting));
        self.log(
            LogLevel::Info,
            format!("설정 확인: Source={}, Dest={}", config.source, config.dest),
        );

        self.log(LogLevel::Info, "WebSocket 연결 시도 중...");
        self.channel = Some(self.transport.connect());
        if let Err(e) = self.await_open().await {
            return Err(self.fail_start(e));
        }
        // The channel may have dropped between the open event and now.
        if !self.channel.as_ref().is_some_and(Channel::is_open) {
            return Err(self.fail_start(StartError::ChannelClosedBeforeRequest));
        }

        self.log(
            LogLevel::Info,
            "WebSocket 연결 성공. 서버에 실행 요청 전송 중...",
        );
        self.state.mark_request_sent();
        let api = Arc::clone(&self.api);
        let request_config = config.clone();
        let request = async move { api.start_job(&request_config).await };
        tokio::pin!(request);

        // Progress may race ahead of the response; keep consuming it in arrival order.
        let response = loop {
            tokio::select! {
                res = &mut request => break res,
                ev = next_event(&mut self.channel) => self.handle_channel_event(ev).await,
            }
        };

        match response {
            Ok(()) => {
                if self.state.mark_running() {
                    info!("start request accepted");
                    self.log(LogLevel::Success, "서버 응답 수신: 백업이 시작되었습니다.");
                    self.emit(UiEvent::PhaseChanged(Phase::Running));
                    self.emit(UiEvent::Projection(Projection::reset("준비 중...")));
                } else {
                    debug!("start accepted after run already left Starting ({:?})", self.state.phase());
                }
                Ok(())
            }
            Err(e) => {
                if self.state.phase() != Phase::Starting {
                    debug!("start rejection after run already ended: {e}");
                    return Err(StartError::Rejected(e));
                }
                Err(self.fail_start(StartError::Rejected(e)))
            }
        }
    }

    /// Suspend until the fresh channel reports open or fails.
    async fn await_open(&mut self) -> Result<(), StartError> {
        let Some(channel) = self.channel.as_mut() else {
            return Err(StartError::ChannelFailed("no channel".into()));
        };
        match channel.recv().await {
            Some(ChannelEvent::Open) => {
                self.state.mark_channel_opened();
                self.log(LogLevel::Success, "WebSocket 연결 열림");
                Ok(())
            }
            Some(ChannelEvent::Error(e)) => Err(StartError::ChannelFailed(e)),
            Some(ChannelEvent::Close { code }) => Err(StartError::ChannelFailed(format!(
                "연결이 열리기 전에 종료되었습니다 (Code: {})",
                code_text(code)
            ))),
            Some(ChannelEvent::Message(_)) => {
                Err(StartError::ChannelFailed("unexpected message before open".into()))
            }
            None => Err(StartError::ChannelFailed("channel ended".into())),
        }
    }

    /// Back to the Idle baseline with the channel discarded; hands the error back.
    fn fail_start(&mut self, err: StartError) -> StartError {
        warn!("start failed: {err}");
        self.log(LogLevel::Error, format!("실행 중 예외 발생: {err}"));
        self.emit(UiEvent::Notice(format!("오류: {err}")));
        self.discard_channel();
        self.set_phase_idle();
        self.emit(UiEvent::Projection(Projection::reset("대기 중")));
        err
    }

    async fn handle_channel_event(&mut self, event: Option<ChannelEvent>) {
        match event {
            Some(ChannelEvent::Message(text)) => self.handle_message(&text).await,
            // Transport errors are always followed by a close; react to that one only.
            Some(ChannelEvent::Error(e)) => {
                warn!("progress channel error: {e}");
                self.log(LogLevel::Error, "WebSocket 연결 오류 발생");
            }
            Some(ChannelEvent::Close { code }) => {
                self.log(
                    LogLevel::Warning,
                    format!("WebSocket 연결 종료 (Code: {})", code_text(code)),
                );
                self.handle_disconnect();
            }
            Some(ChannelEvent::Open) => debug!("ignoring repeated open"),
            None => {
                self.channel = None;
                self.handle_disconnect();
            }
        }
    }

    async fn handle_message(&mut self, text: &str) {
        let event: ProgressEvent = match serde_json::from_str(text) {
            Ok(ev) => ev,
            Err(e) => {
                warn!("undecodable progress message ({e}): {text}");
                return;
            }
        };
        let terminal = event.is_terminal();
        self.emit(UiEvent::Projection(project(&event)));
        if !terminal {
            return;
        }

        self.state.begin_termination();
        self.discard_channel();
        self.set_phase_idle();
        match event {
            ProgressEvent::Complete { summary } => {
                info!("run complete: {} copied", summary.copied);
                self.outcome = Some(RunOutcome::Completed(Box::new(summary)));
                let processed = process_run_completion(self.api.as_ref(), HISTORY_REFRESH_LIMIT).await;
                for message in processed.warnings {
                    self.log(LogLevel::Warning, message);
                }
                if let Some(history) = processed.history {
                    self.emit(UiEvent::HistoryRefreshed(history));
                }
            }
            ProgressEvent::Error { error } => {
                warn!("run failed: {error}");
                self.outcome = Some(RunOutcome::Failed(error));
            }
            _ => {}
        }
    }

    /// The channel is gone. A run that may still be executing keeps its phase and gets one notice.
    fn handle_disconnect(&mut self) {
        if self.state.may_still_be_running() {
            if self.state.claim_terminal_notice() {
                self.log(
                    LogLevel::Error,
                    "서버와의 연결이 끊겼습니다. 백업 상태를 확인할 수 없습니다.",
                );
                self.emit(UiEvent::Notice(DISCONNECT_NOTICE.into()));
            }
        } else if !self.state.is_idle() {
            self.set_phase_idle();
        }
    }

    /// Consume channel events until the run ends or `stop` resolves.
    ///
    /// Resolving `stop` closes the channel, which counts as a disconnect and not as a cancel.
    pub async fn drive<F: Future<Output = ()>>(&mut self, stop: F) -> RunOutcome {
        tokio::pin!(stop);
        let mut stopped = false;
        loop {
            if let Some(outcome) = self.outcome.take() {
                return outcome;
            }
            if self.channel.is_none() {
                return RunOutcome::Disconnected;
            }
            tokio::select! {
                ev = next_event(&mut self.channel) => self.handle_channel_event(ev).await,
                _ = &mut stop, if !stopped => {
                    stopped = true;
                    info!("stop requested; closing progress channel");
                    self.log(LogLevel::Warning, "사용자 요청으로 연결을 종료합니다.");
                    self.discard_channel();
                    self.handle_disconnect();
                }
            }
        }
    }
}

fn code_text(code: Option<u16>) -> String {
    code.map_or_else(|| "-".to_string(), |c| c.to_string())
}
