//! In-crate fakes for the server API and the progress transport.

use crate::api::{ApiError, ServerApi};
use crate::model::{
    BackupHistory, BackupHistoryEntry, Bookmarks, JobConfig, PathHistory, RunSummary,
};
use crate::transport::{Channel, ChannelEvent, Transport};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Shared, ordered record of observable calls.
pub(crate) type CallLog = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Clone)]
pub(crate) enum StartReply {
    Accept,
    Reject {
        status: u16,
        field: Option<String>,
        message: String,
    },
}

type StartHook = Box<dyn FnOnce() + Send>;

pub(crate) struct FakeApi {
    pub calls: CallLog,
    start_reply: StartReply,
    on_start: Mutex<Option<StartHook>>,
    fail_saves: bool,
    fail_loads: bool,
    history_loads: AtomicUsize,
    path_history: Mutex<PathHistory>,
    bookmarks: Mutex<Bookmarks>,
    settings: Mutex<JobConfig>,
    reply_delay: Option<Duration>,
}

impl FakeApi {
    pub fn accepting() -> Self {
        Self::with_reply(StartReply::Accept)
    }

    pub fn with_reply(start_reply: StartReply) -> Self {
        Self {
            calls: CallLog::default(),
            start_reply,
            on_start: Mutex::new(None),
            fail_saves: false,
            fail_loads: false,
            history_loads: AtomicUsize::new(0),
            path_history: Mutex::new(PathHistory::default()),
            bookmarks: Mutex::new(Bookmarks::default()),
            settings: Mutex::new(JobConfig::default()),
            reply_delay: None,
        }
    }

    /// Run `hook` inside `start_job`, before the response is produced.
    pub fn on_start(self, hook: impl FnOnce() + Send + 'static) -> Self {
        *self.on_start.lock().unwrap() = Some(Box::new(hook));
        self
    }

    pub fn failing_saves(mut self) -> Self {
        self.fail_saves = true;
        self
    }

    pub fn failing_loads(mut self) -> Self {
        self.fail_loads = true;
        self
    }

    pub fn with_settings(self, settings: JobConfig) -> Self {
        *self.settings.lock().unwrap() = settings;
        self
    }

    /// Keep the start request in flight for `delay` after the hook ran.
    pub fn reply_after(mut self, delay: Duration) -> Self {
        self.reply_delay = Some(delay);
        self
    }

    pub fn with_path_history(self, history: PathHistory) -> Self {
        *self.path_history.lock().unwrap() = history;
        self
    }

    pub fn with_bookmarks(self, bookmarks: Bookmarks) -> Self {
        *self.bookmarks.lock().unwrap() = bookmarks;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn history_loads(&self) -> usize {
        self.history_loads.load(Ordering::SeqCst)
    }

    pub fn stored_path_history(&self) -> PathHistory {
        self.path_history.lock().unwrap().clone()
    }

    pub fn stored_settings(&self) -> JobConfig {
        self.settings.lock().unwrap().clone()
    }

    pub fn stored_bookmarks(&self) -> Bookmarks {
        self.bookmarks.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn server_error(&self) -> ApiError {
        ApiError::Rejected {
            status: 500,
            field: None,
            message: "storage unavailable".into(),
        }
    }

    fn save_result(&self) -> Result<(), ApiError> {
        if self.fail_saves {
            Err(ApiError::Rejected {
                status: 400,
                field: Some("source".into()),
                message: "path not allowed".into(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl ServerApi for FakeApi {
    async fn start_job(&self, _config: &JobConfig) -> Result<(), ApiError> {
        self.record("start_job");
        let hook = self.on_start.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
        match self.reply_delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
        match &self.start_reply {
            StartReply::Accept => Ok(()),
            StartReply::Reject {
                status,
                field,
                message,
            } => Err(ApiError::Rejected {
                status: *status,
                field: field.clone(),
                message: message.clone(),
            }),
        }
    }

    async fn load_settings(&self) -> Result<JobConfig, ApiError> {
        self.record("load_settings");
        if self.fail_loads {
            return Err(self.server_error());
        }
        Ok(self.stored_settings())
    }

    async fn save_settings(&self, settings: &JobConfig) -> Result<(), ApiError> {
        self.record("save_settings");
        self.save_result()?;
        *self.settings.lock().unwrap() = settings.clone();
        Ok(())
    }

    async fn load_bookmarks(&self) -> Result<Bookmarks, ApiError> {
        self.record("load_bookmarks");
        if self.fail_loads {
            return Err(self.server_error());
        }
        Ok(self.stored_bookmarks())
    }

    async fn save_bookmarks(&self, bookmarks: &Bookmarks) -> Result<(), ApiError> {
        self.record("save_bookmarks");
        self.save_result()?;
        *self.bookmarks.lock().unwrap() = bookmarks.clone();
        Ok(())
    }

    async fn load_path_history(&self) -> Result<PathHistory, ApiError> {
        self.record("load_path_history");
        if self.fail_loads {
            return Err(self.server_error());
        }
        Ok(self.stored_path_history())
    }

    async fn save_path_history(&self, history: &PathHistory) -> Result<(), ApiError> {
        self.record("save_path_history");
        self.save_result()?;
        *self.path_history.lock().unwrap() = history.clone();
        Ok(())
    }

    async fn load_backup_history(&self, limit: usize) -> Result<BackupHistory, ApiError> {
        self.record(format!("load_backup_history:{limit}"));
        self.history_loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_loads {
            return Err(self.server_error());
        }
        Ok(BackupHistory {
            entries: vec![BackupHistoryEntry {
                config: self.stored_settings(),
                summary: RunSummary::default(),
                status: "success".into(),
            }],
            updated_at: None,
        })
    }
}

/// Hands out one prepared channel; later connects get a channel that ends immediately.
pub(crate) struct FakeTransport {
    calls: CallLog,
    channel: Mutex<Option<Channel>>,
}

impl FakeTransport {
    pub fn new(calls: CallLog, channel: Channel) -> Self {
        Self {
            calls,
            channel: Mutex::new(Some(channel)),
        }
    }
}

impl Transport for FakeTransport {
    fn connect(&self) -> Channel {
        self.calls.lock().unwrap().push("connect".into());
        self.channel.lock().unwrap().take().unwrap_or_else(|| {
            let (_tx, rx) = mpsc::unbounded_channel();
            let (close_tx, _close_rx) = oneshot::channel();
            Channel::new(rx, Arc::new(AtomicBool::new(false)), close_tx)
        })
    }
}

/// Test-side end of a fake channel.
pub(crate) struct FakeChannelHandle {
    tx: Option<mpsc::UnboundedSender<ChannelEvent>>,
    open: Arc<AtomicBool>,
    close_rx: oneshot::Receiver<()>,
    closed: bool,
}

pub(crate) fn fake_channel() -> (Channel, FakeChannelHandle) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (close_tx, close_rx) = oneshot::channel();
    let open = Arc::new(AtomicBool::new(false));
    let channel = Channel::new(rx, open.clone(), close_tx);
    (
        channel,
        FakeChannelHandle {
            tx: Some(tx),
            open,
            close_rx,
            closed: false,
        },
    )
}

impl FakeChannelHandle {
    fn send(&self, event: ChannelEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<ChannelEvent> {
        self.tx.clone().expect("channel already ended")
    }

    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
        self.send(ChannelEvent::Open);
    }

    /// Drop the connection without telling the consumer yet.
    pub fn mark_closed(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    pub fn message(&self, json: &str) {
        self.send(ChannelEvent::Message(json.to_string()));
    }

    pub fn error(&self, message: &str) {
        self.send(ChannelEvent::Error(message.to_string()));
    }

    pub fn close(&self, code: Option<u16>) {
        self.mark_closed();
        self.send(ChannelEvent::Close { code });
    }

    /// Close and end the event stream, like a finished socket task.
    pub fn disconnect(&mut self, code: Option<u16>) {
        self.close(code);
        self.tx = None;
    }

    /// Whether the consumer asked the connection to close.
    pub fn was_closed(&mut self) -> bool {
        if !self.closed {
            self.closed = self.close_rx.try_recv().is_ok();
        }
        self.closed
    }
}
