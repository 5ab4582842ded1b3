use crate::api::{channel_url, HttpApi, ServerApi};
use crate::console;
use crate::model::{
    ConflictPolicy, DedupMethod, Field, HistoryFilter, JobConfig, LogLevel, OrganizeStrategy,
    PathLists,
};
use crate::orchestrator::{RunController, RunOutcome, UiEvent};
use crate::preferences::Preferences;
use crate::text_summary::build_history_summary;
use crate::transport::WebSocketTransport;
use crate::validate::{clean_path, validate_date, validate_path};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
pub(crate) enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "shutterpipe-client",
    version,
    about = "Start ShutterPipe backups and follow their progress from the terminal"
)]
pub struct Cli {
    /// Base URL of the ShutterPipe server
    #[arg(long, global = true, default_value = "http://localhost:8080")]
    pub base_url: String,

    /// How long to wait for the progress channel to open
    #[arg(long, global = true, default_value = "10s")]
    pub connect_timeout: humantime::Duration,

    /// Timeout for each HTTP request
    #[arg(long, global = true, default_value = "30s")]
    pub request_timeout: humantime::Duration,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Start a backup and follow it until it finishes
    Run(RunArgs),
    /// Show recent backup runs
    History(HistoryArgs),
    /// List or change bookmarked paths
    Bookmarks {
        #[command(subcommand)]
        action: BookmarkAction,
    },
    /// List or record recently used paths
    Paths {
        #[command(subcommand)]
        action: PathAction,
    },
    /// Inspect or update the server's saved settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

/// Job configuration flags. Unset flags keep the base configuration's value.
#[derive(Debug, Args, Clone, Default)]
pub struct RunArgs {
    /// Source directory (memory card, camera folder)
    #[arg(long)]
    pub source: Option<String>,

    /// Destination directory
    #[arg(long)]
    pub dest: Option<String>,

    #[arg(long, value_enum)]
    pub organize_strategy: Option<OrganizeStrategy>,

    /// Event name used by the `event` organize strategy
    #[arg(long)]
    pub event_name: Option<String>,

    #[arg(long, value_enum)]
    pub conflict_policy: Option<ConflictPolicy>,

    #[arg(long, value_enum)]
    pub dedup_method: Option<DedupMethod>,

    /// Simulate without copying
    #[arg(long)]
    pub dry_run: bool,

    /// Verify copies by hash
    #[arg(long)]
    pub hash_verify: bool,

    /// Ignore the incremental state file
    #[arg(long)]
    pub ignore_state: bool,

    /// Only files taken on or after this date (YYYY-MM-DD)
    #[arg(long)]
    pub date_from: Option<String>,

    /// Only files taken on or before this date (YYYY-MM-DD)
    #[arg(long)]
    pub date_to: Option<String>,

    /// File extension to include; repeat for several (default: built-in media list)
    #[arg(long = "ext")]
    pub extensions: Vec<String>,

    /// Worker count hint (0 lets the server decide)
    #[arg(long)]
    pub jobs: Option<u32>,

    #[arg(long)]
    pub unclassified_dir: Option<String>,

    #[arg(long)]
    pub quarantine_dir: Option<String>,

    #[arg(long)]
    pub state_file: Option<String>,

    #[arg(long)]
    pub log_file: Option<String>,

    #[arg(long)]
    pub log_json: bool,

    /// Use the server's saved settings as the base configuration
    #[arg(long)]
    pub from_settings: bool,

    /// Do not record source/dest in the path history
    #[arg(long)]
    pub no_history: bool,

    /// Print the final summary as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args, Clone)]
pub struct HistoryArgs {
    #[arg(long, default_value_t = 50)]
    pub limit: usize,

    #[arg(long, value_enum, default_value_t = HistoryFilter::All)]
    pub filter: HistoryFilter,

    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum BookmarkAction {
    List,
    /// Add the path, or remove it if already bookmarked
    Toggle {
        #[arg(long, value_enum)]
        field: Field,
        path: String,
    },
    Remove {
        #[arg(long, value_enum)]
        field: Field,
        path: String,
    },
}

#[derive(Debug, Subcommand, Clone)]
pub enum PathAction {
    List,
    Add {
        #[arg(long, value_enum)]
        field: Field,
        path: String,
    },
}

#[derive(Debug, Subcommand, Clone)]
pub enum SettingsAction {
    Show,
    /// Apply job flags on top of the saved settings and store the result
    Save(RunArgs),
}

pub async fn run(args: Cli) -> Result<()> {
    let api = Arc::new(
        HttpApi::new(&args.base_url, Duration::from(args.request_timeout))
            .context("failed to build HTTP client")?,
    );
    match &args.command {
        Command::Run(run_args) => run_backup(&args, run_args, api).await,
        Command::History(h) => show_history(api.as_ref(), h).await,
        Command::Bookmarks { action } => bookmarks(api, action).await,
        Command::Paths { action } => paths(api, action).await,
        Command::Settings { action } => settings(api.as_ref(), action).await,
    }
}

/// Upper bound of the worker count hint.
pub const MAX_JOBS: u32 = 32;

fn override_with(target: &mut String, value: &Option<String>) {
    if let Some(v) = value {
        *target = v.clone();
    }
}

/// Build a `JobConfig` from `base` and the CLI overrides, then run the pre-flight checks.
pub fn build_config(args: &RunArgs, base: JobConfig) -> Result<JobConfig> {
    let mut cfg = base;
    override_with(&mut cfg.source, &args.source);
    override_with(&mut cfg.dest, &args.dest);
    override_with(&mut cfg.event_name, &args.event_name);
    override_with(&mut cfg.unclassified_dir, &args.unclassified_dir);
    override_with(&mut cfg.quarantine_dir, &args.quarantine_dir);
    override_with(&mut cfg.state_file, &args.state_file);
    override_with(&mut cfg.log_file, &args.log_file);
    if let Some(v) = args.organize_strategy {
        cfg.organize_strategy = v;
    }
    if let Some(v) = args.conflict_policy {
        cfg.conflict_policy = v;
    }
    if let Some(v) = args.dedup_method {
        cfg.dedup_method = v;
    }
    if let Some(v) = args.jobs {
        cfg.jobs = v;
    }
    cfg.jobs = cfg.jobs.min(MAX_JOBS);
    cfg.dry_run |= args.dry_run;
    cfg.hash_verify |= args.hash_verify;
    cfg.ignore_state |= args.ignore_state;
    cfg.log_json |= args.log_json;
    if args.date_from.is_some() {
        cfg.date_filter_start = args.date_from.clone();
    }
    if args.date_to.is_some() {
        cfg.date_filter_end = args.date_to.clone();
    }
    if !args.extensions.is_empty() {
        cfg.include_extensions = args
            .extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
    }
    if cfg.unclassified_dir.is_empty() {
        cfg.unclassified_dir = "unclassified".into();
    }
    if cfg.quarantine_dir.is_empty() {
        cfg.quarantine_dir = "quarantine".into();
    }

    cfg.source = clean_path(&cfg.source);
    cfg.dest = clean_path(&cfg.dest);
    validate_path(&cfg.source).context("invalid --source")?;
    validate_path(&cfg.dest).context("invalid --dest")?;
    for date in [&cfg.date_filter_start, &cfg.date_filter_end]
        .into_iter()
        .flatten()
    {
        validate_date(date)?;
    }
    Ok(cfg)
}

/// Record source and dest as most recent paths. Failures are reported and otherwise ignored.
async fn record_paths<A: ServerApi>(
    api: Arc<A>,
    config: &JobConfig,
    ui_tx: &mpsc::UnboundedSender<UiEvent>,
) {
    let mut prefs = Preferences::load_or_default(api).await;
    for (field, path) in [(Field::Source, &config.source), (Field::Dest, &config.dest)] {
        if let Err(e) = prefs.add_to_path_history(field, path).await {
            let _ = ui_tx.send(UiEvent::Log {
                level: LogLevel::Warning,
                message: format!("경로 기록 저장 실패 ({}): {e}", field.as_str()),
            });
        }
    }
}

/// Resolves on Ctrl-C; never resolves if the signal cannot be installed.
async fn stop_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        futures::future::pending::<()>().await;
    }
}

async fn run_backup(cli: &Cli, args: &RunArgs, api: Arc<HttpApi>) -> Result<()> {
    let base = if args.from_settings {
        api.load_settings()
            .await
            .context("failed to load saved settings")?
    } else {
        JobConfig::default()
    };
    let config = build_config(args, base)?;
    let ws_url = channel_url(api.base_url())?;

    let (out_tx, out_handle) = spawn_output_writer();
    let (ui_tx, ui_rx) = mpsc::unbounded_channel::<UiEvent>();
    let console = tokio::spawn(console::run_console(ui_rx, out_tx.clone(), args.json));

    if !args.no_history {
        record_paths(api.clone(), &config, &ui_tx).await;
    }

    let transport = WebSocketTransport::new(ws_url, Duration::from(cli.connect_timeout));
    let mut controller = RunController::new(api, transport, ui_tx);
    let result = match controller.start(&config).await {
        Ok(()) => Ok(controller.drive(stop_signal()).await),
        Err(e) => Err(e),
    };
    // Dropping the controller ends the console's event stream.
    drop(controller);
    let state = console.await.context("console task failed")?;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            drop(out_tx);
            let _ = out_handle.await;
            return Err(e).context("backup did not start");
        }
    };

    if args.json {
        if let Some(summary) = state.last_summary.as_ref() {
            let _ = out_tx.send(OutputLine::Stdout(serde_json::to_string_pretty(summary)?));
        }
    }
    drop(out_tx);
    let _ = out_handle.await;

    match outcome {
        RunOutcome::Completed(_) => Ok(()),
        RunOutcome::Failed(message) => bail!("backup failed: {message}"),
        RunOutcome::Disconnected => bail!("backup may still be running; reload status manually"),
    }
}

async fn show_history<A: ServerApi + ?Sized>(api: &A, args: &HistoryArgs) -> Result<()> {
    let history = api
        .load_backup_history(args.limit)
        .await
        .context("failed to load backup history")?;
    if args.json {
        let entries: Vec<_> = history
            .entries
            .iter()
            .filter(|e| args.filter.matches(e))
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    for line in build_history_summary(&history.entries, args.filter).lines {
        println!("{line}");
    }
    Ok(())
}

/// Merge `args` into the saved settings and store them. A rejection names the offending field.
async fn save_settings<A: ServerApi + ?Sized>(api: &A, args: &RunArgs) -> Result<JobConfig> {
    let base = api
        .load_settings()
        .await
        .context("failed to load saved settings")?;
    let settings = build_config(args, base)?;
    if let Err(e) = api.save_settings(&settings).await {
        match e.field() {
            Some(field) => bail!("설정 저장 실패 ({field}): {e}"),
            None => bail!("설정 저장 실패: {e}"),
        }
    }
    Ok(settings)
}

async fn settings<A: ServerApi + ?Sized>(api: &A, action: &SettingsAction) -> Result<()> {
    match action {
        SettingsAction::Show => {
            let settings = api.load_settings().await.context("failed to load settings")?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        SettingsAction::Save(args) => {
            save_settings(api, args).await?;
            println!("설정이 저장되었습니다.");
        }
    }
    Ok(())
}

fn print_path_lists(lists: &PathLists) {
    for field in [Field::Source, Field::Dest] {
        println!("{}:", field.as_str());
        for path in lists.get(field) {
            println!("  {path}");
        }
    }
}

async fn bookmarks<A: ServerApi>(api: Arc<A>, action: &BookmarkAction) -> Result<()> {
    match action {
        BookmarkAction::List => {
            let bookmarks = api
                .load_bookmarks()
                .await
                .context("failed to load bookmarks")?;
            print_path_lists(&bookmarks);
        }
        BookmarkAction::Toggle { field, path } => {
            let mut prefs = Preferences::load(api)
                .await
                .context("failed to load bookmarks")?;
            match prefs.toggle_bookmark(*field, &clean_path(path)).await {
                Ok(change) => println!("{}", change.notice()),
                Err(e) => bail!("북마크 저장에 실패했습니다. {e}"),
            }
        }
        BookmarkAction::Remove { field, path } => {
            let mut prefs = Preferences::load(api)
                .await
                .context("failed to load bookmarks")?;
            match prefs.remove_bookmark(*field, &clean_path(path)).await {
                Ok(true) => println!("북마크에서 제거되었습니다."),
                Ok(false) => println!("북마크에 없는 경로입니다."),
                Err(e) => bail!("북마크 삭제에 실패했습니다. {e}"),
            }
        }
    }
    Ok(())
}

async fn paths<A: ServerApi>(api: Arc<A>, action: &PathAction) -> Result<()> {
    match action {
        PathAction::List => {
            let history = api
                .load_path_history()
                .await
                .context("failed to load path history")?;
            print_path_lists(&history);
        }
        PathAction::Add { field, path } => {
            let path = clean_path(path);
            validate_path(&path)?;
            let mut prefs = Preferences::load(api)
                .await
                .context("failed to load path history")?;
            prefs
                .add_to_path_history(*field, &path)
                .await
                .context("failed to save path history")?;
        }
    }
    Ok(())
}
