//! Log Collator Core - reconciliation of device log uploads
//!
//! The main entry point for lc-core, handling:
//! - Collation of one upload, an upload key, or every key in a storage notification
//! - Batch window lookup
//! - Inspection of current and diff artifacts
//!
//! stdout carries the JSON result (a report, or a structured error); logs go
//! to stderr. The exit code classifies failures for the invoking worker.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::{ArgGroup, Args, Parser, Subcommand};
use lc_common::{Error, LogType, Result, StructuredError};
use lc_core::config::{load_config, ConfigOptions, ResolvedConfig};
use lc_core::exit_codes::ExitCode;
use lc_core::logging::{
    event_names, generate_run_id, init_logging, LogConfig, LogContext, LogFormat, LogLevel,
};
use lc_core::store::{keys, FsObjectStore, ObjectStore};
use lc_core::upload::keys_from_notification;
use lc_core::{window_key, CollationReport, CollationRequest, ReconciliationEngine, UploadKey};

/// Log Collator Core - merge device log uploads into collated artifacts
#[derive(Parser)]
#[command(name = "lc-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Root directory of the artifact store (overrides config and LC_STORE_ROOT)
    #[arg(long, global = true)]
    store_root: Option<PathBuf>,

    /// Config file (overrides LC_CONFIG and the XDG location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error, off
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format: human or jsonl
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Collate uploads into the current, diff and export artifacts
    Collate(CollateArgs),

    /// Print the diff window key for a processing time
    Window(WindowArgs),

    /// Decode and print a current or diff artifact
    Show(ShowArgs),

    /// Print version information
    Version,
}

#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("source")
        .required(true)
        .args(["upload_key", "event", "file"]),
))]
struct CollateArgs {
    /// Upload key in the store: uploads/users/<user>/<serial>/<device>/<log_type>/<file>
    #[arg(long)]
    upload_key: Option<String>,

    /// Storage notification JSON naming one or more upload keys
    #[arg(long)]
    event: Option<PathBuf>,

    /// Local upload file (requires --user, --device and --log-type)
    #[arg(long, requires_all = ["user", "device", "log_type"])]
    file: Option<PathBuf>,

    /// Owning user of --file
    #[arg(long)]
    user: Option<i64>,

    /// Uploading device of --file
    #[arg(long)]
    device: Option<String>,

    /// Log type of --file
    #[arg(long, value_enum)]
    log_type: Option<LogType>,

    /// Processing time (RFC 3339, `YYYY-MM-DD HH:MM:SS` UTC, or a date); defaults to now
    #[arg(long)]
    processing_time: Option<String>,

    /// Do not write the export rendering
    #[arg(long)]
    no_export: bool,
}

#[derive(Args, Debug)]
struct WindowArgs {
    /// Processing time (RFC 3339, `YYYY-MM-DD HH:MM:SS` UTC, or a date)
    timestamp: String,
}

#[derive(Args, Debug)]
struct ShowArgs {
    #[arg(long, value_enum)]
    log_type: LogType,

    #[arg(long)]
    user: i64,

    /// Show the diff artifact of this window instead of the current artifact
    #[arg(long)]
    window: Option<String>,

    /// Print an ASCII table of the stored columns instead of JSON
    #[arg(long)]
    table: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else {
        cli.global.log_level
    };
    init_logging(&LogConfig::from_env(level, cli.global.log_format));

    let result = match &cli.command {
        Commands::Collate(args) => run_collate(&cli.global, args),
        Commands::Window(args) => run_window(args),
        Commands::Show(args) => run_show(&cli.global, args),
        Commands::Version => print_version(),
    };

    let exit_code = match result {
        Ok(()) => ExitCode::Clean,
        Err(err) => {
            let code = ExitCode::for_error(&err);
            tracing::error!(
                error = %err,
                exit_code = %code,
                remediation = err.remediation(),
                "{}",
                err.headline()
            );
            println!("{}", StructuredError::from(&err).to_json());
            code
        }
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Command implementations
// ============================================================================

fn resolve_config(global: &GlobalOpts, render_export: Option<bool>) -> Result<ResolvedConfig> {
    let options = ConfigOptions {
        config_path: global.config.clone(),
        store_root: global.store_root.clone(),
        render_export,
    };
    let resolved = load_config(&options)?;
    match &resolved.source {
        Some(path) => tracing::debug!(
            event = event_names::CONFIG_LOADED,
            path = %path.display(),
            store_root = %resolved.config.store_root.display(),
            "config loaded"
        ),
        None => tracing::debug!(
            event = event_names::CONFIG_DEFAULT_USED,
            store_root = %resolved.config.store_root.display(),
            "no config file; using defaults"
        ),
    }
    Ok(resolved)
}

fn run_collate(global: &GlobalOpts, args: &CollateArgs) -> Result<()> {
    let render_export = if args.no_export { Some(false) } else { None };
    let resolved = resolve_config(global, render_export)?;
    let config = resolved.config;

    let processing_time = match &args.processing_time {
        Some(raw) => parse_time(raw)?,
        None => Utc::now().naive_utc(),
    };

    let engine =
        ReconciliationEngine::new(FsObjectStore::new(&config.store_root)).with_codec(config.codec());
    let run_id = generate_run_id();

    let collate_key = |key: &str| -> Result<CollationReport> {
        let upload_key = UploadKey::parse(key)?;
        let body = engine.store().get(key)?;
        let request = CollationRequest {
            user_id: upload_key.user_id,
            device_id: upload_key.device_id.clone(),
            log_type: upload_key.log_type,
            upload: body,
            upload_location: key.to_string(),
            processing_time,
            render_export: config.render_export,
        };
        collate_one(&engine, &request, &run_id)
    };

    if let Some(key) = &args.upload_key {
        return print_json(&collate_key(key)?);
    }

    if let Some(path) = &args.event {
        let text = std::fs::read_to_string(path)?;
        let notification: serde_json::Value = serde_json::from_str(&text)?;
        let mut reports = Vec::new();
        for key in keys_from_notification(&notification)? {
            match collate_key(&key) {
                Ok(report) => reports.push(report),
                // Stray keys are logged and skipped; the rest of the batch still runs.
                Err(err @ (Error::InvalidUploadKey(_) | Error::UnsupportedLogType(_))) => {
                    tracing::error!(
                        event = event_names::UPLOAD_KEY_SKIPPED,
                        key = %key,
                        error = %err,
                        "skipping upload key"
                    );
                }
                Err(err) => return Err(err),
            }
        }
        return print_json(&reports);
    }

    let (Some(path), Some(user_id), Some(device_id), Some(log_type)) =
        (&args.file, args.user, &args.device, args.log_type)
    else {
        return Err(Error::InvalidArgument(
            "--file requires --user, --device and --log-type".to_string(),
        ));
    };
    let request = CollationRequest {
        user_id,
        device_id: device_id.clone(),
        log_type,
        upload: std::fs::read(path)?,
        upload_location: path.display().to_string(),
        processing_time,
        render_export: config.render_export,
    };
    print_json(&collate_one(&engine, &request, &run_id)?)
}

fn collate_one<S: ObjectStore>(
    engine: &ReconciliationEngine<S>,
    request: &CollationRequest,
    run_id: &str,
) -> Result<CollationReport> {
    let ctx = LogContext::new(
        run_id,
        request.user_id,
        request.device_id.clone(),
        request.log_type,
    );
    engine.collate(request, &ctx)
}

fn run_window(args: &WindowArgs) -> Result<()> {
    let time = parse_time(&args.timestamp)?;
    println!("{}", window_key(time));
    Ok(())
}

fn run_show(global: &GlobalOpts, args: &ShowArgs) -> Result<()> {
    let config = resolve_config(global, None)?.config;
    let store = FsObjectStore::new(&config.store_root);
    let key = match &args.window {
        Some(window) => keys::diff_key(args.log_type, window, args.user),
        None => keys::current_key(args.log_type, args.user),
    };

    let Some(body) = store.get_optional(&key)? else {
        return Err(Error::InvalidArgument(format!("no artifact at {}", key)));
    };
    let codec_error = |e: lc_rowstore::CodecError| Error::Codec {
        key: key.clone(),
        reason: e.to_string(),
    };

    if args.table {
        println!("{}", lc_rowstore::pretty_table(&body).map_err(codec_error)?);
        return Ok(());
    }
    let entries = lc_rowstore::decode_entries(args.log_type, &body).map_err(codec_error)?;
    print_json(&entries)
}

fn print_version() -> Result<()> {
    let version_info = serde_json::json!({
        "lc_core_version": env!("CARGO_PKG_VERSION"),
        "rust_version": env!("CARGO_PKG_RUST_VERSION"),
        "log_types": LogType::ALL.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
    });
    print_json(&version_info)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse a processing time: RFC 3339 (converted to UTC), a naive UTC
/// timestamp, or a bare date at midnight.
fn parse_time(raw: &str) -> Result<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| Error::InvalidArgument(format!("unrecognized timestamp: {}", raw)))
}
