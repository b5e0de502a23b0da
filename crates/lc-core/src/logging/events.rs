//! Structured event vocabulary.
//!
//! Every collation event carries the invocation context (run, user, device,
//! log type) and the stage it was emitted from, so a JSONL stream can be
//! grouped per upload without parsing messages.

use lc_common::LogType;
use serde::{Deserialize, Serialize};

/// Processing stages of one collation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Reading the current artifact.
    Load,
    /// Normalizing and classifying the upload.
    Classify,
    /// Synthesizing tombstones for absent items.
    InferDeletions,
    /// Writing current, export and diff artifacts.
    Persist,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Load => "load",
            Stage::Classify => "classify",
            Stage::InferDeletions => "infer_deletions",
            Stage::Persist => "persist",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Collation lifecycle
    pub const COLLATE_STARTED: &str = "collate.started";
    pub const COLLATE_FINISHED: &str = "collate.finished";

    // Load stage
    pub const LOAD_EMPTY: &str = "load.empty";
    pub const LOAD_FINISHED: &str = "load.finished";

    // Classify stage
    pub const UPLOAD_NOT_GZIP: &str = "upload.not_gzip";
    pub const UPLOAD_MALFORMED: &str = "upload.malformed";
    pub const UPLOAD_KEY_SKIPPED: &str = "upload.key_skipped";
    pub const CLASSIFY_UNEXPECTED_FIELDS: &str = "classify.unexpected_fields";
    pub const CLASSIFY_FINISHED: &str = "classify.finished";

    // Deletion inference
    pub const DELETIONS_SKIPPED: &str = "infer_deletions.skipped";
    pub const DELETIONS_FINISHED: &str = "infer_deletions.finished";

    // Persist stage
    pub const PERSIST_REPAIRED: &str = "persist.repaired";
    pub const PERSIST_ARTIFACT_WRITTEN: &str = "persist.artifact_written";
    pub const PERSIST_ARTIFACT_SKIPPED: &str = "persist.artifact_skipped";
    pub const DIFF_FIRST_IN_WINDOW: &str = "persist.diff_first_in_window";

    // Config/init events
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";
}

/// Invocation context handed to the engine.
///
/// Replaces any process-wide logger state: the engine opens its spans from
/// this handle and stamps every event with its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogContext {
    /// Unique ID for this invocation.
    pub run_id: String,
    pub user_id: i64,
    pub device_id: String,
    pub log_type: LogType,
}

impl LogContext {
    pub fn new(
        run_id: impl Into<String>,
        user_id: i64,
        device_id: impl Into<String>,
        log_type: LogType,
    ) -> Self {
        LogContext {
            run_id: run_id.into(),
            user_id,
            device_id: device_id.into(),
            log_type,
        }
    }

    /// Root span for one collation.
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "collate",
            run_id = %self.run_id,
            user_id = self.user_id,
            device_id = %self.device_id,
            log_type = %self.log_type,
        )
    }

    /// Child span for one stage.
    pub fn stage_span(&self, stage: Stage) -> tracing::Span {
        tracing::debug_span!("stage", stage = %stage)
    }
}

/// Emit a structured event stamped with a [`LogContext`].
///
/// Usage:
/// ```ignore
/// log_event!(ctx, INFO, event_names::LOAD_FINISHED, Stage::Load, "loaded current artifact",
///     all_existing = 12, existing_unique = 10);
/// ```
#[macro_export]
macro_rules! log_event {
    ($ctx:expr, INFO, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::info!(
            event = $event,
            run_id = %$ctx.run_id,
            user_id = $ctx.user_id,
            device_id = %$ctx.device_id,
            log_type = %$ctx.log_type,
            stage = %$stage,
            $($key = $val,)*
            "{}", $msg
        )
    };
    ($ctx:expr, DEBUG, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::debug!(
            event = $event,
            run_id = %$ctx.run_id,
            user_id = $ctx.user_id,
            device_id = %$ctx.device_id,
            log_type = %$ctx.log_type,
            stage = %$stage,
            $($key = $val,)*
            "{}", $msg
        )
    };
    ($ctx:expr, WARN, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::warn!(
            event = $event,
            run_id = %$ctx.run_id,
            user_id = $ctx.user_id,
            device_id = %$ctx.device_id,
            log_type = %$ctx.log_type,
            stage = %$stage,
            $($key = $val,)*
            "{}", $msg
        )
    };
    ($ctx:expr, ERROR, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::error!(
            event = $event,
            run_id = %$ctx.run_id,
            user_id = $ctx.user_id,
            device_id = %$ctx.device_id,
            log_type = %$ctx.log_type,
            stage = %$stage,
            $($key = $val,)*
            "{}", $msg
        )
    };
}
