//! The reconciliation engine.
//!
//! One invocation processes one upload for one (user, device, log type):
//!
//! 1. **Load** the current artifact and reduce it to the latest version of
//!    each item.
//! 2. **Classify** the upload: normalize every raw entry and keep the ones
//!    whose content hash is not already current.
//! 3. **Infer deletions**: items the device had before but did not upload
//!    this time get a tombstone (snapshot log types only).
//! 4. **Persist** the merged current artifact, the export rendering and the
//!    diff for the processing time's batch window.
//!
//! The three writes are independent; a failure part-way leaves earlier
//! writes in place. Re-running the same upload is safe because
//! classification is content-hash based. Two invocations for the same
//! (user, log type) must not run concurrently: the read-modify-write of the
//! current and diff artifacts is not guarded.

use std::collections::HashSet;
use std::time::Instant;

use chrono::NaiveDateTime;
use lc_common::{Error, LogType, Result};
use lc_rowstore::{decode_entries, encode_entries, CodecConfig};
use serde::{Deserialize, Serialize};

use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};
use crate::profile::{profile_for, EntryOrigin, LogProfile};
use crate::record_set::RecordSet;
use crate::store::{ArtifactKeys, ObjectStore};
use crate::upload::parse_upload;
use crate::window::window_key;

/// One upload to collate.
#[derive(Debug, Clone)]
pub struct CollationRequest {
    pub user_id: i64,
    pub device_id: String,
    pub log_type: LogType,
    /// Upload body, gzip-compressed or plain JSON.
    pub upload: Vec<u8>,
    /// Where the upload came from; used in error reports only.
    pub upload_location: String,
    pub processing_time: NaiveDateTime,
    pub render_export: bool,
}

/// Outcome of one collation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollationReport {
    pub log_type: LogType,
    pub user_id: i64,
    pub device_id: String,
    pub window_key: String,
    /// Artifact keys written, in write order.
    pub keys_written: Vec<String>,
    /// Entries in the current artifact before this upload.
    pub all_existing: usize,
    /// Distinct items in the current artifact before this upload.
    pub existing_unique: usize,
    /// New or changed entries from the upload.
    pub new: usize,
    /// Tombstones synthesized for absent items.
    pub deleted: usize,
    /// Entries in the current artifact after this upload.
    pub total: usize,
    /// Raw entries dropped by normalization.
    pub rejected: usize,
    /// Entries whose timestamps the post-merge repair changed.
    pub repaired: usize,
    pub elapsed_seconds: f64,
}

/// Reconciles uploads against the artifacts in an [`ObjectStore`].
#[derive(Debug, Clone)]
pub struct ReconciliationEngine<S> {
    store: S,
    codec: CodecConfig,
}

impl<S: ObjectStore> ReconciliationEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            codec: CodecConfig::default(),
        }
    }

    pub fn with_codec(mut self, codec: CodecConfig) -> Self {
        self.codec = codec;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Collate one upload.
    ///
    /// # Errors
    /// * `Error::MalformedUpload` if the body is not a JSON array of objects
    /// * `Error::MissingField` if an entry lacks its natural key
    /// * `Error::Storage` / `Error::Codec` on artifact read or write failures
    pub fn collate(&self, request: &CollationRequest, ctx: &LogContext) -> Result<CollationReport> {
        let _span = ctx.span().entered();
        let started = Instant::now();
        let profile = profile_for(request.log_type);
        let window = window_key(request.processing_time);
        let keys = ArtifactKeys::new(
            request.log_type,
            request.user_id,
            &request.device_id,
            &window,
        );

        log_event!(ctx, INFO, event_names::COLLATE_STARTED, Stage::Init, "collation started",
            window_key = window.as_str(),
            upload_bytes = request.upload.len());

        // Load
        let all_existing = {
            let _stage = ctx.stage_span(Stage::Load).entered();
            self.load(&keys.current, request.log_type, ctx)?
        };
        let unique = all_existing.latest_per_identity();

        // Classify
        let classified = {
            let _stage = ctx.stage_span(Stage::Classify).entered();
            classify(profile, request, &unique, ctx)?
        };
        let new_count = classified.increment.len();
        let rejected = classified.rejected;

        // Infer deletions
        let tombstones = {
            let _stage = ctx.stage_span(Stage::InferDeletions).entered();
            infer_deletions(profile, request, &unique, &classified.seen, ctx)
        };
        let deleted = tombstones.len();
        let mut increment = classified.increment;
        increment.append(tombstones);

        let all_existing_count = all_existing.len();
        let existing_unique = unique.len();
        drop(unique);

        // Persist
        let _stage = ctx.stage_span(Stage::Persist).entered();
        let mut repaired = profile.repair(increment.entries_mut());
        let mut merged = all_existing;
        merged.append(increment.clone());
        repaired += profile.repair(merged.entries_mut());
        if repaired > 0 {
            log_event!(ctx, INFO, event_names::PERSIST_REPAIRED, Stage::Persist,
                "clamped future message timestamps", repaired = repaired);
        }

        let mut keys_written = Vec::new();
        if self.write_artifact(&keys.current, request.log_type, &merged, ctx)? {
            keys_written.push(keys.current.clone());
        }

        if request.render_export {
            match profile.render_export(merged.entries(), &request.device_id)? {
                Some(body) => {
                    self.store.put(&keys.export, &body)?;
                    log_event!(ctx, DEBUG, event_names::PERSIST_ARTIFACT_WRITTEN, Stage::Persist,
                        "export written", key = keys.export.as_str(), bytes = body.len());
                    keys_written.push(keys.export.clone());
                }
                None => {
                    log_event!(ctx, DEBUG, event_names::PERSIST_ARTIFACT_SKIPPED, Stage::Persist,
                        "nothing to export", key = keys.export.as_str());
                }
            }
        }

        if self.merge_diff(&keys.diff, request.log_type, increment, ctx)? {
            keys_written.push(keys.diff.clone());
        }

        let report = CollationReport {
            log_type: request.log_type,
            user_id: request.user_id,
            device_id: request.device_id.clone(),
            window_key: window,
            keys_written,
            all_existing: all_existing_count,
            existing_unique,
            new: new_count,
            deleted,
            total: merged.len(),
            rejected,
            repaired,
            elapsed_seconds: started.elapsed().as_secs_f64(),
        };

        log_event!(ctx, INFO, event_names::COLLATE_FINISHED, Stage::Persist, "collation finished",
            all_existing = report.all_existing,
            existing_unique = report.existing_unique,
            new = report.new,
            deleted = report.deleted,
            total = report.total,
            elapsed_seconds = report.elapsed_seconds);

        Ok(report)
    }

    /// Decode the artifact at `key`; a missing artifact is an empty set.
    fn load(&self, key: &str, log_type: LogType, ctx: &LogContext) -> Result<RecordSet> {
        let Some(body) = self.store.get_optional(key)? else {
            log_event!(ctx, INFO, event_names::LOAD_EMPTY, Stage::Load,
                "no current artifact; starting empty", key = key);
            return Ok(RecordSet::new());
        };

        let entries = decode_entries(log_type, &body).map_err(|e| Error::Codec {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        let set = RecordSet::from(entries);
        log_event!(ctx, DEBUG, event_names::LOAD_FINISHED, Stage::Load, "current artifact loaded",
            key = key, entries = set.len());
        Ok(set)
    }

    /// Encode and write `set` unless it is empty. Returns whether it wrote.
    fn write_artifact(
        &self,
        key: &str,
        log_type: LogType,
        set: &RecordSet,
        ctx: &LogContext,
    ) -> Result<bool> {
        if set.is_empty() {
            log_event!(ctx, DEBUG, event_names::PERSIST_ARTIFACT_SKIPPED, Stage::Persist,
                "no entries; artifact not written", key = key);
            return Ok(false);
        }
        let body = encode_entries(log_type, set.entries(), &self.codec).map_err(|e| {
            Error::Codec {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })?;
        self.store.put(key, &body)?;
        log_event!(ctx, DEBUG, event_names::PERSIST_ARTIFACT_WRITTEN, Stage::Persist,
            "artifact written", key = key, entries = set.len(), bytes = body.len());
        Ok(true)
    }

    /// Append `increment` to the window's diff artifact.
    fn merge_diff(
        &self,
        key: &str,
        log_type: LogType,
        increment: RecordSet,
        ctx: &LogContext,
    ) -> Result<bool> {
        if increment.is_empty() {
            log_event!(ctx, DEBUG, event_names::PERSIST_ARTIFACT_SKIPPED, Stage::Persist,
                "no changes; diff not written", key = key);
            return Ok(false);
        }

        let mut diff = match self.store.get_optional(key)? {
            Some(body) => RecordSet::from(decode_entries(log_type, &body).map_err(|e| {
                Error::Codec {
                    key: key.to_string(),
                    reason: e.to_string(),
                }
            })?),
            None => {
                log_event!(ctx, DEBUG, event_names::DIFF_FIRST_IN_WINDOW, Stage::Persist,
                    "first change in window", key = key);
                RecordSet::new()
            }
        };
        diff.append(increment);
        self.write_artifact(key, log_type, &diff, ctx)
    }
}

struct Classified {
    increment: RecordSet,
    seen: HashSet<String>,
    rejected: usize,
}

/// Normalize the upload and keep entries whose content is not current.
fn classify(
    profile: &dyn LogProfile,
    request: &CollationRequest,
    unique: &RecordSet,
    ctx: &LogContext,
) -> Result<Classified> {
    let raw_entries = parse_upload(
        &request.upload,
        request.user_id,
        &request.device_id,
        &request.upload_location,
    )
    .inspect_err(|err| {
        log_event!(ctx, ERROR, event_names::UPLOAD_MALFORMED, Stage::Classify,
            "unable to decode upload",
            location = request.upload_location.as_str(),
            error = err.to_string().as_str());
    })?;

    let origin = EntryOrigin {
        user_id: request.user_id,
        device_id: &request.device_id,
        processing_time: request.processing_time,
    };
    let current_hashes = unique.content_hashes();
    let mut classified = Classified {
        increment: RecordSet::new(),
        seen: HashSet::new(),
        rejected: 0,
    };

    for raw in &raw_entries {
        let unexpected = profile.unexpected_fields(raw);
        if !unexpected.is_empty() {
            log_event!(ctx, WARN, event_names::CLASSIFY_UNEXPECTED_FIELDS, Stage::Classify,
                "unexpected fields in raw entry", fields = unexpected.join(",").as_str());
        }

        let Some(entry) = profile.normalize(raw, &origin)? else {
            classified.rejected += 1;
            continue;
        };
        classified.seen.insert(entry.identity_id.clone());
        if !current_hashes.contains(entry.content_hash.as_str()) {
            classified.increment.push(entry);
        }
    }

    log_event!(ctx, DEBUG, event_names::CLASSIFY_FINISHED, Stage::Classify, "upload classified",
        raw_entries = raw_entries.len(),
        new = classified.increment.len(),
        rejected = classified.rejected);
    Ok(classified)
}

/// Tombstones for the device's live items that the upload did not mention.
fn infer_deletions(
    profile: &dyn LogProfile,
    request: &CollationRequest,
    unique: &RecordSet,
    seen: &HashSet<String>,
    ctx: &LogContext,
) -> RecordSet {
    if !profile.infers_deletions() {
        log_event!(ctx, DEBUG, event_names::DELETIONS_SKIPPED, Stage::InferDeletions,
            "uploads are incremental; deletions are not inferred");
        return RecordSet::new();
    }

    let tombstones: RecordSet = unique
        .for_device(&request.device_id)
        .filter(|e| !e.is_deleted && !seen.contains(&e.identity_id))
        .map(|e| {
            let mut tombstone = e.clone();
            tombstone.is_deleted = true;
            tombstone.content_hash = profile.content_hash(&tombstone);
            tombstone.last_update_time = request.processing_time;
            tombstone
        })
        .collect();

    log_event!(ctx, DEBUG, event_names::DELETIONS_FINISHED, Stage::InferDeletions,
        "deletions inferred", deleted = tombstones.len());
    tombstones
}
