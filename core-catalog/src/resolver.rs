//! # Track Resolver
//!
//! Turns a catalog record into its first playable track.
//!
//! ## Workflow
//!
//! 1. Answer synchronously when the record already holds a cached
//!    manifest (or is already known broken).
//! 2. Otherwise fetch the record's tracks manifest from the authenticated
//!    catalog API, retrying transient transport failures a bounded number
//!    of times with a fixed delay. A fresh access token is generated for
//!    every attempt.
//! 3. Classify the outcome: cache the manifest on success, or mark the
//!    record broken when the manifest is empty, malformed, or has no
//!    http(s) entry.
//!
//! One `resolve` call delivers exactly one terminal outcome; the retry
//! loop lives inside the call, not in caller-visible state.

use crate::error::{CatalogError, Result};
use crate::models::{BrokenReason, RecordId, ResolutionState, SharedRecord, Track};
use crate::wire::decode_manifest;
use bridge_traits::{AccessTokenProvider, HttpClient, RetryPolicy};
use std::sync::Arc;
use tracing::{debug, error, warn};
use url::Url;

/// Resolves records into playable tracks, caching manifests on the records
/// themselves so repeated calls stay off the network.
pub struct TrackResolver {
    http: Arc<dyn HttpClient>,
    tokens: Arc<dyn AccessTokenProvider>,
    records_endpoint: String,
    retry: RetryPolicy,
}

enum FastPath {
    Cached(Option<Track>),
    InFlight,
    Broken(BrokenReason),
    Fetch,
}

impl TrackResolver {
    pub fn new(
        http: Arc<dyn HttpClient>,
        tokens: Arc<dyn AccessTokenProvider>,
        records_endpoint: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            tokens,
            records_endpoint: records_endpoint.into(),
            retry,
        }
    }

    /// Resolve `record` into its first playable track.
    ///
    /// Idempotent: an already-resolved record answers from its cached
    /// manifest without touching the network.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::Transport`] after the bounded retries are
    ///   exhausted (cancellation is surfaced unretried and unmarked)
    /// - [`CatalogError::MalformedManifest`] immediately on a parse
    ///   failure; the record is marked broken
    /// - [`CatalogError::EmptyManifest`] / [`CatalogError::NoPlayableTrack`]
    ///   for manifests without playable media; the record is marked broken
    /// - [`CatalogError::ResolveInFlight`] when another resolve for the
    ///   same record is still running
    pub async fn resolve(&self, record: &SharedRecord) -> Result<Track> {
        let record_id = {
            let mut rec = record.write();
            let fast = match rec.resolution() {
                ResolutionState::Resolved(_) => {
                    FastPath::Cached(rec.first_playable_track().cloned())
                }
                ResolutionState::Resolving => FastPath::InFlight,
                ResolutionState::Broken(reason) => FastPath::Broken(reason.clone()),
                ResolutionState::Unresolved => FastPath::Fetch,
            };
            match fast {
                FastPath::Cached(Some(track)) => {
                    debug!(record = %rec.id, "resolved from cached manifest");
                    return Ok(track);
                }
                FastPath::Cached(None) => {
                    rec.mark_broken(BrokenReason::NoPlayableTrack);
                    return Err(CatalogError::NoPlayableTrack);
                }
                FastPath::InFlight => return Err(CatalogError::ResolveInFlight),
                FastPath::Broken(reason) => return Err(CatalogError::RecordBroken(reason)),
                FastPath::Fetch => {
                    rec.set_resolving();
                    rec.id
                }
            }
        };

        let outcome = self.fetch_manifest(record_id).await;

        let mut rec = record.write();
        match outcome {
            Ok(tracks) if tracks.is_empty() => {
                error!(record = %record_id, "tracks manifest is empty");
                rec.mark_broken(BrokenReason::EmptyManifest);
                Err(CatalogError::EmptyManifest)
            }
            Ok(tracks) => match tracks.iter().find(|t| t.is_playable()).cloned() {
                Some(track) => {
                    debug!(record = %record_id, tracks = tracks.len(), "manifest resolved");
                    rec.set_resolved(tracks);
                    Ok(track)
                }
                None => {
                    warn!(record = %record_id, "manifest has no http(s) track");
                    rec.mark_broken(BrokenReason::NoPlayableTrack);
                    Err(CatalogError::NoPlayableTrack)
                }
            },
            Err(err) => {
                if let CatalogError::MalformedManifest(_) = &err {
                    rec.mark_broken(BrokenReason::MalformedManifest);
                } else {
                    // Transport failures (and cancellation) leave the
                    // record unresolved so a later resolve can retry.
                    rec.clear_resolving();
                }
                Err(err)
            }
        }
    }

    /// GET the manifest, retrying transient transport failures.
    async fn fetch_manifest(&self, record_id: RecordId) -> Result<Vec<Track>> {
        let mut attempt: u32 = 0;
        loop {
            let url = self.manifest_url(record_id)?;
            match self.http.get(url).await {
                Ok(payload) => return decode_manifest(&payload),
                Err(err) if err.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    warn!(
                        record = %record_id,
                        attempt,
                        max_retries = self.retry.max_retries,
                        error = %err,
                        "manifest fetch failed, retrying"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(err) => {
                    if !err.is_cancelled() {
                        error!(
                            record = %record_id,
                            attempts = attempt + 1,
                            error = %err,
                            "manifest fetch failed"
                        );
                    }
                    return Err(err.into());
                }
            }
        }
    }

    /// Authenticated manifest URL, with a fresh token per attempt.
    fn manifest_url(&self, record_id: RecordId) -> Result<Url> {
        let token = self.tokens.generate_token();
        let raw = format!(
            "{}/{}/tracks/?access-token={}",
            self.records_endpoint.trim_end_matches('/'),
            record_id,
            token
        );
        Url::parse(&raw).map_err(|e| CatalogError::InvalidEndpoint(format!("{raw}: {e}")))
    }
}
