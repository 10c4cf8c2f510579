//! # Notarizer Interface
//!
//! The `Notarizer` trait abstracts over the storage/notarization network.
//! Production deployments use [`ChainletterClient`](crate::ChainletterClient)
//! against the live webhook; tests and local development use
//! [`MockNotarizer`], which keeps artifacts in memory and derives
//! content-addressed ids from the bytes.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use custody_core::{ContentId, ValidationError};
use futures::stream::{self, BoxStream, StreamExt};
use custody_crypto::sha256_hex;
use parking_lot::Mutex;

use crate::config::DEFAULT_GATEWAY;
use crate::error::NotaryError;
use crate::types::{Artifact, CreditScope, FetchedArtifact, UploadReceipt};

/// Raw server-sent-event bytes from the notarization network, framed as
/// the upstream frames them.
pub type EventStream = BoxStream<'static, Result<Bytes, NotaryError>>;

/// Uploads artifacts to a content-addressed, append-only store.
///
/// Implementations must be `Send + Sync`; the API server shares one behind
/// an `Arc`. The trait is object-safe.
#[async_trait]
pub trait Notarizer: Send + Sync {
    /// Upload one artifact on its channel. `notarize_now` requests
    /// immediate stamping.
    async fn upload(&self, artifact: Artifact, notarize_now: bool)
        -> Result<UploadReceipt, NotaryError>;

    /// Gateway URL for a content id.
    fn resolve_url(&self, cid: &ContentId) -> String;

    /// Remaining notarization credits, when the upstream reports them.
    async fn credits_remaining(&self, scope: CreditScope) -> Result<Option<i64>, NotaryError>;

    /// Retrieve a previously uploaded artifact.
    async fn fetch(&self, cid: &ContentId) -> Result<FetchedArtifact, NotaryError>;

    /// Open the upstream notification stream. Clients watch it to learn
    /// when a freshly uploaded content id becomes available.
    async fn event_stream(&self) -> Result<EventStream, NotaryError>;

    /// Human-readable name of the implementation.
    fn adapter_name(&self) -> &str;
}

/// One upload seen by [`MockNotarizer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    pub cid: ContentId,
    pub filename: String,
    pub content_type: String,
    pub visibility: custody_core::Visibility,
    pub notarize_now: bool,
}

#[derive(Default)]
struct MockState {
    blobs: HashMap<String, FetchedArtifact>,
    log: Vec<UploadRecord>,
    failure: Option<Option<u16>>,
    attempts: usize,
    fail_attempt: Option<(usize, Option<u16>)>,
    credits: Option<i64>,
}

/// In-memory notarizer for tests and local development.
///
/// Content ids have the `Qm` + 44 character shape and are a pure function
/// of the uploaded bytes.
pub struct MockNotarizer {
    gateway_template: String,
    state: Mutex<MockState>,
}

impl MockNotarizer {
    pub fn new() -> Self {
        Self::with_gateway(DEFAULT_GATEWAY)
    }

    pub fn with_gateway(template: impl Into<String>) -> Self {
        Self {
            gateway_template: template.into(),
            state: Mutex::new(MockState {
                credits: Some(1_000),
                ..MockState::default()
            }),
        }
    }

    /// Make every following upload fail with the given upstream status
    /// (`None` for a transport-style failure) until cleared.
    pub fn fail_uploads(&self, status: Option<u16>) {
        self.state.lock().failure = Some(status);
    }

    /// Fail only the upload `skip` attempts from now (0 is the next one).
    pub fn fail_upload_after(&self, skip: usize, status: Option<u16>) {
        let mut state = self.state.lock();
        state.fail_attempt = Some((state.attempts + skip, status));
    }

    pub fn clear_failure(&self) {
        let mut state = self.state.lock();
        state.failure = None;
        state.fail_attempt = None;
    }

    /// All successful uploads in order.
    pub fn uploads(&self) -> Vec<UploadRecord> {
        self.state.lock().log.clone()
    }

    /// Content id the mock assigns to `bytes`.
    pub fn content_id_for(bytes: &[u8]) -> Result<ContentId, ValidationError> {
        let digest = sha256_hex(bytes);
        // Hex digits other than '0' are all valid base58 characters.
        let body: String = digest[..44]
            .chars()
            .map(|c| if c == '0' { 'z' } else { c })
            .collect();
        ContentId::new(format!("Qm{body}"))
    }
}

impl Default for MockNotarizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notarizer for MockNotarizer {
    async fn upload(
        &self,
        artifact: Artifact,
        notarize_now: bool,
    ) -> Result<UploadReceipt, NotaryError> {
        let mut state = self.state.lock();
        let attempt = state.attempts;
        state.attempts += 1;
        if let Some(status) = state.failure {
            return Err(NotaryError::Simulated { status });
        }
        if let Some((at, status)) = state.fail_attempt {
            if at == attempt {
                state.fail_attempt = None;
                return Err(NotaryError::Simulated { status });
            }
        }

        let cid = Self::content_id_for(&artifact.bytes).map_err(|e| NotaryError::MissingCid {
            endpoint: "mock upload".into(),
            detail: e.to_string(),
        })?;
        state.log.push(UploadRecord {
            cid: cid.clone(),
            filename: artifact.filename,
            content_type: artifact.content_type.clone(),
            visibility: artifact.visibility,
            notarize_now,
        });
        state.blobs.insert(
            cid.as_str().to_string(),
            FetchedArtifact {
                bytes: artifact.bytes,
                content_type: Some(artifact.content_type),
            },
        );
        drop(state);

        tracing::debug!(cid = %cid, notarize_now, "mock notarizer stored artifact");
        Ok(UploadReceipt {
            url: self.resolve_url(&cid),
            cid,
        })
    }

    fn resolve_url(&self, cid: &ContentId) -> String {
        cid.resolve(&self.gateway_template)
    }

    async fn credits_remaining(&self, _scope: CreditScope) -> Result<Option<i64>, NotaryError> {
        Ok(self.state.lock().credits)
    }

    async fn fetch(&self, cid: &ContentId) -> Result<FetchedArtifact, NotaryError> {
        self.state
            .lock()
            .blobs
            .get(cid.as_str())
            .cloned()
            .ok_or_else(|| NotaryError::NotFound(cid.to_string()))
    }

    /// One `upload` event per upload so far, then end of stream.
    async fn event_stream(&self) -> Result<EventStream, NotaryError> {
        let state = self.state.lock();
        if let Some(status) = state.failure {
            return Err(NotaryError::Simulated { status });
        }
        let frames: Vec<Result<Bytes, NotaryError>> = state
            .log
            .iter()
            .map(|record| Ok(Bytes::from(upload_event(record))))
            .collect();
        Ok(stream::iter(frames).boxed())
    }

    fn adapter_name(&self) -> &str {
        "MockNotarizer"
    }
}

fn upload_event(record: &UploadRecord) -> String {
    let data = serde_json::json!({
        "cid": record.cid.as_str(),
        "filename": record.filename,
        "network": record.visibility.as_str(),
        "stamped": record.notarize_now,
    });
    format!("event: upload\ndata: {data}\n\n")
}
