//! HTTP notarizer against the pin-proxy webhook.
//!
//! - Upload: `POST {base}/webhook/{api_key}` (multipart `file`)
//! - Credits: `GET {base}/webhook/{api_key}/credits?network=&group=`
//! - Fetch: `GET {base}/ipfs/{api_key}/{cid}`
//! - Events: `GET {base}/webhook/{api_key}/events/stream` (server-sent events)

use std::time::Duration;

use async_trait::async_trait;
use custody_core::ContentId;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE};
use reqwest::multipart::{Form, Part};

use crate::config::{ChainletterConfig, ConfigError};
use crate::error::NotaryError;
use crate::notarizer::{EventStream, Notarizer};
use crate::retry::retry_send;
use crate::types::{Artifact, CreditScope, FetchedArtifact, UploadReceipt};

/// Client for the notarization webhook.
#[derive(Debug, Clone)]
pub struct ChainletterClient {
    http: reqwest::Client,
    /// Same credentials, no overall timeout. Used for the event stream.
    streaming: reqwest::Client,
    config: ChainletterConfig,
}

impl ChainletterClient {
    /// Build a client. Credentials become default headers on every request.
    pub fn new(config: ChainletterConfig) -> Result<Self, NotaryError> {
        let mut headers = HeaderMap::new();
        let mut secret = HeaderValue::from_str(config.secret_key.as_str())
            .map_err(|_| ConfigError::InvalidHeader("CHAINLETTER_SECRET_KEY".into()))?;
        secret.set_sensitive(true);
        headers.insert("secret-key", secret);
        if let Some(cookie) = &config.cookie {
            let mut value = HeaderValue::from_str(cookie.as_str())
                .map_err(|_| ConfigError::InvalidHeader("CHAINLETTER_COOKIE".into()))?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        }

        let timeout = Duration::from_secs(config.timeout_secs);
        let init_error = |e| NotaryError::Http {
            endpoint: "client_init".into(),
            source: e,
        };
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers.clone())
            .build()
            .map_err(init_error)?;
        let streaming = reqwest::Client::builder()
            .connect_timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(init_error)?;

        Ok(Self {
            http,
            streaming,
            config,
        })
    }

    pub fn config(&self) -> &ChainletterConfig {
        &self.config
    }

    fn group_header(&self, group: &str) -> Result<HeaderValue, NotaryError> {
        HeaderValue::from_str(group)
            .map_err(|_| NotaryError::Config(ConfigError::InvalidHeader("group-id".into())))
    }
}

/// Pull the content id out of an upload response: `hash`, then `cid`,
/// then `data.cid`.
fn cid_from_response(body: &serde_json::Value) -> Option<&str> {
    body.get("hash")
        .and_then(|v| v.as_str())
        .or_else(|| body.get("cid").and_then(|v| v.as_str()))
        .or_else(|| body.pointer("/data/cid").and_then(|v| v.as_str()))
        .filter(|s| !s.is_empty())
}

async fn error_for_status(endpoint: &str, resp: reqwest::Response) -> Result<reqwest::Response, NotaryError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    tracing::error!(endpoint, status, "notary returned an error status");
    Err(NotaryError::Upstream {
        endpoint: endpoint.into(),
        status,
        body,
    })
}

#[async_trait]
impl Notarizer for ChainletterClient {
    async fn upload(
        &self,
        artifact: Artifact,
        notarize_now: bool,
    ) -> Result<UploadReceipt, NotaryError> {
        let endpoint = "POST /webhook";
        let url = self.config.webhook_url()?;
        let group = self.group_header(self.config.group_for(artifact.visibility))?;
        let network = artifact.visibility.as_str();
        let stamp = if notarize_now { "true" } else { "false" };

        let resp = retry_send(endpoint, || {
            let form = Part::bytes(artifact.bytes.clone())
                .file_name(artifact.filename.clone())
                .mime_str(&artifact.content_type)
                .map(|part| Form::new().part("file", part));
            let request = form.map(|form| {
                self.http
                    .post(url.clone())
                    .header("group-id", group.clone())
                    .header("network", network)
                    .header("stamp-immediately", stamp)
                    .multipart(form)
            });
            async move { request?.send().await }
        })
        .await
        .map_err(|e| NotaryError::Http {
            endpoint: endpoint.into(),
            source: e,
        })?;

        let resp = error_for_status(endpoint, resp).await?;
        let body: serde_json::Value = resp.json().await.map_err(|e| NotaryError::Deserialization {
            endpoint: endpoint.into(),
            source: e,
        })?;

        let raw = cid_from_response(&body).ok_or_else(|| NotaryError::MissingCid {
            endpoint: endpoint.into(),
            detail: body.to_string(),
        })?;
        let cid = ContentId::new(raw).map_err(|e| NotaryError::MissingCid {
            endpoint: endpoint.into(),
            detail: e.to_string(),
        })?;

        tracing::info!(
            cid = %cid,
            filename = %artifact.filename,
            visibility = %artifact.visibility,
            notarize_now,
            "artifact uploaded"
        );
        Ok(UploadReceipt {
            url: self.resolve_url(&cid),
            cid,
        })
    }

    fn resolve_url(&self, cid: &ContentId) -> String {
        cid.resolve(&self.config.gateway_template)
    }

    async fn credits_remaining(&self, scope: CreditScope) -> Result<Option<i64>, NotaryError> {
        let endpoint = "GET /webhook/credits";
        let mut url = self.config.credits_url()?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("network", scope.as_str());
            if let CreditScope::Channel(visibility) = scope {
                query.append_pair("group", self.config.group_for(visibility));
            }
        }

        let resp = retry_send(endpoint, || self.http.get(url.clone()).send())
            .await
            .map_err(|e| NotaryError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;
        let resp = error_for_status(endpoint, resp).await?;
        let body: serde_json::Value = resp.json().await.map_err(|e| NotaryError::Deserialization {
            endpoint: endpoint.into(),
            source: e,
        })?;

        Ok(body.get("credits").and_then(|v| v.as_i64()))
    }

    async fn fetch(&self, cid: &ContentId) -> Result<FetchedArtifact, NotaryError> {
        let endpoint = "GET /ipfs";
        let url = self.config.fetch_url(cid.as_str())?;

        let resp = retry_send(endpoint, || self.http.get(url.clone()).send())
            .await
            .map_err(|e| NotaryError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;
        let resp = error_for_status(endpoint, resp).await?;

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = resp.bytes().await.map_err(|e| NotaryError::Deserialization {
            endpoint: endpoint.into(),
            source: e,
        })?;

        Ok(FetchedArtifact {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    async fn event_stream(&self) -> Result<EventStream, NotaryError> {
        let endpoint = "GET /webhook/events/stream";
        let url = self.config.events_url()?;

        let resp = retry_send(endpoint, || {
            self.streaming
                .get(url.clone())
                .header(ACCEPT, "text/event-stream")
                .send()
        })
        .await
        .map_err(|e| NotaryError::Http {
            endpoint: endpoint.into(),
            source: e,
        })?;
        let resp = error_for_status(endpoint, resp).await?;

        tracing::info!("notary event stream opened");
        Ok(resp
            .bytes_stream()
            .map_err(move |e| NotaryError::Http {
                endpoint: endpoint.into(),
                source: e,
            })
            .boxed())
    }

    fn adapter_name(&self) -> &str {
        "ChainletterClient"
    }
}
