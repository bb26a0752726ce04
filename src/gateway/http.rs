//! reqwest-backed registry gateway

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{header, Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::wire::{
    CompatibilityResponse, ConfigBody, ErrorBody, RegisterResponse, SchemaRequest, SCHEMA_NOT_FOUND,
    SUBJECT_LEVEL_NOT_CONFIGURED, SUBJECT_NOT_FOUND, VERSION_NOT_FOUND,
};
use super::RegistryGateway;
use crate::compatibility::{CompatibilityLevel, CompatibilityVerdict};
use crate::config::{ClusterConfig, HttpConfig, Operation};
use crate::error::{RejectionKind, Result, SchemaError};
use crate::schema::{SchemaMatch, SubjectVersion};
use crate::version::VersionSelector;

const REGISTRY_CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";

/// Gateway speaking HTTP to one configured cluster.
///
/// Mutating calls are checked against the cluster's flags before any request
/// is sent. Every request carries the configured timeout.
pub struct HttpGateway {
    cluster: ClusterConfig,
    base_url: Url,
    client: Client,
}

/// A completed round-trip
struct Reply {
    endpoint: String,
    status: StatusCode,
    body: String,
}

impl Reply {
    fn is_success(&self) -> bool {
        self.status.is_success()
    }

    fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|source| SchemaError::Decode {
            endpoint: self.endpoint.clone(),
            source,
        })
    }

    fn error_code(&self) -> Option<i64> {
        ErrorBody::parse(&self.body).error_code
    }

    fn into_rejection(self) -> SchemaError {
        let error_code = self.error_code();
        warn!("{} => HTTP {} {}", self.endpoint, self.status.as_u16(), self.body);
        SchemaError::rejected(self.endpoint, self.status.as_u16(), error_code, self.body)
    }

    /// Config endpoints answer 422 for levels the registry refuses
    fn into_config_rejection(self) -> SchemaError {
        match self.into_rejection() {
            SchemaError::Rejected {
                endpoint,
                status: 422,
                error_code,
                kind: RejectionKind::Other,
                body,
            } => SchemaError::Rejected {
                endpoint,
                status: 422,
                error_code,
                kind: RejectionKind::InvalidCompatibilityLevel,
                body,
            },
            err @ SchemaError::Rejected {
                kind: RejectionKind::StoreFailure | RejectionKind::ForwardingFailure,
                ..
            } => {
                error!("compatibility change failed on the registry side: {}", err);
                err
            }
            other => other,
        }
    }
}

impl HttpGateway {
    /// Build a gateway for `cluster`
    pub fn new(cluster: ClusterConfig, http: &HttpConfig) -> Result<Self> {
        let base_url = Url::parse(&cluster.url).map_err(|e| SchemaError::InvalidUrl {
            url: cluster.url.clone(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(SchemaError::InvalidUrl {
                url: cluster.url.clone(),
                reason: "not a base URL".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(http.timeout_secs))
            .connect_timeout(Duration::from_secs(http.connect_timeout_secs))
            .build()
            .map_err(|source| SchemaError::Transport {
                endpoint: cluster.url.clone(),
                source,
            })?;

        Ok(Self {
            cluster,
            base_url,
            client,
        })
    }

    /// The cluster this gateway talks to
    pub fn cluster(&self) -> &ClusterConfig {
        &self.cluster
    }

    /// Join path segments onto the base URL, percent-encoding each one
    fn url(&self, segments: &[&str], trailing_slash: bool) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
            if trailing_slash {
                path.push("");
            }
        }
        url
    }

    async fn send(&self, method: Method, url: Url, body: Option<Vec<u8>>) -> Result<Reply> {
        let endpoint = format!("{} {}", method, url.path());
        debug!("  curl -X {} {}", method, url);
        let start = Instant::now();

        let mut request = self
            .client
            .request(method, url)
            .header(header::ACCEPT, REGISTRY_CONTENT_TYPE);
        if let Some(body) = body {
            request = request
                .header(header::CONTENT_TYPE, REGISTRY_CONTENT_TYPE)
                .body(body);
        }

        let response = request.send().await.map_err(|source| SchemaError::Transport {
            endpoint: endpoint.clone(),
            source,
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|source| SchemaError::Transport {
            endpoint: endpoint.clone(),
            source,
        })?;

        debug!(
            "  {} => HTTP {} {} bytes in [ {} ] msec",
            endpoint,
            status.as_u16(),
            body.len(),
            start.elapsed().as_millis()
        );
        Ok(Reply {
            endpoint,
            status,
            body,
        })
    }

    async fn get(&self, segments: &[&str], trailing_slash: bool) -> Result<Reply> {
        self.send(Method::GET, self.url(segments, trailing_slash), None)
            .await
    }

    async fn send_json<B: Serialize>(&self, method: Method, segments: &[&str], body: &B) -> Result<Reply> {
        let payload = serde_json::to_vec(body)?;
        self.send(method, self.url(segments, false), Some(payload))
            .await
    }

    fn ensure_level_allowed(&self, level: CompatibilityLevel) -> Result<()> {
        if level.is_transitive() && !self.cluster.allow_transitive_compatibilities {
            return Err(SchemaError::InvalidLevel(format!(
                "{} (transitive levels are disabled on cluster {})",
                level, self.cluster.name
            )));
        }
        Ok(())
    }

    fn version_not_found(reply: &Reply, subject: &str, version: &str) -> SchemaError {
        if reply.error_code() == Some(SUBJECT_NOT_FOUND) {
            SchemaError::SubjectNotFound {
                subject: subject.to_string(),
            }
        } else {
            SchemaError::VersionNotFound {
                subject: subject.to_string(),
                version: version.to_string(),
            }
        }
    }
}

#[async_trait]
impl RegistryGateway for HttpGateway {
    async fn list_subjects(&self) -> Result<Vec<String>> {
        let reply = self.get(&["subjects"], true).await?;
        if !reply.is_success() {
            return Err(reply.into_rejection());
        }
        let subjects: Vec<String> = reply.decode()?;
        debug!("  {} registered subjects", subjects.len());
        Ok(subjects)
    }

    async fn list_versions(&self, subject: &str) -> Result<Vec<u32>> {
        let reply = self.get(&["subjects", subject, "versions"], true).await?;
        if reply.status == StatusCode::NOT_FOUND {
            return Err(SchemaError::SubjectNotFound {
                subject: subject.to_string(),
            });
        }
        if !reply.is_success() {
            return Err(reply.into_rejection());
        }
        let versions: Vec<u32> = reply.decode()?;
        debug!("  [{}] versions {:?}", subject, versions);
        Ok(versions)
    }

    async fn get_version(&self, subject: &str, version: VersionSelector) -> Result<SubjectVersion> {
        let segment = version.to_string();
        let reply = self
            .get(&["subjects", subject, "versions", segment.as_str()], false)
            .await?;
        if reply.status == StatusCode::NOT_FOUND {
            return Err(Self::version_not_found(&reply, subject, &segment));
        }
        if !reply.is_success() {
            return Err(reply.into_rejection());
        }
        reply.decode()
    }

    async fn register_version(&self, subject: &str, schema: &str) -> Result<u32> {
        self.cluster.ensure_permitted(Operation::Register)?;
        debug!("Posting new version of subject [{}]", subject);

        let reply = self
            .send_json(Method::POST, &["subjects", subject, "versions"], &SchemaRequest::new(schema))
            .await?;
        if !reply.is_success() {
            return Err(reply.into_rejection());
        }
        let registered: RegisterResponse = reply.decode()?;
        info!("Registered schema id {} under [{}]", registered.id, subject);
        Ok(registered.id)
    }

    async fn check_exists(&self, subject: &str, schema: &str) -> Result<SchemaMatch> {
        debug!("Checking if schema exists under subject [{}]", subject);
        let reply = self
            .send_json(Method::POST, &["subjects", subject], &SchemaRequest::new(schema))
            .await?;

        // Some proxies answer 407 where the registry itself answers 404
        if matches!(reply.status.as_u16(), 404 | 407) {
            return Err(match reply.error_code() {
                Some(SUBJECT_NOT_FOUND) => SchemaError::SubjectNotFound {
                    subject: subject.to_string(),
                },
                Some(SCHEMA_NOT_FOUND) | None => SchemaError::SchemaNotFound {
                    subject: subject.to_string(),
                },
                Some(_) => reply.into_rejection(),
            });
        }
        if !reply.is_success() {
            return Err(reply.into_rejection());
        }
        reply.decode()
    }

    async fn test_compatibility(&self, subject: &str, schema: &str) -> Result<CompatibilityVerdict> {
        debug!("  Testing schema compatibility for [{}]", subject);
        let reply = self
            .send_json(
                Method::POST,
                &["compatibility", "subjects", subject, "versions", VersionSelector::LATEST],
                &SchemaRequest::new(schema),
            )
            .await?;

        if reply.status == StatusCode::NOT_FOUND {
            match reply.error_code() {
                Some(SUBJECT_NOT_FOUND) | None => {
                    warn!("[{}] is a non existing subject", subject);
                    return Ok(CompatibilityVerdict::New);
                }
                Some(VERSION_NOT_FOUND) => {
                    return Err(SchemaError::VersionNotFound {
                        subject: subject.to_string(),
                        version: VersionSelector::LATEST.to_string(),
                    })
                }
                Some(_) => return Err(reply.into_rejection()),
            }
        }
        if !reply.is_success() {
            return Err(reply.into_rejection());
        }
        let result: CompatibilityResponse = reply.decode()?;
        let verdict = CompatibilityVerdict::from(result.is_compatible);
        info!("Compatibility of [{}] against latest: {}", subject, verdict);
        Ok(verdict)
    }

    async fn get_global_config(&self) -> Result<CompatibilityLevel> {
        let reply = self.get(&["config"], false).await?;
        if !reply.is_success() {
            return Err(reply.into_rejection());
        }
        let config: ConfigBody = reply.decode()?;
        Ok(config.compatibility)
    }

    async fn set_global_config(&self, level: CompatibilityLevel) -> Result<CompatibilityLevel> {
        self.cluster.ensure_permitted(Operation::SetGlobalConfig)?;
        self.ensure_level_allowed(level)?;

        let reply = self
            .send_json(Method::PUT, &["config"], &ConfigBody { compatibility: level })
            .await?;
        if !reply.is_success() {
            return Err(reply.into_config_rejection());
        }
        let config: ConfigBody = reply.decode()?;
        info!("Global compatibility changed to {}", config.compatibility);
        Ok(config.compatibility)
    }

    async fn get_subject_config(&self, subject: &str) -> Result<CompatibilityLevel> {
        let mut reply = self.get(&["config", subject], false).await?;

        // A subject without its own level inherits the global one
        if reply.status == StatusCode::NOT_FOUND && reply.error_code() == Some(SUBJECT_LEVEL_NOT_CONFIGURED) {
            debug!("  [{}] has no subject level, asking for the global default", subject);
            let mut url = self.url(&["config", subject], false);
            url.query_pairs_mut().append_pair("defaultToGlobal", "true");
            reply = self.send(Method::GET, url, None).await?;
        }

        if reply.status == StatusCode::NOT_FOUND && reply.error_code() == Some(SUBJECT_NOT_FOUND) {
            return Err(SchemaError::SubjectNotFound {
                subject: subject.to_string(),
            });
        }
        if !reply.is_success() {
            return Err(reply.into_rejection());
        }
        let config: ConfigBody = reply.decode()?;
        Ok(config.compatibility)
    }

    async fn set_subject_config(&self, subject: &str, level: CompatibilityLevel) -> Result<CompatibilityLevel> {
        self.cluster.ensure_permitted(Operation::SetSubjectConfig)?;
        self.ensure_level_allowed(level)?;

        let reply = self
            .send_json(Method::PUT, &["config", subject], &ConfigBody { compatibility: level })
            .await?;
        if !reply.is_success() {
            return Err(reply.into_config_rejection());
        }
        let config: ConfigBody = reply.decode()?;
        info!("Subject [ {} ] compatibility changed to {}", subject, config.compatibility);
        Ok(config.compatibility)
    }

    async fn delete_version(&self, subject: &str, version: u32) -> Result<u32> {
        self.cluster.ensure_permitted(Operation::DeleteSchema)?;

        let segment = version.to_string();
        let url = self.url(&["subjects", subject, "versions", segment.as_str()], false);
        let reply = self.send(Method::DELETE, url, None).await?;
        if reply.status == StatusCode::NOT_FOUND {
            return Err(Self::version_not_found(&reply, subject, &segment));
        }
        if !reply.is_success() {
            return Err(reply.into_rejection());
        }
        let deleted: u32 = reply.decode()?;
        info!("Deleted [{}] version {}", subject, deleted);
        Ok(deleted)
    }
}
