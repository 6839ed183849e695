use std::sync::Arc;

use blobver_store::{BlobReader, BlobStore, CopyStatus, StoreError, WriteCondition, WriteOptions};
use blobver_types::{Clock, ETag, PathTemplate, SystemClock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::allocator::VersionAllocator;
use crate::config::PublisherConfig;
use crate::error::{ObjectRole, PublishError, PublishResult};
use crate::outcome::{LatestBlob, LatestInfo, PublishOutcome};
use crate::request::PublishRequest;

/// Where the latest object gets its content from.
enum LatestSource {
    /// Server-side copy of the direct object just written.
    Direct { path: String, etag: ETag },
    /// The request body, written straight to latest.
    Body(BlobReader),
}

/// Publishes content as a direct object and/or the latest object.
///
/// Holds no per-publish state; one publisher can serve concurrent publishes
/// to any number of containers and templates.
pub struct Publisher {
    store: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    config: PublisherConfig,
}

impl Publisher {
    /// A publisher on the system clock with the default configuration.
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            config: PublisherConfig::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: PublisherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Run one publish of `body`.
    ///
    /// 1. Ensure the container exists.
    /// 2. If `write_direct`: allocate a version and create the direct object
    ///    with `If-None-Match: *`; in number mode, commit the marker.
    /// 3. If `write_latest`: copy the direct object onto latest (or write
    ///    `body` to latest when there is no direct object), guarded by the
    ///    request's expected latest ETag.
    ///
    /// Conflicts are returned, never retried. A failure after the direct
    /// object exists is wrapped in [`PublishError::Partial`] carrying what
    /// was written.
    pub async fn publish(
        &self,
        request: &PublishRequest,
        body: BlobReader,
    ) -> PublishResult<PublishOutcome> {
        let result = self.run(request, body).await;
        if let Err(err) = &result {
            if err.is_conflict() {
                warn!(container = %request.container, template = %request.template, error = %err, "publish conflict");
            }
        }
        result
    }

    async fn run(&self, request: &PublishRequest, body: BlobReader) -> PublishResult<PublishOutcome> {
        let container = request.container.as_str();
        if self.store.ensure_container(container).await? {
            info!(container, "created container");
        }

        let mut outcome = PublishOutcome::default();
        let source = if request.write_direct {
            self.write_direct(request, body, &mut outcome).await?
        } else {
            LatestSource::Body(body)
        };

        if request.write_latest {
            let latest_path = request.template.render_latest();
            let condition = if request.use_etags {
                WriteCondition::expecting(request.latest_etag.as_ref())
            } else {
                WriteCondition::None
            };

            let written = match source {
                LatestSource::Direct { path, etag } => {
                    self.copy_to_latest(container, &path, &etag, &latest_path, condition)
                        .await
                }
                LatestSource::Body(body) => {
                    let options = WriteOptions::new(condition)
                        .with_content_type(request.content_type.as_deref());
                    self.store
                        .write(container, &latest_path, body, options)
                        .await
                        .map_err(|e| PublishError::at(ObjectRole::Latest, e))
                }
            };
            let etag = match written {
                Ok(etag) => etag,
                Err(err) if outcome.direct_etag.is_some() => return Err(err.partial(&outcome)),
                Err(err) => return Err(err),
            };
            info!(container, path = %latest_path, %etag, "updated latest object");
            outcome.latest_uri = Some(self.store.uri(container, &latest_path));
            outcome.latest_etag = Some(etag);
        }

        Ok(outcome)
    }

    async fn write_direct(
        &self,
        request: &PublishRequest,
        body: BlobReader,
        outcome: &mut PublishOutcome,
    ) -> PublishResult<LatestSource> {
        let container = request.container.as_str();
        let allocator = VersionAllocator::new(self.store.as_ref(), self.clock.as_ref());
        let allocation = allocator
            .allocate(container, &request.template, &request.strategy)
            .await?;

        let path = request.template.render_direct(&allocation.version);
        let options = WriteOptions::new(WriteCondition::IfNotExists)
            .with_content_type(request.content_type.as_deref());
        let etag = self
            .store
            .write(container, &path, body, options)
            .await
            .map_err(|e| PublishError::at(ObjectRole::Direct, e))?;
        info!(container, path = %path, %etag, "wrote direct object");

        outcome.direct_uri = Some(self.store.uri(container, &path));
        outcome.direct_etag = Some(etag.clone());
        outcome.direct_version = Some(allocation.version);

        if let Some(marker) = &allocation.marker {
            let marker_etag = allocator
                .commit_marker(container, marker)
                .await
                .map_err(|e| e.partial(outcome))?;
            outcome.latest_number = Some(marker.number);
            outcome.latest_number_etag = Some(marker_etag);
        }

        Ok(LatestSource::Direct { path, etag })
    }

    /// Copy `source` onto `destination` and wait for the copy to settle.
    async fn copy_to_latest(
        &self,
        container: &str,
        source: &str,
        source_etag: &ETag,
        destination: &str,
        condition: WriteCondition,
    ) -> PublishResult<ETag> {
        let handle = self
            .store
            .start_copy(container, source, Some(source_etag), destination, condition)
            .await
            .map_err(|e| {
                let role = match &e {
                    StoreError::Conflict { path, .. } | StoreError::NotFound { path, .. }
                        if path == source =>
                    {
                        ObjectRole::Direct
                    }
                    _ => ObjectRole::Latest,
                };
                PublishError::at(role, e)
            })?;

        let policy = &self.config.copy_poll;
        let started = Instant::now();
        loop {
            let status = self
                .store
                .poll_copy(&handle)
                .await
                .map_err(|e| PublishError::at(ObjectRole::Latest, e))?;
            match status {
                CopyStatus::Done { etag } => return Ok(etag),
                CopyStatus::Failed { reason } => {
                    return Err(PublishError::CopyFailed {
                        from: source.to_string(),
                        to: destination.to_string(),
                        reason,
                    })
                }
                CopyStatus::Pending if started.elapsed() >= policy.deadline => {
                    return Err(PublishError::TimedOut {
                        from: source.to_string(),
                        to: destination.to_string(),
                        deadline: policy.deadline,
                    })
                }
                CopyStatus::Pending => {
                    debug!(copy = %handle.id, destination, "copy pending");
                    tokio::time::sleep(policy.interval).await;
                }
            }
        }
    }

    /// URI of the latest object. Performs no I/O.
    pub fn latest_uri(&self, container: &str, template: &PathTemplate) -> String {
        self.store.uri(container, &template.render_latest())
    }

    /// The latest object's URI and ETag, or `None` if it does not exist.
    pub async fn latest_info(
        &self,
        container: &str,
        template: &PathTemplate,
    ) -> PublishResult<Option<LatestInfo>> {
        let path = template.render_latest();
        let properties = self
            .store
            .properties(container, &path)
            .await
            .map_err(|e| PublishError::at(ObjectRole::Latest, e))?;
        Ok(properties.map(|p| LatestInfo {
            uri: self.store.uri(container, &path),
            etag: p.etag,
        }))
    }

    /// Open the latest object, or `None` if the container or object is missing.
    pub async fn open_latest(
        &self,
        container: &str,
        template: &PathTemplate,
    ) -> PublishResult<Option<LatestBlob>> {
        let path = template.render_latest();
        let read = self
            .store
            .read(container, &path)
            .await
            .map_err(|e| PublishError::at(ObjectRole::Latest, e))?;
        match read {
            Some(read) => Ok(Some(LatestBlob {
                uri: self.store.uri(container, &path),
                properties: read.properties,
                body: read.body,
            })),
            None => {
                debug!(container, path = %path, "no latest object");
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
