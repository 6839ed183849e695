//! Skip publishes whose content matches the current latest object.

use std::io::Cursor;

use blobver_diff::ContentEquality;
use blobver_digest::digest_reader;
use blobver_store::reader_from;
use bytes::Bytes;
use tracing::{debug, info};

use crate::error::PublishResult;
use crate::outcome::{LatestBlob, PublishOutcome};
use crate::publisher::Publisher;
use crate::request::PublishRequest;

/// Publishes only when the candidate differs from the latest object.
///
/// The decision is made on a snapshot of latest; the publish that follows is
/// guarded by that snapshot's ETag, so a concurrent change in between makes
/// the publish fail with a conflict instead of overwriting it.
pub struct DedupGate<'a> {
    publisher: &'a Publisher,
}

impl<'a> DedupGate<'a> {
    pub fn new(publisher: &'a Publisher) -> Self {
        Self { publisher }
    }

    /// Publish `candidate` unless it is equivalent to the latest object.
    ///
    /// Returns `Ok(None)` when the publish was skipped. The candidate is
    /// buffered so it can be compared and then uploaded in full. The
    /// request's `latest_etag` is replaced with the ETag observed here.
    pub async fn publish_if_changed(
        &self,
        request: &PublishRequest,
        candidate: Bytes,
        equality: &dyn ContentEquality,
    ) -> PublishResult<Option<PublishOutcome>> {
        let latest = self
            .publisher
            .open_latest(&request.container, &request.template)
            .await?;

        let observed = match latest {
            None => None,
            Some(mut latest) => {
                if self.unchanged(&mut latest, &candidate, equality).await? {
                    info!(
                        container = %request.container,
                        latest = %latest.uri,
                        "content unchanged, skipping publish"
                    );
                    return Ok(None);
                }
                Some(latest.etag().clone())
            }
        };

        let request = request.clone().with_latest_etag(observed);
        self.publisher
            .publish(&request, reader_from(candidate))
            .await
            .map(Some)
    }

    async fn unchanged(
        &self,
        latest: &mut LatestBlob,
        candidate: &Bytes,
        equality: &dyn ContentEquality,
    ) -> PublishResult<bool> {
        if let Some(stored) = &latest.properties.content_md5 {
            let chunk_size = self.publisher.config().chunk_size;
            let digest = digest_reader(&mut Cursor::new(&candidate[..]), chunk_size).await?;
            if &digest == stored {
                debug!(digest = %digest.to_hex(), "digest matches latest");
                return Ok(true);
            }
        }

        let mut candidate = Cursor::new(candidate.clone());
        Ok(equality
            .equivalent(&mut *latest.body, &mut candidate)
            .await?)
    }
}
