//! Version allocation.
//!
//! Timestamp versions come straight from the clock. Number versions are
//! read from the latest-number marker and committed back to it after the
//! direct object exists, guarded by the marker's ETag (or by a create-only
//! condition when there is no marker yet). Two allocators racing on the same
//! marker cannot both commit: the loser gets a conflict and must re-read.

use std::collections::BTreeMap;

use blobver_store::{
    reader_from, BlobProperties, BlobStore, ConflictKind, StoreError, WriteCondition,
    WriteOptions,
};
use blobver_types::{Clock, ETag, PathTemplate, VersionId};
use bytes::Bytes;
use tracing::{debug, info};

use crate::error::{ObjectRole, PublishError, PublishResult};
use crate::request::{MarkerExpectation, VersionStrategy};

/// Metadata key on the marker object holding the last allocated number.
pub const LATEST_NUMBER_KEY: &str = "LatestNumber";

/// A pending write to the latest-number marker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkerUpdate {
    pub path: String,
    pub number: u64,
    pub condition: WriteCondition,
}

/// A freshly allocated version, plus the marker write that claims it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Allocation {
    pub version: VersionId,
    pub marker: Option<MarkerUpdate>,
}

pub struct VersionAllocator<'a> {
    store: &'a dyn BlobStore,
    clock: &'a dyn Clock,
}

impl<'a> VersionAllocator<'a> {
    pub fn new(store: &'a dyn BlobStore, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Choose the version for the next direct object.
    pub async fn allocate(
        &self,
        container: &str,
        template: &PathTemplate,
        strategy: &VersionStrategy,
    ) -> PublishResult<Allocation> {
        match strategy {
            VersionStrategy::Timestamp => Ok(Allocation {
                version: VersionId::Timestamp(self.clock.utc_now()),
                marker: None,
            }),
            VersionStrategy::Number {
                marker,
                next_number,
            } => {
                self.allocate_number(container, template, marker, *next_number)
                    .await
            }
        }
    }

    async fn allocate_number(
        &self,
        container: &str,
        template: &PathTemplate,
        expectation: &MarkerExpectation,
        next_number: Option<u64>,
    ) -> PublishResult<Allocation> {
        if next_number == Some(0) {
            return Err(PublishError::InvalidRequest(
                "sequence numbers start at 1; 0 addresses the latest-number marker".into(),
            ));
        }

        let path = template.marker_path();
        let (current, condition) = match expectation {
            MarkerExpectation::Absent => (0, WriteCondition::IfNotExists),
            MarkerExpectation::Match(etag) if next_number.is_some() => {
                (0, WriteCondition::IfMatch(etag.clone()))
            }
            MarkerExpectation::Match(etag) => match self.marker(container, &path).await? {
                Some(properties) if &properties.etag == etag => (
                    stored_number(&path, &properties)?,
                    WriteCondition::IfMatch(etag.clone()),
                ),
                _ => {
                    return Err(PublishError::Conflict {
                        role: ObjectRole::Marker,
                        path,
                        condition: WriteCondition::IfMatch(etag.clone()),
                        kind: ConflictKind::ETagMismatch,
                    })
                }
            },
            MarkerExpectation::Read => match self.marker(container, &path).await? {
                Some(properties) => (
                    stored_number(&path, &properties)?,
                    WriteCondition::IfMatch(properties.etag),
                ),
                None => (0, WriteCondition::IfNotExists),
            },
        };

        let number = match next_number {
            Some(n) => n,
            None => current
                .checked_add(1)
                .ok_or_else(|| PublishError::InvalidMarker {
                    path: path.clone(),
                    value: current.to_string(),
                })?,
        };
        debug!(container, marker = %path, current, number, "allocated sequence number");

        Ok(Allocation {
            version: VersionId::Number(number),
            marker: Some(MarkerUpdate {
                path,
                number,
                condition,
            }),
        })
    }

    async fn marker(&self, container: &str, path: &str) -> PublishResult<Option<BlobProperties>> {
        self.store
            .properties(container, path)
            .await
            .map_err(|e| PublishError::at(ObjectRole::Marker, e))
    }

    /// Record `update.number` on the marker. Returns the marker's new ETag.
    pub async fn commit_marker(&self, container: &str, update: &MarkerUpdate) -> PublishResult<ETag> {
        let etag = match &update.condition {
            WriteCondition::IfMatch(expected) => {
                let metadata =
                    BTreeMap::from([(LATEST_NUMBER_KEY.to_string(), update.number.to_string())]);
                self.store
                    .set_metadata(container, &update.path, metadata, update.condition.clone())
                    .await
                    .map_err(|e| match e {
                        // The marker we matched against was deleted underneath us.
                        StoreError::NotFound { .. } => PublishError::Conflict {
                            role: ObjectRole::Marker,
                            path: update.path.clone(),
                            condition: WriteCondition::IfMatch(expected.clone()),
                            kind: ConflictKind::ETagMismatch,
                        },
                        other => PublishError::at(ObjectRole::Marker, other),
                    })?
            }
            condition => {
                let options = WriteOptions::new(condition.clone())
                    .with_metadata(LATEST_NUMBER_KEY, update.number.to_string());
                self.store
                    .write(container, &update.path, reader_from(Bytes::new()), options)
                    .await
                    .map_err(|e| PublishError::at(ObjectRole::Marker, e))?
            }
        };
        info!(container, marker = %update.path, number = update.number, %etag, "committed latest number");
        Ok(etag)
    }
}

fn stored_number(path: &str, properties: &BlobProperties) -> PublishResult<u64> {
    let value = properties
        .metadata
        .get(LATEST_NUMBER_KEY)
        .map(String::as_str)
        .unwrap_or_default();
    value.trim().parse().map_err(|_| PublishError::InvalidMarker {
        path: path.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobver_store::InMemoryBlobStore;
    use blobver_types::FixedClock;
    use chrono::{TimeZone, Utc};

    async fn setup() -> (InMemoryBlobStore, FixedClock, PathTemplate) {
        let store = InMemoryBlobStore::new();
        store.ensure_container("c").await.unwrap();
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2015, 1, 2, 3, 4, 5).unwrap());
        (store, clock, PathTemplate::parse("p/{0}.txt").unwrap())
    }

    #[tokio::test]
    async fn timestamp_uses_clock() {
        let (store, clock, template) = setup().await;
        let allocator = VersionAllocator::new(&store, &clock);
        let allocation = allocator
            .allocate("c", &template, &VersionStrategy::Timestamp)
            .await
            .unwrap();
        assert_eq!(allocation.version.render(), "2015.01.02.03.04.05.0000000");
        assert!(allocation.marker.is_none());
    }

    #[tokio::test]
    async fn first_number_is_one_and_creates_marker() {
        let (store, clock, template) = setup().await;
        let allocator = VersionAllocator::new(&store, &clock);
        let allocation = allocator
            .allocate("c", &template, &VersionStrategy::number())
            .await
            .unwrap();
        assert_eq!(allocation.version, VersionId::Number(1));
        let marker = allocation.marker.unwrap();
        assert_eq!(marker.path, "p/0.txt");
        assert_eq!(marker.condition, WriteCondition::IfNotExists);

        allocator.commit_marker("c", &marker).await.unwrap();
        let properties = store.properties("c", "p/0.txt").await.unwrap().unwrap();
        assert_eq!(properties.size, 0);
        assert_eq!(properties.metadata.get(LATEST_NUMBER_KEY).map(String::as_str), Some("1"));
    }

    #[tokio::test]
    async fn racing_allocators_cannot_both_commit() {
        let (store, clock, template) = setup().await;
        let allocator = VersionAllocator::new(&store, &clock);
        let first = allocator
            .allocate("c", &template, &VersionStrategy::number())
            .await
            .unwrap();
        let second = allocator
            .allocate("c", &template, &VersionStrategy::number())
            .await
            .unwrap();
        assert_eq!(first.version, second.version);

        allocator.commit_marker("c", &first.marker.unwrap()).await.unwrap();
        let err = allocator
            .commit_marker("c", &second.marker.unwrap())
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(err.conflict_kind(), Some(ConflictKind::AlreadyExists));
    }

    #[tokio::test]
    async fn stale_marker_etag_is_rejected_before_any_write() {
        let (store, clock, template) = setup().await;
        let allocator = VersionAllocator::new(&store, &clock);
        let allocation = allocator
            .allocate("c", &template, &VersionStrategy::number())
            .await
            .unwrap();
        allocator.commit_marker("c", &allocation.marker.unwrap()).await.unwrap();

        let strategy = VersionStrategy::Number {
            marker: MarkerExpectation::Match(ETag::from("\"stale\"")),
            next_number: None,
        };
        let err = allocator.allocate("c", &template, &strategy).await.unwrap_err();
        assert!(matches!(
            err,
            PublishError::Conflict {
                role: ObjectRole::Marker,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn garbage_marker_is_reported() {
        let (store, clock, template) = setup().await;
        let options = WriteOptions::default().with_metadata(LATEST_NUMBER_KEY, "many");
        store
            .write("c", "p/0.txt", reader_from(Bytes::new()), options)
            .await
            .unwrap();
        let allocator = VersionAllocator::new(&store, &clock);
        let err = allocator
            .allocate("c", &template, &VersionStrategy::number())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::InvalidMarker { value, .. } if value == "many"));
    }

    #[tokio::test]
    async fn zero_is_not_a_version() {
        let (store, clock, template) = setup().await;
        let allocator = VersionAllocator::new(&store, &clock);
        let strategy = VersionStrategy::Number {
            marker: MarkerExpectation::Absent,
            next_number: Some(0),
        };
        let err = allocator.allocate("c", &template, &strategy).await.unwrap_err();
        assert!(matches!(err, PublishError::InvalidRequest(_)));
    }
}
