//! Local-directory blob store.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<container>/<path>                        object content
//! <root>/<container>/.blobver/blobs/<path>.json    object properties
//! <root>/<container>/.blobver/tmp/                 in-flight writes
//! ```
//!
//! Content is streamed into `tmp/` and renamed into place, so readers never
//! observe a partial object. Condition checks and commits are serialized by a
//! per-store async mutex: conditional writes are atomic for all callers that
//! share one `FsBlobStore`, not across processes.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use blobver_digest::{ContentDigest, IncrementalDigest, DEFAULT_CHUNK_SIZE};
use blobver_types::ETag;
use chrono::Utc;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::memory::DEFAULT_PAGE_SIZE;
use crate::traits::BlobStore;
use crate::types::{
    BlobItem, BlobProperties, BlobRead, BlobReader, CopyHandle, CopyStatus, ListPage,
    WriteCondition, WriteOptions,
};

const META_DIR: &str = ".blobver";

/// Blob store backed by a local directory tree.
pub struct FsBlobStore {
    root: PathBuf,
    commit: tokio::sync::Mutex<()>,
    copies: Mutex<HashMap<String, CopyStatus>>,
    copy_seq: AtomicU64,
    page_size: usize,
}

impl FsBlobStore {
    /// Open a store rooted at `root`. Containers are subdirectories.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self {
            root,
            commit: tokio::sync::Mutex::new(()),
            copies: Mutex::new(HashMap::new()),
            copy_seq: AtomicU64::new(1),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Limit listing pages to `page_size` items.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// The directory holding all containers.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_dir(&self, container: &str) -> StoreResult<PathBuf> {
        if container.is_empty()
            || container.starts_with('.')
            || container.contains(['/', '\\'])
        {
            return Err(StoreError::InvalidPath {
                path: container.to_string(),
                reason: "container names must be a single directory name not starting with '.'"
                    .into(),
            });
        }
        Ok(self.root.join(container))
    }

    /// Content and properties locations for a blob.
    fn locate(&self, container: &str, path: &str) -> StoreResult<(PathBuf, PathBuf, PathBuf)> {
        let dir = self.container_dir(container)?;
        validate_blob_path(path)?;
        let data = dir.join(path);
        let meta = dir.join(META_DIR).join("blobs").join(format!("{path}.json"));
        Ok((dir, data, meta))
    }

    async fn require_container(&self, container: &str, dir: &Path) -> StoreResult<()> {
        if is_dir(dir).await? {
            Ok(())
        } else {
            Err(StoreError::ContainerNotFound(container.to_string()))
        }
    }

    fn temp_path(dir: &Path) -> PathBuf {
        dir.join(META_DIR).join("tmp").join(Uuid::now_v7().to_string())
    }

    /// Stream `body` into a temp file, digesting as it goes.
    async fn stream_to_temp(
        dir: &Path,
        body: &mut BlobReader,
    ) -> StoreResult<(PathBuf, ContentDigest, u64)> {
        let tmp = Self::temp_path(dir);
        if let Some(parent) = tmp.parent() {
            fs::create_dir_all(parent).await?;
        }
        let result: io::Result<(ContentDigest, u64)> = async {
            let mut file = fs::File::create(&tmp).await?;
            let mut digest = IncrementalDigest::new();
            let mut buf = vec![0u8; DEFAULT_CHUNK_SIZE];
            loop {
                let n = body.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                digest.update(&buf[..n]);
                file.write_all(&buf[..n]).await?;
            }
            file.sync_all().await?;
            let size = digest.len();
            Ok((digest.finalize(), size))
        }
        .await;
        match result {
            Ok((md5, size)) => Ok((tmp, md5, size)),
            Err(e) => {
                discard(&tmp).await;
                Err(e.into())
            }
        }
    }

    async fn store_properties(
        dir: &Path,
        meta: &Path,
        properties: &BlobProperties,
    ) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(properties)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let tmp = Self::temp_path(dir);
        if let Some(parent) = tmp.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&tmp, json).await?;
        move_into_place(&tmp, meta).await
    }

    fn conflict(
        container: &str,
        path: &str,
        condition: &WriteCondition,
        current: Option<&ETag>,
    ) -> StoreResult<()> {
        condition.check(current).map_err(|kind| StoreError::Conflict {
            container: container.to_string(),
            path: path.to_string(),
            condition: condition.clone(),
            kind,
        })
    }

    fn new_etag() -> ETag {
        ETag::new(format!("\"{}\"", Uuid::now_v7()))
    }
}

impl std::fmt::Debug for FsBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsBlobStore")
            .field("root", &self.root)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

fn validate_blob_path(path: &str) -> StoreResult<()> {
    let invalid = |reason: &str| StoreError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };
    if path.is_empty() {
        return Err(invalid("path must not be empty"));
    }
    if path.contains('\\') {
        return Err(invalid("path must use '/' separators"));
    }
    if path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(invalid("path segments must not be empty, '.' or '..'"));
    }
    if path.split('/').next() == Some(META_DIR) {
        return Err(invalid("the top-level '.blobver' directory is reserved"));
    }
    Ok(())
}

async fn is_dir(path: &Path) -> StoreResult<bool> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_dir()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn load_properties(meta: &Path) -> StoreResult<Option<BlobProperties>> {
    match fs::read(meta).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Serialization(format!("{}: {e}", meta.display()))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn move_into_place(tmp: &Path, target: &Path) -> StoreResult<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }
    if let Err(e) = fs::rename(tmp, target).await {
        discard(tmp).await;
        return Err(e.into());
    }
    Ok(())
}

async fn discard(tmp: &Path) {
    if let Err(e) = fs::remove_file(tmp).await {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %tmp.display(), error = %e, "failed to remove temp file");
        }
    }
}

async fn remove_if_present(path: &Path) -> StoreResult<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn ensure_container(&self, container: &str) -> StoreResult<bool> {
        let dir = self.container_dir(container)?;
        let existed = is_dir(&dir).await?;
        fs::create_dir_all(dir.join(META_DIR)).await?;
        if !existed {
            debug!(container, root = %self.root.display(), "created container");
        }
        Ok(!existed)
    }

    async fn container_exists(&self, container: &str) -> StoreResult<bool> {
        is_dir(&self.container_dir(container)?).await
    }

    async fn read(&self, container: &str, path: &str) -> StoreResult<Option<BlobRead>> {
        let (_, data, meta) = self.locate(container, path)?;
        let _commit = self.commit.lock().await;
        let Some(properties) = load_properties(&meta).await? else {
            return Ok(None);
        };
        match fs::File::open(&data).await {
            Ok(file) => Ok(Some(BlobRead {
                properties,
                body: Box::new(file),
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn properties(
        &self,
        container: &str,
        path: &str,
    ) -> StoreResult<Option<BlobProperties>> {
        let (_, _, meta) = self.locate(container, path)?;
        load_properties(&meta).await
    }

    async fn write(
        &self,
        container: &str,
        path: &str,
        mut body: BlobReader,
        options: WriteOptions,
    ) -> StoreResult<ETag> {
        let (dir, data, meta) = self.locate(container, path)?;
        self.require_container(container, &dir).await?;

        let (tmp, content_md5, size) = Self::stream_to_temp(&dir, &mut body).await?;
        drop(body);

        let _commit = self.commit.lock().await;
        let current = load_properties(&meta).await?;
        if let Err(e) = Self::conflict(
            container,
            path,
            &options.condition,
            current.as_ref().map(|p| &p.etag),
        ) {
            discard(&tmp).await;
            return Err(e);
        }

        move_into_place(&tmp, &data).await?;
        let etag = Self::new_etag();
        let properties = BlobProperties {
            etag: etag.clone(),
            content_type: options.content_type,
            content_md5: Some(content_md5),
            size,
            metadata: options.metadata,
            last_modified: Utc::now(),
        };
        Self::store_properties(&dir, &meta, &properties).await?;
        debug!(container, path, %etag, size, "wrote blob");
        Ok(etag)
    }

    async fn set_metadata(
        &self,
        container: &str,
        path: &str,
        metadata: BTreeMap<String, String>,
        condition: WriteCondition,
    ) -> StoreResult<ETag> {
        let (dir, _, meta) = self.locate(container, path)?;
        let _commit = self.commit.lock().await;
        let mut properties = load_properties(&meta).await?.ok_or_else(|| StoreError::NotFound {
            container: container.to_string(),
            path: path.to_string(),
        })?;
        Self::conflict(container, path, &condition, Some(&properties.etag))?;

        let etag = Self::new_etag();
        properties.etag = etag.clone();
        properties.metadata = metadata;
        properties.last_modified = Utc::now();
        Self::store_properties(&dir, &meta, &properties).await?;
        Ok(etag)
    }

    async fn start_copy(
        &self,
        container: &str,
        source: &str,
        source_if_match: Option<&ETag>,
        destination: &str,
        destination_condition: WriteCondition,
    ) -> StoreResult<CopyHandle> {
        let (dir, source_data, source_meta) = self.locate(container, source)?;
        let (_, dest_data, dest_meta) = self.locate(container, destination)?;
        self.require_container(container, &dir).await?;

        let _commit = self.commit.lock().await;
        let mut properties =
            load_properties(&source_meta)
                .await?
                .ok_or_else(|| StoreError::NotFound {
                    container: container.to_string(),
                    path: source.to_string(),
                })?;
        if let Some(expected) = source_if_match {
            let condition = WriteCondition::IfMatch(expected.clone());
            Self::conflict(container, source, &condition, Some(&properties.etag))?;
        }
        let current = load_properties(&dest_meta).await?;
        Self::conflict(
            container,
            destination,
            &destination_condition,
            current.as_ref().map(|p| &p.etag),
        )?;

        let tmp = Self::temp_path(&dir);
        if let Err(e) = fs::copy(&source_data, &tmp).await {
            discard(&tmp).await;
            return Err(e.into());
        }
        move_into_place(&tmp, &dest_data).await?;
        let etag = Self::new_etag();
        properties.etag = etag.clone();
        properties.last_modified = Utc::now();
        Self::store_properties(&dir, &dest_meta, &properties).await?;

        let id = format!("copy-{}", self.copy_seq.fetch_add(1, Ordering::Relaxed));
        self.copies
            .lock()
            .map_err(|_| StoreError::Internal("lock poisoned".into()))?
            .insert(id.clone(), CopyStatus::Done { etag });
        debug!(container, source, destination, copy = %id, "copied blob");
        Ok(CopyHandle {
            id,
            container: container.to_string(),
            destination: destination.to_string(),
        })
    }

    async fn poll_copy(&self, handle: &CopyHandle) -> StoreResult<CopyStatus> {
        self.copies
            .lock()
            .map_err(|_| StoreError::Internal("lock poisoned".into()))?
            .remove(&handle.id)
            .ok_or_else(|| StoreError::UnknownCopy(handle.id.clone()))
    }

    async fn list(
        &self,
        container: &str,
        prefix: &str,
        continuation: Option<&str>,
    ) -> StoreResult<ListPage> {
        let dir = self.container_dir(container)?;
        self.require_container(container, &dir).await?;

        let walk_root = dir.clone();
        let walk_prefix = prefix.to_string();
        let mut paths = tokio::task::spawn_blocking(move || -> StoreResult<Vec<String>> {
            let mut found = Vec::new();
            let entries = WalkDir::new(&walk_root)
                .min_depth(1)
                .into_iter()
                .filter_entry(|e| !(e.depth() == 1 && e.file_name() == META_DIR));
            for entry in entries {
                let entry = entry.map_err(|e| StoreError::Io(e.into()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = entry
                    .path()
                    .strip_prefix(&walk_root)
                    .map_err(|e| StoreError::Internal(e.to_string()))?;
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if name.starts_with(&walk_prefix) {
                    found.push(name);
                }
            }
            Ok(found)
        })
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))??;
        paths.sort();

        let mut remaining = paths
            .into_iter()
            .filter(|p| continuation.map_or(true, |after| p.as_str() > after));
        let mut items = Vec::new();
        let mut last_examined = None;
        for path in remaining.by_ref().take(self.page_size) {
            let (_, _, meta) = self.locate(container, &path)?;
            last_examined = Some(path.clone());
            // Content without properties is an interrupted write; skip it.
            if let Some(properties) = load_properties(&meta).await? {
                items.push(BlobItem {
                    path,
                    etag: properties.etag,
                    size: properties.size,
                });
            }
        }
        let continuation = match remaining.next() {
            Some(_) => last_examined,
            None => None,
        };
        Ok(ListPage {
            items,
            continuation,
        })
    }

    async fn delete(&self, container: &str, path: &str) -> StoreResult<bool> {
        let (_, data, meta) = self.locate(container, path)?;
        let _commit = self.commit.lock().await;
        let had_meta = remove_if_present(&meta).await?;
        let had_data = remove_if_present(&data).await?;
        Ok(had_meta || had_data)
    }

    fn uri(&self, container: &str, path: &str) -> String {
        format!("file://{}/{container}/{path}", self.root.display())
    }
}
