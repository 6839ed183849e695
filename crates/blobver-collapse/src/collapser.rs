use std::sync::Arc;

use blobver_store::BlobStore;
use tracing::{debug, info, warn};

use crate::config::CollapseConfig;
use crate::error::CollapseResult;
use crate::types::{CollapseReport, CollapseRequest};

/// Deletes redundant consecutive duplicates among a template's direct objects.
pub struct Collapser {
    store: Arc<dyn BlobStore>,
    config: CollapseConfig,
}

impl Collapser {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            config: CollapseConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CollapseConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &CollapseConfig {
        &self.config
    }

    /// Collapse the direct objects of `request.template`.
    ///
    /// Walks the objects in version order keeping an *anchor*, the last
    /// retained object. Each following object is stream-compared with the
    /// anchor: if equal it is deleted, otherwise it becomes the new anchor.
    /// Only neighbours in version order are compared, so content that
    /// reappears after a different version is kept.
    ///
    /// A missing container is an empty collapse, not an error.
    pub async fn collapse(&self, request: &CollapseRequest<'_>) -> CollapseResult<CollapseReport> {
        let container = request.container;
        let mut report = CollapseReport {
            dry_run: self.config.dry_run,
            ..Default::default()
        };

        if !self.store.container_exists(container).await? {
            info!(container, "container does not exist, nothing to collapse");
            return Ok(report);
        }

        let mut names = self.direct_paths(request).await?;
        names.sort_by(|a, b| request.name_comparer.compare(a, b));
        report.examined = names.len();

        let mut anchor = 0;
        let mut candidate = 1;
        if let Some(first) = names.first() {
            report.retained.push(first.clone());
        }
        while candidate < names.len() {
            let anchor_name = &names[anchor];
            let candidate_name = &names[candidate];

            let Some(mut candidate_blob) = self.store.read(container, candidate_name).await? else {
                warn!(container, path = %candidate_name, "direct object vanished during collapse");
                candidate += 1;
                continue;
            };
            let Some(mut anchor_blob) = self.store.read(container, anchor_name).await? else {
                warn!(container, path = %anchor_name, "direct object vanished during collapse");
                report.retained.retain(|name| name != anchor_name);
                report.retained.push(candidate_name.clone());
                anchor = candidate;
                candidate += 1;
                continue;
            };

            let equal = request
                .equality
                .equivalent(&mut *anchor_blob.body, &mut *candidate_blob.body)
                .await?;
            drop(anchor_blob);
            drop(candidate_blob);

            if equal {
                self.delete(container, candidate_name).await?;
                report.deleted.push(candidate_name.clone());
            } else {
                debug!(container, path = %candidate_name, "content changed, new anchor");
                report.retained.push(candidate_name.clone());
                anchor = candidate;
            }
            candidate += 1;
        }

        info!(
            container,
            template = %request.template,
            examined = report.examined,
            deleted = report.deleted.len(),
            dry_run = report.dry_run,
            "collapse finished"
        );
        Ok(report)
    }

    /// Every direct object of the template: paths under the prefix ending in
    /// the suffix, minus the latest object and the latest-number marker.
    async fn direct_paths(&self, request: &CollapseRequest<'_>) -> CollapseResult<Vec<String>> {
        let template = request.template;
        let latest = template.render_latest();
        let marker = template.marker_path();

        let listed = self
            .store
            .list_all(request.container, template.prefix())
            .await?;
        let total = listed.len();
        let names: Vec<String> = listed
            .into_iter()
            .filter(|path| path.ends_with(template.suffix()))
            .filter(|path| *path != latest && *path != marker)
            .collect();
        debug!(
            container = request.container,
            listed = total,
            direct = names.len(),
            "listed direct objects"
        );
        Ok(names)
    }

    async fn delete(&self, container: &str, path: &str) -> CollapseResult<()> {
        if self.config.dry_run {
            info!(container, path, "would delete duplicate");
            return Ok(());
        }
        if self.store.delete(container, path).await? {
            info!(container, path, "deleted duplicate");
        } else {
            debug!(container, path, "duplicate already deleted");
        }
        Ok(())
    }
}
