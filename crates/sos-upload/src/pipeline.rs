//! Pipeline orchestrator
//!
//! Drives an invocation through its phases: staging, grouping, upload
//! (transfer mode), enrichment, publishing, cleanup. Cleanup runs on every
//! exit path, including deadline expiry, so no staged copy outlives the
//! invocation.
//!
//! Two operating modes:
//! - **Transfer-and-publish**: stage from the source bucket, rename and
//!   upload into the archive collection, then (optionally) notify.
//! - **Publish-only**: re-stage already-uploaded files from the archive
//!   solely to compute their checksums, then notify.

use crate::attrs::RuntimeAttributeReader;
use crate::config::PipelineConfig;
use crate::enrich::enrich_granules;
use crate::event::UploadEvent;
use crate::granule::{group_files, FileRole, Granule};
use crate::message::build_message;
use crate::publisher::Notifier;
use crate::staging::StagingArea;
use crate::storage::ObjectStore;
use chrono::Utc;
use sos_common::{Result, SosError};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Outcome summary of one invocation
#[derive(Debug, Default, Clone)]
pub struct PipelineReport {
    /// Number of files staged locally
    pub staged: usize,
    /// Destination names uploaded to the archive (transfer mode)
    pub uploaded: Vec<String>,
    /// Identifiers of published notifications
    pub published: Vec<String>,
    /// Keys of granules skipped for missing a role
    pub skipped_incomplete: Vec<String>,
}

/// Composes the collaborators into the end-to-end flow
pub struct Pipeline {
    config: PipelineConfig,
    source: Arc<dyn ObjectStore>,
    archive: Arc<dyn ObjectStore>,
    notifier: Arc<dyn Notifier>,
    attrs: Arc<dyn RuntimeAttributeReader>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn ObjectStore>,
        archive: Arc<dyn ObjectStore>,
        notifier: Arc<dyn Notifier>,
        attrs: Arc<dyn RuntimeAttributeReader>,
    ) -> Self {
        Self {
            config,
            source,
            archive,
            notifier,
            attrs,
        }
    }

    /// Run one invocation under the configured deadline
    ///
    /// Staged copies are released before this returns, whatever the
    /// outcome.
    pub async fn run(&self, event: &UploadEvent) -> Result<PipelineReport> {
        event.validate()?;

        let deadline = Duration::from_secs(self.config.deadline_secs);
        let mut staging = StagingArea::new(&self.config.scratch_dir)?;

        let outcome = match tokio::time::timeout(deadline, self.execute(event, &mut staging)).await
        {
            Ok(result) => result,
            Err(_) => Err(SosError::Timeout(self.config.deadline_secs)),
        };

        staging.release_all();

        outcome
    }

    async fn execute(
        &self,
        event: &UploadEvent,
        staging: &mut StagingArea,
    ) -> Result<PipelineReport> {
        if event.publish_only {
            self.publish_only(event, staging).await
        } else {
            self.transfer_and_publish(event, staging).await
        }
    }

    /// Stage from the source bucket, rename and upload, optionally notify
    async fn transfer_and_publish(
        &self,
        event: &UploadEvent,
        staging: &mut StagingArea,
    ) -> Result<PipelineReport> {
        let source_bucket = event
            .source_bucket
            .as_deref()
            .ok_or_else(|| SosError::config("source_bucket is required for transfer mode"))?;
        let data_version = event.data_version()?;
        let run_type = event.run_type_or_sentinel();

        info!(bucket = source_bucket, files = event.file_list.len(), "Staging source files");
        let mut staged = HashMap::new();
        for name in &event.file_list {
            let key = format!("{}/{}/{}", run_type, event.version, name);
            let dest = staging.path_for(name);
            staging.register(&dest);
            self.source.download(source_bucket, &key, &dest).await?;
            staged.insert(name.clone(), dest);
        }

        let downloads = group_files(&event.file_list)?;

        info!(bucket = %event.destination_bucket, "Uploading granules to archive");
        let mut report = PipelineReport {
            staged: staged.len(),
            ..PipelineReport::default()
        };

        for (key, granule) in &downloads {
            let (Some(priors), Some(results)) = (&granule.priors, &granule.results) else {
                warn!(granule = %key, "Granule missing a role, skipping upload");
                report.skipped_incomplete.push(key.clone());
                continue;
            };

            let priors_path = staged_path(&staged, &priors.file_name)?;
            let runtime = self.attrs.runtime_token(priors_path, FileRole::Priors)?;

            for (entry, role) in [(priors, FileRole::Priors), (results, FileRole::Results)] {
                let renamed = archive_name(
                    &entry.file_name,
                    role,
                    run_type,
                    &event.version,
                    &runtime,
                );
                let local = staged_path(&staged, &entry.file_name)?;
                self.archive
                    .upload(
                        &event.destination_bucket,
                        &self.config.archive_key(&renamed),
                        local,
                    )
                    .await?;
                report.uploaded.push(renamed);
            }
        }

        if event.publish {
            // Granules keyed by the uploaded names; checksums still come
            // from the staged copies, which are byte-identical to the
            // uploaded objects.
            let mut granules = group_files(&report.uploaded)?;
            enrich_granules(&mut granules, &staged).await?;
            report.published = self
                .publish_granules(
                    &granules,
                    &event.destination_bucket,
                    data_version,
                    &mut report.skipped_incomplete,
                )
                .await?;
        }

        Ok(report)
    }

    /// Re-stage already-uploaded files to compute checksums, then notify
    async fn publish_only(
        &self,
        event: &UploadEvent,
        staging: &mut StagingArea,
    ) -> Result<PipelineReport> {
        let data_version = event.data_version()?;

        info!(bucket = %event.destination_bucket, files = event.file_list.len(), "Staging archive files for checksum");
        let mut staged = HashMap::new();
        for name in &event.file_list {
            let key = self.config.archive_key(name);
            let dest = staging.path_for(name);
            staging.register(&dest);
            self.archive
                .download(&event.destination_bucket, &key, &dest)
                .await?;
            staged.insert(name.clone(), dest);
        }

        let mut granules = group_files(&event.file_list)?;
        enrich_granules(&mut granules, &staged).await?;

        let mut report = PipelineReport {
            staged: staged.len(),
            ..PipelineReport::default()
        };
        report.published = self
            .publish_granules(
                &granules,
                &event.destination_bucket,
                data_version,
                &mut report.skipped_incomplete,
            )
            .await?;

        Ok(report)
    }

    /// Publish one notification per complete granule
    async fn publish_granules(
        &self,
        granules: &BTreeMap<String, Granule>,
        bucket: &str,
        data_version: i64,
        skipped: &mut Vec<String>,
    ) -> Result<Vec<String>> {
        let mut published = Vec::new();

        for (key, granule) in granules {
            let Some(complete) = granule.complete() else {
                warn!(granule = %key, "Granule incomplete, not publishing");
                skipped.push(key.clone());
                continue;
            };

            let message =
                build_message(&self.config, bucket, data_version, &complete, Utc::now());
            self.notifier.publish(&message).await?;
            published.push(complete.identifier().to_string());
        }

        Ok(published)
    }
}

/// Destination name: `{stem}_{run_type}_{version}_{runtime}_{role}.nc`
fn archive_name(
    file_name: &str,
    role: FileRole,
    run_type: &str,
    version: &str,
    runtime: &str,
) -> String {
    let suffix = format!("_{}.nc", role.as_str());
    let stem = file_name.split(suffix.as_str()).next().unwrap_or(file_name);
    format!("{stem}_{run_type}_{version}_{runtime}_{}.nc", role.as_str())
}

fn staged_path<'a>(staged: &'a HashMap<String, PathBuf>, name: &str) -> Result<&'a PathBuf> {
    staged
        .get(name)
        .ok_or_else(|| SosError::config(format!("no staged copy for '{name}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::CnmMessage;
    use async_trait::async_trait;
    use sos_common::checksum::compute_md5;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const RUNTIME_TOKEN: &str = "20240115T103000";

    /// In-memory object store writing real local files on download
    #[derive(Default)]
    struct StubStore {
        objects: Mutex<HashMap<(String, String), Vec<u8>>>,
        uploads: Mutex<Vec<(String, String)>>,
        fail_downloads: bool,
        fail_uploads: bool,
        skip_writes: bool,
        download_delay: Option<Duration>,
    }

    impl StubStore {
        fn with_object(self, bucket: &str, key: &str, data: &[u8]) -> Self {
            self.objects
                .lock()
                .unwrap()
                .insert((bucket.to_string(), key.to_string()), data.to_vec());
            self
        }

        fn uploaded_keys(&self) -> Vec<String> {
            self.uploads.lock().unwrap().iter().map(|(_, k)| k.clone()).collect()
        }
    }

    #[async_trait]
    impl ObjectStore for StubStore {
        async fn download(&self, bucket: &str, key: &str, dest: &Path) -> Result<()> {
            if let Some(delay) = self.download_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_downloads {
                return Err(SosError::transfer(bucket, key, "injected download failure"));
            }
            let data = self
                .objects
                .lock()
                .unwrap()
                .get(&(bucket.to_string(), key.to_string()))
                .cloned()
                .ok_or_else(|| SosError::transfer(bucket, key, "no such object"))?;
            if !self.skip_writes {
                std::fs::write(dest, data)?;
            }
            Ok(())
        }

        async fn upload(&self, bucket: &str, key: &str, _src: &Path) -> Result<()> {
            if self.fail_uploads {
                return Err(SosError::transfer(bucket, key, "injected upload failure"));
            }
            self.uploads
                .lock()
                .unwrap()
                .push((bucket.to_string(), key.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct StubNotifier {
        published: Mutex<Vec<CnmMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for StubNotifier {
        async fn publish(&self, message: &CnmMessage) -> Result<()> {
            if self.fail {
                return Err(SosError::publish("injected publish failure"));
            }
            self.published.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    struct StubAttrs;

    impl RuntimeAttributeReader for StubAttrs {
        fn runtime_token(&self, _path: &Path, _role: FileRole) -> Result<String> {
            Ok(RUNTIME_TOKEN.to_string())
        }
    }

    fn test_config(scratch: &TempDir) -> PipelineConfig {
        PipelineConfig {
            scratch_dir: scratch.path().to_path_buf(),
            deadline_secs: 30,
            ..PipelineConfig::default()
        }
    }

    fn transfer_event(publish: bool, files: &[&str]) -> UploadEvent {
        UploadEvent::from_json(&format!(
            r#"{{
                "sos_bucket": "confluence-sos",
                "podaac_bucket": "podaac-archive",
                "run_type": "constrained",
                "version": "4",
                "file_list": {},
                "publish": {}
            }}"#,
            serde_json::to_string(files).unwrap(),
            publish
        ))
        .unwrap()
    }

    fn source_store_with(files: &[(&str, &[u8])]) -> StubStore {
        let mut store = StubStore::default();
        for (name, data) in files {
            store = store.with_object(
                "confluence-sos",
                &format!("constrained/4/{name}"),
                data,
            );
        }
        store
    }

    fn scratch_is_empty(dir: &TempDir) -> bool {
        std::fs::read_dir(dir.path()).unwrap().next().is_none()
    }

    fn pipeline(
        config: PipelineConfig,
        source: StubStore,
        archive: StubStore,
        notifier: StubNotifier,
    ) -> (Pipeline, Arc<StubStore>, Arc<StubNotifier>) {
        let archive = Arc::new(archive);
        let notifier = Arc::new(notifier);
        let pipeline = Pipeline::new(
            config,
            Arc::new(source),
            archive.clone(),
            notifier.clone(),
            Arc::new(StubAttrs),
        );
        (pipeline, archive, notifier)
    }

    #[tokio::test]
    async fn test_transfer_and_publish_happy_path() {
        let scratch = TempDir::new().unwrap();
        let source = source_store_with(&[
            ("AF_priors.nc", b"priors bytes"),
            ("AF_results.nc", b"results bytes!"),
        ]);
        let (pipeline, archive, notifier) = pipeline(
            test_config(&scratch),
            source,
            StubStore::default(),
            StubNotifier::default(),
        );

        let event = transfer_event(true, &["AF_priors.nc", "AF_results.nc"]);
        let report = pipeline.run(&event).await.unwrap();

        assert_eq!(report.staged, 2);
        assert_eq!(
            report.uploaded,
            vec![
                format!("AF_constrained_4_{RUNTIME_TOKEN}_priors.nc"),
                format!("AF_constrained_4_{RUNTIME_TOKEN}_results.nc"),
            ]
        );
        assert_eq!(
            archive.uploaded_keys(),
            vec![
                format!("SWOT_L4_DAWG_SOS_DISCHARGE/AF_constrained_4_{RUNTIME_TOKEN}_priors.nc"),
                format!("SWOT_L4_DAWG_SOS_DISCHARGE/AF_constrained_4_{RUNTIME_TOKEN}_results.nc"),
            ]
        );
        assert_eq!(
            report.published,
            vec![format!("AF_constrained_4_{RUNTIME_TOKEN}")]
        );

        let published = notifier.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        let message = &published[0];
        assert_eq!(message.product.files.len(), 2);
        assert_eq!(message.product.data_version, "4");
        // Checksums cover the staged bytes, results descriptor first
        assert_eq!(
            message.product.files[0].checksum,
            compute_md5(b"results bytes!")
        );
        assert_eq!(
            message.product.files[1].checksum,
            compute_md5(b"priors bytes")
        );
        drop(published);

        assert!(scratch_is_empty(&scratch));
    }

    #[tokio::test]
    async fn test_incomplete_granule_is_never_published() {
        let scratch = TempDir::new().unwrap();
        let source = source_store_with(&[("AF_priors.nc", b"priors bytes")]);
        let (pipeline, archive, notifier) = pipeline(
            test_config(&scratch),
            source,
            StubStore::default(),
            StubNotifier::default(),
        );

        let event = transfer_event(true, &["AF_priors.nc"]);
        let report = pipeline.run(&event).await.unwrap();

        assert!(report.uploaded.is_empty());
        assert!(report.published.is_empty());
        assert_eq!(report.skipped_incomplete, vec!["AF".to_string()]);
        assert!(archive.uploaded_keys().is_empty());
        assert!(notifier.published.lock().unwrap().is_empty());
        assert!(scratch_is_empty(&scratch));
    }

    #[tokio::test]
    async fn test_publish_flag_gates_notification() {
        let scratch = TempDir::new().unwrap();
        let source = source_store_with(&[
            ("AF_priors.nc", b"priors bytes"),
            ("AF_results.nc", b"results bytes!"),
        ]);
        let (pipeline, archive, notifier) = pipeline(
            test_config(&scratch),
            source,
            StubStore::default(),
            StubNotifier::default(),
        );

        let event = transfer_event(false, &["AF_priors.nc", "AF_results.nc"]);
        let report = pipeline.run(&event).await.unwrap();

        assert_eq!(report.uploaded.len(), 2);
        assert_eq!(archive.uploaded_keys().len(), 2);
        assert!(report.published.is_empty());
        assert!(notifier.published.lock().unwrap().is_empty());
        assert!(scratch_is_empty(&scratch));
    }

    #[tokio::test]
    async fn test_publish_only_mode() {
        let scratch = TempDir::new().unwrap();
        let archive = StubStore::default()
            .with_object(
                "podaac-archive",
                "SWOT_L4_DAWG_SOS_DISCHARGE/AF_constrained_4_20240115T103000_priors.nc",
                b"uploaded priors",
            )
            .with_object(
                "podaac-archive",
                "SWOT_L4_DAWG_SOS_DISCHARGE/AF_constrained_4_20240115T103000_results.nc",
                b"uploaded results",
            );
        let (pipeline, _, notifier) = pipeline(
            test_config(&scratch),
            StubStore::default(),
            archive,
            StubNotifier::default(),
        );

        let event = UploadEvent::from_json(
            r#"{
                "podaac_bucket": "podaac-archive",
                "version": "4",
                "file_list": [
                    "AF_constrained_4_20240115T103000_priors.nc",
                    "AF_constrained_4_20240115T103000_results.nc"
                ],
                "publish_only": "true"
            }"#,
        )
        .unwrap();

        let report = pipeline.run(&event).await.unwrap();

        assert_eq!(report.staged, 2);
        assert!(report.uploaded.is_empty());
        assert_eq!(report.published, vec!["AF_constrained_4_20240115T103000"]);

        let published = notifier.published.lock().unwrap();
        assert_eq!(
            published[0].product.files[1].checksum,
            compute_md5(b"uploaded priors")
        );
        drop(published);

        assert!(scratch_is_empty(&scratch));
    }

    #[tokio::test]
    async fn test_staging_failure_cleans_up() {
        let scratch = TempDir::new().unwrap();
        let source = StubStore {
            fail_downloads: true,
            ..StubStore::default()
        };
        let (pipeline, _, notifier) = pipeline(
            test_config(&scratch),
            source,
            StubStore::default(),
            StubNotifier::default(),
        );

        let event = transfer_event(true, &["AF_priors.nc", "AF_results.nc"]);
        let result = pipeline.run(&event).await;

        assert!(matches!(result, Err(SosError::Transfer { .. })));
        assert!(notifier.published.lock().unwrap().is_empty());
        assert!(scratch_is_empty(&scratch));
    }

    #[tokio::test]
    async fn test_enrichment_failure_cleans_up() {
        let scratch = TempDir::new().unwrap();
        // Downloads "succeed" without producing a local file, so
        // enrichment hits a missing staged copy
        let mut source = source_store_with(&[
            ("AF_priors.nc", b"priors bytes"),
            ("AF_results.nc", b"results bytes!"),
        ]);
        source.skip_writes = true;
        let (pipeline, _, notifier) = pipeline(
            test_config(&scratch),
            source,
            StubStore::default(),
            StubNotifier::default(),
        );

        let event = transfer_event(true, &["AF_priors.nc", "AF_results.nc"]);
        let result = pipeline.run(&event).await;

        assert!(matches!(result, Err(SosError::Io(_))));
        assert!(notifier.published.lock().unwrap().is_empty());
        assert!(scratch_is_empty(&scratch));
    }

    #[tokio::test]
    async fn test_publish_failure_cleans_up() {
        let scratch = TempDir::new().unwrap();
        let source = source_store_with(&[
            ("AF_priors.nc", b"priors bytes"),
            ("AF_results.nc", b"results bytes!"),
        ]);
        let notifier = StubNotifier {
            fail: true,
            ..StubNotifier::default()
        };
        let (pipeline, _, _) = pipeline(
            test_config(&scratch),
            source,
            StubStore::default(),
            notifier,
        );

        let event = transfer_event(true, &["AF_priors.nc", "AF_results.nc"]);
        let result = pipeline.run(&event).await;

        assert!(matches!(result, Err(SosError::Publish(_))));
        assert!(scratch_is_empty(&scratch));
    }

    #[tokio::test]
    async fn test_duplicate_role_fails_before_upload() {
        let scratch = TempDir::new().unwrap();
        let source = source_store_with(&[
            ("AF_priors.nc", b"a"),
            ("AF_constrained_priors.nc", b"b"),
        ]);
        let (pipeline, archive, _) = pipeline(
            test_config(&scratch),
            source,
            StubStore::default(),
            StubNotifier::default(),
        );

        let event = transfer_event(true, &["AF_priors.nc", "AF_constrained_priors.nc"]);
        let result = pipeline.run(&event).await;

        assert!(matches!(result, Err(SosError::DuplicateRole { .. })));
        assert!(archive.uploaded_keys().is_empty());
        assert!(scratch_is_empty(&scratch));
    }

    #[tokio::test]
    async fn test_deadline_expiry_is_timeout_and_cleans_up() {
        let scratch = TempDir::new().unwrap();
        let mut source = source_store_with(&[("AF_priors.nc", b"priors bytes")]);
        source.download_delay = Some(Duration::from_secs(5));
        let config = PipelineConfig {
            deadline_secs: 0,
            ..test_config(&scratch)
        };
        let (pipeline, _, _) = pipeline(
            config,
            source,
            StubStore::default(),
            StubNotifier::default(),
        );

        let event = transfer_event(false, &["AF_priors.nc"]);
        let result = pipeline.run(&event).await;

        assert!(matches!(result, Err(SosError::Timeout(0))));
        assert!(scratch_is_empty(&scratch));
    }

    #[test]
    fn test_archive_name() {
        assert_eq!(
            archive_name("AF_priors.nc", FileRole::Priors, "constrained", "4", RUNTIME_TOKEN),
            format!("AF_constrained_4_{RUNTIME_TOKEN}_priors.nc")
        );
        assert_eq!(
            archive_name("NA_results.nc", FileRole::Results, "unconstrained", "7", RUNTIME_TOKEN),
            format!("NA_unconstrained_7_{RUNTIME_TOKEN}_results.nc")
        );
    }
}
