//! Upload fallback chain.
//!
//! # Strategies
//! ```text
//! 1. ObjectStorage  put(bucket, owner/ts_name) → public URL
//! 2. InlineRecord   data URI row in the photo table
//! 3. InlineProfile  data URI in the owner's profile photo_url
//! ```
//!
//! Strategies run strictly in order and stop at the first success. When
//! every strategy fails the caller sees the primary failure only.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::backend::{Query, Row, StorageApi, TableApi, PROFILES};
use crate::config::{UploadConfig, UploadPolicy};
use crate::error::{GuardError, GuardResult};
use crate::notice::{Notice, Notifier};
use crate::observability::metrics;
use crate::upload::policy::{self, UploadFile};

/// One way of persisting an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    ObjectStorage,
    InlineRecord,
    InlineProfile,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::ObjectStorage => "object_storage",
            Strategy::InlineRecord => "inline_record",
            Strategy::InlineProfile => "inline_profile",
        }
    }

    pub fn is_fallback(&self) -> bool {
        !matches!(self, Strategy::ObjectStorage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed,
}

/// Record of one strategy attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadAttempt {
    pub strategy: Strategy,
    pub outcome: AttemptOutcome,
    pub error: Option<String>,
}

/// Successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Public URL, or a `data:` URI for inline strategies.
    pub public_locator: String,
    pub strategy_used: Strategy,
    /// Object path within the bucket when object storage succeeded.
    pub path: Option<String>,
    pub attempts: Vec<UploadAttempt>,
}

/// Message carried by a failure, without the taxonomy prefix.
fn reason(error: &GuardError) -> String {
    match error {
        GuardError::StorageUnavailable(m)
        | GuardError::TransientBackend(m)
        | GuardError::AuthFailure(m)
        | GuardError::AuthorizationFailure(m) => m.clone(),
        GuardError::Backend { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

/// Persists user assets through the fallback chain.
pub struct UploadPipeline {
    storage: Arc<dyn StorageApi>,
    tables: Arc<dyn TableApi>,
    notifier: Arc<dyn Notifier>,
    config: UploadConfig,
}

impl UploadPipeline {
    pub fn new(
        storage: Arc<dyn StorageApi>,
        tables: Arc<dyn TableApi>,
        notifier: Arc<dyn Notifier>,
        config: UploadConfig,
    ) -> Self {
        Self {
            storage,
            tables,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Persist `file` for `owner` under `policy`.
    pub async fn persist(&self, owner: &str, file: UploadFile, policy: &UploadPolicy) -> GuardResult<UploadReceipt> {
        policy::require_owner(owner)?;
        policy::check(policy, &file)?;

        let timestamp = Utc::now().timestamp_millis();
        let path = policy::object_path(owner, &file.name, timestamp);
        let mut attempts = Vec::new();

        tracing::info!(owner, bucket = %policy.bucket, path = %path, size = file.size(), "Uploading asset");

        let primary = match self
            .storage
            .put(&policy.bucket, &path, file.bytes.clone(), &file.content_type)
            .await
        {
            Ok(stored) => {
                let locator = self.storage.public_url(&policy.bucket, &stored);
                attempts.push(UploadAttempt {
                    strategy: Strategy::ObjectStorage,
                    outcome: AttemptOutcome::Succeeded,
                    error: None,
                });
                return Ok(self.succeed(locator, Strategy::ObjectStorage, Some(stored), attempts));
            }
            Err(e @ GuardError::RateLimitExceeded { .. }) => return Err(e),
            Err(e) => e,
        };

        tracing::warn!(owner, error = %primary, "Object storage failed");
        attempts.push(UploadAttempt {
            strategy: Strategy::ObjectStorage,
            outcome: AttemptOutcome::Failed,
            error: Some(primary.to_string()),
        });

        if !policy.inline_fallback {
            return Err(self.fail(&primary));
        }

        let data_uri = policy::data_uri(&file.content_type, &file.bytes);

        match self.insert_inline_record(owner, &file, timestamp, &data_uri).await {
            Ok(()) => {
                attempts.push(UploadAttempt {
                    strategy: Strategy::InlineRecord,
                    outcome: AttemptOutcome::Succeeded,
                    error: None,
                });
                return Ok(self.succeed(data_uri, Strategy::InlineRecord, None, attempts));
            }
            Err(e) => {
                tracing::warn!(owner, table = %self.config.photo_table, error = %e, "Inline record fallback failed");
                attempts.push(UploadAttempt {
                    strategy: Strategy::InlineRecord,
                    outcome: AttemptOutcome::Failed,
                    error: Some(e.to_string()),
                });
            }
        }

        match self.write_profile_photo(owner, &data_uri).await {
            Ok(()) => {
                attempts.push(UploadAttempt {
                    strategy: Strategy::InlineProfile,
                    outcome: AttemptOutcome::Succeeded,
                    error: None,
                });
                Ok(self.succeed(data_uri, Strategy::InlineProfile, None, attempts))
            }
            Err(e) => {
                tracing::warn!(owner, error = %e, "Inline profile fallback failed");
                Err(self.fail(&primary))
            }
        }
    }

    /// Default policy for general uploads.
    pub async fn upload(&self, owner: &str, file: UploadFile) -> GuardResult<UploadReceipt> {
        let policy = self.config.general.clone();
        self.persist(owner, file, &policy).await
    }

    /// Upload a profile photo and point the owner's profile at it.
    pub async fn upload_avatar(&self, owner: &str, file: UploadFile) -> GuardResult<UploadReceipt> {
        let policy = self.config.avatar.clone();
        let receipt = self.persist(owner, file, &policy).await?;
        // The asset is already stored; a profile that cannot be pointed at it
        // does not undo the upload.
        if receipt.strategy_used != Strategy::InlineProfile {
            if let Err(e) = self.write_profile_photo(owner, &receipt.public_locator).await {
                tracing::warn!(owner, error = %e, "Avatar stored but profile not updated");
            }
        }
        Ok(receipt)
    }

    /// Upload evidence attached to a report.
    pub async fn upload_report_proof(&self, owner: &str, file: UploadFile) -> GuardResult<UploadReceipt> {
        let policy = self.config.proof.clone();
        self.persist(owner, file, &policy).await
    }

    async fn insert_inline_record(
        &self,
        owner: &str,
        file: &UploadFile,
        timestamp: i64,
        data_uri: &str,
    ) -> GuardResult<()> {
        let mut row = Row::new();
        row.insert("id".into(), Value::from(format!("{}_{}", owner, timestamp)));
        row.insert("user_id".into(), Value::from(owner));
        row.insert("file_name".into(), Value::from(file.name.as_str()));
        row.insert("file_type".into(), Value::from(file.content_type.as_str()));
        row.insert("file_size".into(), Value::from(file.size()));
        row.insert("base64_data".into(), Value::from(data_uri));
        row.insert("created_at".into(), Value::from(Utc::now().to_rfc3339()));

        self.tables.insert(&self.config.photo_table, row).await?;
        Ok(())
    }

    async fn write_profile_photo(&self, owner: &str, locator: &str) -> GuardResult<()> {
        let mut patch = Row::new();
        patch.insert("photo_url".into(), Value::from(locator));
        patch.insert("updated_at".into(), Value::from(Utc::now().to_rfc3339()));

        let updated = self.tables.update(PROFILES, &Query::by_id(owner), patch).await?;
        if updated.is_empty() {
            return Err(GuardError::Backend {
                status: 404,
                message: format!("no profile for owner {}", owner),
            });
        }
        Ok(())
    }

    fn succeed(
        &self,
        public_locator: String,
        strategy: Strategy,
        path: Option<String>,
        attempts: Vec<UploadAttempt>,
    ) -> UploadReceipt {
        metrics::record_upload(strategy.as_str());
        if strategy.is_fallback() {
            tracing::info!(strategy = strategy.as_str(), "Asset persisted via fallback");
        } else {
            tracing::info!(strategy = strategy.as_str(), "Asset persisted");
        }
        self.notifier.notify(Notice::success("File uploaded successfully"));
        UploadReceipt {
            public_locator,
            strategy_used: strategy,
            path,
            attempts,
        }
    }

    fn fail(&self, primary: &GuardError) -> GuardError {
        let err = GuardError::UploadFailed(reason(primary));
        metrics::record_upload_failure();
        tracing::error!(error = %err, "All upload strategies failed");
        self.notifier.notify(Notice::error(err.to_string()));
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::NoticeQueue;
    use crate::session::testing::StaticTables;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Bucket {
        fail: bool,
        puts: AtomicU32,
    }

    #[async_trait]
    impl StorageApi for Bucket {
        async fn put(&self, _bucket: &str, path: &str, _bytes: Vec<u8>, _content_type: &str) -> GuardResult<String> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(GuardError::StorageUnavailable("Bucket not found".into()));
            }
            Ok(path.to_string())
        }

        fn public_url(&self, bucket: &str, path: &str) -> String {
            format!("https://cdn.example.co/{}/{}", bucket, path)
        }
    }

    fn pipeline(fail: bool, tables: Arc<StaticTables>) -> (UploadPipeline, Arc<Bucket>, Arc<NoticeQueue>) {
        let bucket = Arc::new(Bucket {
            fail,
            puts: AtomicU32::new(0),
        });
        let notices = Arc::new(NoticeQueue::default());
        let pipeline = UploadPipeline::new(bucket.clone(), tables, notices.clone(), UploadConfig::default());
        (pipeline, bucket, notices)
    }

    fn png() -> UploadFile {
        UploadFile::new("me.png", "image/png", vec![137, 80, 78, 71])
    }

    #[tokio::test]
    async fn test_primary_success() {
        let (pipeline, bucket, _) = pipeline(false, Arc::new(StaticTables::default()));

        let receipt = pipeline.upload_report_proof("u1", png()).await.unwrap();
        assert_eq!(receipt.strategy_used, Strategy::ObjectStorage);
        assert!(receipt.public_locator.starts_with("https://cdn.example.co/proofs/u1/"));
        assert!(receipt.public_locator.ends_with("_me.png"));
        assert_eq!(receipt.attempts.len(), 1);
        assert_eq!(bucket.puts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_profile_fallback_when_photo_table_missing() {
        struct NoPhotoTable(StaticTables);

        #[async_trait]
        impl TableApi for NoPhotoTable {
            async fn select(&self, table: &str, query: &Query) -> GuardResult<Vec<Row>> {
                self.0.select(table, query).await
            }
            async fn insert(&self, _table: &str, _row: Row) -> GuardResult<Row> {
                Err(GuardError::Backend { status: 404, message: "relation does not exist".into() })
            }
            async fn update(&self, table: &str, query: &Query, patch: Row) -> GuardResult<Vec<Row>> {
                self.0.update(table, query, patch).await
            }
        }

        let tables = Arc::new(NoPhotoTable(StaticTables::with_profile("u1", "active")));
        let bucket = Arc::new(Bucket { fail: true, puts: AtomicU32::new(0) });
        let pipeline = UploadPipeline::new(
            bucket,
            tables,
            Arc::new(NoticeQueue::default()),
            UploadConfig::default(),
        );

        let receipt = pipeline.upload_avatar("u1", png()).await.unwrap();
        assert_eq!(receipt.strategy_used, Strategy::InlineProfile);
        assert!(receipt.public_locator.starts_with("data:image/png;base64,"));
        let outcomes: Vec<_> = receipt.attempts.iter().map(|a| (a.strategy, a.outcome)).collect();
        assert_eq!(
            outcomes,
            vec![
                (Strategy::ObjectStorage, AttemptOutcome::Failed),
                (Strategy::InlineRecord, AttemptOutcome::Failed),
                (Strategy::InlineProfile, AttemptOutcome::Succeeded),
            ]
        );
    }

    #[tokio::test]
    async fn test_exhaustion_surfaces_primary_message() {
        // No profile row, so the last fallback updates nothing.
        struct Broken;

        #[async_trait]
        impl TableApi for Broken {
            async fn select(&self, _: &str, _: &Query) -> GuardResult<Vec<Row>> {
                Ok(Vec::new())
            }
            async fn insert(&self, _: &str, _: Row) -> GuardResult<Row> {
                Err(GuardError::TransientBackend("insert timed out".into()))
            }
            async fn update(&self, _: &str, _: &Query, _: Row) -> GuardResult<Vec<Row>> {
                Ok(Vec::new())
            }
        }

        let bucket = Arc::new(Bucket { fail: true, puts: AtomicU32::new(0) });
        let notices = Arc::new(NoticeQueue::default());
        let pipeline = UploadPipeline::new(bucket, Arc::new(Broken), notices.clone(), UploadConfig::default());

        let err = pipeline.upload("u1", png()).await.unwrap_err();
        assert_eq!(err.to_string(), "Upload failed: Bucket not found");
        assert_eq!(notices.notices(), vec![Notice::error("Upload failed: Bucket not found")]);
    }

    #[tokio::test]
    async fn test_fallback_disabled_by_policy() {
        let tables = Arc::new(StaticTables::default());
        let (pipeline, _, _) = pipeline(true, tables.clone());
        let mut policy = UploadPolicy::general();
        policy.inline_fallback = false;

        let err = pipeline.persist("u1", png(), &policy).await.unwrap_err();
        assert!(matches!(err, GuardError::UploadFailed(ref m) if m == "Bucket not found"));
        assert!(tables.select("user_photos", &Query::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_avatar_points_profile_at_stored_object() {
        let tables = Arc::new(StaticTables::with_profile("u1", "active"));
        let (pipeline, _, _) = pipeline(false, tables.clone());

        let receipt = pipeline.upload_avatar("u1", png()).await.unwrap();
        let profile = tables.select(PROFILES, &Query::by_id("u1")).await.unwrap();
        assert_eq!(profile[0]["photo_url"], Value::from(receipt.public_locator));
    }
}
