use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::fs;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::validation::validate_file_name;

/// One of the four datasets pushed by the stats pusher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotKind {
    TopBlocked,
    TopBlocked24,
    BlockStats,
    TotalUsers,
}

impl SnapshotKind {
    pub const ALL: [SnapshotKind; 4] = [
        SnapshotKind::TopBlocked,
        SnapshotKind::TopBlocked24,
        SnapshotKind::BlockStats,
        SnapshotKind::TotalUsers,
    ];

    /// Last path segment of the push route.
    pub fn route_segment(self) -> &'static str {
        match self {
            SnapshotKind::TopBlocked => "top-blocked",
            SnapshotKind::TopBlocked24 => "top-24-blocked",
            SnapshotKind::BlockStats => "block-stats",
            SnapshotKind::TotalUsers => "total-users",
        }
    }

    /// Full push route.
    pub fn push_path(self) -> String {
        format!(
            "/api/v1/base/reporting/stats-cache/{}",
            self.route_segment()
        )
    }

    /// File holding the pushed JSON.
    pub fn data_file(self) -> &'static str {
        match self {
            SnapshotKind::TopBlocked => "blocked_data.json",
            SnapshotKind::TopBlocked24 => "blocked24_data.json",
            SnapshotKind::BlockStats => "stats_data.json",
            SnapshotKind::TotalUsers => "total_users_data.json",
        }
    }

    /// Companion file holding the push time.
    pub fn timestamp_file(self) -> &'static str {
        match self {
            SnapshotKind::TopBlocked => "blocked_data_ts.json",
            SnapshotKind::TopBlocked24 => "blocked24_data_ts.json",
            SnapshotKind::BlockStats => "stats_data_ts.json",
            SnapshotKind::TotalUsers => "total_users_data_ts.json",
        }
    }

    /// Name accepted by the timestamp route.
    ///
    /// Total users is the odd one out: its lookup name has no `.json` suffix.
    /// Deployed dashboards request exactly these names.
    pub fn status_name(self) -> &'static str {
        match self {
            SnapshotKind::TotalUsers => "total_users_data",
            other => other.data_file(),
        }
    }

    /// Reverse of [`SnapshotKind::status_name`].
    pub fn from_status_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.status_name() == name)
    }
}

/// Snapshot files in the static directory.
///
/// Pushes overwrite the data file and then the timestamp file. By default
/// the files are truncated and rewritten in place, so a concurrent reader can
/// observe a partially written file; with `atomic` set each file is written
/// to a sibling temp file and renamed over the target.
#[derive(Clone)]
pub struct SnapshotStore {
    dir: Arc<PathBuf>,
    atomic: bool,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>, atomic: bool) -> Self {
        Self {
            dir: Arc::new(dir.into()),
            atomic,
        }
    }

    pub fn data_path(&self, kind: SnapshotKind) -> PathBuf {
        self.dir.join(kind.data_file())
    }

    pub fn timestamp_path(&self, kind: SnapshotKind) -> PathBuf {
        self.dir.join(kind.timestamp_file())
    }

    /// Store a pushed snapshot.
    ///
    /// The body must be valid JSON; it is written byte for byte so a later
    /// read returns exactly what was pushed. Returns the recorded timestamp
    /// (fractional Unix seconds).
    ///
    /// # Errors
    ///
    /// - `AppError::SerializationError` if the body is not JSON (nothing is written)
    /// - `AppError::Io` if either file cannot be written
    #[instrument(skip(self, body), fields(snapshot = kind.route_segment(), bytes = body.len()))]
    pub async fn push(&self, kind: SnapshotKind, body: &[u8]) -> AppResult<f64> {
        serde_json::from_slice::<serde_json::Value>(body)?;

        let timestamp = Utc::now().timestamp_micros() as f64 / 1_000_000.0;

        self.write_file(&self.data_path(kind), body).await?;
        let stamp = format_timestamp(timestamp);
        self.write_file(&self.timestamp_path(kind), stamp.as_bytes()).await?;

        info!(timestamp, "Snapshot stored");
        Ok(timestamp)
    }

    /// Path of a file served by the stats route.
    pub fn resolve_file(&self, name: &str) -> AppResult<PathBuf> {
        validate_file_name(name)?;
        Ok(self.dir.join(name))
    }

    /// Path of the timestamp file for a status lookup name.
    pub fn resolve_timestamp(&self, name: &str) -> AppResult<PathBuf> {
        SnapshotKind::from_status_name(name)
            .map(|kind| self.timestamp_path(kind))
            .ok_or_else(|| AppError::NotFound(format!("no snapshot named {name:?}")))
    }

    async fn write_file(&self, path: &Path, contents: &[u8]) -> AppResult<()> {
        if !self.atomic {
            fs::write(path, contents).await?;
            return Ok(());
        }

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
        let tmp_path = path.with_file_name(tmp_name);

        if let Err(e) = fs::write(&tmp_path, contents).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp_path, path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        debug!(path = %path.display(), "Replaced file atomically");
        Ok(())
    }
}

/// Timestamp file contents: Unix seconds plus a newline.
///
/// Float `Debug` output always carries a decimal point, so whole seconds
/// read `1700000000.0` rather than `1700000000`.
fn format_timestamp(timestamp: f64) -> String {
    format!("{timestamp:?}\n")
}
