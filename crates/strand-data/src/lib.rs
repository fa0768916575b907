#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! Postgres persistence for torrent and download rows.
//!
//! The store is the single durable source of truth; the runner and the
//! gateway mutate rows exclusively through it. Queries are plain
//! parameterised SQL, mirroring the column set in
//! `migrations/0001_create_tables.sql`.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use strand_core::{
    Download, DownloadStore, FinishedAction, HostDownloadAction, RemoteStatus, Torrent,
};
use uuid::Uuid;

mod error;

pub use error::{DataError, DataResult};

const INSERT_TORRENT: &str = r"
    INSERT INTO strand_torrents (
        torrent_id, hash, name, category, remote_status, remote_status_raw,
        remote_id, added, files_selected, completed, retry, retry_count,
        torrent_retry_attempts, download_retry_attempts, lifetime,
        delete_on_error, error, finished_action, host_download_action
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
            $16, $17, $18, $19)
";

const SELECT_TORRENTS: &str = r"SELECT * FROM strand_torrents ORDER BY added";

const SELECT_TORRENT: &str = r"SELECT * FROM strand_torrents WHERE torrent_id = $1";

const SELECT_DOWNLOADS: &str = r"SELECT * FROM strand_downloads ORDER BY queued";

const SELECT_DOWNLOAD: &str = r"SELECT * FROM strand_downloads WHERE download_id = $1";

const UPDATE_REMOTE_STATE: &str = r"
    UPDATE strand_torrents
    SET remote_status = $2, remote_status_raw = $3, remote_id = COALESCE($4, remote_id)
    WHERE torrent_id = $1
";

const UPDATE_FILES_SELECTED: &str = r"
    UPDATE strand_torrents SET files_selected = $2 WHERE torrent_id = $1
";

const UPDATE_TORRENT_RETRY: &str = r"
    UPDATE strand_torrents SET retry = $2, retry_count = $3 WHERE torrent_id = $1
";

const UPDATE_TORRENT_ERROR: &str = r"
    UPDATE strand_torrents SET error = $2 WHERE torrent_id = $1
";

const SET_TORRENT_COMPLETE: &str = r"
    UPDATE strand_torrents SET error = $2, completed = $3 WHERE torrent_id = $1
";

const DELETE_TORRENT: &str = r"DELETE FROM strand_torrents WHERE torrent_id = $1";

const RESET_TORRENT_FOR_RETRY: &str = r"
    UPDATE strand_torrents
    SET remote_status = $2, remote_status_raw = $3, remote_id = $4,
        files_selected = NULL, completed = NULL, error = NULL, retry = NULL,
        retry_count = $5
    WHERE torrent_id = $1
";

const CLEAR_DOWNLOADS: &str = r"DELETE FROM strand_downloads WHERE torrent_id = $1";

const INSERT_DOWNLOAD: &str = r"
    INSERT INTO strand_downloads (
        download_id, torrent_id, path, restricted_link, link, remote_id,
        queued, started, finished, unpacking_queued, unpacking_started,
        unpacking_finished, completed, error, retry_count, bytes_total,
        bytes_done
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
            $16, $17)
";

const UPDATE_DOWNLOAD_LINK: &str = r"
    UPDATE strand_downloads SET link = $2 WHERE download_id = $1
";

const UPDATE_DOWNLOAD_STARTED: &str = r"
    UPDATE strand_downloads SET started = $2 WHERE download_id = $1
";

const FINISH_DOWNLOAD_STAGE: &str = r"
    UPDATE strand_downloads SET finished = $2, unpacking_queued = $2 WHERE download_id = $1
";

const UPDATE_UNPACKING_STARTED: &str = r"
    UPDATE strand_downloads SET unpacking_started = $2 WHERE download_id = $1
";

const UPDATE_UNPACKING_FINISHED: &str = r"
    UPDATE strand_downloads SET unpacking_finished = $2 WHERE download_id = $1
";

const SKIP_UNPACKING: &str = r"
    UPDATE strand_downloads
    SET unpacking_started = $2, unpacking_finished = $2, completed = $2
    WHERE download_id = $1
";

const UPDATE_DOWNLOAD_ERROR: &str = r"
    UPDATE strand_downloads SET error = $2 WHERE download_id = $1
";

const UPDATE_DOWNLOAD_COMPLETED: &str = r"
    UPDATE strand_downloads SET completed = $2 WHERE download_id = $1
";

const UPDATE_DOWNLOAD_RETRY_COUNT: &str = r"
    UPDATE strand_downloads SET retry_count = $2 WHERE download_id = $1
";

const RESET_DOWNLOAD: &str = r"
    UPDATE strand_downloads
    SET link = NULL, remote_id = NULL, started = NULL, finished = NULL,
        unpacking_queued = NULL, unpacking_started = NULL,
        unpacking_finished = NULL, completed = NULL, error = NULL,
        bytes_done = 0
    WHERE download_id = $1
";

const UPDATE_DOWNLOAD_REMOTE_ID: &str = r"
    UPDATE strand_downloads SET remote_id = $2 WHERE download_id = $1
";

const REWIND_INTERRUPTED_DOWNLOADS: &str = r"
    UPDATE strand_downloads AS d
    SET started = NULL
    FROM strand_torrents AS t
    WHERE d.torrent_id = t.torrent_id
      AND t.completed IS NULL
      AND d.started IS NOT NULL
      AND d.finished IS NULL
      AND d.error IS NULL
";

const REWIND_INTERRUPTED_UNPACKS: &str = r"
    UPDATE strand_downloads AS d
    SET unpacking_started = NULL
    FROM strand_torrents AS t
    WHERE d.torrent_id = t.torrent_id
      AND t.completed IS NULL
      AND d.unpacking_queued IS NOT NULL
      AND d.unpacking_started IS NOT NULL
      AND d.unpacking_finished IS NULL
      AND d.error IS NULL
";

/// Database-backed repository for torrent and download rows.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Initialise the store, applying pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if migrations fail or the database is unreachable.
    pub async fn new(pool: PgPool) -> DataResult<Self> {
        let mut migrator = sqlx::migrate!("./migrations");
        migrator.set_ignore_missing(true);
        migrator
            .run(&pool)
            .await
            .map_err(|source| DataError::Migration { source })?;
        Ok(Self { pool })
    }

    /// Access the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a freshly submitted torrent row.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn insert_torrent(&self, torrent: &Torrent) -> DataResult<()> {
        sqlx::query(INSERT_TORRENT)
            .bind(torrent.id)
            .bind(&torrent.hash)
            .bind(&torrent.name)
            .bind(torrent.category.as_deref())
            .bind(torrent.remote_status.as_str())
            .bind(&torrent.remote_status_raw)
            .bind(torrent.remote_id.as_deref())
            .bind(torrent.added)
            .bind(torrent.files_selected)
            .bind(torrent.completed)
            .bind(torrent.retry)
            .bind(torrent.retry_count)
            .bind(torrent.torrent_retry_attempts)
            .bind(torrent.download_retry_attempts)
            .bind(torrent.lifetime)
            .bind(torrent.delete_on_error)
            .bind(torrent.error.as_deref())
            .bind(torrent.finished_action.as_str())
            .bind(torrent.host_download_action.as_str())
            .execute(&self.pool)
            .await
            .map_err(db("torrent.insert"))?;
        Ok(())
    }

    /// Load every torrent together with its child downloads, ordered by the
    /// torrents' submission time and the downloads' queue time.
    ///
    /// # Errors
    ///
    /// Returns an error if either query fails or a row cannot be decoded.
    pub async fn list_torrents(&self) -> DataResult<Vec<Torrent>> {
        let torrent_rows = sqlx::query(SELECT_TORRENTS)
            .fetch_all(&self.pool)
            .await
            .map_err(db("torrent.list"))?;
        let download_rows = sqlx::query(SELECT_DOWNLOADS)
            .fetch_all(&self.pool)
            .await
            .map_err(db("download.list"))?;

        let mut children: HashMap<Uuid, Vec<Download>> = HashMap::new();
        for row in download_rows {
            let download = decode_download(&row)?;
            children.entry(download.torrent_id).or_default().push(download);
        }

        let mut torrents = Vec::with_capacity(torrent_rows.len());
        for row in torrent_rows {
            let mut torrent = decode_torrent(&row)?;
            torrent.downloads = children.remove(&torrent.id).unwrap_or_default();
            torrents.push(torrent);
        }
        Ok(torrents)
    }

    /// Load a single torrent with its child downloads.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn get_torrent(&self, torrent_id: Uuid) -> DataResult<Option<Torrent>> {
        let Some(row) = sqlx::query(SELECT_TORRENT)
            .bind(torrent_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db("torrent.get"))?
        else {
            return Ok(None);
        };
        let mut torrent = decode_torrent(&row)?;

        let download_rows =
            sqlx::query(r"SELECT * FROM strand_downloads WHERE torrent_id = $1 ORDER BY queued")
                .bind(torrent_id)
                .fetch_all(&self.pool)
                .await
                .map_err(db("download.list_for_torrent"))?;
        torrent.downloads = download_rows
            .iter()
            .map(decode_download)
            .collect::<DataResult<Vec<_>>>()?;
        Ok(Some(torrent))
    }

    /// Refresh the provider-side status columns of a torrent.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn update_remote_state(
        &self,
        torrent_id: Uuid,
        status: RemoteStatus,
        raw: &str,
        remote_id: Option<&str>,
    ) -> DataResult<()> {
        sqlx::query(UPDATE_REMOTE_STATE)
            .bind(torrent_id)
            .bind(status.as_str())
            .bind(raw)
            .bind(remote_id)
            .execute(&self.pool)
            .await
            .map_err(db("torrent.update_remote_state"))?;
        Ok(())
    }

    /// Record when file selection was confirmed.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn update_files_selected(
        &self,
        torrent_id: Uuid,
        at: DateTime<Utc>,
    ) -> DataResult<()> {
        sqlx::query(UPDATE_FILES_SELECTED)
            .bind(torrent_id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(db("torrent.update_files_selected"))?;
        Ok(())
    }

    /// Overwrite the retry marker and counter of a torrent.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn update_torrent_retry(
        &self,
        torrent_id: Uuid,
        retry: Option<DateTime<Utc>>,
        retry_count: i32,
    ) -> DataResult<()> {
        sqlx::query(UPDATE_TORRENT_RETRY)
            .bind(torrent_id)
            .bind(retry)
            .bind(retry_count)
            .execute(&self.pool)
            .await
            .map_err(db("torrent.update_retry"))?;
        Ok(())
    }

    /// Record an error on a torrent without completing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn update_torrent_error(&self, torrent_id: Uuid, message: &str) -> DataResult<()> {
        sqlx::query(UPDATE_TORRENT_ERROR)
            .bind(torrent_id)
            .bind(message)
            .execute(&self.pool)
            .await
            .map_err(db("torrent.update_error"))?;
        Ok(())
    }

    /// Mark a torrent completed, optionally with a terminal error.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn set_torrent_complete(
        &self,
        torrent_id: Uuid,
        error: Option<&str>,
        at: DateTime<Utc>,
    ) -> DataResult<()> {
        sqlx::query(SET_TORRENT_COMPLETE)
            .bind(torrent_id)
            .bind(error)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(db("torrent.set_complete"))?;
        Ok(())
    }

    /// Delete a torrent row; child downloads cascade.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_torrent(&self, torrent_id: Uuid) -> DataResult<()> {
        sqlx::query(DELETE_TORRENT)
            .bind(torrent_id)
            .execute(&self.pool)
            .await
            .map_err(db("torrent.delete"))?;
        Ok(())
    }

    /// Rewind a torrent row for re-submission: fresh provider identity, no
    /// selection, no terminal state, and the bumped retry counter.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn reset_torrent_for_retry(
        &self,
        torrent_id: Uuid,
        retry_count: i32,
        remote_id: Option<&str>,
        raw_status: &str,
    ) -> DataResult<()> {
        sqlx::query(RESET_TORRENT_FOR_RETRY)
            .bind(torrent_id)
            .bind(RemoteStatus::from_raw(raw_status).as_str())
            .bind(raw_status)
            .bind(remote_id)
            .bind(retry_count)
            .execute(&self.pool)
            .await
            .map_err(db("torrent.reset_for_retry"))?;
        Ok(())
    }

    /// Delete every child download of a torrent.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn clear_downloads(&self, torrent_id: Uuid) -> DataResult<()> {
        sqlx::query(CLEAR_DOWNLOADS)
            .bind(torrent_id)
            .execute(&self.pool)
            .await
            .map_err(db("download.clear_for_torrent"))?;
        Ok(())
    }

    /// Insert the download rows produced by file expansion, in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails.
    pub async fn insert_downloads(&self, downloads: &[Download]) -> DataResult<()> {
        let mut tx = self.pool.begin().await.map_err(db("download.insert_begin"))?;
        for download in downloads {
            sqlx::query(INSERT_DOWNLOAD)
                .bind(download.id)
                .bind(download.torrent_id)
                .bind(&download.path)
                .bind(download.restricted_link.as_deref())
                .bind(download.link.as_deref())
                .bind(download.remote_id.as_deref())
                .bind(download.queued)
                .bind(download.started)
                .bind(download.finished)
                .bind(download.unpacking_queued)
                .bind(download.unpacking_started)
                .bind(download.unpacking_finished)
                .bind(download.completed)
                .bind(download.error.as_deref())
                .bind(download.retry_count)
                .bind(clamp_i64(download.bytes_total))
                .bind(clamp_i64(download.bytes_done))
                .execute(&mut *tx)
                .await
                .map_err(db("download.insert"))?;
        }
        tx.commit().await.map_err(db("download.insert_commit"))?;
        Ok(())
    }

    /// Persist the unrestricted link of a download.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn update_download_link(&self, download_id: Uuid, link: &str) -> DataResult<()> {
        sqlx::query(UPDATE_DOWNLOAD_LINK)
            .bind(download_id)
            .bind(link)
            .execute(&self.pool)
            .await
            .map_err(db("download.update_link"))?;
        Ok(())
    }

    async fn set_timestamp(
        &self,
        statement: &'static str,
        operation: &'static str,
        download_id: Uuid,
        at: Option<DateTime<Utc>>,
    ) -> DataResult<()> {
        sqlx::query(statement)
            .bind(download_id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(db(operation))?;
        Ok(())
    }
}

#[async_trait]
impl DownloadStore for PgStore {
    async fn get(&self, download_id: Uuid) -> anyhow::Result<Option<Download>> {
        let row = sqlx::query(SELECT_DOWNLOAD)
            .bind(download_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db("download.get"))?;
        Ok(row.as_ref().map(decode_download).transpose()?)
    }

    async fn update_download_started(
        &self,
        download_id: Uuid,
        at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()> {
        Ok(self
            .set_timestamp(UPDATE_DOWNLOAD_STARTED, "download.update_started", download_id, at)
            .await?)
    }

    async fn finish_download_stage(
        &self,
        download_id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        Ok(self
            .set_timestamp(
                FINISH_DOWNLOAD_STAGE,
                "download.finish_stage",
                download_id,
                Some(at),
            )
            .await?)
    }

    async fn update_unpacking_started(
        &self,
        download_id: Uuid,
        at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()> {
        Ok(self
            .set_timestamp(
                UPDATE_UNPACKING_STARTED,
                "download.update_unpacking_started",
                download_id,
                at,
            )
            .await?)
    }

    async fn update_unpacking_finished(
        &self,
        download_id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        Ok(self
            .set_timestamp(
                UPDATE_UNPACKING_FINISHED,
                "download.update_unpacking_finished",
                download_id,
                Some(at),
            )
            .await?)
    }

    async fn skip_unpacking(&self, download_id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
        Ok(self
            .set_timestamp(SKIP_UNPACKING, "download.skip_unpacking", download_id, Some(at))
            .await?)
    }

    async fn update_error(&self, download_id: Uuid, message: &str) -> anyhow::Result<()> {
        sqlx::query(UPDATE_DOWNLOAD_ERROR)
            .bind(download_id)
            .bind(message)
            .execute(&self.pool)
            .await
            .map_err(db("download.update_error"))?;
        Ok(())
    }

    async fn update_completed(&self, download_id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
        Ok(self
            .set_timestamp(
                UPDATE_DOWNLOAD_COMPLETED,
                "download.update_completed",
                download_id,
                Some(at),
            )
            .await?)
    }

    async fn update_retry_count(&self, download_id: Uuid, retry_count: i32) -> anyhow::Result<()> {
        sqlx::query(UPDATE_DOWNLOAD_RETRY_COUNT)
            .bind(download_id)
            .bind(retry_count)
            .execute(&self.pool)
            .await
            .map_err(db("download.update_retry_count"))?;
        Ok(())
    }

    async fn reset(&self, download_id: Uuid) -> anyhow::Result<()> {
        sqlx::query(RESET_DOWNLOAD)
            .bind(download_id)
            .execute(&self.pool)
            .await
            .map_err(db("download.reset"))?;
        Ok(())
    }

    async fn update_remote_id_batch(
        &self,
        updates: &HashMap<Uuid, String>,
    ) -> anyhow::Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db("download.remote_id_batch_begin"))?;
        for (download_id, remote_id) in updates {
            sqlx::query(UPDATE_DOWNLOAD_REMOTE_ID)
                .bind(download_id)
                .bind(remote_id)
                .execute(&mut *tx)
                .await
                .map_err(db("download.remote_id_batch"))?;
        }
        tx.commit()
            .await
            .map_err(db("download.remote_id_batch_commit"))?;
        Ok(())
    }

    async fn update_error_batch(&self, updates: &HashMap<Uuid, String>) -> anyhow::Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db("download.error_batch_begin"))?;
        for (download_id, message) in updates {
            sqlx::query(UPDATE_DOWNLOAD_ERROR)
                .bind(download_id)
                .bind(message)
                .execute(&mut *tx)
                .await
                .map_err(db("download.error_batch"))?;
        }
        tx.commit().await.map_err(db("download.error_batch_commit"))?;
        Ok(())
    }

    async fn rewind_interrupted_downloads(&self) -> anyhow::Result<u64> {
        let result = sqlx::query(REWIND_INTERRUPTED_DOWNLOADS)
            .execute(&self.pool)
            .await
            .map_err(db("download.rewind_interrupted"))?;
        Ok(result.rows_affected())
    }

    async fn rewind_interrupted_unpacks(&self) -> anyhow::Result<u64> {
        let result = sqlx::query(REWIND_INTERRUPTED_UNPACKS)
            .execute(&self.pool)
            .await
            .map_err(db("download.rewind_interrupted_unpacks"))?;
        Ok(result.rows_affected())
    }
}

fn db(operation: &'static str) -> impl FnOnce(sqlx::Error) -> DataError {
    move |source| DataError::database(operation, source)
}

fn decode_torrent(row: &PgRow) -> DataResult<Torrent> {
    let op = "torrent.decode";
    let remote_status_raw: String = row.try_get("remote_status_raw").map_err(db(op))?;
    let status_label: String = row.try_get("remote_status").map_err(db(op))?;
    let finished_label: String = row.try_get("finished_action").map_err(db(op))?;
    let host_label: String = row.try_get("host_download_action").map_err(db(op))?;

    Ok(Torrent {
        id: row.try_get("torrent_id").map_err(db(op))?,
        hash: row.try_get("hash").map_err(db(op))?,
        name: row.try_get("name").map_err(db(op))?,
        category: row.try_get("category").map_err(db(op))?,
        remote_status: remote_status_from_label(&status_label),
        remote_status_raw,
        remote_id: row.try_get("remote_id").map_err(db(op))?,
        added: row.try_get("added").map_err(db(op))?,
        files_selected: row.try_get("files_selected").map_err(db(op))?,
        completed: row.try_get("completed").map_err(db(op))?,
        retry: row.try_get("retry").map_err(db(op))?,
        retry_count: row.try_get("retry_count").map_err(db(op))?,
        torrent_retry_attempts: row.try_get("torrent_retry_attempts").map_err(db(op))?,
        download_retry_attempts: row.try_get("download_retry_attempts").map_err(db(op))?,
        lifetime: row.try_get("lifetime").map_err(db(op))?,
        delete_on_error: row.try_get("delete_on_error").map_err(db(op))?,
        error: row.try_get("error").map_err(db(op))?,
        finished_action: finished_action_from_label(&finished_label),
        host_download_action: host_action_from_label(&host_label),
        downloads: Vec::new(),
    })
}

fn decode_download(row: &PgRow) -> DataResult<Download> {
    let op = "download.decode";
    Ok(Download {
        id: row.try_get("download_id").map_err(db(op))?,
        torrent_id: row.try_get("torrent_id").map_err(db(op))?,
        path: row.try_get("path").map_err(db(op))?,
        restricted_link: row.try_get("restricted_link").map_err(db(op))?,
        link: row.try_get("link").map_err(db(op))?,
        remote_id: row.try_get("remote_id").map_err(db(op))?,
        queued: row.try_get("queued").map_err(db(op))?,
        started: row.try_get("started").map_err(db(op))?,
        finished: row.try_get("finished").map_err(db(op))?,
        unpacking_queued: row.try_get("unpacking_queued").map_err(db(op))?,
        unpacking_started: row.try_get("unpacking_started").map_err(db(op))?,
        unpacking_finished: row.try_get("unpacking_finished").map_err(db(op))?,
        completed: row.try_get("completed").map_err(db(op))?,
        error: row.try_get("error").map_err(db(op))?,
        retry_count: row.try_get("retry_count").map_err(db(op))?,
        bytes_total: clamp_u64(row.try_get::<i64, _>("bytes_total").map_err(db(op))?),
        bytes_done: clamp_u64(row.try_get::<i64, _>("bytes_done").map_err(db(op))?),
    })
}

fn remote_status_from_label(label: &str) -> RemoteStatus {
    match label {
        "queued" => RemoteStatus::Queued,
        "downloading" => RemoteStatus::Downloading,
        "waiting_for_file_selection" => RemoteStatus::WaitingForFileSelection,
        "finished" => RemoteStatus::Finished,
        "error" => RemoteStatus::Error,
        "unknown" => RemoteStatus::Unknown,
        other => {
            tracing::warn!(status = %other, "unknown remote status label in store");
            RemoteStatus::Unknown
        }
    }
}

fn finished_action_from_label(label: &str) -> FinishedAction {
    FinishedAction::from_str(label).unwrap_or_else(|_| {
        tracing::warn!(action = %label, "unknown finished action label in store");
        FinishedAction::None
    })
}

fn host_action_from_label(label: &str) -> HostDownloadAction {
    HostDownloadAction::from_str(label).unwrap_or_else(|_| {
        tracing::warn!(action = %label, "unknown host download action label in store");
        HostDownloadAction::DownloadAll
    })
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn clamp_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels_round_trip() {
        for status in [
            RemoteStatus::Queued,
            RemoteStatus::Downloading,
            RemoteStatus::WaitingForFileSelection,
            RemoteStatus::Finished,
            RemoteStatus::Error,
            RemoteStatus::Unknown,
        ] {
            assert_eq!(remote_status_from_label(status.as_str()), status);
        }
        assert_eq!(remote_status_from_label("garbled"), RemoteStatus::Unknown);
    }

    #[test]
    fn action_labels_round_trip_with_fallback() {
        for action in [
            FinishedAction::None,
            FinishedAction::RemoveAllTorrents,
            FinishedAction::RemoveProvider,
            FinishedAction::RemoveClient,
        ] {
            assert_eq!(finished_action_from_label(action.as_str()), action);
        }
        assert_eq!(finished_action_from_label("bogus"), FinishedAction::None);

        for action in [HostDownloadAction::DownloadAll, HostDownloadAction::DownloadNone] {
            assert_eq!(host_action_from_label(action.as_str()), action);
        }
        assert_eq!(
            host_action_from_label("bogus"),
            HostDownloadAction::DownloadAll
        );
    }

    #[test]
    fn clamps_handle_extremes() {
        assert_eq!(clamp_i64(42), 42);
        assert_eq!(clamp_i64(u64::MAX), i64::MAX);
        assert_eq!(clamp_u64(42), 42);
        assert_eq!(clamp_u64(-7), 0);
    }
}
