use std::ops::Deref;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use rusqlite::{
    Connection, DropBehavior, OpenFlags, OptionalExtension, Transaction, TransactionBehavior,
    params,
};
use tracing::{info, warn};

const ARTICLE_BUNDLE: &str = "article";
const FILE_OWNER_UID: i64 = 1;
const FILE_STATUS_PERMANENT: i64 = 1;

/// Tables the import writes to, kept under one exclusive lock for the whole run.
pub(crate) const LOCKED_TABLES: [&str; 8] = [
    "file_managed",
    "file_usage",
    "field_data_body",
    "field_revision_body",
    "field_data_field_image",
    "field_revision_field_image",
    "node_revision",
    "node",
];

const IMAGE_FIELD_TABLES: [&str; 2] = ["field_data_field_image", "field_revision_field_image"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ArticleNode {
    pub nid: i64,
    pub vid: i64,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BodyField {
    pub revision_id: i64,
    pub bundle: String,
    pub body_value: String,
    pub body_summary: Option<String>,
    pub body_format: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct NewManagedFile<'a> {
    pub filename: &'a str,
    pub uri: &'a str,
    pub filemime: &'a str,
    pub filesize: u64,
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
pub(crate) struct ImageFieldEntry<'a> {
    pub nid: i64,
    pub language: &'a str,
    pub fid: i64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodeRevision {
    pub vid: i64,
    pub timestamp: i64,
}

pub(crate) fn open_connection(db_path: &Path, busy_timeout: Duration) -> Result<Connection> {
    let connection = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_WRITE)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection, busy_timeout)?;
    Ok(connection)
}

pub(crate) fn configure_connection(connection: &Connection, busy_timeout: Duration) -> Result<()> {
    connection
        .busy_timeout(busy_timeout)
        .context("failed to set busy timeout")?;
    Ok(())
}

/// Exclusive write transaction spanning the whole import.
///
/// Dropping the guard without [`MigrationLock::commit`] rolls every write back, so
/// the lock is released on every exit path, panics included.
pub(crate) struct MigrationLock<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> MigrationLock<'conn> {
    pub(crate) fn acquire(connection: &'conn mut Connection) -> Result<Self> {
        info!(tables = %LOCKED_TABLES.join(", "), "locking tables");
        let mut tx = connection
            .transaction_with_behavior(TransactionBehavior::Exclusive)
            .context("failed to acquire exclusive write lock")?;
        tx.set_drop_behavior(DropBehavior::Rollback);
        Ok(Self { tx })
    }

    pub(crate) fn commit(self) -> Result<()> {
        self.tx.commit().context("failed to commit import transaction")?;
        info!("committed changes and released table locks");
        Ok(())
    }

    pub(crate) fn rollback(self) -> Result<()> {
        warn!("rolling back import transaction");
        self.tx
            .rollback()
            .context("failed to roll back import transaction")
    }
}

impl Deref for MigrationLock<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.tx
    }
}

pub(crate) fn load_article_nodes(connection: &Connection) -> Result<Vec<ArticleNode>> {
    let mut statement = connection
        .prepare("SELECT nid, vid, language FROM node WHERE type = 'article'")
        .context("failed to prepare article node query")?;

    let rows = statement.query_map([], |row| {
        Ok(ArticleNode {
            nid: row.get(0)?,
            vid: row.get(1)?,
            language: row.get(2)?,
        })
    })?;

    let mut nodes = Vec::new();
    for row in rows {
        nodes.push(row.context("failed to read article node row")?);
    }
    Ok(nodes)
}

pub(crate) fn load_body_field(
    connection: &Connection,
    nid: i64,
    language: &str,
) -> Result<Option<BodyField>> {
    connection
        .query_row(
            "
            SELECT revision_id, bundle, body_value, body_summary, body_format
            FROM field_data_body
            WHERE entity_type = 'node' AND deleted = 0 AND entity_id = ?1
              AND delta = 0 AND language = ?2
            ",
            params![nid, language],
            |row| {
                Ok(BodyField {
                    revision_id: row.get(0)?,
                    bundle: row.get(1)?,
                    body_value: row.get(2)?,
                    body_summary: row.get(3)?,
                    body_format: row.get(4)?,
                })
            },
        )
        .optional()
        .with_context(|| format!("failed to load body for node {nid}"))
}

/// Inserts a `file_managed` row and returns the id the database assigned to it.
pub(crate) fn insert_managed_file(
    connection: &Connection,
    file: &NewManagedFile<'_>,
) -> Result<i64> {
    connection
        .execute(
            "
            INSERT INTO file_managed(
              fid, uid, filename, uri, filemime, filesize, status, timestamp
            )
            VALUES(NULL, ?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
            params![
                FILE_OWNER_UID,
                file.filename,
                file.uri,
                file.filemime,
                file.filesize as i64,
                FILE_STATUS_PERMANENT,
                file.timestamp,
            ],
        )
        .with_context(|| format!("failed to insert managed file {}", file.filename))?;

    // Connection-scoped; must directly follow the insert.
    Ok(connection.last_insert_rowid())
}

pub(crate) fn insert_image_field(
    connection: &Connection,
    entry: &ImageFieldEntry<'_>,
) -> Result<()> {
    for table in IMAGE_FIELD_TABLES {
        let sql = format!(
            "
            INSERT INTO {table}(
              entity_type, bundle, deleted, entity_id, revision_id, language, delta,
              field_image_fid, field_image_alt, field_image_title,
              field_image_width, field_image_height
            )
            VALUES('node', ?1, 0, ?2, 0, ?3, 0, ?4, '', '', ?5, ?6)
            "
        );
        connection
            .execute(
                &sql,
                params![
                    ARTICLE_BUNDLE,
                    entry.nid,
                    entry.language,
                    entry.fid,
                    entry.width,
                    entry.height,
                ],
            )
            .with_context(|| format!("failed to insert {table} row for node {}", entry.nid))?;
    }
    Ok(())
}

pub(crate) fn insert_file_usage(connection: &Connection, fid: i64, nid: i64) -> Result<()> {
    connection
        .execute(
            "
            INSERT INTO file_usage(fid, module, type, id, count)
            VALUES(?1, 'file', 'node', ?2, 1)
            ",
            params![fid, nid],
        )
        .with_context(|| format!("failed to insert file usage for fid {fid}"))?;
    Ok(())
}

pub(crate) fn update_body_field(
    connection: &Connection,
    nid: i64,
    language: &str,
    body_value: &str,
    revision_id: i64,
) -> Result<()> {
    let updated = connection
        .execute(
            "
            UPDATE field_data_body SET body_value = ?1, revision_id = ?2
            WHERE entity_type = 'node' AND deleted = 0 AND entity_id = ?3
              AND delta = 0 AND language = ?4
            ",
            params![body_value, revision_id, nid, language],
        )
        .with_context(|| format!("failed to update body for node {nid}"))?;

    if updated == 0 {
        bail!("body row for node {nid} disappeared during import");
    }
    Ok(())
}

pub(crate) fn insert_body_revision(
    connection: &Connection,
    nid: i64,
    language: &str,
    body: &BodyField,
    body_value: &str,
    revision_id: i64,
) -> Result<()> {
    connection
        .execute(
            "
            INSERT INTO field_revision_body(
              entity_type, bundle, deleted, entity_id, revision_id, language, delta,
              body_value, body_summary, body_format
            )
            VALUES('node', ?1, 0, ?2, ?3, ?4, 0, ?5, ?6, ?7)
            ",
            params![
                body.bundle,
                nid,
                revision_id,
                language,
                body_value,
                body.body_summary,
                body.body_format,
            ],
        )
        .with_context(|| format!("failed to insert body revision for node {nid}"))?;
    Ok(())
}

/// Copies the node's current revision into a new one stamped `timestamp`.
pub(crate) fn insert_node_revision(
    connection: &Connection,
    nid: i64,
    current_vid: i64,
    timestamp: i64,
) -> Result<NodeRevision> {
    let inserted = connection
        .execute(
            "
            INSERT INTO node_revision(
              nid, vid, uid, title, log, timestamp, status, comment, promote, sticky
            )
            SELECT ?1, NULL, uid, title, log, ?2, status, comment, promote, sticky
            FROM node_revision WHERE vid = ?3
            ",
            params![nid, timestamp, current_vid],
        )
        .with_context(|| format!("failed to insert node revision for node {nid}"))?;

    if inserted == 0 {
        bail!("node {nid} points at missing revision {current_vid}");
    }

    let new_vid = connection.last_insert_rowid();
    connection
        .query_row(
            "SELECT vid, timestamp FROM node_revision WHERE vid = ?1",
            [new_vid],
            |row| {
                Ok(NodeRevision {
                    vid: row.get(0)?,
                    timestamp: row.get(1)?,
                })
            },
        )
        .with_context(|| format!("failed to read back revision {new_vid} for node {nid}"))
}

pub(crate) fn update_node_revision_pointer(
    connection: &Connection,
    nid: i64,
    revision: NodeRevision,
) -> Result<()> {
    connection
        .execute(
            "UPDATE node SET vid = ?1, changed = ?2 WHERE nid = ?3",
            params![revision.vid, revision.timestamp, nid],
        )
        .with_context(|| format!("failed to advance node {nid} to revision {}", revision.vid))?;
    Ok(())
}

pub(crate) fn count_rows(connection: &Connection, sql: &str) -> Result<i64> {
    let count = connection
        .query_row(sql, [], |row| row.get(0))
        .with_context(|| format!("failed to count rows: {sql}"))?;
    Ok(count)
}
