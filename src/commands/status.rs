use std::path::PathBuf;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::import::{ImageStyle, OutputLayout, count_rows};
use crate::util::count_files;

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct DatabaseStatus {
    pub article_nodes: i64,
    pub managed_images: i64,
    pub image_field_rows: i64,
    pub file_usage_rows: i64,
}

pub fn run(args: StatusArgs) -> Result<()> {
    info!(
        db_path = %args.db_path.display(),
        files_root = %args.files_root.display(),
        "status requested"
    );

    if args.db_path.exists() {
        let connection =
            Connection::open_with_flags(&args.db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
                .with_context(|| format!("failed to open {}", args.db_path.display()))?;
        let status = database_status(&connection)?;

        info!(
            path = %args.db_path.display(),
            article_nodes = status.article_nodes,
            managed_images = status.managed_images,
            image_field_rows = status.image_field_rows,
            file_usage_rows = status.file_usage_rows,
            "database status"
        );
    } else {
        warn!(path = %args.db_path.display(), "database file missing");
    }

    let layout = OutputLayout::new(&args.files_root);
    for (label, dir, files) in directory_counts(&layout)? {
        match files {
            Some(files) => {
                info!(directory = label, path = %dir.display(), files, "output directory")
            }
            None => warn!(directory = label, path = %dir.display(), "output directory missing"),
        }
    }

    Ok(())
}

pub(crate) fn database_status(connection: &Connection) -> Result<DatabaseStatus> {
    Ok(DatabaseStatus {
        article_nodes: count_rows(
            connection,
            "SELECT COUNT(*) FROM node WHERE type = 'article'",
        )?,
        managed_images: count_rows(
            connection,
            "SELECT COUNT(*) FROM file_managed WHERE uri LIKE 'public://field/image/%'",
        )?,
        image_field_rows: count_rows(
            connection,
            "SELECT COUNT(*) FROM field_data_field_image",
        )?,
        file_usage_rows: count_rows(
            connection,
            "SELECT COUNT(*) FROM file_usage WHERE module = 'file' AND type = 'node'",
        )?,
    })
}

/// File count per output directory, `None` where the directory does not exist.
pub(crate) fn directory_counts(
    layout: &OutputLayout,
) -> Result<Vec<(&'static str, PathBuf, Option<usize>)>> {
    directory_labels(layout)
        .into_iter()
        .map(|(label, dir)| {
            let files = if dir.is_dir() {
                Some(count_files(&dir)?)
            } else {
                None
            };
            Ok((label, dir, files))
        })
        .collect()
}

fn directory_labels(layout: &OutputLayout) -> Vec<(&'static str, PathBuf)> {
    let mut labels: Vec<(&'static str, PathBuf)> = ImageStyle::ALL
        .iter()
        .map(|style| (style.as_str(), layout.style_dir(*style)))
        .collect();
    labels.push(("field_image", layout.field_image_dir()));
    labels.push(("pictures", layout.pictures_dir()));
    labels
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rusqlite::Connection;
    use tempfile::TempDir;

    use super::{DatabaseStatus, database_status, directory_counts};
    use crate::commands::import::OutputLayout;
    use crate::test_support::{insert_article, seed_schema};

    #[test]
    fn database_status_counts_only_field_images() {
        let connection = Connection::open_in_memory().expect("in-memory DB should open");
        seed_schema(&connection);
        insert_article(&connection, 1, Some("<p></p>"));
        insert_article(&connection, 2, Some("<p></p>"));
        connection
            .execute_batch(
                "
                INSERT INTO node(nid, vid, type, language, changed)
                VALUES(90, 90, 'page', 'und', 0);
                INSERT INTO file_managed(uid, filename, uri, filemime, filesize, status, timestamp)
                VALUES(1, 'a.png', 'public://field/image/a.png', 'image/png', 10, 1, 0);
                INSERT INTO file_managed(uid, filename, uri, filemime, filesize, status, timestamp)
                VALUES(1, 'doc.pdf', 'public://docs/doc.pdf', 'application/pdf', 10, 1, 0);
                INSERT INTO file_usage(fid, module, type, id, count)
                VALUES(1, 'file', 'node', 1, 1);
                ",
            )
            .expect("fixture rows should insert");

        let status = database_status(&connection).expect("status should load");
        assert_eq!(
            status,
            DatabaseStatus {
                article_nodes: 2,
                managed_images: 1,
                image_field_rows: 0,
                file_usage_rows: 1,
            }
        );
    }

    #[test]
    fn directory_counts_report_regular_files_per_output_directory() {
        let temp = TempDir::new().expect("temp dir should exist");
        let layout = OutputLayout::new(temp.path().join("files"));
        layout.ensure_dirs().expect("output dirs should be created");

        let pictures = layout.pictures_dir();
        fs::write(pictures.join("node_1_image_0.png"), b"a").expect("picture should write");
        fs::write(pictures.join("node_1_image_1.gif"), b"b").expect("picture should write");
        fs::create_dir(pictures.join("nested")).expect("nested dir should be created");
        fs::write(pictures.join("nested").join("ignored.png"), b"c")
            .expect("nested file should write");
        fs::write(layout.field_image_dir().join("node_1.png"), b"d")
            .expect("canonical file should write");

        let counts: Vec<(&str, Option<usize>)> = directory_counts(&layout)
            .expect("directories should be counted")
            .into_iter()
            .map(|(label, _, files)| (label, files))
            .collect();

        assert_eq!(
            counts,
            vec![
                ("large", Some(0)),
                ("medium", Some(0)),
                ("thumbnail", Some(0)),
                ("field_image", Some(1)),
                ("pictures", Some(2)),
            ]
        );
    }

    #[test]
    fn directory_counts_mark_missing_directories() {
        let temp = TempDir::new().expect("temp dir should exist");
        let layout = OutputLayout::new(temp.path().join("absent"));

        let counts = directory_counts(&layout).expect("missing dirs are not an error");

        assert_eq!(counts.len(), 5);
        assert!(counts.iter().all(|(_, _, files)| files.is_none()));
    }
}
