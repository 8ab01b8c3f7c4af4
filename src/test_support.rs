//! Minimal CMS schema for in-memory database tests.

use rusqlite::{Connection, params};

pub const FIXTURE_LANGUAGE: &str = "und";

pub fn seed_schema(connection: &Connection) {
    connection
        .execute_batch(
            "
            CREATE TABLE node (
              nid INTEGER PRIMARY KEY,
              vid INTEGER NOT NULL,
              type TEXT NOT NULL,
              language TEXT NOT NULL,
              title TEXT NOT NULL DEFAULT '',
              changed INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE node_revision (
              nid INTEGER NOT NULL,
              vid INTEGER PRIMARY KEY AUTOINCREMENT,
              uid INTEGER NOT NULL,
              title TEXT NOT NULL,
              log TEXT NOT NULL,
              timestamp INTEGER NOT NULL,
              status INTEGER NOT NULL,
              comment INTEGER NOT NULL,
              promote INTEGER NOT NULL,
              sticky INTEGER NOT NULL
            );

            CREATE TABLE field_data_body (
              entity_type TEXT NOT NULL,
              bundle TEXT NOT NULL,
              deleted INTEGER NOT NULL,
              entity_id INTEGER NOT NULL,
              revision_id INTEGER,
              language TEXT NOT NULL,
              delta INTEGER NOT NULL,
              body_value TEXT,
              body_summary TEXT,
              body_format TEXT
            );

            CREATE TABLE field_revision_body (
              entity_type TEXT NOT NULL,
              bundle TEXT NOT NULL,
              deleted INTEGER NOT NULL,
              entity_id INTEGER NOT NULL,
              revision_id INTEGER NOT NULL,
              language TEXT NOT NULL,
              delta INTEGER NOT NULL,
              body_value TEXT,
              body_summary TEXT,
              body_format TEXT
            );

            CREATE TABLE file_managed (
              fid INTEGER PRIMARY KEY AUTOINCREMENT,
              uid INTEGER NOT NULL,
              filename TEXT NOT NULL,
              uri TEXT NOT NULL,
              filemime TEXT NOT NULL,
              filesize INTEGER NOT NULL,
              status INTEGER NOT NULL,
              timestamp INTEGER NOT NULL
            );

            CREATE TABLE file_usage (
              fid INTEGER NOT NULL,
              module TEXT NOT NULL,
              type TEXT NOT NULL,
              id INTEGER NOT NULL,
              count INTEGER NOT NULL
            );

            CREATE TABLE field_data_field_image (
              entity_type TEXT NOT NULL,
              bundle TEXT NOT NULL,
              deleted INTEGER NOT NULL,
              entity_id INTEGER NOT NULL,
              revision_id INTEGER,
              language TEXT NOT NULL,
              delta INTEGER NOT NULL,
              field_image_fid INTEGER,
              field_image_alt TEXT,
              field_image_title TEXT,
              field_image_width INTEGER,
              field_image_height INTEGER
            );

            CREATE TABLE field_revision_field_image (
              entity_type TEXT NOT NULL,
              bundle TEXT NOT NULL,
              deleted INTEGER NOT NULL,
              entity_id INTEGER NOT NULL,
              revision_id INTEGER NOT NULL,
              language TEXT NOT NULL,
              delta INTEGER NOT NULL,
              field_image_fid INTEGER,
              field_image_alt TEXT,
              field_image_title TEXT,
              field_image_width INTEGER,
              field_image_height INTEGER
            );
            ",
        )
        .expect("CMS fixture schema should apply");
}

/// Current revision id assigned to a fixture article.
pub fn fixture_vid(nid: i64) -> i64 {
    nid * 10
}

/// Adds an article with one current revision and, when `body` is given, its body row.
pub fn insert_article(connection: &Connection, nid: i64, body: Option<&str>) {
    let vid = fixture_vid(nid);
    connection
        .execute(
            "
            INSERT INTO node(nid, vid, type, language, title, changed)
            VALUES(?1, ?2, 'article', ?3, ?4, 1000)
            ",
            params![nid, vid, FIXTURE_LANGUAGE, format!("Article {nid}")],
        )
        .expect("node fixture should insert");
    connection
        .execute(
            "
            INSERT INTO node_revision(
              nid, vid, uid, title, log, timestamp, status, comment, promote, sticky
            )
            VALUES(?1, ?2, 7, ?3, 'initial', 1000, 1, 2, 1, 0)
            ",
            params![nid, vid, format!("Article {nid}")],
        )
        .expect("node revision fixture should insert");

    if let Some(body) = body {
        connection
            .execute(
                "
                INSERT INTO field_data_body(
                  entity_type, bundle, deleted, entity_id, revision_id, language, delta,
                  body_value, body_summary, body_format
                )
                VALUES('node', 'article', 0, ?1, ?2, ?3, 0, ?4, 'summary', 'filtered_html')
                ",
                params![nid, vid, FIXTURE_LANGUAGE, body],
            )
            .expect("body fixture should insert");
    }
}

pub fn body_value(connection: &Connection, nid: i64) -> (String, i64) {
    connection
        .query_row(
            "SELECT body_value, revision_id FROM field_data_body WHERE entity_id = ?1",
            [nid],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("body row should exist")
}

pub fn count(connection: &Connection, sql: &str) -> i64 {
    connection
        .query_row(sql, [], |row| row.get(0))
        .expect("count query should succeed")
}
