use std::time::Duration;

use anyhow::Result;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::cli::ScanArgs;
use crate::commands::import::{
    MarkupPatterns, load_article_nodes, load_body_field, open_connection, page_base_name,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlannedPicture {
    pub nid: i64,
    pub base_name: String,
    pub url: String,
}

#[derive(Debug, Default)]
pub(crate) struct ScanSummary {
    pub nodes_total: usize,
    pub nodes_with_images: usize,
    pub nodes_missing_body: Vec<i64>,
    pub planned: Vec<PlannedPicture>,
}

pub fn run(args: ScanArgs) -> Result<()> {
    let connection = open_connection(&args.db_path, Duration::from_millis(args.busy_timeout_ms))?;
    let patterns = MarkupPatterns::new()?;

    let summary = scan(&connection, &patterns)?;

    for picture in &summary.planned {
        info!(nid = picture.nid, base = %picture.base_name, url = %picture.url, "image reference");
    }
    for nid in &summary.nodes_missing_body {
        warn!(nid, "node has no body row");
    }
    info!(
        nodes = summary.nodes_total,
        nodes_with_images = summary.nodes_with_images,
        references = summary.planned.len(),
        missing_bodies = summary.nodes_missing_body.len(),
        "scan completed"
    );

    Ok(())
}

/// Lists the references an import would fetch, without touching anything.
pub(crate) fn scan(connection: &Connection, patterns: &MarkupPatterns) -> Result<ScanSummary> {
    let nodes = load_article_nodes(connection)?;
    let mut summary = ScanSummary {
        nodes_total: nodes.len(),
        ..ScanSummary::default()
    };

    for node in &nodes {
        let Some(body) = load_body_field(connection, node.nid, &node.language)? else {
            summary.nodes_missing_body.push(node.nid);
            continue;
        };

        let references = patterns.image_references(&body.body_value);
        if !references.is_empty() {
            summary.nodes_with_images += 1;
        }
        summary
            .planned
            .extend(references.into_iter().enumerate().map(|(index, reference)| {
                PlannedPicture {
                    nid: node.nid,
                    base_name: page_base_name(node.nid, index),
                    url: reference.url,
                }
            }));
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::scan;
    use crate::commands::import::MarkupPatterns;
    use crate::test_support::{insert_article, seed_schema};

    #[test]
    fn scan_lists_references_with_base_names_and_missing_bodies() {
        let connection = Connection::open_in_memory().expect("in-memory DB should open");
        seed_schema(&connection);
        insert_article(
            &connection,
            3,
            Some(r#"<img src="http://x/a.png"><img class="c" src="http://x/b.gif">"#),
        );
        insert_article(&connection, 4, Some("<p>no pictures</p>"));
        insert_article(&connection, 7, None);

        let patterns = MarkupPatterns::new().expect("patterns should compile");
        let summary = scan(&connection, &patterns).expect("scan should succeed");

        assert_eq!(summary.nodes_total, 3);
        assert_eq!(summary.nodes_with_images, 1);
        assert_eq!(summary.nodes_missing_body, vec![7]);
        assert_eq!(summary.planned.len(), 2);
        assert_eq!(summary.planned[0].base_name, "node_3_image_0");
        assert_eq!(summary.planned[0].url, "http://x/a.png");
        assert_eq!(summary.planned[1].base_name, "node_3_image_1");
        assert_eq!(summary.planned[1].url, "http://x/b.gif");
    }
}
