use std::fs;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::db::{
    ArticleNode, BodyField, ImageFieldEntry, NewManagedFile, insert_body_revision,
    insert_file_usage, insert_image_field, insert_managed_file, insert_node_revision,
    update_body_field, update_node_revision_pointer,
};
use super::fetch::ImageSource;
use super::imaging::{DecodedImage, decode_image, resize_to_fit, save_image};
use super::layout::{
    ImageStyle, OutputLayout, canonical_file_name, field_image_uri, page_base_name, picture_url,
};
use super::markup::{BodyRewriter, MarkupPatterns};
use crate::model::{NodeReport, PrimaryImage, SavedPicture};
use crate::util::{sha256_file, unix_now};

/// Collaborators shared by every node of one run.
pub(crate) struct NodeImporter<'a> {
    pub patterns: &'a MarkupPatterns,
    pub source: &'a dyn ImageSource,
    pub layout: &'a OutputLayout,
}

impl NodeImporter<'_> {
    /// Rewrites one node's body inside the caller's transaction.
    pub(crate) fn import_node(
        &self,
        connection: &rusqlite::Connection,
        node: &ArticleNode,
        body: &BodyField,
    ) -> Result<NodeReport> {
        let mut report = NodeReport {
            nid: node.nid,
            ..NodeReport::default()
        };

        let revision_id = body.revision_id + 1;
        let references = self.patterns.image_references(&body.body_value);
        report.references_found = references.len();

        let mut rewriter = BodyRewriter::new(&body.body_value);

        for (index, reference) in references.iter().enumerate() {
            let base = page_base_name(node.nid, index);

            info!(nid = node.nid, url = %reference.url, "downloading image");
            let fetched = self.source.fetch(&reference.url)?;
            let image_type = self.patterns.image_type(fetched.content_type.as_deref());

            let decoded = match decode_image(&fetched.bytes) {
                Ok(decoded) => decoded,
                Err(err) => {
                    warn!(nid = node.nid, url = %reference.url, error = %err, "image failed");
                    report.failed_urls.push(reference.url.clone());
                    continue;
                }
            };

            let picture_path = self.layout.picture_path(&base, &image_type);

            if report.primary.is_none() {
                let primary =
                    self.register_primary(connection, node, &decoded, &image_type, &base)?;
                report.primary = Some(primary);
            } else {
                info!(path = %picture_path.display(), "saving page picture");
                save_image(
                    &decoded.image,
                    &picture_path,
                    &image_type,
                    decoded.source_format,
                )?;
            }

            report.saved.push(SavedPicture {
                index,
                source_url: reference.url.clone(),
                path: picture_path.display().to_string(),
            });
            rewriter.replace(&reference.span, &picture_url(&base, &image_type));
        }

        let replaced = rewriter.replacements();
        let Some(new_body) = rewriter.finish() else {
            return Ok(report);
        };

        info!(nid = node.nid, replaced, "updating body");
        update_body_field(connection, node.nid, &node.language, &new_body, revision_id)?;
        insert_body_revision(
            connection,
            node.nid,
            &node.language,
            body,
            &new_body,
            revision_id,
        )?;

        let revision = insert_node_revision(connection, node.nid, node.vid, unix_now())?;
        update_node_revision_pointer(connection, node.nid, revision)?;
        report.new_vid = Some(revision.vid);

        Ok(report)
    }

    /// Saves the featured image with its style derivatives and registers it as a managed file.
    fn register_primary(
        &self,
        connection: &rusqlite::Connection,
        node: &ArticleNode,
        decoded: &DecodedImage,
        image_type: &str,
        base: &str,
    ) -> Result<PrimaryImage> {
        let filename = canonical_file_name(node.nid, image_type);
        let canonical_path = self.layout.canonical_path(&filename);
        let picture_path = self.layout.picture_path(base, image_type);

        info!(path = %canonical_path.display(), "saving field image");
        save_image(
            &decoded.image,
            &canonical_path,
            image_type,
            decoded.source_format,
        )?;

        info!(path = %picture_path.display(), "saving page picture");
        save_image(
            &decoded.image,
            &picture_path,
            image_type,
            decoded.source_format,
        )?;

        // The page copy's size is what gets registered.
        let file_size = fs::metadata(&picture_path)
            .with_context(|| format!("failed to stat {}", picture_path.display()))?
            .len();

        for style in ImageStyle::ALL {
            let (max_width, max_height) = style.bounds();
            let style_path = self.layout.style_path(style, &filename);
            info!(
                style = style.as_str(),
                max_width,
                max_height,
                path = %style_path.display(),
                "resizing to fit"
            );
            let resized = resize_to_fit(&decoded.image, style.bounds());
            save_image(&resized, &style_path, image_type, decoded.source_format)?;
        }

        let uri = field_image_uri(&filename);
        let filemime = format!("image/{image_type}");
        let fid = insert_managed_file(
            connection,
            &NewManagedFile {
                filename: &filename,
                uri: &uri,
                filemime: &filemime,
                filesize: file_size,
                timestamp: unix_now(),
            },
        )?;

        insert_image_field(
            connection,
            &ImageFieldEntry {
                nid: node.nid,
                language: &node.language,
                fid,
                width: decoded.width(),
                height: decoded.height(),
            },
        )?;
        insert_file_usage(connection, fid, node.nid)?;

        info!(nid = node.nid, fid, filename = %filename, "registered managed file");

        Ok(PrimaryImage {
            fid,
            filename,
            file_size,
            width: decoded.width(),
            height: decoded.height(),
            sha256: sha256_file(&canonical_path)?,
        })
    }
}
