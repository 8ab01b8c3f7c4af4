use std::ops::Range;

use anyhow::{Context, Result};
use regex::Regex;

/// Extension used when the response carries no usable `content-type`.
pub(crate) const DEFAULT_IMAGE_TYPE: &str = "png";

/// An `src` attribute value found inside an `img` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImageReference {
    pub url: String,
    /// Byte range of the URL inside the body, quotes excluded.
    pub span: Range<usize>,
}

pub(crate) struct MarkupPatterns {
    img_src: Regex,
    content_type: Regex,
}

impl MarkupPatterns {
    pub(crate) fn new() -> Result<Self> {
        let img_src =
            Regex::new(r#"img[^>]*src="([^"]+)""#).context("failed to compile img src regex")?;
        let content_type = Regex::new(r"^\s*(\w+)\s*/\s*(\w+)")
            .context("failed to compile content-type regex")?;

        Ok(Self {
            img_src,
            content_type,
        })
    }

    /// Image references in order of occurrence, leftmost-first and non-overlapping.
    pub(crate) fn image_references(&self, body: &str) -> Vec<ImageReference> {
        self.img_src
            .captures_iter(body)
            .filter_map(|captures| captures.get(1))
            .map(|url| ImageReference {
                url: url.as_str().to_string(),
                span: url.range(),
            })
            .collect()
    }

    /// Subtype of a `type/subtype` content-type, e.g. `jpeg` for `image/jpeg; q=1`.
    pub(crate) fn image_type(&self, content_type: Option<&str>) -> String {
        content_type
            .and_then(|value| self.content_type.captures(value))
            .and_then(|captures| captures.get(2))
            .map(|subtype| subtype.as_str().to_string())
            .unwrap_or_else(|| DEFAULT_IMAGE_TYPE.to_string())
    }
}

/// Rebuilds a body by splicing replacements over URL spans, left to right.
pub(crate) struct BodyRewriter<'a> {
    original: &'a str,
    rewritten: String,
    last_end: usize,
    replacements: usize,
}

impl<'a> BodyRewriter<'a> {
    pub(crate) fn new(original: &'a str) -> Self {
        Self {
            original,
            rewritten: String::with_capacity(original.len()),
            last_end: 0,
            replacements: 0,
        }
    }

    /// Spans must be supplied in ascending, non-overlapping order.
    pub(crate) fn replace(&mut self, span: &Range<usize>, replacement: &str) {
        debug_assert!(span.start >= self.last_end);
        self.rewritten
            .push_str(&self.original[self.last_end..span.start]);
        self.rewritten.push_str(replacement);
        self.last_end = span.end;
        self.replacements += 1;
    }

    pub(crate) fn replacements(&self) -> usize {
        self.replacements
    }

    /// The rewritten body, or `None` when nothing was replaced.
    pub(crate) fn finish(mut self) -> Option<String> {
        if self.replacements == 0 {
            return None;
        }
        self.rewritten.push_str(&self.original[self.last_end..]);
        Some(self.rewritten)
    }
}
