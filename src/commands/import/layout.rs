use std::path::PathBuf;

use anyhow::Result;

use crate::util::ensure_directory;

/// Public URL prefix the CMS serves `files/pictures` under.
const PICTURES_URL_PREFIX: &str = "/sites/default/files/pictures";
/// Stream-wrapper prefix recorded in `file_managed.uri`.
const FIELD_IMAGE_URI_PREFIX: &str = "public://field/image";

/// Named resize preset with its own output directory.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum ImageStyle {
    Large,
    Medium,
    Thumbnail,
}

impl ImageStyle {
    pub(crate) const ALL: [ImageStyle; 3] = [Self::Large, Self::Medium, Self::Thumbnail];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Large => "large",
            Self::Medium => "medium",
            Self::Thumbnail => "thumbnail",
        }
    }

    /// Bounding box as (width, height). Medium is 220 wide but 480 tall.
    pub(crate) fn bounds(self) -> (u32, u32) {
        match self {
            Self::Large => (480, 480),
            Self::Medium => (220, 480),
            Self::Thumbnail => (100, 100),
        }
    }
}

/// Directory layout under the CMS `files` root.
#[derive(Debug, Clone)]
pub(crate) struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub(crate) fn style_dir(&self, style: ImageStyle) -> PathBuf {
        self.root
            .join("styles")
            .join(style.as_str())
            .join("public")
            .join("field")
            .join("image")
    }

    pub(crate) fn field_image_dir(&self) -> PathBuf {
        self.root.join("field").join("image")
    }

    pub(crate) fn pictures_dir(&self) -> PathBuf {
        self.root.join("pictures")
    }

    pub(crate) fn all_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = ImageStyle::ALL
            .iter()
            .map(|style| self.style_dir(*style))
            .collect();
        dirs.push(self.field_image_dir());
        dirs.push(self.pictures_dir());
        dirs
    }

    pub(crate) fn ensure_dirs(&self) -> Result<()> {
        for dir in self.all_dirs() {
            ensure_directory(&dir)?;
        }
        Ok(())
    }

    pub(crate) fn canonical_path(&self, filename: &str) -> PathBuf {
        self.field_image_dir().join(filename)
    }

    pub(crate) fn style_path(&self, style: ImageStyle, filename: &str) -> PathBuf {
        self.style_dir(style).join(filename)
    }

    pub(crate) fn picture_path(&self, base: &str, image_type: &str) -> PathBuf {
        self.pictures_dir().join(format!("{base}.{image_type}"))
    }
}

pub(crate) fn canonical_file_name(nid: i64, image_type: &str) -> String {
    format!("node_{nid}_image.{image_type}")
}

pub(crate) fn page_base_name(nid: i64, index: usize) -> String {
    format!("node_{nid}_image_{index}")
}

pub(crate) fn picture_url(base: &str, image_type: &str) -> String {
    format!("{PICTURES_URL_PREFIX}/{base}.{image_type}")
}

pub(crate) fn field_image_uri(filename: &str) -> String {
    format!("{FIELD_IMAGE_URI_PREFIX}/{filename}")
}
