use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ImportPaths {
    pub db_path: String,
    pub files_root: String,
    pub manifest_path: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportCounts {
    pub nodes_total: usize,
    pub nodes_rewritten: usize,
    pub nodes_skipped_missing_body: usize,
    pub references_found: usize,
    pub pictures_saved: usize,
    pub decode_failures: usize,
    pub managed_files_inserted: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedPicture {
    pub index: usize,
    pub source_url: String,
    pub path: String,
}

/// The node's featured image as registered in `file_managed`.
#[derive(Debug, Clone, Serialize)]
pub struct PrimaryImage {
    pub fid: i64,
    pub filename: String,
    pub file_size: u64,
    pub width: u32,
    pub height: u32,
    pub sha256: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NodeReport {
    pub nid: i64,
    pub references_found: usize,
    pub saved: Vec<SavedPicture>,
    pub failed_urls: Vec<String>,
    pub primary: Option<PrimaryImage>,
    pub new_vid: Option<i64>,
    pub skipped_missing_body: bool,
}

impl NodeReport {
    pub fn rewritten(&self) -> bool {
        self.new_vid.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub finished_at: String,
    pub command: String,
    pub paths: ImportPaths,
    pub counts: ImportCounts,
    pub nodes: Vec<NodeReport>,
    pub warnings: Vec<String>,
}
