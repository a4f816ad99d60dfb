use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// File-name prefix of every clip the pipeline writes.
pub const CLIP_PREFIX: &str = "chorus_";

fn is_clip(path: &Path) -> bool {
    let name_ok = path
        .file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with(CLIP_PREFIX))
        .unwrap_or(false);
    let ext_ok = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false);
    name_ok && ext_ok
}

/// Clips sitting directly in `dir`, sorted by path. A missing directory has none.
pub fn find_orphan_clips(dir: &Path) -> Vec<PathBuf> {
    let mut clips: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && is_clip(e.path()))
        .map(|e| e.into_path())
        .collect();
    clips.sort();
    clips
}
