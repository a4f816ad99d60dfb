//! Whole-file replacement for the flat files several roles share.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Replace `path` with `contents` by writing a sibling temp file and renaming
/// it over the target, so a reader sees either the old or the new file.
pub fn replace_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp = sibling_tmp(path);
    {
        let mut f = File::create(&tmp)?;
        f.write_all(contents)?;
        f.sync_all()?;
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

fn sibling_tmp(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "refrain".into());
    name.push(".tmp");
    path.with_file_name(name)
}
