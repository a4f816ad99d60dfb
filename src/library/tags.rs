use std::path::Path;
use std::time::Duration;

use lofty::prelude::*;

/// What the container tags say about a downloaded file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub duration: Option<Duration>,
}

fn non_empty(v: &str) -> Option<String> {
    let v = v.trim();
    (!v.is_empty()).then(|| v.to_string())
}

/// Read title/artist/duration tags. Unreadable files yield an empty `TagInfo`.
pub fn probe_tags(path: &Path) -> TagInfo {
    let Ok(tagged) = lofty::read_from_path(path) else {
        return TagInfo::default();
    };

    let mut info = TagInfo {
        duration: Some(tagged.properties().duration()).filter(|d| !d.is_zero()),
        ..TagInfo::default()
    };

    if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
        info.title = tag.title().and_then(|v| non_empty(&v));
        info.artist = tag.artist().and_then(|v| non_empty(&v));
    }
    info
}
