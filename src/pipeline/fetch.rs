//! Search and download of raw audio through an external program.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::{debug, warn};

use crate::cleanup::remove_if_present;
use crate::config::FetchSettings;
use crate::error::{Error, Result};

use super::types::SearchHit;

/// Resolves a query to a downloadable source and fetches it.
pub trait AudioFetcher: Send {
    /// Best match for `query`, or `None` when the service has nothing.
    fn search(&self, query: &str) -> Result<Option<SearchHit>>;

    /// Download `hit` into `dir` and return the file written.
    ///
    /// On failure, anything partially written must already be gone.
    fn download(&self, hit: &SearchHit, dir: &Path) -> Result<PathBuf>;
}

/// [`AudioFetcher`] that shells out to a yt-dlp compatible program.
#[derive(Debug, Clone)]
pub struct CommandFetcher {
    settings: FetchSettings,
}

impl CommandFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    fn run(&self, args: Vec<String>) -> Result<Output> {
        debug!(program = %self.settings.program, ?args, "running fetcher");
        let output = Command::new(&self.settings.program)
            .args(&args)
            .output()
            .map_err(|e| Error::external(&self.settings.program, e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::external(
                &self.settings.program,
                format!("{}: {}", output.status, stderr.trim()),
            ));
        }
        Ok(output)
    }
}

/// Replace `{key}` placeholders in every template.
fn expand(templates: &[String], vars: &[(&str, &str)]) -> Vec<String> {
    templates
        .iter()
        .map(|t| {
            vars.iter()
                .fold(t.clone(), |acc, (k, v)| acc.replace(&format!("{{{k}}}"), v))
        })
        .collect()
}

/// Parse one `id<TAB>title<TAB>uploader` line.
pub fn parse_search_line(line: &str) -> Option<SearchHit> {
    let mut fields = line.trim_end().split('\t');
    let id = fields.next()?.trim();
    if id.is_empty() {
        return None;
    }
    let title = fields.next().map(str::trim).filter(|t| !t.is_empty()).unwrap_or(id);
    let artist = fields
        .next()
        .map(str::trim)
        .filter(|a| !a.is_empty() && *a != "NA")
        .map(str::to_string);

    Some(SearchHit {
        locator: id.to_string(),
        title: title.to_string(),
        artist,
        track_id: Some(id.to_string()),
    })
}

/// Remove every file in `dir` whose name starts with `stem`.
fn remove_partials(dir: &Path, stem: &str) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        if name.to_string_lossy().starts_with(stem)
            && let Err(e) = remove_if_present(&entry.path())
        {
            warn!(path = %entry.path().display(), "failed to remove partial download: {e}");
        }
    }
}

impl AudioFetcher for CommandFetcher {
    fn search(&self, query: &str) -> Result<Option<SearchHit>> {
        let args = expand(&self.settings.search_args, &[("query", query)]);
        let output = self.run(args)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().find_map(parse_search_line))
    }

    fn download(&self, hit: &SearchHit, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let dir_str = dir.to_string_lossy();
        let args = expand(
            &self.settings.download_args,
            &[("locator", &hit.locator), ("dir", &dir_str)],
        );

        let result = self.run(args).and_then(|output| {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let path = stdout
                .lines()
                .map(str::trim)
                .rfind(|l| !l.is_empty())
                .map(PathBuf::from)
                .ok_or_else(|| Error::external(&self.settings.program, "printed no file path"))?;
            if path.is_file() {
                Ok(path)
            } else {
                Err(Error::external(
                    &self.settings.program,
                    format!("reported {} but it does not exist", path.display()),
                ))
            }
        });

        if result.is_err() {
            remove_partials(dir, &hit.locator);
        }
        result
    }
}
