//! Registry extract download into a watched directory.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Local;
use log::{error, info, warn};

use crate::error::TransportError;
use crate::records::LegalStatus;
use crate::runner::PdfSink;
use crate::session::PageSession;

const UNFINISHED_SUFFIX: &str = ".crdownload";

/// Triggers the browser download of an extract and renames the new file to
/// `{inn}_{original name}`.
pub struct DownloadDirPdfSink {
    dir: PathBuf,
    download_timeout: Duration,
    poll_interval: Duration,
    max_unfinished: usize,
    unfinished_streak: usize,
    disabled: bool,
}

impl DownloadDirPdfSink {
    pub fn new(dir: impl Into<PathBuf>, download_timeout: Duration, max_unfinished: usize) -> Self {
        DownloadDirPdfSink {
            dir: dir.into(),
            download_timeout,
            poll_interval: Duration::from_millis(500),
            max_unfinished,
            unfinished_streak: 0,
            disabled: false,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    fn snapshot(&self) -> HashSet<String> {
        match fs::read_dir(&self.dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(e) => {
                warn!("Cannot list download directory {:?}: {}", self.dir, e);
                HashSet::new()
            }
        }
    }

    /// Poll until a finished file that was not in `before` shows up.
    fn wait_for_download(&self, before: &HashSet<String>) -> Option<String> {
        let deadline = Instant::now() + self.download_timeout;
        loop {
            let mut new_files: Vec<String> = self
                .snapshot()
                .into_iter()
                .filter(|name| !before.contains(name) && !name.ends_with(UNFINISHED_SUFFIX))
                .collect();
            if !new_files.is_empty() {
                new_files.sort();
                if new_files.len() > 1 {
                    warn!("{} new files in {:?}, using {}", new_files.len(), self.dir, new_files[0]);
                }
                return new_files.into_iter().next();
            }
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(self.poll_interval);
        }
    }

    /// Remove partial downloads. Returns whether any were found.
    fn clear_unfinished(&self) -> bool {
        let unfinished: Vec<String> = self
            .snapshot()
            .into_iter()
            .filter(|name| name.ends_with(UNFINISHED_SUFFIX))
            .collect();
        for name in &unfinished {
            if let Err(e) = fs::remove_file(self.dir.join(name)) {
                warn!("Could not remove unfinished download {}: {}", name, e);
            }
        }
        !unfinished.is_empty()
    }

    fn store(&self, inn: &str, downloaded: &str) -> String {
        let mut target = self.dir.join(format!("{}_{}", inn, downloaded));
        if target.exists() {
            let stem = target
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let suffix = Local::now().format("%Y%m%d-%H%M%S");
            let name = match target.extension() {
                Some(ext) => format!("{}_{}.{}", stem, suffix, ext.to_string_lossy()),
                None => format!("{}_{}", stem, suffix),
            };
            target = self.dir.join(name);
        }

        match fs::rename(self.dir.join(downloaded), &target) {
            Ok(()) => {
                let name = target
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                info!("Extract saved as {}", name);
                name
            }
            Err(e) => {
                error!("Could not rename {} for INN {}: {}", downloaded, inn, e);
                downloaded.to_string()
            }
        }
    }
}

impl<S: PageSession> PdfSink<S> for DownloadDirPdfSink {
    fn fetch_pdf(
        &mut self,
        session: &mut S,
        inn: &str,
        entity_name: &str,
        status: LegalStatus,
    ) -> Result<String, TransportError> {
        if self.disabled || status == LegalStatus::Liquidated {
            return Ok(String::new());
        }

        let before = self.snapshot();
        session.submit_search(inn)?;
        if !session.request_extract(0)? {
            info!("Nothing found for INN {} ({})", inn, entity_name);
            return Ok(String::new());
        }

        match self.wait_for_download(&before) {
            Some(downloaded) => {
                self.unfinished_streak = 0;
                Ok(self.store(inn, &downloaded))
            }
            None => {
                warn!("No new file detected for INN {}", inn);
                if self.clear_unfinished() {
                    self.unfinished_streak += 1;
                    if self.unfinished_streak > self.max_unfinished {
                        error!("Too many consecutive unfinished downloads, extract download disabled");
                        self.disabled = true;
                    }
                }
                Ok(String::new())
            }
        }
    }
}
