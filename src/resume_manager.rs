use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info};
use serde::{Deserialize, Serialize};

/// Queries finished by earlier runs, saved as JSON after every completion.
#[derive(Serialize, Deserialize, Default, Debug)]
pub struct ProgressState {
    pub completed_queries: HashSet<String>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl ProgressState {
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mut state = if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str::<ProgressState>(&content) {
                    Ok(state) => {
                        info!(
                            "Resumed previous session: {} queries processed.",
                            state.completed_queries.len()
                        );
                        state
                    }
                    Err(e) => {
                        error!("Failed to parse progress file: {}. Starting fresh.", e);
                        ProgressState::default()
                    }
                },
                Err(e) => {
                    error!("Failed to read progress file: {}", e);
                    ProgressState::default()
                }
            }
        } else {
            info!("No progress file found. Starting fresh.");
            ProgressState::default()
        };
        state.path = Some(path.to_path_buf());
        state
    }

    /// Fresh state that still saves to `path`, replacing what was there.
    pub fn fresh(path: impl AsRef<Path>) -> Self {
        ProgressState {
            completed_queries: HashSet::new(),
            path: Some(path.as_ref().to_path_buf()),
        }
    }

    pub fn mark_complete(&mut self, query: String) {
        self.completed_queries.insert(query);
        self.save();
    }

    pub fn contains(&self, query: &str) -> bool {
        self.completed_queries.contains(query)
    }

    pub fn len(&self) -> usize {
        self.completed_queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed_queries.is_empty()
    }

    fn save(&self) {
        let path = match &self.path {
            Some(p) => p,
            None => return,
        };
        let json = match serde_json::to_string_pretty(self) {
            Ok(j) => j,
            Err(e) => {
                error!("Failed to serialize progress state: {}", e);
                return;
            }
        };
        if let Err(e) = fs::write(path, json) {
            error!("Failed to write progress file {:?}: {}", path, e);
        }
    }
}
