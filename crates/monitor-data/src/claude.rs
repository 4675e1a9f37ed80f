//! Read-only tailing of Claude's provider-native JSONL project logs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, warn};

use monitor_core::error::{MonitorError, Result};
use monitor_core::models::Provider;
use monitor_core::pricing::PricingTable;

use crate::parse::{parse_usage_line, LineOutcome};
use crate::source::{SourcePull, UsageSource};
use crate::tail::FileTailer;

/// Environment variable overriding the Claude config directory.
pub const CLAUDE_CONFIG_DIR_ENV: &str = "CLAUDE_CONFIG_DIR";

/// Tails `*.jsonl` files under the Claude projects directory.
pub struct ClaudeSource {
    root: PathBuf,
    tailer: FileTailer,
    pricing: PricingTable,
}

impl ClaudeSource {
    /// Create a source over an explicit projects root.
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            tailer: FileTailer::new(),
            pricing: PricingTable::new(),
        }
    }

    /// Locate the Claude projects directory.
    ///
    /// Precedence: `$CLAUDE_CONFIG_DIR/projects`, then
    /// `~/.config/claude/projects`, then `~/.claude/projects`. Returns the
    /// first candidate that exists.
    pub fn discover_root() -> Option<PathBuf> {
        let mut candidates = Vec::new();
        if let Ok(dir) = std::env::var(CLAUDE_CONFIG_DIR_ENV) {
            if !dir.is_empty() {
                candidates.push(PathBuf::from(dir).join("projects"));
            }
        }
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".config").join("claude").join("projects"));
            candidates.push(home.join(".claude").join("projects"));
        }
        candidates.into_iter().find(|p| p.is_dir())
    }

    /// The projects root this source reads from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All `*.jsonl` files under the root, sorted by path for a stable
    /// processing order.
    fn jsonl_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry.file_type().is_file()
                    && entry
                        .path()
                        .extension()
                        .map(|ext| ext == "jsonl")
                        .unwrap_or(false)
            })
            .map(|entry| entry.into_path())
            .collect();
        files.sort();
        files
    }
}

impl UsageSource for ClaudeSource {
    fn provider(&self) -> Provider {
        Provider::Claude
    }

    fn pull_new_records(&mut self, deadline: Option<Instant>) -> Result<SourcePull> {
        if !self.root.is_dir() {
            return Err(MonitorError::Source {
                path: self.root.clone(),
                message: "projects directory missing or unreadable".to_string(),
            });
        }

        let files = self.jsonl_files();
        let live: HashSet<PathBuf> = files.iter().cloned().collect();
        self.tailer.retain_files(&live);

        let mut pull = SourcePull::default();

        for file in &files {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    pull.stats.deadline_hit = true;
                    debug!(remaining = files.len(), "pull deadline hit, returning partial data");
                    break;
                }
            }

            let lines = match self.tailer.read_new_lines(file) {
                Ok(lines) => lines,
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "failed to tail file");
                    continue;
                }
            };

            for line in &lines {
                match parse_usage_line(line, Provider::Claude, &mut self.pricing) {
                    LineOutcome::Record(record) => {
                        pull.stats.records += 1;
                        pull.records.push(record);
                    }
                    LineOutcome::Limit(event) => pull.limit_events.push(event),
                    LineOutcome::Skipped => pull.stats.skipped_lines += 1,
                    LineOutcome::Malformed => pull.stats.malformed_lines += 1,
                    LineOutcome::Invalid => pull.stats.invalid_records += 1,
                }
            }
        }

        pull.records.sort_by_key(|r| r.timestamp);

        debug!(
            records = pull.stats.records,
            skipped = pull.stats.skipped_lines,
            malformed = pull.stats.malformed_lines,
            "claude pull complete"
        );

        Ok(pull)
    }
}
