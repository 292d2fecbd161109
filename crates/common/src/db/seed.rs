//! Seed roster import
//!
//! Seed files list one npub per line. Exported listings often carry a row
//! number in front of each key (`12 | npub1...` or `12. npub1...`), which is
//! stripped before the key is stored.

use super::Repository;
use crate::errors::Result;
use chrono::NaiveDate;
use regex_lite::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

const ROW_PREFIX_PATTERN: &str = r"^\s*\d+\s*[|.]\s*";

fn row_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ROW_PREFIX_PATTERN).expect("static pattern is valid"))
}

/// Keys found in a seed listing, in file order
pub fn parse_seed_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| row_prefix().replace(line, "").trim().to_string())
        .filter(|line| line.starts_with("npub"))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedImport {
    pub listed: usize,
    pub inserted: usize,
}

impl Repository {
    /// Import every key in `path` as an existing participant
    pub async fn import_seed_file(&self, path: impl AsRef<Path>, today: NaiveDate) -> Result<SeedImport> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let keys = parse_seed_list(&content);

        let mut inserted = 0;
        for key in &keys {
            match self.import_participant(key, today).await {
                Ok(true) => inserted += 1,
                Ok(false) => {}
                Err(e) => warn!(pubkey = %key, error = %e, "Failed to import seed participant"),
            }
        }

        info!(path = %path.display(), listed = keys.len(), inserted, "Seed roster imported");
        Ok(SeedImport { listed: keys.len(), inserted })
    }
}
