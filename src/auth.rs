//! Bot authorization list.
//!
//! A plain text file with one numeric user id per line. Blank lines are
//! ignored; anything else that does not parse is reported and skipped.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct AuthList {
    users: HashSet<i64>,
}

impl AuthList {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read auth list: {}", path.display()))?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let mut users = HashSet::new();
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.parse::<i64>() {
                Ok(id) => {
                    users.insert(id);
                }
                Err(e) => warn!(line = lineno + 1, value = line, error = %e, "skipping auth list entry"),
            }
        }
        Self { users }
    }

    pub fn contains(&self, user_id: i64) -> bool {
        self.users.contains(&user_id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl FromIterator<i64> for AuthList {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self {
            users: iter.into_iter().collect(),
        }
    }
}
