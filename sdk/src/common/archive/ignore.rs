//! # Docker SDK Build Context Ignore Rules (`common::archive::ignore`)
//!
//! File: sdk/src/common/archive/ignore.rs
//!
//! ## Overview
//!
//! Parses `.dockerignore` files and decides which context paths are excluded.
//!
//! ## Rules
//!
//! - One pattern per line; blank lines and lines starting with `#` are skipped.
//! - `*` matches any run of characters except `/`, `?` matches one such character,
//!   `**` matches any number of directories.
//! - A pattern that matches a directory excludes everything below it.
//! - A leading `!` re-includes paths excluded by earlier patterns. The last
//!   matching pattern wins.
//!
use crate::core::error::Result;
use anyhow::Context;
use regex::Regex;
use std::fs;
use std::path::Path;

/// File name of the ignore file at the context root.
pub const DOCKERIGNORE_FILE: &str = ".dockerignore";

#[derive(Debug, Clone)]
struct Rule {
    regex: Regex,
    negated: bool,
}

/// A compiled set of ignore rules.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<Rule>,
}

fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    // A directory match covers its whole subtree.
    out.push_str("(?:/.*)?$");
    out
}

fn clean(pattern: &str) -> String {
    let trimmed = pattern.trim().trim_start_matches("./").trim_start_matches('/');
    trimmed.trim_end_matches('/').to_string()
}

impl IgnoreRules {
    /// Compiles rules from `.dockerignore` text.
    pub fn parse(content: &str) -> Result<Self> {
        let mut rules = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (negated, body) = match line.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, line),
            };
            let body = clean(body);
            if body.is_empty() {
                continue;
            }
            let regex = Regex::new(&glob_to_regex(&body))
                .with_context(|| format!("Invalid .dockerignore pattern '{}'", line))?;
            rules.push(Rule { regex, negated });
        }
        Ok(Self { rules })
    }

    /// Loads `<dir>/.dockerignore`; a missing file yields no rules.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(DOCKERIGNORE_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read '{}'", path.display()))?;
        Self::parse(&content)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether any rule re-includes paths.
    pub fn has_negations(&self) -> bool {
        self.rules.iter().any(|r| r.negated)
    }

    /// Whether `relative` (slash separated, relative to the context root) is excluded.
    pub fn is_excluded(&self, relative: &str) -> bool {
        let relative = relative.trim_start_matches("./");
        self.rules.iter().fold(false, |excluded, rule| {
            if rule.regex.is_match(relative) {
                !rule.negated
            } else {
                excluded
            }
        })
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_and_directory_patterns() {
        let rules = IgnoreRules::parse("# comment\n\ntarget\n*.log\n/secrets/\n").unwrap();
        assert!(rules.is_excluded("target"));
        assert!(rules.is_excluded("target/debug/app"));
        assert!(rules.is_excluded("build.log"));
        assert!(!rules.is_excluded("logs/build.log"));
        assert!(rules.is_excluded("secrets/key.pem"));
        assert!(!rules.is_excluded("src/main.rs"));
    }

    #[test]
    fn test_double_star_and_question_mark() {
        let rules = IgnoreRules::parse("**/*.tmp\nfile?.txt").unwrap();
        assert!(rules.is_excluded("a.tmp"));
        assert!(rules.is_excluded("deep/nested/b.tmp"));
        assert!(rules.is_excluded("file1.txt"));
        assert!(!rules.is_excluded("file10.txt"));
    }

    #[test]
    fn test_negation_last_match_wins() {
        let rules = IgnoreRules::parse("*.md\n!README.md").unwrap();
        assert!(rules.is_excluded("CHANGELOG.md"));
        assert!(!rules.is_excluded("README.md"));

        let rules = IgnoreRules::parse("!README.md\n*.md").unwrap();
        assert!(rules.is_excluded("README.md"));
    }

    #[test]
    fn test_missing_file_means_no_rules() {
        let dir = tempfile::tempdir().unwrap();
        assert!(IgnoreRules::load(dir.path()).unwrap().is_empty());
        std::fs::write(dir.path().join(DOCKERIGNORE_FILE), "node_modules\n").unwrap();
        assert!(IgnoreRules::load(dir.path())
            .unwrap()
            .is_excluded("node_modules/x/index.js"));
    }
}
