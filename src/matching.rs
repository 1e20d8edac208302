// src/matching.rs

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};

use crate::models::TaskInfo;

/// Builds a case-insensitive glob in which `\` is a literal character.
///
/// Windows task folders and registry paths use backslashes, so escape
/// handling must stay off.
fn build_glob(pattern: &str) -> Result<Glob, globset::Error> {
    GlobBuilder::new(pattern)
        .case_insensitive(true)
        .backslash_escape(false)
        .build()
}

/// Compiles a set of patterns matched against a single string.
pub fn pattern_set<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(build_glob(pattern.as_ref())?);
    }
    builder.build()
}

/// Task filter: a task matches when its name matches `name_pattern` OR its
/// folder path matches `path_pattern`.
#[derive(Debug, Clone)]
pub struct TaskFilter {
    name: globset::GlobMatcher,
    path: globset::GlobMatcher,
}

impl TaskFilter {
    pub fn new(name_pattern: &str, path_pattern: &str) -> Result<Self, globset::Error> {
        Ok(Self {
            name: build_glob(name_pattern)?.compile_matcher(),
            path: build_glob(path_pattern)?.compile_matcher(),
        })
    }

    pub fn matches(&self, task: &TaskInfo) -> bool {
        self.name.is_match(&task.name) || self.path.is_match(&task.path)
    }
}
