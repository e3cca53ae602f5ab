//! Include/exclude glob matching with brace-alternation expansion.
//!
//! Patterns are expanded (`src/*.{rs,toml}` becomes `src/*.rs` and `src/*.toml`) before they are
//! compiled into [`GlobSet`]s. Matching happens against slash-normalized relative paths:
//! - `*` matches any run of characters except `/`
//! - `**` matches any run of characters including `/`
//! - `?` matches exactly one character
//!
//! Matching is case-sensitive unless the matcher is built with `case_sensitive = false`.

use std::collections::HashSet;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::app::tree::normalize_path;
use crate::domain::errors::PatternError;
use crate::infra::config::Patterns;

/// Pattern used when the include set is empty.
pub const MATCH_ALL: &str = "**/*";

/// Expand every brace group of `pattern` into the set of concrete patterns it denotes.
///
/// Duplicates are dropped while keeping the order in which expansions are first produced. A
/// pattern without braces expands to itself.
pub fn expand(pattern: &str) -> Result<Vec<String>, PatternError> {
    check_balanced(pattern)?;

    let mut seen = HashSet::new();
    Ok(expand_balanced(pattern)
        .into_iter()
        .filter(|candidate| seen.insert(candidate.clone()))
        .collect())
}

/// One-shot helper: compile `include`/`exclude` and test a single path, case-sensitively.
pub fn is_included(
    path: &str,
    include: &[String],
    exclude: &[String],
) -> Result<bool, PatternError> {
    Ok(PatternMatcher::new(include, exclude, true)?.is_included(path))
}

fn check_balanced(pattern: &str) -> Result<(), PatternError> {
    let mut open = Vec::new();
    for (position, ch) in pattern.char_indices() {
        match ch {
            '{' => open.push(position),
            '}' => {
                if open.pop().is_none() {
                    return Err(PatternError::Malformed {
                        pattern: pattern.to_owned(),
                        position,
                        brace: '}',
                    });
                }
            }
            _ => {}
        }
    }

    match open.pop() {
        Some(position) => Err(PatternError::Malformed {
            pattern: pattern.to_owned(),
            position,
            brace: '{',
        }),
        None => Ok(()),
    }
}

/// Expects balanced braces.
fn expand_balanced(pattern: &str) -> Vec<String> {
    let Some((start, end)) = first_group(pattern) else {
        return vec![pattern.to_owned()];
    };

    let prefix = &pattern[..start];
    let suffix = &pattern[end + 1..];
    split_alternatives(&pattern[start + 1..end])
        .into_iter()
        .flat_map(|alternative| expand_balanced(&format!("{prefix}{}{suffix}", alternative.trim())))
        .collect()
}

/// Byte offsets of the leftmost top-level `{` and its matching `}`.
fn first_group(pattern: &str) -> Option<(usize, usize)> {
    let mut depth = 0usize;
    let mut start = None;
    for (position, ch) in pattern.char_indices() {
        match ch {
            '{' => {
                if depth == 0 {
                    start = Some(position);
                }
                depth += 1;
            }
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0
                    && let Some(start) = start
                {
                    return Some((start, position));
                }
            }
            _ => {}
        }
    }
    None
}

/// Split a group's interior on commas that are not nested in an inner group.
fn split_alternatives(content: &str) -> Vec<&str> {
    let mut alternatives = Vec::new();
    let mut depth = 0usize;
    let mut last = 0;
    for (position, ch) in content.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                alternatives.push(&content[last..position]);
                last = position + 1;
            }
            _ => {}
        }
    }
    alternatives.push(&content[last..]);
    alternatives
}

/// Compiled include/exclude pattern sets.
#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    /// `None` matches every path.
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
    include_patterns: Vec<String>,
    case_insensitive: bool,
}

impl PatternMatcher {
    /// Expand and compile both pattern sets.
    ///
    /// An empty `include` matches everything. A non-empty `include` whose expansions are all
    /// empty (such as `{}`) matches nothing.
    pub fn new(
        include: &[String],
        exclude: &[String],
        case_sensitive: bool,
    ) -> Result<Self, PatternError> {
        let include_patterns = expand_all(include)?;
        let exclude_patterns = expand_all(exclude)?;
        let include_set = if include_patterns.is_empty() && !include.is_empty() {
            Some(GlobSet::empty())
        } else {
            compile(&include_patterns, case_sensitive)?
        };
        let exclude = compile(&exclude_patterns, case_sensitive)?;

        tracing::debug!(
            include = include_patterns.len(),
            exclude = exclude_patterns.len(),
            case_sensitive,
            "compiled pattern sets"
        );

        Ok(Self {
            include: include_set,
            exclude,
            include_patterns,
            case_insensitive: !case_sensitive,
        })
    }

    /// Build a matcher from the `[patterns]` configuration section.
    pub fn from_config(patterns: &Patterns) -> Result<Self, PatternError> {
        Self::new(
            &patterns.include(),
            &patterns.exclude(),
            patterns.case_sensitive(),
        )
    }

    /// A matcher selecting every path.
    pub fn match_all() -> Self {
        Self::default()
    }

    /// Whether `path` matches at least one include pattern and no exclude pattern.
    pub fn is_included(&self, path: &str) -> bool {
        let path = normalize_path(path);
        let included = self.include.as_ref().is_none_or(|set| set.is_match(&path));
        let excluded = self.exclude.as_ref().is_some_and(|set| set.is_match(&path));
        included && !excluded
    }

    /// Expanded include patterns.
    pub fn include_patterns(&self) -> &[String] {
        &self.include_patterns
    }

    pub fn is_case_sensitive(&self) -> bool {
        !self.case_insensitive
    }
}

fn expand_all(patterns: &[String]) -> Result<Vec<String>, PatternError> {
    let mut seen = HashSet::new();
    let mut expanded = Vec::new();
    for pattern in patterns {
        for candidate in expand(pattern.trim())? {
            let candidate = candidate
                .strip_prefix("./")
                .map(str::to_owned)
                .unwrap_or(candidate);
            if candidate.is_empty() {
                continue;
            }
            if seen.insert(candidate.clone()) {
                expanded.push(candidate);
            }
        }
    }
    Ok(expanded)
}

fn compile(patterns: &[String], case_sensitive: bool) -> Result<Option<GlobSet>, PatternError> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|err| PatternError::InvalidGlob {
                pattern: pattern.clone(),
                reason: err.to_string(),
            })?;
        builder.add(glob);
    }

    let set = builder.build().map_err(|err| PatternError::InvalidGlob {
        pattern: patterns.join(", "),
        reason: err.to_string(),
    })?;
    Ok(Some(set))
}
