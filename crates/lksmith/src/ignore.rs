//! Ignore-list: frame names whose presence in a backtrace suppresses
//! dependency processing for that acquisition.
//!
//! Two sources, both read once from the environment on first use:
//! `LKSMITH_IGNORED_FRAMES` (`:`-separated exact names, binary-searched) and
//! `LKSMITH_IGNORED_FRAME_PATTERNS` (`:`-separated glob patterns, scanned
//! linearly). Immutable after load, so reads take no lock.

use std::sync::LazyLock;

pub(crate) const FRAMES_VAR: &str = "LKSMITH_IGNORED_FRAMES";
pub(crate) const PATTERNS_VAR: &str = "LKSMITH_IGNORED_FRAME_PATTERNS";

pub(crate) struct IgnoreList {
    /// Exact frame names, sorted.
    exact: Vec<String>,
    /// Glob patterns (`*`, `?`).
    patterns: Vec<String>,
}

static IGNORE: LazyLock<IgnoreList> = LazyLock::new(|| {
    IgnoreList::from_specs(
        std::env::var(FRAMES_VAR).ok().as_deref(),
        std::env::var(PATTERNS_VAR).ok().as_deref(),
    )
});

impl IgnoreList {
    pub fn from_specs(frames: Option<&str>, patterns: Option<&str>) -> Self {
        let mut exact: Vec<String> = split_spec(frames);
        exact.sort_unstable();
        exact.dedup();
        Self {
            exact,
            patterns: split_spec(patterns),
        }
    }

    /// True iff any frame matches any exact name or any pattern.
    pub fn should_skip(&self, frames: &[String]) -> bool {
        frames.iter().any(|frame| {
            self.exact.binary_search_by(|e| e.as_str().cmp(frame)).is_ok()
                || self.patterns.iter().any(|p| glob_match(p, frame))
        })
    }
}

fn split_spec(spec: Option<&str>) -> Vec<String> {
    spec.map(|s| {
        s.split(':')
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

pub(crate) fn should_skip(frames: &[String]) -> bool {
    IGNORE.should_skip(frames)
}

/// Exact-match ignore list, in sorted order.
pub fn ignored_frames() -> &'static [String] {
    &IGNORE.exact
}

/// Pattern ignore list, in configuration order.
pub fn ignored_frame_patterns() -> &'static [String] {
    &IGNORE.patterns
}

/// Shell-style glob match: `*` spans any run, `?` matches one character.
fn glob_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    let (mut p, mut n) = (0, 0);
    let mut retry: Option<(usize, usize)> = None;

    while n < name.len() {
        match pattern.get(p) {
            Some('*') => {
                // Tentatively match zero characters; on mismatch, come back
                // and consume one more.
                retry = Some((p, n + 1));
                p += 1;
            }
            Some('?') => {
                p += 1;
                n += 1;
            }
            Some(&c) if c == name[n] => {
                p += 1;
                n += 1;
            }
            _ => match retry {
                Some((star_p, star_n)) => {
                    p = star_p + 1;
                    n = star_n;
                    retry = Some((star_p, star_n + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn exact_names_match() {
        let list = IgnoreList::from_specs(Some("ignore3:ignore2:ignore1"), None);
        assert!(list.should_skip(&frames(&["main", "ignore2", "run"])));
        assert!(!list.should_skip(&frames(&["main", "run"])));
    }

    #[test]
    fn empty_segments_are_dropped() {
        let list = IgnoreList::from_specs(Some("::a::"), None);
        assert!(list.should_skip(&frames(&["a"])));
        assert!(!list.should_skip(&frames(&[""])));
    }

    #[test]
    fn patterns_match_anywhere_in_the_stack() {
        let list = IgnoreList::from_specs(None, Some("*::ignored_helper:test_?"));
        assert!(list.should_skip(&frames(&["app::locks::ignored_helper"])));
        assert!(list.should_skip(&frames(&["test_a"])));
        assert!(!list.should_skip(&frames(&["test_ab"])));
    }

    #[test]
    fn glob_semantics() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("a*c", "abbbc"));
        assert!(glob_match("a*c", "ac"));
        assert!(!glob_match("a*c", "ab"));
        assert!(glob_match("?bc", "abc"));
        assert!(!glob_match("?bc", "bc"));
        assert!(glob_match("a*b*c", "axxbyyc"));
        assert!(!glob_match("", "x"));
        assert!(glob_match("", ""));
        assert!(glob_match("**", ""));
    }

    #[test]
    fn no_configuration_skips_nothing() {
        let list = IgnoreList::from_specs(None, None);
        assert!(!list.should_skip(&frames(&["main"])));
        assert!(!list.should_skip(&[]));
    }
}
