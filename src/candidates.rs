//! Candidate glob expansion.
//!
//! Patterns are absolute shell-style globs. Expansion walks from the longest
//! literal directory prefix and returns regular files in path order, so the
//! same filesystem always yields the same candidate sequence. As in the shell,
//! wildcards do not match a leading `.`; a pattern component has to start
//! with `.` itself to reach hidden files or directories.
use anyhow::{anyhow, Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const GLOB_META: &[char] = &['*', '?', '[', ']', '{', '}', '\\'];

/// A compiled candidate pattern.
#[derive(Debug, Clone)]
pub struct CandidatePattern {
    pattern: String,
    kind: PatternKind,
}

#[derive(Debug, Clone)]
enum PatternKind {
    /// No glob metacharacters: the pattern names one path.
    Literal(PathBuf),
    Glob {
        base: PathBuf,
        matcher: GlobMatcher,
        max_depth: Option<usize>,
        /// Per component below `base`: whether the pattern spells a leading dot.
        dotted: Vec<bool>,
    },
}

/// Compile a candidate pattern, rejecting relative or malformed globs.
pub fn compile_pattern(pattern: &str) -> Result<CandidatePattern> {
    if !pattern.starts_with('/') {
        return Err(anyhow!(
            "candidate patterns must be absolute (got {pattern:?})"
        ));
    }
    let components: Vec<&str> = pattern.split('/').filter(|part| !part.is_empty()).collect();
    let literal_len = components
        .iter()
        .take_while(|part| !part.contains(GLOB_META))
        .count();
    if literal_len == components.len() {
        return Ok(CandidatePattern {
            pattern: pattern.to_string(),
            kind: PatternKind::Literal(PathBuf::from(pattern)),
        });
    }

    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("compile glob {pattern:?}"))?
        .compile_matcher();
    let mut base = PathBuf::from("/");
    base.extend(&components[..literal_len]);
    let rest = &components[literal_len..];
    let max_depth = if rest.iter().any(|part| part.contains("**")) {
        None
    } else {
        Some(rest.len())
    };
    let dotted = rest.iter().map(|part| part.starts_with('.')).collect();
    Ok(CandidatePattern {
        pattern: pattern.to_string(),
        kind: PatternKind::Glob {
            base,
            matcher,
            max_depth,
            dotted,
        },
    })
}

impl CandidatePattern {
    /// The pattern text as configured.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Expand against the current filesystem, skipping anything under `exclude`.
    ///
    /// Unreadable directories are skipped; a pattern with no matches yields an
    /// empty list.
    pub fn expand(&self, exclude: Option<&Path>) -> Vec<PathBuf> {
        let excluded = |path: &Path| exclude.is_some_and(|root| path.starts_with(root));
        match &self.kind {
            PatternKind::Literal(path) => {
                if path.is_file() && !excluded(path) {
                    vec![path.clone()]
                } else {
                    Vec::new()
                }
            }
            PatternKind::Glob {
                base,
                matcher,
                max_depth,
                dotted,
            } => {
                if !base.is_dir() {
                    return Vec::new();
                }
                let mut walker = WalkDir::new(base)
                    .min_depth(1)
                    .follow_links(false)
                    .sort_by_file_name();
                if let Some(depth) = max_depth {
                    walker = walker.max_depth(*depth);
                }
                let mut matches = Vec::new();
                for entry in walker
                    .into_iter()
                    .filter_entry(|entry| {
                        !excluded(entry.path())
                            && hidden_allowed(entry, dotted, max_depth.is_none())
                    })
                {
                    let entry = match entry {
                        Ok(entry) => entry,
                        Err(err) => {
                            tracing::debug!(pattern = %self.pattern, error = %err, "skip unreadable entry");
                            continue;
                        }
                    };
                    let path = entry.path();
                    if matcher.is_match(path) && path.is_file() {
                        matches.push(path.to_path_buf());
                    }
                }
                matches.sort();
                matches
            }
        }
    }
}

/// Whether `entry` may be visited: hidden names need a dotted pattern component.
///
/// Under `**` the component depth no longer lines up with the pattern, so any
/// dotted component admits hidden names.
fn hidden_allowed(entry: &walkdir::DirEntry, dotted: &[bool], globstar: bool) -> bool {
    let hidden = entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.');
    if !hidden {
        return true;
    }
    if globstar {
        dotted.iter().any(|dot| *dot)
    } else {
        dotted.get(entry.depth() - 1).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, b"x").expect("write file");
    }

    fn pattern_in(root: &Path, rel: &str) -> CandidatePattern {
        let text = format!("{}/{rel}", root.display());
        compile_pattern(&text).expect("compile pattern")
    }

    #[test]
    fn star_does_not_cross_directories() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = dir.path().canonicalize().expect("canonical root");
        touch(&root.join("logs/b.log"));
        touch(&root.join("logs/a.log"));
        touch(&root.join("logs/nested/c.log"));
        touch(&root.join("logs/readme.txt"));

        let found = pattern_in(&root, "logs/*.log").expand(None);
        assert_eq!(found, vec![root.join("logs/a.log"), root.join("logs/b.log")]);
    }

    #[test]
    fn double_star_descends() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = dir.path().canonicalize().expect("canonical root");
        touch(&root.join("logs/a.log"));
        touch(&root.join("logs/nested/deeper/c.log"));

        let found = pattern_in(&root, "logs/**/*.log").expand(None);
        assert_eq!(
            found,
            vec![root.join("logs/a.log"), root.join("logs/nested/deeper/c.log")]
        );
    }

    #[test]
    fn literal_pattern_matches_only_existing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = dir.path().canonicalize().expect("canonical root");
        touch(&root.join("etc/kubelet"));
        fs::create_dir_all(root.join("etc/dir")).expect("create dir");

        assert_eq!(
            pattern_in(&root, "etc/kubelet").expand(None),
            vec![root.join("etc/kubelet")]
        );
        assert!(pattern_in(&root, "etc/missing").expand(None).is_empty());
        assert!(pattern_in(&root, "etc/dir").expand(None).is_empty());
    }

    #[test]
    fn missing_base_yields_nothing() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = dir.path().canonicalize().expect("canonical root");
        assert!(pattern_in(&root, "absent/*").expand(None).is_empty());
    }

    #[test]
    fn excluded_tree_is_skipped() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = dir.path().canonicalize().expect("canonical root");
        touch(&root.join("a.log"));
        touch(&root.join("scratch/archive.zip"));

        let found = pattern_in(&root, "**/*").expand(Some(&root.join("scratch")));
        assert_eq!(found, vec![root.join("a.log")]);
    }

    #[test]
    fn directories_matched_by_star_are_not_candidates() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = dir.path().canonicalize().expect("canonical root");
        touch(&root.join("cni/10-net.conflist"));
        fs::create_dir_all(root.join("cni/sub")).expect("create dir");

        let found = pattern_in(&root, "cni/*").expand(None);
        assert_eq!(found, vec![root.join("cni/10-net.conflist")]);
    }

    #[test]
    fn wildcards_skip_hidden_names() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = dir.path().canonicalize().expect("canonical root");
        touch(&root.join("net.d/10-azure.conflist"));
        touch(&root.join("net.d/.10-azure.conflist.swp"));
        touch(&root.join("net.d/.cache/state.json"));
        touch(&root.join("logs/.git/HEAD"));
        touch(&root.join("logs/app/out.log"));

        assert_eq!(
            pattern_in(&root, "net.d/*").expand(None),
            vec![root.join("net.d/10-azure.conflist")]
        );
        assert_eq!(
            pattern_in(&root, "net.d/*/*").expand(None),
            Vec::<PathBuf>::new()
        );
        assert_eq!(
            pattern_in(&root, "logs/**/*").expand(None),
            vec![root.join("logs/app/out.log")]
        );
    }

    #[test]
    fn dotted_pattern_components_reach_hidden_names() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = dir.path().canonicalize().expect("canonical root");
        touch(&root.join("net.d/10-azure.conflist"));
        touch(&root.join("net.d/.10-azure.conflist.swp"));
        touch(&root.join("net.d/.cache/state.json"));

        assert_eq!(
            pattern_in(&root, "net.d/.*").expand(None),
            vec![root.join("net.d/.10-azure.conflist.swp")]
        );
        assert_eq!(
            pattern_in(&root, "net.d/.cache/*").expand(None),
            vec![root.join("net.d/.cache/state.json")]
        );
    }

    #[test]
    fn relative_and_malformed_patterns_are_rejected() {
        assert!(compile_pattern("var/log/*.log").is_err());
        assert!(compile_pattern("/var/log/[.log").is_err());
    }
}
