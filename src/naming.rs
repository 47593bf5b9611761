use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;
use url::Url;

pub const DEFAULT_PREFIX: &str = "blog-images";
const DEFAULT_EXTENSION: &str = ".jpg";

/// Filesystem-safe token derived from the page location and prepended to every file name
/// of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPrefix(String);

impl RunPrefix {
    pub fn from_page_url(page_url: &Url) -> Self {
        Self::from_path(page_url.path())
    }

    /// Uses the last non-empty `/` segment of `path`, as it appears in the URL.
    pub fn from_path(path: &str) -> Self {
        let Some(last) = path.split('/').filter(|s| !s.is_empty()).last() else {
            return Self(DEFAULT_PREFIX.to_string());
        };
        let cleaned = sanitize_prefix(last);
        if cleaned.is_empty() {
            Self(DEFAULT_PREFIX.to_string())
        } else {
            Self(cleaned)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn sanitize_prefix(segment: &str) -> String {
    static INVALID: OnceLock<Regex> = OnceLock::new();
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    static DASH_RUNS: OnceLock<Regex> = OnceLock::new();

    let invalid = INVALID.get_or_init(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("invalid chars regex"));
    let whitespace = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));
    let dash_runs = DASH_RUNS.get_or_init(|| Regex::new(r"--+").expect("dash runs regex"));

    let out = invalid.replace_all(segment, "-");
    let out = whitespace.replace_all(&out, "-");
    let out = dash_runs.replace_all(&out, "-");
    out.trim_matches('-').to_string()
}

/// Name of the asset as the server calls it: last path segment, query dropped, `.jpg`
/// appended when there is no extension at all.
pub fn base_file_name(canonical_url: &str) -> String {
    let last = canonical_url.rsplit('/').next().unwrap_or("");
    let without_query = last.split('?').next().unwrap_or("");
    if without_query.contains('.') {
        without_query.to_string()
    } else {
        format!("{without_query}{DEFAULT_EXTENSION}")
    }
}

/// Derives `<prefix>_<name>` for `canonical_url`, inserting `-1`, `-2`, … before the
/// extension until the name is not in `already_assigned`.
///
/// The result depends on the order of previous assignments; callers assign in discovery
/// order and start every discovery pass with an empty set.
pub fn assign_file_name(
    canonical_url: &str,
    prefix: &RunPrefix,
    already_assigned: &HashSet<String>,
) -> String {
    let file_name = format!("{}_{}", prefix.as_str(), base_file_name(canonical_url));
    disambiguate(&file_name, already_assigned)
}

fn disambiguate(file_name: &str, already_assigned: &HashSet<String>) -> String {
    if !already_assigned.contains(file_name) {
        return file_name.to_string();
    }

    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (file_name, None),
    };
    let mut counter = 1_usize;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{stem}-{counter}.{ext}"),
            None => format!("{stem}-{counter}"),
        };
        if !already_assigned.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}
