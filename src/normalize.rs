use regex::Regex;
use std::sync::OnceLock;

fn resized_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-\d+x\d+(\.[a-zA-Z]{3,4})$").expect("resized suffix regex"))
}

/// Strips a trailing `-<w>x<h>` dimension suffix sitting right before the file extension,
/// recovering the full-size asset URL. URLs without the suffix come back unchanged.
///
/// Only the suffix anchored at the end is removed: `banner-1920x1080-300x169.jpg` is a
/// thumbnail of the upload `banner-1920x1080.jpg`.
pub fn normalize(url: &str) -> String {
    resized_suffix_re().replace(url, "$1").into_owned()
}
