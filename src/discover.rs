use crate::naming::{assign_file_name, RunPrefix};
use crate::normalize::normalize;
use crate::page::ImageElement;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// 1-based position in discovery order.
    pub index: usize,
    /// URL as found on the page (protocol-relative already qualified).
    pub source_url: String,
    /// Full-size URL; dedup key and fetch target.
    pub canonical_url: String,
    pub file_name: String,
    pub alt_text: String,
    pub width: String,
    pub height: String,
}

impl ImageRecord {
    pub fn was_optimized(&self) -> bool {
        self.source_url != self.canonical_url
    }
}

#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub records: Vec<ImageRecord>,
    pub skipped_invalid: usize,
    pub skipped_duplicate: usize,
}

/// Picks the first usable URL of `src`, `data-src`, `data-lazy-src` and qualifies
/// protocol-relative URLs with `https:`. Anything that is not http(s) is dropped.
pub fn resolve_source_url(element: &ImageElement) -> Option<String> {
    let raw = [&element.src, &element.lazy_src, &element.lazy_src_alt]
        .into_iter()
        .filter_map(|v| v.as_deref())
        .map(str::trim)
        .find(|v| !v.is_empty())?;

    if raw.starts_with("//") {
        Some(format!("https:{raw}"))
    } else if raw.starts_with("http") {
        Some(raw.to_string())
    } else {
        None
    }
}

/// Runs one discovery pass over `elements` in document order.
///
/// Elements without a usable URL are omitted, and so is every element whose canonical URL
/// was already emitted in this pass. File names are assigned in emission order.
pub fn discover<I>(elements: I, prefix: &RunPrefix) -> Discovery
where
    I: IntoIterator<Item = ImageElement>,
{
    let mut out = Discovery::default();
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut assigned_names: HashSet<String> = HashSet::new();

    for element in elements {
        let Some(source_url) = resolve_source_url(&element) else {
            out.skipped_invalid += 1;
            continue;
        };

        let canonical_url = normalize(&source_url);
        if !seen_urls.insert(canonical_url.clone()) {
            debug!(url = %canonical_url, "image_duplicate_skipped");
            out.skipped_duplicate += 1;
            continue;
        }

        let file_name = assign_file_name(&canonical_url, prefix, &assigned_names);
        assigned_names.insert(file_name.clone());

        if source_url != canonical_url {
            debug!(from = %source_url, to = %canonical_url, "image_url_optimized");
        }

        out.records.push(ImageRecord {
            index: out.records.len() + 1,
            source_url,
            canonical_url,
            file_name,
            alt_text: element.alt.unwrap_or_default(),
            width: element.width.display_value(),
            height: element.height.display_value(),
        });
    }

    info!(
        prefix = %prefix,
        found = out.records.len(),
        skipped_invalid = out.skipped_invalid,
        skipped_duplicate = out.skipped_duplicate,
        "image_discovery_done"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Dimension;

    fn img(src: &str) -> ImageElement {
        ImageElement {
            src: Some(src.to_string()),
            ..ImageElement::default()
        }
    }

    fn prefix() -> RunPrefix {
        RunPrefix::from_path("/posts/trip")
    }

    #[test]
    fn source_priority_is_src_then_lazy_attributes() {
        let element = ImageElement {
            src: None,
            lazy_src: Some("  ".to_string()),
            lazy_src_alt: Some("https://a.com/lazy.jpg".to_string()),
            ..ImageElement::default()
        };
        assert_eq!(
            resolve_source_url(&element).as_deref(),
            Some("https://a.com/lazy.jpg")
        );

        let element = ImageElement {
            src: Some("https://a.com/main.jpg".to_string()),
            lazy_src: Some("https://a.com/lazy.jpg".to_string()),
            ..ImageElement::default()
        };
        assert_eq!(
            resolve_source_url(&element).as_deref(),
            Some("https://a.com/main.jpg")
        );
    }

    #[test]
    fn protocol_relative_urls_become_https() {
        let element = ImageElement {
            lazy_src: Some("//cdn.a.com/x.png".to_string()),
            ..ImageElement::default()
        };
        assert_eq!(
            resolve_source_url(&element).as_deref(),
            Some("https://cdn.a.com/x.png")
        );
    }

    #[test]
    fn non_http_sources_are_skipped() {
        let out = discover(
            vec![
                img("data:image/png;base64,AAAA"),
                img("/relative.jpg"),
                ImageElement::default(),
                img("https://a.com/ok.jpg"),
            ],
            &prefix(),
        );
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.skipped_invalid, 3);
        assert_eq!(out.records[0].index, 1);
        assert_eq!(out.records[0].file_name, "trip_ok.jpg");
    }

    #[test]
    fn resized_variants_of_one_asset_are_deduplicated() {
        let out = discover(
            vec![
                img("https://a.com/up/photo-300x200.jpg"),
                img("https://a.com/up/other.png"),
                img("https://a.com/up/photo-1024x682.jpg"),
                img("https://a.com/up/photo.jpg"),
            ],
            &prefix(),
        );
        let urls: Vec<_> = out.records.iter().map(|r| r.canonical_url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.com/up/photo.jpg", "https://a.com/up/other.png"]);
        assert_eq!(out.skipped_duplicate, 2);

        let first = &out.records[0];
        assert_eq!(first.source_url, "https://a.com/up/photo-300x200.jpg");
        assert!(first.was_optimized());
        assert!(!out.records[1].was_optimized());
        assert_eq!(out.records[1].index, 2);
    }

    #[test]
    fn same_file_name_from_different_hosts_is_disambiguated() {
        let out = discover(
            vec![
                img("https://one.com/img.jpg"),
                img("https://two.com/img.jpg"),
                img("https://three.com/img.jpg?v=1"),
            ],
            &prefix(),
        );
        let names: Vec<_> = out.records.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["trip_img.jpg", "trip_img-1.jpg", "trip_img-2.jpg"]);

        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn every_pass_starts_a_fresh_counter() {
        let elements = vec![img("https://one.com/img.jpg"), img("https://two.com/img.jpg")];
        let first = discover(elements.clone(), &prefix());
        let second = discover(elements, &prefix());
        assert_eq!(first.records, second.records);
    }

    #[test]
    fn metadata_prefers_numeric_dimensions() {
        let element = ImageElement {
            src: Some("https://a.com/x.jpg".to_string()),
            alt: Some("Beach".to_string()),
            width: Dimension {
                numeric: Some(800),
                raw: Some("800px".to_string()),
            },
            height: Dimension {
                numeric: None,
                raw: Some("auto".to_string()),
            },
            ..ImageElement::default()
        };
        let out = discover(vec![element, img("https://a.com/y.jpg")], &prefix());
        assert_eq!(out.records[0].alt_text, "Beach");
        assert_eq!(out.records[0].width, "800");
        assert_eq!(out.records[0].height, "auto");
        assert_eq!(out.records[1].alt_text, "");
        assert_eq!(out.records[1].width, "");
    }
}
