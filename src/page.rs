//! HTML page access: content-region lookup and `<img>` enumeration.

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

/// Where post bodies usually live on blog engines, most specific first.
pub const DEFAULT_CONTENT_SELECTORS: &[&str] = &[
    ".entry-content",
    ".post-content",
    ".content",
    "article .content",
    ".single-post .content",
    ".post-body",
    "#content .post",
    "main article",
];

const PRIMARY_SRC_ATTR: &str = "src";
const LAZY_SRC_ATTRS: [&str; 2] = ["data-src", "data-lazy-src"];

/// One `<img>` as the discoverer sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageElement {
    /// `src` resolved against the page, the way a browser exposes `img.src`.
    pub src: Option<String>,
    /// `data-src`, verbatim.
    pub lazy_src: Option<String>,
    /// `data-lazy-src`, verbatim.
    pub lazy_src_alt: Option<String>,
    pub alt: Option<String>,
    pub width: Dimension,
    pub height: Dimension,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dimension {
    pub numeric: Option<u32>,
    pub raw: Option<String>,
}

impl Dimension {
    /// Numeric value when it parsed, otherwise the attribute text, otherwise empty.
    pub fn display_value(&self) -> String {
        match (self.numeric, self.raw.as_deref()) {
            (Some(value), _) => value.to_string(),
            (None, Some(raw)) => raw.to_string(),
            (None, None) => String::new(),
        }
    }
}

/// Matched content region of a page.
#[derive(Debug, Clone, Copy)]
pub struct ContentRegion<'a> {
    pub root: ElementRef<'a>,
    /// Selector that matched, `None` when the whole page is used.
    pub selector: Option<&'a str>,
}

pub struct PageDocument {
    html: Html,
    base_url: Url,
}

impl PageDocument {
    pub fn parse(html: &str, base_url: Url) -> Self {
        Self {
            html: Html::parse_document(html),
            base_url,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// First element matching one of `selectors`, tried in order; falls back to `<body>`
    /// and finally the document root. Selectors that fail to parse are skipped.
    pub fn content_region<'a, S: AsRef<str>>(&'a self, selectors: &'a [S]) -> ContentRegion<'a> {
        for raw in selectors {
            let raw = raw.as_ref();
            let selector = match Selector::parse(raw) {
                Ok(selector) => selector,
                Err(err) => {
                    warn!(selector = raw, error = %err, "content_selector_invalid");
                    continue;
                }
            };
            if let Some(root) = self.html.select(&selector).next() {
                debug!(selector = raw, "content_region_found");
                return ContentRegion {
                    root,
                    selector: Some(raw),
                };
            }
        }

        warn!("content_region_missing_using_whole_page");
        let body = Selector::parse("body").expect("body selector");
        let root = self
            .html
            .select(&body)
            .next()
            .unwrap_or_else(|| self.html.root_element());
        ContentRegion {
            root,
            selector: None,
        }
    }

    /// Every `<img>` under `region`, in document order.
    pub fn image_elements(&self, region: &ContentRegion<'_>) -> Vec<ImageElement> {
        let selector_img = Selector::parse("img").expect("img selector");
        region
            .root
            .select(&selector_img)
            .map(|img| self.image_element(&img))
            .collect()
    }

    fn image_element(&self, img: &ElementRef<'_>) -> ImageElement {
        let attr = |key: &str| {
            img.value()
                .attr(key)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        ImageElement {
            src: img
                .value()
                .attr(PRIMARY_SRC_ATTR)
                .and_then(|raw| resolve_against(&self.base_url, raw)),
            lazy_src: attr(LAZY_SRC_ATTRS[0]),
            lazy_src_alt: attr(LAZY_SRC_ATTRS[1]),
            alt: attr("alt"),
            width: parse_dimension(img, "width"),
            height: parse_dimension(img, "height"),
        }
    }
}

fn resolve_against(base_url: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    base_url.join(raw).ok().map(String::from)
}

fn parse_dimension(tag: &ElementRef<'_>, key: &str) -> Dimension {
    let raw = tag
        .value()
        .attr(key)
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let numeric = raw
        .map(|v| v.trim_end_matches("px"))
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| *v > 0);
    Dimension {
        numeric,
        raw: raw.map(str::to_string),
    }
}
