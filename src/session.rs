use crate::config::DownloaderConfig;
use crate::discover::{discover, Discovery, ImageRecord};
use crate::naming::RunPrefix;
use crate::page::PageDocument;
use crate::persist::Persistence;
use crate::report::{render_preview, render_selection, summarize, RunReport};
use crate::retrieve::{retrieve_all, RetrievalOptions, RetrievalRun};
use crate::transport::{redact_url_for_log, Transport};
use crate::{EngineError, Result};
use std::io::Write;
use std::thread;
use tracing::{info, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub run: RetrievalRun,
    pub report: RunReport,
}

/// One page's worth of work: the prefix is fixed at construction and every entry point
/// starts from a fresh discovery pass.
pub struct Downloader<T, P> {
    config: DownloaderConfig,
    prefix: RunPrefix,
    transport: T,
    persistence: P,
}

impl<T: Transport, P: Persistence> Downloader<T, P> {
    pub fn new(page_url: &Url, config: DownloaderConfig, transport: T, persistence: P) -> Self {
        let prefix = RunPrefix::from_page_url(page_url);
        info!(
            prefix = %prefix,
            page = %redact_url_for_log(page_url.as_str()),
            "session_start"
        );
        Self {
            config: config.normalized(),
            prefix,
            transport,
            persistence,
        }
    }

    pub fn prefix(&self) -> &RunPrefix {
        &self.prefix
    }

    /// Scans the page's content region and returns the records without downloading.
    pub fn discover(&self, page: &PageDocument) -> Discovery {
        let region = page.content_region(self.config.content_selectors.as_slice());
        if let Some(selector) = region.selector {
            info!(selector, "content_region_selected");
        }
        discover(page.image_elements(&region), &self.prefix)
    }

    /// Discovers every image, optionally prints the preview listing, then downloads all of
    /// them and prints the report.
    pub fn run<W: Write>(
        &self,
        page: &PageDocument,
        show_preview: bool,
        out: &mut W,
    ) -> Result<BatchOutcome> {
        writeln!(out, "File prefix: \"{}_\"", self.prefix)?;
        writeln!(out, "Page: {}", page.base_url())?;

        let discovery = self.discover(page);
        if discovery.records.is_empty() {
            writeln!(out, "No images found on the page.")?;
            return Ok(self.empty_outcome());
        }

        if show_preview {
            writeln!(out)?;
            render_preview(&discovery.records, out)?;
        }

        self.download(&discovery.records, out)
    }

    /// Downloads only the records whose 1-based index is in `indices`, in discovery order.
    /// Unknown indices are ignored.
    pub fn download_selected<W: Write>(
        &self,
        page: &PageDocument,
        indices: &[usize],
        out: &mut W,
    ) -> Result<BatchOutcome> {
        let discovery = self.discover(page);
        if discovery.records.is_empty() {
            writeln!(out, "No images found on the page.")?;
            return Ok(self.empty_outcome());
        }

        let selected: Vec<ImageRecord> = discovery
            .records
            .into_iter()
            .filter(|record| indices.contains(&record.index))
            .collect();
        if selected.is_empty() {
            warn!(?indices, "image_selection_empty");
            writeln!(out, "No images match the selected indices: {indices:?}")?;
            return Ok(self.empty_outcome());
        }

        render_selection(&selected, &self.prefix, out)?;
        self.download(&selected, out)
    }

    fn download<W: Write>(&self, records: &[ImageRecord], out: &mut W) -> Result<BatchOutcome> {
        let options = RetrievalOptions {
            delay: self.config.delay(),
            user_agent: self.config.user_agent.clone(),
        };
        writeln!(out)?;
        writeln!(
            out,
            "Downloading {} images, {}ms between requests...",
            records.len(),
            self.config.delay_ms
        )?;

        let run = retrieve_all(
            records,
            &options,
            &self.transport,
            &self.persistence,
            thread::sleep,
            || false,
        );
        let report = summarize(&run.results, &self.prefix);

        writeln!(out)?;
        write!(out, "{report}")?;
        Ok(BatchOutcome { run, report })
    }

    fn empty_outcome(&self) -> BatchOutcome {
        BatchOutcome {
            run: RetrievalRun::default(),
            report: summarize(&[], &self.prefix),
        }
    }
}

/// Parses `"1, 3 5"` into `[1, 3, 5]`. Indices are 1-based.
pub fn parse_indices(raw: &str) -> Result<Vec<usize>> {
    let mut out: Vec<usize> = Vec::new();
    for part in raw.split(|ch| matches!(ch, ',' | ';' | ' ' | '\t' | '\n')) {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            continue;
        }
        let index: usize = trimmed
            .parse()
            .map_err(|_| EngineError::InvalidSelection(format!("not a number: {trimmed}")))?;
        if index == 0 {
            return Err(EngineError::InvalidSelection(
                "indices start at 1".to_string(),
            ));
        }
        if !out.contains(&index) {
            out.push(index);
        }
    }
    if out.is_empty() {
        return Err(EngineError::InvalidSelection(
            "provide at least one image index".to_string(),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::FetchResponse;
    use std::cell::RefCell;

    const PAGE: &str = r#"
        <html><body>
          <nav><img src="/logo.png"></nav>
          <div class="entry-content">
            <img src="/up/one-1024x682.jpg" alt="One" width="1024" height="682">
            <img data-src="//cdn.example.com/two.png">
            <img src="/up/one.jpg">
            <img src="/up/three.gif">
          </div>
        </body></html>
    "#;

    #[derive(Default)]
    struct StubTransport {
        fetched: RefCell<Vec<String>>,
    }

    impl Transport for StubTransport {
        fn fetch_binary(&self, url: &str, _headers: &[(&str, &str)]) -> Result<FetchResponse> {
            self.fetched.borrow_mut().push(url.to_string());
            let missing = url.ends_with("three.gif");
            Ok(FetchResponse {
                ok: !missing,
                status: if missing { 404 } else { 200 },
                status_text: if missing { "Not Found" } else { "OK" }.to_string(),
                content_type: Some("image/png".to_string()),
                bytes: if missing { Vec::new() } else { vec![0_u8; 10] },
            })
        }
    }

    #[derive(Default)]
    struct StubPersistence {
        saved: RefCell<Vec<String>>,
    }

    impl Persistence for StubPersistence {
        fn save_locally(&self, _bytes: &[u8], file_name: &str) -> Result<()> {
            self.saved.borrow_mut().push(file_name.to_string());
            Ok(())
        }
    }

    fn page_url() -> Url {
        Url::parse("https://blog.example.com/2024/06/beach-day/").expect("url")
    }

    fn downloader() -> Downloader<StubTransport, StubPersistence> {
        let config = DownloaderConfig {
            delay_ms: 0,
            ..DownloaderConfig::default()
        };
        Downloader::new(
            &page_url(),
            config,
            StubTransport::default(),
            StubPersistence::default(),
        )
    }

    fn page() -> PageDocument {
        PageDocument::parse(PAGE, page_url())
    }

    #[test]
    fn discover_returns_records_without_fetching() {
        let dl = downloader();
        let discovery = dl.discover(&page());
        let names: Vec<_> = discovery.records.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["beach-day_one.jpg", "beach-day_two.png", "beach-day_three.gif"]
        );
        assert_eq!(discovery.skipped_duplicate, 1);
        assert_eq!(discovery.records[0].width, "1024");
        assert_eq!(discovery.records[1].canonical_url, "https://cdn.example.com/two.png");
        assert!(dl.transport.fetched.borrow().is_empty());
    }

    #[test]
    fn run_downloads_everything_and_reports() {
        let dl = downloader();
        let mut out = Vec::new();
        let outcome = dl.run(&page(), true, &mut out).expect("run");
        let text = String::from_utf8(out).expect("utf8");

        assert_eq!(outcome.run.results.len(), 3);
        assert_eq!(outcome.report.succeeded, 2);
        assert_eq!(outcome.report.failed, 1);
        assert_eq!(
            *dl.persistence.saved.borrow(),
            vec!["beach-day_one.jpg".to_string(), "beach-day_two.png".to_string()]
        );
        assert!(text.contains("File prefix: \"beach-day_\""), "text={text}");
        assert!(text.contains("Found 3 images:"), "text={text}");
        assert!(
            text.contains("Original: https://blog.example.com/up/one-1024x682.jpg"),
            "text={text}"
        );
        assert!(text.contains("beach-day_three.gif: HTTP 404: Not Found"), "text={text}");
    }

    #[test]
    fn run_without_preview_skips_listing() {
        let dl = downloader();
        let mut out = Vec::new();
        dl.run(&page(), false, &mut out).expect("run");
        let text = String::from_utf8(out).expect("utf8");
        assert!(!text.contains("Found 3 images:"), "text={text}");
        assert!(text.contains("Succeeded: 2/3"), "text={text}");
    }

    #[test]
    fn selected_download_keeps_discovery_order_and_ignores_unknown() {
        let dl = downloader();
        let mut out = Vec::new();
        let outcome = dl
            .download_selected(&page(), &[3, 1, 42], &mut out)
            .expect("select");
        let names: Vec<_> = outcome
            .run
            .results
            .iter()
            .map(|r| r.record.file_name.as_str())
            .collect();
        assert_eq!(names, vec!["beach-day_one.jpg", "beach-day_three.gif"]);
        assert_eq!(outcome.run.results[1].record.index, 3);
        assert_eq!(
            *dl.transport.fetched.borrow(),
            vec![
                "https://blog.example.com/up/one.jpg".to_string(),
                "https://blog.example.com/up/three.gif".to_string(),
            ]
        );
    }

    #[test]
    fn selection_matching_nothing_downloads_nothing() {
        let dl = downloader();
        let mut out = Vec::new();
        let outcome = dl.download_selected(&page(), &[9], &mut out).expect("select");
        assert!(outcome.run.results.is_empty());
        assert_eq!(outcome.report.total, 0);
        assert!(dl.transport.fetched.borrow().is_empty());
    }

    #[test]
    fn empty_page_yields_empty_outcome() {
        let dl = downloader();
        let empty = PageDocument::parse("<html><body><p>no pictures</p></body></html>", page_url());
        let mut out = Vec::new();
        let outcome = dl.run(&empty, true, &mut out).expect("run");
        assert!(outcome.run.results.is_empty());
        assert!(String::from_utf8(out).expect("utf8").contains("No images found"));
    }

    #[test]
    fn index_parsing() {
        assert_eq!(parse_indices("1, 3 5;3").expect("parse"), vec![1, 3, 5]);
        assert!(matches!(
            parse_indices("0"),
            Err(EngineError::InvalidSelection(_))
        ));
        assert!(matches!(
            parse_indices("two"),
            Err(EngineError::InvalidSelection(_))
        ));
        assert!(matches!(
            parse_indices(" , "),
            Err(EngineError::InvalidSelection(_))
        ));
    }
}
