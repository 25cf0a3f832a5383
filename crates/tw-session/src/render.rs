//! Text rendering of navigation outcomes and the renderer capability.

use crate::session::NavigationError;
use crate::session::Outcome;
use crate::session::Session;
use std::fmt::Write;
use tw_html::Extraction;
use tw_html::page::Page;
use tw_html::search::SearchResults;
use tw_net::PageFetcher;

pub const BANNER_WIDTH: usize = 60;
pub const TRUNCATION_MARKER: &str = "...\n[Content truncated]";
pub const EMPTY_TEXT_MARKER: &str = "[No readable text content found]";

/// Limits applied when printing a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayCaps {
    pub links: usize,
    pub text_chars: usize,
}

impl Default for DisplayCaps {
    fn default() -> Self {
        Self {
            links: crate::config::DEFAULT_LINK_DISPLAY_CAP,
            text_chars: crate::config::DEFAULT_TEXT_DISPLAY_CAP,
        }
    }
}

/// Something that can show pages and walk history. Chosen once at startup.
pub trait PageRenderer {
    fn load(&mut self, input: &str) -> String;
    fn back(&mut self) -> String;
    fn forward(&mut self) -> String;
    fn reload(&mut self) -> String;
}

/// Renders every outcome as plain text.
#[derive(Debug)]
pub struct TextPageRenderer<F: PageFetcher> {
    session: Session<F>,
    caps: DisplayCaps,
}

impl<F: PageFetcher> TextPageRenderer<F> {
    pub fn new(session: Session<F>, caps: DisplayCaps) -> Self {
        Self { session, caps }
    }

    pub fn session(&self) -> &Session<F> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<F> {
        &mut self.session
    }

    pub fn caps(&self) -> DisplayCaps {
        self.caps
    }

    pub fn follow(&mut self, id: usize) -> String {
        let outcome = self.session.follow_link(id);
        self.render(outcome)
    }

    fn render(&self, outcome: Result<Outcome, NavigationError>) -> String {
        match outcome {
            Ok(outcome) => render_outcome(&outcome, self.caps),
            Err(error) => render_navigation_error(&error),
        }
    }
}

impl<F: PageFetcher> PageRenderer for TextPageRenderer<F> {
    fn load(&mut self, input: &str) -> String {
        let outcome = self.session.open(input);
        render_outcome(&outcome, self.caps)
    }

    fn back(&mut self) -> String {
        let outcome = self.session.back();
        self.render(outcome)
    }

    fn forward(&mut self) -> String {
        let outcome = self.session.forward();
        self.render(outcome)
    }

    fn reload(&mut self) -> String {
        let outcome = self.session.reload();
        self.render(outcome)
    }
}

pub fn render_navigation_error(error: &NavigationError) -> String {
    use tw_history::HistoryError;

    match error {
        NavigationError::History(HistoryError::NoPreviousEntry) => {
            "No previous page in history".to_owned()
        }
        NavigationError::History(HistoryError::NoNextEntry) => {
            "No next page in history".to_owned()
        }
        NavigationError::History(HistoryError::Empty) => "No page loaded yet".to_owned(),
        other => format!("Error: {other}"),
    }
}

pub fn render_outcome(outcome: &Outcome, caps: DisplayCaps) -> String {
    match outcome {
        Outcome::InvalidInput { message } => format!("Error: {message}"),
        Outcome::Blocked { location } => format!(
            "Access Blocked: {} is blocked by firewall settings",
            location.domain()
        ),
        Outcome::ProxyRequired { location } => format!(
            "{} is an onion address; enable the proxy first (proxy on)",
            location.domain()
        ),
        Outcome::LoadFailed {
            location, error, ..
        } => format!("Failed to load {location}\n{error}"),
        Outcome::LoadedOpaque {
            location,
            address,
            content_type,
        } => {
            let mut out = header(location.as_str(), location.domain(), address);
            let _ = write!(
                out,
                "\nContent type is {content_type}, not displaying content"
            );
            out
        }
        Outcome::Loaded {
            location,
            address,
            content,
            degraded,
        } => {
            let title = content
                .title()
                .filter(|title| !title.trim().is_empty())
                .unwrap_or(location.domain());
            let mut out = header(location.as_str(), title, address);
            if *degraded {
                out.push_str("\n[Page could not be parsed; showing raw text]\n");
            }
            match content {
                Extraction::Page(page) => render_page(&mut out, page, caps),
                Extraction::SearchResults(results) => render_results(&mut out, results),
            }
            out
        }
    }
}

fn header(url: &str, title: &str, address: &str) -> String {
    let rule = "=".repeat(BANNER_WIDTH);
    format!("{rule}\nURL: {url}\nTitle: {title}\nServer IP: {address}\n{rule}\n")
}

fn render_page(out: &mut String, page: &Page, caps: DisplayCaps) {
    out.push('\n');
    out.push_str(&truncate_text(&page.text_blocks.join("\n\n"), caps.text_chars));
    out.push('\n');

    if page.links.is_empty() {
        return;
    }

    out.push_str("\nLinks on page:\n");
    for link in page.links.iter().take(caps.links) {
        if link.label.is_empty() {
            let _ = writeln!(out, "  {}. {}", link.id, link.target);
        } else {
            let _ = writeln!(out, "  {}. {}: {}", link.id, link.label, link.target);
        }
    }

    let hidden = page.links.len().saturating_sub(caps.links);
    if hidden > 0 {
        let _ = writeln!(out, "  ... and {hidden} more links");
    }
}

fn render_results(out: &mut String, results: &SearchResults) {
    out.push('\n');
    match &results.query {
        Some(query) => {
            let _ = writeln!(out, "Search results for \"{query}\" ({}):", results.engine);
        }
        None => {
            let _ = writeln!(out, "Search results ({}):", results.engine);
        }
    }

    if results.results.is_empty() {
        out.push_str("No results found.\n");
        return;
    }

    for result in &results.results {
        let _ = writeln!(out, "\n{}. {}", result.rank, result.title);
        let _ = writeln!(out, "   {}", result.url);
        if !result.snippet.is_empty() {
            let _ = writeln!(out, "   {}", result.snippet);
        }
    }
}

/// Cuts `text` to `cap` characters, marking the cut.
pub fn truncate_text(text: &str, cap: usize) -> String {
    if text.trim().is_empty() {
        return EMPTY_TEXT_MARKER.to_owned();
    }

    match text.char_indices().nth(cap) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
        None => text.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::DisplayCaps;
    use super::EMPTY_TEXT_MARKER;
    use super::PageRenderer;
    use super::TextPageRenderer;
    use super::render_outcome;
    use super::truncate_text;
    use crate::lookup::RoutedLookup;
    use crate::session::Outcome;
    use crate::session::Session;
    use crate::session::SessionOptions;
    use crate::session::tests::FixedLookup;
    use crate::session::tests::ScriptedFetcher;
    use std::sync::Arc;
    use tw_core::Location;
    use tw_html::Extraction;
    use tw_html::page::Link;
    use tw_html::page::LinkTarget;
    use tw_html::page::Page;
    use tw_net::FetchError;
    use tw_storage::IncognitoStore;

    fn location(url: &str) -> Location {
        match Location::parse(url) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    fn renderer(fetcher: ScriptedFetcher) -> TextPageRenderer<ScriptedFetcher> {
        let lookup = Arc::new(RoutedLookup::new(Arc::new(FixedLookup)));
        let session = Session::new(
            fetcher,
            Arc::new(IncognitoStore::new()),
            lookup,
            SessionOptions::default(),
        );
        match session {
            Ok(value) => TextPageRenderer::new(value, DisplayCaps::default()),
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn long_text_is_truncated_on_a_char_boundary() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("héllo world", 5), "héllo...\n[Content truncated]");
        assert_eq!(truncate_text("  ", 10), EMPTY_TEXT_MARKER);
    }

    #[test]
    fn link_list_is_capped_with_remainder() {
        let base = location("https://example.com/");
        let links = (1..=13)
            .map(|id| Link {
                id,
                target: LinkTarget::Web(location(&format!("https://example.com/{id}"))),
                label: format!("Link {id}"),
            })
            .collect();
        let outcome = Outcome::Loaded {
            location: base,
            address: "192.0.2.10".to_owned(),
            content: Extraction::Page(Page {
                title: Some("Example".to_owned()),
                text_blocks: vec!["Hello".to_owned(), "World".to_owned()],
                links,
            }),
            degraded: false,
        };

        let text = render_outcome(&outcome, DisplayCaps::default());
        assert!(text.contains("URL: https://example.com/"));
        assert!(text.contains("Title: Example"));
        assert!(text.contains("Server IP: 192.0.2.10"));
        assert!(text.contains("Hello\n\nWorld"));
        assert!(text.contains("  10. Link 10: https://example.com/10"));
        assert!(!text.contains("Link 11"));
        assert!(text.contains("  ... and 3 more links"));
    }

    #[test]
    fn failures_and_refusals_are_explicit() {
        let blocked = Outcome::Blocked {
            location: location("http://ads.example.com/"),
        };
        assert_eq!(
            render_outcome(&blocked, DisplayCaps::default()),
            "Access Blocked: ads.example.com is blocked by firewall settings"
        );

        let failed = Outcome::LoadFailed {
            location: location("http://example.com/"),
            address: "Unknown".to_owned(),
            error: FetchError::ConnectionTimeout {
                message: "read timed out".to_owned(),
            },
        };
        let text = render_outcome(&failed, DisplayCaps::default());
        assert!(text.contains("Failed to load http://example.com/"));
        assert!(text.contains("connection timed out: read timed out"));
    }

    #[test]
    fn renderer_walks_history() {
        let fetcher = ScriptedFetcher::default()
            .page("http://a.test/", "text/html", "<title>A</title><p>alpha</p>")
            .page("http://b.test/", "application/pdf", "%PDF");
        let mut renderer = renderer(fetcher);

        assert_eq!(renderer.back(), "No previous page in history");
        assert!(renderer.load("a.test").contains("Title: A"));

        let opaque = renderer.load("b.test");
        assert!(opaque.contains("Content type is application/pdf, not displaying content"));

        assert!(renderer.back().contains("Title: A"));
        assert!(renderer.forward().contains("application/pdf"));
        assert_eq!(renderer.forward(), "No next page in history");
        assert!(renderer.reload().contains("URL: http://b.test/"));
        assert_eq!(renderer.session().history().len(), 2);
    }

    #[test]
    fn following_a_missing_link_explains_itself() {
        let mut renderer = renderer(ScriptedFetcher::default());
        assert_eq!(
            renderer.follow(3),
            "Error: the current page has no numbered links"
        );
    }
}
