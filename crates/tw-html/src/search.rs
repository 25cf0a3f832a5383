//! Search-engine result pages, one pluggable strategy per engine.

use crate::tree::Element;
use tw_core::Location;

const UNTITLED_RESULT: &str = "No title";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub rank: usize,
    pub title: String,
    pub url: Location,
    pub snippet: String,
}

/// Ranked organic results of one result page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResults {
    pub engine: &'static str,
    pub title: Option<String>,
    pub query: Option<String>,
    pub results: Vec<SearchResult>,
}

impl SearchResults {
    pub fn result(&self, rank: usize) -> Option<&SearchResult> {
        rank.checked_sub(1).and_then(|index| self.results.get(index))
    }
}

/// Fields read from one result block before ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultFields {
    pub title: Option<String>,
    pub url: Location,
    pub snippet: String,
}

/// Engine-specific knowledge of a result page layout.
pub trait SearchStrategy: Send + Sync {
    fn engine(&self) -> &'static str;

    /// True if `location` is a result page this strategy understands.
    fn matches(&self, location: &Location) -> bool;

    /// One element per organic result, in document order.
    fn result_blocks<'a>(&self, document: &'a Element) -> Vec<&'a Element>;

    /// Reads a block; blocks without a followable link return `None`.
    fn read_block(&self, block: &Element, location: &Location) -> Option<ResultFields>;
}

pub(crate) fn extract_results(
    strategy: &dyn SearchStrategy,
    document: &Element,
    location: &Location,
    title: Option<String>,
) -> SearchResults {
    let mut results: Vec<SearchResult> = Vec::new();

    for block in strategy.result_blocks(document) {
        let Some(fields) = strategy.read_block(block, location) else {
            continue;
        };
        if results.iter().any(|existing| existing.url == fields.url) {
            continue;
        }

        results.push(SearchResult {
            rank: results.len() + 1,
            title: fields.title.unwrap_or_else(|| UNTITLED_RESULT.to_owned()),
            url: fields.url,
            snippet: fields.snippet,
        });
    }

    SearchResults {
        engine: strategy.engine(),
        title,
        query: location.query_param("q"),
        results,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GoogleResults;

impl SearchStrategy for GoogleResults {
    fn engine(&self) -> &'static str {
        "Google"
    }

    fn matches(&self, location: &Location) -> bool {
        is_google_host(location.domain()) && location.path().starts_with("/search")
    }

    fn result_blocks<'a>(&self, document: &'a Element) -> Vec<&'a Element> {
        document.find_outermost(|element| {
            element.tag == "div" && (element.has_class("g") || element.has_class("tF2Cxc"))
        })
    }

    fn read_block(&self, block: &Element, location: &Location) -> Option<ResultFields> {
        let anchor = block.find_first(|element| element.tag == "a" && element.attr("href").is_some())?;
        let url = unwrap_redirect(location, anchor.attr("href")?, "/url", &["q", "url"])?;

        let title = block
            .find_first(|element| element.tag == "h3")
            .map(Element::text)
            .filter(|text| !text.is_empty());

        let snippet = block
            .find_first(|element| {
                element.tag == "div"
                    && element.attr("class").is_some()
                    && !element.contains(|inner| inner.tag == "h3" || inner.tag == "a")
                    && !element.text().is_empty()
            })
            .map(Element::text)
            .unwrap_or_default();

        Some(ResultFields {
            title,
            url,
            snippet,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DuckDuckGoResults;

impl SearchStrategy for DuckDuckGoResults {
    fn engine(&self) -> &'static str {
        "DuckDuckGo"
    }

    fn matches(&self, location: &Location) -> bool {
        let domain = location.domain();
        let is_ddg_host = domain == "duckduckgo.com" || domain.ends_with(".duckduckgo.com");
        is_ddg_host && location.query_param("q").is_some()
    }

    fn result_blocks<'a>(&self, document: &'a Element) -> Vec<&'a Element> {
        document.find_outermost(|element| {
            element.tag == "div"
                && element.classes().any(|class| {
                    class == "result" || class == "web-result" || class.starts_with("result--")
                })
        })
    }

    fn read_block(&self, block: &Element, location: &Location) -> Option<ResultFields> {
        let heading = block.find_first(|element| element.tag == "h2");
        let is_link = |element: &Element| element.tag == "a" && element.attr("href").is_some();
        let anchor = heading
            .and_then(|heading| heading.find_first(is_link))
            .or_else(|| block.find_first(is_link))?;
        let url = unwrap_redirect(location, anchor.attr("href")?, "/l/", &["uddg"])?;

        let title = heading
            .map(Element::text)
            .filter(|text| !text.is_empty());

        let snippet = block
            .find_first(|element| {
                element
                    .classes()
                    .any(|class| class.contains("abstract") || class.contains("snippet"))
            })
            .map(Element::text)
            .unwrap_or_default();

        Some(ResultFields {
            title,
            url,
            snippet,
        })
    }
}

/// `google.<tld>` or `google.co.<cc>` / `google.com.<cc>`, with any subdomain.
fn is_google_host(domain: &str) -> bool {
    let labels: Vec<&str> = domain.split('.').collect();
    let Some(position) = labels.iter().rposition(|label| *label == "google") else {
        return false;
    };

    match &labels[position + 1..] {
        [tld] => !tld.is_empty(),
        [second, country] => matches!(*second, "co" | "com") && country.len() == 2,
        _ => false,
    }
}

/// Resolves `href` and unwraps the engine's click-tracking redirect, if any.
fn unwrap_redirect(
    location: &Location,
    href: &str,
    redirect_path: &str,
    target_params: &[&str],
) -> Option<Location> {
    if href.trim().is_empty() {
        return None;
    }
    let resolved = location.join(href).ok()?;
    if resolved.domain() != location.domain() || !resolved.path().starts_with(redirect_path) {
        return Some(resolved);
    }

    target_params
        .iter()
        .find_map(|param| resolved.query_param(param))
        .and_then(|target| Location::parse(&target).ok())
        .or(Some(resolved))
}

#[cfg(test)]
mod tests {
    use super::DuckDuckGoResults;
    use super::GoogleResults;
    use super::SearchStrategy;
    use super::extract_results;
    use crate::tree::parse;
    use tw_core::Location;

    fn location(raw: &str) -> Location {
        let parsed = Location::parse(raw);
        assert!(parsed.is_ok());
        match parsed {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn google_matches_result_pages_only() {
        let strategy = GoogleResults;
        assert!(strategy.matches(&location("https://www.google.com/search?q=rust")));
        assert!(strategy.matches(&location("https://google.co.uk/search?q=rust")));
        assert!(!strategy.matches(&location("https://www.google.com/maps")));
        assert!(!strategy.matches(&location("https://notgoogle.com/search?q=x")));
    }

    #[test]
    fn google_lookalike_hosts_are_not_google() {
        let strategy = GoogleResults;
        assert!(strategy.matches(&location("https://www.google.com.au/search?q=rust")));
        assert!(strategy.matches(&location("https://google.de/search?q=rust")));
        assert!(!strategy.matches(&location("https://google.evil.com/search?q=x")));
        assert!(!strategy.matches(&location("https://www.google.com.evil.net/search?q=x")));
        assert!(!strategy.matches(&location("https://mail.evil.google/search?q=x")));
    }

    #[test]
    fn duckduckgo_requires_a_query() {
        let strategy = DuckDuckGoResults;
        assert!(strategy.matches(&location("https://duckduckgo.com/html/?q=rust")));
        assert!(!strategy.matches(&location("https://duckduckgo.com/about")));
    }

    #[test]
    fn reads_google_result_blocks() {
        let html = r#"
            <div id="search">
              <div class="g"><div class="tF2Cxc">
                <div class="yuRUbf"><a href="/url?q=https://www.rust-lang.org/&amp;sa=U"><h3>Rust Programming Language</h3></a></div>
                <div class="VwiC3b">A language empowering everyone.</div>
              </div></div>
              <div class="g">
                <a href="https://doc.rust-lang.org/book/"><h3>The Book</h3></a>
                <div class="s"><span>Learn Rust.</span></div>
              </div>
              <div class="g"><span>no link here</span></div>
              <div class="g"><a href="https://untitled.example/">bare</a></div>
            </div>"#;
        let page = location("https://www.google.com/search?q=rust");
        let results = extract_results(&GoogleResults, &parse(html), &page, None);

        assert_eq!(results.engine, "Google");
        assert_eq!(results.query.as_deref(), Some("rust"));
        assert_eq!(results.results.len(), 3);

        let first = &results.results[0];
        assert_eq!(first.rank, 1);
        assert_eq!(first.title, "Rust Programming Language");
        assert_eq!(first.url.as_str(), "https://www.rust-lang.org/");
        assert_eq!(first.snippet, "A language empowering everyone.");

        let second = &results.results[1];
        assert_eq!(second.rank, 2);
        assert_eq!(second.url.as_str(), "https://doc.rust-lang.org/book/");
        assert_eq!(second.snippet, "Learn Rust.");

        assert_eq!(results.results[2].title, "No title");
        assert_eq!(results.result(3).map(|result| result.rank), Some(3));
        assert!(results.result(4).is_none());
    }

    #[test]
    fn reads_duckduckgo_result_blocks() {
        let html = r#"
            <div id="links" class="results">
              <div class="result results_links results_links_deep web-result">
                <div class="links_main links_deep result__body">
                  <h2 class="result__title">
                    <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F&amp;rut=abc">Rust Language</a>
                  </h2>
                  <a class="result__snippet" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F">Fast and <b>reliable</b>.</a>
                </div>
              </div>
              <div class="result">
                <h2><a href="https://crates.io/">crates.io</a></h2>
                <div class="result__abstract">The package registry.</div>
              </div>
            </div>"#;
        let page = location("https://duckduckgo.com/html/?q=rust");
        let results = extract_results(&DuckDuckGoResults, &parse(html), &page, None);

        assert_eq!(results.results.len(), 2);
        assert_eq!(results.results[0].title, "Rust Language");
        assert_eq!(results.results[0].url.as_str(), "https://www.rust-lang.org/");
        assert_eq!(results.results[0].snippet, "Fast and reliable.");
        assert_eq!(results.results[1].url.as_str(), "https://crates.io/");
        assert_eq!(results.results[1].snippet, "The package registry.");
    }

    #[test]
    fn empty_result_page_is_valid() {
        let page = location("https://duckduckgo.com/html/?q=zzzz");
        let results = extract_results(&DuckDuckGoResults, &parse("<p>No results.</p>"), &page, None);
        assert!(results.results.is_empty());
    }
}
