//! HTML to text extraction.
//!
//! [`Extractor::extract`] turns a decoded HTML document into either a
//! [`Page`] (title, text blocks, numbered links) or, for recognized search
//! engine result pages, a ranked [`SearchResults`] list. Callers must check
//! which variant they got.

pub mod page;
pub mod search;
mod tokenizer;
pub mod tree;

use core::fmt;
use tw_core::Location;

pub use page::Link;
pub use page::LinkTarget;
pub use page::Page;
pub use search::DuckDuckGoResults;
pub use search::GoogleResults;
pub use search::ResultFields;
pub use search::SearchResult;
pub use search::SearchResults;
pub use search::SearchStrategy;

/// Share of unreadable characters above which a document is not treated as markup.
const MAX_UNREADABLE_PERCENT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Page(Page),
    SearchResults(SearchResults),
}

impl Extraction {
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Page(page) => page.title.as_deref(),
            Self::SearchResults(results) => results.title.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The decoded text is mostly control or replacement characters.
    Unreadable { unreadable_percent: usize },
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreadable { unreadable_percent } => write!(
                f,
                "document is not readable text ({unreadable_percent}% unreadable characters)"
            ),
        }
    }
}

impl std::error::Error for ExtractionError {}

/// Page extractor with an ordered set of search-result strategies.
pub struct Extractor {
    strategies: Vec<Box<dyn SearchStrategy>>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            strategies: vec![Box::new(GoogleResults), Box::new(DuckDuckGoResults)],
        }
    }
}

impl fmt::Debug for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let engines: Vec<&str> = self
            .strategies
            .iter()
            .map(|strategy| strategy.engine())
            .collect();
        f.debug_struct("Extractor")
            .field("strategies", &engines)
            .finish()
    }
}

impl Extractor {
    /// Extractor that never recognizes result pages.
    pub fn without_strategies() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Adds a strategy; earlier registrations win when several match.
    pub fn register(&mut self, strategy: Box<dyn SearchStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn strategy_for(&self, location: &Location) -> Option<&dyn SearchStrategy> {
        self.strategies
            .iter()
            .find(|strategy| strategy.matches(location))
            .map(|strategy| strategy.as_ref())
    }

    pub fn extract(&self, html: &str, location: &Location) -> Result<Extraction, ExtractionError> {
        check_readable(html)?;

        let document = tree::parse(html);
        match self.strategy_for(location) {
            Some(strategy) => {
                let title = page::find_title(&document);
                Ok(Extraction::SearchResults(search::extract_results(
                    strategy, &document, location, title,
                )))
            }
            None => Ok(Extraction::Page(page::extract_page(&document, location))),
        }
    }
}

/// Extracts with the built-in search strategies.
pub fn extract(html: &str, location: &Location) -> Result<Extraction, ExtractionError> {
    Extractor::default().extract(html, location)
}

fn check_readable(text: &str) -> Result<(), ExtractionError> {
    let mut total = 0_usize;
    let mut unreadable = 0_usize;
    for ch in text.chars() {
        total += 1;
        if ch == '\u{fffd}' || (ch.is_control() && !matches!(ch, '\n' | '\r' | '\t' | '\u{c}')) {
            unreadable += 1;
        }
    }

    if total == 0 {
        return Ok(());
    }

    let unreadable_percent = unreadable.saturating_mul(100) / total;
    if unreadable_percent > MAX_UNREADABLE_PERCENT {
        return Err(ExtractionError::Unreadable { unreadable_percent });
    }

    Ok(())
}
