//! Generic page extraction: title, text blocks, and numbered links.

use crate::tree::Element;
use crate::tree::Node;
use crate::tree::collapse_whitespace;
use core::fmt;
use std::fmt::Write;
use tw_core::Location;

/// Where an anchor points once resolved against the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// An http(s) page the session can load.
    Web(Location),
    /// Any other scheme (`mailto:`, `ftp:`, `javascript:`), kept as text.
    Other(String),
}

impl LinkTarget {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Web(location) => location.as_str(),
            Self::Other(raw) => raw,
        }
    }

    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::Web(location) => Some(location),
            Self::Other(_) => None,
        }
    }
}

impl fmt::Display for LinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An anchor with an `href`, numbered in document order starting at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub id: usize,
    pub target: LinkTarget,
    pub label: String,
}

/// Textual view of one HTML document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Page {
    pub title: Option<String>,
    pub text_blocks: Vec<String>,
    pub links: Vec<Link>,
}

impl Page {
    pub fn link(&self, id: usize) -> Option<&Link> {
        id.checked_sub(1).and_then(|index| self.links.get(index))
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Best-effort page for content that could not be read as markup.
    pub fn from_raw_text(raw: &str) -> Self {
        let text_blocks = raw
            .lines()
            .map(|line| {
                let visible: String = line
                    .chars()
                    .filter(|ch| !ch.is_control() && *ch != '\u{fffd}')
                    .collect();
                collapse_whitespace(&visible)
            })
            .filter(|line| !line.is_empty())
            .collect();

        Self {
            title: None,
            text_blocks,
            links: Vec::new(),
        }
    }
}

pub(crate) fn extract_page(document: &Element, location: &Location) -> Page {
    let mut walker = TextWalker {
        location,
        blocks: Vec::new(),
        line: String::new(),
        links: Vec::new(),
    };
    walker.walk(&document.children);
    walker.flush();

    Page {
        title: find_title(document),
        text_blocks: walker.blocks,
        links: walker.links,
    }
}

pub(crate) fn find_title(document: &Element) -> Option<String> {
    document
        .find_first(|element| element.tag == "title")
        .map(Element::text)
        .filter(|title| !title.is_empty())
}

struct TextWalker<'a> {
    location: &'a Location,
    blocks: Vec<String>,
    line: String,
    links: Vec<Link>,
}

impl TextWalker<'_> {
    fn walk(&mut self, nodes: &[Node]) {
        for node in nodes {
            match node {
                Node::Text(text) => self.line.push_str(text),
                Node::Element(element) => self.visit(element),
            }
        }
    }

    fn visit(&mut self, element: &Element) {
        let tag = element.tag.as_str();
        if is_ignored(tag) {
            return;
        }

        if tag == "br" {
            self.flush();
            return;
        }

        let block = is_block(tag);
        if block {
            self.flush();
        }

        let target = if tag == "a" {
            element
                .attr("href")
                .map(|href| resolve_link(self.location, href))
        } else {
            None
        };

        if let Some(target) = target {
            let id = self.links.len() + 1;
            let _ = write!(self.line, "[{id}]");
            self.links.push(Link {
                id,
                target,
                label: element.text(),
            });
        }

        self.walk(&element.children);

        if block {
            self.flush();
        }
    }

    fn flush(&mut self) {
        let line = collapse_whitespace(&self.line);
        self.line.clear();
        if !line.is_empty() {
            self.blocks.push(line);
        }
    }
}

/// Resolves an `href` against the page location. An empty `href` is the page
/// itself; an unparsable one is kept verbatim.
pub(crate) fn resolve_link(base: &Location, href: &str) -> LinkTarget {
    match base.join(href) {
        Ok(location) => LinkTarget::Web(location),
        Err(_) => LinkTarget::Other(
            base.resolve_reference(href)
                .unwrap_or_else(|| href.trim().to_owned()),
        ),
    }
}

fn is_ignored(tag: &str) -> bool {
    matches!(
        tag,
        "script" | "style" | "meta" | "head" | "svg" | "path" | "title" | "template"
    )
}

fn is_block(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "div"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "li"
            | "ul"
            | "ol"
            | "dl"
            | "dt"
            | "dd"
            | "tr"
            | "table"
            | "pre"
            | "blockquote"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "nav"
            | "aside"
            | "main"
            | "form"
            | "hr"
            | "figure"
            | "figcaption"
            | "address"
    )
}
