//! Element tree built from the token stream.

use crate::tokenizer::Token;
use crate::tokenizer::tokenize;

const DOCUMENT_TAG: &str = "#document";
const MAX_TREE_DEPTH: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Element {
    fn new(tag: &str, attrs: Vec<(String, String)>) -> Self {
        Self {
            tag: tag.to_owned(),
            attrs,
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|candidate| candidate == class)
    }

    /// Visible text of this subtree with whitespace collapsed.
    pub fn text(&self) -> String {
        let mut raw = String::new();
        collect_text(&self.children, &mut raw);
        collapse_whitespace(&raw)
    }

    /// All descendant elements in document order.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        collect_descendants(&self.children, &mut out);
        out
    }

    pub fn find_first(&self, predicate: impl Fn(&Element) -> bool) -> Option<&Element> {
        self.descendants()
            .into_iter()
            .find(|element| predicate(element))
    }

    pub fn contains(&self, predicate: impl Fn(&Element) -> bool) -> bool {
        self.find_first(predicate).is_some()
    }

    /// Matching descendants, without descending into a match.
    pub fn find_outermost(&self, predicate: impl Fn(&Element) -> bool) -> Vec<&Element> {
        let mut out = Vec::new();
        collect_outermost(&self.children, &predicate, &mut out);
        out
    }
}

/// Parses `source` into a tree rooted at a synthetic document element.
pub fn parse(source: &str) -> Element {
    let mut stack = vec![Element::new(DOCUMENT_TAG, Vec::new())];

    for token in tokenize(source) {
        match token {
            Token::Text(text) => push_child(&mut stack, Node::Text(text)),
            Token::Start {
                name,
                attrs,
                self_closing,
            } => {
                close_implied(&mut stack, &name);
                let element = Element::new(&name, attrs);
                if self_closing || is_void(&name) || stack.len() >= MAX_TREE_DEPTH {
                    push_child(&mut stack, Node::Element(element));
                } else {
                    stack.push(element);
                }
            }
            Token::End { name } => {
                if let Some(position) = stack.iter().rposition(|element| element.tag == name) {
                    if position > 0 {
                        close_to(&mut stack, position);
                    }
                }
            }
        }
    }

    close_to(&mut stack, 1);
    stack
        .into_iter()
        .next()
        .unwrap_or_else(|| Element::new(DOCUMENT_TAG, Vec::new()))
}

/// Closes elements whose end tag HTML lets authors omit.
fn close_implied(stack: &mut Vec<Element>, incoming: &str) {
    let (closes, scope): (&[&str], &[&str]) = match incoming {
        "li" => (&["li"], &["ul", "ol", "menu"]),
        "dt" | "dd" => (&["dt", "dd"], &["dl"]),
        "tr" => (&["tr", "td", "th"], &["table", "thead", "tbody", "tfoot"]),
        "td" | "th" => (&["td", "th"], &["tr", "table"]),
        "option" => (&["option"], &["select", "datalist"]),
        tag if closes_paragraph(tag) => (
            &["p"],
            &[
                "div", "td", "th", "li", "blockquote", "section", "article", "form", "button",
            ],
        ),
        _ => return,
    };

    for position in (1..stack.len()).rev() {
        let tag = stack[position].tag.as_str();
        if closes.contains(&tag) {
            close_to(stack, position);
            return;
        }
        if scope.contains(&tag) {
            return;
        }
    }
}

fn close_to(stack: &mut Vec<Element>, position: usize) {
    while stack.len() > position.max(1) {
        let Some(element) = stack.pop() else {
            break;
        };
        push_child(stack, Node::Element(element));
    }
}

fn push_child(stack: &mut [Element], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => {
                if matches!(element.tag.as_str(), "script" | "style") {
                    continue;
                }
                if element.tag == "br" {
                    out.push(' ');
                }
                collect_text(&element.children, out);
            }
        }
    }
}

fn collect_descendants<'a>(nodes: &'a [Node], out: &mut Vec<&'a Element>) {
    for node in nodes {
        if let Node::Element(element) = node {
            out.push(element);
            collect_descendants(&element.children, out);
        }
    }
}

fn collect_outermost<'a>(
    nodes: &'a [Node],
    predicate: &dyn Fn(&Element) -> bool,
    out: &mut Vec<&'a Element>,
) {
    for node in nodes {
        if let Node::Element(element) = node {
            if predicate(element) {
                out.push(element);
            } else {
                collect_outermost(&element.children, predicate, out);
            }
        }
    }
}

pub(crate) fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_void(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

fn closes_paragraph(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "div"
            | "ul"
            | "ol"
            | "dl"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
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
    )
}
