//! In-memory page document.
//!
//! The page owns the parsed `scraper` tree and performs every DOM mutation
//! SpinnerSync needs: discovering placeholder elements, toggling the pending
//! marker, and swapping an element for parsed fragment markup. Nodes removed
//! from the tree stay in the `ego_tree` arena, so "still in the document"
//! always means "reachable from the root".

use std::collections::{HashMap, HashSet};

use ego_tree::{NodeId, NodeMut, NodeRef};
use scraper::node::Node;
use scraper::Html;
use spinner_core::{JobId, PlaceholderId};
use url::Url;

use crate::config::ElementSpec;

/// HTML5 void elements that must not have a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text children are serialized without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub id: PlaceholderId,
    pub job: JobId,
    pub href: Option<String>,
}

/// What a replacement did to the document besides removing the target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaceOutcome {
    /// False when the target was no longer in the document; nothing changed.
    pub replaced: bool,
    /// Placeholders that were nested inside the replaced element.
    pub removed: Vec<PlaceholderId>,
    /// Placeholders that arrived with the replacement markup.
    pub inserted: Vec<Placeholder>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    #[error("no element with id `{0}`")]
    MissingLink(String),
    #[error("element `{0}` has no href")]
    MissingHref(String),
    #[error("cannot resolve `{href}`: {reason}")]
    Unresolvable { href: String, reason: String },
    #[error("unsupported endpoint scheme `{0}`")]
    UnsupportedScheme(String),
}

pub struct Page {
    html: Html,
    base_url: Option<Url>,
    spec: ElementSpec,
    nodes: HashMap<PlaceholderId, NodeId>,
    placeholders: HashMap<NodeId, PlaceholderId>,
    marked: HashSet<NodeId>,
    next_id: PlaceholderId,
}

impl Page {
    /// Parses a full document. `document_url` plays the role of the page's
    /// location; a `<base href>` in the document refines it.
    pub fn parse(source: &str, document_url: Option<Url>, spec: ElementSpec) -> Self {
        let html = Html::parse_document(source);
        let base_url = document_base(&html, document_url);
        Self {
            html,
            base_url,
            spec,
            nodes: HashMap::new(),
            placeholders: HashMap::new(),
            marked: HashSet::new(),
            next_id: 1,
        }
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    pub fn spec(&self) -> &ElementSpec {
        &self.spec
    }

    /// Resolves a link the way the document would.
    pub fn resolve(&self, href: &str) -> Result<Url, url::ParseError> {
        match &self.base_url {
            Some(base) => base.join(href),
            None => Url::parse(href),
        }
    }

    /// Websocket URL taken from the `href` of the element with id `link_id`.
    ///
    /// `http` and `https` map to `ws` and `wss`.
    pub fn endpoint_url(&self, link_id: &str) -> Result<Url, EndpointError> {
        let link = self
            .html
            .tree
            .root()
            .descendants()
            .filter_map(|node| match node.value() {
                Node::Element(el) => Some(el),
                _ => None,
            })
            .find(|el| el.id() == Some(link_id))
            .ok_or_else(|| EndpointError::MissingLink(link_id.to_string()))?;
        let href = link
            .attr("href")
            .ok_or_else(|| EndpointError::MissingHref(link_id.to_string()))?;

        let mut url = self
            .resolve(href)
            .map_err(|err| EndpointError::Unresolvable {
                href: href.to_string(),
                reason: err.to_string(),
            })?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
        };
        if url.scheme() != scheme && url.set_scheme(scheme).is_err() {
            return Err(EndpointError::UnsupportedScheme(url.scheme().to_string()));
        }
        Ok(url)
    }

    /// Registers every placeholder element in the document not seen before,
    /// in document order.
    pub fn discover(&mut self) -> Vec<Placeholder> {
        let found: Vec<(NodeId, String, Option<String>)> = self
            .html
            .tree
            .root()
            .descendants()
            .filter(|node| !self.placeholders.contains_key(&node.id()))
            .filter_map(|node| {
                let Node::Element(el) = node.value() else {
                    return None;
                };
                if !el.name().eq_ignore_ascii_case(&self.spec.tag_name) {
                    return None;
                }
                let job = el.attr(&self.spec.job_attribute)?;
                let href = el.attr(&self.spec.href_attribute).map(str::to_string);
                Some((node.id(), job.to_string(), href))
            })
            .collect();

        found
            .into_iter()
            .map(|(node_id, job, href)| {
                let id = self.next_id;
                self.next_id += 1;
                self.nodes.insert(id, node_id);
                self.placeholders.insert(node_id, id);
                Placeholder {
                    id,
                    job: JobId::from(job),
                    href,
                }
            })
            .collect()
    }

    /// True while the placeholder's element is reachable from the root.
    pub fn is_attached(&self, id: PlaceholderId) -> bool {
        self.nodes
            .get(&id)
            .is_some_and(|node_id| self.is_connected(*node_id))
    }

    pub fn is_marked(&self, id: PlaceholderId) -> bool {
        self.nodes
            .get(&id)
            .is_some_and(|node_id| self.marked.contains(node_id))
    }

    pub fn mark_pending(&mut self, id: PlaceholderId) {
        if let Some(node_id) = self.nodes.get(&id) {
            self.marked.insert(*node_id);
        }
    }

    pub fn clear_pending(&mut self, id: PlaceholderId) {
        if let Some(node_id) = self.nodes.get(&id) {
            self.marked.remove(node_id);
        }
    }

    /// Swaps the placeholder element for `markup`, parsed as a body fragment.
    pub fn replace(&mut self, id: PlaceholderId, markup: &str) -> ReplaceOutcome {
        let Some(&target) = self.nodes.get(&id) else {
            return ReplaceOutcome::default();
        };
        if !self.is_connected(target) {
            return ReplaceOutcome::default();
        }

        self.swap(target, markup);

        let removed = self
            .html
            .tree
            .get(target)
            .map(|detached| {
                detached
                    .descendants()
                    .skip(1)
                    .filter_map(|node| self.placeholders.get(&node.id()).copied())
                    .collect()
            })
            .unwrap_or_default();

        ReplaceOutcome {
            replaced: true,
            removed,
            inserted: self.discover(),
        }
    }

    /// Swaps every element with the placeholder tag that never became a
    /// placeholder (no job attribute) for `markup`. Returns how many.
    pub fn replace_unregistered(&mut self, markup: &str) -> usize {
        let targets: Vec<NodeId> = self
            .html
            .tree
            .root()
            .descendants()
            .filter(|node| !self.placeholders.contains_key(&node.id()))
            .filter(|node| match node.value() {
                Node::Element(el) => el.name().eq_ignore_ascii_case(&self.spec.tag_name),
                _ => false,
            })
            .map(|node| node.id())
            .collect();

        let mut replaced = 0;
        for target in targets {
            // An outer match may already have taken this one out.
            if self.is_connected(target) {
                self.swap(target, markup);
                replaced += 1;
            }
        }
        replaced
    }

    /// Serializes the document, rendering the pending marker as a class.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.serialize_node(self.html.tree.root(), &mut out);
        out
    }

    fn swap(&mut self, target: NodeId, markup: &str) {
        let fragment = Html::parse_fragment(markup);
        for source in fragment.root_element().children() {
            let copied = match self.html.tree.get_mut(target) {
                Some(mut anchor) => anchor.insert_before(source.value().clone()).id(),
                None => return,
            };
            if let Some(mut copied) = self.html.tree.get_mut(copied) {
                graft(&mut copied, source);
            }
        }
        if let Some(mut anchor) = self.html.tree.get_mut(target) {
            anchor.detach();
        }
    }

    fn is_connected(&self, node_id: NodeId) -> bool {
        let root = self.html.tree.root().id();
        self.html
            .tree
            .get(node_id)
            .and_then(|node| node.ancestors().last())
            .is_some_and(|top| top.id() == root)
    }

    fn serialize_node(&self, node: NodeRef<Node>, out: &mut String) {
        match node.value() {
            Node::Document | Node::Fragment => {
                for child in node.children() {
                    self.serialize_node(child, out);
                }
            }
            Node::Doctype(doctype) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(doctype.name());
                out.push('>');
            }
            Node::Element(el) => {
                let tag = el.name();
                let marked = self.marked.contains(&node.id());
                let mut class_written = false;

                out.push('<');
                out.push_str(tag);
                for (key, value) in el.attrs() {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    if marked && key == "class" {
                        push_escaped_attr(out, &with_class(value, &self.spec.pending_class));
                        class_written = true;
                    } else {
                        push_escaped_attr(out, value);
                    }
                    out.push('"');
                }
                if marked && !class_written {
                    out.push_str(" class=\"");
                    push_escaped_attr(out, &self.spec.pending_class);
                    out.push('"');
                }
                out.push('>');

                if VOID_ELEMENTS.contains(&tag) {
                    return;
                }
                for child in node.children() {
                    self.serialize_node(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            Node::Text(text) => {
                let raw = node
                    .parent()
                    .and_then(|parent| match parent.value() {
                        Node::Element(el) => Some(RAW_TEXT_ELEMENTS.contains(&el.name())),
                        _ => None,
                    })
                    .unwrap_or(false);
                if raw {
                    out.push_str(&**text);
                } else {
                    push_escaped_text(out, &**text);
                }
            }
            Node::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(&**comment);
                out.push_str("-->");
            }
            _ => {}
        }
    }
}

fn document_base(html: &Html, document_url: Option<Url>) -> Option<Url> {
    let base_href = html
        .tree
        .root()
        .descendants()
        .filter_map(|node| match node.value() {
            Node::Element(el) if el.name() == "base" => el.attr("href"),
            _ => None,
        })
        .next();

    match (document_url, base_href) {
        (Some(url), Some(href)) => url.join(href).ok().or(Some(url)),
        (Some(url), None) => Some(url),
        (None, Some(href)) => Url::parse(href).ok(),
        (None, None) => None,
    }
}

fn graft(dest: &mut NodeMut<'_, Node>, source: NodeRef<'_, Node>) {
    for child in source.children() {
        let mut copied = dest.append(child.value().clone());
        graft(&mut copied, child);
    }
}

fn with_class(existing: &str, class: &str) -> String {
    if existing.split_ascii_whitespace().any(|c| c == class) {
        existing.to_string()
    } else if existing.trim().is_empty() {
        class.to_string()
    } else {
        format!("{} {}", existing.trim_end(), class)
    }
}

fn push_escaped_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

fn push_escaped_attr(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}
