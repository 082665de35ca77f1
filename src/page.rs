use anyhow::{Context, Result};
use html5ever::parse_document;
use html5ever::serialize::{SerializeOpts, TraversalScope, serialize};
use html5ever::tendril::TendrilSink;
use log::debug;
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;
use url::Url;

/// Links whose `rel` contains this marker open in the lightbox.
pub const LINK_MARKER: &str = "facybox";

// rel="facybox.tag", or the deprecated rel="facybox[.tag]"
static CLASS_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"facybox\[?\.(\w+)\]?").unwrap());

/// A link bound to the lightbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundLink {
    pub href: String,
    pub label: String,
    pub class_tag: Option<String>,
}

/// An HTML document the lightbox reads links and fragments from.
pub struct Page {
    location: String,
    source: String,
    dom: RcDom,
}

impl Page {
    pub fn parse(location: impl Into<String>, html: &str) -> Self {
        let dom = parse_document(RcDom::default(), Default::default()).one(html);
        Self {
            location: location.into(),
            source: html.to_string(),
            dom,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let html = fs::read_to_string(path)
            .with_context(|| format!("Failed to read page {}", path.display()))?;
        let absolute = fs::canonicalize(path)
            .with_context(|| format!("Failed to resolve page {}", path.display()))?;
        let location = Url::from_file_path(&absolute)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| absolute.display().to_string());
        debug!("Loaded page {location}");
        Ok(Self::parse(location, &html))
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn base_url(&self) -> Option<Url> {
        Url::parse(&self.location).ok()
    }

    pub fn title(&self) -> Option<String> {
        find_element(&self.dom.document, &|tag, _| tag == "title")
            .map(|title| text_content(&title).trim().to_string())
            .filter(|title| !title.is_empty())
    }

    /// Every `<a>` whose `rel` contains the lightbox marker, in document order.
    pub fn bind_links(&self) -> Vec<BoundLink> {
        let mut links = Vec::new();
        collect_links(&self.dom.document, &mut links);
        debug!("Bound {} links on {}", links.len(), self.location);
        links
    }

    /// Inner markup of the element matching `selector`. Only `#id` selectors
    /// are understood.
    pub fn inner_html(&self, selector: &str) -> Option<String> {
        let id = selector.strip_prefix('#').filter(|id| !id.is_empty())?;
        let element = find_element(&self.dom.document, &|_, node| {
            attribute(node, "id").as_deref() == Some(id)
        })?;

        let mut bytes = Vec::new();
        let opts = SerializeOpts {
            traversal_scope: TraversalScope::ChildrenOnly(None),
            ..Default::default()
        };
        serialize(&mut bytes, &SerializableHandle::from(element), opts).ok()?;
        String::from_utf8(bytes).ok()
    }
}

fn collect_links(node: &Handle, links: &mut Vec<BoundLink>) {
    if let NodeData::Element { name, .. } = &node.data {
        if &*name.local == "a" {
            let rel = attribute(node, "rel").unwrap_or_default();
            if rel.contains(LINK_MARKER) {
                let class_tag = CLASS_TAG_RE
                    .captures(&rel)
                    .map(|caps| caps[1].to_string());
                links.push(BoundLink {
                    href: attribute(node, "href").unwrap_or_default(),
                    label: collapse_whitespace(&text_content(node)),
                    class_tag,
                });
            }
        }
    }
    for child in node.children.borrow().iter() {
        collect_links(child, links);
    }
}

fn find_element(node: &Handle, matches: &dyn Fn(&str, &Handle) -> bool) -> Option<Handle> {
    if let NodeData::Element { name, .. } = &node.data {
        if matches(&name.local, node) {
            return Some(node.clone());
        }
    }
    node.children
        .borrow()
        .iter()
        .find_map(|child| find_element(child, matches))
}

fn attribute(node: &Handle, name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

fn text_content(node: &Handle) -> String {
    let mut text = String::new();
    append_text(node, &mut text);
    text
}

fn append_text(node: &Handle, text: &mut String) {
    if let NodeData::Text { contents } = &node.data {
        text.push_str(&contents.borrow());
    }
    for child in node.children.borrow().iter() {
        append_text(child, text);
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<html><head><title> Demo page </title></head><body>
        <a href="#terms" rel="facybox">Terms
           of use</a>
        <a href="remote.html" rel="facybox.wide">Remote</a>
        <a href="stairs.jpg" rel="facybox[.photo]">Stairs</a>
        <a href="other.html" rel="nofollow">Plain</a>
        <div id="terms"><p>Be <b>nice</b>.</p></div>
    </body></html>"##;

    #[test]
    fn test_binds_marked_links_only() {
        let page = Page::parse("http://example.test/index.html", PAGE);
        let links = page.bind_links();
        assert_eq!(links.len(), 3);
        assert_eq!(
            links[0],
            BoundLink {
                href: "#terms".to_string(),
                label: "Terms of use".to_string(),
                class_tag: None,
            }
        );
        assert_eq!(links[1].class_tag.as_deref(), Some("wide"));
        assert_eq!(links[2].class_tag.as_deref(), Some("photo"));
    }

    #[test]
    fn test_inner_html_by_id() {
        let page = Page::parse("http://example.test/index.html", PAGE);
        assert_eq!(
            page.inner_html("#terms").as_deref(),
            Some("<p>Be <b>nice</b>.</p>")
        );
        assert_eq!(page.inner_html("#missing"), None);
        assert_eq!(page.inner_html("#"), None);
        assert_eq!(page.inner_html("terms"), None);
    }

    #[test]
    fn test_title_and_base() {
        let page = Page::parse("http://example.test/docs/index.html", PAGE);
        assert_eq!(page.title().as_deref(), Some("Demo page"));
        assert_eq!(
            page.base_url().unwrap().join("a.png").unwrap().as_str(),
            "http://example.test/docs/a.png"
        );
    }

    #[test]
    fn test_load_from_disk_uses_file_location() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("page.html");
        fs::write(&path, PAGE).unwrap();
        let page = Page::load(&path).unwrap();
        assert!(page.location().starts_with("file://"));
        assert_eq!(page.bind_links().len(), 3);
    }
}
