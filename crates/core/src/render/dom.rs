//! Owned node tree for rendered chapter content, and its HTML serializer.

use std::fmt::Write;

use scraper::{ElementRef, Node};

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderNode {
    Element {
        name: String,
        attrs: Vec<(String, String)>,
        children: Vec<RenderNode>,
    },
    Text(String),
    Comment(String),
}

impl RenderNode {
    pub fn element(name: &str, attrs: Vec<(String, String)>, children: Vec<RenderNode>) -> Self {
        RenderNode::Element {
            name: name.to_string(),
            attrs,
            children,
        }
    }

    /// Deep copy of a parsed element. Namespaced attributes the parser
    /// split (`xlink:href`, `xmlns:xlink`, `xml:lang` in svg) keep their prefix.
    pub fn from_element(el: ElementRef<'_>) -> Self {
        RenderNode::Element {
            name: el.value().name().to_string(),
            attrs: el
                .value()
                .attrs
                .iter()
                .map(|(qual, value)| {
                    let key = match &qual.prefix {
                        Some(prefix) => format!("{}:{}", prefix, qual.local),
                        None => qual.local.to_string(),
                    };
                    (key, value.to_string())
                })
                .collect(),
            children: children_of(el),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            RenderNode::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        match self {
            RenderNode::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// Set or replace an attribute. No-op on text and comments.
    pub fn set_attr(&mut self, key: &str, value: &str) {
        if let RenderNode::Element { attrs, .. } = self {
            match attrs.iter_mut().find(|(k, _)| k == key) {
                Some(slot) => slot.1 = value.to_string(),
                None => attrs.push((key.to_string(), value.to_string())),
            }
        }
    }

    pub fn remove_attr(&mut self, key: &str) {
        if let RenderNode::Element { attrs, .. } = self {
            attrs.retain(|(k, _)| k != key);
        }
    }

    pub fn children(&self) -> &[RenderNode] {
        match self {
            RenderNode::Element { children, .. } => children,
            _ => &[],
        }
    }

    /// Concatenated descendant text.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            RenderNode::Text(t) => out.push_str(t),
            RenderNode::Element { children, .. } => {
                for child in children {
                    child.collect_text(out);
                }
            }
            RenderNode::Comment(_) => {}
        }
    }

    /// Visit this node and every descendant element, depth first.
    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut RenderNode)) {
        f(self);
        if let RenderNode::Element { children, .. } = self {
            for child in children {
                child.walk_mut(f);
            }
        }
    }

    pub fn write_html(&self, w: &mut String) -> std::fmt::Result {
        match self {
            RenderNode::Text(t) => w.push_str(&escape_text(t)),
            RenderNode::Comment(c) => write!(w, "<!--{}-->", c.replace("--", "- -"))?,
            RenderNode::Element {
                name,
                attrs,
                children,
            } => {
                write!(w, "<{name}")?;
                for (k, v) in attrs {
                    write!(w, " {}=\"{}\"", k, escape_attr(v))?;
                }
                w.push('>');
                if VOID_ELEMENTS.contains(&name.as_str()) {
                    return Ok(());
                }
                for child in children {
                    child.write_html(w)?;
                }
                write!(w, "</{name}>")?;
            }
        }
        Ok(())
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_html(&mut out);
        out
    }
}

/// Deep copy of an element's child nodes. Doctypes and processing instructions are dropped.
pub fn children_of(el: ElementRef<'_>) -> Vec<RenderNode> {
    el.children()
        .filter_map(|child| {
            if let Some(child_el) = ElementRef::wrap(child) {
                return Some(RenderNode::from_element(child_el));
            }
            match child.value() {
                Node::Text(t) => Some(RenderNode::Text(t.text.to_string())),
                Node::Comment(c) => Some(RenderNode::Comment(c.comment.to_string())),
                _ => None,
            }
        })
        .collect()
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\u{a0}', "&nbsp;")
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('\u{a0}', "&nbsp;")
}
