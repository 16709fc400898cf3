//! Chapter sanitizing: executable and stylesheet elements become comment
//! markers, and theme-overriding inline declarations are removed.

use super::dom::RenderNode;

/// Elements replaced with a `"<name> removed"` comment.
const STRIPPED_ELEMENTS: &[&str] = &["script", "link", "style"];

/// Inline style properties that would override the reader theme.
const STRIPPED_PROPERTIES: &[&str] = &["color", "background", "background-color", "font-family"];

/// Sanitize a list of sibling nodes in place, recursively.
pub fn sanitize_nodes(nodes: &mut [RenderNode]) {
    for node in nodes.iter_mut() {
        sanitize_node(node);
    }
}

fn sanitize_node(node: &mut RenderNode) {
    let stripped = node
        .name()
        .map(|n| n.to_ascii_lowercase())
        .filter(|n| STRIPPED_ELEMENTS.contains(&n.as_str()));
    if let Some(name) = stripped {
        *node = RenderNode::Comment(format!("{name} removed"));
        return;
    }

    if let Some(style) = node.attr("style") {
        let filtered = filter_style(style);
        if filtered.is_empty() {
            node.remove_attr("style");
        } else {
            node.set_attr("style", &filtered);
        }
    }

    if let RenderNode::Element { children, .. } = node {
        sanitize_nodes(children);
    }
}

/// Drop stripped properties from a style attribute, keeping every other declaration.
pub fn filter_style(style: &str) -> String {
    split_declarations(style)
        .into_iter()
        .map(str::trim)
        .filter(|decl| !decl.is_empty())
        .filter(|decl| {
            let property = decl
                .split(':')
                .next()
                .unwrap_or("")
                .trim()
                .to_ascii_lowercase();
            !STRIPPED_PROPERTIES.contains(&property.as_str())
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Split on `;` outside parentheses and quotes (`url(a;b)`, `"x;y"`).
fn split_declarations(style: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0u32;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in style.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                parts.push(&style[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&style[start..]);
    parts
}
