//! Archive path helpers: directory prefixes, `.`/`..` normalisation, href decoding.

/// Directory part of `path` including the trailing slash, or `""` at the root.
pub fn parent_dir(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i + 1]).unwrap_or("")
}

/// Collapse `.` and `..` segments and empty components.
/// A `..` at the root is dropped rather than escaping the archive.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            ".." => {
                parts.pop();
            }
            "." | "" => {}
            p => parts.push(p),
        }
    }
    parts.join("/")
}

/// Strip a `?query` and `#fragment` from an href.
pub fn strip_query_and_fragment(href: &str) -> &str {
    href.split(['?', '#']).next().unwrap_or("")
}

/// Percent-decode an href (`%20` and friends). Invalid UTF-8 keeps the raw text.
pub fn decode_href(href: &str) -> String {
    percent_encoding::percent_decode_str(href)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| href.to_string())
}

/// Last path segment.
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_dir_keeps_trailing_slash() {
        assert_eq!(parent_dir("OEBPS/content.opf"), "OEBPS/");
        assert_eq!(parent_dir("a/b/c.xhtml"), "a/b/");
        assert_eq!(parent_dir("content.opf"), "");
    }

    #[test]
    fn normalize_resolves_dot_segments() {
        assert_eq!(normalize("text/images/cover.jpg"), "text/images/cover.jpg");
        assert_eq!(normalize("OEBPS/text/../images/a.png"), "OEBPS/images/a.png");
        assert_eq!(normalize("./a//b/./c"), "a/b/c");
        assert_eq!(normalize("../../a.png"), "a.png");
    }

    #[test]
    fn decode_and_strip_suffixes() {
        assert_eq!(decode_href("my%20image.jpg"), "my image.jpg");
        assert_eq!(strip_query_and_fragment("ch1.xhtml#sec2"), "ch1.xhtml");
        assert_eq!(strip_query_and_fragment("#top"), "");
        assert_eq!(strip_query_and_fragment("cover.jpg?v=2"), "cover.jpg");
        assert_eq!(strip_query_and_fragment("a.xhtml?x=1#p3"), "a.xhtml");
        assert_eq!(basename("a/b/cover.jpg"), "cover.jpg");
    }
}
