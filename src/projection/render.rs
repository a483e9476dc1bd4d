//! Multistatus rendering
//!
//! Turns resolved nodes into WebDAV `207 Multi-Status` bodies. Directory bodies are
//! cached on the node, keyed by depth. Cached bodies contain absolute hrefs, so a
//! renderer assumes a single mount prefix for the lifetime of the tree.

use super::node::{Directory, FileEntry};
use super::resolve::Resolved;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fmt::Write;
use std::sync::Arc;

const HREF_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const LAST_MODIFIED_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Levels below the root: view, at most two classification levels, then files
const MAX_TREE_HEIGHT: u32 = 4;

/// Traversal depth of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Depth {
    Finite(u32),
    Infinity,
}

impl Default for Depth {
    fn default() -> Self {
        Depth::Finite(1)
    }
}

impl Depth {
    /// Parse a `Depth` header value. Missing or unparsable values mean 1.
    pub fn parse_header(value: Option<&str>) -> Self {
        let Some(value) = value.map(str::trim) else {
            return Depth::default();
        };
        if value.eq_ignore_ascii_case("infinity") {
            return Depth::Infinity;
        }
        value.parse().map(Depth::Finite).unwrap_or_default()
    }

    /// Same listing with depths that reach past every leaf folded into `Infinity`,
    /// so a node caches at most one body per distinct result
    pub fn bounded(self) -> Depth {
        match self {
            Depth::Finite(n) if n >= MAX_TREE_HEIGHT => Depth::Infinity,
            other => other,
        }
    }

    /// Depth for the next level down, `None` when children are not listed
    pub fn descend(self) -> Option<Depth> {
        match self {
            Depth::Finite(0) => None,
            Depth::Finite(n) => Some(Depth::Finite(n - 1)),
            Depth::Infinity => Some(Depth::Infinity),
        }
    }
}

impl std::fmt::Display for Depth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Depth::Finite(n) => write!(f, "{}", n),
            Depth::Infinity => write!(f, "infinity"),
        }
    }
}

/// Renders multistatus documents for one mount prefix
#[derive(Debug, Clone)]
pub struct Renderer {
    prefix: String,
    root_name: String,
    content_type: String,
}

impl Renderer {
    pub fn new(prefix: &str, content_type: impl Into<String>) -> Self {
        let trimmed = prefix.trim_matches('/');
        let prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        };
        let root_name = trimmed
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("webdav")
            .to_string();
        Self {
            prefix,
            root_name,
            content_type: content_type.into(),
        }
    }

    /// Mount prefix, without a trailing slash (empty when mounted at `/`)
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Full multistatus document for `resolved` at `depth`
    pub fn render(&self, resolved: &Resolved<'_>, depth: Depth) -> String {
        let body = match resolved {
            Resolved::Directory { node, path } => {
                let node = *node;
                let mut path = path.clone();
                self.render_directory(node, &mut path, depth)
            }
            Resolved::File { entry, path } => {
                let mut out = String::new();
                self.write_file(&mut out, &self.href(path, false), entry);
                Arc::from(out)
            }
        };

        let mut document = String::with_capacity(body.len() + 96);
        document.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        document.push_str("<d:multistatus xmlns:d=\"DAV:\">\n");
        document.push_str(&body);
        document.push_str("</d:multistatus>\n");
        document
    }

    /// Response elements for `dir` and, depth permitting, its contents.
    ///
    /// `path` is the canonical path of `dir` and is restored before returning.
    pub fn render_directory<'a>(
        &self,
        dir: &'a Directory,
        path: &mut Vec<&'a str>,
        depth: Depth,
    ) -> Arc<str> {
        let depth = depth.bounded();
        if let Some(cached) = dir.cached(depth) {
            return cached;
        }

        let mut out = String::new();
        self.write_directory(&mut out, &self.href(path, true), dir);

        if let Some(next) = depth.descend() {
            for child in dir.children() {
                path.push(child.name().unwrap_or_default());
                out.push_str(&self.render_directory(child, path, next));
                path.pop();
            }
            for entry in dir.files() {
                path.push(&entry.display_name);
                self.write_file(&mut out, &self.href(path, false), entry);
                path.pop();
            }
        }

        let body: Arc<str> = Arc::from(out);
        dir.store_cached(depth, Arc::clone(&body));
        body
    }

    fn href(&self, path: &[&str], collection: bool) -> String {
        let mut href = self.prefix.clone();
        for segment in path {
            href.push('/');
            href.extend(utf8_percent_encode(segment, HREF_ENCODE_SET));
        }
        if collection || path.is_empty() {
            href.push('/');
        }
        href
    }

    fn write_directory(&self, out: &mut String, href: &str, dir: &Directory) {
        let name = dir.name().unwrap_or(&self.root_name);
        open_response(out, href);
        out.push_str("        <d:resourcetype><d:collection/></d:resourcetype>\n");
        let _ = writeln!(out, "        <d:displayname>{}</d:displayname>", xml_escape(name));
        close_response(out);
    }

    fn write_file(&self, out: &mut String, href: &str, entry: &FileEntry) {
        open_response(out, href);
        out.push_str("        <d:resourcetype/>\n");
        let _ = writeln!(
            out,
            "        <d:displayname>{}</d:displayname>",
            xml_escape(&entry.display_name)
        );
        let _ = writeln!(
            out,
            "        <d:getlastmodified>{}</d:getlastmodified>",
            entry.uploaded_on.format(LAST_MODIFIED_FORMAT)
        );
        let _ = writeln!(out, "        <d:getcontentlength>{}</d:getcontentlength>", entry.size);
        let _ = writeln!(
            out,
            "        <d:getcontenttype>{}</d:getcontenttype>",
            xml_escape(&self.content_type)
        );
        let _ = writeln!(out, "        <d:getetag>{}</d:getetag>", xml_escape(&entry.etag()));
        close_response(out);
    }
}

fn open_response(out: &mut String, href: &str) {
    out.push_str("  <d:response>\n");
    let _ = writeln!(out, "    <d:href>{}</d:href>", xml_escape(href));
    out.push_str("    <d:propstat>\n      <d:prop>\n");
}

fn close_response(out: &mut String) {
    out.push_str("      </d:prop>\n");
    out.push_str("      <d:status>HTTP/1.1 200 OK</d:status>\n");
    out.push_str("    </d:propstat>\n  </d:response>\n");
}

/// Escape text for XML element content
pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
