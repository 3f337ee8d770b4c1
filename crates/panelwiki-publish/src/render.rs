//! Confluence storage-format renderer
//!
//! ```text
//! <h2>source</h2>
//! <h3>window</h3>
//! <p><a href="dashboard link">start - end</a></p>
//! <ac:structured-macro ac:name="expand"> ... panels ... </ac:structured-macro>
//! ```
//!
//! Every piece of user text is HTML-escaped.

use panelwiki_document::{Document, DocumentNode};

/// Escape text for element content and attribute values
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders a [`Document`] into Confluence storage format
#[derive(Debug, Clone, Copy)]
pub struct StorageRenderer {
    graph_width: u32,
}

impl StorageRenderer {
    /// Renderer with a fixed image width
    #[inline]
    #[must_use]
    pub fn new(graph_width: u32) -> Self {
        Self { graph_width }
    }

    /// Render the whole document
    #[must_use]
    pub fn render(&self, document: &Document) -> String {
        let mut out = String::new();
        for node in &document.nodes {
            self.node(&mut out, node, 0);
        }
        out
    }

    fn node(&self, out: &mut String, node: &DocumentNode, depth: usize) {
        match node {
            DocumentNode::Section {
                heading,
                children,
                ..
            } if depth == 0 => {
                out.push_str(&format!("<h2>{}</h2>\n", escape(heading)));
                for child in children {
                    self.node(out, child, depth + 1);
                }
            }
            DocumentNode::Section {
                heading,
                subtitle,
                link,
                children,
            } => {
                out.push_str(&format!("<h3>{}</h3>\n", escape(heading)));
                let range = match (subtitle, link) {
                    (Some(text), Some(href)) => {
                        format!("<p><a href=\"{}\">{}</a></p>\n", escape(href), escape(text))
                    }
                    (Some(text), None) => format!("<p>{}</p>\n", escape(text)),
                    (None, Some(href)) => format!("<p><a href=\"{0}\">{0}</a></p>\n", escape(href)),
                    (None, None) => String::new(),
                };
                out.push_str(&range);
                out.push_str("<ac:structured-macro ac:name=\"expand\">\n");
                out.push_str(&format!(
                    "  <ac:parameter ac:name=\"title\">{}</ac:parameter>\n",
                    escape(heading)
                ));
                out.push_str("  <ac:rich-text-body>\n");
                for child in children {
                    self.node(out, child, depth + 1);
                }
                out.push_str("  </ac:rich-text-body>\n");
                out.push_str("</ac:structured-macro>\n");
            }
            DocumentNode::Image {
                title,
                attachment,
                link,
                ..
            } => {
                let caption = match link {
                    Some(href) => format!("<a href=\"{}\">{}</a>", escape(href), escape(title)),
                    None => escape(title),
                };
                out.push_str(&format!("    <p>{caption}</p>\n"));
                out.push_str(&format!(
                    "    <p><ac:image ac:width=\"{}\"><ri:attachment ri:filename=\"{}\" /></ac:image></p>\n",
                    self.graph_width,
                    escape(attachment)
                ));
            }
            DocumentNode::Placeholder {
                title,
                reason,
                message,
                ..
            } => {
                out.push_str("    <ac:structured-macro ac:name=\"warning\">\n");
                out.push_str(&format!(
                    "      <ac:parameter ac:name=\"title\">{} ({})</ac:parameter>\n",
                    escape(title),
                    escape(reason)
                ));
                out.push_str(&format!(
                    "      <ac:rich-text-body><p>{}</p></ac:rich-text-body>\n",
                    escape(message)
                ));
                out.push_str("    </ac:structured-macro>\n");
            }
        }
    }
}
