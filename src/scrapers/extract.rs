//! Plain-text rendering of HTML subtrees.

use scraper::node::Node;
use scraper::{ElementRef, Selector};

/// Elements whose content is never text.
const SKIPPED: &[&str] = &["script", "style", "head", "noscript", "template"];

/// Elements followed and preceded by a blank line.
const PARAGRAPHS: &[&str] = &["p", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "table"];

/// Elements that start on a new line.
const BLOCKS: &[&str] = &[
    "address", "article", "aside", "caption", "dd", "details", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "header", "hr", "li", "main", "nav", "ol", "pre",
    "section", "summary", "tr", "ul",
];

const INDENT: &str = "    ";

/// Render an element and its descendants as plain text.
///
/// Anything matching one of `drop` is left out along with its subtree.
pub fn html_to_text(element: ElementRef<'_>, drop: &[Selector]) -> String {
    let mut renderer = Renderer::new(drop);
    renderer.children(element);
    renderer.out
}

struct Renderer<'s> {
    drop: &'s [Selector],
    out: String,
    pending_break: usize,
    pending_space: bool,
    cell_sep: bool,
    row_has_cell: bool,
    at_line_start: bool,
    quote_depth: usize,
    pre_depth: usize,
}

impl<'s> Renderer<'s> {
    fn new(drop: &'s [Selector]) -> Self {
        Self {
            drop,
            out: String::new(),
            pending_break: 0,
            pending_space: false,
            cell_sep: false,
            row_has_cell: false,
            at_line_start: true,
            quote_depth: 0,
            pre_depth: 0,
        }
    }

    fn block(&mut self, lines: usize) {
        self.pending_break = self.pending_break.max(lines);
    }

    /// Emit whatever separator is owed before the next visible character.
    fn flush(&mut self) {
        if self.out.is_empty() {
            self.pending_break = 0;
            self.at_line_start = true;
        }
        if self.pending_break > 0 {
            for _ in 0..self.pending_break {
                self.out.push('\n');
            }
            self.pending_break = 0;
            self.at_line_start = true;
        }
        if self.at_line_start {
            for _ in 0..self.quote_depth {
                self.out.push_str(INDENT);
            }
            self.at_line_start = false;
        } else if self.cell_sep {
            self.out.push_str("  ");
        } else if self.pending_space {
            self.out.push(' ');
        }
        self.pending_space = false;
        self.cell_sep = false;
    }

    fn word(&mut self, word: &str) {
        self.flush();
        self.out.push_str(word);
    }

    fn text(&mut self, text: &str) {
        if self.pre_depth > 0 {
            for (i, line) in text.split('\n').enumerate() {
                if i > 0 {
                    self.pending_break += 1;
                }
                if !line.is_empty() {
                    self.word(line);
                }
            }
            return;
        }

        for c in text.chars() {
            if c.is_whitespace() {
                if !self.out.is_empty() {
                    self.pending_space = true;
                }
            } else {
                self.flush();
                self.out.push(c);
            }
        }
    }

    fn children(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            if let Some(el) = ElementRef::wrap(child) {
                self.element(el, None);
            } else if let Node::Text(text) = child.value() {
                self.text(text);
            }
        }
    }

    fn list(&mut self, element: ElementRef<'_>, ordered: bool) {
        let mut number: i64 = element
            .value()
            .attr("start")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(1);

        for child in element.children() {
            match ElementRef::wrap(child) {
                Some(li) if li.value().name() == "li" => {
                    let marker = if ordered {
                        number += 1;
                        format!("{}.", number - 1)
                    } else {
                        "*".to_string()
                    };
                    self.element(li, Some(&marker));
                }
                Some(el) => self.element(el, None),
                None => {
                    if let Node::Text(text) = child.value() {
                        self.text(text);
                    }
                }
            }
        }
    }

    fn element(&mut self, element: ElementRef<'_>, marker: Option<&str>) {
        let name = element.value().name();
        if SKIPPED.contains(&name) || self.drop.iter().any(|s| s.matches(&element)) {
            return;
        }
        if name == "br" {
            self.pending_break += 1;
            return;
        }

        let gap = if PARAGRAPHS.contains(&name) {
            2
        } else if BLOCKS.contains(&name) {
            1
        } else {
            0
        };
        self.block(gap);

        match name {
            "blockquote" => self.quote_depth += 1,
            "pre" => self.pre_depth += 1,
            "tr" => self.row_has_cell = false,
            "td" | "th" => {
                if self.row_has_cell {
                    self.cell_sep = true;
                }
                self.row_has_cell = true;
            }
            _ => {}
        }

        if let Some(marker) = marker {
            self.word(marker);
            self.pending_space = true;
        }

        match name {
            "ol" => self.list(element, true),
            "ul" => self.list(element, false),
            _ => self.children(element),
        }

        match name {
            "blockquote" => self.quote_depth -= 1,
            "pre" => self.pre_depth -= 1,
            _ => {}
        }

        self.block(gap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn render(html: &str, drop: &[&str]) -> String {
        let doc = Html::parse_document(html);
        let drop: Vec<Selector> = drop.iter().map(|s| Selector::parse(s).unwrap()).collect();
        html_to_text(doc.root_element(), &drop)
    }

    #[test]
    fn test_block_structure() {
        let html = concat!(
            "<html><head><title>ignored</title></head><body>",
            "<h1>Title</h1><p>First   para\n graph.</p><p>Second<br>line</p>",
            "<ol start=\"3\"><li>three</li><li>four</li></ol><ul><li>bullet</li></ul>",
            "<blockquote><p>Quoted</p></blockquote>",
            "<table><tr><td>a</td><td>b</td></tr><tr><th>c</th><td>d</td></tr></table>",
            "<pre>  keep   this\n  spacing</pre>",
            "<script>bad()</script><div class=\"nav\">drop me</div>",
            "</body></html>"
        );
        assert_eq!(
            render(html, &[".nav"]),
            "Title\n\nFirst para graph.\n\nSecond\nline\n\n3. three\n4. four\n* bullet\n\n    Quoted\n\na  b\nc  d\n\n  keep   this\n  spacing"
        );
    }

    #[test]
    fn test_inline_elements_keep_spacing() {
        assert_eq!(
            render("<p>The <b>quick</b> <i>brown</i>fox</p>", &[]),
            "The quick brownfox"
        );
    }

    #[test]
    fn test_nested_blockquote_indents_twice() {
        assert_eq!(
            render("<blockquote>outer<blockquote>inner</blockquote></blockquote>", &[]),
            "    outer\n\n        inner"
        );
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(render("<html><body>  </body></html>", &[]), "");
    }
}
