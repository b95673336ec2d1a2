//! Markdown-style shortcuts for the editing surface.
//!
//! Typing a block prefix followed by a space converts the line
//! ([`format_line_on_space`]); pasting text that looks like markdown converts
//! the whole block to HTML ([`markdown_paste_to_html`]).
use std::sync::OnceLock;

use log::debug;
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    CodeBlock { language: Option<String> },
    Heading(u8),
    BulletList,
    OrderedList,
    Blockquote,
}

/// A line converted to a block, with the prefix stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockConversion {
    pub kind: BlockKind,
    pub text: String,
}

impl BlockConversion {
    /// The block as editor markup
    pub fn to_html(&self) -> String {
        let text = html_escape::encode_text(&self.text);
        match &self.kind {
            BlockKind::CodeBlock { language: Some(lang) } => format!(
                "<pre><code class=\"language-{}\">{}</code></pre>",
                html_escape::encode_double_quoted_attribute(lang),
                text
            ),
            BlockKind::CodeBlock { language: None } => format!("<pre><code>{}</code></pre>", text),
            BlockKind::Heading(level) => format!("<h{level}>{text}</h{level}>"),
            BlockKind::BulletList => format!("<ul><li>{}</li></ul>", text),
            BlockKind::OrderedList => format!("<ol><li>{}</li></ol>", text),
            BlockKind::Blockquote => format!("<blockquote><p>{}</p></blockquote>", text),
        }
    }
}

fn code_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^```\s*(\w*)\s*$").expect("valid code fence regex"))
}

fn heading() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{1,6})\s").expect("valid heading regex"))
}

fn bullet() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[-*]\s").expect("valid bullet regex"))
}

fn ordered() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\s").expect("valid ordered list regex"))
}

fn quote() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^>\s").expect("valid blockquote regex"))
}

fn inline_code() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([^`]+)`").expect("valid inline code regex"))
}

fn whole_line_code() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^`.*`$").expect("valid inline code line regex"))
}

/// Converts `line` (text before the cursor, including the typed space) into a block.
///
/// Patterns are tried in order: code fence, heading, bullet, ordered list,
/// blockquote. The first match wins.
pub fn format_line_on_space(line: &str) -> Option<BlockConversion> {
    let fence_candidate = line.trim_end();
    if let Some(caps) = code_fence().captures(fence_candidate) {
        let language = caps.get(1).map(|m| m.as_str()).filter(|l| !l.is_empty());
        return Some(BlockConversion {
            kind: BlockKind::CodeBlock {
                language: language.map(str::to_string),
            },
            text: String::new(),
        });
    }

    if let Some(m) = heading().find(line) {
        let level = line.chars().take_while(|c| *c == '#').count() as u8;
        return Some(BlockConversion {
            kind: BlockKind::Heading(level),
            text: line[m.end()..].to_string(),
        });
    }

    let prefixed = [
        (bullet(), BlockKind::BulletList),
        (ordered(), BlockKind::OrderedList),
        (quote(), BlockKind::Blockquote),
    ];
    prefixed.into_iter().find_map(|(re, kind)| {
        re.find(line).map(|m| BlockConversion {
            kind,
            text: line[m.end()..].to_string(),
        })
    })
}

/// Whether pasted text should be converted rather than inserted as-is
pub fn looks_like_markdown(text: &str) -> bool {
    text.contains("```")
        || text.lines().any(|line| {
            heading().is_match(line)
                || bullet().is_match(line)
                || ordered().is_match(line)
                || quote().is_match(line)
                || whole_line_code().is_match(line)
        })
}

#[derive(Debug, Default)]
enum Accumulator {
    #[default]
    None,
    Bullet(Vec<String>),
    Ordered(Vec<String>),
    Quote(Vec<String>),
    Code {
        language: Option<String>,
        lines: Vec<String>,
    },
}

impl Accumulator {
    fn flush_into(&mut self, html: &mut String) {
        match std::mem::take(self) {
            Accumulator::None => {}
            Accumulator::Bullet(items) => push_list(html, "ul", &items),
            Accumulator::Ordered(items) => push_list(html, "ol", &items),
            Accumulator::Quote(lines) => {
                html.push_str("<blockquote><p>");
                html.push_str(&lines.join(" "));
                html.push_str("</p></blockquote>");
            }
            Accumulator::Code { language, lines } => {
                match language {
                    Some(lang) => html.push_str(&format!(
                        "<pre><code class=\"language-{}\">",
                        html_escape::encode_double_quoted_attribute(&lang)
                    )),
                    None => html.push_str("<pre><code>"),
                }
                html.push_str(&html_escape::encode_text(&lines.join("\n")));
                html.push_str("</code></pre>");
            }
        }
    }
}

fn push_list(html: &mut String, tag: &str, items: &[String]) {
    html.push_str(&format!("<{}>", tag));
    for item in items {
        html.push_str("<li>");
        html.push_str(item);
        html.push_str("</li>");
    }
    html.push_str(&format!("</{}>", tag));
}

fn render_inline(text: &str) -> String {
    let escaped = html_escape::encode_text(text);
    inline_code()
        .replace_all(&escaped, "<code>$1</code>")
        .into_owned()
}

/// Converts pasted markdown into structural HTML.
///
/// Returns `None` when the text does not look like markdown, leaving the
/// paste to the default insertion.
pub fn markdown_paste_to_html(text: &str) -> Option<String> {
    if !looks_like_markdown(text) {
        return None;
    }

    let mut html = String::new();
    let mut acc = Accumulator::None;

    for line in text.lines() {
        let trimmed = line.trim();

        if let Some(rest) = trimmed.strip_prefix("```") {
            let closing = matches!(acc, Accumulator::Code { .. });
            acc.flush_into(&mut html);
            if !closing {
                let language = Some(rest.trim().to_string()).filter(|l| !l.is_empty());
                acc = Accumulator::Code {
                    language,
                    lines: Vec::new(),
                };
            }
            continue;
        }

        if let Accumulator::Code { lines, .. } = &mut acc {
            lines.push(line.to_string());
            continue;
        }

        if trimmed.is_empty() {
            continue;
        }

        if let Some(m) = heading().find(trimmed) {
            acc.flush_into(&mut html);
            let level = trimmed.chars().take_while(|c| *c == '#').count();
            let body = trimmed[m.end()..].trim();
            html.push_str(&format!("<h{level}>{}</h{level}>", render_inline(body)));
            continue;
        }

        if let Some(m) = bullet().find(trimmed) {
            let item = render_inline(trimmed[m.end()..].trim());
            match &mut acc {
                Accumulator::Bullet(items) => items.push(item),
                _ => {
                    acc.flush_into(&mut html);
                    acc = Accumulator::Bullet(vec![item]);
                }
            }
            continue;
        }

        if let Some(m) = ordered().find(trimmed) {
            let item = render_inline(trimmed[m.end()..].trim());
            match &mut acc {
                Accumulator::Ordered(items) => items.push(item),
                _ => {
                    acc.flush_into(&mut html);
                    acc = Accumulator::Ordered(vec![item]);
                }
            }
            continue;
        }

        if let Some(m) = quote().find(trimmed) {
            let line = render_inline(trimmed[m.end()..].trim());
            match &mut acc {
                Accumulator::Quote(lines) => lines.push(line),
                _ => {
                    acc.flush_into(&mut html);
                    acc = Accumulator::Quote(vec![line]);
                }
            }
            continue;
        }

        acc.flush_into(&mut html);
        html.push_str(&format!("<p>{}</p>", render_inline(trimmed)));
    }

    acc.flush_into(&mut html);
    debug!("Converted {} pasted lines to HTML", text.lines().count());
    Some(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_prefix_becomes_a_heading() {
        assert_eq!(
            format_line_on_space("# Title"),
            Some(BlockConversion {
                kind: BlockKind::Heading(1),
                text: "Title".into()
            })
        );
        assert_eq!(
            format_line_on_space("### "),
            Some(BlockConversion {
                kind: BlockKind::Heading(3),
                text: String::new()
            })
        );
        assert_eq!(format_line_on_space("####### too deep"), None);
    }

    #[test]
    fn list_quote_and_fence_prefixes() {
        assert_eq!(format_line_on_space("- item").unwrap().kind, BlockKind::BulletList);
        assert_eq!(format_line_on_space("* item").unwrap().text, "item");
        assert_eq!(format_line_on_space("12. step").unwrap().kind, BlockKind::OrderedList);
        assert_eq!(format_line_on_space("> quoted").unwrap().kind, BlockKind::Blockquote);
        assert_eq!(
            format_line_on_space("```rust ").unwrap().kind,
            BlockKind::CodeBlock {
                language: Some("rust".into())
            }
        );
        assert_eq!(format_line_on_space("plain text "), None);
        assert_eq!(format_line_on_space("-no space"), None);
    }

    #[test]
    fn converted_lines_render_as_blocks() {
        assert_eq!(format_line_on_space("# Title").unwrap().to_html(), "<h1>Title</h1>");
        assert_eq!(
            format_line_on_space("> a & b").unwrap().to_html(),
            "<blockquote><p>a &amp; b</p></blockquote>"
        );
    }

    #[test]
    fn plain_paste_is_left_alone() {
        assert!(!looks_like_markdown("just a sentence\nand another"));
        assert_eq!(markdown_paste_to_html("just a sentence"), None);
        assert!(looks_like_markdown("`code`"));
    }

    #[test]
    fn switching_block_types_flushes_the_previous_one() {
        let text = "# Notes\n- one\n- two\n1. first\n2. second\n> a\n> b\n\ntrailing text";
        assert_eq!(
            markdown_paste_to_html(text).unwrap(),
            "<h1>Notes</h1>\
             <ul><li>one</li><li>two</li></ul>\
             <ol><li>first</li><li>second</li></ol>\
             <blockquote><p>a b</p></blockquote>\
             <p>trailing text</p>"
        );
    }

    #[test]
    fn code_blocks_keep_lines_and_escape_markup() {
        let text = "intro `x < y`\n```rust\nfn main() {\n    let a = 1 < 2;\n}\n```\n- after";
        assert_eq!(
            markdown_paste_to_html(text).unwrap(),
            "<p>intro <code>x &lt; y</code></p>\
             <pre><code class=\"language-rust\">fn main() {\n    let a = 1 &lt; 2;\n}</code></pre>\
             <ul><li>after</li></ul>"
        );
    }

    #[test]
    fn fence_language_cannot_break_out_of_the_class_attribute() {
        let html = markdown_paste_to_html("```x\"><img src=x onerror=alert(1)>\ncode\n```").unwrap();
        assert!(html.starts_with("<pre><code class=\"language-x&quot;"));
        assert!(html.ends_with("\">code</code></pre>"));
        assert!(!html.contains("<img"));
    }

    #[test]
    fn unterminated_code_block_is_flushed() {
        assert_eq!(
            markdown_paste_to_html("```\nlet x = 1;").unwrap(),
            "<pre><code>let x = 1;</code></pre>"
        );
    }
}
