use crate::dom::{is_void_tag, Document, NodeId};
use std::collections::BTreeMap;

/// Start tags that implicitly close an open paragraph
const CLOSES_P: &[&str] = &[
    "address", "article", "aside", "blockquote", "div", "dl", "fieldset", "figure", "footer",
    "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "main", "nav", "ol", "p", "pre",
    "section", "table", "ul",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Start {
        name: String,
        attrs: BTreeMap<String, String>,
        self_closing: bool,
    },
    End(String),
    Text(String),
}

/// Tolerant tokenizer: never fails, unknown constructs degrade to text
struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
    raw_until: Option<String>,
}

impl<'a> Tokenizer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            raw_until: None,
        }
    }

    fn skip_past(&mut self, needle: &str) {
        self.pos = match self.src[self.pos..].find(needle) {
            Some(i) => self.pos + i + needle.len(),
            None => self.src.len(),
        };
    }

    fn raw_text(&mut self, tag: &str) -> Option<Token> {
        let rest = &self.src[self.pos..];
        let close = format!("</{}", tag);
        let end = rest
            .to_ascii_lowercase()
            .find(&close)
            .unwrap_or(rest.len());
        self.pos += end;
        (end > 0).then(|| Token::Text(rest[..end].to_string()))
    }

    fn end_tag(&mut self) -> Token {
        let bytes = self.src.as_bytes();
        let start = self.pos + 2;
        let mut i = start;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
            i += 1;
        }
        let name = self.src[start..i].to_ascii_lowercase();
        self.pos = i;
        self.skip_past(">");
        Token::End(name)
    }

    fn start_tag(&mut self) -> Token {
        let bytes = self.src.as_bytes();
        let len = bytes.len();
        let mut i = self.pos + 1;
        let name_start = i;
        while i < len && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' && bytes[i] != b'/' {
            i += 1;
        }
        let name = self.src[name_start..i].to_ascii_lowercase();
        let mut attrs = BTreeMap::new();
        let mut self_closing = false;

        loop {
            while i < len && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i >= len {
                break;
            }
            match bytes[i] {
                b'>' => {
                    i += 1;
                    break;
                }
                b'/' => {
                    i += 1;
                    if i < len && bytes[i] == b'>' {
                        self_closing = true;
                        i += 1;
                        break;
                    }
                    continue;
                }
                _ => {}
            }
            let attr_start = i;
            while i < len
                && !bytes[i].is_ascii_whitespace()
                && !matches!(bytes[i], b'=' | b'>' | b'/')
            {
                i += 1;
            }
            if attr_start == i {
                i += 1;
                continue;
            }
            let attr = self.src[attr_start..i].to_ascii_lowercase();
            while i < len && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            let mut value = String::new();
            if i < len && bytes[i] == b'=' {
                i += 1;
                while i < len && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                if i < len && matches!(bytes[i], b'"' | b'\'') {
                    let quote = bytes[i];
                    i += 1;
                    let value_start = i;
                    while i < len && bytes[i] != quote {
                        i += 1;
                    }
                    value = decode_entities(&self.src[value_start..i]);
                    if i < len {
                        i += 1;
                    }
                } else {
                    let value_start = i;
                    while i < len && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                        i += 1;
                    }
                    value = decode_entities(&self.src[value_start..i]);
                }
            }
            attrs.entry(attr).or_insert(value);
        }

        self.pos = i;
        if !self_closing && matches!(name.as_str(), "script" | "style") {
            self.raw_until = Some(name.clone());
        }
        Token::Start {
            name,
            attrs,
            self_closing,
        }
    }

    fn text(&mut self) -> Token {
        let rest = &self.src[self.pos..];
        let first = rest.chars().next().map_or(1, char::len_utf8);
        let end = rest[first..].find('<').map_or(rest.len(), |i| i + first);
        self.pos += end;
        Token::Text(decode_entities(&rest[..end]))
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            if self.pos >= self.src.len() {
                return None;
            }
            if let Some(tag) = self.raw_until.take() {
                match self.raw_text(&tag) {
                    Some(token) => return Some(token),
                    None => continue,
                }
            }
            let rest = &self.src[self.pos..];
            let next = rest.as_bytes().get(1).copied();
            if rest.starts_with("<!--") {
                self.pos += 4;
                self.skip_past("-->");
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                self.skip_past(">");
            } else if rest.starts_with("</") {
                if rest.as_bytes().get(2).is_some_and(u8::is_ascii_alphabetic) {
                    return Some(self.end_tag());
                }
                self.skip_past(">");
            } else if rest.starts_with('<') && next.is_some_and(|b| b.is_ascii_alphabetic()) {
                return Some(self.start_tag());
            } else {
                return Some(self.text());
            }
        }
    }
}

/// Decode character references; unknown ones are kept literally
pub(super) fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest[1..]
            .find(';')
            .map(|i| i + 1)
            .filter(|&end| end <= 12)
            .and_then(|end| decode_entity(&rest[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "hellip" => '\u{2026}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        _ => {
            let code = if let Some(hex) = name
                .strip_prefix("#x")
                .or_else(|| name.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse::<u32>().ok()?
            };
            return char::from_u32(code);
        }
    };
    Some(c)
}

/// Parse `html` and append the resulting nodes to `parent`
///
/// `html`/`body` tags are transparent and `head` content is skipped, so a
/// full document loads as its body content.
pub(super) fn parse_into(doc: &mut Document, parent: NodeId, html: &str) {
    let mut stack = vec![parent];
    let mut in_head = false;
    for token in Tokenizer::new(html) {
        if in_head {
            if token == Token::End("head".to_string()) {
                in_head = false;
            }
            continue;
        }
        match token {
            Token::Start {
                name, self_closing, ..
            } if name == "head" => in_head = !self_closing,
            Token::Start { name, .. } if matches!(name.as_str(), "html" | "body") => {}
            Token::End(name) if matches!(name.as_str(), "html" | "body" | "head") => {}
            Token::Start {
                name,
                attrs,
                self_closing,
            } => {
                close_implied(doc, &mut stack, &name);
                let element = doc.create_element_with(&name, attrs);
                let top = stack.last().copied().unwrap_or(parent);
                doc.append_child(top, element);
                if !self_closing && !is_void_tag(&name) {
                    stack.push(element);
                }
            }
            Token::End(name) => {
                let open = stack
                    .iter()
                    .enumerate()
                    .skip(1)
                    .rev()
                    .find(|(_, &n)| doc.has_tag(n, &name))
                    .map(|(i, _)| i);
                if let Some(index) = open {
                    stack.truncate(index);
                }
            }
            Token::Text(text) => {
                let top = stack.last().copied().unwrap_or(parent);
                let node = doc.create_text(&text);
                doc.append_child(top, node);
            }
        }
    }
}

fn close_implied(doc: &Document, stack: &mut Vec<NodeId>, name: &str) {
    if CLOSES_P.contains(&name) {
        for index in (1..stack.len()).rev() {
            let node = stack[index];
            if doc.has_tag(node, "p") {
                stack.truncate(index);
                break;
            }
            if doc.is_block(node) {
                break;
            }
        }
    }
    match name {
        "li" => close_nearest(doc, stack, &["li"], &["ul", "ol"]),
        "dt" | "dd" => close_nearest(doc, stack, &["dt", "dd"], &["dl"]),
        "tr" => close_nearest(doc, stack, &["tr"], &["table", "tbody", "thead", "tfoot"]),
        "td" | "th" => close_nearest(doc, stack, &["td", "th"], &["tr", "table"]),
        "tbody" | "thead" | "tfoot" => {
            close_nearest(doc, stack, &["tbody", "thead", "tfoot"], &["table"])
        }
        _ => {}
    }
}

fn close_nearest(doc: &Document, stack: &mut Vec<NodeId>, targets: &[&str], stops: &[&str]) {
    for index in (1..stack.len()).rev() {
        let node = stack[index];
        if targets.iter().any(|t| doc.has_tag(node, t)) {
            stack.truncate(index);
            return;
        }
        if stops.iter().any(|t| doc.has_tag(node, t)) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::HtmlProcessor;

    fn parse(html: &str) -> String {
        let mut doc = Document::new();
        let holder = doc.create_element("div");
        parse_into(&mut doc, holder, html);
        HtmlProcessor::permissive().serialize_children(&doc, holder)
    }

    #[test]
    fn test_implicit_closing() {
        assert_eq!(parse("<p>a<p>b"), "<p>a</p><p>b</p>");
        assert_eq!(
            parse("<ul><li>a<li>b</ul>"),
            "<ul><li>a</li><li>b</li></ul>"
        );
        assert_eq!(
            parse("<table><tr><td>1<td>2<tr><td>3</table>"),
            "<table><tr><td>1</td><td>2</td></tr><tr><td>3</td></tr></table>"
        );
        assert_eq!(parse("<p>a<div>b</div>"), "<p>a</p><div>b</div>");
    }

    #[test]
    fn test_stray_end_tags_ignored() {
        assert_eq!(parse("a</b>c</p>"), "ac");
        assert_eq!(parse("<b>x</i>y</b>"), "<b>xy</b>");
    }

    #[test]
    fn test_attributes() {
        assert_eq!(
            parse("<A HREF=/x title='it&amp;s' disabled>l</a>"),
            "<a disabled=\"\" href=\"/x\" title=\"it&amp;s\">l</a>"
        );
        assert_eq!(parse("<br/><img src=\"a\" />"), "<br><img src=\"a\">");
    }

    #[test]
    fn test_comments_and_doctype_skipped() {
        assert_eq!(parse("<!DOCTYPE html><!-- note -->a<?xml?>b"), "ab");
    }

    #[test]
    fn test_raw_text_elements() {
        assert_eq!(
            parse("<script>if (a < b) {}</script>x"),
            "<script>if (a < b) {}</script>x"
        );
    }

    #[test]
    fn test_entities() {
        assert_eq!(decode_entities("a &lt;&#65;&#x42;&unknown; &"), "a <AB&unknown; &");
        assert_eq!(decode_entities("&nbsp;"), "\u{a0}");
    }

    #[test]
    fn test_lone_angle_bracket_is_text() {
        assert_eq!(parse("a < b"), "a &lt; b");
    }
}
