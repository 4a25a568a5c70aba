use super::{Doctype, HtmlRules, DROP_WITH_CONTENT};
use crate::dom::{is_void_tag, Document, NodeId, NodeKind};

pub(super) fn write_node(rules: &HtmlRules, doc: &Document, node: NodeId, out: &mut String) {
    match doc.kind(node) {
        NodeKind::Document => {
            for &child in doc.children(node) {
                write_node(rules, doc, child, out);
            }
        }
        NodeKind::Text(text) => escape_text(text, out),
        NodeKind::Element(el) => {
            if !rules.allows_tag(&el.tag) {
                if !DROP_WITH_CONTENT.contains(&el.tag.as_str()) {
                    for &child in doc.children(node) {
                        write_node(rules, doc, child, out);
                    }
                }
                return;
            }
            out.push('<');
            out.push_str(&el.tag);
            for (name, value) in rules.filter_attributes(&el.tag, &el.attrs) {
                out.push(' ');
                out.push_str(&name);
                out.push_str("=\"");
                escape_attr(&value, out);
                out.push('"');
            }
            if is_void_tag(&el.tag) {
                out.push_str(match rules.doctype {
                    Doctype::Html5 => ">",
                    Doctype::Xhtml => " />",
                });
                return;
            }
            out.push('>');
            if matches!(el.tag.as_str(), "script" | "style") {
                for &child in doc.children(node) {
                    if let Some(text) = doc.text(child) {
                        out.push_str(text);
                    }
                }
            } else {
                for &child in doc.children(node) {
                    write_node(rules, doc, child, out);
                }
            }
            out.push_str("</");
            out.push_str(&el.tag);
            out.push('>');
        }
    }
}

fn escape_text(text: &str, out: &mut String) {
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

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escaping() {
        let mut out = String::new();
        escape_text("a < b & c\u{a0}", &mut out);
        assert_eq!(out, "a &lt; b &amp; c&nbsp;");
        let mut out = String::new();
        escape_attr("say \"hi\"", &mut out);
        assert_eq!(out, "say &quot;hi&quot;");
    }
}
