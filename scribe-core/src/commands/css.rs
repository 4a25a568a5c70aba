//! Inline `style` and `class` attribute editing

use crate::dom::{Document, NodeId};

fn parse(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();
            (!name.is_empty() && !value.is_empty()).then(|| (name, value.to_string()))
        })
        .collect()
}

fn write(props: &[(String, String)]) -> String {
    props
        .iter()
        .map(|(name, value)| format!("{}: {};", name, value))
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn property(doc: &Document, node: NodeId, name: &str) -> Option<String> {
    let style = doc.attr(node, "style")?;
    parse(style)
        .into_iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v)
}

/// Set or (with `None`) remove one property, dropping an emptied attribute
pub(crate) fn set_property(doc: &mut Document, node: NodeId, name: &str, value: Option<&str>) {
    let mut props = doc.attr(node, "style").map(parse).unwrap_or_default();
    props.retain(|(n, _)| n != name);
    if let Some(value) = value {
        props.push((name.to_string(), value.to_string()));
    }
    if props.is_empty() {
        doc.remove_attr(node, "style");
    } else {
        doc.set_attr(node, "style", &write(&props));
    }
}

pub(crate) fn has_class(doc: &Document, node: NodeId, class: &str) -> bool {
    doc.attr(node, "class")
        .is_some_and(|c| c.split_whitespace().any(|token| token == class))
}

/// Add or remove one class token, dropping an emptied attribute
pub(crate) fn set_class(doc: &mut Document, node: NodeId, class: &str, present: bool) {
    let mut tokens: Vec<String> = doc
        .attr(node, "class")
        .map(|c| c.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    tokens.retain(|token| token != class);
    if present {
        tokens.push(class.to_string());
    }
    if tokens.is_empty() {
        doc.remove_attr(node, "class");
    } else {
        doc.set_attr(node, "class", &tokens.join(" "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_remove_property() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        doc.set_attr(p, "style", "color: red");
        set_property(&mut doc, p, "text-align", Some("center"));
        assert_eq!(doc.attr(p, "style"), Some("color: red; text-align: center;"));
        assert_eq!(property(&doc, p, "text-align").as_deref(), Some("center"));

        set_property(&mut doc, p, "color", None);
        set_property(&mut doc, p, "text-align", None);
        assert_eq!(doc.attr(p, "style"), None);
    }

    #[test]
    fn test_class_tokens() {
        let mut doc = Document::new();
        let img = doc.create_element("img");
        doc.set_attr(img, "class", "wide");
        set_class(&mut doc, img, "framed", true);
        assert_eq!(doc.attr(img, "class"), Some("wide framed"));
        assert!(has_class(&doc, img, "framed"));
        set_class(&mut doc, img, "wide", false);
        set_class(&mut doc, img, "framed", false);
        assert_eq!(doc.attr(img, "class"), None);
    }
}
