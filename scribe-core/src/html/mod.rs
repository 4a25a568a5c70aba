//! HTML processor: converts between the DOM and persisted HTML text
//!
//! Normalisation is driven by [`HtmlRules`]: tag and attribute allow-lists,
//! the link target policy and the doctype flavour used for void elements.

mod parse;
mod serialize;

use crate::context::EditContext;
use crate::dom::{Document, NodeId};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Elements dropped together with their content when not allowed
const DROP_WITH_CONTENT: &[&str] = &["script", "style", "iframe", "object", "embed"];

/// Document skeleton elements, always written by [`HtmlProcessor::serialize_document`]
const DOCUMENT_TAGS: &[&str] = &["html", "head", "body", "title", "meta"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkTargetPolicy {
    /// Keep `target` attributes as authored
    Preserve,
    /// Strip every `target` attribute
    Remove,
    /// Force `target="_blank"` on links leaving the site
    ExternalBlank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Doctype {
    Html5,
    Xhtml,
}

impl Doctype {
    pub fn declaration(self) -> &'static str {
        match self {
            Doctype::Html5 => "<!DOCTYPE html>",
            Doctype::Xhtml => {
                "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Transitional//EN\" \
                 \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd\">"
            }
        }
    }
}

/// Normalisation rules applied when reading and writing HTML
///
/// `None` allow-lists accept everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HtmlRules {
    pub link_target: LinkTargetPolicy,
    pub doctype: Doctype,
    pub allowed_tags: Option<BTreeSet<String>>,
    /// Attributes allowed on every element
    pub allowed_attributes: Option<BTreeSet<String>>,
    /// Additional attributes allowed per tag
    pub tag_attributes: BTreeMap<String, BTreeSet<String>>,
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for HtmlRules {
    fn default() -> Self {
        let tags = set(&[
            "a", "address", "b", "blockquote", "br", "caption", "code", "del", "div", "em", "h1",
            "h2", "h3", "h4", "h5", "h6", "hr", "i", "img", "li", "ol", "p", "pre", "s", "span",
            "strike", "strong", "sub", "sup", "table", "tbody", "td", "tfoot", "th", "thead", "tr",
            "u", "ul",
        ]);
        let mut tag_attributes = BTreeMap::new();
        tag_attributes.insert("a".to_string(), set(&["href", "name", "target"]));
        tag_attributes.insert(
            "img".to_string(),
            set(&["align", "alt", "height", "src", "width"]),
        );
        tag_attributes.insert("td".to_string(), set(&["colspan", "rowspan"]));
        tag_attributes.insert("th".to_string(), set(&["colspan", "rowspan"]));
        tag_attributes.insert("table".to_string(), set(&["border", "cellpadding", "cellspacing"]));
        Self {
            allowed_tags: Some(tags),
            allowed_attributes: Some(set(&["align", "class", "dir", "id", "style", "title"])),
            tag_attributes,
            link_target: LinkTargetPolicy::Preserve,
            doctype: Doctype::Html5,
        }
    }
}

impl HtmlRules {
    /// Accept every tag and attribute unchanged
    pub fn permissive() -> Self {
        Self {
            allowed_tags: None,
            allowed_attributes: None,
            tag_attributes: BTreeMap::new(),
            link_target: LinkTargetPolicy::Preserve,
            doctype: Doctype::Html5,
        }
    }

    pub fn allows_tag(&self, tag: &str) -> bool {
        self.allowed_tags
            .as_ref()
            .map_or(true, |tags| tags.contains(tag))
    }

    pub fn allows_attribute(&self, tag: &str, name: &str) -> bool {
        let Some(global) = &self.allowed_attributes else {
            return true;
        };
        global.contains(name)
            || self
                .tag_attributes
                .get(tag)
                .is_some_and(|attrs| attrs.contains(name))
    }

    /// Attributes of an element as they should be written
    pub(crate) fn filter_attributes(
        &self,
        tag: &str,
        attrs: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let mut kept: BTreeMap<String, String> = attrs
            .iter()
            .filter(|(name, _)| self.allows_attribute(tag, name))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if tag == "a" {
            match self.link_target {
                LinkTargetPolicy::Preserve => {}
                LinkTargetPolicy::Remove => {
                    kept.remove("target");
                }
                LinkTargetPolicy::ExternalBlank => {
                    if kept.get("href").is_some_and(|href| is_external(href)) {
                        kept.insert("target".to_string(), "_blank".to_string());
                    }
                }
            }
        }
        kept
    }
}

/// Returns true for absolute links leaving the current site
pub fn is_external(href: &str) -> bool {
    let lower = href.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("//")
}

/// Top-level nodes produced by [`HtmlProcessor::deserialize`], not yet attached
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub nodes: Vec<NodeId>,
}

impl Fragment {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct HtmlProcessor {
    rules: HtmlRules,
}

impl HtmlProcessor {
    pub fn new(rules: HtmlRules) -> Self {
        Self { rules }
    }

    pub fn permissive() -> Self {
        Self::new(HtmlRules::permissive())
    }

    pub fn rules(&self) -> &HtmlRules {
        &self.rules
    }

    /// Serialize the content of the editing root
    pub fn serialize(&self, ctx: &EditContext) -> String {
        self.serialize_children(ctx.doc(), ctx.root())
    }

    pub fn serialize_children(&self, doc: &Document, node: NodeId) -> String {
        let mut out = String::new();
        for &child in doc.children(node) {
            serialize::write_node(&self.rules, doc, child, &mut out);
        }
        out
    }

    /// Serialize one node including its own markup
    pub fn serialize_node(&self, doc: &Document, node: NodeId) -> String {
        let mut out = String::new();
        serialize::write_node(&self.rules, doc, node, &mut out);
        out
    }

    /// Serialize the whole hosting document with its doctype declaration
    pub fn serialize_document(&self, doc: &Document) -> String {
        let mut rules = self.rules.clone();
        if let Some(tags) = rules.allowed_tags.as_mut() {
            tags.extend(DOCUMENT_TAGS.iter().map(|t| t.to_string()));
        }
        let mut out = String::from(rules.doctype.declaration());
        for &child in doc.children(doc.document_node()) {
            serialize::write_node(&rules, doc, child, &mut out);
        }
        out
    }

    /// Parse `html` into detached nodes owned by `doc`
    ///
    /// Disallowed markup is normalised away the same way serialization does.
    pub fn deserialize(&self, html: &str, doc: &mut Document) -> Fragment {
        let holder = doc.create_element("div");
        parse::parse_into(doc, holder, html);
        self.sanitize(doc, holder);
        doc.normalize(holder);
        let nodes = doc.children(holder).to_vec();
        for &node in &nodes {
            doc.detach(node);
        }
        Fragment { nodes }
    }

    /// Replace the content of the editing root
    pub fn set_content(&self, ctx: &mut EditContext, html: &str) -> Result<()> {
        let root = ctx.root();
        let fragment = self.deserialize(html, ctx.doc_mut());
        let doc = ctx.doc_mut();
        doc.clear_children(root);
        for node in fragment.nodes {
            doc.append_child(root, node);
        }
        doc.check_well_formed(root)?;
        ctx.set_selection(None);
        Ok(())
    }

    /// Apply the allow-lists to the subtree under `node` in place
    pub fn sanitize(&self, doc: &mut Document, node: NodeId) {
        for child in doc.descendants(node) {
            if !doc.contains(node, child) {
                continue;
            }
            let Some(tag) = doc.tag(child).map(str::to_string) else {
                continue;
            };
            if !self.rules.allows_tag(&tag) {
                if DROP_WITH_CONTENT.contains(&tag.as_str()) {
                    doc.detach(child);
                } else if doc.unwrap(child).is_err() {
                    doc.detach(child);
                }
                continue;
            }
            let Some(attrs) = doc.attrs(child).cloned() else {
                continue;
            };
            let kept = self.rules.filter_attributes(&tag, &attrs);
            if kept != attrs {
                for name in attrs.keys().filter(|name| !kept.contains_key(*name)) {
                    doc.remove_attr(child, name);
                }
                for (name, value) in &kept {
                    if attrs.get(name) != Some(value) {
                        doc.set_attr(child, name, value);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SurfaceKind;

    fn context() -> EditContext {
        let mut doc = Document::new();
        let root = doc.create_element("div");
        let document = doc.document_node();
        doc.append_child(document, root);
        EditContext::new(doc, root, None, SurfaceKind::Container)
    }

    #[test]
    fn test_round_trip_allowed_markup() -> Result<()> {
        let html = "<p class=\"intro\">Hello <b>big</b> <a href=\"/x\">world</a><br></p><ul><li>one</li></ul>";
        let processor = HtmlProcessor::new(HtmlRules::default());
        let mut ctx = context();
        processor.set_content(&mut ctx, html)?;
        assert_eq!(processor.serialize(&ctx), html);
        Ok(())
    }

    #[test]
    fn test_disallowed_markup_is_normalised() -> Result<()> {
        let processor = HtmlProcessor::new(HtmlRules::default());
        let mut ctx = context();
        processor.set_content(
            &mut ctx,
            "<p onclick=\"x()\">a<font color=\"red\">b</font><script>evil()</script></p>",
        )?;
        assert_eq!(processor.serialize(&ctx), "<p>ab</p>");
        Ok(())
    }

    #[test]
    fn test_link_target_policies() -> Result<()> {
        let mut ctx = context();
        HtmlProcessor::permissive().set_content(
            &mut ctx,
            "<a href=\"https://example.com\">x</a><a href=\"/local\" target=\"top\">y</a>",
        )?;

        let mut rules = HtmlRules::permissive();
        rules.link_target = LinkTargetPolicy::ExternalBlank;
        assert_eq!(
            HtmlProcessor::new(rules.clone()).serialize(&ctx),
            "<a href=\"https://example.com\" target=\"_blank\">x</a><a href=\"/local\" target=\"top\">y</a>"
        );

        rules.link_target = LinkTargetPolicy::Remove;
        assert_eq!(
            HtmlProcessor::new(rules).serialize(&ctx),
            "<a href=\"https://example.com\">x</a><a href=\"/local\">y</a>"
        );
        Ok(())
    }

    #[test]
    fn test_void_elements_follow_doctype() -> Result<()> {
        let mut ctx = context();
        HtmlProcessor::permissive().set_content(&mut ctx, "a<br>b<img src=\"i.png\">")?;
        let mut rules = HtmlRules::permissive();
        rules.doctype = Doctype::Xhtml;
        assert_eq!(
            HtmlProcessor::new(rules).serialize(&ctx),
            "a<br />b<img src=\"i.png\" />"
        );
        Ok(())
    }

    #[test]
    fn test_rules_from_toml() {
        let rules: HtmlRules = toml::from_str(
            "allowed_tags = [\"p\", \"b\"]\nlink_target = \"external_blank\"\ndoctype = \"xhtml\"",
        )
        .unwrap();
        assert!(rules.allows_tag("p"));
        assert!(!rules.allows_tag("i"));
        assert_eq!(rules.link_target, LinkTargetPolicy::ExternalBlank);
        assert_eq!(rules.doctype, Doctype::Xhtml);
    }

    #[test]
    fn test_full_document_loads_body() -> Result<()> {
        let mut ctx = context();
        HtmlProcessor::permissive().set_content(
            &mut ctx,
            "<!DOCTYPE html><html><head><title>t</title></head><body><p>x</p></body></html>",
        )?;
        assert_eq!(HtmlProcessor::permissive().serialize(&ctx), "<p>x</p>");
        Ok(())
    }
}
