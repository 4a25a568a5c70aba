//! Configuration management for scribe

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::dom::{is_block_tag, is_void_tag};
use crate::event::ConfigEvent;
use crate::html::HtmlRules;
use crate::plugin::FeatureSet;
use crate::undo::DEFAULT_MAX_STEPS;

/// Block formats offered when none (or only invalid ones) are configured
pub const DEFAULT_PARAGRAPH_FORMATS: &[&str] =
    &["p", "h1", "h2", "h3", "h4", "h5", "h6", "pre", "address", "div"];

/// Every block format the format-block command knows how to produce
const KNOWN_FORMATS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "pre", "address", "div", "blockquote",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paragraph_formats: Vec<String>,
    pub undo: UndoConfig,
    pub html: HtmlRules,
    pub links: LinkRules,
    pub surface: SurfaceConfig,
    pub plugins: BTreeMap<String, FeatureSet>,
    pub styles: Vec<StyleDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UndoConfig {
    pub max_steps: usize,
}

/// Rules for link targets accepted by the link commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkRules {
    /// URL schemes accepted for absolute links
    pub allowed_schemes: Vec<String>,
    pub allow_relative: bool,
    /// Target applied to links leaving the site when the caller gives none
    pub external_target: Option<String>,
    pub default_class: Option<String>,
}

/// A named entry of the style catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleDef {
    pub name: String,
    #[serde(default = "default_style_element")]
    pub element: String,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
}

fn default_style_element() -> String {
    "span".to_string()
}

impl StyleDef {
    pub fn is_block(&self) -> bool {
        is_block_tag(&self.element)
    }

    /// Attributes carried by elements of this style
    pub fn attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = BTreeMap::new();
        if let Some(class) = &self.class {
            attrs.insert("class".to_string(), class.clone());
        }
        if let Some(style) = &self.style {
            attrs.insert("style".to_string(), style.clone());
        }
        attrs
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Force deferred caret initialisation on or off; surface default if unset
    pub defer_caret_init: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paragraph_formats: DEFAULT_PARAGRAPH_FORMATS
                .iter()
                .map(|f| f.to_string())
                .collect(),
            undo: UndoConfig::default(),
            html: HtmlRules::default(),
            links: LinkRules::default(),
            surface: SurfaceConfig::default(),
            plugins: BTreeMap::new(),
            styles: Vec::new(),
        }
    }
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl Default for LinkRules {
    fn default() -> Self {
        Self {
            allowed_schemes: ["http", "https", "mailto", "ftp", "tel"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            allow_relative: true,
            external_target: None,
            default_class: None,
        }
    }
}

impl LinkRules {
    /// Check a link target against the rules
    pub fn check(&self, url: &str) -> Result<()> {
        let url = url.trim();
        if url.is_empty() {
            anyhow::bail!("link target is empty");
        }
        match scheme_of(url) {
            Some(scheme) => {
                if !self
                    .allowed_schemes
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(scheme))
                {
                    anyhow::bail!("link scheme `{}` is not allowed", scheme);
                }
            }
            None => {
                if !self.allow_relative {
                    anyhow::bail!("relative link `{}` is not allowed", url);
                }
            }
        }
        Ok(())
    }
}

/// Scheme of an absolute URL, if the text before the first `:` looks like one
fn scheme_of(url: &str) -> Option<&str> {
    let colon = url.find(':')?;
    let candidate = &url[..colon];
    let mut chars = candidate.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(candidate)
}

/// Catalogs and rules consulted by commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub styles: Vec<StyleDef>,
    pub paragraph_formats: Vec<String>,
    pub links: LinkRules,
}

impl Default for Catalog {
    fn default() -> Self {
        Config::default().catalog()
    }
}

impl Catalog {
    pub fn style(&self, name: &str) -> Option<&StyleDef> {
        self.styles.iter().find(|s| s.name == name)
    }

    pub fn has_format(&self, tag: &str) -> bool {
        self.paragraph_formats.iter().any(|f| f == tag)
    }
}

impl Config {
    /// Get the platform-specific config file path
    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "scribe")
            .map(|proj_dirs| proj_dirs.config_dir().join("scribe.toml"))
    }

    /// Load configuration from file, falling back to defaults if missing
    ///
    /// Returns the validated config with the events produced while loading.
    pub fn load() -> Result<(Self, Vec<ConfigEvent>)> {
        if let Some(path) = Self::config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        let mut config = Self::default();
        let mut events = config.validate();
        let notice = ConfigEvent::info("No config file, using defaults", "config");
        notice.log();
        events.push(notice);
        Ok((config, events))
    }

    /// Load from a specific path
    pub fn load_from(path: &Path) -> Result<(Self, Vec<ConfigEvent>)> {
        // Check config file permissions (Unix only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = std::fs::metadata(path)
                .with_context(|| format!("Failed to stat config file: {}", path.display()))?;
            if metadata.permissions().mode() & 0o002 != 0 {
                anyhow::bail!(
                    "Config file {} is world-writable (insecure permissions)",
                    path.display()
                );
            }
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        let events = config.validate();
        Ok((config, events))
    }

    /// Drop malformed entries, replacing them with defaults where needed
    pub fn validate(&mut self) -> Vec<ConfigEvent> {
        let mut events = Vec::new();

        if self.undo.max_steps == 0 {
            events.push(ConfigEvent::warning(
                format!("undo.max_steps must be positive, using {}", DEFAULT_MAX_STEPS),
                "undo",
            ));
            self.undo.max_steps = DEFAULT_MAX_STEPS;
        }

        let mut seen = BTreeSet::new();
        self.styles.retain_mut(|style| {
            style.element = style.element.trim().to_ascii_lowercase();
            let problem = if style.name.trim().is_empty() {
                Some("style without a name".to_string())
            } else if !valid_tag(&style.element) || is_void_tag(&style.element) {
                Some(format!(
                    "style `{}` has invalid element `{}`",
                    style.name, style.element
                ))
            } else if !seen.insert(style.name.clone()) {
                Some(format!("duplicate style `{}`", style.name))
            } else {
                None
            };
            match problem {
                Some(message) => {
                    events.push(ConfigEvent::warning(format!("{}, dropped", message), "styles"));
                    false
                }
                None => true,
            }
        });

        let mut formats = Vec::new();
        for format in &self.paragraph_formats {
            let format = format.trim().to_ascii_lowercase();
            if !KNOWN_FORMATS.contains(&format.as_str()) {
                events.push(ConfigEvent::warning(
                    format!("unknown paragraph format `{}`, dropped", format),
                    "paragraph_formats",
                ));
            } else if !formats.contains(&format) {
                formats.push(format);
            }
        }
        if formats.is_empty() {
            events.push(ConfigEvent::warning(
                "no usable paragraph formats, using the built-in set",
                "paragraph_formats",
            ));
            formats = DEFAULT_PARAGRAPH_FORMATS
                .iter()
                .map(|f| f.to_string())
                .collect();
        }
        self.paragraph_formats = formats;

        for scheme in self.links.allowed_schemes.iter_mut() {
            *scheme = scheme.trim().to_ascii_lowercase();
        }

        for event in &events {
            event.log();
        }
        events
    }

    pub fn catalog(&self) -> Catalog {
        Catalog {
            styles: self.styles.clone(),
            paragraph_formats: self.paragraph_formats.clone(),
            links: self.links.clone(),
        }
    }

    /// Feature enablement for a plugin; plugins not mentioned are fully enabled
    pub fn plugin_features(&self, id: &str) -> FeatureSet {
        self.plugins.get(id).cloned().unwrap_or_default()
    }
}

fn valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::LinkTargetPolicy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.undo.max_steps, DEFAULT_MAX_STEPS);
        assert_eq!(config.paragraph_formats[0], "p");
        assert!(config.styles.is_empty());
        assert_eq!(config.html.link_target, LinkTargetPolicy::Preserve);
        assert_eq!(config.plugin_features("anything"), FeatureSet::All);
    }

    #[test]
    fn test_load_valid_toml() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        file.write_all(
            b"paragraph_formats = [\"p\", \"h1\", \"pre\"]\n\
\n\
[undo]\n\
max_steps = 3\n\
\n\
[html]\n\
link_target = \"external_blank\"\n\
\n\
[links]\n\
allowed_schemes = [\"HTTPS\"]\n\
allow_relative = false\n\
\n\
[plugins]\n\
formatting = [\"bold\", \"italic\"]\n\
tables = \"none\"\n\
\n\
[[styles]]\n\
name = \"Red text\"\n\
class = \"red\"\n\
\n\
[[styles]]\n\
name = \"Note\"\n\
element = \"div\"\n\
class = \"note\"\n",
        )?;

        let (config, events) = Config::load_from(file.path())?;
        assert!(events.is_empty());
        assert_eq!(config.undo.max_steps, 3);
        assert_eq!(config.paragraph_formats, vec!["p", "h1", "pre"]);
        assert_eq!(config.html.link_target, LinkTargetPolicy::ExternalBlank);
        assert_eq!(config.links.allowed_schemes, vec!["https"]);
        assert!(config.plugin_features("formatting").enables("bold"));
        assert!(config.plugin_features("tables").is_none());

        let catalog = config.catalog();
        let red = catalog.style("Red text").unwrap();
        assert_eq!(red.element, "span");
        assert!(!red.is_block());
        assert!(catalog.style("Note").unwrap().is_block());
        Ok(())
    }

    #[test]
    fn test_malformed_entries_fall_back() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        file.write_all(
            b"paragraph_formats = [\"blink\"]\n\
\n\
[undo]\n\
max_steps = 0\n\
\n\
[[styles]]\n\
name = \"\"\n\
\n\
[[styles]]\n\
name = \"Broken\"\n\
element = \"img\"\n\
\n\
[[styles]]\n\
name = \"Fine\"\n",
        )?;

        let (config, events) = Config::load_from(file.path())?;
        assert_eq!(config.undo.max_steps, DEFAULT_MAX_STEPS);
        assert_eq!(config.paragraph_formats.len(), DEFAULT_PARAGRAPH_FORMATS.len());
        assert_eq!(config.styles.len(), 1);
        assert_eq!(config.styles[0].name, "Fine");
        assert!(events.iter().filter(|e| e.is_warning()).count() >= 4);
        Ok(())
    }

    #[test]
    fn test_load_invalid_toml_returns_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"invalid toml [[[syntax").unwrap();
        assert!(Config::load_from(file.path()).is_err());
    }

    #[test]
    fn test_config_path_returns_some() {
        let path = Config::config_path();
        assert!(path.is_some());
        if let Some(p) = path {
            assert!(p.to_string_lossy().contains("scribe"));
            assert!(p.to_string_lossy().ends_with("scribe.toml"));
        }
    }

    #[test]
    fn test_link_rules() {
        let rules = LinkRules::default();
        assert!(rules.check("https://example.com").is_ok());
        assert!(rules.check("/relative/page").is_ok());
        assert!(rules.check("page.html#top").is_ok());
        assert!(rules.check("javascript:alert(1)").is_err());
        assert!(rules.check("  ").is_err());

        let strict = LinkRules {
            allow_relative: false,
            ..LinkRules::default()
        };
        assert!(strict.check("/relative").is_err());
    }

    #[test]
    fn test_config_serialization_round_trip() -> Result<()> {
        let mut config = Config::default();
        config.undo.max_steps = 7;
        config
            .plugins
            .insert("links".to_string(), FeatureSet::only(["link"]));
        let toml_str = toml::to_string(&config)?;
        let parsed: Config = toml::from_str(&toml_str)?;
        assert_eq!(parsed.undo.max_steps, 7);
        assert_eq!(parsed.plugin_features("links"), FeatureSet::only(["link"]));
        Ok(())
    }
}
