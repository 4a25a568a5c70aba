//! Notices produced while loading and validating configuration

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventLevel {
    Info,
    /// A setting was dropped or replaced by its default
    Warning,
}

/// One notice about the configuration in effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEvent {
    pub level: EventLevel,
    /// Configuration section the notice is about, e.g. "styles" or "undo"
    pub section: String,
    pub message: String,
}

impl ConfigEvent {
    pub fn info(message: impl Into<String>, section: impl Into<String>) -> Self {
        Self {
            level: EventLevel::Info,
            section: section.into(),
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>, section: impl Into<String>) -> Self {
        Self {
            level: EventLevel::Warning,
            ..Self::info(message, section)
        }
    }

    pub fn is_warning(&self) -> bool {
        self.level == EventLevel::Warning
    }

    /// Emit the notice through the `log` facade at its level
    pub fn log(&self) {
        match self.level {
            EventLevel::Info => info!("config {}", self),
            EventLevel::Warning => warn!("config {}", self),
        }
    }
}

impl fmt::Display for ConfigEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.section, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_display() {
        let event = ConfigEvent::warning("style dropped", "styles");
        assert!(event.is_warning());
        assert_eq!(event.to_string(), "[styles] style dropped");
    }

    #[test]
    fn test_info_is_not_warning() {
        let event = ConfigEvent::info("No config file, using defaults", "config");
        assert_eq!(event.level, EventLevel::Info);
        assert!(!event.is_warning());
    }
}
