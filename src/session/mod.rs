use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "ja")]
    Japanese,
}

impl Locale {
    pub fn code(&self) -> &'static str {
        match self {
            Locale::English => "en",
            Locale::Japanese => "ja",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Some(Locale::English),
            "ja" | "jp" | "japanese" => Some(Locale::Japanese),
            _ => None,
        }
    }
}

/// Per-user context handed explicitly to whatever talks to the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub locale: Locale,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl Session {
    /// Restore the persisted session, falling back to defaults when the file
    /// is missing or unreadable.
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No session file at {}, starting fresh", path.display());
                return Self::default();
            }
            Err(e) => {
                warn!("Failed to read session file {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(session) => session,
            Err(e) => {
                warn!("Ignoring corrupt session file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SessionError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn set_locale(&mut self, locale: Locale) {
        self.locale = locale;
    }

    pub fn bearer(&self) -> Option<String> {
        self.auth_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .map(|token| format!("Bearer {}", token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::load(&dir.path().join("nope.json"));
        assert_eq!(session, Session::default());
        assert_eq!(session.locale, Locale::English);
        assert!(session.bearer().is_none());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut session = Session::default().with_token("t0ken");
        session.set_locale(Locale::Japanese);
        session.save(&path).unwrap();

        let restored = Session::load(&path);
        assert_eq!(restored.locale, Locale::Japanese);
        assert_eq!(restored.bearer().as_deref(), Some("Bearer t0ken"));
    }

    #[test]
    fn corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{locale: ").unwrap();
        assert_eq!(Session::load(&path), Session::default());
    }

    #[test]
    fn parses_locale_codes() {
        assert_eq!(Locale::parse("JA"), Some(Locale::Japanese));
        assert_eq!(Locale::parse("en"), Some(Locale::English));
        assert_eq!(Locale::parse("fr"), None);
        assert_eq!(Locale::Japanese.code(), "ja");
    }
}
