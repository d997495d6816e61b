use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{PageChatError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroundingMode {
    /// Let the model decide when to search
    #[default]
    Auto,
    /// Always attach search results
    Always,
}

impl GroundingMode {
    pub fn from_str_loose(s: &str) -> Option<GroundingMode> {
        match s.to_lowercase().as_str() {
            "auto" | "dynamic" => Some(GroundingMode::Auto),
            "always" | "on" => Some(GroundingMode::Always),
            _ => None,
        }
    }
}

impl fmt::Display for GroundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroundingMode::Auto => write!(f, "auto"),
            GroundingMode::Always => write!(f, "always"),
        }
    }
}

/// User preferences consulted when planning a completion request.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub enable_grounding: bool,
    #[serde(default)]
    pub grounding_mode: GroundingMode,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub auto_summarize: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel_width: Option<u32>,
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            enable_grounding: false,
            grounding_mode: GroundingMode::Auto,
            language: default_language(),
            auto_summarize: false,
            panel_width: None,
        }
    }
}

pub trait SettingsStore: Send + Sync {
    fn get(&self) -> Result<Settings>;
    fn set(&self, settings: &Settings) -> Result<()>;
}

/// settings.json on disk
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `<config dir>/pagechat/settings.json`
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| PageChatError::Config("Could not determine config directory".into()))?;
        Ok(config_dir.join("pagechat").join("settings.json"))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl SettingsStore for FileSettingsStore {
    /// Missing file means defaults
    fn get(&self) -> Result<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }
        let data = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn set(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, data)?;

        // The file may hold an API key
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySettingsStore {
    inner: Mutex<Settings>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Mutex::new(settings),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self) -> Result<Settings> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| PageChatError::Config("settings lock poisoned".into()))?;
        Ok(guard.clone())
    }

    fn set(&self, settings: &Settings) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| PageChatError::Config("settings lock poisoned".into()))?;
        *guard = settings.clone();
        Ok(())
    }
}
