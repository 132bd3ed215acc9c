use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identity used to track a single window across poll cycles.
///
/// Windows reported with a native handle get a synthetic key built from the
/// handle and owning process, so title changes don't break tracking. Sources
/// that only know titles fall back to the title itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowKey(String);

impl WindowKey {
    pub fn native(handle: u64, pid: Option<u32>) -> Self {
        Self(format!("{:#010x}:{}", handle, pid.unwrap_or(0)))
    }

    pub fn from_title(title: &str) -> Self {
        Self(title.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WindowKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for WindowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Per-window data reported by a window source, plus enrichment fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowMetadata {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<u64>,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub process_name: Option<String>,
    #[serde(default)]
    pub executable: Option<PathBuf>,
    #[serde(default)]
    pub window_class: Option<String>,
    #[serde(default)]
    pub rect: Option<WindowRect>,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub browser_url: Option<String>,
    #[serde(default)]
    pub editor_workspace: Option<String>,
}

impl WindowMetadata {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            visible: true,
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub fn with_handle(mut self, handle: u64, pid: u32) -> Self {
        self.handle = Some(handle);
        self.pid = Some(pid);
        self
    }

    #[cfg(test)]
    pub fn with_process(mut self, process_name: &str) -> Self {
        self.process_name = Some(process_name.to_string());
        self
    }

    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }
}

/// A live window as tracked by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRecord {
    pub key: WindowKey,
    pub first_seen: DateTime<Utc>,
    pub metadata: WindowMetadata,
}

impl WindowRecord {
    pub fn title(&self) -> &str {
        &self.metadata.title
    }

    pub fn close_target(&self) -> CloseTarget {
        CloseTarget {
            key: Some(self.key.clone()),
            title: self.metadata.title.clone(),
            handle: self.metadata.handle,
        }
    }
}

/// What a window source needs to close a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<WindowKey>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_key_native_includes_handle_and_pid() {
        let key = WindowKey::native(0x3a00003, Some(4242));
        assert_eq!(key.as_str(), "0x03a00003:4242");
    }

    #[test]
    fn window_key_native_without_pid_uses_zero() {
        assert_eq!(WindowKey::native(0x10, None).as_str(), "0x00000010:0");
    }

    #[test]
    fn window_key_serializes_as_plain_string() {
        let key = WindowKey::from_title("Editor - app.py");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"Editor - app.py\"");
    }

    #[test]
    fn window_metadata_has_title_rejects_whitespace() {
        assert!(!WindowMetadata::titled("   \t").has_title());
        assert!(WindowMetadata::titled("Terminal").has_title());
    }

    #[test]
    fn window_metadata_deserializes_with_missing_optionals() {
        let meta: WindowMetadata = serde_json::from_str(r#"{"title":"Browser - docs"}"#).unwrap();
        assert_eq!(meta.title, "Browser - docs");
        assert!(meta.pid.is_none());
        assert!(meta.browser_url.is_none());
        assert!(!meta.visible);
    }

    #[test]
    fn close_target_carries_handle() {
        let record = WindowRecord {
            key: WindowKey::native(0x42, Some(7)),
            first_seen: Utc::now(),
            metadata: WindowMetadata::titled("Notes").with_handle(0x42, 7),
        };
        let target = record.close_target();
        assert_eq!(target.key, Some(record.key.clone()));
        assert_eq!(target.title, "Notes");
        assert_eq!(target.handle, Some(0x42));
    }
}
