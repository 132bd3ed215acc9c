use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use crate::models::{WindowKey, WindowMetadata, WindowRecord};

/// What the window source tells us about a window's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NativeId {
    Handle { handle: u64, pid: Option<u32> },
    Title(String),
}

impl NativeId {
    fn of(window: &WindowMetadata) -> Self {
        match window.handle {
            Some(handle) => NativeId::Handle {
                handle,
                pid: window.pid,
            },
            None => NativeId::Title(window.title.clone()),
        }
    }

    fn key(&self) -> WindowKey {
        match self {
            NativeId::Handle { handle, pid } => WindowKey::native(*handle, *pid),
            NativeId::Title(title) => WindowKey::from_title(title),
        }
    }
}

#[derive(Debug, Clone)]
struct IdentityEntry {
    key: WindowKey,
    first_seen: DateTime<Utc>,
}

/// Maps native window identities to stable keys across poll cycles.
///
/// Entries live exactly as long as the window keeps showing up in
/// enumeration; a vanished native id is forgotten, so a later reuse of the
/// same handle starts a fresh entry.
#[derive(Debug, Default)]
pub struct IdentityTable {
    entries: HashMap<NativeId, IdentityEntry>,
}

impl IdentityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&mut self, windows: Vec<WindowMetadata>) -> Vec<WindowRecord> {
        self.resolve_at(windows, Utc::now())
    }

    pub fn resolve_at(
        &mut self,
        windows: Vec<WindowMetadata>,
        now: DateTime<Utc>,
    ) -> Vec<WindowRecord> {
        let mut seen: HashSet<NativeId> = HashSet::new();
        let mut records = Vec::with_capacity(windows.len());

        for window in windows {
            if !window.has_title() {
                continue;
            }

            let id = NativeId::of(&window);
            if !seen.insert(id.clone()) {
                tracing::debug!("Duplicate window identity {:?}, keeping the first", id);
                continue;
            }

            let entry = self
                .entries
                .entry(id.clone())
                .or_insert_with(|| IdentityEntry {
                    key: id.key(),
                    first_seen: now,
                });

            records.push(WindowRecord {
                key: entry.key.clone(),
                first_seen: entry.first_seen,
                metadata: window,
            });
        }

        self.entries.retain(|id, _| seen.contains(id));
        records
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn resolve_uses_title_key_for_handle_less_windows() {
        let mut table = IdentityTable::new();
        let records = table.resolve(vec![WindowMetadata::titled("Editor - app.py")]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, WindowKey::from_title("Editor - app.py"));
    }

    #[test]
    fn resolve_drops_blank_titles() {
        let mut table = IdentityTable::new();
        let records = table.resolve(vec![
            WindowMetadata::titled("  "),
            WindowMetadata::titled(""),
            WindowMetadata::titled("Terminal"),
        ]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title(), "Terminal");
    }

    #[test]
    fn resolve_keeps_key_across_title_change_for_native_windows() {
        let mut table = IdentityTable::new();
        let t0 = Utc::now();

        let first = table.resolve_at(
            vec![WindowMetadata::titled("a.py - Editor").with_handle(0x10, 99)],
            t0,
        );
        let second = table.resolve_at(
            vec![WindowMetadata::titled("b.py - Editor").with_handle(0x10, 99)],
            t0 + Duration::seconds(2),
        );

        assert_eq!(first[0].key, second[0].key);
        assert_eq!(
            second[0].first_seen, t0,
            "resolve: first_seen should survive across cycles"
        );
        assert_eq!(second[0].title(), "b.py - Editor");
    }

    #[test]
    fn resolve_title_change_without_handle_is_new_identity() {
        let mut table = IdentityTable::new();
        let first = table.resolve(vec![WindowMetadata::titled("Old title")]);
        let second = table.resolve(vec![WindowMetadata::titled("New title")]);
        assert_ne!(first[0].key, second[0].key);
        assert_eq!(table.len(), 1, "resolve: vanished identities are forgotten");
    }

    #[test]
    fn resolve_distinguishes_windows_sharing_a_title() {
        let mut table = IdentityTable::new();
        let records = table.resolve(vec![
            WindowMetadata::titled("Untitled").with_handle(0x1, 10),
            WindowMetadata::titled("Untitled").with_handle(0x2, 10),
        ]);
        assert_eq!(records.len(), 2);
        assert_ne!(records[0].key, records[1].key);
    }

    #[test]
    fn resolve_collapses_duplicate_titles_without_handles() {
        let mut table = IdentityTable::new();
        let records = table.resolve(vec![
            WindowMetadata::titled("Untitled"),
            WindowMetadata::titled("Untitled"),
        ]);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn resolve_reused_handle_after_gap_gets_new_first_seen() {
        let mut table = IdentityTable::new();
        let t0 = Utc::now();
        let window = WindowMetadata::titled("Term").with_handle(0x5, 1);

        table.resolve_at(vec![window.clone()], t0);
        table.resolve_at(Vec::new(), t0 + Duration::seconds(2));
        let again = table.resolve_at(vec![window], t0 + Duration::seconds(4));

        assert_eq!(again[0].first_seen, t0 + Duration::seconds(4));
    }
}
