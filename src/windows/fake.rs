use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use super::WindowSource;
use crate::models::{CloseTarget, WindowMetadata};

/// Scriptable window source for tests.
#[derive(Clone, Default)]
pub struct FakeWindowSource {
    windows: Arc<Mutex<Vec<WindowMetadata>>>,
    closed: Arc<Mutex<Vec<CloseTarget>>>,
    fail_enumerate: Arc<Mutex<bool>>,
    refuse_close: Arc<Mutex<HashSet<String>>>,
}

impl FakeWindowSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_titles(titles: &[&str]) -> Self {
        let source = Self::new();
        source.set_windows(titles.iter().map(|t| WindowMetadata::titled(*t)).collect());
        source
    }

    pub fn set_windows(&self, windows: Vec<WindowMetadata>) {
        *self.windows.lock().unwrap() = windows;
    }

    pub fn set_titles(&self, titles: &[&str]) {
        self.set_windows(titles.iter().map(|t| WindowMetadata::titled(*t)).collect());
    }

    pub fn fail_enumeration(&self, fail: bool) {
        *self.fail_enumerate.lock().unwrap() = fail;
    }

    pub fn refuse_close(&self, title: &str) {
        self.refuse_close.lock().unwrap().insert(title.to_string());
    }

    pub fn closed_titles(&self) -> Vec<String> {
        self.closed
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.title.clone())
            .collect()
    }
}

#[async_trait]
impl WindowSource for FakeWindowSource {
    async fn enumerate(&self) -> Result<Vec<WindowMetadata>> {
        if *self.fail_enumerate.lock().unwrap() {
            anyhow::bail!("display unavailable");
        }
        Ok(self.windows.lock().unwrap().clone())
    }

    async fn close(&self, target: &CloseTarget) -> Result<()> {
        if self.refuse_close.lock().unwrap().contains(&target.title) {
            anyhow::bail!("window {:?} refused to close", target.title);
        }
        self.closed.lock().unwrap().push(target.clone());
        self.windows
            .lock()
            .unwrap()
            .retain(|w| !(w.title == target.title && w.handle == target.handle));
        Ok(())
    }
}
