use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::process::Command;

use crate::models::{CloseTarget, WindowMetadata, WindowRect};

/// Live window enumeration plus the companion close capability.
#[async_trait]
pub trait WindowSource: Send + Sync {
    async fn enumerate(&self) -> Result<Vec<WindowMetadata>>;

    async fn close(&self, target: &CloseTarget) -> Result<()>;
}

#[derive(Debug, Clone)]
struct ProcessInfo {
    name: String,
    executable: Option<PathBuf>,
}

/// X11 window source backed by `wmctrl`.
#[derive(Clone, Default)]
pub struct WmctrlSource;

impl WmctrlSource {
    pub fn new() -> Self {
        Self
    }

    async fn current_desktop(&self) -> Option<i64> {
        let output = Command::new("wmctrl").arg("-d").output().await.ok()?;
        if !output.status.success() {
            return None;
        }
        parse_current_desktop(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl WindowSource for WmctrlSource {
    async fn enumerate(&self) -> Result<Vec<WindowMetadata>> {
        let output = Command::new("wmctrl")
            .args(["-l", "-p", "-G", "-x"])
            .output()
            .await
            .context("Failed to run wmctrl - is it installed?")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("wmctrl -l failed: {}", stderr.trim());
        }

        let current_desktop = self.current_desktop().await;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut windows: Vec<WindowMetadata> = stdout
            .lines()
            .filter_map(|line| parse_wmctrl_line(line, current_desktop))
            .filter(WindowMetadata::has_title)
            .collect();

        let pids: Vec<u32> = windows.iter().filter_map(|w| w.pid).collect();
        let processes = match tokio::task::spawn_blocking(move || lookup_processes(&pids)).await {
            Ok(processes) => processes,
            Err(e) => {
                tracing::warn!("Process lookup worker failed: {}", e);
                HashMap::new()
            }
        };

        for window in &mut windows {
            let Some(info) = window.pid.and_then(|pid| processes.get(&pid)) else {
                continue;
            };
            window.process_name = Some(info.name.clone());
            window.executable = info.executable.clone();
        }

        Ok(windows)
    }

    async fn close(&self, target: &CloseTarget) -> Result<()> {
        let output = match target.handle {
            Some(handle) => {
                Command::new("wmctrl")
                    .args(["-i", "-c", &format!("{:#010x}", handle)])
                    .output()
                    .await
            }
            None => {
                Command::new("wmctrl")
                    .args(["-F", "-c", &target.title])
                    .output()
                    .await
            }
        }
        .with_context(|| format!("Failed to run wmctrl -c for {:?}", target.title))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("wmctrl could not close {:?}: {}", target.title, stderr.trim());
        }

        Ok(())
    }
}

fn wmctrl_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(0x[0-9a-fA-F]+)\s+(-?\d+)\s+(\d+)\s+(-?\d+)\s+(-?\d+)\s+(\d+)\s+(\d+)\s+(\S+)\s+(\S+)\s?(.*)$",
        )
        .expect("wmctrl line pattern is valid")
    })
}

/// Parses one line of `wmctrl -l -p -G -x` output.
fn parse_wmctrl_line(line: &str, current_desktop: Option<i64>) -> Option<WindowMetadata> {
    let caps = wmctrl_line_pattern().captures(line.trim_end())?;

    let handle = u64::from_str_radix(caps[1].trim_start_matches("0x"), 16).ok()?;
    let desktop: i64 = caps[2].parse().ok()?;
    let pid: u32 = caps[3].parse().ok()?;
    let rect = WindowRect {
        x: caps[4].parse().ok()?,
        y: caps[5].parse().ok()?,
        width: caps[6].parse().ok()?,
        height: caps[7].parse().ok()?,
    };
    let window_class = match &caps[8] {
        "N/A" => None,
        class => Some(class.to_string()),
    };

    // -1 marks sticky windows shown on every desktop
    let visible = desktop == -1 || current_desktop.map_or(true, |d| d == desktop);

    Some(WindowMetadata {
        title: caps[10].to_string(),
        handle: Some(handle),
        pid: (pid != 0).then_some(pid),
        window_class,
        rect: Some(rect),
        visible,
        ..WindowMetadata::default()
    })
}

fn parse_current_desktop(output: &str) -> Option<i64> {
    output.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let index = fields.next()?;
        (fields.next()? == "*").then(|| index.parse().ok()).flatten()
    })
}

fn lookup_processes(pids: &[u32]) -> HashMap<u32, ProcessInfo> {
    if pids.is_empty() {
        return HashMap::new();
    }

    let pids: Vec<Pid> = pids.iter().copied().map(Pid::from_u32).collect();
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&pids),
        ProcessRefreshKind::everything(),
    );

    pids.iter()
        .filter_map(|pid| {
            let process = system.process(*pid)?;
            Some((
                pid.as_u32(),
                ProcessInfo {
                    name: process.name().to_string_lossy().into_owned(),
                    executable: process.exe().map(|p| p.to_path_buf()),
                },
            ))
        })
        .collect()
}
