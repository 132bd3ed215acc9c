use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{close, push, snapshots, tower, watch};
use crate::config::Config;

#[derive(Parser)]
#[command(name = "wintrack")]
#[command(about = "Window Tracker - Group open windows into projects and close them together")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the folder that holds one directory per project
    #[arg(long, global = true)]
    pub projects_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let config = Config::load(self.config.clone())?;
        Ok(match &self.projects_path {
            Some(path) => config.with_projects_path(path.clone()),
            None => config,
        })
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Launch the terminal UI
    Tower(tower::Args),

    /// Track windows without a UI, logging every change
    Watch(watch::Args),

    /// Snapshot a project, close its windows and upload the folder
    Close(close::Args),

    /// Finish closes interrupted by a previous run
    Resume,

    /// Commit and push a project folder
    Push(push::Args),

    /// List active projects
    Projects,

    /// Show a project's snapshot history
    Snapshots(snapshots::Args),
}
