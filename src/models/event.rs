use super::{ProjectName, WindowKey};

/// Change notifications broadcast to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    WindowPending {
        key: WindowKey,
        title: String,
    },
    WindowRemoved {
        key: WindowKey,
        title: String,
        project: Option<ProjectName>,
    },
    WindowAssigned {
        key: WindowKey,
        project: ProjectName,
        previous: Option<ProjectName>,
    },
    ProjectGroupUpdated {
        project: ProjectName,
        windows: usize,
    },
    ProjectClosed {
        project: ProjectName,
    },
}

impl StoreEvent {
    pub fn describe(&self) -> String {
        match self {
            StoreEvent::WindowPending { title, .. } => format!("New window: {}", title),
            StoreEvent::WindowRemoved { title, project, .. } => match project {
                Some(project) => format!("Window closed: {} ({})", title, project),
                None => format!("Window closed: {}", title),
            },
            StoreEvent::WindowAssigned {
                key,
                project,
                previous: Some(previous),
            } => format!("{} moved {} -> {}", key, previous, project),
            StoreEvent::WindowAssigned { key, project, .. } => {
                format!("{} assigned to {}", key, project)
            }
            StoreEvent::ProjectGroupUpdated { project, windows } => {
                format!("{}: {} window(s)", project, windows)
            }
            StoreEvent::ProjectClosed { project } => format!("Project closed: {}", project),
        }
    }
}
