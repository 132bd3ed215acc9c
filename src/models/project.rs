use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel project for windows the user explicitly left unclassified.
pub const UNASSIGNED: &str = "Unassigned";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectNameError {
    #[error("No project selected")]
    Empty,

    #[error("Invalid project name: {0:?}")]
    Invalid(String),
}

/// Validated project name. Doubles as the project's folder name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectName(String);

impl ProjectName {
    pub fn parse(raw: &str) -> Result<Self, ProjectNameError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(ProjectNameError::Empty);
        }
        if name == "."
            || name == ".."
            || name.starts_with('.')
            || name.contains(['/', '\\'])
            || name.chars().any(char::is_control)
        {
            return Err(ProjectNameError::Invalid(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn unassigned() -> Self {
        Self(UNASSIGNED.to_string())
    }

    pub fn is_unassigned(&self) -> bool {
        self.0 == UNASSIGNED
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProjectName {
    type Error = ProjectNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProjectName> for String {
    fn from(value: ProjectName) -> Self {
        value.0
    }
}

impl std::fmt::Display for ProjectName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
