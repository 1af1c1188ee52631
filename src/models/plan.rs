//! Plan types handed to the core by the planner.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{ParseEnumError, PlanError};

/// Kind of filesystem change a plan action proposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Move,
    Rename,
    Delete,
    CreateFolder,
    Skip,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Move => "move",
            ActionType::Rename => "rename",
            ActionType::Delete => "delete",
            ActionType::CreateFolder => "create_folder",
            ActionType::Skip => "skip",
        }
    }

    /// Whether actions of this type must carry a destination path
    pub fn requires_destination(&self) -> bool {
        matches!(
            self,
            ActionType::Move | ActionType::Rename | ActionType::CreateFolder
        )
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "move" => Ok(ActionType::Move),
            "rename" => Ok(ActionType::Rename),
            "delete" => Ok(ActionType::Delete),
            "create_folder" => Ok(ActionType::CreateFolder),
            "skip" => Ok(ActionType::Skip),
            other => Err(ParseEnumError {
                kind: "action type",
                value: other.to_string(),
            }),
        }
    }
}

/// Wire shape of an action before its invariants are checked
#[derive(Deserialize)]
struct RawPlanAction {
    #[serde(rename = "type")]
    action_type: ActionType,
    #[serde(default)]
    source_path: Option<PathBuf>,
    #[serde(default)]
    destination_path: Option<PathBuf>,
    #[serde(default)]
    reason: String,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

impl TryFrom<RawPlanAction> for PlanAction {
    type Error = PlanError;

    fn try_from(raw: RawPlanAction) -> Result<Self, Self::Error> {
        PlanAction::new(
            raw.action_type,
            raw.source_path,
            raw.destination_path,
            raw.reason,
            raw.confidence,
        )
    }
}

/// A single proposed operation.
///
/// `destination_path` is always present for move, rename and create_folder;
/// construction and deserialization both reject actions without one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPlanAction")]
pub struct PlanAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub source_path: Option<PathBuf>,
    pub destination_path: Option<PathBuf>,
    pub reason: String,
    pub confidence: f64,
}

impl PlanAction {
    pub fn new(
        action_type: ActionType,
        source_path: Option<PathBuf>,
        destination_path: Option<PathBuf>,
        reason: impl Into<String>,
        confidence: f64,
    ) -> Result<Self, PlanError> {
        if action_type.requires_destination() && destination_path.is_none() {
            return Err(PlanError::MissingDestination(action_type));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(PlanError::ConfidenceOutOfRange(confidence));
        }

        Ok(Self {
            action_type,
            source_path,
            destination_path,
            reason: reason.into(),
            confidence,
        })
    }

    /// Move `source` to `destination`
    pub fn move_to(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self::unchecked(ActionType::Move, Some(source.into()), Some(destination.into()))
    }

    /// Rename `source` to `destination`
    pub fn rename_to(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self::unchecked(ActionType::Rename, Some(source.into()), Some(destination.into()))
    }

    /// Send `source` to the recoverable trash
    pub fn delete(source: impl Into<PathBuf>) -> Self {
        Self::unchecked(ActionType::Delete, Some(source.into()), None)
    }

    /// Create the folder at `destination`
    pub fn create_folder(destination: impl Into<PathBuf>) -> Self {
        Self::unchecked(ActionType::CreateFolder, None, Some(destination.into()))
    }

    /// Leave `source` untouched
    pub fn skip(source: impl Into<PathBuf>) -> Self {
        Self::unchecked(ActionType::Skip, Some(source.into()), None)
    }

    // Only for the typed constructors above, which satisfy the invariants.
    fn unchecked(
        action_type: ActionType,
        source_path: Option<PathBuf>,
        destination_path: Option<PathBuf>,
    ) -> Self {
        Self {
            action_type,
            source_path,
            destination_path,
            reason: String::new(),
            confidence: 1.0,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Path shown in log entries and error messages for this action
    pub fn display_path(&self) -> &Path {
        self.source_path
            .as_deref()
            .or(self.destination_path.as_deref())
            .unwrap_or_else(|| Path::new(""))
    }
}

/// The full set of proposed changes for one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub task_id: String,
    /// Root boundary every path in the plan must stay within
    pub scope_path: PathBuf,
    #[serde(default)]
    pub folders_to_create: Vec<PathBuf>,
    pub actions: Vec<PlanAction>,
    #[serde(default)]
    pub summary: String,
}

impl Plan {
    pub fn new(task_id: impl Into<String>, scope_path: impl Into<PathBuf>) -> Self {
        Self {
            task_id: task_id.into(),
            scope_path: scope_path.into(),
            folders_to_create: Vec::new(),
            actions: Vec::new(),
            summary: String::new(),
        }
    }

    pub fn with_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.folders_to_create.push(folder.into());
        self
    }

    pub fn with_action(mut self, action: PlanAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Actions selected for execution, in plan order.
    ///
    /// With `approved` set, only in-range indices are kept; duplicates and
    /// ordering of the index list do not matter.
    pub fn resolve_actions(&self, approved: Option<&[usize]>) -> Vec<&PlanAction> {
        match approved {
            None => self.actions.iter().collect(),
            Some(indices) => self
                .actions
                .iter()
                .enumerate()
                .filter(|(i, _)| indices.contains(i))
                .map(|(_, action)| action)
                .collect(),
        }
    }
}
