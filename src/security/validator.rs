//! Plan validation against the scope boundary and protected paths.
//!
//! The validator never writes to the filesystem and never stops at the
//! first problem: every issue in the plan is collected so the caller can
//! show the full picture.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::{is_subpath, normalize_path, resolve_path, ProtectedPaths};
use crate::config::SentinelConfig;
use crate::models::{ActionType, Plan, PlanAction};

/// Default number of deletions above which a plan gets a warning
pub const DEFAULT_DELETION_WARNING_THRESHOLD: usize = 100;

/// Which part of a plan a path came from, for issue messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathRole {
    Folder,
    Source,
    Destination,
}

impl PathRole {
    fn scope_label(&self) -> &'static str {
        match self {
            PathRole::Folder => "Folder creation",
            PathRole::Source => "Action source",
            PathRole::Destination => "Action destination",
        }
    }

    fn protected_label(&self) -> &'static str {
        match self {
            PathRole::Folder => "Cannot create folder in protected path",
            PathRole::Source => "Cannot touch protected source",
            PathRole::Destination => "Cannot write to protected destination",
        }
    }
}

/// A single finding about a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SafetyIssue {
    #[error("Scope root does not exist: {}", .path.display())]
    MissingScopeRoot { path: PathBuf },
    #[error("{} outside scope: {}", .role.scope_label(), .path.display())]
    ScopeEscape { role: PathRole, path: PathBuf },
    #[error("{}: {}", .role.protected_label(), .path.display())]
    ProtectedPath { role: PathRole, path: PathBuf },
    #[error("Source file does not exist: {}", .path.display())]
    MissingSource { path: PathBuf },
    #[error("Destination path is required for {action_type} action #{index}")]
    MissingDestination { index: usize, action_type: ActionType },
    #[error("Large number of deletions: {count} items will be sent to Trash")]
    LargeDeletion { count: usize },
}

impl SafetyIssue {
    /// Blocking issues make a plan unsafe; the rest are advisory
    pub fn is_blocking(&self) -> bool {
        !matches!(self, SafetyIssue::LargeDeletion { .. })
    }
}

/// Outcome of validating a plan. `is_safe` is true when there are no errors;
/// warnings never block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyValidationResult {
    pub issues: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub is_safe: bool,
    pub details: Vec<SafetyIssue>,
}

impl SafetyValidationResult {
    pub fn from_issues(details: Vec<SafetyIssue>) -> Self {
        let mut issues = Vec::with_capacity(details.len());
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for issue in &details {
            let message = issue.to_string();
            if issue.is_blocking() {
                errors.push(message.clone());
            } else {
                warnings.push(message.clone());
            }
            issues.push(message);
        }

        Self {
            is_safe: errors.is_empty(),
            issues,
            errors,
            warnings,
            details,
        }
    }
}

/// Validates plans against a scope root and an injected protected-path table
#[derive(Debug, Clone)]
pub struct SafetyValidator {
    protected: ProtectedPaths,
    deletion_warning_threshold: usize,
}

impl SafetyValidator {
    pub fn new(protected: ProtectedPaths) -> Self {
        Self {
            protected,
            deletion_warning_threshold: DEFAULT_DELETION_WARNING_THRESHOLD,
        }
    }

    pub fn from_config(config: &SentinelConfig) -> Self {
        Self::new(config.protected_paths()).with_deletion_warning_threshold(
            config.deletion_warning_threshold,
        )
    }

    pub fn with_deletion_warning_threshold(mut self, threshold: usize) -> Self {
        self.deletion_warning_threshold = threshold;
        self
    }

    pub fn protected_paths(&self) -> &ProtectedPaths {
        &self.protected
    }

    /// Validate every path in a plan, collecting all issues
    pub fn validate(&self, plan: &Plan) -> SafetyValidationResult {
        let mut issues = Vec::new();

        if !plan.scope_path.exists() {
            issues.push(SafetyIssue::MissingScopeRoot {
                path: plan.scope_path.clone(),
            });
        }
        let scope_root = resolve_path(&plan.scope_path, &plan.scope_path);

        for folder in &plan.folders_to_create {
            self.check_path(folder, PathRole::Folder, &plan.scope_path, &scope_root, &mut issues);
        }

        for (index, action) in plan.actions.iter().enumerate() {
            self.check_action(index, action, &plan.scope_path, &scope_root, &mut issues);
        }

        let deletions = plan
            .actions
            .iter()
            .filter(|a| a.action_type == ActionType::Delete)
            .count();
        if deletions > self.deletion_warning_threshold {
            issues.push(SafetyIssue::LargeDeletion { count: deletions });
        }

        let result = SafetyValidationResult::from_issues(issues);
        if result.is_safe {
            tracing::debug!(
                task_id = %plan.task_id,
                warnings = result.warnings.len(),
                "Plan passed safety validation"
            );
        } else {
            tracing::warn!(
                task_id = %plan.task_id,
                errors = result.errors.len(),
                "Plan failed safety validation"
            );
        }
        result
    }

    fn check_action(
        &self,
        index: usize,
        action: &PlanAction,
        scope: &Path,
        scope_root: &Path,
        issues: &mut Vec<SafetyIssue>,
    ) {
        if let Some(source) = &action.source_path {
            self.check_path(source, PathRole::Source, scope, scope_root, issues);

            let absolute = if source.is_absolute() {
                source.clone()
            } else {
                scope.join(source)
            };
            if !absolute.exists() {
                issues.push(SafetyIssue::MissingSource {
                    path: resolve_path(source, scope),
                });
            }
        }

        match &action.destination_path {
            Some(destination) => {
                self.check_path(destination, PathRole::Destination, scope, scope_root, issues);
            }
            None if action.action_type.requires_destination() => {
                issues.push(SafetyIssue::MissingDestination {
                    index,
                    action_type: action.action_type,
                });
            }
            None => {}
        }
    }

    /// Scope and protected-path checks for one path
    fn check_path(
        &self,
        path: &Path,
        role: PathRole,
        scope: &Path,
        scope_root: &Path,
        issues: &mut Vec<SafetyIssue>,
    ) {
        let resolved = resolve_path(path, scope);

        if !is_subpath(&resolved, scope_root) {
            issues.push(SafetyIssue::ScopeEscape {
                role,
                path: resolved.clone(),
            });
        }

        // Checked on both forms so a symlinked system directory stays covered
        let lexical = normalize_path(&if path.is_absolute() {
            path.to_path_buf()
        } else {
            scope.join(path)
        });
        if self.protected.is_protected(&resolved) || self.protected.is_protected(&lexical) {
            issues.push(SafetyIssue::ProtectedPath {
                role,
                path: resolved,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::Platform;
    use std::fs;
    use tempfile::tempdir;

    fn validator() -> SafetyValidator {
        SafetyValidator::new(ProtectedPaths::none())
    }

    #[test]
    fn test_empty_plan_is_safe() {
        let dir = tempdir().unwrap();
        let result = validator().validate(&Plan::new("t", dir.path()));
        assert!(result.is_safe);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_safe_move_inside_scope() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();

        let plan = Plan::new("t", dir.path()).with_action(PlanAction::move_to(
            dir.path().join("a.txt"),
            dir.path().join("docs/a.txt"),
        ));

        let result = validator().validate(&plan);
        assert!(result.is_safe, "{:?}", result.errors);
    }

    #[test]
    fn test_missing_scope_root() {
        let dir = tempdir().unwrap();
        let result = validator().validate(&Plan::new("t", dir.path().join("nope")));
        assert!(!result.is_safe);
        assert!(result.errors[0].contains("does not exist"));
    }

    #[test]
    fn test_destination_outside_scope() {
        let dir = tempdir().unwrap();
        let scope = dir.path().join("scope");
        fs::create_dir(&scope).unwrap();
        fs::write(scope.join("a.txt"), "a").unwrap();

        let plan = Plan::new("t", &scope)
            .with_action(PlanAction::move_to(scope.join("a.txt"), dir.path().join("a.txt")));

        let result = validator().validate(&plan);
        assert!(!result.is_safe);
        assert!(result.errors.iter().any(|e| e.contains("outside scope")));
    }

    #[test]
    fn test_parent_ref_escape_is_caught() {
        let dir = tempdir().unwrap();
        let scope = dir.path().join("scope");
        fs::create_dir(&scope).unwrap();

        let plan = Plan::new("t", &scope).with_folder(scope.join("../escaped"));

        let result = validator().validate(&plan);
        assert!(!result.is_safe);
        assert!(result.errors[0].starts_with("Folder creation outside scope"));
    }

    #[test]
    fn test_collects_every_issue() {
        let dir = tempdir().unwrap();
        let scope = dir.path().join("scope");
        fs::create_dir(&scope).unwrap();

        let plan = Plan::new("t", &scope)
            .with_folder(dir.path().join("elsewhere"))
            .with_action(PlanAction::delete(scope.join("ghost.txt")))
            .with_action(PlanAction::move_to(
                dir.path().join("missing.txt"),
                scope.join("x.txt"),
            ));

        let result = validator().validate(&plan);
        // folder escape, missing ghost, source escape, missing source
        assert_eq!(result.errors.len(), 4, "{:?}", result.errors);
    }

    #[test]
    fn test_protected_path_inside_scope_is_blocked() {
        let dir = tempdir().unwrap();
        let system = dir.path().join("system");
        fs::create_dir(&system).unwrap();
        fs::write(system.join("kernel"), "k").unwrap();

        let protected = ProtectedPaths::for_platform(Platform::current(), [system.clone()]);
        let plan = Plan::new("t", dir.path()).with_action(PlanAction::delete(system.join("kernel")));

        let result = SafetyValidator::new(protected).validate(&plan);
        assert!(!result.is_safe);
        assert!(result.errors.iter().any(|e| e.contains("protected")));
        assert!(!result.errors.iter().any(|e| e.contains("outside scope")));
    }

    #[cfg(unix)]
    #[test]
    fn test_protected_prefix_behind_symlink_is_blocked() {
        let dir = tempdir().unwrap();
        let real = dir.path().join("private_etc");
        fs::create_dir(&real).unwrap();
        fs::write(real.join("hosts"), "127.0.0.1").unwrap();
        let link = dir.path().join("etc");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        // Only the lexical form sits under the protected prefix
        let protected = ProtectedPaths::for_platform(Platform::current(), [link.clone()]);
        assert!(!protected.is_protected(&resolve_path(&link.join("hosts"), dir.path())));

        let plan = Plan::new("t", dir.path()).with_action(PlanAction::delete(link.join("hosts")));
        let result = SafetyValidator::new(protected).validate(&plan);

        assert!(!result.is_safe);
        assert!(result.errors.iter().any(|e| e.contains("protected")));
    }

    #[test]
    fn test_finder_delete_is_unsafe() {
        let plan = Plan::new("t", "/tmp/x").with_action(PlanAction::delete(
            "/System/Library/CoreServices/Finder.app",
        ));
        let validator = SafetyValidator::new(ProtectedPaths::builtin().with_platform(Platform::MacOs));

        let result = validator.validate(&plan);
        assert!(!result.is_safe);
        assert!(result.errors.iter().any(|e| e.contains("protected")));
    }

    #[test]
    fn test_large_deletion_is_only_a_warning() {
        let dir = tempdir().unwrap();
        let mut plan = Plan::new("t", dir.path());
        for i in 0..5 {
            let file = dir.path().join(format!("file{}.txt", i));
            fs::write(&file, "x").unwrap();
            plan = plan.with_action(PlanAction::delete(file));
        }

        let result = validator()
            .with_deletion_warning_threshold(3)
            .validate(&plan);
        assert!(result.is_safe);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].to_lowercase().contains("deletion"));
    }

    #[test]
    fn test_missing_destination_is_blocking() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        let mut action = PlanAction::move_to(dir.path().join("a.txt"), dir.path().join("b.txt"));
        action.destination_path = None;

        let result = validator().validate(&Plan::new("t", dir.path()).with_action(action));
        assert!(!result.is_safe);
        assert!(result.errors[0].contains("Destination path is required"));
    }

    #[test]
    fn test_from_config_uses_platform_and_threshold() {
        let mut config = SentinelConfig::with_data_dir("/data");
        config.platform = Platform::Windows;
        config.deletion_warning_threshold = 7;

        let validator = SafetyValidator::from_config(&config);
        assert_eq!(validator.protected_paths().platform(), Platform::Windows);
        assert_eq!(validator.deletion_warning_threshold, 7);
    }
}
