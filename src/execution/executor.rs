//! Plan Executor
//!
//! Runs an approved plan against the filesystem, one unit at a time:
//! folders first, then actions in plan order. The first failing action
//! triggers a best-effort rollback of everything this run completed, and
//! nothing after it runs. Every attempted unit lands in the audit log.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::ops::{self, RecoverableTrash};
use crate::history::{AuditLog, TaskRegistry};
use crate::models::{
    ActionType, ExecutionLogEntry, ExecutionResult, LogStatus, Plan, TaskStatus,
};

/// Lifecycle of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Executing,
    RollingBack,
    Completed,
    Aborted,
}

/// An action with its paths resolved against the scope
#[derive(Debug, Clone)]
struct ResolvedAction {
    action_type: ActionType,
    source: Option<PathBuf>,
    destination: Option<PathBuf>,
}

impl ResolvedAction {
    fn source(&self) -> Result<PathBuf, String> {
        self.source
            .clone()
            .ok_or_else(|| format!("{} action has no source path", self.action_type))
    }

    fn destination(&self) -> Result<PathBuf, String> {
        self.destination
            .clone()
            .ok_or_else(|| format!("{} action has no destination path", self.action_type))
    }
}

/// Mutable bookkeeping for one run
struct Run<'a> {
    task_id: &'a str,
    state: ExecutionState,
    successful: usize,
    failed: usize,
    logs: Vec<ExecutionLogEntry>,
    error_message: Option<String>,
    rollback_performed: bool,
}

impl<'a> Run<'a> {
    fn new(task_id: &'a str) -> Self {
        Self {
            task_id,
            state: ExecutionState::Executing,
            successful: 0,
            failed: 0,
            logs: Vec::new(),
            error_message: None,
            rollback_performed: false,
        }
    }

    fn transition(&mut self, next: ExecutionState) {
        tracing::debug!(task_id = self.task_id, from = ?self.state, to = ?next, "Execution state");
        self.state = next;
    }

    fn into_result(self, total_actions: usize) -> ExecutionResult {
        ExecutionResult {
            task_id: self.task_id.to_string(),
            total_actions,
            successful_actions: self.successful,
            failed_actions: self.failed,
            logs: self.logs,
            error_message: self.error_message,
            rollback_performed: self.rollback_performed,
        }
    }
}

/// Executes plans that already passed safety validation.
///
/// The executor does not re-validate; use [`super::SafetyGate`] to keep
/// validation and execution together.
#[derive(Clone)]
pub struct PlanExecutor {
    audit: AuditLog,
    trash: Arc<dyn RecoverableTrash>,
    registry: Option<Arc<dyn TaskRegistry>>,
    dry_run: bool,
}

impl PlanExecutor {
    pub fn new(audit: AuditLog, trash: Arc<dyn RecoverableTrash>) -> Self {
        Self {
            audit,
            trash,
            registry: None,
            dry_run: false,
        }
    }

    /// Keep the task's status in the registry in step with execution
    pub fn with_registry(mut self, registry: Arc<dyn TaskRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Execute `plan`, optionally restricted to the actions at `approved`.
    ///
    /// Never fails: every problem is reported in the returned result.
    pub async fn execute(&self, plan: &Plan, approved: Option<&[usize]>) -> ExecutionResult {
        let actions = plan.resolve_actions(approved);
        let total_actions = plan.folders_to_create.len() + actions.len();

        tracing::info!(
            task_id = %plan.task_id,
            folders = plan.folders_to_create.len(),
            actions = actions.len(),
            dry_run = self.dry_run,
            "Executing plan"
        );

        if self.dry_run {
            let mut run = Run::new(&plan.task_id);
            run.successful = total_actions;
            run.transition(ExecutionState::Completed);
            return run.into_result(total_actions);
        }

        self.update_status(&plan.task_id, TaskStatus::Executing);
        let mut run = Run::new(&plan.task_id);

        // Phase 1: folders. A failure here aborts before any action runs.
        for folder in &plan.folders_to_create {
            let path = absolute(&plan.scope_path, folder);
            let target = path.clone();
            match ops::run_blocking(move || ops::create_dir_all(&target)).await {
                Ok(created) => {
                    run.successful += 1;
                    // No destination marks a folder that was already there
                    self.log(
                        &mut run,
                        ActionType::CreateFolder,
                        &path,
                        created.then(|| path.clone()),
                        LogStatus::Success,
                        None,
                    );
                }
                Err(e) => {
                    run.failed += 1;
                    // ops::create_dir_all already names the folder
                    run.error_message = Some(e.clone());
                    self.log(
                        &mut run,
                        ActionType::CreateFolder,
                        &path,
                        Some(path.clone()),
                        LogStatus::Failed,
                        Some(e),
                    );
                    run.transition(ExecutionState::Aborted);
                    return self.finish(run, total_actions);
                }
            }
        }

        // Phase 2: actions, in plan order
        let mut completed: Vec<ResolvedAction> = Vec::new();
        for action in actions {
            let resolved = ResolvedAction {
                action_type: action.action_type,
                source: action.source_path.as_deref().map(|p| absolute(&plan.scope_path, p)),
                destination: action
                    .destination_path
                    .as_deref()
                    .map(|p| absolute(&plan.scope_path, p)),
            };
            let display = resolved
                .source
                .clone()
                .or_else(|| resolved.destination.clone())
                .unwrap_or_default();

            match self.apply(&resolved).await {
                Ok(changed) => {
                    run.successful += 1;
                    let destination = match resolved.action_type {
                        ActionType::CreateFolder if !changed => None,
                        _ => resolved.destination.clone(),
                    };
                    self.log(
                        &mut run,
                        resolved.action_type,
                        &display,
                        destination,
                        LogStatus::Success,
                        None,
                    );
                    completed.push(resolved);
                }
                Err(e) => {
                    run.failed += 1;
                    run.error_message = Some(format!(
                        "Failed {} operation on {}: {}",
                        resolved.action_type,
                        display.display(),
                        e
                    ));
                    self.log(
                        &mut run,
                        resolved.action_type,
                        &display,
                        resolved.destination.clone(),
                        LogStatus::Failed,
                        Some(e),
                    );

                    tracing::warn!(
                        task_id = %plan.task_id,
                        completed = completed.len(),
                        "Action failed, rolling back"
                    );
                    run.transition(ExecutionState::RollingBack);
                    self.rollback(&mut run, completed).await;
                    run.transition(ExecutionState::Aborted);
                    return self.finish(run, total_actions);
                }
            }
        }

        run.transition(ExecutionState::Completed);
        self.finish(run, total_actions)
    }

    /// Run one action on the blocking pool. `Ok(false)` means the
    /// filesystem was already in the requested state.
    async fn apply(&self, action: &ResolvedAction) -> Result<bool, String> {
        match action.action_type {
            ActionType::Move | ActionType::Rename => {
                let source = action.source()?;
                let destination = action.destination()?;
                ops::run_blocking(move || ops::move_path(&source, &destination).map(|()| true))
                    .await
            }
            ActionType::Delete => {
                let source = action.source()?;
                let trash = Arc::clone(&self.trash);
                ops::run_blocking(move || {
                    if !ops::path_exists(&source) {
                        return Err(format!("Path not found: {}", source.display()));
                    }
                    trash.send_to_trash(&source).map(|()| true)
                })
                .await
            }
            ActionType::CreateFolder => {
                let destination = action.destination()?;
                ops::run_blocking(move || ops::create_dir_all(&destination)).await
            }
            ActionType::Skip => Ok(false),
        }
    }

    /// Reverse this run's completed actions, newest first. Keeps going past
    /// individual failures.
    async fn rollback(&self, run: &mut Run<'_>, completed: Vec<ResolvedAction>) {
        let mut rollback_errors = Vec::new();

        for action in completed.into_iter().rev() {
            let original = action.source.clone().or_else(|| action.destination.clone()).unwrap_or_default();
            let current = action.destination.clone().unwrap_or_else(|| original.clone());

            let outcome = match (action.action_type, &action.source, &action.destination) {
                (ActionType::Move | ActionType::Rename, Some(source), Some(destination)) => {
                    let (from, to) = (destination.clone(), source.clone());
                    ops::run_blocking(move || {
                        // A later action in this run already took the destination
                        if !ops::path_exists(&from) {
                            tracing::info!(
                                path = %from.display(),
                                "Destination gone, nothing to move back"
                            );
                            return Ok(());
                        }
                        ops::move_path(&from, &to)
                    })
                    .await
                }
                (ActionType::Delete, _, _) => {
                    tracing::info!(
                        path = %original.display(),
                        trash = self.trash.name(),
                        "Deleted item stays in the trash during rollback"
                    );
                    Ok(())
                }
                _ => Ok(()),
            };

            match outcome {
                Ok(()) => {
                    self.log(run, action.action_type, &current, Some(original), LogStatus::RolledBack, None);
                }
                Err(e) => {
                    tracing::error!(
                        action = %action.action_type,
                        path = %current.display(),
                        error = %e,
                        "Rollback step failed"
                    );
                    rollback_errors.push(e.clone());
                    self.log(
                        run,
                        action.action_type,
                        &current,
                        Some(original),
                        LogStatus::Failed,
                        Some(format!("Rollback failed: {}", e)),
                    );
                }
            }
        }

        run.rollback_performed = true;
        if !rollback_errors.is_empty() {
            let suffix = format!(" | Rollback also failed: {}", rollback_errors.join("; "));
            run.error_message = Some(run.error_message.take().unwrap_or_default() + &suffix);
        }
    }

    fn log(
        &self,
        run: &mut Run<'_>,
        action_type: ActionType,
        source: &Path,
        destination: Option<PathBuf>,
        status: LogStatus,
        error_message: Option<String>,
    ) {
        let entry = self
            .audit
            .record(run.task_id, action_type, source, destination, status, error_message);
        run.logs.push(entry);
    }

    fn finish(&self, run: Run<'_>, total_actions: usize) -> ExecutionResult {
        let status = match run.state {
            ExecutionState::Completed => TaskStatus::Completed,
            _ => TaskStatus::Failed,
        };
        self.update_status(run.task_id, status);

        tracing::info!(
            task_id = run.task_id,
            state = ?run.state,
            successful = run.successful,
            failed = run.failed,
            rollback = run.rollback_performed,
            "Execution finished"
        );
        run.into_result(total_actions)
    }

    // Best effort: a registry problem never changes the execution outcome
    fn update_status(&self, task_id: &str, status: TaskStatus) {
        if let Some(registry) = &self.registry {
            match registry.set_status(task_id, status) {
                Ok(true) => {}
                Ok(false) => tracing::debug!(task_id, "Task not registered, status not recorded"),
                Err(e) => tracing::warn!(task_id, error = %e, "Failed to update task status"),
            }
        }
    }
}

/// Relative plan paths are taken relative to the scope root
fn absolute(scope: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        scope.join(path)
    }
}
