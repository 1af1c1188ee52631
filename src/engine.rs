//! `Sentinel`: the validator, executor, audit log and undo manager wired
//! together over one SQLite store.

use std::sync::Arc;

use crate::config::SentinelConfig;
use crate::error::{GateError, StoreError, UndoError};
use crate::execution::{PlanExecutor, RecoverableTrash, SafetyGate, SystemTrash};
use crate::history::{AuditLog, SqliteStore, TaskRegistry, UndoManager};
use crate::models::{ExecutionLogEntry, ExecutionResult, Plan, TaskRecord, UndoOperation};
use crate::security::{ProtectedPaths, SafetyValidationResult, SafetyValidator};

pub struct Sentinel {
    store: Arc<SqliteStore>,
    audit: AuditLog,
    gate: SafetyGate,
    undo: UndoManager,
}

impl Sentinel {
    /// Open the configured database and send deletions to the system trash
    pub fn open(config: &SentinelConfig) -> Result<Self, StoreError> {
        let store = Arc::new(SqliteStore::open(&config.database_path)?);
        Ok(Self::assemble(
            config,
            store,
            Arc::new(SystemTrash),
            config.protected_paths(),
        ))
    }

    /// Wire everything over an existing store with an explicit trash and
    /// protected-path table
    pub fn assemble(
        config: &SentinelConfig,
        store: Arc<SqliteStore>,
        trash: Arc<dyn RecoverableTrash>,
        protected: ProtectedPaths,
    ) -> Self {
        let audit = AuditLog::new(store.clone());
        let validator = SafetyValidator::new(protected.clone())
            .with_deletion_warning_threshold(config.deletion_warning_threshold);
        let executor = PlanExecutor::new(audit.clone(), trash)
            .with_registry(store.clone())
            .dry_run(config.dry_run);
        let undo = UndoManager::new(audit.clone(), store.clone()).with_protected_paths(protected);

        tracing::debug!(
            platform = %config.platform,
            dry_run = config.dry_run,
            "Sentinel core ready"
        );

        Self {
            store,
            audit,
            gate: SafetyGate::new(validator, executor),
            undo,
        }
    }

    /// Register a task before executing its plan. Returns `false` if it
    /// was already known.
    pub fn register_task(&self, task: &TaskRecord) -> Result<bool, StoreError> {
        self.store.register(task)
    }

    pub fn task(&self, task_id: &str) -> Result<Option<TaskRecord>, StoreError> {
        self.store.get(task_id)
    }

    pub fn validate(&self, plan: &Plan) -> SafetyValidationResult {
        self.gate.validate(plan)
    }

    /// Validate and, if safe, execute
    pub async fn execute(
        &self,
        plan: &Plan,
        approved: Option<&[usize]>,
    ) -> Result<ExecutionResult, GateError> {
        self.gate.run(plan, approved).await
    }

    pub fn history(&self, task_id: &str) -> Vec<ExecutionLogEntry> {
        self.audit.entries_for(task_id)
    }

    pub fn can_undo(&self, task_id: &str) -> (bool, Option<String>) {
        self.undo.can_undo(task_id)
    }

    pub fn preview_undo(&self, task_id: &str) -> Vec<UndoOperation> {
        self.undo.preview_undo(task_id)
    }

    pub async fn undo(&self, task_id: &str) -> Result<ExecutionResult, UndoError> {
        self.undo.undo(task_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlanAction, TaskStatus};
    use crate::quarantine::QuarantineBin;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_execute_then_undo_round_trip() {
        let dir = tempdir().unwrap();
        let scope = dir.path().join("downloads");
        fs::create_dir(&scope).unwrap();
        fs::write(scope.join("report.pdf"), "pdf").unwrap();

        let config = SentinelConfig::with_data_dir(dir.path().join(".sentinel"));
        let store = Arc::new(SqliteStore::open(&config.database_path).unwrap());
        let sentinel = Sentinel::assemble(
            &config,
            store,
            Arc::new(QuarantineBin::new(&config.quarantine_dir)),
            ProtectedPaths::none(),
        );

        sentinel
            .register_task(&TaskRecord::new("t1", "sort my downloads"))
            .unwrap();
        let plan = Plan::new("t1", &scope)
            .with_folder(scope.join("PDFs"))
            .with_action(PlanAction::move_to(
                scope.join("report.pdf"),
                scope.join("PDFs/report.pdf"),
            ));

        let result = sentinel.execute(&plan, None).await.unwrap();
        assert!(result.is_success());
        assert_eq!(
            sentinel.task("t1").unwrap().unwrap().status,
            TaskStatus::Completed
        );

        assert_eq!(sentinel.can_undo("t1"), (true, None));
        let undone = sentinel.undo("t1").await.unwrap();
        assert_eq!(undone.successful_actions, 2);
        assert!(scope.join("report.pdf").exists());
        assert!(!scope.join("PDFs").exists());
        assert_eq!(sentinel.history("undo_t1").len(), 2);
    }
}
