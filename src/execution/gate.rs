//! Validate-then-execute in one call, so an unsafe plan never reaches the
//! executor.

use super::executor::PlanExecutor;
use crate::error::GateError;
use crate::models::{ExecutionResult, Plan};
use crate::security::{SafetyValidationResult, SafetyValidator};

#[derive(Clone)]
pub struct SafetyGate {
    validator: SafetyValidator,
    executor: PlanExecutor,
}

impl SafetyGate {
    pub fn new(validator: SafetyValidator, executor: PlanExecutor) -> Self {
        Self { validator, executor }
    }

    pub fn validate(&self, plan: &Plan) -> SafetyValidationResult {
        self.validator.validate(plan)
    }

    /// Validate the whole plan and execute it (or its approved subset) only
    /// when it is safe. Warnings are logged and do not block.
    pub async fn run(
        &self,
        plan: &Plan,
        approved: Option<&[usize]>,
    ) -> Result<ExecutionResult, GateError> {
        let validation = self.validator.validate(plan);
        if !validation.is_safe {
            tracing::warn!(
                task_id = %plan.task_id,
                errors = ?validation.errors,
                "Refusing to execute unsafe plan"
            );
            return Err(GateError::Rejected(Box::new(validation)));
        }

        for warning in &validation.warnings {
            tracing::warn!(task_id = %plan.task_id, %warning, "Plan warning");
        }

        Ok(self.executor.execute(plan, approved).await)
    }

    pub fn executor(&self) -> &PlanExecutor {
        &self.executor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{AuditLog, SqliteStore};
    use crate::models::PlanAction;
    use crate::quarantine::QuarantineBin;
    use crate::security::ProtectedPaths;
    use std::fs;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn gate(bin: &std::path::Path) -> SafetyGate {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        SafetyGate::new(
            SafetyValidator::new(ProtectedPaths::none()),
            PlanExecutor::new(AuditLog::new(store), Arc::new(QuarantineBin::new(bin))),
        )
    }

    #[tokio::test]
    async fn test_unsafe_plan_is_not_executed() {
        let dir = tempdir().unwrap();
        let scope = dir.path().join("scope");
        fs::create_dir(&scope).unwrap();
        fs::write(scope.join("a.txt"), "a").unwrap();

        let plan = Plan::new("t1", &scope)
            .with_action(PlanAction::move_to(scope.join("a.txt"), dir.path().join("a.txt")));

        let err = gate(&dir.path().join(".bin")).run(&plan, None).await.unwrap_err();
        let GateError::Rejected(validation) = err;
        assert!(validation.errors[0].contains("outside scope"));
        assert!(scope.join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_safe_plan_runs() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();

        let plan = Plan::new("t1", dir.path())
            .with_action(PlanAction::rename_to(dir.path().join("a.txt"), dir.path().join("b.txt")));

        let result = gate(&dir.path().join(".bin")).run(&plan, None).await.unwrap();
        assert!(result.is_success());
        assert!(dir.path().join("b.txt").exists());
    }
}
