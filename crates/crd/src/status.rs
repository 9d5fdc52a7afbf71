//! Plan execution status of an Instance

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Instance;

/// Execution state of a plan, phase or step
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    NeverRun,
    Pending,
    InProgress,
    Complete,
    Error,
    FatalError,
    #[serde(other)]
    Unknown,
}

impl ExecutionStatus {
    /// Whether the controller is done with the plan, successfully or not
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Complete | ExecutionStatus::FatalError)
    }

    pub fn is_running(self) -> bool {
        matches!(self, ExecutionStatus::Pending | ExecutionStatus::InProgress)
    }
}

/// Status of one plan of an Instance
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanStatus {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ExecutionStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_timestamp: Option<DateTime<Utc>>,

    /// Changes every time the plan is started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phases: Vec<serde_json::Value>,
}

impl PlanStatus {
    pub fn execution_status(&self) -> ExecutionStatus {
        self.status.unwrap_or(ExecutionStatus::NeverRun)
    }

    pub fn uid(&self) -> &str {
        self.uid.as_deref().unwrap_or_default()
    }

    pub fn is_terminal(&self) -> bool {
        self.execution_status().is_terminal()
    }
}

/// Summary status across all plans
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ExecutionStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_plan_name: Option<String>,
}

impl Instance {
    /// Status of the plan the controller ran most recently
    ///
    /// That is the active plan when there is one, otherwise the most
    /// recently updated plan that has ever run. `None` when no plan has run.
    pub fn last_executed_plan_status(&self) -> Option<&PlanStatus> {
        let status = self.status.as_ref()?;

        let active = status
            .aggregated_status
            .as_ref()
            .and_then(|a| a.active_plan_name.as_deref())
            .filter(|name| !name.is_empty())
            .and_then(|name| status.plan_status.get(name));
        if active.is_some() {
            return active;
        }

        if let Some(running) = status
            .plan_status
            .values()
            .find(|p| p.execution_status().is_running())
        {
            return Some(running);
        }

        status
            .plan_status
            .values()
            .filter(|p| p.execution_status() != ExecutionStatus::NeverRun)
            .max_by_key(|p| p.last_updated_timestamp)
    }
}
