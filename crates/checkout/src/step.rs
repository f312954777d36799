use serde::{Deserialize, Serialize};
use std::fmt;

/// The side-effecting steps of finalization, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalizationStep {
    ReserveStock,
    RedeemCoupon,
    SaveOrder,
}

impl FinalizationStep {
    pub fn name(&self) -> &'static str {
        match self {
            FinalizationStep::ReserveStock => "reserve_stock",
            FinalizationStep::RedeemCoupon => "redeem_coupon",
            FinalizationStep::SaveOrder => "save_order",
        }
    }
}

impl fmt::Display for FinalizationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Status of a finalization step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    /// Step is currently executing
    Running,
    /// Step completed successfully
    Completed,
    /// Step failed
    Failed,
    /// Step compensation completed
    Compensated,
    /// Step compensation failed
    CompensationFailed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Running => write!(f, "RUNNING"),
            StepStatus::Completed => write!(f, "COMPLETED"),
            StepStatus::Failed => write!(f, "FAILED"),
            StepStatus::Compensated => write!(f, "COMPENSATED"),
            StepStatus::CompensationFailed => write!(f, "COMPENSATION_FAILED"),
        }
    }
}

/// What happened to one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: FinalizationStep,
    pub status: StepStatus,
    pub error: Option<String>,
}

impl StepRecord {
    pub fn new(step: FinalizationStep) -> Self {
        Self {
            step,
            status: StepStatus::Running,
            error: None,
        }
    }

    pub fn mark_completed(&mut self) {
        self.status = StepStatus::Completed;
        self.error = None;
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = StepStatus::Failed;
        self.error = Some(error);
    }

    pub fn mark_compensated(&mut self) {
        self.status = StepStatus::Compensated;
    }

    pub fn mark_compensation_failed(&mut self, error: String) {
        self.status = StepStatus::CompensationFailed;
        self.error = Some(error);
    }

    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_step() {
        let record = StepRecord::new(FinalizationStep::ReserveStock);
        assert_eq!(record.step.name(), "reserve_stock");
        assert_eq!(record.status, StepStatus::Running);
        assert!(record.error.is_none());
    }

    #[test]
    fn test_step_lifecycle() {
        let mut record = StepRecord::new(FinalizationStep::RedeemCoupon);
        record.mark_completed();
        assert!(record.is_completed());

        record.mark_compensated();
        assert_eq!(record.status, StepStatus::Compensated);
        assert_eq!(record.status.to_string(), "COMPENSATED");
    }

    #[test]
    fn test_failure_keeps_error() {
        let mut record = StepRecord::new(FinalizationStep::SaveOrder);
        record.mark_failed("version conflict".to_string());
        assert_eq!(record.status, StepStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("version conflict"));
        assert!(!record.is_completed());
    }
}
