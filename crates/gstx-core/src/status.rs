//! # Run Status
//!
//! The pipeline controller never unwinds — it returns a [`RunStatus`] and
//! the driver maps that to an exit code. Stage-specific failures get their
//! own terminal variants so operators can tell a missing voucher template
//! from a schema defect without reading logs.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run is in progress.
    Running,
    /// All requested stages completed.
    Success,
    /// Master-data approvals are pending; resume after decisions.
    AwaitingApproval,
    /// Run completed through pivot/summary stages only.
    Summarized,
    /// Run completed through voucher export.
    Exported,
    /// Input failed schema validation.
    SchemaInvalid,
    /// No voucher template registered for the GSTIN.
    TallyTemplateMissing,
    /// No batch files available for export.
    BatchMissing,
    /// Run aborted on a critical exception or operational error.
    Failed,
}

impl RunStatus {
    /// Return the string representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Summarized => "summarized",
            Self::Exported => "exported",
            Self::SchemaInvalid => "schema_invalid",
            Self::TallyTemplateMissing => "tally_template_missing",
            Self::BatchMissing => "batch_missing",
            Self::Failed => "failed",
        }
    }

    /// Whether the driver should exit 0 for this status.
    ///
    /// `awaiting_approval` is a success from the driver's perspective: the
    /// next step is the approval CLI, not a retry.
    pub fn is_ok(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::AwaitingApproval | Self::Summarized | Self::Exported
        )
    }

    /// Whether the run has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_mapping() {
        assert!(RunStatus::Success.is_ok());
        assert!(RunStatus::AwaitingApproval.is_ok());
        assert!(RunStatus::Exported.is_ok());
        assert!(!RunStatus::Failed.is_ok());
        assert!(!RunStatus::TallyTemplateMissing.is_ok());
    }

    #[test]
    fn terminal_states() {
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }
}
