//! Working copy state and clone outcomes

use crate::error::RepositoryError;

/// What is on disk at `services/<name>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkingCopyState {
    Absent,
    Present { branch: String },
    WrongBranch { expected: String, actual: String },
    /// Directory exists but is not a git checkout
    NotARepository,
}

impl WorkingCopyState {
    pub fn label(&self) -> String {
        match self {
            Self::Absent => "absent".to_string(),
            Self::Present { branch } => format!("present ({})", branch),
            Self::WrongBranch { expected, actual } => {
                format!("on {} (expected {})", actual, expected)
            }
            Self::NotARepository => "not a git repository".to_string(),
        }
    }

    pub fn is_present(&self) -> bool {
        !matches!(self, Self::Absent)
    }
}

#[derive(Debug)]
pub enum CloneStatus {
    Cloned,
    /// Removed and cloned again (`--force`)
    Recloned,
    /// Already present, left untouched
    Skipped,
    Failed(RepositoryError),
}

#[derive(Debug)]
pub struct CloneOutcome {
    pub service: String,
    pub status: CloneStatus,
}

impl CloneOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, CloneStatus::Failed(_))
    }
}

/// Per-service outcomes of one clone batch, in registry order
#[derive(Debug, Default)]
pub struct CloneReport {
    pub outcomes: Vec<CloneOutcome>,
}

impl CloneReport {
    pub fn push(&mut self, service: impl Into<String>, status: CloneStatus) {
        self.outcomes.push(CloneOutcome {
            service: service.into(),
            status,
        });
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(CloneOutcome::is_failure)
    }

    pub fn failed(&self) -> Vec<&str> {
        self.names_where(CloneOutcome::is_failure)
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.names_where(|o| matches!(o.status, CloneStatus::Skipped))
    }

    pub fn cloned(&self) -> Vec<&str> {
        self.names_where(|o| matches!(o.status, CloneStatus::Cloned | CloneStatus::Recloned))
    }

    fn names_where(&self, pred: impl Fn(&CloneOutcome) -> bool) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| pred(*o))
            .map(|o| o.service.as_str())
            .collect()
    }
}
