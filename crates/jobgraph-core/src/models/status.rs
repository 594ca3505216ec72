use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Submitted,
    Blocked,
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    Abandoned,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Blocked => "blocked",
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Abandoned => "abandoned",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Skipped | Self::Abandoned | Self::Cancelled
        )
    }

    /// Terminal statuses that can never satisfy a downstream dependency.
    pub fn is_unsuccessful(self) -> bool {
        self.is_terminal() && self != Self::Completed
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;

        match (self, next) {
            (Submitted, Blocked | Pending | Skipped | Abandoned | Cancelled) => true,
            (Blocked, Pending | Skipped | Abandoned | Cancelled) => true,
            (Pending, Running | Skipped | Cancelled) => true,
            (Running, Completed | Failed | Cancelled) => true,
            _ => false,
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = ();

    /// Accepts both the current lowercase names and the uppercase names
    /// written by the first schema generation.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().trim_start_matches("Status.").to_ascii_lowercase();
        match normalized.as_str() {
            "submitted" => Ok(Self::Submitted),
            "blocked" => Ok(Self::Blocked),
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            "abandoned" => Ok(Self::Abandoned),
            "canceled" | "cancelled" => Ok(Self::Cancelled),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::JobStatus;

    const ALL: [JobStatus; 9] = [
        JobStatus::Submitted,
        JobStatus::Blocked,
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Skipped,
        JobStatus::Abandoned,
        JobStatus::Cancelled,
    ];

    #[test]
    fn terminal_statuses_have_no_outgoing_transitions() {
        for from in ALL.iter().copied().filter(|status| status.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn every_non_terminal_status_can_be_cancelled() {
        for from in ALL.iter().copied().filter(|status| !status.is_terminal()) {
            assert!(from.can_transition_to(JobStatus::Cancelled));
        }
    }

    #[test]
    fn running_is_only_reachable_from_pending() {
        for from in ALL {
            assert_eq!(
                from.can_transition_to(JobStatus::Running),
                from == JobStatus::Pending
            );
        }
    }

    #[test]
    fn parses_legacy_uppercase_names() {
        assert_eq!("COMPLETED".parse::<JobStatus>(), Ok(JobStatus::Completed));
        assert_eq!("Status.BLOCKED".parse::<JobStatus>(), Ok(JobStatus::Blocked));
        assert_eq!("CANCELED".parse::<JobStatus>(), Ok(JobStatus::Cancelled));
        assert!("finished".parse::<JobStatus>().is_err());
    }

    #[test]
    fn as_str_round_trips_through_from_str() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<JobStatus>(), Ok(status));
        }
    }
}
