/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    Rejected,
}

/// Capture session state machine.
///
/// State transitions:
/// ```text
/// idle → negotiating → attached → recording → stopping → finalized{accepted|rejected} → idle
///             ↓            ↓                     ↑
///             └────────────┴─────────────────────┘  (failure / cancellation)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Negotiating,
    Attached,
    Recording { duration_secs: f64 },
    Stopping,
    Finalized(Outcome),
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording { .. })
    }

    /// Cancellation is only accepted while negotiating or recording.
    pub fn accepts_cancellation(&self) -> bool {
        matches!(self, Self::Negotiating | Self::Recording { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized(_))
    }

    /// Returns the current duration if in a state that tracks it.
    pub fn duration(&self) -> Option<f64> {
        match self {
            Self::Recording { duration_secs } => Some(*duration_secs),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: &SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Negotiating)
                | (Negotiating, Attached)
                | (Negotiating, Stopping)
                | (Attached, Recording { .. })
                | (Attached, Stopping)
                | (Recording { .. }, Recording { .. })
                | (Recording { .. }, Stopping)
                | (Stopping, Finalized(_))
                | (Finalized(_), Idle)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        let path = [
            SessionState::Idle,
            SessionState::Negotiating,
            SessionState::Attached,
            SessionState::Recording { duration_secs: 0.0 },
            SessionState::Recording { duration_secs: 1.0 },
            SessionState::Stopping,
            SessionState::Finalized(Outcome::Accepted),
            SessionState::Idle,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(&pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn cancellation_windows() {
        assert!(SessionState::Negotiating.accepts_cancellation());
        assert!(SessionState::Recording { duration_secs: 2.0 }.accepts_cancellation());
        assert!(!SessionState::Idle.accepts_cancellation());
        assert!(!SessionState::Stopping.accepts_cancellation());
    }

    #[test]
    fn illegal_transitions_rejected() {
        assert!(!SessionState::Idle.can_transition_to(&SessionState::Recording { duration_secs: 0.0 }));
        assert!(!SessionState::Negotiating.can_transition_to(&SessionState::Finalized(Outcome::Rejected)));
        assert!(!SessionState::Stopping.can_transition_to(&SessionState::Idle));
    }

    #[test]
    fn duration_only_while_recording() {
        assert_eq!(SessionState::Recording { duration_secs: 3.5 }.duration(), Some(3.5));
        assert_eq!(SessionState::Attached.duration(), None);
    }
}
