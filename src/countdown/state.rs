use serde::{Deserialize, Serialize};

/// Lifecycle of one emergency countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyStatus {
    Idle,
    Armed,
    Triggered,
    Cancelled,
}

impl EmergencyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmergencyStatus::Idle => "idle",
            EmergencyStatus::Armed => "armed",
            EmergencyStatus::Triggered => "triggered",
            EmergencyStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EmergencyStatus::Triggered | EmergencyStatus::Cancelled)
    }
}

/// Result of feeding one tick into the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still armed with this many ticks left
    Continue(u32),
    /// Reached zero on this tick
    Fired,
    /// Not armed; the tick was stale
    Ignored,
}

/// Pure countdown state machine: idle -> armed -> (triggered | cancelled) -> idle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownState {
    duration: u32,
    remaining: u32,
    status: EmergencyStatus,
}

impl CountdownState {
    pub fn new(duration: u32) -> Self {
        Self {
            duration,
            remaining: duration,
            status: EmergencyStatus::Idle,
        }
    }

    pub fn duration(&self) -> u32 {
        self.duration
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn status(&self) -> EmergencyStatus {
        self.status
    }

    /// Start counting down from the full duration. Only valid from idle.
    pub fn arm(&mut self) -> bool {
        if self.status != EmergencyStatus::Idle {
            return false;
        }
        self.remaining = self.duration;
        self.status = EmergencyStatus::Armed;
        true
    }

    pub fn tick(&mut self) -> TickOutcome {
        if self.status != EmergencyStatus::Armed {
            return TickOutcome::Ignored;
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.status = EmergencyStatus::Triggered;
            TickOutcome::Fired
        } else {
            TickOutcome::Continue(self.remaining)
        }
    }

    /// Abort an armed countdown. Returns false when there was nothing to cancel.
    pub fn cancel(&mut self) -> bool {
        if self.status != EmergencyStatus::Armed {
            return false;
        }
        self.status = EmergencyStatus::Cancelled;
        true
    }

    pub fn reset(&mut self) {
        self.remaining = self.duration;
        self.status = EmergencyStatus::Idle;
    }
}
