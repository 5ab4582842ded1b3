//! Run state owned by the controller.
//!
//! `phase` plus two informative flags: `channel_opened` and `start_request_sent` tell apart
//! "connecting", "request in flight" and "job executing", which decides whether a disconnect can be
//! cleared silently or must be treated as an unknown-outcome run.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Starting,
    Running,
    Terminating,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    phase: Phase,
    channel_opened: bool,
    start_request_sent: bool,
    terminal_notified: bool,
}

impl RunState {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    #[cfg(test)]
    pub fn channel_opened(&self) -> bool {
        self.channel_opened
    }

    #[cfg(test)]
    pub fn start_request_sent(&self) -> bool {
        self.start_request_sent
    }

    #[cfg(test)]
    pub fn terminal_notified(&self) -> bool {
        self.terminal_notified
    }

    /// Idle -> Starting. Returns false (and changes nothing) from any other phase.
    pub(crate) fn begin(&mut self) -> bool {
        if self.phase != Phase::Idle {
            return false;
        }
        self.phase = Phase::Starting;
        self.terminal_notified = false;
        true
    }

    pub(crate) fn mark_channel_opened(&mut self) {
        if self.phase == Phase::Starting {
            self.channel_opened = true;
        }
    }

    /// Must be called before the start request is awaited.
    pub(crate) fn mark_request_sent(&mut self) {
        if self.phase == Phase::Starting {
            self.start_request_sent = true;
        }
    }

    /// Starting -> Running, only with a dispatched start request. A terminal event may already
    /// have returned the run to Idle, in which case nothing changes.
    pub(crate) fn mark_running(&mut self) -> bool {
        if self.phase == Phase::Starting && self.start_request_sent {
            self.phase = Phase::Running;
            true
        } else {
            false
        }
    }

    pub(crate) fn begin_termination(&mut self) {
        self.phase = Phase::Terminating;
    }

    /// Back to the Idle baseline in one step.
    pub(crate) fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.channel_opened = false;
        self.start_request_sent = false;
    }

    /// A job may be executing server-side even if we can no longer observe it.
    pub(crate) fn may_still_be_running(&self) -> bool {
        self.start_request_sent || self.phase == Phase::Running
    }

    /// Returns true exactly once per run attempt.
    pub(crate) fn claim_terminal_notice(&mut self) -> bool {
        !std::mem::replace(&mut self.terminal_notified, true)
    }
}
