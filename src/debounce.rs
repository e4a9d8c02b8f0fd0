//! Debounce timer for pipeline triggers

use std::time::Duration;

use tokio::time::Instant;

/// What caused a run to be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The source text changed
    Edit,
    /// A style or language setting changed
    Style,
}

/// A single resettable deadline.
///
/// Each `schedule` pushes the deadline out to `now + interval`; only the last
/// schedule inside the quiet window survives. The owner polls [`wait`] and
/// calls [`take`] when it fires.
///
/// [`wait`]: Debouncer::wait
/// [`take`]: Debouncer::take
#[derive(Debug, Clone)]
pub struct Debouncer {
    edit: Duration,
    style: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(edit: Duration, style: Duration) -> Self {
        Self {
            edit,
            style,
            deadline: None,
        }
    }

    pub fn interval(&self, trigger: Trigger) -> Duration {
        match trigger {
            Trigger::Edit => self.edit,
            Trigger::Style => self.style,
        }
    }

    pub fn schedule(&mut self, trigger: Trigger) {
        self.schedule_at(trigger, Instant::now());
    }

    pub fn schedule_at(&mut self, trigger: Trigger, now: Instant) {
        self.deadline = Some(now + self.interval(trigger));
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Clear the pending deadline, returning it if there was one.
    pub fn take(&mut self) -> Option<Instant> {
        self.deadline.take()
    }

    /// Resolves when the current deadline passes; never resolves when idle.
    pub fn wait(&self) -> impl std::future::Future<Output = ()> + 'static {
        wait_until(self.deadline)
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
