//! Heartbeat scheduler: one-shot timers on a logical clock
//!
//! Sessions and ranged engagements schedule their next step with
//! `schedule_after` and keep the returned handle to cancel it. Cancelled
//! entries stay in the heap and are skipped when they come due.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::core::types::{EngagementId, EntityId, Tick};

/// Work the arena performs when a timer fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Task {
    /// One combat round for a session
    Round(EntityId),
    /// Drop an idle session
    Teardown(EntityId),
    /// A fled entity looks for its enemies again
    FleeRecovery(EntityId),
    /// Loaded launcher becomes ready to fire
    RangedReady(EngagementId),
    /// Drawn launcher held too long
    DrawFatigue(EngagementId),
}

/// Handle returned by `schedule_after`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskHandle(u64);

#[derive(Debug, Clone)]
struct Scheduled {
    due: Tick,
    handle: TaskHandle,
    task: Task,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for Scheduled {}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap; earlier handle first on equal ticks
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.handle.cmp(&self.handle))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Single-threaded timer queue
#[derive(Debug, Default)]
pub struct HeartbeatScheduler {
    now: Tick,
    next_handle: u64,
    queue: BinaryHeap<Scheduled>,
    cancelled: AHashSet<TaskHandle>,
}

impl HeartbeatScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Tick {
        self.now
    }

    /// Run `task` once, `delay` ticks from now (0 means later this tick)
    pub fn schedule_after(&mut self, delay: Tick, task: Task) -> TaskHandle {
        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;
        self.queue.push(Scheduled {
            due: self.now.saturating_add(delay),
            handle,
            task,
        });
        tracing::trace!(?task, delay, due = self.now + delay, "scheduled");
        handle
    }

    /// Cancel a pending task; cancelling twice or after it ran is a no-op
    pub fn cancel(&mut self, handle: TaskHandle) {
        if self.queue.iter().any(|s| s.handle == handle) {
            self.cancelled.insert(handle);
        }
    }

    /// Next task due at or before the current tick
    pub fn pop_due(&mut self) -> Option<Task> {
        while let Some(next) = self.queue.peek() {
            if next.due > self.now {
                return None;
            }
            let scheduled = self.queue.pop()?;
            if self.cancelled.remove(&scheduled.handle) {
                continue;
            }
            return Some(scheduled.task);
        }
        None
    }

    /// Move the clock forward by one tick
    pub fn tick(&mut self) {
        self.now += 1;
    }

    /// Tick of the earliest live task
    pub fn next_due(&mut self) -> Option<Tick> {
        while let Some(next) = self.queue.peek() {
            if self.cancelled.contains(&next.handle) {
                let handle = next.handle;
                self.queue.pop();
                self.cancelled.remove(&handle);
                continue;
            }
            return Some(next.due);
        }
        None
    }

    /// Jump the clock to `tick` if it lies ahead
    pub fn jump_to(&mut self, tick: Tick) {
        self.now = self.now.max(tick);
    }

    /// Live tasks still queued
    pub fn pending(&self) -> usize {
        self.queue.len() - self.cancelled.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tasks_fire_in_due_order() {
        let mut scheduler = HeartbeatScheduler::new();
        let a = EntityId::new();
        let b = EntityId::new();
        scheduler.schedule_after(2, Task::Round(a));
        scheduler.schedule_after(1, Task::Round(b));

        assert_eq!(scheduler.pop_due(), None);
        scheduler.tick();
        assert_eq!(scheduler.pop_due(), Some(Task::Round(b)));
        scheduler.tick();
        assert_eq!(scheduler.pop_due(), Some(Task::Round(a)));
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_same_tick_keeps_schedule_order() {
        let mut scheduler = HeartbeatScheduler::new();
        let a = EntityId::new();
        let b = EntityId::new();
        scheduler.schedule_after(0, Task::Round(a));
        scheduler.schedule_after(0, Task::Teardown(b));
        assert_eq!(scheduler.pop_due(), Some(Task::Round(a)));
        assert_eq!(scheduler.pop_due(), Some(Task::Teardown(b)));
    }

    #[test]
    fn test_cancelled_task_never_fires() {
        let mut scheduler = HeartbeatScheduler::new();
        let id = EntityId::new();
        let handle = scheduler.schedule_after(1, Task::Round(id));
        scheduler.cancel(handle);
        scheduler.cancel(handle);
        assert_eq!(scheduler.pending(), 0);
        scheduler.tick();
        assert_eq!(scheduler.pop_due(), None);
    }

    #[test]
    fn test_cancel_after_run_is_noop() {
        let mut scheduler = HeartbeatScheduler::new();
        let id = EntityId::new();
        let handle = scheduler.schedule_after(0, Task::Round(id));
        assert!(scheduler.pop_due().is_some());
        scheduler.cancel(handle);
        let other = scheduler.schedule_after(0, Task::Round(id));
        assert_ne!(handle, other);
        assert_eq!(scheduler.pop_due(), Some(Task::Round(id)));
    }

    #[test]
    fn test_next_due_skips_cancelled() {
        let mut scheduler = HeartbeatScheduler::new();
        let id = EntityId::new();
        let early = scheduler.schedule_after(1, Task::Round(id));
        scheduler.schedule_after(7, Task::Teardown(id));
        scheduler.cancel(early);
        assert_eq!(scheduler.next_due(), Some(7));
        scheduler.jump_to(7);
        assert_eq!(scheduler.pop_due(), Some(Task::Teardown(id)));
    }
}
