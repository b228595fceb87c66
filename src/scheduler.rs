/* Copyright (c) 2018 University of Utah
 *
 * Permission to use, copy, modify, and distribute this software for any
 * purpose with or without fee is hereby granted, provided that the above
 * copyright notice and this permission notice appear in all copies.
 *
 * THE SOFTWARE IS PROVIDED "AS IS" AND THE AUTHOR(S) DISCLAIM ALL WARRANTIES
 * WITH REGARD TO THIS SOFTWARE INCLUDING ALL IMPLIED WARRANTIES OF
 * MERCHANTABILITY AND FITNESS. IN NO EVENT SHALL AUTHORS BE LIABLE FOR
 * ANY SPECIAL, DIRECT, INDIRECT, OR CONSEQUENTIAL DAMAGES OR ANY DAMAGES
 * WHATSOEVER RESULTING FROM LOSS OF USE, DATA OR PROFITS, WHETHER IN AN
 * ACTION OF CONTRACT, NEGLIGENCE OR OTHER TORTIOUS ACTION, ARISING OUT OF
 * OR IN CONNECTION WITH THE USE OR PERFORMANCE OF THIS SOFTWARE.
 */

//! An open-ended, priority-weighted task scheduler.
//!
//! Tasks are run one at a time on the scheduler's own thread; `schedule()`
//! may be called concurrently with `run()` from any other thread. A task is
//! removed from the run queue once its `state()` reports `Done`.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use log::debug;

use crate::error::SchedulerError;
use crate::lottery::TaskSelector;

/// Whether a task still wants to run again, or is finished for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Ready,
    Done,
}

/// A unit of work shared between the scheduler's run queue and anyone else
/// that needs to observe or hold on to it (the registry, notably) — hence
/// `run` takes `&self` and implementations rely on interior mutability.
///
/// Once `state()` has returned `Done`, it must never again return `Ready` —
/// the scheduler relies on this to reclaim the task.
pub trait Task: Send + Sync {
    /// Runs the task for one scheduling round. May block.
    fn run(&self);

    /// Fixed at construction; the lottery denominator is the sum of all
    /// ready tasks' priorities.
    fn priority(&self) -> i32;

    /// Current lifecycle state.
    fn state(&self) -> TaskState;
}

/// A source of wall-clock sleeps, abstracted so tests can run a scheduler
/// loop without paying the context-switch delay.
pub trait Clock: Send + Sync {
    fn sleep(&self, d: Duration);
}

/// Sleeps on the real OS clock.
pub struct RealClock;

impl Clock for RealClock {
    fn sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchedulerState {
    Idle,
    Running,
    Stopping,
}

/// Owns the task run-queue and drives the lottery-selected run loop.
pub struct Scheduler {
    selector: Box<dyn TaskSelector>,

    cs_sleep: Duration,
    clock: Arc<dyn Clock>,

    tasks: RwLock<VecDeque<Arc<dyn Task>>>,

    state: RwLock<SchedulerState>,
}

impl Scheduler {
    pub fn new(
        selector: Box<dyn TaskSelector>,
        cs_sleep: Duration,
        clock: Arc<dyn Clock>,
    ) -> Scheduler {
        Scheduler {
            selector,
            cs_sleep,
            clock,
            tasks: RwLock::new(VecDeque::new()),
            state: RwLock::new(SchedulerState::Idle),
        }
    }

    /// Appends a task to the run queue. Safe to call while `run()` is
    /// looping on another thread.
    pub fn schedule(&self, task: Arc<dyn Task>) {
        debug!("scheduling task with priority {}", task.priority());
        self.tasks.write().expect("task list lock poisoned").push_back(task);
    }

    /// Number of tasks currently on the run queue.
    pub fn task_count(&self) -> usize {
        self.tasks.read().expect("task list lock poisoned").len()
    }

    /// Runs the scheduling loop until `stop()` is called. Blocks the calling
    /// thread; callers typically spawn a dedicated thread for this.
    pub fn run(&self) {
        self.set_state(SchedulerState::Running);

        loop {
            self.run_one_round();

            if self.is_stopping() {
                debug!("scheduler loop is terminating");
                break;
            }

            if !self.cs_sleep.is_zero() {
                self.clock.sleep(self.cs_sleep);
            }
        }

        self.set_state(SchedulerState::Idle);
    }

    /// Selects and runs (at most) one task, removing it if it finished.
    fn run_one_round(&self) {
        let priorities: Vec<i32> = {
            let tasks = self.tasks.read().expect("task list lock poisoned");
            tasks.iter().map(|t| t.priority()).collect()
        };

        if priorities.is_empty() {
            return;
        }

        let idx = match self.selector.select(&priorities) {
            Some(idx) => idx,
            None => return,
        };

        let task = {
            let mut tasks = self.tasks.write().expect("task list lock poisoned");
            match tasks.remove(idx) {
                Some(task) => task,
                // The queue shrank between the read above and this write
                // (only possible if another round ran concurrently, which
                // cannot happen since `run_one_round` is only ever called
                // from this scheduler's own loop). Nothing to do.
                None => return,
            }
        };

        debug!("task with priority {} selected to run", task.priority());
        task.run();
        debug!(
            "task with priority {} finished this round in state {:?}",
            task.priority(),
            task.state()
        );

        if task.state() != TaskState::Done {
            self.tasks
                .write()
                .expect("task list lock poisoned")
                .push_back(task);
        }
    }

    fn set_state(&self, new_state: SchedulerState) {
        *self.state.write().expect("state lock poisoned") = new_state;
    }

    fn is_stopping(&self) -> bool {
        *self.state.read().expect("state lock poisoned") == SchedulerState::Stopping
    }

    /// Requests that the run loop terminate after the current task's `run()`
    /// returns. Advisory only: there is no forced preemption.
    pub fn stop(&self) -> Result<(), SchedulerError> {
        let mut state = self.state.write().expect("state lock poisoned");

        match *state {
            SchedulerState::Stopping => Err(SchedulerError::AlreadyStopping),
            SchedulerState::Idle => Err(SchedulerError::NotRunning),
            SchedulerState::Running => {
                *state = SchedulerState::Stopping;
                debug!("scheduler is stopping");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lottery::LotteryTaskSelector;
    use crate::random::PrngRandomSource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingTask {
        priority: i32,
        runs_remaining: AtomicUsize,
        run_count: Arc<AtomicUsize>,
    }

    impl CountingTask {
        fn new(priority: i32, runs_remaining: usize, run_count: Arc<AtomicUsize>) -> CountingTask {
            CountingTask {
                priority,
                runs_remaining: AtomicUsize::new(runs_remaining),
                run_count,
            }
        }
    }

    impl Task for CountingTask {
        fn run(&self) {
            self.run_count.fetch_add(1, Ordering::SeqCst);
            self.runs_remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_sub(1))
            }).ok();
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn state(&self) -> TaskState {
            if self.runs_remaining.load(Ordering::SeqCst) == 0 {
                TaskState::Done
            } else {
                TaskState::Ready
            }
        }
    }

    struct NoSleepClock;
    impl Clock for NoSleepClock {
        fn sleep(&self, _d: Duration) {}
    }

    fn test_scheduler() -> Scheduler {
        let rand = Arc::new(PrngRandomSource::new());
        let selector = Box::new(LotteryTaskSelector::new(rand));
        Scheduler::new(selector, Duration::from_millis(0), Arc::new(NoSleepClock))
    }

    #[test]
    fn runs_a_ready_task_until_done() {
        let sched = test_scheduler();
        let run_count = Arc::new(AtomicUsize::new(0));

        sched.schedule(Arc::new(CountingTask::new(5, 3, run_count.clone())));

        for _ in 0..3 {
            sched.run_one_round();
        }

        assert_eq!(run_count.load(Ordering::SeqCst), 3);
        assert_eq!(sched.task_count(), 0);
    }

    #[test]
    fn empty_queue_round_is_a_noop() {
        let sched = test_scheduler();
        sched.run_one_round();
        assert_eq!(sched.task_count(), 0);
    }

    #[test]
    fn stop_requires_running_state() {
        let sched = test_scheduler();
        assert!(sched.stop().is_err());
    }

    #[test]
    fn stop_is_not_idempotent() {
        let sched = Arc::new(test_scheduler());
        let run_count = Arc::new(AtomicUsize::new(0));

        sched.schedule(Arc::new(CountingTask::new(1, usize::MAX, run_count.clone())));

        let sched_clone = sched.clone();
        let handle = std::thread::spawn(move || sched_clone.run());

        while run_count.load(Ordering::SeqCst) == 0 {
            std::thread::yield_now();
        }

        assert!(sched.stop().is_ok());
        assert!(sched.stop().is_err());

        handle.join().unwrap();
    }

    #[test]
    fn schedule_is_callable_concurrently_with_run() {
        let sched = Arc::new(test_scheduler());

        let sched_clone = sched.clone();
        let handle = std::thread::spawn(move || sched_clone.run());

        let run_count = Arc::new(AtomicUsize::new(0));
        for _ in 0..20 {
            sched.schedule(Arc::new(CountingTask::new(1, 1, run_count.clone())));
        }

        // Give the loop a chance to drain the queue.
        std::thread::sleep(Duration::from_millis(50));
        sched.stop().unwrap();
        handle.join().unwrap();

        assert_eq!(run_count.load(Ordering::SeqCst), 20);
    }
}
