use std::{
    cell::RefCell,
    collections::VecDeque,
    mem::take,
    rc::{Rc, Weak},
    time::Duration,
};

use derive_ex::derive_ex;

mod timer;

use timer::{TimerId, TimerQueue};


type Job = Box<dyn FnOnce()>;

struct Queues {
    now: Duration,
    microtasks: VecDeque<Job>,
    tasks: VecDeque<Job>,
    timers: TimerQueue,
}
impl Queues {
    fn new() -> Self {
        Self {
            now: Duration::ZERO,
            microtasks: VecDeque::new(),
            tasks: VecDeque::new(),
            timers: TimerQueue::new(),
        }
    }
    fn is_idle(&self) -> bool {
        self.microtasks.is_empty() && self.tasks.is_empty() && !self.timers.has_due(self.now)
    }
}

/// Handle used by stores and combinators to schedule deferred work.
///
/// All handles obtained from the same [`Runtime`] share its queues and its virtual clock.
#[derive_ex(Clone)]
pub struct Scheduler(Rc<RefCell<Queues>>);

impl Scheduler {
    /// Current time of the virtual clock.
    pub fn now(&self) -> Duration {
        self.0.borrow().now
    }

    /// Runs `f` after the current synchronous dispatch, before any deferred task.
    pub fn queue_microtask(&self, f: impl FnOnce() + 'static) {
        self.0.borrow_mut().microtasks.push_back(Box::new(f));
    }

    /// Runs `f` on the next turn of the loop.
    pub fn spawn(&self, f: impl FnOnce() + 'static) {
        self.0.borrow_mut().tasks.push_back(Box::new(f));
    }

    /// Runs `f` once `delay` has elapsed on the virtual clock.
    ///
    /// Dropping the returned [`Timer`] cancels it.
    pub fn set_timeout(&self, delay: Duration, f: impl FnOnce() + 'static) -> Timer {
        let mut q = self.0.borrow_mut();
        let at = q.now + delay;
        let id = q.timers.insert(at, Box::new(f));
        tracing::trace!(?at, "timer scheduled");
        Timer {
            queues: Rc::downgrade(&self.0),
            id: Some(id),
        }
    }

    fn pop_microtask(&self) -> Option<Job> {
        self.0.borrow_mut().microtasks.pop_front()
    }
    fn take_tasks(&self) -> VecDeque<Job> {
        take(&mut self.0.borrow_mut().tasks)
    }
    fn pop_due_timer(&self) -> Option<Job> {
        let q = &mut *self.0.borrow_mut();
        q.timers.pop_due(q.now)
    }
}

/// A pending timeout created by [`Scheduler::set_timeout`].
#[must_use]
pub struct Timer {
    queues: Weak<RefCell<Queues>>,
    id: Option<TimerId>,
}
impl Timer {
    /// Returns `true` if the timer has neither fired nor been cancelled.
    pub fn is_pending(&self) -> bool {
        match (&self.id, self.queues.upgrade()) {
            (Some(id), Some(queues)) => queues.borrow().timers.contains(*id),
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        if let Some(id) = self.id.take() {
            if let Some(queues) = self.queues.upgrade() {
                let job = queues.borrow_mut().timers.remove(id);
                if job.is_some() {
                    tracing::trace!("timer cancelled");
                }
                drop(job);
            }
        }
    }
}
impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Single-threaded cooperative event loop with a virtual clock.
///
/// Work is only performed when the owner drives the loop with
/// [`update`](Self::update) or [`advance`](Self::advance).
#[derive_ex(Default)]
#[default(Self::new())]
pub struct Runtime {
    scheduler: Scheduler,
}
impl Runtime {
    pub fn new() -> Self {
        Self {
            scheduler: Scheduler(Rc::new(RefCell::new(Queues::new()))),
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    /// Perform queued microtasks, including the ones queued while running.
    ///
    /// Returns `true` if any microtask was performed.
    pub fn run_microtasks(&mut self) -> bool {
        let mut handled = false;
        while let Some(job) = self.scheduler.pop_microtask() {
            job();
            handled = true;
        }
        handled
    }

    /// Perform the tasks queued before this call, each followed by a microtask checkpoint.
    ///
    /// Tasks spawned while running are left for the next call.
    ///
    /// Returns `true` if any task was performed.
    pub fn run_tasks(&mut self) -> bool {
        let tasks = self.scheduler.take_tasks();
        let handled = !tasks.is_empty();
        if handled {
            tracing::trace!(count = tasks.len(), "running tasks");
        }
        for job in tasks {
            job();
            self.run_microtasks();
        }
        handled
    }

    /// Fire every timer that is due at the current time, in deadline order.
    ///
    /// Returns `true` if any timer fired.
    pub fn run_timers(&mut self) -> bool {
        let mut handled = false;
        while let Some(job) = self.scheduler.pop_due_timer() {
            job();
            self.run_microtasks();
            handled = true;
        }
        handled
    }

    /// Repeat until there is nothing left to do at the current time:
    /// [`run_microtasks`](Self::run_microtasks), [`run_tasks`](Self::run_tasks),
    /// [`run_timers`](Self::run_timers).
    pub fn update(&mut self) {
        loop {
            if self.run_microtasks() {
                continue;
            }
            if self.run_tasks() {
                continue;
            }
            if self.run_timers() {
                continue;
            }
            break;
        }
    }

    /// Move the virtual clock forward by `duration`, firing timers at their deadlines.
    pub fn advance(&mut self, duration: Duration) {
        let target = self.now() + duration;
        loop {
            self.update();
            let next = self.scheduler.0.borrow().timers.next_deadline();
            match next {
                Some(at) if at <= target => self.scheduler.0.borrow_mut().now = at,
                _ => break,
            }
        }
        self.scheduler.0.borrow_mut().now = target;
        self.update();
    }

    /// Run until no work and no pending timer remain, moving the clock as needed.
    pub fn settle(&mut self) {
        loop {
            self.update();
            let next = self.scheduler.0.borrow().timers.next_deadline();
            let Some(at) = next else {
                break;
            };
            let mut q = self.scheduler.0.borrow_mut();
            if at > q.now {
                q.now = at;
            }
        }
    }

    /// Returns `true` if nothing is runnable at the current time.
    pub fn is_idle(&self) -> bool {
        self.scheduler.0.borrow().is_idle()
    }
}
impl Drop for Runtime {
    fn drop(&mut self) {
        let pending = {
            let mut q = self.scheduler.0.borrow_mut();
            (
                take(&mut q.microtasks),
                take(&mut q.tasks),
                take(&mut q.timers),
            )
        };
        drop(pending);
    }
}
