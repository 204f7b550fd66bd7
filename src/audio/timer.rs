//! Cancellable delayed-task facility
//!
//! The [`Scheduler`](crate::audio::scheduler::Scheduler) never sleeps on the
//! caller's thread; it hands tasks to a [`DelayScheduler`]. Two
//! implementations exist:
//!
//! - [`ThreadTimer`]: a background thread holding a min-heap of deadlines,
//!   woken by a command channel
//! - [`VirtualTimer`]: a clock that only moves when told to, for
//!   deterministic tests

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, BinaryHeap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Work run when a timer fires
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Handle used to cancel a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Schedules tasks on a monotonic clock
pub trait DelayScheduler: Send + Sync {
    /// Time elapsed on this scheduler's clock
    fn now(&self) -> Duration;

    /// Run `task` once the clock reaches `deadline`
    fn schedule_at(&self, deadline: Duration, task: Task) -> TimerId;

    /// Drop a task that has not fired yet; unknown ids are ignored
    fn cancel(&self, id: TimerId);

    /// Run `task` after `delay` from now
    fn schedule(&self, delay: Duration, task: Task) -> TimerId {
        self.schedule_at(self.now().saturating_add(delay), task)
    }
}

/// Commands that can be sent to the timer thread
enum TimerCommand {
    Schedule { id: TimerId, deadline: Instant, task: Task },
    Cancel(TimerId),
    Shutdown,
}

/// A task waiting in the heap
struct Pending {
    deadline: Instant,
    id: TimerId,
    task: Task,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.id == other.id
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reverse order for min-heap behavior (earliest first, then oldest id)
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Wall-clock timer backed by its own thread
pub struct ThreadTimer {
    origin: Instant,
    next_id: AtomicU64,
    command_tx: Sender<TimerCommand>,
    thread: Option<JoinHandle<()>>,
}

impl ThreadTimer {
    /// Spawn the timer thread
    pub fn new() -> Self {
        let (command_tx, command_rx) = unbounded();
        let thread = thread::spawn(move || TimerThread::new(command_rx).run());

        ThreadTimer {
            origin: Instant::now(),
            next_id: AtomicU64::new(1),
            command_tx,
            thread: Some(thread),
        }
    }
}

impl Default for ThreadTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayScheduler for ThreadTimer {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    /// Deadlines past what `Instant` can represent are never queued; they
    /// would not fire within the life of the process anyway.
    fn schedule_at(&self, deadline: Duration, task: Task) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        match self.origin.checked_add(deadline) {
            Some(deadline) => {
                let _ = self
                    .command_tx
                    .send(TimerCommand::Schedule { id, deadline, task });
            }
            None => log::debug!(
                "timer {:?} deadline {:?} is out of range, dropped",
                id,
                deadline
            ),
        }
        id
    }

    fn cancel(&self, id: TimerId) {
        let _ = self.command_tx.send(TimerCommand::Cancel(id));
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        let _ = self.command_tx.send(TimerCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            // The last owner may be a task running on the timer thread itself
            if thread.thread().id() != thread::current().id() {
                let _ = thread.join();
            }
        }
    }
}

/// Internal thread that sleeps until the earliest deadline
struct TimerThread {
    command_rx: Receiver<TimerCommand>,
    queue: BinaryHeap<Pending>,
}

impl TimerThread {
    fn new(command_rx: Receiver<TimerCommand>) -> Self {
        Self {
            command_rx,
            queue: BinaryHeap::new(),
        }
    }

    fn run(&mut self) {
        loop {
            let command = match self.queue.peek() {
                // Blocking wait for commands when idle
                None => match self.command_rx.recv() {
                    Ok(cmd) => cmd,
                    Err(_) => break,
                },
                Some(next) => {
                    let now = Instant::now();
                    if next.deadline <= now {
                        self.fire_due();
                        continue;
                    }
                    match self.command_rx.recv_timeout(next.deadline - now) {
                        Ok(cmd) => cmd,
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            };

            if self.handle_command(command) {
                break;
            }
        }
    }

    /// Returns true when the thread should exit
    fn handle_command(&mut self, command: TimerCommand) -> bool {
        match command {
            TimerCommand::Schedule { id, deadline, task } => {
                self.queue.push(Pending { deadline, id, task });
            }
            TimerCommand::Cancel(id) => {
                self.queue.retain(|pending| pending.id != id);
            }
            TimerCommand::Shutdown => return true,
        }
        false
    }

    fn fire_due(&mut self) {
        let now = Instant::now();
        while self.queue.peek().is_some_and(|next| next.deadline <= now) {
            if let Some(pending) = self.queue.pop() {
                (pending.task)();
            }
        }
    }
}

struct VirtualState {
    now: Duration,
    next_id: u64,
    queue: BTreeMap<(Duration, u64), Task>,
}

/// Manually advanced clock.
///
/// Tasks run on the thread that calls [`advance`](VirtualTimer::advance),
/// ordered by deadline and then by registration order. While a task runs,
/// [`now`](DelayScheduler::now) reports that task's deadline.
pub struct VirtualTimer {
    state: Mutex<VirtualState>,
}

impl VirtualTimer {
    pub fn new() -> Self {
        VirtualTimer {
            state: Mutex::new(VirtualState {
                now: Duration::ZERO,
                next_id: 1,
                queue: BTreeMap::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VirtualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move the clock forward, running every task that falls due
    pub fn advance(&self, by: Duration) {
        let target = self.now() + by;
        self.run_until(target);
    }

    /// Move the clock to `target`, running every task that falls due
    pub fn run_until(&self, target: Duration) {
        loop {
            let task = {
                let mut state = self.lock();
                let due = state
                    .queue
                    .keys()
                    .next()
                    .copied()
                    .filter(|(deadline, _)| *deadline <= target);
                match due {
                    Some(key) => {
                        state.now = state.now.max(key.0);
                        state.queue.remove(&key)
                    }
                    None => {
                        state.now = state.now.max(target);
                        None
                    }
                }
            };

            // The lock is released so tasks can schedule more work
            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }

    /// Run tasks until nothing is left, including ones scheduled on the way
    pub fn run_all(&self) {
        loop {
            let last = self.lock().queue.keys().next_back().map(|(deadline, _)| *deadline);
            match last {
                Some(deadline) => self.run_until(deadline),
                None => break,
            }
        }
    }

    /// Number of tasks still waiting
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }
}

impl Default for VirtualTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayScheduler for VirtualTimer {
    fn now(&self) -> Duration {
        self.lock().now
    }

    fn schedule_at(&self, deadline: Duration, task: Task) -> TimerId {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.queue.insert((deadline, id), task);
        TimerId(id)
    }

    fn cancel(&self, id: TimerId) {
        self.lock().queue.retain(|(_, key), _| *key != id.0);
    }
}
