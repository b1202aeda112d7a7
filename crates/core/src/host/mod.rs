//! Timing primitives the draw loop runs on.
//!
//! [`Host`] is the seam: one-shot timers and one-shot frame callbacks, each
//! returning a handle that cancels it. [`EventLoop`] is a single-threaded,
//! cooperative implementation driven by a [`Clock`].

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, HashMap},
    fmt,
    rc::Rc,
    time::{Duration, Instant},
};

use crate::{Result, ScopeError};

/// Highest rate a host can tick at: one tick per nanosecond.
pub const MAX_RATE_HZ: u32 = 1_000_000_000;

/// Validates a tick or refresh rate, returning its period.
pub fn rate_interval(rate_hz: u32) -> Result<Duration> {
    if rate_hz == 0 || rate_hz > MAX_RATE_HZ {
        return Err(ScopeError::config(format!(
            "rate {rate_hz} Hz must lie between 1 and {MAX_RATE_HZ}"
        )));
    }
    Ok(Duration::from_nanos(1_000_000_000 / u64::from(rate_hz)))
}

/// Work queued on a host. Runs at most once.
pub type Task = Box<dyn FnOnce()>;

/// Identifies a pending task so it can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

pub trait Host {
    /// Runs `task` once, no sooner than `delay` from now.
    fn schedule_after(&self, delay: Duration, task: Task) -> TaskHandle;

    /// Runs `task` once at the next display refresh.
    fn schedule_frame(&self, task: Task) -> TaskHandle;

    /// Drops a pending task. Unknown or already-run handles are ignored.
    fn cancel(&self, handle: TaskHandle);
}

impl<H: Host + ?Sized> Host for Rc<H> {
    fn schedule_after(&self, delay: Duration, task: Task) -> TaskHandle {
        (**self).schedule_after(delay, task)
    }

    fn schedule_frame(&self, task: Task) -> TaskHandle {
        (**self).schedule_frame(task)
    }

    fn cancel(&self, handle: TaskHandle) {
        (**self).cancel(handle)
    }
}

/// Monotonic time source, measured from an arbitrary origin.
pub trait Clock {
    fn now(&self) -> Duration;

    /// Blocks (or pretends to) until `now() >= deadline`.
    fn sleep_until(&self, deadline: Duration);
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep_until(&self, deadline: Duration) {
        let now = self.now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }
}

/// Virtual clock that jumps straight to every deadline.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, delta: Duration) {
        self.now.set(self.now.get() + delta);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep_until(&self, deadline: Duration) {
        if deadline > self.now.get() {
            self.now.set(deadline);
        }
    }
}

#[derive(Default)]
struct Queue {
    next_id: u64,
    tasks: BTreeMap<(Duration, u64), Task>,
    deadlines: HashMap<u64, Duration>,
}

/// Cooperative single-threaded host.
///
/// Timer tasks become due at `now + delay`; frame tasks at the next multiple
/// of the refresh interval strictly after `now`. Due tasks run in deadline
/// order, ties in scheduling order. Nothing runs outside [`EventLoop::run_until`].
pub struct EventLoop<C: Clock> {
    clock: C,
    frame_interval: Duration,
    queue: RefCell<Queue>,
}

impl<C: Clock> EventLoop<C> {
    /// Fails if `refresh_rate_hz` is zero or above [`MAX_RATE_HZ`].
    pub fn new(clock: C, refresh_rate_hz: u32) -> Result<Self> {
        Ok(Self {
            clock,
            frame_interval: rate_interval(refresh_rate_hz)?,
            queue: RefCell::new(Queue::default()),
        })
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.borrow().tasks.len()
    }

    /// Runs every task due at or before `deadline`, including tasks those
    /// tasks schedule, then waits out the remainder. Returns how many ran.
    pub fn run_until(&self, deadline: Duration) -> usize {
        let mut ran = 0;
        loop {
            let next = {
                let mut queue = self.queue.borrow_mut();
                let first = queue.tasks.keys().next().copied();
                match first {
                    Some((due, id)) if due <= deadline => {
                        queue.deadlines.remove(&id);
                        queue.tasks.remove(&(due, id)).map(|task| (due, task))
                    }
                    _ => None,
                }
            };

            let Some((due, task)) = next else {
                break;
            };
            self.clock.sleep_until(due);
            task();
            ran += 1;
        }

        self.clock.sleep_until(deadline);
        ran
    }

    pub fn run_for(&self, duration: Duration) -> usize {
        self.run_until(self.now() + duration)
    }

    fn enqueue(&self, due: Duration, task: Task) -> TaskHandle {
        let mut queue = self.queue.borrow_mut();
        let id = queue.next_id;
        queue.next_id += 1;
        queue.tasks.insert((due, id), task);
        queue.deadlines.insert(id, due);
        TaskHandle(id)
    }

    fn next_frame_after(&self, now: Duration) -> Duration {
        let interval = self.frame_interval.as_nanos();
        let frames = now.as_nanos() / interval + 1;
        let nanos = frames * interval;
        Duration::new(
            (nanos / 1_000_000_000) as u64,
            (nanos % 1_000_000_000) as u32,
        )
    }
}

impl<C: Clock> Host for EventLoop<C> {
    fn schedule_after(&self, delay: Duration, task: Task) -> TaskHandle {
        self.enqueue(self.now() + delay, task)
    }

    fn schedule_frame(&self, task: Task) -> TaskHandle {
        let due = self.next_frame_after(self.now());
        self.enqueue(due, task)
    }

    fn cancel(&self, handle: TaskHandle) {
        let mut queue = self.queue.borrow_mut();
        if let Some(due) = queue.deadlines.remove(&handle.0) {
            queue.tasks.remove(&(due, handle.0));
        }
    }
}

impl<C: Clock> fmt::Debug for EventLoop<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("now", &self.now())
            .field("frame_interval", &self.frame_interval)
            .field("pending", &self.pending())
            .finish()
    }
}
