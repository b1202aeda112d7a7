use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::{Rc, Weak},
    time::Duration,
};

use crate::{
    config::DrawConfig,
    host::{Host, TaskHandle},
};

/// How often the draw loop ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// A timer firing every interval.
    Fixed(Duration),
    /// The host's display refresh.
    DisplayRefresh,
}

impl Cadence {
    /// `None` and `Some(0)` follow the display refresh. The interval rounds
    /// up so ticks are never closer than requested.
    pub fn from_fps(fps: Option<u32>) -> Self {
        match fps {
            Some(fps) if fps > 0 => {
                Self::Fixed(Duration::from_nanos(
                    1_000_000_000u64.div_ceil(u64::from(fps)),
                ))
            }
            _ => Self::DisplayRefresh,
        }
    }
}

/// Lifecycle of a [`DrawBatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    /// Callbacks are running right now.
    Ticking,
    /// The next tick is queued on the host.
    Scheduled(TaskHandle),
}

type DrawCallback = Rc<RefCell<dyn FnMut()>>;

/// Repeatedly runs a list of draw callbacks, once each per tick, until
/// stopped.
///
/// Callbacks run in insertion order. A callback added while a tick is in
/// flight first runs on the following tick. At most one tick is queued on
/// the host at any time; redundant `start`/`stop` calls are ignored.
pub struct DrawBatch<H: Host + 'static> {
    inner: Rc<BatchInner<H>>,
}

struct BatchInner<H> {
    host: H,
    cadence: Cadence,
    callbacks: RefCell<Vec<DrawCallback>>,
    state: Cell<BatchState>,
    in_tick: Cell<bool>,
    ticks: Cell<u64>,
}

impl<H: Host + 'static> DrawBatch<H> {
    pub fn new(host: H, cadence: Cadence) -> Self {
        Self {
            inner: Rc::new(BatchInner {
                host,
                cadence,
                callbacks: RefCell::new(Vec::new()),
                state: Cell::new(BatchState::Idle),
                in_tick: Cell::new(false),
                ticks: Cell::new(0),
            }),
        }
    }

    pub fn from_config(host: H, config: &DrawConfig) -> Self {
        Self::new(host, Cadence::from_fps(config.fps))
    }

    pub fn cadence(&self) -> Cadence {
        self.inner.cadence
    }

    pub fn state(&self) -> BatchState {
        self.inner.state.get()
    }

    /// Number of completed ticks since construction.
    pub fn ticks(&self) -> u64 {
        self.inner.ticks.get()
    }

    pub fn len(&self) -> usize {
        self.inner.callbacks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a callback. There is no way to remove one.
    pub fn add<F: FnMut() + 'static>(&self, callback: F) {
        let callback: DrawCallback = Rc::new(RefCell::new(callback));
        self.inner.callbacks.borrow_mut().push(callback);
    }

    pub fn is_drawing(&self) -> bool {
        !matches!(self.inner.state.get(), BatchState::Idle)
    }

    /// Runs one tick immediately and keeps ticking until [`Self::stop`].
    pub fn start(&self) {
        let inner = &self.inner;
        match inner.state.get() {
            BatchState::Idle if inner.in_tick.get() => {
                // Stopped and restarted from inside a callback: let the
                // running tick reschedule instead of nesting another one.
                inner.state.set(BatchState::Ticking);
                tracing::debug!("draw loop resumed");
            }
            BatchState::Idle => {
                tracing::debug!(cadence = ?inner.cadence, "draw loop started");
                run_tick(inner);
            }
            state => tracing::debug!(?state, "draw loop already running, start ignored"),
        }
    }

    /// Cancels the queued tick. A tick in flight finishes but does not
    /// reschedule.
    pub fn stop(&self) {
        let inner = &self.inner;
        match inner.state.get() {
            BatchState::Scheduled(handle) => {
                inner.host.cancel(handle);
                inner.state.set(BatchState::Idle);
                tracing::debug!(ticks = inner.ticks.get(), "draw loop stopped");
            }
            BatchState::Ticking => {
                inner.state.set(BatchState::Idle);
                tracing::debug!(ticks = inner.ticks.get(), "draw loop stopped mid-tick");
            }
            BatchState::Idle => tracing::debug!("draw loop idle, stop ignored"),
        }
    }

    pub fn toggle(&self) {
        if self.is_drawing() {
            self.stop();
        } else {
            self.start();
        }
    }
}

/// Clears the in-tick flag when a tick ends, and parks the batch in `Idle`
/// if a callback panicked.
struct TickGuard<'a, H> {
    inner: &'a BatchInner<H>,
}

impl<H> Drop for TickGuard<'_, H> {
    fn drop(&mut self) {
        self.inner.in_tick.set(false);
        if std::thread::panicking() && self.inner.state.get() == BatchState::Ticking {
            self.inner.state.set(BatchState::Idle);
        }
    }
}

fn run_tick<H: Host + 'static>(inner: &Rc<BatchInner<H>>) {
    inner.state.set(BatchState::Ticking);
    inner.in_tick.set(true);
    let guard = TickGuard {
        inner: inner.as_ref(),
    };

    let count = inner.callbacks.borrow().len();
    for index in 0..count {
        let callback = Rc::clone(&inner.callbacks.borrow()[index]);
        (&mut *callback.borrow_mut())();
    }

    drop(guard);
    let ticks = inner.ticks.get() + 1;
    inner.ticks.set(ticks);
    tracing::trace!(ticks, callbacks = count, "tick complete");

    if inner.state.get() == BatchState::Ticking {
        schedule_next(inner);
    }
}

fn schedule_next<H: Host + 'static>(inner: &Rc<BatchInner<H>>) {
    let weak: Weak<BatchInner<H>> = Rc::downgrade(inner);
    let task = Box::new(move || {
        if let Some(inner) = weak.upgrade() {
            run_tick(&inner);
        }
    });

    let handle = match inner.cadence {
        Cadence::Fixed(interval) => inner.host.schedule_after(interval, task),
        Cadence::DisplayRefresh => inner.host.schedule_frame(task),
    };
    inner.state.set(BatchState::Scheduled(handle));
}

impl<H: Host + 'static> Drop for DrawBatch<H> {
    fn drop(&mut self) {
        if let BatchState::Scheduled(handle) = self.inner.state.get() {
            self.inner.host.cancel(handle);
        }
    }
}

impl<H: Host + 'static> fmt::Debug for DrawBatch<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawBatch")
            .field("cadence", &self.inner.cadence)
            .field("state", &self.inner.state.get())
            .field("callbacks", &self.len())
            .field("ticks", &self.ticks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use crate::host::{Clock, EventLoop, ManualClock};

    type TestHost = Rc<EventLoop<ManualClock>>;

    fn host() -> TestHost {
        Rc::new(EventLoop::new(ManualClock::new(), 60).unwrap())
    }

    fn log() -> Rc<RefCell<Vec<String>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn push(log: &Rc<RefCell<Vec<String>>>, label: &'static str) -> impl FnMut() + 'static {
        let log = log.clone();
        move || log.borrow_mut().push(label.to_string())
    }

    #[test]
    fn cadence_follows_fps() {
        assert_eq!(Cadence::from_fps(None), Cadence::DisplayRefresh);
        assert_eq!(Cadence::from_fps(Some(0)), Cadence::DisplayRefresh);
        assert_eq!(
            Cadence::from_fps(Some(10)),
            Cadence::Fixed(Duration::from_millis(100))
        );
    }

    #[test]
    fn fixed_intervals_round_up() {
        assert_eq!(
            Cadence::from_fps(Some(3)),
            Cadence::Fixed(Duration::from_nanos(333_333_334))
        );
        assert_eq!(
            Cadence::from_fps(Some(u32::MAX)),
            Cadence::Fixed(Duration::from_nanos(1))
        );
    }

    #[test]
    fn extreme_fps_still_advances_time() {
        let host = host();
        let batch = DrawBatch::new(host.clone(), Cadence::from_fps(Some(2_000_000_000)));
        batch.add(|| {});

        batch.start();
        host.run_for(Duration::from_micros(1));

        assert_eq!(batch.ticks(), 1_001);
        assert_eq!(host.now(), Duration::from_micros(1));
    }

    #[test]
    fn a_panicking_callback_leaves_the_batch_restartable() {
        let host = host();
        let batch = DrawBatch::new(host.clone(), Cadence::DisplayRefresh);
        let armed = Rc::new(Cell::new(true));
        let trip = armed.clone();
        batch.add(move || {
            if trip.replace(false) {
                panic!("draw failed");
            }
        });

        assert!(catch_unwind(AssertUnwindSafe(|| batch.start())).is_err());
        assert!(!batch.is_drawing());
        assert_eq!(host.pending(), 0);

        batch.start();
        assert!(batch.is_drawing());
        assert_eq!(batch.ticks(), 1);
        assert_eq!(host.pending(), 1);
    }

    #[test]
    fn start_runs_callbacks_immediately_in_insertion_order() {
        let host = host();
        let batch = DrawBatch::new(host.clone(), Cadence::DisplayRefresh);
        let calls = log();
        batch.add(push(&calls, "a"));
        batch.add(push(&calls, "b"));
        batch.add(push(&calls, "c"));

        batch.start();
        assert_eq!(*calls.borrow(), ["a", "b", "c"]);
        assert!(batch.is_drawing());
        assert_eq!(host.pending(), 1);

        host.run_for(Duration::from_millis(20));
        assert_eq!(*calls.borrow(), ["a", "b", "c", "a", "b", "c"]);
        assert_eq!(batch.ticks(), 2);
    }

    #[test]
    fn callbacks_added_mid_tick_wait_for_the_next_tick() {
        let host = host();
        let batch = Rc::new(DrawBatch::new(host.clone(), Cadence::DisplayRefresh));
        let calls = log();

        let weak = Rc::downgrade(&batch);
        let late = push(&calls, "late");
        let mut late = Some(late);
        let recorder = calls.clone();
        batch.add(move || {
            recorder.borrow_mut().push("first".to_string());
            if let (Some(batch), Some(callback)) = (weak.upgrade(), late.take()) {
                batch.add(callback);
            }
        });

        batch.start();
        assert_eq!(*calls.borrow(), ["first"]);

        host.run_for(Duration::from_millis(20));
        assert_eq!(*calls.borrow(), ["first", "first", "late"]);
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn fixed_rate_ticks_are_spaced_by_the_interval() {
        let host = host();
        let batch = DrawBatch::new(host.clone(), Cadence::from_fps(Some(10)));
        let times = Rc::new(RefCell::new(Vec::new()));

        let clock = host.clock().clone();
        let sink = times.clone();
        batch.add(move || sink.borrow_mut().push(clock.now()));

        batch.start();
        host.run_for(Duration::from_millis(350));

        let times = times.borrow();
        assert_eq!(times.len(), 4);
        assert!(times
            .windows(2)
            .all(|pair| pair[1] - pair[0] >= Duration::from_millis(100)));
    }

    #[test]
    fn refresh_cadence_ticks_once_per_frame() {
        let host = host();
        let batch = DrawBatch::new(host.clone(), Cadence::DisplayRefresh);
        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        batch.add(move || counter.set(counter.get() + 1));

        batch.start();
        host.run_for(Duration::from_secs(1));

        // The immediate tick plus one per refresh boundary.
        assert_eq!(count.get(), 61);
    }

    #[test]
    fn stop_cancels_the_pending_tick() {
        let host = host();
        let batch = DrawBatch::new(host.clone(), Cadence::DisplayRefresh);
        let calls = log();
        batch.add(push(&calls, "tick"));

        batch.start();
        batch.stop();
        assert!(!batch.is_drawing());
        assert_eq!(host.pending(), 0);

        host.run_for(Duration::from_secs(1));
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn redundant_transitions_are_ignored() {
        let host = host();
        let batch = DrawBatch::new(host.clone(), Cadence::from_fps(Some(30)));
        let calls = log();
        batch.add(push(&calls, "tick"));

        batch.stop();
        assert_eq!(batch.state(), BatchState::Idle);

        batch.start();
        batch.start();
        assert_eq!(calls.borrow().len(), 1);
        assert_eq!(host.pending(), 1);

        batch.stop();
        assert_eq!(host.pending(), 0);
        host.run_for(Duration::from_secs(1));
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn toggle_alternates_drawing() {
        let host = host();
        let batch = DrawBatch::new(host.clone(), Cadence::DisplayRefresh);
        assert!(!batch.is_drawing());

        let mut expected = true;
        for _ in 0..6 {
            batch.toggle();
            assert_eq!(batch.is_drawing(), expected);
            expected = !expected;
        }
        assert_eq!(host.pending(), 0);
    }

    #[test]
    fn stop_from_inside_a_callback_ends_the_loop() {
        let host = host();
        let batch = Rc::new(DrawBatch::new(host.clone(), Cadence::DisplayRefresh));
        let weak = Rc::downgrade(&batch);
        batch.add(move || {
            if let Some(batch) = weak.upgrade() {
                if batch.ticks() == 2 {
                    batch.stop();
                }
            }
        });

        batch.start();
        host.run_for(Duration::from_secs(1));

        assert_eq!(batch.ticks(), 3);
        assert!(!batch.is_drawing());
        assert_eq!(host.pending(), 0);
    }

    #[test]
    fn restart_inside_a_callback_does_not_nest_ticks() {
        let host = host();
        let batch = Rc::new(DrawBatch::new(host.clone(), Cadence::DisplayRefresh));
        let weak = Rc::downgrade(&batch);
        batch.add(move || {
            if let Some(batch) = weak.upgrade() {
                batch.stop();
                batch.start();
            }
        });

        batch.start();
        assert_eq!(batch.ticks(), 1);
        assert!(batch.is_drawing());
        assert_eq!(host.pending(), 1);
    }

    #[test]
    fn dropping_the_batch_cancels_its_tick() {
        let host = host();
        let batch = DrawBatch::new(host.clone(), Cadence::DisplayRefresh);
        batch.start();
        assert_eq!(host.pending(), 1);

        drop(batch);
        assert_eq!(host.pending(), 0);
    }
}
