//! Background render thread.
//!
//! `RenderThread` owns one worker thread that sleeps until a render is
//! requested, runs the render callback, and goes back to sleep. The host
//! drives it through `start_render`/`stop_render`; the callback polls
//! `RenderControl::is_stop_requested` between sample passes.
//!
//! State transitions:
//!
//! ```text
//! Initial --start_thread--> Idle <--stop_render / callback returns-- Rendering
//!                            |  --start_render------------------------->  |
//!                            +----------stop_thread----> Terminated <-----+
//! Terminated --(worker joined)--> Initial
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

/// Requested state of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Initial,
    Idle,
    Rendering,
    Terminated,
}

/// The function run on the worker for each requested render.
pub type RenderCallback = Arc<dyn Fn(&RenderControl) + Send + Sync>;

/// State shared between the host-facing `RenderThread` and its worker.
///
/// The render callback receives a reference to this and uses it to poll for
/// cancellation and pause requests.
pub struct RenderControl {
    /// Guarded by its mutex; the worker holds it for the whole callback.
    requested_state: Mutex<RenderState>,
    state_changed: Condvar,
    /// Cleared by `stop_render`, re-armed by `is_stop_requested`.
    enable_render: AtomicBool,
    /// Latched by the worker once it observes `enable_render` cleared.
    stop_requested: AtomicBool,
    pause_render: AtomicBool,
    pause_dirty: AtomicBool,
    rendering: AtomicBool,
    framebuffer: Mutex<()>,
}

impl RenderControl {
    pub(crate) fn new() -> Self {
        Self {
            requested_state: Mutex::new(RenderState::Initial),
            state_changed: Condvar::new(),
            enable_render: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            pause_render: AtomicBool::new(false),
            pause_dirty: AtomicBool::new(false),
            rendering: AtomicBool::new(false),
            framebuffer: Mutex::new(()),
        }
    }

    /// True once a stop has been requested during the current render.
    ///
    /// Only call this from inside the render callback. `stop_render` cannot
    /// take the state lock to signal cancellation because the worker holds it
    /// for the whole callback, so it clears the `enable_render` flag instead.
    /// This test-and-set re-arms the flag and latches the stop into
    /// `stop_requested`, which stays set until the callback returns. It is a
    /// single-writer/single-reader handshake between `stop_render` and the
    /// worker, not a general-purpose primitive.
    pub fn is_stop_requested(&self) -> bool {
        if !self.enable_render.swap(true, Ordering::AcqRel) {
            self.stop_requested.store(true, Ordering::Relaxed);
        }
        self.stop_requested.load(Ordering::Relaxed)
    }

    /// True while the host has paused rendering.
    pub fn is_pause_requested(&self) -> bool {
        self.pause_render.load(Ordering::Acquire)
    }

    /// True once after every pause or resume; reading it resets it.
    pub fn is_pause_dirty(&self) -> bool {
        self.pause_dirty.swap(false, Ordering::AcqRel)
    }

    /// True from `start_render` until the callback returns or the render is stopped.
    pub fn is_rendering(&self) -> bool {
        self.rendering.load(Ordering::Acquire)
    }

    /// Exclusive access to the framebuffer, to avoid tearing while it is
    /// copied elsewhere. Release it promptly.
    pub fn lock_framebuffer(&self) -> MutexGuard<'_, ()> {
        self.framebuffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> MutexGuard<'_, RenderState> {
        self.requested_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// A restartable worker thread that runs a render callback on request.
pub struct RenderThread {
    control: Arc<RenderControl>,
    callback: Mutex<RenderCallback>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RenderThread {
    /// Create a render thread. The worker is not started.
    pub fn new() -> Self {
        Self {
            control: Arc::new(RenderControl::new()),
            callback: Mutex::new(Arc::new(default_render_callback)),
            worker: Mutex::new(None),
        }
    }

    /// Set the function run for each render. Takes effect at the next
    /// `start_thread`.
    pub fn set_render_callback<F>(&self, callback: F)
    where
        F: Fn(&RenderControl) + Send + Sync + 'static,
    {
        *self.callback.lock().unwrap_or_else(PoisonError::into_inner) = Arc::new(callback);
    }

    /// Spawn the worker. Calling this while the worker runs is a usage
    /// error: it is logged and ignored.
    pub fn start_thread(&self) {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            log::error!("start_thread() called while render thread is already running");
            return;
        }

        *self.control.lock_state() = RenderState::Idle;

        let control = self.control.clone();
        let callback = self
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match thread::Builder::new()
            .name("ember-render".to_string())
            .spawn(move || render_loop(&control, &callback))
        {
            Ok(handle) => {
                log::debug!("Render thread started");
                *worker = Some(handle);
            }
            Err(err) => {
                log::error!("Failed to spawn render thread: {}", err);
                *self.control.lock_state() = RenderState::Initial;
            }
        }
    }

    /// Terminate the worker and block until it exits. No-op if not running.
    ///
    /// Afterwards the thread can be started again.
    pub fn stop_thread(&self) {
        let Some(handle) = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        self.control.enable_render.store(false, Ordering::Release);
        {
            let mut state = self.control.lock_state();
            *state = RenderState::Terminated;
            self.control.rendering.store(false, Ordering::Release);
            self.control.state_changed.notify_one();
        }

        if handle.join().is_err() {
            log::error!("Render thread panicked");
        }
        *self.control.lock_state() = RenderState::Initial;
        log::debug!("Render thread stopped");
    }

    /// True between `start_thread` and `stop_thread`.
    pub fn is_thread_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Ask the worker to run the render callback. No-op if already rendering.
    ///
    /// Must not race with `stop_render` or with itself.
    pub fn start_render(&self) {
        if self.is_rendering() {
            return;
        }
        if !self.is_thread_running() {
            log::error!("start_render() called before start_thread()");
            return;
        }

        self.control.enable_render.store(true, Ordering::Release);
        let mut state = self.control.lock_state();
        *state = RenderState::Rendering;
        self.control.rendering.store(true, Ordering::Release);
        self.control.state_changed.notify_one();
    }

    /// Cancel the current render. No-op if not rendering. Safe to call from
    /// any thread.
    ///
    /// Cancellation is cooperative: the callback notices at its next
    /// `is_stop_requested` check, which bounds the latency to one sample pass.
    pub fn stop_render(&self) {
        if !self.is_rendering() {
            return;
        }

        self.control.enable_render.store(false, Ordering::Release);
        let mut state = self.control.lock_state();
        *state = RenderState::Idle;
        self.control.rendering.store(false, Ordering::Release);
    }

    /// True from `start_render` until the callback returns or the render is stopped.
    pub fn is_rendering(&self) -> bool {
        self.control.is_rendering()
    }

    /// Pause the render loop between passes.
    pub fn pause_render(&self) {
        self.control.pause_dirty.store(true, Ordering::Release);
        self.control.pause_render.store(true, Ordering::Release);
    }

    /// Resume a paused render.
    pub fn resume_render(&self) {
        self.control.pause_dirty.store(true, Ordering::Release);
        self.control.pause_render.store(false, Ordering::Release);
    }

    pub fn is_pause_requested(&self) -> bool {
        self.control.is_pause_requested()
    }

    pub fn is_pause_dirty(&self) -> bool {
        self.control.is_pause_dirty()
    }

    /// Exclusive access to the framebuffer. See `RenderControl::lock_framebuffer`.
    pub fn lock_framebuffer(&self) -> MutexGuard<'_, ()> {
        self.control.lock_framebuffer()
    }
}

impl Default for RenderThread {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        self.stop_thread();
    }
}

fn default_render_callback(_control: &RenderControl) {
    log::error!("start_render() called without a render callback set");
}

/// Worker body: wait for a request, run it, repeat until terminated.
fn render_loop(control: &RenderControl, callback: &RenderCallback) {
    let mut state = control.lock_state();
    loop {
        state = control
            .state_changed
            .wait_while(state, |s| matches!(*s, RenderState::Initial | RenderState::Idle))
            .unwrap_or_else(PoisonError::into_inner);

        match *state {
            RenderState::Rendering => {
                callback(control);
                control.stop_requested.store(false, Ordering::Relaxed);
                control.rendering.store(false, Ordering::Release);
                *state = RenderState::Idle;
            }
            RenderState::Terminated => break,
            RenderState::Initial | RenderState::Idle => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    fn wait_until(cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        cond()
    }

    /// Callback that spins until stopped, reporting what it saw.
    fn spin_until_stopped(
        thread: &RenderThread,
    ) -> (mpsc::Receiver<()>, Arc<Mutex<Vec<(bool, bool)>>>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let entered_tx = Mutex::new(entered_tx);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = seen.clone();

        thread.set_render_callback(move |control| {
            let first = control.is_stop_requested();
            let _ = entered_tx.lock().unwrap().send(());
            while !control.is_stop_requested() {
                thread::sleep(Duration::from_millis(1));
            }
            let sticky = control.is_stop_requested();
            record.lock().unwrap().push((first, sticky));
        });

        (entered_rx, seen)
    }

    #[test]
    fn test_thread_restartable() {
        let thread = RenderThread::new();
        assert!(!thread.is_thread_running());

        for _ in 0..3 {
            thread.start_thread();
            assert!(thread.is_thread_running());
            thread.stop_thread();
            assert!(!thread.is_thread_running());
            assert_eq!(*thread.control.lock_state(), RenderState::Initial);
        }

        // Stopping a stopped thread is a no-op
        thread.stop_thread();
    }

    #[test]
    fn test_double_start_is_ignored() {
        let thread = RenderThread::new();
        thread.start_thread();
        thread.start_thread();
        assert!(thread.is_thread_running());
        thread.stop_thread();
        assert!(!thread.is_thread_running());
    }

    #[test]
    fn test_start_then_stop_render_does_not_deadlock() {
        let thread = RenderThread::new();
        let (_entered, _seen) = spin_until_stopped(&thread);
        thread.start_thread();

        for _ in 0..20 {
            thread.start_render();
            thread.stop_render();
            assert!(!thread.is_rendering());
        }

        thread.stop_thread();
    }

    #[test]
    fn test_stop_request_is_sticky_and_resets() {
        let thread = RenderThread::new();
        let (entered, seen) = spin_until_stopped(&thread);
        thread.start_thread();

        for _ in 0..2 {
            thread.start_render();
            entered.recv_timeout(Duration::from_secs(10)).unwrap();
            assert!(thread.is_rendering());
            thread.stop_render();
            assert!(!thread.is_rendering());
        }

        thread.stop_thread();
        assert_eq!(*seen.lock().unwrap(), vec![(false, true), (false, true)]);
    }

    #[test]
    fn test_stop_thread_cancels_render() {
        let thread = RenderThread::new();
        let (entered, seen) = spin_until_stopped(&thread);
        thread.start_thread();
        thread.start_render();
        entered.recv_timeout(Duration::from_secs(10)).unwrap();

        thread.stop_thread();
        assert!(!thread.is_rendering());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_callback_completion_clears_rendering() {
        let thread = RenderThread::new();
        let runs = Arc::new(Mutex::new(0));
        let counter = runs.clone();
        thread.set_render_callback(move |_control| {
            *counter.lock().unwrap() += 1;
        });
        thread.start_thread();

        thread.start_render();
        assert!(wait_until(|| !thread.is_rendering()));
        thread.start_render();
        assert!(wait_until(|| !thread.is_rendering()));

        thread.stop_thread();
        assert_eq!(*runs.lock().unwrap(), 2);
    }

    #[test]
    fn test_default_callback_is_harmless() {
        let thread = RenderThread::new();
        thread.start_thread();
        thread.start_render();
        assert!(wait_until(|| !thread.is_rendering()));
        thread.stop_thread();
    }

    #[test]
    fn test_start_render_requires_thread() {
        let thread = RenderThread::new();
        thread.start_render();
        assert!(!thread.is_rendering());
    }

    #[test]
    fn test_pause_flags() {
        let thread = RenderThread::new();
        assert!(!thread.is_pause_requested());
        assert!(!thread.is_pause_dirty());

        thread.pause_render();
        assert!(thread.is_pause_requested());
        assert!(thread.is_pause_dirty());
        assert!(!thread.is_pause_dirty());

        thread.resume_render();
        assert!(!thread.is_pause_requested());
        assert!(thread.is_pause_dirty());
    }

    #[test]
    fn test_lock_framebuffer_excludes() {
        let thread = Arc::new(RenderThread::new());
        let guard = thread.lock_framebuffer();

        let other = thread.clone();
        let (tx, rx) = mpsc::channel();
        let reader = thread::spawn(move || {
            let _guard = other.lock_framebuffer();
            tx.send(()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        drop(guard);
        rx.recv_timeout(Duration::from_secs(10)).unwrap();
        reader.join().unwrap();
    }
}
