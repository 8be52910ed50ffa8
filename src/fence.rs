//! Fence tokens and CPU-side waiting on device completion.
//!
//! A [`FenceToken`] names one unit of submitted device work. Tokens are issued
//! by [`FenceSynchronizer::submit`] in strictly increasing order, and the device
//! reports retirement through a [`FenceTimeline`]: a monotonic "completed"
//! counter plus a blocking wait on it.
//!
//! ```text
//! CPU:    submit() -> 1    submit() -> 2    submit() -> 3
//!                 \                \                \
//! Device:          [execute 1] signal(1)  [execute 2] signal(2) ...
//!
//! completed():   0 ........ 1 ............. 2 ........
//! ```
//!
//! The timeline is the seam between the engine and a concrete device binding:
//! [`CpuTimeline`] implements it with a condition variable, the wgpu backend
//! implements it by polling the device.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Strictly increasing identifier of a submission.
///
/// The value `0` is reserved for "never submitted", so a slot whose token is
/// [`FenceToken::NONE`] never has to be waited on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FenceToken(u64);

impl FenceToken {
    /// Token of a slot that has never been submitted.
    pub const NONE: Self = Self(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for FenceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Device-side completion counter.
///
/// Implementations must keep [`completed`](Self::completed) monotonic
/// non-decreasing, and [`wait_until`](Self::wait_until) must park the calling
/// thread rather than spin.
pub trait FenceTimeline: Send + Sync + fmt::Debug {
    /// Most recently retired token.
    fn completed(&self) -> FenceToken;

    /// Block until `completed() >= token`. No timeout: a device that never
    /// retires hangs the caller.
    fn wait_until(&self, token: FenceToken);

    /// Like [`wait_until`](Self::wait_until) but gives up after `timeout`.
    ///
    /// Returns `true` if the token retired.
    fn wait_until_timeout(&self, token: FenceToken, timeout: Duration) -> bool;
}

/// Condition-variable backed timeline.
///
/// Whoever plays the device calls [`signal`](Self::signal) as work retires.
#[derive(Debug, Default)]
pub struct CpuTimeline {
    completed: Mutex<u64>,
    retired: Condvar,
}

impl CpuTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark every token up to and including `token` as retired.
    ///
    /// Signals that would move the counter backwards are ignored.
    pub fn signal(&self, token: FenceToken) {
        let mut completed = self.completed.lock();
        if token.0 > *completed {
            *completed = token.0;
            self.retired.notify_all();
        }
    }
}

impl FenceTimeline for CpuTimeline {
    fn completed(&self) -> FenceToken {
        FenceToken(*self.completed.lock())
    }

    fn wait_until(&self, token: FenceToken) {
        let mut completed = self.completed.lock();
        while *completed < token.0 {
            self.retired.wait(&mut completed);
        }
    }

    fn wait_until_timeout(&self, token: FenceToken, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut completed = self.completed.lock();
        while *completed < token.0 {
            if self.retired.wait_until(&mut completed, deadline).timed_out() {
                return *completed >= token.0;
            }
        }
        true
    }
}

/// Issues fence tokens and waits for their retirement.
///
/// # Thread Safety
///
/// Token issue is atomic, but the frame loop that uses this type is expected to
/// run on a single thread.
#[derive(Debug)]
pub struct FenceSynchronizer {
    last_issued: AtomicU64,
    timeline: Arc<dyn FenceTimeline>,
    /// Number of waits that actually had to block.
    stalls: AtomicU64,
}

impl FenceSynchronizer {
    pub fn new(timeline: Arc<dyn FenceTimeline>) -> Self {
        Self {
            last_issued: AtomicU64::new(0),
            timeline,
            stalls: AtomicU64::new(0),
        }
    }

    /// Issue the token for the work about to be submitted.
    ///
    /// # Panics
    ///
    /// Panics if the 64-bit counter is exhausted.
    pub fn submit(&self) -> FenceToken {
        let previous = self.last_issued.fetch_add(1, Ordering::AcqRel);
        assert!(previous < u64::MAX, "fence token counter exhausted");
        FenceToken(previous + 1)
    }

    /// Last token returned by [`submit`](Self::submit), or [`FenceToken::NONE`].
    pub fn last_issued(&self) -> FenceToken {
        FenceToken(self.last_issued.load(Ordering::Acquire))
    }

    /// Most recently retired token as reported by the device.
    pub fn completed_token(&self) -> FenceToken {
        self.timeline.completed()
    }

    /// Whether `token` has retired. [`FenceToken::NONE`] always has.
    pub fn is_retired(&self, token: FenceToken) -> bool {
        token.is_none() || self.completed_token() >= token
    }

    /// Block until `token` has retired.
    ///
    /// Returns `true` if the call had to wait, `false` if the token was already
    /// retired and the timeline was never touched.
    pub fn wait_until_retired(&self, token: FenceToken) -> bool {
        if self.is_retired(token) {
            return false;
        }

        self.stalls.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "Waiting for fence {} (completed {})",
            token,
            self.completed_token()
        );
        self.timeline.wait_until(token);
        true
    }

    /// Bounded variant of [`wait_until_retired`](Self::wait_until_retired) for
    /// liveness probes. Returns `true` if the token retired in time.
    pub fn wait_until_retired_timeout(&self, token: FenceToken, timeout: Duration) -> bool {
        if self.is_retired(token) {
            return true;
        }
        self.stalls.fetch_add(1, Ordering::Relaxed);
        self.timeline.wait_until_timeout(token, timeout)
    }

    /// Number of waits that found their token unretired.
    pub fn stall_count(&self) -> u64 {
        self.stalls.load(Ordering::Relaxed)
    }

    pub fn timeline(&self) -> &Arc<dyn FenceTimeline> {
        &self.timeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    /// Timeline that records waits instead of blocking.
    #[derive(Debug, Default)]
    struct RecordingTimeline {
        completed: AtomicU64,
        waits: Mutex<Vec<FenceToken>>,
    }

    impl FenceTimeline for RecordingTimeline {
        fn completed(&self) -> FenceToken {
            FenceToken(self.completed.load(Ordering::Acquire))
        }

        fn wait_until(&self, token: FenceToken) {
            self.waits.lock().push(token);
        }

        fn wait_until_timeout(&self, token: FenceToken, _timeout: Duration) -> bool {
            self.waits.lock().push(token);
            false
        }
    }

    #[test]
    fn test_tokens_strictly_increase() {
        let fence = FenceSynchronizer::new(Arc::new(CpuTimeline::new()));
        assert_eq!(fence.last_issued(), FenceToken::NONE);

        let mut previous = FenceToken::NONE;
        for _ in 0..100 {
            let token = fence.submit();
            assert!(token > previous);
            previous = token;
        }
        assert_eq!(fence.last_issued().value(), 100);
    }

    #[test]
    fn test_signal_is_monotonic() {
        let timeline = CpuTimeline::new();
        timeline.signal(FenceToken::new(5));
        assert_eq!(timeline.completed().value(), 5);

        timeline.signal(FenceToken::new(3));
        assert_eq!(timeline.completed().value(), 5);

        timeline.signal(FenceToken::new(6));
        assert_eq!(timeline.completed().value(), 6);
    }

    #[test]
    fn test_none_token_is_always_retired() {
        let timeline = Arc::new(RecordingTimeline::default());
        let fence = FenceSynchronizer::new(timeline.clone());

        assert!(fence.is_retired(FenceToken::NONE));
        assert!(!fence.wait_until_retired(FenceToken::NONE));
        assert!(timeline.waits.lock().is_empty());
    }

    #[test]
    fn test_retired_token_does_not_wait() {
        let timeline = Arc::new(RecordingTimeline::default());
        timeline.completed.store(4, Ordering::Release);
        let fence = FenceSynchronizer::new(timeline.clone());

        assert!(!fence.wait_until_retired(FenceToken::new(4)));
        assert!(timeline.waits.lock().is_empty());
        assert_eq!(fence.stall_count(), 0);
    }

    #[test]
    fn test_unretired_token_waits() {
        let timeline = Arc::new(RecordingTimeline::default());
        timeline.completed.store(1, Ordering::Release);
        let fence = FenceSynchronizer::new(timeline.clone());

        assert!(fence.wait_until_retired(FenceToken::new(2)));
        assert_eq!(*timeline.waits.lock(), vec![FenceToken::new(2)]);
        assert_eq!(fence.stall_count(), 1);
    }

    #[test]
    fn test_wait_blocks_until_signaled() {
        let timeline = Arc::new(CpuTimeline::new());
        let fence = Arc::new(FenceSynchronizer::new(timeline.clone()));
        let token = fence.submit();
        let done = Arc::new(AtomicBool::new(false));

        let waiter = {
            let fence = fence.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                fence.wait_until_retired(token);
                done.store(true, Ordering::Release);
            })
        };

        std::thread::sleep(Duration::from_millis(30));
        assert!(!done.load(Ordering::Acquire));

        timeline.signal(token);
        waiter.join().unwrap();
        assert!(done.load(Ordering::Acquire));
        assert!(fence.is_retired(token));
    }

    #[test]
    fn test_wait_timeout_elapses() {
        let timeline = CpuTimeline::new();
        assert!(!timeline.wait_until_timeout(FenceToken::new(1), Duration::from_millis(10)));

        timeline.signal(FenceToken::new(1));
        assert!(timeline.wait_until_timeout(FenceToken::new(1), Duration::from_millis(10)));
    }

    #[test]
    fn test_completed_is_non_decreasing_across_calls() {
        let timeline = Arc::new(CpuTimeline::new());
        let fence = FenceSynchronizer::new(timeline.clone());

        let mut last = fence.completed_token();
        for value in [1, 1, 3, 2, 7, 4] {
            timeline.signal(FenceToken::new(value));
            let now = fence.completed_token();
            assert!(now >= last);
            last = now;
        }
        assert_eq!(last.value(), 7);
    }
}
