//! Waiter - Poll a remote resource until it reaches a target state
//!
//! Control-plane APIs complete many operations asynchronously: the call
//! returns immediately and the resource transitions through intermediate
//! states (`pending`, `deleting`, ...) before settling. [`wait`] is the one
//! polling loop shared by every resource that needs to observe such a
//! transition, parameterized over the fetch operation, the target and
//! failure state sets, and timing.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::provider::ProviderError;

/// Error returned by a fetch operation
#[derive(Debug, Error)]
pub enum FetchError {
    /// The resource does not exist remotely. This is a semantic signal, not
    /// a failure: a delete-wait treats it as success.
    #[error("resource not found")]
    NotFound,

    /// The fetch itself failed (network blip, throttling, service error).
    /// Retried up to the spec's transient-error budget.
    #[error(transparent)]
    Remote(#[from] ProviderError),
}

/// Parameters of one wait call
///
/// `S` is the provider-specific state type (e.g., an SDK state enum).
/// A spec is immutable for the duration of the wait.
#[derive(Debug, Clone)]
pub struct WaitSpec<S> {
    /// States considered a successful terminal outcome
    pub target: Vec<S>,
    /// States considered a fatal terminal outcome, never retried
    pub failure: Vec<S>,
    /// Upper bound on the whole wait
    pub timeout: Duration,
    /// Base delay between polls
    pub poll_interval: Duration,
    /// Multiplier applied to the delay after each poll (1.0 = fixed interval)
    pub backoff: f64,
    /// Cap on the delay once backoff is applied
    pub max_interval: Duration,
    /// How many consecutive transient fetch errors are tolerated before the
    /// wait gives up
    pub max_transient_errors: u32,
    /// Treat a not-found fetch result as reaching the target (delete-waits)
    pub accept_absent: bool,
}

impl<S> WaitSpec<S> {
    /// Fixed-interval spec with no failure states
    pub fn new(target: Vec<S>, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            target,
            failure: Vec::new(),
            timeout,
            poll_interval,
            backoff: 1.0,
            max_interval: poll_interval,
            max_transient_errors: 3,
            accept_absent: false,
        }
    }

    pub fn with_failure_states(mut self, failure: Vec<S>) -> Self {
        self.failure = failure;
        self
    }

    /// Grow the poll interval by `factor` after each poll, capped at `max`.
    /// Factors below 1.0 are clamped to 1.0.
    pub fn with_backoff(mut self, factor: f64, max: Duration) -> Self {
        self.backoff = factor.max(1.0);
        self.max_interval = max;
        self
    }

    pub fn with_transient_error_budget(mut self, budget: u32) -> Self {
        self.max_transient_errors = budget;
        self
    }

    /// Count absence of the resource as success. Used when waiting for a
    /// deletion to finish.
    pub fn accept_absent(mut self) -> Self {
        self.accept_absent = true;
        self
    }
}

/// Terminal outcome of a failed wait
#[derive(Debug, Error)]
pub enum WaitError<S: fmt::Debug> {
    /// The resource vanished while the wait did not accept absence
    #[error("resource not found")]
    NotFound,

    /// The resource reached a state in the failure set
    #[error("resource entered failure state {state:?} after {elapsed:?}")]
    FailureState { state: S, elapsed: Duration },

    /// Consecutive fetch errors exhausted the transient-error budget
    #[error("giving up after {attempts} consecutive fetch errors: {source}")]
    FetchFailed {
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    /// No terminal state was reached within the timeout
    #[error("timeout waiting for target state: last observed {last:?} after {elapsed:?}")]
    Timeout { last: Option<S>, elapsed: Duration },

    /// The enclosing operation was cancelled
    #[error("wait cancelled after {elapsed:?} (last observed {last:?})")]
    Cancelled { last: Option<S>, elapsed: Duration },
}

/// Poll `fetch` until the resource reaches a target state
///
/// `fetch` returns the current snapshot together with its state, or a
/// [`FetchError`]. The loop:
///
/// 1. fetches immediately;
/// 2. returns `Ok(Some(snapshot))` when the state is in `spec.target`,
///    `Ok(None)` when the resource is absent and the spec accepts absence;
/// 3. returns [`WaitError::FailureState`] when the state is in
///    `spec.failure`, without retrying;
/// 4. otherwise sleeps for the current interval and polls again.
///
/// Timing policy: polls are scheduled one interval apart starting from the
/// first fetch, and the wait gives up once the next poll would land on or
/// past the deadline. A wait with `timeout = n * poll_interval` and no
/// backoff therefore performs exactly `n` fetches.
///
/// Cancelling `cancel` aborts the wait promptly, both between polls and
/// while a fetch is in flight, and is reported as [`WaitError::Cancelled`],
/// never as a timeout.
pub async fn wait<T, S, F, Fut>(
    spec: &WaitSpec<S>,
    cancel: &CancellationToken,
    mut fetch: F,
) -> Result<Option<T>, WaitError<S>>
where
    S: PartialEq + Clone + fmt::Debug,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(T, S), FetchError>>,
{
    let started = Instant::now();
    let deadline = started + spec.timeout;
    let mut interval = spec.poll_interval;
    let mut consecutive_errors: u32 = 0;
    let mut last_state: Option<S> = None;

    loop {
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(WaitError::Cancelled {
                    last: last_state,
                    elapsed: started.elapsed(),
                });
            }
            result = fetch() => result,
        };

        match fetched {
            Ok((snapshot, state)) => {
                consecutive_errors = 0;
                if spec.failure.contains(&state) {
                    return Err(WaitError::FailureState {
                        state,
                        elapsed: started.elapsed(),
                    });
                }
                if spec.target.contains(&state) {
                    return Ok(Some(snapshot));
                }
                trace!(state = ?state, elapsed = ?started.elapsed(), "still waiting");
                last_state = Some(state);
            }
            Err(FetchError::NotFound) => {
                if spec.accept_absent {
                    return Ok(None);
                }
                return Err(WaitError::NotFound);
            }
            Err(FetchError::Remote(err)) => {
                consecutive_errors += 1;
                if consecutive_errors > spec.max_transient_errors {
                    return Err(WaitError::FetchFailed {
                        attempts: consecutive_errors,
                        source: err,
                    });
                }
                warn!(
                    error = %err,
                    attempt = consecutive_errors,
                    "fetch failed, retrying"
                );
            }
        }

        let next_poll = Instant::now() + interval;
        if next_poll >= deadline {
            return Err(WaitError::Timeout {
                last: last_state,
                elapsed: started.elapsed(),
            });
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(WaitError::Cancelled {
                    last: last_state,
                    elapsed: started.elapsed(),
                });
            }
            _ = tokio::time::sleep_until(next_poll) => {}
        }

        interval = interval.mul_f64(spec.backoff).min(spec.max_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    enum ConnState {
        Pending,
        Available,
        Down,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Snapshot {
        state: ConnState,
    }

    fn spec(timeout_secs: u64) -> WaitSpec<ConnState> {
        WaitSpec::new(
            vec![ConnState::Available],
            Duration::from_secs(timeout_secs),
            Duration::from_secs(1),
        )
        .with_failure_states(vec![ConnState::Down])
    }

    /// Fetch whose result depends on how many polls came before it. The
    /// counter is bumped inside the future so only polled fetches count.
    fn scripted(
        calls: Arc<AtomicUsize>,
        script: fn(usize) -> Result<(Snapshot, ConnState), FetchError>,
    ) -> impl FnMut() -> std::pin::Pin<
        Box<dyn Future<Output = Result<(Snapshot, ConnState), FetchError>> + Send>,
    > {
        move || {
            let calls = Arc::clone(&calls);
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                script(n)
            })
        }
    }

    fn ok(state: ConnState) -> Result<(Snapshot, ConnState), FetchError> {
        Ok((
            Snapshot {
                state: state.clone(),
            },
            state,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn first_fetch_already_target_returns_without_polling() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let result = wait(
            &spec(10),
            &cancel,
            scripted(Arc::clone(&calls), |_| ok(ConnState::Available)),
        )
        .await;

        let snapshot = result.unwrap().unwrap();
        assert_eq!(snapshot.state, ConnState::Available);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reaches_target_on_third_poll() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let result = wait(
            &spec(10),
            &cancel,
            scripted(Arc::clone(&calls), |n| {
                if n < 2 {
                    ok(ConnState::Pending)
                } else {
                    ok(ConnState::Available)
                }
            }),
        )
        .await;

        let snapshot = result.unwrap().unwrap();
        assert_eq!(snapshot.state, ConnState::Available);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_state_fails_immediately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let result = wait(
            &spec(10),
            &cancel,
            scripted(Arc::clone(&calls), |_| ok(ConnState::Down)),
        )
        .await;

        match result {
            Err(WaitError::FailureState { state, .. }) => assert_eq!(state, ConnState::Down),
            other => panic!("expected FailureState, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_exactly_timeout_over_interval_polls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        // timeout = 5 * poll_interval: polls run at t = 0s..4s, the poll that
        // would run at t = 5s lands on the deadline and is not attempted
        let result = wait(
            &spec(5),
            &cancel,
            scripted(Arc::clone(&calls), |_| ok(ConnState::Pending)),
        )
        .await;

        match result {
            Err(WaitError::Timeout { last, .. }) => assert_eq!(last, Some(ConnState::Pending)),
            other => panic!("expected Timeout, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_is_success_for_delete_wait() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let spec = spec(10).accept_absent();

        let result = wait(
            &spec,
            &cancel,
            scripted(Arc::clone(&calls), |_| Err(FetchError::NotFound)),
        )
        .await;

        assert!(matches!(result, Ok(None)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_is_an_error_when_absence_not_accepted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let result = wait(
            &spec(10),
            &cancel,
            scripted(Arc::clone(&calls), |_| Err(FetchError::NotFound)),
        )
        .await;

        assert!(matches!(result, Err(WaitError::NotFound)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_within_budget_are_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let result = wait(
            &spec(10),
            &cancel,
            scripted(Arc::clone(&calls), |n| {
                if n < 2 {
                    Err(FetchError::Remote(ProviderError::new("connection reset")))
                } else {
                    ok(ConnState::Available)
                }
            }),
        )
        .await;

        assert!(matches!(result, Ok(Some(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_fetch_errors_exhaust_the_budget() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let spec = spec(60).with_transient_error_budget(2);

        let result = wait(
            &spec,
            &cancel,
            scripted(Arc::clone(&calls), |_| {
                Err(FetchError::Remote(ProviderError::new("connection reset")))
            }),
        )
        .await;

        match result {
            Err(WaitError::FetchFailed { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected FetchFailed, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_the_transient_error_counter() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let spec = spec(60).with_transient_error_budget(1);

        // error, pending, error, pending, ...: each error is followed by a
        // success so the consecutive counter never exceeds the budget
        let result = wait(
            &spec,
            &cancel,
            scripted(Arc::clone(&calls), |n| {
                if n == 8 {
                    ok(ConnState::Available)
                } else if n % 2 == 0 {
                    Err(FetchError::Remote(ProviderError::new("throttled")))
                } else {
                    ok(ConnState::Pending)
                }
            }),
        )
        .await;

        assert!(matches!(result, Ok(Some(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_sleep_is_reported_as_cancelled() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            canceller.cancel();
        });

        let result = wait(
            &spec(60),
            &cancel,
            scripted(Arc::clone(&calls), |_| ok(ConnState::Pending)),
        )
        .await;

        match result {
            Err(WaitError::Cancelled { last, elapsed }) => {
                assert_eq!(last, Some(ConnState::Pending));
                // delivered mid-sleep, honored before the next poll
                assert!(elapsed < Duration::from_secs(4));
            }
            other => panic!("expected Cancelled, got {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_abandons_an_in_flight_fetch() {
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        // the fetch hangs far longer than the cancellation takes to arrive
        let result: Result<Option<Snapshot>, _> = wait(&spec(60), &cancel, || async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            ok(ConnState::Pending)
        })
        .await;

        match result {
            Err(WaitError::Cancelled { elapsed, .. }) => {
                assert!(elapsed < Duration::from_secs(2));
            }
            other => panic!("expected Cancelled, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_token_aborts_before_the_first_fetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = wait(
            &spec(10),
            &cancel,
            scripted(Arc::clone(&calls), |_| ok(ConnState::Pending)),
        )
        .await;

        assert!(matches!(result, Err(WaitError::Cancelled { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_grows_the_interval_up_to_the_cap() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let spec = spec(20).with_backoff(2.0, Duration::from_secs(4));

        // intervals 1s, 2s, 4s, then capped at 4s: polls at
        // t = 0, 1, 3, 7, 11, 15, 19; the next would land past the deadline
        let result = wait(
            &spec,
            &cancel,
            scripted(Arc::clone(&calls), |_| ok(ConnState::Pending)),
        )
        .await;

        assert!(matches!(result, Err(WaitError::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 7);
    }
}
