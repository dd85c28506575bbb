#![forbid(unsafe_code)]

//! Race a slow operation against a deadline and a cancellation token.
//!
//! Every rendition fetch goes through this primitive. Completion, timeout
//! and cancellation fire from independent execution contexts; the ticket
//! guarantees that exactly one terminal outcome is delivered exactly once.
//! One lock guards an "already resolved" flag plus the best-observed result
//! so far; the first of the racers to observe `!resolved` flips it and
//! delivers, the loser is a no-op.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Terminal outcome of one raced load.
#[derive(Clone, Debug, PartialEq)]
pub enum RaceOutcome<T> {
    /// The operation finished in time.
    Completed(T),
    /// The deadline fired first; `Some` carries the best partial result the
    /// operation had published by then.
    TimedOut(Option<T>),
    /// The token was cancelled before completion.
    Cancelled,
}

impl<T> RaceOutcome<T> {
    /// The best result available, complete or partial.
    #[must_use]
    pub fn into_best(self) -> Option<T> {
        match self {
            RaceOutcome::Completed(value) | RaceOutcome::TimedOut(Some(value)) => Some(value),
            RaceOutcome::TimedOut(None) | RaceOutcome::Cancelled => None,
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, RaceOutcome::Completed(_))
    }
}

struct TicketState<T> {
    resolved: bool,
    /// Set only by `try_complete`; distinguishes a real completion from an
    /// abandoned producer whose partial we still want to hand out.
    completed: bool,
    best: Option<T>,
}

struct TicketInner<T> {
    state: Mutex<TicketState<T>>,
    done: Notify,
}

/// In-flight request bookkeeping: shared between the producing task and the
/// consumer awaiting [`LoadTicket::race`].
pub struct LoadTicket<T> {
    inner: Arc<TicketInner<T>>,
}

impl<T> Clone for LoadTicket<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for LoadTicket<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LoadTicket<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TicketInner {
                state: Mutex::new(TicketState {
                    resolved: false,
                    completed: false,
                    best: None,
                }),
                done: Notify::new(),
            }),
        }
    }

    /// Handle for the producer to publish intermediate results.
    pub fn progress(&self) -> ProgressSink<T> {
        ProgressSink {
            inner: self.inner.clone(),
        }
    }

    /// Producer side: deliver the final result. Returns `false` when the
    /// race already resolved (timeout or cancellation won); the value is
    /// dropped in that case.
    pub fn try_complete(&self, value: T) -> bool {
        let mut state = self.inner.state.lock();
        if state.resolved {
            return false;
        }
        state.best = Some(value);
        state.resolved = true;
        state.completed = true;
        drop(state);
        self.inner.done.notify_one();
        true
    }

    /// Producer side: give up without a result (the underlying operation
    /// failed). Releases the consumer immediately; a previously published
    /// partial is still handed out as a timed-out partial.
    pub fn abandon(&self) {
        let mut state = self.inner.state.lock();
        if state.resolved {
            return;
        }
        state.resolved = true;
        drop(state);
        self.inner.done.notify_one();
    }

    /// Consumer side: wait for the first of completion, deadline or
    /// cancellation. Resolves within `deadline` + ε even against a producer
    /// that never completes. Call at most once per ticket.
    pub async fn race(&self, deadline: Duration, cancel: &CancellationToken) -> RaceOutcome<T> {
        enum Winner {
            Done,
            Deadline,
            Cancelled,
        }

        let winner = {
            let done = self.inner.done.notified();
            tokio::select! {
                _ = done => Winner::Done,
                _ = tokio::time::sleep(deadline) => Winner::Deadline,
                _ = cancel.cancelled() => Winner::Cancelled,
            }
        };

        let mut state = self.inner.state.lock();
        match winner {
            Winner::Done => {
                if state.completed {
                    match state.best.take() {
                        Some(value) => RaceOutcome::Completed(value),
                        None => RaceOutcome::TimedOut(None),
                    }
                } else {
                    // Producer abandoned; its last partial is all we have.
                    RaceOutcome::TimedOut(state.best.take())
                }
            }
            Winner::Deadline => {
                if state.resolved && state.completed {
                    // Completion landed between the select and the lock.
                    match state.best.take() {
                        Some(value) => RaceOutcome::Completed(value),
                        None => RaceOutcome::TimedOut(None),
                    }
                } else {
                    state.resolved = true;
                    RaceOutcome::TimedOut(state.best.take())
                }
            }
            Winner::Cancelled => {
                if state.resolved && state.completed {
                    match state.best.take() {
                        Some(value) => RaceOutcome::Completed(value),
                        None => RaceOutcome::TimedOut(None),
                    }
                } else {
                    state.resolved = true;
                    RaceOutcome::Cancelled
                }
            }
        }
    }
}

/// Producer handle for publishing intermediate (partial) results.
pub struct ProgressSink<T> {
    inner: Arc<TicketInner<T>>,
}

impl<T> Clone for ProgressSink<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> ProgressSink<T> {
    /// Record a partial result. Ignored once the race has resolved.
    pub fn publish(&self, partial: T) {
        let mut state = self.inner.state.lock();
        if !state.resolved {
            state.best = Some(partial);
        }
    }
}

/// Convenience runner: spawn the producing operation and race it.
pub struct LoadRace;

impl LoadRace {
    /// Run `op` against `deadline` and `cancel`.
    ///
    /// The operation receives a [`ProgressSink`] for partials and returns
    /// `Some(final)` or `None` on failure. It is spawned as its own task
    /// that also watches the token, so cancellation stops work promptly; a
    /// producer that outlives the race resolves into a no-op.
    pub async fn run<T, F, Fut>(
        op: F,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> RaceOutcome<T>
    where
        T: Send + 'static,
        F: FnOnce(ProgressSink<T>) -> Fut,
        Fut: Future<Output = Option<T>> + Send + 'static,
    {
        let ticket = LoadTicket::new();
        let fut = op(ticket.progress());
        tokio::spawn({
            let ticket = ticket.clone();
            let cancel = cancel.clone();
            async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    out = fut => match out {
                        Some(value) => {
                            let _ = ticket.try_complete(value);
                        }
                        None => ticket.abandon(),
                    },
                }
            }
        });
        ticket.race(deadline, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Instant,
    };

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test]
    async fn never_completing_operation_resolves_at_deadline() {
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let outcome: RaceOutcome<u32> = LoadRace::run(
            |_progress| std::future::pending(),
            Duration::from_millis(50),
            &cancel,
        )
        .await;

        assert_eq!(outcome, RaceOutcome::TimedOut(None));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(50), "resolved early: {elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "resolved late: {elapsed:?}");
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test]
    async fn completion_before_deadline_wins() {
        let cancel = CancellationToken::new();

        let outcome = LoadRace::run(
            |_progress| async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Some(42u32)
            },
            Duration::from_secs(5),
            &cancel,
        )
        .await;

        assert_eq!(outcome, RaceOutcome::Completed(42));
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test]
    async fn published_partial_survives_the_deadline() {
        let cancel = CancellationToken::new();

        let outcome = LoadRace::run(
            |progress| async move {
                progress.publish(7u32);
                std::future::pending().await
            },
            Duration::from_millis(50),
            &cancel,
        )
        .await;

        assert_eq!(outcome, RaceOutcome::TimedOut(Some(7)));
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test]
    async fn abandoned_producer_releases_the_consumer_early() {
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let outcome: RaceOutcome<u32> = LoadRace::run(
            |_progress| async { None },
            Duration::from_secs(30),
            &cancel,
        )
        .await;

        assert_eq!(outcome, RaceOutcome::TimedOut(None));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test]
    async fn cancellation_resolves_promptly() {
        let cancel = CancellationToken::new();
        let child = cancel.child_token();

        let racer = tokio::spawn(async move {
            LoadRace::run::<u32, _, _>(
                |_progress| std::future::pending(),
                Duration::from_secs(30),
                &child,
            )
            .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        assert_eq!(racer.await.unwrap(), RaceOutcome::Cancelled);
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test]
    async fn late_completion_after_timeout_is_a_no_op() {
        let cancel = CancellationToken::new();
        let ticket: LoadTicket<u32> = LoadTicket::new();

        let outcome = ticket.race(Duration::from_millis(30), &cancel).await;
        assert_eq!(outcome, RaceOutcome::TimedOut(None));

        // The slow producer finally shows up; its delivery must lose.
        assert!(!ticket.try_complete(99));
    }

    #[rstest]
    #[timeout(Duration::from_secs(10))]
    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_completion_and_deadline_deliver_exactly_once() {
        // Repeatedly land completion right at the deadline; whatever wins,
        // exactly one side must deliver.
        for _ in 0..200 {
            let ticket: LoadTicket<u32> = LoadTicket::new();
            let cancel = CancellationToken::new();
            let deliveries = Arc::new(AtomicUsize::new(0));

            let producer = tokio::spawn({
                let ticket = ticket.clone();
                let deliveries = deliveries.clone();
                async move {
                    tokio::time::sleep(Duration::from_micros(500)).await;
                    if ticket.try_complete(1) {
                        deliveries.fetch_add(1, Ordering::SeqCst);
                    }
                }
            });

            let outcome = ticket.race(Duration::from_micros(500), &cancel).await;
            if outcome.is_completed() {
                // The producer's delivery is the same resolution, not a
                // second one.
                producer.await.unwrap();
                assert_eq!(deliveries.load(Ordering::SeqCst), 1);
            } else {
                producer.await.unwrap();
                assert_eq!(deliveries.load(Ordering::SeqCst), 0, "loser must be a no-op");
            }
        }
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test]
    async fn publish_after_resolution_is_ignored() {
        let cancel = CancellationToken::new();
        let ticket: LoadTicket<u32> = LoadTicket::new();
        let sink = ticket.progress();

        let outcome = ticket.race(Duration::from_millis(20), &cancel).await;
        assert_eq!(outcome, RaceOutcome::TimedOut(None));

        sink.publish(5);
        assert!(!ticket.try_complete(5));
    }
}
