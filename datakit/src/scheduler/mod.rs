//! Bounded-concurrency task scheduling.
//!
//! A [`Scheduler`] pulls values from a source one at a time, invokes a task for
//! each, and keeps at most `max_concurrency` invocations in flight. Results come
//! back in source order no matter in which order the tasks settle.
//!
//! Everything runs on the caller's task: the in-flight window is a
//! [`FuturesUnordered`] polled by [`Scheduler::run`], so tasks and values need
//! not be `Send`.

use std::future::Future;

use futures::future::{self, LocalBoxFuture, Ready};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use log::debug;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};


#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailurePolicy {
    /// The first failure ends the run with that error.
    #[default]
    FailFast,
    /// Every item runs to completion and failures stay in their result slot.
    CollectErrors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Upper bound on invocations in flight. Must be positive.
    pub max_concurrency: usize,
    pub policy: FailurePolicy,
    /// Fail-fast only: await the tasks still in flight before returning the
    /// error instead of dropping them.
    #[serde(skip_serializing_if = "common::serde::is_false")]
    pub drain_on_failure: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 1,
            policy: FailurePolicy::FailFast,
            drain_on_failure: false,
        }
    }
}

impl SchedulerConfig {
    pub fn new(max_concurrency: usize, policy: FailurePolicy) -> Self {
        Self {
            max_concurrency,
            policy,
            ..Self::default()
        }
    }

    pub fn with_drain_on_failure(mut self, drain_on_failure: bool) -> Self {
        self.drain_on_failure = drain_on_failure;
        self
    }
}

type Settled<'a, T, E> = LocalBoxFuture<'a, (usize, Result<T, E>)>;

/// State of one scheduling run.
///
/// The window only ever holds invocations whose slot is still empty, and its
/// length never exceeds `config.max_concurrency`.
pub struct Scheduler<'a, I, F, T, E> {
    source: I,
    task: F,
    config: SchedulerConfig,
    next_index: usize,
    exhausted: bool,
    failed: bool,
    window: FuturesUnordered<Settled<'a, T, E>>,
    slots: Vec<Option<Result<T, E>>>,
}

impl<'a, I, F, Fut, T, E> Scheduler<'a, I, F, T, E>
where
    I: Iterator,
    F: FnMut(I::Item, usize) -> Fut,
    Fut: Future<Output = Result<T, E>> + 'a,
    T: 'a,
    E: 'a,
{
    /// # Panics
    ///
    /// Panics if `config.max_concurrency` is 0.
    pub fn new<S>(source: S, config: SchedulerConfig, task: F) -> Self
    where
        S: IntoIterator<IntoIter = I>,
    {
        assert!(config.max_concurrency > 0, "max_concurrency must be > 0");

        Self {
            source: source.into_iter(),
            task,
            config,
            next_index: 0,
            exhausted: false,
            failed: false,
            window: FuturesUnordered::new(),
            slots: Vec::new(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Runs every item and returns the slots in source order.
    ///
    /// Under [`FailurePolicy::FailFast`] every slot is `Ok` or the run fails
    /// with the first error. Under [`FailurePolicy::CollectErrors`] the run
    /// never fails.
    pub async fn run(mut self) -> Result<Vec<Result<T, E>>, E> {
        match self.drive().await {
            Some(err) => Err(err),
            None => Ok(self.into_slots()),
        }
    }

    /// Drives the run to its end and returns the error that aborted it, if any.
    async fn drive(&mut self) -> Option<E> {
        self.top_up();
        debug!("scheduler started with {} task(s) in flight", self.window.len());

        while let Some((index, result)) = self.window.next().await {
            if let Some(err) = self.settle(index, result) {
                self.abandon_in_flight().await;
                return Some(err);
            }
            self.top_up();
        }

        debug!("scheduler settled {} task(s)", self.slots.len());
        None
    }

    /// Pulls and launches values until the window is full or the source runs dry.
    fn top_up(&mut self) {
        while !self.failed && !self.exhausted && self.window.len() < self.config.max_concurrency {
            match self.source.next() {
                Some(value) => self.launch(value),
                None => self.exhausted = true,
            }
        }
    }

    fn launch(&mut self, value: I::Item) {
        let index = self.next_index;
        self.next_index += 1;
        self.slots.push(None);

        let operation = (self.task)(value, index);
        self.window
            .push(operation.map(move |result| (index, result)).boxed_local());
    }

    /// Stores a settled result. Returns the error that ends a fail-fast run.
    fn settle(&mut self, index: usize, result: Result<T, E>) -> Option<E> {
        match (self.config.policy, result) {
            (FailurePolicy::FailFast, Err(err)) => {
                self.failed = true;
                Some(err)
            }
            (_, result) => {
                self.slots[index] = Some(result);
                None
            }
        }
    }

    async fn abandon_in_flight(&mut self) {
        let pending = self.window.len();
        if pending == 0 {
            return;
        }

        if self.config.drain_on_failure {
            debug!("draining {pending} in-flight task(s) after a failure");
            while self.window.next().await.is_some() {}
        } else {
            debug!("dropping {pending} in-flight task(s) after a failure");
            self.window.clear();
        }
    }

    fn into_slots(self) -> Vec<Result<T, E>> {
        debug_assert!(self.window.is_empty());
        debug_assert!(self.slots.iter().all(Option::is_some));
        self.slots.into_iter().flatten().collect()
    }
}

/// Runs `task` over `source` with at most `max_concurrency` invocations in
/// flight, under the given failure policy.
pub async fn run_limited<'a, S, F, Fut, T, E>(
    source: S,
    max_concurrency: usize,
    policy: FailurePolicy,
    task: F,
) -> Result<Vec<Result<T, E>>, E>
where
    S: IntoIterator,
    F: FnMut(S::Item, usize) -> Fut,
    Fut: Future<Output = Result<T, E>> + 'a,
    T: 'a,
    E: 'a,
{
    Scheduler::new(source, SchedulerConfig::new(max_concurrency, policy), task)
        .run()
        .await
}

/// Fail-fast variant: all values in source order, or the first error.
pub async fn try_run_limited<'a, S, F, Fut, T, E>(
    source: S,
    max_concurrency: usize,
    task: F,
) -> Result<Vec<T>, E>
where
    S: IntoIterator,
    F: FnMut(S::Item, usize) -> Fut,
    Fut: Future<Output = Result<T, E>> + 'a,
    T: 'a,
    E: 'a,
{
    run_limited(source, max_concurrency, FailurePolicy::FailFast, task)
        .await?
        .into_iter()
        .collect()
}

/// Collect-errors variant: one result per source item, in source order.
pub async fn run_limited_collect<'a, S, F, Fut, T, E>(
    source: S,
    max_concurrency: usize,
    task: F,
) -> Vec<Result<T, E>>
where
    S: IntoIterator,
    F: FnMut(S::Item, usize) -> Fut,
    Fut: Future<Output = Result<T, E>> + 'a,
    T: 'a,
    E: 'a,
{
    let config = SchedulerConfig::new(max_concurrency, FailurePolicy::CollectErrors);
    let mut scheduler = Scheduler::new(source, config, task);
    let aborted = scheduler.drive().await;
    debug_assert!(aborted.is_none(), "collect-errors runs never abort");
    scheduler.into_slots()
}

/// Adapts a synchronous task to the scheduler's task shape. An `Err` returned
/// here settles exactly like a future that fails.
pub fn sync_task<V, T, E, F>(mut f: F) -> impl FnMut(V, usize) -> Ready<Result<T, E>>
where
    F: FnMut(V, usize) -> Result<T, E>,
{
    move |value, index| future::ready(f(value, index))
}
