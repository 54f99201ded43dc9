//! Retry loop shared by blocking push and pop.
//!
//! Backends express "queue full" and "queue empty" as [`Attempt::Retry`].
//! The loop then waits, doubling the wait from `backoff_begin` up to
//! `backoff_upper`, until the attempt succeeds, fails, the context is done,
//! or the optional `end` instant passes. The context and `end` are only
//! checked between attempts and during the wait.

use std::future::Future;
use tokio::time::Instant;

use crate::{
    config::QueueTimings,
    context::Context,
    error::{QueueError, Result},
};

/// Outcome of one attempt inside a backoff loop.
#[derive(Debug)]
pub enum Attempt<T> {
    Retry,
    Done(T),
}

async fn sleep_until_end(end: Option<Instant>) {
    match end {
        Some(end) => tokio::time::sleep_until(end).await,
        None => std::future::pending::<()>().await,
    }
}

async fn backoff<T, F, Fut>(
    ctx: &Context,
    timings: &QueueTimings,
    end: Option<Instant>,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Attempt<T>>>,
{
    let mut wait = timings.backoff_begin;
    loop {
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        if end.is_some_and(|end| Instant::now() >= end) {
            return Err(QueueError::DeadlineExceeded);
        }

        // Never interrupted once started, so the list and set stay in step.
        if let Attempt::Done(value) = attempt().await? {
            return Ok(value);
        }

        tokio::select! {
            biased;
            err = ctx.done() => return Err(err),
            _ = sleep_until_end(end) => return Err(QueueError::DeadlineExceeded),
            _ = tokio::time::sleep(wait) => {
                wait = wait.saturating_mul(2).min(timings.backoff_upper);
            }
        }
    }
}

/// Retry `attempt` until it is done, giving up with `DeadlineExceeded` at `end`.
pub async fn backoff_err<F, Fut>(
    ctx: &Context,
    timings: &QueueTimings,
    end: Option<Instant>,
    attempt: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Attempt<()>>>,
{
    backoff(ctx, timings, end, attempt).await
}

/// Like [`backoff_err`] for attempts that produce a value.
pub async fn backoff_ret_err<T, F, Fut>(
    ctx: &Context,
    timings: &QueueTimings,
    end: Option<Instant>,
    attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Attempt<T>>>,
{
    backoff(ctx, timings, end, attempt).await
}
