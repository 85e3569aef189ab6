//! Single resolution bridge between callback based transports and `async` callers.
//!
//! [`channel`] returns a [`Completion`], handed to the transport callbacks, and a
//! [`Pending`] future awaited by the caller. The first [`Completion::resolve`] wins,
//! any further resolution is reported as a bug and otherwise ignored.

use log::error;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Resolving side of a single resolution channel.
pub struct Completion<T> {
    tx: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> Completion<T> {
    /// Delivers `value` to the waiting side.
    ///
    /// Returns `false` if the completion was already resolved, in that case
    /// `value` is dropped.
    pub fn resolve(&self, value: T) -> bool {
        let tx = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match tx {
            Some(tx) => {
                // the waiting side may be gone, there is nobody to notify then
                tx.send(value).ok();
                true
            }
            None => {
                error!("BUG: completion resolved more than once, ignoring");
                false
            }
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// Waiting side of a single resolution channel.
///
/// Resolves to [`None`] if the [`Completion`] is dropped without being resolved.
pub struct Pending<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for Pending<T> {
    type Output = Option<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(Result::ok)
    }
}

pub fn channel<T>() -> (Completion<T>, Pending<T>) {
    let (tx, rx) = oneshot::channel();
    (
        Completion {
            tx: Mutex::new(Some(tx)),
        },
        Pending { rx },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn resolves_once() {
        let (completion, pending) = channel::<u32>();
        assert!(!completion.is_resolved());
        assert!(completion.resolve(1));
        assert!(completion.is_resolved());
        assert!(!completion.resolve(2));
        assert_eq!(pending.await, Some(1));
    }

    #[tokio::test]
    async fn dropped_without_resolution() {
        let (completion, pending) = channel::<u32>();
        drop(completion);
        assert_eq!(pending.await, None);
    }

    #[tokio::test]
    async fn resolved_from_another_task() {
        let (completion, pending) = channel::<&'static str>();
        let completion = Arc::new(completion);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let completion = completion.clone();
                tokio::spawn(async move { completion.resolve("done") })
            })
            .collect();

        let mut resolved = 0;
        for handle in handles {
            if handle.await.unwrap() {
                resolved += 1;
            }
        }

        assert_eq!(resolved, 1);
        assert_eq!(pending.await, Some("done"));
    }
}
