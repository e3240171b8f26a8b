// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Already-settled future delivered on the next poll
//!
//! The operation has run to completion before a [`Deferred`] exists; the
//! future only postpones observing the outcome by one scheduler turn.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::FsResult;

#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct Deferred<T> {
    outcome: Option<T>,
    yielded: bool,
}

/// Settled filesystem result awaiting delivery
pub type FsFuture<T> = Deferred<FsResult<T>>;

impl<T> Deferred<T> {
    pub(crate) fn settled(outcome: T) -> Self {
        Self {
            outcome: Some(outcome),
            yielded: false,
        }
    }
}

impl<T> Unpin for Deferred<T> {}

impl<T> Future for Deferred<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();
        if !this.yielded {
            this.yielded = true;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }
        Poll::Ready(this.outcome.take().expect("Deferred polled after completion"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::task::{Wake, Waker};

    struct CountingWaker(AtomicUsize);

    impl Wake for CountingWaker {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_pending_once_then_ready() {
        let counter = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let waker = Waker::from(counter.clone());
        let mut cx = Context::from_waker(&waker);
        let mut fut = Deferred::settled(7);

        assert!(Pin::new(&mut fut).poll(&mut cx).is_pending());
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(Pin::new(&mut fut).poll(&mut cx), Poll::Ready(7));
    }

    #[tokio::test]
    async fn test_awaits_to_outcome() {
        assert_eq!(Deferred::settled("done").await, "done");
    }
}
