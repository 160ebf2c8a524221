//! Cancellable handles to in-flight collaborator operations.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

/// Handle to one asynchronous collaborator operation.
///
/// A subrequest pairs the operation's future with a [`CancellationToken`].
/// Cancelling the handle signals the collaborator through the token; how the
/// operation winds down is the collaborator's business. A collaborator whose
/// work was already complete when the cancel arrived may still deliver its
/// outcome, so callers must be prepared to discard late results.
pub struct Subrequest<T> {
    future: BoxFuture<'static, T>,
    cancel: CancellationToken,
}

impl<T: Send + 'static> Subrequest<T> {
    /// Wraps an operation future and the token its collaborator watches.
    pub fn new(future: impl Future<Output = T> + Send + 'static, cancel: CancellationToken) -> Self {
        Self {
            future: Box::pin(future),
            cancel,
        }
    }

    /// An already-resolved subrequest with an inert cancel token.
    pub fn ready(value: T) -> Self {
        Self::new(std::future::ready(value), CancellationToken::new())
    }
}

impl<T> Subrequest<T> {
    /// Signals the collaborator to abandon the operation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the operation has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A clone of the cancel token, for observers racing the future against
    /// cancellation.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Splits the handle into its future and cancel token.
    pub fn into_parts(self) -> (BoxFuture<'static, T>, CancellationToken) {
        (self.future, self.cancel)
    }
}

impl<T> Future for Subrequest<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        self.future.as_mut().poll(cx)
    }
}

impl<T> fmt::Debug for Subrequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subrequest")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_to_the_wrapped_value() {
        let subrequest = Subrequest::ready(7u32);
        assert_eq!(subrequest.await, 7);
    }

    #[tokio::test]
    async fn cancel_is_visible_through_the_token() {
        let (_tx, rx) = tokio::sync::oneshot::channel::<u32>();
        let token = CancellationToken::new();
        let observer = token.clone();
        let subrequest = Subrequest::new(async move { rx.await.unwrap_or(0) }, token);
        assert!(!observer.is_cancelled());
        subrequest.cancel();
        assert!(observer.is_cancelled());
        assert!(subrequest.is_cancelled());
    }
}
