//! Request-scoped context: correlation id and cancellation.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{ReviewError, ReviewResult};

/// Carried by every engine call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub cancel: CancellationToken,
}

impl RequestContext {
    /// Fresh context with a random request id and its own token.
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Context tied to an existing (possibly parent) token.
    pub fn with_token(cancel: CancellationToken) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            cancel,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Span tagging everything inside it with this request's id.
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!("prm.request", request_id = %self.request_id)
    }

    /// Drive `fut` unless the request is cancelled first.
    ///
    /// Cancellation wins ties. A store call that already started is dropped
    /// at its next suspension point; store operations are atomic, so either
    /// all of that write landed or none of it did.
    pub async fn race<F: Future>(&self, fut: F) -> ReviewResult<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ReviewError::Cancelled),
            out = fut => Ok(out),
        }
    }

    /// [`race`](Self::race) a fallible store call and translate its error.
    pub async fn guard<T, E, F>(&self, fut: F) -> ReviewResult<T>
    where
        F: Future<Output = Result<T, E>>,
        ReviewError: From<E>,
    {
        self.race(fut).await?.map_err(ReviewError::from)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prm_state::StorageError;

    #[tokio::test]
    async fn guard_passes_result_through() {
        let ctx = RequestContext::new();
        let ok: ReviewResult<u32> = ctx.guard(async { Ok::<_, StorageError>(7) }).await;
        assert_eq!(ok, Ok(7));
    }

    #[tokio::test]
    async fn guard_short_circuits_when_cancelled() {
        let ctx = RequestContext::new();
        ctx.cancel.cancel();

        let res: ReviewResult<u32> = ctx.guard(async { Ok::<_, StorageError>(7) }).await;
        assert_eq!(res, Err(ReviewError::Cancelled));
    }

    #[tokio::test]
    async fn child_token_follows_parent() {
        let parent = CancellationToken::new();
        let ctx = RequestContext::with_token(parent.child_token()).with_request_id("req-1");
        assert_eq!(ctx.request_id, "req-1");

        parent.cancel();
        assert!(ctx.is_cancelled());
    }
}
