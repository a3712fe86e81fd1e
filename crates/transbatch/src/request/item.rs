use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use crate::error::TranslatorError;
use crate::response::Response;
use super::RequestId;

/// # ResponseFuture
///
/// An asynchronous wrapper around the receiving half of a request's
/// response promise.
///
/// Resolves with the assembled [`Response`]. Resolves with
/// [`TranslatorError::Abandoned`] only if the request was dropped without
/// ever running, which happens when the service is torn down under it.
pub struct ResponseFuture {
    /// The request this future belongs to
    id: RequestId,

    /// The underlying channel receiver
    receiver: oneshot::Receiver<Response>,
}

impl ResponseFuture {
    pub(crate) fn new(id: RequestId, receiver: oneshot::Receiver<Response>) -> Self {
        Self { id, receiver }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }
}

impl Future for ResponseFuture {
    type Output = Result<Response, TranslatorError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let id = this.id;
        Pin::new(&mut this.receiver)
            .poll(cx)
            .map(|result| result.map_err(|_| TranslatorError::Abandoned(id)))
    }
}
