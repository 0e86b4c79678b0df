//! Duplicate frame detection for frame streams

use futures::{Stream, ready};
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A frame tagged against the one before it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emission<T> {
    /// Differs from the previous frame and should be transmitted
    Changed(T),
    /// Identical to the previous frame
    Repeat,
}

/// Extension trait to add duplicate tagging to a fallible frame stream
pub trait DedupExt<T, E>: Stream<Item = Result<T, E>> {
    /// Tag each frame as [`Emission::Changed`] or [`Emission::Repeat`]
    ///
    /// Every source frame still produces exactly one item, so downstream pacing
    /// sees the full timeline even when nothing needs to be sent. Errors pass
    /// through unchanged.
    fn dedup_frames(self) -> Dedup<Self, T>
    where
        Self: Sized,
    {
        Dedup::new(self)
    }
}

impl<S, T, E> DedupExt<T, E> for S where S: Stream<Item = Result<T, E>> {}

pin_project! {
    /// A stream combinator comparing each frame with its predecessor
    pub struct Dedup<S, T> {
        #[pin]
        stream: S,
        last: Option<T>,
    }
}

impl<S, T> Dedup<S, T> {
    pub fn new(stream: S) -> Self {
        Self { stream, last: None }
    }
}

impl<S, T, E> Stream for Dedup<S, T>
where
    S: Stream<Item = Result<T, E>>,
    T: PartialEq + Clone,
{
    type Item = Result<Emission<T>, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        let item = match ready!(this.stream.poll_next(cx)) {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => return Poll::Ready(Some(Err(e))),
            None => return Poll::Ready(None),
        };

        if this.last.as_ref() == Some(&item) {
            return Poll::Ready(Some(Ok(Emission::Repeat)));
        }

        *this.last = Some(item.clone());
        Poll::Ready(Some(Ok(Emission::Changed(item))))
    }
}
