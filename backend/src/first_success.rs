use std::pin::Pin;
use std::task::{Context, Poll};

/// Resolves with the first candidate that completes with `Ok`.
///
/// Failed candidates are dropped from the set and their errors collected; the
/// combinator only fails once every candidate has failed. Candidates are polled in
/// the order they were given, so among candidates that become ready during the same
/// wake-up the earliest one wins. Dropping the combinator cancels whatever is still
/// in flight.
pub struct FirstSuccess<F, E> {
    futures: Vec<Pin<Box<F>>>,
    errors: Vec<E>,
}

// Candidates are boxed and errors are never pinned.
impl<F, E> Unpin for FirstSuccess<F, E> {}

impl<F, T, E> FirstSuccess<F, E>
where
    F: Future<Output = Result<T, E>>,
{
    pub fn new(futures: impl IntoIterator<Item = F>) -> Self {
        let futures: Vec<_> = futures.into_iter().map(Box::pin).collect();
        Self {
            errors: Vec::with_capacity(futures.len()),
            futures,
        }
    }
}

impl<F, T, E> Future for FirstSuccess<F, E>
where
    F: Future<Output = Result<T, E>>,
{
    /// On failure, errors are listed in the order the candidates failed.
    type Output = Result<T, Vec<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        let mut i = 0;
        while i < this.futures.len() {
            match this.futures[i].as_mut().poll(cx) {
                Poll::Ready(Ok(value)) => {
                    this.futures.clear();
                    return Poll::Ready(Ok(value));
                }
                Poll::Ready(Err(err)) => {
                    this.errors.push(err);
                    this.futures.remove(i);
                }
                Poll::Pending => i += 1,
            }
        }

        if this.futures.is_empty() {
            Poll::Ready(Err(std::mem::take(&mut this.errors)))
        } else {
            Poll::Pending
        }
    }
}
