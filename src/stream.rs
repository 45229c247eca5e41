use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::{
    channel::mpsc::{unbounded, UnboundedReceiver},
    Stream, StreamExt,
};

use crate::{Listenable, Subscription};

/// Events of an [`Action`](crate::Action) or [`Store`](crate::Store) as a [`Stream`].
///
/// Events are buffered until polled. The stream ends when the source is dropped.
pub struct ListenStream<T> {
    rx: UnboundedReceiver<T>,
    _subscription: Subscription,
}

impl<T: Clone + 'static> ListenStream<T> {
    pub(crate) fn new(source: &impl Listenable<T>) -> Self {
        let (tx, rx) = unbounded();
        let subscription = source.listen(move |value: &T| {
            let _ = tx.unbounded_send(value.clone());
        });
        Self {
            rx,
            _subscription: subscription,
        }
    }
}

impl<T> Stream for ListenStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_next_unpin(cx)
    }
}
