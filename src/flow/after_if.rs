use std::{cell::RefCell, mem::take, rc::Rc};

use crate::{core::Scheduler, Listenable, Store, Subscription, Subscriptions};

/// Ordering barrier between a `source` and the `gate` it depends on.
///
/// Each `source` event is buffered and published either when `gate` fires next
/// or at the following microtask checkpoint, whichever comes first.
/// A buffered event is published at most once, and a newer `source` event replaces an
/// unpublished one.
pub fn after_if<G: 'static, T: Clone + 'static>(
    gate: &impl Listenable<G>,
    source: &impl Listenable<T>,
    scheduler: &Scheduler,
) -> AfterIf<T> {
    let node = Rc::new(AfterIfNode {
        store: Store::new("after_if", scheduler),
        barrier: RefCell::new(Barrier {
            waiting: false,
            buffered: None,
            seq: 0,
        }),
        subscriptions: RefCell::new(Subscriptions::new()),
    });
    let mut subscriptions = Subscriptions::new();
    let this = Rc::downgrade(&node);
    subscriptions.push(source.listen(move |value: &T| {
        if let Some(this) = this.upgrade() {
            this.on_source(value.clone());
        }
    }));
    let this = Rc::downgrade(&node);
    subscriptions.push(gate.listen(move |_: &G| {
        if let Some(this) = this.upgrade() {
            this.release(None);
        }
    }));
    *node.subscriptions.borrow_mut() = subscriptions;
    AfterIf(node)
}

pub struct AfterIf<T: 'static>(Rc<AfterIfNode<T>>);

struct Barrier<T> {
    waiting: bool,
    buffered: Option<T>,
    seq: u64,
}

struct AfterIfNode<T: 'static> {
    store: Store<T>,
    barrier: RefCell<Barrier<T>>,
    subscriptions: RefCell<Subscriptions>,
}

impl<T: Clone + 'static> AfterIfNode<T> {
    fn on_source(self: &Rc<Self>, value: T) {
        let seq = {
            let mut b = self.barrier.borrow_mut();
            b.waiting = true;
            b.buffered = Some(value);
            b.seq += 1;
            b.seq
        };
        let this = Rc::downgrade(self);
        self.store.scheduler().queue_microtask(move || {
            if let Some(this) = this.upgrade() {
                this.release(Some(seq));
            }
        });
    }

    /// `seq` is `Some` when called from the microtask scheduled for that source event.
    fn release(&self, seq: Option<u64>) {
        let value = {
            let mut b = self.barrier.borrow_mut();
            if !b.waiting || seq.is_some_and(|seq| seq != b.seq) {
                return;
            }
            b.waiting = false;
            b.buffered.take()
        };
        if let Some(value) = value {
            self.store.emit(value);
        }
    }
}

impl<T: Clone + 'static> AfterIf<T> {
    pub fn store(&self) -> &Store<T> {
        &self.0.store
    }

    /// Returns `true` while a `source` event is buffered.
    pub fn is_waiting(&self) -> bool {
        self.0.barrier.borrow().waiting
    }

    /// Detaches from both inputs and drops the buffered event.
    pub fn stop(&self) {
        let subscriptions = take(&mut *self.0.subscriptions.borrow_mut());
        drop(subscriptions);
        let mut b = self.0.barrier.borrow_mut();
        b.waiting = false;
        b.buffered = None;
        b.seq += 1;
    }
}
impl<T: Clone + 'static> Listenable<T> for AfterIf<T> {
    fn listen_rc(&self, f: Rc<dyn Fn(&T)>) -> Subscription {
        self.0.store.listen_rc(f)
    }
}
