use std::{cell::RefCell, rc::Rc, time::Duration};

use crate::{
    core::{Scheduler, Timer},
    Listenable, Store, Subscription,
};


/// Publish only the last event of a burst, once `delay` has passed without a new event.
///
/// Dropping the returned [`Debounce`] (or calling [`Debounce::stop`]) discards the pending event.
pub fn debounce<T: Clone + 'static>(
    source: &impl Listenable<T>,
    delay: Duration,
    scheduler: &Scheduler,
) -> Debounce<T> {
    let node = Rc::new(DebounceNode {
        store: Store::new("debounce", scheduler),
        delay,
        pending: RefCell::new(None),
        source: RefCell::new(Subscription::empty()),
    });
    let this = Rc::downgrade(&node);
    *node.source.borrow_mut() = source.listen(move |value: &T| {
        if let Some(this) = this.upgrade() {
            this.schedule(value.clone());
        }
    });
    Debounce(node)
}

pub struct Debounce<T: 'static>(Rc<DebounceNode<T>>);

struct DebounceNode<T: 'static> {
    store: Store<T>,
    delay: Duration,
    pending: RefCell<Option<Timer>>,
    source: RefCell<Subscription>,
}

impl<T: Clone + 'static> DebounceNode<T> {
    fn schedule(self: &Rc<Self>, value: T) {
        let this = Rc::downgrade(self);
        let timer = self.store.scheduler().set_timeout(self.delay, move || {
            if let Some(this) = this.upgrade() {
                this.fire(value);
            }
        });
        let superseded = self.pending.replace(Some(timer));
        drop(superseded);
    }
    fn fire(&self, value: T) {
        let fired = self.pending.take();
        drop(fired);
        self.store.emit(value);
    }
}

impl<T: Clone + 'static> Debounce<T> {
    pub fn store(&self) -> &Store<T> {
        &self.0.store
    }

    /// Returns `true` while an event is waiting for the quiet period to end.
    pub fn is_pending(&self) -> bool {
        self.0
            .pending
            .borrow()
            .as_ref()
            .is_some_and(|timer| timer.is_pending())
    }

    /// Detaches from the source and discards the pending event.
    pub fn stop(&self) {
        let source = self.0.source.replace(Subscription::empty());
        let pending = self.0.pending.take();
        drop(source);
        drop(pending);
    }
}
impl<T: Clone + 'static> Listenable<T> for Debounce<T> {
    fn listen_rc(&self, f: Rc<dyn Fn(&T)>) -> Subscription {
        self.0.store.listen_rc(f)
    }
}
