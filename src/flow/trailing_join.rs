use std::{
    cell::{Cell, RefCell},
    mem::take,
    rc::{Rc, Weak},
};

use derive_ex::derive_ex;

use crate::{
    core::Scheduler,
    event::{connector, Connect},
    Action, Listenable, Store, Subscription, Subscriptions,
};

#[cfg(test)]
mod tests;

/// Type-erased, re-subscribable event source.
#[derive_ex(Clone, bound())]
pub struct Source<T: 'static>(Connect<T>);

impl<T: 'static> Source<T> {
    pub fn new(source: &(impl Listenable<T> + Clone + 'static)) -> Self {
        Self(connector(source))
    }
}
impl<T: 'static> Listenable<T> for Source<T> {
    fn listen_rc(&self, f: Rc<dyn Fn(&T)>) -> Subscription {
        (self.0)(f)
    }
}
impl<T: 'static> From<&Action<T>> for Source<T> {
    fn from(value: &Action<T>) -> Self {
        Self::new(value)
    }
}
impl<T: Clone + 'static> From<&Store<T>> for Source<T> {
    fn from(value: &Store<T>) -> Self {
        Self::new(value)
    }
}

/// Latest payload of every joined source.
trait JoinSlots: 'static {
    type Output: Clone + 'static;
    fn output(&self) -> Option<Self::Output>;
}
impl<T: Clone + 'static> JoinSlots for Vec<Option<T>> {
    type Output = Vec<T>;
    fn output(&self) -> Option<Vec<T>> {
        self.iter().cloned().collect()
    }
}
impl<A: Clone + 'static, B: Clone + 'static> JoinSlots for (Option<A>, Option<B>) {
    type Output = (A, B);
    fn output(&self) -> Option<(A, B)> {
        Some((self.0.clone()?, self.1.clone()?))
    }
}

type SlotConnect<S> = Box<dyn Fn(Weak<JoinNode<S>>, u64) -> Subscription>;

fn slot_connect<S: JoinSlots, U: Clone + 'static>(
    source: Source<U>,
    index: usize,
    set: fn(&mut S, usize, U),
) -> SlotConnect<S> {
    Box::new(move |node: Weak<JoinNode<S>>, epoch: u64| {
        source.listen(move |value: &U| {
            if let Some(node) = node.upgrade() {
                node.on_event(epoch, index, |slots| set(slots, index, value.clone()));
            }
        })
    })
}

/// Wait for every source to fire, then publish their latest payloads once.
///
/// Sources are joined in the order given; the output has one slot per source.
pub fn join_trailing<T: Clone + 'static>(
    sources: impl IntoIterator<Item = Source<T>>,
    scheduler: &Scheduler,
) -> TrailingJoin<Vec<T>> {
    let connects: Vec<SlotConnect<Vec<Option<T>>>> = sources
        .into_iter()
        .enumerate()
        .map(|(index, source)| {
            slot_connect::<Vec<Option<T>>, T>(source, index, |slots, i, value| {
                slots[i] = Some(value)
            })
        })
        .collect();
    let slots = vec![None; connects.len()];
    TrailingJoin::new(slots, connects, scheduler)
}

/// [`join_trailing`] for two sources of different types.
pub fn join_trailing2<A: Clone + 'static, B: Clone + 'static>(
    a: impl Into<Source<A>>,
    b: impl Into<Source<B>>,
    scheduler: &Scheduler,
) -> TrailingJoin<(A, B)> {
    let connects: Vec<SlotConnect<(Option<A>, Option<B>)>> = vec![
        slot_connect::<(Option<A>, Option<B>), A>(a.into(), 0, |slots, _, value| {
            slots.0 = Some(value)
        }),
        slot_connect::<(Option<A>, Option<B>), B>(b.into(), 1, |slots, _, value| {
            slots.1 = Some(value)
        }),
    ];
    TrailingJoin::new((None, None), connects, scheduler)
}

pub struct TrailingJoin<T: 'static>(Rc<dyn JoinControl<T>>);

trait JoinControl<T: 'static> {
    fn store(&self) -> &Store<T>;
    fn stop(&self);
    fn rearm(self: Rc<Self>);
    fn fired(&self) -> Vec<bool>;
    fn is_armed(&self) -> bool;
}

struct JoinNode<S: JoinSlots> {
    store: Store<S::Output>,
    slots: RefCell<S>,
    fired: RefCell<Vec<bool>>,
    epoch: Cell<u64>,
    connects: Vec<SlotConnect<S>>,
    subscriptions: RefCell<Subscriptions>,
}

impl<S: JoinSlots> JoinNode<S> {
    fn connect(self: &Rc<Self>) {
        let epoch = self.epoch.get();
        let mut subscriptions = Subscriptions::new();
        for connect in &self.connects {
            subscriptions.push(connect(Rc::downgrade(self), epoch));
        }
        *self.subscriptions.borrow_mut() = subscriptions;
    }

    fn on_event(&self, epoch: u64, index: usize, set: impl FnOnce(&mut S)) {
        let output = {
            if epoch != self.epoch.get() {
                return;
            }
            set(&mut *self.slots.borrow_mut());
            let mut fired = self.fired.borrow_mut();
            fired[index] = true;
            if !fired.iter().all(|&f| f) {
                return;
            }
            fired.fill(false);
            self.slots.borrow().output()
        };
        if let Some(output) = output {
            self.store.emit(output);
        }
    }
}

impl<S: JoinSlots> JoinControl<S::Output> for JoinNode<S> {
    fn store(&self) -> &Store<S::Output> {
        &self.store
    }
    fn stop(&self) {
        self.epoch.set(self.epoch.get() + 1);
        let subscriptions = take(&mut *self.subscriptions.borrow_mut());
        drop(subscriptions);
    }
    fn rearm(self: Rc<Self>) {
        self.stop();
        self.fired.borrow_mut().fill(false);
        self.connect();
    }
    fn fired(&self) -> Vec<bool> {
        self.fired.borrow().clone()
    }
    fn is_armed(&self) -> bool {
        !self.subscriptions.borrow().is_empty()
    }
}

impl<T: Clone + 'static> TrailingJoin<T> {
    fn new<S: JoinSlots<Output = T>>(
        slots: S,
        connects: Vec<SlotConnect<S>>,
        scheduler: &Scheduler,
    ) -> Self {
        let node = Rc::new(JoinNode {
            store: Store::new("join_trailing", scheduler),
            slots: RefCell::new(slots),
            fired: RefCell::new(vec![false; connects.len()]),
            epoch: Cell::new(0),
            connects,
            subscriptions: RefCell::new(Subscriptions::new()),
        });
        node.connect();
        Self(node)
    }

    pub fn store(&self) -> &Store<T> {
        self.0.store()
    }

    /// Unsubscribes from every source. Events already being dispatched are ignored.
    pub fn stop(&self) {
        self.0.stop();
    }

    /// Clears the fired flags and subscribes again, starting a fresh accumulation cycle.
    pub fn rearm(&self) {
        self.0.clone().rearm();
    }

    /// Per-source flags: fired since the last publication.
    pub fn fired(&self) -> Vec<bool> {
        self.0.fired()
    }

    pub fn is_armed(&self) -> bool {
        self.0.is_armed()
    }
}
impl<T: Clone + 'static> Listenable<T> for TrailingJoin<T> {
    fn listen_rc(&self, f: Rc<dyn Fn(&T)>) -> Subscription {
        self.store().listen_rc(f)
    }
}

/// Join of a source and a manual flush action.
///
/// Firing `flush` publishes the latest payload of `source` right away, whether or not
/// `source` fired since the last publication, then re-arms the join.
pub fn join_flush<T: Clone + 'static>(
    source: impl Into<Source<T>>,
    flush: &Action<()>,
    scheduler: &Scheduler,
) -> FlushJoin<T> {
    let node = Rc::new(FlushNode {
        store: Store::new("join_flush", scheduler),
        source: source.into(),
        flush: Source::new(flush),
        latest: RefCell::new(None),
        fired: Cell::new(false),
        epoch: Cell::new(0),
        subscriptions: RefCell::new(Subscriptions::new()),
    });
    node.connect();
    FlushJoin(node)
}

pub struct FlushJoin<T: 'static>(Rc<FlushNode<T>>);

struct FlushNode<T: 'static> {
    store: Store<T>,
    source: Source<T>,
    flush: Source<()>,
    latest: RefCell<Option<T>>,
    fired: Cell<bool>,
    epoch: Cell<u64>,
    subscriptions: RefCell<Subscriptions>,
}

impl<T: Clone + 'static> FlushNode<T> {
    fn connect(self: &Rc<Self>) {
        let epoch = self.epoch.get();
        let mut subscriptions = Subscriptions::new();
        let this = Rc::downgrade(self);
        subscriptions.push(self.source.listen(move |value: &T| {
            if let Some(this) = this.upgrade() {
                // An event in flight across a rearm is still the latest payload.
                *this.latest.borrow_mut() = Some(value.clone());
                if this.epoch.get() == epoch {
                    this.fired.set(true);
                }
            }
        }));
        let this = Rc::downgrade(self);
        subscriptions.push(self.flush.listen(move |_: &()| {
            if let Some(this) = this.upgrade() {
                if this.epoch.get() == epoch {
                    this.on_flush();
                }
            }
        }));
        *self.subscriptions.borrow_mut() = subscriptions;
    }

    fn on_flush(self: &Rc<Self>) {
        let epoch = self.epoch.get();
        let latest = self.latest.borrow().clone();
        match latest {
            Some(value) => self.store.emit(value),
            None => tracing::trace!("flush before any source event"),
        }
        if self.epoch.get() == epoch {
            self.rearm();
        }
    }

    fn stop(&self) {
        self.epoch.set(self.epoch.get() + 1);
        let subscriptions = take(&mut *self.subscriptions.borrow_mut());
        drop(subscriptions);
    }

    fn rearm(self: &Rc<Self>) {
        self.stop();
        self.fired.set(false);
        self.connect();
    }
}

impl<T: Clone + 'static> FlushJoin<T> {
    pub fn store(&self) -> &Store<T> {
        &self.0.store
    }

    pub fn stop(&self) {
        self.0.stop();
    }

    pub fn rearm(&self) {
        self.0.rearm();
    }

    /// Returns `true` if `source` fired since the last publication.
    pub fn source_fired(&self) -> bool {
        self.0.fired.get()
    }

    pub fn is_armed(&self) -> bool {
        !self.0.subscriptions.borrow().is_empty()
    }
}
impl<T: Clone + 'static> Listenable<T> for FlushJoin<T> {
    fn listen_rc(&self, f: Rc<dyn Fn(&T)>) -> Subscription {
        self.0.store.listen_rc(f)
    }
}
