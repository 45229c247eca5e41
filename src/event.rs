use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    mem::take,
    rc::Rc,
};

use derive_ex::derive_ex;

use crate::{core::Scheduler, stream::ListenStream, Subscription, Subscriptions};


/// Listener list dispatched in subscription order.
///
/// Each dispatch iterates a snapshot, so listeners may subscribe, unsubscribe
/// or re-emit while being notified.
pub(crate) struct Listeners<T: 'static> {
    items: RefCell<BTreeMap<u64, Rc<dyn Fn(&T)>>>,
    next_id: Cell<u64>,
}
impl<T: 'static> Listeners<T> {
    pub fn new() -> Self {
        Self {
            items: RefCell::new(BTreeMap::new()),
            next_id: Cell::new(0),
        }
    }
    pub fn insert(&self, f: Rc<dyn Fn(&T)>) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.items.borrow_mut().insert(id, f);
        id
    }
    pub fn remove(&self, id: u64) {
        self.items.borrow_mut().remove(&id);
    }
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }
    pub fn notify(&self, value: &T) {
        let snapshot: Vec<_> = self.items.borrow().values().cloned().collect();
        for f in snapshot {
            f(value);
        }
    }
}

/// A source of events that listeners can subscribe to.
pub trait Listenable<T: 'static> {
    fn listen_rc(&self, f: Rc<dyn Fn(&T)>) -> Subscription;

    /// Calls `f` for every event until the returned [`Subscription`] is dropped.
    fn listen(&self, f: impl Fn(&T) + 'static) -> Subscription
    where
        Self: Sized,
    {
        self.listen_rc(Rc::new(f))
    }

    /// Exposes the events as a [`futures::Stream`].
    fn to_stream(&self) -> ListenStream<T>
    where
        Self: Sized,
        T: Clone,
    {
        ListenStream::new(self)
    }
}

/// Subscribes through a cloned source handle, so that a combinator can re-subscribe later.
pub(crate) type Connect<T> = Rc<dyn Fn(Rc<dyn Fn(&T)>) -> Subscription>;

pub(crate) fn connector<T: 'static>(source: &(impl Listenable<T> + Clone + 'static)) -> Connect<T> {
    let source = source.clone();
    Rc::new(move |f| source.listen_rc(f))
}

/// Stateless named event channel.
#[derive_ex(Clone, bound())]
pub struct Action<A: 'static>(Rc<ActionNode<A>>);

struct ActionNode<A: 'static> {
    name: String,
    listeners: Listeners<A>,
    scheduler: Scheduler,
}

impl<A: 'static> Action<A> {
    pub fn new(name: impl Into<String>, scheduler: &Scheduler) -> Self {
        Self(Rc::new(ActionNode {
            name: name.into(),
            listeners: Listeners::new(),
            scheduler: scheduler.clone(),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Notifies every current listener before returning.
    pub fn emit(&self, args: A) {
        self.0.listeners.notify(&args);
    }

    /// Notifies the listeners on the next turn of the loop.
    pub fn emit_deferred(&self, args: A) {
        let node = Rc::downgrade(&self.0);
        self.0.scheduler.spawn(move || {
            if let Some(node) = node.upgrade() {
                node.listeners.notify(&args);
            }
        });
    }

    pub fn listener_count(&self) -> usize {
        self.0.listeners.len()
    }
}
impl<A: 'static> Listenable<A> for Action<A> {
    fn listen_rc(&self, f: Rc<dyn Fn(&A)>) -> Subscription {
        let id = self.0.listeners.insert(f);
        Subscription::from_weak_fn(Rc::downgrade(&self.0), move |node| {
            node.listeners.remove(id)
        })
    }
}
impl<A: 'static> std::fmt::Debug for Action<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Action({})", self.0.name)
    }
}

/// Named event channel that remembers the last published value.
#[derive_ex(Clone, bound())]
pub struct Store<T: 'static>(Rc<StoreNode<T>>);

struct StoreNode<T: 'static> {
    name: String,
    listeners: Listeners<T>,
    value: RefCell<Option<T>>,
    scheduler: Scheduler,
    sources: RefCell<Subscriptions>,
}

impl<T: Clone + 'static> Store<T> {
    pub fn new(name: impl Into<String>, scheduler: &Scheduler) -> Self {
        Self(Rc::new(StoreNode {
            name: name.into(),
            listeners: Listeners::new(),
            value: RefCell::new(None),
            scheduler: scheduler.clone(),
            sources: RefCell::new(Subscriptions::new()),
        }))
    }

    /// Create a store whose `init` hook subscribes it to its sources.
    ///
    /// The subscriptions live as long as the store, or until [`stop`](Self::stop) is called.
    pub fn with_init(
        name: impl Into<String>,
        scheduler: &Scheduler,
        init: impl FnOnce(&mut StoreInit<T>),
    ) -> Self {
        let store = Self::new(name, scheduler);
        let mut si = StoreInit {
            store: &store,
            sources: Subscriptions::new(),
        };
        init(&mut si);
        let sources = take(&mut si.sources);
        *store.0.sources.borrow_mut() = sources;
        store
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Last published value.
    pub fn get(&self) -> Option<T> {
        self.0.value.borrow().clone()
    }

    /// Remembers `value` and notifies every current listener before returning.
    pub fn emit(&self, value: T) {
        *self.0.value.borrow_mut() = Some(value.clone());
        self.0.listeners.notify(&value);
    }

    /// Remembers and publishes `value` on the next turn of the loop.
    pub fn emit_deferred(&self, value: T) {
        let node = Rc::downgrade(&self.0);
        self.0.scheduler.spawn(move || {
            if let Some(node) = node.upgrade() {
                Store(node).emit(value);
            }
        });
    }

    /// On the next turn of the loop, publishes the value `f` returns then, if any.
    pub fn emit_deferred_with(&self, f: impl FnOnce() -> Option<T> + 'static) {
        let node = Rc::downgrade(&self.0);
        self.0.scheduler.spawn(move || {
            if let Some(node) = node.upgrade() {
                if let Some(value) = f() {
                    Store(node).emit(value);
                }
            }
        });
    }

    pub fn listener_count(&self) -> usize {
        self.0.listeners.len()
    }

    /// Detaches the store from the sources subscribed by its init hook.
    pub fn stop(&self) {
        let sources = take(&mut *self.0.sources.borrow_mut());
        drop(sources);
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.0.scheduler
    }
}
impl<T: 'static> Listenable<T> for Store<T> {
    fn listen_rc(&self, f: Rc<dyn Fn(&T)>) -> Subscription {
        let id = self.0.listeners.insert(f);
        Subscription::from_weak_fn(Rc::downgrade(&self.0), move |node| {
            node.listeners.remove(id)
        })
    }
}
impl<T: std::fmt::Debug + 'static> std::fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.value.try_borrow() {
            Ok(value) => write!(f, "Store({}, {:?})", self.0.name, &*value),
            Err(_) => write!(f, "Store({}, <borrowed>)", self.0.name),
        }
    }
}

/// Handle given to the init hook of [`Store::with_init`].
pub struct StoreInit<'a, T: 'static> {
    store: &'a Store<T>,
    sources: Subscriptions,
}
impl<T: Clone + 'static> StoreInit<'_, T> {
    pub fn store(&self) -> &Store<T> {
        self.store
    }

    /// Calls `handler` with the store and the payload of every event of `source`.
    pub fn listen_to<U: 'static>(
        &mut self,
        source: &impl Listenable<U>,
        handler: impl Fn(&Store<T>, &U) + 'static,
    ) {
        let this = Rc::downgrade(&self.store.0);
        self.sources.push(source.listen(move |value| {
            if let Some(node) = this.upgrade() {
                handler(&Store(node), value);
            }
        }));
    }
}
