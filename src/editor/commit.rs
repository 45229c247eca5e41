use std::{cell::RefCell, rc::Rc, time::Duration};

use crate::{
    context::shallow_eq,
    core::Scheduler,
    flow::{debounce, join_flush, join_trailing2, Debounce, FlushJoin, TrailingJoin},
    Action, ExpressionState, Listenable, Store, Subscriptions, VariableContext,
};

/// Context after a quiet period, without repeats.
pub(crate) struct ContextChange {
    store: Store<VariableContext>,
    _debounce: Debounce<VariableContext>,
}

impl ContextChange {
    pub fn new(context: &Store<VariableContext>, delay: Duration, scheduler: &Scheduler) -> Self {
        let debounced = debounce(context, delay, scheduler);
        let previous = RefCell::new(VariableContext::new());
        let store = Store::with_init("context_change", scheduler, |si| {
            si.listen_to(&debounced, move |store, context: &VariableContext| {
                if shallow_eq(context, &previous.borrow()) {
                    return;
                }
                *previous.borrow_mut() = context.clone();
                tracing::debug!(len = context.len(), "context change");
                store.emit(context.clone());
            });
        });
        Self {
            store,
            _debounce: debounced,
        }
    }

    pub fn store(&self) -> &Store<VariableContext> {
        &self.store
    }
}

/// Context to persist.
///
/// A context change is committed together with the next expression change, or right away
/// when `context_commit` fires. Each commit starts a fresh cycle for both triggers.
pub(crate) struct Commit(Rc<CommitNode>);

struct CommitNode {
    store: Store<VariableContext>,
    with_expression: TrailingJoin<(VariableContext, ExpressionState)>,
    with_flush: FlushJoin<VariableContext>,
    subscriptions: RefCell<Subscriptions>,
}

impl CommitNode {
    fn commit(&self, context: &VariableContext, trigger: &str) {
        tracing::debug!(trigger, len = context.len(), "context commit");
        self.with_expression.rearm();
        self.with_flush.rearm();
        self.store.emit(context.clone());
    }
}

impl Commit {
    pub fn new(
        context_change: &Store<VariableContext>,
        expression: &Store<ExpressionState>,
        context_commit: &Action<()>,
        scheduler: &Scheduler,
    ) -> Self {
        let node = Rc::new(CommitNode {
            store: Store::new("context_commit", scheduler),
            with_expression: join_trailing2(context_change, expression, scheduler),
            with_flush: join_flush(context_change, context_commit, scheduler),
            subscriptions: RefCell::new(Subscriptions::new()),
        });
        let mut subscriptions = Subscriptions::new();
        let this = Rc::downgrade(&node);
        subscriptions.push(node.with_expression.listen(move |(context, _)| {
            if let Some(this) = this.upgrade() {
                this.commit(context, "expression");
            }
        }));
        let this = Rc::downgrade(&node);
        subscriptions.push(node.with_flush.listen(move |context| {
            if let Some(this) = this.upgrade() {
                this.commit(context, "flush");
            }
        }));
        *node.subscriptions.borrow_mut() = subscriptions;
        Self(node)
    }

    pub fn store(&self) -> &Store<VariableContext> {
        &self.0.store
    }
}

/// Context of a variable being dragged, published once `context_vary` and a
/// context change have both fired.
pub(crate) fn vary(
    context_change: &Store<VariableContext>,
    context_vary: &Action<String>,
    scheduler: &Scheduler,
) -> TrailingJoin<(VariableContext, String)> {
    join_trailing2(context_change, context_vary, scheduler)
}
