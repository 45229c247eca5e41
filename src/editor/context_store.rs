use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use crate::{
    context::{derive_context, shallow_eq},
    core::Scheduler,
    ContextCache, ContextPatch, EditorConfig, ExpressionState, Store, VariableContext,
};

use super::EditorActions;

/// Owner of the variable context and of the cache of past settings.
pub(crate) struct ContextStore {
    store: Store<VariableContext>,
    state: Rc<RefCell<ContextState>>,
}

struct ContextState {
    context: VariableContext,
    cache: ContextCache,
    config: EditorConfig,
    /// Bumped on every change. A deferred publication only runs if it is still the latest.
    generation: u64,
}

impl ContextState {
    /// Returns `false` if `context` is shallow-equal to the current one.
    fn update(&mut self, context: VariableContext) -> bool {
        if shallow_eq(&context, &self.context) {
            return false;
        }
        self.cache.remember(&context);
        self.context = context;
        self.generation += 1;
        true
    }
}

impl ContextStore {
    pub fn new(
        actions: &EditorActions,
        expression: &Store<ExpressionState>,
        config: &EditorConfig,
        scheduler: &Scheduler,
    ) -> Self {
        let state = Rc::new(RefCell::new(ContextState {
            context: VariableContext::new(),
            cache: ContextCache::new(),
            config: config.clone(),
            generation: 0,
        }));
        let store = Store::with_init("context", scheduler, |si| {
            let s = state.clone();
            si.listen_to(expression, move |store, e: &ExpressionState| {
                let changed = {
                    let mut s = s.borrow_mut();
                    let context =
                        derive_context(e.ast.as_deref(), &s.context, &s.cache, &s.config);
                    s.update(context)
                };
                if changed {
                    publish_deferred(store, &s);
                }
            });

            let s = state.clone();
            si.listen_to(
                &actions.context_change,
                move |store, (name, patch): &(String, ContextPatch)| {
                    let changed = {
                        let mut s = s.borrow_mut();
                        let settings = s
                            .context
                            .get(name)
                            .copied()
                            .unwrap_or(s.config.default_variable)
                            .apply(patch);
                        let mut context = s.context.clone();
                        context.insert(name.clone(), settings);
                        s.update(context)
                    };
                    if changed {
                        publish_deferred(store, &s);
                    }
                },
            );

            let s = state.clone();
            si.listen_to(&actions.context_set, move |store, context: &VariableContext| {
                let changed = s.borrow_mut().update(context.clone());
                if changed {
                    tracing::debug!(names = ?context.keys().collect::<Vec<_>>(), "context set");
                    store.emit(context.clone());
                }
            });
        });
        Self { store, state }
    }

    pub fn store(&self) -> &Store<VariableContext> {
        &self.store
    }

    /// Current context, including a change whose publication is still deferred.
    pub fn current(&self) -> VariableContext {
        self.state.borrow().context.clone()
    }

    pub fn cache(&self) -> ContextCache {
        self.state.borrow().cache.clone()
    }
}

/// Publishes the context on the next turn, unless another change comes first.
fn publish_deferred(store: &Store<VariableContext>, state: &Rc<RefCell<ContextState>>) {
    let generation = state.borrow().generation;
    let state = Rc::downgrade(state);
    store.emit_deferred_with(move || latest(&state, generation));
}

fn latest(state: &Weak<RefCell<ContextState>>, generation: u64) -> Option<VariableContext> {
    let state = state.upgrade()?;
    let s = state.borrow();
    if s.generation != generation {
        tracing::trace!(generation, "context publication superseded");
        return None;
    }
    tracing::debug!(names = ?s.context.keys().collect::<Vec<_>>(), "context");
    Some(s.context.clone())
}
