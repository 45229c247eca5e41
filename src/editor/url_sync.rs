use std::{cell::RefCell, rc::Rc, time::Duration};

use crate::{
    codec::{decode, encode},
    core::Scheduler,
    flow::{debounce, Debounce},
    EditorState, ExpressionCompiler, ExpressionState, Listenable, Store, Subscriptions,
    VariableContext,
};

use super::EditorActions;

/// Two-way binding between the editor and the persisted fragment.
pub(crate) struct UrlSync(Rc<UrlSyncNode>);

struct UrlSyncNode {
    store: Store<String>,
    state: RefCell<UrlState>,
    expression: Store<ExpressionState>,
    debounced: Debounce<ExpressionState>,
    subscriptions: RefCell<Subscriptions>,
}

#[derive(Default)]
struct UrlState {
    expr: String,
    committed: VariableContext,
    written: Option<String>,
}

impl UrlSyncNode {
    fn write(&self) {
        let encoded = {
            let mut s = self.state.borrow_mut();
            let encoded = encode(&EditorState {
                expr: s.expr.clone(),
                context: s.committed.clone(),
            });
            if s.written.as_ref() == Some(&encoded) {
                tracing::trace!(%encoded, "fragment unchanged");
                return;
            }
            s.written = Some(encoded.clone());
            encoded
        };
        tracing::debug!(%encoded, "fragment written");
        self.store.emit(encoded);
    }
}

impl UrlSync {
    pub fn new(
        actions: &EditorActions,
        expression: &Store<ExpressionState>,
        committed: &Store<VariableContext>,
        compiler: Rc<dyn ExpressionCompiler>,
        delay: Duration,
        scheduler: &Scheduler,
    ) -> Self {
        let node = Rc::new(UrlSyncNode {
            store: Store::new("encoded_state", scheduler),
            state: RefCell::new(UrlState::default()),
            expression: expression.clone(),
            debounced: debounce(expression, delay, scheduler),
            subscriptions: RefCell::new(Subscriptions::new()),
        });
        let mut subscriptions = Subscriptions::new();

        let this = Rc::downgrade(&node);
        subscriptions.push(committed.listen(move |context: &VariableContext| {
            if let Some(this) = this.upgrade() {
                let expr = this.expression.get().unwrap_or_default().text;
                {
                    let mut s = this.state.borrow_mut();
                    s.expr = expr;
                    s.committed = context.clone();
                }
                this.write();
            }
        }));

        let this = Rc::downgrade(&node);
        subscriptions.push(node.debounced.listen(move |e: &ExpressionState| {
            if let Some(this) = this.upgrade() {
                this.state.borrow_mut().expr = e.text.clone();
                this.write();
            }
        }));

        let this = Rc::downgrade(&node);
        let context_set = actions.context_set.clone();
        let expression_change = actions.expression_change.clone();
        subscriptions.push(actions.encoded_state_change.listen(move |fragment: &String| {
            let Some(this) = this.upgrade() else {
                return;
            };
            let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
            let decoded = {
                let mut s = this.state.borrow_mut();
                if s.written.as_deref() == Some(fragment) {
                    tracing::debug!(fragment, "own fragment ignored");
                    return;
                }
                s.written = Some(fragment.to_string());
                decode(fragment, &*compiler)
            };
            tracing::debug!(
                fragment,
                warnings = decoded.warnings.len(),
                "fragment loaded"
            );
            let EditorState { expr, context } = decoded.state;
            context_set.emit(context);
            expression_change.emit(expr);
        }));

        *node.subscriptions.borrow_mut() = subscriptions;
        Self(node)
    }

    pub fn store(&self) -> &Store<String> {
        &self.0.store
    }
}
