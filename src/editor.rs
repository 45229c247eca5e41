use std::rc::Rc;

use crate::{
    compiler::evaluate_number,
    core::Scheduler,
    flow::TrailingJoin,
    ContextCache, EditorConfig, EditorState, ExpressionCompiler, Store, VariableContext,
};

mod actions;
mod bars;
mod commit;
mod context_store;
mod expression;
mod url_sync;

pub use actions::EditorActions;
pub use bars::BarValues;
pub use expression::ExpressionState;

use bars::Bars;
use commit::{Commit, ContextChange};
use context_store::ContextStore;
use url_sync::UrlSync;

/// State of one expression editor: the expression, its variables, the bar values and
/// the persisted fragment.
///
/// Every store is created and wired once, by [`Editor::new`].
/// Work is deferred to the [`Runtime`](crate::core::Runtime) owning `scheduler`.
pub struct Editor {
    actions: EditorActions,
    compiler: Rc<dyn ExpressionCompiler>,
    expression: Store<ExpressionState>,
    context: ContextStore,
    context_change: ContextChange,
    commit: Commit,
    vary: TrailingJoin<(VariableContext, String)>,
    bars: Bars,
    url: UrlSync,
}

impl Editor {
    pub fn new(
        compiler: Rc<dyn ExpressionCompiler>,
        config: EditorConfig,
        scheduler: &Scheduler,
    ) -> Self {
        let actions = EditorActions::new(scheduler);
        let expression =
            expression::expression_store(&actions.expression_change, compiler.clone(), scheduler);
        let context = ContextStore::new(&actions, &expression, &config, scheduler);
        let context_change = ContextChange::new(context.store(), config.debounce(), scheduler);
        let commit = Commit::new(
            context_change.store(),
            &expression,
            &actions.context_commit,
            scheduler,
        );
        let vary = commit::vary(context_change.store(), &actions.context_vary, scheduler);
        let bars = Bars::new(&expression, context.store(), compiler.clone(), scheduler);
        let url = UrlSync::new(
            &actions,
            &expression,
            commit.store(),
            compiler.clone(),
            config.debounce(),
            scheduler,
        );
        tracing::debug!(?config, "editor created");
        Self {
            actions,
            compiler,
            expression,
            context,
            context_change,
            commit,
            vary,
            bars,
            url,
        }
    }

    pub fn actions(&self) -> &EditorActions {
        &self.actions
    }

    pub fn expression(&self) -> &Store<ExpressionState> {
        &self.expression
    }

    /// Free variables of the current expression with their settings.
    pub fn context(&self) -> &Store<VariableContext> {
        self.context.store()
    }

    /// Settings of every variable seen so far.
    pub fn context_cache(&self) -> ContextCache {
        self.context.cache()
    }

    /// Context after the quiet period, published only when it changed.
    pub fn context_change(&self) -> &Store<VariableContext> {
        self.context_change.store()
    }

    /// Context to persist.
    pub fn committed(&self) -> &Store<VariableContext> {
        self.commit.store()
    }

    /// Context and name of the variable being dragged.
    pub fn vary(&self) -> &Store<(VariableContext, String)> {
        self.vary.store()
    }

    pub fn bars(&self) -> &Store<BarValues> {
        self.bars.store()
    }

    /// Fragment to persist. Repeats are not published.
    pub fn encoded_state(&self) -> &Store<String> {
        self.url.store()
    }

    /// Current expression text and context.
    pub fn state(&self) -> EditorState {
        EditorState {
            expr: self.expression.get().unwrap_or_default().text,
            context: self.context.current(),
        }
    }

    /// Value of a number input. Anything that is not a finite number is `NaN`.
    pub fn evaluate_number(&self, text: &str) -> f64 {
        evaluate_number(&*self.compiler, text)
    }
}
