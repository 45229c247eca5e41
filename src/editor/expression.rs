use std::rc::Rc;

use crate::{compiler::parse_expression, core::Scheduler, Action, Ast, ExpressionCompiler, Store};

/// Text of the expression input and its parse tree.
///
/// `ast` is `None` when the text is empty or nothing of it parses.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExpressionState {
    pub text: String,
    pub ast: Option<Rc<Ast>>,
}

pub(crate) fn expression_store(
    expression_change: &Action<String>,
    compiler: Rc<dyn ExpressionCompiler>,
    scheduler: &Scheduler,
) -> Store<ExpressionState> {
    Store::with_init("expression", scheduler, |si| {
        si.listen_to(expression_change, move |store, text: &String| {
            let ast = if text.is_empty() {
                None
            } else {
                parse_expression(&*compiler, text).map(Rc::new)
            };
            tracing::debug!(%text, parsed = ast.is_some(), "expression");
            store.emit(ExpressionState {
                text: text.clone(),
                ast,
            });
        });
    })
}
