use std::{cell::RefCell, rc::Rc};

use crate::{
    context::bindings,
    core::Scheduler,
    flow::{after_if, AfterIf},
    Ast, Bindings, ExpressionCompiler, ExpressionState, Store, ValuesFn, VariableContext,
};

/// Value of every node of the current expression, indexed by node id.
///
/// A node whose value could not be computed, or is not finite, is `NaN`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BarValues {
    pub ast: Option<Rc<Ast>>,
    pub values: Vec<f64>,
}

pub(crate) struct Bars {
    store: Store<BarValues>,
    _context: AfterIf<VariableContext>,
}

#[derive(Default)]
struct Valuer {
    ast: Option<Rc<Ast>>,
    values: Option<ValuesFn>,
    bindings: Bindings,
}

impl Valuer {
    fn compute(&self) -> BarValues {
        let Some(ast) = &self.ast else {
            return BarValues::default();
        };
        let len = ast.node_count();
        let values = match &self.values {
            Some(f) => match f(&self.bindings) {
                Ok(values) => values
                    .into_iter()
                    .map(|v| if v.is_finite() { v } else { f64::NAN })
                    .collect(),
                Err(e) => {
                    tracing::debug!(%e, "evaluation failed");
                    vec![f64::NAN; len]
                }
            },
            None => vec![f64::NAN; len],
        };
        BarValues {
            ast: Some(ast.clone()),
            values,
        }
    }
}

impl Bars {
    pub fn new(
        expression: &Store<ExpressionState>,
        context: &Store<VariableContext>,
        compiler: Rc<dyn ExpressionCompiler>,
        scheduler: &Scheduler,
    ) -> Self {
        let context = after_if(expression, context, scheduler);
        let valuer = Rc::new(RefCell::new(Valuer::default()));
        let store = Store::with_init("bars", scheduler, |si| {
            let v = valuer.clone();
            si.listen_to(expression, move |store, e: &ExpressionState| {
                let bars = {
                    let mut v = v.borrow_mut();
                    v.values = e.ast.as_ref().and_then(|ast| {
                        compiler
                            .values_from_ast(ast)
                            .inspect_err(|err| tracing::debug!(%err, "no values"))
                            .ok()
                    });
                    v.ast = e.ast.clone();
                    v.compute()
                };
                store.emit(bars);
            });
            let v = valuer.clone();
            si.listen_to(&context, move |store, c: &VariableContext| {
                let bars = {
                    let mut v = v.borrow_mut();
                    v.bindings = bindings(c);
                    v.compute()
                };
                store.emit(bars);
            });
        });
        Self {
            store,
            _context: context,
        }
    }

    pub fn store(&self) -> &Store<BarValues> {
        &self.store
    }
}
