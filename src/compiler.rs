use std::rc::Rc;

use indexmap::IndexMap;
use parse_display::Display;

use crate::Ast;

/// Variable values passed to a [`ValuesFn`].
pub type Bindings = IndexMap<String, f64>;

/// Zero-argument evaluator produced by [`ExpressionCompiler::compile_number`].
pub type NumberFn = Box<dyn Fn() -> Result<f64, CompileError>>;

/// Computes one value per node of an AST, indexed by node id.
pub type ValuesFn = Rc<dyn Fn(&Bindings) -> Result<Vec<f64>, CompileError>>;

#[derive(Debug, Display, Clone, PartialEq, Eq)]
#[display("{message} at {position}")]
pub struct CompileError {
    pub position: usize,
    pub message: String,
}
impl CompileError {
    pub fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}
impl std::error::Error for CompileError {}

/// Expression grammar and evaluator used by the editor.
pub trait ExpressionCompiler {
    fn parse(&self, text: &str) -> Result<Ast, CompileError>;

    /// Normalized version of `text` that [`parse`](Self::parse) accepts.
    ///
    /// Must be idempotent.
    fn echo(&self, text: &str) -> Result<String, CompileError>;

    fn compile_number(&self, text: &str) -> Result<NumberFn, CompileError>;

    fn values_from_ast(&self, ast: &Ast) -> Result<ValuesFn, CompileError>;
}

/// Call `f` on `text`, then on shorter and shorter prefixes of it, until it succeeds.
///
/// Returns the first success and the length of the accepted prefix,
/// or `None` once the prefix is empty. `f` is never called with an empty prefix.
fn truncate_until<T>(
    text: &str,
    mut f: impl FnMut(&str) -> Result<T, CompileError>,
) -> Option<(T, usize)> {
    let mut end = text.len();
    while end > 0 {
        let prefix = &text[..end];
        match f(prefix) {
            Ok(value) => return Some((value, end)),
            Err(e) => {
                tracing::trace!(%e, len = end, "rejected prefix");
                end = prefix.char_indices().next_back().map_or(0, |(i, _)| i);
            }
        }
    }
    None
}

/// Sanitize `text` through [`ExpressionCompiler::echo`], dropping trailing characters
/// until the sanitizer accepts it.
///
/// Returns an empty string if no prefix is accepted.
pub fn clean_expr(compiler: &dyn ExpressionCompiler, text: &str) -> String {
    match truncate_until(text, |prefix| compiler.echo(prefix)) {
        Some((clean, len)) => {
            if len < text.len() {
                tracing::warn!(text, accepted = &text[..len], "expression truncated");
            }
            clean
        }
        None => {
            if !text.is_empty() {
                tracing::warn!(text, "expression rejected");
            }
            String::new()
        }
    }
}

/// Sanitize and parse `text`.
///
/// Returns `None` for an empty or unparsable expression.
pub fn parse_expression(compiler: &dyn ExpressionCompiler, text: &str) -> Option<Ast> {
    let clean = clean_expr(compiler, text);
    truncate_until(&clean, |prefix| compiler.parse(prefix)).map(|(ast, _)| ast)
}

/// Evaluate a number input.
///
/// Compile errors, evaluation errors and non-finite results all yield `NaN`.
pub fn evaluate_number(compiler: &dyn ExpressionCompiler, text: &str) -> f64 {
    let value = compiler
        .compile_number(text)
        .and_then(|f| f())
        .unwrap_or_else(|e| {
            tracing::debug!(text, %e, "number input rejected");
            f64::NAN
        });
    if value.is_finite() {
        value
    } else {
        f64::NAN
    }
}
