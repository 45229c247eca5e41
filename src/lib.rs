//! Reactive state core of an interactive expression editor.
//!
//! Events flow through [`Action`]s and [`Store`]s, combined with the operators of [`flow`].
//! All deferred work runs on an explicit [`core::Runtime`] with a virtual clock.

mod ast;
pub mod codec;
pub mod compiler;
mod config;
pub mod context;
pub mod core;
mod editor;
mod event;
pub mod flow;
mod stream;
mod subscription;

#[cfg(test)]
mod test_helpers;

pub use ast::*;
pub use codec::{DecodeWarning, Decoded, EditorState};
pub use compiler::{Bindings, CompileError, ExpressionCompiler, NumberFn, ValuesFn};
pub use config::*;
pub use context::{ContextCache, ContextPatch, VariableContext, VariableKind, VariableSettings};
pub use editor::*;
pub use event::*;
pub use stream::*;
pub use subscription::*;
