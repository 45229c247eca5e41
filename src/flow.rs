//! Combinators that coordinate independently firing event sources.

mod after_if;
mod debounce;
mod trailing_join;

pub use after_if::*;
pub use debounce::*;
pub use trailing_join::*;
