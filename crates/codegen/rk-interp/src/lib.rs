//! Tree-walking evaluator
//!
//! Runs expanded programs directly from the declaration tree, so macro
//! output can be checked by executing it. The prelude is passed in like any
//! other file; its bodyless functions are implemented natively.

mod env;
mod error;
mod interpreter;
mod native;
mod value;

pub use env::{Env, Scope};
pub use error::EvalError;
pub use interpreter::Interpreter;
pub use value::{Closure, Object, Value, ValueDisplay};
