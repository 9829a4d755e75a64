//! Evaluation errors

use thiserror::Error;

/// Runtime failure of an evaluated program
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// A name that is neither a local, a property nor a class
    #[error("unresolved name `{name}`")]
    UnresolvedName {
        /// The name
        name: String,
    },
    /// No function, member or constructor accepts the call
    #[error("no callable `{name}` accepts these arguments")]
    UnresolvedCall {
        /// Callee name
        name: String,
    },
    /// An operand has the wrong runtime type
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Expected kind of value
        expected: &'static str,
        /// Value found
        found: String,
    },
    /// Integer division or remainder by zero
    #[error("division by zero")]
    DivisionByZero,
    /// `!!` applied to `null`
    #[error("`!!` applied to null")]
    NullDereference,
    /// List index outside the list
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// Requested index
        index: i64,
        /// List length
        len: usize,
    },
    /// Argument list does not fit the parameters
    #[error("invalid arguments for `{function}`: {reason}")]
    ArgumentMismatch {
        /// Callee name
        function: String,
        /// What did not fit
        reason: String,
    },
    /// A thrown value reached the entry point
    #[error("uncaught {class}: {message}")]
    Uncaught {
        /// Class of the thrown value
        class: String,
        /// Its message, or `null`
        message: String,
    },
    /// `break` or `continue` outside a loop, or `return` outside a function
    #[error("`{keyword}` outside of its construct")]
    StrayJump {
        /// The jump keyword
        keyword: &'static str,
    },
    /// Call nesting exceeded the limit
    #[error("call depth exceeded {limit}")]
    StackOverflow {
        /// Maximum depth
        limit: usize,
    },
    /// A construct the evaluator does not run
    #[error("unsupported: {0}")]
    Unsupported(String),
}
