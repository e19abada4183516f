//! Failure taxonomy for reconstruction, binding and interpretation.
//!
//! Reconstruction errors are all-or-nothing: a failed reconstruction never
//! yields a partial tree. Interpretation errors propagate to the caller of
//! the compiled callable.

use thiserror::Error;

/// Errors raised by the expression-node factories when a member's or
/// operator's declared signature does not match the supplied operands.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
}

/// Errors raised while reconstructing an expression tree from an
/// instruction stream.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconstructError {
    /// The instruction stream is malformed or truncated.
    #[error("corrupt instruction stream: {0}")]
    CorruptInput(String),

    /// A referenced field or callable cannot be resolved against the
    /// supplied type information.
    #[error("unresolved member {owner}.{name}")]
    UnresolvedMember { owner: String, name: String },

    /// A control shape outside straight-line code and single-merge
    /// conditionals (loops, unstructured jumps, side-effecting stores).
    #[error("unsupported control flow: {0}")]
    UnsupportedControlFlow(String),

    /// A node factory rejected the operands produced by the simulation.
    #[error(transparent)]
    TypeMismatch(#[from] ExprError),
}

/// Errors raised while evaluating a reconstructed tree against runtime
/// values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// A checked conversion failed against the actual runtime value.
    #[error("invalid cast: {value} is not a {target}")]
    InvalidCast { value: String, target: String },

    /// A member lookup failed against the runtime receiver.
    #[error("no member {member} on {type_name}")]
    NoSuchMember { type_name: String, member: String },

    /// A member access or invocation on a null receiver.
    #[error("null reference in {0}")]
    NullReference(String),

    /// Integral division or remainder by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// An operand's runtime kind does not fit the operation.
    #[error("type mismatch during evaluation: {0}")]
    TypeMismatch(String),

    /// The flat argument array is shorter than a referenced index.
    #[error("argument {index} missing ({supplied} supplied)")]
    MissingArgument { index: usize, supplied: usize },

    /// An unbound local-slot reference reached the interpreter; the tree
    /// was never passed through the capture binder.
    #[error("unbound local slot {0}")]
    UnboundSlot(u16),
}
