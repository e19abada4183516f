//! Reconstructs expression trees from compiled stack-machine method bodies
//! and evaluates them.
//!
//! A compiled lambda's body survives only as an instruction stream. This
//! crate runs an abstract interpretation over that stream, rebuilding the
//! expression the programmer wrote: straight-line code and single-merge
//! conditionals become a tree of typed [`expression::Expr`] nodes, local
//! slots are rebound to parameters and captured arguments, and the result
//! can be rendered, inspected with a visitor, or evaluated against runtime
//! values.
//!
//! The usual entry point is [`lambda::parse_method`]:
//!
//! ```rust
//! use lambda_expr::descriptor::TypeDesc;
//! use lambda_expr::instruction::{ConstOperand, Instruction, MemberRef, MethodFlags, MethodSignature};
//! use lambda_expr::lambda::parse_method;
//!
//! let signature = MethodSignature::new(
//!     Vec::new(),
//!     TypeDesc::string(),
//!     MethodFlags::STATIC | MethodFlags::SYNTHETIC,
//! );
//! let stream = [
//!     Instruction::Const(ConstOperand::Str("Hello World".to_string())),
//!     Instruction::Return,
//! ];
//! let member = MemberRef::new("Example", "lambda$0", "()Ljava/lang/String;");
//! let lambda = parse_method(&member, &signature, &stream, Vec::new()).unwrap();
//! assert_eq!(lambda.to_string(), "()->{Hello World}");
//! ```

pub mod bind;
pub mod descriptor;
pub mod error;
pub mod expression;
pub mod instruction;
pub mod interp;
pub mod lambda;
pub mod reconstruct;
pub mod value;

pub use error::{EvalError, ExprError, ReconstructError};
pub use expression::{BinaryOp, Expr, ExprRewriter, ExprVisitor, MemberKind, UnaryOp};
pub use instruction::{ConstOperand, Instruction, Label, MemberRef, MethodFlags, MethodSignature};
pub use interp::{EvalContext, Interp};
pub use lambda::{parse_method, LambdaValue};
pub use reconstruct::reconstruct;
pub use value::{RuntimeObject, Value};
