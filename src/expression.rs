//! Expression-tree node model, validating factories, traversal seams and
//! the textual rendering contract.
//!
//! Nodes are immutable and built bottom-up; a node never aliases an
//! ancestor. Rewrites (such as capture binding) are copying traversals that
//! produce a fresh tree, so a raw tree stays valid after a bound copy is
//! derived from it.

use std::fmt;

use crate::descriptor::{
    binary_promotion, common_type, internal_to_source_name, unary_promotion, PrimType, TypeDesc,
};
use crate::error::ExprError;
use crate::instruction::{ConstOperand, MemberRef};

/// Binary operators: arithmetic, bitwise/logical, comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    Ushr,
    And,
    Or,
    Xor,
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Ge | BinaryOp::Gt | BinaryOp::Le
        )
    }

    /// Source token for this operator.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Ushr => ">>>",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Ge => ">=",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
        }
    }
}

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    /// Numeric negation.
    Neg,
    /// Boolean complement.
    Not,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

/// Whether a member access is a field read or a callable invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Method,
}

/// Expression tree node. Each node carries its result type; see
/// [`Expr::result_type`].
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// A fixed value baked into the instruction stream.
    Constant { value: ConstOperand, ty: TypeDesc },
    /// The i-th formal parameter of the reconstructed method.
    Parameter { index: usize, ty: TypeDesc },
    /// The i-th value captured at lambda-creation time.
    CapturedArg { index: usize, ty: TypeDesc },
    /// The implicit receiver of an instance method.
    This { ty: TypeDesc },
    /// An unresolved local-variable slot reference; only present before
    /// binding.
    LocalSlot { index: u16, ty: TypeDesc },
    /// Field read or callable invocation. `target` is absent for static
    /// members; `param_types` is empty for fields.
    Member {
        kind: MemberKind,
        target: Option<Box<Expr>>,
        member: MemberRef,
        param_types: Vec<TypeDesc>,
        ty: TypeDesc,
        args: Vec<Expr>,
    },
    /// Invocation of a reconstructed lambda body inline; the target tree is
    /// evaluated against the argument list as its parameter array.
    LambdaInvoke {
        target: Box<Expr>,
        param_types: Vec<TypeDesc>,
        args: Vec<Expr>,
    },
    /// Object construction.
    New {
        class_name: String,
        param_types: Vec<TypeDesc>,
        args: Vec<Expr>,
    },
    /// Widening, narrowing or checked type conversion.
    Convert { operand: Box<Expr>, target: TypeDesc },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        ty: TypeDesc,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        ty: TypeDesc,
    },
    /// Ternary selection; only the selected branch is evaluated.
    Conditional {
        test: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
        ty: TypeDesc,
    },
}

impl Expr {
    /// The semantic type of the value this node produces.
    pub fn result_type(&self) -> TypeDesc {
        match self {
            Expr::Constant { ty, .. }
            | Expr::Parameter { ty, .. }
            | Expr::CapturedArg { ty, .. }
            | Expr::This { ty }
            | Expr::LocalSlot { ty, .. }
            | Expr::Member { ty, .. }
            | Expr::Binary { ty, .. }
            | Expr::Unary { ty, .. }
            | Expr::Conditional { ty, .. } => ty.clone(),
            Expr::LambdaInvoke { target, .. } => target.result_type(),
            Expr::New { class_name, .. } => TypeDesc::Reference(class_name.clone()),
            Expr::Convert { target, .. } => target.clone(),
        }
    }

    // --- Construction factories ---

    /// A constant node; the result type is derived from the literal.
    pub fn constant(value: ConstOperand) -> Expr {
        let ty = match &value {
            ConstOperand::Null => TypeDesc::object(),
            ConstOperand::Bool(_) => TypeDesc::boolean(),
            ConstOperand::Int(_) => TypeDesc::int(),
            ConstOperand::Long(_) => TypeDesc::Primitive(PrimType::Long),
            ConstOperand::Float(_) => TypeDesc::Primitive(PrimType::Float),
            ConstOperand::Double(_) => TypeDesc::Primitive(PrimType::Double),
            ConstOperand::Str(_) => TypeDesc::string(),
        };
        Expr::Constant { value, ty }
    }

    pub fn parameter(index: usize, ty: TypeDesc) -> Expr {
        Expr::Parameter { index, ty }
    }

    pub fn captured_arg(index: usize, ty: TypeDesc) -> Expr {
        Expr::CapturedArg { index, ty }
    }

    pub fn this(ty: TypeDesc) -> Expr {
        Expr::This { ty }
    }

    pub fn local_slot(index: u16, ty: TypeDesc) -> Expr {
        Expr::LocalSlot { index, ty }
    }

    /// A field read.
    pub fn field(target: Option<Expr>, member: MemberRef, ty: TypeDesc) -> Expr {
        Expr::Member {
            kind: MemberKind::Field,
            target: target.map(Box::new),
            member,
            param_types: Vec::new(),
            ty,
            args: Vec::new(),
        }
    }

    /// A callable invocation; fails when the argument count does not match
    /// the declared parameter list.
    pub fn call(
        target: Option<Expr>,
        member: MemberRef,
        param_types: Vec<TypeDesc>,
        ty: TypeDesc,
        args: Vec<Expr>,
    ) -> Result<Expr, ExprError> {
        if args.len() != param_types.len() {
            return Err(ExprError::TypeMismatch(format!(
                "{}.{} declares {} parameter(s), got {} argument(s)",
                member.owner,
                member.name,
                param_types.len(),
                args.len()
            )));
        }
        Ok(Expr::Member {
            kind: MemberKind::Method,
            target: target.map(Box::new),
            member,
            param_types,
            ty,
            args,
        })
    }

    /// Inline invocation of a lambda body.
    pub fn invoke_lambda(
        target: Expr,
        param_types: Vec<TypeDesc>,
        args: Vec<Expr>,
    ) -> Result<Expr, ExprError> {
        if args.len() != param_types.len() {
            return Err(ExprError::TypeMismatch(format!(
                "lambda invocation declares {} parameter(s), got {} argument(s)",
                param_types.len(),
                args.len()
            )));
        }
        Ok(Expr::LambdaInvoke {
            target: Box::new(target),
            param_types,
            args,
        })
    }

    /// Object construction.
    pub fn new_object(
        class_name: String,
        param_types: Vec<TypeDesc>,
        args: Vec<Expr>,
    ) -> Result<Expr, ExprError> {
        if args.len() != param_types.len() {
            return Err(ExprError::TypeMismatch(format!(
                "{} constructor declares {} parameter(s), got {} argument(s)",
                class_name,
                param_types.len(),
                args.len()
            )));
        }
        Ok(Expr::New {
            class_name,
            param_types,
            args,
        })
    }

    /// A type conversion. Converting to the operand's own type is the
    /// identity and returns the operand unchanged.
    pub fn convert(operand: Expr, target: TypeDesc) -> Expr {
        if operand.result_type() == target {
            return operand;
        }
        Expr::Convert {
            operand: Box::new(operand),
            target,
        }
    }

    /// A binary operation; the result type follows binary numeric promotion,
    /// comparisons produce boolean.
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Result<Expr, ExprError> {
        let lt = left.result_type();
        let rt = right.result_type();
        let ty = binary_result_type(op, &lt, &rt).ok_or_else(|| {
            ExprError::TypeMismatch(format!(
                "operator {} not defined for {} and {}",
                op.symbol(),
                lt.display_name(),
                rt.display_name()
            ))
        })?;
        Ok(Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            ty,
        })
    }

    /// A unary operation; negation requires a numeric operand, complement a
    /// boolean one.
    pub fn unary(op: UnaryOp, operand: Expr) -> Result<Expr, ExprError> {
        let ot = operand.result_type();
        let ty = match op {
            UnaryOp::Neg => unary_promotion(&ot),
            UnaryOp::Not => ot.is_boolean().then(TypeDesc::boolean),
        }
        .ok_or_else(|| {
            ExprError::TypeMismatch(format!(
                "operator {} not defined for {}",
                op.symbol(),
                ot.display_name()
            ))
        })?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
            ty,
        })
    }

    /// A ternary selection; the test must be boolean and the branches must
    /// share a common result type, which becomes the node's own type.
    pub fn conditional(test: Expr, then_expr: Expr, else_expr: Expr) -> Result<Expr, ExprError> {
        if !test.result_type().is_boolean() {
            return Err(ExprError::TypeMismatch(format!(
                "conditional test must be boolean, got {}",
                test.result_type().display_name()
            )));
        }
        let tt = then_expr.result_type();
        let et = else_expr.result_type();
        let ty = common_type(&tt, &et).ok_or_else(|| {
            ExprError::TypeMismatch(format!(
                "conditional branches have no common type: {} vs {}",
                tt.display_name(),
                et.display_name()
            ))
        })?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
            ty,
        })
    }

    /// Double-dispatch entry point for read-only traversals.
    pub fn accept<V: ExprVisitor + ?Sized>(&self, visitor: &mut V) {
        visitor.visit_expr(self);
    }
}

fn binary_result_type(op: BinaryOp, lt: &TypeDesc, rt: &TypeDesc) -> Option<TypeDesc> {
    if op.is_comparison() {
        if lt.is_numeric() && rt.is_numeric() {
            return Some(TypeDesc::boolean());
        }
        // Reference identity comparison.
        if matches!(op, BinaryOp::Eq | BinaryOp::Ne) && lt.is_reference() && rt.is_reference() {
            return Some(TypeDesc::boolean());
        }
        return None;
    }
    match op {
        BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Ushr => {
            let pl = lt.as_primitive()?;
            let pr = rt.as_primitive()?;
            if !pl.is_integral() || !pr.is_integral() {
                return None;
            }
            unary_promotion(lt)
        }
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
            if lt.is_boolean() && rt.is_boolean() {
                return Some(TypeDesc::boolean());
            }
            let pl = lt.as_primitive()?;
            let pr = rt.as_primitive()?;
            if !pl.is_integral() || !pr.is_integral() {
                return None;
            }
            binary_promotion(lt, rt)
        }
        _ => binary_promotion(lt, rt),
    }
}

/// Read-only traversal over an expression tree. Override `visit_expr` and
/// delegate to [`walk_expr`] for the children you do not handle.
pub trait ExprVisitor {
    fn visit_expr(&mut self, e: &Expr) {
        walk_expr(self, e);
    }
}

/// Visit every child of `e` in evaluation order.
pub fn walk_expr<V: ExprVisitor + ?Sized>(visitor: &mut V, e: &Expr) {
    match e {
        Expr::Constant { .. }
        | Expr::Parameter { .. }
        | Expr::CapturedArg { .. }
        | Expr::This { .. }
        | Expr::LocalSlot { .. } => {}
        Expr::Member { target, args, .. } => {
            if let Some(t) = target {
                visitor.visit_expr(t);
            }
            for a in args {
                visitor.visit_expr(a);
            }
        }
        Expr::LambdaInvoke { target, args, .. } => {
            visitor.visit_expr(target);
            for a in args {
                visitor.visit_expr(a);
            }
        }
        Expr::New { args, .. } => {
            for a in args {
                visitor.visit_expr(a);
            }
        }
        Expr::Convert { operand, .. } => visitor.visit_expr(operand),
        Expr::Binary { left, right, .. } => {
            visitor.visit_expr(left);
            visitor.visit_expr(right);
        }
        Expr::Unary { operand, .. } => visitor.visit_expr(operand),
        Expr::Conditional {
            test,
            then_expr,
            else_expr,
            ..
        } => {
            visitor.visit_expr(test);
            visitor.visit_expr(then_expr);
            visitor.visit_expr(else_expr);
        }
    }
}

/// Copying rewrite over an expression tree. Override `rewrite_expr` for the
/// variants you transform and delegate to [`rewrite_children`] for the rest;
/// the default rebuilds the tree structurally unchanged.
pub trait ExprRewriter {
    fn rewrite_expr(&mut self, e: &Expr) -> Expr {
        rewrite_children(self, e)
    }
}

/// Rebuild `e` with every child passed through the rewriter.
pub fn rewrite_children<R: ExprRewriter + ?Sized>(rewriter: &mut R, e: &Expr) -> Expr {
    match e {
        Expr::Constant { .. }
        | Expr::Parameter { .. }
        | Expr::CapturedArg { .. }
        | Expr::This { .. }
        | Expr::LocalSlot { .. } => e.clone(),
        Expr::Member {
            kind,
            target,
            member,
            param_types,
            ty,
            args,
        } => Expr::Member {
            kind: *kind,
            target: target
                .as_ref()
                .map(|t| Box::new(rewriter.rewrite_expr(t))),
            member: member.clone(),
            param_types: param_types.clone(),
            ty: ty.clone(),
            args: args.iter().map(|a| rewriter.rewrite_expr(a)).collect(),
        },
        Expr::LambdaInvoke {
            target,
            param_types,
            args,
        } => Expr::LambdaInvoke {
            target: Box::new(rewriter.rewrite_expr(target)),
            param_types: param_types.clone(),
            args: args.iter().map(|a| rewriter.rewrite_expr(a)).collect(),
        },
        Expr::New {
            class_name,
            param_types,
            args,
        } => Expr::New {
            class_name: class_name.clone(),
            param_types: param_types.clone(),
            args: args.iter().map(|a| rewriter.rewrite_expr(a)).collect(),
        },
        Expr::Convert { operand, target } => Expr::Convert {
            operand: Box::new(rewriter.rewrite_expr(operand)),
            target: target.clone(),
        },
        Expr::Binary { op, left, right, ty } => Expr::Binary {
            op: *op,
            left: Box::new(rewriter.rewrite_expr(left)),
            right: Box::new(rewriter.rewrite_expr(right)),
            ty: ty.clone(),
        },
        Expr::Unary { op, operand, ty } => Expr::Unary {
            op: *op,
            operand: Box::new(rewriter.rewrite_expr(operand)),
            ty: ty.clone(),
        },
        Expr::Conditional {
            test,
            then_expr,
            else_expr,
            ty,
        } => Expr::Conditional {
            test: Box::new(rewriter.rewrite_expr(test)),
            then_expr: Box::new(rewriter.rewrite_expr(then_expr)),
            else_expr: Box::new(rewriter.rewrite_expr(else_expr)),
            ty: ty.clone(),
        },
    }
}

// --- Rendering ---
//
// The textual form is an observable contract: P{i} parameters, A{i}
// captured arguments, `this` receivers, `Type.<new>(args)` construction,
// bare (unquoted) constants.

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Expr]) -> fmt::Result {
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", a)?;
    }
    Ok(())
}

impl fmt::Display for ConstOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstOperand::Null => write!(f, "null"),
            ConstOperand::Bool(b) => write!(f, "{}", b),
            ConstOperand::Int(v) => write!(f, "{}", v),
            ConstOperand::Long(v) => write!(f, "{}", v),
            ConstOperand::Float(v) => write!(f, "{}", v),
            ConstOperand::Double(v) => write!(f, "{}", v),
            ConstOperand::Str(s) => write!(f, "{}", s),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Constant { value, .. } => write!(f, "{}", value),
            Expr::Parameter { index, .. } => write!(f, "P{}", index),
            Expr::CapturedArg { index, .. } => write!(f, "A{}", index),
            Expr::This { .. } => write!(f, "this"),
            Expr::LocalSlot { index, .. } => write!(f, "L{}", index),
            Expr::Member {
                target,
                member,
                args,
                ..
            } => {
                match target {
                    Some(t) => write!(f, "{}", t)?,
                    None => write!(f, "{}", internal_to_source_name(&member.owner))?,
                }
                write!(f, ".{}(", member.name)?;
                write_args(f, args)?;
                write!(f, ")")
            }
            Expr::LambdaInvoke { target, args, .. } => {
                write!(f, "{}(", target)?;
                write_args(f, args)?;
                write!(f, ")")
            }
            Expr::New {
                class_name, args, ..
            } => {
                write!(f, "{}.<new>(", internal_to_source_name(class_name))?;
                write_args(f, args)?;
                write!(f, ")")
            }
            Expr::Convert { operand, target } => {
                write!(f, "({}){}", target.display_name(), operand)
            }
            Expr::Binary { op, left, right, .. } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::Unary { op, operand, .. } => write!(f, "{}{}", op.symbol(), operand),
            Expr::Conditional {
                test,
                then_expr,
                else_expr,
                ..
            } => write!(f, "({} ? {} : {})", test, then_expr, else_expr),
        }
    }
}
