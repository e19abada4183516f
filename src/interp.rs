//! Tree interpreter: recursive, type-directed evaluation of a bound
//! expression tree against runtime values.
//!
//! The captured values and the instance value are ambient context passed
//! explicitly through [`EvalContext`]; the tree itself stays a pure,
//! context-free description of the computation. Evaluation holds no
//! mutable interpreter state, so one `Interp` may be reused and invoked
//! repeatedly.

use std::collections::HashMap;
use std::rc::Rc;

use crate::descriptor::{PrimType, TypeDesc, OBJECT_CLASS, STRING_CLASS};
use crate::error::EvalError;
use crate::expression::{BinaryOp, Expr, MemberKind, UnaryOp};
use crate::value::{invoke_string, StringBuilder, Value, STRING_BUILDER_CLASS};

/// Ambient context for one evaluation: the flat argument array, the
/// instance value (instance methods only) and the captured values.
pub struct EvalContext<'a> {
    pub args: &'a [Value],
    pub instance: Option<&'a Value>,
    pub captured: &'a [Value],
}

type NativeFn = Rc<dyn Fn(&[Value]) -> Result<Value, EvalError>>;

/// The interpreter. Carries the nominal runtime bindings evaluation needs:
/// constructors by class name, static callables and static fields by
/// `owner.name`. String methods and the string builder are built in.
pub struct Interp {
    constructors: HashMap<String, NativeFn>,
    static_methods: HashMap<String, NativeFn>,
    static_fields: HashMap<String, Value>,
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}

impl Interp {
    pub fn new() -> Interp {
        let mut interp = Interp {
            constructors: HashMap::new(),
            static_methods: HashMap::new(),
            static_fields: HashMap::new(),
        };
        interp.constructors.insert(
            STRING_BUILDER_CLASS.to_string(),
            Rc::new(|args: &[Value]| {
                let initial = match args.first() {
                    Some(v) => v.to_string(),
                    None => String::new(),
                };
                Ok(Value::Object(Rc::new(StringBuilder::new(&initial))))
            }),
        );
        interp.static_methods.insert(
            format!("{}.valueOf", STRING_CLASS),
            Rc::new(|args: &[Value]| match args.first() {
                Some(v) => Ok(Value::Str(v.to_string())),
                None => Err(EvalError::TypeMismatch(
                    "valueOf expects one argument".to_string(),
                )),
            }),
        );
        interp
    }

    /// Register a constructor for a class name.
    pub fn with_constructor(
        mut self,
        class_name: &str,
        f: impl Fn(&[Value]) -> Result<Value, EvalError> + 'static,
    ) -> Interp {
        self.constructors.insert(class_name.to_string(), Rc::new(f));
        self
    }

    /// Register a static callable under `owner.name`.
    pub fn with_static_method(
        mut self,
        owner: &str,
        name: &str,
        f: impl Fn(&[Value]) -> Result<Value, EvalError> + 'static,
    ) -> Interp {
        self.static_methods
            .insert(format!("{}.{}", owner, name), Rc::new(f));
        self
    }

    /// Register a static field value under `owner.name`.
    pub fn with_static_field(mut self, owner: &str, name: &str, value: Value) -> Interp {
        self.static_fields
            .insert(format!("{}.{}", owner, name), value);
        self
    }

    /// Evaluate a bound tree. Each call performs a fresh recursive walk.
    pub fn eval(&self, e: &Expr, ctx: &EvalContext<'_>) -> Result<Value, EvalError> {
        match e {
            Expr::Constant { value, .. } => Ok(constant_value(value)),

            Expr::Parameter { index, .. } => {
                ctx.args
                    .get(*index)
                    .cloned()
                    .ok_or(EvalError::MissingArgument {
                        index: *index,
                        supplied: ctx.args.len(),
                    })
            }

            Expr::CapturedArg { index, .. } => {
                ctx.captured
                    .get(*index)
                    .cloned()
                    .ok_or(EvalError::MissingArgument {
                        index: *index,
                        supplied: ctx.captured.len(),
                    })
            }

            Expr::This { .. } => ctx.instance.cloned().ok_or_else(|| {
                EvalError::TypeMismatch("instance reference without an instance value".to_string())
            }),

            Expr::LocalSlot { index, .. } => Err(EvalError::UnboundSlot(*index)),

            Expr::Member {
                kind: MemberKind::Field,
                target,
                member,
                ..
            } => match target {
                None => self
                    .static_fields
                    .get(&format!("{}.{}", member.owner, member.name))
                    .cloned()
                    .ok_or_else(|| EvalError::NoSuchMember {
                        type_name: member.owner.clone(),
                        member: member.name.clone(),
                    }),
                Some(t) => match self.eval(t, ctx)? {
                    Value::Object(o) => {
                        o.get_field(&member.name)
                            .ok_or_else(|| EvalError::NoSuchMember {
                                type_name: o.type_name().to_string(),
                                member: member.name.clone(),
                            })
                    }
                    Value::Null => Err(EvalError::NullReference(member.name.clone())),
                    other => Err(EvalError::NoSuchMember {
                        type_name: other.kind_name(),
                        member: member.name.clone(),
                    }),
                },
            },

            Expr::Member {
                kind: MemberKind::Method,
                target,
                member,
                args,
                ..
            } => {
                let argv = self.eval_all(args, ctx)?;
                match target {
                    None => {
                        let key = format!("{}.{}", member.owner, member.name);
                        match self.static_methods.get(&key) {
                            Some(f) => f(&argv),
                            None => Err(EvalError::NoSuchMember {
                                type_name: member.owner.clone(),
                                member: member.name.clone(),
                            }),
                        }
                    }
                    Some(t) => match self.eval(t, ctx)? {
                        Value::Str(s) => invoke_string(&s, &member.name, &argv),
                        Value::Object(o) => o.invoke(&member.name, &argv),
                        Value::Null => Err(EvalError::NullReference(member.name.clone())),
                        other => Err(EvalError::NoSuchMember {
                            type_name: other.kind_name(),
                            member: member.name.clone(),
                        }),
                    },
                }
            }

            Expr::LambdaInvoke { target, args, .. } => {
                let argv = self.eval_all(args, ctx)?;
                let inner = EvalContext {
                    args: &argv,
                    instance: ctx.instance,
                    captured: ctx.captured,
                };
                self.eval(target, &inner)
            }

            Expr::New {
                class_name, args, ..
            } => {
                let argv = self.eval_all(args, ctx)?;
                match self.constructors.get(class_name) {
                    Some(f) => f(&argv),
                    None => Err(EvalError::NoSuchMember {
                        type_name: class_name.clone(),
                        member: "<new>".to_string(),
                    }),
                }
            }

            Expr::Convert { operand, target } => {
                let value = self.eval(operand, ctx)?;
                convert_value(value, target)
            }

            Expr::Binary { op, left, right, .. } => {
                let l = self.eval(left, ctx)?;
                let r = self.eval(right, ctx)?;
                eval_binary(*op, l, r)
            }

            Expr::Unary { op, operand, .. } => {
                let v = self.eval(operand, ctx)?;
                eval_unary(*op, v)
            }

            Expr::Conditional {
                test,
                then_expr,
                else_expr,
                ..
            } => match self.eval(test, ctx)? {
                // Only the selected branch is evaluated.
                Value::Bool(true) => self.eval(then_expr, ctx),
                Value::Bool(false) => self.eval(else_expr, ctx),
                other => Err(EvalError::TypeMismatch(format!(
                    "conditional test produced {}",
                    other.kind_name()
                ))),
            },
        }
    }

    fn eval_all(&self, exprs: &[Expr], ctx: &EvalContext<'_>) -> Result<Vec<Value>, EvalError> {
        exprs.iter().map(|e| self.eval(e, ctx)).collect()
    }
}

fn constant_value(c: &crate::instruction::ConstOperand) -> Value {
    use crate::instruction::ConstOperand;
    match c {
        ConstOperand::Null => Value::Null,
        ConstOperand::Bool(v) => Value::Bool(*v),
        ConstOperand::Int(v) => Value::Int(*v),
        ConstOperand::Long(v) => Value::Long(*v),
        ConstOperand::Float(v) => Value::Float(*v),
        ConstOperand::Double(v) => Value::Double(*v),
        ConstOperand::Str(s) => Value::Str(s.clone()),
    }
}

// --- Numeric promotion and operators ---

/// Both operands widened to their common promoted type.
enum Promoted {
    Int(i32, i32),
    Long(i64, i64),
    Float(f32, f32),
    Double(f64, f64),
}

fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Byte(x) => Some(*x as i64),
        Value::Short(x) => Some(*x as i64),
        Value::Char(x) => Some(*x as u32 as i64),
        Value::Int(x) => Some(*x as i64),
        Value::Long(x) => Some(*x),
        _ => None,
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Float(x) => Some(*x as f64),
        Value::Double(x) => Some(*x),
        _ => as_i64(v).map(|x| x as f64),
    }
}

fn promote_pair(l: &Value, r: &Value) -> Option<Promoted> {
    let wide = |v: &Value| matches!(v, Value::Long(_));
    let is_float = |v: &Value| matches!(v, Value::Float(_));
    let is_double = |v: &Value| matches!(v, Value::Double(_));
    if is_double(l) || is_double(r) {
        return Some(Promoted::Double(as_f64(l)?, as_f64(r)?));
    }
    if is_float(l) || is_float(r) {
        return Some(Promoted::Float(as_f64(l)? as f32, as_f64(r)? as f32));
    }
    if wide(l) || wide(r) {
        return Some(Promoted::Long(as_i64(l)?, as_i64(r)?));
    }
    Some(Promoted::Int(as_i64(l)? as i32, as_i64(r)? as i32))
}

fn eval_binary(op: BinaryOp, l: Value, r: Value) -> Result<Value, EvalError> {
    // Boolean logical operators never promote.
    if let (Value::Bool(a), Value::Bool(b)) = (&l, &r) {
        let result = match op {
            BinaryOp::And => *a && *b,
            BinaryOp::Or => *a || *b,
            BinaryOp::Xor => *a ^ *b,
            BinaryOp::Eq => a == b,
            BinaryOp::Ne => a != b,
            _ => {
                return Err(EvalError::TypeMismatch(format!(
                    "operator {} not defined for boolean operands",
                    op.symbol()
                )))
            }
        };
        return Ok(Value::Bool(result));
    }

    // Reference identity comparison.
    if op.is_comparison() && !is_numeric_value(&l) && !is_numeric_value(&r) {
        let equal = l == r;
        return match op {
            BinaryOp::Eq => Ok(Value::Bool(equal)),
            BinaryOp::Ne => Ok(Value::Bool(!equal)),
            _ => Err(EvalError::TypeMismatch(format!(
                "operator {} not defined for {} and {}",
                op.symbol(),
                l.kind_name(),
                r.kind_name()
            ))),
        };
    }

    // Shift distances are masked the way the source type system masks them.
    if matches!(op, BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Ushr) {
        let distance = as_i64(&r).ok_or_else(|| shift_mismatch(&r))? as u32;
        return match l {
            Value::Long(x) => {
                let d = distance & 63;
                Ok(Value::Long(match op {
                    BinaryOp::Shl => x.wrapping_shl(d),
                    BinaryOp::Shr => x.wrapping_shr(d),
                    _ => (x as u64).wrapping_shr(d) as i64,
                }))
            }
            other => {
                let x = as_i64(&other).ok_or_else(|| shift_mismatch(&other))? as i32;
                let d = distance & 31;
                Ok(Value::Int(match op {
                    BinaryOp::Shl => x.wrapping_shl(d),
                    BinaryOp::Shr => x.wrapping_shr(d),
                    _ => (x as u32).wrapping_shr(d) as i32,
                }))
            }
        };
    }

    let promoted = promote_pair(&l, &r).ok_or_else(|| {
        EvalError::TypeMismatch(format!(
            "operator {} not defined for {} and {}",
            op.symbol(),
            l.kind_name(),
            r.kind_name()
        ))
    })?;

    if op.is_comparison() {
        let result = match promoted {
            Promoted::Int(a, b) => compare(op, a.cmp(&b)),
            Promoted::Long(a, b) => compare(op, a.cmp(&b)),
            Promoted::Float(a, b) => float_compare(op, a as f64, b as f64),
            Promoted::Double(a, b) => float_compare(op, a, b),
        };
        return Ok(Value::Bool(result));
    }

    match promoted {
        Promoted::Int(a, b) => int_arith(op, a, b).map(Value::Int),
        Promoted::Long(a, b) => long_arith(op, a, b).map(Value::Long),
        Promoted::Float(a, b) => float_arith(op, a as f64, b as f64).map(|v| Value::Float(v as f32)),
        Promoted::Double(a, b) => float_arith(op, a, b).map(Value::Double),
    }
}

fn shift_mismatch(v: &Value) -> EvalError {
    EvalError::TypeMismatch(format!("shift operand must be integral, got {}", v.kind_name()))
}

fn is_numeric_value(v: &Value) -> bool {
    matches!(
        v,
        Value::Byte(_)
            | Value::Short(_)
            | Value::Char(_)
            | Value::Int(_)
            | Value::Long(_)
            | Value::Float(_)
            | Value::Double(_)
    )
}

fn compare(op: BinaryOp, ordering: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match op {
        BinaryOp::Eq => ordering == Equal,
        BinaryOp::Ne => ordering != Equal,
        BinaryOp::Lt => ordering == Less,
        BinaryOp::Ge => ordering != Less,
        BinaryOp::Gt => ordering == Greater,
        BinaryOp::Le => ordering != Greater,
        _ => false,
    }
}

// NaN comparisons are false for everything except `!=`.
fn float_compare(op: BinaryOp, a: f64, b: f64) -> bool {
    match op {
        BinaryOp::Eq => a == b,
        BinaryOp::Ne => a != b,
        BinaryOp::Lt => a < b,
        BinaryOp::Ge => a >= b,
        BinaryOp::Gt => a > b,
        BinaryOp::Le => a <= b,
        _ => false,
    }
}

fn int_arith(op: BinaryOp, a: i32, b: i32) -> Result<i32, EvalError> {
    match op {
        BinaryOp::Add => Ok(a.wrapping_add(b)),
        BinaryOp::Sub => Ok(a.wrapping_sub(b)),
        BinaryOp::Mul => Ok(a.wrapping_mul(b)),
        BinaryOp::Div => {
            if b == 0 {
                Err(EvalError::DivisionByZero)
            } else {
                Ok(a.wrapping_div(b))
            }
        }
        BinaryOp::Rem => {
            if b == 0 {
                Err(EvalError::DivisionByZero)
            } else {
                Ok(a.wrapping_rem(b))
            }
        }
        BinaryOp::And => Ok(a & b),
        BinaryOp::Or => Ok(a | b),
        BinaryOp::Xor => Ok(a ^ b),
        other => Err(EvalError::TypeMismatch(format!(
            "operator {} not defined for int operands",
            other.symbol()
        ))),
    }
}

fn long_arith(op: BinaryOp, a: i64, b: i64) -> Result<i64, EvalError> {
    match op {
        BinaryOp::Add => Ok(a.wrapping_add(b)),
        BinaryOp::Sub => Ok(a.wrapping_sub(b)),
        BinaryOp::Mul => Ok(a.wrapping_mul(b)),
        BinaryOp::Div => {
            if b == 0 {
                Err(EvalError::DivisionByZero)
            } else {
                Ok(a.wrapping_div(b))
            }
        }
        BinaryOp::Rem => {
            if b == 0 {
                Err(EvalError::DivisionByZero)
            } else {
                Ok(a.wrapping_rem(b))
            }
        }
        BinaryOp::And => Ok(a & b),
        BinaryOp::Or => Ok(a | b),
        BinaryOp::Xor => Ok(a ^ b),
        other => Err(EvalError::TypeMismatch(format!(
            "operator {} not defined for long operands",
            other.symbol()
        ))),
    }
}

fn float_arith(op: BinaryOp, a: f64, b: f64) -> Result<f64, EvalError> {
    match op {
        BinaryOp::Add => Ok(a + b),
        BinaryOp::Sub => Ok(a - b),
        BinaryOp::Mul => Ok(a * b),
        BinaryOp::Div => Ok(a / b),
        BinaryOp::Rem => Ok(a % b),
        other => Err(EvalError::TypeMismatch(format!(
            "operator {} not defined for floating-point operands",
            other.symbol()
        ))),
    }
}

fn eval_unary(op: UnaryOp, v: Value) -> Result<Value, EvalError> {
    match (op, v) {
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Neg, Value::Int(x)) => Ok(Value::Int(x.wrapping_neg())),
        (UnaryOp::Neg, Value::Long(x)) => Ok(Value::Long(x.wrapping_neg())),
        (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnaryOp::Neg, Value::Double(x)) => Ok(Value::Double(-x)),
        (UnaryOp::Neg, v) => match as_i64(&v) {
            // byte/short/char negate through int promotion
            Some(x) => Ok(Value::Int((x as i32).wrapping_neg())),
            None => Err(EvalError::TypeMismatch(format!(
                "operator - not defined for {}",
                v.kind_name()
            ))),
        },
        (UnaryOp::Not, v) => Err(EvalError::TypeMismatch(format!(
            "operator ! not defined for {}",
            v.kind_name()
        ))),
    }
}

// --- Conversions ---

fn invalid_cast(value: &Value, target: &TypeDesc) -> EvalError {
    EvalError::InvalidCast {
        value: value.kind_name(),
        target: target.display_name(),
    }
}

/// Apply a conversion: numeric narrowing/widening for primitive targets,
/// a checked cast for reference targets.
fn convert_value(value: Value, target: &TypeDesc) -> Result<Value, EvalError> {
    match target {
        TypeDesc::Primitive(p) => convert_numeric(&value, *p).ok_or_else(|| invalid_cast(&value, target)),
        TypeDesc::Reference(name) => {
            let ok = match &value {
                Value::Null => true,
                Value::Str(_) => name == STRING_CLASS || name == OBJECT_CLASS,
                Value::Object(o) => o.type_name() == name || name == OBJECT_CLASS,
                _ => false,
            };
            if ok {
                Ok(value)
            } else {
                Err(invalid_cast(&value, target))
            }
        }
        TypeDesc::Array(_) => {
            if value.is_null() {
                Ok(value)
            } else {
                Err(invalid_cast(&value, target))
            }
        }
    }
}

fn convert_numeric(value: &Value, target: PrimType) -> Option<Value> {
    // Integral sources go through i64, floating sources through f64;
    // Rust `as` matches the source semantics (wrap for integral narrowing,
    // saturate and NaN-to-zero for float-to-int).
    enum Src {
        I(i64),
        F(f64),
    }
    let src = match value {
        Value::Float(x) => Src::F(*x as f64),
        Value::Double(x) => Src::F(*x),
        other => Src::I(as_i64(other)?),
    };
    let converted = match target {
        PrimType::Byte => Value::Byte(match src {
            Src::I(x) => x as i8,
            Src::F(x) => (x as i32) as i8,
        }),
        PrimType::Short => Value::Short(match src {
            Src::I(x) => x as i16,
            Src::F(x) => (x as i32) as i16,
        }),
        PrimType::Char => {
            let code = match src {
                Src::I(x) => x as u16,
                Src::F(x) => (x as i32) as u16,
            };
            // Lone surrogates cannot be represented; substitute U+FFFD.
            Value::Char(char::from_u32(code as u32).unwrap_or('\u{FFFD}'))
        }
        PrimType::Int => Value::Int(match src {
            Src::I(x) => x as i32,
            Src::F(x) => x as i32,
        }),
        PrimType::Long => Value::Long(match src {
            Src::I(x) => x,
            Src::F(x) => x as i64,
        }),
        PrimType::Float => Value::Float(match src {
            Src::I(x) => x as f32,
            Src::F(x) => x as f32,
        }),
        PrimType::Double => Value::Double(match src {
            Src::I(x) => x as f64,
            Src::F(x) => x,
        }),
        PrimType::Bool | PrimType::Void => return None,
    };
    Some(converted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(e: &Expr) -> Result<Value, EvalError> {
        Interp::new().eval(
            e,
            &EvalContext {
                args: &[],
                instance: None,
                captured: &[],
            },
        )
    }

    #[test]
    fn wrapping_int_arithmetic() {
        assert_eq!(eval_binary(BinaryOp::Add, Value::Int(i32::MAX), Value::Int(1)),
            Ok(Value::Int(i32::MIN)));
        assert_eq!(
            eval_binary(BinaryOp::Div, Value::Int(i32::MIN), Value::Int(-1)),
            Ok(Value::Int(i32::MIN))
        );
        assert_eq!(
            eval_binary(BinaryOp::Div, Value::Int(1), Value::Int(0)),
            Err(EvalError::DivisionByZero)
        );
    }

    #[test]
    fn promotion_reaches_double() {
        assert_eq!(
            eval_binary(BinaryOp::Add, Value::Int(1), Value::Double(0.5)),
            Ok(Value::Double(1.5))
        );
        assert_eq!(
            eval_binary(BinaryOp::Lt, Value::Byte(1), Value::Long(2)),
            Ok(Value::Bool(true))
        );
    }

    #[test]
    fn shifts_mask_distance() {
        assert_eq!(
            eval_binary(BinaryOp::Shl, Value::Int(1), Value::Int(33)),
            Ok(Value::Int(2))
        );
        assert_eq!(
            eval_binary(BinaryOp::Ushr, Value::Int(-1), Value::Int(28)),
            Ok(Value::Int(0xF))
        );
    }

    #[test]
    fn narrowing_conversions() {
        assert_eq!(convert_numeric(&Value::Int(300), PrimType::Byte), Some(Value::Byte(44)));
        assert_eq!(
            convert_numeric(&Value::Double(f64::NAN), PrimType::Int),
            Some(Value::Int(0))
        );
        assert_eq!(
            convert_numeric(&Value::Double(1e300), PrimType::Int),
            Some(Value::Int(i32::MAX))
        );
        assert_eq!(convert_numeric(&Value::Str("x".into()), PrimType::Int), None);
    }

    #[test]
    fn checked_cast() {
        assert!(convert_value(Value::Null, &TypeDesc::string()).is_ok());
        assert!(convert_value(Value::Str("x".into()), &TypeDesc::string()).is_ok());
        assert!(matches!(
            convert_value(Value::Int(1), &TypeDesc::string()),
            Err(EvalError::InvalidCast { .. })
        ));
    }

    #[test]
    fn missing_argument_reported() {
        let e = Expr::parameter(2, TypeDesc::int());
        assert_eq!(
            eval(&e),
            Err(EvalError::MissingArgument {
                index: 2,
                supplied: 0
            })
        );
    }

    #[test]
    fn unbound_slot_reported() {
        let e = Expr::local_slot(3, TypeDesc::int());
        assert_eq!(eval(&e), Err(EvalError::UnboundSlot(3)));
    }
}
