//! Runtime value representation and the object-dispatch seam used by the
//! tree interpreter.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::EvalError;

/// A runtime object the interpreter can read fields from and invoke
/// callables on. Implementations own their state; field reads observe the
/// state at call time, not at capture time.
pub trait RuntimeObject {
    /// Internal type name, matched nominally by checked casts.
    fn type_name(&self) -> &str;

    /// Read a field's current value.
    fn get_field(&self, name: &str) -> Option<Value>;

    /// Invoke a callable on this object.
    fn invoke(self: Rc<Self>, name: &str, args: &[Value]) -> Result<Value, EvalError>;
}

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Char(char),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Object(Rc<dyn RuntimeObject>),
}

impl Value {
    /// Short kind name for diagnostics.
    pub fn kind_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "boolean".to_string(),
            Value::Byte(_) => "byte".to_string(),
            Value::Short(_) => "short".to_string(),
            Value::Char(_) => "char".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Long(_) => "long".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Double(_) => "double".to_string(),
            Value::Str(_) => "string".to_string(),
            Value::Object(o) => o.type_name().to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(v) => write!(f, "Bool({})", v),
            Value::Byte(v) => write!(f, "Byte({})", v),
            Value::Short(v) => write!(f, "Short({})", v),
            Value::Char(v) => write!(f, "Char({:?})", v),
            Value::Int(v) => write!(f, "Int({})", v),
            Value::Long(v) => write!(f, "Long({})", v),
            Value::Float(v) => write!(f, "Float({})", v),
            Value::Double(v) => write!(f, "Double({})", v),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Object(o) => write!(f, "Object({})", o.type_name()),
        }
    }
}

// Floats compare by bit pattern (NaN-safe); objects compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// String conversion used by `append`, `valueOf` and `concat` built-ins.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{}", s),
            Value::Object(o) => write!(f, "{}", o.type_name()),
        }
    }
}

fn no_such_member(type_name: &str, member: &str) -> EvalError {
    EvalError::NoSuchMember {
        type_name: type_name.to_string(),
        member: member.to_string(),
    }
}

fn string_arg(args: &[Value], index: usize, member: &str) -> Result<String, EvalError> {
    match args.get(index) {
        Some(v) => Ok(v.to_string()),
        None => Err(EvalError::TypeMismatch(format!(
            "{} expects an argument at position {}",
            member, index
        ))),
    }
}

fn int_arg(args: &[Value], index: usize, member: &str) -> Result<i32, EvalError> {
    match args.get(index) {
        Some(Value::Int(v)) => Ok(*v),
        Some(other) => Err(EvalError::TypeMismatch(format!(
            "{} expects an int argument, got {}",
            member,
            other.kind_name()
        ))),
        None => Err(EvalError::TypeMismatch(format!(
            "{} expects an argument at position {}",
            member, index
        ))),
    }
}

/// Built-in string methods: how the interpreter invokes callables on a
/// `Value::Str` receiver.
pub fn invoke_string(receiver: &str, name: &str, args: &[Value]) -> Result<Value, EvalError> {
    match name {
        "concat" => {
            let other = string_arg(args, 0, "concat")?;
            Ok(Value::Str(format!("{}{}", receiver, other)))
        }
        "length" => Ok(Value::Int(receiver.chars().count() as i32)),
        "isEmpty" => Ok(Value::Bool(receiver.is_empty())),
        "charAt" => {
            let index = int_arg(args, 0, "charAt")?;
            receiver
                .chars()
                .nth(index as usize)
                .map(Value::Char)
                .ok_or_else(|| {
                    EvalError::TypeMismatch(format!(
                        "charAt index {} out of bounds for length {}",
                        index,
                        receiver.chars().count()
                    ))
                })
        }
        "substring" => {
            let begin = int_arg(args, 0, "substring")? as usize;
            let end = match args.get(1) {
                Some(_) => int_arg(args, 1, "substring")? as usize,
                None => receiver.chars().count(),
            };
            let s: String = receiver
                .chars()
                .skip(begin)
                .take(end.saturating_sub(begin))
                .collect();
            Ok(Value::Str(s))
        }
        "startsWith" => {
            let prefix = string_arg(args, 0, "startsWith")?;
            Ok(Value::Bool(receiver.starts_with(&prefix)))
        }
        "endsWith" => {
            let suffix = string_arg(args, 0, "endsWith")?;
            Ok(Value::Bool(receiver.ends_with(&suffix)))
        }
        "equals" => {
            let other = match args.first() {
                Some(Value::Str(s)) => s == receiver,
                _ => false,
            };
            Ok(Value::Bool(other))
        }
        "toString" => Ok(Value::Str(receiver.to_string())),
        other => Err(no_such_member("java/lang/String", other)),
    }
}

/// Internal name of the built-in string builder.
pub const STRING_BUILDER_CLASS: &str = "java/lang/StringBuilder";

/// The mutable string-builder object compiled string concatenation relies
/// on. `append` returns the receiver so chained appends thread through.
pub struct StringBuilder {
    buf: RefCell<String>,
}

impl StringBuilder {
    pub fn new(initial: &str) -> StringBuilder {
        StringBuilder {
            buf: RefCell::new(initial.to_string()),
        }
    }
}

impl RuntimeObject for StringBuilder {
    fn type_name(&self) -> &str {
        STRING_BUILDER_CLASS
    }

    fn get_field(&self, _name: &str) -> Option<Value> {
        None
    }

    fn invoke(self: Rc<Self>, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        match name {
            "append" => {
                let text = string_arg(args, 0, "append")?;
                self.buf.borrow_mut().push_str(&text);
                Ok(Value::Object(self))
            }
            "length" => Ok(Value::Int(self.buf.borrow().chars().count() as i32)),
            "toString" => Ok(Value::Str(self.buf.borrow().clone())),
            other => Err(no_such_member(STRING_BUILDER_CLASS, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_builtins() {
        assert_eq!(
            invoke_string("ab", "concat", &[Value::Str("cd".into())]),
            Ok(Value::Str("abcd".into()))
        );
        assert_eq!(invoke_string("ab", "length", &[]), Ok(Value::Int(2)));
        assert_eq!(invoke_string("", "isEmpty", &[]), Ok(Value::Bool(true)));
        assert_eq!(
            invoke_string("abc", "charAt", &[Value::Int(1)]),
            Ok(Value::Char('b'))
        );
        assert_eq!(
            invoke_string("hello", "substring", &[Value::Int(1), Value::Int(3)]),
            Ok(Value::Str("el".into()))
        );
        assert!(matches!(
            invoke_string("x", "nope", &[]),
            Err(EvalError::NoSuchMember { .. })
        ));
    }

    #[test]
    fn builder_appends_and_renders() {
        let builder = Rc::new(StringBuilder::new("a"));
        let appended = builder
            .clone()
            .invoke("append", &[Value::Int(1)])
            .unwrap();
        match &appended {
            Value::Object(o) => assert_eq!(o.type_name(), STRING_BUILDER_CLASS),
            other => panic!("expected builder back, got {:?}", other),
        }
        assert_eq!(
            builder.invoke("toString", &[]).unwrap(),
            Value::Str("a1".into())
        );
    }

    #[test]
    fn value_equality() {
        assert_eq!(Value::Double(1.5), Value::Double(1.5));
        assert_ne!(Value::Int(1), Value::Long(1));
        let a: Rc<dyn RuntimeObject> = Rc::new(StringBuilder::new(""));
        assert_eq!(Value::Object(a.clone()), Value::Object(a.clone()));
        let b: Rc<dyn RuntimeObject> = Rc::new(StringBuilder::new(""));
        assert_ne!(Value::Object(a), Value::Object(b));
    }
}
