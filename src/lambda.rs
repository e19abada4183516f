//! A reconstructed lambda as a first-class value: a bound expression body
//! together with its signature and the runtime values closed over at
//! creation time.

use std::fmt;

use crate::bind::bind;
use crate::descriptor::TypeDesc;
use crate::error::{EvalError, ReconstructError};
use crate::expression::Expr;
use crate::instruction::{Instruction, MemberRef, MethodSignature};
use crate::interp::{EvalContext, Interp};
use crate::reconstruct::reconstruct;
use crate::value::Value;

/// A lambda value: the bound body, the formal parameter types, and the
/// instance and captured values it closed over.
#[derive(Clone, Debug)]
pub struct LambdaValue {
    body: Expr,
    param_types: Vec<TypeDesc>,
    return_type: TypeDesc,
    instance: Option<Value>,
    captured: Vec<Value>,
}

/// Build a lambda value from an implementation method. A synthetic method
/// carries a compiled lambda body and is reconstructed instruction by
/// instruction; a non-synthetic method is a direct method reference and
/// becomes a single invocation node.
pub fn parse_method(
    member: &MemberRef,
    signature: &MethodSignature,
    stream: &[Instruction],
    captured_args: Vec<Value>,
) -> Result<LambdaValue, ReconstructError> {
    if signature.is_synthetic() {
        LambdaValue::from_instruction_stream(stream, signature, captured_args)
    } else {
        LambdaValue::from_method_reference(member, signature, captured_args)
    }
}

impl LambdaValue {
    /// Reconstruct and bind a compiled lambda body.
    ///
    /// `captured_args` are the values supplied at lambda creation, in slot
    /// order. For an instance method the first value is the receiver; the
    /// rest align with the leading entries of `param_types`, and the
    /// remaining entries are the lambda's formal parameters.
    pub fn from_instruction_stream(
        stream: &[Instruction],
        signature: &MethodSignature,
        captured_args: Vec<Value>,
    ) -> Result<LambdaValue, ReconstructError> {
        let raw = reconstruct(stream, signature)?;

        let mut captured = captured_args;
        let instance = if signature.is_static() {
            None
        } else {
            if captured.is_empty() {
                return Err(ReconstructError::CorruptInput(
                    "instance method is missing a receiver value".to_string(),
                ));
            }
            Some(captured.remove(0))
        };

        if captured.len() > signature.param_types.len() {
            return Err(ReconstructError::CorruptInput(format!(
                "{} captured value(s) exceed the {} declared parameter(s)",
                captured.len(),
                signature.param_types.len()
            )));
        }

        let body = bind(&raw, signature.is_static(), captured.len());
        let param_types = signature.param_types[captured.len()..].to_vec();

        Ok(LambdaValue {
            body,
            param_types,
            return_type: signature.return_type.clone(),
            instance,
            captured,
        })
    }

    /// Model a method reference as a lambda whose body is the invocation
    /// itself. A bound instance reference carries its receiver in
    /// `captured_args`; an unbound one takes the receiver as the first
    /// formal parameter.
    pub fn from_method_reference(
        member: &MemberRef,
        signature: &MethodSignature,
        mut captured_args: Vec<Value>,
    ) -> Result<LambdaValue, ReconstructError> {
        let declared = signature.param_types.clone();
        let owner_ty = TypeDesc::Reference(member.owner.clone());

        let (receiver, instance, param_types) = if signature.is_static() {
            (None, None, declared.clone())
        } else if captured_args.is_empty() {
            // Unbound reference: the receiver becomes the first parameter.
            let mut params = Vec::with_capacity(declared.len() + 1);
            params.push(owner_ty.clone());
            params.extend(declared.iter().cloned());
            (Some(Expr::parameter(0, owner_ty)), None, params)
        } else {
            (
                Some(Expr::this(owner_ty)),
                Some(captured_args.remove(0)),
                declared.clone(),
            )
        };

        let offset = param_types.len() - declared.len();
        let args = declared
            .iter()
            .enumerate()
            .map(|(i, ty)| Expr::parameter(i + offset, ty.clone()))
            .collect();

        let body = Expr::call(
            receiver,
            member.clone(),
            declared,
            signature.return_type.clone(),
            args,
        )?;

        Ok(LambdaValue {
            body,
            param_types,
            return_type: signature.return_type.clone(),
            instance,
            captured: captured_args,
        })
    }

    pub fn body(&self) -> &Expr {
        &self.body
    }

    pub fn param_types(&self) -> &[TypeDesc] {
        &self.param_types
    }

    pub fn return_type(&self) -> &TypeDesc {
        &self.return_type
    }

    pub fn instance(&self) -> Option<&Value> {
        self.instance.as_ref()
    }

    pub fn captured(&self) -> &[Value] {
        &self.captured
    }

    /// Evaluate the body against a flat argument array using a default
    /// interpreter.
    pub fn invoke(&self, args: &[Value]) -> Result<Value, EvalError> {
        self.invoke_with(&Interp::new(), args)
    }

    /// Evaluate the body against a flat argument array using the given
    /// interpreter.
    pub fn invoke_with(&self, interp: &Interp, args: &[Value]) -> Result<Value, EvalError> {
        let ctx = EvalContext {
            args,
            instance: self.instance.as_ref(),
            captured: &self.captured,
        };
        interp.eval(&self.body, &ctx)
    }

    /// Package the lambda as a reusable callable.
    pub fn compile(&self) -> impl Fn(&[Value]) -> Result<Value, EvalError> + '_ {
        let interp = Interp::new();
        move |args| self.invoke_with(&interp, args)
    }
}

impl fmt::Display for LambdaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, ty) in self.param_types.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} P{}", ty.display_name(), i)?;
        }
        write!(f, ")->{{{}}}", self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::STRING_CLASS;
    use crate::instruction::{ConstOperand, MethodFlags};

    #[test]
    fn constant_body_renders() {
        let signature = MethodSignature::new(
            Vec::new(),
            TypeDesc::string(),
            MethodFlags::STATIC | MethodFlags::SYNTHETIC,
        );
        let stream = [
            Instruction::Const(ConstOperand::Str("Hello World".to_string())),
            Instruction::Return,
        ];
        let member = MemberRef::new("Example", "lambda$0", "()Ljava/lang/String;");
        let lambda = parse_method(&member, &signature, &stream, Vec::new()).unwrap();
        assert_eq!(lambda.to_string(), "()->{Hello World}");
        assert_eq!(lambda.invoke(&[]), Ok(Value::Str("Hello World".to_string())));
    }

    #[test]
    fn unbound_method_reference_takes_receiver_as_first_parameter() {
        let signature = MethodSignature::new(Vec::new(), TypeDesc::int(), MethodFlags::empty());
        let member = MemberRef::new(STRING_CLASS, "length", "()I");
        let lambda =
            LambdaValue::from_method_reference(&member, &signature, Vec::new()).unwrap();
        assert_eq!(lambda.param_types().len(), 1);
        assert_eq!(lambda.to_string(), "(java.lang.String P0)->{P0.length()}");
        assert_eq!(
            lambda.invoke(&[Value::Str("four".to_string())]),
            Ok(Value::Int(4))
        );
    }

    #[test]
    fn bound_method_reference_closes_over_receiver() {
        let signature = MethodSignature::new(Vec::new(), TypeDesc::int(), MethodFlags::empty());
        let member = MemberRef::new(STRING_CLASS, "length", "()I");
        let lambda = LambdaValue::from_method_reference(
            &member,
            &signature,
            vec![Value::Str("abc".to_string())],
        )
        .unwrap();
        assert!(lambda.param_types().is_empty());
        assert_eq!(lambda.to_string(), "()->{this.length()}");
        assert_eq!(lambda.invoke(&[]), Ok(Value::Int(3)));
    }

    #[test]
    fn missing_receiver_rejected() {
        let signature = MethodSignature::new(
            Vec::new(),
            TypeDesc::string(),
            MethodFlags::SYNTHETIC,
        );
        let stream = [
            Instruction::Const(ConstOperand::Str("x".to_string())),
            Instruction::Return,
        ];
        let err =
            LambdaValue::from_instruction_stream(&stream, &signature, Vec::new()).unwrap_err();
        assert!(matches!(err, ReconstructError::CorruptInput(_)));
    }
}
