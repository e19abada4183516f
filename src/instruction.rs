//! The typed instruction-stream model handed to the reconstructor.
//!
//! A stream is an ordered sequence of operations addressed by position.
//! Jump targets are named [`Label`]s fixed in place by the [`Instruction::Mark`]
//! pseudo-instruction. Streams are read-only inputs; the crate never mutates
//! or executes them.

use bitflags::bitflags;

use crate::descriptor::TypeDesc;
use crate::expression::BinaryOp;

/// A named jump target within one method body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Label(pub u16);

/// A constant operand baked into the instruction stream.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstOperand {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
}

/// A symbolic reference to a field, callable or constructor.
///
/// `descriptor` uses the descriptor grammar of [`crate::descriptor`]: a type
/// descriptor for fields, `(params)ret` for callables and constructors.
/// Resolution happens during reconstruction; an unparseable descriptor is an
/// `UnresolvedMember` failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl MemberRef {
    pub fn new(owner: &str, name: &str, descriptor: &str) -> MemberRef {
        MemberRef {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }
}

/// One operation of a compiled method body.
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    /// Push a constant.
    Const(ConstOperand),
    /// Push the current value of a local slot.
    Load(u16),
    /// Pop a value into a local slot.
    Store(u16),
    /// Read a field; pops the target unless static.
    GetField { member: MemberRef, is_static: bool },
    /// Write a field; pops value (and target unless static).
    SetField { member: MemberRef, is_static: bool },
    /// Invoke a callable; pops declared arguments (and the target unless
    /// static).
    Invoke { member: MemberRef, is_static: bool },
    /// Construct an object; pops constructor-arity arguments.
    Construct { member: MemberRef },
    /// Numeric widening/narrowing conversion.
    Convert(TypeDesc),
    /// Checked reference cast; fails at interpretation time on mismatch.
    CheckedCast(TypeDesc),
    /// Pop two operands, push the operation result. Comparison operators
    /// push a boolean.
    Binary(BinaryOp),
    /// Pop one numeric operand, push its negation.
    Negate,
    /// Pop one boolean operand, push its complement.
    Not,
    /// Pop a boolean test; jump to the target when false, fall through
    /// into the then-branch when true.
    BranchFalse(Label),
    /// Unconditional forward jump (ends a then-branch).
    Jump(Label),
    /// Fixes a label's address at this position.
    Mark(Label),
    /// Pop the method result and terminate.
    Return,
}

bitflags! {
    /// Method access flags (same bit values as JVM access flags).
    pub struct MethodFlags: u16 {
        const STATIC    = 0x0008;
        const SYNTHETIC = 0x1000;
    }
}

/// The declared static signature of a compiled method. For the synthetic
/// implementation method of a lambda, `param_types` covers the captured
/// arguments followed by the formal parameters; the receiver of an
/// instance method is implicit (slot 0).
#[derive(Clone, Debug, PartialEq)]
pub struct MethodSignature {
    pub param_types: Vec<TypeDesc>,
    pub return_type: TypeDesc,
    pub flags: MethodFlags,
}

impl MethodSignature {
    pub fn new(param_types: Vec<TypeDesc>, return_type: TypeDesc, flags: MethodFlags) -> Self {
        MethodSignature {
            param_types,
            return_type,
            flags,
        }
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodFlags::STATIC)
    }

    pub fn is_synthetic(&self) -> bool {
        self.flags.contains(MethodFlags::SYNTHETIC)
    }
}
