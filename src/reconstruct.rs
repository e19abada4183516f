//! Stack-simulating reconstructor: walks a linear instruction stream,
//! mirrors the operand stack and local-slot table with symbolic expression
//! nodes, and synthesizes one expression tree for the method's result.
//!
//! Conditionals are recovered by a snapshot/merge scheme: a conditional
//! branch snapshots the operand stack, the jump that ends the then-branch
//! files a pending merge state keyed by the join label, and reaching the
//! join label pops one result from each path and replaces both with a
//! single `Conditional` node. Merge states nest, so nested ternaries come
//! out as nested nodes; any other control shape is rejected.

use std::collections::{HashMap, HashSet};

use crate::descriptor::{parse_method, parse_type, TypeDesc};
use crate::error::{ExprError, ReconstructError};
use crate::expression::{Expr, UnaryOp};
use crate::instruction::{Instruction, Label, MemberRef, MethodSignature};

/// A conditional branch whose then-branch is still being simulated.
struct OpenBranch {
    test: Expr,
    else_label: Label,
    /// Operand stack as it was after popping the test; restored when the
    /// then-branch ends so the else-branch starts from the same state.
    saved_stack: Vec<Expr>,
}

/// A completed then-branch waiting for its else-branch to reach the join.
struct MergeState {
    test: Expr,
    then_stack: Vec<Expr>,
}

fn underflow(what: &str) -> ReconstructError {
    ReconstructError::CorruptInput(format!("operand stack underflow at {}", what))
}

fn unresolved(member: &MemberRef) -> ReconstructError {
    ReconstructError::UnresolvedMember {
        owner: member.owner.clone(),
        name: member.name.clone(),
    }
}

/// Reconstruct the result expression of a single method body.
///
/// The stream is processed strictly in address order. Local-slot loads that
/// precede any store synthesize `LocalSlot` nodes typed from the signature;
/// the capture binder later classifies them. Fails atomically: no partial
/// tree is ever returned.
pub fn reconstruct(
    stream: &[Instruction],
    signature: &MethodSignature,
) -> Result<Expr, ReconstructError> {
    // Label addresses are fixed up front so forward targets can be checked.
    let mut labels: HashMap<Label, usize> = HashMap::new();
    for (pc, instr) in stream.iter().enumerate() {
        if let Instruction::Mark(label) = instr {
            if labels.insert(*label, pc).is_some() {
                return Err(ReconstructError::CorruptInput(format!(
                    "label {} marked twice",
                    label.0
                )));
            }
        }
    }

    let mut stack: Vec<Expr> = Vec::new();
    let mut slots: HashMap<u16, Expr> = HashMap::new();
    let mut open: Vec<OpenBranch> = Vec::new();
    let mut merges: HashMap<Label, MergeState> = HashMap::new();
    let mut completed: HashSet<Label> = HashSet::new();

    // Targets must be known and strictly forward; a backward target is a
    // loop, a completed target is branch re-entry.
    let check_target =
        |label: Label, pc: usize, completed: &HashSet<Label>| -> Result<(), ReconstructError> {
        let target_pc = *labels.get(&label).ok_or_else(|| {
            ReconstructError::CorruptInput(format!("jump to unknown label {}", label.0))
        })?;
        if target_pc <= pc {
            return Err(ReconstructError::UnsupportedControlFlow(format!(
                "backward jump to label {} (loop)",
                label.0
            )));
        }
        if completed.contains(&label) {
            return Err(ReconstructError::UnsupportedControlFlow(format!(
                "jump re-enters completed merge at label {}",
                label.0
            )));
        }
        Ok(())
    };

    for (pc, instr) in stream.iter().enumerate() {
        match instr {
            Instruction::Const(value) => stack.push(Expr::constant(value.clone())),

            Instruction::Load(index) => {
                let node = match slots.get(index) {
                    Some(assigned) => assigned.clone(),
                    None => {
                        let ty = slot_type(signature, *index).ok_or_else(|| {
                            ReconstructError::CorruptInput(format!(
                                "load from undeclared slot {}",
                                index
                            ))
                        })?;
                        Expr::local_slot(*index, ty)
                    }
                };
                stack.push(node);
            }

            Instruction::Store(index) => {
                let value = stack.pop().ok_or_else(|| underflow("store"))?;
                slots.insert(*index, value);
            }

            Instruction::GetField { member, is_static } => {
                let ty = parse_type(&member.descriptor).ok_or_else(|| unresolved(member))?;
                let target = if *is_static {
                    None
                } else {
                    Some(stack.pop().ok_or_else(|| underflow("field read"))?)
                };
                stack.push(Expr::field(target, member.clone(), ty));
            }

            Instruction::SetField { member, .. } => {
                return Err(ReconstructError::UnsupportedControlFlow(format!(
                    "field store to {}.{} is not an expression shape",
                    member.owner, member.name
                )));
            }

            Instruction::Invoke { member, is_static } => {
                let (param_types, return_type) =
                    parse_method(&member.descriptor).ok_or_else(|| unresolved(member))?;
                let args = pop_args(&mut stack, param_types.len(), &member.name)?;
                let target = if *is_static {
                    None
                } else {
                    Some(stack.pop().ok_or_else(|| underflow(&member.name))?)
                };
                stack.push(Expr::call(target, member.clone(), param_types, return_type, args)?);
            }

            Instruction::Construct { member } => {
                let (param_types, return_type) =
                    parse_method(&member.descriptor).ok_or_else(|| unresolved(member))?;
                if !return_type.is_void() {
                    return Err(unresolved(member));
                }
                let args = pop_args(&mut stack, param_types.len(), "<new>")?;
                stack.push(Expr::new_object(member.owner.clone(), param_types, args)?);
            }

            Instruction::Convert(target) | Instruction::CheckedCast(target) => {
                let operand = stack.pop().ok_or_else(|| underflow("convert"))?;
                stack.push(Expr::convert(operand, target.clone()));
            }

            Instruction::Binary(op) => {
                let right = stack.pop().ok_or_else(|| underflow(op.symbol()))?;
                let left = stack.pop().ok_or_else(|| underflow(op.symbol()))?;
                stack.push(Expr::binary(*op, left, right)?);
            }

            Instruction::Negate => {
                let operand = stack.pop().ok_or_else(|| underflow("negate"))?;
                stack.push(Expr::unary(UnaryOp::Neg, operand)?);
            }

            Instruction::Not => {
                let operand = stack.pop().ok_or_else(|| underflow("not"))?;
                stack.push(Expr::unary(UnaryOp::Not, operand)?);
            }

            Instruction::BranchFalse(else_label) => {
                check_target(*else_label, pc, &completed)?;
                let test = stack.pop().ok_or_else(|| underflow("branch"))?;
                if !test.result_type().is_boolean() {
                    return Err(ExprError::TypeMismatch(format!(
                        "branch test must be boolean, got {}",
                        test.result_type().display_name()
                    ))
                    .into());
                }
                open.push(OpenBranch {
                    test,
                    else_label: *else_label,
                    saved_stack: stack.clone(),
                });
            }

            Instruction::Jump(end_label) => {
                check_target(*end_label, pc, &completed)?;
                let branch = open.pop().ok_or_else(|| {
                    ReconstructError::UnsupportedControlFlow(format!(
                        "unstructured jump to label {}",
                        end_label.0
                    ))
                })?;
                // The else-branch must begin right here, at the branch's
                // own target.
                match stream.get(pc + 1) {
                    Some(Instruction::Mark(l)) if *l == branch.else_label => {}
                    _ => {
                        return Err(ReconstructError::CorruptInput(format!(
                            "then-branch jump is not followed by else label {}",
                            branch.else_label.0
                        )))
                    }
                }
                // The else-branch resumes from the pre-branch stack.
                let then_stack = std::mem::replace(&mut stack, branch.saved_stack);
                if merges.insert(*end_label, MergeState { test: branch.test, then_stack }).is_some()
                {
                    return Err(ReconstructError::UnsupportedControlFlow(format!(
                        "two branches merge at label {}",
                        end_label.0
                    )));
                }
            }

            Instruction::Mark(label) => {
                if let Some(merge) = merges.remove(label) {
                    let mut then_stack = merge.then_stack;
                    let then_expr = then_stack
                        .pop()
                        .ok_or_else(|| underflow("then-branch merge"))?;
                    let else_expr = stack.pop().ok_or_else(|| underflow("else-branch merge"))?;
                    if then_stack.len() != stack.len() {
                        return Err(ReconstructError::CorruptInput(format!(
                            "branch stacks unbalanced at label {} ({} vs {})",
                            label.0,
                            then_stack.len(),
                            stack.len()
                        )));
                    }
                    stack.push(Expr::conditional(merge.test, then_expr, else_expr)?);
                    completed.insert(*label);
                }
            }

            Instruction::Return => {
                let result = stack.pop().ok_or_else(|| underflow("return"))?;
                if !open.is_empty() || !merges.is_empty() {
                    return Err(ReconstructError::CorruptInput(
                        "return inside an unmerged conditional".to_string(),
                    ));
                }
                // Anything after an unconditional return is unreachable.
                return Ok(result);
            }
        }
    }

    Err(ReconstructError::CorruptInput(
        "instruction stream ended without a return".to_string(),
    ))
}

/// Pop `count` argument nodes; they were pushed left-to-right, so they come
/// off in reverse.
fn pop_args(
    stack: &mut Vec<Expr>,
    count: usize,
    member: &str,
) -> Result<Vec<Expr>, ReconstructError> {
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        args.push(stack.pop().ok_or_else(|| underflow(member))?);
    }
    args.reverse();
    Ok(args)
}

/// The declared type of an unassigned slot: the receiver at slot 0 for
/// instance methods, then the declared parameters in order.
fn slot_type(signature: &MethodSignature, index: u16) -> Option<TypeDesc> {
    let index = index as usize;
    if signature.is_static() {
        signature.param_types.get(index).cloned()
    } else if index == 0 {
        Some(TypeDesc::object())
    } else {
        signature.param_types.get(index - 1).cloned()
    }
}
