//! Capture binder: classifies raw local-slot references into
//! instance / captured-argument / parameter references.
//!
//! A pure renaming pass over the tree. Slot layout of a synthetic lambda
//! implementation method: the receiver (instance methods only), then the
//! captured arguments, then the formal parameters. Binding never changes
//! tree shape, result types or evaluation semantics.

use crate::expression::{rewrite_children, Expr, ExprRewriter};

struct SlotBinder {
    first_captured: u16,
    first_parameter: u16,
}

impl ExprRewriter for SlotBinder {
    fn rewrite_expr(&mut self, e: &Expr) -> Expr {
        match e {
            Expr::LocalSlot { index, ty } => {
                if *index >= self.first_parameter {
                    Expr::parameter((index - self.first_parameter) as usize, ty.clone())
                } else if *index >= self.first_captured {
                    Expr::captured_arg((index - self.first_captured) as usize, ty.clone())
                } else {
                    Expr::this(ty.clone())
                }
            }
            other => rewrite_children(self, other),
        }
    }
}

/// Rewrite every `LocalSlot` reference in `raw` into its identity class.
/// Never fails on a well-formed raw tree; rebinding an already-bound tree
/// with `captured_count = 0` returns a structurally identical copy.
pub fn bind(raw: &Expr, is_static: bool, captured_count: usize) -> Expr {
    let first_captured: u16 = if is_static { 0 } else { 1 };
    let first_parameter = first_captured + captured_count as u16;
    let mut binder = SlotBinder {
        first_captured,
        first_parameter,
    };
    binder.rewrite_expr(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::TypeDesc;
    use crate::expression::BinaryOp;

    #[test]
    fn static_slots_split_into_captures_and_parameters() {
        // Two captures, then parameters.
        let raw = Expr::binary(
            BinaryOp::Add,
            Expr::local_slot(1, TypeDesc::int()),
            Expr::local_slot(2, TypeDesc::int()),
        )
        .unwrap();
        let bound = bind(&raw, true, 2);
        match bound {
            Expr::Binary { left, right, .. } => {
                assert_eq!(*left, Expr::captured_arg(1, TypeDesc::int()));
                assert_eq!(*right, Expr::parameter(0, TypeDesc::int()));
            }
            other => panic!("expected binary node, got {:?}", other),
        }
    }

    #[test]
    fn instance_slot_zero_becomes_this() {
        let raw = Expr::local_slot(0, TypeDesc::object());
        let bound = bind(&raw, false, 0);
        assert_eq!(bound, Expr::this(TypeDesc::object()));
    }

    #[test]
    fn rebinding_bound_tree_is_identity() {
        let raw = Expr::binary(
            BinaryOp::Mul,
            Expr::local_slot(0, TypeDesc::int()),
            Expr::local_slot(1, TypeDesc::int()),
        )
        .unwrap();
        let bound = bind(&raw, true, 1);
        let rebound = bind(&bound, true, 0);
        assert_eq!(bound, rebound);
    }
}
