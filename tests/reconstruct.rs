use proptest::prelude::*;

use lambda_expr::bind::bind;
use lambda_expr::descriptor::{PrimType, TypeDesc};
use lambda_expr::expression::{walk_expr, ExprVisitor};
use lambda_expr::{
    BinaryOp, ConstOperand, Expr, Instruction, Label, MemberRef, MethodFlags, MethodSignature,
    ReconstructError,
};

fn static_sig(params: Vec<TypeDesc>, ret: TypeDesc) -> MethodSignature {
    MethodSignature::new(params, ret, MethodFlags::STATIC | MethodFlags::SYNTHETIC)
}

fn reconstruct(stream: &[Instruction], sig: &MethodSignature) -> Result<Expr, ReconstructError> {
    lambda_expr::reconstruct(stream, sig)
}

// ---- Straight-line streams ----

#[test]
fn constant_stream_yields_constant() {
    let sig = static_sig(Vec::new(), TypeDesc::int());
    let stream = [Instruction::Const(ConstOperand::Int(42)), Instruction::Return];
    let tree = reconstruct(&stream, &sig).unwrap();
    assert_eq!(tree, Expr::constant(ConstOperand::Int(42)));
}

#[test]
fn store_then_load_substitutes_the_stored_expression() {
    let sig = static_sig(Vec::new(), TypeDesc::int());
    let stream = [
        Instruction::Const(ConstOperand::Int(2)),
        Instruction::Store(5),
        Instruction::Load(5),
        Instruction::Const(ConstOperand::Int(3)),
        Instruction::Binary(BinaryOp::Add),
        Instruction::Return,
    ];
    let tree = reconstruct(&stream, &sig).unwrap();
    assert_eq!(tree.to_string(), "(2 + 3)");
}

#[test]
fn parameter_loads_are_typed_from_the_signature() {
    let sig = static_sig(
        vec![TypeDesc::int(), TypeDesc::Primitive(PrimType::Long)],
        TypeDesc::Primitive(PrimType::Long),
    );
    let stream = [
        Instruction::Load(0),
        Instruction::Load(1),
        Instruction::Binary(BinaryOp::Add),
        Instruction::Return,
    ];
    let tree = reconstruct(&stream, &sig).unwrap();
    // int + long promotes to long
    assert_eq!(tree.result_type(), TypeDesc::Primitive(PrimType::Long));
}

#[test]
fn construction_and_invocation_render_in_source_form() {
    let sig = static_sig(vec![TypeDesc::string()], TypeDesc::string());
    let stream = [
        Instruction::Const(ConstOperand::Str("abc".to_string())),
        Instruction::Construct {
            member: MemberRef::new("java/lang/StringBuilder", "<init>", "(Ljava/lang/String;)V"),
        },
        Instruction::Load(0),
        Instruction::Invoke {
            member: MemberRef::new(
                "java/lang/StringBuilder",
                "append",
                "(Ljava/lang/String;)Ljava/lang/StringBuilder;",
            ),
            is_static: false,
        },
        Instruction::Invoke {
            member: MemberRef::new("java/lang/StringBuilder", "toString", "()Ljava/lang/String;"),
            is_static: false,
        },
        Instruction::Return,
    ];
    let tree = reconstruct(&stream, &sig).unwrap();
    assert_eq!(
        tree.to_string(),
        "java.lang.StringBuilder.<new>(abc).append(L0).toString()"
    );
}

// ---- Conditionals ----

struct ConditionalCounter(usize);

impl ExprVisitor for ConditionalCounter {
    fn visit_expr(&mut self, e: &Expr) {
        if matches!(e, Expr::Conditional { .. }) {
            self.0 += 1;
        }
        walk_expr(self, e);
    }
}

fn count_conditionals(tree: &Expr) -> usize {
    let mut counter = ConditionalCounter(0);
    tree.accept(&mut counter);
    counter.0
}

#[test]
fn single_branch_merges_into_a_conditional() {
    let sig = static_sig(vec![TypeDesc::int()], TypeDesc::string());
    let stream = [
        Instruction::Load(0),
        Instruction::Const(ConstOperand::Int(1)),
        Instruction::Binary(BinaryOp::Gt),
        Instruction::BranchFalse(Label(0)),
        Instruction::Const(ConstOperand::Str("big".to_string())),
        Instruction::Jump(Label(1)),
        Instruction::Mark(Label(0)),
        Instruction::Const(ConstOperand::Str("small".to_string())),
        Instruction::Mark(Label(1)),
        Instruction::Return,
    ];
    let tree = reconstruct(&stream, &sig).unwrap();
    assert_eq!(count_conditionals(&tree), 1);
    assert_eq!(tree.to_string(), "((L0 > 1) ? big : small)");
    assert_eq!(tree.result_type(), TypeDesc::string());
}

#[test]
fn nested_branches_merge_into_nested_conditionals() {
    // b0 ? (b1 ? 1 : 2) : 3
    let sig = static_sig(
        vec![TypeDesc::boolean(), TypeDesc::boolean()],
        TypeDesc::int(),
    );
    let stream = [
        Instruction::Load(0),
        Instruction::BranchFalse(Label(0)),
        Instruction::Load(1),
        Instruction::BranchFalse(Label(2)),
        Instruction::Const(ConstOperand::Int(1)),
        Instruction::Jump(Label(3)),
        Instruction::Mark(Label(2)),
        Instruction::Const(ConstOperand::Int(2)),
        Instruction::Mark(Label(3)),
        Instruction::Jump(Label(1)),
        Instruction::Mark(Label(0)),
        Instruction::Const(ConstOperand::Int(3)),
        Instruction::Mark(Label(1)),
        Instruction::Return,
    ];
    let tree = reconstruct(&stream, &sig).unwrap();
    assert_eq!(count_conditionals(&tree), 2);
    assert_eq!(tree.to_string(), "(L0 ? (L1 ? 1 : 2) : 3)");
}

// ---- Rejected shapes ----

#[test]
fn backward_jump_is_unsupported_control_flow() {
    let sig = static_sig(vec![TypeDesc::boolean()], TypeDesc::int());
    let stream = [
        Instruction::Mark(Label(0)),
        Instruction::Load(0),
        Instruction::BranchFalse(Label(0)),
        Instruction::Const(ConstOperand::Int(1)),
        Instruction::Return,
    ];
    assert!(matches!(
        reconstruct(&stream, &sig),
        Err(ReconstructError::UnsupportedControlFlow(_))
    ));
}

#[test]
fn field_store_is_unsupported_control_flow() {
    let sig = static_sig(Vec::new(), TypeDesc::int());
    let stream = [
        Instruction::Const(ConstOperand::Int(1)),
        Instruction::SetField {
            member: MemberRef::new("Example", "state", "I"),
            is_static: true,
        },
        Instruction::Const(ConstOperand::Int(2)),
        Instruction::Return,
    ];
    assert!(matches!(
        reconstruct(&stream, &sig),
        Err(ReconstructError::UnsupportedControlFlow(_))
    ));
}

#[test]
fn jump_to_unknown_label_is_corrupt() {
    let sig = static_sig(vec![TypeDesc::boolean()], TypeDesc::int());
    let stream = [
        Instruction::Load(0),
        Instruction::BranchFalse(Label(9)),
        Instruction::Const(ConstOperand::Int(1)),
        Instruction::Return,
    ];
    assert!(matches!(
        reconstruct(&stream, &sig),
        Err(ReconstructError::CorruptInput(_))
    ));
}

#[test]
fn operand_underflow_is_corrupt() {
    let sig = static_sig(Vec::new(), TypeDesc::int());
    let stream = [
        Instruction::Const(ConstOperand::Int(1)),
        Instruction::Binary(BinaryOp::Add),
        Instruction::Return,
    ];
    assert!(matches!(
        reconstruct(&stream, &sig),
        Err(ReconstructError::CorruptInput(_))
    ));
}

#[test]
fn return_inside_an_open_branch_is_corrupt() {
    let sig = static_sig(Vec::new(), TypeDesc::int());
    let stream = [
        Instruction::Const(ConstOperand::Bool(true)),
        Instruction::BranchFalse(Label(0)),
        Instruction::Const(ConstOperand::Int(1)),
        Instruction::Return,
        Instruction::Mark(Label(0)),
    ];
    assert!(matches!(
        reconstruct(&stream, &sig),
        Err(ReconstructError::CorruptInput(_))
    ));
}

#[test]
fn missing_return_is_corrupt() {
    let sig = static_sig(Vec::new(), TypeDesc::int());
    let stream = [Instruction::Const(ConstOperand::Int(1))];
    assert!(matches!(
        reconstruct(&stream, &sig),
        Err(ReconstructError::CorruptInput(_))
    ));
}

#[test]
fn unparseable_descriptor_is_unresolved_member() {
    let sig = static_sig(Vec::new(), TypeDesc::int());
    let stream = [
        Instruction::Invoke {
            member: MemberRef::new("Example", "broken", "(("),
            is_static: true,
        },
        Instruction::Return,
    ];
    assert_eq!(
        reconstruct(&stream, &sig),
        Err(ReconstructError::UnresolvedMember {
            owner: "Example".to_string(),
            name: "broken".to_string(),
        })
    );
}

// ---- Binding ----

proptest! {
    // Once bound, a tree has no slot references left, so binding again
    // under any layout changes nothing.
    #[test]
    fn rebinding_a_bound_tree_is_identity(
        slots in prop::collection::vec(0u16..8, 1..6),
        is_static in any::<bool>(),
        captured in 0usize..4,
        second_static in any::<bool>(),
        second_captured in 0usize..4,
    ) {
        let mut tree = Expr::local_slot(slots[0], TypeDesc::int());
        for s in &slots[1..] {
            tree = Expr::binary(BinaryOp::Add, tree, Expr::local_slot(*s, TypeDesc::int()))
                .unwrap();
        }
        let bound = bind(&tree, is_static, captured);
        let rebound = bind(&bound, second_static, second_captured);
        prop_assert_eq!(bound, rebound);
    }

    #[test]
    fn constant_streams_render_their_value(x in any::<i32>()) {
        let sig = static_sig(Vec::new(), TypeDesc::int());
        let stream = [Instruction::Const(ConstOperand::Int(x)), Instruction::Return];
        let tree = reconstruct(&stream, &sig).unwrap();
        prop_assert_eq!(tree.to_string(), x.to_string());
    }
}
