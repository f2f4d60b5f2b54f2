//! Round trips through the rewriter hook.
//!
//! The core does not ship rewrite rules; this suite installs a minimal
//! folding rewriter (constants, the slice/concat collapse and the ternary
//! identities) and checks that rewritten constructions hash-cons onto the
//! terms they are equivalent to.

use bvsmt_core::{BitVector, Context, NodeKind, NodeRef, Rewriter};
use std::cmp::Ordering;
use std::rc::Rc;

struct Fold;

impl Fold {
    fn value(ctx: &Context, e: NodeRef) -> Option<BitVector> {
        if ctx.kind(e) == NodeKind::BvConst {
            Some(ctx.const_bits(e).clone())
        } else {
            None
        }
    }

    fn is_zero(ctx: &Context, e: NodeRef) -> bool {
        Self::value(ctx, e).map_or(false, |b| b.is_zero())
    }

    fn is_one(ctx: &Context, e: NodeRef) -> bool {
        Self::value(ctx, e).map_or(false, |b| b.is_one())
    }

    /// Is `b` the two's-complement negation of `a`, i.e. `add(not a, 1)`?
    fn negates(ctx: &Context, b: NodeRef, a: NodeRef) -> bool {
        if b.is_inverted() || ctx.kind(b) != NodeKind::Add {
            return false;
        }
        let c0 = ctx.child(b, 0);
        let c1 = ctx.child(b, 1);
        (c0 == a.not() && Self::is_one(ctx, c1)) || (c1 == a.not() && Self::is_one(ctx, c0))
    }
}

impl Rewriter for Fold {
    fn rewrite_slice(&self, ctx: &mut Context, e: NodeRef, upper: u32, lower: u32) -> NodeRef {
        if let Some(bits) = Self::value(ctx, e) {
            return ctx.constant(&bits.slice(upper, lower));
        }
        if lower == 0 && upper + 1 == ctx.width(e) {
            return ctx.copy(e);
        }
        ctx.slice_node(e, upper, lower)
    }

    fn rewrite_binary(
        &self,
        ctx: &mut Context,
        kind: NodeKind,
        e0: NodeRef,
        e1: NodeRef,
    ) -> NodeRef {
        if let (Some(a), Some(b)) = (Self::value(ctx, e0), Self::value(ctx, e1)) {
            let folded = match kind {
                NodeKind::And => Some(a.bvand(&b)),
                NodeKind::Add => Some(a.bvadd(&b)),
                NodeKind::Mul => Some(a.bvmul(&b)),
                NodeKind::Udiv => Some(a.bvudiv(&b)),
                NodeKind::Urem => Some(a.bvurem(&b)),
                NodeKind::Concat => Some(a.concat(&b)),
                NodeKind::Sll => Some(a.bvsll(&b)),
                NodeKind::Srl => Some(a.bvsrl(&b)),
                NodeKind::BvEq => Some(BitVector::from_u64((a == b) as u64, 1)),
                NodeKind::Ult => Some(BitVector::from_u64(
                    (a.compare(&b) == Ordering::Less) as u64,
                    1,
                )),
                _ => None,
            };
            if let Some(bits) = folded {
                return ctx.constant(&bits);
            }
        }
        match kind {
            NodeKind::And => {
                if e0 == e1 {
                    return ctx.copy(e0);
                }
                if e0 == e1.not() {
                    return ctx.zero(ctx.sort_of(e0));
                }
            }
            NodeKind::Add => {
                if Self::is_zero(ctx, e0) {
                    return ctx.copy(e1);
                }
                if Self::is_zero(ctx, e1) {
                    return ctx.copy(e0);
                }
                if Self::negates(ctx, e1, e0) || Self::negates(ctx, e0, e1) {
                    return ctx.zero(ctx.sort_of(e0));
                }
            }
            NodeKind::Concat => {
                // concat(slice(x, hi, k+1), slice(x, k, lo)) -> slice(x, hi, lo)
                if !e0.is_inverted()
                    && !e1.is_inverted()
                    && ctx.kind(e0) == NodeKind::Slice
                    && ctx.kind(e1) == NodeKind::Slice
                    && ctx.child(e0, 0) == ctx.child(e1, 0)
                    && ctx.slice_lower(e0) == ctx.slice_upper(e1) + 1
                {
                    let inner = ctx.child(e0, 0);
                    let upper = ctx.slice_upper(e0);
                    let lower = ctx.slice_lower(e1);
                    return self.rewrite_slice(ctx, inner, upper, lower);
                }
            }
            _ => {}
        }
        match kind {
            NodeKind::And => ctx.and_node(e0, e1),
            NodeKind::BvEq | NodeKind::FunEq => ctx.eq_node(e0, e1),
            NodeKind::Add => ctx.add_node(e0, e1),
            NodeKind::Mul => ctx.mul_node(e0, e1),
            NodeKind::Ult => ctx.ult_node(e0, e1),
            NodeKind::Sll => ctx.sll_node(e0, e1),
            NodeKind::Srl => ctx.srl_node(e0, e1),
            NodeKind::Udiv => ctx.udiv_node(e0, e1),
            NodeKind::Urem => ctx.urem_node(e0, e1),
            NodeKind::Concat => ctx.concat_node(e0, e1),
            NodeKind::Apply => ctx.apply_node(e0, e1),
            NodeKind::Lambda => ctx.lambda_node(e0, e1),
            other => panic!("unexpected binary kind {}", other),
        }
    }

    fn rewrite_ternary(
        &self,
        ctx: &mut Context,
        kind: NodeKind,
        e0: NodeRef,
        e1: NodeRef,
        e2: NodeRef,
    ) -> NodeRef {
        assert_eq!(kind, NodeKind::Cond);
        if let Some(cond) = Self::value(ctx, e0) {
            return if cond.is_one() {
                ctx.copy(e1)
            } else {
                ctx.copy(e2)
            };
        }
        if e1 == e2 {
            return ctx.copy(e1);
        }
        ctx.cond_node(e0, e1, e2)
    }
}

fn folding_context() -> Context {
    let mut ctx = Context::new();
    ctx.set_rewriter(Some(Rc::new(Fold)));
    ctx
}

#[test]
fn concat_of_adjacent_slices_collapses() {
    let mut ctx = folding_context();
    let bv8 = ctx.bitvec_sort(8);
    let x = ctx.var(bv8, None);

    let hi = ctx.slice(x, 7, 4);
    let lo = ctx.slice(x, 3, 0);
    let whole = ctx.concat(hi, lo);
    assert_eq!(whole, x);

    // A non-adjacent pair still builds a concat node.
    let hi2 = ctx.slice(x, 7, 5);
    let other = ctx.concat(hi2, lo);
    assert_eq!(ctx.kind(other), NodeKind::Concat);
    assert_eq!(ctx.width(other), 7);
}

#[test]
fn addition_of_the_negation_cancels() {
    let mut ctx = folding_context();
    let bv8 = ctx.bitvec_sort(8);
    let x = ctx.var(bv8, None);

    let minus_x = ctx.neg(x);
    let sum = ctx.add(x, minus_x);
    assert_eq!(ctx.kind(sum), NodeKind::BvConst);
    assert!(ctx.const_bits(sum).is_zero());
    assert_eq!(ctx.width(sum), 8);
}

#[test]
fn conditional_identities() {
    let mut ctx = folding_context();
    let bv8 = ctx.bitvec_sort(8);
    let a = ctx.var(bv8, None);
    let b = ctx.var(bv8, None);

    let t = ctx.true_const();
    let f = ctx.false_const();
    let pick_a = ctx.cond(t, a, b);
    let pick_b = ctx.cond(f, a, b);
    assert_eq!(pick_a, a);
    assert_eq!(pick_b, b);

    let same = ctx.cond(t, a, a);
    assert_eq!(same, a);
}

#[test]
fn sdiv_of_negative_constants_normalises() {
    let mut ctx = folding_context();
    let bv4 = ctx.bitvec_sort(4);

    let minus_eight = ctx.int_const(-8, bv4);
    let minus_one = ctx.int_const(-1, bv4);
    let signed = ctx.sdiv(minus_eight, minus_one);

    let eight = ctx.int_const(8, bv4);
    let one = ctx.int_const(1, bv4);
    let unsigned = ctx.udiv(eight, one);
    let negated = ctx.neg(unsigned);

    // -8 / -1 overflows to -8 in four bits, which is exactly
    // neg(udiv(8, 1)); both sides normalise to one constant node.
    assert_eq!(signed, negated);
    assert_eq!(ctx.kind(signed), NodeKind::BvConst);
    assert_eq!(ctx.const_bits(signed).to_u64(), 0b1000);
}

#[test]
fn constant_shifts_fold() {
    let mut ctx = folding_context();
    let bv8 = ctx.bitvec_sort(8);
    let bv3 = ctx.bitvec_sort(3);
    let x = ctx.unsigned_const(0b0001_0110, bv8);
    let amount = ctx.unsigned_const(2, bv3);

    let left = ctx.sll(x, amount);
    assert_eq!(ctx.kind(left), NodeKind::BvConst);
    assert_eq!(ctx.const_bits(left).to_u64(), 0b0101_1000);

    let right = ctx.srl(x, amount);
    assert_eq!(ctx.kind(right), NodeKind::BvConst);
    assert_eq!(ctx.const_bits(right).to_u64(), 0b0000_0101);
}

#[test]
fn folding_keeps_sharing_maximal() {
    let mut ctx = folding_context();
    let bv8 = ctx.bitvec_sort(8);
    let a = ctx.unsigned_const(12, bv8);
    let b = ctx.unsigned_const(30, bv8);

    let sum = ctx.add(a, b);
    let expected = ctx.unsigned_const(42, bv8);
    assert_eq!(sum, expected);

    let masked = ctx.and(sum, expected);
    assert_eq!(masked, expected);

    let cmp = ctx.ult(a, b);
    let t = ctx.true_const();
    assert_eq!(cmp, t);
}

#[test]
fn rewriter_output_forwards_proxies_too() {
    let mut ctx = folding_context();
    let bv8 = ctx.bitvec_sort(8);
    let x = ctx.var(bv8, None);
    let y = ctx.var(bv8, None);
    let z = ctx.mul(x, y);

    ctx.set_to_proxy(z, y);
    let sum1 = ctx.add(x, z);
    let sum2 = ctx.add(x, y);
    assert_eq!(sum1, sum2);
}
