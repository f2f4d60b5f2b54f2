//! Derived constructions.
//!
//! Everything here reduces to the primitive kinds plus edge inversion:
//! Boolean connectives, extensions and reductions, signed comparisons,
//! rotates, the signed division family and the overflow predicates, and the
//! array read/write forms. Intermediate terms are released as soon as the
//! enclosing construction owns them through its children.

use crate::ctx::Context;
use crate::node::{NodeRef, Payload, Rho};
use smallvec::SmallVec;

impl Context {
    /// Bit-wise NOT: a tag flip on the edge, no allocation.
    pub fn not(&mut self, e: NodeRef) -> NodeRef {
        let e = self.chase(e);
        debug_assert!(self.precond_regular_unary_bv(e));
        self.inc_ref(e);
        e.not()
    }

    /// Two's-complement negation: `add(not e, 1)`.
    pub fn neg(&mut self, e: NodeRef) -> NodeRef {
        let e = self.chase(e);
        debug_assert!(self.precond_regular_unary_bv(e));
        let one = self.one(self.sort_of(e));
        let result = self.add(e.not(), one);
        self.release(one);
        result
    }

    /// Disjunction, via De Morgan over the and node.
    pub fn or(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        self.and(e0.not(), e1.not()).not()
    }

    /// Negated conjunction.
    pub fn nand(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        self.and(e0, e1).not()
    }

    /// Negated disjunction.
    pub fn nor(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        self.or(e0, e1).not()
    }

    /// Exclusive or: `and(or(a, b), not(and(a, b)))`.
    pub fn xor(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        let or = self.or(e0, e1);
        let and = self.and(e0, e1);
        let result = self.and(or, and.not());
        self.release(or);
        self.release(and);
        result
    }

    /// Negated exclusive or.
    pub fn xnor(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        self.xor(e0, e1).not()
    }

    /// Boolean implication.
    pub fn implies(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        debug_assert_eq!(self.width(e0), 1);
        self.and(e0, e1.not()).not()
    }

    /// Boolean equivalence.
    pub fn iff(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        debug_assert_eq!(self.width(e0), 1);
        self.eq(e0, e1)
    }

    /// Disequality.
    pub fn ne(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_eq(e0, e1));
        self.eq(e0, e1).not()
    }

    /// Left-fold of `and` over an argument list.
    pub fn and_n(&mut self, args: &[NodeRef]) -> NodeRef {
        assert!(!args.is_empty());
        let mut result: Option<NodeRef> = None;
        for &arg in args {
            result = Some(match result {
                None => self.copy(arg),
                Some(acc) => {
                    let tmp = self.and(arg, acc);
                    self.release(acc);
                    tmp
                }
            });
        }
        result.expect("empty conjunction")
    }

    /// Or-reduction: `not(eq(e, 0))`.
    pub fn redor(&mut self, e: NodeRef) -> NodeRef {
        let e = self.chase(e);
        debug_assert!(self.precond_regular_unary_bv(e));
        let zero = self.zero(self.sort_of(e));
        let result = self.eq(e, zero).not();
        self.release(zero);
        result
    }

    /// And-reduction: `eq(e, ones)`.
    pub fn redand(&mut self, e: NodeRef) -> NodeRef {
        let e = self.chase(e);
        debug_assert!(self.precond_regular_unary_bv(e));
        let ones = self.all_ones(self.sort_of(e));
        let result = self.eq(e, ones);
        self.release(ones);
        result
    }

    /// Xor-reduction: a left fold of xor over the one-bit slices.
    pub fn redxor(&mut self, e: NodeRef) -> NodeRef {
        let e = self.chase(e);
        debug_assert!(self.precond_regular_unary_bv(e));
        let width = self.width(e);
        let mut result = self.slice(e, 0, 0);
        for i in 1..width {
            let bit = self.slice(e, i, i);
            let xor = self.xor(result, bit);
            self.release(bit);
            self.release(result);
            result = xor;
        }
        result
    }

    /// Zero extension by `width` bits.
    pub fn uext(&mut self, e: NodeRef, width: u32) -> NodeRef {
        let e = self.chase(e);
        debug_assert!(self.precond_regular_unary_bv(e));
        if width == 0 {
            return self.copy(e);
        }
        let sort = self.bitvec_sort(width);
        let zero = self.zero(sort);
        self.release_sort(sort);
        let result = self.concat(zero, e);
        self.release(zero);
        result
    }

    /// Sign extension by `width` bits: a conditional repetition of the sign
    /// bit concatenated in front.
    pub fn sext(&mut self, e: NodeRef, width: u32) -> NodeRef {
        let e = self.chase(e);
        debug_assert!(self.precond_regular_unary_bv(e));
        if width == 0 {
            return self.copy(e);
        }
        let sort = self.bitvec_sort(width);
        let zero = self.zero(sort);
        let ones = self.all_ones(sort);
        self.release_sort(sort);
        let e_width = self.width(e);
        let sign = self.slice(e, e_width - 1, e_width - 1);
        let rep = self.cond(sign, ones, zero);
        let result = self.concat(rep, e);
        self.release(zero);
        self.release(ones);
        self.release(sign);
        self.release(rep);
        result
    }

    // -- Comparisons ------------------------------------------------------

    /// Signed less-than: decided by the sign bits, falling back to an
    /// unsigned comparison of the remainders when they agree.
    pub fn slt(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        let width = self.width(e0);
        if width == 1 {
            return self.and(e0, e1.not());
        }
        let s0 = self.slice(e0, width - 1, width - 1);
        let s1 = self.slice(e1, width - 1, width - 1);
        let r0 = self.slice(e0, width - 2, 0);
        let r1 = self.slice(e1, width - 2, 0);
        let ult = self.ult(r0, r1);
        let determined_by_sign = self.and(s0, s1.not());
        let l = self.copy(determined_by_sign);
        let r = self.and(s0.not(), s1);
        let eq_sign = self.and(l.not(), r.not());
        let eq_sign_and_ult = self.and(eq_sign, ult);
        let result = self.or(determined_by_sign, eq_sign_and_ult);
        self.release(s0);
        self.release(s1);
        self.release(r0);
        self.release(r1);
        self.release(ult);
        self.release(determined_by_sign);
        self.release(l);
        self.release(r);
        self.release(eq_sign);
        self.release(eq_sign_and_ult);
        result
    }

    /// Unsigned less-than-or-equal.
    pub fn ulte(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        let ult = self.ult(e1, e0);
        let result = self.not(ult);
        self.release(ult);
        result
    }

    /// Signed less-than-or-equal.
    pub fn slte(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        let slt = self.slt(e1, e0);
        let result = self.not(slt);
        self.release(slt);
        result
    }

    /// Unsigned greater-than.
    pub fn ugt(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        self.ult(e1, e0)
    }

    /// Signed greater-than.
    pub fn sgt(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        self.slt(e1, e0)
    }

    /// Unsigned greater-than-or-equal.
    pub fn ugte(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        let ult = self.ult(e0, e1);
        let result = self.not(ult);
        self.release(ult);
        result
    }

    /// Signed greater-than-or-equal.
    pub fn sgte(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        let slt = self.slt(e0, e1);
        let result = self.not(slt);
        self.release(slt);
        result
    }

    // -- Shifts and rotates -----------------------------------------------

    /// Arithmetic shift right: `cond(sign, not(srl(not e0, e1)), srl(e0, e1))`.
    pub fn sra(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_shift(e0, e1));
        let width = self.width(e0);
        let sign = self.slice(e0, width - 1, width - 1);
        let srl1 = self.srl(e0, e1);
        let srl2 = self.srl(e0.not(), e1);
        let result = self.cond(sign, srl2.not(), srl1);
        self.release(sign);
        self.release(srl1);
        self.release(srl2);
        result
    }

    /// Rotate left: `or(sll(e0, e1), srl(e0, neg e1))`.
    pub fn rol(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_shift(e0, e1));
        let sll = self.sll(e0, e1);
        let neg_amount = self.neg(e1);
        let srl = self.srl(e0, neg_amount);
        let result = self.or(sll, srl);
        self.release(sll);
        self.release(neg_amount);
        self.release(srl);
        result
    }

    /// Rotate right: `or(srl(e0, e1), sll(e0, neg e1))`.
    pub fn ror(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_shift(e0, e1));
        let srl = self.srl(e0, e1);
        let neg_amount = self.neg(e1);
        let sll = self.sll(e0, neg_amount);
        let result = self.or(srl, sll);
        self.release(srl);
        self.release(neg_amount);
        self.release(sll);
        result
    }

    // -- Addition/subtraction family --------------------------------------

    /// Subtraction: `add(e0, neg e1)`.
    pub fn sub(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        let neg = self.neg(e1);
        let result = self.add(e0, neg);
        self.release(neg);
        result
    }

    /// Increment by one.
    pub fn inc(&mut self, e: NodeRef) -> NodeRef {
        let e = self.chase(e);
        debug_assert!(self.precond_regular_unary_bv(e));
        let one = self.one(self.sort_of(e));
        let result = self.add(e, one);
        self.release(one);
        result
    }

    /// Decrement by one.
    pub fn dec(&mut self, e: NodeRef) -> NodeRef {
        let e = self.chase(e);
        debug_assert!(self.precond_regular_unary_bv(e));
        let one = self.one(self.sort_of(e));
        let result = self.sub(e, one);
        self.release(one);
        result
    }

    /// Unsigned addition overflow: the carry out of a widened addition.
    pub fn uaddo(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        let width = self.width(e0);
        let uext_e0 = self.uext(e0, 1);
        let uext_e1 = self.uext(e1, 1);
        let add = self.add(uext_e0, uext_e1);
        let result = self.slice(add, width, width);
        self.release(uext_e0);
        self.release(uext_e1);
        self.release(add);
        result
    }

    /// Signed addition overflow: both operands share a sign the sum does
    /// not.
    pub fn saddo(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        let width = self.width(e0);
        let sign_e0 = self.slice(e0, width - 1, width - 1);
        let sign_e1 = self.slice(e1, width - 1, width - 1);
        let add = self.add(e0, e1);
        let sign_result = self.slice(add, width - 1, width - 1);
        let and1 = self.and(sign_e0, sign_e1);
        let or1 = self.and(and1, sign_result.not());
        let and2 = self.and(sign_e0.not(), sign_e1.not());
        let or2 = self.and(and2, sign_result);
        let result = self.or(or1, or2);
        self.release(and1);
        self.release(and2);
        self.release(or1);
        self.release(or2);
        self.release(add);
        self.release(sign_e0);
        self.release(sign_e1);
        self.release(sign_result);
        result
    }

    /// Unsigned subtraction overflow (borrow).
    pub fn usubo(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        let width = self.width(e0);
        let uext_e0 = self.uext(e0, 1);
        let uext_e1 = self.uext(e1.not(), 1);
        let sort = self.bitvec_sort(width + 1);
        let one = self.one(sort);
        self.release_sort(sort);
        let add1 = self.add(uext_e1, one);
        let add2 = self.add(uext_e0, add1);
        let result = self.slice(add2, width, width).not();
        self.release(uext_e0);
        self.release(uext_e1);
        self.release(add1);
        self.release(add2);
        self.release(one);
        result
    }

    /// Signed subtraction overflow: operand signs differ and the result
    /// sign follows the subtrahend.
    pub fn ssubo(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        let width = self.width(e0);
        let sign_e0 = self.slice(e0, width - 1, width - 1);
        let sign_e1 = self.slice(e1, width - 1, width - 1);
        let sub = self.sub(e0, e1);
        let sign_result = self.slice(sub, width - 1, width - 1);
        let and1 = self.and(sign_e0.not(), sign_e1);
        let or1 = self.and(and1, sign_result);
        let and2 = self.and(sign_e0, sign_e1.not());
        let or2 = self.and(and2, sign_result.not());
        let result = self.or(or1, or2);
        self.release(and1);
        self.release(and2);
        self.release(or1);
        self.release(or2);
        self.release(sub);
        self.release(sign_e0);
        self.release(sign_e1);
        self.release(sign_result);
        result
    }

    // -- Multiplication overflow ------------------------------------------

    /// Unsigned multiplication overflow: an or-tree over one-bit slices
    /// plus the high bit of a widened product.
    pub fn umulo(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        let width = self.width(e0);
        if width == 1 {
            let sort = self.bitvec_sort(1);
            let result = self.zero(sort);
            self.release_sort(sort);
            return result;
        }

        let mut temps: SmallVec<[NodeRef; 8]> = SmallVec::new();
        temps.push(self.slice(e1, width - 1, width - 1));
        for i in 1..width - 1 {
            let slice = self.slice(e1, width - 1 - i, width - 1 - i);
            let or = self.or(temps[(i - 1) as usize], slice);
            temps.push(or);
            self.release(slice);
        }
        let slice = self.slice(e0, 1, 1);
        let mut result = self.and(slice, temps[0]);
        self.release(slice);
        for i in 1..width - 1 {
            let slice = self.slice(e0, i + 1, i + 1);
            let and = self.and(slice, temps[i as usize]);
            let or = self.or(result, and);
            self.release(slice);
            self.release(and);
            self.release(result);
            result = or;
        }
        let uext_e0 = self.uext(e0, 1);
        let uext_e1 = self.uext(e1, 1);
        let mul = self.mul(uext_e0, uext_e1);
        let slice = self.slice(mul, width, width);
        let or = self.or(result, slice);
        self.release(uext_e0);
        self.release(uext_e1);
        self.release(mul);
        self.release(slice);
        self.release(result);
        for temp in temps {
            self.release(temp);
        }
        or
    }

    /// Signed multiplication overflow; the construction splits on width 1,
    /// width 2 and the general case over sign-normalised operands.
    pub fn smulo(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        let width = self.width(e0);

        if width == 1 {
            return self.and(e0, e1);
        }
        if width == 2 {
            let sext_e0 = self.sext(e0, 1);
            let sext_e1 = self.sext(e1, 1);
            let mul = self.mul(sext_e0, sext_e1);
            let slice_n = self.slice(mul, width, width);
            let slice_n_minus_1 = self.slice(mul, width - 1, width - 1);
            let result = self.xor(slice_n, slice_n_minus_1);
            self.release(sext_e0);
            self.release(sext_e1);
            self.release(mul);
            self.release(slice_n);
            self.release(slice_n_minus_1);
            return result;
        }

        let sign_e0 = self.slice(e0, width - 1, width - 1);
        let sign_e1 = self.slice(e1, width - 1, width - 1);
        let sext_sign_e0 = self.sext(sign_e0, width - 1);
        let sext_sign_e1 = self.sext(sign_e1, width - 1);
        let xor_sign_e0 = self.xor(e0, sext_sign_e0);
        let xor_sign_e1 = self.xor(e1, sext_sign_e1);

        let mut temps: SmallVec<[NodeRef; 8]> = SmallVec::new();
        temps.push(self.slice(xor_sign_e1, width - 2, width - 2));
        for i in 1..width - 2 {
            let slice = self.slice(xor_sign_e1, width - 2 - i, width - 2 - i);
            let or = self.or(temps[(i - 1) as usize], slice);
            temps.push(or);
            self.release(slice);
        }
        let slice = self.slice(xor_sign_e0, 1, 1);
        let mut result = self.and(slice, temps[0]);
        self.release(slice);
        for i in 1..width - 2 {
            let slice = self.slice(xor_sign_e0, i + 1, i + 1);
            let and = self.and(slice, temps[i as usize]);
            let or = self.or(result, and);
            self.release(slice);
            self.release(and);
            self.release(result);
            result = or;
        }
        let sext_e0 = self.sext(e0, 1);
        let sext_e1 = self.sext(e1, 1);
        let mul = self.mul(sext_e0, sext_e1);
        let slice_n = self.slice(mul, width, width);
        let slice_n_minus_1 = self.slice(mul, width - 1, width - 1);
        let xor = self.xor(slice_n, slice_n_minus_1);
        let or = self.or(result, xor);
        self.release(sext_e0);
        self.release(sext_e1);
        self.release(sign_e0);
        self.release(sign_e1);
        self.release(sext_sign_e0);
        self.release(sext_sign_e1);
        self.release(xor_sign_e0);
        self.release(xor_sign_e1);
        self.release(mul);
        self.release(slice_n);
        self.release(slice_n_minus_1);
        self.release(xor);
        self.release(result);
        for temp in temps {
            self.release(temp);
        }
        or
    }

    // -- Signed division family -------------------------------------------

    /// Signed division: sign-normalise both operands around an unsigned
    /// division, then sign the result when exactly one operand was
    /// negative.
    pub fn sdiv(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        let width = self.width(e0);

        if width == 1 {
            return self.and(e0.not(), e1).not();
        }

        let sign_e0 = self.slice(e0, width - 1, width - 1);
        let sign_e1 = self.slice(e1, width - 1, width - 1);
        // does the result have to be signed?
        let xor = self.xor(sign_e0, sign_e1);
        let neg_e0 = self.neg(e0);
        let neg_e1 = self.neg(e1);
        let cond_e0 = self.cond(sign_e0, neg_e0, e0);
        let cond_e1 = self.cond(sign_e1, neg_e1, e1);
        let udiv = self.udiv(cond_e0, cond_e1);
        let neg_udiv = self.neg(udiv);
        let result = self.cond(xor, neg_udiv, udiv);
        self.release(sign_e0);
        self.release(sign_e1);
        self.release(xor);
        self.release(neg_e0);
        self.release(neg_e1);
        self.release(cond_e0);
        self.release(cond_e1);
        self.release(udiv);
        self.release(neg_udiv);
        result
    }

    /// Signed division overflow: `INT_MIN / -1`.
    pub fn sdivo(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        let int_min = self.min_signed(self.sort_of(e0));
        let ones = self.all_ones(self.sort_of(e1));
        let eq0 = self.eq(e0, int_min);
        let eq1 = self.eq(e1, ones);
        let result = self.and(eq0, eq1);
        self.release(int_min);
        self.release(ones);
        self.release(eq0);
        self.release(eq1);
        result
    }

    /// Signed remainder; the result carries the dividend's sign.
    pub fn srem(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        let width = self.width(e0);

        if width == 1 {
            return self.and(e0, e1.not());
        }

        let sign_e0 = self.slice(e0, width - 1, width - 1);
        let sign_e1 = self.slice(e1, width - 1, width - 1);
        let neg_e0 = self.neg(e0);
        let neg_e1 = self.neg(e1);
        let cond_e0 = self.cond(sign_e0, neg_e0, e0);
        let cond_e1 = self.cond(sign_e1, neg_e1, e1);
        let urem = self.urem(cond_e0, cond_e1);
        let neg_urem = self.neg(urem);
        let result = self.cond(sign_e0, neg_urem, urem);
        self.release(sign_e0);
        self.release(sign_e1);
        self.release(neg_e0);
        self.release(neg_e1);
        self.release(cond_e0);
        self.release(cond_e1);
        self.release(urem);
        self.release(neg_urem);
        result
    }

    /// Signed modulo with the sign of the divisor: a four-quadrant case
    /// analysis over a sign-normalised unsigned remainder, with the
    /// remainder-is-zero guard on the mixed-sign corrections.
    pub fn smod(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        let width = self.width(e0);

        let zero = self.zero(self.sort_of(e0));
        let sign_e0 = self.slice(e0, width - 1, width - 1);
        let sign_e1 = self.slice(e1, width - 1, width - 1);
        let neg_e0 = self.neg(e0);
        let neg_e1 = self.neg(e1);
        let pos_pos = self.and(sign_e0.not(), sign_e1.not());
        let pos_neg = self.and(sign_e0.not(), sign_e1);
        let neg_pos = self.and(sign_e0, sign_e1.not());
        let neg_neg = self.and(sign_e0, sign_e1);
        let cond_e0 = self.cond(sign_e0, neg_e0, e0);
        let cond_e1 = self.cond(sign_e1, neg_e1, e1);
        let urem = self.urem(cond_e0, cond_e1);
        let urem_zero = self.eq(urem, zero);
        let neg_urem = self.neg(urem);
        let add1 = self.add(neg_urem, e1);
        let add2 = self.add(urem, e1);
        let gadd1 = self.cond(urem_zero, zero, add1);
        let gadd2 = self.cond(urem_zero, zero, add2);
        let cond_case1 = self.cond(pos_pos, urem, zero);
        let cond_case2 = self.cond(neg_pos, gadd1, zero);
        let cond_case3 = self.cond(pos_neg, gadd2, zero);
        let cond_case4 = self.cond(neg_neg, neg_urem, zero);
        let or1 = self.or(cond_case1, cond_case2);
        let or2 = self.or(cond_case3, cond_case4);
        let result = self.or(or1, or2);
        self.release(zero);
        self.release(sign_e0);
        self.release(sign_e1);
        self.release(neg_e0);
        self.release(neg_e1);
        self.release(cond_e0);
        self.release(cond_e1);
        self.release(urem_zero);
        self.release(cond_case1);
        self.release(cond_case2);
        self.release(cond_case3);
        self.release(cond_case4);
        self.release(urem);
        self.release(neg_urem);
        self.release(add1);
        self.release(add2);
        self.release(gadd1);
        self.release(gadd2);
        self.release(or1);
        self.release(or2);
        self.release(pos_pos);
        self.release(pos_neg);
        self.release(neg_pos);
        self.release(neg_neg);
        result
    }

    // -- Arrays -----------------------------------------------------------

    /// Array read: `apply(array, args(index))`.
    pub fn read(&mut self, e_array: NodeRef, e_index: NodeRef) -> NodeRef {
        let e_array = self.chase(e_array);
        let e_index = self.chase(e_index);
        debug_assert!(self.precond_read(e_array, e_index));
        self.apply_n(e_array, &[e_index])
    }

    /// Array write as a lambda: `λp. ite(p = index, value, read(array, p))`,
    /// with the static rho seeded with the written pair to accelerate later
    /// reads.
    pub fn lambda_write(&mut self, e_array: NodeRef, e_index: NodeRef, e_value: NodeRef) -> NodeRef {
        let e_array = self.chase(e_array);
        let e_index = self.chase(e_index);
        let e_value = self.chase(e_value);
        let param = self.param(self.sort_of(e_index), None);
        let e_cond = self.eq(param, e_index);
        let e_if = self.copy(e_value);
        let e_else = self.read(e_array, param);
        let bvcond = self.cond(e_cond, e_if, e_else);
        let lambda = self.lambda(param, bvcond);
        if self.lambda_static_rho(lambda).is_none() {
            let args = self.args(&[e_index]);
            let value = self.copy(e_value);
            let mut rho = Rho::new();
            rho.insert(args.node(), value);
            match &mut self.arena.node_mut(lambda.node()).payload {
                Payload::Lambda { static_rho, .. } => *static_rho = Some(rho),
                _ => unreachable!("write lambda is a lambda"),
            }
        }
        self.release(e_if);
        self.release(e_else);
        self.release(e_cond);
        self.release(bvcond);
        self.release(param);
        self.arena.node_mut(lambda.node()).is_array = true;
        lambda
    }

    /// Array write. Parameterized index or value, or the store-as-lambdas
    /// option, selects the lambda form; otherwise an `Update` node is
    /// built.
    pub fn write(&mut self, e_array: NodeRef, e_index: NodeRef, e_value: NodeRef) -> NodeRef {
        let e_array = self.chase(e_array);
        let e_index = self.chase(e_index);
        let e_value = self.chase(e_value);
        debug_assert!(self.is_array(e_array));
        debug_assert!(self.precond_write(e_array, e_index, e_value));

        if self.opts.fun_store_lambdas
            || self.is_parameterized(e_index)
            || self.is_parameterized(e_value)
        {
            self.lambda_write(e_array, e_index, e_value)
        } else {
            let args = self.args(&[e_index]);
            let result = self.update(e_array, args, e_value);
            self.release(args);
            self.arena.node_mut(result.node()).is_array = true;
            result
        }
    }
}
