//! Primitive node constructors.
//!
//! Every compound constructor runs the same pipeline: forward the inputs
//! through their `simplified` chains, check preconditions, normalise
//! (commutative child order, even constants), consult the rewriter hook,
//! look the fingerprint up in the unique table, and only on a miss allocate
//! and wire a fresh node. Constructors return owning handles; a hit costs a
//! reference-count bump and nothing else.

use crate::bits::BitVector;
use crate::ctx::Context;
use crate::fx::FxHashSet;
use crate::hooks::Rewriter;
use crate::node::{Node, NodeData, NodeKind, NodeRef, Payload};
use crate::sort::Sort;
use log::trace;
use smallvec::SmallVec;
use std::rc::Rc;

/// Hard-wired maximum number of children per node; args chains carry the
/// chunking.
const MAX_ARGS_CHILDREN: usize = 3;

impl Context {
    fn rewrite_hook(&self) -> Option<Rc<dyn Rewriter>> {
        if self.opts.rewrite_level > 0 {
            self.rewriter.clone()
        } else {
            None
        }
    }

    // -- Allocation -------------------------------------------------------

    fn setup_node(&mut self, mut data: NodeData) -> Node {
        data.refs = 1;
        if data.kind == NodeKind::Apply {
            data.apply_below = true;
        }
        let n = self.arena.alloc(data);
        trace!("new {} ({})", n, self.arena.node(n).kind);
        n
    }

    fn new_node(&mut self, kind: NodeKind, e: &[NodeRef]) -> Node {
        debug_assert!(kind.is_binary() || kind.is_ternary());
        debug_assert!(kind != NodeKind::Lambda);
        let sort = match kind {
            NodeKind::Cond => {
                let s = self.sort_of(e[1]);
                self.sorts.copy(s)
            }
            NodeKind::Update => {
                let s = self.sort_of(e[0]);
                self.sorts.copy(s)
            }
            NodeKind::Concat => {
                let width = self.width(e[0]) + self.width(e[1]);
                self.sorts.bitvec(width)
            }
            NodeKind::BvEq | NodeKind::FunEq | NodeKind::Ult => self.sorts.boolean(),
            NodeKind::Apply => {
                let codomain = self.sorts.fun_codomain(self.sort_of(e[0]));
                self.sorts.copy(codomain)
            }
            _ => {
                let s = self.sort_of(e[0]);
                self.sorts.copy(s)
            }
        };
        let mut data = NodeData::new(kind, sort);
        data.arity = e.len() as u8;
        let n = self.setup_node(data);
        for (i, &child) in e.iter().enumerate() {
            self.connect_child(n, child, i);
        }
        if kind == NodeKind::FunEq {
            self.feqs.insert(n);
        }
        n
    }

    fn new_const_node(&mut self, bits: BitVector) -> Node {
        let sort = self.sorts.bitvec(bits.width());
        let inv_bits = bits.bvnot();
        let mut data = NodeData::new(NodeKind::BvConst, sort);
        data.payload = Payload::Const { bits, inv_bits };
        self.setup_node(data)
    }

    fn new_slice_node(&mut self, e0: NodeRef, upper: u32, lower: u32) -> Node {
        let sort = self.sorts.bitvec(upper - lower + 1);
        let mut data = NodeData::new(NodeKind::Slice, sort);
        data.arity = 1;
        data.payload = Payload::Slice { upper, lower };
        let n = self.setup_node(data);
        self.connect_child(n, e0, 0);
        n
    }

    fn new_args_node(&mut self, e: &[NodeRef]) -> Node {
        debug_assert!(!e.is_empty() && e.len() <= MAX_ARGS_CHILDREN);
        let mut element_sorts = Vec::with_capacity(e.len());
        for (i, &child) in e.iter().enumerate() {
            if !child.is_inverted() && self.kind(child) == NodeKind::Args {
                // A nested chain link only ever sits in the last slot.
                debug_assert_eq!(i, 2);
                let tuple = self.sort_of(child);
                for j in 0..self.sorts.tuple_arity(tuple) {
                    element_sorts.push(self.sorts.tuple_element(tuple, j));
                }
            } else {
                element_sorts.push(self.sort_of(child));
            }
        }
        let sort = self.sorts.tuple(&element_sorts);
        let mut data = NodeData::new(NodeKind::Args, sort);
        data.arity = e.len() as u8;
        let n = self.setup_node(data);
        for (i, &child) in e.iter().enumerate() {
            self.connect_child(n, child, i);
        }
        n
    }

    fn new_lambda_node(&mut self, e_param: NodeRef, e_body: NodeRef) -> Node {
        debug_assert!(!e_param.is_inverted());
        debug_assert_eq!(self.kind(e_param), NodeKind::Param);
        debug_assert!(!self.param_is_bound(e_param));
        let param = e_param.node();
        let body_is_lambda = !e_body.is_inverted() && self.kind(e_body) == NodeKind::Lambda;

        // Curried lambdas flatten: the domain collects every binder's sort
        // and the stored body skips the nested binders.
        let mut param_sorts = vec![self.sort_of(e_param)];
        let body_ptr = if body_is_lambda {
            let inner = self.lambda_body(e_body);
            let inner = self.chase(inner);
            let inner_domain = self.sorts.fun_domain(self.sort_of(e_body));
            for i in 0..self.sorts.tuple_arity(inner_domain) {
                param_sorts.push(self.sorts.tuple_element(inner_domain, i));
            }
            inner
        } else {
            e_body
        };
        debug_assert!(self.kind(body_ptr) != NodeKind::Lambda);
        let codomain = self.sort_of(body_ptr);
        let domain = self.sorts.tuple(&param_sorts);
        let sort = self.sorts.fun(domain, codomain);
        self.sorts.release(domain);

        let mut data = NodeData::new(NodeKind::Lambda, sort);
        data.arity = 2;
        data.lambda_below = true;
        data.payload = Payload::Lambda {
            body: body_ptr.into(),
            static_rho: None,
        };
        let n = self.setup_node(data);
        self.connect_child(n, e_param, 0);
        self.connect_child(n, e_body, 1);

        if body_is_lambda {
            // The nested lambda's free-param set moves up, minus the
            // parameter bound here.
            if let Some(mut set) = self.parameterized.remove(&e_body.node()) {
                set.remove(&param);
                if !set.is_empty() {
                    self.arena.node_mut(n).parameterized = true;
                    self.parameterized.insert(n, set);
                }
            }
        }

        match &mut self.arena.node_mut(param).payload {
            Payload::Param { binding, .. } => *binding = n.into(),
            _ => unreachable!("lambda child 0 is always a param"),
        }
        n
    }

    /// The shared constructor pipeline for hash-consed kinds with children.
    pub(crate) fn create(&mut self, kind: NodeKind, children: &[NodeRef]) -> NodeRef {
        debug_assert!(!children.is_empty() && children.len() <= 3);
        let mut e: SmallVec<[NodeRef; 3]> = children.iter().map(|&c| self.chase(c)).collect();

        // Free params are collected while hashing, but only for fresh
        // (non-curried) function bodies.
        let mut params: Option<FxHashSet<Node>> = None;
        let (lambda_hash, found) = if kind == NodeKind::Lambda {
            let body_is_lambda = !e[1].is_inverted() && self.kind(e[1]) == NodeKind::Lambda;
            if !body_is_lambda {
                params = Some(FxHashSet::default());
            }
            self.find_lambda(e[0].node(), e[1], params.as_mut(), true)
        } else {
            self.sort_commutative(kind, &mut e);
            (0, self.unique_find_children(kind, &e))
        };

        if let Some(n) = found {
            self.inc_ref(NodeRef::from(n));
            return NodeRef::from(n);
        }

        if self.unique.is_full() {
            self.unique_grow();
        }

        let n = match kind {
            NodeKind::Lambda => {
                let n = self.new_lambda_node(e[0], e[1]);
                self.lambdas.insert(n, lambda_hash);
                if let Some(set) = params {
                    if !set.is_empty() {
                        self.arena.node_mut(n).parameterized = true;
                        self.parameterized.insert(n, set);
                    }
                }
                n
            }
            NodeKind::Args => self.new_args_node(&e),
            _ => self.new_node(kind, &e),
        };
        self.unique_insert(n);
        NodeRef::from(n)
    }

    // -- Primitive terms --------------------------------------------------

    /// A bit-vector constant.
    ///
    /// Constants are normalised to be even: an odd value is stored as its
    /// complement and handed out through an inverted edge, so a constant
    /// and its negation share one allocation.
    pub fn constant(&mut self, bits: &BitVector) -> NodeRef {
        let (lookup, inverted) = if bits.lsb() {
            (bits.bvnot(), true)
        } else {
            (bits.clone(), false)
        };
        let n = match self.unique_find_const(&lookup) {
            Some(n) => {
                self.inc_ref(NodeRef::from(n));
                n
            }
            None => {
                if self.unique.is_full() {
                    self.unique_grow();
                }
                let n = self.new_const_node(lookup);
                self.unique_insert(n);
                n
            }
        };
        NodeRef::from(n).cond_invert(inverted)
    }

    /// The zero constant of a bit-vector sort.
    pub fn zero(&mut self, sort: Sort) -> NodeRef {
        let bits = BitVector::zeros(self.sorts.width(sort));
        self.constant(&bits)
    }

    /// The all-one constant of a bit-vector sort.
    pub fn all_ones(&mut self, sort: Sort) -> NodeRef {
        let bits = BitVector::ones(self.sorts.width(sort));
        self.constant(&bits)
    }

    /// The constant 1 of a bit-vector sort.
    pub fn one(&mut self, sort: Sort) -> NodeRef {
        let bits = BitVector::one(self.sorts.width(sort));
        self.constant(&bits)
    }

    /// The minimal signed constant (only the sign bit set).
    pub fn min_signed(&mut self, sort: Sort) -> NodeRef {
        let bits = BitVector::min_signed(self.sorts.width(sort));
        self.constant(&bits)
    }

    /// A constant from a signed integer, truncated or sign-extended.
    pub fn int_const(&mut self, value: i64, sort: Sort) -> NodeRef {
        let bits = BitVector::from_i64(value, self.sorts.width(sort));
        self.constant(&bits)
    }

    /// A constant from an unsigned integer, truncated or zero-extended.
    pub fn unsigned_const(&mut self, value: u64, sort: Sort) -> NodeRef {
        let bits = BitVector::from_u64(value, self.sorts.width(sort));
        self.constant(&bits)
    }

    /// The Boolean constant true.
    pub fn true_const(&mut self) -> NodeRef {
        let sort = self.sorts.boolean();
        let result = self.one(sort);
        self.sorts.release(sort);
        result
    }

    /// The Boolean constant false.
    pub fn false_const(&mut self) -> NodeRef {
        let sort = self.sorts.boolean();
        let result = self.zero(sort);
        self.sorts.release(sort);
        result
    }

    /// A fresh bit-vector variable. Variables are never hash-consed: every
    /// declaration is a distinct node.
    pub fn var(&mut self, sort: Sort, symbol: Option<&str>) -> NodeRef {
        assert!(self.sorts.is_bitvec(sort));
        let sort = self.sorts.copy(sort);
        let n = self.setup_node(NodeData::new(NodeKind::BvVar, sort));
        self.bv_vars.insert(n);
        let e = NodeRef::from(n);
        if let Some(symbol) = symbol {
            self.set_symbol(e, symbol);
        }
        e
    }

    /// A fresh lambda parameter, unbound until a lambda takes it.
    pub fn param(&mut self, sort: Sort, symbol: Option<&str>) -> NodeRef {
        assert!(self.sorts.is_bitvec(sort));
        let sort = self.sorts.copy(sort);
        let mut data = NodeData::new(NodeKind::Param, sort);
        data.parameterized = true;
        data.payload = Payload::Param {
            binding: None.into(),
            assigned: None.into(),
        };
        let n = self.setup_node(data);
        let e = NodeRef::from(n);
        if let Some(symbol) = symbol {
            self.set_symbol(e, symbol);
        }
        e
    }

    /// A fresh uninterpreted function. Never hash-consed.
    pub fn uf(&mut self, sort: Sort, symbol: Option<&str>) -> NodeRef {
        assert!(self.sorts.is_fun(sort));
        assert!(self.sorts.is_bitvec(self.sorts.fun_codomain(sort)));
        let sort = self.sorts.copy(sort);
        let n = self.setup_node(NodeData::new(NodeKind::Uf, sort));
        self.ufs.insert(n);
        let e = NodeRef::from(n);
        if let Some(symbol) = symbol {
            self.set_symbol(e, symbol);
        }
        e
    }

    /// A fresh array: an uninterpreted function of arity one with the array
    /// flag set.
    pub fn array(&mut self, sort: Sort, symbol: Option<&str>) -> NodeRef {
        assert!(self.sorts.is_fun(sort));
        assert_eq!(self.sorts.fun_arity(sort), 1);
        let e = self.uf(sort, symbol);
        self.arena.node_mut(e.node()).is_array = true;
        e
    }

    // -- Slice ------------------------------------------------------------

    /// Build a slice node without consulting the rewriter. With a positive
    /// rewrite level, inversion is pulled out of the operand so `slice(-x)`
    /// and `-slice(x)` share a node.
    pub fn slice_node(&mut self, e: NodeRef, upper: u32, lower: u32) -> NodeRef {
        let mut exp = self.chase(e);
        debug_assert!(self.precond_slice(exp, upper, lower));
        let inverted = if self.opts.rewrite_level > 0 && exp.is_inverted() {
            exp = exp.not();
            true
        } else {
            false
        };
        let n = match self.unique_find_slice(exp, upper, lower) {
            Some(n) => {
                self.inc_ref(NodeRef::from(n));
                n
            }
            None => {
                if self.unique.is_full() {
                    self.unique_grow();
                }
                let n = self.new_slice_node(exp, upper, lower);
                self.unique_insert(n);
                n
            }
        };
        NodeRef::from(n).cond_invert(inverted)
    }

    /// The bits `upper..=lower` of a term.
    pub fn slice(&mut self, e: NodeRef, upper: u32, lower: u32) -> NodeRef {
        let exp = self.chase(e);
        debug_assert!(self.precond_slice(exp, upper, lower));
        if let Some(rw) = self.rewrite_hook() {
            return rw.rewrite_slice(self, exp, upper, lower);
        }
        self.slice_node(exp, upper, lower)
    }

    // -- Binary and ternary kinds -----------------------------------------

    /// Conjunction node, bypassing the rewriter.
    pub fn and_node(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        self.create(NodeKind::And, &[e0, e1])
    }

    /// Equality node (bit-vector or function), bypassing the rewriter.
    pub fn eq_node(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_eq(e0, e1));
        let kind = if self.is_fun_node(e0) {
            NodeKind::FunEq
        } else {
            NodeKind::BvEq
        };
        self.create(kind, &[e0, e1])
    }

    /// Addition node, bypassing the rewriter.
    pub fn add_node(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        self.create(NodeKind::Add, &[e0, e1])
    }

    /// Multiplication node, bypassing the rewriter.
    pub fn mul_node(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        self.create(NodeKind::Mul, &[e0, e1])
    }

    /// Unsigned less-than node, bypassing the rewriter.
    pub fn ult_node(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        self.create(NodeKind::Ult, &[e0, e1])
    }

    /// Shift-left node, bypassing the rewriter.
    pub fn sll_node(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_shift(e0, e1));
        self.create(NodeKind::Sll, &[e0, e1])
    }

    /// Logical shift-right node, bypassing the rewriter.
    pub fn srl_node(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_shift(e0, e1));
        self.create(NodeKind::Srl, &[e0, e1])
    }

    /// Unsigned division node, bypassing the rewriter.
    pub fn udiv_node(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        self.create(NodeKind::Udiv, &[e0, e1])
    }

    /// Unsigned remainder node, bypassing the rewriter.
    pub fn urem_node(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        self.create(NodeKind::Urem, &[e0, e1])
    }

    /// Concatenation node, bypassing the rewriter.
    pub fn concat_node(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_concat(e0, e1));
        self.create(NodeKind::Concat, &[e0, e1])
    }

    /// Lambda node, bypassing the rewriter. Interned up to alpha-renaming.
    pub fn lambda_node(&mut self, param: NodeRef, body: NodeRef) -> NodeRef {
        let param = self.chase(param);
        let body = self.chase(body);
        self.create(NodeKind::Lambda, &[param, body])
    }

    /// Conditional node, bypassing the rewriter.
    ///
    /// A conditional over parameterized function branches cannot be stored
    /// directly; it is expressed as a fresh function applying both branches
    /// under new parameters, which the beta-reduction of a later apply
    /// resolves.
    pub fn cond_node(&mut self, e_cond: NodeRef, e_if: NodeRef, e_else: NodeRef) -> NodeRef {
        let e0 = self.chase(e_cond);
        let e1 = self.chase(e_if);
        let e2 = self.chase(e_else);
        debug_assert!(self.precond_cond(e0, e1, e2));

        if self.is_fun_node(e1) && (self.is_parameterized(e1) || self.is_parameterized(e2)) {
            let sort = self.sort_of(e1);
            let arity = self.sorts.fun_arity(sort);
            let domain = self.sorts.fun_domain(sort);
            let element_sorts: Vec<Sort> = (0..arity)
                .map(|i| self.sorts.tuple_element(domain, i))
                .collect();
            let params: Vec<NodeRef> = element_sorts
                .into_iter()
                .map(|s| self.param(s, None))
                .collect();
            let app_if = self.apply_n(e1, &params);
            let app_else = self.apply_n(e2, &params);
            let cond = self.create(NodeKind::Cond, &[e0, app_if, app_else]);
            let lambda = self.fun(&params, cond);
            for &p in &params {
                self.release(p);
            }
            self.release(app_if);
            self.release(app_else);
            self.release(cond);
            return lambda;
        }
        self.create(NodeKind::Cond, &[e0, e1, e2])
    }

    /// Application node, bypassing the rewriter. Applying a parameterized
    /// lambda eliminates the nested function through the beta-reduction
    /// hook instead of building a node.
    pub fn apply_node(&mut self, fun: NodeRef, args: NodeRef) -> NodeRef {
        let e0 = self.chase(fun);
        let e1 = self.chase(args);
        debug_assert!(self.precond_apply(e0, e1));

        if self.kind(e0) == NodeKind::Lambda && self.is_parameterized(e0) {
            if let Some(beta) = self.beta.clone() {
                self.assign_args(e0, e1);
                let result = beta.beta_reduce_bounded(self, e0, 1);
                self.unassign_params(e0);
                return result;
            }
        }
        self.create(NodeKind::Apply, &[e0, e1])
    }

    // -- Rewriting facades ------------------------------------------------

    /// Bit-wise conjunction.
    pub fn and(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        if let Some(rw) = self.rewrite_hook() {
            return rw.rewrite_binary(self, NodeKind::And, e0, e1);
        }
        self.and_node(e0, e1)
    }

    /// Equality over bit-vectors or functions.
    pub fn eq(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_eq(e0, e1));
        if let Some(rw) = self.rewrite_hook() {
            let kind = if self.is_fun_node(e0) {
                NodeKind::FunEq
            } else {
                NodeKind::BvEq
            };
            return rw.rewrite_binary(self, kind, e0, e1);
        }
        self.eq_node(e0, e1)
    }

    /// Addition.
    pub fn add(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        if let Some(rw) = self.rewrite_hook() {
            return rw.rewrite_binary(self, NodeKind::Add, e0, e1);
        }
        self.add_node(e0, e1)
    }

    /// Multiplication.
    pub fn mul(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        if let Some(rw) = self.rewrite_hook() {
            return rw.rewrite_binary(self, NodeKind::Mul, e0, e1);
        }
        self.mul_node(e0, e1)
    }

    /// Unsigned less-than.
    pub fn ult(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        if let Some(rw) = self.rewrite_hook() {
            return rw.rewrite_binary(self, NodeKind::Ult, e0, e1);
        }
        self.ult_node(e0, e1)
    }

    /// Logical shift left; the shift operand is log2(width) bits wide.
    pub fn sll(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_shift(e0, e1));
        if let Some(rw) = self.rewrite_hook() {
            return rw.rewrite_binary(self, NodeKind::Sll, e0, e1);
        }
        self.sll_node(e0, e1)
    }

    /// Logical shift right; the shift operand is log2(width) bits wide.
    pub fn srl(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_shift(e0, e1));
        if let Some(rw) = self.rewrite_hook() {
            return rw.rewrite_binary(self, NodeKind::Srl, e0, e1);
        }
        self.srl_node(e0, e1)
    }

    /// Unsigned division.
    pub fn udiv(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        if let Some(rw) = self.rewrite_hook() {
            return rw.rewrite_binary(self, NodeKind::Udiv, e0, e1);
        }
        self.udiv_node(e0, e1)
    }

    /// Unsigned remainder.
    pub fn urem(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_regular_binary_bv(e0, e1));
        if let Some(rw) = self.rewrite_hook() {
            return rw.rewrite_binary(self, NodeKind::Urem, e0, e1);
        }
        self.urem_node(e0, e1)
    }

    /// Concatenation; `e0` supplies the high bits.
    pub fn concat(&mut self, e0: NodeRef, e1: NodeRef) -> NodeRef {
        let e0 = self.chase(e0);
        let e1 = self.chase(e1);
        debug_assert!(self.precond_concat(e0, e1));
        if let Some(rw) = self.rewrite_hook() {
            return rw.rewrite_binary(self, NodeKind::Concat, e0, e1);
        }
        self.concat_node(e0, e1)
    }

    /// Lambda abstraction binding `param` in `body`.
    pub fn lambda(&mut self, param: NodeRef, body: NodeRef) -> NodeRef {
        debug_assert!(!param.is_inverted());
        debug_assert_eq!(self.kind(param), NodeKind::Param);
        let result = if let Some(rw) = self.rewrite_hook() {
            rw.rewrite_binary(self, NodeKind::Lambda, param, body)
        } else {
            self.lambda_node(param, body)
        };
        debug_assert!(self.is_fun_node(result));
        result
    }

    /// If-then-else over a Boolean condition.
    pub fn cond(&mut self, e_cond: NodeRef, e_if: NodeRef, e_else: NodeRef) -> NodeRef {
        let e0 = self.chase(e_cond);
        let e1 = self.chase(e_if);
        let e2 = self.chase(e_else);
        debug_assert!(self.precond_cond(e0, e1, e2));
        if let Some(rw) = self.rewrite_hook() {
            return rw.rewrite_ternary(self, NodeKind::Cond, e0, e1, e2);
        }
        self.cond_node(e0, e1, e2)
    }

    /// Function application of an args tuple.
    pub fn apply(&mut self, fun: NodeRef, args: NodeRef) -> NodeRef {
        let fun = self.chase(fun);
        let args = self.chase(args);
        debug_assert!(self.precond_apply(fun, args));
        if let Some(rw) = self.rewrite_hook() {
            return rw.rewrite_binary(self, NodeKind::Apply, fun, args);
        }
        self.apply_node(fun, args)
    }

    // -- Args, functions, stores ------------------------------------------

    /// Wrap argument terms into an args chain.
    ///
    /// More than three arguments split into a right-associated chain of
    /// args nodes (two bits of child-position tag leave room for at most
    /// three children). The deepest node is filled first, so the same
    /// argument list always produces the identical chain and hash-consing
    /// sees one shape.
    pub fn args(&mut self, args: &[NodeRef]) -> NodeRef {
        let argc = args.len();
        assert!(argc > 0);

        let mut cur_argc = if argc <= MAX_ARGS_CHILDREN {
            argc
        } else {
            let rem_free = argc % (MAX_ARGS_CHILDREN - 1);
            let mut num_args = argc / (MAX_ARGS_CHILDREN - 1);
            if rem_free > 1 {
                num_args += 1;
            }
            argc - (num_args - 1) * (MAX_ARGS_CHILDREN - 1)
        };

        let mut e: [Option<NodeRef>; MAX_ARGS_CHILDREN] = [None; MAX_ARGS_CHILDREN];
        let mut cnt = cur_argc as isize - 1;
        let mut result: Option<NodeRef> = None;

        for i in (0..argc).rev() {
            debug_assert!(!self.is_fun_node(args[i]));
            e[cnt as usize] = Some(self.chase(args[i]));
            cnt -= 1;
            if cnt < 0 {
                let children: SmallVec<[NodeRef; 3]> =
                    e[..cur_argc].iter().map(|c| c.expect("missing arg")).collect();
                let chunk = self.create(NodeKind::Args, &children);
                if let Some(last) = result {
                    self.release(last);
                }
                result = Some(chunk);
                cur_argc = MAX_ARGS_CHILDREN;
                e[MAX_ARGS_CHILDREN - 1] = Some(chunk);
                cnt = cur_argc as isize - 2;
            }
        }
        result.expect("argument chunking produced no node")
    }

    /// A (possibly curried) function binding `params` over `body`.
    pub fn fun(&mut self, params: &[NodeRef], body: NodeRef) -> NodeRef {
        assert!(!params.is_empty());
        let mut fun = self.chase(body);
        let mut prev: Option<NodeRef> = None;
        for &param in params.iter().rev() {
            debug_assert_eq!(self.kind(param), NodeKind::Param);
            fun = self.lambda(param, fun);
            if let Some(prev) = prev {
                self.release(prev);
            }
            prev = Some(fun);
        }
        fun
    }

    /// Apply `fun` to a plain argument list, chunking it on the way.
    pub fn apply_n(&mut self, fun: NodeRef, args: &[NodeRef]) -> NodeRef {
        let tuple = self.args(args);
        let fun = self.chase(fun);
        let chased_tuple = self.chase(tuple);
        let result = self.apply(fun, chased_tuple);
        self.release(tuple);
        result
    }

    /// Functional store: `update(fun, args, value)` behaves as `fun` except
    /// at `args`, where it yields `value`. Parameterized inputs fall back to
    /// the lambda encoding.
    pub fn update(&mut self, fun: NodeRef, args: NodeRef, value: NodeRef) -> NodeRef {
        let e0 = self.chase(fun);
        let e1 = self.chase(args);
        let e2 = self.chase(value);
        debug_assert!(self.is_fun_node(e0));
        debug_assert_eq!(self.kind(e1), NodeKind::Args);
        debug_assert!(!self.is_fun_node(e2));

        if self.is_parameterized(e0) || self.is_parameterized(e1) || self.is_parameterized(e2) {
            assert_eq!(self.args_arity(e1), 1);
            let index = self.child(e1, 0);
            return self.lambda_write(e0, index, e2);
        }
        let result = self.create(NodeKind::Update, &[e0, e1, e2]);
        if self.is_array(e0) {
            self.arena.node_mut(result.node()).is_array = true;
        }
        result
    }

    /// Build a term of the given kind from a child array.
    pub fn build(&mut self, kind: NodeKind, e: &[NodeRef]) -> NodeRef {
        match kind {
            NodeKind::And => self.and(e[0], e[1]),
            NodeKind::BvEq | NodeKind::FunEq => self.eq(e[0], e[1]),
            NodeKind::Add => self.add(e[0], e[1]),
            NodeKind::Mul => self.mul(e[0], e[1]),
            NodeKind::Ult => self.ult(e[0], e[1]),
            NodeKind::Sll => self.sll(e[0], e[1]),
            NodeKind::Srl => self.srl(e[0], e[1]),
            NodeKind::Udiv => self.udiv(e[0], e[1]),
            NodeKind::Urem => self.urem(e[0], e[1]),
            NodeKind::Concat => self.concat(e[0], e[1]),
            NodeKind::Apply => self.apply(e[0], e[1]),
            NodeKind::Lambda => self.lambda(e[0], e[1]),
            NodeKind::Cond => self.cond(e[0], e[1], e[2]),
            NodeKind::Update => self.update(e[0], e[1], e[2]),
            NodeKind::Args => self.args(e),
            _ => panic!("cannot build {} terms through the facade", kind),
        }
    }

    // -- Preconditions (contract checks, debug builds) --------------------

    pub(crate) fn precond_regular_unary_bv(&self, e: NodeRef) -> bool {
        assert!(self.is_live(e));
        assert!(self.arena.node(e.node()).simplified.is_none());
        assert!(!self.is_fun_node(e));
        true
    }

    pub(crate) fn precond_regular_binary_bv(&self, e0: NodeRef, e1: NodeRef) -> bool {
        assert!(self.precond_regular_unary_bv(e0));
        assert!(self.precond_regular_unary_bv(e1));
        assert_eq!(self.sort_of(e0), self.sort_of(e1), "operand sorts differ");
        true
    }

    pub(crate) fn precond_eq(&self, e0: NodeRef, e1: NodeRef) -> bool {
        assert!(self.is_live(e0) && self.is_live(e1));
        assert!(self.arena.node(e0.node()).simplified.is_none());
        assert!(self.arena.node(e1.node()).simplified.is_none());
        assert_eq!(self.sort_of(e0), self.sort_of(e1), "operand sorts differ");
        assert_eq!(self.is_array(e0), self.is_array(e1));
        assert!(!self.is_fun_node(e0) || (!e0.is_inverted() && !e1.is_inverted()));
        true
    }

    pub(crate) fn precond_concat(&self, e0: NodeRef, e1: NodeRef) -> bool {
        assert!(self.precond_regular_unary_bv(e0));
        assert!(self.precond_regular_unary_bv(e1));
        assert!(self.width(e0) <= u32::max_value() - self.width(e1));
        true
    }

    pub(crate) fn precond_shift(&self, e0: NodeRef, e1: NodeRef) -> bool {
        assert!(self.precond_regular_unary_bv(e0));
        assert!(self.precond_regular_unary_bv(e1));
        let width = self.width(e0);
        assert!(width > 1, "shift operand must be wider than one bit");
        assert!(width.is_power_of_two());
        assert_eq!(
            width.trailing_zeros(),
            self.width(e1),
            "shift amount must be log2(width) bits wide"
        );
        true
    }

    pub(crate) fn precond_slice(&self, e: NodeRef, upper: u32, lower: u32) -> bool {
        assert!(self.precond_regular_unary_bv(e));
        assert!(upper >= lower);
        assert!(upper < self.width(e));
        true
    }

    pub(crate) fn precond_cond(&self, e_cond: NodeRef, e_if: NodeRef, e_else: NodeRef) -> bool {
        assert!(self.is_live(e_cond) && self.is_live(e_if) && self.is_live(e_else));
        assert!(self.arena.node(e_cond.node()).simplified.is_none());
        assert!(self.arena.node(e_if.node()).simplified.is_none());
        assert!(self.arena.node(e_else.node()).simplified.is_none());
        assert_eq!(self.width(e_cond), 1);
        assert_eq!(self.sort_of(e_if), self.sort_of(e_else), "branch sorts differ");
        assert_eq!(self.is_array(e_if), self.is_array(e_else));
        true
    }

    pub(crate) fn precond_apply(&self, fun: NodeRef, args: NodeRef) -> bool {
        assert!(!fun.is_inverted());
        assert!(!args.is_inverted());
        assert!(self.is_fun_node(fun));
        assert_eq!(self.kind(args), NodeKind::Args);
        assert_eq!(
            self.sorts.fun_domain(self.sort_of(fun)),
            self.sort_of(args),
            "application domain mismatch"
        );
        true
    }

    pub(crate) fn precond_read(&self, e_array: NodeRef, e_index: NodeRef) -> bool {
        assert!(!e_array.is_inverted());
        assert!(self.is_fun_node(e_array));
        assert!(self.arena.node(e_array.node()).simplified.is_none());
        assert!(self.precond_regular_unary_bv(e_index));
        assert_eq!(
            self.sorts.array_index(self.sort_of(e_array)),
            self.sort_of(e_index)
        );
        true
    }

    pub(crate) fn precond_write(
        &self,
        e_array: NodeRef,
        e_index: NodeRef,
        e_value: NodeRef,
    ) -> bool {
        assert!(self.precond_read(e_array, e_index));
        assert!(self.precond_regular_unary_bv(e_value));
        assert_eq!(
            self.sorts.array_element(self.sort_of(e_array)),
            self.sort_of(e_value)
        );
        true
    }
}
