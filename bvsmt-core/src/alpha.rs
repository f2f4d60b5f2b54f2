//! Lambda interning up to alpha-equivalence.
//!
//! Two lambdas share a node iff their bodies coincide after renaming the
//! bound parameters. The fingerprint must therefore be independent of
//! parameter identity: parameterized subterms contribute their *kind* (not
//! their id) to the hash, and a collision is confirmed by walking the
//! candidate and the query body in lockstep under a parameter substitution.
//!
//! Both traversals are iterative; lambda bodies can be arbitrarily deep.

use crate::ctx::Context;
use crate::fx::{FxHashMap, FxHashSet};
use crate::node::{Node, NodeKind, NodeRef};

impl Context {
    /// The alpha-invariant traversal hash of `lambda(param, body)`.
    ///
    /// Non-parameterized subterms contribute their signed id once per edge;
    /// nested lambdas contribute their cached hash plus their kind and their
    /// parameter's kind; every other parameterized subterm contributes its
    /// kind, negated on inverted edges, once. When `params` is given, the
    /// free parameters of the body other than `param` are collected into it.
    pub(crate) fn hash_lambda(
        &self,
        param: Node,
        body: NodeRef,
        mut params: Option<&mut FxHashSet<Node>>,
    ) -> u32 {
        debug_assert_eq!(self.arena.node(param).kind, NodeKind::Param);
        let mut marked: FxHashSet<Node> = FxHashSet::default();
        let mut visit: Vec<NodeRef> = vec![body];
        let mut hash: u32 = 0;

        while let Some(cur) = visit.pop() {
            let real = cur.node();
            if marked.contains(&real) {
                continue;
            }
            let nd = self.arena.node(real);

            if !nd.parameterized {
                hash = hash.wrapping_add(cur.signed_id() as i32 as u32);
                continue;
            }

            // A nested lambda was hashed at its own creation; reuse that
            // value instead of descending into the sub-DAG.
            if nd.kind == NodeKind::Lambda {
                hash = hash
                    .wrapping_add(self.lambdas[&real])
                    .wrapping_add(nd.kind as u32)
                    .wrapping_add(self.arena.node(nd.child(0).node()).kind as u32);
                continue;
            } else if nd.kind == NodeKind::Param && real != param {
                if let Some(set) = params.as_mut() {
                    set.insert(real);
                }
            }

            marked.insert(real);
            let kind = nd.kind as u32;
            hash = hash.wrapping_add(if cur.is_inverted() {
                kind.wrapping_neg()
            } else {
                kind
            });
            for i in 0..nd.arity as usize {
                visit.push(nd.child(i));
            }
        }
        hash
    }

    /// Search the unique table for a lambda alpha-equal to
    /// `lambda(param, body)`. Returns the traversal hash along with the
    /// match, if any; `compare` enables the structural comparison (disabled
    /// for the inner lookups of a comparison already in progress).
    pub(crate) fn find_lambda(
        &self,
        param: Node,
        body: NodeRef,
        params: Option<&mut FxHashSet<Node>>,
        compare: bool,
    ) -> (u32, Option<Node>) {
        let hash = self.hash_lambda(param, body, params);
        let mut cur = self.unique.head(hash);
        while let Some(n) = cur {
            let nd = self.arena.node(n);
            if nd.kind == NodeKind::Lambda {
                let exact = nd.child(0).node() == param && nd.child(1) == body;
                if exact || (!nd.parameterized && compare && self.compare_lambda(param, body, n)) {
                    return (hash, Some(n));
                }
            }
            cur = nd.next_unique.expand();
        }
        (hash, None)
    }

    /// Structural comparison of `lambda(param, body)` against the candidate
    /// `lambda` under the substitution `param -> candidate.param`.
    ///
    /// The query body is walked bottom-up; each parameterized inner node is
    /// reconstructed by unique-table lookup over its mapped children, and
    /// the walk fails as soon as a lookup misses or a sort disagrees. The
    /// lambdas are equal iff the reconstruction of the whole body yields
    /// exactly the candidate's body edge.
    fn compare_lambda(&self, param: Node, body: NodeRef, lambda: Node) -> bool {
        debug_assert_eq!(self.arena.node(param).kind, NodeKind::Param);
        debug_assert!(!self.arena.node(lambda).parameterized);
        let cand_param = self.arena.node(lambda).child(0).node();
        let cand_body = self.arena.node(lambda).child(1);

        if self.arena.node(param).sort != self.arena.node(cand_param).sort
            || self.arena.node(body.node()).sort != self.arena.node(cand_body.node()).sort
        {
            return false;
        }

        let mut param_map: FxHashMap<Node, Node> = FxHashMap::default();
        param_map.insert(param, cand_param);

        // Curried bodies pair up binder by binder before the walk.
        let body_is_lambda =
            !body.is_inverted() && self.arena.node(body.node()).kind == NodeKind::Lambda;
        let cand_is_lambda =
            !cand_body.is_inverted() && self.arena.node(cand_body.node()).kind == NodeKind::Lambda;
        if body_is_lambda && cand_is_lambda {
            let chain = self.lambda_chain(body.node());
            let cand_chain = self.lambda_chain(cand_body.node());
            for (i, &l0) in chain.iter().enumerate() {
                let l1 = match cand_chain.get(i) {
                    Some(&l1) => l1,
                    None => return false,
                };
                if self.arena.node(l0).sort != self.arena.node(l1).sort {
                    return false;
                }
                let p0 = self.arena.node(l0).child(0).node();
                let p1 = self.arena.node(l1).child(0).node();
                if self.arena.node(p0).sort != self.arena.node(p1).sort {
                    return false;
                }
                param_map.insert(p0, p1);
            }
        } else if body_is_lambda || cand_is_lambda {
            return false;
        }

        // Bottom-up reconstruction. `cache` remembers, per real node, the
        // candidate node it rebuilt to; an entry of `None` marks a node
        // whose children are still being processed.
        let mut cache: FxHashMap<Node, Option<NodeRef>> = FxHashMap::default();
        let mut stack: Vec<NodeRef> = vec![body];
        let mut args: Vec<NodeRef> = Vec::new();

        while let Some(cur) = stack.pop() {
            let real = cur.node();
            let nd = self.arena.node(real);

            if !nd.parameterized {
                args.push(cur);
                continue;
            }

            match cache.get(&real).copied() {
                None => {
                    cache.insert(real, None);
                    stack.push(cur);
                    for i in (0..nd.arity as usize).rev() {
                        stack.push(nd.child(i));
                    }
                }
                Some(None) => {
                    let arity = nd.arity as usize;
                    debug_assert!(args.len() >= arity);
                    let e: Vec<NodeRef> = args.split_off(args.len() - arity);
                    let found: Option<NodeRef> = match nd.kind {
                        NodeKind::Slice => {
                            let (upper, lower) = nd.slice_bounds();
                            self.unique_find_slice(e[0], upper, lower).map(NodeRef::from)
                        }
                        NodeKind::Lambda => self
                            .find_lambda(e[0].node(), e[1], None, false)
                            .1
                            .map(NodeRef::from),
                        NodeKind::Param => Some(NodeRef::from(
                            param_map.get(&real).copied().unwrap_or(real),
                        )),
                        kind => {
                            let mut e = e.clone();
                            self.sort_commutative(kind, &mut e);
                            self.unique_find_children(kind, &e).map(NodeRef::from)
                        }
                    };
                    match found {
                        None => return false,
                        Some(found) => {
                            args.push(found.cond_invert(cur.is_inverted()));
                            cache.insert(real, Some(found));
                        }
                    }
                }
                Some(Some(done)) => {
                    args.push(done.cond_invert(cur.is_inverted()));
                }
            }
        }

        debug_assert!(args.len() <= 1);
        args.last().map_or(false, |&top| top == cand_body)
    }
}
