//! The solver context: arena, unique table, side tables and lifetimes.
//!
//! A `Context` owns every node of one term DAG. All mutation goes through
//! it; two contexts share no state, and a handle is only meaningful in the
//! context that created it. The context is single-threaded by construction
//! (`&mut self` everywhere) and no operation blocks or performs I/O.
//!
//! Node lifetimes follow the sequence
//!
//! ```text
//!   unique -> !unique -> erased -> disconnected -> invalid
//! ```
//!
//! with a loop back from `disconnected` to `!unique` when a rewritten node
//! is reused as a `Proxy`.

use crate::bits::BitVector;
use crate::fx::{FxHashMap, FxHashSet};
use crate::hooks::{BetaReducer, Rewriter};
use crate::node::{AigVec, Node, NodeArena, NodeKind, NodeRef, ParentLink, Payload, Rho};
use crate::sort::{Sort, SortTable};
use crate::unique::{hash_children, hash_slice, UniqueTable};
use log::{debug, trace};
use smallvec::SmallVec;
use std::rc::Rc;

/// Tunable behaviour of a context.
#[derive(Clone, Copy, Debug)]
pub struct Options {
    /// Rewrite level; the installed [`Rewriter`] is consulted iff this is
    /// positive. Level 0 also disables the inversion normalisation of
    /// slices.
    pub rewrite_level: u8,
    /// Store the children of commutative binary nodes in ascending id
    /// order.
    pub sort_exp: bool,
    /// Encode every functional store as a lambda instead of an `Update`
    /// node.
    pub fun_store_lambdas: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            rewrite_level: 1,
            sort_exp: true,
            fun_store_lambdas: false,
        }
    }
}

/// A solver context owning one expression DAG.
pub struct Context {
    pub(crate) arena: NodeArena,
    pub(crate) sorts: SortTable,
    pub(crate) unique: UniqueTable,
    /// All live bit-vector variables.
    pub(crate) bv_vars: FxHashSet<Node>,
    /// All live uninterpreted functions.
    pub(crate) ufs: FxHashSet<Node>,
    /// All live function equalities.
    pub(crate) feqs: FxHashSet<Node>,
    /// Lambda node -> its cached traversal hash. The hash is computed once
    /// at creation; rehashing the table must reuse it.
    pub(crate) lambdas: FxHashMap<Node, u32>,
    /// Lambda node -> free parameters occurring in its body.
    pub(crate) parameterized: FxHashMap<Node, FxHashSet<Node>>,
    pub(crate) symbols: FxHashMap<String, Node>,
    pub(crate) node_symbols: FxHashMap<Node, String>,
    pub(crate) opts: Options,
    pub(crate) external_refs: u64,
    pub(crate) rewriter: Option<Rc<dyn Rewriter>>,
    pub(crate) beta: Option<Rc<dyn BetaReducer>>,
}

impl Context {
    /// Create an empty context with default options.
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    /// Create an empty context with the given options.
    pub fn with_options(opts: Options) -> Self {
        Self {
            arena: NodeArena::new(),
            sorts: SortTable::new(),
            unique: UniqueTable::new(),
            bv_vars: FxHashSet::default(),
            ufs: FxHashSet::default(),
            feqs: FxHashSet::default(),
            lambdas: FxHashMap::default(),
            parameterized: FxHashMap::default(),
            symbols: FxHashMap::default(),
            node_symbols: FxHashMap::default(),
            opts,
            external_refs: 0,
            rewriter: None,
            beta: None,
        }
    }

    /// The context options.
    pub fn options(&self) -> &Options {
        &self.opts
    }

    /// Mutable access to the context options.
    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.opts
    }

    /// Install or remove the rewriting hook.
    pub fn set_rewriter(&mut self, rewriter: Option<Rc<dyn Rewriter>>) {
        self.rewriter = rewriter;
    }

    /// Install or remove the beta-reduction hook.
    pub fn set_beta_reducer(&mut self, beta: Option<Rc<dyn BetaReducer>>) {
        self.beta = beta;
    }

    // -- Sort constructors and queries (delegated to the registry) --------

    /// The Boolean sort (the width-1 bit-vector sort).
    pub fn bool_sort(&mut self) -> Sort {
        self.sorts.boolean()
    }

    /// A bit-vector sort of positive width.
    pub fn bitvec_sort(&mut self, width: u32) -> Sort {
        self.sorts.bitvec(width)
    }

    /// A tuple sort.
    pub fn tuple_sort(&mut self, elements: &[Sort]) -> Sort {
        self.sorts.tuple(elements)
    }

    /// A function sort from a tuple domain to a bit-vector codomain.
    pub fn fun_sort(&mut self, domain: Sort, codomain: Sort) -> Sort {
        self.sorts.fun(domain, codomain)
    }

    /// An array sort: a function of arity one.
    pub fn array_sort(&mut self, index: Sort, element: Sort) -> Sort {
        self.sorts.array(index, element)
    }

    /// Take an additional reference to a sort.
    pub fn copy_sort(&mut self, sort: Sort) -> Sort {
        self.sorts.copy(sort)
    }

    /// Drop a sort reference.
    pub fn release_sort(&mut self, sort: Sort) {
        self.sorts.release(sort)
    }

    /// Is `sort` a bit-vector sort?
    pub fn is_bitvec_sort(&self, sort: Sort) -> bool {
        self.sorts.is_bitvec(sort)
    }

    /// Is `sort` the Boolean (width-1) sort?
    pub fn is_bool_sort(&self, sort: Sort) -> bool {
        self.sorts.is_bool(sort)
    }

    /// Is `sort` a function sort?
    pub fn is_fun_sort(&self, sort: Sort) -> bool {
        self.sorts.is_fun(sort)
    }

    /// Is `sort` a tuple sort?
    pub fn is_tuple_sort(&self, sort: Sort) -> bool {
        self.sorts.is_tuple(sort)
    }

    /// Width of a bit-vector sort.
    pub fn sort_width(&self, sort: Sort) -> u32 {
        self.sorts.width(sort)
    }

    /// Domain tuple of a function sort.
    pub fn fun_domain_sort(&self, sort: Sort) -> Sort {
        self.sorts.fun_domain(sort)
    }

    /// Codomain of a function sort.
    pub fn fun_codomain_sort(&self, sort: Sort) -> Sort {
        self.sorts.fun_codomain(sort)
    }

    /// Index sort of an array (unary function) sort.
    pub fn array_index_sort(&self, sort: Sort) -> Sort {
        self.sorts.array_index(sort)
    }

    /// Element sort of an array (unary function) sort.
    pub fn array_element_sort(&self, sort: Sort) -> Sort {
        self.sorts.array_element(sort)
    }

    /// Arity of a tuple sort.
    pub fn tuple_sort_arity(&self, sort: Sort) -> u32 {
        self.sorts.tuple_arity(sort)
    }

    /// Element `i` of a tuple sort.
    pub fn tuple_sort_element(&self, sort: Sort, i: u32) -> Sort {
        self.sorts.tuple_element(sort, i)
    }

    // -- Reference management ---------------------------------------------

    pub(crate) fn inc_ref(&mut self, e: NodeRef) {
        let nd = self.arena.node_mut(e.node());
        assert!(
            nd.refs < u32::max_value(),
            "node reference counter overflow"
        );
        nd.refs += 1;
    }

    /// Take an additional owning reference to a term.
    pub fn copy(&mut self, e: NodeRef) -> NodeRef {
        self.inc_ref(e);
        e
    }

    /// Drop one owning reference; when the last one goes, the reachable
    /// subgraph is reclaimed iteratively.
    pub fn release(&mut self, e: NodeRef) {
        let root = e.node();
        let refs = self.arena.node(root).refs;
        assert!(refs > 0, "release of a released node");
        if refs > 1 {
            self.arena.node_mut(root).refs -= 1;
        } else {
            self.recursively_release(root);
        }
    }

    /// Record one externally held (API-level) reference on top of `copy`.
    pub fn inc_ext(&mut self, e: NodeRef) {
        let nd = self.arena.node_mut(e.node());
        assert!(
            nd.ext_refs < u32::max_value(),
            "node reference counter overflow"
        );
        nd.ext_refs += 1;
        self.external_refs += 1;
    }

    /// Drop one externally held reference.
    pub fn dec_ext(&mut self, e: NodeRef) {
        let nd = self.arena.node_mut(e.node());
        assert!(nd.ext_refs > 0);
        nd.ext_refs -= 1;
        self.external_refs -= 1;
    }

    /// Total number of externally held references in this context.
    pub fn external_refs(&self) -> u64 {
        self.external_refs
    }

    /// Iterative release sweep. The work stack replaces natural recursion;
    /// deep derivations must not consume call stack.
    fn recursively_release(&mut self, root: Node) {
        debug_assert_eq!(self.arena.node(root).refs, 1);
        let mut stack: Vec<NodeRef> = Vec::new();
        let mut cur = root;
        loop {
            {
                let nd = self.arena.node(cur);
                debug_assert_eq!(nd.refs, 1);
                debug_assert!(nd.ext_refs <= 1);
                debug_assert_eq!(nd.parents, 0);
                for i in (0..nd.arity as usize).rev() {
                    stack.push(nd.child(i));
                }
            }
            if let Some(simplified) = self.arena.node_mut(cur).simplified.take() {
                stack.push(simplified);
            }
            self.unique_remove(cur);
            self.erase_local_data(cur, true);
            // The children are on the stack, so they outlive the disconnect
            // below even when this node held their last reference.
            self.remove_from_hash_tables(cur, false);
            self.disconnect_children(cur);
            self.really_deallocate(cur);

            loop {
                match stack.pop() {
                    None => return,
                    Some(e) => {
                        let n = e.node();
                        let nd = self.arena.node_mut(n);
                        if nd.refs > 1 {
                            nd.refs -= 1;
                        } else {
                            cur = n;
                            break;
                        }
                    }
                }
            }
        }
    }

    fn really_deallocate(&mut self, n: Node) {
        let nd = self.arena.node(n);
        debug_assert!(!nd.unique && nd.erased && nd.disconnected);
        trace!("free {} ({})", n, nd.kind);
        self.arena.node_mut(n).kind = NodeKind::Invalid;
        self.arena.free(n);
    }

    /// Delete kind-specific data. Keeps the sort alive when `free_sort` is
    /// false (the proxy conversion path).
    pub(crate) fn erase_local_data(&mut self, n: Node, free_sort: bool) {
        {
            let nd = self.arena.node(n);
            debug_assert!(!nd.unique && !nd.erased && !nd.disconnected);
            debug_assert!(nd.kind != NodeKind::Invalid);
        }
        let kind = self.arena.node(n).kind;
        match kind {
            NodeKind::BvConst => {
                self.arena.node_mut(n).payload = Payload::None;
            }
            NodeKind::Lambda => {
                let static_rho = match &mut self.arena.node_mut(n).payload {
                    Payload::Lambda { static_rho, .. } => static_rho.take(),
                    _ => None,
                };
                if let Some(rho) = static_rho {
                    for (args, value) in rho.into_entries() {
                        self.release(NodeRef::from(args));
                        self.release(value);
                    }
                }
                self.arena.node_mut(n).rho = None;
            }
            NodeKind::Update | NodeKind::Uf => {
                self.arena.node_mut(n).rho = None;
            }
            NodeKind::Cond => {
                if self.is_fun_cond_node(n) {
                    self.arena.node_mut(n).rho = None;
                }
            }
            _ => {}
        }
        if free_sort {
            let sort = self.arena.node(n).sort;
            self.sorts.release(sort);
        }
        let nd = self.arena.node_mut(n);
        nd.av = None;
        nd.erased = true;
    }

    pub(crate) fn remove_from_hash_tables(&mut self, n: Node, keep_symbol: bool) {
        match self.arena.node(n).kind {
            NodeKind::BvVar => {
                self.bv_vars.remove(&n);
            }
            NodeKind::Lambda => {
                self.lambdas.remove(&n);
            }
            NodeKind::Uf => {
                self.ufs.remove(&n);
            }
            NodeKind::FunEq => {
                self.feqs.remove(&n);
            }
            _ => {}
        }
        if !keep_symbol {
            if let Some(symbol) = self.node_symbols.remove(&n) {
                self.symbols.remove(&symbol);
            }
        }
        self.parameterized.remove(&n);
    }

    // -- Parent list wiring -----------------------------------------------

    /// Connect `child` as child `pos` of `parent` and splice the parent
    /// edge into the child's parent list: at the head normally, at the tail
    /// for `Apply` parents (downstream passes rely on that ordering).
    pub(crate) fn connect_child(&mut self, parent: Node, child: NodeRef, pos: usize) {
        debug_assert!(pos <= 2);
        debug_assert_eq!(self.chase(child), child);
        let child_real = child.node();
        debug_assert!(
            self.arena.node(child_real).kind != NodeKind::Args
                || matches!(
                    self.arena.node(parent).kind,
                    NodeKind::Args | NodeKind::Apply | NodeKind::Update
                )
        );

        let (c_param, c_lambda_below, c_apply_below, c_is_array) = {
            let cd = self.arena.node(child_real);
            (
                cd.parameterized,
                cd.lambda_below,
                cd.apply_below,
                cd.is_array,
            )
        };
        let p_kind = self.arena.node(parent).kind;
        let p_fun_cond = self.is_fun_cond_node(parent);
        {
            let pd = self.arena.node_mut(parent);
            // A lambda does not inherit `parameterized`: it binds.
            if p_kind != NodeKind::Lambda && c_param {
                pd.parameterized = true;
            }
            if p_fun_cond && c_is_array {
                pd.is_array = true;
            }
            if c_lambda_below {
                pd.lambda_below = true;
            }
            if c_apply_below {
                pd.apply_below = true;
            }
        }
        self.arena.node_mut(child_real).parents += 1;
        self.inc_ref(child);

        let insert_at_head = p_kind != NodeKind::Apply;
        let tagged = ParentLink::new(parent, pos);
        debug_assert!(self.arena.node(parent).prev_parent[pos].is_none());
        debug_assert!(self.arena.node(parent).next_parent[pos].is_none());
        self.arena.node_mut(parent).children[pos] = child.into();

        let (first, last) = {
            let cd = self.arena.node(child_real);
            (cd.first_parent.expand(), cd.last_parent.expand())
        };
        match first {
            None => {
                debug_assert!(last.is_none());
                let cd = self.arena.node_mut(child_real);
                cd.first_parent = tagged.into();
                cd.last_parent = tagged.into();
            }
            Some(first) if insert_at_head => {
                self.arena.node_mut(parent).next_parent[pos] = first.into();
                self.arena.node_mut(first.parent()).prev_parent[first.pos()] = tagged.into();
                self.arena.node_mut(child_real).first_parent = tagged.into();
            }
            Some(_) => {
                let last = last.expect("corrupt parent list");
                self.arena.node_mut(parent).prev_parent[pos] = last.into();
                self.arena.node_mut(last.parent()).next_parent[last.pos()] = tagged.into();
                self.arena.node_mut(child_real).last_parent = tagged.into();
            }
        }
    }

    /// Undo `connect_child` for child `pos` of `parent`. Does not touch
    /// reference counts.
    pub(crate) fn disconnect_child(&mut self, parent: Node, pos: usize) {
        let p_kind = self.arena.node(parent).kind;
        debug_assert!(
            p_kind != NodeKind::BvConst && p_kind != NodeKind::BvVar && p_kind != NodeKind::Uf
        );
        let child = self.arena.node(parent).child(pos);
        let child_real = child.node();

        // A param disconnected from its lambda loses the back-reference,
        // unless a rebuilt lambda has already re-bound it.
        if p_kind == NodeKind::Lambda && pos == 0 {
            if let Payload::Param { binding, .. } = &mut self.arena.node_mut(child_real).payload {
                if binding.expand() == Some(parent) {
                    *binding = None.into();
                }
            }
        }

        self.arena.node_mut(child_real).parents -= 1;
        let tagged = ParentLink::new(parent, pos);
        let first = self
            .arena
            .node(child_real)
            .first_parent
            .expect("empty parent list");
        let last = self
            .arena
            .node(child_real)
            .last_parent
            .expect("empty parent list");
        let next = self.arena.node(parent).next_parent[pos].expand();
        let prev = self.arena.node(parent).prev_parent[pos].expand();

        if first == tagged && last == tagged {
            debug_assert!(next.is_none() && prev.is_none());
            let cd = self.arena.node_mut(child_real);
            cd.first_parent = None.into();
            cd.last_parent = None.into();
        } else if first == tagged {
            let next = next.expect("corrupt parent list");
            self.arena.node_mut(next.parent()).prev_parent[next.pos()] = None.into();
            self.arena.node_mut(child_real).first_parent = next.into();
        } else if last == tagged {
            let prev = prev.expect("corrupt parent list");
            self.arena.node_mut(prev.parent()).next_parent[prev.pos()] = None.into();
            self.arena.node_mut(child_real).last_parent = prev.into();
        } else {
            let next = next.expect("corrupt parent list");
            let prev = prev.expect("corrupt parent list");
            self.arena.node_mut(next.parent()).prev_parent[next.pos()] = prev.into();
            self.arena.node_mut(prev.parent()).next_parent[prev.pos()] = next.into();
        }
        let pd = self.arena.node_mut(parent);
        pd.next_parent[pos] = None.into();
        pd.prev_parent[pos] = None.into();
        pd.children[pos] = None.into();
    }

    pub(crate) fn disconnect_children(&mut self, n: Node) {
        {
            let nd = self.arena.node(n);
            debug_assert!(!nd.unique && nd.erased && !nd.disconnected);
        }
        for pos in 0..self.arena.node(n).arity as usize {
            self.disconnect_child(n, pos);
        }
        self.arena.node_mut(n).disconnected = true;
    }

    // -- Unique table -----------------------------------------------------

    pub(crate) fn children_of(&self, n: Node) -> SmallVec<[NodeRef; 3]> {
        let nd = self.arena.node(n);
        (0..nd.arity as usize).map(|i| nd.child(i)).collect()
    }

    /// The structural fingerprint of a node. Lambdas use the hash cached at
    /// creation: recomputing it would traverse the whole sub-DAG.
    fn compute_node_hash(&self, n: Node) -> u32 {
        let nd = self.arena.node(n);
        match nd.kind {
            NodeKind::BvConst => nd.const_bits().hash32(),
            NodeKind::Lambda => self.lambdas[&n],
            NodeKind::Slice => {
                let (upper, lower) = nd.slice_bounds();
                hash_slice(nd.child(0), upper, lower)
            }
            _ => hash_children(&self.children_of(n)),
        }
    }

    pub(crate) fn unique_find_const(&self, bits: &BitVector) -> Option<Node> {
        let mut cur = self.unique.head(bits.hash32());
        while let Some(n) = cur {
            let nd = self.arena.node(n);
            if nd.kind == NodeKind::BvConst && nd.const_bits() == bits {
                return Some(n);
            }
            cur = nd.next_unique.expand();
        }
        None
    }

    pub(crate) fn unique_find_slice(&self, e0: NodeRef, upper: u32, lower: u32) -> Option<Node> {
        let mut cur = self.unique.head(hash_slice(e0, upper, lower));
        while let Some(n) = cur {
            let nd = self.arena.node(n);
            if nd.kind == NodeKind::Slice && nd.child(0) == e0 && nd.slice_bounds() == (upper, lower)
            {
                return Some(n);
            }
            cur = nd.next_unique.expand();
        }
        None
    }

    /// Search for a binary/ternary node over already normalised children.
    /// Bit-vector equality matches modulo double inversion:
    /// `eq(-a, -b)` is `eq(a, b)`.
    pub(crate) fn unique_find_children(&self, kind: NodeKind, e: &[NodeRef]) -> Option<Node> {
        debug_assert!(
            kind != NodeKind::Slice && kind != NodeKind::BvConst && kind != NodeKind::Lambda
        );
        let mut cur = self.unique.head(hash_children(e));
        while let Some(n) = cur {
            let nd = self.arena.node(n);
            if nd.kind == kind && nd.arity as usize == e.len() {
                if kind == NodeKind::BvEq
                    && nd.child(0) == e[0].not()
                    && nd.child(1) == e[1].not()
                {
                    return Some(n);
                }
                if (0..e.len()).all(|i| nd.child(i) == e[i]) {
                    return Some(n);
                }
            }
            cur = nd.next_unique.expand();
        }
        None
    }

    /// Order the children of commutative binary kinds by ascending id.
    pub(crate) fn sort_commutative(&self, kind: NodeKind, e: &mut [NodeRef]) {
        if !self.opts.sort_exp || !kind.is_commutative() || e.len() != 2 {
            return;
        }
        if e[0] == e[1] {
            return;
        }
        if e[0].not() == e[1] && e[1].is_inverted() {
            return;
        }
        if e[0].node().as_u32() > e[1].node().as_u32() {
            e.swap(0, 1);
        }
    }

    pub(crate) fn unique_insert(&mut self, n: Node) {
        debug_assert!(!self.arena.node(n).unique);
        let hash = self.compute_node_hash(n);
        let prev = self.unique.push_front(hash, n);
        let nd = self.arena.node_mut(n);
        nd.next_unique = prev.into();
        nd.unique = true;
    }

    pub(crate) fn unique_remove(&mut self, n: Node) {
        if !self.arena.node(n).unique {
            return;
        }
        let hash = self.compute_node_hash(n);
        let mut prev: Option<Node> = None;
        let mut cur = self
            .unique
            .head(hash)
            .expect("node missing from unique table");
        while cur != n {
            prev = Some(cur);
            cur = self
                .arena
                .node(cur)
                .next_unique
                .expect("node missing from unique table");
        }
        let next = self.arena.node(n).next_unique.expand();
        match prev {
            None => self.unique.set_head(hash, next),
            Some(p) => self.arena.node_mut(p).next_unique = next.into(),
        }
        self.unique.decrement_len();
        let nd = self.arena.node_mut(n);
        nd.unique = false;
        nd.next_unique = None.into();
    }

    /// Double the unique table, rehashing every chained node with its
    /// cached fingerprint.
    pub(crate) fn unique_grow(&mut self) {
        let old_chains = self.unique.take_chains_for_growth();
        debug!("growing unique table to {} buckets", self.unique.size());
        for head in old_chains {
            let mut cur = head.expand();
            while let Some(n) = cur {
                cur = self.arena.node(n).next_unique.expand();
                let hash = self.compute_node_hash(n);
                let prev = self.unique.relink_front(hash, n);
                self.arena.node_mut(n).next_unique = prev.into();
            }
        }
    }

    // -- Rewriting state --------------------------------------------------

    /// Follow the `simplified` forwarding chain of `e` to its terminal
    /// representative, accumulating inversion along the way.
    pub fn chase(&self, e: NodeRef) -> NodeRef {
        let mut cur = e;
        loop {
            match self.arena.node(cur.node()).simplified.expand() {
                None => return cur,
                Some(next) => cur = next.cond_invert(cur.is_inverted()),
            }
        }
    }

    /// Turn `exp` into a proxy forwarding all users to `target`.
    ///
    /// The node keeps its id and sort; local data, side-table entries and
    /// children are dropped. Existing handles keep working through the
    /// forwarding edge.
    pub fn set_to_proxy(&mut self, exp: NodeRef, target: NodeRef) {
        assert!(!exp.is_inverted(), "proxy source must be a regular reference");
        let n = exp.node();
        let target = self.chase(target);
        assert!(target.node() != n, "proxy forwarding cycle");
        assert!(self.arena.node(n).kind != NodeKind::Proxy);

        self.inc_ref(target);
        if let Some(old) = self.arena.node_mut(n).simplified.take() {
            self.release(old);
        }
        self.arena.node_mut(n).simplified = target.into();
        debug!("proxy {} -> {}", n, target);

        self.unique_remove(n);
        self.erase_local_data(n, false);
        let children = self.children_of(n);
        self.remove_from_hash_tables(n, true);
        self.disconnect_children(n);
        for child in children {
            self.release(child);
        }
        let nd = self.arena.node_mut(n);
        nd.kind = NodeKind::Proxy;
        nd.disconnected = false;
        nd.erased = false;
        nd.arity = 0;
        nd.parameterized = false;
    }

    // -- Lookup -----------------------------------------------------------

    /// Look up a node by positive id, returning an owning handle.
    pub fn node_by_id(&mut self, id: u32) -> Option<NodeRef> {
        if id == 0 || id as usize >= self.arena.id_bound() {
            return None;
        }
        let n = Node::from_u32(id);
        if !self.arena.is_live(n) {
            return None;
        }
        let e = NodeRef::from(n);
        self.inc_ref(e);
        Some(e)
    }

    /// Look up a node by signed id (negative means inverted) without taking
    /// a reference.
    pub fn get_node_by_id(&self, id: i64) -> Option<NodeRef> {
        let inverted = id < 0;
        let id = id.checked_abs()? as u64;
        if id == 0 || id >= self.arena.id_bound() as u64 {
            return None;
        }
        let n = Node::from_u32(id as u32);
        if !self.arena.is_live(n) {
            return None;
        }
        Some(NodeRef::from(n).cond_invert(inverted))
    }

    /// Match a handle from an earlier phase of the same context: the node
    /// with the same id, forwarded through rewriting, with an owning
    /// reference.
    pub fn match_node(&mut self, e: NodeRef) -> Option<NodeRef> {
        let n = e.node();
        if !self.arena.is_live(n) {
            return None;
        }
        let matched = self.chase(NodeRef::from(n)).cond_invert(e.is_inverted());
        self.inc_ref(matched);
        Some(matched)
    }

    /// Look up a node by symbol, returning an owning handle.
    pub fn node_by_symbol(&mut self, symbol: &str) -> Option<NodeRef> {
        let n = *self.symbols.get(symbol)?;
        let e = NodeRef::from(n);
        self.inc_ref(e);
        Some(e)
    }

    // -- Symbols ----------------------------------------------------------

    /// The symbol attached to a node, if any.
    pub fn symbol(&self, e: NodeRef) -> Option<&str> {
        self.node_symbols.get(&e.node()).map(String::as_str)
    }

    /// Attach `symbol` to a node. A symbol names at most one node; the
    /// node's previous symbol, if any, is dropped.
    pub fn set_symbol(&mut self, e: NodeRef, symbol: &str) {
        assert!(
            !self.symbols.contains_key(symbol),
            "symbol `{}` already in use",
            symbol
        );
        let n = e.node();
        if let Some(old) = self.node_symbols.remove(&n) {
            self.symbols.remove(&old);
        }
        self.node_symbols.insert(n, symbol.to_string());
        self.symbols.insert(symbol.to_string(), n);
    }

    // -- Introspection ----------------------------------------------------

    /// The kind of the referenced node (inversion ignored).
    pub fn kind(&self, e: NodeRef) -> NodeKind {
        self.arena.node(e.node()).kind
    }

    /// The sort of the referenced node.
    pub fn sort_of(&self, e: NodeRef) -> Sort {
        self.arena.node(e.node()).sort
    }

    /// Bit width of a bit-vector term.
    pub fn width(&self, e: NodeRef) -> u32 {
        let sort = self.sort_of(e);
        debug_assert!(!self.sorts.is_fun(sort));
        self.sorts.width(sort)
    }

    /// Bit width of the codomain of a function term.
    pub fn fun_width(&self, e: NodeRef) -> u32 {
        let sort = self.sort_of(e);
        self.sorts.width(self.sorts.fun_codomain(sort))
    }

    /// Bit width of the index sort of an array term.
    pub fn index_width(&self, e: NodeRef) -> u32 {
        let sort = self.sort_of(e);
        self.sorts.width(self.sorts.array_index(sort))
    }

    /// Number of children of the referenced node.
    pub fn arity(&self, e: NodeRef) -> usize {
        self.arena.node(e.node()).arity as usize
    }

    /// Child edge `i` of the referenced node.
    pub fn child(&self, e: NodeRef, i: usize) -> NodeRef {
        self.arena.node(e.node()).child(i)
    }

    /// Is this an array-typed term?
    pub fn is_array(&self, e: NodeRef) -> bool {
        self.arena.node(e.node()).is_array
    }

    /// Is this a function-typed term (lambda, UF, update or function
    /// conditional)?
    pub fn is_fun_node(&self, e: NodeRef) -> bool {
        self.sorts.is_fun(self.sort_of(e))
    }

    /// Is this a conditional over bit-vector branches?
    pub fn is_bv_cond(&self, e: NodeRef) -> bool {
        self.kind(e) == NodeKind::Cond && self.sorts.is_bitvec(self.sort_of(e))
    }

    /// Is this a conditional over function branches?
    pub fn is_fun_cond(&self, e: NodeRef) -> bool {
        self.kind(e) == NodeKind::Cond && self.sorts.is_fun(self.sort_of(e))
    }

    pub(crate) fn is_fun_cond_node(&self, n: Node) -> bool {
        let nd = self.arena.node(n);
        nd.kind == NodeKind::Cond && self.sorts.is_fun(nd.sort)
    }

    /// Does the term transitively contain an unbound parameter?
    pub fn is_parameterized(&self, e: NodeRef) -> bool {
        self.arena.node(e.node()).parameterized
    }

    /// Does the term transitively contain a lambda?
    pub fn lambda_below(&self, e: NodeRef) -> bool {
        self.arena.node(e.node()).lambda_below
    }

    /// Does the term transitively contain an application?
    pub fn apply_below(&self, e: NodeRef) -> bool {
        self.arena.node(e.node()).apply_below
    }

    /// The value of a constant; the complement cached at creation is
    /// returned for inverted handles.
    pub fn const_bits(&self, e: NodeRef) -> &BitVector {
        let nd = self.arena.node(e.node());
        if e.is_inverted() {
            nd.const_inv_bits()
        } else {
            nd.const_bits()
        }
    }

    /// Upper (inclusive) bound of a slice node.
    pub fn slice_upper(&self, e: NodeRef) -> u32 {
        self.arena.node(e.node()).slice_bounds().0
    }

    /// Lower (inclusive) bound of a slice node.
    pub fn slice_lower(&self, e: NodeRef) -> u32 {
        self.arena.node(e.node()).slice_bounds().1
    }

    /// Current strong reference count of the node.
    pub fn refs(&self, e: NodeRef) -> u32 {
        self.arena.node(e.node()).refs
    }

    /// Current externally held reference count of the node.
    pub fn ext_refs(&self, e: NodeRef) -> u32 {
        self.arena.node(e.node()).ext_refs
    }

    /// Number of parent edges pointing at the node.
    pub fn parents_count(&self, e: NodeRef) -> u32 {
        self.arena.node(e.node()).parents
    }

    /// Arity of a function term (its domain tuple arity).
    pub fn fun_arity(&self, e: NodeRef) -> u32 {
        self.sorts.fun_arity(self.sort_of(e))
    }

    /// Number of arguments carried by an args term, across chunking.
    pub fn args_arity(&self, e: NodeRef) -> u32 {
        debug_assert_eq!(self.kind(e), NodeKind::Args);
        self.sorts.tuple_arity(self.sort_of(e))
    }

    /// The flattened argument edges of an args chain.
    pub fn args_of(&self, e: NodeRef) -> Vec<NodeRef> {
        debug_assert_eq!(self.kind(e), NodeKind::Args);
        let mut out = Vec::new();
        self.collect_args(e.node(), &mut out);
        out
    }

    pub(crate) fn collect_args(&self, args: Node, out: &mut Vec<NodeRef>) {
        debug_assert_eq!(self.arena.node(args).kind, NodeKind::Args);
        let nd = self.arena.node(args);
        for i in 0..nd.arity as usize {
            let child = nd.child(i);
            if !child.is_inverted() && self.arena.node(child.node()).kind == NodeKind::Args {
                self.collect_args(child.node(), out);
            } else {
                out.push(child);
            }
        }
    }

    /// The nested lambdas of a curried function, outermost first.
    pub(crate) fn lambda_chain(&self, start: Node) -> Vec<Node> {
        let mut out = Vec::new();
        let mut cur = start;
        loop {
            debug_assert_eq!(self.arena.node(cur).kind, NodeKind::Lambda);
            out.push(cur);
            let body = self.arena.node(cur).child(1);
            if !body.is_inverted() && self.arena.node(body.node()).kind == NodeKind::Lambda {
                cur = body.node();
            } else {
                break;
            }
        }
        out
    }

    // -- Lambda and param state -------------------------------------------

    /// The (chased) body a lambda evaluates to; skips nested binders of
    /// curried functions.
    pub fn lambda_body(&self, e: NodeRef) -> NodeRef {
        self.arena.node(e.node()).lambda_body()
    }

    /// The static-rho table of a lambda, if one was seeded.
    pub fn lambda_static_rho(&self, e: NodeRef) -> Option<&Rho> {
        match &self.arena.node(e.node()).payload {
            Payload::Lambda { static_rho, .. } => static_rho.as_ref(),
            _ => panic!("static rho of a non-lambda node"),
        }
    }

    /// Replace the static-rho table of a lambda, releasing the entries of
    /// the previous one.
    pub fn lambda_set_static_rho(&mut self, e: NodeRef, rho: Rho) {
        let old = match &mut self.arena.node_mut(e.node()).payload {
            Payload::Lambda { static_rho, .. } => static_rho.replace(rho),
            _ => panic!("static rho of a non-lambda node"),
        };
        if let Some(old) = old {
            for (args, value) in old.into_entries() {
                self.release(NodeRef::from(args));
                self.release(value);
            }
        }
    }

    /// Clone the static-rho table of a lambda, taking references on every
    /// entry.
    pub fn lambda_copy_static_rho(&mut self, e: NodeRef) -> Option<Rho> {
        let pairs: Vec<(Node, NodeRef)> = self.lambda_static_rho(e)?.iter().collect();
        let mut copy = Rho::new();
        for (args, value) in pairs {
            self.inc_ref(NodeRef::from(args));
            self.inc_ref(value);
            copy.insert(args, value);
        }
        Some(copy)
    }

    /// The lambda currently binding this parameter.
    pub fn param_binding(&self, e: NodeRef) -> Option<NodeRef> {
        self.arena
            .node(e.node())
            .param_binding()
            .map(NodeRef::from)
    }

    /// Is the parameter bound by some lambda?
    pub fn param_is_bound(&self, e: NodeRef) -> bool {
        self.param_binding(e).is_some()
    }

    /// The argument assigned to this parameter during beta-reduction.
    pub fn param_assigned(&self, e: NodeRef) -> Option<NodeRef> {
        match &self.arena.node(e.node()).payload {
            Payload::Param { assigned, .. } => assigned.expand(),
            _ => panic!("assignment of a non-param node"),
        }
    }

    /// Assign the (flattened) arguments of `args` to the parameters of the
    /// lambda chain of `fun`, for a following bounded beta-reduction. The
    /// assignment is transient and takes no references.
    pub fn assign_args(&mut self, fun: NodeRef, args: NodeRef) {
        debug_assert_eq!(self.kind(fun), NodeKind::Lambda);
        debug_assert_eq!(self.kind(args), NodeKind::Args);
        debug_assert_eq!(self.fun_arity(fun), self.args_arity(args));
        let chain = self.lambda_chain(fun.node());
        let mut actual = Vec::new();
        self.collect_args(args.node(), &mut actual);
        assert_eq!(chain.len(), actual.len());
        for (lambda, arg) in chain.into_iter().zip(actual) {
            let param = self.arena.node(lambda).child(0).node();
            match &mut self.arena.node_mut(param).payload {
                Payload::Param { assigned, .. } => *assigned = arg.into(),
                _ => unreachable!("lambda child 0 is always a param"),
            }
        }
    }

    /// Clear the parameter assignments of the lambda chain of `fun`.
    pub fn unassign_params(&mut self, fun: NodeRef) {
        debug_assert_eq!(self.kind(fun), NodeKind::Lambda);
        for lambda in self.lambda_chain(fun.node()) {
            let param = self.arena.node(lambda).child(0).node();
            match &mut self.arena.node_mut(param).payload {
                Payload::Param { assigned, .. } => *assigned = None.into(),
                _ => unreachable!("lambda child 0 is always a param"),
            }
        }
    }

    // -- Caches -----------------------------------------------------------

    /// Attach a bit-blasting result to the node. One literal per bit.
    pub fn set_aig_vec(&mut self, e: NodeRef, av: AigVec) {
        debug_assert_eq!(av.len() as u32, self.width(e));
        self.arena.node_mut(e.node()).av = Some(av);
    }

    /// The cached bit-blasting result, if any.
    pub fn aig_vec(&self, e: NodeRef) -> Option<&AigVec> {
        self.arena.node(e.node()).av.as_ref()
    }

    /// Remove and return the cached bit-blasting result.
    pub fn take_aig_vec(&mut self, e: NodeRef) -> Option<AigVec> {
        self.arena.node_mut(e.node()).av.take()
    }

    /// The lazily built apply cache of a function node. Unlike the static
    /// rho, its entries are not owned by the node; the layer that fills the
    /// cache manages their lifetimes.
    pub fn rho(&self, e: NodeRef) -> Option<&Rho> {
        self.arena.node(e.node()).rho.as_ref()
    }

    /// Install the apply cache of a function node.
    pub fn set_rho(&mut self, e: NodeRef, rho: Rho) {
        self.arena.node_mut(e.node()).rho = Some(rho);
    }

    /// Remove and return the apply cache of a function node.
    pub fn take_rho(&mut self, e: NodeRef) -> Option<Rho> {
        self.arena.node_mut(e.node()).rho.take()
    }

    // -- Parents ----------------------------------------------------------

    /// Iterate over the parent edges of the referenced node as
    /// `(parent, child_position)` pairs, in list order.
    pub fn parents(&self, e: NodeRef) -> ParentsIter {
        ParentsIter {
            ctx: self,
            next: self.arena.node(e.node()).first_parent.expand(),
        }
    }

    // -- Counters ---------------------------------------------------------

    /// Number of live nodes in the arena.
    pub fn live_nodes(&self) -> usize {
        self.arena.live_count()
    }

    /// Number of hash-consed nodes in the unique table.
    pub fn unique_table_len(&self) -> usize {
        self.unique.len()
    }

    /// One past the largest node id assigned so far.
    pub fn node_id_bound(&self) -> usize {
        self.arena.id_bound()
    }

    /// Is the referenced node live (allocated and not freed)?
    pub fn is_live(&self, e: NodeRef) -> bool {
        self.arena.is_live(e.node())
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the parent edges of a node. See [`Context::parents`].
pub struct ParentsIter<'a> {
    ctx: &'a Context,
    next: Option<ParentLink>,
}

impl<'a> Iterator for ParentsIter<'a> {
    type Item = (Node, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let link = self.next?;
        let (parent, pos) = (link.parent(), link.pos());
        self.next = self.ctx.arena.node(parent).next_parent[pos].expand();
        Some((parent, pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitVector;

    #[test]
    fn unique_table_grows_and_keeps_every_entry() {
        let mut ctx = Context::new();
        let bv16 = ctx.bitvec_sort(16);
        let mut handles = Vec::new();
        for i in 0..1000u64 {
            handles.push(ctx.unsigned_const(i * 2, bv16));
        }
        assert_eq!(ctx.unique_table_len(), 1000);
        assert!(ctx.unique.size() >= 1000);

        // Every constant is still found after the rehashes.
        for i in 0..1000u64 {
            let bits = BitVector::from_u64(i * 2, 16);
            let n = ctx.unique_find_const(&bits).expect("constant stays interned");
            assert_eq!(NodeRef::from(n), handles[i as usize]);
        }

        for h in handles {
            ctx.release(h);
        }
        assert_eq!(ctx.unique_table_len(), 0);
        assert_eq!(ctx.live_nodes(), 0);
    }

    #[test]
    fn chase_terminates_on_terminal_nodes() {
        let mut ctx = Context::new();
        let bv8 = ctx.bitvec_sort(8);
        let x = ctx.var(bv8, None);
        assert_eq!(ctx.chase(x), x);
        assert_eq!(ctx.chase(x.not()), x.not());
    }

    #[test]
    fn contexts_are_independent() {
        let mut a = Context::new();
        let mut b = Context::new();
        let sa = a.bitvec_sort(8);
        let sb = b.bitvec_sort(4);
        let xa = a.var(sa, Some("x"));
        let xb = b.var(sb, Some("x"));
        assert_eq!(a.width(xa), 8);
        assert_eq!(b.width(xb), 4);
        assert_eq!(a.live_nodes(), 1);
        assert_eq!(b.live_nodes(), 1);
    }

    #[test]
    #[should_panic(expected = "dead node")]
    fn double_release_is_a_contract_violation() {
        let mut ctx = Context::new();
        let bv8 = ctx.bitvec_sort(8);
        let x = ctx.var(bv8, None);
        let y = ctx.copy(x);
        ctx.release(x);
        ctx.release(y);
        // Both handles are gone now; the arena slot is dead.
        ctx.release(x);
    }
}
