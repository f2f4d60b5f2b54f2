//! Cross-module scenarios over the expression DAG with no rewriter
//! installed: sharing, inversion, reference conservation, parent lists,
//! lambda interning, args chunking, proxies and iterative release.

use bvsmt_core::entity::SecondaryMap;
use bvsmt_core::{Context, Node, NodeKind, NodeRef, Options};

#[test]
fn and_of_var_and_constant() {
    let mut ctx = Context::new();
    let bv8 = ctx.bitvec_sort(8);
    let x = ctx.var(bv8, Some("x"));
    let c = ctx.unsigned_const(0x0f, bv8);
    let y = ctx.and(x, c);

    assert_eq!(ctx.width(y), 8);
    assert_eq!(ctx.kind(y), NodeKind::And);
    assert_eq!(ctx.arity(y), 2);
    // Commutative children are stored in ascending id order; either way
    // both operands must be present.
    let children = [ctx.child(y, 0), ctx.child(y, 1)];
    assert!(children.contains(&x));
    assert!(children.contains(&c));
    assert_eq!(children[0], x);
}

#[test]
fn constant_shares_a_node_with_its_complement() {
    let mut ctx = Context::new();
    let bv8 = ctx.bitvec_sort(8);

    let before = ctx.live_nodes();
    let a = ctx.unsigned_const(0b1010_1010, bv8);
    let b = ctx.not(a);
    // One allocation serves the pair.
    assert_eq!(ctx.live_nodes(), before + 1);
    assert_eq!(a.node(), b.node());
    assert_ne!(a.is_inverted(), b.is_inverted());
    assert_eq!(b.not(), a);

    // An odd constant is stored complemented, so it shares the node of its
    // complement too.
    let c = ctx.unsigned_const(0x0f, bv8);
    let d = ctx.unsigned_const(0xf0, bv8);
    assert_eq!(c.node(), d.node());
    assert_eq!(c, d.not());
    assert!(c.is_inverted());
    assert_eq!(ctx.const_bits(c).to_u64(), 0x0f);
    assert_eq!(ctx.const_bits(d).to_u64(), 0xf0);
}

#[test]
fn equivalent_constructions_share_ids() {
    let mut ctx = Context::new();
    let bv8 = ctx.bitvec_sort(8);
    let x = ctx.var(bv8, None);
    let y = ctx.var(bv8, None);

    let a = ctx.add(x, y);
    let b = ctx.add(y, x); // commutative normalisation
    assert_eq!(a, b);

    let e1 = ctx.eq_node(x, y);
    let e2 = {
        let nx = ctx.not(x);
        let ny = ctx.not(y);
        let e = ctx.eq_node(nx, ny); // eq(-a, -b) == eq(a, b)
        ctx.release(nx);
        ctx.release(ny);
        e
    };
    assert_eq!(e1, e2);
}

#[test]
fn copy_release_conserves_arena_state() {
    let mut ctx = Context::new();
    let bv8 = ctx.bitvec_sort(8);
    let x = ctx.var(bv8, None);
    let c = ctx.unsigned_const(42, bv8);
    let sum = ctx.add(x, c);

    let live = ctx.live_nodes();
    let unique = ctx.unique_table_len();
    let bound = ctx.node_id_bound();
    let refs = ctx.refs(sum);

    for _ in 0..100 {
        ctx.copy(sum);
    }
    for _ in 0..100 {
        ctx.release(sum);
    }

    assert_eq!(ctx.refs(sum), refs);
    assert_eq!(ctx.live_nodes(), live);
    assert_eq!(ctx.unique_table_len(), unique);
    assert_eq!(ctx.node_id_bound(), bound);
}

#[test]
fn external_ref_accounting() {
    let mut ctx = Context::new();
    let bv8 = ctx.bitvec_sort(8);
    let x = ctx.var(bv8, None);

    assert_eq!(ctx.external_refs(), 0);
    ctx.inc_ext(x);
    ctx.inc_ext(x);
    assert_eq!(ctx.ext_refs(x), 2);
    assert_eq!(ctx.external_refs(), 2);
    ctx.dec_ext(x);
    assert_eq!(ctx.ext_refs(x), 1);
    assert_eq!(ctx.external_refs(), 1);
}

#[test]
fn parent_lists_mirror_child_edges() {
    let mut ctx = Context::new();
    let bv8 = ctx.bitvec_sort(8);
    let x = ctx.var(bv8, None);
    let y = ctx.var(bv8, None);

    let a = ctx.add(x, y);
    let m = ctx.mul(x, x);
    let u = ctx.ult(y, x);

    // Tally the child edges per node; the parent lists must agree exactly.
    let mut expected: SecondaryMap<Node, u32> = SecondaryMap::new();
    for &e in &[a, m, u] {
        for i in 0..ctx.arity(e) {
            expected[ctx.child(e, i).node()] += 1;
        }
    }

    for &node in &[x, y, a, m, u] {
        let parents: Vec<_> = ctx.parents(node).collect();
        assert_eq!(parents.len(), ctx.parents_count(node) as usize);
        assert_eq!(expected[node.node()], ctx.parents_count(node));
        for &(parent, pos) in &parents {
            let edge = ctx.child(NodeRef::from(parent), pos);
            assert_eq!(edge.node(), node.node());
        }
    }
    // x is referenced by add (pos 0), twice by mul, and by ult (pos 1).
    assert_eq!(ctx.parents_count(x), 4);
    assert_eq!(ctx.parents(x).count(), 4);
    assert_eq!(ctx.parents_count(y), 2);
}

#[test]
fn apply_parents_append_at_the_tail() {
    let mut ctx = Context::new();
    let bv8 = ctx.bitvec_sort(8);
    let bv4 = ctx.bitvec_sort(4);
    let arr = ctx.array_sort(bv4, bv8);
    let f = ctx.array(arr, None);
    let i0 = ctx.unsigned_const(2, bv4);
    let i1 = ctx.unsigned_const(4, bv4);

    let app0 = ctx.read(f, i0);
    let app1 = ctx.read(f, i1);

    // Apply parents keep insertion order; other parents push at the head.
    let f_parents: Vec<_> = ctx.parents(f).map(|(p, _)| p).collect();
    assert_eq!(f_parents, vec![app0.node(), app1.node()]);

    let x = ctx.var(bv8, None);
    let c2 = ctx.unsigned_const(2, bv8);
    let c4 = ctx.unsigned_const(4, bv8);
    let a0 = ctx.add(x, c2);
    let a1 = ctx.add(x, c4);
    let x_parents: Vec<_> = ctx.parents(x).map(|(p, _)| p).collect();
    assert_eq!(x_parents, vec![a1.node(), a0.node()]);
}

#[test]
fn alpha_equivalent_lambdas_share_a_node() {
    let mut ctx = Context::new();
    let bv4 = ctx.bitvec_sort(4);
    let bv8 = ctx.bitvec_sort(8);
    let arr_sort = ctx.array_sort(bv4, bv8);
    let a = ctx.array(arr_sort, Some("A"));

    // λp:bv4. ite(p = 3, 7, A[p]), built twice with fresh parameters.
    let mut build = |ctx: &mut Context| {
        let p = ctx.param(bv4, None);
        let three = ctx.unsigned_const(3, bv4);
        let seven = ctx.unsigned_const(7, bv8);
        let is_three = ctx.eq(p, three);
        let read = ctx.read(a, p);
        let body = ctx.cond(is_three, seven, read);
        let lambda = ctx.lambda(p, body);
        for e in [three, seven, is_three, read, body, p].iter() {
            ctx.release(*e);
        }
        lambda
    };

    let l1 = build(&mut ctx);
    let l2 = build(&mut ctx);
    assert_eq!(l1, l2);
    assert_eq!(ctx.refs(l1), 2);
    assert!(ctx.is_fun_node(l1));
    assert!(!ctx.is_parameterized(l1));
}

#[test]
fn different_lambda_bodies_stay_distinct() {
    let mut ctx = Context::new();
    let bv8 = ctx.bitvec_sort(8);

    let p1 = ctx.param(bv8, None);
    let one = ctx.one(bv8);
    let body1 = ctx.add(p1, one);
    let l1 = ctx.lambda(p1, body1);

    let p2 = ctx.param(bv8, None);
    let two = ctx.unsigned_const(2, bv8);
    let body2 = ctx.add(p2, two);
    let l2 = ctx.lambda(p2, body2);

    assert_ne!(l1.node(), l2.node());
}

#[test]
fn args_chunking_of_seven_arguments() {
    let mut ctx = Context::new();
    let bv8 = ctx.bitvec_sort(8);
    let vars: Vec<NodeRef> = (0..7).map(|_| ctx.var(bv8, None)).collect();

    let tuple = ctx.args(&vars);
    assert_eq!(ctx.kind(tuple), NodeKind::Args);
    assert_eq!(ctx.args_arity(tuple), 7);
    assert_eq!(ctx.args_of(tuple), vars);

    // Exactly three args nodes: a right-associated chain whose deepest
    // node is full and whose outer nodes carry two arguments plus the
    // chain link.
    let mut chain = vec![tuple];
    loop {
        let cur = *chain.last().unwrap();
        let last_child = ctx.child(cur, ctx.arity(cur) - 1);
        if ctx.kind(last_child) == NodeKind::Args {
            chain.push(last_child);
        } else {
            break;
        }
    }
    assert_eq!(chain.len(), 3);
    assert_eq!(ctx.arity(chain[0]), 3);
    assert_eq!(ctx.arity(chain[1]), 3);
    assert_eq!(ctx.arity(chain[2]), 3);

    // Chunking is deterministic, so the chain is shared on a rebuild.
    let again = ctx.args(&vars);
    assert_eq!(tuple, again);
}

#[test]
fn deep_release_runs_iteratively() {
    let mut ctx = Context::new();
    let bv8 = ctx.bitvec_sort(8);
    let baseline = ctx.live_nodes();

    let x = ctx.var(bv8, None);
    let mut cur = ctx.copy(x);
    for _ in 0..10_000 {
        let next = ctx.add(cur, x);
        ctx.release(cur);
        cur = next;
    }
    assert!(ctx.live_nodes() >= 10_000);

    // Releasing the root reclaims the whole derivation; a recursive
    // implementation would exhaust the call stack long before 10k levels.
    ctx.release(cur);
    ctx.release(x);
    assert_eq!(ctx.live_nodes(), baseline);
    assert_eq!(ctx.unique_table_len(), 0);
}

#[test]
fn symbols_resolve_to_owning_handles() {
    let mut ctx = Context::new();
    let bv8 = ctx.bitvec_sort(8);
    let x = ctx.var(bv8, Some("x"));

    assert_eq!(ctx.symbol(x), Some("x"));
    let refs = ctx.refs(x);
    let found = ctx.node_by_symbol("x").expect("symbol is registered");
    assert_eq!(found, x);
    assert_eq!(ctx.refs(x), refs + 1);
    assert!(ctx.node_by_symbol("y").is_none());

    let by_id = ctx.node_by_id(x.node().as_u32()).expect("id is live");
    assert_eq!(by_id, x);

    let matched = ctx.match_node(x.not()).expect("node is live");
    assert_eq!(matched, x.not());
}

#[test]
fn ground_write_builds_an_update_node() {
    let mut ctx = Context::new();
    let bv4 = ctx.bitvec_sort(4);
    let bv8 = ctx.bitvec_sort(8);
    let arr_sort = ctx.array_sort(bv4, bv8);
    let a = ctx.array(arr_sort, None);
    let i = ctx.unsigned_const(3, bv4);
    let v = ctx.unsigned_const(99, bv8);

    let w = ctx.write(a, i, v);
    assert_eq!(ctx.kind(w), NodeKind::Update);
    assert!(ctx.is_array(w));
    assert_eq!(ctx.sort_of(w), arr_sort);
}

#[test]
fn lambda_write_seeds_the_static_rho() {
    let mut ctx = Context::with_options(Options {
        fun_store_lambdas: true,
        ..Options::default()
    });
    let bv4 = ctx.bitvec_sort(4);
    let bv8 = ctx.bitvec_sort(8);
    let arr_sort = ctx.array_sort(bv4, bv8);
    let a = ctx.array(arr_sort, None);
    let i = ctx.unsigned_const(3, bv4);
    let v = ctx.unsigned_const(99, bv8);

    let w = ctx.write(a, i, v);
    assert_eq!(ctx.kind(w), NodeKind::Lambda);
    assert!(ctx.is_array(w));
    assert_eq!(ctx.sort_of(w), arr_sort);

    let rho = ctx.lambda_static_rho(w).expect("write seeds the static rho");
    assert_eq!(rho.len(), 1);
    let (args, value) = rho.iter().next().unwrap();
    assert_eq!(value, v);
    assert_eq!(ctx.args_of(NodeRef::from(args)), vec![i]);

    // Reading the lambda-encoded array is an apply on the chain.
    let r = ctx.read(w, i);
    assert_eq!(ctx.kind(r), NodeKind::Apply);
    assert_eq!(ctx.width(r), 8);
}

#[test]
fn function_conditional_propagates_the_array_flag() {
    let mut ctx = Context::new();
    let bv1 = ctx.bool_sort();
    let bv4 = ctx.bitvec_sort(4);
    let bv8 = ctx.bitvec_sort(8);
    let arr_sort = ctx.array_sort(bv4, bv8);
    let a = ctx.array(arr_sort, None);
    let b = ctx.array(arr_sort, None);
    let c = ctx.var(bv1, None);

    let ite = ctx.cond(c, a, b);
    assert_eq!(ctx.kind(ite), NodeKind::Cond);
    assert!(ctx.is_fun_cond(ite));
    assert!(ctx.is_array(ite));
    assert!(!ctx.is_bv_cond(ite));
}

#[test]
fn proxies_forward_all_users() {
    let mut ctx = Context::new();
    let bv8 = ctx.bitvec_sort(8);
    let x = ctx.var(bv8, None);
    let y = ctx.var(bv8, None);
    let z = ctx.and(x, y);

    // A rewriter decided that z is equivalent to y.
    ctx.set_to_proxy(z, y);
    assert_eq!(ctx.kind(z), NodeKind::Proxy);
    assert_eq!(ctx.arity(z), 0);
    assert_eq!(ctx.chase(z), y);
    assert_eq!(ctx.chase(z.not()), y.not());

    // Constructors receiving the proxy behave as if they got y.
    let a1 = ctx.and(x, z);
    let a2 = ctx.and(x, y);
    assert_eq!(a1, a2);

    // The id survives and still resolves through the forwarding edge.
    let matched = ctx.match_node(z).expect("proxy id stays live");
    assert_eq!(matched, y);

    // Chains of proxies terminate.
    let w = ctx.var(bv8, None);
    ctx.set_to_proxy(y, w);
    assert_eq!(ctx.chase(z), w);
}

#[test]
fn applying_a_closed_lambda_builds_an_apply_node() {
    let mut ctx = Context::new();
    let bv8 = ctx.bitvec_sort(8);

    let p = ctx.param(bv8, None);
    let one = ctx.one(bv8);
    let body = ctx.add(p, one);
    let l = ctx.lambda(p, body);
    assert!(ctx.param_is_bound(p));
    assert_eq!(ctx.param_binding(p), Some(l));
    assert_eq!(ctx.lambda_body(l), body);

    let x = ctx.var(bv8, None);
    let app = ctx.apply_n(l, &[x]);
    assert_eq!(ctx.kind(app), NodeKind::Apply);
    assert_eq!(ctx.child(app, 0), l);
    assert_eq!(ctx.width(app), 8);
}

#[test]
fn releasing_a_lambda_unbinds_its_param() {
    let mut ctx = Context::new();
    let bv8 = ctx.bitvec_sort(8);

    let p = ctx.param(bv8, None);
    let one = ctx.one(bv8);
    let body = ctx.add(p, one);
    let l = ctx.lambda(p, body);
    ctx.release(one);
    ctx.release(body);
    assert!(ctx.param_is_bound(p));

    ctx.release(l);
    assert!(ctx.is_live(p));
    assert!(!ctx.param_is_bound(p));
}
