//! Expression core of a bit-vector and array SMT solver.
//!
//! This crate owns the term representation the rest of a solver works on: a
//! hash-consed DAG of bit-vector, Boolean and function (lambda) terms, built
//! and shared through a [`Context`].
//!
//! The representation keeps a small set of primitive operators and derives
//! everything else; negation is an edge tag, so `not` never allocates and a
//! term and its complement share one node. Lambdas are interned up to
//! alpha-equivalence. Every node carries an intrusive parent list for upward
//! traversal, and reference counting with an iterative release sweep
//! reclaims unreachable subgraphs without recursion.
//!
//! Rewriting rules, beta-reduction and bit-blasting live outside this crate
//! and plug in through [`Rewriter`], [`BetaReducer`] and the per-node
//! [`AigVec`] cache.
//!
//! ```
//! use bvsmt_core::Context;
//!
//! let mut ctx = Context::new();
//! let bv8 = ctx.bitvec_sort(8);
//! let x = ctx.var(bv8, Some("x"));
//! let y = ctx.var(bv8, Some("y"));
//! let sum = ctx.add(x, y);
//! assert_eq!(ctx.width(sum), 8);
//!
//! // Structurally equal terms share a node.
//! let again = ctx.add(x, y);
//! assert_eq!(sum, again);
//!
//! ctx.release(again);
//! ctx.release(sum);
//! ctx.release(y);
//! ctx.release(x);
//! ctx.release_sort(bv8);
//! ```

#![deny(missing_docs, trivial_numeric_casts, unused_extern_crates)]
#![warn(unused_import_braces)]

pub use bvsmt_entity as entity;

mod alpha;
mod bits;
mod ctx;
mod derived;
mod fx;
mod hooks;
mod node;
mod ops;
mod sort;
mod unique;

pub use crate::bits::BitVector;
pub use crate::ctx::{Context, Options, ParentsIter};
pub use crate::hooks::{BetaReducer, Rewriter};
pub use crate::node::{AigVec, Node, NodeKind, NodeRef, Rho, MAX_NODE_ID};
pub use crate::sort::Sort;

/// Version number of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
