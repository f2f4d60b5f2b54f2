//! Interfaces to the collaborators the core invokes but does not implement.
//!
//! The expression core knows *where* rewriting and beta-reduction plug in,
//! not *how* they work. Both hooks receive the context and must return an
//! owning handle to a term with the same semantics as the requested
//! construction; like every constructor, they either succeed or panic.
//! There are no recoverable errors at this layer.

use crate::ctx::Context;
use crate::node::{NodeKind, NodeRef};

/// Term rewriting hook.
///
/// Installed on a context with [`Context::set_rewriter`] and consulted by
/// every facade constructor while the rewrite level is positive. The inputs
/// are already forwarded through their `simplified` chains. An
/// implementation that performs no rewriting simply calls the corresponding
/// `*_node` constructor back on the context.
pub trait Rewriter {
    /// Rewrite `slice(e, upper, lower)`.
    fn rewrite_slice(&self, ctx: &mut Context, e: NodeRef, upper: u32, lower: u32) -> NodeRef;

    /// Rewrite a binary construction of the given kind.
    fn rewrite_binary(&self, ctx: &mut Context, kind: NodeKind, e0: NodeRef, e1: NodeRef)
        -> NodeRef;

    /// Rewrite a ternary construction of the given kind.
    fn rewrite_ternary(
        &self,
        ctx: &mut Context,
        kind: NodeKind,
        e0: NodeRef,
        e1: NodeRef,
        e2: NodeRef,
    ) -> NodeRef;
}

/// Bounded beta-reduction hook.
///
/// Invoked by `apply` when the applied function is a parameterized lambda;
/// the arguments have already been assigned to the parameters when the hook
/// runs, and are unassigned by the caller afterwards.
pub trait BetaReducer {
    /// Reduce `lambda` under the current parameter assignment, unfolding at
    /// most `bound` binder levels.
    fn beta_reduce_bounded(&self, ctx: &mut Context, lambda: NodeRef, bound: u32) -> NodeRef;
}
