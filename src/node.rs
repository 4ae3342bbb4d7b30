//! The shared expression graph and its two traversals.
//!
//! Nodes are reference-counted and may have several parents: `y = x * x`
//! holds the same leaf twice, and two independently built expressions may
//! share a whole sub-graph. Sharing is exactly why the backward pass must
//! *add* into an accumulator rather than overwrite it. Ownership edges are
//! acyclic by construction, so reference counting alone reclaims a node
//! once no variable or parent refers to it.
//!
//! Both traversals are plain single-threaded recursion: `update` visits
//! children before recomputing a parent, `propagate` applies its own
//! accumulation and then recurses into children. Recursion depth equals
//! expression depth, so pathologically deep expressions are bounded by the
//! call stack.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use num_traits::Float;

use crate::error::Result;
use crate::ops::{BinaryOp, UnaryOp};

pub(crate) type NodeRef<T> = Rc<RefCell<Node<T>>>;

/// Stable identity of a node, used to address gradient accumulators.
pub(crate) type NodeId = usize;

/// Accumulators for one backward pass, keyed by leaf identity. Keeping the
/// map outside the nodes makes a pass self-contained: nothing is bound or
/// unbound on the graph itself, and two extractions cannot interfere.
pub(crate) type GradMap<T> = HashMap<NodeId, T>;

pub(crate) struct Node<T> {
    /// The value this node last computed.
    pub(crate) value: T,
    pub(crate) kind: Kind<T>,
}

pub(crate) enum Kind<T> {
    /// No operands; the value is set directly from outside.
    Leaf,
    /// A dependent handle: mirrors one wrapped node and can be re-pointed
    /// at a different sub-graph without disturbing other references.
    Alias(NodeRef<T>),
    Unary(UnaryOp, NodeRef<T>),
    Binary(BinaryOp, NodeRef<T>, NodeRef<T>),
}

impl<T: Float> Node<T> {
    pub(crate) fn leaf(value: T) -> NodeRef<T> {
        Rc::new(RefCell::new(Node {
            value,
            kind: Kind::Leaf,
        }))
    }

    pub(crate) fn alias(inner: NodeRef<T>) -> NodeRef<T> {
        let value = inner.borrow().value;
        Rc::new(RefCell::new(Node {
            value,
            kind: Kind::Alias(inner),
        }))
    }

    pub(crate) fn unary(op: UnaryOp, value: T, a: NodeRef<T>) -> NodeRef<T> {
        Rc::new(RefCell::new(Node {
            value,
            kind: Kind::Unary(op, a),
        }))
    }

    pub(crate) fn binary(op: BinaryOp, value: T, a: NodeRef<T>, b: NodeRef<T>) -> NodeRef<T> {
        Rc::new(RefCell::new(Node {
            value,
            kind: Kind::Binary(op, a, b),
        }))
    }
}

pub(crate) fn id<T>(node: &NodeRef<T>) -> NodeId {
    Rc::as_ptr(node) as NodeId
}

/// Follows alias links to the node a handle ultimately refers to.
pub(crate) fn resolve<T>(node: &NodeRef<T>) -> NodeRef<T> {
    let mut current = Rc::clone(node);
    loop {
        let next = match &current.borrow().kind {
            Kind::Alias(inner) => Rc::clone(inner),
            _ => break,
        };
        current = next;
    }
    current
}

/// Distributes `adjoint` from `node` down to every reachable leaf,
/// multiplying by the local partial at each step and summing wherever a
/// node is reached through more than one path. Only leaves with an entry
/// in `grads` accumulate; every other leaf ignores its adjoint.
///
/// Uses cached values exclusively, so it cannot fail; the caller is
/// responsible for having run `update` if leaf values changed.
pub(crate) fn propagate<T: Float>(node: &NodeRef<T>, adjoint: T, grads: &mut GradMap<T>) {
    let n = node.borrow();
    match &n.kind {
        Kind::Leaf => {
            if let Some(acc) = grads.get_mut(&id(node)) {
                *acc = *acc + adjoint;
            }
        }
        Kind::Alias(inner) => propagate(inner, adjoint, grads),
        Kind::Unary(op, a) => {
            let g = adjoint * op.partial(a.borrow().value, n.value);
            propagate(a, g, grads);
        }
        Kind::Binary(op, a, b) => {
            let (da, db) = op.partials(a.borrow().value, b.borrow().value, n.value);
            propagate(a, adjoint * da, grads);
            propagate(b, adjoint * db, grads);
        }
    }
}

/// Recomputes cached values bottom-up: children first, then this node.
/// Re-runs the same domain checks as construction, since a leaf may have
/// been set to a value that puts a downstream operation outside its
/// domain. Stops at the first failure; nothing above the failing node is
/// touched.
pub(crate) fn update<T: Float>(node: &NodeRef<T>) -> Result<()> {
    // Snapshot the kind so no borrow is held across the recursion.
    let kind = {
        let n = node.borrow();
        match &n.kind {
            Kind::Leaf => Kind::Leaf,
            Kind::Alias(inner) => Kind::Alias(Rc::clone(inner)),
            Kind::Unary(op, a) => Kind::Unary(*op, Rc::clone(a)),
            Kind::Binary(op, a, b) => Kind::Binary(*op, Rc::clone(a), Rc::clone(b)),
        }
    };
    let value = match kind {
        Kind::Leaf => return Ok(()),
        Kind::Alias(inner) => {
            update(&inner)?;
            inner.borrow().value
        }
        Kind::Unary(op, a) => {
            update(&a)?;
            let v = a.borrow().value;
            op.eval(v)?
        }
        Kind::Binary(op, a, b) => {
            update(&a)?;
            update(&b)?;
            let (av, bv) = (a.borrow().value, b.borrow().value);
            op.eval(av, bv)?
        }
    };
    node.borrow_mut().value = value;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_follows_alias_chains() {
        let leaf = Node::leaf(2.0);
        let a = Node::alias(Rc::clone(&leaf));
        let b = Node::alias(Rc::clone(&a));
        assert_eq!(id(&resolve(&b)), id(&leaf));
        assert_eq!(id(&resolve(&leaf)), id(&leaf));
    }

    #[test]
    fn propagate_ignores_unbound_leaves() {
        let leaf = Node::leaf(3.0);
        let mut grads: GradMap<f64> = HashMap::new();
        propagate(&leaf, 1.0, &mut grads);
        assert!(grads.is_empty());
    }

    #[test]
    fn propagate_sums_into_bound_leaves() {
        let leaf = Node::leaf(3.0);
        let mut grads: GradMap<f64> = HashMap::new();
        grads.insert(id(&leaf), 0.0);
        propagate(&leaf, 2.0, &mut grads);
        propagate(&leaf, 0.5, &mut grads);
        assert_eq!(grads[&id(&leaf)], 2.5);
    }
}
