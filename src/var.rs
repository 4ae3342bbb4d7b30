//! The user-facing differentiable value.
//!
//! A [`Var`] is a handle onto one node of a shared expression graph.
//! Arithmetic and elementary-function calls allocate a new node holding
//! shared references to the operand nodes, eagerly compute its value, and
//! return a new `Var`; existing nodes are never mutated by construction.
//! The leaves of the resulting graph are the variables the expression was
//! built from, and its root is the final result, which is what makes
//! reverse-mode differentiation (see [`derivatives_of`](crate::derivatives_of))
//! possible afterwards.
//!
//! # Examples
//!
//! ```
//! use revdiff::Var;
//!
//! let x = Var::new(2.0);
//! let y = x.clone() * x.clone() + x.clone(); // y = x² + x
//! assert_eq!(y.value(), 6.0);
//!
//! // Replay the same graph at a different point.
//! x.set(5.0)?;
//! y.update()?;
//! assert_eq!(y.value(), 30.0);
//! # Ok::<(), revdiff::Error>(())
//! ```

use std::ops::{Add, Div, Mul, Neg, Sub};
use std::rc::Rc;

use log::trace;
use num_traits::Float;

use crate::error::{Error, Result};
use crate::node::{self, Kind, Node, NodeRef};
use crate::ops::{BinaryOp, UnaryOp};

/// A differentiable value: a shared handle onto one expression-graph node.
///
/// Cloning a `Var` aliases the same node rather than copying it: two
/// clones see the same value and denote the same quantity in any
/// derivative computation. This aliasing is intentional: it is what lets
/// one sub-expression appear in several places and still accumulate a
/// single, correct derivative.
///
/// All graph machinery is single-threaded; `Var` is neither `Send` nor
/// `Sync`.
pub struct Var<T: Float> {
    pub(crate) node: NodeRef<T>,
}

impl<T: Float> Clone for Var<T> {
    fn clone(&self) -> Self {
        Var {
            node: Rc::clone(&self.node),
        }
    }
}

impl<T: Float> Var<T> {
    /// Creates an independent variable: a fresh leaf holding `value`.
    ///
    /// # Examples
    ///
    /// ```
    /// use revdiff::Var;
    ///
    /// let x = Var::new(3.0);
    /// assert_eq!(x.value(), 3.0);
    /// ```
    pub fn new(value: T) -> Self {
        Var {
            node: Node::leaf(value),
        }
    }

    /// Creates a dependent variable: a handle wrapping `expr`'s node
    /// behind a stable identity.
    ///
    /// The handle mirrors the wrapped expression's value and forwards
    /// `update` and derivative propagation to it. Unlike a plain clone,
    /// the handle can later be re-pointed at a different expression with
    /// [`rebind`](Var::rebind), without disturbing other handles built
    /// over the original expression.
    ///
    /// # Examples
    ///
    /// ```
    /// use revdiff::Var;
    ///
    /// let x = Var::new(3.0);
    /// let y = Var::dependent(&(x.clone() * x.clone()));
    /// assert_eq!(y.value(), 9.0);
    /// ```
    pub fn dependent(expr: &Var<T>) -> Self {
        Var {
            node: Node::alias(Rc::clone(&expr.node)),
        }
    }

    /// Re-points a dependent variable at a different expression.
    ///
    /// Other variables that wrapped the old expression keep seeing it;
    /// only this handle (and its clones) follow the new definition. Fails
    /// with [`Error::InvalidReassignment`] when `self` is not a dependent
    /// handle.
    ///
    /// The new expression must not itself have been built from this
    /// handle: the graph must stay acyclic, and a self-referential rebind
    /// would make `update` and derivative extraction recurse forever.
    ///
    /// # Examples
    ///
    /// ```
    /// use revdiff::Var;
    ///
    /// let x = Var::new(3.0);
    /// let sum = x.clone() + x.clone();
    /// let h = Var::dependent(&sum);
    /// let keeps_old = Var::dependent(&sum);
    ///
    /// h.rebind(&(x.clone() * x.clone()))?;
    /// assert_eq!(h.value(), 9.0);
    /// assert_eq!(keeps_old.value(), 6.0);
    /// # Ok::<(), revdiff::Error>(())
    /// ```
    pub fn rebind(&self, expr: &Var<T>) -> Result<()> {
        {
            let n = self.node.borrow();
            if !matches!(n.kind, Kind::Alias(_)) {
                return Err(Error::InvalidReassignment);
            }
        }
        let target = Rc::clone(&expr.node);
        let value = target.borrow().value;
        trace!("rebinding dependent handle to a new sub-graph");
        let mut n = self.node.borrow_mut();
        n.kind = Kind::Alias(target);
        n.value = value;
        Ok(())
    }

    /// Returns the cached value, with no recomputation.
    ///
    /// After a leaf is [`set`](Var::set), values computed from it are
    /// stale until [`update`](Var::update) is called.
    pub fn value(&self) -> T {
        self.node.borrow().value
    }

    /// Recomputes this expression bottom-up from current leaf values.
    ///
    /// Children are refreshed before parents, so the cached value here
    /// reflects the leaves as they stand now. Domain checks run again
    /// during the replay: a division whose denominator has become zero,
    /// or a square root whose argument has gone negative, fails exactly
    /// as it would have at construction.
    ///
    /// # Examples
    ///
    /// ```
    /// use revdiff::Var;
    ///
    /// let x = Var::new(2.0);
    /// let y = x.clone() * x.clone();
    /// x.set(5.0)?;
    /// assert_eq!(y.value(), 4.0); // stale until updated
    /// y.update()?;
    /// assert_eq!(y.value(), 25.0);
    /// # Ok::<(), revdiff::Error>(())
    /// ```
    pub fn update(&self) -> Result<()> {
        trace!("refreshing cached values bottom-up");
        node::update(&self.node)
    }

    /// Assigns a new raw value to an independent variable.
    ///
    /// Only leaf-backed variables can be set; a quantity defined as a
    /// function of others cannot be poked directly, and attempting to do
    /// so fails with [`Error::InvalidReassignment`]. Dependents keep
    /// their cached values until [`update`](Var::update) is called on
    /// them.
    pub fn set(&self, value: T) -> Result<()> {
        let mut n = self.node.borrow_mut();
        match n.kind {
            Kind::Leaf => {
                n.value = value;
                Ok(())
            }
            _ => Err(Error::InvalidReassignment),
        }
    }

    fn unary(&self, op: UnaryOp) -> Var<T> {
        let a = Rc::clone(&self.node);
        let value = op.apply(a.borrow().value);
        Var {
            node: Node::unary(op, value, a),
        }
    }

    fn try_unary(&self, op: UnaryOp) -> Result<Var<T>> {
        let a = Rc::clone(&self.node);
        let value = op.eval(a.borrow().value)?;
        Ok(Var {
            node: Node::unary(op, value, a),
        })
    }

    fn binary(&self, rhs: &Var<T>, op: BinaryOp) -> Var<T> {
        let a = Rc::clone(&self.node);
        let b = Rc::clone(&rhs.node);
        let value = op.apply(a.borrow().value, b.borrow().value);
        Var {
            node: Node::binary(op, value, a, b),
        }
    }

    fn try_binary(&self, rhs: &Var<T>, op: BinaryOp) -> Result<Var<T>> {
        let a = Rc::clone(&self.node);
        let b = Rc::clone(&rhs.node);
        let value = op.eval(a.borrow().value, b.borrow().value)?;
        Ok(Var {
            node: Node::binary(op, value, a, b),
        })
    }

    /// Computes `|self|`.
    pub fn abs(&self) -> Var<T> {
        self.unary(UnaryOp::Abs)
    }

    /// Computes `e^self`.
    pub fn exp(&self) -> Var<T> {
        self.unary(UnaryOp::Exp)
    }

    /// Computes `sin(self)`.
    pub fn sin(&self) -> Var<T> {
        self.unary(UnaryOp::Sin)
    }

    /// Computes `cos(self)`.
    pub fn cos(&self) -> Var<T> {
        self.unary(UnaryOp::Cos)
    }

    /// Computes `tan(self)`.
    pub fn tan(&self) -> Var<T> {
        self.unary(UnaryOp::Tan)
    }

    /// Computes `atan(self)`.
    pub fn atan(&self) -> Var<T> {
        self.unary(UnaryOp::Atan)
    }

    /// Computes `sinh(self)`.
    pub fn sinh(&self) -> Var<T> {
        self.unary(UnaryOp::Sinh)
    }

    /// Computes `cosh(self)`.
    pub fn cosh(&self) -> Var<T> {
        self.unary(UnaryOp::Cosh)
    }

    /// Computes `tanh(self)`.
    pub fn tanh(&self) -> Var<T> {
        self.unary(UnaryOp::Tanh)
    }

    /// Computes `asinh(self)`.
    pub fn asinh(&self) -> Var<T> {
        self.unary(UnaryOp::Asinh)
    }

    /// Computes `√self`. Fails with [`Error::Domain`] for a negative
    /// argument.
    pub fn sqrt(&self) -> Result<Var<T>> {
        self.try_unary(UnaryOp::Sqrt)
    }

    /// Computes `ln(self)`. Fails with [`Error::Domain`] for a
    /// non-positive argument.
    pub fn ln(&self) -> Result<Var<T>> {
        self.try_unary(UnaryOp::Ln)
    }

    /// Computes `asin(self)`. Fails with [`Error::Domain`] when the
    /// argument lies outside `[-1, 1]`.
    pub fn asin(&self) -> Result<Var<T>> {
        self.try_unary(UnaryOp::Asin)
    }

    /// Computes `acos(self)`. Fails with [`Error::Domain`] when the
    /// argument lies outside `[-1, 1]`.
    pub fn acos(&self) -> Result<Var<T>> {
        self.try_unary(UnaryOp::Acos)
    }

    /// Computes `acosh(self)`. Fails with [`Error::Domain`] when the
    /// argument is below 1.
    pub fn acosh(&self) -> Result<Var<T>> {
        self.try_unary(UnaryOp::Acosh)
    }

    /// Computes `atanh(self)`. Fails with [`Error::Domain`] when the
    /// argument lies outside `(-1, 1)`.
    pub fn atanh(&self) -> Result<Var<T>> {
        self.try_unary(UnaryOp::Atanh)
    }

    /// Computes `self^rhs`.
    pub fn pow(&self, rhs: &Var<T>) -> Var<T> {
        self.binary(rhs, BinaryOp::Pow)
    }

    /// Computes `self^k` for a constant exponent.
    pub fn powf(&self, k: T) -> Var<T> {
        self.pow(&Var::new(k))
    }

    /// Computes `atan2(self, rhs)`, the four-quadrant arctangent of
    /// `self / rhs`.
    pub fn atan2(&self, rhs: &Var<T>) -> Var<T> {
        self.binary(rhs, BinaryOp::Atan2)
    }

    /// Computes `hypot(self, rhs) = √(self² + rhs²)`.
    pub fn hypot(&self, rhs: &Var<T>) -> Var<T> {
        self.binary(rhs, BinaryOp::Hypot)
    }
}

impl<T: Float> Add for Var<T> {
    type Output = Var<T>;
    fn add(self, rhs: Self) -> Var<T> {
        self.binary(&rhs, BinaryOp::Add)
    }
}

impl<T: Float> Sub for Var<T> {
    type Output = Var<T>;
    fn sub(self, rhs: Self) -> Var<T> {
        self.binary(&rhs, BinaryOp::Sub)
    }
}

impl<T: Float> Mul for Var<T> {
    type Output = Var<T>;
    fn mul(self, rhs: Self) -> Var<T> {
        self.binary(&rhs, BinaryOp::Mul)
    }
}

/// Division raises [`Error::DivisionByZero`] at the moment the quotient
/// is computed, so its output is a `Result`.
impl<T: Float> Div for Var<T> {
    type Output = Result<Var<T>>;
    fn div(self, rhs: Self) -> Result<Var<T>> {
        self.try_binary(&rhs, BinaryOp::Div)
    }
}

impl<T: Float> Neg for Var<T> {
    type Output = Var<T>;
    fn neg(self) -> Var<T> {
        self.unary(UnaryOp::Neg)
    }
}

impl<T: Float> Add<T> for Var<T> {
    type Output = Var<T>;
    fn add(self, c: T) -> Var<T> {
        self.binary(&Var::new(c), BinaryOp::Add)
    }
}

impl<T: Float> Sub<T> for Var<T> {
    type Output = Var<T>;
    fn sub(self, c: T) -> Var<T> {
        self.binary(&Var::new(c), BinaryOp::Sub)
    }
}

impl<T: Float> Mul<T> for Var<T> {
    type Output = Var<T>;
    fn mul(self, c: T) -> Var<T> {
        self.binary(&Var::new(c), BinaryOp::Mul)
    }
}

impl<T: Float> Div<T> for Var<T> {
    type Output = Result<Var<T>>;
    fn div(self, c: T) -> Result<Var<T>> {
        self.try_binary(&Var::new(c), BinaryOp::Div)
    }
}
