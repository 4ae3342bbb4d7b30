//! Operation kinds and their evaluation and derivative rules.
//!
//! Each node in the expression graph is tagged with one of these variants.
//! A variant knows three things: how to evaluate itself from operand values
//! (`apply`), which argument values are outside its domain (`check`), and
//! its local partial derivative at the cached operand values (`partial` /
//! `partials`). The backward pass multiplies the incoming adjoint by the
//! local partial and forwards the product into each operand.

use num_traits::Float;

use crate::error::{Error, Result};

/// Operations taking a single operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Neg,
    Abs,
    Sqrt,
    Exp,
    Ln,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Asinh,
    Acosh,
    Atanh,
}

impl UnaryOp {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Neg => "neg",
            Self::Abs => "abs",
            Self::Sqrt => "sqrt",
            Self::Exp => "exp",
            Self::Ln => "ln",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Asin => "asin",
            Self::Acos => "acos",
            Self::Atan => "atan",
            Self::Sinh => "sinh",
            Self::Cosh => "cosh",
            Self::Tanh => "tanh",
            Self::Asinh => "asinh",
            Self::Acosh => "acosh",
            Self::Atanh => "atanh",
        }
    }

    /// Rejects arguments outside the operation's domain.
    pub(crate) fn check<T: Float>(self, a: T) -> Result<()> {
        let outside = match self {
            Self::Sqrt => a < T::zero(),
            Self::Ln => a <= T::zero(),
            Self::Asin | Self::Acos => a.abs() > T::one(),
            Self::Acosh => a < T::one(),
            Self::Atanh => a.abs() >= T::one(),
            _ => false,
        };
        if outside {
            Err(Error::domain(self.name(), a))
        } else {
            Ok(())
        }
    }

    /// Evaluates the operation at `a`. Callers of the total operations use
    /// this directly; the fallible ones go through [`UnaryOp::eval`].
    pub(crate) fn apply<T: Float>(self, a: T) -> T {
        match self {
            Self::Neg => -a,
            Self::Abs => a.abs(),
            Self::Sqrt => a.sqrt(),
            Self::Exp => a.exp(),
            Self::Ln => a.ln(),
            Self::Sin => a.sin(),
            Self::Cos => a.cos(),
            Self::Tan => a.tan(),
            Self::Asin => a.asin(),
            Self::Acos => a.acos(),
            Self::Atan => a.atan(),
            Self::Sinh => a.sinh(),
            Self::Cosh => a.cosh(),
            Self::Tanh => a.tanh(),
            Self::Asinh => a.asinh(),
            Self::Acosh => a.acosh(),
            Self::Atanh => a.atanh(),
        }
    }

    /// Domain-checked evaluation, used at construction of the fallible
    /// operations and by `update` when replaying any node.
    pub(crate) fn eval<T: Float>(self, a: T) -> Result<T> {
        self.check(a)?;
        Ok(self.apply(a))
    }

    /// The local partial ∂f/∂a at operand value `a`, where `out` is the
    /// node's cached output `f(a)`.
    pub(crate) fn partial<T: Float>(self, a: T, out: T) -> T {
        let one = T::one();
        match self {
            Self::Neg => -one,
            Self::Abs => a.signum(),
            Self::Sqrt => one / (out + out),
            Self::Exp => out,
            Self::Ln => a.recip(),
            Self::Sin => a.cos(),
            Self::Cos => -a.sin(),
            Self::Tan => one + out * out,
            Self::Asin => (one - a * a).sqrt().recip(),
            Self::Acos => -(one - a * a).sqrt().recip(),
            Self::Atan => (one + a * a).recip(),
            Self::Sinh => a.cosh(),
            Self::Cosh => a.sinh(),
            Self::Tanh => one - out * out,
            Self::Asinh => (a * a + one).sqrt().recip(),
            Self::Acosh => (a * a - one).sqrt().recip(),
            Self::Atanh => (one - a * a).recip(),
        }
    }
}

/// Operations taking two operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Atan2,
    Hypot,
}

impl BinaryOp {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Pow => "pow",
            Self::Atan2 => "atan2",
            Self::Hypot => "hypot",
        }
    }

    pub(crate) fn check<T: Float>(self, _a: T, b: T) -> Result<()> {
        if self == Self::Div && b == T::zero() {
            return Err(Error::DivisionByZero { op: self.name() });
        }
        Ok(())
    }

    pub(crate) fn apply<T: Float>(self, a: T, b: T) -> T {
        match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div => a / b,
            Self::Pow => a.powf(b),
            Self::Atan2 => a.atan2(b),
            Self::Hypot => a.hypot(b),
        }
    }

    pub(crate) fn eval<T: Float>(self, a: T, b: T) -> Result<T> {
        self.check(a, b)?;
        Ok(self.apply(a, b))
    }

    /// The local partials (∂f/∂a, ∂f/∂b) at operand values `a`, `b`, where
    /// `out` is the node's cached output `f(a, b)`.
    pub(crate) fn partials<T: Float>(self, a: T, b: T, out: T) -> (T, T) {
        let one = T::one();
        match self {
            Self::Add => (one, one),
            Self::Sub => (one, -one),
            Self::Mul => (b, a),
            Self::Div => (b.recip(), -a / (b * b)),
            Self::Pow => (b * a.powf(b - one), out * a.ln()),
            Self::Atan2 => {
                let d = a * a + b * b;
                (b / d, -a / d)
            }
            Self::Hypot => (a / out, b / out),
        }
    }
}
