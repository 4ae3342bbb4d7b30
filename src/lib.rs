//! Reverse-mode automatic differentiation over a shared expression graph.
//!
//! Building an expression out of [`Var`]s records the computation as a
//! directed acyclic graph whose leaves are the independent variables and
//! whose root is the result. Each operation node caches its value at
//! construction time and knows the closed-form partial derivative of its
//! output with respect to each operand. [`derivatives_of`] walks that
//! graph backwards from the root, distributing adjoints by the chain rule
//! and summing wherever a node is shared. No symbolic differentiation,
//! no finite differences.
//!
//! The engine is generic over any [`num_traits::Float`] and carries no
//! global state: every graph is owned by the variables built over it, and
//! every backward pass owns its own accumulators.
//!
//! # Computing a derivative
//!
//! ```
//! use revdiff::{derivatives_of, Var};
//!
//! let x = Var::new(3.0);
//! let y = x.clone() * x.clone() + x.clone(); // y = x² + x
//!
//! assert_eq!(y.value(), 12.0);
//! assert_eq!(derivatives_of(&y, &[x]), vec![7.0]); // dy/dx = 2x + 1
//! ```
//!
//! # Replaying a graph at a new point
//!
//! A graph built once can be re-evaluated with different leaf values,
//! which is what iterative numerical routines (root finding, optimization,
//! ODE integration) need:
//!
//! ```
//! use revdiff::{derivative_of, Var};
//!
//! let x = Var::new(2.0);
//! let y = x.clone() * x.clone();
//!
//! assert_eq!(y.value(), 4.0);
//! assert_eq!(derivative_of(&y, &x), 4.0);
//!
//! x.set(5.0)?;
//! y.update()?; // bottom-up recomputation from current leaf values
//! assert_eq!(y.value(), 25.0);
//! assert_eq!(derivative_of(&y, &x), 10.0);
//! # Ok::<(), revdiff::Error>(())
//! ```
//!
//! # Closure helpers
//!
//! For one-shot use, [`reverse_diff`] and [`reverse_gradient`] build the
//! graph, run the backward pass, and hand back value plus derivative(s):
//!
//! ```
//! use revdiff::reverse_diff;
//!
//! // f(x) = (x + 1)(x - 1) = x² - 1 at x = 3
//! let (val, deriv) = reverse_diff(|x| (x.clone() + 1.0) * (x - 1.0), 3.0);
//! assert_eq!(val, 8.0);
//! assert_eq!(deriv, 6.0);
//! ```
//!
//! # Errors
//!
//! Division by zero and out-of-domain arguments to `sqrt`, `ln`,
//! `asin`, `acos`, `acosh` and `atanh` are detected the moment the value
//! is computed, at construction or on [`Var::update`] replay, and reported
//! through [`Error`]. See the [`error`] module for the full taxonomy.

pub mod error;
pub mod grad;
mod node;
mod ops;
pub mod var;

pub use error::{Error, Result};
pub use grad::{derivative_of, derivatives_of, reverse_diff, reverse_gradient};
pub use var::Var;
