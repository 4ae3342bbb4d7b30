//! Gradient extraction: the backward pass over a built expression.
//!
//! Reverse-mode differentiation runs in two phases. Building an expression
//! out of [`Var`]s records the computation as a shared graph and evaluates
//! it eagerly (the forward pass). [`derivatives_of`] then seeds the root's
//! adjoint with 1 and propagates scaled adjoints down to every reachable
//! leaf (the backward pass), *summing* contributions wherever a node is
//! reached through more than one path.
//!
//! That summation is the central correctness property of the engine: when
//! one sub-expression feeds into several places, each path contributes its
//! share of the derivative, and the accumulator adds them up. It is also
//! why operand references are shared rather than copied: a copied leaf
//! would split the derivative across distinct accumulators.
//!
//! Accumulators live in a map owned by the extraction call, keyed by leaf
//! identity, so the graph itself carries no backward-pass state and
//! repeated extractions cannot contaminate one another.

use std::collections::HashMap;

use log::trace;
use num_traits::Float;

use crate::node::{self, GradMap};
use crate::var::Var;

/// Returns the partial derivative of `y` with respect to each `x`, in
/// order. An `x` unreachable from `y` gets derivative 0.
///
/// Each `x` should be an independent (leaf-backed) variable; a dependent
/// handle wrapping a leaf is resolved to that leaf. Propagation works
/// entirely on cached values, so the graph must be up to date (see
/// [`Var::update`]) for the derivatives to refer to the current point.
///
/// # Examples
///
/// A leaf shared between two sub-expressions accumulates the total
/// derivative:
///
/// ```
/// use revdiff::{derivatives_of, Var};
///
/// let x = Var::new(3.0);
/// let y = x.clone() * x.clone() + x.clone(); // y = x² + x
///
/// let d = derivatives_of(&y, &[x]);
/// assert_eq!(d, vec![7.0]); // dy/dx = 2x + 1
/// ```
///
/// Several independent variables at once:
///
/// ```
/// use revdiff::{derivatives_of, Var};
///
/// let x = Var::new(3.0);
/// let y = Var::new(4.0);
/// let f = x.clone() * x.clone() + x.clone() * y.clone();
///
/// let d = derivatives_of(&f, &[x, y]);
/// assert_eq!(d, vec![10.0, 3.0]); // ∂f/∂x = 2x + y, ∂f/∂y = x
/// ```
pub fn derivatives_of<T: Float>(y: &Var<T>, xs: &[Var<T>]) -> Vec<T> {
    let mut grads: GradMap<T> = HashMap::with_capacity(xs.len());
    for x in xs {
        grads.insert(node::id(&node::resolve(&x.node)), T::zero());
    }
    trace!("backward pass over {} independent variable(s)", xs.len());
    node::propagate(&y.node, T::one(), &mut grads);
    xs.iter()
        .map(|x| {
            grads
                .get(&node::id(&node::resolve(&x.node)))
                .copied()
                .unwrap_or_else(T::zero)
        })
        .collect()
}

/// Returns the partial derivative of `y` with respect to a single `x`.
///
/// # Examples
///
/// ```
/// use revdiff::{derivative_of, Var};
///
/// let x = Var::new(2.0);
/// let y = x.clone() * x.clone() * x.clone(); // y = x³
/// assert_eq!(derivative_of(&y, &x), 12.0);   // 3x²
/// ```
pub fn derivative_of<T: Float>(y: &Var<T>, x: &Var<T>) -> T {
    let key = node::id(&node::resolve(&x.node));
    let mut grads: GradMap<T> = HashMap::with_capacity(1);
    grads.insert(key, T::zero());
    node::propagate(&y.node, T::one(), &mut grads);
    grads.get(&key).copied().unwrap_or_else(T::zero)
}

/// Computes the value and derivative of a function at `x` using
/// reverse-mode AD.
///
/// # Examples
///
/// ```
/// use revdiff::{reverse_diff, Var};
///
/// // f(x) = x² at x = 3
/// let (val, deriv) = reverse_diff(|x| x.clone() * x, 3.0);
/// assert_eq!(val, 9.0);
/// assert_eq!(deriv, 6.0);
/// ```
///
/// Reuse the same function at different points:
///
/// ```
/// use revdiff::{reverse_diff, Var};
///
/// let f = |x: Var<f64>| x.clone() * x.clone() - x;
///
/// let (v1, d1) = reverse_diff(f, 2.0);
/// let (v2, d2) = reverse_diff(f, 5.0);
///
/// assert_eq!((v1, d1), (2.0, 3.0));   // f(2) = 2, f'(2) = 3
/// assert_eq!((v2, d2), (20.0, 9.0));  // f(5) = 20, f'(5) = 9
/// ```
pub fn reverse_diff<T, F>(f: F, x: T) -> (T, T)
where
    T: Float,
    F: FnOnce(Var<T>) -> Var<T>,
{
    let var = Var::new(x);
    let result = f(var.clone());
    (result.value(), derivative_of(&result, &var))
}

/// Computes the value and gradient of a multivariable function using
/// reverse-mode AD.
///
/// # Examples
///
/// ```
/// use revdiff::{reverse_gradient, Var};
///
/// // f(x, y) = x² + x·y at (3, 4)
/// let f = |[x, y]: [Var<f64>; 2]| x.clone() * x.clone() + x * y;
///
/// let (val, grad) = reverse_gradient(f, [3.0, 4.0]);
/// assert_eq!(val, 21.0);
/// assert_eq!(grad[0], 10.0);   // ∂f/∂x = 2x + y
/// assert_eq!(grad[1], 3.0);    // ∂f/∂y = x
/// ```
pub fn reverse_gradient<T, F, const N: usize>(f: F, point: [T; N]) -> (T, [T; N])
where
    T: Float,
    F: FnOnce([Var<T>; N]) -> Var<T>,
{
    let vars: [Var<T>; N] = std::array::from_fn(|i| Var::new(point[i]));
    let result = f(vars.clone());
    let derivs = derivatives_of(&result, &vars);
    (result.value(), std::array::from_fn(|i| derivs[i]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn shared_leaf_sums_contributions() {
        // y = x·x + x, dy/dx = 2x + 1 = 7 at x = 3.
        let x = Var::new(3.0);
        let y = x.clone() * x.clone() + x.clone();
        assert_eq!(derivatives_of(&y, &[x]), vec![7.0]);
    }

    #[test]
    fn multi_path_dag() {
        // a = x + x, b = a·a = 4x²; db/dx = 8x = 24 at x = 3. Exercises
        // both intra-node sharing (a holds x twice) and inter-node
        // sharing (b holds a twice).
        let x = Var::new(3.0);
        let a = x.clone() + x.clone();
        let b = a.clone() * a;
        assert_eq!(derivative_of(&b, &x), 24.0);
    }

    #[test]
    fn unreached_leaf_has_zero_gradient() {
        let x = Var::new(2.0);
        let z = Var::new(5.0);
        let y = x.clone() * x.clone();
        assert_eq!(derivatives_of(&y, &[z]), vec![0.0]);
    }

    #[test]
    fn derivative_of_a_variable_with_itself() {
        let x = Var::new(2.0);
        assert_eq!(derivative_of(&x, &x), 1.0);
    }

    #[test]
    fn aliases_denote_the_same_quantity() {
        let x = Var::new(3.0);
        let alias = x.clone();
        let y = x.clone() * alias.clone(); // still x², not two variables
        assert_eq!(derivative_of(&y, &x), 6.0);
        assert_eq!(derivative_of(&y, &alias), 6.0);
    }

    #[test]
    fn dependent_handle_resolves_to_its_leaf() {
        let x = Var::new(2.0);
        let h = Var::dependent(&x);
        let y = h.clone() * h.clone();
        assert_eq!(derivative_of(&y, &x), 4.0);
        assert_eq!(derivative_of(&y, &h), 4.0);
    }

    #[test]
    fn unary_chain_rule_against_analytic_derivatives() {
        let v = 0.7_f64;
        let cases: [(fn(&Var<f64>) -> Var<f64>, f64); 7] = [
            (|x| x.sin(), v.cos()),
            (|x| x.cos(), -v.sin()),
            (|x| x.tan(), 1.0 / (v.cos() * v.cos())),
            (|x| x.exp(), v.exp()),
            (|x| x.sinh(), v.cosh()),
            (|x| x.cosh(), v.sinh()),
            (|x| x.tanh(), 1.0 - v.tanh() * v.tanh()),
        ];
        for (f, expected) in cases {
            let x = Var::new(v);
            let y = f(&x);
            assert_relative_eq!(derivative_of(&y, &x), expected, max_relative = 1e-12);
        }
    }

    #[test]
    fn fallible_unary_chain_rule() {
        let v = 0.7_f64;
        let x = Var::new(v);

        let y = x.sqrt().unwrap();
        assert_relative_eq!(
            derivative_of(&y, &x),
            0.5 / v.sqrt(),
            max_relative = 1e-12
        );

        let y = x.ln().unwrap();
        assert_relative_eq!(derivative_of(&y, &x), 1.0 / v, max_relative = 1e-12);

        let y = x.asin().unwrap();
        assert_relative_eq!(
            derivative_of(&y, &x),
            1.0 / (1.0 - v * v).sqrt(),
            max_relative = 1e-12
        );

        let y = x.acos().unwrap();
        assert_relative_eq!(
            derivative_of(&y, &x),
            -1.0 / (1.0 - v * v).sqrt(),
            max_relative = 1e-12
        );

        let y = x.atanh().unwrap();
        assert_relative_eq!(
            derivative_of(&y, &x),
            1.0 / (1.0 - v * v),
            max_relative = 1e-12
        );

        let x = Var::new(1.5_f64);
        let y = x.acosh().unwrap();
        assert_relative_eq!(
            derivative_of(&y, &x),
            1.0 / (1.5_f64 * 1.5 - 1.0).sqrt(),
            max_relative = 1e-12
        );
    }

    #[test]
    fn inverse_and_negation_rules() {
        let x = Var::new(2.0_f64);
        assert_eq!(derivative_of(&-x.clone(), &x), -1.0);
        assert_eq!(derivative_of(&x.abs(), &x), 1.0);
        let x = Var::new(-2.0_f64);
        assert_eq!(derivative_of(&x.abs(), &x), -1.0);
        let x = Var::new(0.7_f64);
        assert_relative_eq!(
            derivative_of(&x.atan(), &x),
            1.0 / (1.0 + 0.49),
            max_relative = 1e-12
        );
        assert_relative_eq!(
            derivative_of(&x.asinh(), &x),
            1.0 / (0.49_f64 + 1.0).sqrt(),
            max_relative = 1e-12
        );
    }

    #[test]
    fn binary_partials() {
        // d(a/b)/da = 1/b, d(a/b)/db = -a/b².
        let a = Var::new(3.0_f64);
        let b = Var::new(2.0_f64);
        let q = (a.clone() / b.clone()).unwrap();
        let d = derivatives_of(&q, &[a.clone(), b.clone()]);
        assert_relative_eq!(d[0], 0.5, max_relative = 1e-12);
        assert_relative_eq!(d[1], -0.75, max_relative = 1e-12);

        // d(a-b)/db = -1.
        let s = a.clone() - b.clone();
        assert_eq!(derivatives_of(&s, &[a.clone(), b.clone()]), vec![1.0, -1.0]);

        // d(a^b)/da = b·a^(b-1), d(a^b)/db = a^b·ln a.
        let p = a.pow(&b);
        let d = derivatives_of(&p, &[a.clone(), b.clone()]);
        assert_relative_eq!(d[0], 2.0 * 3.0, max_relative = 1e-12);
        assert_relative_eq!(d[1], 9.0 * 3.0_f64.ln(), max_relative = 1e-12);

        // hypot(3, 4) = 5; partials a/out, b/out.
        let h = a.hypot(&b);
        let d = derivatives_of(&h, &[a.clone(), b.clone()]);
        let out = (9.0_f64 + 4.0).sqrt();
        assert_relative_eq!(d[0], 3.0 / out, max_relative = 1e-12);
        assert_relative_eq!(d[1], 2.0 / out, max_relative = 1e-12);

        // atan2(y, x): ∂/∂y = x/(x²+y²), ∂/∂x = -y/(x²+y²).
        let t = a.atan2(&b);
        let d = derivatives_of(&t, &[a, b]);
        assert_relative_eq!(d[0], 2.0 / 13.0, max_relative = 1e-12);
        assert_relative_eq!(d[1], -3.0 / 13.0, max_relative = 1e-12);
    }

    #[test]
    fn powf_differentiates_like_a_constant_exponent() {
        let x = Var::new(3.0_f64);
        let y = x.powf(4.0);
        assert_relative_eq!(derivative_of(&y, &x), 4.0 * 27.0, max_relative = 1e-12);
    }

    #[test]
    fn derivatives_after_update_follow_the_new_point() {
        let x = Var::new(2.0);
        let y = x.clone() * x.clone();
        assert_eq!(derivative_of(&y, &x), 4.0);

        x.set(5.0).unwrap();
        y.update().unwrap();
        assert_eq!(derivative_of(&y, &x), 10.0);
    }

    #[test]
    fn repeated_extraction_does_not_accumulate_across_calls() {
        let x = Var::new(3.0);
        let y = x.clone() * x.clone();
        assert_eq!(derivative_of(&y, &x), 6.0);
        assert_eq!(derivative_of(&y, &x), 6.0);
    }

    #[test]
    fn duplicate_inputs_each_report_the_full_derivative() {
        let x = Var::new(3.0);
        let y = x.clone() * x.clone();
        assert_eq!(derivatives_of(&y, &[x.clone(), x]), vec![6.0, 6.0]);
    }

    #[test]
    fn reverse_diff_matches_manual_extraction() {
        let (val, deriv) = reverse_diff(|x| x.clone() * x.clone() + x, 3.0);
        assert_eq!(val, 12.0);
        assert_eq!(deriv, 7.0);
    }

    #[test]
    fn reverse_gradient_over_two_variables() {
        let f = |[x, y]: [Var<f64>; 2]| x.clone() * x.clone() + x * y;
        let (val, grad) = reverse_gradient(f, [3.0, 4.0]);
        assert_eq!(val, 21.0);
        assert_eq!(grad, [10.0, 3.0]);
    }

    #[test]
    fn gradient_flows_through_a_rebound_handle() {
        let x = Var::new(3.0);
        let h = Var::dependent(&(x.clone() + x.clone()));
        let y = h.clone() * h.clone(); // (2x)² = 4x²
        assert_eq!(derivative_of(&y, &x), 24.0);

        // After rebinding h to x³, y still sees h through the handle.
        let cube = x.clone() * x.clone() * x.clone();
        h.rebind(&cube).unwrap();
        y.update().unwrap();
        assert_eq!(y.value(), 27.0 * 27.0);
        // y = (x³)², dy/dx = 6x⁵ = 1458 at x = 3.
        assert_eq!(derivative_of(&y, &x), 6.0 * 243.0);
    }
}
