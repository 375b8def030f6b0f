//! Bounded Levenberg–Marquardt minimizer.
//!
//! Minimizes `‖r(x)‖²` subject to `lower <= x <= upper`.
//!
//! Each iteration:
//!
//! 1. builds the Jacobian `J` of the residuals and the descent direction `g = -Jᵀr`
//! 2. freezes coordinates that sit on a bound while `g` pushes them outward
//! 3. solves `(JᵀJ + λ diag(JᵀJ)) δ = g` on the free coordinates
//! 4. projects `x + δ` back into the box and accepts it only if the cost drops
//!
//! `λ` shrinks after an accepted step and grows after a rejected one. Every
//! residual evaluation is charged against an `EvalBudget`, so the loop always
//! terminates.

use log::trace;
use nalgebra::{DMatrix, DVector};

use crate::error::ConvergenceCause;
use crate::math::solve_least_squares;

const INITIAL_LAMBDA: f64 = 1e-3;
const MIN_LAMBDA: f64 = 1e-15;
const MAX_LAMBDA: f64 = 1e16;
/// Floor for Marquardt scaling so a zero diagonal entry still gets damped.
const DIAG_FLOOR: f64 = 1e-12;

/// A nonlinear least-squares problem.
pub trait LeastSquaresProblem {
    /// Residual vector at `x`.
    fn residuals(&self, x: &DVector<f64>) -> DVector<f64>;

    /// Jacobian of [`LeastSquaresProblem::residuals`] at `x` (rows = residuals).
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64>;
}

/// Residual-evaluation allowance, shared by every solver run of one fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalBudget {
    pub limit: usize,
    pub used: usize,
}

impl EvalBudget {
    pub fn new(limit: usize) -> Self {
        Self { limit, used: 0 }
    }

    fn charge(&mut self) -> Result<(), ConvergenceCause> {
        if self.used >= self.limit {
            return Err(ConvergenceCause::BudgetExhausted { evaluations: self.used });
        }
        self.used += 1;
        Ok(())
    }
}

/// Solver settings.
#[derive(Debug, Clone, Copy)]
pub struct LmOptions {
    /// Stop when an accepted step reduces the cost by at most `ftol * cost`.
    pub ftol: f64,
    /// Stop when an accepted step is shorter than `xtol * (‖x‖ + xtol)`.
    pub xtol: f64,
    /// Stop when the largest free gradient component is at most `gtol`.
    pub gtol: f64,
}

/// Which test ended a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    CostReduction,
    StepSize,
    Gradient,
    /// Damping saturated without finding a lower cost.
    NoDescent,
}

#[derive(Debug, Clone)]
pub struct LmReport {
    pub x: DVector<f64>,
    pub cost: f64,
    /// Evaluations charged by this run.
    pub evaluations: usize,
    pub iterations: usize,
    pub termination: Termination,
}

/// Project `x` into `[lower, upper]` component-wise.
pub fn project(x: &DVector<f64>, lower: &DVector<f64>, upper: &DVector<f64>) -> DVector<f64> {
    DVector::from_iterator(
        x.len(),
        x.iter()
            .zip(lower.iter().zip(upper.iter()))
            .map(|(&v, (&lo, &hi))| v.clamp(lo, hi)),
    )
}

/// Run the bounded minimizer from `x0` (projected into the box first).
pub fn minimize_bounded<P: LeastSquaresProblem>(
    problem: &P,
    x0: &DVector<f64>,
    lower: &DVector<f64>,
    upper: &DVector<f64>,
    opts: &LmOptions,
    budget: &mut EvalBudget,
) -> Result<LmReport, ConvergenceCause> {
    let n = x0.len();
    if lower.len() != n || upper.len() != n {
        return Err(ConvergenceCause::InfeasibleBounds(format!(
            "expected {n} bounds, got {} lower and {} upper",
            lower.len(),
            upper.len()
        )));
    }
    for i in 0..n {
        if !(lower[i].is_finite() && upper[i].is_finite() && lower[i] <= upper[i]) {
            return Err(ConvergenceCause::InfeasibleBounds(format!(
                "component {i}: [{}, {}]",
                lower[i], upper[i]
            )));
        }
    }
    if x0.iter().any(|v| !v.is_finite()) {
        return Err(ConvergenceCause::NonFiniteResidual);
    }

    let start = budget.used;
    let mut x = project(x0, lower, upper);
    let mut r = evaluate(problem, &x, budget)?;
    if r.iter().any(|v| !v.is_finite()) {
        return Err(ConvergenceCause::NonFiniteResidual);
    }
    let mut cost = r.norm_squared();
    let mut lambda = INITIAL_LAMBDA;
    let mut iterations = 0usize;

    let finish = |x: DVector<f64>, cost, used: usize, iterations, termination| LmReport {
        x,
        cost,
        evaluations: used - start,
        iterations,
        termination,
    };

    loop {
        let jac = problem.jacobian(&x);
        if jac.iter().any(|v| !v.is_finite()) {
            return Err(ConvergenceCause::NonFiniteResidual);
        }
        let grad = -(jac.transpose() * &r);
        let normal = jac.transpose() * &jac;

        let free: Vec<usize> = (0..n)
            .filter(|&i| {
                let pinned_low = x[i] <= lower[i] && grad[i] < 0.0;
                let pinned_high = x[i] >= upper[i] && grad[i] > 0.0;
                !(pinned_low || pinned_high)
            })
            .collect();

        let gmax = free.iter().map(|&i| grad[i].abs()).fold(0.0, f64::max);
        if gmax <= opts.gtol {
            if iterations == 0 && cost > 0.0 && grad.iter().all(|&g| g == 0.0) {
                return Err(ConvergenceCause::SingularJacobian);
            }
            return Ok(finish(x, cost, budget.used, iterations, Termination::Gradient));
        }

        loop {
            let k = free.len();
            let mut a = DMatrix::<f64>::zeros(k, k);
            let mut b = DVector::<f64>::zeros(k);
            for (ri, &i) in free.iter().enumerate() {
                b[ri] = grad[i];
                for (ci, &j) in free.iter().enumerate() {
                    a[(ri, ci)] = normal[(i, j)];
                }
                a[(ri, ri)] += lambda * normal[(i, i)].max(DIAG_FLOOR);
            }

            let delta = solve_least_squares(&a, &b).ok_or(ConvergenceCause::SingularJacobian)?;
            let mut stepped = x.clone();
            for (ri, &i) in free.iter().enumerate() {
                stepped[i] += delta[ri];
            }
            let candidate = project(&stepped, lower, upper);

            let r_new = evaluate(problem, &candidate, budget)?;
            let cost_new = if r_new.iter().all(|v| v.is_finite()) {
                r_new.norm_squared()
            } else {
                f64::INFINITY
            };
            trace!("lm: lambda={lambda:.3e} cost={cost:.6e} candidate={cost_new:.6e}");

            if cost_new < cost {
                let step = (&candidate - &x).norm();
                let reduction = cost - cost_new;
                let previous = cost;

                x = candidate;
                r = r_new;
                cost = cost_new;
                iterations += 1;
                lambda = (lambda / 10.0).max(MIN_LAMBDA);

                if reduction <= opts.ftol * previous {
                    return Ok(finish(x, cost, budget.used, iterations, Termination::CostReduction));
                }
                if step <= opts.xtol * (x.norm() + opts.xtol) {
                    return Ok(finish(x, cost, budget.used, iterations, Termination::StepSize));
                }
                break;
            }

            lambda *= 10.0;
            if lambda > MAX_LAMBDA {
                return Ok(finish(x, cost, budget.used, iterations, Termination::NoDescent));
            }
        }
    }
}

fn evaluate<P: LeastSquaresProblem>(
    problem: &P,
    x: &DVector<f64>,
    budget: &mut EvalBudget,
) -> Result<DVector<f64>, ConvergenceCause> {
    budget.charge()?;
    Ok(problem.residuals(x))
}
