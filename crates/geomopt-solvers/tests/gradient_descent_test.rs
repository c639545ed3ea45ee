//! End-to-end tests of the gradient descent solver on concrete manifolds.

use geomopt_core::core::manifold::{InverseRetractionMethod, Manifold};
use geomopt_core::core::objective::GradientObjective;
use geomopt_core::core::problem::Problem;
use geomopt_core::core::types::DVector;
use geomopt_core::optimization::solver::{get_solver_result, solve, SolverState};
use geomopt_core::optimization::stepsize::{ArmijoLinesearch, ConstantStepsize};
use geomopt_core::optimization::stopping_criterion::{
    CriterionValue, StopAfterIteration, StopWhenAll, StopWhenAny, StopWhenGradientNormLess,
    StoppingCriterion,
};
use geomopt_manifolds::{Euclidean, Sphere};
use geomopt_solvers::gradient_descent::GradientDescentState;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn one_dim_quadratic() -> (
    Euclidean,
    impl Fn(&Euclidean, &DVector<f64>) -> f64,
    impl Fn(&Euclidean, &DVector<f64>) -> DVector<f64>,
) {
    (
        Euclidean::new(1).unwrap(),
        |_m: &Euclidean, x: &DVector<f64>| 0.5 * x.norm_squared(),
        |_m: &Euclidean, x: &DVector<f64>| x.clone(),
    )
}

#[test]
fn test_euclidean_sanity() {
    // Half-step gradient descent on f(x) = x²/2 halves the iterate each
    // step, so the gradient norm hits 1e-10 well within 60 iterations.
    let (manifold, cost, gradient) = one_dim_quadratic();
    let problem = Problem::new(manifold, GradientObjective::new(cost, gradient));

    let stop = StopWhenAny::new(vec![
        StopWhenGradientNormLess::new(1e-10).boxed(),
        StopAfterIteration::new(100).boxed(),
    ]);
    let mut state =
        GradientDescentState::new(problem.manifold(), DVector::from_vec(vec![1.0]))
            .with_stepsize(Box::new(ConstantStepsize::new(0.5).unwrap()))
            .with_stopping_criterion(stop.boxed());

    solve(&problem, &mut state).unwrap();

    let criterion = state.stopping_criterion().unwrap();
    assert!(criterion.at_iteration() <= 60);
    assert!(get_solver_result(&state)[0].abs() < 1e-10);
    // The triggered leaf is the gradient-norm test, a convergence witness.
    assert!(criterion.indicates_convergence());
    assert!(criterion.reason().contains("gradient norm"));
}

#[test]
fn test_driver_returns_without_stepping_when_stopped_at_zero() {
    let (manifold, cost, gradient) = one_dim_quadratic();
    let problem = Problem::new(manifold, GradientObjective::new(cost, gradient));

    let start = DVector::from_vec(vec![0.75]);
    let mut state = GradientDescentState::new(problem.manifold(), start.clone())
        .with_stepsize(Box::new(ConstantStepsize::new(0.5).unwrap()))
        .with_stopping_criterion(StopAfterIteration::new(0).boxed());

    solve(&problem, &mut state).unwrap();

    // Not a single step ran: the iterate is bitwise the start value.
    assert_eq!(state.iterate(), &start);
    assert_eq!(state.stopping_criterion().unwrap().at_iteration(), 0);
    assert!(!state.stop_reason().is_empty());
}

#[test]
fn test_and_combinator_delays_termination() {
    // The gradient norm falls below 1e-3 after a handful of iterations,
    // but the conjunction also requires ten of them.
    let (manifold, cost, gradient) = one_dim_quadratic();
    let problem = Problem::new(manifold, GradientObjective::new(cost, gradient));

    let stop = StopWhenAll::new(vec![
        StopAfterIteration::new(10).boxed(),
        StopWhenGradientNormLess::new(1e-3).boxed(),
    ]);
    let mut state =
        GradientDescentState::new(problem.manifold(), DVector::from_vec(vec![0.01]))
            .with_stepsize(Box::new(ConstantStepsize::new(0.5).unwrap()))
            .with_stopping_criterion(stop.boxed());

    solve(&problem, &mut state).unwrap();

    let criterion = state.stopping_criterion().unwrap();
    assert_eq!(criterion.at_iteration(), 10);
    let reason = criterion.reason();
    assert!(reason.contains("maximal number of iterations"));
    assert!(reason.contains("gradient norm"));
}

#[test]
fn test_criterion_update_extends_a_solve() {
    // A tiny constant step keeps the gradient large, so only the iteration
    // cap can fire; updating it stretches the run to 200 iterations.
    let (manifold, cost, gradient) = one_dim_quadratic();
    let problem = Problem::new(manifold, GradientObjective::new(cost, gradient));

    let mut stop = StopWhenAny::new(vec![
        StopAfterIteration::new(50).boxed(),
        StopWhenGradientNormLess::new(1e-6).boxed(),
    ]);
    StoppingCriterion::<f64, Euclidean>::update(
        &mut stop,
        "MaxIteration",
        CriterionValue::Count(200),
    );

    let mut state =
        GradientDescentState::new(problem.manifold(), DVector::from_vec(vec![1.0]))
            .with_stepsize(Box::new(ConstantStepsize::new(1e-6).unwrap()))
            .with_stopping_criterion(stop.boxed());

    solve(&problem, &mut state).unwrap();
    assert_eq!(state.stopping_criterion().unwrap().at_iteration(), 200);
}

/// Karcher-mean fixture: `n` points scattered around a base point.
fn sphere_cloud(n: usize) -> (Sphere, Vec<DVector<f64>>, DVector<f64>) {
    let sphere = Sphere::new(3).unwrap();
    let base = DVector::from_vec(vec![
        std::f64::consts::FRAC_1_SQRT_2,
        0.0,
        std::f64::consts::FRAC_1_SQRT_2,
    ]);
    let sigma = std::f64::consts::PI / 8.0;

    let mut rng = StdRng::seed_from_u64(42);
    let points = (0..n)
        .map(|_| {
            let direction = sphere.random_tangent(&base, &mut rng) * sigma;
            let mut point = base.clone();
            sphere
                .retract(
                    &base,
                    &direction,
                    geomopt_core::core::manifold::RetractionMethod::Exponential,
                    &mut point,
                )
                .unwrap();
            point
        })
        .collect();
    (sphere, points, base)
}

fn karcher_mean_problem(
    sphere: Sphere,
    points: Vec<DVector<f64>>,
) -> Problem<
    f64,
    Sphere,
    GradientObjective<
        impl Fn(&Sphere, &DVector<f64>) -> f64,
        impl Fn(&Sphere, &DVector<f64>) -> DVector<f64>,
    >,
> {
    let n = points.len() as f64;
    let cost_points = points.clone();
    let cost = move |m: &Sphere, q: &DVector<f64>| {
        cost_points
            .iter()
            .map(|p| {
                let d = m.distance(q, p).unwrap();
                d * d
            })
            .sum::<f64>()
            / (2.0 * n)
    };
    let gradient = move |m: &Sphere, q: &DVector<f64>| {
        let mut sum: DVector<f64> = DVector::zeros(3);
        let mut log = DVector::zeros(3);
        for p in &points {
            m.inverse_retract(q, p, InverseRetractionMethod::Logarithmic, &mut log)
                .unwrap();
            sum += &log;
        }
        sum * (-1.0 / n)
    };
    Problem::new(sphere, GradientObjective::new(cost, gradient))
}

#[test]
fn test_sphere_karcher_mean() {
    let (sphere, points, base) = sphere_cloud(100);

    // Reference: a long plain run of the same solver.
    let reference_problem = karcher_mean_problem(sphere.clone(), points.clone());
    let mut reference_state =
        GradientDescentState::new(reference_problem.manifold(), base.clone())
            .with_stopping_criterion(StopAfterIteration::new(10_000).boxed());
    solve(&reference_problem, &mut reference_state).unwrap();
    let reference = get_solver_result(&reference_state);

    // Armijo-backtracking gradient descent with the default criterion.
    let problem = karcher_mean_problem(sphere.clone(), points);
    let mut state = GradientDescentState::new(problem.manifold(), base)
        .with_stepsize(Box::new(ArmijoLinesearch::new(1.0, 0.5, 1e-4, 1e-12).unwrap()));
    solve(&problem, &mut state).unwrap();
    let mean = get_solver_result(&state);

    assert!(sphere.distance(&mean, &reference).unwrap() < 1e-6);
    // The mean stays on the sphere and is not the base point itself.
    assert!((mean.norm() - 1.0).abs() < 1e-12);
}
