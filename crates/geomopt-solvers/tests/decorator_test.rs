//! Tests of the debug / record decorators around a full solve.

use geomopt_core::core::objective::GradientObjective;
use geomopt_core::core::problem::Problem;
use geomopt_core::core::types::DVector;
use geomopt_core::optimization::debug::{
    DebugAction, DebugCost, DebugGroup, DebugIteration, DebugSink, DebugSolverState,
};
use geomopt_core::optimization::record::{
    RecordAction, RecordCost, RecordEvery, RecordGradient, RecordGroup, RecordIteration,
    RecordSolverState, RecordedValue,
};
use geomopt_core::optimization::solver::{solve, Hook, SolverState};
use geomopt_core::optimization::stepsize::ConstantStepsize;
use geomopt_core::optimization::stopping_criterion::StopAfterIteration;
use geomopt_manifolds::Euclidean;
use geomopt_solvers::gradient_descent::{
    gradient_descent_with_state, DebugSpec, GradientDescentOptions, GradientDescentState,
    RecordSpec,
};

type M = Euclidean;

fn quadratic_problem() -> Problem<
    f64,
    M,
    GradientObjective<
        impl Fn(&M, &DVector<f64>) -> f64,
        impl Fn(&M, &DVector<f64>) -> DVector<f64>,
    >,
> {
    Problem::new(
        Euclidean::new(1).unwrap(),
        GradientObjective::new(
            |_m: &M, x: &DVector<f64>| 0.5 * x.norm_squared(),
            |_m: &M, x: &DVector<f64>| x.clone(),
        ),
    )
}

fn slow_state(manifold: &M, iterations: usize) -> GradientDescentState<f64, M> {
    GradientDescentState::new(manifold, DVector::from_vec(vec![1.0]))
        .with_stepsize(Box::new(ConstantStepsize::new(0.01).unwrap()))
        .with_stopping_criterion(StopAfterIteration::new(iterations).boxed())
}

#[test]
fn test_record_group_every_sixth_iteration_and_stop_hook() {
    let problem = quadratic_problem();
    let state = slow_state(problem.manifold(), 42);

    let entries: Vec<(&'static str, Box<dyn RecordAction<f64, M>>)> = vec![
        ("Iteration", Box::new(RecordIteration::new())),
        ("Cost", Box::new(RecordCost::new())),
        ("Gradient", Box::new(RecordGradient::new())),
    ];
    let group = RecordGroup::new(entries);
    let mut state = RecordSolverState::new(state)
        .with(Hook::Iteration, Box::new(RecordEvery::new(Box::new(group), 6)))
        .with(Hook::Stop, Box::new(RecordIteration::new()));

    solve(&problem, &mut state).unwrap();

    // Iterations 6, 12, 18, 24, 30, 36, 42 fired the grouped action.
    let recorded = state.recorded(Hook::Iteration);
    assert_eq!(recorded.len(), 7);
    let first = recorded[0].as_group().unwrap();
    assert_eq!(first[0].as_iteration(), Some(6));
    assert!(matches!(first[2], RecordedValue::Tangent(_)));
    let last = recorded[6].as_group().unwrap();
    assert_eq!(last[0].as_iteration(), Some(42));

    // The stop hook saw exactly the final iteration.
    let stop_record: Vec<usize> = state
        .recorded(Hook::Stop)
        .iter()
        .filter_map(|value| value.as_iteration())
        .collect();
    assert_eq!(stop_record, vec![42]);

    // Keyed retrieval reaches into the group.
    assert_eq!(state.recorded_for(Hook::Iteration, "Cost").unwrap().len(), 7);
}

#[test]
fn test_record_is_reproducible() {
    let run = || {
        let problem = quadratic_problem();
        let state = slow_state(problem.manifold(), 20);
        let mut state = RecordSolverState::new(state)
            .with(Hook::Iteration, Box::new(RecordCost::new()));
        solve(&problem, &mut state).unwrap();
        state
            .recorded(Hook::Iteration)
            .iter()
            .filter_map(|value| value.as_scalar())
            .collect::<Vec<f64>>()
    };

    let first = run();
    let second = run();
    assert_eq!(first.len(), 20);
    // Bitwise equality: same inputs, same records.
    assert_eq!(first, second);
}

#[test]
fn test_decorator_transparency() {
    let problem = quadratic_problem();
    let state = slow_state(problem.manifold(), 5);
    let mut decorated = RecordSolverState::new(DebugSolverState::new(state));

    // Reads forward to the innermost state.
    assert_eq!(decorated.iterate(), decorated.inner().inner().iterate());

    // Writes through the decorator are visible in the inner state.
    decorated.set_iterate(DVector::from_vec(vec![7.0]));
    assert_eq!(decorated.inner().inner().iterate()[0], 7.0);

    solve(&problem, &mut decorated).unwrap();
    assert_eq!(
        decorated.iterate(),
        decorated.inner().inner().iterate()
    );
    assert_eq!(decorated.stop_reason(), decorated.inner().inner().stop_reason());
}

#[test]
fn test_debug_decorator_writes_to_the_sink() {
    let problem = quadratic_problem();
    let state = slow_state(problem.manifold(), 3);
    let (sink, buffer) = DebugSink::buffer();

    let actions: Vec<Box<dyn DebugAction<f64, M>>> = vec![
        Box::new(DebugIteration::new(sink.clone())),
        Box::new(DebugCost::new(sink.clone())),
    ];
    let group = DebugGroup::new(actions, sink);
    let mut state = DebugSolverState::new(state).with(Hook::Iteration, Box::new(group));

    solve(&problem, &mut state).unwrap();

    let output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("# 1 f(x):"));
    assert!(lines[2].starts_with("# 3 f(x):"));
}

#[test]
fn test_options_pipeline_records_and_prints() {
    let (sink, buffer) = DebugSink::buffer();
    let options = GradientDescentOptions {
        stepsize: Some(Box::new(ConstantStepsize::new(0.5).unwrap())),
        stopping_criterion: Some(StopAfterIteration::new(12).boxed()),
        debug: vec![
            DebugSpec::Iteration,
            DebugSpec::Cost,
            DebugSpec::Every(4),
            DebugSpec::StoppingReason,
        ],
        record: vec![RecordSpec::Iteration, RecordSpec::Cost, RecordSpec::Every(3)],
        sink: Some(sink),
        ..Default::default()
    };

    let state = gradient_descent_with_state(
        Euclidean::new(1).unwrap(),
        |_m: &M, x: &DVector<f64>| 0.5 * x.norm_squared(),
        |_m: &M, x: &DVector<f64>| x.clone(),
        DVector::from_vec(vec![1.0]),
        options,
    )
    .unwrap();

    // Recording fired at iterations 3, 6, 9, 12.
    assert_eq!(state.recorded(Hook::Iteration).len(), 4);

    // The debug group printed every fourth iteration plus the reason line.
    let output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("# 4 "));
    assert!(lines[1].starts_with("# 8 "));
    assert!(lines[2].starts_with("# 12 "));
    assert!(lines[3].contains("maximal number of iterations"));
}

#[test]
fn test_options_cache_and_count_still_solve() {
    use geomopt_solvers::gradient_descent::CacheSpec;

    let options = GradientDescentOptions {
        stepsize: Some(Box::new(ConstantStepsize::new(0.5).unwrap())),
        stopping_criterion: Some(StopAfterIteration::new(30).boxed()),
        cache: Some(CacheSpec::Lru(8)),
        count: true,
        ..Default::default()
    };

    let state = gradient_descent_with_state(
        Euclidean::new(1).unwrap(),
        |_m: &M, x: &DVector<f64>| 0.5 * x.norm_squared(),
        |_m: &M, x: &DVector<f64>| x.clone(),
        DVector::from_vec(vec![1.0]),
        options,
    )
    .unwrap();

    assert!(geomopt_core::optimization::solver::get_solver_result(&state)[0].abs() < 1e-6);
}
