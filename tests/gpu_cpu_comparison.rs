mod common;

use gridmg::solver::cpu_reference::{self, HostGrid};
use gridmg::solver::gpu::GridBuffer;
use gridmg::{ManufacturedProblem, MultigridConfig, MultigridEngine, RectangularBoundary};

const TOLERANCE: f32 = 1e-4;

#[test]
fn test_smoother_matches_host() {
    let Some(context) = common::context() else {
        return;
    };
    let mut engine = MultigridEngine::with_defaults(context.clone()).expect("engine");
    let rhs_host = common::patterned_rhs(9, 7);
    let rhs = common::upload(&context, &rhs_host);

    for sweeps in [1u32, 4, 7] {
        let mut solution = GridBuffer::empty(&context, 9, 7).expect("solution");
        let mut scratch = GridBuffer::empty(&context, 9, 7).expect("scratch");
        engine
            .smoother_iterate(&mut solution, &mut scratch, &rhs, 0.8, sweeps)
            .expect("smooth");
        engine.wait().expect("wait");

        let expected = cpu_reference::smooth(&HostGrid::zeros(9, 7), &rhs_host, 0.8, sweeps);
        common::assert_close(&common::download(&context, &solution), &expected, TOLERANCE);
    }
}

#[test]
fn test_residual_matches_host() {
    let Some(context) = common::context() else {
        return;
    };
    let mut engine = MultigridEngine::with_defaults(context.clone()).expect("engine");
    let rhs_host = common::patterned_rhs(12, 9);
    let mut guess = HostGrid::zeros(12, 9);
    for (i, v) in guess.data.iter_mut().enumerate() {
        *v = ((i * 13) % 7) as f32 * 0.1;
    }

    let residual = engine
        .residual(&common::upload(&context, &guess), &common::upload(&context, &rhs_host))
        .expect("residual");
    let expected = cpu_reference::residual(&guess, &rhs_host);
    common::assert_close(&common::download(&context, &residual), &expected, TOLERANCE);
}

#[test]
fn test_v_cycles_match_host_on_uneven_grids() {
    let Some(context) = common::context() else {
        return;
    };
    for (width, height) in [(17usize, 9usize), (10, 10), (9, 4)] {
        let mut engine = MultigridEngine::with_defaults(context.clone()).expect("engine");
        let rhs_host = common::patterned_rhs(width, height);
        let rhs = common::upload(&context, &rhs_host);
        let initial = GridBuffer::empty(&context, width as u32, height as u32).expect("initial");

        let solution = engine.iterate(&initial, &rhs, 0.8, 3, 2, 2).expect("iterate");
        let mut expected = HostGrid::zeros(width, height);
        for _ in 0..2 {
            expected = cpu_reference::v_cycle(&expected, &rhs_host, 0.8, 3, 2, engine.config());
        }
        common::assert_close(&common::download(&context, &solution), &expected, TOLERANCE);
    }
}

#[test]
fn test_fmg_matches_host() {
    let Some(context) = common::context() else {
        return;
    };
    let config = MultigridConfig::default().with_coarse_sweeps(20);
    let mut engine =
        MultigridEngine::new(context.clone(), RectangularBoundary, config).expect("engine");
    let problem = ManufacturedProblem::polynomial();
    let rhs_host = problem.rhs(17, 17);
    let rhs = GridBuffer::from_host(&context, &rhs_host).expect("rhs");

    let solution = engine.fmg(&rhs, 0.8, 2, 2, 2).expect("fmg");
    let expected = cpu_reference::fmg(&HostGrid::from_matrix(&rhs_host), 0.8, 2, 2, 2, &config);
    common::assert_close(&common::download(&context, &solution), &expected, TOLERANCE);
}

#[test]
fn test_single_level_grid() {
    let Some(context) = common::context() else {
        return;
    };
    let mut engine = MultigridEngine::with_defaults(context.clone()).expect("engine");
    let rhs_host = common::patterned_rhs(4, 4);
    let rhs = common::upload(&context, &rhs_host);
    let initial = GridBuffer::empty(&context, 4, 4).expect("initial");

    let solution = engine.iterate(&initial, &rhs, 0.8, 1, 1, 1).expect("iterate");
    assert_eq!(engine.hierarchy().map(|h| h.num_levels()), Some(1));
    let expected = cpu_reference::smooth(
        &HostGrid::zeros(4, 4),
        &rhs_host,
        0.8,
        1 + engine.config().coarse_sweeps + 1,
    );
    common::assert_close(&common::download(&context, &solution), &expected, TOLERANCE);
}
