pub mod solver;

pub use solver::gpu::{
    BoundaryStrategy, EngineState, GpuContext, GridBuffer, MultigridEngine, RectangularBoundary,
};
pub use solver::{ManufacturedProblem, MultigridConfig, SolverError, SolverResult};
