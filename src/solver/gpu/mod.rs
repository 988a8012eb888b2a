pub mod boundary;
pub mod context;
pub mod dispatch_counter;
pub mod grid_buffer;
pub mod hierarchy;
pub mod kernels;
pub mod launch;
pub mod multigrid_solver;

pub use boundary::{BoundaryPartition, BoundaryStrategy, IndexRange, RangeQueue, RectangularBoundary};
pub use context::GpuContext;
pub use dispatch_counter::{categories, DispatchCounter, DispatchStats};
pub use grid_buffer::GridBuffer;
pub use hierarchy::{coarsen, level_dims, GridHierarchy, GridLevel};
pub use kernels::{GridParams, KernelSet, MULTIGRID_WGSL};
pub use multigrid_solver::{EngineState, MultigridEngine};
