pub mod cpu_reference;
pub mod error;
pub mod gpu;
pub mod options;
pub mod problem;

pub use error::{DeviceErrorCode, SolverError, SolverResult};
pub use options::MultigridConfig;
pub use problem::ManufacturedProblem;
