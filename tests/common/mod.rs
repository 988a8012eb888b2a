#![allow(dead_code)]

use gridmg::solver::cpu_reference::HostGrid;
use gridmg::solver::gpu::{GpuContext, GridBuffer};
use std::sync::Arc;

/// Opt-out for machines without a GPU adapter.
pub const SKIP_GPU_ENV: &str = "GRIDMG_SKIP_GPU_TESTS";

/// Shared device for a test. A missing adapter fails the test unless
/// `GRIDMG_SKIP_GPU_TESTS` is set, in which case `None` skips it.
pub fn context() -> Option<Arc<GpuContext>> {
    let _ = env_logger::builder().is_test(true).try_init();
    match pollster::block_on(GpuContext::new()) {
        Ok(context) => Some(Arc::new(context)),
        Err(err) if std::env::var_os(SKIP_GPU_ENV).is_some() => {
            eprintln!("skipping GPU test ({SKIP_GPU_ENV} is set): {err}");
            None
        }
        Err(err) => panic!("no usable GPU adapter: {err}; set {SKIP_GPU_ENV}=1 to skip"),
    }
}

/// Deterministic, non-smooth interior values with a zero border.
pub fn patterned_rhs(width: usize, height: usize) -> HostGrid {
    let mut grid = HostGrid::zeros(width, height);
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            grid.data[y * width + x] = ((x * 7 + y * 3) % 5) as f32 * 0.01 - 0.02;
        }
    }
    grid
}

pub fn upload(context: &GpuContext, grid: &HostGrid) -> GridBuffer {
    GridBuffer::from_row_major(context, grid.width as u32, grid.height as u32, &grid.data)
        .expect("upload")
}

pub fn download(context: &GpuContext, buffer: &GridBuffer) -> HostGrid {
    let data = buffer.to_row_major(context).expect("download");
    HostGrid::from_row_major(buffer.width() as usize, buffer.height() as usize, data)
        .expect("host grid")
}

pub fn assert_close(actual: &HostGrid, expected: &HostGrid, tolerance: f32) {
    assert_eq!(actual.dims(), expected.dims());
    let scale = expected.max_abs().max(1.0) as f32;
    for (i, (a, e)) in actual.data.iter().zip(&expected.data).enumerate() {
        let (x, y) = (i % actual.width, i / actual.width);
        assert!(
            (a - e).abs() <= tolerance * scale,
            "mismatch at ({x}, {y}): got {a}, expected {e}"
        );
    }
}
