//! Host implementation of the multigrid stencils.
//!
//! Mirrors the device kernels point for point (same operators, same border
//! handling, same level shapes) so device results can be checked against it.
//! Rows are processed in parallel with rayon.

use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::solver::error::{SolverError, SolverResult};
use crate::solver::gpu::hierarchy::level_dims;
use crate::solver::gpu::kernels::{BLACK, RED, RESTRICT_SCALE};
use crate::solver::options::MultigridConfig;

/// Row-major `height x width` grid on the host.
#[derive(Debug, Clone, PartialEq)]
pub struct HostGrid {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl HostGrid {
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub fn from_row_major(width: usize, height: usize, data: Vec<f32>) -> SolverResult<Self> {
        if data.len() != width * height {
            return Err(SolverError::configuration(
                "data",
                format!(
                    "expected {} values for a {width}x{height} grid, got {}",
                    width * height,
                    data.len()
                ),
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_matrix(matrix: &DMatrix<f32>) -> Self {
        let (height, width) = matrix.shape();
        // column-major storage of the transpose is the row-major order
        let data = matrix.transpose().as_slice().to_vec();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn to_matrix(&self) -> DMatrix<f32> {
        DMatrix::from_row_slice(self.height, self.width, &self.data)
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn is_border(&self, x: usize, y: usize) -> bool {
        x == 0 || y == 0 || x + 1 == self.width || y + 1 == self.height
    }

    pub fn l2_norm(&self) -> f64 {
        self.data
            .iter()
            .map(|&v| (v as f64) * (v as f64))
            .sum::<f64>()
            .sqrt()
    }

    pub fn max_abs(&self) -> f64 {
        self.data
            .iter()
            .fold(0.0f64, |acc, &v| acc.max((v as f64).abs()))
    }
}

fn neighbour_sum(u: &HostGrid, x: usize, y: usize) -> f32 {
    u.at(x - 1, y) + u.at(x + 1, y) + u.at(x, y - 1) + u.at(x, y + 1)
}

/// Half of a red-black SOR sweep: interior points with `(x + y) % 2 == colour`
/// are relaxed, the others copied. The border takes the rhs values.
pub fn relax_colour(u: &HostGrid, rhs: &HostGrid, omega: f32, colour: u32) -> HostGrid {
    let mut out = HostGrid::zeros(u.width, u.height);
    let width = u.width;
    out.data
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, value) in row.iter_mut().enumerate() {
                *value = if u.is_border(x, y) {
                    rhs.at(x, y)
                } else if (x + y) % 2 != colour as usize {
                    u.at(x, y)
                } else {
                    let gauss_seidel = 0.25 * (neighbour_sum(u, x, y) - rhs.at(x, y));
                    (1.0 - omega) * u.at(x, y) + omega * gauss_seidel
                };
            }
        });
    out
}

/// One red-black SOR sweep, red points first.
pub fn relax(u: &HostGrid, rhs: &HostGrid, omega: f32) -> HostGrid {
    let red = relax_colour(u, rhs, omega, RED);
    relax_colour(&red, rhs, omega, BLACK)
}

pub fn smooth(u: &HostGrid, rhs: &HostGrid, omega: f32, sweeps: u32) -> HostGrid {
    let mut current = u.clone();
    for _ in 0..sweeps {
        current = relax(&current, rhs, omega);
    }
    current
}

/// `rhs - A u` on the interior, zero on the border.
pub fn residual(u: &HostGrid, rhs: &HostGrid) -> HostGrid {
    let mut out = HostGrid::zeros(u.width, u.height);
    let width = u.width;
    out.data
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, value) in row.iter_mut().enumerate() {
                if !u.is_border(x, y) {
                    *value = rhs.at(x, y) - (neighbour_sum(u, x, y) - 4.0 * u.at(x, y));
                }
            }
        });
    out
}

/// What a restriction writes on the coarse border.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoarseBorder {
    /// The coinciding fine point, for right-hand sides carrying Dirichlet values.
    Inject,
    /// Zero, for residuals restricted into a correction problem.
    Zero,
}

/// Full weighting onto a `coarse_width x coarse_height` grid, scaled for the
/// doubled spacing.
pub fn restrict(
    fine: &HostGrid,
    coarse_width: usize,
    coarse_height: usize,
    border: CoarseBorder,
) -> HostGrid {
    let mut out = HostGrid::zeros(coarse_width, coarse_height);
    out.data
        .par_chunks_mut(coarse_width)
        .enumerate()
        .for_each(|(cy, row)| {
            for (cx, value) in row.iter_mut().enumerate() {
                let on_border =
                    cx == 0 || cy == 0 || cx + 1 == coarse_width || cy + 1 == coarse_height;
                if on_border {
                    if border == CoarseBorder::Inject {
                        let fx = (2 * cx).min(fine.width - 1);
                        let fy = (2 * cy).min(fine.height - 1);
                        *value = fine.at(fx, fy);
                    }
                } else {
                    let (x, y) = (2 * cx, 2 * cy);
                    let edges = neighbour_sum(fine, x, y);
                    let corners = fine.at(x - 1, y - 1)
                        + fine.at(x + 1, y - 1)
                        + fine.at(x - 1, y + 1)
                        + fine.at(x + 1, y + 1);
                    let weighted = (4.0 * fine.at(x, y) + 2.0 * edges + corners) / 16.0;
                    *value = RESTRICT_SCALE * weighted;
                }
            }
        });
    out
}

/// Adds the bilinear interpolation of `coarse` to the interior of `fine`; the
/// border takes the values of `rhs`.
pub fn prolong_add(fine: &HostGrid, coarse: &HostGrid, rhs: &HostGrid) -> HostGrid {
    let mut out = fine.clone();
    let width = fine.width;
    out.data
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, value) in row.iter_mut().enumerate() {
                if fine.is_border(x, y) {
                    *value = rhs.at(x, y);
                    continue;
                }
                let (x0, y0) = (x / 2, y / 2);
                let x1 = ((x + 1) / 2).min(coarse.width - 1);
                let y1 = ((y + 1) / 2).min(coarse.height - 1);
                *value += 0.25
                    * (coarse.at(x0, y0) + coarse.at(x1, y0) + coarse.at(x0, y1) + coarse.at(x1, y1));
            }
        });
    out
}

/// Recursive V-cycle over the same level shapes the device hierarchy uses.
pub fn v_cycle(
    u: &HostGrid,
    rhs: &HostGrid,
    omega: f32,
    pre: u32,
    post: u32,
    config: &MultigridConfig,
) -> HostGrid {
    let dims = host_level_dims(u, config);
    cycle_from(&dims, u, rhs, omega, pre, post, config.coarse_sweeps)
}

/// Full multigrid from a zero guess, level shapes as in [`v_cycle`].
pub fn fmg(
    rhs: &HostGrid,
    omega: f32,
    pre: u32,
    post: u32,
    cycles: u32,
    config: &MultigridConfig,
) -> HostGrid {
    let dims = host_level_dims(rhs, config);
    let mut rhs_levels = vec![rhs.clone()];
    for &(cw, ch) in &dims[1..] {
        let next = restrict(&rhs_levels[rhs_levels.len() - 1], cw, ch, CoarseBorder::Inject);
        rhs_levels.push(next);
    }

    let coarsest = dims.len() - 1;
    let (cw, ch) = dims[coarsest];
    let mut u = smooth(
        &HostGrid::zeros(cw, ch),
        &rhs_levels[coarsest],
        omega,
        config.coarse_sweeps,
    );
    for l in (0..coarsest).rev() {
        let (w, h) = dims[l];
        let mut fine = prolong_add(&HostGrid::zeros(w, h), &u, &rhs_levels[l]);
        for _ in 0..cycles {
            fine = cycle_from(
                &dims[l..],
                &fine,
                &rhs_levels[l],
                omega,
                pre,
                post,
                config.coarse_sweeps,
            );
        }
        u = fine;
    }
    u
}

fn host_level_dims(grid: &HostGrid, config: &MultigridConfig) -> Vec<(usize, usize)> {
    level_dims(grid.width as u32, grid.height as u32, config)
        .into_iter()
        .map(|(w, h)| (w as usize, h as usize))
        .collect()
}

fn cycle_from(
    dims: &[(usize, usize)],
    u: &HostGrid,
    rhs: &HostGrid,
    omega: f32,
    pre: u32,
    post: u32,
    coarse_sweeps: u32,
) -> HostGrid {
    if dims.len() == 1 {
        return smooth(u, rhs, omega, pre + coarse_sweeps + post);
    }
    let smoothed = smooth(u, rhs, omega, pre);
    let r = residual(&smoothed, rhs);
    let (cw, ch) = dims[1];
    let coarse_rhs = restrict(&r, cw, ch, CoarseBorder::Zero);
    let coarse = cycle_from(
        &dims[1..],
        &HostGrid::zeros(cw, ch),
        &coarse_rhs,
        omega,
        pre,
        post,
        coarse_sweeps,
    );
    let corrected = prolong_add(&smoothed, &coarse, rhs);
    smooth(&corrected, rhs, omega, post)
}
