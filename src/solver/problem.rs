//! Manufactured Poisson problems on the unit square.
//!
//! Point `(x, y)` of a `width x height` grid sits at
//! `(x / (width - 1), y / (height - 1))`. The rhs carries `h^2 f` on the
//! interior and the Dirichlet value on the border, the layout the solver
//! expects.

use nalgebra::DMatrix;

pub type PointFn = fn(f32, f32) -> f32;

#[derive(Debug, Clone, Copy)]
pub struct ManufacturedProblem {
    /// `f` in `lap(u) = f`.
    pub source: PointFn,
    /// Dirichlet border values.
    pub border: PointFn,
    /// Exact solution, when known.
    pub solution: Option<PointFn>,
}

pub fn zero(_x: f32, _y: f32) -> f32 {
    0.0
}

/// `u = (x^2 - x^4)(y^4 - y^2)`, zero on the border of the unit square.
pub fn polynomial_solution(x: f32, y: f32) -> f32 {
    (x * x - x * x * x * x) * (y * y * y * y - y * y)
}

/// Laplacian of [`polynomial_solution`].
pub fn polynomial_source(x: f32, y: f32) -> f32 {
    -2.0 * ((1.0 - 6.0 * x * x) * y * y * (1.0 - y * y) + (1.0 - 6.0 * y * y) * x * x * (1.0 - x * x))
}

fn coordinate(i: usize, n: usize) -> f32 {
    i as f32 / (n - 1) as f32
}

impl ManufacturedProblem {
    pub fn new(source: PointFn, border: PointFn, solution: Option<PointFn>) -> Self {
        Self {
            source,
            border,
            solution,
        }
    }

    /// The polynomial test problem with a zero border.
    pub fn polynomial() -> Self {
        Self::new(polynomial_source, zero, Some(polynomial_solution))
    }

    /// Right-hand side for a `width x height` grid (`height` rows). The
    /// interior is scaled by the x spacing squared; grids with unequal spacing
    /// are accepted with a warning.
    pub fn rhs(&self, width: usize, height: usize) -> DMatrix<f32> {
        let dx = 1.0 / (width - 1) as f32;
        let dy = 1.0 / (height - 1) as f32;
        if dx != dy {
            log::warn!("grid spacing differs: dx={dx}, dy={dy}");
        }
        DMatrix::from_fn(height, width, |row, col| {
            let (x, y) = (coordinate(col, width), coordinate(row, height));
            if col == 0 || row == 0 || col + 1 == width || row + 1 == height {
                (self.border)(x, y)
            } else {
                (self.source)(x, y) * dx * dx
            }
        })
    }

    /// The exact solution sampled on the grid.
    pub fn exact(&self, width: usize, height: usize) -> Option<DMatrix<f32>> {
        let solution = self.solution?;
        Some(DMatrix::from_fn(height, width, |row, col| {
            solution(coordinate(col, width), coordinate(row, height))
        }))
    }

    fn errors<'a>(&self, answer: &'a DMatrix<f32>) -> Option<impl Iterator<Item = f64> + 'a> {
        let solution = self.solution?;
        let (height, width) = answer.shape();
        Some((0..height).flat_map(move |row| {
            (0..width).map(move |col| {
                let exact = solution(coordinate(col, width), coordinate(row, height)) as f64;
                exact - answer[(row, col)] as f64
            })
        }))
    }

    /// Unscaled L2 norm of `exact - answer` over every grid point.
    pub fn l2_error(&self, answer: &DMatrix<f32>) -> Option<f64> {
        self.errors(answer)
            .map(|errors| errors.map(|e| e * e).sum::<f64>().sqrt())
    }

    /// Largest pointwise `|exact - answer|`.
    pub fn linf_error(&self, answer: &DMatrix<f32>) -> Option<f64> {
        self.errors(answer)
            .map(|errors| errors.fold(0.0f64, |acc, e| acc.max(e.abs())))
    }

    /// L2 norm of the exact solution on a `width x height` grid.
    pub fn l2_norm(&self, width: usize, height: usize) -> Option<f64> {
        self.exact(width, height).map(|exact| {
            exact
                .iter()
                .map(|&v| (v as f64) * (v as f64))
                .sum::<f64>()
                .sqrt()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_is_laplacian_of_solution() {
        let h = 1e-2f64;
        for &(x, y) in &[(0.3f64, 0.6f64), (0.5, 0.5), (0.8, 0.1)] {
            let u = |x: f64, y: f64| polynomial_solution(x as f32, y as f32) as f64;
            let lap = (u(x + h, y) + u(x - h, y) + u(x, y + h) + u(x, y - h) - 4.0 * u(x, y)) / (h * h);
            let f = polynomial_source(x as f32, y as f32) as f64;
            assert!((lap - f).abs() < 1e-2, "({x}, {y}): {lap} vs {f}");
        }
    }

    #[test]
    fn rhs_layout() {
        let problem = ManufacturedProblem::polynomial();
        let rhs = problem.rhs(9, 9);
        assert_eq!(rhs.shape(), (9, 9));
        for i in 0..9 {
            assert_eq!(rhs[(0, i)], 0.0);
            assert_eq!(rhs[(8, i)], 0.0);
            assert_eq!(rhs[(i, 0)], 0.0);
            assert_eq!(rhs[(i, 8)], 0.0);
        }
        let expected = polynomial_source(0.25, 0.5) / 64.0;
        assert!((rhs[(4, 2)] - expected).abs() < 1e-7);
    }

    #[test]
    fn rows_are_height() {
        let problem = ManufacturedProblem::polynomial();
        assert_eq!(problem.rhs(9, 5).shape(), (5, 9));
        assert_eq!(problem.exact(9, 5).map(|m| m.shape()), Some((5, 9)));
    }

    #[test]
    fn exact_answer_has_no_error() {
        let problem = ManufacturedProblem::polynomial();
        let exact = problem.exact(17, 17).unwrap();
        assert_eq!(problem.l2_error(&exact), Some(0.0));
        assert_eq!(problem.linf_error(&exact), Some(0.0));
    }

    #[test]
    fn error_of_zero_answer_is_solution_norm() {
        let problem = ManufacturedProblem::polynomial();
        let zero = DMatrix::zeros(9, 9);
        let norm = problem.l2_norm(9, 9).unwrap();
        assert!((problem.l2_error(&zero).unwrap() - norm).abs() < 1e-12);

        let exact = problem.exact(9, 9).unwrap();
        let peak = exact.iter().fold(0.0f64, |acc, &v| acc.max((v as f64).abs()));
        assert!((problem.linf_error(&zero).unwrap() - peak).abs() < 1e-12);
    }

    #[test]
    fn unknown_solution_has_no_error() {
        let problem = ManufacturedProblem::new(polynomial_source, zero, None);
        assert!(problem.exact(5, 5).is_none());
        assert!(problem.l2_error(&DMatrix::zeros(5, 5)).is_none());
        assert!(problem.linf_error(&DMatrix::zeros(5, 5)).is_none());
    }
}
