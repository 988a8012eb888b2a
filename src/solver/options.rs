use crate::solver::error::{SolverError, SolverResult};

/// Smallest grid extent the solver accepts in either direction.
pub const MIN_GRID_DIM: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultigridConfig {
    /// Coarsening stops before a level whose width or height would fall below this.
    pub min_coarse_dim: u32,
    /// Upper bound on the number of levels, finest included.
    pub max_levels: usize,
    /// Relaxation sweeps used as the coarsest-level solve.
    pub coarse_sweeps: u32,
}

impl Default for MultigridConfig {
    fn default() -> Self {
        Self {
            min_coarse_dim: 3,
            max_levels: 16,
            coarse_sweeps: 50,
        }
    }
}

impl MultigridConfig {
    pub fn with_min_coarse_dim(mut self, dim: u32) -> Self {
        self.min_coarse_dim = dim;
        self
    }

    pub fn with_max_levels(mut self, levels: usize) -> Self {
        self.max_levels = levels;
        self
    }

    pub fn with_coarse_sweeps(mut self, sweeps: u32) -> Self {
        self.coarse_sweeps = sweeps;
        self
    }

    /// Defaults overridden by `GRIDMG_*` environment variables, for experiments
    /// without plumbing flags through the driver.
    pub fn from_env() -> Self {
        fn get_u32(name: &str) -> Option<u32> {
            std::env::var(name)
                .ok()
                .and_then(|s| s.trim().parse::<u32>().ok())
        }

        let mut cfg = Self::default();
        if let Some(v) = get_u32("GRIDMG_MIN_COARSE_DIM") {
            cfg.min_coarse_dim = v;
        }
        if let Some(v) = get_u32("GRIDMG_MAX_LEVELS") {
            cfg.max_levels = v as usize;
        }
        if let Some(v) = get_u32("GRIDMG_COARSE_SWEEPS") {
            cfg.coarse_sweeps = v;
        }
        cfg
    }

    pub fn validate(&self) -> SolverResult<()> {
        if self.min_coarse_dim < MIN_GRID_DIM {
            return Err(SolverError::configuration(
                "min_coarse_dim",
                format!("must be at least {MIN_GRID_DIM}, got {}", self.min_coarse_dim),
            ));
        }
        if self.max_levels == 0 {
            return Err(SolverError::configuration(
                "max_levels",
                "at least one level is required",
            ));
        }
        if self.coarse_sweeps == 0 {
            return Err(SolverError::configuration(
                "coarse_sweeps",
                "must be positive",
            ));
        }
        Ok(())
    }
}

pub(crate) fn check_omega(omega: f32) -> SolverResult<()> {
    if !omega.is_finite() || omega <= 0.0 {
        return Err(SolverError::configuration(
            "omega",
            format!("must be a positive finite number, got {omega}"),
        ));
    }
    Ok(())
}

pub(crate) fn check_count(parameter: &'static str, value: u32) -> SolverResult<()> {
    if value == 0 {
        return Err(SolverError::configuration(parameter, "must be positive"));
    }
    Ok(())
}

pub(crate) fn check_dims(width: u32, height: u32) -> SolverResult<()> {
    if width < MIN_GRID_DIM || height < MIN_GRID_DIM {
        return Err(SolverError::configuration(
            "dimensions",
            format!("grid must be at least {MIN_GRID_DIM}x{MIN_GRID_DIM}, got {width}x{height}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = MultigridConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.min_coarse_dim, 3);
        assert_eq!(cfg.coarse_sweeps, 50);
    }

    #[test]
    fn validate_rejects_degenerate_values() {
        let bad = MultigridConfig::default().with_min_coarse_dim(1);
        assert!(matches!(
            bad.validate(),
            Err(SolverError::Configuration { parameter: "min_coarse_dim", .. })
        ));
        let bad = MultigridConfig::default().with_max_levels(0);
        assert!(bad.validate().is_err());
        let bad = MultigridConfig::default().with_coarse_sweeps(0);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn parameter_checks() {
        assert!(check_omega(1.0).is_ok());
        assert!(check_omega(1.9).is_ok());
        assert!(check_omega(0.0).is_err());
        assert!(check_omega(-0.5).is_err());
        assert!(check_omega(f32::NAN).is_err());
        assert!(check_count("sweeps", 0).is_err());
        assert!(check_count("sweeps", 3).is_ok());
        assert!(check_dims(2, 2).is_ok());
        assert!(check_dims(1, 9).is_err());
    }
}
