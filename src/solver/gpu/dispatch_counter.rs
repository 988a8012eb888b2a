//! Dispatch Counter
//!
//! Counts compute launches per kernel and per category for one engine. Tests use
//! it to check cycle bookkeeping; the engine logs a summary after each solve.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Categories for dispatch counting
pub mod categories {
    pub const RELAXATION: &str = "Relaxation";
    pub const RESIDUAL: &str = "Residual";
    pub const TRANSFER: &str = "Grid Transfer";
    pub const BOUNDARY_CONDITIONS: &str = "Boundary Conditions";
}

#[derive(Debug, Default)]
pub struct DispatchCounter {
    total_dispatches: AtomicU64,
    by_category: Mutex<HashMap<&'static str, u64>>,
    by_kernel: Mutex<HashMap<&'static str, u64>>,
}

/// Snapshot of a [`DispatchCounter`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub total_dispatches: u64,
    pub by_category: HashMap<&'static str, u64>,
    pub by_kernel: HashMap<&'static str, u64>,
}

impl DispatchStats {
    pub fn kernel(&self, name: &str) -> u64 {
        self.by_kernel.get(name).copied().unwrap_or(0)
    }

    pub fn category(&self, name: &str) -> u64 {
        self.by_category.get(name).copied().unwrap_or(0)
    }
}

impl DispatchCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, category: &'static str, kernel: &'static str) {
        self.total_dispatches.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_cat) = self.by_category.lock() {
            *by_cat.entry(category).or_insert(0) += 1;
        }
        if let Ok(mut by_ker) = self.by_kernel.lock() {
            *by_ker.entry(kernel).or_insert(0) += 1;
        }
    }

    pub fn reset(&self) {
        self.total_dispatches.store(0, Ordering::Relaxed);
        if let Ok(mut by_cat) = self.by_category.lock() {
            by_cat.clear();
        }
        if let Ok(mut by_ker) = self.by_kernel.lock() {
            by_ker.clear();
        }
    }

    pub fn get_stats(&self) -> DispatchStats {
        DispatchStats {
            total_dispatches: self.total_dispatches.load(Ordering::Relaxed),
            by_category: self
                .by_category
                .lock()
                .map(|m| m.clone())
                .unwrap_or_default(),
            by_kernel: self
                .by_kernel
                .lock()
                .map(|m| m.clone())
                .unwrap_or_default(),
        }
    }

    pub fn log_summary(&self, label: &str) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        let stats = self.get_stats();
        let mut categories: Vec<_> = stats.by_category.iter().collect();
        categories.sort_by(|a, b| b.1.cmp(a.1));
        log::debug!("{label}: {} dispatches", stats.total_dispatches);
        for (category, count) in categories {
            log::debug!("  {:<24} {:>8}", category, count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_by_kernel_and_category() {
        let counter = DispatchCounter::new();
        counter.record(categories::RELAXATION, "relax_interior");
        counter.record(categories::RELAXATION, "relax_interior");
        counter.record(categories::BOUNDARY_CONDITIONS, "dirichlet_border");

        let stats = counter.get_stats();
        assert_eq!(stats.total_dispatches, 3);
        assert_eq!(stats.kernel("relax_interior"), 2);
        assert_eq!(stats.category(categories::BOUNDARY_CONDITIONS), 1);
        assert_eq!(stats.kernel("restrict_interior"), 0);

        counter.reset();
        assert_eq!(counter.get_stats(), DispatchStats::default());
    }
}
