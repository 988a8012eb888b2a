use std::sync::Arc;

use wgpu::util::DeviceExt;

use crate::solver::error::{SolverError, SolverResult};
use crate::solver::gpu::boundary::{BoundaryStrategy, RectangularBoundary};
use crate::solver::gpu::context::GpuContext;
use crate::solver::gpu::dispatch_counter::{DispatchCounter, DispatchStats};
use crate::solver::gpu::grid_buffer::GridBuffer;
use crate::solver::gpu::hierarchy::{GridHierarchy, GridLevel};
use crate::solver::gpu::kernels::{GridParams, KernelPipeline, KernelSet, Launch, BLACK, RED};
use crate::solver::gpu::launch::{PassQueue, RangeBindings};
use crate::solver::options::{check_count, check_dims, check_omega, MultigridConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    HierarchyBuilt,
    /// Work has been submitted and not yet waited on.
    Solving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RestrictSource {
    Residual,
    Rhs,
}

/// Records one solve into a single compute pass.
struct CycleEncoder<'a, B: BoundaryStrategy> {
    queue: PassQueue<'a>,
    kernels: &'a KernelSet,
    boundary: &'a B,
}

impl<'a, B: BoundaryStrategy> CycleEncoder<'a, B> {
    fn begin(
        encoder: &'a mut wgpu::CommandEncoder,
        label: &str,
        device: &'a wgpu::Device,
        kernels: &'a KernelSet,
        boundary: &'a B,
        ranges: &'a mut RangeBindings,
        counter: &'a DispatchCounter,
    ) -> Self {
        let pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        Self {
            queue: PassQueue::new(pass, device, &kernels.bgl_range, ranges, counter),
            kernels,
            boundary,
        }
    }

    fn apply(
        &mut self,
        interior: &KernelPipeline,
        border: &KernelPipeline,
        fields: &wgpu::BindGroup,
        dims: (u32, u32),
    ) {
        self.boundary.dispatch(
            &mut self.queue,
            &Launch::new(interior, fields),
            &Launch::new(border, fields),
            dims.0,
            dims.1,
        );
    }

    /// `sweeps` red-black sweeps. `pair[0]` relaxes the red points into the
    /// partner buffer and `pair[1]` relaxes the black points back, so every
    /// sweep ends in the buffer it started from.
    fn sweeps(&mut self, pair: &[wgpu::BindGroup; 2], dims: (u32, u32), sweeps: u32) {
        let kernels = self.kernels;
        for _ in 0..sweeps {
            for half in pair {
                self.apply(&kernels.relax, &kernels.dirichlet_border, half, dims);
            }
        }
    }

    fn smooth(&mut self, level: &GridLevel, sweeps: u32) {
        self.sweeps(&level.bindings.relax, level.dims(), sweeps);
    }

    fn residual(&mut self, level: &GridLevel) {
        let kernels = self.kernels;
        self.apply(
            &kernels.residual,
            &kernels.zero_border,
            &level.bindings.residual,
            level.dims(),
        );
    }

    /// A restricted residual is a correction rhs, whose border is homogeneous.
    /// A restricted rhs keeps the injected Dirichlet values.
    fn restrict(&mut self, hierarchy: &GridHierarchy, fine: usize, source: RestrictSource) {
        let kernels = self.kernels;
        let transfer = hierarchy.transfer(fine);
        let (fields, border) = match source {
            RestrictSource::Residual => (&transfer.restrict_residual, &kernels.zero_border),
            RestrictSource::Rhs => (&transfer.restrict_rhs, &kernels.inject_border),
        };
        self.apply(
            &kernels.restrict,
            border,
            fields,
            hierarchy.level(fine + 1).dims(),
        );
    }

    fn clear_solution(&mut self, level: &GridLevel) {
        let kernels = self.kernels;
        self.apply(
            &kernels.zero_border,
            &kernels.zero_border,
            &level.bindings.clear_solution,
            level.dims(),
        );
    }

    fn prolong_add(&mut self, hierarchy: &GridHierarchy, fine: usize) {
        let kernels = self.kernels;
        self.apply(
            &kernels.prolong,
            &kernels.dirichlet_border,
            &hierarchy.transfer(fine).prolong,
            hierarchy.level(fine).dims(),
        );
    }

    /// One V-cycle whose finest level is `top`.
    fn v_cycle(
        &mut self,
        hierarchy: &GridHierarchy,
        top: usize,
        pre: u32,
        post: u32,
        coarse_sweeps: u32,
    ) {
        let coarsest = hierarchy.coarsest_index();

        for l in top..coarsest {
            let level = hierarchy.level(l);
            self.queue.push_debug_group(&format!("descend L{l}"));
            self.smooth(level, pre);
            self.residual(level);
            self.restrict(hierarchy, l, RestrictSource::Residual);
            self.clear_solution(hierarchy.level(l + 1));
            self.queue.pop_debug_group();
        }

        self.queue.push_debug_group("coarsest");
        self.smooth(hierarchy.level(coarsest), pre + coarse_sweeps + post);
        self.queue.pop_debug_group();

        for l in (top..coarsest).rev() {
            self.queue.push_debug_group(&format!("ascend L{l}"));
            self.prolong_add(hierarchy, l);
            self.smooth(hierarchy.level(l), post);
            self.queue.pop_debug_group();
        }
    }
}

/// Geometric multigrid engine for the 2-D Poisson problem.
///
/// Every public solve encodes its launches into one command encoder and
/// submits once; results are buffers the caller can read back with
/// [`GridBuffer::to_host`] or hand to the next solve. Work submitted by one
/// call is ordered before work submitted by the next.
pub struct MultigridEngine<B: BoundaryStrategy = RectangularBoundary> {
    context: Arc<GpuContext>,
    kernels: KernelSet,
    boundary: B,
    config: MultigridConfig,
    hierarchy: Option<GridHierarchy>,
    ranges: RangeBindings,
    dispatches: DispatchCounter,
    state: EngineState,
}

impl MultigridEngine<RectangularBoundary> {
    pub fn with_defaults(context: Arc<GpuContext>) -> SolverResult<Self> {
        Self::new(context, RectangularBoundary, MultigridConfig::default())
    }
}

impl<B: BoundaryStrategy> MultigridEngine<B> {
    pub fn new(context: Arc<GpuContext>, boundary: B, config: MultigridConfig) -> SolverResult<Self> {
        let kernels = KernelSet::builtin(&context)?;
        Self::with_kernels(context, kernels, boundary, config)
    }

    pub fn with_kernels(
        context: Arc<GpuContext>,
        kernels: KernelSet,
        boundary: B,
        config: MultigridConfig,
    ) -> SolverResult<Self> {
        config.validate()?;
        log::debug!(
            "multigrid engine: boundary={}, {:?}",
            boundary.name(),
            config
        );
        Ok(Self {
            context,
            kernels,
            boundary,
            config,
            hierarchy: None,
            ranges: RangeBindings::new(),
            dispatches: DispatchCounter::new(),
            state: EngineState::Idle,
        })
    }

    pub fn context(&self) -> &Arc<GpuContext> {
        &self.context
    }

    pub fn config(&self) -> &MultigridConfig {
        &self.config
    }

    pub fn boundary(&self) -> &B {
        &self.boundary
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn hierarchy(&self) -> Option<&GridHierarchy> {
        self.hierarchy.as_ref()
    }

    /// Number of launch ranges with a cached uniform bind group.
    pub fn cached_ranges(&self) -> usize {
        self.ranges.len()
    }

    pub fn dispatch_stats(&self) -> DispatchStats {
        self.dispatches.get_stats()
    }

    pub fn reset_dispatch_stats(&self) {
        self.dispatches.reset();
    }

    /// Builds the hierarchy for `width x height`, replacing any existing one.
    pub fn prepare(&mut self, width: u32, height: u32) -> SolverResult<()> {
        check_dims(width, height)?;
        self.hierarchy = None;
        self.ranges.clear();
        match GridHierarchy::build(&self.context, &self.kernels, width, height, &self.config) {
            Ok(hierarchy) => {
                self.hierarchy = Some(hierarchy);
                if self.state == EngineState::Idle {
                    self.state = EngineState::HierarchyBuilt;
                }
                Ok(())
            }
            Err(err) => Err(self.abandon(err)),
        }
    }

    /// Blocks until all submitted work has finished.
    pub fn wait(&mut self) -> SolverResult<()> {
        match self.context.wait() {
            Ok(()) => {
                self.state = if self.hierarchy.is_some() {
                    EngineState::HierarchyBuilt
                } else {
                    EngineState::Idle
                };
                Ok(())
            }
            Err(err) => Err(self.abandon(err)),
        }
    }

    /// Runs `sweeps` red-black relaxation sweeps on a single grid. Each half
    /// sweep ping-pongs between `solution` and `scratch`, and the final iterate
    /// lands in `solution`.
    pub fn smoother_iterate(
        &mut self,
        solution: &mut GridBuffer,
        scratch: &mut GridBuffer,
        rhs: &GridBuffer,
        omega: f32,
        sweeps: u32,
    ) -> SolverResult<()> {
        check_omega(omega)?;
        check_count("sweeps", sweeps)?;
        rhs.ensure_same_shape(solution, "smoother_iterate")?;
        rhs.ensure_same_shape(scratch, "smoother_iterate")?;
        log::debug!(
            "smoother_iterate {}x{}: {} sweeps, omega={}",
            rhs.width(),
            rhs.height(),
            sweeps,
            omega
        );

        self.state = EngineState::Solving;
        let dims = rhs.dims();
        let context = &self.context;
        let kernels = &self.kernels;
        let boundary = &self.boundary;
        let ranges = &mut self.ranges;
        let counter = &self.dispatches;
        let submitted = context.scoped("smoother_iterate", || {
            let device = &context.device;
            let [red, black] = [RED, BLACK].map(|colour| {
                let params = GridParams::new(dims, dims, omega).with_colour(colour);
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Smoother Params"),
                    contents: bytemuck::bytes_of(&params),
                    usage: wgpu::BufferUsages::UNIFORM,
                })
            });
            let pair = [
                kernels.bind_fields(device, "Smoother Red BG", solution, scratch, rhs, &red),
                kernels.bind_fields(device, "Smoother Black BG", scratch, solution, rhs, &black),
            ];

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Smoother Encoder"),
            });
            {
                let mut cycle = CycleEncoder::begin(
                    &mut encoder,
                    "Smoother",
                    device,
                    kernels,
                    boundary,
                    ranges,
                    counter,
                );
                cycle.sweeps(&pair, dims, sweeps);
            }
            context.queue.submit(Some(encoder.finish()));
            Ok(())
        });

        match submitted {
            Ok(()) => {
                self.dispatches.log_summary("smoother_iterate");
                Ok(())
            }
            Err(err) => Err(self.abandon(err)),
        }
    }

    /// Runs `cycles` V-cycles starting from `initial` and returns the new
    /// solution.
    pub fn iterate(
        &mut self,
        initial: &GridBuffer,
        rhs: &GridBuffer,
        omega: f32,
        pre_sweeps: u32,
        post_sweeps: u32,
        cycles: u32,
    ) -> SolverResult<GridBuffer> {
        check_omega(omega)?;
        check_count("pre_sweeps", pre_sweeps)?;
        check_count("post_sweeps", post_sweeps)?;
        check_count("cycles", cycles)?;
        rhs.ensure_same_shape(initial, "iterate")?;

        let hierarchy = self.take_hierarchy(rhs.dims(), "iterate")?;
        log::debug!(
            "iterate {}x{}: {} levels, {} V({},{}) cycles, omega={}",
            rhs.width(),
            rhs.height(),
            hierarchy.num_levels(),
            cycles,
            pre_sweeps,
            post_sweeps,
            omega
        );
        self.state = EngineState::Solving;

        let coarse_sweeps = self.config.coarse_sweeps;
        let result = self.encode(
            "iterate",
            &hierarchy,
            omega,
            |encoder, finest| {
                encoder.copy_buffer_to_buffer(rhs.raw(), 0, finest.rhs.raw(), 0, rhs.byte_size());
                encoder.copy_buffer_to_buffer(
                    initial.raw(),
                    0,
                    finest.solution.raw(),
                    0,
                    initial.byte_size(),
                );
            },
            |cycle| {
                for _ in 0..cycles {
                    cycle.v_cycle(&hierarchy, 0, pre_sweeps, post_sweeps, coarse_sweeps);
                }
            },
        );

        self.finish(hierarchy, result, "iterate")
    }

    /// Full multigrid: restricts `rhs` to the coarsest level, relaxes there, and
    /// works back to the finest level running `cycles` V-cycles per level.
    pub fn fmg(
        &mut self,
        rhs: &GridBuffer,
        omega: f32,
        pre_sweeps: u32,
        post_sweeps: u32,
        cycles: u32,
    ) -> SolverResult<GridBuffer> {
        check_omega(omega)?;
        check_count("pre_sweeps", pre_sweeps)?;
        check_count("post_sweeps", post_sweeps)?;
        check_count("cycles", cycles)?;

        let hierarchy = self.take_hierarchy(rhs.dims(), "fmg")?;
        log::debug!(
            "fmg {}x{}: {} levels, {} V({},{}) cycles per level, omega={}",
            rhs.width(),
            rhs.height(),
            hierarchy.num_levels(),
            cycles,
            pre_sweeps,
            post_sweeps,
            omega
        );
        self.state = EngineState::Solving;

        let coarse_sweeps = self.config.coarse_sweeps;
        let coarsest = hierarchy.coarsest_index();
        let result = self.encode(
            "fmg",
            &hierarchy,
            omega,
            |encoder, finest| {
                encoder.copy_buffer_to_buffer(rhs.raw(), 0, finest.rhs.raw(), 0, rhs.byte_size());
            },
            |cycle| {
                for l in 0..coarsest {
                    cycle.restrict(&hierarchy, l, RestrictSource::Rhs);
                }
                let bottom = hierarchy.level(coarsest);
                cycle.clear_solution(bottom);
                cycle.smooth(bottom, coarse_sweeps);

                for l in (0..coarsest).rev() {
                    cycle.clear_solution(hierarchy.level(l));
                    cycle.prolong_add(&hierarchy, l);
                    for _ in 0..cycles {
                        cycle.v_cycle(&hierarchy, l, pre_sweeps, post_sweeps, coarse_sweeps);
                    }
                }
            },
        );

        self.finish(hierarchy, result, "fmg")
    }

    /// `rhs - A solution` with a zero border, for any pair of same-shaped
    /// buffers.
    pub fn residual(&mut self, solution: &GridBuffer, rhs: &GridBuffer) -> SolverResult<GridBuffer> {
        rhs.ensure_same_shape(solution, "residual")?;
        check_dims(rhs.width(), rhs.height())?;

        let dims = rhs.dims();
        let context = &self.context;
        let kernels = &self.kernels;
        let boundary = &self.boundary;
        let ranges = &mut self.ranges;
        let counter = &self.dispatches;
        let computed = context.scoped("residual", || {
            let device = &context.device;
            let result = GridBuffer::empty(context, dims.0, dims.1)?;
            let params = GridParams::new(dims, dims, 1.0);
            let b_params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Residual Params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let fields =
                kernels.bind_fields(device, "Residual BG", solution, &result, rhs, &b_params);

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Residual Encoder"),
            });
            {
                let mut cycle = CycleEncoder::begin(
                    &mut encoder,
                    "Residual",
                    device,
                    kernels,
                    boundary,
                    ranges,
                    counter,
                );
                cycle.apply(&kernels.residual, &kernels.zero_border, &fields, dims);
            }
            context.queue.submit(Some(encoder.finish()));
            Ok(result)
        });

        match computed {
            Ok(result) => {
                self.state = EngineState::Solving;
                Ok(result)
            }
            Err(err) => Err(self.abandon(err)),
        }
    }

    fn take_hierarchy(&mut self, dims: (u32, u32), operation: &'static str) -> SolverResult<GridHierarchy> {
        match self.hierarchy.take() {
            Some(hierarchy) if hierarchy.dims() == dims => Ok(hierarchy),
            Some(hierarchy) => {
                let expected = hierarchy.dims();
                self.hierarchy = Some(hierarchy);
                Err(SolverError::DimensionMismatch {
                    operation,
                    expected,
                    found: dims,
                })
            }
            None => {
                check_dims(dims.0, dims.1)?;
                match GridHierarchy::build(&self.context, &self.kernels, dims.0, dims.1, &self.config) {
                    Ok(hierarchy) => {
                        self.state = EngineState::HierarchyBuilt;
                        Ok(hierarchy)
                    }
                    Err(err) => Err(self.abandon(err)),
                }
            }
        }
    }

    /// `setup` records the copies into the finest level ahead of the pass and
    /// `record` fills the pass. The finest solution is copied out afterwards.
    fn encode(
        &mut self,
        operation: &'static str,
        hierarchy: &GridHierarchy,
        omega: f32,
        setup: impl FnOnce(&mut wgpu::CommandEncoder, &GridLevel),
        record: impl FnOnce(&mut CycleEncoder<'_, B>),
    ) -> SolverResult<GridBuffer> {
        let context = &self.context;
        let kernels = &self.kernels;
        let boundary = &self.boundary;
        let ranges = &mut self.ranges;
        let counter = &self.dispatches;

        context.scoped(operation, || {
            let device = &context.device;
            let finest = hierarchy.finest();
            let result = GridBuffer::empty(context, finest.width, finest.height)?;
            hierarchy.set_omega(&context.queue, omega);

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(operation),
            });
            setup(&mut encoder, finest);
            {
                let mut cycle = CycleEncoder::begin(
                    &mut encoder,
                    operation,
                    device,
                    kernels,
                    boundary,
                    ranges,
                    counter,
                );
                record(&mut cycle);
            }
            encoder.copy_buffer_to_buffer(
                finest.solution.raw(),
                0,
                result.raw(),
                0,
                result.byte_size(),
            );
            context.queue.submit(Some(encoder.finish()));
            Ok(result)
        })
    }

    fn finish(
        &mut self,
        hierarchy: GridHierarchy,
        result: SolverResult<GridBuffer>,
        label: &str,
    ) -> SolverResult<GridBuffer> {
        match result {
            Ok(buffer) => {
                self.hierarchy = Some(hierarchy);
                self.dispatches.log_summary(label);
                Ok(buffer)
            }
            Err(err) => {
                drop(hierarchy);
                Err(self.abandon(err))
            }
        }
    }

    fn abandon(&mut self, err: SolverError) -> SolverError {
        log::warn!("multigrid engine reset after error: {err}");
        self.hierarchy = None;
        self.state = EngineState::Idle;
        err
    }
}
