use wgpu::util::DeviceExt;

use crate::solver::error::SolverResult;
use crate::solver::gpu::context::GpuContext;
use crate::solver::gpu::grid_buffer::GridBuffer;
use crate::solver::gpu::kernels::{GridParams, KernelSet, BLACK, RED};
use crate::solver::options::{check_dims, MultigridConfig};

/// Vertex-centred coarsening: every other point of the finer grid survives.
pub fn coarsen(n: u32) -> u32 {
    n.saturating_sub(1) / 2 + 1
}

/// Level dimensions from finest to coarsest. Coarsening stops before a level
/// with an extent below `min_coarse_dim`, or once `max_levels` is reached.
pub fn level_dims(width: u32, height: u32, config: &MultigridConfig) -> Vec<(u32, u32)> {
    let mut dims = vec![(width, height)];
    while dims.len() < config.max_levels {
        let (w, h) = dims[dims.len() - 1];
        let (cw, ch) = (coarsen(w), coarsen(h));
        if cw < config.min_coarse_dim || ch < config.min_coarse_dim || cw >= w || ch >= h {
            break;
        }
        dims.push((cw, ch));
    }
    dims
}

pub struct GridLevel {
    pub width: u32,
    pub height: u32,

    pub solution: GridBuffer,
    /// Holds the iterate between the two half-sweeps of a relaxation sweep.
    pub scratch: GridBuffer,
    pub rhs: GridBuffer,
    pub residual: GridBuffer,

    /// Params blocks indexed by colour; only the relaxation reads `colour`.
    b_params: [wgpu::Buffer; 2],
    coarse_dims: (u32, u32),
    pub(crate) bindings: LevelBindings,
}

pub(crate) struct LevelBindings {
    /// `[solution -> scratch (red), scratch -> solution (black)]`
    pub relax: [wgpu::BindGroup; 2],
    pub residual: wgpu::BindGroup,
    pub clear_solution: wgpu::BindGroup,
}

/// Bindings between level `l` and level `l + 1`.
pub(crate) struct LevelTransfer {
    /// residual(l) -> rhs(l + 1), zero border
    pub restrict_residual: wgpu::BindGroup,
    /// rhs(l) -> rhs(l + 1) with injected border, used by the FMG descent
    pub restrict_rhs: wgpu::BindGroup,
    /// solution(l) += P solution(l + 1)
    pub prolong: wgpu::BindGroup,
}

impl GridLevel {
    pub fn dims(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn coarse_dims(&self) -> (u32, u32) {
        self.coarse_dims
    }
}

struct LevelStorage {
    dims: (u32, u32),
    coarse_dims: (u32, u32),
    solution: GridBuffer,
    scratch: GridBuffer,
    rhs: GridBuffer,
    residual: GridBuffer,
    b_params: [wgpu::Buffer; 2],
}

/// Finest-to-coarsest grid levels for one `(width, height)`.
pub struct GridHierarchy {
    levels: Vec<GridLevel>,
    transfers: Vec<LevelTransfer>,
}

impl GridHierarchy {
    pub fn build(
        context: &GpuContext,
        kernels: &KernelSet,
        width: u32,
        height: u32,
        config: &MultigridConfig,
    ) -> SolverResult<Self> {
        check_dims(width, height)?;
        config.validate()?;
        let dims = level_dims(width, height, config);
        log::debug!("building multigrid hierarchy: {:?}", dims);

        let device = &context.device;
        let mut storage = Vec::with_capacity(dims.len());
        for (idx, &(w, h)) in dims.iter().enumerate() {
            let coarse_dims = dims.get(idx + 1).copied().unwrap_or((w, h));
            let b_params = context.scoped("allocate", || {
                Ok([RED, BLACK].map(|colour| {
                    let params = GridParams::new((w, h), coarse_dims, 1.0).with_colour(colour);
                    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("MG L{} Params C{}", idx, colour)),
                        contents: bytemuck::bytes_of(&params),
                        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    })
                }))
            })?;
            storage.push(LevelStorage {
                dims: (w, h),
                coarse_dims,
                solution: GridBuffer::empty(context, w, h)?,
                scratch: GridBuffer::empty(context, w, h)?,
                rhs: GridBuffer::empty(context, w, h)?,
                residual: GridBuffer::empty(context, w, h)?,
                b_params,
            });
        }

        context.scoped("build_hierarchy", || {
            let transfers = storage
                .windows(2)
                .enumerate()
                .map(|(idx, pair)| {
                    let (fine, coarse) = (&pair[0], &pair[1]);
                    LevelTransfer {
                        restrict_residual: kernels.bind_fields(
                            device,
                            &format!("MG L{idx} Restrict Residual BG"),
                            &fine.residual,
                            &coarse.rhs,
                            &fine.residual,
                            &fine.b_params[RED as usize],
                        ),
                        restrict_rhs: kernels.bind_fields(
                            device,
                            &format!("MG L{idx} Restrict Rhs BG"),
                            &fine.rhs,
                            &coarse.rhs,
                            &fine.rhs,
                            &fine.b_params[RED as usize],
                        ),
                        prolong: kernels.bind_fields(
                            device,
                            &format!("MG L{idx} Prolong BG"),
                            &coarse.solution,
                            &fine.solution,
                            &fine.rhs,
                            &fine.b_params[RED as usize],
                        ),
                    }
                })
                .collect();

            let levels = storage
                .into_iter()
                .enumerate()
                .map(|(idx, s)| {
                    let bindings = LevelBindings {
                        relax: [
                            kernels.bind_fields(
                                device,
                                &format!("MG L{idx} Relax Red BG"),
                                &s.solution,
                                &s.scratch,
                                &s.rhs,
                                &s.b_params[RED as usize],
                            ),
                            kernels.bind_fields(
                                device,
                                &format!("MG L{idx} Relax Black BG"),
                                &s.scratch,
                                &s.solution,
                                &s.rhs,
                                &s.b_params[BLACK as usize],
                            ),
                        ],
                        residual: kernels.bind_fields(
                            device,
                            &format!("MG L{idx} Residual BG"),
                            &s.solution,
                            &s.residual,
                            &s.rhs,
                            &s.b_params[RED as usize],
                        ),
                        clear_solution: kernels.bind_fields(
                            device,
                            &format!("MG L{idx} Clear BG"),
                            &s.rhs,
                            &s.solution,
                            &s.rhs,
                            &s.b_params[RED as usize],
                        ),
                    };
                    GridLevel {
                        width: s.dims.0,
                        height: s.dims.1,
                        solution: s.solution,
                        scratch: s.scratch,
                        rhs: s.rhs,
                        residual: s.residual,
                        b_params: s.b_params,
                        coarse_dims: s.coarse_dims,
                        bindings,
                    }
                })
                .collect();

            Ok(Self { levels, transfers })
        })
    }

    pub fn dims(&self) -> (u32, u32) {
        self.finest().dims()
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn levels(&self) -> &[GridLevel] {
        &self.levels
    }

    pub fn level(&self, index: usize) -> &GridLevel {
        &self.levels[index]
    }

    pub fn finest(&self) -> &GridLevel {
        &self.levels[0]
    }

    pub fn coarsest_index(&self) -> usize {
        self.levels.len() - 1
    }

    pub(crate) fn transfer(&self, fine_index: usize) -> &LevelTransfer {
        &self.transfers[fine_index]
    }

    /// Writes the relaxation factor into every level's params block. Takes
    /// effect at the next submission.
    pub fn set_omega(&self, queue: &wgpu::Queue, omega: f32) {
        for level in &self.levels {
            for (colour, buffer) in [RED, BLACK].into_iter().zip(&level.b_params) {
                let params =
                    GridParams::new(level.dims(), level.coarse_dims, omega).with_colour(colour);
                queue.write_buffer(buffer, 0, bytemuck::bytes_of(&params));
            }
        }
    }
}
