use crate::solver::error::SolverResult;
use crate::solver::gpu::context::GpuContext;
use crate::solver::gpu::dispatch_counter::categories;
use crate::solver::gpu::grid_buffer::GridBuffer;

/// Built-in multigrid program.
pub const MULTIGRID_WGSL: &str = include_str!("shaders/multigrid.wgsl");

pub const WORKGROUP_SIZE: u32 = 8;

/// Uniform block shared by every kernel touching one level.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GridParams {
    pub width: u32,
    pub height: u32,
    pub coarse_width: u32,
    pub coarse_height: u32,
    pub omega: f32,
    pub restrict_scale: f32,
    pub colour: u32,
    pub padding: u32,
}

/// Full weighting of an h^2-scaled residual onto a grid with twice the spacing.
pub const RESTRICT_SCALE: f32 = 4.0;

/// Points with even `x + y`, relaxed by the first half of a sweep.
pub const RED: u32 = 0;
/// Points with odd `x + y`.
pub const BLACK: u32 = 1;

impl GridParams {
    pub fn new(dims: (u32, u32), coarse_dims: (u32, u32), omega: f32) -> Self {
        Self {
            width: dims.0,
            height: dims.1,
            coarse_width: coarse_dims.0,
            coarse_height: coarse_dims.1,
            omega,
            restrict_scale: RESTRICT_SCALE,
            colour: RED,
            padding: 0,
        }
    }

    pub fn with_colour(mut self, colour: u32) -> Self {
        self.colour = colour;
        self
    }
}

/// One compiled entry point of the program.
pub struct KernelPipeline {
    pub name: &'static str,
    pub category: &'static str,
    pub pipeline: wgpu::ComputePipeline,
}

/// A kernel together with the field bindings of one launch.
pub struct Launch<'a> {
    pub kernel: &'a KernelPipeline,
    pub fields: &'a wgpu::BindGroup,
}

impl<'a> Launch<'a> {
    pub fn new(kernel: &'a KernelPipeline, fields: &'a wgpu::BindGroup) -> Self {
        Self { kernel, fields }
    }
}

pub struct KernelSet {
    pub bgl_fields: wgpu::BindGroupLayout,
    pub bgl_range: wgpu::BindGroupLayout,

    pub relax: KernelPipeline,
    pub residual: KernelPipeline,
    pub restrict: KernelPipeline,
    pub prolong: KernelPipeline,
    pub dirichlet_border: KernelPipeline,
    pub zero_border: KernelPipeline,
    pub inject_border: KernelPipeline,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl KernelSet {
    /// Compiles the built-in program.
    pub fn builtin(context: &GpuContext) -> SolverResult<Self> {
        Self::compile(context, MULTIGRID_WGSL)
    }

    /// Compiles `source`, which must expose every entry point of the built-in
    /// program with the same bindings.
    pub fn compile(context: &GpuContext, source: &str) -> SolverResult<Self> {
        context.scoped("compile", || Ok(Self::create(&context.device, source)))
    }

    fn create(device: &wgpu::Device, source: &str) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Multigrid Shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        // Group 0: field_in, field_out, field_aux, grid params
        let bgl_fields = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Multigrid Fields BGL"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, false),
                storage_entry(2, true),
                uniform_entry(3),
            ],
        });

        // Group 1: launch range
        let bgl_range = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Multigrid Range BGL"),
            entries: &[uniform_entry(0)],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Multigrid Pipeline Layout"),
            bind_group_layouts: &[&bgl_fields, &bgl_range],
            push_constant_ranges: &[],
        });

        let make = |name: &'static str, category: &'static str| KernelPipeline {
            name,
            category,
            pipeline: device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(name),
                layout: Some(&layout),
                module: &shader,
                entry_point: Some(name),
                compilation_options: Default::default(),
                cache: None,
            }),
        };

        let relax = make("relax_interior", categories::RELAXATION);
        let residual = make("residual_interior", categories::RESIDUAL);
        let restrict = make("restrict_interior", categories::TRANSFER);
        let prolong = make("prolong_interior", categories::TRANSFER);
        let dirichlet_border = make("dirichlet_border", categories::BOUNDARY_CONDITIONS);
        let zero_border = make("zero_border", categories::BOUNDARY_CONDITIONS);
        let inject_border = make("inject_border", categories::BOUNDARY_CONDITIONS);

        Self {
            bgl_fields,
            bgl_range,
            relax,
            residual,
            restrict,
            prolong,
            dirichlet_border,
            zero_border,
            inject_border,
        }
    }

    /// Binds the three fields and the params block of one launch. `output` must
    /// differ from both inputs.
    pub fn bind_fields(
        &self,
        device: &wgpu::Device,
        label: &str,
        input: &GridBuffer,
        output: &GridBuffer,
        aux: &GridBuffer,
        params: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.bgl_fields,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: input.raw().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: output.raw().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: aux.raw().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: params.as_entire_binding(),
                },
            ],
        })
    }
}
