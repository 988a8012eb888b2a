use std::collections::HashMap;
use wgpu::util::DeviceExt;

use crate::solver::gpu::boundary::{IndexRange, RangeQueue};
use crate::solver::gpu::dispatch_counter::DispatchCounter;
use crate::solver::gpu::kernels::{Launch, WORKGROUP_SIZE};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct LaunchRangeUniform {
    origin: [u32; 2],
    extent: [u32; 2],
}

/// Uniform bind groups for launch ranges, created once per distinct range.
///
/// Contents never change after creation, so a range can be bound by any number
/// of launches in flight.
#[derive(Default)]
pub struct RangeBindings {
    groups: HashMap<IndexRange, wgpu::BindGroup>,
}

impl RangeBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Drops every cached range, e.g. when the grid size changes.
    pub fn clear(&mut self) {
        self.groups.clear();
    }

    pub fn bind_group(
        &mut self,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        range: IndexRange,
    ) -> &wgpu::BindGroup {
        self.groups.entry(range).or_insert_with(|| {
            let uniform = LaunchRangeUniform {
                origin: range.origin,
                extent: range.extent,
            };
            let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Launch Range"),
                contents: bytemuck::bytes_of(&uniform),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Launch Range BG"),
                layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            })
        })
    }
}

/// Enqueues range launches into one compute pass. Dispatches within a pass
/// execute in issue order, which is what the cycle relies on between
/// dependent steps.
pub struct PassQueue<'a> {
    pass: wgpu::ComputePass<'a>,
    device: &'a wgpu::Device,
    range_layout: &'a wgpu::BindGroupLayout,
    ranges: &'a mut RangeBindings,
    counter: &'a DispatchCounter,
}

impl<'a> PassQueue<'a> {
    pub fn new(
        pass: wgpu::ComputePass<'a>,
        device: &'a wgpu::Device,
        range_layout: &'a wgpu::BindGroupLayout,
        ranges: &'a mut RangeBindings,
        counter: &'a DispatchCounter,
    ) -> Self {
        Self {
            pass,
            device,
            range_layout,
            ranges,
            counter,
        }
    }

    pub fn push_debug_group(&mut self, label: &str) {
        self.pass.push_debug_group(label);
    }

    pub fn pop_debug_group(&mut self) {
        self.pass.pop_debug_group();
    }
}

impl<'k> RangeQueue<Launch<'k>> for PassQueue<'_> {
    fn enqueue(&mut self, launch: &Launch<'k>, range: IndexRange) {
        if range.is_empty() {
            return;
        }
        let range_bg = self
            .ranges
            .bind_group(self.device, self.range_layout, range);

        self.pass.set_pipeline(&launch.kernel.pipeline);
        self.pass.set_bind_group(0, launch.fields, &[]);
        self.pass.set_bind_group(1, range_bg, &[]);
        self.pass.dispatch_workgroups(
            range.extent[0].div_ceil(WORKGROUP_SIZE),
            range.extent[1].div_ceil(WORKGROUP_SIZE),
            1,
        );
        self.counter
            .record(launch.kernel.category, launch.kernel.name);
    }
}
