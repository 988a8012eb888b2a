use nalgebra::DMatrix;
use wgpu::util::DeviceExt;

use crate::solver::error::{DeviceErrorCode, SolverError, SolverResult};
use crate::solver::gpu::context::GpuContext;
use crate::solver::options::check_dims;

const SCALAR_BYTES: u64 = std::mem::size_of::<f32>() as u64;

fn field_usage() -> wgpu::BufferUsages {
    wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC
}

/// Device-resident `height x width` grid of `f32`, row-major.
///
/// The buffer is exclusively owned; [`GridBuffer::duplicate`] makes a full
/// device-side copy instead of sharing the handle.
#[derive(Debug)]
pub struct GridBuffer {
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
}

impl GridBuffer {
    /// Zero-filled allocation. wgpu clears new buffers, so no upload is needed.
    pub fn empty(context: &GpuContext, width: u32, height: u32) -> SolverResult<Self> {
        check_dims(width, height)?;
        context.scoped("allocate", || {
            let buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("Grid {width}x{height}")),
                size: width as u64 * height as u64 * SCALAR_BYTES,
                usage: field_usage(),
                mapped_at_creation: false,
            });
            Ok(Self {
                buffer,
                width,
                height,
            })
        })
    }

    /// Uploads `width * height` scalars given in row-major order.
    pub fn from_row_major(
        context: &GpuContext,
        width: u32,
        height: u32,
        data: &[f32],
    ) -> SolverResult<Self> {
        check_dims(width, height)?;
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(SolverError::configuration(
                "data",
                format!(
                    "expected {expected} values for a {width}x{height} grid, got {}",
                    data.len()
                ),
            ));
        }

        context.scoped("upload", || {
            let buffer = context
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("Grid {width}x{height}")),
                    contents: bytemuck::cast_slice(data),
                    usage: field_usage(),
                });
            Ok(Self {
                buffer,
                width,
                height,
            })
        })
    }

    /// Uploads a host matrix; rows map to grid `y`, columns to grid `x`.
    pub fn from_host(context: &GpuContext, matrix: &DMatrix<f32>) -> SolverResult<Self> {
        let (height, width) = matrix.shape();
        let mut data = Vec::with_capacity(width * height);
        for row in matrix.row_iter() {
            data.extend(row.iter().copied());
        }
        Self::from_row_major(context, width as u32, height as u32, &data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dims(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte_size(&self) -> u64 {
        self.len() as u64 * SCALAR_BYTES
    }

    pub(crate) fn raw(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn ensure_same_shape(&self, other: &GridBuffer, operation: &'static str) -> SolverResult<()> {
        if self.dims() != other.dims() {
            return Err(SolverError::DimensionMismatch {
                operation,
                expected: self.dims(),
                found: other.dims(),
            });
        }
        Ok(())
    }

    /// Device-to-device copy into a freshly allocated buffer.
    pub fn duplicate(&self, context: &GpuContext) -> SolverResult<Self> {
        let copy = Self::empty(context, self.width, self.height)?;
        context.scoped("duplicate", || {
            let mut encoder = context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Grid Duplicate"),
                });
            encoder.copy_buffer_to_buffer(&self.buffer, 0, &copy.buffer, 0, self.byte_size());
            context.queue.submit(Some(encoder.finish()));
            Ok(())
        })?;
        Ok(copy)
    }

    /// Blocking download in row-major order. Waits for every earlier submission
    /// that writes this buffer.
    pub fn to_row_major(&self, context: &GpuContext) -> SolverResult<Vec<f32>> {
        let size = self.byte_size();
        let staging_buffer = context.scoped("download", || {
            let staging_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Grid Staging Buffer"),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });

            let mut encoder = context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Grid Download"),
                });
            encoder.copy_buffer_to_buffer(&self.buffer, 0, &staging_buffer, 0, size);
            context.queue.submit(Some(encoder.finish()));
            Ok(staging_buffer)
        })?;

        let slice = staging_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        context.wait()?;

        rx.recv()
            .map_err(|err| {
                SolverError::device("download", DeviceErrorCode::MapFailed, err.to_string())
            })?
            .map_err(|err| {
                SolverError::device("download", DeviceErrorCode::MapFailed, err.to_string())
            })?;

        let data = slice.get_mapped_range();
        let result: Vec<f32> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging_buffer.unmap();
        Ok(result)
    }

    /// Blocking download into a `height x width` host matrix.
    pub fn to_host(&self, context: &GpuContext) -> SolverResult<DMatrix<f32>> {
        let data = self.to_row_major(context)?;
        Ok(DMatrix::from_row_slice(
            self.height as usize,
            self.width as usize,
            &data,
        ))
    }
}
