use crate::solver::error::{DeviceErrorCode, SolverError, SolverResult};

pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
}

impl GpuContext {
    /// Requests a high-performance adapter, falling back to a software adapter
    /// when none is available.
    pub async fn new() -> SolverResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = match instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
        {
            Ok(adapter) => adapter,
            Err(err) => {
                log::warn!("no hardware adapter ({err}), trying fallback adapter");
                instance
                    .request_adapter(&wgpu::RequestAdapterOptions {
                        power_preference: wgpu::PowerPreference::LowPower,
                        compatible_surface: None,
                        force_fallback_adapter: true,
                    })
                    .await
                    .map_err(|err| {
                        SolverError::device(
                            "request_adapter",
                            DeviceErrorCode::AdapterUnavailable,
                            err.to_string(),
                        )
                    })?
            }
        };

        let adapter_info = adapter.get_info();
        log::info!(
            "using adapter '{}' ({:?})",
            adapter_info.name,
            adapter_info.backend
        );

        // Large grids need the adapter's buffer limits, not the downlevel ones.
        let adapter_limits = adapter.limits();

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("gridmg device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits {
                    max_buffer_size: adapter_limits.max_buffer_size,
                    max_storage_buffer_binding_size: adapter_limits
                        .max_storage_buffer_binding_size,
                    ..wgpu::Limits::downlevel_defaults()
                },
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|err| {
                SolverError::device(
                    "request_device",
                    DeviceErrorCode::DeviceRequest,
                    err.to_string(),
                )
            })?;

        Ok(Self {
            device,
            queue,
            adapter_info,
        })
    }

    pub fn new_blocking() -> SolverResult<Self> {
        pollster::block_on(Self::new())
    }

    /// Runs `f` inside validation and out-of-memory error scopes and reports the
    /// first captured error against `operation`.
    pub(crate) fn scoped<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce() -> SolverResult<T>,
    ) -> SolverResult<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let result = f();
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());

        if let Some(err) = validation.or(out_of_memory) {
            return Err(SolverError::from_wgpu(operation, err));
        }
        result
    }

    /// Blocks until every submission on the queue has completed.
    pub fn wait(&self) -> SolverResult<()> {
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map(|_| ())
            .map_err(|err| {
                SolverError::device("wait", DeviceErrorCode::PollFailed, err.to_string())
            })
    }
}
