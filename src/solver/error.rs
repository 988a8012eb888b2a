use std::fmt;

/// What the device layer reported when an operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorCode {
    AdapterUnavailable,
    DeviceRequest,
    OutOfMemory,
    Validation,
    Internal,
    MapFailed,
    PollFailed,
}

impl DeviceErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceErrorCode::AdapterUnavailable => "adapter-unavailable",
            DeviceErrorCode::DeviceRequest => "device-request",
            DeviceErrorCode::OutOfMemory => "out-of-memory",
            DeviceErrorCode::Validation => "validation",
            DeviceErrorCode::Internal => "internal",
            DeviceErrorCode::MapFailed => "map-failed",
            DeviceErrorCode::PollFailed => "poll-failed",
        }
    }
}

impl fmt::Display for DeviceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for every fallible solver operation.
#[derive(Debug, Clone, PartialEq)]
pub enum SolverError {
    /// Compilation, allocation, enqueue or synchronization failure on the device.
    Device {
        operation: &'static str,
        code: DeviceErrorCode,
        message: String,
    },
    /// A buffer's shape disagrees with the hierarchy or with its partner buffer.
    DimensionMismatch {
        operation: &'static str,
        expected: (u32, u32),
        found: (u32, u32),
    },
    /// Invalid parameter value (sweep counts, omega, grid size, config).
    Configuration {
        parameter: &'static str,
        reason: String,
    },
}

pub type SolverResult<T> = Result<T, SolverError>;

impl SolverError {
    pub fn device(
        operation: &'static str,
        code: DeviceErrorCode,
        message: impl Into<String>,
    ) -> Self {
        SolverError::Device {
            operation,
            code,
            message: message.into(),
        }
    }

    pub fn configuration(parameter: &'static str, reason: impl Into<String>) -> Self {
        SolverError::Configuration {
            parameter,
            reason: reason.into(),
        }
    }

    pub(crate) fn from_wgpu(operation: &'static str, err: wgpu::Error) -> Self {
        let code = match &err {
            wgpu::Error::OutOfMemory { .. } => DeviceErrorCode::OutOfMemory,
            wgpu::Error::Validation { .. } => DeviceErrorCode::Validation,
            _ => DeviceErrorCode::Internal,
        };
        SolverError::device(operation, code, err.to_string())
    }

    pub fn is_device(&self) -> bool {
        matches!(self, SolverError::Device { .. })
    }
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverError::Device {
                operation,
                code,
                message,
            } => write!(f, "device error in {} (code={}): {}", operation, code, message),
            SolverError::DimensionMismatch {
                operation,
                expected,
                found,
            } => write!(
                f,
                "dimension mismatch in {}: expected {}x{}, found {}x{}",
                operation, expected.0, expected.1, found.0, found.1
            ),
            SolverError::Configuration { parameter, reason } => {
                write!(f, "invalid configuration for '{}': {}", parameter, reason)
            }
        }
    }
}

impl std::error::Error for SolverError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_operation_and_shapes() {
        let err = SolverError::DimensionMismatch {
            operation: "iterate",
            expected: (9, 9),
            found: (5, 5),
        };
        assert_eq!(
            err.to_string(),
            "dimension mismatch in iterate: expected 9x9, found 5x5"
        );

        let err = SolverError::device("compile", DeviceErrorCode::Validation, "bad entry point");
        assert!(err.is_device());
        assert_eq!(
            err.to_string(),
            "device error in compile (code=validation): bad entry point"
        );
    }
}
