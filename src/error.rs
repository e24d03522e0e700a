// Error taxonomy shared by probes, the scheduler and the C boundary

use std::fmt;

/// Resource kind a probe reports on; used to label errors and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    Cpu,
    Memory,
    Processes,
    Disks,
    Networks,
    Services,
    Gpus,
    ProcessControl,
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProbeKind::Cpu => "cpu",
            ProbeKind::Memory => "memory",
            ProbeKind::Processes => "processes",
            ProbeKind::Disks => "disks",
            ProbeKind::Networks => "networks",
            ProbeKind::Services => "services",
            ProbeKind::Gpus => "gpus",
            ProbeKind::ProcessControl => "process_control",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The resource kind is not available on this OS or right now. Yields an empty result.
    #[error("{kind} probe unavailable: {reason}")]
    ProbeUnavailable { kind: ProbeKind, reason: String },

    /// The probe backend could not be initialized. Collection never starts.
    #[error("probe backend failed to load: {0}")]
    BoundaryLoadFailure(String),

    /// A single OS query failed. The tick is skipped and the loop carries on.
    #[error("{kind} query failed: {reason}")]
    TransientQueryFailure { kind: ProbeKind, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Snapshot bytes could not be encoded or decoded.
    #[error("snapshot codec: {0}")]
    Codec(String),
}

pub type Result<T> = std::result::Result<T, MonitorError>;

impl MonitorError {
    pub fn unavailable(kind: ProbeKind, reason: impl Into<String>) -> Self {
        Self::ProbeUnavailable {
            kind,
            reason: reason.into(),
        }
    }

    pub fn transient(kind: ProbeKind, reason: impl Into<String>) -> Self {
        Self::TransientQueryFailure {
            kind,
            reason: reason.into(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }

    /// Only a backend load failure may end a monitoring session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::BoundaryLoadFailure(_))
    }
}
