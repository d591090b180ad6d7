use super::BakedDataIdentifier;
use crate::device::DeviceError;
use crate::energy_field::EnergyFieldError;
use crate::job_graph::JobGraphError;
use crate::simulator::SimulationError;
use std::path::PathBuf;

/// Errors returned by a bake.
///
/// Configuration errors are returned before any probe is touched.
/// Errors raised while simulating abort the bake; probes stored by earlier dispatches keep their data.
#[derive(Debug, thiserror::Error)]
pub enum BakeError {
    /// Another bake operation is already in progress.
    #[error("another bake operation is already in progress")]
    BakeInProgress,

    /// Neither convolution nor parametric data was requested.
    #[error("no bake flags set: request convolution data, parametric data, or both")]
    NoBakeFlags,

    /// The identifier does not describe reflections data.
    #[error("the reflections baker cannot bake {identifier:?}")]
    UnsupportedDataType { identifier: BakedDataIdentifier },

    /// Dynamic data depends on every pair of probes and cannot be baked per probe.
    #[error("reflections cannot be baked for the dynamic variation")]
    DynamicVariation,

    /// A bake parameter is out of range.
    #[error("invalid value for `{name}`: {value}")]
    InvalidParameter { name: &'static str, value: String },

    #[error(transparent)]
    EnergyField(#[from] EnergyFieldError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error(transparent)]
    JobGraph(#[from] JobGraphError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    /// An impulse response could not be exported.
    #[error("failed to export impulse response to {}", path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
