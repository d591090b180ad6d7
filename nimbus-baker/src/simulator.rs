//! The seam between the baker and a reflection simulator.

use crate::energy_field::EnergyField;
use crate::geometry::CoordinateSystem;
use crate::job_graph::{JobGraph, JobGraphError};
use crate::model::Directivity;

/// Inputs of one simulation dispatch.
///
/// `sources` and `listeners` are already sliced to the counts the backend expects:
/// - one source and one listener per energy field on CPU backends (with a shared listener for static-listener batches);
/// - on GPU backends, one source and many listeners for static sources, many sources and one listener for static listeners, or all pairs for reverb.
#[derive(Debug, Clone, Copy)]
pub struct SimulationInputs<'s> {
    /// Source coordinate systems.
    pub sources: &'s [CoordinateSystem],

    /// Listener coordinate systems.
    pub listeners: &'s [CoordinateSystem],

    /// One directivity per source.
    pub directivities: &'s [Directivity],

    /// Number of rays to trace from each listener.
    pub num_rays: u32,

    /// Number of directions considered when generating diffusely-reflected rays.
    pub num_diffuse_samples: u32,

    /// Number of times each ray is reflected off solid geometry.
    pub num_bounces: u32,

    /// Length (in seconds) of the impulse responses to simulate.
    pub duration: f32,

    /// Ambisonic order of the simulated energy fields.
    pub order: u32,

    /// Sources closer than this (in meters) to a surface are treated as being at this distance when computing irradiance.
    pub irradiance_min_distance: f32,
}

/// A reflection simulator.
///
/// The simulator does not run any rays itself when [`Self::simulate`] is called. It describes the work as
/// jobs in a [`JobGraph`], which the caller then executes on a [`ThreadPool`](crate::thread_pool::ThreadPool).
/// Once all jobs have completed, `energy_fields` hold the simulated energy, one per dispatched probe.
///
/// Energy fields may live in device memory (see [`EnergyField::device_buffer`]); simulators for GPU backends
/// write their results there and the caller copies them back to the host.
pub trait ReflectionSimulator {
    /// The scene rays are traced against.
    type Scene: ?Sized + Sync;

    /// Populates `job_graph` with the jobs that fill `energy_fields`.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError`] if the dispatch cannot be described.
    fn simulate<'a>(
        &'a self,
        scene: &'a Self::Scene,
        inputs: &SimulationInputs<'_>,
        energy_fields: &'a mut [EnergyField],
        job_graph: &mut JobGraph<'a>,
    ) -> Result<(), SimulationError>;
}

/// [`ReflectionSimulator`] errors.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// The inputs do not match what the simulator can handle.
    #[error("invalid simulation inputs: {0}")]
    InvalidInputs(String),

    /// The job graph could not be built.
    #[error(transparent)]
    JobGraph(#[from] JobGraphError),
}
