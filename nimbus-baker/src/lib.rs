//! Offline baking of acoustic reflections.
//!
//! Given a static scene and a [`ProbeBatch`] of sample points, a [`ReflectionsBaker`] precomputes, for every probe,
//! an [`EnergyField`] (for convolution reverb) and/or a parametric [`Reverb`], so that a real-time engine can look
//! them up instead of ray tracing at playback time.
//!
//! The ray tracing itself is delegated to a [`ReflectionSimulator`], which describes each dispatch as a
//! [`JobGraph`] executed on a [`ThreadPool`].

pub mod baking;
pub use baking::*;

pub mod callback;
pub use callback::ProgressCallback;

pub mod device;
pub use device::{BufferId, ComputeDevice, DeviceBuffer, DeviceError, SoftwareDevice};

pub mod energy_field;
pub use energy_field::{
    BIN_DURATION, EnergyField, EnergyFieldError, EnergyFieldFactory, EnergyFieldSettings,
    StoredEnergyField,
};

pub mod geometry;
pub use geometry::{CoordinateSystem, Point, Sphere, Vector3};

pub mod job_graph;
pub use job_graph::{Job, JobError, JobGraph, JobGraphError, JobId};

pub mod model;
pub use model::*;

pub mod probe;
pub use probe::ProbeBatch;

pub mod ray_tracing;
pub use ray_tracing::{
    CustomRayTracer, DefaultRayTracer, Embree, RadeonRays, RayTracer, SceneType,
};

pub mod reverb;
pub use reverb::{Reverb, ReverbEstimator};

pub mod simulator;
pub use simulator::{ReflectionSimulator, SimulationError, SimulationInputs};

pub mod thread_pool;
pub use thread_pool::ThreadPool;

pub mod wav;

/// Number of frequency bands (low, mid, high) simulated for every energy field.
pub const NUM_BANDS: usize = 3;

mod sealed {
    pub trait Sealed {}
}
use sealed::Sealed;
