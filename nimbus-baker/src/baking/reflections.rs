//! Reflections baking.

use super::policy::{DispatchPolicy, EndpointKind};
use super::session::BakeSession;
use super::{
    BakeError, BakedData, BakedDataIdentifier, BakedDataVariation, BakedReflectionsData,
    CancelHandle,
};
use crate::callback::ProgressCallback;
use crate::device::ComputeDevice;
use crate::energy_field::{EnergyField, EnergyFieldFactory, StoredEnergyField};
use crate::geometry::{CoordinateSystem, Sphere};
use crate::job_graph::JobGraph;
use crate::model::{AirAbsorptionModel, Directivity};
use crate::probe::ProbeBatch;
use crate::ray_tracing::{CustomRayTracer, DefaultRayTracer, Embree, RadeonRays, RayTracer};
use crate::reverb::ReverbEstimator;
use crate::simulator::{ReflectionSimulator, SimulationInputs};
use crate::thread_pool::ThreadPool;
use crate::wav::{MAX_SAMPLING_RATE, SampleFormat, WavSpec};
use log::{debug, info, warn};
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;

/// A baker of reflections.
///
/// Simulating reflections in real-time is a very compute-intensive process.
/// [`ReflectionsBaker`] lets you bake, or precompute reflections throughout a scene (or part of a scene) beforehand.
///
/// Reflections are baked at several points that you specify.
/// Each of these points is called a probe and belong to a [`ProbeBatch`].
///
/// Just like game engines use light probes to store the variation of lighting throughout a scene, acoustic probes store the variation of acoustic data (in this case, reflections) throughout a scene.
///
/// Each baker runs at most one bake at a time. Bakes can be cancelled from another thread through a [`CancelHandle`].
#[derive(Debug)]
pub struct ReflectionsBaker<T: RayTracer> {
    device: Option<Arc<dyn ComputeDevice>>,
    session: Arc<BakeSession>,
    _marker: PhantomData<T>,
}

impl ReflectionsBaker<DefaultRayTracer> {
    /// Creates a new [`ReflectionsBaker`].
    pub fn new() -> Self {
        Self::with_device(None)
    }
}

impl ReflectionsBaker<Embree> {
    /// Creates a new [`ReflectionsBaker`].
    pub fn new() -> Self {
        Self::with_device(None)
    }
}

impl ReflectionsBaker<RadeonRays> {
    /// Creates a new [`ReflectionsBaker`] whose energy fields are simulated in the memory of `device`.
    pub fn new(device: Arc<dyn ComputeDevice>) -> Self {
        Self::with_device(Some(device))
    }
}

impl ReflectionsBaker<CustomRayTracer> {
    /// Creates a new [`ReflectionsBaker`].
    pub fn new() -> Self {
        Self::with_device(None)
    }
}

impl<T: RayTracer> ReflectionsBaker<T> {
    fn with_device(device: Option<Arc<dyn ComputeDevice>>) -> Self {
        Self {
            device,
            session: Arc::default(),
            _marker: PhantomData,
        }
    }

    /// Bakes a single layer of reflections data in a probe batch.
    ///
    /// Only one bake can be in progress at any point in time.
    ///
    /// # Errors
    ///
    /// Returns [`BakeError`] if:
    /// - the parameters are invalid (nothing is touched in that case);
    /// - another bake operation is already in progress;
    /// - the simulation of a dispatch fails. Probes stored by earlier dispatches keep their data.
    pub fn bake<S: ReflectionSimulator>(
        &self,
        simulator: &S,
        scene: &S::Scene,
        probe_batch: &mut ProbeBatch,
        params: &ReflectionsBakeParams,
    ) -> Result<BakeReport, BakeError> {
        self.bake_with_optional_progress_callback(simulator, scene, probe_batch, params, None)
    }

    /// Bakes a single layer of reflections data in a probe batch, with a progress callback.
    ///
    /// The callback is called on the baking thread after each dispatch, with the fraction of probes examined so far.
    ///
    /// # Errors
    ///
    /// See [`Self::bake`].
    pub fn bake_with_progress_callback<S: ReflectionSimulator>(
        &self,
        simulator: &S,
        scene: &S::Scene,
        probe_batch: &mut ProbeBatch,
        params: &ReflectionsBakeParams,
        progress_callback: ProgressCallback,
    ) -> Result<BakeReport, BakeError> {
        self.bake_with_optional_progress_callback(
            simulator,
            scene,
            probe_batch,
            params,
            Some(progress_callback),
        )
    }

    /// Cancels the running bake, if any.
    ///
    /// The bake stops after the dispatch in flight has been stored.
    pub fn cancel_bake(&self) {
        self.session.cancel();
    }

    /// Returns a handle that can cancel bakes of this baker from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            session: Arc::clone(&self.session),
        }
    }

    /// Returns `true` while a bake is running.
    pub fn is_bake_in_progress(&self) -> bool {
        self.session.is_in_progress()
    }

    fn bake_with_optional_progress_callback<S: ReflectionSimulator>(
        &self,
        simulator: &S,
        scene: &S::Scene,
        probe_batch: &mut ProbeBatch,
        params: &ReflectionsBakeParams,
        mut progress_callback: Option<ProgressCallback>,
    ) -> Result<BakeReport, BakeError> {
        let endpoints = params.validate()?;
        let guard = self.session.begin()?;

        let policy = DispatchPolicy::select(
            T::SCENE_TYPE,
            endpoints.kind(),
            params.bake_batch_size as usize,
        );
        if policy.batch_size() < params.bake_batch_size as usize {
            warn!(
                "bake batch size {} ignored: {:?} bakes one probe per dispatch for {:?}",
                params.bake_batch_size,
                T::SCENE_TYPE,
                endpoints.kind(),
            );
        }

        let flags = params.bake_flags;
        let has_convolution = flags.contains(ReflectionsBakeFlags::BAKE_CONVOLUTION);
        let has_parametric = flags.contains(ReflectionsBakeFlags::BAKE_PARAMETRIC);
        let thread_pool = ThreadPool::new(params.num_threads as usize);

        let probes = probe_batch.probes().to_vec();
        let num_probes = probes.len();

        let layer = match probe_batch.data_or_insert_with(params.identifier, || {
            BakedData::Reflections(BakedReflectionsData::new(
                num_probes,
                has_convolution,
                has_parametric,
            ))
        }) {
            BakedData::Reflections(layer) => layer,
        };
        layer.set_has_convolution(has_convolution);
        layer.set_has_parametric(has_parametric);

        info!(
            "baking {:?} for {num_probes} probes ({:?}, batch size {}, {} threads)",
            params.identifier,
            T::SCENE_TYPE,
            policy.batch_size(),
            thread_pool.num_threads(),
        );

        let mut report = BakeReport::default();
        let mut batch = DispatchBatch::with_capacity(policy.batch_size());

        for (probe_index, probe) in probes.iter().enumerate() {
            match endpoints.frames(probe) {
                Some((source, listener)) => {
                    let energy_field = EnergyFieldFactory::create(
                        T::SCENE_TYPE,
                        params.simulated_duration,
                        params.order,
                        self.device.as_ref(),
                    )?;
                    batch.push(probe_index, source, listener, energy_field);
                }
                None => report.num_probes_skipped += 1,
            }

            let is_last = probe_index + 1 == num_probes;
            if batch.len() < policy.batch_size() && !is_last {
                continue;
            }

            if !batch.is_empty() {
                let num_baked = batch.len();
                self.dispatch(
                    simulator,
                    scene,
                    params,
                    &policy,
                    &thread_pool,
                    &mut batch,
                    layer,
                )?;
                report.num_dispatches += 1;
                report.num_probes_baked += num_baked;
            }

            if let Some(progress_callback) = progress_callback.as_mut() {
                progress_callback.call((probe_index + 1) as f32 / num_probes as f32);
            }

            if guard.take_cancel_request() {
                warn!(
                    "bake cancelled after {} of {num_probes} probes",
                    probe_index + 1
                );
                report.cancelled = true;
                break;
            }
        }

        info!(
            "baked {} probes in {} dispatches ({} skipped)",
            report.num_probes_baked, report.num_dispatches, report.num_probes_skipped,
        );

        Ok(report)
    }

    /// Simulates the probes of `batch`, stores their results in `layer`, and empties `batch`.
    #[allow(clippy::too_many_arguments)]
    fn dispatch<S: ReflectionSimulator>(
        &self,
        simulator: &S,
        scene: &S::Scene,
        params: &ReflectionsBakeParams,
        policy: &DispatchPolicy,
        thread_pool: &ThreadPool,
        batch: &mut DispatchBatch,
        layer: &mut BakedReflectionsData,
    ) -> Result<(), BakeError> {
        let (num_sources, num_listeners) = policy.endpoint_counts(batch.len());
        debug!(
            "dispatching probes {:?} ({num_sources} sources, {num_listeners} listeners)",
            batch.indices,
        );

        let inputs = SimulationInputs {
            sources: &batch.sources[..num_sources],
            listeners: &batch.listeners[..num_listeners],
            directivities: &batch.directivities[..num_sources],
            num_rays: params.num_rays,
            num_diffuse_samples: params.num_diffuse_samples,
            num_bounces: params.num_bounces,
            duration: params.simulated_duration,
            order: params.order,
            irradiance_min_distance: params.irradiance_min_distance,
        };

        {
            let mut job_graph = JobGraph::new();
            simulator.simulate(scene, &inputs, &mut batch.energy_fields, &mut job_graph)?;
            thread_pool.process(&mut job_graph)?;
        }

        if policy.syncs_device() {
            for energy_field in &mut batch.energy_fields {
                energy_field.copy_device_to_host()?;
            }
        }

        let flags = params.bake_flags;
        if flags.contains(ReflectionsBakeFlags::BAKE_PARAMETRIC) {
            for (&probe_index, energy_field) in batch.indices.iter().zip(&batch.energy_fields) {
                let reverb = ReverbEstimator::estimate(energy_field, &params.air_absorption);
                layer.set_reverb(probe_index, reverb);
            }
        }

        if flags.contains(ReflectionsBakeFlags::BAKE_CONVOLUTION) {
            let indices = batch.indices.iter().copied();
            for (probe_index, energy_field) in indices.zip(batch.energy_fields.drain(..)) {
                let stored = StoredEnergyField::transfer(
                    energy_field.into_host(),
                    params.simulated_duration,
                    params.saved_duration,
                )?;
                layer.set_energy_field(probe_index, stored.into_inner());

                if let (Some(export), Some(energy_field)) = (
                    params.impulse_response_export.as_ref(),
                    layer.energy_field(probe_index),
                ) {
                    export.export(probe_index, energy_field)?;
                }
            }
        }

        batch.clear();
        Ok(())
    }
}

/// Probes of one dispatch, along with their simulation inputs.
#[derive(Debug, Default)]
struct DispatchBatch {
    indices: Vec<usize>,
    sources: Vec<CoordinateSystem>,
    listeners: Vec<CoordinateSystem>,
    directivities: Vec<Directivity>,
    energy_fields: Vec<EnergyField>,
}

impl DispatchBatch {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            indices: Vec::with_capacity(capacity),
            sources: Vec::with_capacity(capacity),
            listeners: Vec::with_capacity(capacity),
            directivities: Vec::with_capacity(capacity),
            energy_fields: Vec::with_capacity(capacity),
        }
    }

    fn push(
        &mut self,
        probe_index: usize,
        source: CoordinateSystem,
        listener: CoordinateSystem,
        energy_field: EnergyField,
    ) {
        self.indices.push(probe_index);
        self.sources.push(source);
        self.listeners.push(listener);
        self.directivities.push(Directivity::default());
        self.energy_fields.push(energy_field);
    }

    fn len(&self) -> usize {
        self.indices.len()
    }

    fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    fn clear(&mut self) {
        self.indices.clear();
        self.sources.clear();
        self.listeners.clear();
        self.directivities.clear();
        self.energy_fields.clear();
    }
}

/// Where sources and listeners are placed for the probes of a bake.
#[derive(Debug, Copy, Clone, PartialEq)]
enum BakeEndpoints {
    Reverb,
    StaticSource(Sphere),
    StaticListener(Sphere),
}

impl BakeEndpoints {
    fn kind(&self) -> EndpointKind {
        match self {
            Self::Reverb => EndpointKind::Reverb,
            Self::StaticSource(_) => EndpointKind::StaticSource,
            Self::StaticListener(_) => EndpointKind::StaticListener,
        }
    }

    /// Returns the source and listener frames for `probe`, or `None` if the probe lies outside the endpoint's influence.
    fn frames(&self, probe: &Sphere) -> Option<(CoordinateSystem, CoordinateSystem)> {
        let at_probe = CoordinateSystem::from_origin(probe.center);

        match self {
            Self::Reverb => Some((at_probe, at_probe)),
            Self::StaticSource(influence) => influence
                .contains(probe.center)
                .then(|| (CoordinateSystem::from_origin(influence.center), at_probe)),
            Self::StaticListener(influence) => influence
                .contains(probe.center)
                .then(|| (at_probe, CoordinateSystem::from_origin(influence.center))),
        }
    }
}

/// Parameters used to control how reflections data is baked.
#[derive(Debug, Clone)]
pub struct ReflectionsBakeParams {
    /// An identifier for the data layer that should be baked.
    /// The identifier determines what data is simulated and stored at each probe.
    /// If the probe batch already contains data with this identifier, it will be overwritten.
    pub identifier: BakedDataIdentifier,

    /// The types of data to save for each probe.
    pub bake_flags: ReflectionsBakeFlags,

    /// The number of rays to trace from each listener position when baking.
    /// Increasing this number results in improved accuracy, at the cost of increased bake times.
    pub num_rays: u32,

    /// The number of directions to consider when generating diffusely-reflected rays when baking.
    /// Increasing this number results in slightly improved accuracy of diffuse reflections.
    pub num_diffuse_samples: u32,

    /// The number of times each ray is reflected off of solid geometry.
    /// Increasing this number results in longer reverb tails and improved accuracy, at the cost of increased bake times.
    pub num_bounces: u32,

    /// The length (in seconds) of the impulse responses to simulate.
    /// Increasing this number allows the baked data to represent longer reverb tails (and hence larger spaces), at the cost of increased memory usage while baking.
    pub simulated_duration: f32,

    /// The length (in seconds) of the impulse responses to save at each probe.
    /// Increasing this number allows the baked data to represent longer reverb tails (and hence larger spaces), at the cost of increased disk space usage and memory usage at run-time.
    ///
    /// It may be useful to set [`Self::saved_duration`] to be less than [`Self::simulated_duration`], especially if you plan to use hybrid reverb for rendering baked reflections.
    /// This way, the parametric reverb data is estimated using a longer IR, resulting in more accurate estimation, but only the early part of the IR can be saved for subsequent rendering.
    pub saved_duration: f32,

    /// Ambisonic order of the baked IRs.
    pub order: u32,

    /// Number of threads to use for baking.
    pub num_threads: u32,

    /// When calculating how much sound energy reaches a surface directly from a source, any source that is closer than [`Self::irradiance_min_distance`] to the surface is assumed to be at a distance of [`Self::irradiance_min_distance`], for the purposes of energy calculations.
    pub irradiance_min_distance: f32,

    /// If using Radeon Rays or if [`Self::identifier`] uses [`BakedDataVariation::StaticListener`], this is the number of probes for which data is baked simultaneously.
    /// Other configurations bake one probe at a time.
    pub bake_batch_size: u32,

    /// Air absorption applied when estimating parametric reverb.
    pub air_absorption: AirAbsorptionModel,

    /// If set, the impulse response of every stored energy field is also written to disk.
    pub impulse_response_export: Option<ImpulseResponseExport>,
}

impl Default for ReflectionsBakeParams {
    fn default() -> Self {
        Self {
            identifier: BakedDataIdentifier::Reflections {
                variation: BakedDataVariation::Reverb,
            },
            bake_flags: ReflectionsBakeFlags::BAKE_CONVOLUTION
                | ReflectionsBakeFlags::BAKE_PARAMETRIC,
            num_rays: 32768,
            num_diffuse_samples: 1024,
            num_bounces: 64,
            simulated_duration: 1.0,
            saved_duration: 1.0,
            order: 1,
            num_threads: std::thread::available_parallelism()
                .map_or(1, |num_threads| num_threads.get() as u32),
            irradiance_min_distance: 1.0,
            bake_batch_size: 1,
            air_absorption: AirAbsorptionModel::default(),
            impulse_response_export: None,
        }
    }
}

impl ReflectionsBakeParams {
    /// Checks the parameters and returns where sources and listeners go.
    fn validate(&self) -> Result<BakeEndpoints, BakeError> {
        if self.bake_flags.is_empty() {
            return Err(BakeError::NoBakeFlags);
        }

        let endpoints = match self.identifier {
            BakedDataIdentifier::Reflections { variation } => match variation {
                BakedDataVariation::Reverb => BakeEndpoints::Reverb,
                BakedDataVariation::StaticSource { endpoint_influence } => {
                    BakeEndpoints::StaticSource(endpoint_influence)
                }
                BakedDataVariation::StaticListener { endpoint_influence } => {
                    BakeEndpoints::StaticListener(endpoint_influence)
                }
                BakedDataVariation::Dynamic => return Err(BakeError::DynamicVariation),
            },
            BakedDataIdentifier::Pathing { .. } => {
                return Err(BakeError::UnsupportedDataType {
                    identifier: self.identifier,
                });
            }
        };

        check("num_rays", self.num_rays, self.num_rays >= 1)?;
        check("num_threads", self.num_threads, self.num_threads >= 1)?;
        check(
            "bake_batch_size",
            self.bake_batch_size,
            self.bake_batch_size >= 1,
        )?;
        check_duration("simulated_duration", self.simulated_duration)?;
        check_duration("saved_duration", self.saved_duration)?;
        check(
            "irradiance_min_distance",
            self.irradiance_min_distance,
            self.irradiance_min_distance.is_finite() && self.irradiance_min_distance >= 0.0,
        )?;

        if let Some(export) = &self.impulse_response_export {
            check(
                "impulse_response_export.sampling_rate",
                export.sampling_rate,
                (1..=MAX_SAMPLING_RATE).contains(&export.sampling_rate),
            )?;
        }

        Ok(endpoints)
    }
}

fn check(name: &'static str, value: impl ToString, valid: bool) -> Result<(), BakeError> {
    if valid {
        Ok(())
    } else {
        Err(BakeError::InvalidParameter {
            name,
            value: value.to_string(),
        })
    }
}

fn check_duration(name: &'static str, duration: f32) -> Result<(), BakeError> {
    check(name, duration, duration.is_finite() && duration > 0.0)
}

bitflags::bitflags! {
    /// Flags for specifying what types of reflections data to bake.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct ReflectionsBakeFlags: u32 {
        /// Bake energy fields, for convolution or hybrid reverb.
        const BAKE_CONVOLUTION = 1 << 0;

        /// Bake parametric reverb.
        const BAKE_PARAMETRIC = 1 << 1;
    }
}

/// Settings for writing baked impulse responses to disk, as WAV files.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseResponseExport {
    /// Directory the files are written to. Created if missing.
    pub directory: PathBuf,

    /// Sampling rate (in Hz) of the reconstructed impulse responses.
    pub sampling_rate: u32,

    /// Encoding of the exported samples.
    pub sample_format: SampleFormat,
}

impl ImpulseResponseExport {
    /// Exports 44.1 kHz float impulse responses to `directory`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            sampling_rate: 44100,
            sample_format: SampleFormat::default(),
        }
    }

    /// Returns the path of the file holding the impulse response of the probe at `probe_index`.
    pub fn path_for_probe(&self, probe_index: usize) -> PathBuf {
        self.directory
            .join(format!("impulse_response_{probe_index}.wav"))
    }

    fn export(&self, probe_index: usize, energy_field: &EnergyField) -> Result<(), BakeError> {
        let path = self.path_for_probe(probe_index);
        let spec = WavSpec {
            num_channels: 1,
            sampling_rate: self.sampling_rate,
            sample_format: self.sample_format,
        };

        let samples = energy_field.impulse_response(self.sampling_rate);
        crate::wav::export_wav(&path, &samples, &spec)
            .map_err(|source| BakeError::Export { path, source })
    }
}

/// Summary of a finished bake.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct BakeReport {
    /// Number of simulation dispatches run.
    pub num_dispatches: usize,

    /// Number of probes whose data was written.
    pub num_probes_baked: usize,

    /// Number of probes outside the endpoint's influence, left untouched.
    pub num_probes_skipped: usize,

    /// `true` if the bake stopped early because it was cancelled.
    pub cancelled: bool,
}
