#![allow(dead_code)]

use nimbus_baker::*;
use std::sync::{Arc, Mutex};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A room whose energy decays exponentially, at a fixed rate per band.
#[derive(Debug, Clone, Copy)]
pub struct ShoeboxRoom {
    pub reverb_times: [f32; NUM_BANDS],
}

impl Default for ShoeboxRoom {
    fn default() -> Self {
        Self {
            reverb_times: [0.8, 0.6, 0.4],
        }
    }
}

impl ShoeboxRoom {
    /// Energy reaching `listener` from `source`, laid out like [`EnergyField::data`].
    pub fn energy(
        &self,
        source: Point,
        listener: Point,
        num_channels: usize,
        num_bins: usize,
    ) -> Vec<f32> {
        let gain = 1.0 / (1.0 + source.distance(listener));
        let mut energy = Vec::with_capacity(num_channels * NUM_BANDS * num_bins);

        for channel in 0..num_channels {
            for band in 0..NUM_BANDS {
                for bin in 0..num_bins {
                    let time = bin as f32 * BIN_DURATION;
                    let decay = 10.0f32.powf(-6.0 * time / self.reverb_times[band]);
                    energy.push(gain * decay / (1 + channel) as f32);
                }
            }
        }

        energy
    }
}

/// What the simulator was asked to do in one dispatch.
#[derive(Debug, Clone)]
pub struct DispatchRecord {
    pub sources: Vec<Point>,
    pub listeners: Vec<Point>,
    pub num_directivities: usize,
    pub num_energy_fields: usize,
    pub device_resident: bool,
    pub data_ptrs: Vec<usize>,
}

/// A deterministic simulator that traces a [`ShoeboxRoom`] with two jobs per energy field:
/// one computing the energy, and a dependent one writing it to the field (or to its device buffer,
/// which is cleared first).
#[derive(Debug, Default)]
pub struct ShoeboxSimulator {
    dispatches: Mutex<Vec<DispatchRecord>>,
    failing_dispatch: Option<usize>,
}

impl ShoeboxSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A simulator whose jobs fail during the dispatch at `dispatch_index`.
    pub fn failing_at(dispatch_index: usize) -> Self {
        Self {
            failing_dispatch: Some(dispatch_index),
            ..Self::default()
        }
    }

    pub fn dispatches(&self) -> Vec<DispatchRecord> {
        self.dispatches.lock().unwrap().clone()
    }
}

impl ReflectionSimulator for ShoeboxSimulator {
    type Scene = ShoeboxRoom;

    fn simulate<'a>(
        &'a self,
        scene: &'a ShoeboxRoom,
        inputs: &SimulationInputs<'_>,
        energy_fields: &'a mut [EnergyField],
        job_graph: &mut JobGraph<'a>,
    ) -> Result<(), SimulationError> {
        if inputs.sources.is_empty()
            || inputs.listeners.is_empty()
            || inputs.directivities.len() != inputs.sources.len()
        {
            return Err(SimulationError::InvalidInputs(format!(
                "{} sources, {} listeners, {} directivities",
                inputs.sources.len(),
                inputs.listeners.len(),
                inputs.directivities.len()
            )));
        }

        let dispatch_index = {
            let mut dispatches = self.dispatches.lock().unwrap();
            dispatches.push(DispatchRecord {
                sources: inputs.sources.iter().map(|frame| frame.origin).collect(),
                listeners: inputs.listeners.iter().map(|frame| frame.origin).collect(),
                num_directivities: inputs.directivities.len(),
                num_energy_fields: energy_fields.len(),
                device_resident: energy_fields.iter().all(EnergyField::is_device_resident),
                data_ptrs: energy_fields
                    .iter()
                    .map(|energy_field| energy_field.data().as_ptr() as usize)
                    .collect(),
            });
            dispatches.len() - 1
        };
        let fail = self.failing_dispatch == Some(dispatch_index);

        for (index, energy_field) in energy_fields.iter_mut().enumerate() {
            let source = inputs.sources[index.min(inputs.sources.len() - 1)].origin;
            let listener = inputs.listeners[index.min(inputs.listeners.len() - 1)].origin;
            let num_channels = energy_field.num_channels();
            let num_bins = energy_field.num_bins();
            let scratch = Arc::new(Mutex::new(Vec::new()));

            let trace = {
                let scratch = Arc::clone(&scratch);
                job_graph.add_job(move || {
                    if fail {
                        return Err(JobError::new("ray tracing failed"));
                    }
                    *scratch.lock().unwrap() =
                        scene.energy(source, listener, num_channels, num_bins);
                    Ok(())
                })
            };

            job_graph.add_job_with_dependencies(&[trace], move || {
                let energy = std::mem::take(&mut *scratch.lock().unwrap());
                match energy_field.device_buffer() {
                    Some(buffer) => buffer
                        .clear()
                        .and_then(|()| buffer.write(0, &energy))
                        .map_err(|error| JobError::new(error.to_string())),
                    None => {
                        energy_field.data_mut().copy_from_slice(&energy);
                        Ok(())
                    }
                }
            })?;
        }

        Ok(())
    }
}

/// Probes of radius 1 spaced 1 m apart along the x axis, starting at the origin.
pub fn probe_batch(num_probes: usize) -> ProbeBatch {
    let mut probe_batch = ProbeBatch::new();
    probe_batch.add_probes(
        (0..num_probes).map(|index| Sphere::new(Point::new(index as f32, 1.5, 0.0), 1.0)),
    );
    probe_batch.commit();
    probe_batch
}

pub fn probe_center(index: usize) -> Point {
    Point::new(index as f32, 1.5, 0.0)
}

pub const REVERB: BakedDataIdentifier = BakedDataIdentifier::Reflections {
    variation: BakedDataVariation::Reverb,
};

/// Cheap parameters baking both convolution and parametric data.
pub fn bake_params(identifier: BakedDataIdentifier) -> ReflectionsBakeParams {
    ReflectionsBakeParams {
        identifier,
        num_rays: 1024,
        num_diffuse_samples: 32,
        num_bounces: 8,
        simulated_duration: 1.0,
        saved_duration: 1.0,
        num_threads: 2,
        bake_batch_size: 4,
        ..Default::default()
    }
}

/// Records every progress fraction reported.
pub fn progress_recorder() -> (ProgressCallback, Arc<Mutex<Vec<f32>>>) {
    let progress = Arc::new(Mutex::new(Vec::new()));
    let callback = {
        let progress = Arc::clone(&progress);
        ProgressCallback::new(move |fraction| progress.lock().unwrap().push(fraction))
    };
    (callback, progress)
}

pub fn software_device() -> (Arc<SoftwareDevice>, Arc<dyn ComputeDevice>) {
    let software_device = Arc::new(SoftwareDevice::new());
    let device: Arc<dyn ComputeDevice> = software_device.clone();
    (software_device, device)
}
