//! How a ray tracing backend groups probes into dispatches.

use crate::ray_tracing::SceneType;

/// Where the source and listener of each dispatched probe are placed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum EndpointKind {
    /// Source and listener at the probe.
    Reverb,
    /// Fixed source, listener at the probe.
    StaticSource,
    /// Source at the probe, fixed listener.
    StaticListener,
}

/// Backend-dependent dispatch rules, chosen once per bake.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct DispatchPolicy {
    gpu: bool,
    endpoints: EndpointKind,
    batch_size: usize,
}

impl DispatchPolicy {
    pub(crate) fn select(
        scene_type: SceneType,
        endpoints: EndpointKind,
        requested_batch_size: usize,
    ) -> Self {
        let gpu = scene_type.is_gpu();

        // CPU backends trace one probe per dispatch unless the listener is shared.
        let batch_size = if gpu || endpoints == EndpointKind::StaticListener {
            requested_batch_size.max(1)
        } else {
            1
        };

        Self {
            gpu,
            endpoints,
            batch_size,
        }
    }

    /// Number of probes dispatched together.
    pub(crate) fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of sources and listeners handed to the simulator for a dispatch of `num_probes` probes.
    pub(crate) fn endpoint_counts(&self, num_probes: usize) -> (usize, usize) {
        if !self.gpu {
            return (num_probes, 1);
        }

        match self.endpoints {
            EndpointKind::StaticSource => (1, num_probes),
            EndpointKind::StaticListener => (num_probes, 1),
            EndpointKind::Reverb => (num_probes, num_probes),
        }
    }

    /// Whether simulated energy fields live in device memory and must be copied back after each dispatch.
    pub(crate) fn syncs_device(&self) -> bool {
        self.gpu
    }
}
