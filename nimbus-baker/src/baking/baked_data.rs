//! Baked data types.

use crate::energy_field::EnergyField;
use crate::geometry::Sphere;
use crate::reverb::Reverb;

/// Identifies a “layer” of data stored in a probe batch.
/// Each probe batch may store multiple layers of data, such as reverb, static source reflections, or pathing.
/// Each layer can be accessed using an identifier.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum BakedDataIdentifier {
    /// Reflections.
    /// The source and listener positions used to compute the reflections data stored at each probe depends on the [`BakedDataVariation`] selected.
    Reflections {
        /// The way in which source and listener positions depend on probe position.
        variation: BakedDataVariation,
    },

    /// Pathing.
    /// The probe batch stores data about the shortest paths between any pair of probes in the batch.
    Pathing {
        /// The way in which source and listener positions depend on probe position.
        variation: BakedDataVariation,
    },
}

impl BakedDataIdentifier {
    /// Returns the variation of the layer.
    pub fn variation(&self) -> &BakedDataVariation {
        match self {
            Self::Reflections { variation } | Self::Pathing { variation } => variation,
        }
    }
}

/// The different ways in which the source and listener positions used to generate baked data can vary as a function of probe position.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum BakedDataVariation {
    /// At each probe, baked data is calculated with both the source and the listener at the probe position.
    /// This is useful for modeling traditional reverbs, which depend only on the listener’s position (or only on the source’s position).
    Reverb,

    /// At each probe, baked data is calculated with the source at some fixed position (specified separately), and the listener at the probe position.
    /// This is used for modeling reflections from a static source to any point within the probe batch.
    StaticSource {
        /// The static source used to generate baked data.
        /// Baked data is only stored for probes that lie within the radius of this sphere.
        endpoint_influence: Sphere,
    },

    /// At each probe, baked data is calculated with the source at the probe position, and the listener at some fixed position (specified separately).
    /// This is used for modeling reflections from a moving source to a static listener.
    StaticListener {
        /// The static listener used to generate baked data.
        /// Baked data is only stored for probes that lie within the radius of this sphere.
        endpoint_influence: Sphere,
    },

    /// Baked data is calculated for each pair of probes.
    /// For example, this is used for calculating paths between every pair of probes in a batch.
    Dynamic,
}

/// A layer of baked data.
#[derive(Debug)]
pub enum BakedData {
    /// Reflections data, one entry per probe.
    Reflections(BakedReflectionsData),
}

impl BakedData {
    /// Returns the number of probe slots in the layer.
    pub fn num_probes(&self) -> usize {
        match self {
            Self::Reflections(data) => data.num_probes(),
        }
    }

    /// Returns the reflections data of the layer, if it holds reflections.
    pub fn as_reflections(&self) -> Option<&BakedReflectionsData> {
        match self {
            Self::Reflections(data) => Some(data),
        }
    }

    pub(crate) fn resize(&mut self, num_probes: usize) {
        match self {
            Self::Reflections(data) => data.resize(num_probes),
        }
    }
}

/// Reflections baked at a single probe.
#[derive(Debug, Default)]
pub struct ProbeReflections {
    /// Parametric reverb, if parametric data was baked for this probe.
    pub reverb: Option<Reverb>,

    /// Energy field, if convolution data was baked for this probe.
    pub energy_field: Option<EnergyField>,
}

/// Reflections data stored in a probe batch, one slot per probe.
#[derive(Debug)]
pub struct BakedReflectionsData {
    has_convolution: bool,
    has_parametric: bool,
    probes: Vec<ProbeReflections>,
}

impl BakedReflectionsData {
    /// Creates a layer of `num_probes` empty slots.
    pub fn new(num_probes: usize, has_convolution: bool, has_parametric: bool) -> Self {
        let mut probes = Vec::with_capacity(num_probes);
        probes.resize_with(num_probes, ProbeReflections::default);

        Self {
            has_convolution,
            has_parametric,
            probes,
        }
    }

    pub fn num_probes(&self) -> usize {
        self.probes.len()
    }

    /// Returns `true` if the layer was last baked with convolution data.
    pub fn has_convolution(&self) -> bool {
        self.has_convolution
    }

    /// Returns `true` if the layer was last baked with parametric data.
    pub fn has_parametric(&self) -> bool {
        self.has_parametric
    }

    /// Returns the data stored for the probe at `probe_index`.
    pub fn probe(&self, probe_index: usize) -> Option<&ProbeReflections> {
        self.probes.get(probe_index)
    }

    /// Returns the parametric reverb stored for the probe at `probe_index`.
    pub fn reverb(&self, probe_index: usize) -> Option<&Reverb> {
        self.probe(probe_index)?.reverb.as_ref()
    }

    /// Returns the energy field stored for the probe at `probe_index`.
    pub fn energy_field(&self, probe_index: usize) -> Option<&EnergyField> {
        self.probe(probe_index)?.energy_field.as_ref()
    }

    pub(crate) fn set_has_convolution(&mut self, has_convolution: bool) {
        self.has_convolution = has_convolution;
    }

    pub(crate) fn set_has_parametric(&mut self, has_parametric: bool) {
        self.has_parametric = has_parametric;
    }

    pub(crate) fn set_reverb(&mut self, probe_index: usize, reverb: Reverb) {
        if let Some(probe) = self.probes.get_mut(probe_index) {
            probe.reverb = Some(reverb);
        }
    }

    pub(crate) fn set_energy_field(&mut self, probe_index: usize, energy_field: EnergyField) {
        if let Some(probe) = self.probes.get_mut(probe_index) {
            probe.energy_field = Some(energy_field);
        }
    }

    fn resize(&mut self, num_probes: usize) {
        self.probes
            .resize_with(num_probes, ProbeReflections::default);
    }
}
