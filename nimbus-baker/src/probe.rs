//! Acoustic probes and their baked data.

use crate::baking::{BakedData, BakedDataIdentifier, BakedReflectionsData};
use crate::geometry::Sphere;

/// A batch of sound probes, along with associated data.
///
/// Each probe has a position and a radius of influence.
/// The associated data may include reverb, reflections from a static source position, and more, stored as one layer per [`BakedDataIdentifier`].
///
/// Probes are added in two steps: [`Self::add_probe`] stages a probe, and [`Self::commit`] makes staged probes part of the batch.
/// Once committed, a probe keeps its index for the lifetime of the batch.
#[derive(Debug, Default)]
pub struct ProbeBatch {
    probes: Vec<Sphere>,
    staged: Vec<Sphere>,
    layers: Vec<(BakedDataIdentifier, BakedData)>,
}

impl ProbeBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a probe to a batch.
    /// The new probe will be added as the last probe in the batch once [`Self::commit`] is called.
    pub fn add_probe(&mut self, probe: Sphere) {
        self.staged.push(probe);
    }

    /// Adds every probe of `probes` to a batch, in order.
    pub fn add_probes(&mut self, probes: impl IntoIterator<Item = Sphere>) {
        self.staged.extend(probes);
    }

    /// Commits all probes added since this function was last called.
    /// Existing data layers grow with empty slots for the new probes.
    pub fn commit(&mut self) {
        if self.staged.is_empty() {
            return;
        }

        self.probes.append(&mut self.staged);
        let num_probes = self.probes.len();
        for (_, layer) in &mut self.layers {
            layer.resize(num_probes);
        }
    }

    /// Returns the number of committed probes.
    pub fn num_probes(&self) -> usize {
        self.probes.len()
    }

    pub fn probe(&self, probe_index: usize) -> Option<&Sphere> {
        self.probes.get(probe_index)
    }

    pub fn probes(&self) -> &[Sphere] {
        &self.probes
    }

    /// Returns `true` if the batch holds a layer for `identifier`.
    pub fn has_data(&self, identifier: &BakedDataIdentifier) -> bool {
        self.data(identifier).is_some()
    }

    /// Returns the layer stored for `identifier`.
    pub fn data(&self, identifier: &BakedDataIdentifier) -> Option<&BakedData> {
        self.layers
            .iter()
            .find(|(id, _)| id == identifier)
            .map(|(_, layer)| layer)
    }

    pub fn data_mut(&mut self, identifier: &BakedDataIdentifier) -> Option<&mut BakedData> {
        self.layers
            .iter_mut()
            .find(|(id, _)| id == identifier)
            .map(|(_, layer)| layer)
    }

    /// Returns the reflections layer stored for `identifier`.
    pub fn reflections(&self, identifier: &BakedDataIdentifier) -> Option<&BakedReflectionsData> {
        self.data(identifier)?.as_reflections()
    }

    /// Returns the identifiers of every layer in the batch.
    pub fn identifiers(&self) -> impl Iterator<Item = &BakedDataIdentifier> {
        self.layers.iter().map(|(id, _)| id)
    }

    /// Removes the layer stored for `identifier` and returns it.
    pub fn remove_data(&mut self, identifier: &BakedDataIdentifier) -> Option<BakedData> {
        let position = self.layers.iter().position(|(id, _)| id == identifier)?;
        Some(self.layers.swap_remove(position).1)
    }

    /// Returns the layer for `identifier`, creating it with `create` if the batch has none.
    pub(crate) fn data_or_insert_with(
        &mut self,
        identifier: BakedDataIdentifier,
        create: impl FnOnce() -> BakedData,
    ) -> &mut BakedData {
        let position = match self.layers.iter().position(|(id, _)| *id == identifier) {
            Some(position) => position,
            None => {
                self.layers.push((identifier, create()));
                self.layers.len() - 1
            }
        };

        &mut self.layers[position].1
    }
}
