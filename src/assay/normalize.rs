//! Normalization of replicate counts to a vehicle control.
//!
//! Steps, per band:
//! 1. mean count per well over its images ([`WellCounts`])
//! 2. mean of the replicate values of each condition group
//! 3. vehicle value = condition mean of group 0
//! 4. every well / condition mean divided by the vehicle value
//! 5. sample SD of the normalized replicate values of each condition
//!
//! The vehicle condition's normalized mean is `v / v`, exactly `1.0` for any
//! finite non-zero `v`; zero or non-finite vehicles are rejected.

use tracing::{debug, warn};

use crate::assay::layout::{BandLayout, ReplicateSource};
use crate::assay::plate::{PlateGrid, WellAddress};
use crate::domain::NucleiObservation;
use crate::error::AnalysisError;
use crate::math::{mean, sample_sd};

/// Image counts grouped by well.
#[derive(Debug, Clone, PartialEq)]
pub struct WellCounts {
    images: PlateGrid<Vec<f64>>,
}

impl WellCounts {
    pub fn from_observations(observations: &[NucleiObservation]) -> Self {
        let mut images = PlateGrid::filled(Vec::new());
        for obs in observations {
            images.get_mut(obs.well).push(obs.count);
        }
        Self { images }
    }

    pub fn images(&self, well: WellAddress) -> &[f64] {
        self.images.get(well)
    }

    /// Arithmetic mean over the well's images.
    pub fn mean(&self, well: WellAddress) -> Option<f64> {
        mean(self.images.get(well))
    }

    /// Sample SD over the well's images (raw counts).
    pub fn image_sd(&self, well: WellAddress) -> Option<f64> {
        sample_sd(self.images.get(well))
    }

    pub fn means(&self) -> PlateGrid<Option<f64>> {
        self.images.map(|v| mean(v))
    }

    pub fn observed_wells(&self) -> usize {
        self.images.iter().filter(|(_, v)| !v.is_empty()).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedCondition {
    /// Dose index within the band; 0 is the vehicle.
    pub index: usize,
    /// Mean of the raw replicate values (`NaN` if the group had none).
    pub raw_mean: f64,
    /// Normalized mean (`NaN` if the group had none).
    pub mean: f64,
    /// Sample SD of the normalized replicates; absent with fewer than 2.
    pub sd: Option<f64>,
    pub replicates: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedBand {
    pub name: String,
    pub vehicle: f64,
    pub conditions: Vec<NormalizedCondition>,
    /// Normalized per-well means, in group order.
    pub wells: Vec<(WellAddress, f64)>,
    /// Per-condition problems that did not stop the band.
    pub warnings: Vec<AnalysisError>,
}

impl NormalizedBand {
    pub fn means(&self) -> Vec<f64> {
        self.conditions.iter().map(|c| c.mean).collect()
    }

    pub fn sds(&self) -> Vec<Option<f64>> {
        self.conditions.iter().map(|c| c.sd).collect()
    }

    pub fn well_value(&self, well: WellAddress) -> Option<f64> {
        self.wells.iter().find(|(w, _)| *w == well).map(|(_, v)| *v)
    }
}

/// Normalize one band of condition groups to its vehicle group.
///
/// Fails with [`AnalysisError::DegenerateControl`] when the vehicle mean is
/// zero, non-finite or missing. Missing conditions and conditions with fewer
/// than two replicates are recorded as warnings.
pub fn normalize_band(counts: &WellCounts, layout: &BandLayout) -> Result<NormalizedBand, AnalysisError> {
    let mut warnings = Vec::new();

    let raw: Vec<Vec<f64>> = layout
        .groups
        .iter()
        .map(|group| match layout.replicates {
            ReplicateSource::Wells => group.wells.iter().filter_map(|w| counts.mean(*w)).collect(),
            ReplicateSource::Images => group
                .wells
                .iter()
                .flat_map(|w| counts.images(*w).iter().copied())
                .collect(),
        })
        .collect();

    let raw_means: Vec<f64> = raw.iter().map(|values| mean(values).unwrap_or(f64::NAN)).collect();

    let vehicle = raw_means.first().copied().unwrap_or(f64::NAN);
    if !(vehicle.is_finite() && vehicle != 0.0) {
        return Err(AnalysisError::DegenerateControl {
            condition: layout.name.clone(),
            value: vehicle,
        });
    }
    debug!(band = %layout.name, vehicle, "Vehicle control established.");

    let mut conditions = Vec::with_capacity(layout.groups.len());
    for ((group, values), raw_mean) in layout.groups.iter().zip(&raw).zip(&raw_means) {
        if values.is_empty() {
            let err = AnalysisError::EmptyCondition {
                condition: layout.name.clone(),
                index: group.index,
            };
            warn!("{err}");
            warnings.push(err);
        }

        let replicates: Vec<f64> = values.iter().map(|v| v / vehicle).collect();
        let sd = sample_sd(&replicates);
        if sd.is_none() && !values.is_empty() {
            let err = AnalysisError::InsufficientReplicates {
                condition: layout.name.clone(),
                index: group.index,
                found: values.len(),
            };
            match layout.replicates {
                ReplicateSource::Wells => {
                    warn!("{err}");
                    warnings.push(err);
                }
                // Image-replicate SDs are not reported downstream.
                ReplicateSource::Images => debug!("{err}"),
            }
        }

        conditions.push(NormalizedCondition {
            index: group.index,
            raw_mean: *raw_mean,
            mean: raw_mean / vehicle,
            sd,
            replicates,
        });
    }

    let wells = layout
        .groups
        .iter()
        .flat_map(|group| group.wells.iter())
        .filter_map(|w| counts.mean(*w).map(|m| (*w, m / vehicle)))
        .collect();

    debug!(band = %layout.name, "Condition means normalized to vehicle.");

    Ok(NormalizedBand {
        name: layout.name.clone(),
        vehicle,
        conditions,
        wells,
        warnings,
    })
}
