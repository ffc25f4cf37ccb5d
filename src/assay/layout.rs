//! Condition-group partitions of the plate for each experiment type.
//!
//! A band is the unit of independent normalization: every group in a band is
//! divided by the band's vehicle group (always group 0).

use crate::assay::plate::{inner_wells, WellAddress, N_COLUMNS, PLATE_ROWS};

/// Where the replicate values of a group come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicateSource {
    /// One value per well (the mean over that well's images).
    Wells,
    /// One value per image of the group's wells.
    Images,
}

/// Wells sharing one dose assignment within one band.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionGroup {
    /// Dose index within the band; 0 is the vehicle.
    pub index: usize,
    pub wells: Vec<WellAddress>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BandLayout {
    pub name: String,
    pub replicates: ReplicateSource,
    pub groups: Vec<ConditionGroup>,
}

impl BandLayout {
    pub fn vehicle(&self) -> Option<&ConditionGroup> {
        self.groups.first()
    }
}

/// Rows B–D of a single-gradient plate.
pub const UPPER_ROWS: std::ops::Range<usize> = 0..3;
/// Rows E–G of a single-gradient plate.
pub const LOWER_ROWS: std::ops::Range<usize> = 3..6;

/// Single-gradient plate: two bands of triplicate rows, one group per column.
pub fn gda_bands(upper_name: &str, lower_name: &str) -> [BandLayout; 2] {
    [
        column_band(upper_name, UPPER_ROWS),
        column_band(lower_name, LOWER_ROWS),
    ]
}

fn column_band(name: &str, rows: std::ops::Range<usize>) -> BandLayout {
    let groups = (0..N_COLUMNS)
        .map(|column_index| ConditionGroup {
            index: column_index,
            wells: rows
                .clone()
                .filter_map(|row_index| WellAddress::from_indices(row_index, column_index))
                .collect(),
        })
        .collect();
    BandLayout {
        name: name.to_string(),
        replicates: ReplicateSource::Wells,
        groups,
    }
}

/// Combination plate: every well is its own group, replicated by its images.
///
/// Group order is canonical, so group 0 is `B2`, the combined vehicle.
pub fn synergy_band(name: &str) -> BandLayout {
    let groups = inner_wells()
        .enumerate()
        .map(|(index, well)| ConditionGroup {
            index,
            wells: vec![well],
        })
        .collect();
    BandLayout {
        name: name.to_string(),
        replicates: ReplicateSource::Images,
        groups,
    }
}

/// Row labels of a band's wells, top to bottom.
pub fn band_rows(rows: std::ops::Range<usize>) -> Vec<char> {
    rows.filter_map(|i| PLATE_ROWS.get(i).copied()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gda_bands_are_column_triplicates() {
        let [upper, lower] = gda_bands("A549", "H1299");
        assert_eq!(upper.groups.len(), 10);
        assert_eq!(lower.groups.len(), 10);

        let vehicle = upper.vehicle().unwrap();
        let labels: Vec<String> = vehicle.wells.iter().map(|w| w.label()).collect();
        assert_eq!(labels, vec!["B2", "C2", "D2"]);

        let top = &lower.groups[9];
        let labels: Vec<String> = top.wells.iter().map(|w| w.label()).collect();
        assert_eq!(labels, vec!["E11", "F11", "G11"]);
        assert_eq!(upper.replicates, ReplicateSource::Wells);
    }

    #[test]
    fn synergy_band_has_one_group_per_well() {
        let band = synergy_band("combo");
        assert_eq!(band.groups.len(), 60);
        assert_eq!(band.vehicle().unwrap().wells[0].label(), "B2");
        assert_eq!(band.groups[59].wells[0].label(), "G11");
        assert_eq!(band.replicates, ReplicateSource::Images);
    }

    #[test]
    fn band_row_labels() {
        assert_eq!(band_rows(UPPER_ROWS), vec!['B', 'C', 'D']);
        assert_eq!(band_rows(LOWER_ROWS), vec!['E', 'F', 'G']);
    }
}
