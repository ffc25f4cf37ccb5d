//! Plate geometry for the inner 60 wells of a 96-well plate.
//!
//! Only rows `B`–`G` and columns `2`–`11` are imaged; the outer ring holds
//! buffer. Canonical order is row-major with numeric columns
//! (`B2, B3, …, B11, C2, …, G11`), which is also the derived `Ord` of
//! [`WellAddress`] and the storage order of [`PlateGrid`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Plate rows in canonical order.
pub const PLATE_ROWS: [char; 6] = ['B', 'C', 'D', 'E', 'F', 'G'];
pub const FIRST_COLUMN: u8 = 2;
pub const LAST_COLUMN: u8 = 11;
pub const N_ROWS: usize = PLATE_ROWS.len();
pub const N_COLUMNS: usize = (LAST_COLUMN - FIRST_COLUMN + 1) as usize;
pub const N_WELLS: usize = N_ROWS * N_COLUMNS;

/// A canonical inner-well coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WellAddress {
    row: char,
    column: u8,
}

impl WellAddress {
    pub fn new(row: char, column: u8) -> Result<Self, AnalysisError> {
        if PLATE_ROWS.contains(&row) && (FIRST_COLUMN..=LAST_COLUMN).contains(&column) {
            Ok(Self { row, column })
        } else {
            Err(AnalysisError::InvalidWellLabel(format!("{row}{column}")))
        }
    }

    /// Build from zero-based grid indices (`row_index < 6`, `column_index < 10`).
    pub fn from_indices(row_index: usize, column_index: usize) -> Option<Self> {
        let row = *PLATE_ROWS.get(row_index)?;
        if column_index >= N_COLUMNS {
            return None;
        }
        Some(Self {
            row,
            column: FIRST_COLUMN + column_index as u8,
        })
    }

    pub fn row(self) -> char {
        self.row
    }

    pub fn column(self) -> u8 {
        self.column
    }

    pub fn row_index(self) -> usize {
        (self.row as u8 - b'B') as usize
    }

    pub fn column_index(self) -> usize {
        (self.column - FIRST_COLUMN) as usize
    }

    pub fn label(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for WellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row, self.column)
    }
}

impl FromStr for WellAddress {
    type Err = AnalysisError;

    /// Strict parse of a bare label such as `"C10"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AnalysisError::InvalidWellLabel(s.to_string());
        let mut chars = s.chars();
        let row = chars.next().ok_or_else(invalid)?;
        let column: u8 = chars.as_str().parse().map_err(|_| invalid())?;
        WellAddress::new(row, column).map_err(|_| invalid())
    }
}

/// All 60 inner wells in canonical order.
pub fn inner_wells() -> impl Iterator<Item = WellAddress> {
    PLATE_ROWS.iter().flat_map(|&row| {
        (FIRST_COLUMN..=LAST_COLUMN).map(move |column| WellAddress { row, column })
    })
}

/// Outcome of resolving a raw identifier (e.g. an image file name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WellLabel {
    Resolved(WellAddress),
    /// No canonical label matched; the identifier is passed through unchanged.
    Unmapped(String),
}

impl WellLabel {
    pub fn address(&self) -> Option<WellAddress> {
        match self {
            WellLabel::Resolved(addr) => Some(*addr),
            WellLabel::Unmapped(_) => None,
        }
    }
}

/// Find the first canonical well label contained in `raw`.
///
/// First match wins in canonical order.
pub fn try_resolve(raw: &str) -> Result<WellAddress, AnalysisError> {
    inner_wells()
        .find(|well| raw.contains(well.label().as_str()))
        .ok_or_else(|| AnalysisError::InvalidWellLabel(raw.to_string()))
}

/// Resolve an identifier, passing non-matching identifiers through unchanged.
pub fn resolve_well_label(raw: &str) -> WellLabel {
    match try_resolve(raw) {
        Ok(addr) => WellLabel::Resolved(addr),
        Err(_) => WellLabel::Unmapped(raw.to_string()),
    }
}

/// Dense row-major storage over the inner 60 wells.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateGrid<T> {
    cells: Vec<T>,
}

impl<T: Clone> PlateGrid<T> {
    pub fn filled(value: T) -> Self {
        Self {
            cells: vec![value; N_WELLS],
        }
    }
}

impl<T> PlateGrid<T> {
    fn offset(addr: WellAddress) -> usize {
        addr.row_index() * N_COLUMNS + addr.column_index()
    }

    pub fn get(&self, addr: WellAddress) -> &T {
        &self.cells[Self::offset(addr)]
    }

    pub fn get_mut(&mut self, addr: WellAddress) -> &mut T {
        &mut self.cells[Self::offset(addr)]
    }

    /// Iterate `(address, value)` in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (WellAddress, &T)> {
        inner_wells().zip(self.cells.iter())
    }

    /// One plate row (10 values, columns 2..=11).
    pub fn row(&self, row_index: usize) -> &[T] {
        let start = row_index * N_COLUMNS;
        &self.cells[start..start + N_COLUMNS]
    }

    pub fn map<U>(&self, f: impl Fn(&T) -> U) -> PlateGrid<U> {
        PlateGrid {
            cells: self.cells.iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn there_are_sixty_canonical_wells_in_row_major_order() {
        let wells: Vec<String> = inner_wells().map(WellAddress::label).collect();
        assert_eq!(wells.len(), 60);
        assert_eq!(wells[0], "B2");
        assert_eq!(wells[9], "B11");
        assert_eq!(wells[10], "C2");
        assert_eq!(wells[59], "G11");

        let mut sorted: Vec<WellAddress> = inner_wells().collect();
        sorted.sort();
        assert_eq!(sorted, inner_wells().collect::<Vec<_>>());
    }

    #[test]
    fn resolves_label_embedded_in_file_name() {
        let label = resolve_well_label("plate1_E10_s1_w1.tif");
        assert_eq!(label, WellLabel::Resolved(WellAddress::new('E', 10).unwrap()));
        assert_eq!(label.address().unwrap().row_index(), 3);
        assert_eq!(label.address().unwrap().column_index(), 8);
    }

    #[test]
    fn outer_wells_pass_through_unchanged() {
        assert_eq!(
            resolve_well_label("plate1_A1.tif"),
            WellLabel::Unmapped("plate1_A1.tif".to_string())
        );
        assert_eq!(
            resolve_well_label("H12"),
            WellLabel::Unmapped("H12".to_string())
        );
        assert!(matches!(
            try_resolve("nothing here"),
            Err(AnalysisError::InvalidWellLabel(_))
        ));
    }

    #[test]
    fn first_canonical_match_wins() {
        // Both B3 and C2 occur; B3 comes first in canonical order.
        let addr = try_resolve("C2_B3").unwrap();
        assert_eq!(addr.label(), "B3");
    }

    #[test]
    fn strict_parse_rejects_outer_wells() {
        assert_eq!("G11".parse::<WellAddress>().unwrap().label(), "G11");
        assert!("A1".parse::<WellAddress>().is_err());
        assert!("B12".parse::<WellAddress>().is_err());
        assert!("B".parse::<WellAddress>().is_err());
    }

    #[test]
    fn plate_grid_indexes_by_address() {
        let mut grid = PlateGrid::filled(0usize);
        let addr = WellAddress::new('D', 7).unwrap();
        *grid.get_mut(addr) = 42;
        assert_eq!(*grid.get(addr), 42);
        assert_eq!(grid.row(2)[5], 42);
        let found: Vec<_> = grid.iter().filter(|(_, v)| **v == 42).map(|(a, _)| a).collect();
        assert_eq!(found, vec![addr]);
    }
}
