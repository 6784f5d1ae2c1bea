//! OFDM resource grid: cell tagging and lattice addressing

use crate::{FrameError, Result};

/// The role a single (symbol, subcarrier) cell plays in the OFDM grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Data,
    Pilot,
    Zero,
    Config,
}

/// Last-column edge policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastColPolicy {
    /// The last subcarrier copies the tag of the first.
    CopyFirstCol,
    /// The last subcarrier is tagged independently (treated as `Zero`).
    Independent,
}

/// Pilot lattice parameters: pilots sit every `dx` symbols and `dy`
/// subcarriers, boosted in amplitude by `boost`.
#[derive(Debug, Clone, Copy)]
pub struct PilotLattice {
    pub dx: usize,
    pub dy: usize,
    pub boost: f64,
}

/// Full lattice description for one config preset, uniquely determining the
/// cell tag of every (symbol, subcarrier) position.
#[derive(Debug, Clone, Copy)]
pub struct Lattice {
    pub nc: usize,
    pub nsymb: usize,
    pub pilot: PilotLattice,
    pub first_col: CellKind,
    pub last_col: LastColPolicy,
    pub second_col: CellKind,
    pub first_row: CellKind,
    pub last_row: CellKind,
    /// Force the first OFDM symbol into an alternating-zero pattern.
    pub first_row_zeros: bool,
}

impl Lattice {
    pub fn new(nc: usize, nsymb: usize, pilot: PilotLattice) -> Result<Self> {
        if nc == 0 || nsymb == 0 {
            return Err(FrameError::InvalidFormat {
                msg: "grid dimensions must be non-zero".to_string(),
            });
        }
        Ok(Self {
            nc,
            nsymb,
            pilot,
            first_col: CellKind::Pilot,
            last_col: LastColPolicy::CopyFirstCol,
            second_col: CellKind::Data,
            first_row: CellKind::Config,
            last_row: CellKind::Data,
            first_row_zeros: true,
        })
    }

    /// Number of cells per OFDM symbol row.
    pub fn row_len(&self) -> usize {
        self.nc
    }

    /// Total cell count for the frame.
    pub fn total_cells(&self) -> usize {
        self.nc * self.nsymb
    }

    /// Determine the tag of cell (symbol index `t`, subcarrier index `f`).
    pub fn cell_kind(&self, t: usize, f: usize) -> CellKind {
        debug_assert!(t < self.nsymb && f < self.nc);

        if t == 0 {
            if self.first_row_zeros && f % 2 == 1 {
                return CellKind::Zero;
            }
            return self.first_row;
        }

        if f == self.nc - 1 {
            if let LastColPolicy::CopyFirstCol = self.last_col {
                return self.cell_kind(t, 0);
            }
        }

        if f == 0 {
            return self.first_col;
        }
        if f == 1 {
            return self.second_col;
        }
        if t == self.nsymb - 1 {
            return self.last_row;
        }

        if t % self.pilot.dx == 0 && f % self.pilot.dy == 0 {
            return CellKind::Pilot;
        }

        CellKind::Data
    }

    /// Count of cells of each kind, used to validate the frame invariant
    /// that commander and responder see an identical grid shape.
    pub fn kind_counts(&self) -> (usize, usize, usize, usize) {
        let (mut data, mut pilot, mut zero, mut config) = (0, 0, 0, 0);
        for t in 0..self.nsymb {
            for f in 0..self.nc {
                match self.cell_kind(t, f) {
                    CellKind::Data => data += 1,
                    CellKind::Pilot => pilot += 1,
                    CellKind::Zero => zero += 1,
                    CellKind::Config => config += 1,
                }
            }
        }
        (data, pilot, zero, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_lattice() -> Lattice {
        Lattice::new(16, 8, PilotLattice { dx: 2, dy: 4, boost: 1.5 }).unwrap()
    }

    #[test]
    fn every_cell_has_exactly_one_kind() {
        let lattice = test_lattice();
        for t in 0..lattice.nsymb {
            for f in 0..lattice.nc {
                let _ = lattice.cell_kind(t, f);
            }
        }
    }

    #[test]
    fn counts_are_stable_across_two_instances() {
        let a = test_lattice();
        let b = test_lattice();
        assert_eq!(a.kind_counts(), b.kind_counts());
    }

    #[test]
    fn last_col_copies_first_col_when_configured() {
        let lattice = test_lattice();
        for t in 1..lattice.nsymb - 1 {
            assert_eq!(lattice.cell_kind(t, lattice.nc - 1), lattice.cell_kind(t, 0));
        }
    }

    #[test]
    fn first_row_alternates_zero_when_enabled() {
        let lattice = test_lattice();
        for f in 0..lattice.nc {
            let kind = lattice.cell_kind(0, f);
            if f % 2 == 1 {
                assert_eq!(kind, CellKind::Zero);
            } else {
                assert_eq!(kind, CellKind::Config);
            }
        }
    }

    #[test]
    fn rejects_zero_dimensions() {
        assert!(Lattice::new(0, 8, PilotLattice { dx: 1, dy: 1, boost: 1.0 }).is_err());
    }
}
