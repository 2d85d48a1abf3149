// NB 4-neighbor offsets: left, right, up, down.
const OFFSETS_FOUR: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

// NB 8-neighbor adds the diagonals.
const OFFSETS_EIGHT: [(isize, isize); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (1, -1),
    (-1, 1),
    (1, 1),
];

/// Neighbor connectivity over the toroidal lattice.
///
/// Periodic wraparound gives every site a uniform-degree neighborhood, so
/// there are no boundary special cases anywhere in the energy or sampling
/// code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    Four,
    Eight,
}

impl Topology {
    pub fn offsets(&self) -> &'static [(isize, isize)] {
        match self {
            Topology::Four => &OFFSETS_FOUR,
            Topology::Eight => &OFFSETS_EIGHT,
        }
    }

    pub fn degree(&self) -> usize {
        self.offsets().len()
    }

    /// Neighbor coordinates of (x, y), each component reduced modulo the
    /// lattice dimensions. Out-of-range inputs wrap rather than error.
    pub fn neighbors(&self, x: usize, y: usize, height: usize, width: usize) -> Vec<(usize, usize)> {
        self.offsets()
            .iter()
            .map(|&(dx, dy)| {
                let nx = (x as isize + dx).rem_euclid(width as isize) as usize;
                let ny = (y as isize + dy).rem_euclid(height as isize) as usize;
                (nx, ny)
            })
            .collect()
    }
}
