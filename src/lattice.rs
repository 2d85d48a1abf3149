use rand::prelude::*;

use crate::topology::Topology;

/// External bias term, either uniform or one value per site.
///
/// A scalar field and a per-site field share all energy and sampling logic;
/// the variant is only consulted at lookup time.
#[derive(Debug, Clone)]
pub enum ExternalField {
    Scalar(f64),
    PerSite(Vec<f64>),
}

/// Binary spin grid over a discrete torus.
///
/// Spins are stored row-major, every element exactly +1 or -1. Coordinates
/// are (x, y) = (column, row) with index y * width + x.
#[derive(Debug)]
pub struct IsingLattice {
    pub height: usize,
    pub width: usize,
    pub spins: Vec<i8>,
    pub field: ExternalField,
    pub inv_temp: f64,
    pub topology: Topology,
}

impl IsingLattice {
    /// All spins start at +1.
    pub fn new(
        height: usize,
        width: usize,
        field: ExternalField,
        inv_temp: f64,
        topology: Topology,
    ) -> Self {
        if let ExternalField::PerSite(values) = &field {
            assert_eq!(
                values.len(),
                height * width,
                "per-site field length must equal height * width"
            );
        }
        assert!(inv_temp >= 0.0, "inverse temperature must be non-negative");

        Self {
            height,
            width,
            spins: vec![1; height * width],
            field,
            inv_temp,
            topology,
        }
    }

    pub fn num_sites(&self) -> usize {
        self.height * self.width
    }

    #[inline]
    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    pub fn spin(&self, x: usize, y: usize) -> i8 {
        self.spins[self.index(x, y)]
    }

    /// In-place spin write; value outside {-1, +1} is a programming error.
    pub fn set_spin(&mut self, x: usize, y: usize, value: i8) {
        assert!(value == 1 || value == -1, "spin must be +1 or -1, got {}", value);
        let idx = self.index(x, y);
        self.spins[idx] = value;
    }

    /// Bulk warm start, e.g. from an observed noisy grid.
    pub fn set_spins(&mut self, spins: &[i8]) {
        assert_eq!(spins.len(), self.num_sites(), "grid dimension mismatch");
        assert!(
            spins.iter().all(|&s| s == 1 || s == -1),
            "every spin must be +1 or -1"
        );
        self.spins.copy_from_slice(spins);
    }

    /// Independent uniform +1/-1 draw at every site.
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for s in &mut self.spins {
            *s = (rng.random_range(0..2i8) * 2) - 1;
        }
    }

    pub fn field_at(&self, x: usize, y: usize) -> f64 {
        match &self.field {
            ExternalField::Scalar(h) => *h,
            ExternalField::PerSite(values) => values[y * self.width + x],
        }
    }

    /// External field at (x, y) plus the sum of neighbor spins.
    pub fn local_field(&self, x: usize, y: usize) -> f64 {
        let mut coupling = 0i32;
        for &(dx, dy) in self.topology.offsets() {
            let nx = (x as isize + dx).rem_euclid(self.width as isize) as usize;
            let ny = (y as isize + dy).rem_euclid(self.height as isize) as usize;
            coupling += i32::from(self.spins[ny * self.width + nx]);
        }
        self.field_at(x, y) + f64::from(coupling)
    }

    /// -sum field * spin - (1/2) sum spin * (neighbor spin sum).
    ///
    /// The 1/2 corrects for counting each undirected coupling from both
    /// endpoints. O(sites * neighbors); diagnostics and tiny lattices only,
    /// never the sampling hot path.
    pub fn total_energy(&self) -> f64 {
        let mut energy = 0.0;
        for y in 0..self.height {
            for x in 0..self.width {
                let s = f64::from(self.spin(x, y));
                let neighbor_sum = self.local_field(x, y) - self.field_at(x, y);
                energy -= self.field_at(x, y) * s;
                energy -= 0.5 * s * neighbor_sum;
            }
        }
        energy
    }

    /// exp(-inv_temp * total_energy()). Proportional to the Boltzmann
    /// probability of the configuration, not normalized by the partition
    /// function.
    pub fn unnormalized_probability(&self) -> f64 {
        (-self.inv_temp * self.total_energy()).exp()
    }

    /// Decodes n < 2^(height * width) into a spin grid, big-endian bit order
    /// over the row-major site sequence, bit 1 -> +1 and bit 0 -> -1.
    ///
    /// The bit-length is strictly height * width. Used for exhaustive
    /// enumeration over tiny lattices; requires height * width <= 64.
    pub fn from_index(&mut self, n: u64) {
        let n_sites = self.num_sites();
        assert!(n_sites <= 64, "index codec limited to 64 sites");
        if n_sites < 64 {
            assert!(n < (1u64 << n_sites), "index exceeds 2^(height * width)");
        }
        for i in 0..n_sites {
            let bit = (n >> (n_sites - 1 - i)) & 1;
            self.spins[i] = if bit == 1 { 1 } else { -1 };
        }
    }

    /// Exact inverse of `from_index`.
    pub fn to_index(&self) -> u64 {
        let n_sites = self.num_sites();
        assert!(n_sites <= 64, "index codec limited to 64 sites");
        let mut n = 0u64;
        for &s in &self.spins {
            n = (n << 1) | u64::from(s == 1);
        }
        n
    }
}
