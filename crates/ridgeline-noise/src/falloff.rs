//! Square edge-distance falloff masks for island-style terrain.

/// A square attenuation field: 0 at the grid center rising to 1 on the
/// outer ring. Subtracting it from a height grid tapers terrain toward the
/// edges. Pure and seed-independent.
#[derive(Clone, Debug, PartialEq)]
pub struct FalloffMask {
    size: usize,
    values: Vec<f32>,
}

impl FalloffMask {
    /// Generate a `size x size` mask.
    ///
    /// Each axis maps linearly onto `[-1, 1]` with the endpoints on the
    /// borders; the cell value is `max(|x|, |y|)`, the distance to the
    /// nearest edge of the square.
    pub fn generate(size: usize) -> Self {
        let mut values = Vec::with_capacity(size * size);
        let span = (size.max(2) - 1) as f32;
        for y in 0..size {
            for x in 0..size {
                let fx = x as f32 / span * 2.0 - 1.0;
                let fy = y as f32 / span * 2.0 - 1.0;
                values.push(fx.abs().max(fy.abs()));
            }
        }
        Self { size, values }
    }

    /// Mask edge length in samples.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Read the attenuation at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `x >= size` or `y >= size`.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        assert!(x < self.size && y < self.size, "sample out of bounds");
        self.values[y * self.size + x]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_is_zero_for_odd_sizes() {
        for size in [3, 5, 241] {
            let mask = FalloffMask::generate(size);
            let mid = size / 2;
            assert_eq!(
                mask.get(mid, mid),
                0.0,
                "center of odd size {size} must be exactly 0"
            );
        }
    }

    #[test]
    fn test_outer_ring_is_one() {
        let size = 7;
        let mask = FalloffMask::generate(size);
        for i in 0..size {
            assert_eq!(mask.get(i, 0), 1.0);
            assert_eq!(mask.get(i, size - 1), 1.0);
            assert_eq!(mask.get(0, i), 1.0);
            assert_eq!(mask.get(size - 1, i), 1.0);
        }
    }

    #[test]
    fn test_monotonic_from_center_along_axes() {
        let size = 9;
        let mask = FalloffMask::generate(size);
        let mid = size / 2;
        let mut prev = mask.get(mid, mid);
        for x in mid + 1..size {
            let v = mask.get(x, mid);
            assert!(v >= prev, "falloff must not decrease toward the edge");
            prev = v;
        }
    }

    #[test]
    fn test_symmetric_about_center() {
        let size = 11;
        let mask = FalloffMask::generate(size);
        for y in 0..size {
            for x in 0..size {
                let mirrored = mask.get(size - 1 - x, size - 1 - y);
                assert_eq!(mask.get(x, y), mirrored);
            }
        }
    }
}
