//! Height remap curves over the normalized [0, 1] domain.

/// One keyframe of a [`HeightCurve`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CurveKey {
    /// Position in the [0, 1] input domain.
    pub t: f32,
    /// Curve value at `t`.
    pub value: f32,
}

impl CurveKey {
    /// Convenience constructor.
    pub fn new(t: f32, value: f32) -> Self {
        Self { t, value }
    }
}

/// A piecewise-linear remapping applied to normalized heights before the
/// height multiplier. Monotonic by convention, not by requirement; the
/// input domain is always clamped to [0, 1].
///
/// Typical use flattens the water band: keys `(0,0) (0.4,0) (1,1)` keep
/// everything below 0.4 at sea level.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightCurve {
    keys: Vec<CurveKey>,
}

impl HeightCurve {
    /// The identity curve: output equals input.
    pub fn identity() -> Self {
        Self {
            keys: vec![CurveKey::new(0.0, 0.0), CurveKey::new(1.0, 1.0)],
        }
    }

    /// Build a curve from keyframes. Keys are sorted by `t` and their
    /// positions clamped into [0, 1]; an empty key list yields the identity.
    pub fn from_keys(mut keys: Vec<CurveKey>) -> Self {
        if keys.is_empty() {
            return Self::identity();
        }
        for key in &mut keys {
            key.t = key.t.clamp(0.0, 1.0);
        }
        keys.sort_by(|a, b| a.t.total_cmp(&b.t));
        Self { keys }
    }

    /// Evaluate the curve at `t` (clamped to [0, 1]).
    ///
    /// Outside the first/last key the nearest key's value extends flatly.
    pub fn evaluate(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);

        let first = self.keys[0];
        if t <= first.t {
            return first.value;
        }
        for pair in self.keys.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t <= b.t {
                let span = b.t - a.t;
                if span <= 0.0 {
                    return b.value;
                }
                let s = (t - a.t) / span;
                return a.value + (b.value - a.value) * s;
            }
        }
        self.keys[self.keys.len() - 1].value
    }

    /// The curve's keyframes, sorted by `t`.
    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }
}

impl Default for HeightCurve {
    fn default() -> Self {
        Self::identity()
    }
}
