use log::warn;

use crate::curve::values::Keyable;
use crate::source::Record;

/// How neighbouring keys blend.
///
/// Assets may carry interpolation codes this engine does not implement;
/// these decode to `Unknown` and evaluate as `Linear`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    Hermite,
    Step,
    Unknown,
}

impl Interpolation {
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Linear,
            2 => Self::Hermite,
            5 => Self::Step,
            _ => Self::Unknown,
        }
    }
}

/// One keyframe: a time, a value and the tangents stored alongside it.
///
/// Hermite segments use the left key's `forward` and the right key's
/// `backward` tangent; linear and step segments ignore both.
#[derive(Debug, Clone, Copy)]
pub struct Key<T> {
    pub time: f32,
    pub value: T,
    pub backward: T,
    pub forward: T,
}

impl<T: Keyable> Key<T> {
    #[must_use]
    pub fn new(time: f32, value: T) -> Self {
        Self {
            time,
            value,
            backward: T::default(),
            forward: T::default(),
        }
    }

    #[must_use]
    pub fn with_tangents(time: f32, value: T, backward: T, forward: T) -> Self {
        Self {
            time,
            value,
            backward,
            forward,
        }
    }
}

// Bounded neighbour scan before falling back to binary search.
const MAX_SCAN_OFFSET: usize = 3;

/// Last-used segment index. Pure optimization: evaluation is correct with
/// any cursor state, the cache only makes monotone playback O(1).
#[derive(Debug, Clone, Copy, Default)]
pub struct CurveCursor {
    last_index: usize,
}

/// An ordered-by-time keyframe curve for one animation channel.
///
/// Immutable between rebuilds: [`KeyedCurve::update_data`] replaces the
/// whole key list from a key-block record and resets the cursor.
#[derive(Debug, Clone)]
pub struct KeyedCurve<T: Keyable> {
    keys: Vec<Key<T>>,
    mode: Interpolation,
    cursor: CurveCursor,
}

impl<T: Keyable> Default for KeyedCurve<T> {
    fn default() -> Self {
        Self::new(Vec::new(), Interpolation::Linear)
    }
}

impl<T: Keyable> KeyedCurve<T> {
    #[must_use]
    pub fn new(mut keys: Vec<Key<T>>, mode: Interpolation) -> Self {
        if keys.windows(2).any(|w| w[1].time < w[0].time) {
            warn!("key times out of order; re-sorting");
            keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        }
        Self {
            keys,
            mode,
            cursor: CurveCursor::default(),
        }
    }

    /// Rebuilds the key list from a key-block record holding paired
    /// `Time`/`Value` arrays plus optional `Backward`/`Forward` tangents.
    /// Mismatched pair lengths truncate to the shortest and are reported.
    pub fn update_data(&mut self, rec: &Record) {
        let mode = Interpolation::from_raw(rec.uint("Interpolation").unwrap_or(0));
        let times = rec.floats("Time").unwrap_or(&[]);
        let values = T::read_array(rec, "Value").unwrap_or_default();
        let backward = T::read_array(rec, "Backward").unwrap_or_default();
        let forward = T::read_array(rec, "Forward").unwrap_or_default();

        let count = times.len().min(values.len());
        if times.len() != values.len() {
            warn!(
                "key block `{}`: {} times vs {} values, truncating to {count}",
                rec.kind(),
                times.len(),
                values.len(),
            );
        }

        let keys = (0..count)
            .map(|i| Key {
                time: times[i],
                value: values[i],
                backward: backward.get(i).copied().unwrap_or_default(),
                forward: forward.get(i).copied().unwrap_or_default(),
            })
            .collect();
        *self = Self::new(keys, mode);
    }

    #[must_use]
    pub fn from_record(rec: &Record) -> Self {
        let mut curve = Self::default();
        curve.update_data(rec);
        curve
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    #[must_use]
    pub fn keys(&self) -> &[Key<T>] {
        &self.keys
    }

    #[inline]
    #[must_use]
    pub fn mode(&self) -> Interpolation {
        self.mode
    }

    /// Last key time, i.e. the channel's natural length.
    #[must_use]
    pub fn end_time(&self) -> f32 {
        self.keys.last().map_or(0.0, |k| k.time)
    }

    /// Evaluates the curve at `time`, advancing the internal cursor.
    /// `None` only when the curve holds no keys; the caller must then
    /// leave the target property untouched.
    pub fn interpolate(&mut self, time: f32) -> Option<T> {
        if self.keys.is_empty() {
            return None;
        }
        let mut cursor = self.cursor;
        let value = self.sample_with_cursor(time, &mut cursor);
        self.cursor = cursor;
        value
    }

    /// Stateless evaluation: binary search, no cursor.
    #[must_use]
    pub fn sample(&self, time: f32) -> Option<T> {
        if self.keys.is_empty() {
            return None;
        }
        let next = self.keys.partition_point(|k| k.time <= time);
        Some(self.blend_segment(next.saturating_sub(1), time))
    }

    /// Evaluation with an external cursor, for callers that share one
    /// curve across several playheads.
    pub fn sample_with_cursor(&self, time: f32, cursor: &mut CurveCursor) -> Option<T> {
        let len = self.keys.len();
        if len == 0 {
            return None;
        }
        if len == 1 {
            return Some(self.keys[0].value);
        }

        // Cursor may be stale after a rebuild
        let i = cursor.last_index.min(len - 1);
        let t_curr = self.keys[i].time;

        let found = if time >= t_curr {
            // Normal playback: scan a few segments forward
            let mut res = None;
            for offset in 0..=MAX_SCAN_OFFSET {
                let idx = i + offset;
                if idx >= len - 1 {
                    if time >= self.keys[len - 1].time {
                        res = Some(len - 1);
                    }
                    break;
                }
                if time < self.keys[idx + 1].time {
                    res = Some(idx);
                    break;
                }
            }
            res
        } else {
            // Rewind or loop reset: scan backward
            let mut res = None;
            for offset in 0..=MAX_SCAN_OFFSET {
                if i < offset {
                    break;
                }
                let idx = i - offset;
                if time >= self.keys[idx].time {
                    res = Some(idx);
                    break;
                }
            }
            res
        };

        let index = found.unwrap_or_else(|| {
            // Large jump: O(log n) fallback
            let next = self.keys.partition_point(|k| k.time <= time);
            next.saturating_sub(1)
        });
        cursor.last_index = index;
        Some(self.blend_segment(index, time))
    }

    fn blend_segment(&self, index: usize, time: f32) -> T {
        let len = self.keys.len();
        if index >= len - 1 {
            return self.keys[len - 1].value;
        }

        let k1 = &self.keys[index];
        let k2 = &self.keys[index + 1];
        let dt = k2.time - k1.time;
        let x = if dt > 1e-6 { (time - k1.time) / dt } else { 0.0 };
        let x = x.clamp(0.0, 1.0);

        match self.mode {
            Interpolation::Linear | Interpolation::Unknown => T::lerp(k1.value, k2.value, x),
            Interpolation::Hermite => T::hermite(k1.value, k1.forward, k2.backward, k2.value, x),
            Interpolation::Step => T::step(k1.value, k2.value, x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> KeyedCurve<f32> {
        KeyedCurve::new(
            vec![Key::new(0.0, 0.0), Key::new(10.0, 10.0)],
            Interpolation::Linear,
        )
    }

    #[test]
    fn linear_two_key_scenario() {
        let mut curve = ramp();
        assert_eq!(curve.interpolate(5.0), Some(5.0));
        assert_eq!(curve.interpolate(-1.0), Some(0.0));
        assert_eq!(curve.interpolate(100.0), Some(10.0));
    }

    #[test]
    fn empty_curve_reports_not_found() {
        let mut curve = KeyedCurve::<f32>::default();
        assert_eq!(curve.interpolate(1.0), None);
    }

    #[test]
    fn unsorted_keys_are_resorted() {
        let curve = KeyedCurve::new(
            vec![Key::new(5.0, 50.0), Key::new(0.0, 0.0)],
            Interpolation::Linear,
        );
        assert_eq!(curve.keys()[0].time, 0.0);
    }

    #[test]
    fn cursor_matches_stateless_sample() {
        let curve = KeyedCurve::new(
            (0..8).map(|i| Key::new(i as f32, (i * i) as f32)).collect(),
            Interpolation::Linear,
        );
        let mut cursor = CurveCursor::default();
        for i in 0..=70 {
            let t = i as f32 * 0.1;
            assert_eq!(curve.sample_with_cursor(t, &mut cursor), curve.sample(t));
        }
        // Jump back past the scan window: binary-search fallback
        assert_eq!(curve.sample_with_cursor(0.3, &mut cursor), curve.sample(0.3));
    }

    #[test]
    fn update_data_truncates_mismatched_pairs() {
        let rec = Record::build("FloatData")
            .set("Interpolation", 1_u32)
            .set("Time", vec![0.0_f32, 1.0, 2.0])
            .set("Value", vec![0.0_f32, 4.0])
            .finish();
        let curve = KeyedCurve::<f32>::from_record(&rec);
        assert_eq!(curve.len(), 2);
    }
}
