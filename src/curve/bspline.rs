//! Compact B-spline channel evaluation.
//!
//! A denser animation encoding than explicit keys: all channels of a
//! transform share one flat buffer of 16-bit quantized control ordinates,
//! and each channel de-quantizes its slice with a `(mult, bias)` pair
//! after Cox–de Boor blending. The knot vector is the clamped-uniform one
//! the source format has always used; reproducing it exactly matters more
//! than elegance here.

use std::sync::Arc;

use glam::{Quat, Vec3};
use log::warn;

use crate::errors::{Result, SinewError};
use crate::source::Record;

/// Fixed basis degree of the encoding.
pub const DEGREE: usize = 3;

/// Basis order: knot construction and blending both run at `DEGREE + 1`.
const ORDER: usize = DEGREE + 1;

/// Quantized control ordinates are signed 16-bit fractions of a half-range.
const QUANT_SCALE: f32 = 32767.0;

/// Clamped-uniform knot value for index `j`, with `n = control_count - 1`.
/// The vector pins `ORDER` repeats at each end so the curve interpolates
/// the first and last control points.
fn knot(j: usize, n: usize) -> f32 {
    if j < ORDER {
        0.0
    } else if j <= n {
        (j - ORDER + 1) as f32
    } else {
        (n + 2 - ORDER) as f32
    }
}

/// Recursive basis function N_{k,d} evaluated at `v`.
///
/// Zero-width knot spans contribute nothing instead of dividing by zero.
fn blend(k: usize, d: usize, n: usize, v: f32) -> f32 {
    if d == 1 {
        return if knot(k, n) <= v && v < knot(k + 1, n) {
            1.0
        } else {
            0.0
        };
    }

    let mut out = 0.0;
    let lo = knot(k + d - 1, n) - knot(k, n);
    if lo != 0.0 {
        out += (v - knot(k, n)) / lo * blend(k, d - 1, n, v);
    }
    let hi = knot(k + d, n) - knot(k + 1, n);
    if hi != 0.0 {
        out += (knot(k + d, n) - v) / hi * blend(k + 1, d - 1, n, v);
    }
    out
}

/// Evaluates one channel of `components` interleaved ordinates at the given
/// knot-space `interval`, writing the de-quantized result into `out`.
///
/// `interval` is not wall-clock time; callers derive it from the channel's
/// time range as `(time - start) / (stop - start) * (control_count - DEGREE)`.
pub fn evaluate(ordinates: &[i16], control_count: usize, interval: f32, mult: f32, bias: f32, out: &mut [f32]) {
    let components = out.len();
    if control_count == 0 || ordinates.len() < control_count * components {
        out.fill(bias);
        return;
    }
    let n = control_count - 1;

    // The final knot span is degenerate under the clamped-uniform rule;
    // at or past it the curve is exactly the last control point.
    if control_count <= DEGREE || interval >= (control_count - DEGREE) as f32 {
        for (c, slot) in out.iter_mut().enumerate() {
            *slot = f32::from(ordinates[n * components + c]) * mult + bias;
        }
        return;
    }

    out.fill(0.0);
    for k in 0..=n {
        let w = blend(k, DEGREE + 1, n, interval);
        if w != 0.0 {
            for (c, slot) in out.iter_mut().enumerate() {
                *slot += w * f32::from(ordinates[k * components + c]);
            }
        }
    }
    for slot in out.iter_mut() {
        *slot = *slot * mult + bias;
    }
}

/// One channel's view into the shared control buffer.
#[derive(Debug, Clone, Copy)]
pub struct SplineChannel {
    /// Element offset of this channel's first ordinate.
    pub handle: usize,
    /// De-quantization scale, `half_range / 32767`.
    pub mult: f32,
    /// De-quantization offset.
    pub bias: f32,
}

impl SplineChannel {
    fn from_record(rec: &Record, prefix: &str) -> Option<Self> {
        let handle = rec.uint(&format!("{prefix} Handle"))? as usize;
        let half_range = rec.float(&format!("{prefix} Half Range")).unwrap_or(QUANT_SCALE);
        let bias = rec.float(&format!("{prefix} Offset")).unwrap_or(0.0);
        Some(Self {
            handle,
            mult: half_range / QUANT_SCALE,
            bias,
        })
    }
}

/// B-spline-encoded transform: up to three channels (rotation,
/// translation, uniform scale) over one shared quantized buffer.
#[derive(Debug, Clone)]
pub struct SplineTransform {
    pub start: f32,
    pub stop: f32,
    pub control_count: usize,
    data: Arc<Vec<i16>>,
    rotation: Option<SplineChannel>,
    translation: Option<SplineChannel>,
    scale: Option<SplineChannel>,
}

impl SplineTransform {
    pub fn from_record(rec: &Record) -> Result<Self> {
        let data = rec
            .shorts("Control Data")
            .ok_or_else(|| SinewError::MissingField {
                record: rec.kind().to_string(),
                field: "Control Data".to_string(),
            })?;
        let control_count = rec
            .uint("Control Points")
            .ok_or_else(|| SinewError::MissingField {
                record: rec.kind().to_string(),
                field: "Control Points".to_string(),
            })? as usize;

        Ok(Self {
            start: rec.float("Start Time").unwrap_or(0.0),
            stop: rec.float("Stop Time").unwrap_or(0.0),
            control_count,
            data: Arc::new(data.to_vec()),
            rotation: SplineChannel::from_record(rec, "Rotation"),
            translation: SplineChannel::from_record(rec, "Translation"),
            scale: SplineChannel::from_record(rec, "Scale"),
        })
    }

    /// Knot-space position for `time`, or `None` when the channel set is
    /// degenerate (zero-length time range or too few control points) and
    /// must be treated as inactive.
    #[must_use]
    pub fn interval(&self, time: f32) -> Option<f32> {
        if self.stop <= self.start || self.control_count <= DEGREE {
            return None;
        }
        let x = (time - self.start) / (self.stop - self.start);
        Some(x.max(0.0) * (self.control_count - DEGREE) as f32)
    }

    fn channel_slice(&self, channel: &SplineChannel, components: usize) -> Option<&[i16]> {
        let needed = self.control_count * components;
        let end = channel.handle.checked_add(needed)?;
        if end > self.data.len() {
            warn!(
                "spline channel at {} needs {needed} ordinates, buffer holds {}",
                channel.handle,
                self.data.len(),
            );
            return None;
        }
        Some(&self.data[channel.handle..end])
    }

    #[must_use]
    pub fn sample_rotation(&self, time: f32) -> Option<Quat> {
        let interval = self.interval(time)?;
        let channel = self.rotation.as_ref()?;
        let slice = self.channel_slice(channel, 4)?;
        let mut out = [0.0_f32; 4];
        evaluate(slice, self.control_count, interval, channel.mult, channel.bias, &mut out);
        Some(Quat::from_xyzw(out[0], out[1], out[2], out[3]).normalize())
    }

    #[must_use]
    pub fn sample_translation(&self, time: f32) -> Option<Vec3> {
        let interval = self.interval(time)?;
        let channel = self.translation.as_ref()?;
        let slice = self.channel_slice(channel, 3)?;
        let mut out = [0.0_f32; 3];
        evaluate(slice, self.control_count, interval, channel.mult, channel.bias, &mut out);
        Some(Vec3::from_array(out))
    }

    #[must_use]
    pub fn sample_scale(&self, time: f32) -> Option<f32> {
        let interval = self.interval(time)?;
        let channel = self.scale.as_ref()?;
        let slice = self.channel_slice(channel, 1)?;
        let mut out = [0.0_f32; 1];
        evaluate(slice, self.control_count, interval, channel.mult, channel.bias, &mut out);
        Some(out[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_interval_returns_last_control_point() {
        // Scalar channel, 6 control points
        let ords: Vec<i16> = vec![0, 100, 200, 300, 400, 500];
        let mut out = [0.0_f32; 1];
        let boundary = (ords.len() - DEGREE) as f32;
        evaluate(&ords, ords.len(), boundary, 2.0, 1.0, &mut out);
        assert!((out[0] - (500.0 * 2.0 + 1.0)).abs() < 1e-4);
    }

    #[test]
    fn constant_control_points_stay_constant() {
        let ords: Vec<i16> = vec![250; 8];
        let mut out = [0.0_f32; 1];
        for i in 0..=20 {
            let interval = i as f32 * 0.25;
            evaluate(&ords, 8, interval, 1.0, 0.0, &mut out);
            assert!((out[0] - 250.0).abs() < 1e-2, "interval {interval}: {}", out[0]);
        }
    }

    #[test]
    fn start_of_curve_is_first_control_point() {
        let ords: Vec<i16> = vec![-300, 0, 300, 600, 900];
        let mut out = [0.0_f32; 1];
        evaluate(&ords, 5, 0.0, 1.0, 0.0, &mut out);
        assert!((out[0] - -300.0).abs() < 1e-3, "{}", out[0]);
    }

    #[test]
    fn degenerate_time_range_is_inactive() {
        let rec = Record::build("SplineTransformData")
            .set("Start Time", 2.0_f32)
            .set("Stop Time", 2.0_f32)
            .set("Control Points", 8_u32)
            .set("Control Data", vec![0_i16; 8])
            .finish();
        let spline = SplineTransform::from_record(&rec).unwrap();
        assert!(spline.interval(2.0).is_none());
    }
}
