use bitflags::bitflags;

use crate::source::Record;

/// Policy mapping time outside `[start, stop]` back into that range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Extrapolation {
    /// Clamp to the range ends.
    #[default]
    Constant,
    /// Wrap around every period.
    Cyclic,
    /// Ping-pong: alternate direction every full period.
    Reverse,
}

bitflags! {
    /// Controller flag word as stored in the asset. Bits 1–2 hold the
    /// extrapolation selector and are not individual flags; see
    /// [`ControllerFlags::extrapolation`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ControllerFlags: u16 {
        const ACTIVE = 1 << 3;
    }
}

impl ControllerFlags {
    #[must_use]
    pub fn is_active(self) -> bool {
        self.contains(Self::ACTIVE)
    }

    /// Decodes the two-bit extrapolation selector. Unassigned codes fall
    /// back to `Constant`, the conservative choice for unknown assets.
    #[must_use]
    pub fn extrapolation(self) -> Extrapolation {
        match (self.bits() >> 1) & 0x3 {
            0 => Extrapolation::Cyclic,
            1 => Extrapolation::Reverse,
            _ => Extrapolation::Constant,
        }
    }
}

/// Maps global scene time into controller-local time.
///
/// Pure function of its fields; no hidden state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeMapping {
    pub start: f32,
    pub stop: f32,
    pub phase: f32,
    pub frequency: f32,
    pub extrapolation: Extrapolation,
}

impl Default for TimeMapping {
    fn default() -> Self {
        Self {
            start: 0.0,
            stop: 0.0,
            phase: 0.0,
            frequency: 1.0,
            extrapolation: Extrapolation::Constant,
        }
    }
}

impl TimeMapping {
    /// Reads `Start Time` / `Stop Time` / `Phase` / `Frequency` and the
    /// flag word from a controller record.
    #[must_use]
    pub fn from_record(rec: &Record) -> Self {
        let flags = ControllerFlags::from_bits_retain(rec.uint("Flags").unwrap_or(0) as u16);
        Self {
            start: rec.float("Start Time").unwrap_or(0.0),
            stop: rec.float("Stop Time").unwrap_or(0.0),
            phase: rec.float("Phase").unwrap_or(0.0),
            frequency: rec.float("Frequency").unwrap_or(1.0),
            extrapolation: flags.extrapolation(),
        }
    }

    /// Controller-local time for a global `scene_time`.
    #[must_use]
    pub fn map(&self, scene_time: f32) -> f32 {
        let t = self.frequency * scene_time + self.phase;
        if t >= self.start && t <= self.stop {
            return t;
        }
        let delta = self.stop - self.start;
        if delta <= 0.0 {
            return self.start;
        }
        let x = (t - self.start) / delta;
        let frac = (x - x.floor()) * delta;
        match self.extrapolation {
            Extrapolation::Constant => t.clamp(self.start, self.stop),
            Extrapolation::Cyclic => self.start + frac,
            Extrapolation::Reverse => {
                if (x.floor() as i64) % 2 == 0 {
                    self.start + frac
                } else {
                    self.stop - frac
                }
            }
        }
    }
}
