//! Stepped particle simulation.
//!
//! A self-contained spawn / age / kill / integrate loop driving a dynamic
//! particle buffer that is written back into a target mesh's position,
//! size and color arrays every frame. Spawn randomness comes from an RNG
//! seeded through [`EmitterSettings::seed`], so two runs with the same
//! seed and time steps replay identically.
//!
//! Slot identity is not preserved across deaths: a dying particle is
//! swap-removed and slot `i` always holds the `i`-th currently-live
//! particle. This matches the long-standing behavior of the source
//! format's players, which downstream effects depend on.

use glam::{Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use crate::curve::KeyedCurve;
use crate::errors::Result;
use crate::scene::mesh::Mesh;
use crate::scene::transform::Trs;
use crate::source::Record;

/// Force integration runs at a quarter of the frame step for stability.
const SUBSTEPS: u32 = 4;

/// One live particle. Transient: created and destroyed by the simulation,
/// never serialized.
#[derive(Debug, Clone, Copy)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    pub age: f32,
    pub lifespan: f32,
}

/// A force acting on every live particle.
#[derive(Debug, Clone, Copy)]
pub enum GravityField {
    /// Constant pull along a fixed direction.
    Directional { direction: Vec3, force: f32 },
    /// Pull toward an attractor point.
    Point { position: Vec3, force: f32 },
}

impl GravityField {
    #[must_use]
    pub fn from_record(rec: &Record) -> Self {
        let force = rec.float("Force").unwrap_or(0.0);
        if rec.uint("Type").unwrap_or(0) == 1 {
            Self::Point {
                position: rec.vec3("Position").unwrap_or(Vec3::ZERO),
                force,
            }
        } else {
            Self::Directional {
                direction: rec.vec3("Direction").unwrap_or(Vec3::NEG_Z),
                force,
            }
        }
    }

    /// Acceleration applied to a particle at `position`.
    #[must_use]
    pub fn acceleration(&self, position: Vec3) -> Vec3 {
        match *self {
            Self::Directional { direction, force } => direction * force,
            Self::Point {
                position: attractor,
                force,
            } => {
                let to_attractor = attractor - position;
                if to_attractor.length_squared() > 1e-12 {
                    to_attractor.normalize() * force
                } else {
                    Vec3::ZERO
                }
            }
        }
    }
}

/// Static emitter configuration, including the RNG seed.
#[derive(Debug, Clone)]
pub struct EmitterSettings {
    /// Particles spawned per second.
    pub rate: f32,
    pub lifespan: f32,
    pub lifespan_variance: f32,
    pub speed: f32,
    pub speed_variance: f32,
    /// Polar angle of the initial direction, radians from the emitter axis.
    pub declination: f32,
    pub declination_variance: f32,
    /// Azimuthal angle of the initial direction.
    pub planar_angle: f32,
    pub planar_variance: f32,
    /// Emitter-local spawn box dimensions.
    pub extents: Vec3,
    /// Base particle radius.
    pub size: f32,
    /// Particles grow linearly from zero over this window after birth.
    pub grow_time: f32,
    /// Particles shrink linearly to zero over this window before death.
    pub fade_time: f32,
    pub emit_start: f32,
    pub emit_stop: f32,
    pub seed: u64,
}

impl Default for EmitterSettings {
    fn default() -> Self {
        Self {
            rate: 0.0,
            lifespan: 1.0,
            lifespan_variance: 0.0,
            speed: 0.0,
            speed_variance: 0.0,
            declination: 0.0,
            declination_variance: 0.0,
            planar_angle: 0.0,
            planar_variance: 0.0,
            extents: Vec3::ZERO,
            size: 1.0,
            grow_time: 0.0,
            fade_time: 0.0,
            emit_start: 0.0,
            emit_stop: f32::MAX,
            seed: 0,
        }
    }
}

impl EmitterSettings {
    #[must_use]
    pub fn from_record(rec: &Record) -> Self {
        let default = Self::default();
        Self {
            rate: rec.float("Emit Rate").unwrap_or(default.rate),
            lifespan: rec.float("Lifespan").unwrap_or(default.lifespan),
            lifespan_variance: rec.float("Lifespan Variance").unwrap_or(0.0),
            speed: rec.float("Speed").unwrap_or(0.0),
            speed_variance: rec.float("Speed Variance").unwrap_or(0.0),
            declination: rec.float("Declination").unwrap_or(0.0),
            declination_variance: rec.float("Declination Variance").unwrap_or(0.0),
            planar_angle: rec.float("Planar Angle").unwrap_or(0.0),
            planar_variance: rec.float("Planar Variance").unwrap_or(0.0),
            extents: rec.vec3("Extents").unwrap_or(Vec3::ZERO),
            size: rec.float("Size").unwrap_or(default.size),
            grow_time: rec.float("Grow Time").unwrap_or(0.0),
            fade_time: rec.float("Fade Time").unwrap_or(0.0),
            emit_start: rec.float("Emit Start").unwrap_or(default.emit_start),
            emit_stop: rec.float("Emit Stop").unwrap_or(default.emit_stop),
            seed: u64::from(rec.uint("Seed").unwrap_or(0)),
        }
    }
}

/// The particle simulation bound to one target mesh.
#[derive(Debug)]
pub struct ParticleSim {
    pub settings: EmitterSettings,
    pub gravities: Vec<GravityField>,
    /// Per-particle color over normalized age, sampled at `age / lifespan`.
    color_curve: Option<KeyedCurve<Vec4>>,
    particles: Vec<Particle>,
    /// Fractional spawn counter; the remainder carries across steps.
    accumulator: f32,
    last_time: Option<f32>,
    rng: StdRng,
}

impl ParticleSim {
    #[must_use]
    pub fn new(
        settings: EmitterSettings,
        gravities: Vec<GravityField>,
        color_curve: Option<KeyedCurve<Vec4>>,
    ) -> Self {
        let rng = StdRng::seed_from_u64(settings.seed);
        Self {
            settings,
            gravities,
            color_curve,
            particles: Vec::new(),
            accumulator: 0.0,
            last_time: None,
            rng,
        }
    }

    pub fn from_record(rec: &Record) -> Result<Self> {
        let settings = EmitterSettings::from_record(rec);
        let gravities = rec
            .children("Gravities")
            .iter()
            .map(GravityField::from_record)
            .collect();
        let color_curve = rec.child("Colors").map(KeyedCurve::from_record);
        Ok(Self::new(settings, gravities, color_curve))
    }

    #[inline]
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    #[must_use]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Advances to controller-local `time`, deriving the step from the
    /// previous call. A rewound clock (sequence switch, cyclic wrap)
    /// yields a zero-length step rather than a negative one.
    pub fn update(
        &mut self,
        time: f32,
        emitter_world: &Trs,
        target_world: &Trs,
        visible: bool,
        mesh: &mut Mesh,
    ) {
        let dt = self.last_time.map_or(0.0, |last| (time - last).max(0.0));
        self.last_time = Some(time);
        self.step(dt, time, emitter_world, target_world, visible, mesh);
    }

    /// One simulation step of length `dt` at controller-local `time`.
    pub fn step(
        &mut self,
        dt: f32,
        time: f32,
        emitter_world: &Trs,
        target_world: &Trs,
        visible: bool,
        mesh: &mut Mesh,
    ) {
        let capacity = mesh.vertex_count();

        // 1. Age and kill. Swap-removal: no slot identity across deaths.
        let mut i = 0;
        while i < self.particles.len() {
            let particle = &mut self.particles[i];
            particle.age += dt;
            if particle.age >= particle.lifespan || i >= capacity {
                self.particles.swap_remove(i);
            } else {
                i += 1;
            }
        }

        // 2. Integrate forces, sub-stepped for stability.
        if dt > 0.0 {
            let sub_dt = dt / SUBSTEPS as f32;
            for _ in 0..SUBSTEPS {
                for particle in &mut self.particles {
                    for gravity in &self.gravities {
                        particle.velocity += gravity.acceleration(particle.position) * sub_dt;
                    }
                    particle.position += particle.velocity * sub_dt;
                }
            }
        }

        // 3. Emit.
        let emitting = visible
            && self.settings.rate > 0.0
            && time >= self.settings.emit_start
            && time <= self.settings.emit_stop;
        if emitting {
            self.accumulator += self.settings.rate * dt;
            let relative = target_world.inverse().compose(emitter_world);
            while self.accumulator >= 1.0 {
                self.accumulator -= 1.0;
                if self.particles.len() < capacity {
                    let particle = self.spawn(&relative);
                    self.particles.push(particle);
                }
            }
        }

        // 4. Derive per-particle size and color, write the target buffers.
        mesh.sizes.resize(capacity, 0.0);
        mesh.colors.resize(capacity, Vec4::ONE);
        for (slot, particle) in self.particles.iter().enumerate() {
            mesh.positions[slot] = particle.position;
            mesh.sizes[slot] = self.settings.size * size_factor(&self.settings, particle);
            mesh.colors[slot] = match &mut self.color_curve {
                Some(curve) => curve
                    .interpolate(particle.age / particle.lifespan.max(1e-6))
                    .unwrap_or(Vec4::ONE),
                None => Vec4::ONE,
            };
        }
        mesh.active_count = self.particles.len();
    }

    fn spawn(&mut self, relative: &Trs) -> Particle {
        let settings = &self.settings;
        let half = settings.extents * 0.5;
        let local_position = Vec3::new(
            self.rng.random_range(-1.0..=1.0) * half.x,
            self.rng.random_range(-1.0..=1.0) * half.y,
            self.rng.random_range(-1.0..=1.0) * half.z,
        );

        let declination =
            settings.declination + settings.declination_variance * self.rng.random_range(-1.0..=1.0);
        let planar =
            settings.planar_angle + settings.planar_variance * self.rng.random_range(-1.0..=1.0);
        let direction = Vec3::new(
            declination.sin() * planar.cos(),
            declination.sin() * planar.sin(),
            declination.cos(),
        );
        let speed =
            (settings.speed + settings.speed_variance * self.rng.random_range(-1.0..=1.0)).max(0.0);
        let lifespan = (settings.lifespan
            + settings.lifespan_variance * self.rng.random_range(-1.0..=1.0))
        .max(1e-3);

        Particle {
            position: relative.transform_point(local_position),
            velocity: relative.transform_vector(direction) * speed,
            age: 0.0,
            lifespan,
        }
    }
}

/// Linear grow-in after birth and fade-out before death. A particle still
/// inside its grow window when the fade window starts takes the smaller
/// factor, so size never pops upward near death.
fn size_factor(settings: &EmitterSettings, particle: &Particle) -> f32 {
    let mut factor = 1.0;
    if settings.grow_time > 0.0 && particle.age < settings.grow_time {
        factor = particle.age / settings.grow_time;
    }
    let remaining = particle.lifespan - particle.age;
    if settings.fade_time > 0.0 && remaining < settings.fade_time {
        factor = factor.min(remaining / settings.fade_time);
    }
    factor.max(0.0)
}
