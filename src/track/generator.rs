use bevy::prelude::*;
use rand::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::obstacles::{place_obstacles, Obstacle, ObstacleConfig};
use super::{
    CurvedParams, FunnelParams, GoalPadParams, PoseFrame, Segment, StraightParams, TrackChain,
};
use crate::error::TrackError;
use crate::physics::PhysicsBackend;

/// Path samples per unit of arc length on curved pieces
const SAMPLES_PER_UNIT: f32 = 2.0;
/// Cross-section samples on curved pieces
const CROSS_SAMPLES: u32 = 24;
/// Largest gap or bend allowed between neighbouring segments
const CONTINUITY_TOLERANCE: f32 = 1e-3;
/// Steep curves aim this much steeper than the grade ceiling
const STEEP_GRADE_FACTOR: f32 = 1.5;

/// Configuration for procedural track generation
#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Total segments including launch ramp and goal pad
    pub num_segments: usize,
    /// Marble radius
    pub marble_radius: f32,
    /// Straight segment length range
    pub min_length: f32,
    pub max_length: f32,
    /// Half-width of the channel
    pub track_width: f32,
    /// Depth of the deck / bowl floor below the centerline
    pub track_depth: f32,
    /// Arc range in degrees for curves and funnels
    pub min_arc_deg: f32,
    pub max_arc_deg: f32,
    /// Curve radius range
    pub min_radius: f32,
    pub max_radius: f32,
    /// Largest extra drop a curve adds on top of the grade it inherits
    pub max_drop: f32,
    /// Funnel exit width as a fraction of its entry width
    pub funnel_ratio: f32,
    /// Pitch of the launch ramp in degrees
    pub launch_pitch_deg: f32,
    /// World-space downhill grade range, in degrees, each piece aims for
    pub min_grade_deg: f32,
    pub max_grade_deg: f32,
    /// Probability weights for each segment type
    pub segment_weights: SegmentWeights,
    /// How many straight segments carry an obstacle field
    pub obstacle_fields: usize,
    pub obstacles: ObstacleConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            num_segments: 8,
            marble_radius: 0.5,
            min_length: 8.0,
            max_length: 16.0,
            track_width: 5.0,
            track_depth: 2.0,
            min_arc_deg: 45.0,
            max_arc_deg: 180.0,
            min_radius: 12.0,
            max_radius: 30.0,
            max_drop: 10.0,
            funnel_ratio: 0.6,
            launch_pitch_deg: 8.0,
            min_grade_deg: 3.0,
            max_grade_deg: 7.0,
            segment_weights: SegmentWeights::default(),
            obstacle_fields: 1,
            obstacles: ObstacleConfig::default(),
        }
    }
}

impl GeneratorConfig {
    /// Reject empty or inverted sampling ranges before any randomness is drawn
    pub fn validate(&self) -> Result<(), TrackError> {
        let ranges = [
            ("min_length", self.min_length, self.max_length),
            ("min_arc_deg", self.min_arc_deg, self.max_arc_deg),
            ("min_radius", self.min_radius, self.max_radius),
        ];
        for (name, lo, hi) in ranges {
            TrackError::require_positive(name, lo)?;
            if !hi.is_finite() || hi < lo {
                return Err(TrackError::InvalidParameter { name, value: hi });
            }
        }
        TrackError::require_positive("track_width", self.track_width)?;
        TrackError::require_positive("track_depth", self.track_depth)?;
        TrackError::require_positive("funnel_ratio", self.funnel_ratio)?;
        TrackError::require_finite("max_drop", self.max_drop)?;
        TrackError::require_positive("min_grade_deg", self.min_grade_deg)?;
        if !(self.max_grade_deg >= self.min_grade_deg
            && self.max_grade_deg * STEEP_GRADE_FACTOR < 90.0)
        {
            return Err(TrackError::InvalidParameter {
                name: "max_grade_deg",
                value: self.max_grade_deg,
            });
        }
        if !(self.launch_pitch_deg.is_finite() && self.launch_pitch_deg.abs() < 90.0) {
            return Err(TrackError::InvalidParameter {
                name: "launch_pitch_deg",
                value: self.launch_pitch_deg,
            });
        }
        self.obstacles.validate()
    }
}

/// Probability weights for segment selection
#[derive(Clone, Debug)]
pub struct SegmentWeights {
    pub straight: f32,
    pub curved: f32,
    pub steep_curve: f32,
    pub funnel: f32,
}

impl Default for SegmentWeights {
    fn default() -> Self {
        Self {
            straight: 2.0,
            curved: 3.0,
            steep_curve: 1.0,
            funnel: 1.0,
        }
    }
}

impl SegmentWeights {
    /// Get total weight for normalization
    fn total(&self) -> f32 {
        self.straight + self.curved + self.steep_curve + self.funnel
    }

    /// Select a segment type based on weights
    fn select(&self, rng: &mut impl Rng) -> SegmentType {
        let total = self.total();
        if total <= 0.0 {
            return SegmentType::Straight;
        }

        let mut value = rng.r#gen::<f32>() * total;

        value -= self.straight;
        if value < 0.0 {
            return SegmentType::Straight;
        }

        value -= self.curved;
        if value < 0.0 {
            return SegmentType::Curved;
        }

        value -= self.steep_curve;
        if value < 0.0 {
            return SegmentType::SteepCurve;
        }

        SegmentType::Funnel
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum SegmentType {
    Straight,
    Curved,
    SteepCurve,
    Funnel,
}

/// A generated course: chained segments plus the obstacles on them
pub struct Course {
    pub chain: TrackChain,
    pub obstacles: Vec<Obstacle>,
}

impl Course {
    /// Remove every obstacle and segment body from physics
    pub fn release(&mut self, physics: &mut impl PhysicsBackend) {
        for obstacle in self.obstacles.drain(..) {
            physics.remove_body(obstacle.body);
        }
        self.chain.release(physics);
    }
}

/// Procedural track generator
pub struct TrackGenerator {
    rng: ChaCha8Rng,
    config: GeneratorConfig,
}

impl TrackGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self { rng, config }
    }

    /// Build the whole course: launch ramp, random middle, goal pad.
    ///
    /// On failure every body registered so far is released before the error
    /// is returned.
    pub fn generate(&mut self, physics: &mut impl PhysicsBackend) -> Result<Course, TrackError> {
        self.config.validate()?;

        let mut course = Course {
            chain: TrackChain::new(),
            obstacles: Vec::new(),
        };
        if let Err(e) = self.populate(&mut course, physics) {
            warn!("course generation failed, releasing partial course: {}", e);
            course.release(physics);
            return Err(e);
        }

        info!(
            "generated course with {} segments and {} obstacles (seed {})",
            course.chain.len(),
            course.obstacles.len(),
            self.config.seed
        );

        Ok(course)
    }

    fn populate(
        &mut self,
        course: &mut Course,
        physics: &mut impl PhysicsBackend,
    ) -> Result<(), TrackError> {
        let mut fields_left = self.config.obstacle_fields;

        let launch = StraightParams {
            length: self.config.max_length,
            half_width: self.config.track_width,
            depth: self.config.track_depth,
            pitch_deg: self.config.launch_pitch_deg,
            ..default()
        };
        course.chain.add_segment(launch.build()?, physics)?;

        let middle = self.config.num_segments.saturating_sub(2);
        for _ in 0..middle {
            let grade = course.chain.last_exit().map_or(0.0, |exit| grade_deg(&exit));
            let segment_type = self.config.segment_weights.select(&mut self.rng);
            let segment = self.build_next(segment_type, grade)?;
            debug!("generated {:?} segment entering at {:.1} deg", segment_type, grade);

            let placed = course.chain.add_segment(segment, physics)?;
            if segment_type == SegmentType::Straight && fields_left > 0 {
                course.obstacles.extend(place_obstacles(
                    placed,
                    &self.config.obstacles,
                    &mut self.rng,
                    physics,
                )?);
                fields_left -= 1;
            }
        }

        let goal = GoalPadParams {
            half_width: self.config.track_width,
            depth: self.config.track_depth,
            ..default()
        };
        course.chain.add_segment(goal.build()?, physics)?;
        course.chain.validate_continuity(CONTINUITY_TOLERANCE)
    }

    /// Next middle piece for an entry already `grade` degrees downhill.
    ///
    /// Straights re-pitch to a fresh target grade. Curves hold the inherited
    /// grade through the turn and add drop to reach their target.
    fn build_next(&mut self, segment_type: SegmentType, grade: f32) -> Result<Segment, TrackError> {
        let config = &self.config;
        let width = config.track_width;
        let depth = config.track_depth;

        match segment_type {
            SegmentType::Straight => {
                let length = self.rng.gen_range(config.min_length..=config.max_length);
                let target = self.rng.gen_range(config.min_grade_deg..=config.max_grade_deg);
                StraightParams {
                    length,
                    half_width: width,
                    depth,
                    pitch_deg: target - grade,
                    ..default()
                }
                .build()
            }

            SegmentType::Curved => {
                let arc_deg = self.rng.gen_range(config.min_arc_deg..=config.max_arc_deg);
                let radius = self.rng.gen_range(config.min_radius..=config.max_radius);
                let target = self.rng.gen_range(config.min_grade_deg..=config.max_grade_deg);
                CurvedParams {
                    arc_deg,
                    radius,
                    half_width: width,
                    depth,
                    drop: extra_drop(arc_deg, radius, grade, target, config.max_drop),
                    grade_deg: grade,
                    seg_u: path_samples(arc_deg, radius),
                    seg_v: CROSS_SAMPLES,
                }
                .build()
            }

            SegmentType::SteepCurve => {
                let arc_deg = self.rng.gen_range(config.min_arc_deg..=config.max_arc_deg);
                let radius = config.min_radius;
                let target = config.max_grade_deg * STEEP_GRADE_FACTOR;
                CurvedParams {
                    arc_deg,
                    radius,
                    half_width: width,
                    depth,
                    drop: extra_drop(arc_deg, radius, grade, target, config.max_drop),
                    grade_deg: grade,
                    seg_u: path_samples(arc_deg, radius),
                    seg_v: CROSS_SAMPLES,
                }
                .build()
            }

            // The next segment starts back at full width
            SegmentType::Funnel => {
                let arc_deg = self.rng.gen_range(config.min_arc_deg..=config.max_arc_deg);
                let radius = self.rng.gen_range(config.min_radius..=config.max_radius);
                FunnelParams {
                    arc_deg,
                    radius,
                    start_width: width,
                    exit_width: width * config.funnel_ratio,
                    depth,
                    drop: extra_drop(arc_deg, radius, grade, config.min_grade_deg, config.max_drop),
                    grade_deg: grade,
                    seg_u: path_samples(arc_deg, radius),
                    seg_v: CROSS_SAMPLES,
                }
                .build()
            }
        }
    }
}

/// Downhill grade of a frame's heading in degrees; negative when it climbs
fn grade_deg(frame: &PoseFrame) -> f32 {
    (-frame.forward.y).clamp(-1.0, 1.0).asin().to_degrees()
}

/// Drop that steepens an arc held at `grade` to an average of `target`
fn extra_drop(arc_deg: f32, radius: f32, grade: f32, target: f32, max_drop: f32) -> f32 {
    let run = arc_deg.to_radians() * radius;
    let gap = target.to_radians().tan() - grade.to_radians().tan();
    (run * gap).clamp(0.0, max_drop.max(0.0))
}

fn path_samples(arc_deg: f32, radius: f32) -> u32 {
    let arc_length = arc_deg.to_radians() * radius;
    ((arc_length * SAMPLES_PER_UNIT).ceil() as u32).clamp(8, 240)
}

/// Marble start points on the launch ramp, in rows across its width,
/// resting one radius above the deck
pub fn spawn_positions(chain: &TrackChain, count: usize, radius: f32) -> Vec<Vec3> {
    let Some(ramp) = chain.first() else {
        return Vec::new();
    };

    let Some(first) = ramp.slices().first() else {
        return Vec::new();
    };
    let entry = first.frame.transformed(&ramp.world_transform());
    let right = entry.right();
    let half_width = ramp.entry_half_width();

    let spacing = radius * 2.0 + 0.1;
    let per_row = ((2.0 * (half_width - radius) / spacing).floor() as usize + 1).max(1);

    (0..count)
        .map(|i| {
            let row = i / per_row;
            let col = i % per_row;
            let in_row = per_row.min(count - row * per_row);

            let lateral = (col as f32 - (in_row as f32 - 1.0) * 0.5) * spacing;
            let along = spacing * (row as f32 + 0.5);

            entry.position
                + entry.forward * along
                + right * lateral
                + entry.up * (radius - ramp.surface_depth())
        })
        .collect()
}
