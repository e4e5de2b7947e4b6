use bevy::app::AppExit;
use bevy::prelude::*;

use crate::camera::{fly_camera_input, FlyCamera, InputController};
use crate::config::RaceConfig;
use crate::error::{PhysicsError, TrackError};
use crate::finish::FinishTrigger;
use crate::marble::{palette, Marble, MarbleId};
use crate::physics::{PhysicsBackend, PhysicsWorld};
use crate::render::{track_mesh, MeshAssets};
use crate::track::generator::{spawn_positions, Course, TrackGenerator};
use crate::track::SegmentKind;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Marbles this far below the lowest track point are put back on the ramp
const FALL_LIMIT: f32 = 25.0;
const CAMERA_SPEED: f32 = 15.0;

// ============================================================================
// RESOURCES & COMPONENTS
// ============================================================================

/// Who, if anyone, has reached the goal
#[derive(Resource, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RaceState {
    #[default]
    Armed,
    WonBy(MarbleId),
}

/// Index into [`Race::marbles`]
#[derive(Component)]
pub struct MarbleVisual(pub usize);

/// The simulated world: physics, the course, the finish sensor and marbles
#[derive(Resource)]
pub struct Race {
    pub physics: PhysicsWorld,
    pub course: Course,
    pub trigger: FinishTrigger,
    pub marbles: Vec<Marble>,
    spawns: Vec<Vec3>,
    radius: f32,
    mass: f32,
}

impl Race {
    pub fn build(config: &RaceConfig) -> Result<Self, TrackError> {
        let mut physics = PhysicsWorld::default();
        let course = TrackGenerator::new(config.generator.clone()).generate(&mut physics)?;

        let trigger = match course.chain.last() {
            Some(goal) => FinishTrigger::new(&mut physics, goal)?,
            None => return Err(TrackError::Discontinuity { index: 0 }),
        };

        let spawns = spawn_positions(&course.chain, config.marble_count, config.marble_radius);
        let mut race = Self {
            physics,
            course,
            trigger,
            marbles: Vec::with_capacity(spawns.len()),
            spawns,
            radius: config.marble_radius,
            mass: config.marble_mass,
        };
        race.spawn_marbles()?;

        Ok(race)
    }

    fn spawn_marbles(&mut self) -> Result<(), PhysicsError> {
        let colors = palette(self.spawns.len());
        for (i, (position, color)) in self.spawns.iter().zip(colors).enumerate() {
            let marble = Marble::spawn(
                &mut self.physics,
                MarbleId(i as u32),
                *position,
                self.radius,
                self.mass,
                color,
            )?;
            self.marbles.push(marble);
        }
        Ok(())
    }

    /// Put marble `index` back at its start point at rest.
    ///
    /// The old body stays registered until its replacement exists.
    fn respawn(&mut self, index: usize) -> Result<(), PhysicsError> {
        let old = &self.marbles[index];
        let fresh = Marble::spawn(
            &mut self.physics,
            old.id,
            self.spawns[index],
            old.radius,
            self.mass,
            old.color,
        )?;
        let old = std::mem::replace(&mut self.marbles[index], fresh);
        old.release(&mut self.physics);
        Ok(())
    }

    /// Step physics and read every marble back
    pub fn tick(&mut self, dt: f32) -> Result<(), PhysicsError> {
        self.physics.step(dt);

        let floor = self.course.chain.bounds().min.y - FALL_LIMIT;
        for index in 0..self.marbles.len() {
            self.marbles[index].update_from_physics(&self.physics)?;
            if self.marbles[index].position.y < floor {
                debug!("{} fell off the track", self.marbles[index].id);
                self.respawn(index)?;
            }
        }
        Ok(())
    }

    pub fn poll_winner(&self) -> Option<MarbleId> {
        self.trigger
            .check_for_winner(&self.physics, &self.marbles)
            .map(|m| m.id)
    }

    /// Every marble back to the launch ramp
    pub fn restart(&mut self) -> Result<(), PhysicsError> {
        for index in 0..self.marbles.len() {
            self.respawn(index)?;
        }
        Ok(())
    }

    /// Release the sensor, then marbles, then the course, then anything left
    pub fn teardown(&mut self) {
        self.trigger.release(&mut self.physics);
        for marble in self.marbles.drain(..) {
            marble.release(&mut self.physics);
        }
        self.course.release(&mut self.physics);
        self.physics.clear();
    }
}

// ============================================================================
// PLUGIN
// ============================================================================

/// Builds the course at startup and runs the frame loop:
/// input, physics step, pose sync, finish poll.
pub struct MarbleRunPlugin;

impl Plugin for MarbleRunPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<RaceConfig>()
            .init_resource::<RaceState>()
            .init_resource::<InputController>()
            .init_resource::<MeshAssets>()
            .add_systems(Startup, setup_race)
            .add_systems(
                Update,
                (
                    fly_camera_input,
                    restart_race,
                    step_physics,
                    sync_marbles,
                    poll_finish,
                )
                    .chain(),
            )
            .add_systems(Last, teardown_on_exit);
    }
}

// ============================================================================
// SYSTEMS
// ============================================================================

fn segment_color(kind: &SegmentKind) -> Color {
    match kind {
        SegmentKind::Straight(_) => Color::srgb(0.55, 0.6, 0.7),
        SegmentKind::Curved(_) => Color::srgb(0.35, 0.5, 0.8),
        SegmentKind::Funnel(_) => Color::srgb(0.8, 0.55, 0.25),
        SegmentKind::GoalPad(_) => Color::srgb(0.25, 0.75, 0.35),
    }
}

fn setup_race(
    mut commands: Commands,
    config: Res<RaceConfig>,
    mut mesh_assets: ResMut<MeshAssets>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut exit: EventWriter<AppExit>,
) {
    let race = match Race::build(&config) {
        Ok(race) => race,
        Err(e) => {
            error!("could not build the race: {}", e);
            exit.send(AppExit::error());
            return;
        }
    };

    // Track. Chained transforms can mirror a segment, so draw both faces.
    for segment in race.course.chain.segments() {
        commands.spawn((
            Mesh3d(meshes.add(track_mesh(segment.mesh()))),
            MeshMaterial3d(materials.add(StandardMaterial {
                base_color: segment_color(segment.kind()),
                perceptual_roughness: 0.6,
                cull_mode: None,
                double_sided: true,
                ..default()
            })),
            Transform::from_matrix(Mat4::from(segment.world_transform())),
        ));
    }

    let obstacle_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.75, 0.2, 0.2),
        perceptual_roughness: 0.8,
        ..default()
    });
    for obstacle in &race.course.obstacles {
        commands.spawn((
            Mesh3d(mesh_assets.insert_box(&mut meshes, obstacle.half_extents)),
            MeshMaterial3d(obstacle_material.clone()),
            Transform::from_translation(obstacle.position).with_rotation(obstacle.rotation),
        ));
    }

    let marble_mesh = mesh_assets.insert_sphere(&mut meshes, config.marble_radius);
    for (index, marble) in race.marbles.iter().enumerate() {
        commands.spawn((
            Mesh3d(marble_mesh.clone()),
            MeshMaterial3d(materials.add(StandardMaterial {
                base_color: marble.color,
                metallic: 0.7,
                perceptual_roughness: 0.3,
                ..default()
            })),
            marble.transform(),
            MarbleVisual(index),
        ));
    }

    // Camera behind and above the launch ramp, looking down the course
    if let Some(ramp) = race.course.chain.first() {
        let entry = ramp.world_entry();
        let eye = entry.position - entry.forward * 18.0 + Vec3::Y * 12.0;
        let mut fly = FlyCamera {
            speed: CAMERA_SPEED,
            ..default()
        };
        fly.face(eye, entry.position + entry.forward * 10.0);

        commands.spawn((
            Camera3d::default(),
            Transform::from_translation(eye).looking_to(fly.forward(), Vec3::Y),
            fly,
        ));
    }

    commands.spawn((
        DirectionalLight {
            illuminance: 10000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(10.0, 40.0, 10.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    commands.insert_resource(AmbientLight {
        color: Color::WHITE,
        brightness: 300.0,
    });

    if race.trigger.is_inert() {
        warn!("goal has no finish sensor; this race cannot be won");
    }
    info!(
        "race ready: {} marbles, {} segments, {} bodies",
        race.marbles.len(),
        race.course.chain.len(),
        race.physics.body_count()
    );
    commands.insert_resource(race);
}

/// R puts every marble back on the ramp and re-arms the finish
fn restart_race(
    keys: Res<ButtonInput<KeyCode>>,
    race: Option<ResMut<Race>>,
    mut state: ResMut<RaceState>,
) {
    let Some(mut race) = race else {
        return;
    };
    if !keys.just_pressed(KeyCode::KeyR) {
        return;
    }

    match race.restart() {
        Ok(()) => {
            *state = RaceState::Armed;
            info!("race restarted");
        }
        Err(e) => error!("restart failed: {}", e),
    }
}

fn step_physics(time: Res<Time>, race: Option<ResMut<Race>>) {
    let Some(mut race) = race else {
        return;
    };
    if let Err(e) = race.tick(time.delta_secs()) {
        error!("physics sync failed: {}", e);
    }
}

fn sync_marbles(race: Option<Res<Race>>, mut visuals: Query<(&MarbleVisual, &mut Transform)>) {
    let Some(race) = race else {
        return;
    };
    for (visual, mut transform) in visuals.iter_mut() {
        if let Some(marble) = race.marbles.get(visual.0) {
            *transform = marble.transform();
        }
    }
}

fn poll_finish(race: Option<Res<Race>>, mut state: ResMut<RaceState>) {
    let Some(race) = race else {
        return;
    };
    if *state != RaceState::Armed {
        return;
    }

    if let Some(winner) = race.poll_winner() {
        info!("{} wins!", winner);
        *state = RaceState::WonBy(winner);
    }
}

fn teardown_on_exit(mut exit: EventReader<AppExit>, race: Option<ResMut<Race>>) {
    if exit.read().next().is_none() {
        return;
    }
    if let Some(mut race) = race {
        race.teardown();
        info!(
            "physics released ({} bodies, {} sensors left)",
            race.physics.body_count(),
            race.physics.sensor_count()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::generator::GeneratorConfig;

    fn small_race() -> Race {
        let config = RaceConfig {
            marble_count: 4,
            generator: GeneratorConfig {
                num_segments: 4,
                max_arc_deg: 90.0,
                ..default()
            },
            ..default()
        };
        Race::build(&config).unwrap()
    }

    #[test]
    fn test_build_places_marbles_and_arms_trigger() {
        let race = small_race();

        assert_eq!(race.marbles.len(), 4);
        assert!(!race.trigger.is_inert());
        assert_eq!(race.physics.sensor_count(), 1);
        assert!(race.poll_winner().is_none());
    }

    #[test]
    fn test_marbles_move_after_tick() {
        let mut race = small_race();
        let start = race.marbles[0].position;

        for _ in 0..30 {
            race.tick(1.0 / 60.0).unwrap();
        }

        assert!(race.marbles[0].position.distance(start) > 0.01);
    }

    #[test]
    fn test_marble_on_goal_pad_wins() {
        let mut race = small_race();
        let goal = race.course.chain.last().unwrap();
        let proxy = goal.collider().unwrap();
        let pose = race.physics.world_pose(proxy.collider.body).unwrap();
        let (_, half_extents) = proxy.collider.kind.local_extents();
        let on_top = pose.transform_point3(Vec3::new(0.0, half_extents.y + 0.3, 0.0));

        let lucky = Marble::spawn(
            &mut race.physics,
            MarbleId(99),
            on_top,
            0.5,
            1.0,
            Color::WHITE,
        )
        .unwrap();
        race.marbles.push(lucky);

        assert_eq!(race.poll_winner(), Some(MarbleId(99)));
    }

    #[test]
    fn test_restart_returns_marbles_to_spawns() {
        let mut race = small_race();
        for _ in 0..30 {
            race.tick(1.0 / 60.0).unwrap();
        }

        race.restart().unwrap();

        for (marble, spawn) in race.marbles.iter().zip(&race.spawns) {
            assert!(marble.position.distance(*spawn) < 1e-5);
        }
        assert_eq!(race.physics.body_count(), race.course.chain.len() + race.course.obstacles.len() + 4);
    }

    #[test]
    fn test_respawn_swaps_in_a_live_body() {
        let mut race = small_race();
        let old = race.marbles[1].body;
        let bodies = race.physics.body_count();

        race.respawn(1).unwrap();

        assert_ne!(race.marbles[1].body, old);
        assert!(race.physics.world_pose(old).is_err());
        assert!(race.physics.world_pose(race.marbles[1].body).is_ok());
        assert_eq!(race.physics.body_count(), bodies);
    }

    #[test]
    fn test_default_course_is_won() {
        let mut race = Race::build(&RaceConfig::default()).unwrap();

        let mut winner = None;
        for _ in 0..(180 * 60) {
            race.tick(1.0 / 60.0).unwrap();
            winner = race.poll_winner();
            if winner.is_some() {
                break;
            }
        }

        assert!(winner.is_some());
    }

    #[test]
    fn test_teardown_releases_everything() {
        let mut race = small_race();
        race.teardown();

        assert_eq!(race.physics.body_count(), 0);
        assert_eq!(race.physics.sensor_count(), 0);
        assert!(race.trigger.is_inert());
    }
}
