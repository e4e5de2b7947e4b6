//! Marble Run - procedurally chained track segments raced by rigid marbles.
//!
//! # Architecture
//!
//! - **track**: Segment builders, chaining, generator and obstacle placement
//! - **physics**: Rigid-body backend trait and its rapier3d world
//! - **marble** / **finish**: Racers and the goal sensor
//! - **scene**: Bevy plugin wiring the frame loop
//! - **camera** / **render**: Fly camera and mesh upload
//!
//! # Usage
//!
//! ```ignore
//! use marble_run::{physics::PhysicsWorld, track::generator::{GeneratorConfig, TrackGenerator}};
//!
//! let mut physics = PhysicsWorld::default();
//! let config = GeneratorConfig { seed: 7, ..Default::default() };
//! let course = TrackGenerator::new(config).generate(&mut physics)?;
//! ```

pub mod bounds;
pub mod camera;
pub mod config;
pub mod error;
pub mod finish;
pub mod marble;
pub mod physics;
pub mod render;
pub mod scene;
pub mod track;

pub use config::{Cli, RaceConfig};
pub use error::{PhysicsError, TrackError};
pub use scene::{MarbleRunPlugin, Race, RaceState};
