use bevy::prelude::*;
use clap::Parser;

use crate::track::generator::GeneratorConfig;
use crate::track::obstacles::ObstacleConfig;

/// Procedural marble run: chained track segments, rigid marbles, first to the goal pad wins
#[derive(Parser, Debug, Clone)]
#[command(name = "marble-run")]
#[command(author, version, about)]
pub struct Cli {
    /// Seed for track generation
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Number of marbles to race
    #[arg(long, short = 'm', default_value = "8")]
    pub marbles: usize,

    /// Segments in the course, including launch ramp and goal pad
    #[arg(long, short = 's', default_value = "8")]
    pub segments: usize,

    /// Boxes per obstacle field (0 disables obstacles)
    #[arg(long, default_value = "6")]
    pub obstacles: usize,
}

/// Everything the race scene needs to build a course and its marbles
#[derive(Resource, Clone, Debug)]
pub struct RaceConfig {
    pub marble_count: usize,
    pub marble_radius: f32,
    pub marble_mass: f32,
    pub generator: GeneratorConfig,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            marble_count: 8,
            marble_radius: 0.5,
            marble_mass: 1.0,
            generator: GeneratorConfig::default(),
        }
    }
}

impl From<Cli> for RaceConfig {
    fn from(cli: Cli) -> Self {
        let defaults = RaceConfig::default();
        let generator = GeneratorConfig {
            seed: cli.seed,
            num_segments: cli.segments,
            marble_radius: defaults.marble_radius,
            obstacle_fields: if cli.obstacles == 0 { 0 } else { 1 },
            obstacles: ObstacleConfig {
                count: cli.obstacles,
                ..default()
            },
            ..defaults.generator
        };

        Self {
            marble_count: cli.marbles,
            generator,
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags_reach_generator() {
        let cli = Cli::parse_from([
            "marble-run",
            "--seed",
            "7",
            "--marbles",
            "3",
            "--segments",
            "5",
            "--obstacles",
            "0",
        ]);
        let config = RaceConfig::from(cli);

        assert_eq!(config.marble_count, 3);
        assert_eq!(config.generator.seed, 7);
        assert_eq!(config.generator.num_segments, 5);
        assert_eq!(config.generator.obstacle_fields, 0);
    }

    #[test]
    fn test_defaults_match_race_config() {
        let config = RaceConfig::from(Cli::parse_from(["marble-run"]));
        let defaults = RaceConfig::default();

        assert_eq!(config.marble_count, defaults.marble_count);
        assert_eq!(config.generator.seed, defaults.generator.seed);
        assert_eq!(config.generator.obstacles.count, 6);
    }
}
