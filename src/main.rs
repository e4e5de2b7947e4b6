use bevy::prelude::*;
use clap::Parser;

use marble_run::{Cli, MarbleRunPlugin, RaceConfig};

// ============================================================================
// MAIN
// ============================================================================

fn main() {
    let config = RaceConfig::from(Cli::parse());

    App::new()
        .insert_resource(config)
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Marble Run".into(),
                ..default()
            }),
            ..default()
        }))
        .add_plugins(MarbleRunPlugin)
        .run();
}
