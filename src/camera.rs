use bevy::input::mouse::AccumulatedMouseMotion;
use bevy::prelude::*;
use bevy::window::{CursorGrabMode, PrimaryWindow};

// ============================================================================
// INPUT CONTROLLER
// ============================================================================

/// Frame-to-frame input state: the cursor toggle and the last cursor sample.
///
/// Lives as a resource and is handed to the input system every frame.
#[derive(Resource, Debug, Default)]
pub struct InputController {
    cursor_captured: bool,
    toggle_held: bool,
    last_cursor: Option<Vec2>,
}

impl InputController {
    pub fn cursor_captured(&self) -> bool {
        self.cursor_captured
    }

    /// Feed the toggle key state; flips capture on the press edge only.
    /// Returns true when the capture state changed.
    pub fn update_toggle(&mut self, pressed: bool) -> bool {
        let edge = pressed && !self.toggle_held;
        self.toggle_held = pressed;

        if edge {
            self.cursor_captured = !self.cursor_captured;
            // Re-seed so the first sample after a toggle does not jump
            self.last_cursor = None;
        }
        edge
    }

    /// Offset since the previous cursor sample, with y growing upward.
    /// The first sample only seeds the state.
    pub fn cursor_delta(&mut self, position: Vec2) -> Vec2 {
        let delta = match self.last_cursor {
            Some(last) => Vec2::new(position.x - last.x, last.y - position.y),
            None => Vec2::ZERO,
        };
        self.last_cursor = Some(position);
        delta
    }
}

// ============================================================================
// FLY CAMERA
// ============================================================================

/// Free-flying camera with yaw/pitch in degrees
#[derive(Component, Debug, Clone)]
pub struct FlyCamera {
    pub yaw: f32,
    pub pitch: f32,
    /// Units per second
    pub speed: f32,
    /// Degrees per pixel
    pub sensitivity: f32,
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self {
            yaw: -90.0,
            pitch: 0.0,
            speed: 2.5,
            sensitivity: 0.1,
        }
    }
}

impl FlyCamera {
    pub fn look(&mut self, delta: Vec2) {
        self.yaw += delta.x * self.sensitivity;
        self.pitch = (self.pitch + delta.y * self.sensitivity).clamp(-89.0, 89.0);
    }

    pub fn forward(&self) -> Vec3 {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize()
    }

    /// Aim so that `forward()` points from `eye` toward `target`
    pub fn face(&mut self, eye: Vec3, target: Vec3) {
        let dir = (target - eye).normalize_or(Vec3::NEG_Z);
        self.pitch = dir.y.asin().to_degrees().clamp(-89.0, 89.0);
        self.yaw = dir.z.atan2(dir.x).to_degrees();
    }
}

/// Movement direction from WASD plus Q/E for down/up
pub fn movement_axis(keys: &ButtonInput<KeyCode>, camera: &FlyCamera) -> Vec3 {
    let mut axis = Vec3::ZERO;
    if keys.pressed(KeyCode::KeyW) {
        axis += camera.forward();
    }
    if keys.pressed(KeyCode::KeyS) {
        axis -= camera.forward();
    }
    if keys.pressed(KeyCode::KeyD) {
        axis += camera.right();
    }
    if keys.pressed(KeyCode::KeyA) {
        axis -= camera.right();
    }
    if keys.pressed(KeyCode::KeyE) {
        axis += Vec3::Y;
    }
    if keys.pressed(KeyCode::KeyQ) {
        axis -= Vec3::Y;
    }
    axis.normalize_or_zero()
}

// ============================================================================
// SYSTEMS
// ============================================================================

/// Space toggles mouse-look; WASDQE flies
pub fn fly_camera_input(
    time: Res<Time>,
    keys: Res<ButtonInput<KeyCode>>,
    mouse_motion: Res<AccumulatedMouseMotion>,
    mut controller: ResMut<InputController>,
    mut windows: Query<&mut Window, With<PrimaryWindow>>,
    mut cameras: Query<(&mut Transform, &mut FlyCamera)>,
) {
    let Ok(mut window) = windows.get_single_mut() else {
        return;
    };

    if controller.update_toggle(keys.pressed(KeyCode::Space)) {
        let captured = controller.cursor_captured();
        window.cursor_options.grab_mode = if captured {
            CursorGrabMode::Confined
        } else {
            CursorGrabMode::None
        };
        window.cursor_options.visible = !captured;
        debug!("mouse look {}", if captured { "on" } else { "off" });
    }

    // Some platforms stop reporting a position while grabbed; use raw motion then
    let look = if !controller.cursor_captured() {
        Vec2::ZERO
    } else if let Some(position) = window.cursor_position() {
        controller.cursor_delta(position)
    } else {
        Vec2::new(mouse_motion.delta.x, -mouse_motion.delta.y)
    };

    for (mut transform, mut camera) in cameras.iter_mut() {
        camera.look(look);

        let step = movement_axis(&keys, &camera) * camera.speed * time.delta_secs();
        transform.translation += step;
        let target = transform.translation + camera.forward();
        transform.look_at(target, Vec3::Y);
    }
}
