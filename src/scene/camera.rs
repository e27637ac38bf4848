//! Free-fly camera

use glam::{Mat4, Vec3};

const PARALLEL_EPSILON: f32 = 1e-6;

/// Directional inputs held during a frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CameraInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub yaw_left: bool,
    pub yaw_right: bool,
    pub pitch_up: bool,
    pub pitch_down: bool,
}

impl CameraInput {
    pub fn is_rotating(&self) -> bool {
        self.yaw_left || self.yaw_right || self.pitch_up || self.pitch_down
    }
}

/// Camera with a yaw/pitch orientation and a fixed perspective projection
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    front: Vec3,
    up: Vec3,
    yaw: f32,
    pitch: f32,
    view: Mat4,
    projection: Mat4,
}

impl Camera {
    pub const START_POSITION: Vec3 = Vec3::new(0.0, 0.0, 3.0);
    pub const START_FRONT: Vec3 = Vec3::new(0.0, -1.0, 0.0);
    pub const START_YAW: f32 = -90.0;
    /// Units per second
    pub const MOVEMENT_SPEED: f32 = 5.0;
    /// Degrees per second
    pub const ROTATION_SPEED: f32 = 60.0;
    pub const PITCH_LIMIT: f32 = 89.0;
    pub const NEAR: f32 = 0.1;
    pub const FAR: f32 = 100.0;

    pub fn new(fov_degrees: f32, aspect: f32) -> Self {
        let mut camera = Self {
            position: Self::START_POSITION,
            front: Self::START_FRONT,
            up: Vec3::Y,
            yaw: Self::START_YAW,
            pitch: 0.0,
            view: Mat4::IDENTITY,
            projection: Mat4::perspective_rh(
                fov_degrees.to_radians(),
                aspect,
                Self::NEAR,
                Self::FAR,
            ),
        };
        camera.update_view();
        camera
    }

    /// Integrate one frame of input over `dt` seconds and refresh the view matrix
    pub fn update(&mut self, input: &CameraInput, dt: f32) {
        let step = Self::MOVEMENT_SPEED * dt;
        let right = self.right();

        if input.forward {
            self.position += self.front * step;
        }
        if input.backward {
            self.position -= self.front * step;
        }
        if input.left {
            self.position -= right * step;
        }
        if input.right {
            self.position += right * step;
        }
        if input.up {
            self.position += self.up * step;
        }
        if input.down {
            self.position -= self.up * step;
        }

        let turn = Self::ROTATION_SPEED * dt;
        if input.yaw_right {
            self.yaw += turn;
        }
        if input.yaw_left {
            self.yaw -= turn;
        }
        if input.pitch_up {
            self.pitch += turn;
        }
        if input.pitch_down {
            self.pitch -= turn;
        }
        self.pitch = self.pitch.clamp(-Self::PITCH_LIMIT, Self::PITCH_LIMIT);

        // The resting front does not match the starting yaw/pitch; it is only
        // re-derived once the camera actually turns.
        if input.is_rotating() {
            self.update_front();
        }
        self.update_view();
    }

    fn update_front(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.front = Vec3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        )
        .normalize();
    }

    /// Horizontal direction given by yaw alone
    fn heading(&self) -> Vec3 {
        let yaw = self.yaw.to_radians();
        Vec3::new(yaw.cos(), 0.0, yaw.sin())
    }

    /// Front and up are parallel in the resting pose
    fn looks_along_up(&self) -> bool {
        self.front.cross(self.up).length_squared() < PARALLEL_EPSILON
    }

    /// Unit strafe direction; falls back to the yaw heading when front is parallel to up
    pub fn right(&self) -> Vec3 {
        if self.looks_along_up() {
            self.heading().cross(self.up).normalize()
        } else {
            self.front.cross(self.up).normalize()
        }
    }

    fn update_view(&mut self) {
        let up = if self.looks_along_up() {
            self.heading()
        } else {
            self.up
        };
        self.view = Mat4::look_at_rh(self.position, self.position + self.front, up);
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Unit look direction
    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    /// Degrees
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Degrees, within `[-PITCH_LIMIT, PITCH_LIMIT]`
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    const DT: f32 = 1.0 / 60.0;

    fn camera() -> Camera {
        Camera::new(60.0, 1280.0 / 720.0)
    }

    #[test]
    fn test_rest_has_no_drift() {
        let mut camera = camera();
        let view = camera.view_matrix();
        camera.update(&CameraInput::default(), DT);

        assert!(view.is_finite());
        assert_eq!(camera.position(), Vec3::new(0.0, 0.0, 3.0));
        assert_eq!(camera.front(), Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(camera.view_matrix(), view);
    }

    #[test]
    fn test_view_valid_before_first_update() {
        let camera = camera();
        let view = camera.view_matrix();
        assert!(view.is_finite());

        // Looking straight down with the yaw heading (-Z) as screen up
        let eye = view.transform_point3(Vec3::new(0.0, 0.0, 3.0));
        assert_relative_eq!(eye.length(), 0.0, epsilon = 1e-6);
        let below = view.transform_point3(Vec3::new(0.0, -1.0, 3.0));
        assert_relative_eq!(below.z, -1.0, epsilon = 1e-5);
        let ahead = view.transform_point3(Vec3::new(0.0, 0.0, 2.0));
        assert_relative_eq!(ahead.y, 1.0, epsilon = 1e-5);
    }

    #[rstest]
    #[case::right(CameraInput { right: true, ..Default::default() }, 1.0)]
    #[case::left(CameraInput { left: true, ..Default::default() }, -1.0)]
    fn test_strafe_from_resting_pose(#[case] input: CameraInput, #[case] sign: f32) {
        let mut camera = camera();
        camera.update(&input, 1.0);

        let moved = camera.position() - Camera::START_POSITION;
        assert_relative_eq!(moved.x, sign * Camera::MOVEMENT_SPEED, epsilon = 1e-5);
        assert_relative_eq!(moved.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(moved.z, 0.0, epsilon = 1e-5);
        assert_eq!(camera.front(), Camera::START_FRONT);
        assert!(camera.view_matrix().is_finite());
    }

    #[test]
    fn test_view_stays_finite_through_turns() {
        let mut camera = camera();
        let inputs = [
            CameraInput::default(),
            CameraInput {
                pitch_down: true,
                ..Default::default()
            },
            CameraInput {
                yaw_left: true,
                forward: true,
                ..Default::default()
            },
            CameraInput::default(),
        ];
        for input in inputs.iter().cycle().take(400) {
            camera.update(input, DT);
            assert!(camera.view_matrix().is_finite());
            assert_relative_eq!(camera.right().length(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_projection_is_fixed() {
        let mut camera = camera();
        let projection = camera.projection_matrix();
        camera.update(
            &CameraInput {
                forward: true,
                yaw_right: true,
                ..Default::default()
            },
            0.5,
        );
        assert_eq!(camera.projection_matrix(), projection);
        assert_eq!(
            projection,
            Mat4::perspective_rh(60f32.to_radians(), 1280.0 / 720.0, 0.1, 100.0)
        );
    }

    #[rstest]
    #[case::long_pitch_up(true, 200)]
    #[case::long_pitch_down(false, 200)]
    #[case::single_huge_step(true, 1)]
    fn test_pitch_is_clamped(#[case] up: bool, #[case] frames: usize) {
        let mut camera = camera();
        let input = CameraInput {
            pitch_up: up,
            pitch_down: !up,
            ..Default::default()
        };
        let dt = if frames == 1 { 10.0 } else { 0.1 };
        for _ in 0..frames {
            camera.update(&input, dt);
            assert!(camera.pitch().abs() <= Camera::PITCH_LIMIT);
        }
        assert_relative_eq!(camera.pitch().abs(), Camera::PITCH_LIMIT);
    }

    #[rstest]
    #[case::yaw_right(CameraInput { yaw_right: true, ..Default::default() })]
    #[case::yaw_left(CameraInput { yaw_left: true, ..Default::default() })]
    #[case::pitch_and_yaw(CameraInput {
        yaw_right: true,
        pitch_up: true,
        ..Default::default()
    })]
    #[case::moving_and_turning(CameraInput {
        forward: true,
        left: true,
        pitch_down: true,
        ..Default::default()
    })]
    fn test_front_stays_unit_length(#[case] input: CameraInput) {
        let mut camera = camera();
        for _ in 0..500 {
            camera.update(&input, DT);
            assert_relative_eq!(camera.front().length(), 1.0, epsilon = 1e-5);
        }
    }

    #[rstest]
    #[case::one_second(60, 1.0 / 60.0)]
    #[case::half_second(30, 1.0 / 60.0)]
    #[case::coarse_steps(4, 0.25)]
    fn test_yaw_right_rate(#[case] frames: usize, #[case] dt: f32) {
        let mut camera = camera();
        let input = CameraInput {
            yaw_right: true,
            ..Default::default()
        };
        for _ in 0..frames {
            camera.update(&input, dt);
        }
        let expected = Camera::START_YAW + Camera::ROTATION_SPEED * dt * frames as f32;
        assert_relative_eq!(camera.yaw(), expected, epsilon = 1e-3);
    }

    #[test]
    fn test_forward_moves_along_front() {
        let mut camera = camera();
        camera.update(
            &CameraInput {
                forward: true,
                ..Default::default()
            },
            0.2,
        );
        // Initial front points down
        assert_relative_eq!(camera.position().y, -1.0, epsilon = 1e-6);
        assert_relative_eq!(camera.position().z, 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_vertical_movement_uses_up() {
        let mut camera = camera();
        let input = CameraInput {
            up: true,
            ..Default::default()
        };
        camera.update(&input, 1.0);
        assert_relative_eq!(camera.position().y, 5.0);
        camera.update(
            &CameraInput {
                down: true,
                ..Default::default()
            },
            1.0,
        );
        assert_relative_eq!(camera.position().y, 0.0);
    }

    #[test]
    fn test_strafe_is_perpendicular_to_front() {
        let mut camera = camera();
        camera.update(
            &CameraInput {
                yaw_right: true,
                ..Default::default()
            },
            DT,
        );
        let start = camera.position();
        camera.update(
            &CameraInput {
                right: true,
                ..Default::default()
            },
            0.5,
        );
        let moved = camera.position() - start;
        assert_relative_eq!(moved.length(), 2.5, epsilon = 1e-5);
        assert_relative_eq!(moved.dot(camera.front()), 0.0, epsilon = 1e-5);
    }
}
