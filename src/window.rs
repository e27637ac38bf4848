//! Window management using winit

use crate::scene::CameraInput;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use winit::{
    dpi::PhysicalSize,
    error::{EventLoopError, OsError},
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window as WinitWindow, WindowBuilder},
};

/// Wrapper around winit window with input and resize state
pub struct Window {
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
    resized: bool,
    close_requested: bool,
    pressed: HashSet<KeyCode>,
}

impl Window {
    /// Create a new window with the given title and dimensions
    pub fn new(
        event_loop: &EventLoop<()>,
        title: &str,
        width: u32,
        height: u32,
    ) -> Result<Self, OsError> {
        let window = Arc::new(
            WindowBuilder::new()
                .with_title(title)
                .with_inner_size(PhysicalSize::new(width, height))
                .build(event_loop)?,
        );

        Ok(Self {
            window,
            width,
            height,
            resized: false,
            close_requested: false,
            pressed: HashSet::new(),
        })
    }

    /// Shared handle for surface creation
    pub fn window_arc(&self) -> Arc<WinitWindow> {
        Arc::clone(&self.window)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Check if window was resized since the flag was last cleared
    pub fn was_resized(&self) -> bool {
        self.resized
    }

    pub fn clear_resize_flag(&mut self) {
        self.resized = false;
    }

    pub fn should_close(&self) -> bool {
        self.close_requested
    }

    /// Map the currently held keys onto camera inputs
    pub fn camera_input(&self) -> CameraInput {
        camera_input(&self.pressed)
    }

    /// Handle window events
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::Resized(size) => {
                self.width = size.width;
                self.height = size.height;
                self.resized = true;
            }
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => match state {
                ElementState::Pressed => {
                    self.pressed.insert(*code);
                }
                ElementState::Released => {
                    self.pressed.remove(code);
                }
            },
            WindowEvent::Focused(false) => self.pressed.clear(),
            _ => {}
        }
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }
}

/// W/S forward/back, A/D strafe, Space/Left Shift up/down, arrows turn
pub fn camera_input(pressed: &HashSet<KeyCode>) -> CameraInput {
    let held = |key| pressed.contains(&key);
    CameraInput {
        forward: held(KeyCode::KeyW),
        backward: held(KeyCode::KeyS),
        left: held(KeyCode::KeyA),
        right: held(KeyCode::KeyD),
        up: held(KeyCode::Space),
        down: held(KeyCode::ShiftLeft),
        yaw_left: held(KeyCode::ArrowLeft),
        yaw_right: held(KeyCode::ArrowRight),
        pitch_up: held(KeyCode::ArrowUp),
        pitch_down: held(KeyCode::ArrowDown),
    }
}

/// Drive the event loop, calling `callback` once per iteration with the elapsed seconds
///
/// The loop exits when the window is closed or the callback returns `false`.
pub fn run<F>(
    event_loop: EventLoop<()>,
    mut window: Window,
    mut callback: F,
) -> Result<(), EventLoopError>
where
    F: FnMut(&mut Window, f32) -> bool,
{
    let mut last_frame = Instant::now();

    event_loop.run(move |event, elwt: &EventLoopWindowTarget<()>| {
        elwt.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { event, .. } => {
                window.handle_event(&event);

                if let WindowEvent::CloseRequested = event {
                    elwt.exit();
                }
            }
            Event::AboutToWait => {
                if window.should_close() {
                    return;
                }
                let now = Instant::now();
                let dt = now.duration_since(last_frame).as_secs_f32();
                last_frame = now;

                if callback(&mut window, dt) {
                    window.request_redraw();
                } else {
                    elwt.exit();
                }
            }
            _ => {}
        }
    })
}
