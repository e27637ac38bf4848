use model_viewer::backend::{BackendError, RenderContext};
use model_viewer::window::{self, Window};
use model_viewer::{Viewer, ViewerConfig, ViewerError, ViewerResult, WgpuBackend};
use std::cell::RefCell;
use std::rc::Rc;
use winit::event_loop::EventLoop;

fn run(config: ViewerConfig) -> ViewerResult<()> {
    let event_loop = EventLoop::new()?;
    let window = Window::new(&event_loop, &config.title, config.width, config.height)?;

    let backend = WgpuBackend::new(window.window_arc(), config.vsync)?;
    let context = RenderContext::new(backend);
    let mut viewer = Viewer::new(&context, &config)?;

    log::info!("Controls: WASD move, Space/Left Shift up/down, arrow keys turn");

    let failure: Rc<RefCell<Option<ViewerError>>> = Rc::new(RefCell::new(None));
    let failure_slot = Rc::clone(&failure);

    window::run(event_loop, window, move |window, dt| {
        if window.was_resized() {
            let (width, height) = window.dimensions();
            viewer.resize(width, height);
            window.clear_resize_flag();
        }

        match viewer.frame(&window.camera_input(), dt) {
            Ok(()) => true,
            Err(ViewerError::Backend(BackendError::SurfaceLost)) => {
                log::warn!("Surface lost, reconfiguring");
                let (width, height) = window.dimensions();
                viewer.resize(width, height);
                true
            }
            Err(e) => {
                *failure_slot.borrow_mut() = Some(e);
                false
            }
        }
    })?;

    let failure = failure.borrow_mut().take();
    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting model viewer");

    if let Err(e) = run(ViewerConfig::default()) {
        log::error!("{e}");
        std::process::exit(1);
    }
}
