//! Per-frame driver tying camera, shader and model together

use crate::backend::traits::*;
use crate::backend::types::ClearColor;
use crate::error::ViewerResult;
use crate::resources::{ShaderProgram, PROJECTION_UNIFORM, VIEW_UNIFORM};
use crate::scene::{Camera, CameraInput, Model};
use crate::ViewerConfig;

pub struct Viewer<B: GraphicsBackend> {
    context: RenderContext<B>,
    // Field order is drop order: the model's resources go before the program.
    model: Model<B>,
    shader: ShaderProgram<B>,
    camera: Camera,
    clear_color: ClearColor,
}

impl<B: GraphicsBackend> Viewer<B> {
    /// Load the shaders, model and texture named by `config`
    pub fn new(context: &RenderContext<B>, config: &ViewerConfig) -> ViewerResult<Self> {
        let shader =
            ShaderProgram::from_files(context, &config.vertex_shader, &config.fragment_shader)?;
        let model = Model::load(
            context,
            &config.model_path,
            &config.texture_path,
            config.texture_unit,
        )?;
        let camera = Camera::new(config.fov_degrees, config.aspect());
        Ok(Self::from_parts(context, shader, model, camera, config.clear_color))
    }

    pub fn from_parts(
        context: &RenderContext<B>,
        shader: ShaderProgram<B>,
        model: Model<B>,
        camera: Camera,
        clear_color: ClearColor,
    ) -> Self {
        Self {
            context: context.clone(),
            model,
            shader,
            camera,
            clear_color,
        }
    }

    /// Update the camera, then clear, upload camera uniforms, draw and present
    pub fn frame(&mut self, input: &CameraInput, dt: f32) -> ViewerResult<()> {
        self.camera.update(input, dt);

        self.context.borrow_mut().begin_frame(self.clear_color)?;

        self.shader.use_program();
        self.shader
            .set_uniform_mat4(PROJECTION_UNIFORM, &self.camera.projection_matrix());
        self.shader
            .set_uniform_mat4(VIEW_UNIFORM, &self.camera.view_matrix());

        // The frame is still submitted when the draw fails so the backend is not left mid-frame.
        let drawn = self.model.draw(&self.shader);
        self.context.borrow_mut().end_frame()?;
        Ok(drawn?)
    }

    /// Resize the render target. The projection keeps its startup aspect ratio.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.context.borrow_mut().resize(width, height);
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn model(&self) -> &Model<B> {
        &self.model
    }

    pub fn shader(&self) -> &ShaderProgram<B> {
        &self.shader
    }
}
