use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time;

use nalgebra::vector;
use show_image::event::{self, VirtualKeyCode};
use show_image::{create_window, ImageInfo, ImageView, WindowOptions, WindowProxy};
use tracing::{info, warn};

use tiny_rasterizer::input::{CameraInput, Key, KeyboardState};
use tiny_rasterizer::math::{Mat4, Vec3};
use tiny_rasterizer::render::RasterizerSettings;
use tiny_rasterizer::scene::{CullMode, MaterialLibrary, Mesh, Primitive, Scene};
use tiny_rasterizer::{
    Camera, Capture, FrameBuffer, Present, RenderConfig, RenderError, RenderMode, Renderer, SoftwareRasterizer,
};

/// Headless runs advance the animation by this step per frame.
const HEADLESS_FRAME_TIME: f32 = 1.0 / 60.0;

pub struct Params {
    pub config: RenderConfig,
    pub asset_path: Option<PathBuf>,
    pub output: Option<PathBuf>, // Headless if set.
    pub frames: u32,
    pub print_fps: bool,
}

enum Action {
    Exit,
    SwitchRenderMode,
}

/// Hands finished frames over to the window.
struct WindowPresenter<'a> {
    window: &'a WindowProxy,
}

impl Present for WindowPresenter<'_> {
    fn present(&mut self, frame: &FrameBuffer) -> Result<(), RenderError> {
        let image_data = ImageView::new(ImageInfo::rgb8(frame.width(), frame.height()), frame.as_render_data());
        return self
            .window
            .set_image("image", image_data)
            .map_err(|e| RenderError::Presentation(e.to_string()));
    }
}

/// Camera action bound to a key, arrows and numpad move, IJKL look around.
fn map_key(key_code: VirtualKeyCode) -> Option<Key> {
    return match key_code {
        VirtualKeyCode::Up | VirtualKeyCode::Numpad8 => Some(Key::Forward),
        VirtualKeyCode::Down | VirtualKeyCode::Numpad2 => Some(Key::Backward),
        VirtualKeyCode::Left | VirtualKeyCode::Numpad4 => Some(Key::Left),
        VirtualKeyCode::Right | VirtualKeyCode::Numpad6 => Some(Key::Right),
        VirtualKeyCode::PageUp | VirtualKeyCode::Numpad9 => Some(Key::Up),
        VirtualKeyCode::PageDown | VirtualKeyCode::Numpad7 => Some(Key::Down),
        VirtualKeyCode::J => Some(Key::YawLeft),
        VirtualKeyCode::L => Some(Key::YawRight),
        VirtualKeyCode::I => Some(Key::PitchUp),
        VirtualKeyCode::K => Some(Key::PitchDown),
        _ => None,
    };
}

/// Updates the keyboard state, Escape and R act on release.
fn handle_event(window_event: event::WindowEvent, keys: &mut KeyboardState) -> Option<Action> {
    if let event::WindowEvent::KeyboardInput(event) = window_event {
        let key_code = event.input.key_code?;
        let pressed = event.input.state.is_pressed();
        match key_code {
            VirtualKeyCode::Escape if !pressed => return Some(Action::Exit),
            VirtualKeyCode::R if !pressed => return Some(Action::SwitchRenderMode),
            _ => {
                if let Some(key) = map_key(key_code) {
                    keys.set(key, pressed);
                }
            }
        }
    }

    return None;
}

/// Gold cube spinning over a floor, a plastic block next to it and a translucent pane in front.
fn demo_scene(scene: &mut Scene, materials: &mut MaterialLibrary) -> Result<(), RenderError> {
    let cube = Arc::new(Mesh::cube(1.0));
    let quad = Arc::new(Mesh::quad(1.0));

    scene.add(Primitive::new(cube.clone(), materials.get("gold")?));
    scene.add(
        Primitive::new(cube, materials.get("green_plastic")?)
            .with_world(Mat4::new_translation(&vector![1.5, -0.25, 1.0]) * Mat4::new_scaling(0.5)),
    );
    // Quad faces -z, a quarter turn around x makes it face up.
    let floor = Mat4::new_translation(&vector![0.0, -0.5, 0.0])
        * Mat4::from_axis_angle(&Vec3::x_axis(), std::f32::consts::FRAC_PI_2)
        * Mat4::new_scaling(8.0);
    scene.add(Primitive::new(quad.clone(), materials.get("stone")?).with_world(floor));
    // Blended layers go last, the rasterizer does not sort.
    scene.add(
        Primitive::new(quad, materials.get("sky_blue_glass")?)
            .with_world(Mat4::new_translation(&vector![-0.9, 0.1, -1.0]) * Mat4::new_scaling(0.8))
            .with_cull_mode(CullMode::None)
            .with_depth_write(false)
            .with_blend(0.4),
    );
    return Ok(());
}

fn build_scene(config: &RenderConfig, asset_path: Option<&Path>) -> Result<Scene, RenderError> {
    let mut materials = config.material_library();
    let mut scene = Scene::new(config.lighting());
    scene.clear_color = config.clear_color();
    match asset_path {
        Some(path) => {
            let material = materials.get(&config.asset_material)?;
            let mesh = Arc::new(Mesh::load_obj(path)?);
            scene.add(Primitive::new(mesh, material));
        }
        None => demo_scene(&mut scene, &mut materials)?,
    }
    return Ok(scene);
}

/// Spins the first primitive of the demo scene around world up.
fn animate(scene: &mut Scene, passed_time: f32) {
    if let Some(primitive) = scene.primitives.first_mut() {
        primitive.world = Mat4::from_axis_angle(&Vec3::y_axis(), 0.5 * passed_time);
    }
}

/// Builds camera, scene and renderer from the params, then either renders headless into a PNG
/// or opens a window and runs until Escape is released.
pub fn run(params: Params) -> anyhow::Result<()> {
    let config = &params.config;
    // Invalid camera parameters stop here, before anything is drawn.
    let mut camera = config.camera()?;
    let mut scene = build_scene(config, params.asset_path.as_deref())?;
    let animated = params.asset_path.is_none();

    let software = SoftwareRasterizer::new(config.width, config.height, config.rasterizer_settings())?;
    let mut renderer = Renderer::new(software);
    if config.render_mode == RenderMode::Hardware {
        warn!("no hardware backend in this build, falling back to software rendering");
        camera.switch_render_mode(RenderMode::Software.handedness());
    }
    log_settings(renderer.software().settings(), &camera);

    return match &params.output {
        Some(path) => run_headless(&mut renderer, &camera, &mut scene, animated, params.frames, path),
        None => run_windowed(&mut renderer, &mut camera, &mut scene, animated, &params),
    };
}

fn log_settings(settings: &RasterizerSettings, camera: &Camera) {
    info!(
        frustum_culling = ?settings.frustum_culling,
        near_clipping = settings.near_clipping,
        handedness = ?camera.handedness(),
        "renderer ready"
    );
}

fn run_headless(
    renderer: &mut Renderer,
    camera: &Camera,
    scene: &mut Scene,
    animated: bool,
    frames: u32,
    path: &Path,
) -> anyhow::Result<()> {
    let mut capture = Capture::new();
    for frame in 0..frames.max(1) {
        if animated {
            animate(scene, frame as f32 * HEADLESS_FRAME_TIME);
        }
        renderer.render(camera, scene, &mut capture)?;
    }

    if let Some(frame) = capture.last_frame() {
        frame.save_png(path)?;
        info!(path = %path.display(), frames = capture.frames(), "frame written");
    }
    return Ok(());
}

/// Opens the window and shows rendered frames until Escape is released.
fn run_windowed(
    renderer: &mut Renderer,
    camera: &mut Camera,
    scene: &mut Scene,
    animated: bool,
    params: &Params,
) -> anyhow::Result<()> {
    let window_options: WindowOptions = WindowOptions {
        size: Some([params.config.width, params.config.height]),
        ..Default::default()
    };
    let window = create_window("output", window_options)?;
    let event_channel = window.event_channel()?;
    let mut presenter = WindowPresenter { window: &window };

    let mut keys = KeyboardState::new();
    let mut exit = false;
    let time_begin = time::Instant::now();
    let mut last_frame = time::Instant::now();
    let mut frame_counter_time_begin = time::Instant::now();
    let mut frame_counter: u32 = 0;
    while !exit {
        // Unloading all the events that have piled up since the last frame.
        for window_event in event_channel.try_iter() {
            match handle_event(window_event, &mut keys) {
                Some(Action::Exit) => exit = true,
                Some(Action::SwitchRenderMode) => {
                    if let Err(e) = renderer.switch_render_mode(camera) {
                        warn!(error = %e, "render mode unchanged");
                    }
                }
                None => (),
            }
        }

        let now = time::Instant::now();
        let delta_time = now.duration_since(last_frame).as_secs_f32();
        last_frame = now;
        camera.update(delta_time, &CameraInput::from_keys(keys));
        if animated {
            animate(scene, now.duration_since(time_begin).as_secs_f32());
        }

        renderer.render(camera, scene, &mut presenter)?;

        if params.print_fps {
            // Counting frames to report stats every second.
            frame_counter += 1;
            if time::Instant::now().duration_since(frame_counter_time_begin).as_secs_f32() > 1.0 {
                info!(fps = frame_counter, mode = ?renderer.mode(), "frames per second");
                frame_counter_time_begin = time::Instant::now();
                frame_counter = 0;
            }
        }
    }

    return Ok(());
}
