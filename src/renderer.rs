use std::collections::HashMap;

use three_d::*;

use crate::animate::{FrameScheduler, FrameTarget, FrameTiming, RenderLoop, SystemClock};
use crate::config::{hex_to_rgb, MaterialConfig, MaterialKind, SceneConfig};
use crate::error::AppError;
use crate::loader::AssetLoader;
use crate::scene::{LightKind, NodeId, NodeKind};
use crate::stage::Stage;
use crate::utils::{browser_viewport, resize_canvas};
use crate::viewport::ViewportState;


/// Capacity of the asset event bus; two loads produce at most three events
const ASSET_BUS_CAPACITY: usize = 8;


fn srgba(rgb: [u8; 3]) -> Srgba {
    Srgba::new_opaque(rgb[0], rgb[1], rgb[2])
}


fn physical_material(context: &Context, config: &MaterialConfig) -> PhysicalMaterial {
    // three-d has no Lambert model; a fully rough dielectric is the diffuse-only case
    let (roughness, metallic) = match config.kind {
        MaterialKind::Lambert => (1.0, 0.0),
        MaterialKind::Standard => (config.roughness, config.metalness),
    };
    let mut material = PhysicalMaterial::new_opaque(
        context,
        &CpuMaterial {
            albedo: srgba(config.rgb()),
            roughness,
            metallic,
            ..Default::default()
        },
    );
    if config.double_sided {
        material.render_states.cull = Cull::None;
    }
    material
}


enum GpuObject {
    Mesh(Gm<Mesh, PhysicalMaterial>),
    /// Parts keep the node transforms baked by the glTF loader
    Model(Model<PhysicalMaterial>, Vec<Mat4>),
}


/// GPU-side mirror of the scene graph, rebuilt incrementally on revision changes
struct GpuScene {
    context: Context,
    objects: HashMap<NodeId, GpuObject>,
    directional: Vec<(NodeId, DirectionalLight, Option<u32>)>,
    ambient: Vec<AmbientLight>,
    failed: Vec<NodeId>,
    revision: Option<u64>,
}

impl GpuScene {
    fn new(context: &Context) -> Self {
        Self {
            context: context.clone(),
            objects: HashMap::new(),
            directional: Vec::new(),
            ambient: Vec::new(),
            failed: Vec::new(),
            revision: None,
        }
    }

    /// Uploads new nodes, refreshes transforms and shadow maps. Returns true if anything changed.
    fn sync(&mut self, stage: &Stage) -> bool {
        let graph = stage.graph();
        if self.revision == Some(graph.revision()) {
            return false;
        }

        for id in graph.traverse() {
            if self.objects.contains_key(&id) || self.failed.contains(&id) {
                continue;
            }
            let Some(node) = graph.node(id) else { continue };
            match &node.kind {
                NodeKind::Mesh { material, .. } => {
                    if let Some(cpu_mesh) = stage.mesh_geometry(id) {
                        let gm = Gm::new(Mesh::new(&self.context, &cpu_mesh), physical_material(&self.context, material));
                        self.objects.insert(id, GpuObject::Mesh(gm));
                    }
                }
                NodeKind::Model(cpu_model) => match Model::<PhysicalMaterial>::new(&self.context, cpu_model) {
                    Ok(model) => {
                        let bases = cpu_model.geometries.iter().map(|p| p.transformation).collect();
                        self.objects.insert(id, GpuObject::Model(model, bases));
                    }
                    Err(e) => {
                        log::error!("could not upload {}: {:?}", node.name, e);
                        self.failed.push(id);
                    }
                },
                NodeKind::Light(LightKind::Directional { color, intensity, shadow_map_size }) => {
                    let light = DirectionalLight::new(&self.context, *intensity, srgba(*color), &stage.light_direction(id));
                    self.directional.push((id, light, *shadow_map_size));
                }
                NodeKind::Light(LightKind::Ambient { color, intensity }) => {
                    self.ambient.push(AmbientLight::new(&self.context, *intensity, srgba(*color)));
                }
                NodeKind::Root | NodeKind::Camera => {}
            }
        }

        for (id, object) in self.objects.iter_mut() {
            let world = graph.world_matrix(*id);
            match object {
                GpuObject::Mesh(gm) => gm.set_transformation(world),
                GpuObject::Model(model, bases) => {
                    for (part, base) in model.iter_mut().zip(bases.iter()) {
                        part.set_transformation(world * *base);
                    }
                }
            }
        }

        for (id, light, _) in self.directional.iter_mut() {
            light.direction = stage.light_direction(*id);
        }
        self.update_shadows(stage);

        self.revision = Some(graph.revision());
        true
    }

    fn update_shadows(&mut self, stage: &Stage) {
        let graph = stage.graph();
        let casters: Vec<&dyn Geometry> = self
            .objects
            .iter()
            .filter(|(id, _)| graph.node(**id).map_or(false, |n| n.cast_shadow))
            .flat_map(|(_, object)| -> Vec<&dyn Geometry> {
                match object {
                    GpuObject::Mesh(gm) => vec![gm as &dyn Geometry],
                    GpuObject::Model(model, _) => model.iter().map(|part| part as &dyn Geometry).collect(),
                }
            })
            .collect();

        for (_, light, size) in self.directional.iter_mut() {
            match size {
                Some(size) => light.generate_shadow_map(*size, &casters),
                None => light.clear_shadow_map(),
            }
        }
    }

    fn objects(&self) -> Vec<&dyn Object> {
        let mut objects: Vec<&dyn Object> = Vec::new();
        for object in self.objects.values() {
            match object {
                GpuObject::Mesh(gm) => objects.push(gm),
                GpuObject::Model(model, _) => objects.extend(model.iter().map(|part| part as &dyn Object)),
            }
        }
        objects
    }

    fn lights(&self) -> Vec<&dyn Light> {
        let mut lights: Vec<&dyn Light> = Vec::new();
        lights.extend(self.directional.iter().map(|(_, light, _)| light as &dyn Light));
        lights.extend(self.ambient.iter().map(|light| light as &dyn Light));
        lights
    }
}


/// three-d re-runs the closure until it returns `exit`; the next frame is
/// only waited on when nothing asked for it
#[derive(Default)]
struct NextFrame {
    requested: bool,
}
impl FrameScheduler for NextFrame {
    fn request_animation_frame(&mut self) {
        self.requested = true;
    }
}
impl NextFrame {
    fn output(&self) -> FrameOutput {
        FrameOutput {
            wait_next_event: !self.requested,
            ..Default::default()
        }
    }
}


/// One frame's view of everything the tick drives
struct Frame<'a> {
    stage: &'a mut Stage,
    gpu: &'a mut GpuScene,
    camera: &'a mut Camera,
    context: &'a Context,
    viewport: Viewport,
    clear_color: [u8; 3],
}

impl FrameTarget for Frame<'_> {
    fn update_controls(&mut self, _timing: &FrameTiming) -> bool {
        let moved = self.stage.update_controls();
        let pose = self.stage.camera();
        self.camera.set_view(pose.position, pose.target, pose.up);
        moved
    }

    fn draw(&mut self) {
        let [r, g, b] = self.clear_color;
        let objects = self.gpu.objects();
        let lights = self.gpu.lights();
        RenderTarget::screen(self.context, self.viewport.width, self.viewport.height)
            .clear(ClearState::color_and_depth(
                r as f32 / 255.0,
                g as f32 / 255.0,
                b as f32 / 255.0,
                1.0,
                1.0,
            ))
            .render(&*self.camera, objects, &lights);
    }
}


/// Sizes the canvas backing store from the stage's capped pixel ratio
fn apply_viewport(viewport: &ViewportState) {
    let (pixel_width, pixel_height) = viewport.physical_size();
    resize_canvas(viewport.width, viewport.height, pixel_width, pixel_height);
}


/// GL viewport for this frame. In the browser the canvas is sized by
/// [apply_viewport]; a native window keeps the size three-d gives it.
fn frame_viewport(stage: &Stage, frame_input: &FrameInput) -> Viewport {
    if browser_viewport().is_some() {
        stage.viewport().render_viewport()
    } else {
        frame_input.viewport
    }
}


/// Creates the window, starts both asset loads and enters the render loop
pub async fn main(config: SceneConfig) -> Result<(), AppError> {
    let (width, height, dpr) = browser_viewport().unwrap_or((1280, 720, 1.0));
    log::info!("main(): viewport {}x{} at device pixel ratio {}", width, height, dpr);

    // not maximized in the browser: apply_viewport owns the canvas size
    let window = Window::new(WindowSettings {
        title: config.renderer.title.clone(),
        max_size: browser_viewport().map(|(w, h, _)| (w, h)),
        ..Default::default()
    })
    .map_err(|e| AppError::Window(e.to_string()))?;

    let gl = window.gl();
    log::info!("main(): OpenGL version: {:?}", gl.version());

    let viewport = ViewportState::new(width, height, dpr, config.renderer.max_pixel_ratio);
    let clear_color = hex_to_rgb(config.renderer.clear_color);
    let mut stage = Stage::new(config, viewport);
    apply_viewport(stage.viewport());

    let pose = *stage.camera();
    let mut camera = Camera::new_perspective(
        stage.viewport().render_viewport(),
        pose.position,
        pose.target,
        pose.up,
        degrees(pose.fov),
        pose.near,
        pose.far,
    );

    // single-producer bus for load completions, drained once per frame
    let (loader, mut rx_assets) = AssetLoader::new(ASSET_BUS_CAPACITY);
    loader.load_model(&stage.config().model);
    loader.load_font(&stage.config().font);

    let mut gpu = GpuScene::new(&gl);
    let mut render_loop = RenderLoop::new(SystemClock::new());

    window.render_loop(move |mut frame_input| {
        stage.drain_events(&mut rx_assets);

        let (w, h, ratio) = browser_viewport().unwrap_or((
            frame_input.window_width,
            frame_input.window_height,
            frame_input.device_pixel_ratio as f64,
        ));
        if stage.resize(w, h, ratio) {
            apply_viewport(stage.viewport());
        }
        let viewport = frame_viewport(&stage, &frame_input);
        camera.set_viewport(viewport);

        stage.handle_input(&mut frame_input.events);
        gpu.sync(&stage);

        let mut scheduler = NextFrame::default();
        let mut frame = Frame {
            stage: &mut stage,
            gpu: &mut gpu,
            camera: &mut camera,
            context: &gl,
            viewport,
            clear_color,
        };
        render_loop.tick(&mut frame, &mut scheduler);

        scheduler.output()
    });

    Ok(())
}
