//! The scene owner: bootstraps the graph and applies asset completions.

use bus::BusReader;
use three_d::{vec3, Event, Vec3};

use crate::config::{hex_to_rgb, to_vec3, LightConfig, SceneConfig};
use crate::controls::{CameraPose, OrbitControls};
use crate::font::TypefaceFont;
use crate::loader::{AssetEvent, LoadedModel};
use crate::error::LoadError;
use crate::scene::{plane_mesh, Geometry, LightKind, NodeId, NodeKind, SceneGraph, Transform};
use crate::text::{text_mesh, triangle_count, TextOptions};
use crate::viewport::ViewportState;


pub struct Stage {
    config: SceneConfig,
    graph: SceneGraph,
    /// Marks the camera's place in the tree; the live pose is [Stage::camera]
    camera_node: NodeId,
    plane: NodeId,
    model: Option<NodeId>,
    labels: Vec<NodeId>,
    pose: CameraPose,
    controls: OrbitControls,
    viewport: ViewportState,
}

impl Stage {
    /// Root, light rig, camera and the bare nutrition plane
    pub fn new(config: SceneConfig, viewport: ViewportState) -> Self {
        let mut graph = SceneGraph::new();
        let root = graph.root();

        for (i, light) in config.lights.iter().enumerate() {
            let (kind, transform, cast_shadow) = match light {
                LightConfig::Directional { color, intensity, position, cast_shadow, shadow } => {
                    let casts = *cast_shadow && config.renderer.shadows;
                    let kind = LightKind::Directional {
                        color: hex_to_rgb(*color),
                        intensity: *intensity,
                        shadow_map_size: casts.then_some(shadow.map_size),
                    };
                    (kind, Transform::from_position(to_vec3(*position)), casts)
                }
                LightConfig::Ambient { color, intensity } => {
                    let kind = LightKind::Ambient {
                        color: hex_to_rgb(*color),
                        intensity: *intensity,
                    };
                    (kind, Transform::default(), false)
                }
            };
            if let Some(id) = graph.add(root, &format!("light-{}", i), NodeKind::Light(kind), transform) {
                if let Some(node) = graph.node_mut(id) {
                    node.cast_shadow = cast_shadow;
                }
            }
        }

        let pose = CameraPose::new(&config.camera, to_vec3(config.controls.target), viewport.aspect());
        let camera_node = graph
            .add(root, "camera", NodeKind::Camera, Transform::from_position(pose.position))
            .unwrap_or(root);

        let plane_kind = NodeKind::Mesh {
            geometry: Geometry::Plane {
                width: config.plane.width,
                height: config.plane.height,
            },
            material: config.plane.material.clone(),
        };
        let plane = graph.add(root, "nutrition", plane_kind, Transform::default()).unwrap_or(root);
        if let Some(node) = graph.node_mut(plane) {
            node.receive_shadow = config.plane.receive_shadow;
        }

        let controls = OrbitControls::new(&config.controls);
        log::debug!("stage ready with {} nodes", graph.len());

        Self {
            config,
            graph,
            camera_node,
            plane,
            model: None,
            labels: Vec::new(),
            pose,
            controls,
            viewport,
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn camera(&self) -> &CameraPose {
        &self.pose
    }

    pub fn camera_node(&self) -> NodeId {
        self.camera_node
    }

    pub fn controls(&self) -> &OrbitControls {
        &self.controls
    }

    pub fn viewport(&self) -> &ViewportState {
        &self.viewport
    }

    pub fn plane(&self) -> NodeId {
        self.plane
    }

    pub fn model(&self) -> Option<NodeId> {
        self.model
    }

    pub fn labels(&self) -> &[NodeId] {
        &self.labels
    }

    /// Applies every pending event. Returns how many were applied.
    pub fn drain_events(&mut self, rx: &mut BusReader<AssetEvent>) -> usize {
        let mut applied = 0;
        while let Ok(event) = rx.try_recv() {
            self.handle_asset_event(event);
            applied += 1;
        }
        applied
    }

    pub fn handle_asset_event(&mut self, event: AssetEvent) {
        match event {
            AssetEvent::ModelProgress { path, bytes } => self.on_model_progress(&path, bytes),
            AssetEvent::Model { path, result } => self.on_model_loaded(&path, result),
            AssetEvent::Font { url, result } => self.on_font_loaded(&url, result),
        }
    }

    fn on_model_progress(&self, path: &str, bytes: usize) {
        log::info!("{}: {} bytes loaded", path, bytes);
    }

    fn on_model_loaded(&mut self, path: &str, result: Result<LoadedModel, LoadError>) {
        let loaded = match result {
            Ok(loaded) => loaded,
            Err(e) => {
                log::error!("{}", e);
                return;
            }
        };
        if self.model.is_some() {
            log::warn!("{} arrived after a model was already placed, ignoring it", path);
            return;
        }

        log::info!("success");
        log::info!(
            "{}: glTF {}, {} meshes, {} nodes, {} primitives",
            path,
            loaded.summary.version,
            loaded.summary.meshes,
            loaded.summary.nodes,
            loaded.model.geometries.len(),
        );
        if !loaded.summary.extensions_used.is_empty() {
            log::info!("{}: extensions {}", path, loaded.summary.extensions_used.join(", "));
        }

        let model = &self.config.model;
        let transform = Transform {
            position: to_vec3(model.position),
            rotation: to_vec3(model.rotation),
            ..Default::default()
        };
        let root = self.graph.root();
        let Some(id) = self.graph.add(root, "model", NodeKind::Model(loaded.model), transform) else {
            return;
        };
        if let Some(node) = self.graph.node_mut(id) {
            node.receive_shadow = model.receive_shadow;
            node.cast_shadow = model.cast_shadow && self.config.renderer.shadows;
        }
        self.model = Some(id);

        let position = self.graph.world_position(id);
        self.pose.look_at(position);
        self.controls.set_target(position);
    }

    fn on_font_loaded(&mut self, url: &str, result: Result<TypefaceFont, LoadError>) {
        let font = match result {
            Ok(font) => font,
            Err(e) => {
                log::error!("{}", e);
                return;
            }
        };
        if !self.labels.is_empty() {
            log::warn!("labels already built, ignoring {}", url);
            return;
        }

        let font_config = &self.config.font;
        for (i, label) in self.config.labels.iter().enumerate() {
            let options = TextOptions {
                size: label.size,
                depth: font_config.depth,
                curve_segments: font_config.curve_segments,
            };
            let mesh = text_mesh(&font, &label.text, &options);
            if triangle_count(&mesh) == 0 {
                log::warn!("label {:?} produced no geometry", label.text);
            }
            let kind = NodeKind::Mesh {
                geometry: Geometry::Triangles(mesh),
                material: font_config.material.clone(),
            };
            let transform = Transform::from_position(to_vec3(label.position));
            if let Some(id) = self.graph.add(self.plane, &format!("label-{}", i), kind, transform) {
                self.labels.push(id);
            }
        }
        log::info!("built {} labels with {}", self.labels.len(), font.family_name);

        let plane = &self.config.plane;
        let transform = Transform {
            position: to_vec3(plane.final_position),
            rotation: to_vec3(plane.final_rotation),
            ..Default::default()
        };
        self.graph.set_transform(self.plane, transform);
    }

    /// Applies a viewport change. Returns true if the size or pixel ratio changed.
    pub fn resize(&mut self, width: u32, height: u32, device_pixel_ratio: f64) -> bool {
        let changed = self.viewport.resize(width, height, device_pixel_ratio);
        self.pose.aspect = self.viewport.aspect();
        if changed {
            log::debug!(
                "viewport {}x{} at pixel ratio {}",
                self.viewport.width,
                self.viewport.height,
                self.viewport.pixel_ratio
            );
        }
        changed
    }

    pub fn handle_input(&mut self, events: &mut [Event]) -> bool {
        self.controls.handle_events(events, &self.pose, self.viewport.height)
    }

    /// Advances the damped controls by one frame
    pub fn update_controls(&mut self) -> bool {
        self.controls.update(&mut self.pose)
    }

    /// Mesh geometry for `id`, with planes expanded to triangles
    pub fn mesh_geometry(&self, id: NodeId) -> Option<three_d::CpuMesh> {
        match &self.graph.node(id)?.kind {
            NodeKind::Mesh { geometry: Geometry::Plane { width, height }, .. } => Some(plane_mesh(*width, *height)),
            NodeKind::Mesh { geometry: Geometry::Triangles(mesh), .. } => Some(mesh.clone()),
            _ => None,
        }
    }

    /// Direction a directional light shines in: from its position to the origin
    pub fn light_direction(&self, id: NodeId) -> Vec3 {
        let position = self.graph.world_position(id);
        if position.x == 0.0 && position.y == 0.0 && position.z == 0.0 {
            vec3(0.0, -1.0, 0.0)
        } else {
            -position
        }
    }
}
