use three_d::prelude::*;
use three_d::{radians, vec2, vec3, CpuMesh, CpuModel, Indices, Mat4, Positions, Vec3};

use crate::config::MaterialConfig;


/// Handle of a node inside a [SceneGraph]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);
impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}


/// Local transform: translation, XYZ Euler rotation (radians) and scale
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}
impl Default for Transform {
    fn default() -> Self {
        Self {
            position: vec3(0.0, 0.0, 0.0),
            rotation: vec3(0.0, 0.0, 0.0),
            scale: vec3(1.0, 1.0, 1.0),
        }
    }
}
impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// T * Rx * Ry * Rz * S
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_angle_x(radians(self.rotation.x))
            * Mat4::from_angle_y(radians(self.rotation.y))
            * Mat4::from_angle_z(radians(self.rotation.z))
            * Mat4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}


#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightKind {
    Directional {
        color: [u8; 3],
        intensity: f32,
        shadow_map_size: Option<u32>,
    },
    Ambient {
        color: [u8; 3],
        intensity: f32,
    },
}


/// Geometry owned by a mesh node
#[derive(Clone, Debug)]
pub enum Geometry {
    /// Width x height rectangle in the XY plane facing +Z
    Plane { width: f32, height: f32 },
    Triangles(CpuMesh),
}


#[derive(Clone, Debug)]
pub enum NodeKind {
    Root,
    Camera,
    Light(LightKind),
    Mesh {
        geometry: Geometry,
        material: MaterialConfig,
    },
    Model(CpuModel),
}


#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
    pub transform: Transform,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}


/// A tree of renderable nodes. Nodes are only ever added.
pub struct SceneGraph {
    nodes: Vec<Node>,
    root: NodeId,
    revision: u64,
}
impl SceneGraph {
    pub fn new() -> Self {
        let root = Node {
            name: "scene".to_string(),
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Root,
            transform: Transform::default(),
            cast_shadow: false,
            receive_shadow: false,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            revision: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Bumped on every insertion or transform change
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Appends a node under `parent`. Returns `None` when the parent does not exist.
    pub fn add(&mut self, parent: NodeId, name: &str, kind: NodeKind, transform: Transform) -> Option<NodeId> {
        if parent.0 >= self.nodes.len() {
            return None;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: name.to_string(),
            parent: Some(parent),
            children: Vec::new(),
            kind,
            transform,
            cast_shadow: false,
            receive_shadow: false,
        });
        self.nodes[parent.0].children.push(id);
        self.revision += 1;
        Some(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Mutable access; counts as a change for [SceneGraph::revision]
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let node = self.nodes.get_mut(id.0)?;
        self.revision += 1;
        Some(node)
    }

    pub fn set_transform(&mut self, id: NodeId, transform: Transform) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.transform = transform;
                true
            }
            None => false,
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id.0).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).len()
    }

    /// Product of the local matrices from the root down to `id`
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut matrix = Mat4::identity();
        let mut current = self.nodes.get(id.0);
        while let Some(node) = current {
            matrix = node.transform.matrix() * matrix;
            current = node.parent.and_then(|p| self.nodes.get(p.0));
        }
        matrix
    }

    pub fn world_position(&self, id: NodeId) -> Vec3 {
        let m = self.world_matrix(id);
        vec3(m.w.x, m.w.y, m.w.z)
    }

    /// Depth-first, parents before children, children in insertion order
    pub fn traverse(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        order
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.name == name).map(NodeId)
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}


/// Plane mesh in the XY plane with normals along +Z, centered at the origin
pub fn plane_mesh(width: f32, height: f32) -> CpuMesh {
    let (hw, hh) = (width * 0.5, height * 0.5);
    CpuMesh {
        positions: Positions::F32(vec![
            vec3(-hw, -hh, 0.0),
            vec3(hw, -hh, 0.0),
            vec3(hw, hh, 0.0),
            vec3(-hw, hh, 0.0),
        ]),
        indices: Indices::U32(vec![0, 1, 2, 0, 2, 3]),
        normals: Some(vec![vec3(0.0, 0.0, 1.0); 4]),
        uvs: Some(vec![
            vec2(0.0, 0.0),
            vec2(1.0, 0.0),
            vec2(1.0, 1.0),
            vec2(0.0, 1.0),
        ]),
        ..Default::default()
    }
}
