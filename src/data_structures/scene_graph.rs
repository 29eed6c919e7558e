//! Retained scene graph.
//!
//! The graph owns every node, geometry, material and image in the scene; everything
//! else refers to them through copyable ids. Nodes carry absolute transforms (there is
//! no parent/child composition) and are only ever appended, so an id handed out once
//! stays valid for the lifetime of the graph.

use log::warn;

use crate::data_structures::{
    instance::Instance,
    model::{Geometry, Material, TextureImage},
};

macro_rules! resource_id {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(usize);

        impl $name {
            pub fn index(self) -> usize {
                self.0
            }
        }
    };
}

resource_id!(NodeId);
resource_id!(GeometryId);
resource_id!(MaterialId);
resource_id!(TextureId);

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    /// Renderable geometry. Each mesh of the geometry picks its material by index
    /// from `materials`; primitives always use the first one.
    Mesh {
        geometry: GeometryId,
        materials: Vec<MaterialId>,
    },
    /// Invisible anchor, e.g. the point the directional light aims at.
    Target,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub transform: Instance,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl Node {
    pub fn mesh(name: &str, geometry: GeometryId, material: MaterialId) -> Self {
        Self::model(name, geometry, vec![material])
    }

    pub fn model(name: &str, geometry: GeometryId, materials: Vec<MaterialId>) -> Self {
        Self {
            name: name.to_string(),
            kind: NodeKind::Mesh {
                geometry,
                materials,
            },
            transform: Instance::default(),
            cast_shadow: false,
            receive_shadow: false,
        }
    }

    pub fn target(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: NodeKind::Target,
            transform: Instance::default(),
            cast_shadow: false,
            receive_shadow: false,
        }
    }

    pub fn at(mut self, position: impl Into<cgmath::Vector3<f32>>) -> Self {
        self.transform.position = position.into();
        self
    }

    pub fn with_transform(mut self, transform: Instance) -> Self {
        self.transform = transform;
        self
    }

    pub fn casting_shadow(mut self) -> Self {
        self.cast_shadow = true;
        self
    }

    pub fn receiving_shadow(mut self) -> Self {
        self.receive_shadow = true;
        self
    }

    pub fn is_mesh(&self) -> bool {
        matches!(self.kind, NodeKind::Mesh { .. })
    }
}

#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<Node>,
    geometries: Vec<Geometry>,
    materials: Vec<Material>,
    textures: Vec<TextureImage>,
    environment: Option<TextureId>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node. There is deliberately no way to take it out again.
    pub fn add(&mut self, node: Node) -> NodeId {
        if let NodeKind::Mesh { geometry, .. } = &node.kind {
            if geometry.0 >= self.geometries.len() {
                warn!(
                    "node '{}' references geometry {} which does not exist yet",
                    node.name, geometry.0
                );
            }
        }
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn add_geometry(&mut self, geometry: Geometry) -> GeometryId {
        self.geometries.push(geometry);
        GeometryId(self.geometries.len() - 1)
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.push(material);
        MaterialId(self.materials.len() - 1)
    }

    pub fn add_texture(&mut self, texture: TextureImage) -> TextureId {
        self.textures.push(texture);
        TextureId(self.textures.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// Runs `mutation` on the transform of `id`, returns whether the node exists.
    pub fn transform(&mut self, id: NodeId, mutation: impl FnOnce(&mut Instance)) -> bool {
        match self.nodes.get_mut(id.0) {
            Some(node) => {
                mutation(&mut node.transform);
                true
            }
            None => false,
        }
    }

    pub fn geometry(&self, id: GeometryId) -> Option<&Geometry> {
        self.geometries.get(id.0)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0)
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id.0)
    }

    pub fn texture(&self, id: TextureId) -> Option<&TextureImage> {
        self.textures.get(id.0)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, node)| (NodeId(i), node))
    }

    pub fn geometries(&self) -> impl Iterator<Item = (GeometryId, &Geometry)> {
        self.geometries
            .iter()
            .enumerate()
            .map(|(i, geometry)| (GeometryId(i), geometry))
    }

    pub fn materials(&self) -> impl Iterator<Item = (MaterialId, &Material)> {
        self.materials
            .iter()
            .enumerate()
            .map(|(i, material)| (MaterialId(i), material))
    }

    pub fn textures(&self) -> impl Iterator<Item = (TextureId, &TextureImage)> {
        self.textures
            .iter()
            .enumerate()
            .map(|(i, texture)| (TextureId(i), texture))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn mesh_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_mesh()).count()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn environment(&self) -> Option<TextureId> {
        self.environment
    }

    pub fn set_environment(&mut self, texture: TextureId) {
        self.environment = Some(texture);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::model::Geometry;

    #[test]
    fn ids_stay_stable_as_nodes_are_appended() {
        let mut graph = SceneGraph::new();
        let geometry = graph.add_geometry(Geometry::cuboid(1.0, 1.0, 1.0));
        let material = graph.add_material(Material::colored("grey", [0.5; 3]));
        let first = graph.add(Node::mesh("first", geometry, material).at([1.0, 0.0, 0.0]));
        let target = graph.add(Node::target("target"));
        let second = graph.add(Node::mesh("second", geometry, material));

        assert_eq!(graph.len(), 3);
        assert_eq!(graph.mesh_count(), 2);
        assert_eq!(graph.node(first).map(|n| n.name.as_str()), Some("first"));
        assert_eq!(graph.node(second).map(|n| n.name.as_str()), Some("second"));
        assert!(!graph.node(target).is_some_and(Node::is_mesh));
    }

    #[test]
    fn transform_mutates_in_place() {
        let mut graph = SceneGraph::new();
        let id = graph.add(Node::target("t"));
        assert!(graph.transform(id, |t| t.position.y = 4.0));
        assert_eq!(graph.node(id).map(|n| n.transform.position.y), Some(4.0));
    }
}
