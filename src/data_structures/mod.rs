//! Scene data: transforms, geometry, materials, images and the retained graph.
//!
//! - `instance` holds per-node transforms and their GPU layout
//! - `model` contains CPU-side geometry, material and image resources
//! - `primitives` tessellates boxes, spheres, cylinders and planes
//! - `scene_graph` is the append-only container everything is added to
//! - `texture` wraps GPU textures created from decoded images

pub mod instance;
pub mod model;
pub mod primitives;
pub mod scene_graph;
pub mod texture;
