//! roadscape
//!
//! A static 3D roadside scene: road and grass tiles, a small vehicle, a glowing sun and
//! sixteen props streamed in from OBJ/MTL files, lit by an ambient, a hemisphere and a
//! shadow casting directional light. It runs natively and in the browser (WebGL2).
//!
//! High-level modules
//! - `layout`: placement literals for everything in the scene
//! - `builder`: turns a layout into the scene graph and the frame loop's state
//! - `frame`: the per-frame scheduler, animation and resize handling
//! - `camera`: perspective camera, orbit controls and the camera uniform
//! - `lighting`: the three lights and the shadow camera
//! - `controls`: data-bound debug controls, `overlay` draws them with egui
//! - `data_structures`: transforms, geometry, materials and the scene graph
//! - `resources`: asset fetching with retries, image and OBJ/MTL decoding
//! - `context`, `pipelines`, `render`: the wgpu backend
//! - `flow`: the winit application driving it all
//!

pub mod builder;
pub mod camera;
pub mod config;
pub mod context;
pub mod controls;
pub mod data_structures;
pub mod flow;
pub mod frame;
pub mod layout;
pub mod lighting;
pub mod overlay;
pub mod pipelines;
pub mod render;
pub mod resources;

pub use config::SceneConfig;
pub use flow::run;
