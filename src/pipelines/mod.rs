//! Render pipelines and the bind group layouts they share.
//!
//! - `basic` builds the lit mesh pipelines and the material layout
//! - `light` packs the lights into a uniform next to the shadow map
//! - `shadow` renders casters into the shadow map
//! - `background` draws the panorama behind everything

pub mod background;
pub mod basic;
pub mod light;
pub mod shadow;
