pub mod labels;
pub mod overlay_geometry;
