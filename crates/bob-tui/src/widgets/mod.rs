pub mod detection_table;
pub mod overlay_canvas;
pub mod status_pill;
