// Declare the heatmap submodule
mod heatmap;

// Re-export the rendering helpers
pub use heatmap::{heatmap_table, matrix_table, to_nested};
