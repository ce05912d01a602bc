//! Dashboard rendering.

pub mod generator;

pub use generator::{
    generate_health_table, generate_json_dashboard, generate_markdown_dashboard, write_output,
    Dashboard,
};
