pub mod config;
pub mod io;
pub mod memory;
pub mod tables;
pub mod translation;

// Re-export commonly used items for convenience
pub use config::SimConfig;
pub use memory::{FramePool, Policy};
pub use tables::{Protection, Segment};
pub use translation::{Access, Fault, LayoutError, Metrics, SegmentTable, Translation};
