// survivor/mod.rs
pub mod preview;
pub mod selector;

// Re-export the main types
pub use self::preview::{FieldComparison, MergePreview, PreviewBuilder};
pub use self::selector::PrimarySelector;
