//! FILENAME: core/persistence/src/lib.rs
//! Persistence Module
//!
//! Saves and loads pivot slot configurations as a versioned JSON document,
//! and renders a slot as equivalent Rust code.

mod codegen;
mod error;
mod views;

pub use codegen::generate_code;
pub use error::PersistenceError;
pub use views::{
    load_into, load_views, load_views_from_path, save_views, save_views_to_path, SavedFilter,
    SavedFilterValue, SavedPivot, SavedScalar, SavedValueAgg, SavedViews, SAVED_VIEWS_VERSION,
};
