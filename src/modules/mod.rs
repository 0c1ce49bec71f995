//! Tool adapter modules
//!
//! Each module wraps one external ecosystem tool by composing step builders;
//! tool-specific CLI knowledge lives here, never in the core step engine.

pub mod ansible;
pub mod apk;
pub mod crossplane;
pub mod errors;
pub mod helm;
pub mod hugo;
pub mod image;
pub mod kcl;
pub mod render;
pub mod scan;
pub mod sops;
pub mod terraform;

pub use errors::ModuleError;
