//! Star: typed request parameters and OpenAPI documents over axum.
//!
//! This facade crate re-exports the Star sub-crates through a single
//! dependency. Import everything you need with:
//!
//! ```ignore
//! use star::prelude::*;
//! ```
//!
//! # Feature flags
//!
//! | Feature   | Default | Crate          |
//! |-----------|---------|----------------|
//! | `openapi` | **yes** | `star-openapi` |

pub extern crate star_core;

// Re-export everything from star-core at the top level for convenience.
pub use star_core::*;

#[cfg(feature = "openapi")]
pub use star_openapi;

/// Unified prelude: the core prelude plus the types of enabled feature crates.
pub mod prelude {
    pub use star_core::prelude::*;

    #[cfg(feature = "openapi")]
    pub use star_openapi::{OpenApiConfig, OpenApiPlugin};
}
