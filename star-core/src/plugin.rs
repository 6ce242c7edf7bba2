//! Plugin system.
//!
//! Plugins are composable units of functionality installed into an [`App`]
//! with `.with(plugin)`. They can add layers, register routes, or register a
//! route consumer that receives the flattened route table at build time
//! (this is how the OpenAPI document is produced).

use crate::app::App;

/// A composable unit of functionality that can be installed into an [`App`].
///
/// # Example
///
/// ```ignore
/// use star_core::{App, Plugin};
///
/// pub struct Health;
///
/// impl Plugin for Health {
///     fn install(self, app: App) -> App {
///         app.with_router(Router::new().route("/health", get(|| async { "OK" })))
///     }
/// }
/// ```
pub trait Plugin: Send + 'static {
    fn install(self, app: App) -> App;

    /// The name of this plugin (for diagnostics).
    fn name() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }
}
