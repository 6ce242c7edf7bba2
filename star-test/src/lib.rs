mod app;
mod path;
mod response;

pub use app::{TestApp, TestRequest};
pub use path::{resolve_path, tokenize_path, PathToken};
pub use response::TestResponse;
