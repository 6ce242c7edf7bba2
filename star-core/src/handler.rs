use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::binder::BoundParams;
use crate::http::response::{IntoResponse, Response};

type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// An endpoint function: receives the bound parameters, returns a response.
///
/// Implemented for every `Fn(BoundParams) -> impl Future<Output = impl IntoResponse>`.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, params: BoundParams) -> BoxFuture;

    /// Name used to derive the default operation id, if the handler has one.
    fn name(&self) -> Option<&'static str> {
        None
    }
}

impl<F, Fut, R> Handler for F
where
    F: Fn(BoundParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    fn call(&self, params: BoundParams) -> BoxFuture {
        let fut = (self)(params);
        Box::pin(async move { fut.await.into_response() })
    }

    fn name(&self) -> Option<&'static str> {
        function_name(std::any::type_name::<F>())
    }
}

pub type BoxedHandler = Arc<dyn Handler>;

/// Last path segment of a function item's type name; `None` for closures.
fn function_name(type_name: &'static str) -> Option<&'static str> {
    if type_name.contains("{{closure}}") {
        return None;
    }
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn list_books(_: BoundParams) -> &'static str {
        "ok"
    }

    fn name_of<H: Handler>(h: H) -> Option<&'static str> {
        h.name()
    }

    #[test]
    fn fn_items_are_named() {
        assert_eq!(name_of(list_books), Some("list_books"));
    }

    #[test]
    fn closures_are_anonymous() {
        assert_eq!(name_of(|_: BoundParams| async { "ok" }), None);
    }
}
