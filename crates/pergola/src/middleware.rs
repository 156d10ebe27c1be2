//! Handler and middleware types, and the chain fold.

use std::sync::Arc;

use crate::env::Env;
use crate::response::Response;

/// A request handler: descriptor in, response out.
pub type Handler = Arc<dyn Fn(&mut Env) -> Response + Send + Sync>;

/// A middleware: wraps a handler, producing a new handler.
pub type Middleware = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

/// Box a closure as a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&mut Env) -> Response + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Box a closure as a [`Middleware`].
pub fn middleware<F>(f: F) -> Middleware
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Fold a middleware chain around a base handler.
///
/// The chain is folded right-to-left: the first-registered middleware
/// becomes the outermost wrapper.
pub(crate) fn compose(chain: &[Middleware], base: Handler) -> Handler {
    chain.iter().rev().fold(base, |inner, mw| mw(inner))
}
