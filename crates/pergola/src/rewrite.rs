//! Pre-routing rewrite hooks.

use std::sync::Arc;

use pergola_router::RoutePattern;

use crate::env::Env;
use crate::response::Response;

/// A rewrite callback: invoked with the pattern's captured groups and
/// the full request descriptor, it takes over dispatch entirely.
pub type RewriteFn = Arc<dyn Fn(&[String], &mut Env) -> Response + Send + Sync>;

/// Box a closure as a [`RewriteFn`].
pub fn rewrite_fn<F>(f: F) -> RewriteFn
where
    F: Fn(&[String], &mut Env) -> Response + Send + Sync + 'static,
{
    Arc::new(f)
}

/// An ordered (pattern, callback) pair consulted before normal routing.
#[derive(Clone)]
pub(crate) struct RewriteRule {
    pub(crate) pattern: RoutePattern,
    pub(crate) callback: RewriteFn,
}

/// The ephemeral micro-app constructed for one rewrite dispatch: the
/// callback bound to the captures of the match that selected it.
pub(crate) struct Rewriter {
    captures: Vec<String>,
    callback: RewriteFn,
}

impl Rewriter {
    pub(crate) fn new(captures: Vec<String>, callback: RewriteFn) -> Self {
        Self { captures, callback }
    }

    pub(crate) fn call(&self, env: &mut Env) -> Response {
        (self.callback)(&self.captures, env)
    }
}
