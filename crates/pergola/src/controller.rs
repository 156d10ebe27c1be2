//! The controller capability contract and the declarative [`Blueprint`]
//! controller.

use std::sync::Arc;

use http::Method;
use pergola_router::{MethodKey, PatternError, RoutePattern, RouteTable};
use regex_lite::Regex;

use crate::app::{ActionTarget, RouteTarget};
use crate::middleware::{Handler, Middleware};
use crate::rewrite::RewriteFn;

/// A setup callback applied to a controller's configuration at mount
/// time.
pub type SetupFn = Arc<dyn Fn(&mut ControllerConfig) + Send + Sync>;

/// Mount-time configuration applied to a controller before its routes
/// are compiled. Per-mount and global setup callbacks mutate this
/// object; the controller then applies it once.
#[derive(Default)]
pub struct ControllerConfig {
    /// Replaces the controller's declared format suffixes when set.
    pub formats: Option<Vec<String>>,
    /// Appended to the controller's middleware chain.
    pub middleware: Vec<Middleware>,
}

/// What an application needs from a mountable controller: an identity
/// for mount deduplication, root remapping, mount-time configuration,
/// and the compiled route/rewrite/middleware surface.
pub trait Controller: Send + Sync {
    /// Identity used for idempotent mounting.
    fn identity(&self) -> &str;

    /// Recompute the controller's canonical mount roots.
    fn remap(&mut self, roots: Vec<String>);

    /// Apply mount-time configuration before route compilation.
    fn configure(&mut self, config: &ControllerConfig);

    /// Compile the controller's route set: pattern → method → target.
    fn routes(&self) -> RouteTable<RouteTarget>;

    /// The controller's rewrite rules, in declaration order.
    fn rewrite_rules(&self) -> Vec<(RoutePattern, RewriteFn)>;

    /// The controller's middleware, declaration order outermost first.
    fn middleware(&self) -> Vec<Middleware>;
}

/// One declared action: a named operation reachable under the
/// controller's roots.
#[derive(Clone)]
struct Action {
    name: String,
    key: MethodKey,
    handler: Handler,
}

/// A declarative controller.
///
/// Actions are registered against method slots; the action named
/// `index` maps to the bare root, every other action appends
/// `/<name>` to each canonical root.
///
/// ```ignore
/// let forum = Blueprint::new("Forum")
///     .root("/forum")
///     .get("topics", |env| Response::ok("topics"))
///     .post("topics", |env| Response::ok("created"));
/// ```
#[derive(Clone)]
pub struct Blueprint {
    name: String,
    roots: Vec<String>,
    formats: Vec<String>,
    actions: Vec<Action>,
    middleware: Vec<Middleware>,
    rewrites: Vec<(RoutePattern, RewriteFn)>,
}

impl Blueprint {
    /// Create an empty controller with the given identity.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            roots: Vec::new(),
            formats: Vec::new(),
            actions: Vec::new(),
            middleware: Vec::new(),
            rewrites: Vec::new(),
        }
    }

    /// Add a canonical root. The first call sets the primary mount
    /// path; later calls add alternate roots served by the same
    /// actions.
    pub fn root(mut self, path: &str) -> Self {
        self.roots.push(rootify(path));
        self
    }

    /// Declare a recognized format suffix, e.g. `.json`.
    pub fn format(mut self, suffix: &str) -> Self {
        self.formats.push(suffix.to_string());
        self
    }

    /// Append a middleware wrapper. The first declared wrapper becomes
    /// the outermost.
    pub fn wrap(mut self, mw: Middleware) -> Self {
        self.middleware.push(mw);
        self
    }

    /// Register an action for one named method.
    pub fn on<F>(mut self, method: Method, name: &str, f: F) -> Self
    where
        F: Fn(&mut crate::env::Env) -> crate::response::Response + Send + Sync + 'static,
    {
        self.actions.push(Action {
            name: name.to_string(),
            key: MethodKey::Only(method),
            handler: Arc::new(f),
        });
        self
    }

    /// Register an action served for any request method.
    pub fn any<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&mut crate::env::Env) -> crate::response::Response + Send + Sync + 'static,
    {
        self.actions.push(Action {
            name: name.to_string(),
            key: MethodKey::Any,
            handler: Arc::new(f),
        });
        self
    }

    /// Register a GET action.
    pub fn get<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&mut crate::env::Env) -> crate::response::Response + Send + Sync + 'static,
    {
        self.on(Method::GET, name, f)
    }

    /// Register a POST action.
    pub fn post<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&mut crate::env::Env) -> crate::response::Response + Send + Sync + 'static,
    {
        self.on(Method::POST, name, f)
    }

    /// Register a PUT action.
    pub fn put<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&mut crate::env::Env) -> crate::response::Response + Send + Sync + 'static,
    {
        self.on(Method::PUT, name, f)
    }

    /// Register a DELETE action.
    pub fn delete<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&mut crate::env::Env) -> crate::response::Response + Send + Sync + 'static,
    {
        self.on(Method::DELETE, name, f)
    }

    /// Register a rewrite rule carried into the application at mount
    /// time, in declaration order.
    pub fn rewrite(mut self, pattern: &str, f: RewriteFn) -> Result<Self, PatternError> {
        self.rewrites.push((RoutePattern::new(pattern)?, f));
        Ok(self)
    }

    fn effective_roots(&self) -> Vec<String> {
        if self.roots.is_empty() {
            vec![String::new()]
        } else {
            self.roots.clone()
        }
    }
}

impl Controller for Blueprint {
    fn identity(&self) -> &str {
        &self.name
    }

    fn remap(&mut self, roots: Vec<String>) {
        self.roots = roots;
    }

    fn configure(&mut self, config: &ControllerConfig) {
        if let Some(formats) = &config.formats {
            self.formats = formats.clone();
        }
        self.middleware.extend(config.middleware.iter().cloned());
    }

    fn routes(&self) -> RouteTable<RouteTarget> {
        let roots = self.effective_roots();
        let splitter = format_splitter(&self.formats);

        let mut table = RouteTable::new();
        for action in &self.actions {
            let paths: Vec<String> = roots
                .iter()
                .map(|root| action_url(root, &action.name))
                .collect();
            let pattern = RoutePattern::compile(paths.iter().map(String::as_str));
            let mount_path = paths
                .first()
                .cloned()
                .unwrap_or_default();

            table.route(
                pattern,
                action.key.clone(),
                RouteTarget::Action(ActionTarget {
                    controller: self.name.clone(),
                    action: action.name.clone(),
                    mount_path,
                    format_splitter: splitter.clone(),
                    handler: action.handler.clone(),
                }),
            );
        }
        table
    }

    fn rewrite_rules(&self) -> Vec<(RoutePattern, RewriteFn)> {
        self.rewrites.clone()
    }

    fn middleware(&self) -> Vec<Middleware> {
        self.middleware.clone()
    }
}

/// Normalize a root: leading slash, collapsed slashes, no trailing
/// slash. The empty string and `/` both normalize to the empty root.
pub(crate) fn rootify(url: &str) -> String {
    let mut out = String::with_capacity(url.len() + 1);
    out.push('/');
    for ch in url.chars() {
        if ch == '/' && out.ends_with('/') {
            continue;
        }
        out.push(ch);
    }
    if out.ends_with('/') {
        out.pop();
    }
    out
}

/// The URL an action is exposed at under one root: `index` maps to the
/// bare root, everything else appends its name as a path segment.
fn action_url(root: &str, action: &str) -> String {
    if action == "index" {
        if root.is_empty() {
            "/".to_string()
        } else {
            root.to_string()
        }
    } else {
        format!("{root}/{action}")
    }
}

/// Compile the declared format suffixes into one splitter regex.
fn format_splitter(formats: &[String]) -> Option<Regex> {
    if formats.is_empty() {
        return None;
    }
    let alternation = formats
        .iter()
        .map(|f| regex_lite::escape(f))
        .collect::<Vec<_>>()
        .join("|");
    // Escaped literals always compile.
    Some(
        Regex::new(&format!("(?:{alternation})$"))
            .expect("escaped alternation is a valid pattern"),
    )
}
