//! Application assembly and per-request dispatch.
//!
//! The lifecycle is two-phase: a mutable [`AppBuilder`] collects mounted
//! controllers, rewrite rules, and middleware during setup, and
//! [`AppBuilder::finalize`] produces an immutable [`App`] whose route
//! order and middleware composition are derived once. An [`App`] is
//! cheaply cloneable and can itself be mounted into another builder as a
//! sub-application.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use pergola_router::{MethodKey, PatternError, RoutePattern, RouteTable, TableMatch};
use regex_lite::Regex;
use tracing::{debug, warn};

use crate::controller::{rootify, Controller, ControllerConfig, SetupFn};
use crate::env::{Env, RestoreOnExit};
use crate::middleware::{compose, Handler, Middleware};
use crate::response::Response;
use crate::rewrite::{RewriteFn, RewriteRule, Rewriter};

/// The dispatch destination recorded for one controller action.
#[derive(Clone)]
pub struct ActionTarget {
    /// Identity of the controller that declared the action.
    pub controller: String,
    /// The action name.
    pub action: String,
    /// The script-name value installed before the handler runs.
    pub mount_path: String,
    /// Splits path-info into (bare path, format suffix) when set.
    pub format_splitter: Option<Regex>,
    /// The action handler, controller middleware already applied.
    pub handler: Handler,
}

/// The dispatch destination for a (pattern, method) pair.
#[derive(Clone)]
pub enum RouteTarget {
    /// A controller action.
    Action(ActionTarget),
    /// An embedded application; matched requests are forwarded with
    /// path-info rewritten to the captured remainder.
    SubApp(App),
    /// A rewrite callback; matched requests are handed to an ephemeral
    /// rewriter bound to the match's captures.
    Rewriter(RewriteFn),
}

/// The mutable setup-phase application.
pub struct AppBuilder {
    base: String,
    table: RouteTable<RouteTarget>,
    rewrites: Vec<RewriteRule>,
    middleware: Vec<Middleware>,
    mounted: HashSet<String>,
    global_setup: Option<SetupFn>,
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AppBuilder {
    /// A builder with an empty base path.
    pub fn new() -> Self {
        Self {
            base: String::new(),
            table: RouteTable::new(),
            rewrites: Vec::new(),
            middleware: Vec::new(),
            mounted: HashSet::new(),
            global_setup: None,
        }
    }

    /// A builder whose mounts are all prefixed with `base`. Used when
    /// composing this application under another one.
    pub fn at(base: &str) -> Self {
        Self {
            base: rootify(base),
            ..Self::new()
        }
    }

    /// Register a setup callback applied to every controller mounted
    /// afterwards, after that controller's own per-mount setup.
    ///
    /// Precondition: call before mounting. Controllers mounted earlier
    /// are not revisited.
    pub fn setup<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ControllerConfig) + Send + Sync + 'static,
    {
        if !self.mounted.is_empty() {
            warn!("global setup registered after mounting; earlier mounts are unaffected");
        }
        self.global_setup = Some(Arc::new(f));
        self
    }

    /// Mount a controller at its own declared roots.
    pub fn mount(self, controller: impl Controller + 'static) -> Self {
        self.mount_boxed(Box::new(controller), &[], None)
    }

    /// Mount a controller, remapping it under the given root paths. The
    /// first root (prefixed with the builder's base path) becomes the
    /// primary mount path; the rest are alternate canonicals.
    pub fn mount_at(self, controller: impl Controller + 'static, roots: &[&str]) -> Self {
        self.mount_boxed(Box::new(controller), roots, None)
    }

    /// Mount a controller with a per-mount setup callback, run against
    /// the controller's configuration before the global setup.
    pub fn mount_with<F>(
        self,
        controller: impl Controller + 'static,
        roots: &[&str],
        setup: F,
    ) -> Self
    where
        F: Fn(&mut ControllerConfig) + Send + Sync + 'static,
    {
        self.mount_boxed(Box::new(controller), roots, Some(Arc::new(setup)))
    }

    /// Mount every controller in a collection.
    pub fn mount_all(
        mut self,
        controllers: impl IntoIterator<Item = Box<dyn Controller>>,
        roots: &[&str],
    ) -> Self {
        for controller in controllers {
            self = self.mount_boxed(controller, roots, None);
        }
        self
    }

    /// Mount the controllers whose identity matches a name pattern.
    pub fn mount_matching(
        mut self,
        controllers: Vec<Box<dyn Controller>>,
        name_pattern: &str,
        roots: &[&str],
    ) -> Result<Self, PatternError> {
        let filter = Regex::new(name_pattern).map_err(|e| PatternError::InvalidPattern {
            source_text: name_pattern.to_string(),
            message: e.to_string(),
        })?;
        for controller in controllers {
            if filter.is_match(controller.identity()) {
                self = self.mount_boxed(controller, roots, None);
            }
        }
        Ok(self)
    }

    /// Mount a finalized application under a root path; matched
    /// requests are forwarded with path-info rewritten to the captured
    /// remainder.
    pub fn mount_app(mut self, root: &str, app: App) -> Self {
        let full = format!("{}{}", self.base, rootify(root));
        self.table.route(
            RoutePattern::compile([full.as_str()]),
            MethodKey::Any,
            RouteTarget::SubApp(app),
        );
        self
    }

    /// Install a rewriter target in the route table under the
    /// any-method slot. Unlike [`AppBuilder::rewrite_rule`], this
    /// participates in normal longest-source-first routing.
    pub fn mount_rewriter<F>(mut self, pattern: &str, f: F) -> Result<Self, PatternError>
    where
        F: Fn(&[String], &mut Env) -> Response + Send + Sync + 'static,
    {
        self.table.route(
            RoutePattern::new(pattern)?,
            MethodKey::Any,
            RouteTarget::Rewriter(Arc::new(f)),
        );
        Ok(self)
    }

    /// Append a rewrite rule, consulted before the route table on every
    /// dispatch; the first matching rule takes over the request.
    pub fn rewrite_rule<F>(mut self, pattern: &str, f: F) -> Result<Self, PatternError>
    where
        F: Fn(&[String], &mut Env) -> Response + Send + Sync + 'static,
    {
        self.rewrites.push(RewriteRule {
            pattern: RoutePattern::new(pattern)?,
            callback: Arc::new(f),
        });
        Ok(self)
    }

    /// Append an application-level middleware wrapper. The first
    /// registered wrapper becomes the outermost.
    pub fn wrap(mut self, mw: Middleware) -> Self {
        self.middleware.push(mw);
        self
    }

    /// Freeze the builder into a servable [`App`]: derives the route
    /// traversal order and folds the middleware chain around dispatch.
    pub fn finalize(self) -> App {
        let inner = Arc::new(AppInner {
            table: self.table,
            rewrites: self.rewrites,
        });
        // Derive the traversal order now rather than on first request.
        inner.table.sorted_patterns();

        let dispatch_inner = Arc::clone(&inner);
        let base: Handler = Arc::new(move |env: &mut Env| dispatch_inner.dispatch(env));
        let handler = compose(&self.middleware, base);

        App { inner, handler }
    }

    fn mount_boxed(
        mut self,
        mut controller: Box<dyn Controller>,
        roots: &[&str],
        setup: Option<SetupFn>,
    ) -> Self {
        if self.mounted.contains(controller.identity()) {
            debug!(controller = controller.identity(), "already mounted, skipping");
            return self;
        }

        let roots: Vec<String> = roots.iter().map(|r| rootify(r)).collect();
        if !roots.is_empty() || !self.base.is_empty() {
            let primary = roots.first().map(String::as_str).unwrap_or("");
            let mut remapped = vec![format!("{}{}", self.base, primary)];
            remapped.extend(roots.iter().skip(1).cloned());
            controller.remap(remapped);
        }

        // Per-mount setup first, then the global one, both mutating the
        // same configuration before it is applied.
        let mut config = ControllerConfig::default();
        let mut configured = false;
        if let Some(setup) = &setup {
            setup(&mut config);
            configured = true;
        }
        if let Some(global) = &self.global_setup {
            global(&mut config);
            configured = true;
        }
        if configured {
            controller.configure(&config);
        }

        let mut routes = controller.routes();
        let chain = controller.middleware();
        if !chain.is_empty() {
            for target in routes.targets_mut() {
                if let RouteTarget::Action(action) = target {
                    action.handler = compose(&chain, action.handler.clone());
                }
            }
        }
        debug!(
            controller = controller.identity(),
            patterns = routes.len(),
            "mounting"
        );
        self.table.merge(routes);

        for (pattern, callback) in controller.rewrite_rules() {
            self.rewrites.push(RewriteRule { pattern, callback });
        }

        self.mounted.insert(controller.identity().to_string());
        self
    }
}

/// The frozen serving-phase application.
///
/// Cloning is cheap (shared inner state), so an `App` can be handed to
/// a serving layer and embedded as a sub-application at the same time.
/// Nothing mutates after [`AppBuilder::finalize`].
#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
    handler: Handler,
}

struct AppInner {
    table: RouteTable<RouteTarget>,
    rewrites: Vec<RewriteRule>,
}

impl App {
    /// Start a new [`AppBuilder`].
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    /// Dispatch one request through the composed middleware chain and
    /// the route table.
    pub fn call(&self, env: &mut Env) -> Response {
        (self.handler)(env)
    }

    /// Number of registered route patterns.
    pub fn route_count(&self) -> usize {
        self.inner.table.len()
    }

    /// The URLs the app responds to, with the controller and action
    /// serving each one.
    pub fn url_map(&self) -> String {
        let mut out = String::new();
        for pattern in self.inner.table.sorted_patterns() {
            if pattern.source().is_empty() {
                continue;
            }
            let Some(methods) = self.inner.table.get(pattern) else {
                continue;
            };
            out.push_str(pattern.source());
            out.push('\n');
            for (method, target) in methods.entries() {
                let _ = writeln!(out, "  {:<10}{}", method, describe_target(target));
            }
            out.push('\n');
        }
        out
    }
}

impl AppInner {
    fn dispatch(&self, env: &mut Env) -> Response {
        let mut guard = RestoreOnExit::new(env);
        let env = &mut *guard;

        // Rewrite rules take over before normal routing.
        for rule in &self.rewrites {
            if let Some(m) = rule.pattern.matches(&env.path_info) {
                debug!(pattern = rule.pattern.source(), "rewrite rule matched");
                return Rewriter::new(m.into_captures(), rule.callback.clone()).call(env);
            }
        }

        match self.table.lookup(&env.path_info, &env.method) {
            TableMatch::Found {
                target,
                pattern,
                captures,
            } => {
                debug!(
                    pattern = pattern.source(),
                    method = %env.method,
                    "route matched"
                );
                match target {
                    RouteTarget::Rewriter(callback) => {
                        Rewriter::new(captures.into_captures(), callback.clone()).call(env)
                    }
                    RouteTarget::SubApp(app) => {
                        env.path_info = captures.remainder().to_string();
                        app.call(env)
                    }
                    RouteTarget::Action(action) => {
                        let remainder = captures.remainder();
                        env.script_name = action.mount_path.clone();
                        env.path_info = if remainder.is_empty() || remainder.starts_with('/') {
                            remainder.to_string()
                        } else {
                            format!("/{remainder}")
                        };

                        if let Some(splitter) = &action.format_splitter {
                            match splitter.find(&env.path_info) {
                                Some(m) => {
                                    let start = m.start();
                                    let suffix = m.as_str().to_string();
                                    env.action_path = Some(env.path_info[..start].to_string());
                                    env.format = Some(suffix);
                                }
                                None => {
                                    env.action_path = Some(env.path_info.clone());
                                    env.format = None;
                                }
                            }
                        }

                        (action.handler)(env)
                    }
                }
            }
            TableMatch::MethodNotAllowed { allowed } => Response::not_implemented(&allowed),
            TableMatch::NotFound => Response::not_found(&env.path_info),
        }
    }
}

fn describe_target(target: &RouteTarget) -> String {
    match target {
        RouteTarget::Action(action) => format!("{}#{}", action.controller, action.action),
        RouteTarget::SubApp(_) => "[mounted app]".to_string(),
        RouteTarget::Rewriter(_) => "[rewriter]".to_string(),
    }
}
