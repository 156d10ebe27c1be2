//! Pergola — a controller-mount request routing and dispatch core.
//!
//! Independently defined controllers are mounted into one application,
//! which maps each incoming request to a handler by path pattern, HTTP
//! method, and optional format suffix.
//!
//! ```ignore
//! use pergola::{App, Blueprint, Response, RunOptions};
//!
//! let forum = Blueprint::new("Forum")
//!     .root("/forum")
//!     .get("topics", |_env| Response::ok("all topics"));
//!
//! let app = App::builder().mount(forum).finalize();
//! app.run(RunOptions::default()).await?;
//! ```

pub mod app;
pub mod controller;
pub mod env;
pub mod middleware;
pub mod response;
pub mod rewrite;
pub mod serve;

pub use app::{ActionTarget, App, AppBuilder, RouteTarget};
pub use controller::{Blueprint, Controller, ControllerConfig, SetupFn};
pub use env::Env;
pub use middleware::{handler, middleware, Handler, Middleware};
pub use response::Response;
pub use rewrite::{rewrite_fn, RewriteFn};
pub use serve::{RunOptions, ServeError, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_SERVER};

pub use pergola_router::{
    MethodKey, PatternError, PatternMatch, RoutePattern, RouteTable, TableMatch,
};
