//! The request descriptor consumed and rewritten during dispatch.

use bytes::Bytes;
use http::{HeaderMap, Method};

/// The in/out request descriptor handed to dispatch.
///
/// `script_name` and `path_info` are the mutable delegation fields:
/// dispatch rewrites them before handing the descriptor to a handler or
/// sub-application, and restores them before returning so an outer
/// application composing this one sees its own values unchanged.
/// `action_path` and `format` are injected by dispatch when the matched
/// target declares a format splitter.
#[derive(Debug, Clone)]
pub struct Env {
    /// HTTP request method.
    pub method: Method,
    /// The mount prefix consumed so far.
    pub script_name: String,
    /// The path remainder routing operates on.
    pub path_info: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Bytes,
    /// `path_info` with any matched format suffix stripped.
    pub action_path: Option<String>,
    /// The matched format suffix, e.g. `.json`.
    pub format: Option<String>,
}

impl Env {
    /// Build a descriptor for the given method and request path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            script_name: String::new(),
            path_info: path.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            action_path: None,
            format: None,
        }
    }

    /// Shorthand for a GET descriptor.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }
}

/// Scoped restoration of the descriptor's delegation fields.
///
/// Saves `script_name`/`path_info` on construction and writes them back
/// on drop, so every dispatch exit path — normal return, 404/501, or a
/// panic unwinding out of a delegated handler — leaves the descriptor
/// as it was received.
pub(crate) struct RestoreOnExit<'a> {
    env: &'a mut Env,
    saved_script_name: String,
    saved_path_info: String,
}

impl<'a> RestoreOnExit<'a> {
    pub(crate) fn new(env: &'a mut Env) -> Self {
        let saved_script_name = env.script_name.clone();
        let saved_path_info = env.path_info.clone();
        Self {
            env,
            saved_script_name,
            saved_path_info,
        }
    }
}

impl std::ops::Deref for RestoreOnExit<'_> {
    type Target = Env;

    fn deref(&self) -> &Env {
        self.env
    }
}

impl std::ops::DerefMut for RestoreOnExit<'_> {
    fn deref_mut(&mut self) -> &mut Env {
        self.env
    }
}

impl Drop for RestoreOnExit<'_> {
    fn drop(&mut self) {
        self.env.script_name = std::mem::take(&mut self.saved_script_name);
        self.env.path_info = std::mem::take(&mut self.saved_path_info);
    }
}
