//! Compilation context threaded through the route tree.
//!
//! # Design Decisions
//! - `path` and `params` are owned values: a fork copies them, so one
//!   sibling's additions never reach another sibling's subtree
//! - `controller` is a shared handle: a fork points at the same instance
//!   until a node declares its own controller

use crate::routing::controller::ControllerHandle;
use crate::routing::params::{ParamRule, ParamSchema};

/// Prefix marking a path parameter in route declarations.
pub const PARAM_PREFIX: char = ':';

/// Inherited state for one branch of the route tree.
#[derive(Debug, Clone, Default)]
pub struct RouteContext {
    path: String,
    params: ParamSchema,
    controller: Option<ControllerHandle>,
}

impl RouteContext {
    /// Empty context at the root of a tree.
    pub fn root() -> Self {
        Self::default()
    }

    /// Root context mounted under `prefix`.
    pub fn with_prefix(prefix: &str) -> Self {
        let mut ctx = Self::root();
        ctx.push_path(prefix);
        ctx
    }

    /// Root context with a controller already resolved.
    pub fn with_controller(mut self, controller: ControllerHandle) -> Self {
        self.controller = Some(controller);
        self
    }

    /// Context for one child: path and params copied, controller shared.
    pub fn fork(&self) -> Self {
        Self {
            path: self.path.clone(),
            params: self.params.clone(),
            controller: self.controller.clone(),
        }
    }

    /// Append a declared path, rewriting `:name` segments to `{name}`.
    pub fn push_path(&mut self, declared: &str) {
        for segment in declared.split('/').filter(|s| !s.is_empty()) {
            self.path.push('/');
            match segment.strip_prefix(PARAM_PREFIX) {
                Some(name) => {
                    self.path.push('{');
                    self.path.push_str(name);
                    self.path.push('}');
                }
                None => self.path.push_str(segment),
            }
        }
    }

    /// Merge parameter rules; later keys overwrite earlier ones.
    pub fn extend_params<'a, I>(&mut self, params: I)
    where
        I: IntoIterator<Item = (&'a String, &'a ParamRule)>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    pub fn replace_controller(&mut self, controller: ControllerHandle) {
        self.controller = Some(controller);
    }

    /// Accumulated path, `/` when nothing has been contributed.
    pub fn path(&self) -> &str {
        if self.path.is_empty() {
            "/"
        } else {
            &self.path
        }
    }

    pub fn params(&self) -> &ParamSchema {
        &self.params
    }

    pub fn controller(&self) -> Option<&ControllerHandle> {
        self.controller.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_path() {
        let mut ctx = RouteContext::root();
        assert_eq!(ctx.path(), "/");

        ctx.push_path("users");
        ctx.push_path(":id");
        assert_eq!(ctx.path(), "/users/{id}");

        ctx.push_path("/posts/:postId/");
        assert_eq!(ctx.path(), "/users/{id}/posts/{postId}");
    }

    #[test]
    fn test_empty_path_contributes_nothing() {
        let mut ctx = RouteContext::with_prefix("api");
        ctx.push_path("");
        assert_eq!(ctx.path(), "/api");
    }

    #[test]
    fn test_fork_isolates_path_and_params() {
        let mut parent = RouteContext::with_prefix("api");
        let mut shared = ParamSchema::new();
        shared.insert("tenant".into(), ParamRule::Alphanumeric);
        parent.extend_params(&shared);

        let mut left = parent.fork();
        let right = parent.fork();

        let mut extra = ParamSchema::new();
        extra.insert("id".into(), ParamRule::Integer);
        left.extend_params(&extra);
        left.push_path("left");

        assert_eq!(left.params().len(), 2);
        assert_eq!(right.params().len(), 1);
        assert_eq!(right.path(), "/api");
        assert_eq!(parent.params().len(), 1);
    }

    #[test]
    fn test_params_last_write_wins() {
        let mut ctx = RouteContext::root();
        let mut first = ParamSchema::new();
        first.insert("id".into(), ParamRule::Any);
        let mut second = ParamSchema::new();
        second.insert("id".into(), ParamRule::Uuid);

        ctx.extend_params(&first);
        ctx.extend_params(&second);
        assert_eq!(ctx.params().get("id"), Some(&ParamRule::Uuid));
    }
}
