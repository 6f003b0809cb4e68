//! Route table.
//!
//! # Responsibilities
//! - Register each resource's sub-router under its mount path
//! - Assemble the final axum router
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Duplicate mount paths are ignored with a warning

use axum::routing::{any, get};
use axum::Router;

use crate::http::server::AppState;
use crate::http::{img, root, simulate};

/// Resources keyed by mount path, in registration order.
pub struct RouteTable {
    resources: Vec<(&'static str, Router<AppState>)>,
}

impl RouteTable {
    /// The service's resources: root endpoints and `/img`.
    pub fn new() -> Self {
        Self::empty()
            .mount("/", root_resource())
            .mount("/img", img_resource())
    }

    pub fn empty() -> Self {
        Self {
            resources: Vec::new(),
        }
    }

    /// Add a resource under `path`.
    pub fn mount(mut self, path: &'static str, router: Router<AppState>) -> Self {
        if self.resources.iter().any(|(p, _)| *p == path) {
            tracing::warn!(path, "Resource already mounted, ignoring");
            return self;
        }
        self.resources.push((path, router));
        self
    }

    /// Mount paths, in registration order.
    pub fn paths(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.iter().map(|(path, _)| *path)
    }

    /// Assemble a single router: `/` is merged, everything else nested.
    pub fn into_router(self) -> Router<AppState> {
        self.resources
            .into_iter()
            .fold(Router::new(), |app, (path, router)| {
                if path == "/" {
                    app.merge(router)
                } else {
                    app.nest(path, router)
                }
            })
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

fn root_resource() -> Router<AppState> {
    Router::new()
        .route("/", get(root::root))
        .route("/status", get(root::status))
        .route("/hello", get(root::hello))
        .route("/_ah/warmup", get(root::warmup))
        .route("/test", any(simulate::simulate))
}

fn img_resource() -> Router<AppState> {
    Router::new().route("/", get(img::transform_image))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_resources() {
        let table = RouteTable::new();
        assert_eq!(table.paths().collect::<Vec<_>>(), vec!["/", "/img"]);
    }

    #[test]
    fn test_duplicate_mount_is_ignored() {
        let table = RouteTable::new().mount("/img", Router::new());
        assert_eq!(table.paths().count(), 2);
    }
}
