pub mod analytics;
pub mod auth;
pub mod metrics;
pub mod middleware;
pub mod rest;
pub mod sessions;
pub mod state;

// Re-export the pieces the binary needs to assemble the router.
pub use middleware::require_auth;
pub use rest::ApiDoc;
