//! msgsafe-api: HTTP transport to the backup server.
//!
//! A thin façade over `reqwest` exposing exactly the four operations the
//! backup protocol has: probe the server policy, upload a blob, download
//! it, delete it. Auth is resolved once per call from explicit Basic
//! credentials or a bearer-token collaborator.

pub mod auth;
pub mod client;

pub use auth::{resolve_auth, Auth, TokenProvider};
pub use client::SafeApiClient;
