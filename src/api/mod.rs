//! HTTP surface of the analysis service.
//!
//! `analysis_router()` returns a composable `Router`; `server` owns the
//! listener lifecycle.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::{analysis_router, RouterSettings};
pub use server::{start_server, AnalysisServer};
pub use types::ApiContext;
