//! Remote database endpoint.
//!
//! The gateway never speaks the database wire protocol. Statements and
//! metadata lookups go to a Supabase project over its REST interface, behind
//! the [`RemoteExecutor`] trait so tests can substitute an in-memory executor.

pub mod postgrest;
pub mod traits;

pub use postgrest::PostgrestClient;
pub use traits::{Filter, RemoteExecutor};
