//! HTTP server for Notary

pub mod http;

pub use http::{run, AppState};
