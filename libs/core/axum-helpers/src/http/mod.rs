//! HTTP middleware: security headers.

pub mod security;

pub use security::security_headers;
