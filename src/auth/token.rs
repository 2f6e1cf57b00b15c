//! Credential, grant, and secret models produced by token endpoints.

pub mod credential;
pub mod grant;
pub mod secret;
