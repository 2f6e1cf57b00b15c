//! Provider-facing descriptors (data) and strategies (behavior).
//!
//! `descriptor` exposes validated metadata (`ProviderDescriptor`) covering HTTPS-only
//! token endpoints, supported grant flags, client authentication preferences, and
//! provider quirks (client parameter names, user id field, error payload shape).
//! `strategy` defines [`ProviderStrategy`], an HTTP-client-agnostic hook used by the token
//! service to augment outgoing token requests and map responses into the crate error taxonomy.

pub mod descriptor;
pub mod strategy;

pub use descriptor::*;
pub use strategy::*;
