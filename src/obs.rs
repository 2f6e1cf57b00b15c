//! Optional observability helpers for connection operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oauth2_connect.op` with the `op` and `stage`
//!   (call site) fields, plus `warn` events for failures the crate swallows.
//! - Enable `metrics` to increment the `oauth2_connect_op_total` counter for every
//!   attempt/success/failure/expired outcome, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operation kinds observed by connections and token services.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Building a connection from a fresh grant.
	Connect,
	/// Rehydrating a connection from a snapshot.
	Restore,
	/// Token endpoint grant exchange.
	Grant,
	/// Refresh token exchange.
	Refresh,
	/// Profile resolution.
	Profile,
	/// Provider call through an API handle.
	Api,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::Connect => "connect",
			OpKind::Restore => "restore",
			OpKind::Grant => "grant",
			OpKind::Refresh => "refresh",
			OpKind::Profile => "profile",
			OpKind::Api => "api",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Call rejected because the credential was expired.
	Expired,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
			OpOutcome::Expired => "expired",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Records `Success` or `Failure` depending on `result`.
pub fn record_result<T, E>(kind: OpKind, result: &Result<T, E>) {
	let outcome = if result.is_ok() { OpOutcome::Success } else { OpOutcome::Failure };

	record_op_outcome(kind, outcome);
}
