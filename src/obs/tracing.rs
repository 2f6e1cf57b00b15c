// self
use crate::{_prelude::*, auth::ProviderId, obs::OpKind};

/// A span builder used by connection operations.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Creates a new span tagged with the provided operation kind + stage.
	pub fn new(kind: OpKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("oauth2_connect.op", op = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Enters the span until the returned guard drops.
	pub fn entered(self) -> OpSpanGuard {
		#[cfg(feature = "tracing")]
		{
			OpSpanGuard { guard: self.span.entered() }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = self;

			OpSpanGuard {}
		}
	}
}

/// RAII guard returned by [`OpSpan::entered`].
pub struct OpSpanGuard {
	#[cfg(feature = "tracing")]
	#[allow(dead_code)]
	guard: tracing::span::EnteredSpan,
}
impl Debug for OpSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("OpSpanGuard(..)")
	}
}

/// Emits a warning for a profile lookup that failed while building a connection.
pub fn log_profile_unresolved(provider: &ProviderId, err: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(provider = %provider, error = %err, "provider user id left unresolved");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (provider, err);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn op_span_noop_without_tracing() {
		let _guard = OpSpan::new(OpKind::Refresh, "test").entered();
	}

	#[test]
	fn unresolved_profile_warning_accepts_any_error() {
		let provider = ProviderId::new("wechat").expect("Provider fixture should be valid.");

		log_profile_unresolved(&provider, &Error::InvalidClient { reason: "bad secret".into() });
	}
}
