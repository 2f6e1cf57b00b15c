//! Crate-level error types shared across credentials, connections, handles, and token services.

// self
use crate::{
	_prelude::*,
	api::ApiError,
	auth::{GrantResponseError, IdentifierError, ProviderId},
	provider::ProviderDescriptorError,
};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Token endpoint response could not be normalized into a credential.
	#[error("Token endpoint returned an invalid grant response: {0}")]
	InvalidGrantResponse(#[from] GrantResponseError),
	/// Provider call attempted while the connection's credential is expired.
	#[error(transparent)]
	ExpiredAuthorization(#[from] ExpiredAuthorization),
	/// Refreshing the connection's credential failed.
	#[error(transparent)]
	Refresh(#[from] RefreshError),
	/// Provider operation failure reported by a capability-bound client.
	#[error(transparent)]
	Api(#[from] ApiError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Requested scopes exceed what was granted.
	#[error("Token lacks the required scopes: {reason}.")]
	InsufficientScope {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Provider rejected the grant (e.g., bad code or refresh token).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider-supplied reason string.
		reason: String,
	},
}
impl From<IdentifierError> for Error {
	fn from(e: IdentifierError) -> Self {
		ConfigError::from(e).into()
	}
}
impl From<ProviderDescriptorError> for Error {
	fn from(e: ProviderDescriptorError) -> Self {
		ConfigError::from(e).into()
	}
}

/// Raised by guarded handles when the credential is known to be expired.
///
/// The underlying provider operation is never invoked in that case; callers must refresh the
/// connection before retrying.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Authorization for provider `{provider}` has expired.")]
pub struct ExpiredAuthorization {
	/// Provider whose credential expired.
	pub provider: ProviderId,
}

/// Failures produced by [`Connection::refresh`](crate::connection::Connection::refresh).
#[derive(Debug, ThisError)]
pub enum RefreshError {
	/// The connection was built from a grant without a refresh token.
	#[error("Connection to `{provider}` has no refresh token available.")]
	NoRefreshTokenAvailable {
		/// Provider identifier of the connection.
		provider: ProviderId,
	},
	/// The refresh call failed; the connection state is unchanged and the call may be retried.
	#[error("Refreshing the connection to `{provider}` failed.")]
	RefreshFailed {
		/// Provider identifier of the connection.
		provider: ProviderId,
		/// Underlying network, provider, or response failure.
		#[source]
		source: Box<Error>,
	},
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] IdentifierError),
	/// Provider descriptor failed validation.
	#[error(transparent)]
	InvalidDescriptor(#[from] ProviderDescriptorError),
	/// Descriptor does not enable the requested grant.
	#[error("Descriptor `{descriptor}` does not enable the {grant} grant.")]
	UnsupportedGrant {
		/// Provider identifier string.
		descriptor: String,
		/// Disabled grant label.
		grant: &'static str,
	},
	/// Snapshot belongs to another provider than the factory restoring it.
	#[error("Snapshot for provider `{found}` cannot be restored by the `{expected}` factory.")]
	ProviderMismatch {
		/// Provider served by the factory.
		expected: ProviderId,
		/// Provider recorded in the snapshot.
		found: ProviderId,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or crate-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn refresh_failure_exposes_cause_as_source() {
		let provider = ProviderId::new("wechat").expect("Provider fixture should be valid.");
		let err: Error = RefreshError::RefreshFailed {
			provider,
			source: Box::new(Error::InvalidGrant { reason: "refresh token reused".into() }),
		}
		.into();

		assert!(matches!(err, Error::Refresh(RefreshError::RefreshFailed { .. })));

		let source = StdError::source(&err).expect("Refresh failure should expose the provider error as its source.");

		assert!(source.to_string().contains("refresh token reused"));
	}

	#[test]
	fn expired_authorization_names_provider() {
		let provider = ProviderId::new("wechat").expect("Provider fixture should be valid.");
		let err = Error::from(ExpiredAuthorization { provider });

		assert_eq!(err.to_string(), "Authorization for provider `wechat` has expired.");
	}
}
