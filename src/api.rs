//! Capability-bound provider clients and the guarded handle that fronts them.
//!
//! [`ApiFactory`] builds a provider client for one access token. Connections never hand that
//! client out directly: application code goes through [`ApiHandle`], which implements the same
//! operation traits (currently [`ProfileApi`]) and re-checks expiration under the connection lock
//! before forwarding each call. Provider-specific operations outside those traits go through
//! [`ApiHandle::invoke`], which applies the identical guard.

pub mod handle;

pub use handle::*;

// self
use crate::{
	_prelude::*,
	auth::{ProviderUserId, TokenSecret},
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Builds capability-bound clients for a provider.
///
/// Implementations receive the access token and, when known, the provider user id so clients
/// that address the account explicitly (WeChat's `openid` query parameter) can do so. Shared
/// resources such as an HTTP client belong to the factory and are passed in at construction.
pub trait ApiFactory
where
	Self: 'static + Send + Sync,
{
	/// Client type produced by the factory.
	type Api: 'static + Send;

	/// Builds a client bound to `access_token`.
	fn create_api(
		&self,
		access_token: &TokenSecret,
		provider_user_id: Option<&ProviderUserId>,
	) -> Result<Self::Api>;
}

/// Profile operations every provider client exposes.
pub trait ProfileApi {
	/// Fetches the connected account's profile.
	fn fetch_profile(&self) -> Result<UserProfile>;

	/// Fetches only the provider user id.
	fn profile_id(&self) -> Result<Option<ProviderUserId>> {
		Ok(self.fetch_profile()?.provider_user_id)
	}
}

/// Provider-neutral account profile returned by [`ProfileApi::fetch_profile`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
	/// Provider user id of the account.
	pub provider_user_id: Option<ProviderUserId>,
	/// Human-readable name (nickname).
	pub display_name: Option<String>,
	/// Avatar URL.
	pub image_url: Option<String>,
	/// Public profile page URL.
	pub profile_url: Option<String>,
}

/// Failure reported by a provider operation.
///
/// Handles pass these through untouched; only the provider client decides what they mean.
#[derive(Debug, ThisError)]
#[error("Provider API call failed: {message}.")]
pub struct ApiError {
	/// HTTP status code, when the failure came from an HTTP response.
	pub status: Option<u16>,
	/// Provider- or client-supplied message.
	pub message: String,
	/// Underlying failure, if any.
	#[source]
	pub source: Option<BoxError>,
}
impl ApiError {
	/// Creates an error without an underlying source.
	pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
		Self { status, message: message.into(), source: None }
	}

	/// Attaches the underlying failure.
	pub fn with_source(mut self, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		self.source = Some(Box::new(src));

		self
	}
}
