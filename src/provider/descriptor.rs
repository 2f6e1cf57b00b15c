//! Provider descriptor data structures shared by token services.
//!
//! The module exposes validated metadata, supporting builder utilities, and
//! grant-specific helpers so providers can describe their token endpoints in a
//! transport-agnostic way.

/// Builder API for assembling provider descriptors.
pub mod builder;
/// Grant helpers wired into provider descriptors.
pub mod grant;
/// Provider-specific quirk toggles.
pub mod quirks;

pub use builder::*;
pub use grant::*;
pub use quirks::*;

// self
use crate::{_prelude::*, auth::ProviderId};

/// Preferred client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with the client id and secret.
	ClientSecretBasic,
	/// Form POST body parameters named by [`ProviderQuirks`].
	ClientSecretPost,
}

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Token endpoint used for grant exchanges.
	pub token: Url,
	/// Separate refresh endpoint; refreshes use [`token`](Self::token) when absent.
	#[serde(default)]
	pub refresh: Option<Url>,
}
impl ProviderEndpoints {
	/// Endpoint a grant is posted to.
	pub fn for_grant(&self, grant: GrantType) -> &Url {
		match (grant, self.refresh.as_ref()) {
			(GrantType::RefreshToken, Some(refresh)) => refresh,
			_ => &self.token,
		}
	}
}

/// Immutable provider descriptor consumed by token services.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Descriptor identifier.
	pub id: ProviderId,
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
	/// Supported grant flags.
	pub supported_grants: SupportedGrants,
	/// Preferred client authentication mechanism.
	#[serde(default)]
	pub preferred_client_auth_method: ClientAuthMethod,
	/// Provider-specific quirks.
	#[serde(default)]
	pub quirks: ProviderQuirks,
}
impl ProviderDescriptor {
	/// Creates a new builder for the provided identifier.
	pub fn builder(id: ProviderId) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(id)
	}

	/// Checks whether the descriptor supports a given grant.
	pub fn supports(&self, grant: GrantType) -> bool {
		self.supported_grants.supports(grant)
	}

	/// Parses a JSON descriptor and re-runs builder validation on it.
	pub fn from_json(raw: &str) -> Result<Self, ProviderDescriptorError> {
		let de = &mut serde_json::Deserializer::from_str(raw);
		let descriptor: Self = serde_path_to_error::deserialize(de).map_err(|e| {
			ProviderDescriptorError::Malformed { path: e.path().to_string(), message: e.inner().to_string() }
		})?;

		descriptor.validate()?;

		Ok(descriptor)
	}
}
