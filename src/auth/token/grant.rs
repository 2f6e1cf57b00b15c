//! Raw token endpoint responses and their normalized [`AccessGrant`] form.

// self
use crate::{
	_prelude::*,
	auth::{
		ProviderUserId,
		token::credential::{Credential, ExpiresIn, GrantResponseError},
	},
	error::TransientError,
};

/// Token endpoint payload as received, before validation.
///
/// Unknown members are kept in [`extra`](Self::extra) so provider-specific fields such as a
/// WeChat `openid` or `unionid` remain reachable.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TokenResponse {
	/// `access_token` member, kept raw so a non-string value is reported as a bad grant.
	#[serde(default)]
	pub access_token: Option<serde_json::Value>,
	/// `refresh_token` member, kept raw like `access_token`.
	#[serde(default)]
	pub refresh_token: Option<serde_json::Value>,
	/// `expires_in` member, numeric or string encoded.
	#[serde(default)]
	pub expires_in: Option<ExpiresIn>,
	/// `scope` member.
	#[serde(default)]
	pub scope: Option<String>,
	/// `token_type` member.
	#[serde(default)]
	pub token_type: Option<String>,
	/// Every other member of the payload.
	#[serde(flatten)]
	pub extra: serde_json::Map<String, serde_json::Value>,
}
impl TokenResponse {
	/// Parses a JSON body, reporting the path of the first offending member on failure.
	pub fn from_slice(body: &[u8], status: Option<u16>) -> Result<Self> {
		let de = &mut serde_json::Deserializer::from_slice(body);

		serde_path_to_error::deserialize(de)
			.map_err(|source| TransientError::TokenResponseParse { source, status }.into())
	}

	/// Returns an extra member as a string, accepting numeric encodings too.
	pub fn extra_str(&self, field: &str) -> Option<String> {
		match self.extra.get(field)? {
			serde_json::Value::String(value) if !value.is_empty() => Some(value.clone()),
			serde_json::Value::Number(value) => Some(value.to_string()),
			_ => None,
		}
	}
}

/// Normalized grant: the credential plus the grant-level account metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessGrant {
	/// Credential extracted from the response.
	pub credential: Credential,
	/// Provider user id, when the provider returns it with the token (e.g. `openid`).
	pub provider_user_id: Option<ProviderUserId>,
	/// Granted scope string, when echoed by the provider.
	pub scope: Option<String>,
}
impl AccessGrant {
	/// Wraps a credential that carries no account metadata.
	pub fn new(credential: Credential) -> Self {
		Self { credential, provider_user_id: None, scope: None }
	}

	/// Attaches the provider user id carried by the grant.
	pub fn with_provider_user_id(mut self, provider_user_id: ProviderUserId) -> Self {
		self.provider_user_id = Some(provider_user_id);

		self
	}

	/// Normalizes a raw response issued at `issued_at`.
	///
	/// `user_id_field` names the member holding the provider user id; a value that fails
	/// identifier validation is treated as absent so profile resolution can fill it later.
	pub fn from_response_at(
		response: TokenResponse,
		user_id_field: Option<&str>,
		issued_at: OffsetDateTime,
	) -> Result<Self> {
		let provider_user_id = user_id_field
			.and_then(|field| response.extra_str(field))
			.and_then(|value| ProviderUserId::new(value).ok());
		let access_token = string_member("access_token", response.access_token)?;
		let refresh_token = string_member("refresh_token", response.refresh_token)?;
		let credential = Credential::construct_at(
			access_token.unwrap_or_default(),
			refresh_token,
			response.expires_in,
			issued_at,
		)?;

		Ok(Self { credential, provider_user_id, scope: response.scope })
	}

	/// Normalizes a raw response issued now.
	pub fn from_response(response: TokenResponse, user_id_field: Option<&str>) -> Result<Self> {
		Self::from_response_at(response, user_id_field, OffsetDateTime::now_utc())
	}
}

fn string_member(
	field: &'static str,
	value: Option<serde_json::Value>,
) -> Result<Option<String>, GrantResponseError> {
	match value {
		None | Some(serde_json::Value::Null) => Ok(None),
		Some(serde_json::Value::String(value)) => Ok(Some(value)),
		Some(other) => Err(GrantResponseError::InvalidTokenMember { field, value: other.to_string() }),
	}
}
