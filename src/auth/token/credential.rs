//! Point-in-time credential triples, expiry coercion, and builders.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

/// Errors produced while normalizing a token response into a [`Credential`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum GrantResponseError {
	/// Issued when no (or an empty) access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when `expires_in` is not a whole number of seconds.
	#[error("The expires_in value `{value}` is not a whole number of seconds.")]
	InvalidExpiresIn {
		/// Raw value as received.
		value: String,
	},
	/// Issued when the expiry instant cannot be represented.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Issued when a token member is present but not a string.
	#[error("The {field} value `{value}` is not a string.")]
	InvalidTokenMember {
		/// Member name.
		field: &'static str,
		/// Raw value as received.
		value: String,
	},
}

/// Relative lifetime as returned by token endpoints.
///
/// Providers disagree on the encoding: most send a JSON number, some send a string such as
/// `"7200"`. Both are accepted; anything else fails during [`ExpiresIn::seconds`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpiresIn {
	/// Numeric encoding (`3600`).
	Number(serde_json::Number),
	/// String encoding (`"3600"`).
	Text(String),
	/// Any other JSON value; always rejected.
	Other(serde_json::Value),
}
impl ExpiresIn {
	/// Coerces the value into whole seconds.
	pub fn seconds(&self) -> Result<i64, GrantResponseError> {
		match self {
			Self::Number(number) => number_seconds(number),
			Self::Text(text) => {
				let trimmed = text.trim();

				if let Ok(secs) = trimmed.parse::<i64>() {
					return Ok(secs);
				}

				trimmed
					.parse::<f64>()
					.ok()
					.and_then(integral_seconds)
					.ok_or_else(|| GrantResponseError::InvalidExpiresIn { value: text.clone() })
			},
			Self::Other(value) =>
				Err(GrantResponseError::InvalidExpiresIn { value: value.to_string() }),
		}
	}
}
impl From<i64> for ExpiresIn {
	fn from(value: i64) -> Self {
		Self::Number(value.into())
	}
}
impl From<&str> for ExpiresIn {
	fn from(value: &str) -> Self {
		Self::Text(value.to_owned())
	}
}
impl From<String> for ExpiresIn {
	fn from(value: String) -> Self {
		Self::Text(value)
	}
}

/// Access token, optional refresh token, and optional expiry instant.
///
/// A credential is immutable once built; connections replace it wholesale on refresh.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
	/// Access token secret; never empty.
	pub access_token: TokenSecret,
	/// Refresh token secret, absent for grants that never return one (client credentials).
	pub refresh_token: Option<TokenSecret>,
	/// Absolute expiry instant; `None` means the token never expires.
	pub expires_at: Option<OffsetDateTime>,
}
impl Credential {
	/// Normalizes raw grant fields, stamping the expiry relative to the current clock.
	pub fn construct(
		access_token: impl Into<String>,
		refresh_token: Option<String>,
		expires_in: Option<ExpiresIn>,
	) -> Result<Self, GrantResponseError> {
		Self::construct_at(access_token, refresh_token, expires_in, OffsetDateTime::now_utc())
	}

	/// Normalizes raw grant fields, stamping the expiry relative to `issued_at`.
	pub fn construct_at(
		access_token: impl Into<String>,
		refresh_token: Option<String>,
		expires_in: Option<ExpiresIn>,
		issued_at: OffsetDateTime,
	) -> Result<Self, GrantResponseError> {
		let mut builder = Self::builder(access_token).issued_at(issued_at);

		if let Some(refresh) = refresh_token.filter(|value| !value.is_empty()) {
			builder = builder.refresh_token(refresh);
		}
		if let Some(expires_in) = expires_in {
			builder = builder.expires_in(Duration::seconds(expires_in.seconds()?));
		}

		builder.build()
	}

	/// Returns a builder seeded with the access token.
	pub fn builder(access_token: impl Into<String>) -> CredentialBuilder {
		CredentialBuilder::new(access_token)
	}

	/// Returns `true` if the credential has an expiry and `instant` is at or past it.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| instant >= expires_at)
	}

	/// Returns `true` if the credential is expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Remaining lifetime at `instant`; `None` for credentials that never expire.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Option<Duration> {
		self.expires_at.map(|expires_at| (expires_at - instant).max(Duration::ZERO))
	}

	/// Returns `true` if a refresh token is present.
	pub fn is_refreshable(&self) -> bool {
		self.refresh_token.is_some()
	}

	/// Checks the invariants a connection relies on.
	pub fn validate(&self) -> Result<(), GrantResponseError> {
		if self.access_token.is_empty() {
			return Err(GrantResponseError::MissingAccessToken);
		}

		Ok(())
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`Credential`].
#[derive(Clone, Debug)]
pub struct CredentialBuilder {
	access_token: TokenSecret,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl CredentialBuilder {
	fn new(access_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
		}
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the instant relative expiries are measured from (defaults to now).
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant; wins over [`expires_in`](Self::expires_in).
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Consumes the builder and produces a [`Credential`].
	pub fn build(self) -> Result<Credential, GrantResponseError> {
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => Some(instant),
			(None, Some(delta)) => Some(
				self.issued_at
					.unwrap_or_else(OffsetDateTime::now_utc)
					.checked_add(delta)
					.ok_or(GrantResponseError::ExpiresInOutOfRange)?,
			),
			(None, None) => None,
		};
		let credential =
			Credential { access_token: self.access_token, refresh_token: self.refresh_token, expires_at };

		credential.validate()?;

		Ok(credential)
	}
}

fn number_seconds(number: &serde_json::Number) -> Result<i64, GrantResponseError> {
	if let Some(secs) = number.as_i64() {
		return Ok(secs);
	}
	if number.is_u64() {
		return Err(GrantResponseError::ExpiresInOutOfRange);
	}

	number
		.as_f64()
		.and_then(integral_seconds)
		.ok_or_else(|| GrantResponseError::InvalidExpiresIn { value: number.to_string() })
}

fn integral_seconds(value: f64) -> Option<i64> {
	if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
		Some(value as i64)
	} else {
		None
	}
}
