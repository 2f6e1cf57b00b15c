//! Blocking transport primitives for token endpoint calls.
//!
//! [`ReqwestHttpClient`] wraps a caller-provided [`ReqwestClient`] so one connection pool is shared
//! by every token service built from it. Each call yields a [`TokenHttpResponse`] carrying the raw
//! body together with [`ResponseMetadata`] so error mapping can classify failures with the status
//! code and retry hint of the response that caused them.

// std
use std::ops::Deref;
// crates.io
use reqwest::{
	header::{ACCEPT, HeaderMap, RETRY_AFTER},
	redirect::Policy,
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::ConfigError};

/// Metadata captured from the most recent HTTP response for downstream error mapping.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the token endpoint, if available.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Raw token endpoint response.
#[derive(Clone, Debug)]
pub struct TokenHttpResponse {
	/// Status and retry hint.
	pub metadata: ResponseMetadata,
	/// Response body bytes, decoded later regardless of the declared content type.
	pub body: Vec<u8>,
}
impl TokenHttpResponse {
	/// Returns `true` for 2xx responses.
	pub fn is_success(&self) -> bool {
		self.metadata.status.is_some_and(|status| (200..300).contains(&status))
	}
}

/// Client credentials attached through HTTP Basic authentication.
#[derive(Clone, Copy, Debug)]
pub struct BasicAuth<'a> {
	/// Client identifier.
	pub username: &'a str,
	/// Client secret.
	pub password: &'a str,
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Token requests should not follow redirects: token endpoints return results directly instead
/// of delegating to another URI. Configure any custom [`ReqwestClient`] to disable redirect
/// following; [`ReqwestHttpClient::new`] does so already.
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient(pub ReqwestClient);
impl ReqwestHttpClient {
	/// Builds a client with redirects disabled and the provided request timeout.
	pub fn new(timeout: std::time::Duration) -> Result<Self> {
		let client = ReqwestClient::builder()
			.redirect(Policy::none())
			.timeout(timeout)
			.build()
			.map_err(ConfigError::from)?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Posts a form-encoded body to `url`.
	pub fn post_form(
		&self,
		url: &Url,
		form: &BTreeMap<String, String>,
		basic: Option<BasicAuth<'_>>,
	) -> Result<TokenHttpResponse, ReqwestError> {
		let mut request = self.0.post(url.clone()).header(ACCEPT, "application/json").form(form);

		if let Some(BasicAuth { username, password }) = basic {
			request = request.basic_auth(username, Some(password));
		}

		let response = request.send()?;
		let metadata = ResponseMetadata {
			status: Some(response.status().as_u16()),
			retry_after: parse_retry_after(response.headers()),
		};
		let body = response.bytes()?.to_vec();

		Ok(TokenHttpResponse { metadata, body })
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

/// Parses a `Retry-After` header given in seconds or as an RFC 2822 date.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(secs.into()));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// crates.io
	use reqwest::header::HeaderValue;
	// self
	use super::*;

	fn headers(value: &'static str) -> HeaderMap {
		let mut headers = HeaderMap::new();

		headers.insert(RETRY_AFTER, HeaderValue::from_static(value));

		headers
	}

	#[test]
	fn retry_after_accepts_seconds_and_dates() {
		assert_eq!(parse_retry_after(&headers("120")), Some(Duration::seconds(120)));
		assert_eq!(parse_retry_after(&headers("Mon, 01 Jan 2001 00:00:00 +0000")), None);
		assert_eq!(parse_retry_after(&headers("soon")), None);
		assert_eq!(parse_retry_after(&HeaderMap::new()), None);

		let future = (OffsetDateTime::now_utc() + Duration::hours(1))
			.format(&Rfc2822)
			.expect("Future instant should format.");
		let mut map = HeaderMap::new();

		map.insert(RETRY_AFTER, HeaderValue::from_str(&future).expect("Header should be valid."));

		let delta = parse_retry_after(&map).expect("Future date should yield a delay.");

		assert!(delta > Duration::minutes(55) && delta <= Duration::hours(1));
	}

	#[test]
	fn success_range_is_2xx_only() {
		let response = |status| TokenHttpResponse {
			metadata: ResponseMetadata { status: Some(status), retry_after: None },
			body: Vec::new(),
		};

		assert!(response(200).is_success());
		assert!(!response(302).is_success());
		assert!(!response(400).is_success());
	}
}
