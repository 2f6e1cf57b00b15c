//! Token endpoint collaborators: the [`TokenService`] seam and its reqwest-backed default.

// self
use crate::{
	_prelude::*,
	auth::{AccessGrant, TokenSecret},
	error::ConfigError,
	provider::GrantType,
};
#[cfg(feature = "reqwest")]
use crate::{
	auth::TokenResponse,
	error::{TransientError, TransportError},
	http::{BasicAuth, ReqwestHttpClient, ResponseMetadata, TokenHttpResponse},
	obs::{self, OpKind, OpOutcome, OpSpan},
	provider::{
		ClientAuthMethod, ProviderDescriptor, ProviderErrorContext, ProviderErrorKind,
		ProviderStrategy,
	},
};

/// Grant exchange and token refresh against one provider.
///
/// Only [`refresh_access`](Self::refresh_access) is mandatory since connections depend on it;
/// the other grants default to [`ConfigError::UnsupportedGrant`].
pub trait TokenService
where
	Self: Send + Sync,
{
	/// Exchanges an authorization code obtained through the redirect flow.
	fn exchange_code(&self, code: &str, redirect_uri: &Url) -> Result<AccessGrant> {
		let _ = (code, redirect_uri);

		Err(unsupported::<Self>(GrantType::AuthorizationCode))
	}

	/// Exchanges resource owner credentials.
	fn exchange_credentials(&self, username: &str, password: &str) -> Result<AccessGrant> {
		let _ = (username, password);

		Err(unsupported::<Self>(GrantType::Password))
	}

	/// Obtains an app-only grant, optionally narrowed to `scope`.
	fn authenticate_client(&self, scope: Option<&str>) -> Result<AccessGrant> {
		let _ = scope;

		Err(unsupported::<Self>(GrantType::ClientCredentials))
	}

	/// Exchanges a refresh token for a new grant.
	fn refresh_access(&self, refresh_token: &TokenSecret) -> Result<AccessGrant>;
}

fn unsupported<S>(grant: GrantType) -> Error
where
	S: ?Sized,
{
	ConfigError::UnsupportedGrant { descriptor: std::any::type_name::<S>().into(), grant: grant.as_str() }
		.into()
}

/// [`TokenService`] posting form-encoded requests to a provider's token endpoints.
///
/// The HTTP client is injected so services for several providers can share one pool.
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct HttpTokenService {
	descriptor: ProviderDescriptor,
	strategy: Arc<dyn ProviderStrategy>,
	client_id: String,
	client_secret: TokenSecret,
	http_client: ReqwestHttpClient,
}
#[cfg(feature = "reqwest")]
impl HttpTokenService {
	/// Creates a service for `descriptor` authenticating as `client_id`.
	pub fn new(
		descriptor: ProviderDescriptor,
		strategy: Arc<dyn ProviderStrategy>,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		http_client: ReqwestHttpClient,
	) -> Self {
		Self {
			descriptor,
			strategy,
			client_id: client_id.into(),
			client_secret: TokenSecret::new(client_secret),
			http_client,
		}
	}

	/// Descriptor the service was built for.
	pub fn descriptor(&self) -> &ProviderDescriptor {
		&self.descriptor
	}

	fn request(&self, grant: GrantType, params: Vec<(&'static str, String)>) -> Result<AccessGrant> {
		let kind = if grant == GrantType::RefreshToken { OpKind::Refresh } else { OpKind::Grant };
		let _span = OpSpan::new(kind, grant.as_str()).entered();

		obs::record_op_outcome(kind, OpOutcome::Attempt);

		let result = self.dispatch(grant, params);

		obs::record_result(kind, &result);

		result
	}

	fn dispatch(&self, grant: GrantType, params: Vec<(&'static str, String)>) -> Result<AccessGrant> {
		if !self.descriptor.supports(grant) {
			return Err(ConfigError::UnsupportedGrant {
				descriptor: self.descriptor.id.to_string(),
				grant: grant.as_str(),
			}
			.into());
		}

		let mut form = BTreeMap::new();

		form.insert("grant_type".to_owned(), grant.as_str().to_owned());

		for (key, value) in params {
			form.insert(key.to_owned(), value);
		}

		let basic = match self.descriptor.preferred_client_auth_method {
			ClientAuthMethod::ClientSecretBasic => Some(BasicAuth {
				username: &self.client_id,
				password: self.client_secret.expose(),
			}),
			ClientAuthMethod::ClientSecretPost => {
				let quirks = &self.descriptor.quirks;

				form.insert(quirks.client_id_param.clone(), self.client_id.clone());
				form.insert(quirks.client_secret_param.clone(), self.client_secret.expose().to_owned());

				None
			},
		};

		self.strategy.augment_token_request(grant, &mut form);

		let url = self.descriptor.endpoints.for_grant(grant);
		let response = self
			.http_client
			.post_form(url, &form, basic)
			.map_err(|err| self.map_reqwest_error(grant, err))?;

		self.interpret(grant, response)
	}

	fn interpret(&self, grant: GrantType, response: TokenHttpResponse) -> Result<AccessGrant> {
		let success = response.is_success();
		let TokenHttpResponse { metadata, body } = response;
		let parsed = match TokenResponse::from_slice(&body, metadata.status) {
			Ok(parsed) => parsed,
			Err(err) if success => return Err(err),
			Err(_) => {
				let ctx = self
					.context(grant, &metadata)
					.with_body_preview(String::from_utf8_lossy(&body).into_owned());
				let message = format!(
					"Token endpoint returned HTTP {} with a non-JSON body",
					metadata.status.unwrap_or_default()
				);

				return Err(self.classify(&ctx, message, &metadata));
			},
		};

		if let Some((code, description)) = self.oauth_error(&parsed) {
			let mut ctx = self.context(grant, &metadata).with_oauth_error(code.clone());
			let message = match &description {
				Some(description) => format!("Token endpoint returned an OAuth error: {description}"),
				None => format!("Token endpoint returned an OAuth error: {code}"),
			};

			if let Some(description) = description {
				ctx = ctx.with_error_description(description);
			}

			return Err(self.classify(&ctx, message, &metadata));
		}
		if !success {
			let ctx = self.context(grant, &metadata);
			let message = format!(
				"Token endpoint returned HTTP {} without an error payload",
				metadata.status.unwrap_or_default()
			);

			return Err(self.classify(&ctx, message, &metadata));
		}

		AccessGrant::from_response(parsed, self.descriptor.quirks.user_id_field.as_deref())
	}

	fn oauth_error(&self, response: &TokenResponse) -> Option<(String, Option<String>)> {
		if let Some(code) = response.extra_str("error") {
			return Some((code, response.extra_str("error_description")));
		}

		let quirks = &self.descriptor.quirks;
		let code = response.extra_str(quirks.error_code_field.as_deref()?)?;

		if code.trim() == "0" {
			return None;
		}

		let message =
			quirks.error_message_field.as_deref().and_then(|field| response.extra_str(field));

		Some((code, message))
	}

	fn context(&self, grant: GrantType, metadata: &ResponseMetadata) -> ProviderErrorContext {
		let ctx = ProviderErrorContext::new(grant);

		match metadata.status {
			Some(status) => ctx.with_http_status(status),
			None => ctx,
		}
	}

	/// Builder failures are configuration errors and refused connections are transport errors;
	/// timeouts are classified by the strategy as network failures.
	fn map_reqwest_error(&self, grant: GrantType, err: ReqwestError) -> Error {
		if err.is_builder() {
			return ConfigError::from(err).into();
		}
		if err.is_timeout() {
			let metadata = ResponseMetadata {
				status: err.status().map(|code| code.as_u16()),
				retry_after: None,
			};

			return self.classify(
				&ProviderErrorContext::network_failure(grant),
				"Request timed out while calling the token endpoint".into(),
				&metadata,
			);
		}

		TransportError::from(err).into()
	}

	fn classify(&self, ctx: &ProviderErrorContext, message: String, metadata: &ResponseMetadata) -> Error {
		match self.strategy.classify_token_error(ctx) {
			ProviderErrorKind::InvalidGrant => Error::InvalidGrant { reason: message },
			ProviderErrorKind::InvalidClient => Error::InvalidClient { reason: message },
			ProviderErrorKind::InsufficientScope => Error::InsufficientScope { reason: message },
			ProviderErrorKind::Transient => TransientError::TokenEndpoint {
				message,
				status: metadata.status,
				retry_after: metadata.retry_after,
			}
			.into(),
		}
	}
}
#[cfg(feature = "reqwest")]
impl TokenService for HttpTokenService {
	fn exchange_code(&self, code: &str, redirect_uri: &Url) -> Result<AccessGrant> {
		self.request(
			GrantType::AuthorizationCode,
			vec![("code", code.to_owned()), ("redirect_uri", redirect_uri.to_string())],
		)
	}

	fn exchange_credentials(&self, username: &str, password: &str) -> Result<AccessGrant> {
		self.request(
			GrantType::Password,
			vec![("username", username.to_owned()), ("password", password.to_owned())],
		)
	}

	fn authenticate_client(&self, scope: Option<&str>) -> Result<AccessGrant> {
		let params = scope.map(|scope| vec![("scope", scope.to_owned())]).unwrap_or_default();

		self.request(GrantType::ClientCredentials, params)
	}

	fn refresh_access(&self, refresh_token: &TokenSecret) -> Result<AccessGrant> {
		self.request(GrantType::RefreshToken, vec![("refresh_token", refresh_token.expose().to_owned())])
	}
}
#[cfg(feature = "reqwest")]
impl Debug for HttpTokenService {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpTokenService")
			.field("provider", &self.descriptor.id)
			.field("client_id", &self.client_id)
			.finish_non_exhaustive()
	}
}
