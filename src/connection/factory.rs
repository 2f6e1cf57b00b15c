//! Builds [`Connection`]s for one provider from fresh grants or persisted snapshots.

// self
use crate::{
	_prelude::*,
	api::{ApiFactory, ProfileApi},
	auth::{AccessGrant, ProviderId},
	connection::{Connection, ConnectionSnapshot},
	error::ConfigError,
	oauth::TokenService,
};

/// Per-provider entry point pairing an [`ApiFactory`] with a [`TokenService`].
pub struct ConnectionFactory<F>
where
	F: ApiFactory,
{
	provider_id: ProviderId,
	api_factory: Arc<F>,
	token_service: Arc<dyn TokenService>,
}
impl<F> ConnectionFactory<F>
where
	F: ApiFactory,
{
	/// Creates a factory for `provider_id`.
	pub fn new(
		provider_id: ProviderId,
		api_factory: impl Into<Arc<F>>,
		token_service: Arc<dyn TokenService>,
	) -> Self {
		Self { provider_id, api_factory: api_factory.into(), token_service }
	}

	/// Provider served by the factory.
	pub fn provider_id(&self) -> &ProviderId {
		&self.provider_id
	}

	/// Token service used for grant exchanges and refreshes.
	pub fn token_service(&self) -> &Arc<dyn TokenService> {
		&self.token_service
	}

	/// Rehydrates a persisted connection.
	///
	/// Snapshots recorded for another provider are rejected with
	/// [`ConfigError::ProviderMismatch`].
	pub fn restore_connection(&self, snapshot: ConnectionSnapshot) -> Result<Connection<F>> {
		if snapshot.key.provider_id != self.provider_id {
			return Err(ConfigError::ProviderMismatch {
				expected: self.provider_id.clone(),
				found: snapshot.key.provider_id,
			}
			.into());
		}

		Connection::from_snapshot(snapshot, self.api_factory.clone(), self.token_service.clone())
	}
}
impl<F> ConnectionFactory<F>
where
	F: ApiFactory,
	F::Api: ProfileApi,
{
	/// Builds a connection from a grant obtained elsewhere.
	pub fn create_connection(&self, grant: AccessGrant) -> Result<Connection<F>> {
		Connection::from_grant(
			self.provider_id.clone(),
			grant,
			self.api_factory.clone(),
			self.token_service.clone(),
		)
	}

	/// Exchanges an authorization code and connects the resulting account.
	pub fn exchange_code(&self, code: &str, redirect_uri: &Url) -> Result<Connection<F>> {
		self.create_connection(self.token_service.exchange_code(code, redirect_uri)?)
	}

	/// Exchanges resource owner credentials and connects the resulting account.
	pub fn exchange_credentials(&self, username: &str, password: &str) -> Result<Connection<F>> {
		self.create_connection(self.token_service.exchange_credentials(username, password)?)
	}

	/// Obtains an app-only grant and wraps it in a connection.
	pub fn authenticate_client(&self, scope: Option<&str>) -> Result<Connection<F>> {
		self.create_connection(self.token_service.authenticate_client(scope)?)
	}
}
impl<F> Clone for ConnectionFactory<F>
where
	F: ApiFactory,
{
	fn clone(&self) -> Self {
		Self {
			provider_id: self.provider_id.clone(),
			api_factory: self.api_factory.clone(),
			token_service: self.token_service.clone(),
		}
	}
}
impl<F> Debug for ConnectionFactory<F>
where
	F: ApiFactory,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ConnectionFactory").field("provider_id", &self.provider_id).finish_non_exhaustive()
	}
}
