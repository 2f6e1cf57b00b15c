//! Provider connections: credential state machine, guarded client access, and refresh.
//!
//! A [`Connection`] owns the current [`Credential`] of one remote account and the client built
//! from it. Both live behind a single per-connection mutex which is also taken by every
//! [`ApiHandle`] call, so a caller never observes a credential from one refresh paired with a
//! client from another. Expiration is checked lazily on access; nothing refreshes in the
//! background, callers invoke [`Connection::refresh`] after an [`ExpiredAuthorization`].
//!
//! [`ExpiredAuthorization`]: crate::error::ExpiredAuthorization

pub mod factory;
pub mod metrics;
pub mod snapshot;

pub use factory::ConnectionFactory;
pub use metrics::RefreshMetrics;
pub use snapshot::ConnectionSnapshot;

// self
use crate::{
	_prelude::*,
	api::{ApiFactory, ApiHandle, ProfileApi, UserProfile},
	auth::{AccessGrant, Credential, ProviderId, ProviderUserId},
	error::RefreshError,
	oauth::TokenService,
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// Durable identity of a connection.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionKey {
	/// Provider the account lives at.
	pub provider_id: ProviderId,
	/// Account id at the provider; `None` until resolved.
	pub provider_user_id: Option<ProviderUserId>,
}
impl ConnectionKey {
	/// Returns `true` once the provider user id is known.
	pub fn is_resolved(&self) -> bool {
		self.provider_user_id.is_some()
	}
}
impl Display for ConnectionKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match &self.provider_user_id {
			Some(user) => write!(f, "{}:{user}", self.provider_id),
			None => write!(f, "{}:<unresolved>", self.provider_id),
		}
	}
}

/// Display attributes resolved from the account profile.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMetadata {
	/// Human-readable account name.
	pub display_name: Option<String>,
	/// Public profile page URL.
	pub profile_url: Option<String>,
	/// Avatar URL.
	pub image_url: Option<String>,
}
impl From<&UserProfile> for DisplayMetadata {
	fn from(profile: &UserProfile) -> Self {
		Self {
			display_name: profile.display_name.clone(),
			profile_url: profile.profile_url.clone(),
			image_url: profile.image_url.clone(),
		}
	}
}

pub(crate) struct ConnectionCore<A> {
	pub(crate) provider_id: ProviderId,
	pub(crate) state: Mutex<ConnectionState<A>>,
}
impl<A> ConnectionCore<A> {
	pub(crate) fn new(provider_id: ProviderId, state: ConnectionState<A>) -> Self {
		Self { provider_id, state: Mutex::new(state) }
	}
}

pub(crate) struct ConnectionState<A> {
	pub(crate) credential: Credential,
	pub(crate) api: A,
	pub(crate) provider_user_id: Option<ProviderUserId>,
	pub(crate) metadata: DisplayMetadata,
}
impl<A> ConnectionState<A> {
	pub(crate) fn new(
		credential: Credential,
		api: A,
		provider_user_id: Option<ProviderUserId>,
		metadata: DisplayMetadata,
	) -> Self {
		Self { credential, api, provider_user_id, metadata }
	}
}

/// Long-lived handle to one remote account.
///
/// Cloning is cheap and every clone shares the same state, lock, and [`ApiHandle`].
pub struct Connection<F>
where
	F: ApiFactory,
{
	core: Arc<ConnectionCore<F::Api>>,
	handle: ApiHandle<F::Api>,
	api_factory: Arc<F>,
	token_service: Arc<dyn TokenService>,
	metrics: Arc<RefreshMetrics>,
}
impl<F> Connection<F>
where
	F: ApiFactory,
{
	/// Builds a connection right after a grant exchange.
	///
	/// When the grant does not carry the provider user id, the profile is fetched through the
	/// freshly built client. That lookup is best-effort: a failure is logged and the connection
	/// is returned with an unresolved identity.
	pub fn from_grant(
		provider_id: ProviderId,
		grant: AccessGrant,
		api_factory: Arc<F>,
		token_service: Arc<dyn TokenService>,
	) -> Result<Self>
	where
		F::Api: ProfileApi,
	{
		const KIND: OpKind = OpKind::Connect;

		let _span = OpSpan::new(KIND, "from_grant").entered();

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = (|| -> Result<Self> {
			grant.credential.validate()?;

			let AccessGrant { credential, mut provider_user_id, .. } = grant;
			let api = api_factory.create_api(&credential.access_token, provider_user_id.as_ref())?;
			let mut metadata = DisplayMetadata::default();

			if provider_user_id.is_none() {
				match api.fetch_profile() {
					Ok(profile) => {
						obs::record_op_outcome(OpKind::Profile, OpOutcome::Success);

						metadata = DisplayMetadata::from(&profile);
						provider_user_id = profile.provider_user_id;
					},
					Err(err) => {
						obs::record_op_outcome(OpKind::Profile, OpOutcome::Failure);
						obs::log_profile_unresolved(&provider_id, &err);
					},
				}
			}

			let state = ConnectionState::new(credential, api, provider_user_id, metadata);

			Ok(Self::assemble(provider_id, state, api_factory, token_service))
		})();

		obs::record_result(KIND, &result);

		result
	}

	/// Rehydrates a connection from a snapshot without contacting the provider.
	pub fn from_snapshot(
		snapshot: ConnectionSnapshot,
		api_factory: Arc<F>,
		token_service: Arc<dyn TokenService>,
	) -> Result<Self> {
		const KIND: OpKind = OpKind::Restore;

		let _span = OpSpan::new(KIND, "from_snapshot").entered();

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = (|| -> Result<Self> {
			let ConnectionSnapshot { key, credential, metadata } = snapshot;

			credential.validate()?;

			let api =
				api_factory.create_api(&credential.access_token, key.provider_user_id.as_ref())?;
			let state = ConnectionState::new(credential, api, key.provider_user_id, metadata);

			Ok(Self::assemble(key.provider_id, state, api_factory, token_service))
		})();

		obs::record_result(KIND, &result);

		result
	}

	fn assemble(
		provider_id: ProviderId,
		state: ConnectionState<F::Api>,
		api_factory: Arc<F>,
		token_service: Arc<dyn TokenService>,
	) -> Self {
		let core = Arc::new(ConnectionCore::new(provider_id, state));
		let handle = ApiHandle::new(core.clone());

		Self { core, handle, api_factory, token_service, metrics: Default::default() }
	}

	/// Provider the connection belongs to.
	pub fn provider_id(&self) -> &ProviderId {
		&self.core.provider_id
	}

	/// Current identity of the connection.
	pub fn key(&self) -> ConnectionKey {
		ConnectionKey {
			provider_id: self.core.provider_id.clone(),
			provider_user_id: self.core.state.lock().provider_user_id.clone(),
		}
	}

	/// Display attributes resolved so far.
	pub fn metadata(&self) -> DisplayMetadata {
		self.core.state.lock().metadata.clone()
	}

	/// Copy of the current credential.
	pub fn credential(&self) -> Credential {
		self.core.state.lock().credential.clone()
	}

	/// The guarded handle; the only sanctioned way to reach the provider client.
	pub fn api(&self) -> &ApiHandle<F::Api> {
		&self.handle
	}

	/// Refresh counters for this connection.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Returns `true` if the credential is expired at the current instant.
	pub fn has_expired(&self) -> bool {
		self.has_expired_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` if the credential is expired at `now`.
	pub fn has_expired_at(&self, now: OffsetDateTime) -> bool {
		self.core.state.lock().credential.is_expired_at(now)
	}

	/// Exchanges the refresh token for a new credential and rebuilds the client.
	///
	/// The new credential and client are fully built before either is swapped in, so a failure
	/// leaves the connection exactly as it was. The refresh token from the response replaces the
	/// current one even when the response omits it.
	pub fn refresh(&self) -> Result<(), RefreshError> {
		const KIND: OpKind = OpKind::Refresh;

		let _span = OpSpan::new(KIND, "refresh").entered();

		obs::record_op_outcome(KIND, OpOutcome::Attempt);
		self.metrics.record_attempt();

		let result = self.refresh_locked();

		match &result {
			Ok(()) => {
				self.metrics.record_success();
				obs::record_op_outcome(KIND, OpOutcome::Success);
			},
			Err(_) => {
				self.metrics.record_failure();
				obs::record_op_outcome(KIND, OpOutcome::Failure);
			},
		}

		result
	}

	fn refresh_locked(&self) -> Result<(), RefreshError> {
		let provider = &self.core.provider_id;
		let failed = |source: Error| RefreshError::RefreshFailed {
			provider: provider.clone(),
			source: Box::new(source),
		};
		let mut state = self.core.state.lock();
		let refresh_token = state
			.credential
			.refresh_token
			.clone()
			.ok_or_else(|| RefreshError::NoRefreshTokenAvailable { provider: provider.clone() })?;
		let grant = self.token_service.refresh_access(&refresh_token).map_err(failed)?;

		grant.credential.validate().map_err(|err| failed(err.into()))?;

		let provider_user_id =
			grant.provider_user_id.clone().or_else(|| state.provider_user_id.clone());
		let api = self
			.api_factory
			.create_api(&grant.credential.access_token, provider_user_id.as_ref())
			.map_err(failed)?;

		state.credential = grant.credential;
		state.api = api;

		if state.provider_user_id.is_none() {
			state.provider_user_id = grant.provider_user_id;
		}

		Ok(())
	}

	/// Copies identity, credential, and display metadata for persistence.
	pub fn create_snapshot(&self) -> ConnectionSnapshot {
		let state = self.core.state.lock();

		ConnectionSnapshot {
			key: ConnectionKey {
				provider_id: self.core.provider_id.clone(),
				provider_user_id: state.provider_user_id.clone(),
			},
			credential: state.credential.clone(),
			metadata: state.metadata.clone(),
		}
	}
}
impl<F> Connection<F>
where
	F: ApiFactory,
	F::Api: ProfileApi,
{
	/// Fetches the account profile through the guarded handle.
	pub fn fetch_user_profile(&self) -> Result<UserProfile> {
		self.handle.fetch_profile()
	}

	/// Probes the connection with a profile lookup.
	///
	/// Provider-level API failures yield `Ok(false)`; an expired credential and transport or
	/// configuration failures are returned as errors.
	pub fn test(&self) -> Result<bool> {
		match self.handle.fetch_profile() {
			Ok(_) => Ok(true),
			Err(Error::Api(_)) => Ok(false),
			Err(err) => Err(err),
		}
	}

	/// Re-resolves the profile and replaces the display metadata.
	///
	/// Also fills the provider user id if it is still unresolved; an already known id is never
	/// changed.
	pub fn sync(&self) -> Result<()> {
		let _span = OpSpan::new(OpKind::Profile, "sync").entered();
		let profile = self.handle.fetch_profile()?;
		let mut state = self.core.state.lock();

		state.metadata = DisplayMetadata::from(&profile);

		if state.provider_user_id.is_none() {
			state.provider_user_id = profile.provider_user_id;
		}

		Ok(())
	}
}
impl<F> Clone for Connection<F>
where
	F: ApiFactory,
{
	fn clone(&self) -> Self {
		Self {
			core: self.core.clone(),
			handle: self.handle.clone(),
			api_factory: self.api_factory.clone(),
			token_service: self.token_service.clone(),
			metrics: self.metrics.clone(),
		}
	}
}
impl<F> Debug for Connection<F>
where
	F: ApiFactory,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let mut dbg = f.debug_struct("Connection");

		dbg.field("provider_id", &self.core.provider_id);

		match self.core.state.try_lock() {
			Some(state) => dbg
				.field("provider_user_id", &state.provider_user_id)
				.field("credential", &state.credential),
			None => dbg.field("state", &"<locked>"),
		};

		dbg.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::{CountingApiFactory, QueuedTokenService},
		api::ApiError,
	};

	fn provider() -> ProviderId {
		ProviderId::new("wechat").expect("Provider fixture should be valid.")
	}

	fn profile(user: &str) -> UserProfile {
		UserProfile {
			provider_user_id: Some(
				ProviderUserId::new(user).expect("Provider user fixture should be valid."),
			),
			display_name: Some("Sam".into()),
			image_url: Some("https://example.com/avatar.png".into()),
			profile_url: None,
		}
	}

	fn grant(access: &str, refresh: Option<&str>, expires_in: Duration) -> AccessGrant {
		let mut builder = Credential::builder(access).expires_in(expires_in);

		if let Some(refresh) = refresh {
			builder = builder.refresh_token(refresh);
		}

		AccessGrant::new(builder.build().expect("Credential fixture should build."))
	}

	#[test]
	fn from_grant_resolves_unknown_user_through_new_client() {
		let factory = Arc::new(CountingApiFactory::with_profile(profile("openid-1")));
		let connection = Connection::from_grant(
			provider(),
			grant("AT1", Some("RT1"), Duration::hours(2)),
			factory.clone(),
			Arc::new(QueuedTokenService::default()),
		)
		.expect("Connection should build from grant.");

		assert_eq!(connection.key().provider_user_id.as_deref(), Some("openid-1"));
		assert_eq!(connection.metadata().display_name.as_deref(), Some("Sam"));
		assert_eq!(factory.calls(), 1);
	}

	#[test]
	fn from_grant_skips_resolution_when_user_known() {
		let factory = Arc::new(CountingApiFactory::with_profile(profile("openid-1")));
		let known = ProviderUserId::new("openid-0").expect("Provider user fixture should be valid.");
		let connection = Connection::from_grant(
			provider(),
			grant("AT1", None, Duration::hours(2)).with_provider_user_id(known),
			factory.clone(),
			Arc::new(QueuedTokenService::default()),
		)
		.expect("Connection should build from grant.");

		assert_eq!(connection.key().provider_user_id.as_deref(), Some("openid-0"));
		assert_eq!(connection.metadata(), DisplayMetadata::default());
		assert_eq!(factory.calls(), 0);
	}

	#[test]
	fn profile_failure_does_not_fail_construction() {
		let factory = Arc::new(CountingApiFactory::default());
		let connection = Connection::from_grant(
			provider(),
			grant("AT1", None, Duration::hours(2)),
			factory,
			Arc::new(QueuedTokenService::default()),
		)
		.expect("Profile failure must not fail construction.");

		assert!(!connection.key().is_resolved());
		assert_eq!(connection.key().to_string(), "wechat:<unresolved>");
	}

	#[test]
	fn refresh_failure_leaves_state_untouched() {
		let tokens = Arc::new(QueuedTokenService::default());
		let connection = Connection::from_grant(
			provider(),
			grant("AT1", Some("RT1"), Duration::hours(2)),
			Arc::new(CountingApiFactory::with_profile(profile("openid-1"))),
			tokens.clone(),
		)
		.expect("Connection should build from grant.");
		let before = connection.create_snapshot();

		tokens.push(Err(Error::InvalidGrant { reason: "refresh token expired".into() }));

		let err = connection.refresh().expect_err("Provider rejection should fail the refresh.");

		assert!(matches!(
			err,
			RefreshError::RefreshFailed { ref source, .. } if matches!(**source, Error::InvalidGrant { .. })
		));
		assert_eq!(connection.create_snapshot(), before);
		assert_eq!(connection.metrics().failures(), 1);
		assert_eq!(tokens.seen.lock().as_slice(), ["RT1".to_owned()]);
	}

	#[test]
	fn refresh_fills_unresolved_identity_from_grant() {
		let tokens = Arc::new(QueuedTokenService::default());
		let connection = Connection::from_grant(
			provider(),
			grant("AT1", Some("RT1"), Duration::hours(2)),
			Arc::new(CountingApiFactory::default()),
			tokens.clone(),
		)
		.expect("Connection should build from grant.");

		tokens.push(Ok(grant("AT2", Some("RT2"), Duration::hours(2)).with_provider_user_id(
			ProviderUserId::new("openid-9").expect("Provider user fixture should be valid."),
		)));
		connection.refresh().expect("Refresh should succeed.");

		assert_eq!(connection.key().provider_user_id.as_deref(), Some("openid-9"));

		let propagated = connection
			.api()
			.invoke(|api| -> Result<_> { Ok(api.provider_user_id.clone()) })
			.expect("Refreshed connection should accept calls.");

		assert_eq!(propagated.as_deref(), Some("openid-9"));
	}

	#[test]
	fn test_and_sync_go_through_the_handle() {
		let factory = Arc::new(CountingApiFactory::with_profile(profile("openid-1")));
		let connection = Connection::from_grant(
			provider(),
			grant("AT1", None, Duration::hours(2))
				.with_provider_user_id(ProviderUserId::new("openid-1").expect("Fixture is valid.")),
			factory.clone(),
			Arc::new(QueuedTokenService::default()),
		)
		.expect("Connection should build from grant.");

		assert!(connection.test().expect("Probe should succeed."));

		connection.sync().expect("Sync should succeed.");

		assert_eq!(connection.metadata().display_name.as_deref(), Some("Sam"));
		assert_eq!(factory.calls(), 2);

		let failing = Connection::from_grant(
			provider(),
			grant("AT1", None, Duration::hours(2)),
			Arc::new(CountingApiFactory::default()),
			Arc::new(QueuedTokenService::default()),
		)
		.expect("Connection should build from grant.");

		assert!(!failing.test().expect("Provider error should be reported as a failed probe."));
		assert!(matches!(failing.sync(), Err(Error::Api(ApiError { status: Some(401), .. }))));
	}

	#[test]
	fn debug_does_not_block_while_locked() {
		let connection = Connection::from_grant(
			provider(),
			grant("AT1", None, Duration::hours(2)),
			Arc::new(CountingApiFactory::default()),
			Arc::new(QueuedTokenService::default()),
		)
		.expect("Connection should build from grant.");
		let rendered: Result<String> =
			connection.api().invoke(|_| Ok(format!("{connection:?}")));

		assert!(rendered.expect("Call should succeed.").contains("<locked>"));
		assert!(!format!("{connection:?}").contains("AT1"));
	}
}
