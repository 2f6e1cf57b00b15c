//! Expiration-enforcing forwarding layer over a connection's live client.

// self
use crate::{
	_prelude::*,
	api::{ProfileApi, UserProfile},
	auth::{ProviderId, ProviderUserId},
	connection::ConnectionCore,
	error::ExpiredAuthorization,
	obs::{self, OpKind, OpOutcome},
};

/// Guarded access to the live client of a [`Connection`](crate::connection::Connection).
///
/// The handle is created once per connection and shares its lock. Every call:
///
/// 1. acquires the connection lock,
/// 2. fails with [`ExpiredAuthorization`] if the credential is expired, without touching the client,
/// 3. otherwise runs the operation on the current client and releases the lock only after it returns.
///
/// A refresh that completed before the call is therefore always visible to it, and a refresh
/// racing with an in-flight call waits for that call instead of swapping the client under it.
/// Provider operations must not call back into the same connection.
pub struct ApiHandle<A> {
	core: Arc<ConnectionCore<A>>,
}
impl<A> ApiHandle<A> {
	pub(crate) fn new(core: Arc<ConnectionCore<A>>) -> Self {
		Self { core }
	}

	/// Provider the handle's connection belongs to.
	pub fn provider_id(&self) -> &ProviderId {
		&self.core.provider_id
	}

	/// Runs `op` against the live client after the expiration check.
	///
	/// The operation's result, including its error, is returned unchanged; the only error the
	/// handle itself produces is [`ExpiredAuthorization`].
	pub fn invoke<T, E, Op>(&self, op: Op) -> Result<T, E>
	where
		Op: FnOnce(&A) -> Result<T, E>,
		E: From<ExpiredAuthorization>,
	{
		self.invoke_at(OffsetDateTime::now_utc(), op)
	}

	/// Same as [`invoke`](Self::invoke), treating `now` as the current instant.
	pub fn invoke_at<T, E, Op>(&self, now: OffsetDateTime, op: Op) -> Result<T, E>
	where
		Op: FnOnce(&A) -> Result<T, E>,
		E: From<ExpiredAuthorization>,
	{
		let state = self.core.state.lock();

		if state.credential.is_expired_at(now) {
			obs::record_op_outcome(OpKind::Api, OpOutcome::Expired);

			return Err(ExpiredAuthorization { provider: self.core.provider_id.clone() }.into());
		}

		obs::record_op_outcome(OpKind::Api, OpOutcome::Attempt);

		let result = op(&state.api);

		obs::record_result(OpKind::Api, &result);

		result
	}
}
impl<A> Clone for ApiHandle<A> {
	fn clone(&self) -> Self {
		Self { core: self.core.clone() }
	}
}
impl<A> Debug for ApiHandle<A> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiHandle").field("provider_id", &self.core.provider_id).finish()
	}
}
impl<A> ProfileApi for ApiHandle<A>
where
	A: ProfileApi,
{
	fn fetch_profile(&self) -> Result<UserProfile> {
		self.invoke(|api| api.fetch_profile())
	}

	fn profile_id(&self) -> Result<Option<ProviderUserId>> {
		self.invoke(|api| api.profile_id())
	}
}
