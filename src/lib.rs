//! Guarded OAuth 2.0 provider connections: expiration-checked API handles, atomic token refresh,
//! and snapshot rehydration in one crate.
//!
//! A [`Connection`](connection::Connection) owns the current credential for one remote account
//! together with the capability-bound client built from it. Application code reaches the client
//! only through [`ApiHandle`](api::ApiHandle), which rejects every call once the credential is
//! known to be expired, and drives [`Connection::refresh`](connection::Connection::refresh) when
//! that happens.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod connection;
pub mod error;
#[cfg(feature = "reqwest")] pub mod http;
pub mod oauth;
pub mod obs;
pub mod provider;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and fakes for unit tests; enabled via `cfg(test)` or the `test`
	//! crate feature.

	pub use crate::_prelude::*;

	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use crate::{
		api::{ApiError, ApiFactory, ProfileApi, UserProfile},
		auth::{AccessGrant, ProviderUserId, TokenSecret},
		oauth::TokenService,
	};

	/// Fake capability client that remembers the token it was built with and counts calls.
	#[derive(Debug)]
	pub struct CountingApi {
		/// Access token used to build the client.
		pub access_token: String,
		/// Provider user id propagated into the client, if any.
		pub provider_user_id: Option<ProviderUserId>,
		/// Shared call counter.
		pub calls: Arc<AtomicUsize>,
		/// Profile returned by [`ProfileApi::fetch_profile`]; `None` makes the call fail.
		pub profile: Option<UserProfile>,
	}
	impl ProfileApi for CountingApi {
		fn fetch_profile(&self) -> Result<UserProfile> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			self.profile.clone().ok_or_else(|| {
				ApiError::new(Some(401), "Profile lookup rejected by the fake provider.").into()
			})
		}
	}

	/// Factory producing [`CountingApi`] clients that share one call counter.
	#[derive(Debug, Default)]
	pub struct CountingApiFactory {
		/// Calls observed across every client built by this factory.
		pub calls: Arc<AtomicUsize>,
		/// Number of clients built so far.
		pub built: AtomicUsize,
		/// Profile handed to each new client.
		pub profile: Option<UserProfile>,
	}
	impl CountingApiFactory {
		/// Creates a factory whose clients resolve the provided profile.
		pub fn with_profile(profile: UserProfile) -> Self {
			Self { profile: Some(profile), ..Default::default() }
		}

		/// Returns the number of provider calls that reached a client.
		pub fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl ApiFactory for CountingApiFactory {
		type Api = CountingApi;

		fn create_api(
			&self,
			access_token: &TokenSecret,
			provider_user_id: Option<&ProviderUserId>,
		) -> Result<Self::Api> {
			self.built.fetch_add(1, Ordering::SeqCst);

			Ok(CountingApi {
				access_token: access_token.expose().to_owned(),
				provider_user_id: provider_user_id.cloned(),
				calls: self.calls.clone(),
				profile: self.profile.clone(),
			})
		}
	}

	/// Token service returning queued refresh outcomes in order.
	#[derive(Default)]
	pub struct QueuedTokenService {
		/// Pending outcomes for [`TokenService::refresh_access`].
		pub refreshes: Mutex<Vec<Result<AccessGrant>>>,
		/// Refresh tokens observed by the service.
		pub seen: Mutex<Vec<String>>,
	}
	impl QueuedTokenService {
		/// Queues one refresh outcome.
		pub fn push(&self, outcome: Result<AccessGrant>) {
			self.refreshes.lock().push(outcome);
		}
	}
	impl TokenService for QueuedTokenService {
		fn refresh_access(&self, refresh_token: &TokenSecret) -> Result<AccessGrant> {
			self.seen.lock().push(refresh_token.expose().to_owned());

			let mut queue = self.refreshes.lock();

			if queue.is_empty() {
				return Err(Error::InvalidGrant { reason: "No refresh outcome is queued.".into() });
			}

			queue.remove(0)
		}
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Error as ReqwestError, blocking::Client as ReqwestClient};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
