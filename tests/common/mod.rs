//! Shared fakes for integration tests.

#![allow(dead_code)]

// std
use std::{
	collections::VecDeque,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};
// crates.io
use parking_lot::Mutex;
use time::Duration;
// self
use oauth2_connect::{
	api::{ApiError, ApiFactory, ProfileApi, UserProfile},
	auth::{AccessGrant, Credential, ProviderId, ProviderUserId, TokenSecret},
	error::{Error, Result},
	oauth::TokenService,
};

pub type Hook = Box<dyn Fn(&str) + Send + Sync>;

pub fn provider() -> ProviderId {
	ProviderId::new("wechat").expect("Provider fixture should be valid.")
}

pub fn user(id: &str) -> ProviderUserId {
	ProviderUserId::new(id).expect("Provider user fixture should be valid.")
}

pub fn profile(id: &str, name: &str) -> UserProfile {
	UserProfile {
		provider_user_id: Some(user(id)),
		display_name: Some(name.into()),
		image_url: Some(format!("https://example.com/{id}.png")),
		profile_url: None,
	}
}

pub fn grant(access: &str, refresh: Option<&str>, expires_in: Option<Duration>) -> AccessGrant {
	let mut builder = Credential::builder(access);

	if let Some(refresh) = refresh {
		builder = builder.refresh_token(refresh);
	}
	if let Some(expires_in) = expires_in {
		builder = builder.expires_in(expires_in);
	}

	AccessGrant::new(builder.build().expect("Credential fixture should build."))
}

/// Provider client bound to one access token.
#[derive(Debug)]
pub struct FakeApi {
	pub token: String,
	pub user: Option<ProviderUserId>,
	pub profile: Option<UserProfile>,
	pub calls: Arc<AtomicUsize>,
}
impl FakeApi {
	/// Provider-specific operation outside [`ProfileApi`].
	pub fn send_message(&self, text: &str) -> Result<String> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Ok(format!("{}:{text}", self.token))
	}
}
impl ProfileApi for FakeApi {
	fn fetch_profile(&self) -> Result<UserProfile> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		self.profile
			.clone()
			.ok_or_else(|| ApiError::new(Some(40001), "invalid credential").into())
	}
}

#[derive(Debug, Default)]
pub struct FakeApiFactory {
	pub profile: Mutex<Option<UserProfile>>,
	pub calls: Arc<AtomicUsize>,
	pub built: AtomicUsize,
}
impl FakeApiFactory {
	pub fn with_profile(profile: UserProfile) -> Self {
		Self { profile: Mutex::new(Some(profile)), ..Default::default() }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn built(&self) -> usize {
		self.built.load(Ordering::SeqCst)
	}
}
impl ApiFactory for FakeApiFactory {
	type Api = FakeApi;

	fn create_api(
		&self,
		access_token: &TokenSecret,
		provider_user_id: Option<&ProviderUserId>,
	) -> Result<Self::Api> {
		self.built.fetch_add(1, Ordering::SeqCst);

		Ok(FakeApi {
			token: access_token.expose().to_owned(),
			user: provider_user_id.cloned(),
			profile: self.profile.lock().clone(),
			calls: self.calls.clone(),
		})
	}
}

/// Token service replaying scripted outcomes and recording every call.
#[derive(Default)]
pub struct ScriptedTokenService {
	pub outcomes: Mutex<VecDeque<Result<AccessGrant>>>,
	pub seen: Mutex<Vec<String>>,
	pub hook: Option<Hook>,
}
impl ScriptedTokenService {
	pub fn with_hook(hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
		Self { hook: Some(Box::new(hook)), ..Default::default() }
	}

	pub fn push(&self, outcome: Result<AccessGrant>) -> &Self {
		self.outcomes.lock().push_back(outcome);

		self
	}

	fn next(&self, label: String) -> Result<AccessGrant> {
		if let Some(hook) = &self.hook {
			hook(&label);
		}

		self.seen.lock().push(label);
		self.outcomes
			.lock()
			.pop_front()
			.unwrap_or_else(|| Err(Error::InvalidGrant { reason: "script exhausted".into() }))
	}
}
impl TokenService for ScriptedTokenService {
	fn exchange_code(&self, code: &str, _: &url::Url) -> Result<AccessGrant> {
		self.next(format!("code:{code}"))
	}

	fn exchange_credentials(&self, username: &str, _: &str) -> Result<AccessGrant> {
		self.next(format!("password:{username}"))
	}

	fn refresh_access(&self, refresh_token: &TokenSecret) -> Result<AccessGrant> {
		self.next(format!("refresh:{}", refresh_token.expose()))
	}
}
