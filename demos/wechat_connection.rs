//! Connects a WeChat account against a local mock of the open platform, lets the access token
//! expire, refreshes it, and restores the connection from a persisted snapshot.

// std
use std::sync::Arc;
// crates.io
use color_eyre::{Result, eyre::eyre};
use httpmock::prelude::*;
use serde::Deserialize;
use url::Url;
// self
use oauth2_connect::{
	api::{ApiError, ApiFactory, ProfileApi, UserProfile},
	auth::{ProviderId, ProviderUserId, TokenSecret},
	connection::{ConnectionFactory, ConnectionSnapshot},
	error::Error,
	http::ReqwestHttpClient,
	oauth::HttpTokenService,
	provider::{ClientAuthMethod, GrantType, ProviderDescriptor, ProviderQuirks, WeChatProviderStrategy},
	reqwest::blocking::Client,
};

#[derive(Deserialize)]
struct WeChatUserInfo {
	openid: String,
	nickname: Option<String>,
	headimgurl: Option<String>,
}

struct WeChatApi {
	http: Client,
	userinfo: Url,
	access_token: TokenSecret,
	openid: Option<ProviderUserId>,
}
impl ProfileApi for WeChatApi {
	fn fetch_profile(&self) -> oauth2_connect::error::Result<UserProfile> {
		let mut url = self.userinfo.clone();

		url.query_pairs_mut().append_pair("access_token", self.access_token.expose());

		if let Some(openid) = &self.openid {
			url.query_pairs_mut().append_pair("openid", openid);
		}

		let body = self
			.http
			.get(url)
			.send()
			.and_then(|response| response.error_for_status())
			.and_then(|response| response.bytes())
			.map_err(|e| ApiError::new(e.status().map(|s| s.as_u16()), "userinfo failed").with_source(e))?;
		let info = serde_json::from_slice::<WeChatUserInfo>(&body)
			.map_err(|e| ApiError::new(Some(200), "userinfo body is not valid JSON").with_source(e))?;

		Ok(UserProfile {
			provider_user_id: Some(ProviderUserId::new(info.openid)?),
			display_name: info.nickname,
			image_url: info.headimgurl,
			profile_url: None,
		})
	}
}

struct WeChatApiFactory {
	http: Client,
	userinfo: Url,
}
impl ApiFactory for WeChatApiFactory {
	type Api = WeChatApi;

	fn create_api(
		&self,
		access_token: &TokenSecret,
		provider_user_id: Option<&ProviderUserId>,
	) -> oauth2_connect::error::Result<Self::Api> {
		Ok(WeChatApi {
			http: self.http.clone(),
			userinfo: self.userinfo.clone(),
			access_token: access_token.clone(),
			openid: provider_user_id.cloned(),
		})
	}
}

fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start();
	let exchange = server.mock(|when, then| {
		when.method(POST).path("/sns/oauth2/access_token");
		then.status(200).header("content-type", "text/plain").body(
			r#"{"access_token":"AT-1","expires_in":"0","refresh_token":"RT-1","openid":"o6_bmjrPTlm6_2sgVt7hMZOPfL2M","scope":"snsapi_login"}"#,
		);
	});
	let refresh = server.mock(|when, then| {
		when.method(POST).path("/sns/oauth2/refresh_token");
		then.status(200).header("content-type", "text/plain").body(
			r#"{"access_token":"AT-2","expires_in":7200,"refresh_token":"RT-2","openid":"o6_bmjrPTlm6_2sgVt7hMZOPfL2M","scope":"snsapi_login"}"#,
		);
	});
	let userinfo = server.mock(|when, then| {
		when.method(GET).path("/sns/userinfo").query_param("access_token", "AT-2");
		then.status(200).header("content-type", "application/json").body(
			r#"{"openid":"o6_bmjrPTlm6_2sgVt7hMZOPfL2M","nickname":"Band","headimgurl":"https://example.com/avatar.png"}"#,
		);
	});
	let http = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()?;
	let descriptor = ProviderDescriptor::builder(ProviderId::new("wechat")?)
		.token_endpoint(Url::parse(&server.url("/sns/oauth2/access_token"))?)
		.refresh_endpoint(Url::parse(&server.url("/sns/oauth2/refresh_token"))?)
		.support_grants([GrantType::AuthorizationCode, GrantType::RefreshToken])
		.preferred_client_auth_method(ClientAuthMethod::ClientSecretPost)
		.quirks(ProviderQuirks { allow_loopback_http: true, ..ProviderQuirks::wechat() })
		.build()?;
	let tokens = HttpTokenService::new(
		descriptor.clone(),
		Arc::new(WeChatProviderStrategy),
		"wx-demo-app",
		"wx-demo-secret",
		ReqwestHttpClient::with_client(http.clone()),
	);
	let factory = ConnectionFactory::new(
		descriptor.id.clone(),
		WeChatApiFactory { http, userinfo: Url::parse(&server.url("/sns/userinfo"))? },
		Arc::new(tokens),
	);
	let connection =
		factory.exchange_code("demo-code", &Url::parse("https://app.example.com/wechat/callback")?)?;

	println!("Connected {}.", connection.key());

	match connection.fetch_user_profile() {
		Err(Error::ExpiredAuthorization(expired)) => println!("{expired} Refreshing."),
		other => return Err(eyre!("Expected an expired authorization, got {other:?}.")),
	}

	connection.refresh()?;
	connection.sync()?;

	println!("Display name after sync: {:?}.", connection.metadata().display_name);

	let persisted = serde_json::to_string_pretty(&connection.create_snapshot())?;
	let restored = factory.restore_connection(serde_json::from_str::<ConnectionSnapshot>(&persisted)?)?;

	println!("Restored connection healthy: {}.", restored.test()?);

	exchange.assert();
	refresh.assert();
	userinfo.assert_calls(2);

	Ok(())
}
