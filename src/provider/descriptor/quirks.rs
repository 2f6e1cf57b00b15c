// self
use crate::_prelude::*;

/// Provider-specific quirks that influence how token requests are encoded and decoded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderQuirks {
	/// Form parameter carrying the client id under `client_secret_post`.
	pub client_id_param: String,
	/// Form parameter carrying the client secret under `client_secret_post`.
	pub client_secret_param: String,
	/// Token response member holding the provider user id, if the provider returns one.
	pub user_id_field: Option<String>,
	/// Token response member holding a provider error code (WeChat `errcode`).
	pub error_code_field: Option<String>,
	/// Token response member holding the message paired with [`error_code_field`](Self::error_code_field).
	pub error_message_field: Option<String>,
	/// Accepts plain `http` endpoints on loopback hosts (local mocks and tests).
	pub allow_loopback_http: bool,
}
impl ProviderQuirks {
	/// Quirks for the WeChat open platform.
	pub fn wechat() -> Self {
		Self {
			client_id_param: "appid".into(),
			client_secret_param: "secret".into(),
			user_id_field: Some("openid".into()),
			error_code_field: Some("errcode".into()),
			error_message_field: Some("errmsg".into()),
			..Default::default()
		}
	}
}
impl Default for ProviderQuirks {
	fn default() -> Self {
		Self {
			client_id_param: "client_id".into(),
			client_secret_param: "client_secret".into(),
			user_id_field: None,
			error_code_field: None,
			error_message_field: None,
			allow_loopback_http: false,
		}
	}
}
