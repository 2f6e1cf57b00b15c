//! Persistence-ready copies of connection state.

// self
use crate::{
	_prelude::*,
	auth::Credential,
	connection::{ConnectionKey, DisplayMetadata},
};

/// Identity, credential, and display metadata of a connection at one instant.
///
/// Snapshots never carry the live client. Restoring one through
/// [`Connection::from_snapshot`](crate::connection::Connection::from_snapshot) and snapshotting
/// again yields an equal value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
	/// Durable identity.
	pub key: ConnectionKey,
	/// Credential in effect when the snapshot was taken.
	pub credential: Credential,
	/// Display metadata resolved so far.
	#[serde(default)]
	pub metadata: DisplayMetadata,
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::auth::{ProviderId, ProviderUserId};

	#[test]
	fn json_shape_is_stable() {
		let snapshot = ConnectionSnapshot {
			key: ConnectionKey {
				provider_id: ProviderId::new("wechat").expect("Provider fixture should be valid."),
				provider_user_id: Some(
					ProviderUserId::new("OPENID").expect("Provider user fixture should be valid."),
				),
			},
			credential: Credential::builder("AT1")
				.refresh_token("RT1")
				.expires_at(macros::datetime!(2025-01-01 02:00 UTC))
				.build()
				.expect("Credential fixture should build."),
			metadata: DisplayMetadata { display_name: Some("Sam".into()), ..Default::default() },
		};
		let value = serde_json::to_value(&snapshot).expect("Snapshot should serialize.");

		assert_eq!(value["key"]["provider_id"], "wechat");
		assert_eq!(value["key"]["provider_user_id"], "OPENID");
		assert_eq!(value["credential"]["access_token"], "AT1");
		assert_eq!(value["credential"]["refresh_token"], "RT1");
		assert_eq!(value["metadata"]["display_name"], "Sam");

		let restored: ConnectionSnapshot =
			serde_json::from_value(value).expect("Snapshot should deserialize.");

		assert_eq!(restored, snapshot);
	}

	#[test]
	fn metadata_is_optional_on_input() {
		let restored: ConnectionSnapshot = serde_json::from_str(
			r#"{"key":{"provider_id":"wechat","provider_user_id":null},
			"credential":{"access_token":"AT1","refresh_token":null,"expires_at":null}}"#,
		)
		.expect("Snapshot without metadata should deserialize.");

		assert_eq!(restored.metadata, DisplayMetadata::default());
		assert!(!restored.key.is_resolved());
	}
}
