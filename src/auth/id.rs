//! Strongly typed identifiers for providers and the remote accounts connected through them.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty or whitespace.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (provider, provider user).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (provider, provider user).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (provider, provider user).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { ProviderId, "Identifier for an OAuth provider (e.g. `wechat`).", "Provider" }
def_id! {
	ProviderUserId,
	"Account identifier assigned by the provider (e.g. a WeChat `openid`).",
	"ProviderUser"
}

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_reject_whitespace_and_empty_values() {
		assert!(ProviderId::new(" wechat").is_err(), "Leading whitespace must be rejected.");
		assert!(ProviderId::new("wechat ").is_err(), "Trailing whitespace must be rejected.");

		let provider = ProviderId::new("wechat").expect("Provider fixture should be valid.");

		assert_eq!(provider.as_ref(), "wechat");
		assert!(ProviderUserId::new("").is_err());
		assert!(ProviderUserId::new("open id").is_err());
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let user: ProviderUserId = serde_json::from_str("\"oLVPpjqs9BhvzwPj5A-vTYAX3GLc\"")
			.expect("Provider user id should deserialize successfully.");

		assert_eq!(user.as_ref(), "oLVPpjqs9BhvzwPj5A-vTYAX3GLc");
		assert!(serde_json::from_str::<ProviderUserId>("\"with space\"").is_err());
		assert!(serde_json::from_str::<ProviderId>("\"\"").is_err());
	}

	#[test]
	fn unicode_whitespace_and_length_limits() {
		let nbsp = format!("open{}id", '\u{00A0}');

		assert!(ProviderUserId::new(&nbsp).is_err());

		let exact = "a".repeat(IDENTIFIER_MAX_LEN);

		ProviderUserId::new(&exact).expect("Exact length should succeed.");

		let too_long = "a".repeat(IDENTIFIER_MAX_LEN + 1);

		assert!(matches!(
			ProviderUserId::new(&too_long),
			Err(IdentifierError::TooLong { kind: "ProviderUser", max: IDENTIFIER_MAX_LEN })
		));
	}

	#[test]
	fn debug_and_display_forms() {
		let provider = ProviderId::new("wechat").expect("Provider fixture should be valid.");
		let parsed: ProviderId = "wechat".parse().expect("Provider id should parse from str.");

		assert_eq!(format!("{provider:?}"), "Provider(wechat)");
		assert_eq!(provider.to_string(), "wechat");
		assert_eq!(provider, parsed);
	}
}
