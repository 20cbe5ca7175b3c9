//! Affiliate URL rewriting.
//!
//! The tracking parameters, their order, and their values are a compatibility contract with the
//! affiliate network, so the URL is extended textually rather than re-serialized through
//! [`Url`], which would normalize the item URL.

// crates.io
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
// self
use crate::_prelude::*;

/// Characters escaped by `encodeURIComponent`: everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
pub const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
	.remove(b'-')
	.remove(b'_')
	.remove(b'.')
	.remove(b'!')
	.remove(b'~')
	.remove(b'*')
	.remove(b'\'')
	.remove(b'(')
	.remove(b')');

/// Process-wide affiliate parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AffiliateParams {
	campaign_id: String,
	encoded_campaign_id: String,
}
impl AffiliateParams {
	/// Marketing event code (`mkevt`).
	pub const EVENT: &str = "1";
	/// Click-context code (`mkcid`).
	pub const CLICK_CONTEXT: &str = "1";
	/// Partner tool identifier (`toolid`).
	pub const TOOL_ID: &str = "10001";

	/// Creates parameters for the provided campaign identifier.
	pub fn new(campaign_id: impl Into<String>) -> Self {
		let campaign_id = campaign_id.into();
		let encoded_campaign_id = encode_component(&campaign_id);

		Self { campaign_id, encoded_campaign_id }
	}

	/// Raw campaign identifier.
	pub fn campaign_id(&self) -> &str {
		&self.campaign_id
	}

	/// Appends the tracking parameters (and `customid`, when given) to `item_url`.
	///
	/// The separator is `?` when the URL carries no query string and `&` otherwise. A trailing
	/// `#fragment` is kept at the end of the result. The input is never altered: URLs with
	/// surrounding whitespace or control characters are rejected.
	pub fn build_affiliate_url(&self, item_url: &str, custom_id: Option<&str>) -> Result<String> {
		if item_url.trim() != item_url {
			return Err(Error::validation("Item URL has surrounding whitespace."));
		}

		if item_url.chars().any(char::is_control) {
			return Err(Error::validation("Item URL contains control characters."));
		}

		Url::parse(item_url)
			.map_err(|e| Error::validation(format!("Item URL `{item_url}` is invalid: {e}.")))?;

		let (base, fragment) = match item_url.find('#') {
			Some(idx) => item_url.split_at(idx),
			None => (item_url, ""),
		};
		let separator = match base.find('?') {
			None => "?",
			Some(_) if base.ends_with(['?', '&']) => "",
			Some(_) => "&",
		};
		let mut out = format!(
			"{base}{separator}mkevt={}&mkcid={}&campid={}&toolid={}",
			Self::EVENT,
			Self::CLICK_CONTEXT,
			self.encoded_campaign_id,
			Self::TOOL_ID,
		);

		if let Some(custom_id) = custom_id {
			out.push_str("&customid=");
			out.push_str(&encode_component(custom_id));
		}

		out.push_str(fragment);

		Ok(out)
	}
}

/// Percent-encodes `value` with [`URI_COMPONENT`].
pub fn encode_component(value: &str) -> String {
	utf8_percent_encode(value, URI_COMPONENT).to_string()
}
