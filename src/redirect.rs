//! Redirect path: decode a caller-supplied URL and rewrite it into an affiliate link.
//!
//! This path never needs an access token.

// crates.io
use percent_encoding::percent_decode_str;
// self
use crate::{_prelude::*, affiliate::AffiliateParams};

/// Percent-decodes `raw_url` and returns the affiliate URL to redirect to.
///
/// Fails with [`Error::Validation`] when the input is missing, contains a malformed `%` escape,
/// or decodes to invalid UTF-8.
pub fn resolve_redirect(affiliate: &AffiliateParams, raw_url: Option<&str>) -> Result<String> {
	let raw_url = raw_url
		.filter(|value| !value.trim().is_empty())
		.ok_or_else(|| Error::validation("Missing url parameter."))?;
	let decoded = decode_component(raw_url)?;

	affiliate.build_affiliate_url(&decoded, None)
}

/// Strict inverse of `encodeURIComponent`: every `%` must start a two-digit hex escape.
pub fn decode_component(value: &str) -> Result<String> {
	let bytes = value.as_bytes();
	let mut idx = 0;

	while let Some(offset) = bytes[idx..].iter().position(|b| *b == b'%') {
		let start = idx + offset;
		let escape = bytes.get(start + 1..start + 3);

		if !escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
			return Err(Error::validation(format!("Malformed percent escape at byte {start}.")));
		}

		idx = start + 3;
	}

	percent_decode_str(value)
		.decode_utf8()
		.map(|decoded| decoded.into_owned())
		.map_err(|_| Error::validation("Decoded url is not valid UTF-8."))
}
