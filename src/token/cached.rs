//! The single cached access token and its expiry.

// self
use crate::{_prelude::*, token::AccessToken};

/// Access token together with the instant it stops being valid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedToken {
	/// Bearer token value.
	pub token: AccessToken,
	/// Instant after which the upstream rejects the token.
	pub expires_at: OffsetDateTime,
}
impl CachedToken {
	/// Stamps a freshly issued token with `issued_at + lifetime`.
	pub fn issued(token: AccessToken, issued_at: OffsetDateTime, lifetime: Duration) -> Self {
		Self { token, expires_at: issued_at + lifetime }
	}

	/// Returns `true` while more than `margin` of lifetime remains at `now`.
	pub fn is_fresh_at(&self, now: OffsetDateTime, margin: Duration) -> bool {
		self.expires_at - now > margin
	}

	/// Remaining lifetime at `now`, clamped at zero.
	pub fn remaining_at(&self, now: OffsetDateTime) -> Duration {
		let remaining = self.expires_at - now;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}
}
