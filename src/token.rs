//! Access-token lifecycle: redacted secrets, the cached token, and the single-flight manager.

pub mod cached;
pub mod clock;
pub mod manager;
pub mod secret;

pub use cached::*;
pub use clock::*;
pub use manager::*;
pub use secret::*;
