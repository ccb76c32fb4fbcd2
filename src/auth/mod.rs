pub mod claims;
pub mod extractors;
pub mod jwt;
pub mod password;

pub use extractors::{AuthUser, CurrentUser, Moderator};
pub use jwt::JwtKeys;
