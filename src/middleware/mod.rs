mod admin_auth;
mod auth;
mod partner_auth;

pub use admin_auth::*;
pub use auth::*;
pub use partner_auth::*;
