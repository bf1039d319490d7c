mod access;

pub use access::{AccessTokens, AuthClaims, TokenClaims};
