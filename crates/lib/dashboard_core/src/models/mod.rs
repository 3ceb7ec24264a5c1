//! Domain models.
//!
//! These are persisted rows and the values passed between the store, the
//! auth core and the HTTP layer. Request/response DTOs live in the API crate.

pub mod oauth;
pub mod role;
pub mod session;
pub mod token;
pub mod user;

pub use oauth::OAuthState;
pub use role::{Role, RoleName, UserRole};
pub use session::Session;
pub use token::{Token, TokenExtraEmail, TokenType};
pub use user::{User, UserState};
