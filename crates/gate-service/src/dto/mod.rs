//! Data transfer objects for API requests and responses

pub mod mappers;
pub mod requests;
pub mod responses;

pub use requests::{
    ClientInfo, LoginRequest, LogoutRequest, MagicLinkConsumeRequest, MagicLinkRequest,
    RefreshTokenRequest, RegisterRequest,
};
pub use responses::{AuthResponse, CurrentUserResponse, LoginGate, SessionResponse};
