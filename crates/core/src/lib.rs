pub mod config;
pub mod types;

pub use config::Config;
pub use types::{
    ErrorResponse, SessionCreateRequest, SessionResponse, SessionStep, TokenResponse, UserResponse,
};
