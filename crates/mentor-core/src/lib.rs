pub mod config;
pub mod error;
pub mod time;
pub mod types;

pub use config::MentorConfig;
pub use error::{MentorError, Result};
pub use types::*;
