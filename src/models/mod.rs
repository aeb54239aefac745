pub mod auth;
pub mod doc;
pub mod error;
pub mod messages;

pub use auth::*;
pub use doc::*;
pub use error::*;
pub use messages::*;
