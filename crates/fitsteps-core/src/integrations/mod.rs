pub mod google_fit;
pub mod oauth;

pub use google_fit::{AggregateResponse, FitClient};
pub use oauth::Credentials;
