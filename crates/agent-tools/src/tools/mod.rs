//! Built-in tool implementations.

mod gmail;
mod weather;
mod web_search;

pub use gmail::{GetEmail, GmailClient, ListEmails, SendEmail};
pub use weather::Weather;
pub use web_search::WebSearch;
