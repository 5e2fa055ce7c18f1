// API modules: one per backend resource. Each function translates a typed
// request into exactly one call through the `ApiClient` — path assembly and
// nothing else.

pub mod auth;
pub mod knowledge;
pub mod position;
pub mod question;
