// Client library for the PrepDesk backend: durable session state, the
// authenticated request pipeline, client-side navigation, and typed
// per-resource API modules.

pub mod api;
pub mod config;
pub mod http;
pub mod router;
pub mod session;
pub mod storage;
