pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod state;
pub mod storage;
pub mod store;
pub mod themes;
pub mod users;

#[cfg(test)]
pub(crate) mod test_support;
