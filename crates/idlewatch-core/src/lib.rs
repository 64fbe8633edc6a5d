pub mod activity;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod context;
pub mod directory;
pub mod dispatcher;
pub mod eligibility;
pub mod error;
pub mod notify;
pub mod run;
pub mod summary;
pub mod transport;
pub mod types;
pub mod vacation;

pub use error::{Result, WatchError};
