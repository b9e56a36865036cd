pub mod ai;
pub mod api;
pub mod config;
pub mod error;
pub mod notify;
pub mod reports;
pub mod store;

pub mod util {
    pub mod env;
}
