pub mod capture;
pub mod day_view;
pub mod error;
pub mod models;
pub mod store;
