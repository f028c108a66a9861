pub mod action;
pub mod app_state;
pub mod reducer;
pub mod store;
