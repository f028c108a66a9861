pub mod capture;
pub mod detection;
pub mod overlay;
pub mod shared;
pub mod state;
