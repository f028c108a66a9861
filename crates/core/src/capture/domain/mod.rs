pub mod camera;
pub mod capture_constraints;
pub mod capture_error;
