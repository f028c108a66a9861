pub mod detection_orchestrator;
pub mod domain;
pub mod infrastructure;
