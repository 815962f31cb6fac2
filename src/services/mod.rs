pub mod attempt_service;
pub mod report_service;
pub mod retention_service;
pub mod runner;
pub mod test_service;
pub mod validation;
