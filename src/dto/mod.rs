pub mod attempt_dto;
pub mod test_dto;
