pub mod slot_validator;
