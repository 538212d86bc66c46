pub mod arg_aliases;
pub mod coerce;
pub mod filter_builder;
pub mod filter_params;
pub mod records;
pub mod redact;
pub mod sort;
pub mod suggest;
pub mod tool_errors;
pub mod update_sanitizer;
