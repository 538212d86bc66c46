pub mod logger;
pub mod pilldoc_client;
pub mod search;
pub mod settings;
pub mod token;
pub mod tool_executor;
pub mod validation;
