pub mod app_error;
pub mod jwt;
pub mod retry;
pub mod use_cases;
