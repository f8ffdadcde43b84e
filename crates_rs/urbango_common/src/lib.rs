pub mod cors;
pub mod env_policy;
pub mod request_id;
