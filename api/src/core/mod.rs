pub mod app_context;
pub mod app_state;
pub mod coordinator;
pub mod detach;
pub mod lock;
pub mod query_log;
pub mod query_response;
pub mod timing;
