pub mod admin_route;
pub mod health_route;
pub mod query;
pub mod raw_query_route;
pub mod search;
