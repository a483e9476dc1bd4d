//! Integration tests for the share projection and the HTTP front

mod fetch_failures;
mod http_share;
mod projection_scenarios;
