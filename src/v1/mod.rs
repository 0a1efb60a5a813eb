pub mod health;

pub use health::{HealthResponse, ReadyResponse, health_check, readiness_check};
