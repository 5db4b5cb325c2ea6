//! ABOUTME: Circuit breaker wrapping each outbound provider call
//! ABOUTME: Opens on repeated failure, half-opens to probe, closes on a successful probe

pub mod circuit_breaker;

pub use circuit_breaker::{
    BreakerConfig, BreakerState, CircuitBreaker, CircuitBreakerManager, CircuitBreakerStats,
};
