//! Backend REST client for sessions and room configuration.

pub mod client;
pub mod http;
pub mod mock;

pub use client::{Availability, AvailabilityRequest, RescheduleRequest, SessionsApi};
pub use http::{HttpApiConfig, HttpSessionsApi};
