// =============================================================================
// Exchange access — endpoint descriptors, transport, rate limiting, client
// =============================================================================

pub mod client;
pub mod endpoint;
pub mod http;
pub mod rate_limit;

pub use client::ExchangeClient;
pub use endpoint::{EndpointDescriptor, EndpointRegistry};
pub use http::ReqwestTransport;
pub use rate_limit::RateLimiter;
