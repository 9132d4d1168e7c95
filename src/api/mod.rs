// =============================================================================
// UI boundary — REST control surface and WebSocket snapshot feed
// =============================================================================

pub mod auth;
pub mod rest;
pub mod ws;
