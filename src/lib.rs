// Library interface for the DNS record aging engine
// Shared by the scavenger binary, the integration tests and the benches

pub mod dns;
pub mod lock_utils;
