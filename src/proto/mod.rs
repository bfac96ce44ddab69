//! Wire message definitions for the provisioning handshake.

mod provisioning;

pub use provisioning::ProvisionMessage;
