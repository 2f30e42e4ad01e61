//! Settings model and loading
//!
//! Everything an administrator authors lives here: the per-receiver
//! aggregate ([`ReceiverSettings`]) with its polymorphic translation
//! ([`TranslatorConfig`]) and transport ([`TransportConfig`])
//! configurations, the batching schedule ([`TimingConfig`]), and the
//! TOML loader with environment substitution and aggregated validation.

pub mod loader;
pub mod receiver;
pub mod secret;
pub mod timing;
pub mod translation;
pub mod transport;

pub use loader::{load_settings, CourierSettings, DispatchSettings, LoggingSettings};
pub use receiver::{CustomerStatus, ReceiverSettings};
pub use secret::{secret_string, secret_string_opt, SecretString, SecretValue};
pub use timing::{BatchOperation, EmptyAction, TimingConfig, UsTimeZone, WhenEmpty};
pub use translation::{ResolvedTranslation, TranslatorConfig, HL7_SCHEMA, REDOX_SCHEMA};
pub use transport::{FtpsProtocol, GaenUuidFormat, TransportConfig};

#[cfg(test)]
pub use receiver::receiver_fixture;
