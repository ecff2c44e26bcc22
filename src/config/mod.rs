//! Publish inputs, validated requests and tool settings.
//!
//! Inputs arrive loosely typed from flags and the environment; validation turns
//! them into an immutable [`PublishRequest`] before anything touches the network.

mod request;
mod retry;
mod settings;

pub use request::{
    Credential, PublishInputs, PublishRequest, Track, RELEASE_NOTES_LANGUAGE,
    RELEASE_NOTES_RELATIVE_PATH,
};
pub use retry::RetryConfig;
pub use settings::{Settings, DEFAULT_API_BASE_URL};
