//! Playback resolution and recovery sessions.
//!
//! This crate turns a remote media item (an archive video, a PGC episode or a
//! live room) into a playable stream reference and keeps that reference alive
//! across CDN failures, link expiry and decoder incompatibility.
//!
//! - [`session::PlaybackSession`]: DASH / direct-URL selection with codec and
//!   quality fallback, CDN blacklisting and link refresh
//! - [`session::LiveSession`]: CDN rotation and refresh for live rooms
//! - [`registry::SessionRegistry`]: keyed store of live sessions
//! - [`heartbeat::HeartbeatReporter`]: throttled progress reporting

pub mod catalog;
pub mod cdn;
pub mod clock;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod expiry;
pub mod heartbeat;
pub mod keys;
pub mod logging;
pub mod manifest;
pub mod preferences;
pub mod registry;
pub mod selector;
pub mod session;

pub use catalog::{CatalogClient, CatalogError, DescriptorRequest};
pub use cdn::CdnHealthTracker;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SessionConfig;
pub use descriptor::{DashDescriptor, DashMedia, DirectUrl, LivePlayUrl, StreamDescriptor};
pub use error::{PlaybackError, Result};
pub use heartbeat::{HeartbeatReporter, PlayState};
pub use keys::{ItemRef, SessionKey};
pub use manifest::{ManifestError, ManifestRequest, ManifestWriter};
pub use preferences::{
    CdnService, PlayMode, PlaybackPreferences, PreferenceStore, PreferenceUpdate, VideoCodec,
};
pub use registry::{RegisteredSession, SessionRegistry};
pub use session::{
    FailureContext, LiveSession, PlayableStream, PlaybackSession, RecoveryBudget, SessionContext,
    Snapshot,
};
