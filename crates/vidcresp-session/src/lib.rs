//! Session-level handling of video firmware responses.
//!
//! [`VidcCore::handle_response`] takes one raw response, validates every
//! packet, and routes it either to the system pipeline (session id zero) or
//! to a [`SessionInstance`]. Session responses update buffer records,
//! subscription parameters and frame info; responses that need the session
//! state machine's agreement are queued and replayed through a
//! [`WorkScheduler`].
//!
//! The driver around this crate plugs in through [`SessionOps`] and
//! [`CoreOps`].

pub mod buffer;
pub mod buffer_cmd;
pub mod config;
pub mod deferred;
mod dispatch;
pub mod engine;
pub mod error;
pub mod frame;
pub mod ops;
mod property;
pub mod scheduler;
pub mod session;
pub mod signal;
pub mod subscription;
pub mod system;

pub use buffer::{BufferAttr, BufferFlags, BufferKind, BufferPools, BufferRecord, InternalKind};
pub use buffer_cmd::route;
pub use config::{Codec, CoreConfig, Domain, DriverPort, SessionConfig};
pub use deferred::{DeferredWorkItem, DrainReport, WorkKind};
pub use engine::{Outcome, VidcCore};
pub use error::{ResponseError, Result};
pub use frame::FrameInfo;
pub use ops::{Admission, CoreOps, NoopOps, SessionOps, SessionSignal};
#[cfg(feature = "async")]
pub use scheduler::{spawn_deferred_runner, TokioScheduler};
pub use scheduler::{ManualScheduler, WorkScheduler};
pub use session::{InstanceState, SessionInstance};
pub use signal::InitSignal;
pub use subscription::SubscriptionParams;
pub use system::SystemReport;
