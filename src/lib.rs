//! Setu Link - host-side control link for a wheeled robot
//!
//! Exchanges fixed-format binary messages with the robot's microcontroller,
//! reduces ranging-sensor sweeps to a nearest-obstacle distance and fuses
//! per-wheel distance increments into a 2D pose.
//!
//! ## Modules
//!
//! - [`protocol`]: message layouts, typed messages, the encode/decode catalog
//! - [`dispatch`]: routing of decoded messages to handlers, outbound sending
//! - [`odometry`]: wheel delta integration
//! - [`scan`]: sweep reduction
//! - [`transport`]: byte transports, SLIP framing, device URIs
//! - [`link`]: reader thread, handshake and pose access tying it together
//! - [`config`]: TOML configuration and logger setup

pub mod config;
pub mod dispatch;
pub mod error;
pub mod link;
pub mod odometry;
pub mod protocol;
pub mod scan;
pub mod transport;

// Re-export commonly used types
pub use config::Config;
pub use dispatch::{DispatchStats, Dispatcher, FeedOutcome, LinkSender, RegistrationPolicy};
pub use error::{Error, HandlerError, Result};
pub use link::Link;
pub use odometry::{OdometryEstimator, OdometryGains, Pose, WheelConfig};
pub use protocol::{Catalog, Message, MessageKind, WireLayout, WireMessage};
pub use scan::{ObstacleMonitor, ScanReducer, ScanSample};
