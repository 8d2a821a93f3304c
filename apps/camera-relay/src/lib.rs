//! Camera relay: a LINE webhook gateway that answers chat messages with a
//! snapshot from a registered camera server.
//!
//! ```text
//! camera agent --set_webhook/unset_webhook--> relay --> webhook store
//! LINE --events + X-Line-Signature--> relay --GET--> camera server
//!                                     relay --reply--> LINE
//! ```

pub mod camera;
pub mod cli;
pub mod config;
pub mod control;
pub mod error;
pub mod gateway;
pub mod line_api;
pub mod reqid;
pub mod server;
pub mod signature;
pub mod telemetry;
pub mod types;
pub mod webhook_url;

pub use camera::{CameraError, CameraServer, HttpCameraServer};
pub use config::{LogFormat, RelayConfig, StoreBackend};
pub use control::ControlClient;
pub use error::RelayError;
pub use gateway::{CAMERA_UNAVAILABLE_TEXT, Gateway, InboundRequest};
pub use line_api::{HttpLineApi, LineApi, LineApiError};
pub use types::*;
