// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! proxkeep - desktop side of the proxkeep state-sync engine.
//!
//! # Main Components
//!
//! - [`Config`] - TOML configuration and the realtime/fallback-only mode switch
//! - [`channel`] - initiator role of the realtime channel
//! - [`HttpFallback`] - direct delivery when the local store is unusable
//! - [`SyncService`] - request/response surface for the layers above
//! - [`Runtime`] - starts and stops every background task
//!
//! ```rust,ignore
//! let config = Config::load(&default_config_path())?;
//! let runtime = Runtime::start(&config).await?;
//! let id = runtime
//!     .service()
//!     .create_session("u-1", NewSession::new("1.2.3.4", 1080))
//!     .await?;
//! runtime.shutdown().await;
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod fallback;
pub mod runtime;
pub mod service;

pub use config::{default_config_path, Config, Mode};
pub use error::{Error, Result};
pub use fallback::HttpFallback;
pub use runtime::{build_fallback, open_store, Runtime};
pub use service::{SyncService, SyncStatus};
