//! Browser automation for page analyzers.
//!
//! Provides the capability traits analyzers run against, a Chromium
//! implementation backed by chromiumoxide, and a bounded pool of reusable
//! browser instances.

pub mod chromium;
pub mod error;
pub mod pool;
pub mod session;

pub use chromium::{ChromiumBrowser, ChromiumFactory, ChromiumPage};
pub use error::{BrowserError, PoolError, Result};
pub use pool::{BrowserPool, PoolConfig, PooledBrowser};
pub use session::{
    BrowserFactory, BrowserInstance, NavigationResponse, NetworkRequest, PageSession, WaitPolicy,
};
