//! Offline cache controller for the site.
//!
//! One controller instance owns the current cache generation. It is installed
//! (seed list cached), activated (older generations deleted, clients claimed)
//! and then handles every intercepted request with network-first or
//! cache-first depending on the URL.

mod clients;
mod controller;
mod messages;
mod routing;

pub use clients::{ClientHandle, ClientRegistry, WindowAction};
pub use controller::{
  ActivateReport, CacheVersion, InstallReport, OfflineController, SeedFailure, WorkerState,
};
pub use messages::{ClientCommand, WorkerMessage};
pub use routing::{classify, intercepts};
