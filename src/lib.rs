//! Offline cache controller and list utilities for the St. Louis Demo. J.H.S.
//! website.

pub mod app;
pub mod cache;
pub mod config;
pub mod event;
pub mod list;
pub mod logging;
pub mod net;
pub mod ui;
pub mod worker;
