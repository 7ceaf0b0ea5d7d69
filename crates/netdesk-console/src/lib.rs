//! Back-office console for the netdesk ISP platform
//!
//! The crate is the client side of the back office: an authenticated REST
//! client, a Socket.IO connection per page, per-page stores with
//! client-side filtering and pagination, chart and table view models, and
//! the realtime widgets for the network monitor and the WhatsApp bot.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod api_client;
pub mod chart;
pub mod endpoints;
pub mod filter;
pub mod forms;
pub mod generation;
pub mod monitor;
pub mod pages;
pub mod pagination;
pub mod realtime;
pub mod render;
pub mod session;
pub mod socket;
pub mod store;
pub mod templates;
pub mod whatsapp;

pub use api_client::{ApiClient, LogNavigator, Navigator, RecordingNavigator};
pub use filter::{FilterInput, FilterState};
pub use pages::{LogNotifier, Notifier, PageContext, RecordingNotifier};
pub use session::{FileSession, MemorySession, SessionStore};
pub use socket::{Namespace, SocketEvent, SocketHandle};
pub use store::Store;
