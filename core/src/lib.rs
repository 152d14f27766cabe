//! Root of the `stampcard-core` library.

// Library code reports through `tracing` and return values; the host
// decides what reaches the terminal.
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod auth;
pub mod card;
pub mod client;
pub mod config;
mod error;
pub mod gesture;
pub mod item;
pub mod notice;
pub mod session;
pub mod store;
pub mod transport;

pub use auth::EnvPassword;
pub use auth::PasswordProvider;
pub use auth::TokenManager;
pub use auth::TokenState;
pub use card::Location;
pub use card::Page;
pub use card::Presenter;
pub use card::RedeemOutcome;
pub use card::ScanOutcome;
pub use card::StampCard;
pub use card::UrlLocation;
pub use client::ApiClient;
pub use client::RequestOptions;
pub use config::CampaignConfig;
pub use config::ConfigError;
pub use error::ApiError;
pub use error::ApiResult;
pub use item::ItemKey;
pub use item::QrTable;
pub use notice::Notice;
pub use session::CollectionState;
pub use session::Session;
pub use session::Visitor;
pub use session::VisitorId;
pub use store::CookieJar;
pub use store::MemoryStore;
pub use store::PersistentStore;
pub use store::StoreKeys;
pub use store::Ttl;
pub use transport::ApiResponse;
pub use transport::Transport;
