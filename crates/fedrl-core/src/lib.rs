//! fedrl-core: models, Q-table decoding and session storage for fedrl.
//!
//! Nothing in this crate touches the network. The session manager owns the
//! token pair and the identity derived from it; `fedrl-client` drives it.

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod qtable;
pub mod session;
pub mod storage;
pub mod token;

pub use config::{ClientConfig, LogConfig};
pub use error::{FedrlError, Result};
pub use models::{GlobalQTable, TokenPair, UserData, UserSummary};
pub use qtable::{decode, decode_str, decode_value, DecodedTable, WireQTable};
pub use session::SessionManager;
pub use storage::CookieJar;
pub use token::is_access_token_expired;
