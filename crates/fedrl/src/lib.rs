//! Client library for the federated reinforcement-learning dashboard.
//!
//! Re-exports the session manager, token helpers and Q-table decoder from
//! `fedrl-core`, plus the async [`client::ApiClient`].
//!
//! ```no_run
//! # async fn demo() -> fedrl::Result<()> {
//! let client = fedrl::client::ApiClient::open(fedrl::ClientConfig::load(None)?)?;
//! client.login("admin@example.com", "secret").await?;
//! for table in client.global_qtables().await? {
//!     let decoded = fedrl::decode_value(&table.q_table);
//!     println!("{}: {} states", table.id, decoded.states.len());
//! }
//! client.dispose().await
//! # }
//! ```

pub use fedrl_client as client;
pub use fedrl_core::*;
