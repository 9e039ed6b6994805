//! Synapse client core
//!
//! Session and conversation control for a document question/answer client:
//!
//! - `credentials` - persistent slot for the bearer credential
//! - `backend` - typed calls to `/token`, `/upload` and `/ask`
//! - `session` - the controller that owns auth state, document scope and the
//!   conversation log
//!
//! # Usage
//!
//! ```rust,no_run
//! use synapse::config::ClientConfig;
//! use synapse::session::SessionController;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ClientConfig::from_env()?;
//! let session = SessionController::from_config(&config)?;
//! if session.check_persisted_session().await?.requires_login() {
//!     session.login("me@example.com", "hunter2").await?;
//! }
//! session.send_message("What is this document about?").await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod credentials;
pub mod error;
pub mod session;
pub mod types;
