//! Password-based and RSA hybrid encryption, signatures, hashing and
//! password generation over bytes, text, streams and files.
//!
//! The synchronous functions in [`symmetric`], [`asymmetric`], [`signature`]
//! and [`hash`] do the work; [`Engine`] runs them on tokio's blocking pool
//! and reports progress.
//!
//! ```no_run
//! # async fn demo() -> ecrypt::CryptResult<()> {
//! use ecrypt::{Destination, Engine, Input};
//!
//! let engine = Engine::default();
//! let sealed = engine.encrypt(Input::from("hello"), "password", Destination::Default).await?;
//! # Ok(())
//! # }
//! ```

pub mod asymmetric;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod hash;
pub mod input;
pub mod output;
pub mod password;
pub mod progress;
pub mod signature;
pub mod symmetric;

pub use crate::asymmetric::{KeyPair, KeySize};
pub use crate::config::CryptoConfig;
pub use crate::engine::{Engine, Operation};
pub use crate::error::{CryptError, CryptResult};
pub use crate::hash::HashAlgorithm;
pub use crate::input::Input;
pub use crate::output::{Destination, Outcome};
pub use crate::progress::{CancelToken, Monitor, NoProgress, Progress, ProgressEvent};
pub use rsa::{RsaPrivateKey, RsaPublicKey};
