//! Asynchronous front end.
//!
//! Every long-running operation runs on tokio's blocking pool and hands back
//! an [`Operation`]: a future resolving to the result, a stream of
//! [`ProgressEvent`]s and a [`CancelToken`].

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rsa::{RsaPrivateKey, RsaPublicKey};
use tokio::sync::mpsc::{self, Receiver};
use tokio::task::JoinHandle;
use tracing::warn;
use zeroize::Zeroizing;

use crate::asymmetric::{self, KeyPair, KeySize};
use crate::config::CryptoConfig;
use crate::error::{CryptError, CryptResult};
use crate::hash::{self, HashAlgorithm};
use crate::input::Input;
use crate::output::{Destination, Outcome};
use crate::password::random_org::{
    HttpTransport, RandomOrgTransport, generate_random_org_password,
};
use crate::password::generate_secure_random_password;
use crate::progress::{CancelToken, Monitor, ProgressEvent};
use crate::{signature, symmetric};

/// Progress events buffered for a slow reader; later events are dropped.
pub const PROGRESS_CAPACITY: usize = 64;

/// A running operation.
///
/// Await it (or call [`Operation::result`]) for the outcome. Dropping it does
/// not stop the work; use [`Operation::cancel`] for that.
pub struct Operation<T> {
    handle: JoinHandle<CryptResult<T>>,
    progress: Receiver<ProgressEvent>,
    cancel: CancelToken,
}

impl<T: Send + 'static> Operation<T> {
    fn blocking<F>(work: F) -> Self
    where
        F: FnOnce(&mut Monitor) -> CryptResult<T> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(PROGRESS_CAPACITY);
        let cancel = CancelToken::new();
        let mut monitor = Monitor::new(tx, cancel.clone());
        let handle = tokio::task::spawn_blocking(move || work(&mut monitor));
        Self {
            handle,
            progress: rx,
            cancel,
        }
    }

    fn spawn<F>(work: F) -> Self
    where
        F: Future<Output = CryptResult<T>> + Send + 'static,
    {
        // async work reports no progress; the sender is dropped right away
        let (_, rx) = mpsc::channel(1);
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                result = work => result,
                _ = token.cancelled() => Err(CryptError::Cancelled),
            }
        });
        Self {
            handle,
            progress: rx,
            cancel,
        }
    }
}

impl<T> Operation<T> {
    /// Receiver of progress events; closes when the operation ends.
    ///
    /// Holds at most [`PROGRESS_CAPACITY`] undelivered events.
    pub fn progress(&mut self) -> &mut Receiver<ProgressEvent> {
        &mut self.progress
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Requests cancellation. Blocking work stops at its next chunk boundary,
    /// network work is dropped at its next await; either way the operation
    /// resolves to [`CryptError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn result(self) -> CryptResult<T> {
        self.await
    }
}

impl<T> Future for Operation<T> {
    type Output = CryptResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(|joined| match joined {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "operation task failed");
                Err(CryptError::TaskFailed(e.to_string()))
            }
        })
    }
}

/// Entry point for callers running inside a tokio runtime.
#[derive(Clone)]
pub struct Engine {
    config: Arc<CryptoConfig>,
    random_org: Arc<dyn RandomOrgTransport>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(CryptoConfig::default())
    }
}

impl Engine {
    pub fn new(config: CryptoConfig) -> Self {
        Self::with_transport(config, Arc::new(HttpTransport::default()))
    }

    pub fn with_transport(config: CryptoConfig, transport: Arc<dyn RandomOrgTransport>) -> Self {
        Self {
            config: Arc::new(config),
            random_org: transport,
        }
    }

    pub fn config(&self) -> &CryptoConfig {
        &self.config
    }

    pub fn encrypt(
        &self,
        input: Input,
        password: impl Into<String>,
        destination: Destination,
    ) -> Operation<Outcome> {
        let config = self.config.clone();
        let password = Zeroizing::new(password.into());
        Operation::blocking(move |monitor| {
            symmetric::encrypt(&config, input, &password, destination, monitor)
        })
    }

    /// Encrypts under a generated password, returned with the outcome.
    pub fn encrypt_with_generated_password(
        &self,
        input: Input,
        destination: Destination,
    ) -> Operation<(Outcome, Zeroizing<String>)> {
        let config = self.config.clone();
        Operation::blocking(move |monitor| {
            symmetric::encrypt_with_generated_password(&config, input, destination, monitor)
        })
    }

    pub fn decrypt(
        &self,
        input: Input,
        password: impl Into<String>,
        destination: Destination,
    ) -> Operation<Outcome> {
        let config = self.config.clone();
        let password = Zeroizing::new(password.into());
        Operation::blocking(move |monitor| {
            symmetric::decrypt(&config, input, &password, destination, monitor)
        })
    }

    pub fn encrypt_asymmetric(
        &self,
        input: Input,
        public_key: RsaPublicKey,
        destination: Destination,
    ) -> Operation<Outcome> {
        let config = self.config.clone();
        Operation::blocking(move |monitor| {
            asymmetric::encrypt(&config, input, &public_key, destination, monitor)
        })
    }

    pub fn decrypt_asymmetric(
        &self,
        input: Input,
        private_key: RsaPrivateKey,
        destination: Destination,
    ) -> Operation<Outcome> {
        let config = self.config.clone();
        Operation::blocking(move |monitor| {
            asymmetric::decrypt(&config, input, &private_key, destination, monitor)
        })
    }

    pub fn generate_key_pair(&self, size: KeySize) -> Operation<KeyPair> {
        Operation::blocking(move |_| KeyPair::generate(size))
    }

    pub fn sign(
        &self,
        input: Input,
        private_key: RsaPrivateKey,
        signature_file: impl Into<PathBuf>,
    ) -> Operation<PathBuf> {
        let config = self.config.clone();
        let output = signature_file.into();
        Operation::blocking(move |monitor| {
            signature::sign(&config, input, &private_key, &output, monitor)
        })
    }

    pub fn verify(
        &self,
        input: Input,
        public_key: RsaPublicKey,
        signature_file: impl Into<PathBuf>,
    ) -> Operation<bool> {
        let config = self.config.clone();
        let signature_file = signature_file.into();
        Operation::blocking(move |monitor| {
            signature::verify(&config, input, &public_key, &signature_file, monitor)
        })
    }

    pub fn hash(
        &self,
        input: Input,
        algorithm: HashAlgorithm,
        destination: Destination,
    ) -> Operation<Outcome> {
        let config = self.config.clone();
        Operation::blocking(move |monitor| {
            hash::calculate(&config, input, algorithm, destination, monitor)
        })
    }

    /// Local generation is quick and runs on the caller's thread.
    pub fn generate_password(
        &self,
        length: usize,
        symbols: &[char],
    ) -> CryptResult<Zeroizing<String>> {
        generate_secure_random_password(length, symbols)
    }

    pub fn generate_random_org_password(
        &self,
        length: usize,
        api_key: impl Into<String>,
    ) -> Operation<Zeroizing<String>> {
        let transport = self.random_org.clone();
        let api_key = Zeroizing::new(api_key.into());
        Operation::spawn(async move {
            generate_random_org_password(transport.as_ref(), length, &api_key).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asymmetric::tests::test_keys;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn engine(dir: &std::path::Path) -> Engine {
        Engine::new(CryptoConfig::with_data_dir(dir.join("data")))
    }

    #[tokio::test]
    async fn encrypt_then_decrypt_text() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path());

        let ct = engine
            .encrypt(Input::from("hello"), "pw", Destination::Default)
            .await
            .unwrap();
        let Outcome::Text(b64) = ct else {
            panic!("expected text");
        };
        let pt = engine
            .decrypt(Input::Text(b64), "pw", Destination::Default)
            .await
            .unwrap();
        assert_eq!(pt.as_text(), Some("hello"));
    }

    #[tokio::test]
    async fn progress_events_arrive_in_order() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path());
        let data = vec![1u8; 50_000];

        let mut op = engine.hash(
            Input::sized_stream(Cursor::new(data), 50_000),
            HashAlgorithm::Sha256,
            Destination::Text,
        );

        let mut seen = Vec::new();
        while let Some(ev) = op.progress().recv().await {
            seen.push(ev);
        }
        op.await.unwrap();

        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0].processed < w[1].processed));
        assert_eq!(seen.last().unwrap().processed, 50_000);
    }

    #[tokio::test]
    async fn cancelled_operation_cleans_up() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path());
        let target = dir.path().join("out.ecrypt");

        // endless input; only cancellation can end this
        let op = engine.encrypt(
            Input::stream(std::io::repeat(0u8)),
            "pw",
            Destination::File(target.clone()),
        );
        op.cancel();

        assert!(matches!(op.await, Err(CryptError::Cancelled)));
        assert!(!target.exists());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn undrained_progress_stays_bounded() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path());
        let data = vec![3u8; 4 * 1024 * 1024];

        // 512 chunks, nobody reading progress
        let mut op = engine.hash(
            Input::stream(Cursor::new(data)),
            HashAlgorithm::Sha256,
            Destination::Text,
        );
        (&mut op).await.unwrap();

        let queued = op.progress().len();
        assert!(queued <= PROGRESS_CAPACITY, "{queued} events queued");
        assert_eq!(op.progress().recv().await.unwrap().processed, 8192);
    }

    #[tokio::test]
    async fn sign_and_verify_through_engine() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path());
        let keys = test_keys();
        let sig = dir.path().join("msg.sig");

        engine
            .sign(Input::from("message"), keys.private_key().clone(), &sig)
            .await
            .unwrap();
        let valid = engine
            .verify(Input::from("message"), keys.public_key().clone(), &sig)
            .await
            .unwrap();
        assert!(valid);
    }

    #[tokio::test]
    async fn failures_come_back_through_the_future() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path());

        let result = engine
            .decrypt(Input::file(dir.path().join("missing")), "pw", Destination::Default)
            .await;
        assert!(matches!(result, Err(CryptError::NoSuchFile(_))));
    }

    #[test]
    fn local_password_is_synchronous() {
        let engine = Engine::new(CryptoConfig::with_data_dir("/unused"));
        assert!(matches!(
            engine.generate_password(0, &['a']),
            Err(CryptError::InvalidParameter(_))
        ));
        assert_eq!(engine.generate_password(12, &['a']).unwrap().as_str(), "aaaaaaaaaaaa");
    }
}
