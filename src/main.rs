use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
mod auth;
use ecrypt::asymmetric::{
    private_key_from_der, private_key_to_der, public_key_from_base64, public_key_to_base64,
};
use ecrypt::password::{DEFAULT_PASSWORD_LENGTH, standard_symbols};
use ecrypt::{
    CancelToken, CryptoConfig, Destination, Engine, HashAlgorithm, Input, KeySize, Operation,
    Outcome, RsaPrivateKey, RsaPublicKey,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Args)]
struct SourceArgs {
    /// File to process
    #[arg(value_name = "FILE", required_unless_present = "text", conflicts_with = "text")]
    file: Option<PathBuf>,

    /// Process this text instead of a file
    #[arg(long, value_name = "TEXT")]
    text: Option<String>,
}

impl SourceArgs {
    fn input(&self) -> Input {
        match (&self.file, &self.text) {
            (Some(path), _) => Input::file(path),
            (None, Some(text)) => Input::from(text.as_str()),
            (None, None) => Input::Bytes(Vec::new()),
        }
    }
}

#[derive(Debug, Args)]
struct IoArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Write the result to PATH (must not exist)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
}

impl IoArgs {
    fn destination(&self) -> Destination {
        match &self.output {
            Some(path) => Destination::File(path.clone()),
            None => Destination::Default,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "ecrypt")]
#[command(
    version,
    about = "Password and RSA encryption, signatures, hashes and passwords for files and text."
)]
struct Cli {
    /// Directory for default output files
    #[arg(long, global = true, value_name = "PATH", env = "ECRYPT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log progress and decisions to stderr
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Encrypts with a password; files are replaced by FILE.ecrypt
    #[command(arg_required_else_help = true)]
    Encrypt {
        #[command(flatten)]
        io: IoArgs,
    },

    /// Decrypts a password-encrypted file or base64 text
    #[command(arg_required_else_help = true)]
    Decrypt {
        #[command(flatten)]
        io: IoArgs,
    },

    /// Generates an RSA key pair; the private key is stored password-encrypted
    Keygen {
        /// Modulus size in bits (2048 or 4096)
        #[arg(long, default_value = "4096")]
        size: KeySize,

        /// Directory for the key files (default: data dir)
        #[arg(long, value_name = "PATH")]
        out_dir: Option<PathBuf>,

        /// Base name of the key files
        #[arg(long, default_value = "id_rsa")]
        name: String,
    },

    /// Encrypts for the holder of a private key
    #[command(arg_required_else_help = true)]
    RsaEncrypt {
        #[command(flatten)]
        io: IoArgs,

        /// Public key file written by `keygen`
        #[arg(long, value_name = "PATH")]
        public_key: PathBuf,
    },

    /// Decrypts with a private key written by `keygen`
    #[command(arg_required_else_help = true)]
    RsaDecrypt {
        #[command(flatten)]
        io: IoArgs,

        /// Private key file written by `keygen`
        #[arg(long, value_name = "PATH")]
        private_key: PathBuf,
    },

    /// Signs with SHA512withRSA
    #[command(arg_required_else_help = true)]
    Sign {
        #[command(flatten)]
        source: SourceArgs,

        #[arg(long, value_name = "PATH")]
        private_key: PathBuf,

        /// Where to write the signature (must not exist)
        #[arg(long, value_name = "PATH")]
        signature: PathBuf,
    },

    /// Verifies a SHA512withRSA signature
    #[command(arg_required_else_help = true)]
    Verify {
        #[command(flatten)]
        source: SourceArgs,

        #[arg(long, value_name = "PATH")]
        public_key: PathBuf,

        #[arg(long, value_name = "PATH")]
        signature: PathBuf,
    },

    /// Prints the digest of a file or text as uppercase hex
    #[command(arg_required_else_help = true)]
    Hash {
        #[command(flatten)]
        io: IoArgs,

        /// MD5, SHA-1, SHA-224, SHA-256, SHA-384 or SHA-512
        #[arg(short, long, default_value = "SHA-512")]
        algorithm: HashAlgorithm,
    },

    /// Generates a random password locally
    Password {
        #[arg(short, long, default_value_t = DEFAULT_PASSWORD_LENGTH)]
        length: usize,

        /// Characters to draw from (default: A-Z, a-z, 0-9)
        #[arg(long)]
        symbols: Option<String>,
    },

    /// Generates a hex password from random.org
    RandomOrg {
        #[arg(short, long, default_value_t = DEFAULT_PASSWORD_LENGTH)]
        length: usize,

        #[arg(long, env = "RANDOM_ORG_API_KEY", hide_env_values = true)]
        api_key: String,
    },
}

/// Token of the operation currently running, cancelled on Ctrl-C.
#[derive(Clone, Default)]
struct Active(Arc<Mutex<Option<CancelToken>>>);

impl Active {
    fn install(&self) -> Result<()> {
        let slot = self.0.clone();
        ctrlc::set_handler(move || match slot.lock().ok().and_then(|s| s.clone()) {
            Some(token) => token.cancel(),
            None => std::process::exit(130),
        })
        .context("failed to install Ctrl-C handler")
    }

    async fn run<T>(&self, mut op: Operation<T>) -> Result<T> {
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(op.cancel_token());
        }
        while let Some(ev) = op.progress().recv().await {
            debug!(processed = ev.processed, total = ?ev.total, "progress");
        }
        let result = op.await;
        if let Ok(mut slot) = self.0.lock() {
            *slot = None;
        }
        Ok(result?)
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_outcome(outcome: Outcome) -> Result<()> {
    match outcome {
        Outcome::Text(text) => println!("{text}"),
        Outcome::Bytes(bytes) => std::io::stdout().write_all(&bytes)?,
        Outcome::File(path) => println!("written to {}", path.display()),
    }
    Ok(())
}

fn load_public_key(path: &Path) -> Result<RsaPublicKey> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read public key {}", path.display()))?;
    Ok(public_key_from_base64(&text)?)
}

async fn load_private_key(engine: &Engine, active: &Active, path: &Path) -> Result<RsaPrivateKey> {
    let password = auth::read_password()?;
    let der = active
        .run(engine.decrypt(Input::file(path), password.as_str(), Destination::Bytes))
        .await?
        .into_bytes()
        .context("private key did not decrypt to bytes")?;
    Ok(private_key_from_der(&der)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let config = match args.data_dir {
        Some(dir) => CryptoConfig::with_data_dir(dir),
        None => CryptoConfig::default(),
    };
    let engine = Engine::new(config);
    let active = Active::default();
    active.install()?;

    match args.command {
        Commands::Encrypt { io } => {
            let password = auth::read_password()?;
            let outcome = active
                .run(engine.encrypt(io.source.input(), password.as_str(), io.destination()))
                .await?;
            print_outcome(outcome)?;
        }
        Commands::Decrypt { io } => {
            let password = auth::read_password()?;
            let outcome = active
                .run(engine.decrypt(io.source.input(), password.as_str(), io.destination()))
                .await?;
            print_outcome(outcome)?;
        }
        Commands::Keygen {
            size,
            out_dir,
            name,
        } => {
            let dir = out_dir.unwrap_or_else(|| engine.config().data_dir().to_path_buf());
            let public_path = dir.join(format!("{name}.pub"));
            let private_path = dir.join(format!("{name}.key.ecrypt"));
            if public_path.exists() || private_path.exists() {
                bail!("key files for '{name}' already exist in {}", dir.display());
            }

            let password = auth::read_new_password_with_confirmation()?;
            let keys = active.run(engine.generate_key_pair(size)).await?;

            let der = private_key_to_der(keys.private_key())?;
            active
                .run(engine.encrypt(
                    Input::Bytes(der.to_vec()),
                    password.as_str(),
                    Destination::File(private_path.clone()),
                ))
                .await?;
            std::fs::write(&public_path, public_key_to_base64(keys.public_key())?)
                .with_context(|| format!("cannot write {}", public_path.display()))?;

            println!("public key:  {}", public_path.display());
            println!("private key: {}", private_path.display());
        }
        Commands::RsaEncrypt { io, public_key } => {
            let key = load_public_key(&public_key)?;
            let outcome = active
                .run(engine.encrypt_asymmetric(io.source.input(), key, io.destination()))
                .await?;
            print_outcome(outcome)?;
        }
        Commands::RsaDecrypt { io, private_key } => {
            let key = load_private_key(&engine, &active, &private_key).await?;
            let outcome = active
                .run(engine.decrypt_asymmetric(io.source.input(), key, io.destination()))
                .await?;
            print_outcome(outcome)?;
        }
        Commands::Sign {
            source,
            private_key,
            signature,
        } => {
            let key = load_private_key(&engine, &active, &private_key).await?;
            let path = active.run(engine.sign(source.input(), key, signature)).await?;
            println!("signature written to {}", path.display());
        }
        Commands::Verify {
            source,
            public_key,
            signature,
        } => {
            let key = load_public_key(&public_key)?;
            if !active.run(engine.verify(source.input(), key, signature)).await? {
                bail!("signature does not match");
            }
            println!("signature verified");
        }
        Commands::Hash { io, algorithm } => {
            let destination = match io.output {
                Some(path) => Destination::File(path),
                None => Destination::Text,
            };
            let outcome = active
                .run(engine.hash(io.source.input(), algorithm, destination))
                .await?;
            print_outcome(outcome)?;
        }
        Commands::Password { length, symbols } => {
            let symbols: Vec<char> = match symbols {
                Some(s) => s.chars().collect(),
                None => standard_symbols(),
            };
            let password = engine.generate_password(length, &symbols)?;
            println!("{}", password.as_str());
        }
        Commands::RandomOrg { length, api_key } => {
            let password = active
                .run(engine.generate_random_org_password(length, api_key))
                .await?;
            println!("{}", password.as_str());
        }
    }

    Ok(())
}
