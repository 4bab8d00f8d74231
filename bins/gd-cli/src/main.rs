//! goodelivery: offline tools for cold-stored bitcoin.
//!
//! Creates and reads BIP39 mnemonics, converts keys to and from BIP38,
//! carries spendable outputs as portxo records and signs sweeps of them.
//! Nothing here touches the network; signed transactions are written out
//! for export.

use std::fmt::Write as _;
use std::io::{BufRead, Write as _};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use zeroize::Zeroizing;

use gd_core::address::{Address, Network};
use gd_core::constants::{DEFAULT_ADDRESS_COUNT, DEFAULT_FEE_RATE, DEFAULT_MNEMONIC_BITS};
use gd_core::crypto::PrivateKey;
use gd_core::types::Transaction;
use gd_wallet::portxo;
use gd_wallet::{
    DeriveConfig, ErrorKind, KeySource, Mnemonic, PathPolicy, SpendConfig, TransactionSigner, WalletError,
};

/// Offline bitcoin tools for low-velocity, high-value storage.
#[derive(Parser, Debug)]
#[command(name = "goodelivery")]
#[command(version, about = "Offline bitcoin tools for cold storage.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    opts: Options,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Create a BIP39 mnemonic phrase.
    New,
    /// Parse a mnemonic and list its addresses.
    Adr,
    /// Parse a mnemonic and list its addresses with WIF keys.
    Key,
    /// Encrypt a private key into BIP38 form.
    Enc,
    /// Decrypt a BIP38 key into WIF form.
    Dec,
    /// Extract portxo records from a raw transaction.
    Extract,
    /// Insert a private key into the portxo records it controls.
    Insert,
    /// Sign a transaction sweeping keyed portxo records to a destination.
    Move,
}

#[derive(Args, Debug)]
struct Options {
    /// Input file, replacing keyboard entry.
    #[arg(long = "in", global = true, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output file (mode 0600) instead of stdout.
    #[arg(long, global = true, value_name = "FILE")]
    out: Option<PathBuf>,

    /// WIF private key.
    #[arg(long, global = true)]
    wif: Option<String>,

    /// File containing a WIF private key.
    #[arg(long, global = true, value_name = "FILE")]
    wiffile: Option<PathBuf>,

    /// BIP38 encrypted private key.
    #[arg(long, global = true)]
    b38: Option<String>,

    /// File containing a mnemonic; the key at index `-n` is used.
    #[arg(long, global = true, value_name = "FILE")]
    mnefile: Option<PathBuf>,

    /// Destination address.
    #[arg(long, global = true)]
    dest: Option<String>,

    /// Only extract outputs paying to this address. Repeatable.
    #[arg(long, global = true, value_name = "ADDRESS")]
    owner: Vec<String>,

    /// Passphrase given on the command line (unsafe!).
    #[arg(long, global = true)]
    pass: Option<String>,

    /// Echo text entry in the clear.
    #[arg(long, global = true)]
    echo: bool,

    /// Bit length of a new mnemonic.
    #[arg(short = 'b', global = true, default_value_t = DEFAULT_MNEMONIC_BITS)]
    bits: usize,

    /// Address count for adr/key, output index for extract, key index for --mnefile.
    #[arg(short = 'n', global = true)]
    number: Option<u32>,

    /// Fee in satoshis per byte.
    #[arg(long, global = true, default_value_t = DEFAULT_FEE_RATE)]
    fee: u64,

    /// Use BIP44 derivation (default m/0'/0'/k).
    #[arg(long, global = true)]
    b44: bool,

    /// Use testnet instead of mainnet.
    #[arg(long, global = true)]
    testnet: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let session = Session::new(cli.opts);
    debug!(command = ?cli.command, network = %session.network, "cli: running");
    match cli.command {
        Commands::New => session.new_mnemonic(),
        Commands::Adr => session.decode_mnemonic(false),
        Commands::Key => session.decode_mnemonic(true),
        Commands::Enc => session.encrypt_key(),
        Commands::Dec => session.decrypt_key(),
        Commands::Extract => session.extract(),
        Commands::Insert => session.insert(),
        Commands::Move => session.sweep(),
    }
}

/// Process exit status for a failed command.
fn exit_code(err: &anyhow::Error) -> u8 {
    let kind = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<WalletError>())
        .map(WalletError::kind);
    match kind {
        Some(ErrorKind::Validation) => 2,
        Some(ErrorKind::Crypto) => 3,
        Some(ErrorKind::Resource) => 4,
        Some(ErrorKind::Fatal) | None => 1,
    }
}

/// One invocation: parsed options plus the network they select.
struct Session {
    opts: Options,
    network: Network,
}

impl Session {
    fn new(opts: Options) -> Self {
        let network = if opts.testnet {
            Network::Testnet
        } else {
            Network::Mainnet
        };
        Self { opts, network }
    }

    fn policy(&self) -> PathPolicy {
        if self.opts.b44 {
            PathPolicy::Bip44
        } else {
            PathPolicy::Default
        }
    }

    // ------------------------------------------------------------------
    // Input and output
    // ------------------------------------------------------------------

    /// Read a line from the terminal, hidden unless `--echo` is set.
    fn enter(&self, label: &str) -> Result<Zeroizing<String>> {
        if self.opts.echo {
            eprint!("{label}: ");
            std::io::stderr().flush()?;
            let mut line = Zeroizing::new(String::new());
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("failed to read input")?;
            let len = line.trim_end_matches(['\r', '\n']).len();
            line.truncate(len);
            return Ok(line);
        }
        let line = rpassword::prompt_password(format!("{label}: ")).context("failed to read input")?;
        Ok(Zeroizing::new(line))
    }

    /// The `--pass` value if given, otherwise a prompt.
    fn passphrase(&self, label: &str) -> Result<Zeroizing<String>> {
        match &self.opts.pass {
            Some(pass) => Ok(Zeroizing::new(pass.clone())),
            None => self.enter(label),
        }
    }

    /// Like [`Session::passphrase`] but asks twice when prompting.
    fn new_passphrase(&self, label: &str) -> Result<Zeroizing<String>> {
        if self.opts.pass.is_some() {
            return self.passphrase(label);
        }
        let first = self.enter(label)?;
        let second = self.enter("confirm passphrase")?;
        if first != second {
            bail!("passphrases do not match");
        }
        Ok(first)
    }

    /// Contents of `--in`, trimmed.
    fn input_text(&self) -> Result<Zeroizing<String>> {
        let path = self.opts.input.as_deref().context("--in FILE is required")?;
        read_trimmed(path)
    }

    /// Write `text` plus a newline to `--out` or stdout.
    fn output(&self, text: &str) -> Result<()> {
        let mut contents = Zeroizing::new(String::with_capacity(text.len() + 1));
        contents.push_str(text.trim_end());
        contents.push('\n');
        match &self.opts.out {
            Some(path) => write_private(path, &contents),
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(contents.as_bytes())?;
                stdout.flush()?;
                Ok(())
            }
        }
    }

    /// The key named by `--wif`, `--wiffile`, `--b38` or `--mnefile`.
    fn key_source(&self) -> Result<Option<KeySource>> {
        let given = [
            self.opts.wif.is_some(),
            self.opts.wiffile.is_some(),
            self.opts.b38.is_some(),
            self.opts.mnefile.is_some(),
        ];
        if given.iter().filter(|g| **g).count() > 1 {
            bail!("use only one of --wif, --wiffile, --b38, --mnefile");
        }

        let source = if let Some(wif) = &self.opts.wif {
            KeySource::InlineWif(Zeroizing::new(wif.clone()))
        } else if let Some(path) = &self.opts.wiffile {
            KeySource::FileWif(path.clone())
        } else if let Some(record) = &self.opts.b38 {
            KeySource::DecryptedFromRecord {
                record: record.clone(),
                passphrase: self.passphrase("BIP38 passphrase")?,
            }
        } else if let Some(path) = &self.opts.mnefile {
            KeySource::DerivedFromMnemonic {
                phrase: read_trimmed(path)?,
                passphrase: self.passphrase("mnemonic passphrase (empty for none)")?,
                policy: self.policy(),
                index: self.opts.number.unwrap_or(0),
            }
        } else {
            return Ok(None);
        };
        Ok(Some(source))
    }

    fn resolve_key(&self, source: KeySource) -> Result<PrivateKey> {
        let key = source
            .resolve(self.network)
            .with_context(|| format!("failed to load key from {source:?}"))?;
        Ok(key)
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    fn new_mnemonic(&self) -> Result<()> {
        let mnemonic = Mnemonic::generate(self.opts.bits).context("failed to create mnemonic")?;
        self.output(&Zeroizing::new(mnemonic.to_string()))
    }

    fn decode_mnemonic(&self, with_keys: bool) -> Result<()> {
        let phrase = match self.opts.input {
            Some(_) => self.input_text()?,
            None => self.enter("mnemonic")?,
        };
        let mnemonic = Mnemonic::parse(&phrase).context("failed to parse mnemonic")?;
        let passphrase = self.passphrase("mnemonic passphrase (empty for none)")?;
        let config = DeriveConfig {
            path_policy: self.policy(),
            network: self.network,
            address_count: self.opts.number.unwrap_or(DEFAULT_ADDRESS_COUNT),
        };

        let mut listing = Zeroizing::new(String::new());
        for derived in gd_wallet::decode(&mnemonic, &passphrase, &config, with_keys)? {
            let derived = derived?;
            match &derived.key {
                Some(key) => writeln!(listing, "{} {}", derived.address, key.to_wif(self.network).as_str())?,
                None => writeln!(listing, "{}", derived.address)?,
            }
        }
        self.output(&listing)
    }

    fn encrypt_key(&self) -> Result<()> {
        let source = match self.key_source()? {
            Some(source) => source,
            None => KeySource::InlineWif(self.enter("WIF private key")?),
        };
        let key = self.resolve_key(source)?;
        let passphrase = self.new_passphrase("BIP38 passphrase")?;
        let record = gd_wallet::encrypt(&key, &passphrase, self.network).context("failed to encrypt key")?;
        self.output(&record)
    }

    fn decrypt_key(&self) -> Result<()> {
        let record = match (&self.opts.b38, &self.opts.input) {
            (Some(record), _) => record.clone(),
            (None, Some(_)) => self.input_text()?.to_string(),
            (None, None) => bail!("supply the BIP38 key with --b38 or --in"),
        };
        let passphrase = self.passphrase("BIP38 passphrase")?;
        let key = gd_wallet::decrypt(&record, &passphrase, self.network).context("failed to decrypt key")?;
        let line = Zeroizing::new(format!(
            "{} {}",
            key.to_wif(self.network).as_str(),
            key.address(self.network)
        ));
        self.output(&line)
    }

    fn extract(&self) -> Result<()> {
        let raw_hex = self.input_text()?;
        let records = match self.opts.number {
            Some(index) => {
                let tx = Transaction::from_hex(&raw_hex).map_err(WalletError::from)?;
                vec![portxo::extract_output(&tx, index)?]
            }
            None => {
                let owners = self
                    .opts
                    .owner
                    .iter()
                    .map(|s| Address::decode(s, self.network).map_err(WalletError::from))
                    .collect::<Result<Vec<_>, _>>()
                    .context("invalid --owner address")?;
                portxo::extract_from_hex(&raw_hex, self.network, |address| {
                    owners.is_empty() || owners.contains(address)
                })?
            }
        };
        if records.is_empty() {
            bail!("no matching standard outputs in transaction");
        }
        self.output(&portxo::serialize_records(&records))
    }

    fn insert(&self) -> Result<()> {
        let records = portxo::parse_records(&self.input_text()?)?;
        let source = self
            .key_source()?
            .context("supply a key with --wif, --wiffile, --b38 or --mnefile")?;
        let key = self.resolve_key(source)?;

        let mut inserted = 0usize;
        let records = records
            .into_iter()
            .map(|record| {
                if record.key_matches(&key) {
                    inserted += 1;
                    record.insert_key(&key)
                } else {
                    Ok(record)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        if inserted == 0 {
            return Err(WalletError::KeyAddressMismatch).context(format!(
                "key for {} controls none of the records",
                key.address(self.network)
            ));
        }
        self.output(&portxo::serialize_records(&records))
    }

    fn sweep(&self) -> Result<()> {
        let records = portxo::parse_records(&self.input_text()?)?;
        let dest = self.opts.dest.as_deref().context("--dest ADDRESS is required")?;
        let destination = Address::decode(dest, self.network)
            .map_err(WalletError::from)
            .context("invalid destination")?;

        let signer = TransactionSigner::new(SpendConfig {
            fee_rate: self.opts.fee,
            network: self.network,
        });
        let signed = signer.sweep(&records, &destination)?;
        let plan = signed.plan();
        eprintln!(
            "txid {} spends {} input(s), {} sat, fee {} sat, sends {} sat to {}",
            signed.txid(),
            plan.input_count,
            plan.total_in,
            plan.fee,
            plan.output_value,
            destination
        );
        self.output(&signed.to_hex())
    }
}

fn read_trimmed(path: &Path) -> Result<Zeroizing<String>> {
    let contents = Zeroizing::new(
        std::fs::read_to_string(path)
            .map_err(WalletError::from)
            .with_context(|| format!("failed to read {}", path.display()))?,
    );
    Ok(Zeroizing::new(contents.trim().to_string()))
}

/// Write `contents` to `path`, readable only by the owner.
fn write_private(path: &Path, contents: &str) -> Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
