//! Common test utilities for rgblib integration tests
//!
//! This module provides shared test infrastructure including:
//! - Isolated wallet environments backed by temporary directories
//! - Bitcoin RPC access for mining and funding on regtest
//! - Indexer connectivity checks for the online tests
//! - A local Esplora stand-in for online operations that need no chain
//! - Ledger fault injection

#![allow(dead_code)]

use rgblib::bitcoin::Indexer;
use rgblib::database::RGB_DB_NAME;
use rgblib::wallet::DatabaseType;
use rgblib::{generate_keys, BitcoinNetwork, Keys, Wallet, WalletData};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Proxy endpoint used by receive requests in tests
pub const ENDPOINT: &str = "rpc://127.0.0.1:3000/json-rpc";

/// Indexer URL for the regtest tests, overridable with `INDEXER_URL`
pub fn indexer_url() -> String {
    std::env::var("INDEXER_URL").unwrap_or_else(|_| "http://127.0.0.1:3002".to_string())
}

/// Electrum URL for the regtest tests, overridable with `ELECTRUM_URL`
pub fn electrum_url() -> String {
    std::env::var("ELECTRUM_URL").unwrap_or_else(|_| "tcp://127.0.0.1:50001".to_string())
}

/// Bitcoin RPC client for test operations
///
/// Uses `bitcoin-cli` directly, or through the `bitcoind-test` container
/// when it is running.
pub struct BitcoinRpcClient {
    pub datadir: String,
}

impl BitcoinRpcClient {
    pub fn new() -> Self {
        let datadir = std::env::var("BITCOIN_DATADIR").unwrap_or_else(|_| {
            let current_dir = std::env::current_dir().expect("Failed to get current directory");
            current_dir.join(".bitcoin").to_string_lossy().to_string()
        });
        Self { datadir }
    }

    fn use_docker() -> bool {
        Command::new("docker")
            .args(["ps", "--filter", "name=bitcoind-test", "--format", "{{.Names}}"])
            .output()
            .map(|output| String::from_utf8_lossy(&output.stdout).contains("bitcoind-test"))
            .unwrap_or(false)
    }

    fn execute_cli(&self, args: &[&str]) -> Result<String, String> {
        let mut cmd = if Self::use_docker() {
            let mut cmd = Command::new("docker");
            cmd.args([
                "exec",
                "bitcoind-test",
                "bitcoin-cli",
                "-regtest",
                "-rpcuser=user",
                "-rpcpassword=password",
            ]);
            cmd
        } else {
            let mut cmd = Command::new("bitcoin-cli");
            cmd.arg("-regtest").arg(format!("-datadir={}", self.datadir));
            cmd
        };
        let output = cmd
            .args(args)
            .output()
            .map_err(|e| format!("Failed to execute bitcoin-cli: {}", e))?;

        if !output.status.success() {
            return Err(format!(
                "bitcoin-cli failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Mine `count` blocks to `address`, returning the block hashes
    pub fn mine_to_address(&self, count: u32, address: &str) -> Result<Vec<String>, String> {
        let result = self.execute_cli(&["generatetoaddress", &count.to_string(), address])?;
        serde_json::from_str(&result).map_err(|e| format!("Failed to parse block hashes: {}", e))
    }

    /// Send from the mining wallet, returning the txid
    pub fn send_to_address(&self, address: &str, amount_btc: f64) -> Result<String, String> {
        self.execute_cli(&[
            "-rpcwallet=mining_wallet",
            "sendtoaddress",
            address,
            &amount_btc.to_string(),
        ])
    }

    pub fn get_new_address(&self) -> Result<String, String> {
        self.execute_cli(&["-rpcwallet=mining_wallet", "getnewaddress"])
    }

    pub fn get_block_count(&self) -> Result<u32, String> {
        self.execute_cli(&["getblockcount"])?
            .parse::<u32>()
            .map_err(|e| format!("Failed to parse block count: {}", e))
    }
}

/// Isolated wallet environment with automatic cleanup
pub struct TestWalletEnv {
    /// Temporary directory (auto-cleanup on drop)
    _temp_dir: TempDir,
    data_dir: PathBuf,
}

impl TestWalletEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let data_dir = temp_dir.path().join("data");
        std::fs::create_dir_all(&data_dir).expect("Failed to create data directory");
        Self {
            _temp_dir: temp_dir,
            data_dir,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn data_dir_str(&self) -> String {
        self.data_dir.to_string_lossy().to_string()
    }

    /// A path inside the environment that does not exist yet
    pub fn path(&self, name: &str) -> PathBuf {
        self._temp_dir.path().join(name)
    }

    /// Wallet data for `keys` stored in this environment
    pub fn wallet_data(&self, keys: &Keys, max_allocations_per_utxo: u32) -> WalletData {
        WalletData {
            data_dir: self.data_dir_str(),
            bitcoin_network: BitcoinNetwork::Regtest,
            database_type: DatabaseType::Sqlite,
            max_allocations_per_utxo,
            pubkey: keys.account_xpub.clone(),
            mnemonic: Some(keys.mnemonic.clone()),
            vanilla_keychain: None,
        }
    }

    /// Create a wallet with freshly generated keys
    pub fn new_wallet(&self) -> (Wallet, Keys) {
        let keys = generate_keys(BitcoinNetwork::Regtest).expect("Failed to generate keys");
        let wallet =
            Wallet::new(self.wallet_data(&keys, 5)).expect("Failed to create wallet");
        (wallet, keys)
    }
}

/// Whether a regtest indexer answers at [`indexer_url`]
pub fn regtest_available() -> bool {
    Indexer::new(&indexer_url(), BitcoinNetwork::Regtest)
        .and_then(|client| client.is_available())
        .unwrap_or(false)
}

/// Fund the vanilla keychain of `wallet` and confirm the funding
pub fn fund_wallet(wallet: &mut Wallet, rpc: &BitcoinRpcClient, amount_btc: f64) {
    let address = wallet.get_address().expect("Failed to get address");
    rpc.send_to_address(&address, amount_btc)
        .expect("Failed to fund wallet");
    mine(rpc, 1);
}

pub fn mine(rpc: &BitcoinRpcClient, blocks: u32) {
    let address = rpc.get_new_address().expect("Failed to get mining address");
    rpc.mine_to_address(blocks, &address)
        .expect("Failed to mine blocks");
    wait_for_indexer(rpc);
}

/// Wait until the indexer caught up with bitcoind
pub fn wait_for_indexer(rpc: &BitcoinRpcClient) {
    let target = rpc.get_block_count().expect("Failed to get block count");
    let client = Indexer::new(&indexer_url(), BitcoinNetwork::Regtest)
        .expect("Failed to create indexer client");
    for _ in 0..60 {
        if client.get_height().map(|h| h >= target).unwrap_or(false) {
            return;
        }
        std::thread::sleep(std::time::Duration::from_millis(500));
    }
    panic!("Indexer did not reach height {}", target);
}

/// Tip height reported by [`fake_esplora`]
pub const FAKE_TIP_HEIGHT: u32 = 100;

/// Start a local HTTP server answering like an Esplora instance, returning its URL
///
/// The tip is at [`FAKE_TIP_HEIGHT`], fee estimates are
/// `{1: 20.0, 6: 4.0, 144: 1.0}` and every transaction is confirmed in the
/// tip block. Scans are not supported.
pub fn fake_esplora() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind fake indexer");
    let url = format!(
        "http://{}",
        listener.local_addr().expect("Failed to read fake indexer address")
    );
    std::thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            serve_esplora_request(stream);
        }
    });
    url
}

fn serve_esplora_request(mut stream: TcpStream) {
    let path = {
        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).is_err() {
            return;
        }
        let mut header = String::new();
        while reader.read_line(&mut header).map(|n| n > 2).unwrap_or(false) {
            header.clear();
        }
        request_line
            .split_whitespace()
            .nth(1)
            .unwrap_or("/")
            .to_string()
    };

    let body = if path.ends_with("/fee-estimates") {
        r#"{"1":20.0,"6":4.0,"144":1.0}"#.to_string()
    } else if path.ends_with("/status") {
        format!(r#"{{"confirmed":true,"block_height":{}}}"#, FAKE_TIP_HEIGHT)
    } else {
        FAKE_TIP_HEIGHT.to_string()
    };
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
}

/// Make every later insert into `table` of the wallet ledger fail
pub fn fail_inserts_into(wallet: &Wallet, table: &str) {
    let conn = rusqlite::Connection::open(wallet.get_wallet_dir().join(RGB_DB_NAME))
        .expect("Failed to open ledger");
    conn.execute_batch(&format!(
        "CREATE TRIGGER fail_{table} BEFORE INSERT ON {table}
         BEGIN SELECT RAISE(ABORT, 'insert into {table} refused'); END;"
    ))
    .expect("Failed to install trigger");
}
