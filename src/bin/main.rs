//! Ledgerlink CLI - operator surface over the in-process dev wallet
//!
//!   ledgerlink demo      → scripted session, prints every step as JSON
//!   ledgerlink repl      → interactive session, prints the view after each command
//!   ledgerlink schema    → ledger entry points and selectors
//!
//! Configuration:
//!   --contract <addr>  (env: LEDGERLINK_CONTRACT)
//!   --decimals <n>     (env: LEDGERLINK_DECIMALS)
//!
//! Output format:
//!   --json     Output raw JSON (default for non-tty)
//!   --pretty   Pretty-print JSON (default for tty)

use alloy_primitives::{address, Address, U256};
use anyhow::{anyhow, Context};
use ledgerlink::config::{parse_contract, parse_decimals, ClientConfig};
use ledgerlink::contract::LEDGER_SCHEMA;
use ledgerlink::devnet::DevWallet;
use ledgerlink::logging::init_logging;
use ledgerlink::units::{format_amount, parse_address};
use ledgerlink::{install_signal_handlers, Client};
use serde::Serialize;
use serde_json::{json, Value};
use std::env;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

/// Accounts the dev wallet exposes by default.
const DEV_ACCOUNTS: [Address; 2] = [
    address!("70997970C51812dc3A010C7d01b50e0d17dc79C8"),
    address!("3C44CdDdB6a900fa2b585dd299e03d12FA4293BC"),
];

fn main() {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("ledgerlink {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let pretty = !opts.json && (opts.pretty || io::stdout().is_terminal());
    let result = match opts.command.as_deref() {
        Some("demo") => run(cmd_demo(&opts)),
        Some("repl") => run(cmd_repl(&opts)),
        Some("schema") => cmd_schema(),
        Some(cmd) => Err(anyhow!("Unknown command: {}", cmd)),
        None => {
            print_usage();
            return;
        }
    };

    match result {
        Ok(output) => println!("{}", render(&output, pretty)),
        Err(e) => {
            eprintln!("{}", render(&json!({ "error": format!("{:#}", e) }), pretty));
            std::process::exit(1);
        }
    }
}

fn run(task: impl std::future::Future<Output = anyhow::Result<Value>>) -> anyhow::Result<Value> {
    let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;
    rt.block_on(task)
}

fn render(value: &Value, pretty: bool) -> String {
    let rendered = if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
    rendered.unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
}

fn to_value(value: &impl Serialize) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    contract: Option<String>,
    decimals: Option<String>,
    json: bool,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        // Load .env file if present
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    let value = value.trim().trim_matches('"');
                    if !value.is_empty() && env::var(key.trim()).is_err() {
                        env::set_var(key.trim(), value);
                    }
                }
            }
        }

        let mut opts = ParsedArgs::default();
        let mut positional = Vec::new();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            match arg.as_str() {
                "--help" | "-h" => opts.help = true,
                "--version" | "-V" => opts.version = true,
                "--json" => opts.json = true,
                "--pretty" => opts.pretty = true,
                "--contract" | "-c" => {
                    if i + 1 < args.len() {
                        opts.contract = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--decimals" | "-d" => {
                    if i + 1 < args.len() {
                        opts.decimals = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                _ if !arg.starts_with('-') => positional.push(arg.clone()),
                _ => {} // Ignore unknown flags
            }
            i += 1;
        }

        if !positional.is_empty() {
            opts.command = Some(positional.remove(0));
        }

        opts
    }

    /// Flags over environment over defaults.
    fn config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = ClientConfig::from_env()?;
        if let Some(contract) = self.contract.as_deref() {
            config = config.with_contract(parse_contract(contract)?);
        }
        if let Some(decimals) = self.decimals.as_deref() {
            config = config.with_decimals(parse_decimals(decimals)?);
        }
        Ok(config)
    }
}

fn print_usage() {
    println!(
        r#"ledgerlink - wallet session and ledger client

USAGE:
    ledgerlink <command> [options]

COMMANDS:
    demo                    Scripted session against the dev wallet
    repl                    Interactive session against the dev wallet
    schema                  List ledger entry points

OPTIONS:
    --contract, -c <addr>   Ledger contract (env: LEDGERLINK_CONTRACT)
    --decimals, -d <n>      Display decimals (env: LEDGERLINK_DECIMALS, default 18)

OUTPUT OPTIONS:
    --json                  Raw JSON output
    --pretty                Pretty-print JSON
    --version, -V           Print version

LOGGING:
    RUST_LOG=debug                 Log filter (default: warn,ledgerlink=info)
    LEDGERLINK_LOG_FORMAT=json     JSON log lines on stderr (also: compact, pretty)

EXAMPLES:
    ledgerlink demo --pretty
    ledgerlink repl --decimals 6
"#
    );
}

fn cmd_schema() -> anyhow::Result<Value> {
    let entries: Vec<Value> = LEDGER_SCHEMA
        .entries()
        .into_iter()
        .map(|entry| {
            json!({
                "signature": entry.signature,
                "selector": format!("0x{}", hex::encode(entry.selector)),
                "mutating": entry.mutating,
                "payable": entry.payable,
            })
        })
        .collect();
    Ok(json!({ "entry_points": entries }))
}

async fn cmd_demo(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let config = opts.config()?;
    let wallet = Arc::new(DevWallet::new(DEV_ACCOUNTS.to_vec()));
    let client = Client::new(wallet.clone(), config);
    let mut steps = Vec::new();

    macro_rules! step {
        ($name:expr, $result:expr) => {{
            let outcome = match $result {
                Ok(value) => json!({ "ok": to_value(&value) }),
                Err(e) => json!({ "error": e.to_string() }),
            };
            debug!(step = $name, "demo step done");
            steps.push(json!({ "step": $name, "outcome": outcome, "view": to_value(&client.view()?) }));
        }};
    }

    step!("initialize", client.initialize());
    step!("connect", client.connect().await);

    client.set_amount("1.5")?;
    step!("deposit 1.5", client.deposit().await);

    client.set_amount("0.5")?;
    step!("withdraw 0.5", client.withdraw().await);

    client.set_amount("0.25")?;
    client.set_recipient(DEV_ACCOUNTS[1].to_checksum(None))?;
    step!("transfer 0.25", client.transfer().await);

    client.set_amount("100")?;
    step!("withdraw 100", client.withdraw().await);

    wallet.set_accounts(vec![DEV_ACCOUNTS[1], DEV_ACCOUNTS[0]]);
    step!("switch account", client.process_account_changes().await);

    wallet.set_accounts(Vec::new());
    step!("disconnect", client.process_account_changes().await);

    let decimals = client.config().decimals;
    let ledger: Vec<Value> = DEV_ACCOUNTS
        .iter()
        .map(|account| json!({ "account": account, "balance": format_amount(wallet.balance_of(*account), decimals) }))
        .collect();

    Ok(json!({ "steps": steps, "ledger": ledger }))
}

async fn cmd_repl(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let config = opts.config()?;
    let wallet = Arc::new(DevWallet::new(DEV_ACCOUNTS.to_vec()));
    let client = Client::new(wallet.clone(), config);
    let shutdown = install_signal_handlers();

    println!("Ledgerlink REPL (dev wallet) - type 'help' or 'quit'\n");
    if let Err(e) = client.initialize() {
        println!("Error: {}", e);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut commands = 0u64;

    loop {
        print!("ledgerlink> ");
        io::stdout().flush().ok();

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = shutdown.wait() => break,
        };
        let Some(line) = line else { break };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let parts: Vec<&str> = input.splitn(2, ' ').collect();
        let arg = parts.get(1).map(|s| s.trim()).unwrap_or("");
        commands += 1;

        let outcome: anyhow::Result<Value> = match parts[0] {
            "quit" | "exit" | "q" => break,
            "help" | "?" => {
                print_repl_help();
                continue;
            }
            "connect" => client.connect().await.map(|account| json!({ "account": account })).map_err(Into::into),
            "toggle" => client.toggle_address().map(|shown| json!({ "show_address": shown })).map_err(Into::into),
            "amount" => client.set_amount(arg).map(|_| Value::Null).map_err(Into::into),
            "recipient" => client.set_recipient(arg).map(|_| Value::Null).map_err(Into::into),
            "deposit" => client.deposit().await.map(|op| to_value(&op)).map_err(Into::into),
            "withdraw" => client.withdraw().await.map(|op| to_value(&op)).map_err(Into::into),
            "transfer" => client.transfer().await.map(|op| to_value(&op)).map_err(Into::into),
            "balance" => client
                .refresh_balance()
                .await
                .map(|balance| json!({ "balance": format_amount(balance, client.config().decimals) }))
                .map_err(Into::into),
            "accounts" => match parse_accounts(arg) {
                Ok(accounts) => {
                    wallet.set_accounts(accounts);
                    client.process_account_changes().await.map(|n| json!({ "applied": n })).map_err(Into::into)
                }
                Err(e) => Err(e),
            },
            "fund" => fund(&wallet, &client, arg),
            "reject" => {
                let (what, message) = arg.split_once(' ').unwrap_or((arg, "User rejected the request."));
                match what {
                    "access" => {
                        wallet.reject_next_access(message);
                        Ok(json!({ "armed": "access" }))
                    }
                    "signature" | "" => {
                        wallet.reject_next_signature(message);
                        Ok(json!({ "armed": "signature" }))
                    }
                    other => Err(anyhow!("Usage: reject [access|signature] [message] (got {})", other)),
                }
            }
            "last" => Ok(to_value(&client.coordinator().last_report())),
            "view" => Ok(Value::Null),
            cmd => {
                println!("Unknown: {}. Type 'help'.", cmd);
                continue;
            }
        };

        let view = to_value(&client.view()?);
        let output = match outcome {
            Ok(Value::Null) => json!({ "view": view }),
            Ok(result) => json!({ "result": result, "view": view }),
            Err(e) => json!({ "error": e.to_string(), "view": view }),
        };
        println!("{}", render(&output, true));
    }

    println!("Goodbye!");
    Ok(json!({ "status": "exited", "commands": commands }))
}

fn print_repl_help() {
    println!("Commands:");
    println!("  connect                   - Request account access");
    println!("  toggle                    - Show/hide the owner address");
    println!("  amount <x>                - Set the amount (display units)");
    println!("  recipient <addr>          - Set the transfer recipient");
    println!("  deposit | withdraw | transfer");
    println!("  balance                   - Reload the balance");
    println!("  accounts <a,b|none>       - Change the wallet's accounts");
    println!("  fund <x>                  - Credit the active account on the dev ledger");
    println!("  reject [access|signature] [message]");
    println!("  last                      - Last operation report");
    println!("  view                      - Show the view");
    println!("  quit                      - Exit");
}

fn parse_accounts(arg: &str) -> anyhow::Result<Vec<Address>> {
    if arg.is_empty() || arg == "none" {
        return Ok(Vec::new());
    }
    arg.split(',')
        .map(|s| parse_address(s).with_context(|| format!("bad account {:?}", s.trim())))
        .collect()
}

fn fund(wallet: &DevWallet, client: &Client<DevWallet>, arg: &str) -> anyhow::Result<Value> {
    let session = client.session()?;
    let account = session.signer().ok_or_else(|| anyhow!("connect first"))?;
    let amount: U256 = ledgerlink::units::parse_amount(arg, client.config().decimals)?;
    wallet.fund(account, amount);
    Ok(json!({ "funded": account, "balance": format_amount(wallet.balance_of(account), client.config().decimals) }))
}
