//! rpcmotion CLI Client
//!
//! Command-line interface for an RPCMotion server: one-shot actions via
//! flags, or an interactive shell.

mod shell;

use std::process::ExitCode;

use clap::Parser;
use rpcmotion::{Client, Config, DownloadOutcome};
use tracing_subscriber::{fmt, EnvFilter};

/// rpcmotion CLI
#[derive(Parser, Debug)]
#[command(name = "rpcmotion-cli")]
#[command(about = "Client for the RPCMotion remote command and file-transfer service")]
#[command(version)]
struct Args {
    /// Server IP address
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(long, default_value_t = rpcmotion::config::DEFAULT_PORT)]
    port: u16,

    /// Command to execute on server
    #[arg(long)]
    command: Option<String>,

    /// Execute the command without capturing output
    #[arg(long, requires = "command")]
    silent: bool,

    /// Upload file to server
    #[arg(long, num_args = 2, value_names = ["LOCAL", "REMOTE"])]
    upload: Option<Vec<String>>,

    /// Download file from server
    #[arg(long, num_args = 2, value_names = ["REMOTE", "LOCAL"])]
    download: Option<Vec<String>>,

    /// List directory contents (server working directory if omitted)
    #[arg(long, num_args = 0..=1, default_missing_value = "", value_name = "PATH")]
    list: Option<String>,

    /// Shutdown the server
    #[arg(long)]
    shutdown: bool,

    /// Ping server
    #[arg(long)]
    ping: bool,

    /// Start interactive shell
    #[arg(long)]
    interactive: bool,

    /// Require the PONG_OK banner right after connecting
    #[arg(long)]
    verify: bool,

    /// Read/write timeout in milliseconds (0 = none)
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,
}

impl Args {
    fn has_action(&self) -> bool {
        self.interactive
            || self.ping
            || self.command.is_some()
            || self.upload.is_some()
            || self.download.is_some()
            || self.list.is_some()
            || self.shutdown
    }
}

fn main() -> ExitCode {
    // Logs go to stderr; command output owns stdout
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,rpcmotion=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if !args.has_action() {
        eprintln!("error: you must specify at least one action (see --help)");
        return ExitCode::FAILURE;
    }

    let config = Config::builder()
        .host(&args.host)
        .port(args.port)
        .read_timeout_ms(args.timeout_ms)
        .write_timeout_ms(args.timeout_ms)
        .verify_on_connect(args.verify)
        .build();
    let client = Client::new(config);

    let outcome = client.connect().and_then(|()| {
        if args.interactive {
            shell::run(&client);
            Ok(true)
        } else {
            run_action(&client, &args)
        }
    });

    if client.is_connected() {
        client.disconnect();
    }

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            println!("[-] Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Run the first requested one-shot action
fn run_action(client: &Client, args: &Args) -> rpcmotion::Result<bool> {
    if args.ping {
        println!("[*] Pinging server...");
        return ping(client);
    }

    if let Some(command) = &args.command {
        println!("[*] Executing command: {}", command);
        return if args.silent {
            execute_silent(client, command)
        } else {
            execute(client, command)
        };
    }

    if let Some([local, remote]) = args.upload.as_deref() {
        println!("[*] Uploading {} to {}", local, remote);
        return upload(client, local, remote);
    }

    if let Some([remote, local]) = args.download.as_deref() {
        println!("[*] Downloading {} to {}", remote, local);
        return download(client, remote, local);
    }

    if let Some(path) = &args.list {
        println!(
            "[*] Listing directory: {}",
            if path.is_empty() { "current" } else { path }
        );
        return list(client, path);
    }

    if args.shutdown {
        println!("[*] Sending shutdown command to server...");
        return shutdown(client);
    }

    Ok(true)
}

// =============================================================================
// Actions shared by flags and the shell
// =============================================================================
//
// Each prints its outcome and returns whether the remote status was 0.

fn report(status: u32, what: &str, success: impl FnOnce()) -> bool {
    if status == 0 {
        success();
        true
    } else {
        println!("[-] {} failed with code: {}", what, status);
        false
    }
}

pub(crate) fn ping(client: &Client) -> rpcmotion::Result<bool> {
    let reply = client.ping()?;
    Ok(report(reply.status, "Ping", || {
        println!(
            "[+] Server response: {}",
            reply.response.as_deref().unwrap_or("<none>")
        )
    }))
}

pub(crate) fn execute(client: &Client, command: &str) -> rpcmotion::Result<bool> {
    let reply = client.execute(command)?;
    Ok(report(reply.status, "Command", || {
        println!("[+] Command output:\n{}", reply.output)
    }))
}

pub(crate) fn execute_silent(client: &Client, command: &str) -> rpcmotion::Result<bool> {
    let status = client.execute_silent(command)?;
    Ok(report(status, "Command", || println!("[+] Command executed")))
}

pub(crate) fn upload(client: &Client, local: &str, remote: &str) -> rpcmotion::Result<bool> {
    let status = client.upload_file(local, remote)?;
    Ok(report(status, "Upload", || println!("[+] File uploaded")))
}

pub(crate) fn download(client: &Client, remote: &str, local: &str) -> rpcmotion::Result<bool> {
    match client.download_file(remote, local)? {
        DownloadOutcome::Saved { bytes } => {
            println!("[+] File downloaded ({} bytes)", bytes);
            Ok(true)
        }
        DownloadOutcome::RemoteError(status) => Ok(report(status, "Download", || {})),
    }
}

pub(crate) fn list(client: &Client, path: &str) -> rpcmotion::Result<bool> {
    let reply = client.list_directory(path)?;
    Ok(report(reply.status, "List", || {
        println!("[+] Directory listing:\n{}", reply.output)
    }))
}

pub(crate) fn shutdown(client: &Client) -> rpcmotion::Result<bool> {
    client.shutdown()?;
    println!("[+] Server shutdown command sent");
    Ok(true)
}
