//! Interactive shell
//!
//! Line-oriented front end over the same actions as the flags.

use std::io::{self, BufRead, Write};

use rpcmotion::{Client, Endpoint, SessionState};

const HELP: &str = "\
Available commands:
  help                      Show this help
  exit, quit                Exit shell
  connect <host> <port>     Connect to server
  disconnect                Disconnect from server
  exec <command>            Execute command with output
  silent <command>          Execute command without output
  upload <local> <remote>   Upload file to server
  download <remote> <local> Download file from server
  ls [path]                 List directory
  shutdown                  Shutdown server
  ping                      Ping server
  status                    Show connection status";

enum Flow {
    Continue,
    Exit,
}

/// Read commands from stdin until `exit` or end of input
pub fn run(client: &Client) {
    println!("Interactive RPC Shell (type 'help' for commands, 'exit' to quit)");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("\nRPC> ");
        let _ = io::stdout().flush();

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                tracing::warn!("Failed to read input: {}", e);
                break;
            }
            None => break,
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Flow::Exit = dispatch(client, line) {
            break;
        }
    }
}

fn dispatch(client: &Client, line: &str) -> Flow {
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let args: Vec<&str> = rest.split_whitespace().collect();

    match word.to_ascii_lowercase().as_str() {
        "exit" | "quit" => return Flow::Exit,
        "help" => println!("{}", HELP),
        "connect" => connect(client, &args),
        "disconnect" => {
            client.disconnect();
            println!("[+] Disconnected");
        }
        "status" => status(client),
        "exec" if !rest.is_empty() => remote(client, "Execute", |c| crate::execute(c, rest)),
        "silent" if !rest.is_empty() => {
            remote(client, "Execute silent", |c| crate::execute_silent(c, rest))
        }
        "upload" => match args.as_slice() {
            [local, remote_path] => {
                remote(client, "Upload", |c| crate::upload(c, local, remote_path))
            }
            _ => println!("Usage: upload <local_path> <remote_path>"),
        },
        "download" => match args.as_slice() {
            [remote_path, local] => {
                remote(client, "Download", |c| crate::download(c, remote_path, local))
            }
            _ => println!("Usage: download <remote_path> <local_path>"),
        },
        "ls" => {
            let path = args.first().copied().unwrap_or("");
            remote(client, "List", |c| crate::list(c, path))
        }
        "shutdown" => remote(client, "Shutdown", crate::shutdown),
        "ping" => remote(client, "Ping", crate::ping),
        "exec" | "silent" => println!("Usage: {} <command>", word),
        _ => println!("[-] Unknown command. Type 'help' for available commands."),
    }
    Flow::Continue
}

fn connect(client: &Client, args: &[&str]) {
    let [host, port] = args else {
        println!("Usage: connect <host> <port>");
        return;
    };
    let Ok(port) = port.parse::<u16>() else {
        println!("[-] Invalid port: {}", port);
        return;
    };

    let endpoint = Endpoint::new(*host, port);
    match client.connect_to(&endpoint) {
        Ok(()) => println!("[+] Connected to {}:{}", host, port),
        Err(e) => println!("[-] Connection failed: {}", e),
    }
}

fn status(client: &Client) {
    match client.state() {
        SessionState::Connected => {
            if let Some(endpoint) = client.endpoint() {
                println!("[*] Session: {}", endpoint);
            }
            remote(client, "Ping", crate::ping);
        }
        SessionState::Failed => println!("[-] Connection lost; use 'connect' to reconnect"),
        SessionState::Disconnected => println!("[-] Not connected"),
    }
}

/// Run a remote action if connected, reporting any error
fn remote<F>(client: &Client, what: &str, action: F)
where
    F: FnOnce(&Client) -> rpcmotion::Result<bool>,
{
    if !client.is_connected() {
        println!("[-] Not connected");
        return;
    }
    if let Err(e) = action(client) {
        println!("[-] {} failed: {}", what, e);
    }
}
