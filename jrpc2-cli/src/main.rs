//! Command-line JSON-RPC 2.0 client
//!
//! Dispatches a single method call (or notification) over stdin, TCP, or
//! HTTP and prints the result document indented four spaces. Exit codes:
//! `0` on success, `1` on transport or RPC failure, `2` on usage errors.

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};
use jrpc2_client::{server_error, Client, ClientError};
use serde::Serialize;
use serde_json::Value;
use std::process::exit;
use tracing_subscriber::EnvFilter;

const INDENT: &[u8] = b"    ";

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Transport {
    /// Read responses from stdin, write requests to stdout.
    Stdin,
    /// Plain TCP stream, one JSON value after another.
    Tcp,
    /// One HTTP POST per request.
    Http,
}

#[derive(Parser)]
#[command(
    name = "jrpc2-cli",
    version,
    about = "Call a JSON-RPC 2.0 service",
    arg_required_else_help = true
)]
struct Cli {
    /// Transport to dispatch over.
    #[arg(long, value_enum, default_value_t = Transport::Http)]
    transport: Transport,

    /// Service endpoint as host:port (tcp transport).
    #[arg(long)]
    tcp_addr: Option<String>,

    /// Service endpoint as a URL (http transport).
    #[arg(long)]
    http_endpoint: Option<String>,

    /// Send a notification and expect no reply.
    #[arg(long)]
    notification: bool,

    /// Service-method name, e.g. Arith.Sum.
    method: String,

    /// Params as a JSON document, e.g. '[3,5]' or 'null'.
    params: String,
}

fn usage(message: impl std::fmt::Display) -> ! {
    Cli::command()
        .error(ErrorKind::InvalidValue, message.to_string())
        .exit()
}

/// Validate a URL endpoint and strip trailing slashes.
fn clean_endpoint(raw: &str) -> Option<String> {
    let clean = raw.trim_end_matches('/');
    let url = reqwest::Url::parse(clean).ok()?;
    url.has_host().then(|| clean.to_owned())
}

fn pretty(value: &impl Serialize) -> String {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(INDENT);
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    match value.serialize(&mut ser) {
        Ok(()) => String::from_utf8_lossy(&out).into_owned(),
        Err(err) => {
            eprintln!("{err}");
            exit(1);
        }
    }
}

fn fail(err: ClientError) -> ! {
    match err {
        ClientError::Shutdown | ClientError::UnexpectedEof => eprintln!("{err}"),
        other => eprintln!("{}", pretty(&server_error(&other))),
    }
    exit(1)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if cli.method.is_empty() {
        usage("method: required");
    }
    let params: Value = match serde_json::from_str(&cli.params) {
        Ok(params) => params,
        Err(err) => usage(format_args!("params: {err}")),
    };

    let client = match cli.transport {
        Transport::Http => {
            let endpoint = match cli.http_endpoint.as_deref().map(clean_endpoint) {
                Some(Some(endpoint)) => endpoint,
                _ => usage("--http-endpoint: must be a valid endpoint URL"),
            };
            Client::connect_http(endpoint)
        }
        Transport::Tcp => {
            let Some(addr) = cli.tcp_addr.as_deref() else {
                usage("--tcp-addr: required");
            };
            match Client::dial(addr).await {
                Ok(client) => client,
                Err(err) => {
                    eprintln!("{err}");
                    exit(1);
                }
            }
        }
        Transport::Stdin => Client::new(tokio::io::stdin(), tokio::io::stdout()),
    };

    if cli.notification {
        if let Err(err) = client.notify(&cli.method, &params).await {
            fail(err);
        }
        return;
    }

    match client.call::<_, Value>(&cli.method, &params).await {
        Ok(result) => println!("{}", pretty(&result)),
        Err(err) => fail(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_cleaned_and_validated() {
        assert_eq!(
            clean_endpoint("http://svc.example:8001/rpc//").as_deref(),
            Some("http://svc.example:8001/rpc")
        );
        assert!(clean_endpoint("not a url").is_none());
        assert!(clean_endpoint("file:///tmp/x").is_none());
    }

    #[test]
    fn pretty_uses_four_space_indent() {
        let value = serde_json::json!({"a": [1, 2]});
        assert_eq!(pretty(&value), "{\n    \"a\": [\n        1,\n        2\n    ]\n}");
    }

    #[test]
    fn cli_parses_flags_and_positionals() {
        let cli = Cli::parse_from([
            "jrpc2-cli",
            "--transport",
            "tcp",
            "--tcp-addr",
            "127.0.0.1:8001",
            "Arith.Sum",
            "[3,5]",
        ]);
        assert_eq!(cli.transport, Transport::Tcp);
        assert_eq!(cli.method, "Arith.Sum");
        assert_eq!(cli.params, "[3,5]");
        assert!(!cli.notification);
    }
}
