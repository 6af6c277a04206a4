use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Map, Value};

#[derive(Parser)]
#[command(name = "batch-cli")]
#[command(about = "Client for the REST batch endpoint", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, default_value = "/batch")]
    path: String,

    /// Token sent as `Authorization: <prefix> <token>`.
    #[arg(short, long)]
    token: Option<String>,

    #[arg(long, default_value = "JWT")]
    prefix: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a batch payload read from a JSON file
    Send { file: PathBuf },
    /// Build a batch from "METHOD PATH [JSON-OBJECT]" arguments
    Call {
        #[arg(required = true)]
        requests: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("{} {}", cli.prefix, token))?,
        );
    }

    let payload = match cli.command {
        Commands::Send { file } => {
            let content = std::fs::read_to_string(&file)?;
            serde_json::from_str::<Value>(&content)?
        }
        Commands::Call { requests } => {
            let items = requests
                .iter()
                .map(|line| parse_item(line))
                .collect::<Result<Vec<_>, _>>()?;
            json!({ "requests": items })
        }
    };

    let res = client
        .post(format!("{}{}", cli.url, cli.path))
        .headers(headers)
        .json(&payload)
        .send()
        .await?;
    print_response(res).await?;

    Ok(())
}

/// Parse `"METHOD PATH [JSON-OBJECT]"` into a batch item.
fn parse_item(line: &str) -> Result<Value, String> {
    let mut parts = line.trim().splitn(3, char::is_whitespace);
    let method = parts
        .next()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| format!("missing method in '{line}'"))?;
    let path = parts
        .next()
        .ok_or_else(|| format!("missing path in '{line}'"))?;

    let mut item = Map::new();
    item.insert("method".into(), json!(method.to_ascii_lowercase()));
    item.insert("path".into(), json!(path));
    if let Some(raw) = parts.next().map(str::trim).filter(|raw| !raw.is_empty()) {
        let body: Value =
            serde_json::from_str(raw).map_err(|e| format!("invalid body in '{line}': {e}"))?;
        item.insert("body".into(), body);
    }
    Ok(Value::Object(item))
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: batch endpoint returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    for response in json["responses"].as_array().into_iter().flatten() {
        println!(
            "{} {} {}",
            response["status_code"],
            response["reason_phrase"].as_str().unwrap_or_default(),
            response["path"].as_str().unwrap_or_default()
        );
        println!("{}", serde_json::to_string_pretty(&response["body"])?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_item() {
        assert_eq!(
            parse_item("GET /kv/a").unwrap(),
            json!({"method": "get", "path": "/kv/a"})
        );
        assert_eq!(
            parse_item("PUT /kv/a {\"n\": 1}").unwrap(),
            json!({"method": "put", "path": "/kv/a", "body": {"n": 1}})
        );
        assert!(parse_item("GET").is_err());
        assert!(parse_item("POST /x {oops").is_err());
    }
}
