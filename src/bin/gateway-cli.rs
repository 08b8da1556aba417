use std::io::Write;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Client for the chat gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    /// Subject sent as the resolved identity.
    #[arg(short, long, default_value = "cli")]
    subject: String,

    /// Role sent as the resolved identity.
    #[arg(short, long, default_value = "user")]
    role: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message and stream the reply to stdout
    Chat {
        /// Conversation id
        id: String,
        /// Message text
        message: String,
    },
    /// Show the admin status dashboard
    Status {
        /// Print panels as each source resolves
        #[arg(short, long)]
        follow: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert("x-auth-subject", HeaderValue::from_str(&cli.subject)?);
    headers.insert("x-auth-role", HeaderValue::from_str(&cli.role)?);

    match cli.command {
        Commands::Chat { id, message } => {
            let res = client
                .post(format!("{}/api/chat/message", cli.url))
                .headers(headers)
                .json(&serde_json::json!({ "id": id, "message": message }))
                .send()
                .await?;
            stream_response(res).await?;
        }
        Commands::Status { follow: false } => {
            let res = client
                .get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Status { follow: true } => {
            let res = client
                .get(format!("{}/admin/status/stream", cli.url))
                .headers(headers)
                .send()
                .await?;
            stream_response(res).await?;
        }
    }

    Ok(())
}

/// Copy the body to stdout chunk by chunk as it arrives.
async fn stream_response(mut res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
    }

    let mut stdout = std::io::stdout();
    while let Some(chunk) = res.chunk().await? {
        stdout.write_all(&chunk)?;
        stdout.flush()?;
    }
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
