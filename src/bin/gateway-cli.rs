use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the RPC gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway status
    Status,
    /// List every endpoint with its health and latency
    Providers,
    /// Send one JSON-RPC call through a network's gateway
    Call {
        chain_id: u64,
        method: String,
        /// Params as a JSON array
        #[arg(default_value = "[]")]
        params: String,
        /// Session id to pin the call to
        #[arg(long)]
        session: Option<String>,
    },
    /// Submit an alarm state change
    Alarm {
        /// e.g. RoutingAPI-RpcGateway-ErrorRateAlarm-ChainId-56-Provider-QUIKNODE
        name: String,
        /// ALARM, OK or INSUFFICIENT_DATA
        state: String,
        #[arg(long, default_value = "OK")]
        previous: String,
        #[arg(long)]
        reason: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/status", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Providers => {
            let res = client.get(format!("{}/status/providers", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Call {
            chain_id,
            method,
            params,
            session,
        } => {
            let params: Value = serde_json::from_str(&params)?;
            let body = json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params});
            let mut req = client.post(format!("{}/rpc/{}", cli.url, chain_id)).json(&body);
            if let Some(session) = session {
                req = req.header("x-session-id", session);
            }
            print_response(req.send().await?).await?;
        }
        Commands::Alarm {
            name,
            state,
            previous,
            reason,
        } => {
            let body = json!({
                "alarmData": {
                    "alarmName": name,
                    "state": {"value": state, "reason": reason},
                    "previousState": {"value": previous},
                }
            });
            let res = client.post(format!("{}/alarms", cli.url)).json(&body).send().await?;
            let status = res.status();
            if status.is_success() {
                println!("Alarm accepted");
            } else {
                eprintln!("Error: gateway returned status {}", status);
                eprintln!("Response: {}", res.text().await?);
            }
        }
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
