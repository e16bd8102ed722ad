//! Seisvault CLI
//!
//! Command-line client for a running Seisvault server:
//! - Index and unindex waveform files
//! - Query waveforms into a miniSEED file
//! - Manage channel mappings and station restrictions
//! - Check status

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "seisvault-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Client for the Seisvault waveform service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:8080", global = true)]
    pub api_url: String,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show server status
    Status,

    /// Index a miniSEED file, or every waveform file below a directory
    Index {
        /// Path on the server
        path: String,
        /// Treat the path as a directory to scan
        #[arg(short, long)]
        recursive: bool,
    },

    /// Remove a file from the catalog
    Unindex {
        /// Path on the server
        path: String,
    },

    /// List indexed files
    Files,

    /// Query waveforms
    Query {
        /// Start time (ISO 8601)
        #[arg(short, long)]
        start: String,
        /// End time (ISO 8601)
        #[arg(short, long)]
        end: String,
        #[arg(long)]
        network: Option<String>,
        #[arg(long)]
        station: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        channel: Option<String>,
        /// Username for queryauth
        #[arg(short, long)]
        user: Option<String>,
        /// Password for queryauth
        #[arg(short, long)]
        password: Option<String>,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage channel mappings
    Mapping {
        #[command(subcommand)]
        action: MappingAction,
    },

    /// Manage station restrictions
    Restriction {
        #[command(subcommand)]
        action: RestrictionAction,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum MappingAction {
    /// List mappings
    List,
    /// Serve SOURCE as TARGET from START until END (exclusive)
    Add {
        /// Source identity NET.STA.LOC.CHA
        source: String,
        /// Target identity NET.STA.LOC.CHA
        target: String,
        #[arg(short, long)]
        start: String,
        /// Open-ended when omitted
        #[arg(short, long)]
        end: Option<String>,
    },
    /// Remove a mapping by id
    Remove { id: i64 },
}

#[derive(Subcommand)]
pub enum RestrictionAction {
    /// List restrictions
    List,
    /// Restrict a station to the given users
    Add {
        network: String,
        station: String,
        /// Users allowed to see the station
        #[arg(short, long)]
        users: Vec<String>,
    },
    /// Remove a restriction by id
    Remove { id: i64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let api = format!("{}/api/v1", cli.api_url.trim_end_matches('/'));

    match cli.command {
        Commands::Status => {
            let response = client.get(format!("{}/health", cli.api_url)).send().await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let health: serde_json::Value = resp.json().await?;
                    let stats: serde_json::Value =
                        client.get(format!("{}/stats", api)).send().await?.json().await?;

                    println!("Seisvault v{}", env!("CARGO_PKG_VERSION"));
                    println!();
                    println!("API Status: {}", health["status"].as_str().unwrap_or("unknown"));
                    println!();
                    println!("Catalog:");
                    println!("  Files: {}", stats["files"].as_u64().unwrap_or(0));
                    println!("  Segments: {}", stats["segments"].as_u64().unwrap_or(0));
                    println!("  Mappings: {}", stats["mappings"].as_u64().unwrap_or(0));
                    println!(
                        "  Restricted stations: {}",
                        stats["restricted_stations"].as_u64().unwrap_or(0)
                    );

                    if let Some(uptime) = health["uptime_seconds"].as_u64() {
                        println!();
                        println!("Uptime: {}", format_duration(uptime));
                    }
                }
                Ok(resp) => fail(&format!("API returned error: {}", resp.status())),
                Err(e) => {
                    eprintln!("Cannot connect to Seisvault API at {}", cli.api_url);
                    eprintln!("Error: {}", e);
                    eprintln!();
                    eprintln!("Make sure the Seisvault server is running:");
                    eprintln!("  cargo run --bin seisvault");
                    std::process::exit(1);
                }
            }
        }

        Commands::Index { path, recursive } => {
            let url = if recursive {
                format!("{}/files/scan", api)
            } else {
                format!("{}/files", api)
            };
            let body = serde_json::json!({ "path": path });
            let result = expect_json(client.post(url).json(&body).send().await?).await?;

            if recursive {
                println!("Indexed {} files below {}", result["files"].as_u64().unwrap_or(0), path);
            } else {
                println!("Indexed {} segments from {}", result["segments"].as_u64().unwrap_or(0), path);
            }
        }

        Commands::Unindex { path } => {
            let response = client
                .delete(format!("{}/files", api))
                .query(&[("path", &path)])
                .send()
                .await?;
            expect_success(response).await?;
            println!("Removed {}", path);
        }

        Commands::Files => {
            let data = expect_json(client.get(format!("{}/files", api)).send().await?).await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                let files = data["files"].as_array().cloned().unwrap_or_default();
                if files.is_empty() {
                    println!("No files indexed yet.");
                } else {
                    println!("{:<6} {:<10} {:<28} {}", "ID", "Segments", "Indexed", "Path");
                    println!("{}", "-".repeat(80));
                    for file in files {
                        println!(
                            "{:<6} {:<10} {:<28} {}",
                            file["id"].as_i64().unwrap_or(0),
                            file["segments"].as_u64().unwrap_or(0),
                            file["indexed_at"].as_str().unwrap_or("-"),
                            file["path"].as_str().unwrap_or("-")
                        );
                    }
                }
            }
        }

        Commands::Query {
            start,
            end,
            network,
            station,
            location,
            channel,
            user,
            password,
            output,
        } => {
            let endpoint = if user.is_some() { "queryauth" } else { "query" };
            let mut params = vec![("start", start), ("end", end), ("nodata", "404".to_string())];
            for (key, value) in [
                ("net", network),
                ("sta", station),
                ("loc", location),
                ("cha", channel),
            ] {
                if let Some(value) = value {
                    params.push((key, value));
                }
            }

            let mut request = client
                .get(format!("{}/fdsnws/dataselect/1/{}", cli.api_url, endpoint))
                .query(&params);
            if let Some(user) = user {
                request = request.basic_auth(user, password);
            }

            let response = request.send().await?;
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                eprintln!("No data selected");
                std::process::exit(2);
            }
            let response = expect_success(response).await?;
            let data = response.bytes().await?;

            match output {
                Some(path) => {
                    std::fs::write(&path, &data)?;
                    println!("Wrote {} bytes to {:?}", data.len(), path);
                }
                None => std::io::stdout().write_all(&data)?,
            }
        }

        Commands::Mapping { action } => match action {
            MappingAction::List => {
                let data = expect_json(client.get(format!("{}/mappings", api)).send().await?).await?;
                if cli.format == "json" {
                    println!("{}", serde_json::to_string_pretty(&data)?);
                } else {
                    println!("{:<6} {:<18} {:<18} {:<28} {}", "ID", "Source", "Target", "Start", "End");
                    println!("{}", "-".repeat(100));
                    for mapping in data["mappings"].as_array().cloned().unwrap_or_default() {
                        println!(
                            "{:<6} {:<18} {:<18} {:<28} {}",
                            mapping["id"].as_i64().unwrap_or(0),
                            mapping["source"].as_str().unwrap_or("-"),
                            mapping["target"].as_str().unwrap_or("-"),
                            mapping["start"].as_str().unwrap_or("-"),
                            mapping["end"].as_str().unwrap_or("open")
                        );
                    }
                }
            }
            MappingAction::Add {
                source,
                target,
                start,
                end,
            } => {
                let body = serde_json::json!({
                    "source": source,
                    "target": target,
                    "start": start,
                    "end": end,
                });
                let created =
                    expect_json(client.post(format!("{}/mappings", api)).json(&body).send().await?)
                        .await?;
                println!(
                    "Created mapping {}: {} -> {}",
                    created["id"].as_i64().unwrap_or(0),
                    source,
                    target
                );
            }
            MappingAction::Remove { id } => {
                expect_success(client.delete(format!("{}/mappings/{}", api, id)).send().await?)
                    .await?;
                println!("Removed mapping {}", id);
            }
        },

        Commands::Restriction { action } => match action {
            RestrictionAction::List => {
                let data =
                    expect_json(client.get(format!("{}/restrictions", api)).send().await?).await?;
                if cli.format == "json" {
                    println!("{}", serde_json::to_string_pretty(&data)?);
                } else {
                    println!("{:<6} {:<10} {:<10} {}", "ID", "Network", "Station", "Users");
                    println!("{}", "-".repeat(60));
                    for restriction in data["restrictions"].as_array().cloned().unwrap_or_default() {
                        let users: Vec<&str> = restriction["users"]
                            .as_array()
                            .map(|u| u.iter().filter_map(|v| v.as_str()).collect())
                            .unwrap_or_default();
                        println!(
                            "{:<6} {:<10} {:<10} {}",
                            restriction["id"].as_i64().unwrap_or(0),
                            restriction["network"].as_str().unwrap_or("-"),
                            restriction["station"].as_str().unwrap_or("-"),
                            users.join(", ")
                        );
                    }
                }
            }
            RestrictionAction::Add {
                network,
                station,
                users,
            } => {
                let body = serde_json::json!({
                    "network": network,
                    "station": station,
                    "users": users,
                });
                let created = expect_json(
                    client.post(format!("{}/restrictions", api)).json(&body).send().await?,
                )
                .await?;
                println!(
                    "Restriction {} on {}.{}",
                    created["id"].as_i64().unwrap_or(0),
                    network,
                    station
                );
            }
            RestrictionAction::Remove { id } => {
                expect_success(client.delete(format!("{}/restrictions/{}", api, id)).send().await?)
                    .await?;
                println!("Removed restriction {}", id);
            }
        },

        Commands::Config { output } => {
            let config = seisvault::config::generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

async fn expect_success(response: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    fail(&format!("Request failed ({}): {}", status, text))
}

async fn expect_json(response: reqwest::Response) -> anyhow::Result<serde_json::Value> {
    Ok(expect_success(response).await?.json().await?)
}

fn fail(message: &str) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}
