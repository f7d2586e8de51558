/*
    spotify-recs-rs | Rust CLI tool to generate Spotify track recommendations.
    Copyright (C) 2025  spotify-recs-rs contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use recs_core::{
    auth, begin_auth, build_agent, retry, Credential, MusicApi, RecommendError, Recommender,
    RetryPolicy, SpotifyClient,
};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "spotify-recs")]
#[command(about = "Track recommendations from your Spotify listening history", long_about = None)]
struct Cli {
    /// Where the bearer token is saved between runs
    #[arg(long, global = true, default_value = ".spotify_token")]
    token_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Signs in with Spotify and saves the bearer token
    Login,
    /// Generates track recommendations for a selection
    Recommend {
        /// What to base the recommendations on, e.g. "Based on my top tracks",
        /// "Based on my top artists", a genre name, or "Surprise Me!"
        #[arg(value_name = "SELECTION")]
        selection: String,

        /// How many songs to request (1-20)
        #[arg(short, long, default_value_t = 10)]
        count: u32,

        /// Output the recommendations to a JSON file (e.g., --json=recs.json)
        #[arg(long)]
        json: Option<String>,

        /// Retry upstream failures this many times with backoff
        #[arg(long, default_value_t = 0)]
        retries: u32,
    },
    /// Lets a language model decide which recommendation strategy to use
    Agent {
        /// Free-form instruction, e.g. "based on my top artists"
        #[arg(value_name = "INSTRUCTION")]
        instruction: String,

        /// How many songs to request (1-20)
        #[arg(short, long, default_value_t = 10)]
        count: u32,
    },
    /// Forgets the saved token so the next run re-authenticates
    Logout,
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if dotenv().is_err() {
        // Silently ignore
    }

    let cli = Cli::parse();

    match &cli.command {
        Commands::Login => {
            handle_login(&cli.token_file).await;
        }
        Commands::Recommend {
            selection,
            count,
            json,
            retries,
        } => {
            handle_recommend(selection, *count, json.as_deref(), *retries, &cli.token_file).await;
        }
        Commands::Agent { instruction, count } => {
            handle_agent(instruction, *count, &cli.token_file).await;
        }
        Commands::Logout => {
            handle_logout(&cli.token_file);
        }
    }
}

/// Runs the full sign-in flow and persists the resulting token.
async fn interactive_login(token_file: &Path) -> anyhow::Result<Credential> {
    let pending = begin_auth()?;

    println!("Open this URL in your browser and authorize the app:");
    println!();
    println!("  {}", pending.authorize_url());
    println!();
    print!("Paste the URL you were redirected to: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("failed to read the redirected URL")?;

    let credential = pending.complete(line.trim()).await?;
    auth::save_token(token_file, &credential)?;
    println!("Token saved to {}", token_file.display());

    Ok(credential)
}

/// Uses the saved token when present, otherwise signs in interactively.
async fn obtain_credential(token_file: &Path) -> anyhow::Result<Credential> {
    if let Some(credential) = auth::load_token(token_file)? {
        log::debug!("using saved token from {}", token_file.display());
        return Ok(credential);
    }
    interactive_login(token_file).await
}

async fn handle_login(token_file: &Path) {
    if let Err(e) = interactive_login(token_file).await {
        eprintln!();
        eprintln!("Login failed: {:#}", e);
        process::exit(1);
    }
}

async fn handle_recommend(
    selection: &str,
    count: u32,
    json_path: Option<&str>,
    retries: u32,
    token_file: &Path,
) {
    let credential = match obtain_credential(token_file).await {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error obtaining credentials: {:#}", e);
            process::exit(1);
        }
    };
    let recommender = Recommender::new(Arc::new(SpotifyClient::new(&credential)));

    println!("Creating a playlist recommendation with {} songs...", count);

    let result = if retries > 0 {
        let policy = RetryPolicy {
            attempts: retries,
            base_delay: Duration::from_millis(500),
        };
        retry::retry(
            policy,
            |e| matches!(e, RecommendError::Upstream { .. }),
            || recommender.resolve_and_recommend(selection, count),
        )
        .await
    } else {
        recommender.resolve_and_recommend(selection, count).await
    };

    match result {
        Ok(recommendation) => {
            println!();
            println!("---------------------------------------------------");
            println!("RECOMMENDATIONS");
            println!("---------------------------------------------------");

            if recommendation.is_empty() {
                println!("The catalog returned no tracks for this selection.");
            } else {
                for (i, track) in recommendation.tracks.iter().enumerate() {
                    println!("{}. {}", i + 1, track);
                }
            }

            if let Some(path) = json_path {
                match File::create(path) {
                    Ok(mut file) => {
                        let json_content =
                            serde_json::to_string_pretty(&recommendation).unwrap_or_default();
                        if let Err(e) = file.write_all(json_content.as_bytes()) {
                            eprintln!();
                            eprintln!("[ERROR] Failed to write report to file: {}", e);
                        } else {
                            println!();
                            println!("[SAVED] Recommendations saved to: {}", path);
                        }
                    }
                    Err(e) => eprintln!("[ERROR] Failed to create file '{}': {}", path, e),
                }
            }
        }
        Err(RecommendError::AuthRequired) => {
            eprintln!();
            eprintln!("Your Spotify token was rejected. Run 'recs-cli login' to re-authenticate.");
            process::exit(1);
        }
        Err(e) => {
            eprintln!();
            eprintln!("Recommendation failed: {}", e);
            process::exit(1);
        }
    }
}

async fn handle_agent(instruction: &str, count: u32, token_file: &Path) {
    let credential = match obtain_credential(token_file).await {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error obtaining credentials: {:#}", e);
            process::exit(1);
        }
    };

    let api: Arc<dyn MusicApi> = Arc::new(SpotifyClient::new(&credential));
    let agent = match build_agent(api) {
        Ok(agent) => agent,
        Err(e) => {
            eprintln!("Error building agent: {}", e);
            process::exit(1);
        }
    };

    println!("Asking the agent for {} songs...", count);

    match agent.run(instruction, count).await {
        Ok(turn) => {
            println!();
            println!("{}", turn.narrative);
            if !turn.tools_invoked.is_empty() {
                println!();
                println!("Tools used: {}", turn.tools_invoked.join(", "));
            }
        }
        Err(e) => {
            eprintln!();
            eprintln!("Agent run failed: {}", e);
            process::exit(1);
        }
    }
}

fn handle_logout(token_file: &Path) {
    match auth::invalidate(token_file) {
        Ok(()) => println!("Saved token cleared. The next command will re-authenticate."),
        Err(e) => {
            eprintln!("Logout failed: {}", e);
            process::exit(1);
        }
    }
}
