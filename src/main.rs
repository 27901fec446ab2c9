use std::env;

use anipoll_results::config::Config;
use anipoll_results::session::Session;
use anipoll_results::view::{ResultsView, ViewAction};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = Config::from_env()?;
    let session = Session::load(&config.session_path);

    // Survey id from the first argument, falling back to the environment
    let survey_id = match env::args().nth(1).or_else(|| env::var("RESULTS_SURVEY_ID").ok()) {
        Some(id) if !id.trim().is_empty() => id.trim().to_string(),
        _ => return Err("usage: anipoll-results <survey-id> (or set RESULTS_SURVEY_ID)".into()),
    };

    let mut view = ResultsView::mount(&config, &session, &survey_id)?;
    println!("{}", view.render());
    println!("commands: n(ext), p(rev), s(ort text), t(oggle text), q(uit)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            _ = view.changed() => {
                println!("{}", view.render());
            }
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => {
                        let input = line.trim();
                        if input.eq_ignore_ascii_case("q") || input.eq_ignore_ascii_case("quit") {
                            break;
                        }
                        match ViewAction::parse(input) {
                            Some(action) => {
                                view.handle(action);
                                println!("{}", view.render());
                            }
                            None if input.is_empty() => {}
                            None => warn!("Unknown command: {}", input),
                        }
                    }
                    // stdin closed: keep following the feed until interrupted
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        warn!("Failed to read command: {}", e);
                        break;
                    }
                }
            }
        }
    }

    view.unmount().await;
    Ok(())
}
