//! TrackNow CLI: a terminal front-end over the inventory engine and the
//! capture pipeline.

mod config;

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use tracknow_auth::{LocalSessionProvider, SessionProvider};
use tracknow_capture::{CaptureSession, CaptureState, ClassifierClient, FileCamera};
use tracknow_engine::{InventoryEngine, ResultsView};
use tracknow_store::{InMemoryStore, RemoteStore, RestStore};

use crate::config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracknow_observability::init();

    let config = AppConfig::from_env();

    let store: Arc<dyn RemoteStore> = match &config.store_url {
        Some(url) => Arc::new(RestStore::with_poll_interval(
            url.clone(),
            config.poll_interval,
        )),
        None => {
            tracing::warn!("TRACKNOW_STORE_URL not set; using the in-memory store");
            Arc::new(InMemoryStore::new())
        }
    };

    let sessions = LocalSessionProvider::new();
    let owner = sessions
        .sign_up("demo@tracknow.local", "demo-password")
        .await?;
    tracing::info!(owner = %owner, "session opened");

    let engine = InventoryEngine::new(store.clone());
    let results = ResultsView::new(store.clone());
    engine.start(owner);
    results.start(owner);

    let mut capture = match (&config.camera_file, &config.vision) {
        (Some(camera_file), Some(vision)) => {
            let mut session = CaptureSession::new(
                Box::new(FileCamera::new(camera_file)),
                Box::new(ClassifierClient::new(vision.clone())),
            );
            if let Err(err) = session.start() {
                tracing::warn!("capture disabled: {err}");
            }
            Some(session)
        }
        _ => {
            tracing::info!(
                "set TRACKNOW_CAMERA_FILE, TRACKNOW_VISION_ENDPOINT and TRACKNOW_VISION_KEY to enable capture"
            );
            None
        }
    };

    println!("commands: ls | add <qty> <name> | inc <n> | dec <n> | rm <n> | results | snap | name <text> | q+ | q- | confirm | quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            continue;
        };
        let rest: Vec<&str> = parts.collect();

        match command {
            "ls" => {
                let items = engine.items();
                if items.is_empty() {
                    println!("no items in inventory");
                }
                for (n, item) in items.iter().enumerate() {
                    println!("{:>3}. {} x{}", n + 1, item.name, item.quantity);
                }
            }
            "add" => {
                let quantity = rest.first().and_then(|q| q.parse::<i64>().ok());
                let name = rest.get(1..).map(|n| n.join(" ")).unwrap_or_default();
                match quantity {
                    Some(quantity) => {
                        if let Err(err) = engine.add(&name, quantity).await {
                            println!("error: {err}");
                        }
                    }
                    None => println!("usage: add <qty> <name>"),
                }
            }
            "inc" | "dec" | "rm" => {
                let Some(id) = rest
                    .first()
                    .and_then(|n| n.parse::<usize>().ok())
                    .and_then(|n| engine.items().get(n.wrapping_sub(1)).map(|i| i.id))
                else {
                    println!("usage: {command} <n> (see ls)");
                    continue;
                };
                let outcome = match command {
                    "inc" => engine.increment_quantity(id).await,
                    "dec" => engine.decrement_or_remove(id).await,
                    _ => engine.remove(id).await,
                };
                if let Err(err) = outcome {
                    println!("error: {err}");
                }
            }
            "results" => {
                for row in results.rows(&engine.items()) {
                    match row.enrichment {
                        Some(api) => println!("{} x{} [{}]", row.item.name, row.item.quantity, api.name),
                        None => println!("{} x{}", row.item.name, row.item.quantity),
                    }
                }
            }
            "snap" | "name" | "q+" | "q-" | "confirm" => {
                let Some(session) = capture.as_mut() else {
                    println!("capture is not configured");
                    continue;
                };
                match command {
                    "snap" => {
                        if session.state() == CaptureState::Idle {
                            let _ = session.start();
                        }
                        match session.capture().await {
                            Ok(()) => {
                                let draft = session.draft();
                                let suggested =
                                    draft.map(|d| d.suggested_name().to_string()).unwrap_or_default();
                                println!("captured; suggested name: {suggested:?}");
                            }
                            Err(err) => println!("error: {err}"),
                        }
                    }
                    "name" => session.set_name(&rest.join(" ")),
                    "q+" => session.increment_quantity(),
                    "q-" => session.decrement_quantity(),
                    _ => match session.confirm(&engine).await {
                        Ok(id) => println!("added {id}"),
                        Err(err) => println!("error: {err}"),
                    },
                }
            }
            "quit" | "exit" => break,
            other => println!("unknown command: {other}"),
        }
    }

    if let Some(mut session) = capture.take() {
        session.stop();
    }
    results.stop();
    engine.stop();
    sessions.sign_out().await;

    Ok(())
}
