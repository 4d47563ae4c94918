//! WebRTC Play Client Example
//!
//! Requests a stream from a streaming server over WebSocket signaling,
//! negotiates a receive-only WebRTC session and reports counters until
//! Ctrl+C or until the server closes the channel.
//!
//! Usage: cargo run --example play_client -- <signaling-url> <application> <stream> [param1]
//!
//! Example:
//!   cargo run --example play_client -- wss://example.com/webrtc-session.json live myStream

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use webrtc_play::{PlayClient, PlayConfig};

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        eprintln!("Usage: {} <signaling-url> <application> <stream> [param1]", args[0]);
        std::process::exit(1);
    }

    let mut config = PlayConfig::new(&args[1], &args[2], &args[3]);
    config.user_data = args.get(4).cloned();

    // Setup Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        println!("\nStopping...");
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    let runtime = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    runtime.block_on(async move {
        let mut client = match PlayClient::connect(config).await {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to start play session: {}", e);
                return;
            }
        };

        let mut errors = client.take_errors();

        while running.load(Ordering::SeqCst) && !client.is_finished() {
            tokio::time::sleep(Duration::from_secs(1)).await;

            if let Some(rx) = errors.as_mut() {
                while let Ok(e) = rx.try_recv() {
                    eprintln!("Session error: {}", e);
                }
            }

            let stats = client.stats();
            println!(
                "Tracks: {}  Packets: {}  Bytes: {}",
                stats.tracks.load(Ordering::Relaxed),
                stats.packets_received.load(Ordering::Relaxed),
                stats.bytes_received.load(Ordering::Relaxed),
            );
        }

        match client.disconnect().await {
            Ok(Some(stream_info)) => println!("Session {} finished", stream_info.session_id.as_str()),
            Ok(None) => println!("Session finished before the channel opened"),
            Err(e) => eprintln!("Session ended with error: {}", e),
        }
    });
}
