use chrono::Local;
use clap::Parser;
use imsession::receipt_cache::MessageReceiptCache;
use imsession::store::FileStore;
use imsession::transport::TokioWebSocketTransportFactory;
use imsession::{Client, ClientConfig};
use log::{error, info, warn};
use std::sync::Arc;

// A demo client that logs in, prints every inbound message and echoes it
// back to the conversation it came from.
//
// Usage:
//   cargo run -- --url ws://localhost:8080 --peer-id alice
//   cargo run -- --url ws://localhost:8080 --peer-id alice --store-dir ./state --tag mobile

#[derive(Parser, Debug)]
#[command(about = "Session protocol demo client")]
struct Args {
    /// WebSocket endpoint of the messaging server.
    #[arg(long)]
    url: String,
    #[arg(long)]
    peer_id: String,
    /// Directory for tokens, signatures and the message depot.
    #[arg(long, default_value = "imsession-store")]
    store_dir: String,
    #[arg(long)]
    tag: Option<String>,
    /// Only print inbound messages instead of echoing them back.
    #[arg(long)]
    no_echo: bool,
}

fn main() {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{:<5}] [{}] - {}",
                Local::now().format("%H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to build tokio runtime: {e}");
            return;
        }
    };

    rt.block_on(async {
        let backend = match FileStore::new(&args.store_dir).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!("Failed to create file store at {}: {e}", args.store_dir);
                return;
            }
        };
        info!("File store initialized at {}", args.store_dir);

        let mut config = ClientConfig::new(args.peer_id.clone());
        config.tag = args.tag.clone();

        let client = match Client::new(
            config,
            backend,
            Arc::new(MessageReceiptCache::new()),
            Arc::new(TokioWebSocketTransportFactory::new(args.url.clone())),
            None,
        )
        .await
        {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to create client: {e}");
                return;
            }
        };

        let mut opened = client.events().session_opened.subscribe();
        let mut messages = client.events().message.subscribe();
        let mut failures = client.events().operation_failed.subscribe();

        let echo_client = client.clone();
        let echo = !args.no_echo;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok(event) = opened.recv() => {
                        info!("Session open for {}", event.peer_id);
                    }
                    Ok(event) = messages.recv() => {
                        let message = &event.message;
                        info!("[{}] {}: {}", message.conversation_id, message.from, message.content);
                        if echo && message.from != echo_client.session().peer_id() {
                            if let Err(e) = echo_client
                                .send_message(&message.conversation_id, &message.content, true, false)
                                .await
                            {
                                warn!("Failed to echo message: {e}");
                            }
                        }
                    }
                    Ok(event) = failures.recv() => {
                        warn!("{} failed: {}", event.operation, event.error);
                    }
                    else => break,
                }
            }
        });

        client.open();
        let runner = {
            let client = client.clone();
            tokio::spawn(async move { client.run().await })
        };

        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {e}");
        }
        info!("Shutting down");
        client.disconnect().await;
        let _ = runner.await;
    });
}
