//! Tiny origin server for trying the load balancer locally.
//!
//! Echoes the request body, or the server's name when the body is empty, so it
//! is easy to see which backend handled a request.

use axum::{
    http::{Method, Uri},
    routing::get,
    Router,
};
use clap::Parser;
use std::net::SocketAddr;

#[derive(Parser)]
#[command(name = "mock-origin")]
struct Args {
    #[arg(short, long, default_value_t = 8081)]
    port: u16,

    /// Reply for empty-bodied requests. Defaults to `origin-<port>`.
    #[arg(short, long)]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let name = args.name.unwrap_or_else(|| format!("origin-{}", args.port));

    let reply = name.clone();
    let app = Router::new()
        .route("/status", get(|| async { "ok" }))
        .fallback(move |method: Method, uri: Uri, body: String| {
            let reply = reply.clone();
            async move {
                println!("{} {} {} ({} bytes)", reply, method, uri, body.len());
                if body.is_empty() {
                    reply
                } else {
                    body
                }
            }
        });

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("{} listening on http://{}", name, addr);

    axum::serve(listener, app).await?;
    Ok(())
}
