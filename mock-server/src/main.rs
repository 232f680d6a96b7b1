use tokio::net::TcpListener;

/// Stand-alone echo server for poking at the client by hand.
///
/// `HOST` and `PORT` override the bind address (default `127.0.0.1:3000`).
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    println!("echo server listening on {addr}");
    println!("routes: /echo /status/{{code}} /json /scalar /text /bytes/{{n}} /delay/{{ms}} /headers");
    mock_server::run(listener).await
}
