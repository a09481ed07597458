//! Shared helpers for the loopback integration tests.

use std::net::SocketAddr;
use std::thread::{self, JoinHandle};

use sntp_liar::{LiarServer, Result, ServerConfig, ServerState, StopHandle};

pub struct RunningServer {
    pub addr: SocketAddr,
    stop: StopHandle,
    worker: JoinHandle<(Result<()>, ServerState)>,
}

impl RunningServer {
    /// Stops the server and returns what `serve` returned and the final state.
    pub fn shutdown(self) -> (Result<()>, ServerState) {
        self.stop.stop().expect("failed to wake server");
        self.worker.join().expect("server thread panicked")
    }
}

/// Bind a liar server on an ephemeral loopback port and serve on a thread.
pub fn spawn_liar_server(lying_seconds: i64) -> RunningServer {
    let config = ServerConfig::new("127.0.0.1", 0)
        .with_lying_seconds(lying_seconds)
        .expect("offset in range");
    spawn_with_config(config)
}

/// Bind a server with an explicit config on a thread.
#[allow(dead_code)]
pub fn spawn_with_config(config: ServerConfig) -> RunningServer {
    let mut server = LiarServer::new(config);
    let addr = server.bind().expect("failed to bind test server");
    let stop = server.stop_handle().expect("server is bound");
    let worker = thread::spawn(move || {
        let result = server.serve();
        (result, server.state())
    });
    RunningServer { addr, stop, worker }
}
