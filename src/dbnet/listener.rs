//! Accept loop (spec §6's transport table). Grounded on the teacher's
//! `dbnet/listener.rs` `BaseListener`/`connect()` shape — bind, wrap a
//! connection-limit guard, hold a `broadcast::Sender` for shutdown — with
//! the TLS variant dropped (Non-goal: authentication/transport security
//! isn't named, but TLS is absent from spec §6 entirely) and the
//! `Semaphore` connection-limiter replaced by a plain counter, since spec
//! DESIGN NOTES §9 resolves client overflow as "refuse immediately", never
//! "wait for a free slot".

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use socket2::SockRef;
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::broadcast;

use crate::dbnet::connection;
use crate::server::Server;
use crate::util::error::GibsonResult;

enum Transport {
    Tcp(TcpListener),
    Unix(UnixListener),
}

/// Binds the configured transport and drives the accept loop until
/// shutdown is signaled (spec §4.7's destructor path: "stop the
/// reactor"). Must run inside a `LocalSet` context (entered once, in
/// `main`) since each accepted connection is handed to
/// `tokio::task::spawn_local`.
pub async fn serve(server: Server, shutdown_tx: broadcast::Sender<()>) -> GibsonResult<()> {
    let transport = bind(&server).await?;
    let mut accept_shutdown_rx = shutdown_tx.subscribe();

    loop {
        if server.is_shutting_down() {
            return Ok(());
        }

        let accepted = match &transport {
            Transport::Tcp(listener) => {
                tokio::select! {
                    biased;
                    _ = accept_shutdown_rx.recv() => return Ok(()),
                    res = listener.accept() => res.map(|(stream, _addr)| AcceptedStream::Tcp(stream)),
                }
            }
            Transport::Unix(listener) => {
                tokio::select! {
                    biased;
                    _ = accept_shutdown_rx.recv() => return Ok(()),
                    res = listener.accept() => res.map(|(stream, _addr)| AcceptedStream::Unix(stream)),
                }
            }
        };

        let stream = match accepted {
            Ok(s) => s,
            Err(e) => {
                log::warn!("accept failed: {e}");
                continue;
            }
        };

        let (max_clients, max_idletime, now) = {
            let inner = server.inner().borrow();
            (inner.config.max_clients, inner.config.max_idletime, inner.clock.now())
        };
        let nclients = server.inner().borrow().clients.len();
        if nclients >= max_clients {
            log::warn!("refusing connection: at max_clients ({max_clients})");
            drop(stream);
            continue;
        }

        let last_seen = Rc::new(Cell::new(now));
        let (client_id, close_rx) = server.register_client(Rc::clone(&last_seen));
        let client = connection::Client { last_seen };
        let server = server.clone();
        let shutdown_rx = shutdown_tx.subscribe();

        tokio::task::spawn_local(async move {
            match stream {
                AcceptedStream::Tcp(stream) => {
                    let _ = stream.set_nodelay(true);
                    set_tcp_keepalive(&stream, max_idletime);
                    connection::run(server.clone(), stream, client, shutdown_rx, close_rx).await;
                }
                AcceptedStream::Unix(stream) => {
                    connection::run(server.clone(), stream, client, shutdown_rx, close_rx).await;
                }
            }
            server.deregister_client(client_id);
        });
    }
}

/// Sets TCP keepalive with an interval of `max_idletime` (spec §6:
/// "keepalive-interval = max_idletime"). Best-effort: a platform that
/// refuses the option still gets its connection served, just without the
/// extra liveness probing.
fn set_tcp_keepalive(stream: &tokio::net::TcpStream, max_idletime: u64) {
    let sock = SockRef::from(stream);
    let params = socket2::TcpKeepalive::new()
        .with_time(Duration::from_secs(max_idletime))
        .with_interval(Duration::from_secs(max_idletime));
    if let Err(e) = sock.set_tcp_keepalive(&params) {
        log::debug!("failed to set tcp keepalive: {e}");
    }
}

enum AcceptedStream {
    Tcp(tokio::net::TcpStream),
    Unix(tokio::net::UnixStream),
}

async fn bind(server: &Server) -> GibsonResult<Transport> {
    let (unix_socket, address, port) = {
        let inner = server.inner().borrow();
        (inner.config.unix_socket.clone(), inner.config.address, inner.config.port)
    };

    if let Some(path) = unix_socket {
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path)
            .map_err(|e| crate::util::error::GibsonError::io_extra(e, format!("binding unix socket {}", path.display())))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o777));
        }
        log::info!("listening on unix socket {}", path.display());
        Ok(Transport::Unix(listener))
    } else {
        let listener = TcpListener::bind((address, port))
            .await
            .map_err(|e| crate::util::error::GibsonError::io_extra(e, format!("binding to {address}:{port}")))?;
        log::info!("listening on {address}:{port}");
        Ok(Transport::Tcp(listener))
    }
}
