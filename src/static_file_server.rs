use crate::{
    config::{HeaderSet, ServerConfig},
    error::{Result, ServeError},
    file::File,
    listing::Listing,
    resolve::{Target, encoded_path, percent_decode, resolve, split_url},
};
use std::{
    io::{self, Cursor},
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
};
use tiny_http::{Header, Method, Request, Response, ResponseBox, Server};
use tracing::{debug, info, warn};

const INDEX_FILES: [&str; 2] = ["index.html", "index.htm"];

/// Request handling state shared read-only by every request thread.
pub struct StaticFileServer {
    root: PathBuf,
    headers: HeaderSet,
}

impl StaticFileServer {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let invalid_root = |source| ServeError::InvalidRoot {
            path: config.root.clone(),
            source,
        };

        let root = config.root.canonicalize().map_err(invalid_root)?;

        if !root.is_dir() {
            return Err(invalid_root(io::ErrorKind::NotADirectory.into()));
        }

        Ok(Self {
            root,
            headers: config.headers.clone(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Builds the full response for a request, configured headers included.
    pub fn handle(&self, method: &Method, url: &str) -> ResponseBox {
        let response = self.dispatch(method, url).unwrap_or_else(|error| {
            debug!(%error, "request failed");
            error_response(&error)
        });

        self.inject_headers(response)
    }

    pub fn inject_headers(&self, mut response: ResponseBox) -> ResponseBox {
        for header in self.headers.iter() {
            response.add_header(header.clone());
        }

        response
    }

    fn dispatch(&self, method: &Method, url: &str) -> Result<ResponseBox> {
        match method {
            Method::Get | Method::Head => self.serve(url),
            Method::Options => Ok(options_response()),
            other => Err(ServeError::UnsupportedMethod(other.to_string())),
        }
    }

    fn serve(&self, url: &str) -> Result<ResponseBox> {
        let (path, query) = split_url(url);

        let dir = match resolve(&self.root, path)? {
            Target::File(file) => return serve_file(file, path),
            Target::Directory(dir) => dir,
        };

        if !path.ends_with('/') {
            let mut location =
                encoded_path(path).ok_or_else(|| ServeError::NotFound(path.into()))?;
            location.push('/');

            if let Some(query) = query {
                location.push('?');
                location += &encode_query(query);
            }

            return redirect(&location).ok_or_else(|| ServeError::NotFound(path.into()));
        }

        for index in INDEX_FILES {
            match resolve(&self.root, &format!("{path}{index}")) {
                Ok(Target::File(file)) => return serve_file(file, path),
                Ok(Target::Directory(_)) | Err(ServeError::NotFound(_)) => {}
                Err(error) => return Err(error),
            }
        }

        let display_path = percent_decode(path).unwrap_or_else(|| path.into());
        let listing =
            Listing::read(&dir, &display_path).map_err(|error| ServeError::from_io(error, path))?;

        let response: Response<Cursor<Vec<u8>>> = listing.into();
        Ok(response.boxed())
    }

    fn respond(&self, request: Request) {
        let method = request.method().clone();
        let url = request.url().to_owned();
        let peer = request
            .remote_addr()
            .map_or_else(|| "-".into(), |addr| addr.to_string());

        let response = self.handle(&method, &url);
        let status = response.status_code().0;

        info!(%method, path = %url, %peer, status, "request");

        if let Err(error) = request.respond(response) {
            debug!(%error, %peer, "could not write response");
        }
    }
}

fn serve_file(path: PathBuf, request_path: &str) -> Result<ResponseBox> {
    File::new(path)
        .response()
        .map_err(|error| ServeError::from_io(error, request_path))
}

fn error_response(error: &ServeError) -> ResponseBox {
    let status = error.status_code();
    let mut response =
        Response::from_string(format!("{status} {}\n", error.reason())).with_status_code(status);

    if let Ok(header) = Header::from_bytes("Content-Type", "text/plain; charset=utf-8") {
        response = response.with_header(header);
    }

    response.boxed()
}

fn options_response() -> ResponseBox {
    let mut response = Response::empty(200);

    if let Ok(header) = Header::from_bytes("Allow", "GET, HEAD, OPTIONS") {
        response = response.with_header(header);
    }

    response.boxed()
}

/// Escapes whatever a raw query carries that cannot go into a header value.
fn encode_query(query: &str) -> String {
    let mut encoded = String::with_capacity(query.len());

    for byte in query.bytes() {
        if byte.is_ascii_graphic() {
            encoded.push(byte as char);
        } else {
            encoded += &format!("%{byte:02X}");
        }
    }

    encoded
}

fn redirect(location: &str) -> Option<ResponseBox> {
    let header = Header::from_bytes("Location", location).ok()?;
    Some(Response::empty(301).with_header(header).boxed())
}

/// Stops a running server from another thread, e.g. a signal handler.
#[derive(Clone)]
pub struct ShutdownHandle {
    server: Weak<Server>,
    stopping: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(server) = self.server.upgrade() {
            server.unblock();
        }
    }
}

pub struct RunningServer {
    addr: SocketAddr,
    server: Arc<Server>,
    stopping: Arc<AtomicBool>,
    acceptor: Option<JoinHandle<()>>,
}

impl RunningServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            server: Arc::downgrade(&self.server),
            stopping: Arc::clone(&self.stopping),
        }
    }

    /// Stops accepting, waits for in-flight requests, then releases the port.
    pub fn shutdown(mut self) {
        self.shutdown_handle().shutdown();
        self.join();
    }

    /// Blocks until a [`ShutdownHandle`] stops the server.
    pub fn wait(mut self) {
        self.join();
    }

    fn join(&mut self) {
        let Some(acceptor) = self.acceptor.take() else {
            return;
        };

        if acceptor.join().is_err() {
            warn!("acceptor thread panicked");
        }

        info!(addr = %self.addr, "server stopped");
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        self.shutdown_handle().shutdown();
        self.join();
    }
}

pub fn start(config: ServerConfig) -> Result<RunningServer> {
    start_with(config, |_| {})
}

/// Starts the server and calls `on_bound` once the listener is bound.
pub fn start_with<F>(config: ServerConfig, on_bound: F) -> Result<RunningServer>
where
    F: FnOnce(SocketAddr),
{
    let site = Arc::new(StaticFileServer::new(&config)?);
    let (server, requested) = bind_with_fallback(&config)?;
    let server = Arc::new(server);
    let addr = server.server_addr().to_ip().unwrap_or(requested);
    let stopping = Arc::new(AtomicBool::new(false));

    info!(%addr, root = %site.root().display(), "listening");

    let acceptor = thread::Builder::new()
        .name("acceptor".into())
        .spawn({
            let server = Arc::clone(&server);
            let stopping = Arc::clone(&stopping);
            move || accept(&server, site, &stopping)
        })
        .map_err(|source| ServeError::StartupFailure {
            addr,
            source: Box::new(source),
        })?;

    on_bound(addr);

    Ok(RunningServer {
        addr,
        server,
        stopping,
        acceptor: Some(acceptor),
    })
}

fn bind(host: IpAddr, port: u16) -> Result<(Server, SocketAddr)> {
    let addr = SocketAddr::new(host, port);

    match Server::http(addr) {
        Ok(server) => Ok((server, addr)),
        Err(source) => {
            let in_use = source
                .downcast_ref::<io::Error>()
                .is_some_and(|error| error.kind() == io::ErrorKind::AddrInUse);

            if in_use {
                Err(ServeError::PortUnavailable { port })
            } else {
                Err(ServeError::StartupFailure { addr, source })
            }
        }
    }
}

fn bind_with_fallback(config: &ServerConfig) -> Result<(Server, SocketAddr)> {
    match (bind(config.host, config.port), config.fallback_port) {
        (Err(ServeError::PortUnavailable { port }), Some(fallback)) => {
            warn!(port, fallback, "port is already in use, trying fallback");
            bind(config.host, fallback)
        }
        (result, _) => result,
    }
}

fn accept(server: &Server, site: Arc<StaticFileServer>, stopping: &AtomicBool) {
    let mut in_flight: Vec<JoinHandle<()>> = vec![];

    loop {
        let request = match server.recv() {
            Ok(request) => request,
            Err(_) if stopping.load(Ordering::SeqCst) => break,
            Err(error) => {
                warn!(%error, "failed to accept request");
                continue;
            }
        };

        in_flight.retain(|handle| !handle.is_finished());

        let site = Arc::clone(&site);
        let spawned = thread::Builder::new()
            .name("request".into())
            .spawn(move || site.respond(request));

        match spawned {
            Ok(handle) => in_flight.push(handle),
            Err(error) => warn!(%error, "could not spawn request thread"),
        }
    }

    for handle in in_flight {
        let _ = handle.join();
    }
}
