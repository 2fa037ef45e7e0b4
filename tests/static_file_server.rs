use static_file_server::{HeaderOption, ServeError, ServerConfig, start, start_with};
use std::{
    fs::{create_dir, write},
    io::{Read, Write},
    net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream},
    path::PathBuf,
    sync::mpsc,
    thread,
    time::{Duration, Instant},
};
use tempfile::TempDir;

const CORS_HEADERS: [&str; 3] = [
    "access-control-allow-origin",
    "access-control-allow-methods",
    "access-control-allow-headers",
];

struct Reply {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Reply {
    fn header(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
            .collect()
    }
}

fn send(addr: SocketAddr, method: &str, path: &str) -> Reply {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    write!(
        stream,
        "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
    )
    .unwrap();

    let mut raw = vec![];
    stream.read_to_end(&mut raw).unwrap();

    let split = raw
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .expect("response has no header terminator");
    let head = String::from_utf8_lossy(&raw[..split]).into_owned();
    let body = raw[split + 4..].to_vec();

    let mut lines = head.lines();
    let status = lines
        .next()
        .and_then(|line| line.split(' ').nth(1))
        .and_then(|code| code.parse().ok())
        .expect("malformed status line");
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_lowercase(), value.trim().to_owned()))
        .collect();

    Reply {
        status,
        headers,
        body,
    }
}

/// Lays out `<tmp>/www/index.html` with `<tmp>/secret.txt` just outside the root.
fn fixture() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("www");
    create_dir(&root).unwrap();
    create_dir(root.join("assets")).unwrap();
    write(root.join("index.html"), "<h1>hi</h1>").unwrap();
    write(root.join("assets").join("app.js"), "console.log('hi');").unwrap();
    write(root.join("assets").join("blob.bin"), [0u8, 159, 146, 150, 255]).unwrap();
    write(dir.path().join("secret.txt"), "top secret").unwrap();
    (dir, root)
}

fn local(root: &PathBuf) -> ServerConfig {
    ServerConfig::new(root).host(Ipv4Addr::LOCALHOST).port(0)
}

#[test]
fn serves_the_basic_scenario() {
    let (_dir, root) = fixture();
    let config = local(&root).with(HeaderOption::Cors).unwrap();
    let server = start(config).unwrap();
    let addr = server.addr();

    let page = send(addr, "GET", "/index.html");
    assert_eq!(page.status, 200);
    assert_eq!(page.body, b"<h1>hi</h1>");
    assert_eq!(page.header("content-type"), ["text/html"]);

    let escape = send(addr, "GET", "/../secret.txt");
    assert_eq!(escape.status, 403);
    assert!(!String::from_utf8_lossy(&escape.body).contains("top secret"));

    assert_eq!(send(addr, "GET", "/missing.html").status, 404);

    let preflight = send(addr, "OPTIONS", "/");
    assert_eq!(preflight.status, 200);
    assert!(preflight.body.is_empty());
    for name in CORS_HEADERS {
        assert_eq!(preflight.header(name).len(), 1, "{name}");
    }

    server.shutdown();
}

#[test]
fn serves_exact_bytes_and_types() {
    let (_dir, root) = fixture();
    let server = start(local(&root)).unwrap();

    let script = send(server.addr(), "GET", "/assets/app.js");
    assert_eq!(script.status, 200);
    assert_eq!(script.header("content-type"), ["application/javascript"]);

    let blob = send(server.addr(), "GET", "/assets/blob.bin");
    assert_eq!(blob.status, 200);
    assert_eq!(blob.body, [0u8, 159, 146, 150, 255]);
    assert_eq!(blob.header("content-type"), ["application/octet-stream"]);
}

#[test]
fn every_status_carries_each_configured_header_once() {
    let (_dir, root) = fixture();
    let config = local(&root)
        .with(HeaderOption::Cors)
        .and_then(|config| config.with(HeaderOption::NoCache))
        .and_then(|config| config.with(HeaderOption::Csp("default-src 'self'".into())))
        .unwrap();
    let server = start(config).unwrap();

    let requests = [
        ("GET", "/index.html", 200),
        ("HEAD", "/index.html", 200),
        ("GET", "/assets", 301),
        ("GET", "/assets/", 200),
        ("GET", "/../secret.txt", 403),
        ("GET", "/nope", 404),
        ("OPTIONS", "/anything", 200),
        ("DELETE", "/index.html", 501),
        ("POST", "/index.html", 501),
    ];

    for (method, path, status) in requests {
        let reply = send(server.addr(), method, path);
        assert_eq!(reply.status, status, "{method} {path}");

        for name in CORS_HEADERS
            .into_iter()
            .chain(["cache-control", "pragma", "expires", "content-security-policy"])
        {
            assert_eq!(reply.header(name).len(), 1, "{name} on {method} {path}");
        }

        assert_eq!(reply.header("content-security-policy"), ["default-src 'self'"]);
    }
}

#[test]
fn head_sends_headers_without_body() {
    let (_dir, root) = fixture();
    let server = start(local(&root)).unwrap();

    let reply = send(server.addr(), "HEAD", "/index.html");
    assert_eq!(reply.status, 200);
    assert_eq!(reply.header("content-length"), ["11"]);
    assert!(reply.body.is_empty());
}

#[test]
fn directory_requests_redirect_then_list() {
    let (_dir, root) = fixture();
    let server = start(local(&root)).unwrap();

    let redirect = send(server.addr(), "GET", "/assets");
    assert_eq!(redirect.status, 301);
    assert_eq!(redirect.header("location"), ["/assets/"]);

    let listing = send(server.addr(), "GET", "/assets/");
    let body = String::from_utf8_lossy(&listing.body);
    assert_eq!(listing.status, 200);
    assert!(body.contains(r#"<a href="app.js">app.js</a>"#));
    assert!(body.contains(r#"<a href="blob.bin">blob.bin</a>"#));

    let index = send(server.addr(), "GET", "/");
    assert_eq!(index.body, b"<h1>hi</h1>");
}

#[test]
fn falls_back_when_primary_port_is_taken() {
    let (_dir, root) = fixture();
    let occupied = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let taken = occupied.local_addr().unwrap().port();

    let server = start(local(&root).port(taken).fallback_port(0)).unwrap();

    assert_ne!(server.port(), taken);
    assert_eq!(send(server.addr(), "GET", "/index.html").status, 200);
}

#[test]
fn taken_port_without_fallback_is_unavailable() {
    let (_dir, root) = fixture();
    let occupied = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let taken = occupied.local_addr().unwrap().port();

    match start(local(&root).port(taken)) {
        Err(ServeError::PortUnavailable { port }) => assert_eq!(port, taken),
        Err(error) => panic!("unexpected error: {error}"),
        Ok(server) => panic!("bound to taken port {}", server.port()),
    }
}

#[test]
fn both_ports_taken_is_unavailable() {
    let (_dir, root) = fixture();
    let first = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let second = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let first_port = first.local_addr().unwrap().port();
    let second_port = second.local_addr().unwrap().port();

    let result = start(local(&root).port(first_port).fallback_port(second_port));

    assert!(matches!(
        result,
        Err(ServeError::PortUnavailable { port }) if port == second_port
    ));
}

#[test]
fn missing_root_fails_before_binding() {
    let dir = TempDir::new().unwrap();
    let result = start(local(&dir.path().join("absent")));

    assert!(matches!(result, Err(ServeError::InvalidRoot { .. })));
}

#[test]
fn on_bound_runs_once_with_bound_address() {
    let (_dir, root) = fixture();
    let (sender, receiver) = mpsc::channel();

    let server = start_with(local(&root), |addr| sender.send(addr).unwrap()).unwrap();

    assert_eq!(receiver.try_recv().unwrap(), server.addr());
    assert!(receiver.try_recv().is_err());
}

#[test]
fn shutdown_releases_the_port() {
    let (_dir, root) = fixture();
    let server = start(local(&root)).unwrap();
    let addr = server.addr();

    assert_eq!(send(addr, "GET", "/index.html").status, 200);
    server.shutdown();

    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        match TcpListener::bind(addr) {
            Ok(_) => break,
            Err(error) if Instant::now() > deadline => panic!("port still bound: {error}"),
            Err(_) => thread::sleep(Duration::from_millis(20)),
        }
    }
}

#[test]
fn shutdown_handle_stops_a_waiting_server() {
    let (_dir, root) = fixture();
    let server = start(local(&root)).unwrap();
    let handle = server.shutdown_handle();

    let waiter = thread::spawn(move || server.wait());
    thread::sleep(Duration::from_millis(50));
    handle.shutdown();

    waiter.join().unwrap();
}

#[test]
fn handles_concurrent_requests() {
    let (_dir, root) = fixture();
    let server = start(local(&root)).unwrap();
    let addr = server.addr();

    let clients: Vec<_> = (0..8)
        .map(|_| thread::spawn(move || send(addr, "GET", "/index.html")))
        .collect();

    for client in clients {
        let reply = client.join().unwrap();
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body, b"<h1>hi</h1>");
    }
}
