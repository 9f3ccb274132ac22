//! Purpose: End-to-end tests for the HTTP/JSON server and `RemoteClient`.
//! Exports: None (integration test module).
//! Role: Validate register/range over TCP and error propagation across the wire.
//! Invariants: Uses loopback-only server with temp data directory.
//! Invariants: Bounded waits avoid test flakiness.
//! Invariants: Server processes are cleaned up on drop.

use serde_json::{Value, json};
use starnotary::api::{ErrorKind, LocalClient, NewStar, RangeRequest, RemoteClient};
use std::io::Read;
use std::net::{SocketAddr, TcpListener};
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard};
use std::thread::sleep;
use std::time::{Duration, Instant};

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

static SERVER_LOCK: Mutex<()> = Mutex::new(());

struct TestServer {
    child: Child,
    base_url: String,
    _server_guard: MutexGuard<'static, ()>,
}

impl TestServer {
    fn start(data_dir: &std::path::Path) -> TestResult<Self> {
        Self::start_with_cors(data_dir, &[])
    }

    fn start_with_cors(data_dir: &std::path::Path, cors_origins: &[&str]) -> TestResult<Self> {
        let guard = SERVER_LOCK
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        let mut last_err: Option<Box<dyn std::error::Error>> = None;
        for _attempt in 0..3 {
            let port = pick_port()?;
            let bind = format!("127.0.0.1:{port}");
            let base_url = format!("http://{bind}");

            let mut command = Command::new(env!("CARGO_BIN_EXE_starnotary"));
            command
                .arg("--dir")
                .arg(data_dir)
                .arg("serve")
                .arg("--bind")
                .arg(&bind)
                .stdout(Stdio::null())
                .stderr(Stdio::piped());
            for origin in cors_origins {
                command.arg("--cors-origin").arg(origin);
            }
            let mut child = command.spawn()?;

            match wait_for_server(&mut child, bind.parse()?) {
                Ok(()) => {
                    return Ok(Self {
                        child,
                        base_url,
                        _server_guard: guard,
                    });
                }
                Err(err) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    last_err = Some(err);
                    sleep(Duration::from_millis(30));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| "server failed to start".into()))
    }

    fn client(&self) -> TestResult<RemoteClient> {
        Ok(RemoteClient::new(self.base_url.clone())?)
    }

    fn url(&self, path_and_query: &str) -> String {
        format!("{}{path_and_query}", self.base_url)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn star(id: &str) -> NewStar {
    NewStar::new("0xabc", id, "123045.12+455530.00", "polaris prime")
}

fn token_ids(stars: &[starnotary::api::StarRecord]) -> Vec<String> {
    stars.iter().map(|star| star.token_id.clone()).collect()
}

#[test]
fn remote_register_and_read_back() -> TestResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let server = TestServer::start(temp_dir.path())?;
    let client = server.client()?;

    let created = client.register(&star("7").for_sale("12.5"))?;
    assert_eq!(created.token_id, "7");
    assert_eq!(created.owner, "0xabc");
    assert_eq!(created.price.as_deref(), Some("12.5"));
    assert!(created.is_for_sale);

    let newest = client.star_range(&RangeRequest::window("1", "1"))?;
    assert_eq!(newest, vec![created.clone()]);
    let by_ids = client.star_range(&RangeRequest::ids("1", "10"))?;
    assert_eq!(by_ids, vec![created]);
    Ok(())
}

#[test]
fn remote_range_modes_order_results() -> TestResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let server = TestServer::start(temp_dir.path())?;
    let client = server.client()?;
    for id in 1..=6 {
        client.register(&star(&id.to_string()))?;
    }

    let relative = client.star_range(&RangeRequest::window("1", "3"))?;
    assert_eq!(token_ids(&relative), ["6", "5", "4"]);
    let absolute = client.star_range(&RangeRequest::window("2", "4").oldest_first(true))?;
    assert_eq!(token_ids(&absolute), ["2", "3", "4"]);
    let inverted = client.star_range(&RangeRequest::ids("5", "2"))?;
    assert!(inverted.is_empty());
    Ok(())
}

#[test]
fn remote_and_local_clients_share_the_registry() -> TestResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let server = TestServer::start(temp_dir.path())?;
    server.client()?.register(&star("3"))?;

    let local = LocalClient::new().with_data_dir(temp_dir.path());
    let stars = local.star_range(&RangeRequest::window("1", "5"))?;
    assert_eq!(token_ids(&stars), ["3"]);
    Ok(())
}

#[test]
fn remote_validation_errors_keep_literal_messages() -> TestResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let server = TestServer::start(temp_dir.path())?;
    let client = server.client()?;

    let mut bad = star("1");
    bad.name = "Polaris".to_string();
    let err = client.register(&bad).expect_err("invalid name");
    assert_eq!(err.kind(), ErrorKind::Usage);
    assert_eq!(err.message(), Some("invalid name"));

    let err = client
        .star_range(&RangeRequest::window("0", "5"))
        .expect_err("invalid range");
    assert_eq!(err.kind(), ErrorKind::Usage);
    assert_eq!(err.message(), Some("invalid range"));

    let empty = client.star_range(&RangeRequest::window("1", "5"))?;
    assert!(empty.is_empty());
    Ok(())
}

#[test]
fn remote_duplicate_registration_conflicts() -> TestResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let server = TestServer::start(temp_dir.path())?;
    let client = server.client()?;
    client.register(&star("1"))?;

    let err = client.register(&star("1")).expect_err("duplicate");
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    match ureq::post(&server.url("/v0/stars"))
        .set("Content-Type", "application/json")
        .send_json(json!({
            "owner": "0xabc",
            "token_id": "1",
            "coordinates": "123045.12+455530.00",
            "name": "polaris prime",
        })) {
        Err(ureq::Error::Status(code, resp)) => {
            assert_eq!(code, 409);
            let body: Value = resp.into_json()?;
            assert_eq!(body["error"]["kind"], "AlreadyExists");
        }
        other => return Err(format!("expected 409, got {other:?}").into()),
    }
    Ok(())
}

#[test]
fn raw_query_families_cannot_be_mixed() -> TestResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let server = TestServer::start(temp_dir.path())?;

    match ureq::get(&server.url("/v0/stars?start=1&end=2&first-id=1")).call() {
        Err(ureq::Error::Status(code, resp)) => {
            assert_eq!(code, 400);
            let body: Value = resp.into_json()?;
            assert_eq!(body["error"]["message"], "invalid range");
        }
        other => return Err(format!("expected 400, got {other:?}").into()),
    }

    let resp = ureq::get(&server.url("/v0/stars?start=1&end=2")).call()?;
    let body: Value = resp.into_json()?;
    assert_eq!(body, json!({ "stars": [] }));
    Ok(())
}

#[test]
fn cors_headers_follow_configured_origin() -> TestResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let origin = "https://app.example.com";
    let server = TestServer::start_with_cors(temp_dir.path(), &[origin])?;

    let allowed = ureq::get(&server.url("/v0/stars?start=1&end=1"))
        .set("Origin", origin)
        .call()?;
    assert_eq!(allowed.header("access-control-allow-origin"), Some(origin));

    let other = ureq::get(&server.url("/v0/stars?start=1&end=1"))
        .set("Origin", "https://evil.example.com")
        .call()?;
    assert_eq!(other.header("access-control-allow-origin"), None);
    Ok(())
}

#[test]
fn serve_rejects_bad_cors_origin_before_binding() -> TestResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let output = Command::new(env!("CARGO_BIN_EXE_starnotary"))
        .arg("--dir")
        .arg(temp_dir.path())
        .args(["serve", "--bind", "127.0.0.1:0", "--cors-origin", "app.example.com"])
        .output()?;
    assert_eq!(output.status.code(), Some(2));
    Ok(())
}

fn pick_port() -> TestResult<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

fn wait_for_server(child: &mut Child, addr: SocketAddr) -> TestResult<()> {
    let url = format!("http://{addr}/healthz");
    let start = Instant::now();
    loop {
        if let Ok(resp) = ureq::get(&url).call() {
            if resp.status() == 200 {
                return Ok(());
            }
        }
        if let Some(status) = child.try_wait()? {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            let detail = stderr.trim();
            return Err(format!(
                "server exited before ready (status: {status}, stderr: {})",
                if detail.is_empty() { "<empty>" } else { detail }
            )
            .into());
        }
        if start.elapsed() > Duration::from_secs(8) {
            return Err("server did not start in time".into());
        }
        sleep(Duration::from_millis(20));
    }
}
