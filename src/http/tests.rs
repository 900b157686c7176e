use super::connection::{DIAL_PASSES, probe_source_ip};
use super::dispatcher::{default_max_workers, tick_quotas};
use super::*;
use crate::error::{ConnectionError, HttpError, SourceError};
use crate::metrics::{RequestOutcome, StatsAggregator};
use crate::shutdown::StopSignal;
use crate::source::{LiteralSource, RequestSource};

use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use std::future::Future;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn run_async_test<F>(future: F) -> Result<(), String>
where
    F: Future<Output = Result<(), String>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| format!("Failed to build runtime: {}", err))?;
    runtime.block_on(future)
}

struct CountingResolver {
    calls: AtomicUsize,
    addrs: Vec<IpAddr>,
}

impl CountingResolver {
    fn new(addrs: Vec<IpAddr>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            addrs,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolver for CountingResolver {
    async fn resolve(&self, _host: &str) -> io::Result<Vec<IpAddr>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.addrs.clone())
    }
}

struct FailingResolver;

#[async_trait]
impl Resolver for FailingResolver {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no such host {}", host),
        ))
    }
}

struct FailingSource;

impl RequestSource for FailingSource {
    fn generate(&self) -> Result<Bytes, SourceError> {
        Err(SourceError::Generation {
            reason: "exhausted".to_owned(),
        })
    }
}

#[derive(Clone, Copy)]
enum Reply {
    Status(u16),
    Delayed(Duration),
    Silent,
}

fn header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|window| window == b"\r\n\r\n")
}

fn content_length(head: &[u8]) -> usize {
    String::from_utf8_lossy(head)
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

async fn serve_connection(mut stream: TcpStream, reply: Reply) {
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let end = loop {
            if let Some(end) = header_end(&buf) {
                break end;
            }
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(read) => buf.extend_from_slice(chunk.get(..read).unwrap_or_default()),
            }
        };
        let body_len = content_length(buf.get(..end).unwrap_or_default());
        let total = end.saturating_add(4).saturating_add(body_len);
        while buf.len() < total {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(read) => buf.extend_from_slice(chunk.get(..read).unwrap_or_default()),
            }
        }
        buf.drain(..total);

        let status = match reply {
            Reply::Status(status) => status,
            Reply::Delayed(delay) => {
                tokio::time::sleep(delay).await;
                200
            }
            Reply::Silent => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                return;
            }
        };
        let response = format!(
            "HTTP/1.1 {} Test\r\nContent-Length: 2\r\nConnection: keep-alive\r\n\r\nOK",
            status
        );
        if stream.write_all(response.as_bytes()).await.is_err() {
            return;
        }
    }
}

async fn spawn_server(reply: Reply) -> Result<SocketAddr, String> {
    let listener = TcpListener::bind((LOCALHOST, 0))
        .await
        .map_err(|err| format!("bind test server failed: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("server addr failed: {}", err))?;
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve_connection(stream, reply));
        }
    });
    Ok(addr)
}

async fn closed_port() -> Result<u16, String> {
    let listener = TcpListener::bind((LOCALHOST, 0))
        .await
        .map_err(|err| format!("bind failed: {}", err))?;
    let port = listener
        .local_addr()
        .map_err(|err| format!("addr failed: {}", err))?
        .port();
    drop(listener);
    Ok(port)
}

fn fast_manager(resolver: Arc<dyn Resolver>) -> Arc<ConnectionManager> {
    Arc::new(
        ConnectionManager::new(resolver, Duration::from_secs(60), None)
            .with_backoff_step(Duration::from_millis(1)),
    )
}

fn executor_for(
    url: &str,
    source: Arc<dyn RequestSource>,
    timeout: Duration,
) -> Result<RequestExecutor, String> {
    let target = Target::parse(url, Method::POST, &[])
        .map_err(|err| format!("target failed: {}", err))?;
    let manager = fast_manager(Arc::new(SystemResolver));
    let transport = HttpTransport::new(manager, timeout, false);
    Ok(RequestExecutor::new(
        source,
        Arc::new(target),
        transport,
        Arc::new(StatsAggregator::new(false)),
    ))
}

#[test]
fn tick_quotas_spread_even_rate() -> Result<(), String> {
    let quotas = tick_quotas(100);
    if quotas.len() != 50 || quotas.iter().any(|quota| *quota != 2) {
        return Err(format!("Unexpected quotas {:?}", quotas));
    }
    if quotas.iter().sum::<u64>() != 100 {
        return Err("Quotas do not sum to 100".to_owned());
    }
    Ok(())
}

#[test]
fn tick_quotas_front_load_remainder() -> Result<(), String> {
    let quotas = tick_quotas(103);
    let (head, tail) = quotas.split_at(3);
    if head.iter().any(|quota| *quota != 3) || tail.iter().any(|quota| *quota != 2) {
        return Err(format!("Unexpected quotas {:?}", quotas));
    }
    if quotas.iter().sum::<u64>() != 103 {
        return Err("Quotas do not sum to 103".to_owned());
    }

    let sparse = tick_quotas(7);
    if sparse.iter().filter(|quota| **quota == 1).count() != 7 || sparse.iter().sum::<u64>() != 7 {
        return Err(format!("Unexpected sparse quotas {:?}", sparse));
    }
    Ok(())
}

#[test]
fn max_workers_default_has_floor() -> Result<(), String> {
    if default_max_workers(100) != 1_000 {
        return Err(format!("Unexpected floor {}", default_max_workers(100)));
    }
    if default_max_workers(20_000) != 4_000 {
        return Err(format!("Unexpected estimate {}", default_max_workers(20_000)));
    }
    match RunMode::rate(50, Some(8)) {
        RunMode::Rate { max_workers: 8, .. } => Ok(()),
        other => Err(format!("Override ignored: {:?}", other)),
    }
}

#[test]
fn dns_cache_serves_repeat_lookups() -> Result<(), String> {
    run_async_test(async {
        let resolver = CountingResolver::new(vec![LOCALHOST]);
        let cache = DnsCache::new(resolver.clone(), Duration::from_secs(60));
        for _ in 0..2 {
            let addrs = cache
                .lookup("service.local")
                .await
                .map_err(|err| format!("lookup failed: {}", err))?;
            if addrs != [LOCALHOST] {
                return Err(format!("Unexpected addrs {:?}", addrs));
            }
        }
        if resolver.calls() != 1 {
            return Err(format!("Expected 1 resolve, got {}", resolver.calls()));
        }
        Ok(())
    })
}

#[test]
fn dns_cache_resolves_again_after_ttl() -> Result<(), String> {
    run_async_test(async {
        let resolver = CountingResolver::new(vec![LOCALHOST]);
        let cache = DnsCache::new(resolver.clone(), Duration::from_millis(30));
        cache
            .lookup("service.local")
            .await
            .map_err(|err| format!("first lookup failed: {}", err))?;
        tokio::time::sleep(Duration::from_millis(80)).await;
        cache
            .lookup("service.local")
            .await
            .map_err(|err| format!("second lookup failed: {}", err))?;
        if resolver.calls() != 2 {
            return Err(format!("Expected 2 resolves, got {}", resolver.calls()));
        }
        Ok(())
    })
}

#[test]
fn dns_cache_skips_ip_literals() -> Result<(), String> {
    run_async_test(async {
        let resolver = CountingResolver::new(vec![]);
        let cache = DnsCache::new(resolver.clone(), Duration::from_secs(60));
        let v4 = cache
            .lookup("127.0.0.1")
            .await
            .map_err(|err| format!("v4 lookup failed: {}", err))?;
        let v6 = cache
            .lookup("[::1]")
            .await
            .map_err(|err| format!("v6 lookup failed: {}", err))?;
        if v4 != [LOCALHOST] || v6.len() != 1 {
            return Err(format!("Unexpected literal results {:?} {:?}", v4, v6));
        }
        if resolver.calls() != 0 || !cache.is_empty() {
            return Err("Literal hosts hit the resolver".to_owned());
        }
        Ok(())
    })
}

#[test]
fn dns_cache_reports_resolver_failures() -> Result<(), String> {
    run_async_test(async {
        let failing = DnsCache::new(Arc::new(FailingResolver), Duration::from_secs(60));
        match failing.lookup("missing.local").await {
            Err(ConnectionError::Resolve { host, .. }) if host == "missing.local" => {}
            other => return Err(format!("Unexpected result {:?}", other.map(|_| ()))),
        }
        let empty = DnsCache::new(CountingResolver::new(vec![]), Duration::from_secs(60));
        match empty.lookup("empty.local").await {
            Err(ConnectionError::NoAddresses { .. }) => Ok(()),
            other => Err(format!("Unexpected result {:?}", other.map(|_| ()))),
        }
    })
}

#[test]
fn dial_connects_through_resolved_address() -> Result<(), String> {
    run_async_test(async {
        let listener = TcpListener::bind((LOCALHOST, 0))
            .await
            .map_err(|err| format!("bind failed: {}", err))?;
        let port = listener
            .local_addr()
            .map_err(|err| format!("addr failed: {}", err))?
            .port();
        let resolver = CountingResolver::new(vec![LOCALHOST]);
        let manager = fast_manager(resolver.clone());

        let stream = manager
            .dial_with_retry("backend.local", port)
            .await
            .map_err(|err| format!("dial failed: {}", err))?;
        let nodelay = stream
            .nodelay()
            .map_err(|err| format!("nodelay failed: {}", err))?;
        if !nodelay {
            return Err("TCP_NODELAY not set".to_owned());
        }
        drop(stream);
        manager
            .dial_with_retry("backend.local", port)
            .await
            .map_err(|err| format!("second dial failed: {}", err))?;
        if resolver.calls() != 1 {
            return Err(format!("Expected cached resolve, got {}", resolver.calls()));
        }
        Ok(())
    })
}

#[test]
fn dial_exhausts_after_all_passes() -> Result<(), String> {
    run_async_test(async {
        let port = closed_port().await?;
        let manager = fast_manager(CountingResolver::new(vec![LOCALHOST]));
        match manager.dial_with_retry("backend.local", port).await {
            Err(ConnectionError::Exhausted {
                passes,
                port: failed_port,
                ..
            }) if passes == DIAL_PASSES && failed_port == port => Ok(()),
            Err(err) => Err(format!("Unexpected error {}", err)),
            Ok(_) => Err("Dial to a closed port succeeded".to_owned()),
        }
    })
}

#[test]
fn dial_binds_configured_source_ip() -> Result<(), String> {
    let source = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 2));
    if probe_source_ip(source).is_err() {
        eprintln!("skipping test: {} is not bindable here", source);
        return Ok(());
    }
    run_async_test(async move {
        let listener = TcpListener::bind((LOCALHOST, 0))
            .await
            .map_err(|err| format!("bind failed: {}", err))?;
        let port = listener
            .local_addr()
            .map_err(|err| format!("addr failed: {}", err))?
            .port();
        let manager = ConnectionManager::new(
            CountingResolver::new(vec![LOCALHOST]),
            Duration::from_secs(60),
            Some(source),
        );

        let _stream = manager
            .dial_with_retry("backend.local", port)
            .await
            .map_err(|err| format!("dial failed: {}", err))?;
        let (_accepted, peer) = listener
            .accept()
            .await
            .map_err(|err| format!("accept failed: {}", err))?;
        if peer.ip() != source {
            return Err(format!("Expected peer {}, got {}", source, peer.ip()));
        }
        Ok(())
    })
}

#[test]
fn source_ip_probe_accepts_loopback() -> Result<(), String> {
    probe_source_ip(LOCALHOST).map_err(|err| format!("probe failed: {}", err))?;
    match probe_source_ip(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7))) {
        Err(ConnectionError::Bind { .. }) => Ok(()),
        Err(err) => Err(format!("Unexpected error {}", err)),
        Ok(()) => Err("Documentation address should not be bindable".to_owned()),
    }
}

#[test]
fn target_merges_default_headers() -> Result<(), String> {
    let headers = vec![
        ("Content-Type".to_owned(), "text/plain".to_owned()),
        ("X-Trace".to_owned(), "a".to_owned()),
        ("X-Trace".to_owned(), "b".to_owned()),
    ];
    let target = Target::parse("http://example.test:8081/api?x=1", Method::PUT, &headers)
        .map_err(|err| format!("parse failed: {}", err))?;
    if target.host() != "example.test" || target.port() != 8081 {
        return Err(format!("Unexpected host {}:{}", target.host(), target.port()));
    }
    if target.uri().path_and_query().map(|pq| pq.as_str()) != Some("/api?x=1") {
        return Err(format!("Unexpected uri {}", target.uri()));
    }
    let content_types: Vec<&str> = target
        .headers()
        .get_all(http::header::CONTENT_TYPE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();
    if content_types != ["text/plain"] {
        return Err(format!("Unexpected content types {:?}", content_types));
    }
    if target.headers().get_all("x-trace").iter().count() != 2 {
        return Err("Repeated headers were collapsed".to_owned());
    }

    let request = target
        .build_request(Bytes::from_static(b"{}"))
        .map_err(|err| format!("build failed: {}", err))?;
    if *request.method() != Method::PUT || request.uri().path() != "/api" {
        return Err(format!("Unexpected request {} {}", request.method(), request.uri()));
    }

    let defaulted = Target::parse("http://localhost/", Method::POST, &[])
        .map_err(|err| format!("parse failed: {}", err))?;
    if defaulted.headers().get(http::header::CONTENT_TYPE)
        != Some(&http::HeaderValue::from_static("application/json"))
        || defaulted.port() != 80
    {
        return Err("Default header or port missing".to_owned());
    }
    Ok(())
}

#[test]
fn target_rejects_non_http_urls() -> Result<(), String> {
    match Target::parse("https://example.test/", Method::GET, &[]) {
        Err(HttpError::UnsupportedScheme { scheme }) if scheme == "https" => {}
        Err(err) => return Err(format!("Unexpected error {}", err)),
        Ok(_) => return Err("https target accepted".to_owned()),
    }
    match Target::parse("not a url", Method::GET, &[]) {
        Err(HttpError::InvalidUrl { .. }) => Ok(()),
        Err(err) => Err(format!("Unexpected error {}", err)),
        Ok(_) => Err("Invalid URL accepted".to_owned()),
    }
}

#[test]
fn transport_classifies_outcomes() -> Result<(), String> {
    run_async_test(async {
        let ok_addr = spawn_server(Reply::Status(200)).await?;
        let bad_addr = spawn_server(Reply::Status(503)).await?;
        let silent_addr = spawn_server(Reply::Silent).await?;
        let dead_port = closed_port().await?;
        let body: Arc<dyn RequestSource> = Arc::new(LiteralSource::new("{\"k\":1}"));
        let timeout = Duration::from_millis(300);

        let ok = executor_for(&format!("http://{}/", ok_addr), body.clone(), timeout)?
            .run_attempt()
            .await;
        if !matches!(ok, RequestOutcome::Success { bytes: 2, .. }) {
            return Err(format!("Expected success, got {:?}", ok));
        }

        let bad = executor_for(&format!("http://{}/", bad_addr), body.clone(), timeout)?
            .run_attempt()
            .await;
        if bad != (RequestOutcome::BadStatus { status: 503 }) {
            return Err(format!("Expected bad status, got {:?}", bad));
        }

        let silent = executor_for(&format!("http://{}/", silent_addr), body.clone(), timeout)?
            .run_attempt()
            .await;
        if silent != RequestOutcome::Timeout {
            return Err(format!("Expected timeout, got {:?}", silent));
        }

        let dead = executor_for(
            &format!("http://127.0.0.1:{}/", dead_port),
            body,
            Duration::from_secs(5),
        )?
        .run_attempt()
        .await;
        if dead != RequestOutcome::DialFailed {
            return Err(format!("Expected dial failure, got {:?}", dead));
        }
        Ok(())
    })
}

#[test]
fn generation_failure_skips_network() -> Result<(), String> {
    run_async_test(async {
        let executor = executor_for(
            "http://127.0.0.1:9/",
            Arc::new(FailingSource),
            Duration::from_secs(1),
        )?;
        let outcome = executor.run_attempt().await;
        if outcome != RequestOutcome::GenerationFailed {
            return Err(format!("Unexpected outcome {:?}", outcome));
        }
        let totals = executor.stats().totals();
        if totals.failed_requests != 1 || totals.total_requests != 0 {
            return Err("Generation failure not recorded".to_owned());
        }
        Ok(())
    })
}

#[test]
fn concurrency_mode_with_zero_duration_returns() -> Result<(), String> {
    run_async_test(async {
        let addr = spawn_server(Reply::Status(200)).await?;
        let executor = executor_for(
            &format!("http://{}/", addr),
            Arc::new(LiteralSource::default()),
            Duration::from_secs(1),
        )?;
        let config = RunConfig {
            mode: RunMode::Concurrency { workers: 5 },
            duration: Duration::ZERO,
            request_timeout: Duration::from_secs(1),
        };
        let stop = StopSignal::new();
        let dispatcher = Dispatcher::new(config, executor, stop.clone());
        tokio::time::timeout(Duration::from_secs(5), dispatcher.start())
            .await
            .map_err(|err| format!("dispatcher hung: {}", err))?
            .map_err(|err| format!("dispatcher failed: {}", err))?;
        if !stop.is_stopped() {
            return Err("Stop signal not fired".to_owned());
        }
        Ok(())
    })
}

#[test]
fn concurrency_mode_stops_on_early_signal() -> Result<(), String> {
    run_async_test(async {
        let addr = spawn_server(Reply::Status(200)).await?;
        let executor = executor_for(
            &format!("http://{}/", addr),
            Arc::new(LiteralSource::default()),
            Duration::from_secs(1),
        )?;
        let stats = Arc::clone(executor.stats());
        let config = RunConfig {
            mode: RunMode::Concurrency { workers: 3 },
            duration: Duration::from_secs(60),
            request_timeout: Duration::from_secs(1),
        };
        let stop = StopSignal::new();
        let trigger = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.fire();
        });
        let elapsed = tokio::time::timeout(
            Duration::from_secs(10),
            Dispatcher::new(config, executor, stop).start(),
        )
        .await
        .map_err(|err| format!("dispatcher hung: {}", err))?
        .map_err(|err| format!("dispatcher failed: {}", err))?;
        if elapsed > Duration::from_secs(5) {
            return Err(format!("Early stop ignored, ran {:?}", elapsed));
        }
        if stats.totals().total_requests == 0 {
            return Err("No requests completed".to_owned());
        }
        Ok(())
    })
}

#[test]
fn rate_mode_hits_target_rate() -> Result<(), String> {
    run_async_test(async {
        let addr = spawn_server(Reply::Status(200)).await?;
        let executor = executor_for(
            &format!("http://{}/", addr),
            Arc::new(LiteralSource::new("{}")),
            Duration::from_secs(2),
        )?;
        let stats = Arc::clone(executor.stats());
        let config = RunConfig {
            mode: RunMode::rate(100, Some(32)),
            duration: Duration::from_secs(1),
            request_timeout: Duration::from_secs(2),
        };
        let elapsed = Dispatcher::new(config, executor, StopSignal::new())
            .start()
            .await
            .map_err(|err| format!("dispatcher failed: {}", err))?;

        let summary = stats.finalize(elapsed);
        let totals = summary.totals;
        if !(85..=105).contains(&totals.total_requests) {
            return Err(format!(
                "Expected about 100 requests, got {}",
                totals.total_requests
            ));
        }
        if totals.failed_requests != 0 || totals.dropped_tokens != 0 {
            return Err(format!(
                "Unexpected failures {} / drops {}",
                totals.failed_requests, totals.dropped_tokens
            ));
        }
        Ok(())
    })
}

#[test]
fn run_time_excludes_drain_of_in_flight_requests() -> Result<(), String> {
    run_async_test(async {
        let addr = spawn_server(Reply::Delayed(Duration::from_millis(900))).await?;
        let executor = executor_for(
            &format!("http://{}/", addr),
            Arc::new(LiteralSource::default()),
            Duration::from_secs(3),
        )?;
        let stats = Arc::clone(executor.stats());
        let config = RunConfig {
            mode: RunMode::Concurrency { workers: 4 },
            duration: Duration::from_millis(100),
            request_timeout: Duration::from_secs(3),
        };
        let started = tokio::time::Instant::now();
        let active = Dispatcher::new(config, executor, StopSignal::new())
            .start()
            .await
            .map_err(|err| format!("dispatcher failed: {}", err))?;
        let wall = started.elapsed();

        if wall < Duration::from_millis(800) {
            return Err(format!("Slow requests were not awaited, wall {:?}", wall));
        }
        if active < Duration::from_millis(100) || active > Duration::from_millis(500) {
            return Err(format!("Unexpected active run time {:?}", active));
        }
        let summary = stats.finalize(active);
        if summary.totals.total_requests != 4 {
            return Err(format!("Unexpected totals {:?}", summary.totals));
        }
        if summary.requests_per_sec_x100 < 800 {
            return Err(format!(
                "Rate divided by drain time: {}",
                summary.requests_per_sec_x100
            ));
        }
        Ok(())
    })
}
