use tally_viewer::{bind, ViewerConfig, ViewerError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::test]
async fn busy_port_is_reported_as_addr_in_use() {
    let dir = tempfile::tempdir().unwrap();
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let cfg = ViewerConfig {
        port,
        outputs_dir: dir.path().to_path_buf(),
    };
    match bind(&cfg).await {
        Err(ViewerError::AddrInUse(p)) => assert_eq!(p, port),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("bind should fail on a busy port"),
    }
    assert_eq!(
        ViewerError::AddrInUse(port).to_string(),
        format!("Port {port} is already in use. Try a different port with --port")
    );
}

#[tokio::test]
async fn bound_viewer_serves_until_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("results_20250101_000000.json"), "{}").unwrap();
    let cfg = ViewerConfig {
        port: 0,
        outputs_dir: dir.path().to_path_buf(),
    };
    let viewer = bind(&cfg).await.unwrap();
    let addr = viewer.local_addr().unwrap();

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(viewer.run(async move {
        let _ = stop_rx.await;
    }));

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /api/files HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();
    assert!(raw.starts_with("HTTP/1.1 200"));
    assert!(raw.contains(r#"["results_20250101_000000.json"]"#));

    stop_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}
