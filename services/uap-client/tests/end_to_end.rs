//! End-to-end tests for spec §8 scenarios 1 (happy path) and 6 (HELLO
//! timeout), driving `client::run` against a hand-played fake server.

use std::time::Duration;

use client::{FileLines, LineSource};
use uap_protocol::Command;
use uap_test_utils::UdpPeer;

async fn file_with(contents: &str, tag: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!(
        "uap-client-test-{}-{}.txt",
        std::process::id(),
        tag
    ));
    tokio::fs::write(&path, contents).await.unwrap();
    path
}

#[tokio::test]
async fn happy_path_against_a_well_behaved_server() {
    let server = UdpPeer::bind().await;
    let server_addr = server.local_addr();

    let path = file_with("hello\nworld\n", "happy").await;
    let lines: Box<dyn LineSource> = Box::new(FileLines::open(&path).await.unwrap());

    let client_task = tokio::spawn(async move {
        client::run(server_addr, lines, Duration::from_secs(2))
            .await
            .unwrap()
    });

    let (hello, client_addr) = server.recv_packet(Duration::from_secs(1)).await;
    assert_eq!(hello.command, Command::Hello);
    assert_eq!(hello.sequence_number, 0);
    let sid = hello.session_id;
    server
        .send_packet(Command::Hello, 0, sid, 1, 0, &[], client_addr)
        .await;

    let (data1, _) = server.recv_packet(Duration::from_secs(1)).await;
    assert_eq!(data1.command, Command::Data);
    assert_eq!(data1.payload, b"hello\n");
    server
        .send_packet(Command::Alive, 0, sid, 2, 0, &[], client_addr)
        .await;

    let (data2, _) = server.recv_packet(Duration::from_secs(1)).await;
    assert_eq!(data2.payload, b"world\n");
    server
        .send_packet(Command::Alive, 1, sid, 3, 0, &[], client_addr)
        .await;

    let (goodbye, _) = server.recv_packet(Duration::from_secs(1)).await;
    assert_eq!(goodbye.command, Command::Goodbye);
    server
        .send_packet(Command::Goodbye, 2, sid, 4, 0, &[], client_addr)
        .await;

    let session = client_task.await.unwrap();
    assert_eq!(session.state(), client::State::Closed);
    assert!(session.average_latency_micros().is_some());

    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test(start_paused = true)]
async fn hello_timeout_closes_without_ever_sending_data() {
    // A bound peer that never replies stands in for "non-existent server":
    // from the client's perspective the behavior is identical, nothing
    // ever arrives before TIMEOUT.
    let silent_server = UdpPeer::bind().await;
    let server_addr = silent_server.local_addr();

    let path = file_with("", "hello-timeout").await;
    let lines: Box<dyn LineSource> = Box::new(FileLines::open(&path).await.unwrap());

    let session = client::run(server_addr, lines, Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(session.state(), client::State::Closed);
    assert_eq!(session.average_latency_micros(), None);

    // The only packet the client ever sent was the initial HELLO, then a
    // best-effort GOODBYE once HELLO_WAIT timed out into CLOSING.
    let (hello, _) = silent_server.recv_packet(Duration::from_secs(1)).await;
    assert_eq!(hello.command, Command::Hello);
    let (goodbye, _) = silent_server.recv_packet(Duration::from_secs(1)).await;
    assert_eq!(goodbye.command, Command::Goodbye);
    silent_server.assert_silence(Duration::from_millis(50)).await;

    let _ = tokio::fs::remove_file(&path).await;
}
