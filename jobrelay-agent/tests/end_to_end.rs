//! End-to-end tests driving the agent's accept loop over a real loopback
//! `TcpStream`, in-process since this crate needs no external fixture.

use std::sync::Arc;

use jobrelay_protocol::{wire::read_frame, ControlToken, KeyValue, ResultRecord, Status, TokioExecutor};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

async fn spawn_agent() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(jobrelay_agent::listener::serve(listener, Arc::new(TokioExecutor)));
    addr
}

async fn send(stream: &mut TcpStream, bytes: &[u8]) {
    stream.write_all(bytes).await.unwrap();
}

async fn expect_echo(stream: &mut TcpStream, bytes: &[u8]) {
    let echoed = read_frame(stream).await.unwrap().unwrap();
    assert_eq!(echoed, bytes);
}

#[tokio::test]
async fn runs_a_single_command_and_reports_success() {
    let addr = spawn_agent().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let name = KeyValue::new("name", "t1").encode();
    send(&mut stream, &name).await;
    expect_echo(&mut stream, &name).await;

    let command = KeyValue::new("command", "echo hi").encode();
    send(&mut stream, &command).await;
    expect_echo(&mut stream, &command).await;

    let timeout = KeyValue::new("timeout", "5").encode();
    send(&mut stream, &timeout).await;
    expect_echo(&mut stream, &timeout).await;

    send(&mut stream, ControlToken::Ready.as_bytes()).await;
    expect_echo(&mut stream, ControlToken::Ready.as_bytes()).await;

    send(&mut stream, ControlToken::Start.as_bytes()).await;

    let record_bytes = read_frame(&mut stream).await.unwrap().unwrap();
    let record = ResultRecord::parse(&record_bytes).unwrap();
    assert_eq!(record.target, "t1");
    assert_eq!(record.command, "echo hi");
    assert_eq!(record.status, Status::Success);
    assert_eq!(record.output, "hi");

    let done = read_frame(&mut stream).await.unwrap().unwrap();
    assert_eq!(ControlToken::parse(&done), Some(ControlToken::Done));
}

#[tokio::test]
async fn kill_stops_a_long_running_command() {
    let addr = spawn_agent().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let name = KeyValue::new("name", "t1").encode();
    send(&mut stream, &name).await;
    expect_echo(&mut stream, &name).await;

    let command = KeyValue::new("command", "sleep 30").encode();
    send(&mut stream, &command).await;
    expect_echo(&mut stream, &command).await;

    let timeout = KeyValue::new("timeout", "0").encode();
    send(&mut stream, &timeout).await;
    expect_echo(&mut stream, &timeout).await;

    send(&mut stream, ControlToken::Ready.as_bytes()).await;
    expect_echo(&mut stream, ControlToken::Ready.as_bytes()).await;

    send(&mut stream, ControlToken::Start.as_bytes()).await;
    send(&mut stream, ControlToken::Kill.as_bytes()).await;

    let record_bytes = read_frame(&mut stream).await.unwrap().unwrap();
    let record = ResultRecord::parse(&record_bytes).unwrap();
    assert_eq!(record.status, Status::Killed);

    let done = read_frame(&mut stream).await.unwrap().unwrap();
    assert_eq!(ControlToken::parse(&done), Some(ControlToken::Done));
}

#[tokio::test]
async fn unrecognized_key_closes_the_connection() {
    let addr = spawn_agent().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let bogus = KeyValue::new("bogus", "value").encode();
    send(&mut stream, &bogus).await;
    expect_echo(&mut stream, &bogus).await;

    let eof = read_frame(&mut stream).await.unwrap();
    assert_eq!(eof, None);
}
