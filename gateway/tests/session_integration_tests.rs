//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! End to end session tests: telnet client bytes in, input events out

use keybridge_common::decoder::{FunctionCode, InputEvent};
use keybridge_gateway::config::Configuration;
use keybridge_gateway::{ChannelSink, TelnetDaemon};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(5);

const CONFIG: &str = r#"
listeners:
  std:
    port: "0"
    maxcon: 4
    loginshell: editor
"#;

struct Harness {
    daemon: TelnetDaemon,
    addr: SocketAddr,
    events: mpsc::UnboundedReceiver<(Uuid, InputEvent)>,
}

impl Harness {
    async fn start() -> Self {
        let config = Configuration::parse(CONFIG).unwrap();
        let (tx, events) = mpsc::unbounded_channel();
        let daemon = TelnetDaemon::with_sink(&config, ChannelSink::factory(tx)).unwrap();
        let addr = daemon.start().unwrap()[0];
        Self {
            daemon,
            addr,
            events,
        }
    }

    async fn connect(&self) -> TcpStream {
        let mut stream = TcpStream::connect(("127.0.0.1", self.addr.port()))
            .await
            .unwrap();
        // The editor's welcome screen ends with this line.
        let mut seen = Vec::new();
        let mut buf = [0u8; 1024];
        while !String::from_utf8_lossy(&seen).contains("Connected.") {
            let n = timeout(WAIT, stream.read(&mut buf)).await.unwrap().unwrap();
            assert!(n > 0, "connection closed before the welcome screen");
            seen.extend_from_slice(&buf[..n]);
        }
        stream
    }

    async fn next_event(&mut self) -> (Uuid, InputEvent) {
        timeout(WAIT, self.events.recv())
            .await
            .expect("Timed out waiting for input")
            .expect("Input channel closed")
    }
}

#[tokio::test]
async fn test_cursor_up_reaches_sink() {
    let mut harness = Harness::start().await;
    let mut client = harness.connect().await;

    client.write_all(b"\x1b[A").await.unwrap();
    let (_, event) = harness.next_event().await;
    assert_eq!(event, InputEvent::Function(FunctionCode::CursorUp));

    harness.daemon.stop().await;
}

#[tokio::test]
async fn test_multibyte_character_reaches_sink() {
    let mut harness = Harness::start().await;
    let mut client = harness.connect().await;

    client.write_all(&[0xc3, 0xa9]).await.unwrap();
    let (_, event) = harness.next_event().await;
    assert_eq!(event, InputEvent::Text("é".to_string()));

    harness.daemon.stop().await;
}

#[tokio::test]
async fn test_events_keep_arrival_order() {
    let mut harness = Harness::start().await;
    let mut client = harness.connect().await;

    client.write_all(b"ab\x1b[Bc\x7f\t").await.unwrap();
    let mut events = Vec::new();
    for _ in 0..6 {
        events.push(harness.next_event().await.1);
    }
    assert_eq!(
        events,
        vec![
            InputEvent::Text("a".to_string()),
            InputEvent::Text("b".to_string()),
            InputEvent::Function(FunctionCode::CursorDown),
            InputEvent::Text("c".to_string()),
            InputEvent::Function(FunctionCode::Delete),
            InputEvent::Function(FunctionCode::Tab),
        ]
    );

    harness.daemon.stop().await;
}

#[tokio::test]
async fn test_negotiation_updates_session() {
    let mut harness = Harness::start().await;
    let mut client = harness.connect().await;

    let mut bytes = vec![255, 250, 31, 0, 120, 0, 40, 255, 240];
    bytes.extend([255, 250, 24, 0]);
    bytes.extend(b"VT100");
    bytes.extend([255, 240]);
    bytes.push(b'x');
    client.write_all(&bytes).await.unwrap();

    let (id, event) = harness.next_event().await;
    assert_eq!(event, InputEvent::Text("x".to_string()));

    let manager = harness.daemon.listener("std").unwrap().manager();
    let session = manager.session(id).await.unwrap();
    assert_eq!(session.io().columns().await, 120);
    assert_eq!(session.io().rows().await, 40);
    assert_eq!(session.metadata().read().await.terminal_type, "VT100");
    assert!(!session.io().terminal().supports_rendition);

    harness.daemon.stop().await;
}

#[tokio::test]
async fn test_logout_closes_connection() {
    let harness = Harness::start().await;
    let mut client = harness.connect().await;

    client.write_all(&[4]).await.unwrap();
    let mut rest = Vec::new();
    timeout(WAIT, client.read_to_end(&mut rest))
        .await
        .unwrap()
        .unwrap();
    assert!(String::from_utf8_lossy(&rest).contains("Logging out."));

    let manager = harness.daemon.listener("std").unwrap().manager();
    manager.housekeep().await;
    assert_eq!(manager.session_count().await, 0);

    harness.daemon.stop().await;
}
