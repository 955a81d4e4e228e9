//! Shared fixtures for lifecycle integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;

use lodestone_core::install::{InstallCommand, InstallOptions, InstallReport};

/// Build a minimal valid source artifact tree under `dir`.
pub fn write_source_tree(dir: &Path) {
    std::fs::create_dir_all(dir.join("scripts")).unwrap();
    std::fs::create_dir_all(dir.join("hooks")).unwrap();
    std::fs::create_dir_all(dir.join("commands")).unwrap();
    std::fs::create_dir_all(dir.join("experts")).unwrap();

    std::fs::write(
        dir.join("AGENTS.md"),
        "# Local AI Pack\n\nGenerated operating instructions.\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("settings.json"),
        serde_json::to_vec_pretty(&serde_json::json!({
            "hooks": {"post-edit": "scripts/format.sh"},
            "permissions": {"allow": ["read", "edit"]},
            "statusLine": {"command": "scripts/status.sh"}
        }))
        .unwrap(),
    )
    .unwrap();
    std::fs::write(
        dir.join("env.template"),
        "LOCAL_AI_ENABLED=false\n# set by configure-local-ai\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("mcp.json"),
        serde_json::to_vec_pretty(&serde_json::json!({
            "mcps": {
                "pack-tools": {
                    "command": "npx",
                    "args": ["-y", "pack-tools"],
                    "description": "Bundled helper tools"
                }
            }
        }))
        .unwrap(),
    )
    .unwrap();

    // Deliberately no shebang; the installer must insert one.
    std::fs::write(dir.join("scripts/setup.sh"), "echo setup\n").unwrap();
    std::fs::write(
        dir.join("scripts/status.sh"),
        "#!/usr/bin/env bash\necho status\n",
    )
    .unwrap();
    std::fs::write(dir.join("hooks/post-edit.sh"), "#!/bin/sh\ntrue\n").unwrap();
    std::fs::write(dir.join("commands/review.md"), "Review the diff.\n").unwrap();
    std::fs::write(dir.join("experts/rust.md"), "You are a Rust expert.\n").unwrap();
}

/// Install the fixture pack into `target`, confirming replacement.
pub fn install_fixture(source: &Path, target: &Path) -> InstallReport {
    let command = InstallCommand::new(target);
    command
        .execute(&InstallOptions::new(source).with_confirm_replace(true))
        .unwrap()
}

/// Serve a fixed HTTP response body on a loopback port for every request.
/// Returns the bound address; the listener task runs until dropped.
pub async fn spawn_http(body: &'static str) -> SocketAddr {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// A loopback port with nothing listening on it.
pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
