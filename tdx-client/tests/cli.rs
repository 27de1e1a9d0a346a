use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;

use assert_cmd::Command;
use predicates::prelude::*;

use tdx_core::constants::{REQUEST_HEADER_LEN, msg_type};
use tdx_core::{RequestHeader, ResponseHeader};

/// Сервер на одно соединение: логин и число бумаг
fn spawn_server(count: u16) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };
        loop {
            let mut raw = [0u8; REQUEST_HEADER_LEN];
            if stream.read_exact(&mut raw).is_err() {
                break;
            }
            let req = RequestHeader::parse(&raw);
            let mut body = vec![0u8; usize::from(req.body_len)];
            if stream.read_exact(&mut body).is_err() {
                break;
            }

            let payload = match req.msg_type {
                msg_type::SECURITY_COUNT => count.to_le_bytes().to_vec(),
                _ => vec![0u8; 4],
            };
            let header = ResponseHeader {
                reserved1: 0x0074_cbb1,
                flag: 0x0c,
                seq_id: req.seq_id,
                reserved2: 0,
                msg_type: req.msg_type,
                zip_size: payload.len() as u16,
                unzip_size: payload.len() as u16,
            };
            let mut out = header.to_bytes().to_vec();
            out.extend_from_slice(&payload);
            if stream.write_all(&out).is_err() {
                break;
            }
        }
    });

    addr
}

fn closed_port() -> String {
    let l = TcpListener::bind("127.0.0.1:0").unwrap();
    l.local_addr().unwrap().to_string()
}

fn tdx() -> Command {
    Command::cargo_bin("tdx-client").unwrap()
}

#[test]
fn help_lists_commands() {
    tdx()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("count").and(predicate::str::contains("watch")));
}

#[test]
fn endpoint_is_required() {
    tdx().args(["count", "sh"]).assert().failure();
}

#[test]
fn count_prints_json() {
    let addr = spawn_server(42);
    tdx()
        .args(["--server", &addr, "--no-reconnect", "count", "sh"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"count\": 42")
                .and(predicate::str::contains("\"market\": \"sh\"")),
        );
}

#[test]
fn missing_hosts_file_fails_before_connecting() {
    tdx()
        .args(["--hosts", "/definitely/not/here/connect.cfg", "count", "sz"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("hosts file not found"));
}

#[test]
fn bad_code_list_fails_before_connecting() {
    tdx()
        .args(["--server", &closed_port(), "quotes", "sh:12"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bad security list"));
}

#[test]
fn unreachable_server_fails() {
    tdx()
        .args(["--server", &closed_port(), "--timeout", "1", "count", "sh"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no server reachable"));
}
