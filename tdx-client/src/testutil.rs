//! Loopback-сервер для тестов сессии и фасада.
//!
//! Читает запросы по заголовку, отдаёт решение обработчику и пишет ответ
//! кадром TDX. Заодно считает соединения и запросы и ловит конвейерную
//! отправку (второй запрос пришёл раньше ответа на первый).

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use flate2::Compression;
use flate2::write::ZlibEncoder;

use tdx_core::constants::{REQUEST_HEADER_LEN, msg_type};
use tdx_core::{RequestHeader, ResponseHeader, SeqGen, TdxCodec};

use crate::lock;
use crate::session::SessionConfig;

/// Что сервер делает с запросом
pub(crate) enum Reply {
    Payload {
        msg_type: u16,
        body: Vec<u8>,
        compress: bool,
    },
    /// записать байты как есть (битый кадр)
    Frame(Vec<u8>),
    /// закрыть соединение
    Drop,
    /// не отвечать
    Silent,
}

impl Reply {
    pub(crate) fn raw(msg_type: u16, body: Vec<u8>) -> Self {
        Reply::Payload {
            msg_type,
            body,
            compress: false,
        }
    }

    pub(crate) fn zipped(msg_type: u16, body: Vec<u8>) -> Self {
        Reply::Payload {
            msg_type,
            body,
            compress: true,
        }
    }
}

/// Обработчик: (номер соединения, заголовок, тело) -> ответ
pub(crate) type Handler = Arc<dyn Fn(usize, &RequestHeader, &[u8]) -> Reply + Send + Sync>;

pub(crate) const COUNT: u16 = 42;

/// Логин и число бумаг; остальное не отвечаем
pub(crate) fn standard(h: &RequestHeader) -> Reply {
    match h.msg_type {
        msg_type::LOGIN1 | msg_type::LOGIN2 => Reply::raw(h.msg_type, vec![0u8; 8]),
        msg_type::SECURITY_COUNT => Reply::raw(h.msg_type, COUNT.to_le_bytes().to_vec()),
        _ => Reply::Silent,
    }
}

/// Конфигурация сессии с быстрыми таймерами
pub(crate) fn config(addr: &str) -> SessionConfig {
    let codec = TdxCodec::with_defaults(Arc::new(SeqGen::new())).unwrap();
    SessionConfig::new(addr, Arc::new(codec))
        .with_timer_tick(Duration::from_millis(10))
        .with_connect_timeout(Duration::from_secs(1))
}

pub(crate) struct MockServer {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<(usize, u16)>>>,
    pipelined: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

impl MockServer {
    pub(crate) fn start<F>(handler: F) -> Self
    where
        F: Fn(usize, &RequestHeader, &[u8]) -> Reply + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        listener.set_nonblocking(true).unwrap();

        let server = Self {
            addr,
            connections: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            pipelined: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(AtomicBool::new(false)),
        };

        let connections = server.connections.clone();
        let requests = server.requests.clone();
        let pipelined = server.pipelined.clone();
        let stop = server.stop.clone();
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let idx = connections.fetch_add(1, Ordering::SeqCst);
                        let handler = handler.clone();
                        let requests = requests.clone();
                        let pipelined = pipelined.clone();
                        thread::spawn(move || serve(idx, stream, handler, requests, pipelined));
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            }
        });

        server
    }

    pub(crate) fn standard() -> Self {
        Self::start(|_, h, _| standard(h))
    }

    pub(crate) fn addr(&self) -> String {
        self.addr.to_string()
    }

    pub(crate) fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Сколько запросов данного типа пришло по всем соединениям
    pub(crate) fn requests_of(&self, code: u16) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|(_, t)| *t == code)
            .count()
    }

    pub(crate) fn pipelined(&self) -> bool {
        self.pipelined.load(Ordering::SeqCst)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

fn serve(
    idx: usize,
    mut stream: TcpStream,
    handler: Handler,
    requests: Arc<Mutex<Vec<(usize, u16)>>>,
    pipelined: Arc<AtomicBool>,
) {
    stream.set_nonblocking(false).unwrap();
    loop {
        let mut raw = [0u8; REQUEST_HEADER_LEN];
        if stream.read_exact(&mut raw).is_err() {
            break;
        }
        let header = RequestHeader::parse(&raw);
        let mut body = vec![0u8; usize::from(header.body_len)];
        if stream.read_exact(&mut body).is_err() {
            break;
        }
        lock(&requests).push((idx, header.msg_type));

        // клиент не должен слать следующий запрос, пока не получил ответ
        if stream.set_nonblocking(true).is_ok() {
            let mut probe = [0u8; 1];
            if let Ok(n) = stream.peek(&mut probe) {
                if n > 0 {
                    pipelined.store(true, Ordering::SeqCst);
                }
            }
            let _ = stream.set_nonblocking(false);
        }

        match handler(idx, &header, &body) {
            Reply::Payload {
                msg_type,
                body,
                compress,
            } => {
                if stream
                    .write_all(&response(header.seq_id, msg_type, &body, compress))
                    .is_err()
                {
                    break;
                }
            }
            Reply::Frame(raw) => {
                if stream.write_all(&raw).is_err() {
                    break;
                }
            }
            Reply::Drop => {
                let _ = stream.shutdown(Shutdown::Both);
                break;
            }
            Reply::Silent => {}
        }
    }
}

/// Кадр ответа как его шлёт сервер
pub(crate) fn response(seq_id: u32, msg_type: u16, body: &[u8], compress: bool) -> Vec<u8> {
    let payload = if compress {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(body).unwrap();
        enc.finish().unwrap()
    } else {
        body.to_vec()
    };

    let header = ResponseHeader {
        reserved1: 0x0074_cbb1,
        flag: 0x0c,
        seq_id,
        reserved2: 0,
        msg_type,
        zip_size: payload.len() as u16,
        unzip_size: body.len() as u16,
    };
    let mut out = header.to_bytes().to_vec();
    out.extend_from_slice(&payload);
    out
}
