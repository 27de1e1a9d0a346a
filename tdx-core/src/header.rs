//! Заголовки кадров и генератор номеров запросов.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;

use crate::constants::{REQUEST_HEADER_LEN, RESPONSE_HEADER_LEN};

/// Заголовок запроса (12 байт, little-endian):
/// `u8 0x0c, u32 seq, u8 0, u16 len, u16 len, u16 type`,
/// где `len` считает тип сообщения и тело запроса.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub seq_id: u32,
    pub msg_type: u16,
    pub body_len: u16,
}

impl RequestHeader {
    const FLAG: u8 = 0x0c;

    pub fn new(seq_id: u32, msg_type: u16, body_len: usize) -> Self {
        Self {
            seq_id,
            msg_type,
            body_len: body_len as u16,
        }
    }

    /// Заголовок + тело одним буфером
    pub fn frame(seq_id: u32, msg_type: u16, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(REQUEST_HEADER_LEN + body.len());
        Self::new(seq_id, msg_type, body.len()).write_to(&mut out);
        out.extend_from_slice(body);
        out
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        let pkg_len = self.body_len + 2;
        out.push(Self::FLAG);
        out.extend_from_slice(&self.seq_id.to_le_bytes());
        out.push(0);
        out.extend_from_slice(&pkg_len.to_le_bytes());
        out.extend_from_slice(&pkg_len.to_le_bytes());
        out.extend_from_slice(&self.msg_type.to_le_bytes());
    }

    /// Разбор заголовка запроса (нужен тестовому серверу)
    pub fn parse(raw: &[u8; REQUEST_HEADER_LEN]) -> Self {
        let seq_id = u32::from_le_bytes([raw[1], raw[2], raw[3], raw[4]]);
        let pkg_len = u16::from_le_bytes([raw[6], raw[7]]);
        let msg_type = u16::from_le_bytes([raw[10], raw[11]]);
        Self {
            seq_id,
            msg_type,
            body_len: pkg_len.saturating_sub(2),
        }
    }
}

/// Заголовок ответа сервера (16 байт, little-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ResponseHeader {
    pub reserved1: u32,
    pub flag: u8,
    pub seq_id: u32,
    pub reserved2: u8,
    pub msg_type: u16,
    /// сколько байт payload пришло по сети
    pub zip_size: u16,
    /// сколько байт после распаковки
    pub unzip_size: u16,
}

impl ResponseHeader {
    pub fn parse(raw: &[u8; RESPONSE_HEADER_LEN]) -> Self {
        Self {
            reserved1: u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            flag: raw[4],
            seq_id: u32::from_le_bytes([raw[5], raw[6], raw[7], raw[8]]),
            reserved2: raw[9],
            msg_type: u16::from_le_bytes([raw[10], raw[11]]),
            zip_size: u16::from_le_bytes([raw[12], raw[13]]),
            unzip_size: u16::from_le_bytes([raw[14], raw[15]]),
        }
    }

    pub fn to_bytes(&self) -> [u8; RESPONSE_HEADER_LEN] {
        let mut out = [0u8; RESPONSE_HEADER_LEN];
        out[0..4].copy_from_slice(&self.reserved1.to_le_bytes());
        out[4] = self.flag;
        out[5..9].copy_from_slice(&self.seq_id.to_le_bytes());
        out[9] = self.reserved2;
        out[10..12].copy_from_slice(&self.msg_type.to_le_bytes());
        out[12..14].copy_from_slice(&self.zip_size.to_le_bytes());
        out[14..16].copy_from_slice(&self.unzip_size.to_le_bytes());
        out
    }

    /// Payload сжат
    pub fn is_compressed(&self) -> bool {
        self.zip_size != self.unzip_size
    }
}

/// Генератор номеров запросов.
///
/// Создаётся один раз на процесс и передаётся во все кодеки через `Arc`,
/// так что сессии (в том числе пересозданные после reconnect) берут номера
/// из одной монотонной последовательности. Первый выданный номер = 1.
#[derive(Debug, Default)]
pub struct SeqGen(AtomicU32);

impl SeqGen {
    pub fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Следующий номер (с переполнением через 0)
    pub fn next_id(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }
}
