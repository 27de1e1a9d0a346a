//! Двухшаговое рукопожатие сессии.
//!
//! Оба запроса отправляются байт в байт как их шлёт штатный терминал,
//! номер запроса в них зашит и от генератора не зависит.

use serde::Serialize;

use crate::constants::msg_type;
use crate::error::DecodeError;
use crate::header::ResponseHeader;
use crate::message::{DecodeContext, Message, Response};

use super::reply_variant;

const LOGIN1_BYTES: [u8; 13] = [
    0x0c, 0x02, 0x18, 0x93, 0x00, 0x01, 0x03, 0x00, 0x03, 0x00, 0x0d, 0x00, 0x01,
];

const LOGIN2_BYTES: [u8; 42] = [
    0x0c, 0x03, 0x18, 0x99, 0x00, 0x01, 0x20, 0x00, 0x20, 0x00, 0xdb, 0x0f, 0xd5, 0xd0, 0xc9,
    0xcc, 0xd6, 0xa4, 0xa8, 0xaf, 0x00, 0x00, 0x00, 0x8f, 0xc2, 0x25, 0x40, 0x13, 0x00, 0x00,
    0xd5, 0x00, 0xc9, 0xcc, 0xbd, 0xf0, 0xd7, 0xea, 0x00, 0x00, 0x00, 0x02,
];

/// Первый шаг рукопожатия
#[derive(Debug, Clone, Copy, Default)]
pub struct Login1Request;

/// Второй шаг рукопожатия
#[derive(Debug, Clone, Copy, Default)]
pub struct Login2Request;

impl Message for Login1Request {
    fn msg_type(&self) -> u16 {
        msg_type::LOGIN1
    }

    fn encode(&self, _seq_id: u32) -> Vec<u8> {
        LOGIN1_BYTES.to_vec()
    }
}

impl Message for Login2Request {
    fn msg_type(&self) -> u16 {
        msg_type::LOGIN2
    }

    fn encode(&self, _seq_id: u32) -> Vec<u8> {
        LOGIN2_BYTES.to_vec()
    }
}

reply_variant!(Login1Request => Login(LoginReply));
reply_variant!(Login2Request => Login(LoginReply));

/// Ответ на шаг рукопожатия; содержимое клиенту не нужно
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginReply {
    /// тип ответа (какой из двух шагов)
    pub msg_type: u16,
    /// длина payload
    pub size: usize,
}

pub fn decode(
    header: &ResponseHeader,
    payload: &[u8],
    _ctx: &DecodeContext,
) -> Result<Response, DecodeError> {
    Ok(Response::Login(LoginReply {
        msg_type: header.msg_type,
        size: payload.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::RequestHeader;
    use crate::message::Request;

    #[test]
    fn login_frames_carry_declared_lengths() {
        for (bytes, ty) in [
            (Login1Request.encode(99), msg_type::LOGIN1),
            (Login2Request.encode(99), msg_type::LOGIN2),
        ] {
            let mut raw = [0u8; 12];
            raw.copy_from_slice(&bytes[..12]);
            let h = RequestHeader::parse(&raw);
            assert_eq!(h.msg_type, ty);
            assert_eq!(usize::from(h.body_len), bytes.len() - 12);
        }
    }

    #[test]
    fn decode_reports_size_and_type() {
        let h = ResponseHeader {
            msg_type: msg_type::LOGIN2,
            ..Default::default()
        };
        let resp = decode(&h, &[0u8; 30], &DecodeContext::default()).unwrap();
        let reply = Login2Request::reply(resp).unwrap();
        assert_eq!(
            reply,
            LoginReply {
                msg_type: msg_type::LOGIN2,
                size: 30
            }
        );
    }
}
