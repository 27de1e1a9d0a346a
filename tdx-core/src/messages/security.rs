//! Количество бумаг на рынке и постраничный список бумаг.

use serde::Serialize;

use crate::constants::msg_type;
use crate::cursor::Cursor;
use crate::error::DecodeError;
use crate::header::{RequestHeader, ResponseHeader};
use crate::message::{DecodeContext, Message, Response};
use crate::text::{ascii_field, gbk_field};

use super::{Market, reply_variant};

const COUNT_TAIL: [u8; 4] = [0x75, 0xc7, 0x33, 0x01];

/// Запрос числа бумаг рынка; заодно служит heartbeat-пробой
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityCountRequest {
    pub market: Market,
}

impl SecurityCountRequest {
    pub fn new(market: Market) -> Self {
        Self { market }
    }
}

impl Message for SecurityCountRequest {
    fn msg_type(&self) -> u16 {
        msg_type::SECURITY_COUNT
    }

    fn encode(&self, seq_id: u32) -> Vec<u8> {
        let mut body = Vec::with_capacity(6);
        body.extend_from_slice(&u16::from(self.market.code()).to_le_bytes());
        body.extend_from_slice(&COUNT_TAIL);
        RequestHeader::frame(seq_id, self.msg_type(), &body)
    }
}

reply_variant!(SecurityCountRequest => SecurityCount(SecurityCount));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SecurityCount {
    pub count: u16,
}

pub fn decode_count(
    _header: &ResponseHeader,
    payload: &[u8],
    _ctx: &DecodeContext,
) -> Result<Response, DecodeError> {
    let count = Cursor::new(payload).u16()?;
    Ok(Response::SecurityCount(SecurityCount { count }))
}

/// Страница списка бумаг начиная с `start` (сервер отдаёт до 1000 записей)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityListRequest {
    pub market: Market,
    pub start: u16,
}

impl SecurityListRequest {
    pub fn new(market: Market, start: u16) -> Self {
        Self { market, start }
    }
}

impl Message for SecurityListRequest {
    fn msg_type(&self) -> u16 {
        msg_type::SECURITY_LIST
    }

    fn encode(&self, seq_id: u32) -> Vec<u8> {
        let mut body = Vec::with_capacity(4);
        body.extend_from_slice(&u16::from(self.market.code()).to_le_bytes());
        body.extend_from_slice(&self.start.to_le_bytes());
        RequestHeader::frame(seq_id, self.msg_type(), &body)
    }
}

reply_variant!(SecurityListRequest => SecurityList(SecurityList));

/// Запись списка бумаг
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityItem {
    pub code: String,
    /// лотность (штук в лоте)
    pub vol_unit: u16,
    pub name: String,
    /// знаков после запятой в цене
    pub decimal_point: i8,
    pub pre_close: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityList {
    pub items: Vec<SecurityItem>,
}

pub fn decode_list(
    _header: &ResponseHeader,
    payload: &[u8],
    _ctx: &DecodeContext,
) -> Result<Response, DecodeError> {
    let mut c = Cursor::new(payload);
    let num = c.u16()?;
    let mut items = Vec::with_capacity(usize::from(num));

    // запись 29 байт
    for _ in 0..num {
        let code = ascii_field(c.take(6)?);
        let vol_unit = c.u16()?;
        let name = gbk_field(c.take(8)?);
        c.skip(4)?;
        let decimal_point = c.i8()?;
        let pre_close = c.volume()?;
        c.skip(4)?;
        items.push(SecurityItem {
            code,
            vol_unit,
            name,
            decimal_point,
            pre_close,
        });
    }

    Ok(Response::SecurityList(SecurityList { items }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Request;

    #[test]
    fn count_request_layout() {
        let bytes = SecurityCountRequest::new(Market::Sh).encode(3);
        assert_eq!(
            bytes,
            vec![
                0x0c, 3, 0, 0, 0, 0, 8, 0, 8, 0, 0x4e, 0x04, 0x01, 0x00, 0x75, 0xc7, 0x33, 0x01
            ]
        );
    }

    #[test]
    fn list_request_layout() {
        let bytes = SecurityListRequest::new(Market::Sz, 1000).encode(1);
        assert_eq!(bytes[6..8], [6, 0]);
        assert_eq!(bytes[10..12], msg_type::SECURITY_LIST.to_le_bytes());
        assert_eq!(bytes[12..], [0, 0, 0xe8, 0x03]);
    }

    #[test]
    fn list_decodes_records() {
        let mut p = 2u16.to_le_bytes().to_vec();
        for (code, name) in [
            (b"600000", [0xc6, 0xd6, 0xb7, 0xa2, 0xd2, 0xf8, 0xd0, 0xd0]),
            (b"600004", *b"ABC\0\0\0\0\0"),
        ] {
            p.extend_from_slice(code);
            p.extend(100u16.to_le_bytes());
            p.extend_from_slice(&name);
            p.extend([0u8; 4]);
            p.push(2);
            p.extend(0x4b00_0000u32.to_le_bytes());
            p.extend([0u8; 4]);
        }

        let resp = decode_list(&ResponseHeader::default(), &p, &DecodeContext::default()).unwrap();
        let list = SecurityListRequest::reply(resp).unwrap();
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.items[0].code, "600000");
        assert_eq!(list.items[0].name, "浦发银行");
        assert_eq!(list.items[0].vol_unit, 100);
        assert_eq!(list.items[0].decimal_point, 2);
        assert_eq!(list.items[0].pre_close, 8_388_608.0);
        assert_eq!(list.items[1].name, "ABC");
    }

    #[test]
    fn list_short_record_is_truncated() {
        let mut p = 1u16.to_le_bytes().to_vec();
        p.extend_from_slice(b"600000");
        let err =
            decode_list(&ResponseHeader::default(), &p, &DecodeContext::default()).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { .. }));
    }

    #[test]
    fn reply_of_other_kind_is_returned_back() {
        let other = Response::SecurityList(SecurityList { items: vec![] });
        assert_eq!(SecurityCountRequest::reply(other.clone()), Err(other));
    }
}
