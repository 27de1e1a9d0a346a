//! Минутный график: текущий день и исторический по дате.

use serde::Serialize;

use crate::constants::msg_type;
use crate::cursor::Cursor;
use crate::error::DecodeError;
use crate::header::{RequestHeader, ResponseHeader};
use crate::message::{DecodeContext, Message, Response};

use super::{SecurityCode, reply_variant};

/// Минутный график за текущую сессию
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinuteTimeDataRequest {
    pub security: SecurityCode,
}

impl MinuteTimeDataRequest {
    pub fn new(security: SecurityCode) -> Self {
        Self { security }
    }
}

impl Message for MinuteTimeDataRequest {
    fn msg_type(&self) -> u16 {
        msg_type::MINUTE_TIME_DATA
    }

    fn encode(&self, seq_id: u32) -> Vec<u8> {
        let mut body = Vec::with_capacity(12);
        body.extend_from_slice(&u16::from(self.security.market.code()).to_le_bytes());
        body.extend_from_slice(&self.security.code_bytes());
        body.extend_from_slice(&0u32.to_le_bytes());
        RequestHeader::frame(seq_id, self.msg_type(), &body)
    }
}

reply_variant!(MinuteTimeDataRequest => MinuteTimeData(MinuteTimeData));

/// Минутный график за прошедший день, `date` в виде YYYYMMDD
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryMinuteTimeDataRequest {
    pub security: SecurityCode,
    pub date: u32,
}

impl HistoryMinuteTimeDataRequest {
    pub fn new(security: SecurityCode, date: u32) -> Self {
        Self { security, date }
    }
}

impl Message for HistoryMinuteTimeDataRequest {
    fn msg_type(&self) -> u16 {
        msg_type::HISTORY_MINUTE_TIME_DATA
    }

    fn encode(&self, seq_id: u32) -> Vec<u8> {
        let mut body = Vec::with_capacity(11);
        body.extend_from_slice(&self.date.to_le_bytes());
        body.push(self.security.market.code());
        body.extend_from_slice(&self.security.code_bytes());
        RequestHeader::frame(seq_id, self.msg_type(), &body)
    }
}

reply_variant!(HistoryMinuteTimeDataRequest => HistoryMinuteTimeData(MinuteTimeData));

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MinutePoint {
    pub price: f64,
    pub vol: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MinuteTimeData {
    pub points: Vec<MinutePoint>,
}

pub fn decode_today(
    _header: &ResponseHeader,
    payload: &[u8],
    _ctx: &DecodeContext,
) -> Result<Response, DecodeError> {
    let mut c = Cursor::new(payload);
    let num = c.u16()?;
    c.skip(2)?;
    Ok(Response::MinuteTimeData(decode_points(&mut c, num)?))
}

pub fn decode_history(
    _header: &ResponseHeader,
    payload: &[u8],
    _ctx: &DecodeContext,
) -> Result<Response, DecodeError> {
    let mut c = Cursor::new(payload);
    let num = c.u16()?;
    c.skip(4)?;
    Ok(Response::HistoryMinuteTimeData(decode_points(&mut c, num)?))
}

/// Точки: цена накопительной дельтой, неизвестное поле, объём
fn decode_points(c: &mut Cursor<'_>, num: u16) -> Result<MinuteTimeData, DecodeError> {
    let mut points = Vec::with_capacity(usize::from(num));
    let mut last = 0i64;
    for _ in 0..num {
        last = c.price_from(last)?;
        c.price()?;
        let vol = c.price()?;
        points.push(MinutePoint {
            price: last as f64 / 100.0,
            vol,
        });
    }
    Ok(MinuteTimeData { points })
}
