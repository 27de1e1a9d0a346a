//! Лента сделок (тики): текущая сессия и архив по дате.

use serde::Serialize;

use crate::constants::msg_type;
use crate::cursor::Cursor;
use crate::error::DecodeError;
use crate::header::{RequestHeader, ResponseHeader};
use crate::message::{DecodeContext, Message, Response};

use super::{SecurityCode, reply_variant};

/// Страница тиков текущей сессии, от новых к старым со смещения `start`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDataRequest {
    pub security: SecurityCode,
    pub start: u16,
    pub count: u16,
}

impl TransactionDataRequest {
    pub fn new(security: SecurityCode, start: u16, count: u16) -> Self {
        Self {
            security,
            start,
            count,
        }
    }
}

impl Message for TransactionDataRequest {
    fn msg_type(&self) -> u16 {
        msg_type::TRANSACTION_DATA
    }

    fn encode(&self, seq_id: u32) -> Vec<u8> {
        let mut body = Vec::with_capacity(12);
        body.extend_from_slice(&u16::from(self.security.market.code()).to_le_bytes());
        body.extend_from_slice(&self.security.code_bytes());
        body.extend_from_slice(&self.start.to_le_bytes());
        body.extend_from_slice(&self.count.to_le_bytes());
        RequestHeader::frame(seq_id, self.msg_type(), &body)
    }
}

reply_variant!(TransactionDataRequest => TransactionData(Transactions));

/// Страница тиков за день `date` (YYYYMMDD)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTransactionDataRequest {
    pub security: SecurityCode,
    pub date: u32,
    pub start: u16,
    pub count: u16,
}

impl HistoryTransactionDataRequest {
    pub fn new(security: SecurityCode, date: u32, start: u16, count: u16) -> Self {
        Self {
            security,
            date,
            start,
            count,
        }
    }
}

impl Message for HistoryTransactionDataRequest {
    fn msg_type(&self) -> u16 {
        msg_type::HISTORY_TRANSACTION_DATA
    }

    fn encode(&self, seq_id: u32) -> Vec<u8> {
        let mut body = Vec::with_capacity(16);
        body.extend_from_slice(&self.date.to_le_bytes());
        body.extend_from_slice(&u16::from(self.security.market.code()).to_le_bytes());
        body.extend_from_slice(&self.security.code_bytes());
        body.extend_from_slice(&self.start.to_le_bytes());
        body.extend_from_slice(&self.count.to_le_bytes());
        RequestHeader::frame(seq_id, self.msg_type(), &body)
    }
}

reply_variant!(HistoryTransactionDataRequest => HistoryTransactionData(Transactions));

/// Сделка
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tick {
    /// время в виде `HH:MM`
    pub time: String,
    pub price: f64,
    pub vol: i64,
    /// число сделок в тике (в архиве не передаётся)
    pub num: Option<i64>,
    /// 0 покупка, 1 продажа, 2 нейтрально
    pub buy_or_sell: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transactions {
    pub ticks: Vec<Tick>,
}

pub fn decode_today(
    _header: &ResponseHeader,
    payload: &[u8],
    _ctx: &DecodeContext,
) -> Result<Response, DecodeError> {
    let mut c = Cursor::new(payload);
    let num = c.u16()?;
    let ticks = decode_ticks(&mut c, num, true)?;
    Ok(Response::TransactionData(Transactions { ticks }))
}

pub fn decode_history(
    _header: &ResponseHeader,
    payload: &[u8],
    _ctx: &DecodeContext,
) -> Result<Response, DecodeError> {
    let mut c = Cursor::new(payload);
    let num = c.u16()?;
    c.skip(4)?;
    let ticks = decode_ticks(&mut c, num, false)?;
    Ok(Response::HistoryTransactionData(Transactions { ticks }))
}

fn decode_ticks(c: &mut Cursor<'_>, num: u16, with_num: bool) -> Result<Vec<Tick>, DecodeError> {
    let mut ticks = Vec::with_capacity(usize::from(num));
    let mut last = 0i64;

    for _ in 0..num {
        let (hour, minute) = c.hour_minute()?;
        last = c.price_from(last)?;
        let vol = c.price()?;
        let num = if with_num { Some(c.price()?) } else { None };
        let buy_or_sell = c.price()?;
        c.price()?;

        ticks.push(Tick {
            time: format!("{hour:02}:{minute:02}"),
            price: last as f64 / 100.0,
            vol,
            num,
            buy_or_sell,
        });
    }

    Ok(ticks)
}
