//! Снимок котировок (стакан 5 уровней) по списку бумаг.

use serde::Serialize;

use crate::constants::msg_type;
use crate::cursor::Cursor;
use crate::error::DecodeError;
use crate::header::{RequestHeader, ResponseHeader};
use crate::message::{DecodeContext, Message, Response};
use crate::text::ascii_field;

use super::{Market, SecurityCode, reply_variant};

const QUOTES_PREFIX: [u8; 8] = [0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityQuotesRequest {
    pub codes: Vec<SecurityCode>,
}

impl SecurityQuotesRequest {
    pub fn new(codes: Vec<SecurityCode>) -> Self {
        Self { codes }
    }
}

impl Message for SecurityQuotesRequest {
    fn msg_type(&self) -> u16 {
        msg_type::SECURITY_QUOTES
    }

    fn encode(&self, seq_id: u32) -> Vec<u8> {
        let mut body = Vec::with_capacity(10 + self.codes.len() * 7);
        body.extend_from_slice(&QUOTES_PREFIX);
        body.extend_from_slice(&(self.codes.len() as u16).to_le_bytes());
        for code in &self.codes {
            body.push(code.market.code());
            body.extend_from_slice(&code.code_bytes());
        }
        RequestHeader::frame(seq_id, self.msg_type(), &body)
    }
}

reply_variant!(SecurityQuotesRequest => SecurityQuotes(SecurityQuotes));

/// Уровень стакана
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Level {
    pub price: f64,
    pub vol: i64,
}

/// Котировка одной бумаги. Цены в юанях, объёмы в лотах.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub market: Market,
    pub code: String,
    pub active1: u16,
    pub price: f64,
    pub last_close: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    /// время сервера в сыром виде (HHMMSSmm без ведущих нулей)
    pub server_time: i64,
    pub reserved1: i64,
    pub vol: i64,
    pub cur_vol: i64,
    pub amount: f64,
    pub s_vol: i64,
    pub b_vol: i64,
    pub reserved2: i64,
    pub reserved3: i64,
    pub bids: [Level; 5],
    pub asks: [Level; 5],
    pub reserved4: u16,
    pub reserved5: i64,
    pub reserved6: i64,
    pub reserved7: i64,
    pub reserved8: i64,
    /// скорость изменения цены, %
    pub rise_speed: f64,
    pub active2: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityQuotes {
    pub quotes: Vec<Quote>,
}

fn cents(v: i64) -> f64 {
    v as f64 / 100.0
}

pub fn decode(
    _header: &ResponseHeader,
    payload: &[u8],
    _ctx: &DecodeContext,
) -> Result<Response, DecodeError> {
    let mut c = Cursor::new(payload);
    c.skip(2)?;
    let num = c.u16()?;
    let mut quotes = Vec::with_capacity(usize::from(num));

    for _ in 0..num {
        quotes.push(decode_quote(&mut c)?);
    }

    Ok(Response::SecurityQuotes(SecurityQuotes { quotes }))
}

fn decode_quote(c: &mut Cursor<'_>) -> Result<Quote, DecodeError> {
    // неизвестный код рынка не ломает разбор остальных полей
    let market = Market::try_from(c.u8()?).unwrap_or(Market::Sz);
    let code = ascii_field(c.take(6)?);
    let active1 = c.u16()?;

    // все цены кроме текущей идут дельтой от неё
    let base = c.price()?;
    let last_close = c.price_from(base)?;
    let open = c.price_from(base)?;
    let high = c.price_from(base)?;
    let low = c.price_from(base)?;

    let server_time = c.price()?;
    let reserved1 = c.price()?;
    let vol = c.price()?;
    let cur_vol = c.price()?;
    let amount = c.volume()?;
    let s_vol = c.price()?;
    let b_vol = c.price()?;
    let reserved2 = c.price()?;
    let reserved3 = c.price()?;

    let mut bids = [Level { price: 0.0, vol: 0 }; 5];
    let mut asks = bids;
    for (bid_level, ask_level) in bids.iter_mut().zip(asks.iter_mut()) {
        let bid = c.price_from(base)?;
        let ask = c.price_from(base)?;
        let bid_vol = c.price()?;
        let ask_vol = c.price()?;
        *bid_level = Level {
            price: cents(bid),
            vol: bid_vol,
        };
        *ask_level = Level {
            price: cents(ask),
            vol: ask_vol,
        };
    }

    let reserved4 = c.u16()?;
    let reserved5 = c.price()?;
    let reserved6 = c.price()?;
    let reserved7 = c.price()?;
    let reserved8 = c.price()?;
    let rise_speed = f64::from(c.i16()?) / 100.0;
    let active2 = c.u16()?;

    Ok(Quote {
        market,
        code,
        active1,
        price: cents(base),
        last_close: cents(last_close),
        open: cents(open),
        high: cents(high),
        low: cents(low),
        server_time,
        reserved1,
        vol,
        cur_vol,
        amount,
        s_vol,
        b_vol,
        reserved2,
        reserved3,
        bids,
        asks,
        reserved4,
        reserved5,
        reserved6,
        reserved7,
        reserved8,
        rise_speed,
        active2,
    })
}
