//! K-линии (бары) индексов и бумаг.
//!
//! Метку времени сервер присылает только для первого бара, остальные
//! синтезируются через [`BarTime::next`]. Цены идут дельтами от
//! бегущей базы, делитель 1000.

use chrono::Local;
use serde::Serialize;

use crate::constants::msg_type;
use crate::cursor::Cursor;
use crate::datetime::{BarTime, KlineCategory};
use crate::error::DecodeError;
use crate::header::{RequestHeader, ResponseHeader};
use crate::message::{DecodeContext, Message, Response};

use super::{SecurityCode, reply_variant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBarsRequest {
    pub security: SecurityCode,
    pub category: KlineCategory,
    pub start: u16,
    pub count: u16,
}

impl IndexBarsRequest {
    pub fn new(security: SecurityCode, category: KlineCategory, start: u16, count: u16) -> Self {
        Self {
            security,
            category,
            start,
            count,
        }
    }
}

impl Message for IndexBarsRequest {
    fn msg_type(&self) -> u16 {
        msg_type::INDEX_BARS
    }

    fn encode(&self, seq_id: u32) -> Vec<u8> {
        let mut body = Vec::with_capacity(26);
        body.extend_from_slice(&u16::from(self.security.market.code()).to_le_bytes());
        body.extend_from_slice(&self.security.code_bytes());
        body.extend_from_slice(&self.category.code().to_le_bytes());
        body.extend_from_slice(&1u16.to_le_bytes());
        body.extend_from_slice(&self.start.to_le_bytes());
        body.extend_from_slice(&self.count.to_le_bytes());
        body.extend_from_slice(&[0u8; 10]);
        RequestHeader::frame(seq_id, self.msg_type(), &body)
    }

    fn decode_context(&self) -> DecodeContext {
        DecodeContext {
            category: Some(self.category),
            now: None,
        }
    }
}

reply_variant!(IndexBarsRequest => IndexBars(IndexBars));

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub time: BarTime,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub vol: f64,
    pub amount: f64,
    /// число растущих бумаг индекса (у последнего бара не передаётся)
    pub up_count: u16,
    pub down_count: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexBars {
    pub category: KlineCategory,
    pub bars: Vec<Bar>,
}

pub fn decode(
    _header: &ResponseHeader,
    payload: &[u8],
    ctx: &DecodeContext,
) -> Result<Response, DecodeError> {
    let category = ctx
        .category
        .ok_or(DecodeError::MissingContext("kline category"))?;
    let now = ctx.now.unwrap_or_else(|| Local::now().naive_local());

    let mut c = Cursor::new(payload);
    let num = c.u16()?;
    let mut bars: Vec<Bar> = Vec::with_capacity(usize::from(num));
    let mut base = 0i64;

    for i in 0..num {
        let time = match bars.last() {
            None => c.bar_time(category)?,
            Some(prev) => prev.time.next(category, now)?,
        };

        // open от закрытия прошлого бара, остальные от open
        let open = c.price_from(base)?;
        let close = c.price_from(open)?;
        let high = c.price_from(open)?;
        let low = c.price_from(open)?;
        let vol = c.volume()?;
        let amount = c.volume()?;

        let (up_count, down_count) = if i + 1 < num {
            (c.u16()?, c.u16()?)
        } else {
            (0, 0)
        };

        bars.push(Bar {
            time,
            open: open as f64 / 1000.0,
            close: close as f64 / 1000.0,
            high: high as f64 / 1000.0,
            low: low as f64 / 1000.0,
            vol,
            amount,
            up_count,
            down_count,
        });
        base = close;
    }

    Ok(Response::IndexBars(IndexBars { category, bars }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::encode_price;
    use crate::message::Request;
    use chrono::NaiveDate;

    fn ctx(category: KlineCategory) -> DecodeContext {
        DecodeContext {
            category: Some(category),
            now: NaiveDate::from_ymd_opt(2030, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0),
        }
    }

    fn bar(p: &mut Vec<u8>, diffs: [i64; 4], last: bool) {
        for d in diffs {
            p.extend(encode_price(d));
        }
        p.extend(0x4b00_0000u32.to_le_bytes());
        p.extend(0x4b80_0000u32.to_le_bytes());
        if !last {
            p.extend(11u16.to_le_bytes());
            p.extend(22u16.to_le_bytes());
        }
    }

    #[test]
    fn request_layout_and_context() {
        let req = IndexBarsRequest::new(
            "sh:000001".parse().unwrap(),
            KlineCategory::Daily,
            0,
            100,
        );
        let bytes = req.encode(5);
        assert_eq!(bytes[6..8], 0x1cu16.to_le_bytes());
        assert_eq!(bytes.len(), 12 + 26);
        assert_eq!(bytes[12..14], [1, 0]);
        assert_eq!(&bytes[14..20], b"000001");
        assert_eq!(bytes[20..22], [4, 0]);
        assert_eq!(bytes[22..24], [1, 0]);
        assert_eq!(bytes[26..28], [100, 0]);
        assert_eq!(req.decode_context().category, Some(KlineCategory::Daily));
    }

    #[test]
    fn daily_bars_accumulate_prices_and_synthesize_times() {
        let mut p = 2u16.to_le_bytes().to_vec();
        p.extend(20200826u32.to_le_bytes());
        bar(&mut p, [3000, 100, 150, -50], false);
        bar(&mut p, [10, -20, 30, -40], true);

        let resp = decode(&ResponseHeader::default(), &p, &ctx(KlineCategory::Daily)).unwrap();
        let bars = IndexBarsRequest::reply(resp).unwrap().bars;
        assert_eq!(bars.len(), 2);

        assert_eq!(bars[0].time.to_string(), "2020-08-26 15:00:00");
        assert_eq!(bars[0].open, 3.0);
        assert_eq!(bars[0].close, 3.1);
        assert_eq!(bars[0].high, 3.15);
        assert_eq!(bars[0].low, 2.95);
        assert_eq!(bars[0].vol, 8_388_608.0);
        assert_eq!(bars[0].amount, 16_777_216.0);
        assert_eq!((bars[0].up_count, bars[0].down_count), (11, 22));

        // база второго бара = закрытие первого (3100)
        assert_eq!(bars[1].time.to_string(), "2020-08-27 15:00:00");
        assert_eq!(bars[1].open, 3.11);
        assert_eq!(bars[1].close, 3.09);
        assert_eq!(bars[1].high, 3.14);
        assert_eq!(bars[1].low, 3.07);
        assert_eq!((bars[1].up_count, bars[1].down_count), (0, 0));
    }

    #[test]
    fn intraday_bars_use_zipday() {
        let zipday: u16 = ((2020 - 2004) << 11) | (8 * 100 + 26);
        let mut p = 2u16.to_le_bytes().to_vec();
        p.extend(zipday.to_le_bytes());
        p.extend((14 * 60 + 55u16).to_le_bytes());
        bar(&mut p, [1000, 0, 0, 0], false);
        bar(&mut p, [0, 0, 0, 0], true);

        let resp = decode(&ResponseHeader::default(), &p, &ctx(KlineCategory::Min5)).unwrap();
        let Response::IndexBars(bars) = resp else {
            panic!("unexpected response kind");
        };
        assert_eq!(bars.bars[0].time.to_string(), "2020-08-26 14:55:00");
        assert_eq!(bars.bars[1].time.to_string(), "2020-08-26 15:00:00");
    }

    #[test]
    fn missing_category_is_error() {
        let p = 0u16.to_le_bytes();
        let err =
            decode(&ResponseHeader::default(), &p, &DecodeContext::default()).unwrap_err();
        assert_eq!(err, DecodeError::MissingContext("kline category"));
    }

    #[test]
    fn empty_reply_has_no_bars() {
        let p = 0u16.to_le_bytes();
        let resp = decode(&ResponseHeader::default(), &p, &ctx(KlineCategory::Weekly)).unwrap();
        assert_eq!(
            resp,
            Response::IndexBars(IndexBars {
                category: KlineCategory::Weekly,
                bars: vec![]
            })
        );
    }
}
