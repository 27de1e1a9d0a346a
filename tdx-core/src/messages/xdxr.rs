//! События по капиталу: дивиденды, допэмиссии, сплиты и т.п.
//!
//! Каждая запись несёт 16 байт данных, смысл которых зависит от категории.

use serde::Serialize;

use crate::constants::msg_type;
use crate::cursor::Cursor;
use crate::error::DecodeError;
use crate::header::{RequestHeader, ResponseHeader};
use crate::message::{DecodeContext, Message, Response};
use crate::text::ascii_field;

use super::{SecurityCode, reply_variant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XdxrInfoRequest {
    pub security: SecurityCode,
}

impl XdxrInfoRequest {
    pub fn new(security: SecurityCode) -> Self {
        Self { security }
    }
}

impl Message for XdxrInfoRequest {
    fn msg_type(&self) -> u16 {
        msg_type::XDXR_INFO
    }

    fn encode(&self, seq_id: u32) -> Vec<u8> {
        let mut body = Vec::with_capacity(9);
        body.extend_from_slice(&1u16.to_le_bytes());
        body.push(self.security.market.code());
        body.extend_from_slice(&self.security.code_bytes());
        RequestHeader::frame(seq_id, self.msg_type(), &body)
    }
}

reply_variant!(XdxrInfoRequest => XdxrInfo(XdxrInfo));

/// Название категории события
pub fn category_name(category: u8) -> &'static str {
    match category {
        1 => "除权除息",
        2 => "送配股上市",
        3 => "非流通股上市",
        4 => "未知股本变动",
        5 => "股本变化",
        6 => "增发新股",
        7 => "股份回购",
        8 => "增发新股上市",
        9 => "转配股上市",
        10 => "可转债上市",
        11 => "扩缩股",
        12 => "非流通股缩股",
        13 => "送认购权证",
        14 => "送认沽权证",
        _ => "",
    }
}

/// Запись о событии. Поля, не относящиеся к категории, равны нулю.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XdxrEvent {
    pub market: u8,
    pub code: String,
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub category: u8,
    pub name: &'static str,
    /// дивиденд на 10 акций
    pub dividend: f32,
    pub rights_price: f32,
    pub bonus_shares: f32,
    pub rights_shares: f32,
    /// коэффициент консолидации (категории 11, 12)
    pub consolidation: f32,
    pub float_before: f64,
    pub float_after: f64,
    pub total_before: f64,
    pub total_after: f64,
    /// цена исполнения варранта (категории 13, 14)
    pub strike_price: f32,
    pub warrant_shares: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XdxrInfo {
    pub events: Vec<XdxrEvent>,
}

fn capital(raw: u32) -> f64 {
    if raw == 0 {
        0.0
    } else {
        crate::cursor::decode_volume(raw)
    }
}

pub fn decode(
    _header: &ResponseHeader,
    payload: &[u8],
    _ctx: &DecodeContext,
) -> Result<Response, DecodeError> {
    // у бумаг без событий сервер присылает короткий ответ
    if payload.len() < 11 {
        return Ok(Response::XdxrInfo(XdxrInfo { events: vec![] }));
    }

    let mut c = Cursor::new(payload);
    c.skip(9)?;
    let num = c.u16()?;
    let mut events = Vec::with_capacity(usize::from(num));

    for _ in 0..num {
        let market = c.u8()?;
        let code = ascii_field(c.take(6)?);
        c.skip(1)?;
        let date = c.u32()?;
        let category = c.u8()?;

        let mut ev = XdxrEvent {
            market,
            code,
            year: (date / 10000) as u16,
            month: ((date % 10000) / 100) as u8,
            day: (date % 100) as u8,
            category,
            name: category_name(category),
            dividend: 0.0,
            rights_price: 0.0,
            bonus_shares: 0.0,
            rights_shares: 0.0,
            consolidation: 0.0,
            float_before: 0.0,
            float_after: 0.0,
            total_before: 0.0,
            total_after: 0.0,
            strike_price: 0.0,
            warrant_shares: 0.0,
        };

        match category {
            1 => {
                ev.dividend = c.f32()?;
                ev.rights_price = c.f32()?;
                ev.bonus_shares = c.f32()?;
                ev.rights_shares = c.f32()?;
            }
            11 | 12 => {
                c.skip(8)?;
                ev.consolidation = c.f32()?;
                c.skip(4)?;
            }
            13 | 14 => {
                ev.strike_price = c.f32()?;
                c.skip(4)?;
                ev.warrant_shares = c.f32()?;
                c.skip(4)?;
            }
            _ => {
                ev.float_before = capital(c.u32()?);
                ev.float_after = capital(c.u32()?);
                ev.total_before = capital(c.u32()?);
                ev.total_after = capital(c.u32()?);
            }
        }

        events.push(ev);
    }

    Ok(Response::XdxrInfo(XdxrInfo { events }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Request;

    fn record(p: &mut Vec<u8>, category: u8, data: [u8; 16]) {
        p.push(0);
        p.extend_from_slice(b"000001");
        p.push(0);
        p.extend(20200826u32.to_le_bytes());
        p.push(category);
        p.extend_from_slice(&data);
    }

    fn f32s(v: [f32; 4]) -> [u8; 16] {
        let mut out = [0u8; 16];
        for (chunk, x) in out.chunks_exact_mut(4).zip(v) {
            chunk.copy_from_slice(&x.to_le_bytes());
        }
        out
    }

    #[test]
    fn short_payload_means_no_events() {
        let resp = decode(&ResponseHeader::default(), &[0u8; 10], &DecodeContext::default())
            .unwrap();
        assert_eq!(XdxrInfoRequest::reply(resp).unwrap().events, vec![]);
    }

    #[test]
    fn payload_shape_depends_on_category() {
        let mut p = vec![0u8; 9];
        p.extend(4u16.to_le_bytes());
        record(&mut p, 1, f32s([1.5, 0.0, 3.0, 0.0]));
        record(&mut p, 11, f32s([0.0, 0.0, 0.5, 0.0]));
        record(&mut p, 13, f32s([4.25, 0.0, 10.0, 0.0]));
        let mut caps = [0u8; 16];
        caps[0..4].copy_from_slice(&0x4b00_0000u32.to_le_bytes());
        record(&mut p, 5, caps);

        let resp = decode(&ResponseHeader::default(), &p, &DecodeContext::default()).unwrap();
        let events = XdxrInfoRequest::reply(resp).unwrap().events;
        assert_eq!(events.len(), 4);

        let e = &events[0];
        assert_eq!((e.year, e.month, e.day), (2020, 8, 26));
        assert_eq!(e.name, "除权除息");
        assert_eq!(e.dividend, 1.5);
        assert_eq!(e.bonus_shares, 3.0);

        assert_eq!(events[1].consolidation, 0.5);
        assert_eq!(events[1].name, "扩缩股");

        assert_eq!(events[2].strike_price, 4.25);
        assert_eq!(events[2].warrant_shares, 10.0);

        assert_eq!(events[3].float_before, 8_388_608.0);
        assert_eq!(events[3].float_after, 0.0);
    }

    #[test]
    fn unknown_category_has_empty_name() {
        assert_eq!(category_name(0), "");
        assert_eq!(category_name(15), "");
    }
}
