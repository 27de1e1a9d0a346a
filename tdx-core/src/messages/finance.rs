//! Базовые финансовые показатели эмитента.
//!
//! Значения отдаются как есть, без пересчёта единиц.

use serde::Serialize;

use crate::constants::msg_type;
use crate::cursor::Cursor;
use crate::error::DecodeError;
use crate::header::{RequestHeader, ResponseHeader};
use crate::message::{DecodeContext, Message, Response};
use crate::text::ascii_field;

use super::{SecurityCode, reply_variant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinanceInfoRequest {
    pub security: SecurityCode,
}

impl FinanceInfoRequest {
    pub fn new(security: SecurityCode) -> Self {
        Self { security }
    }
}

impl Message for FinanceInfoRequest {
    fn msg_type(&self) -> u16 {
        msg_type::FINANCE_INFO
    }

    fn encode(&self, seq_id: u32) -> Vec<u8> {
        let mut body = Vec::with_capacity(9);
        body.extend_from_slice(&1u16.to_le_bytes());
        body.push(self.security.market.code());
        body.extend_from_slice(&self.security.code_bytes());
        RequestHeader::frame(seq_id, self.msg_type(), &body)
    }
}

reply_variant!(FinanceInfoRequest => FinanceInfo(FinanceInfo));

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinanceInfo {
    pub market: u8,
    pub code: String,
    /// акции в свободном обращении
    pub float_shares: f32,
    pub province: u16,
    pub industry: u16,
    pub updated_date: u32,
    pub ipo_date: u32,
    pub total_shares: f32,
    pub state_shares: f32,
    pub promoter_shares: f32,
    pub corporate_shares: f32,
    pub b_shares: f32,
    pub h_shares: f32,
    pub employee_shares: f32,
    pub total_assets: f32,
    pub current_assets: f32,
    pub fixed_assets: f32,
    pub intangible_assets: f32,
    pub shareholders: f32,
    pub current_liabilities: f32,
    pub long_term_liabilities: f32,
    pub capital_reserve: f32,
    pub net_assets: f32,
    pub main_revenue: f32,
    pub main_profit: f32,
    pub receivables: f32,
    pub operating_profit: f32,
    pub investment_income: f32,
    pub operating_cash_flow: f32,
    pub total_cash_flow: f32,
    pub inventory: f32,
    pub total_profit: f32,
    pub after_tax_profit: f32,
    pub net_profit: f32,
    pub undistributed_profit: f32,
    pub reserved1: f32,
    pub reserved2: f32,
}

pub fn decode(
    _header: &ResponseHeader,
    payload: &[u8],
    _ctx: &DecodeContext,
) -> Result<Response, DecodeError> {
    let mut c = Cursor::new(payload);
    c.skip(2)?;

    let market = c.u8()?;
    let code = ascii_field(c.take(6)?);
    let float_shares = c.f32()?;
    let province = c.u16()?;
    let industry = c.u16()?;
    let updated_date = c.u32()?;
    let ipo_date = c.u32()?;

    let mut v = [0f32; 30];
    for slot in v.iter_mut() {
        *slot = c.f32()?;
    }

    Ok(Response::FinanceInfo(FinanceInfo {
        market,
        code,
        float_shares,
        province,
        industry,
        updated_date,
        ipo_date,
        total_shares: v[0],
        state_shares: v[1],
        promoter_shares: v[2],
        corporate_shares: v[3],
        b_shares: v[4],
        h_shares: v[5],
        employee_shares: v[6],
        total_assets: v[7],
        current_assets: v[8],
        fixed_assets: v[9],
        intangible_assets: v[10],
        shareholders: v[11],
        current_liabilities: v[12],
        long_term_liabilities: v[13],
        capital_reserve: v[14],
        net_assets: v[15],
        main_revenue: v[16],
        main_profit: v[17],
        receivables: v[18],
        operating_profit: v[19],
        investment_income: v[20],
        operating_cash_flow: v[21],
        total_cash_flow: v[22],
        inventory: v[23],
        total_profit: v[24],
        after_tax_profit: v[25],
        net_profit: v[26],
        undistributed_profit: v[27],
        reserved1: v[28],
        reserved2: v[29],
    }))
}
