//! Справочник F10: оглавление и фрагменты текстовых разделов.

use serde::Serialize;

use crate::constants::msg_type;
use crate::cursor::Cursor;
use crate::error::DecodeError;
use crate::header::{RequestHeader, ResponseHeader};
use crate::message::{DecodeContext, Message, Response};
use crate::text::{ascii_field, fixed_field, gbk_field};

use super::{SecurityCode, reply_variant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyInfoCategoryRequest {
    pub security: SecurityCode,
}

impl CompanyInfoCategoryRequest {
    pub fn new(security: SecurityCode) -> Self {
        Self { security }
    }
}

impl Message for CompanyInfoCategoryRequest {
    fn msg_type(&self) -> u16 {
        msg_type::COMPANY_CATEGORY
    }

    fn encode(&self, seq_id: u32) -> Vec<u8> {
        let mut body = Vec::with_capacity(12);
        body.extend_from_slice(&u16::from(self.security.market.code()).to_le_bytes());
        body.extend_from_slice(&self.security.code_bytes());
        body.extend_from_slice(&0u32.to_le_bytes());
        RequestHeader::frame(seq_id, self.msg_type(), &body)
    }
}

reply_variant!(CompanyInfoCategoryRequest => CompanyInfoCategory(CompanyCategories));

/// Раздел F10: где лежит текст и сколько его
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyCategory {
    pub name: String,
    pub file_name: String,
    pub start: u32,
    pub length: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyCategories {
    pub items: Vec<CompanyCategory>,
}

pub fn decode_category(
    _header: &ResponseHeader,
    payload: &[u8],
    _ctx: &DecodeContext,
) -> Result<Response, DecodeError> {
    let mut c = Cursor::new(payload);
    let num = c.u16()?;
    let mut items = Vec::with_capacity(usize::from(num));

    for _ in 0..num {
        let name = gbk_field(c.take(64)?);
        let file_name = ascii_field(c.take(80)?);
        let start = c.u32()?;
        let length = c.u32()?;
        items.push(CompanyCategory {
            name,
            file_name,
            start,
            length,
        });
    }

    Ok(Response::CompanyInfoCategory(CompanyCategories { items }))
}

/// Фрагмент раздела: файл и диапазон из [`CompanyCategory`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyInfoContentRequest {
    pub security: SecurityCode,
    pub file_name: String,
    pub start: u32,
    pub length: u32,
}

impl CompanyInfoContentRequest {
    pub fn new(security: SecurityCode, file_name: &str, start: u32, length: u32) -> Self {
        Self {
            security,
            file_name: file_name.to_string(),
            start,
            length,
        }
    }
}

impl Message for CompanyInfoContentRequest {
    fn msg_type(&self) -> u16 {
        msg_type::COMPANY_CONTENT
    }

    fn encode(&self, seq_id: u32) -> Vec<u8> {
        let mut body = Vec::with_capacity(102);
        body.extend_from_slice(&u16::from(self.security.market.code()).to_le_bytes());
        body.extend_from_slice(&self.security.code_bytes());
        body.extend_from_slice(&0u16.to_le_bytes());
        body.extend_from_slice(&fixed_field::<80>(&self.file_name));
        body.extend_from_slice(&self.start.to_le_bytes());
        body.extend_from_slice(&self.length.to_le_bytes());
        body.extend_from_slice(&0u32.to_le_bytes());
        RequestHeader::frame(seq_id, self.msg_type(), &body)
    }
}

reply_variant!(CompanyInfoContentRequest => CompanyInfoContent(CompanyContent));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyContent {
    pub content: String,
}

pub fn decode_content(
    _header: &ResponseHeader,
    payload: &[u8],
    _ctx: &DecodeContext,
) -> Result<Response, DecodeError> {
    let mut c = Cursor::new(payload);
    c.skip(10)?;
    let len = c.u16()?;
    let content = gbk_field(c.take(usize::from(len))?);
    Ok(Response::CompanyInfoContent(CompanyContent { content }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Request;

    #[test]
    fn categories_decode() {
        let mut p = 1u16.to_le_bytes().to_vec();
        let mut name = [0u8; 64];
        // "最新提示"
        name[..8].copy_from_slice(&[0xd7, 0xee, 0xd0, 0xc2, 0xcc, 0xe1, 0xca, 0xbe]);
        p.extend_from_slice(&name);
        p.extend_from_slice(&fixed_field::<80>("600000.txt"));
        p.extend(0u32.to_le_bytes());
        p.extend(4096u32.to_le_bytes());

        let resp =
            decode_category(&ResponseHeader::default(), &p, &DecodeContext::default()).unwrap();
        let items = CompanyInfoCategoryRequest::reply(resp).unwrap().items;
        assert_eq!(
            items,
            vec![CompanyCategory {
                name: "最新提示".into(),
                file_name: "600000.txt".into(),
                start: 0,
                length: 4096,
            }]
        );
    }

    #[test]
    fn content_decodes_declared_length() {
        let mut p = vec![0u8; 10];
        p.extend(5u16.to_le_bytes());
        p.extend_from_slice(b"hello, ignored tail");

        let resp =
            decode_content(&ResponseHeader::default(), &p, &DecodeContext::default()).unwrap();
        let content = CompanyInfoContentRequest::reply(resp).unwrap();
        assert_eq!(content.content, "hello");
    }

    #[test]
    fn content_request_layout() {
        let req = CompanyInfoContentRequest::new(
            "sh:600000".parse().unwrap(),
            "600000.txt",
            100,
            200,
        );
        let bytes = req.encode(1);
        assert_eq!(bytes[6..8], 0x68u16.to_le_bytes());
        assert_eq!(bytes.len(), 12 + 102);
        assert_eq!(&bytes[22..32], b"600000.txt");
        assert_eq!(bytes[102..106], 100u32.to_le_bytes());
        assert_eq!(bytes[106..110], 200u32.to_le_bytes());
    }
}
