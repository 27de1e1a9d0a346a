//! Файлы секторов (板块): метаданные, загрузка кусками и разбор.
//!
//! Файл скачивается целиком кусками по [`BLOCK_CHUNK_SIZE`] байт, затем
//! разбирается [`parse_block_file`]. Раскладка файла: с позиции 384 идёт
//! число секторов, каждый сектор занимает заголовок (имя, число бумаг, тип)
//! и 2800 байт под коды по 7 байт.

use std::fmt::Write as _;

use serde::Serialize;

use crate::constants::{BLOCK_CHUNK_SIZE, msg_type};
use crate::cursor::Cursor;
use crate::error::DecodeError;
use crate::header::{RequestHeader, ResponseHeader};
use crate::message::{DecodeContext, Message, Response};
use crate::text::{ascii_field, fixed_field, gbk_field};

use super::reply_variant;

const BLOCK_FILE_HEADER: usize = 384;
const BLOCK_CODES_LEN: usize = 2800;
const BLOCK_CODE_LEN: usize = 7;

/// Размер и хеш файла секторов
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfoMetaRequest {
    pub file: String,
}

impl BlockInfoMetaRequest {
    pub fn new(file: &str) -> Self {
        Self {
            file: file.to_string(),
        }
    }
}

impl Message for BlockInfoMetaRequest {
    fn msg_type(&self) -> u16 {
        msg_type::BLOCK_INFO_META
    }

    fn encode(&self, seq_id: u32) -> Vec<u8> {
        RequestHeader::frame(seq_id, self.msg_type(), &fixed_field::<40>(&self.file))
    }
}

reply_variant!(BlockInfoMetaRequest => BlockInfoMeta(BlockMeta));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockMeta {
    pub size: u32,
    /// хеш содержимого в hex
    pub hash: String,
}

impl BlockMeta {
    /// Сколько кусков нужно запросить
    pub fn chunk_count(&self) -> u32 {
        self.size.div_ceil(BLOCK_CHUNK_SIZE)
    }
}

pub fn decode_meta(
    _header: &ResponseHeader,
    payload: &[u8],
    _ctx: &DecodeContext,
) -> Result<Response, DecodeError> {
    let mut c = Cursor::new(payload);
    let size = c.u32()?;
    c.skip(1)?;
    let raw = c.take(32)?;
    c.skip(1)?;

    let mut hash = String::with_capacity(64);
    for b in raw {
        let _ = write!(hash, "{b:02x}");
    }

    Ok(Response::BlockInfoMeta(BlockMeta { size, hash }))
}

/// Кусок файла секторов начиная со смещения `start`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfoRequest {
    pub file: String,
    pub start: u32,
    /// полный размер файла из [`BlockMeta`]
    pub size: u32,
}

impl BlockInfoRequest {
    pub fn new(file: &str, start: u32, size: u32) -> Self {
        Self {
            file: file.to_string(),
            start,
            size,
        }
    }
}

impl Message for BlockInfoRequest {
    fn msg_type(&self) -> u16 {
        msg_type::BLOCK_INFO
    }

    fn encode(&self, seq_id: u32) -> Vec<u8> {
        let mut body = Vec::with_capacity(108);
        body.extend_from_slice(&self.start.to_le_bytes());
        body.extend_from_slice(&self.size.to_le_bytes());
        body.extend_from_slice(&fixed_field::<100>(&self.file));
        RequestHeader::frame(seq_id, self.msg_type(), &body)
    }
}

reply_variant!(BlockInfoRequest => BlockInfo(BlockChunk));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockChunk {
    pub data: Vec<u8>,
}

pub fn decode_chunk(
    _header: &ResponseHeader,
    payload: &[u8],
    _ctx: &DecodeContext,
) -> Result<Response, DecodeError> {
    let mut c = Cursor::new(payload);
    c.skip(4)?;
    let data = c.take(c.remaining())?.to_vec();
    Ok(Response::BlockInfo(BlockChunk { data }))
}

/// Сектор и его бумаги
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    pub name: String,
    pub block_type: u16,
    pub codes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BlockFile {
    pub blocks: Vec<Block>,
}

/// Разбор собранного файла секторов
pub fn parse_block_file(raw: &[u8]) -> Result<BlockFile, DecodeError> {
    let mut c = Cursor::new(raw);
    c.skip(BLOCK_FILE_HEADER)?;
    let num = c.u16()?;
    let mut blocks = Vec::with_capacity(usize::from(num));

    for _ in 0..num {
        let name = gbk_field(c.take(9)?);
        let stock_count = c.u16()?;
        let block_type = c.u16()?;

        // последний сектор в файле может быть короче 2800 байт
        let area = c.take(BLOCK_CODES_LEN.min(c.remaining()))?;
        let mut codes_cur = Cursor::new(area);
        let mut codes = Vec::with_capacity(usize::from(stock_count));
        for _ in 0..stock_count {
            codes.push(ascii_field(codes_cur.take(BLOCK_CODE_LEN)?));
        }

        blocks.push(Block {
            name,
            block_type,
            codes,
        });
    }

    Ok(BlockFile { blocks })
}
