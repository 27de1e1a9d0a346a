//! Кадровый кодек: байты сокета <-> сообщения.
//!
//! Ответ: 16 байт заголовка, затем `zip_size` байт payload. Если
//! `zip_size != unzip_size`, payload сжат zlib. Запросы не сжимаются.

use std::io::Read;
use std::sync::Arc;

use flate2::read::ZlibDecoder;
use log::trace;

use crate::constants::{MAX_FRAME_PAYLOAD, RESPONSE_HEADER_LEN};
use crate::error::{CodecError, RegistryError};
use crate::header::{ResponseHeader, SeqGen};
use crate::message::{DecodeContext, Frame, Message};
use crate::registry::Registry;

/// Кодек, которым сессия кодирует запросы и читает ответы
pub trait Codec: Send + Sync {
    /// Байты запроса (номер запроса выдаёт сам кодек)
    fn encode(&self, msg: &dyn Message) -> Vec<u8>;

    /// Читает из потока ровно один кадр и декодирует его
    fn decode(&self, r: &mut dyn Read, ctx: &DecodeContext) -> Result<Frame, CodecError>;
}

/// Кодек протокола TDX поверх таблицы декодеров
#[derive(Debug, Clone)]
pub struct TdxCodec {
    registry: Arc<Registry>,
    seq: Arc<SeqGen>,
}

impl TdxCodec {
    pub fn new(registry: Arc<Registry>, seq: Arc<SeqGen>) -> Self {
        Self { registry, seq }
    }

    /// Кодек со встроенными раскладками
    pub fn with_defaults(seq: Arc<SeqGen>) -> Result<Self, RegistryError> {
        Ok(Self::new(Arc::new(Registry::with_defaults()?), seq))
    }
}

impl Codec for TdxCodec {
    fn encode(&self, msg: &dyn Message) -> Vec<u8> {
        msg.encode(self.seq.next_id())
    }

    fn decode(&self, r: &mut dyn Read, ctx: &DecodeContext) -> Result<Frame, CodecError> {
        let (header, payload) = read_frame(r)?;

        // payload уже вычитан: даже для неизвестного типа поток остаётся выровненным
        let decoder = self
            .registry
            .lookup(header.msg_type)
            .ok_or(CodecError::UndefinedMessage(header.msg_type))?;

        let response = decoder(&header, &payload, ctx)?;
        Ok(Frame { header, response })
    }
}

/// Читает заголовок и payload одного кадра, распаковывая его при необходимости.
///
/// Размер из заголовка проверяется до выделения буфера и чтения payload.
pub fn read_frame(r: &mut dyn Read) -> Result<(ResponseHeader, Vec<u8>), CodecError> {
    let mut raw = [0u8; RESPONSE_HEADER_LEN];
    r.read_exact(&mut raw)?;
    let header = ResponseHeader::parse(&raw);

    let zip_size = usize::from(header.zip_size);
    if zip_size > MAX_FRAME_PAYLOAD {
        return Err(CodecError::BadFrame {
            size: zip_size,
            max: MAX_FRAME_PAYLOAD,
        });
    }

    let mut payload = vec![0u8; zip_size];
    r.read_exact(&mut payload)?;

    trace!(
        "frame type={:#06x} seq={} zip={} unzip={}",
        header.msg_type, header.seq_id, header.zip_size, header.unzip_size
    );

    if !header.is_compressed() {
        return Ok((header, payload));
    }

    let expected = usize::from(header.unzip_size);
    let mut out = Vec::with_capacity(expected);
    ZlibDecoder::new(payload.as_slice())
        .take(expected as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| CodecError::Inflate(e.to_string()))?;

    if out.len() != expected {
        return Err(CodecError::Inflate(format!(
            "inflated {} bytes, header says {expected}",
            out.len()
        )));
    }

    Ok((header, out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::msg_type;
    use crate::error::DecodeError;
    use crate::message::Response;
    use crate::messages::security::{SecurityCount, SecurityCountRequest};
    use crate::messages::Market;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::{Cursor, Write};

    fn codec() -> TdxCodec {
        TdxCodec::with_defaults(Arc::new(SeqGen::new())).unwrap()
    }

    fn frame_bytes(msg_type: u16, zip: u16, unzip: u16, payload: &[u8]) -> Vec<u8> {
        let h = ResponseHeader {
            reserved1: 0x0074_cbb1,
            flag: 0x0c,
            seq_id: 1,
            reserved2: 0,
            msg_type,
            zip_size: zip,
            unzip_size: unzip,
        };
        let mut out = h.to_bytes().to_vec();
        out.extend_from_slice(payload);
        out
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn oversized_frame_fails_before_payload_read() {
        let raw = frame_bytes(msg_type::SECURITY_COUNT, 40_000, 40_000, &[0u8; 8]);
        let mut r = Cursor::new(raw);

        let err = codec().decode(&mut r, &DecodeContext::default()).unwrap_err();
        assert!(matches!(
            err,
            CodecError::BadFrame {
                size: 40_000,
                max: MAX_FRAME_PAYLOAD
            }
        ));
        // прочитан только заголовок
        assert_eq!(r.position(), RESPONSE_HEADER_LEN as u64);
    }

    #[test]
    fn max_sized_frame_is_accepted() {
        let payload = vec![0u8; MAX_FRAME_PAYLOAD];
        let raw = frame_bytes(
            msg_type::SECURITY_COUNT,
            MAX_FRAME_PAYLOAD as u16,
            MAX_FRAME_PAYLOAD as u16,
            &payload,
        );
        let frame = codec()
            .decode(&mut Cursor::new(raw), &DecodeContext::default())
            .unwrap();
        assert_eq!(
            frame.response,
            Response::SecurityCount(SecurityCount { count: 0 })
        );
    }

    #[test]
    fn raw_payload_is_used_as_is() {
        let raw = frame_bytes(msg_type::SECURITY_COUNT, 2, 2, &[0x10, 0x27]);
        let frame = codec()
            .decode(&mut Cursor::new(raw), &DecodeContext::default())
            .unwrap();
        assert_eq!(frame.header.msg_type, msg_type::SECURITY_COUNT);
        assert_eq!(
            frame.response,
            Response::SecurityCount(SecurityCount { count: 10_000 })
        );
    }

    #[test]
    fn compressed_payload_is_inflated() {
        let plain = [0x39, 0x30, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff];
        let packed = zlib(&plain);
        let raw = frame_bytes(
            msg_type::SECURITY_COUNT,
            packed.len() as u16,
            plain.len() as u16,
            &packed,
        );

        let (header, payload) = read_frame(&mut Cursor::new(raw.clone())).unwrap();
        assert!(header.is_compressed());
        assert_eq!(payload, plain);

        let frame = codec()
            .decode(&mut Cursor::new(raw), &DecodeContext::default())
            .unwrap();
        assert_eq!(
            frame.response,
            Response::SecurityCount(SecurityCount { count: 12_345 })
        );
    }

    #[test]
    fn garbage_compressed_payload_is_inflate_error() {
        let raw = frame_bytes(msg_type::SECURITY_COUNT, 3, 10, &[1, 2, 3]);
        let err = codec()
            .decode(&mut Cursor::new(raw), &DecodeContext::default())
            .unwrap_err();
        assert!(matches!(err, CodecError::Inflate(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn inflated_length_must_match_header() {
        let packed = zlib(&[1, 2, 3, 4]);
        let raw = frame_bytes(msg_type::SECURITY_COUNT, packed.len() as u16, 9, &packed);
        let err = read_frame(&mut Cursor::new(raw)).unwrap_err();
        assert!(matches!(err, CodecError::Inflate(_)));
    }

    #[test]
    fn undefined_type_consumes_payload() {
        let mut raw = frame_bytes(0x9999, 3, 3, &[1, 2, 3]);
        raw.extend(frame_bytes(msg_type::SECURITY_COUNT, 2, 2, &[5, 0]));
        let mut r = Cursor::new(raw);
        let c = codec();

        let err = c.decode(&mut r, &DecodeContext::default()).unwrap_err();
        assert!(matches!(err, CodecError::UndefinedMessage(0x9999)));
        assert!(!err.is_fatal());

        // следующий кадр читается с правильной позиции
        let frame = c.decode(&mut r, &DecodeContext::default()).unwrap();
        assert_eq!(
            frame.response,
            Response::SecurityCount(SecurityCount { count: 5 })
        );
    }

    #[test]
    fn truncated_payload_is_decode_error() {
        let raw = frame_bytes(msg_type::SECURITY_COUNT, 1, 1, &[5]);
        let err = codec()
            .decode(&mut Cursor::new(raw), &DecodeContext::default())
            .unwrap_err();
        assert!(matches!(
            err,
            CodecError::Decode(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn short_stream_is_io_error() {
        let err = read_frame(&mut Cursor::new(vec![0u8; 5])).unwrap_err();
        assert!(matches!(err, CodecError::Io(_)));
    }

    #[test]
    fn encode_uses_injected_sequence() {
        let seq = Arc::new(SeqGen::new());
        let c = TdxCodec::with_defaults(seq.clone()).unwrap();
        let req = SecurityCountRequest::new(Market::Sh);

        let first = c.encode(&req);
        let second = c.encode(&req);
        assert_eq!(first[1..5], 1u32.to_le_bytes());
        assert_eq!(second[1..5], 2u32.to_le_bytes());
        assert_eq!(seq.next_id(), 3);
    }
}
