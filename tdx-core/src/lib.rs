//! # tdx-core
//!
//! Протокол котировок TDX: кадры, примитивы и раскладки сообщений.
//!
//! Этот крейт содержит:
//!
//! - [`cursor`] - примитивные декодеры (delta-price, упакованный объём)
//! - [`datetime`] - метки времени баров и синтез следующей метки
//! - [`header`], [`frame`] - заголовки и кадровый кодек (zlib)
//! - [`registry`] - таблица "код типа -> декодер"
//! - [`messages`] - построители запросов и декодеры ответов
//! - [`hosts`], [`codes`] - список серверов и список бумаг
//! - [`error`] - типы ошибок
//!
//! ## Пример: delta-price
//!
//! ```rust
//! use tdx_core::cursor::Cursor;
//!
//! let mut c = Cursor::new(&[0x81, 0x02]);
//! assert_eq!(c.price().unwrap(), 129);
//! assert_eq!(c.position(), 2);
//! ```
//!
//! ## Пример: кадр ответа
//!
//! ```rust
//! use std::sync::Arc;
//! use tdx_core::{Codec, DecodeContext, ResponseHeader, SeqGen, TdxCodec};
//!
//! let codec = TdxCodec::with_defaults(Arc::new(SeqGen::new())).unwrap();
//! let header = ResponseHeader {
//!     msg_type: 0x044e,
//!     zip_size: 2,
//!     unzip_size: 2,
//!     ..Default::default()
//! };
//! let mut raw = header.to_bytes().to_vec();
//! raw.extend_from_slice(&[0x2a, 0x00]);
//!
//! let frame = codec.decode(&mut raw.as_slice(), &DecodeContext::default()).unwrap();
//! assert_eq!(frame.response.kind(), "security_count");
//! ```
//!
//! ## Пример: список бумаг
//!
//! ```rust
//! use tdx_core::codes::parse_codes_csv;
//!
//! let codes = parse_codes_csv("sh:600000, 000001").unwrap();
//! assert_eq!(codes[0].to_string(), "sz:000001");
//! ```
//!
//! ## Дизайн
//!
//! Крейт без потоков и сокетов: только разбор и сборка байтов. Сессии,
//! таймеры и переподключение живут в `tdx-client`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Константы протокола и коды типов сообщений.
pub mod constants;

/// Ошибки `tdx-core`.
pub mod error;

/// Курсор и примитивные декодеры.
pub mod cursor;

/// Метки времени баров.
pub mod datetime;

/// GBK и поля фиксированной ширины.
pub mod text;

/// Заголовки кадров и генератор номеров.
pub mod header;

/// Контракт сообщений.
pub mod message;

/// Таблица декодеров.
pub mod registry;

/// Кадровый кодек.
pub mod frame;

/// Конкретные сообщения.
pub mod messages;

/// `connect.cfg`.
pub mod hosts;

/// Списки бумаг.
pub mod codes;

// --- Re-exports (публичный фасад API) ---

pub use crate::datetime::{BarTime, KlineCategory};
pub use crate::error::{CodeError, CodecError, DecodeError, HostsError, RegistryError};
pub use crate::frame::{Codec, TdxCodec};
pub use crate::header::{RequestHeader, ResponseHeader, SeqGen};
pub use crate::message::{DecodeContext, Frame, Message, Request, Response};
pub use crate::messages::{Market, SecurityCode};
pub use crate::registry::Registry;
