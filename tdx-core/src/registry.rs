use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::constants::msg_type;
use crate::error::{DecodeError, RegistryError};
use crate::header::ResponseHeader;
use crate::message::{DecodeContext, Response};
use crate::messages;

/// Декодер ответа: чистая функция, каждый вызов возвращает новое значение
pub type DecodeFn =
    fn(&ResponseHeader, &[u8], &DecodeContext) -> Result<Response, DecodeError>;

/// Таблица "код типа -> декодер".
///
/// Собирается один раз при старте и дальше только читается
/// (обычно живёт в `Arc` внутри кодека).
#[derive(Debug, Clone, Default)]
pub struct Registry {
    decoders: HashMap<u16, DecodeFn>,
}

impl Registry {
    /// Пустая таблица
    pub fn new() -> Self {
        Self::default()
    }

    /// Таблица со всеми встроенными раскладками
    pub fn with_defaults() -> Result<Self, RegistryError> {
        let mut r = Self::new();
        r.register(msg_type::LOGIN1, messages::handshake::decode)?;
        r.register(msg_type::LOGIN2, messages::handshake::decode)?;
        r.register(msg_type::SECURITY_COUNT, messages::security::decode_count)?;
        r.register(msg_type::SECURITY_LIST, messages::security::decode_list)?;
        r.register(msg_type::SECURITY_QUOTES, messages::quotes::decode)?;
        r.register(msg_type::INDEX_BARS, messages::bars::decode)?;
        r.register(msg_type::MINUTE_TIME_DATA, messages::minute::decode_today)?;
        r.register(
            msg_type::HISTORY_MINUTE_TIME_DATA,
            messages::minute::decode_history,
        )?;
        r.register(msg_type::TRANSACTION_DATA, messages::transaction::decode_today)?;
        r.register(
            msg_type::HISTORY_TRANSACTION_DATA,
            messages::transaction::decode_history,
        )?;
        r.register(msg_type::COMPANY_CATEGORY, messages::company::decode_category)?;
        r.register(msg_type::COMPANY_CONTENT, messages::company::decode_content)?;
        r.register(msg_type::FINANCE_INFO, messages::finance::decode)?;
        r.register(msg_type::XDXR_INFO, messages::xdxr::decode)?;
        r.register(msg_type::BLOCK_INFO_META, messages::block::decode_meta)?;
        r.register(msg_type::BLOCK_INFO, messages::block::decode_chunk)?;
        Ok(r)
    }

    /// Регистрирует декодер; повторная регистрация кода - ошибка конфигурации
    pub fn register(&mut self, code: u16, decoder: DecodeFn) -> Result<(), RegistryError> {
        match self.decoders.entry(code) {
            Entry::Vacant(e) => {
                e.insert(decoder);
                Ok(())
            }
            Entry::Occupied(_) => Err(RegistryError::Duplicate(code)),
        }
    }

    /// Декодер для кода, если он зарегистрирован
    pub fn lookup(&self, code: u16) -> Option<DecodeFn> {
        self.decoders.get(&code).copied()
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}
