use thiserror::Error;

use tdx_core::error::{CodecError, DecodeError, RegistryError};

/// Ошибки таймерного колеса
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    /// Колесо уже остановлено
    #[error("timing wheel is stopped")]
    Stopped,
}

/// Ошибки сессии и фасада
#[derive(Debug, Error)]
pub enum SessionError {
    /// Не удалось подключиться ни к одному адресу
    #[error("failed to dial {addr}: {reason}")]
    Dial {
        /// адрес из конфигурации
        addr: String,
        /// последняя ошибка
        reason: String,
    },

    /// Сессия закрыта (явно или после сбоя)
    #[error("session {0} is closed")]
    Closed(u64),

    /// Ошибка кодека при чтении ответа
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Ошибка сокета при записи запроса
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Сервер ответил сообщением другого вида
    #[error("unexpected {got} response to request {expected:#06x}")]
    UnexpectedResponse {
        /// тип запроса
        expected: u16,
        /// вид полученного ответа
        got: &'static str,
    },

    /// Собранные данные (файл секторов) не разбираются
    #[error("failed to parse assembled data: {0}")]
    Parse(#[from] DecodeError),

    /// Длина собранного файла секторов не совпала с метаданными
    #[error("block file {file}: expected {expected} bytes, assembled {got}")]
    BlockSize {
        file: String,
        expected: u32,
        got: usize,
    },

    /// Ошибка сборки таблицы кодеков
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Не удалось поставить таймер
    #[error(transparent)]
    Timer(#[from] TimerError),
}

impl SessionError {
    /// После этой ошибки сессией пользоваться нельзя
    pub fn is_fatal(&self) -> bool {
        match self {
            SessionError::Codec(e) => e.is_fatal(),
            SessionError::Io(_) | SessionError::Closed(_) => true,
            _ => false,
        }
    }
}

/// Копия ошибки кодека для передачи в хуки и цикл событий
pub(crate) fn duplicate(e: &CodecError) -> CodecError {
    match e {
        CodecError::BadFrame { size, max } => CodecError::BadFrame {
            size: *size,
            max: *max,
        },
        CodecError::UndefinedMessage(code) => CodecError::UndefinedMessage(*code),
        CodecError::Io(io) => CodecError::Io(std::io::Error::new(io.kind(), io.to_string())),
        CodecError::Inflate(s) => CodecError::Inflate(s.clone()),
        CodecError::Decode(d) => CodecError::Decode(d.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn fatality_follows_codec_policy() {
        assert!(!SessionError::Codec(CodecError::UndefinedMessage(1)).is_fatal());
        assert!(SessionError::Codec(CodecError::Inflate("x".into())).is_fatal());
        assert!(SessionError::Closed(3).is_fatal());
        assert!(
            !SessionError::UnexpectedResponse {
                expected: 0x044e,
                got: "login"
            }
            .is_fatal()
        );
        assert!(!SessionError::Parse(DecodeError::PriceOverflow(0)).is_fatal());
        assert!(
            !SessionError::BlockSize {
                file: "block.dat".into(),
                expected: 10,
                got: 4
            }
            .is_fatal()
        );
    }

    #[test]
    fn duplicate_keeps_kind_and_message() {
        let e = CodecError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        let copy = duplicate(&e);
        assert!(matches!(&copy, CodecError::Io(io) if io.kind() == io::ErrorKind::UnexpectedEof));
        assert_eq!(copy.to_string(), e.to_string());
    }
}
