use thiserror::Error;

/// Ошибки разбора payload по фиксированной раскладке
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Чтение за пределами буфера
    #[error("truncated payload: need {needed} bytes at offset {offset}, have {len}")]
    Truncated {
        /// позиция курсора
        offset: usize,
        /// сколько байт нужно прочитать
        needed: usize,
        /// длина буфера
        len: usize,
    },

    /// Delta-price или сумма дельт не помещается в i64
    #[error("delta-price at offset {0} overflows i64")]
    PriceOverflow(usize),

    /// Дата/время бара не существует в календаре
    #[error("invalid bar time {0}")]
    InvalidDate(String),

    /// Неизвестная категория K-линий
    #[error("unknown kline category: {0}")]
    UnknownCategory(u16),

    /// Декодеру не передали нужное поле контекста запроса
    #[error("decoder needs request context: {0}")]
    MissingContext(&'static str),
}

/// Ошибки кадрового кодека
#[derive(Debug, Error)]
pub enum CodecError {
    /// Заявленный размер payload больше допустимого
    #[error("bad frame: payload of {size} bytes exceeds max {max}")]
    BadFrame {
        /// размер из заголовка
        size: usize,
        /// предел
        max: usize,
    },

    /// Тип сообщения не зарегистрирован
    #[error("undefined message type {0:#06x}")]
    UndefinedMessage(u16),

    /// Ошибка сокета
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Не удалось распаковать payload
    #[error("inflate error: {0}")]
    Inflate(String),

    /// Payload не соответствует раскладке
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl CodecError {
    /// Ошибка ломает поток кадров и сессию нужно закрыть
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CodecError::UndefinedMessage(_))
    }
}

/// Ошибки таблицы кодеков
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Повторная регистрация кода
    #[error("message type {0:#06x} registered twice")]
    Duplicate(u16),
}

/// Ошибки загрузки списка хостов
#[derive(Debug, Error)]
pub enum HostsError {
    /// Ошибка чтения
    #[error("failed to read hosts config: {0}")]
    Io(#[from] std::io::Error),

    /// Секция не найдена
    #[error("section [{0}] not found")]
    MissingSection(String),

    /// Некорректное значение ключа
    #[error("bad value for {key}: {value:?}")]
    BadValue {
        /// ключ
        key: String,
        /// значение
        value: String,
    },
}

/// Ошибки разбора списка кодов бумаг
#[derive(Debug, Error)]
pub enum CodeError {
    /// Ошибка чтения файла со списком
    #[error("failed to read codes: {0}")]
    Io(#[from] std::io::Error),

    /// Неизвестный рынок
    #[error("unknown market: {0}")]
    UnknownMarket(String),

    /// Код не из 6 цифр
    #[error("security code must be 6 digits: {0}")]
    BadCode(String),
}
