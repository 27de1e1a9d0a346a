use std::time::Duration;

/// Длина заголовка ответа сервера
pub const RESPONSE_HEADER_LEN: usize = 0x10;

/// Длина заголовка запроса клиента
pub const REQUEST_HEADER_LEN: usize = 0x0c;

/// Максимальный размер payload кадра (в байтах, как пришло по сети)
pub const MAX_FRAME_PAYLOAD: usize = 1 << 15;

/// Простой соединения, после которого отправляется heartbeat-запрос
pub const HEARTBEAT_THRESHOLD: Duration = Duration::from_secs(10);

/// Как часто проверяем простой
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// Размер куска файла блоков на один запрос
pub const BLOCK_CHUNK_SIZE: u32 = 0x7530;

/// Сервер отдаёт не больше 2000 сделок за запрос
pub const MAX_TRANSACTION_COUNT: u16 = 2000;

/// Сервер отдаёт не больше 800 баров за запрос
pub const MAX_KLINE_COUNT: u16 = 800;

/// Порт HQ-серверов по умолчанию
pub const DEFAULT_PORT: u16 = 7709;

/// Файлы блоков (секторов)
pub const BLOCK_INDEX: &str = "block_zs.dat";
/// Стилевые блоки
pub const BLOCK_STYLE: &str = "block_fg.dat";
/// Концептуальные блоки
pub const BLOCK_CONCEPT: &str = "block_gn.dat";
/// Блоки по умолчанию
pub const BLOCK_DEFAULT: &str = "block.dat";

/// Коды типов сообщений
pub mod msg_type {
    /// логин, шаг 1
    pub const LOGIN1: u16 = 0x000d;
    /// логин, шаг 2
    pub const LOGIN2: u16 = 0x0fdb;
    pub const SECURITY_COUNT: u16 = 0x044e;
    pub const BLOCK_INFO_META: u16 = 0x02c5;
    pub const BLOCK_INFO: u16 = 0x06b9;
    pub const COMPANY_CATEGORY: u16 = 0x02cf;
    pub const COMPANY_CONTENT: u16 = 0x02d0;
    pub const FINANCE_INFO: u16 = 0x0010;
    pub const HISTORY_MINUTE_TIME_DATA: u16 = 0x0fb4;
    pub const HISTORY_TRANSACTION_DATA: u16 = 0x0fb5;
    pub const INDEX_BARS: u16 = 0x052d;
    pub const MINUTE_TIME_DATA: u16 = 0x0537;
    pub const SECURITY_LIST: u16 = 0x0450;
    pub const SECURITY_QUOTES: u16 = 0x053e;
    pub const TRANSACTION_DATA: u16 = 0x0fc5;
    pub const XDXR_INFO: u16 = 0x000f;
}
