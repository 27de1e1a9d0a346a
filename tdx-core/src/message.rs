//! Контракт сообщений протокола.
//!
//! Запрос - короткоживущее значение, которое умеет себя закодировать.
//! Ответ декодирует чистая функция из [`crate::registry::Registry`], каждый
//! раз в новое значение [`Response`], так что между вызовами ничего не
//! разделяется.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::datetime::KlineCategory;
use crate::header::ResponseHeader;
use crate::messages::{
    block::{BlockChunk, BlockMeta},
    company::{CompanyCategories, CompanyContent},
    finance::FinanceInfo,
    handshake::LoginReply,
    minute::MinuteTimeData,
    quotes::SecurityQuotes,
    security::{SecurityCount, SecurityList},
    bars::IndexBars,
    transaction::Transactions,
    xdxr::XdxrInfo,
};

/// Исходящее сообщение
pub trait Message: Send + Sync {
    /// Код типа сообщения
    fn msg_type(&self) -> u16;

    /// Байты запроса вместе с заголовком
    fn encode(&self, seq_id: u32) -> Vec<u8>;

    /// Что нужно знать декодеру ответа о запросе
    fn decode_context(&self) -> DecodeContext {
        DecodeContext::default()
    }
}

/// Запрос с типизированным ответом
pub trait Request: Message {
    /// Тип ответа
    type Reply;

    /// Достать ответ нужного вида; чужой вариант возвращается как есть
    fn reply(resp: Response) -> Result<Self::Reply, Response>;
}

/// Контекст декодирования ответа
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeContext {
    /// категория K-линий (для ответов с барами)
    pub category: Option<KlineCategory>,
    /// "сейчас" для синтеза меток баров; `None` = локальные часы
    pub now: Option<NaiveDateTime>,
}

/// Декодированный ответ
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Response {
    Login(LoginReply),
    SecurityCount(SecurityCount),
    SecurityList(SecurityList),
    SecurityQuotes(SecurityQuotes),
    IndexBars(IndexBars),
    MinuteTimeData(MinuteTimeData),
    HistoryMinuteTimeData(MinuteTimeData),
    TransactionData(Transactions),
    HistoryTransactionData(Transactions),
    CompanyInfoCategory(CompanyCategories),
    CompanyInfoContent(CompanyContent),
    FinanceInfo(FinanceInfo),
    XdxrInfo(XdxrInfo),
    BlockInfoMeta(BlockMeta),
    BlockInfo(BlockChunk),
}

impl Response {
    /// Короткое имя варианта для логов и ошибок
    pub fn kind(&self) -> &'static str {
        match self {
            Response::Login(_) => "login",
            Response::SecurityCount(_) => "security_count",
            Response::SecurityList(_) => "security_list",
            Response::SecurityQuotes(_) => "security_quotes",
            Response::IndexBars(_) => "index_bars",
            Response::MinuteTimeData(_) => "minute_time_data",
            Response::HistoryMinuteTimeData(_) => "history_minute_time_data",
            Response::TransactionData(_) => "transaction_data",
            Response::HistoryTransactionData(_) => "history_transaction_data",
            Response::CompanyInfoCategory(_) => "company_info_category",
            Response::CompanyInfoContent(_) => "company_info_content",
            Response::FinanceInfo(_) => "finance_info",
            Response::XdxrInfo(_) => "xdxr_info",
            Response::BlockInfoMeta(_) => "block_info_meta",
            Response::BlockInfo(_) => "block_info",
        }
    }
}

/// Кадр ответа: заголовок + декодированное сообщение
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: ResponseHeader,
    pub response: Response,
}
