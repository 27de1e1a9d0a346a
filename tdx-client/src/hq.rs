//! Фасад `TdxHq`: по методу на каждый вид запроса.
//!
//! Держит текущую сессию и подменяет её: перед каждым вызовом забирает
//! опубликованную замену, а после фатальной ошибки сам переподключается,
//! если этого не сделала сессия. Запрос, на котором случилась ошибка,
//! не повторяется.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};

use tdx_core::constants::{BLOCK_CHUNK_SIZE, MAX_KLINE_COUNT, MAX_TRANSACTION_COUNT};
use tdx_core::messages::bars::{IndexBars, IndexBarsRequest};
use tdx_core::messages::block::{
    BlockFile, BlockInfoMetaRequest, BlockInfoRequest, parse_block_file,
};
use tdx_core::messages::company::{
    CompanyCategories, CompanyContent, CompanyInfoCategoryRequest, CompanyInfoContentRequest,
};
use tdx_core::messages::finance::{FinanceInfo, FinanceInfoRequest};
use tdx_core::messages::minute::{
    HistoryMinuteTimeDataRequest, MinuteTimeData, MinuteTimeDataRequest,
};
use tdx_core::messages::quotes::{SecurityQuotes, SecurityQuotesRequest};
use tdx_core::messages::security::{SecurityCountRequest, SecurityList, SecurityListRequest};
use tdx_core::messages::transaction::{
    HistoryTransactionDataRequest, TransactionDataRequest, Transactions,
};
use tdx_core::messages::xdxr::{XdxrInfo, XdxrInfoRequest};
use tdx_core::{KlineCategory, Market, Request, SecurityCode};

use crate::error::SessionError;
use crate::lock;
use crate::session::{Session, SessionConfig, SessionId};

pub struct TdxHq {
    id: SessionId,
    config: SessionConfig,
    current: Mutex<Arc<Session>>,
    closed: AtomicBool,
}

impl TdxHq {
    pub fn connect(id: SessionId, config: SessionConfig) -> Result<Self, SessionError> {
        let session = Session::connect(id, config.clone())?;
        Ok(Self {
            id,
            config,
            current: Mutex::new(session),
            closed: AtomicBool::new(false),
        })
    }

    /// Текущая сессия (с учётом всех опубликованных замен)
    pub fn session(&self) -> Arc<Session> {
        let mut cur = lock(&self.current);
        while let Some(next) = cur.replacement() {
            info!("hq {}: switched to reconnected session", self.id);
            *cur = next;
        }
        cur.clone()
    }

    fn request<R: Request>(&self, req: &R) -> Result<R::Reply, SessionError> {
        let session = self.session();
        let result = session.request(req);
        if let Err(e) = &result {
            if e.is_fatal() {
                self.recover(&session);
            }
        }
        result
    }

    /// После фатальной ошибки: дождаться закрытия сессии и взять замену
    /// (или подключиться самому)
    fn recover(&self, failed: &Arc<Session>) {
        if !self.config.reconnect || self.closed.load(Ordering::SeqCst) {
            return;
        }

        let wait = self.config.connect_timeout * 2 + Duration::from_secs(1);
        if !failed.wait_closed(wait) {
            warn!("hq {}: session did not close in {wait:?}", self.id);
            return;
        }

        let mut cur = lock(&self.current);
        if !Arc::ptr_eq(&cur, failed) {
            return;
        }
        if let Some(next) = failed.replacement() {
            *cur = next;
            return;
        }

        match Session::connect(self.id, self.config.clone()) {
            Ok(next) => {
                info!("hq {}: reconnected to {}", self.id, next.peer_addr());
                *cur = next;
            }
            Err(e) => warn!("hq {}: reconnect failed: {e}", self.id),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Число бумаг рынка
    pub fn security_count(&self, market: Market) -> Result<u16, SessionError> {
        Ok(self.request(&SecurityCountRequest::new(market))?.count)
    }

    /// Страница списка бумаг начиная с `start`
    pub fn security_list(&self, market: Market, start: u16) -> Result<SecurityList, SessionError> {
        self.request(&SecurityListRequest::new(market, start))
    }

    /// Снимки котировок с пятью уровнями стакана
    pub fn security_quotes(&self, codes: &[SecurityCode]) -> Result<SecurityQuotes, SessionError> {
        self.request(&SecurityQuotesRequest::new(codes.to_vec()))
    }

    /// Бары; не больше 800 за вызов
    pub fn index_bars(
        &self,
        code: &SecurityCode,
        category: KlineCategory,
        start: u16,
        count: u16,
    ) -> Result<IndexBars, SessionError> {
        let count = count.min(MAX_KLINE_COUNT);
        self.request(&IndexBarsRequest::new(code.clone(), category, start, count))
    }

    pub fn minute_time_data(&self, code: &SecurityCode) -> Result<MinuteTimeData, SessionError> {
        self.request(&MinuteTimeDataRequest::new(code.clone()))
    }

    /// `date` в виде YYYYMMDD
    pub fn history_minute_time_data(
        &self,
        code: &SecurityCode,
        date: u32,
    ) -> Result<MinuteTimeData, SessionError> {
        self.request(&HistoryMinuteTimeDataRequest::new(code.clone(), date))
    }

    /// Сделки за сегодня; не больше 2000 за вызов
    pub fn transaction_data(
        &self,
        code: &SecurityCode,
        start: u16,
        count: u16,
    ) -> Result<Transactions, SessionError> {
        let count = count.min(MAX_TRANSACTION_COUNT);
        self.request(&TransactionDataRequest::new(code.clone(), start, count))
    }

    pub fn history_transaction_data(
        &self,
        code: &SecurityCode,
        date: u32,
        start: u16,
        count: u16,
    ) -> Result<Transactions, SessionError> {
        let count = count.min(MAX_TRANSACTION_COUNT);
        self.request(&HistoryTransactionDataRequest::new(
            code.clone(),
            date,
            start,
            count,
        ))
    }

    pub fn company_info_category(
        &self,
        code: &SecurityCode,
    ) -> Result<CompanyCategories, SessionError> {
        self.request(&CompanyInfoCategoryRequest::new(code.clone()))
    }

    /// Кусок текста раздела (`file_name`, `start`, `length` из каталога)
    pub fn company_info_content(
        &self,
        code: &SecurityCode,
        file_name: &str,
        start: u32,
        length: u32,
    ) -> Result<CompanyContent, SessionError> {
        self.request(&CompanyInfoContentRequest::new(
            code.clone(),
            file_name,
            start,
            length,
        ))
    }

    pub fn finance_info(&self, code: &SecurityCode) -> Result<FinanceInfo, SessionError> {
        self.request(&FinanceInfoRequest::new(code.clone()))
    }

    pub fn xdxr_info(&self, code: &SecurityCode) -> Result<XdxrInfo, SessionError> {
        self.request(&XdxrInfoRequest::new(code.clone()))
    }

    /// Файл секторов целиком: метаданные, затем куски по 0x7530 байт
    pub fn block_info(&self, file: &str) -> Result<BlockFile, SessionError> {
        let meta = self.request(&BlockInfoMetaRequest::new(file))?;
        if meta.size == 0 {
            return Ok(BlockFile::default());
        }

        // буфер растёт по мере прихода кусков
        let mut raw = Vec::new();
        for i in 0..meta.chunk_count() {
            let chunk = self.request(&BlockInfoRequest::new(file, i * BLOCK_CHUNK_SIZE, meta.size))?;
            if chunk.data.is_empty() {
                break;
            }
            raw.extend_from_slice(&chunk.data);
        }
        debug!(
            "hq {}: {file} assembled, {} of {} bytes",
            self.id,
            raw.len(),
            meta.size
        );

        if raw.len() != meta.size as usize {
            return Err(SessionError::BlockSize {
                file: file.to_string(),
                expected: meta.size,
                got: raw.len(),
            });
        }
        Ok(parse_block_file(&raw)?)
    }

    /// Закрывает текущую сессию; дальше все вызовы вернут `Closed`
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.session().close();
    }
}
