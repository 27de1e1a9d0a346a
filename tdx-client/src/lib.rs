//! # tdx-client
//!
//! Клиент серверов котировок TDX поверх `tdx-core`.
//!
//! - [`timing`] - таймерное колесо (heartbeat и пользовательские таймеры)
//! - [`session`] - одно соединение: рукопожатие, запросы по одному, heartbeat,
//!   закрытие и переподключение
//! - [`hq`] - фасад с методом на каждый вид запроса
//! - [`error`] - ошибки сессии
//!
//! Потоки: у каждой сессии поток чтения, `worker_count` циклов событий и
//! поток таймерного колеса. Между ними только `crossbeam-channel`.

#![forbid(unsafe_code)]

use std::sync::{Mutex, MutexGuard};

/// Ошибки сессии и таймеров.
pub mod error;

/// Фасад `TdxHq`.
pub mod hq;

/// Сессия и её конфигурация.
pub mod session;

/// Таймерное колесо.
pub mod timing;

#[cfg(test)]
mod testutil;

pub use crate::error::{SessionError, TimerError};
pub use crate::hq::TdxHq;
pub use crate::session::{Session, SessionConfig, SessionId, State};

/// Берём лок даже после паники другого потока: данные под ним остаются валидными
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}
