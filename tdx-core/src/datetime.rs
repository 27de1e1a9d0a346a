//! Время баров: разбор из payload и синтез следующей метки.

use std::fmt;

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use serde::Serialize;

use crate::cursor::Cursor;
use crate::error::DecodeError;

/// Период K-линий, как его понимает сервер
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u16)]
pub enum KlineCategory {
    /// 5 минут
    Min5 = 0,
    /// 15 минут
    Min15 = 1,
    /// 30 минут
    Min30 = 2,
    /// 1 час
    Hour1 = 3,
    /// день
    Daily = 4,
    /// неделя
    Weekly = 5,
    /// месяц
    Monthly = 6,
    /// 1 минута (расширенный рынок)
    ExMin1 = 7,
    /// 1 минута
    Min1 = 8,
    /// день (вариант сервера)
    DayK = 9,
    /// квартал
    Quarterly = 10,
    /// год
    Yearly = 11,
}

impl KlineCategory {
    /// Внутридневные категории кодируют дату как zipday + минуты
    pub fn is_intraday(self) -> bool {
        matches!(
            self,
            Self::Min5 | Self::Min15 | Self::Min30 | Self::Hour1 | Self::ExMin1 | Self::Min1
        )
    }

    /// Код категории на проводе
    pub fn code(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for KlineCategory {
    type Error = DecodeError;

    fn try_from(v: u16) -> Result<Self, Self::Error> {
        Ok(match v {
            0 => Self::Min5,
            1 => Self::Min15,
            2 => Self::Min30,
            3 => Self::Hour1,
            4 => Self::Daily,
            5 => Self::Weekly,
            6 => Self::Monthly,
            7 => Self::ExMin1,
            8 => Self::Min1,
            9 => Self::DayK,
            10 => Self::Quarterly,
            11 => Self::Yearly,
            other => return Err(DecodeError::UnknownCategory(other)),
        })
    }
}

/// Метка времени бара в "календарных" полях, как их отдаёт сервер.
///
/// Поля не валидируются при разборе: сервер может прислать и нули.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BarTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
}

impl fmt::Display for BarTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:02}-{:02} {:02}:{:02}:00",
            self.year, self.month, self.day, self.hour, self.minute
        )
    }
}

impl BarTime {
    /// Разбор zipday: год в старших 5 битах, месяц*100+день в младших 11
    pub fn from_zipday(zipday: u16, minutes: u16) -> Self {
        Self {
            year: (zipday >> 11) + 2004,
            month: ((zipday % 2048) / 100) as u8,
            day: ((zipday % 2048) % 100) as u8,
            hour: (minutes / 60) as u8,
            minute: (minutes % 60) as u8,
        }
    }

    /// Разбор `YYYYMMDD`, время закрытия торгов 15:00
    pub fn from_yyyymmdd(v: u32) -> Self {
        Self {
            year: (v / 10000) as u16,
            month: ((v % 10000) / 100) as u8,
            day: (v % 100) as u8,
            hour: 15,
            minute: 0,
        }
    }

    fn to_naive(self) -> Result<NaiveDateTime, DecodeError> {
        NaiveDate::from_ymd_opt(self.year.into(), self.month.into(), self.day.into())
            .and_then(|d| d.and_hms_opt(self.hour.into(), self.minute.into(), 0))
            .ok_or_else(|| DecodeError::InvalidDate(self.to_string()))
    }

    fn from_naive(t: NaiveDateTime, hour: u32, minute: u32) -> Self {
        Self {
            year: t.year() as u16,
            month: t.month() as u8,
            day: t.day() as u8,
            hour: hour as u8,
            minute: minute as u8,
        }
    }

    /// Метка следующего бара, когда сервер её не прислал.
    ///
    /// Внутри дня бар после 15:00 переносится на следующий день со сдвигом
    /// ночной сессии (+30 минут, час `(h + 18) % 24`). Для дневных и более
    /// длинных периодов метка не уходит в будущее относительно `now`, а
    /// час после 15 обрезается до 15:00.
    pub fn next(self, category: KlineCategory, now: NaiveDateTime) -> Result<Self, DecodeError> {
        let t = self.to_naive()?;
        let overflow = || DecodeError::InvalidDate(self.to_string());

        let t = match category {
            KlineCategory::Min5 => t + TimeDelta::minutes(5),
            KlineCategory::Min15 => t + TimeDelta::minutes(15),
            KlineCategory::Min30 => t + TimeDelta::minutes(30),
            KlineCategory::Hour1 => t + TimeDelta::hours(1),
            KlineCategory::ExMin1 | KlineCategory::Min1 => t + TimeDelta::minutes(1),
            KlineCategory::Daily | KlineCategory::DayK => t + TimeDelta::days(1),
            KlineCategory::Weekly => t + TimeDelta::days(7),
            KlineCategory::Monthly => t.checked_add_months(Months::new(1)).ok_or_else(overflow)?,
            KlineCategory::Quarterly => t.checked_add_months(Months::new(3)).ok_or_else(overflow)?,
            KlineCategory::Yearly => t.checked_add_months(Months::new(12)).ok_or_else(overflow)?,
        };

        if category.is_intraday() {
            if (t.hour() >= 15 && t.minute() > 0) || t.hour() > 15 {
                let wrapped = t + TimeDelta::days(1) + TimeDelta::minutes(30);
                Ok(Self::from_naive(
                    wrapped,
                    (wrapped.hour() + 18) % 24,
                    wrapped.minute(),
                ))
            } else {
                Ok(Self::from_naive(t, t.hour(), t.minute()))
            }
        } else {
            let t = if t > now { now } else { t };
            if t.hour() > 15 {
                Ok(Self::from_naive(t, 15, 0))
            } else {
                Ok(Self::from_naive(t, t.hour(), t.minute()))
            }
        }
    }
}

impl Cursor<'_> {
    /// Метка бара по схеме, зависящей от категории
    pub fn bar_time(&mut self, category: KlineCategory) -> Result<BarTime, DecodeError> {
        if category.is_intraday() {
            let zipday = self.u16()?;
            let minutes = self.u16()?;
            Ok(BarTime::from_zipday(zipday, minutes))
        } else {
            Ok(BarTime::from_yyyymmdd(self.u32()?))
        }
    }
}
