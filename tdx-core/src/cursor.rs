//! Примитивные декодеры протокола поверх курсора по байтам.
//!
//! Все числа little-endian. Любое чтение проверяет границы и возвращает
//! [`DecodeError::Truncated`], поэтому битый payload не роняет поток.

use crate::error::DecodeError;

/// Курсор по payload ответа
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Курсор с начала буфера
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Текущая позиция
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Сколько байт осталось
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Пропустить `n` байт
    pub fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        self.take(n).map(|_| ())
    }

    /// Взять срез из `n` байт
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.buf.len());
        match end {
            Some(end) => {
                let out = &self.buf[self.pos..end];
                self.pos = end;
                Ok(out)
            }
            None => Err(DecodeError::Truncated {
                offset: self.pos,
                needed: n,
                len: self.buf.len(),
            }),
        }
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn i8(&mut self) -> Result<i8, DecodeError> {
        Ok(self.u8()? as i8)
    }

    pub fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn i16(&mut self) -> Result<i16, DecodeError> {
        Ok(i16::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn f32(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    /// Delta-price: знаковое число переменной длины.
    ///
    /// Первый байт: биты 0–5 модуля, бит 6 знак, бит 7 продолжение.
    /// Каждый следующий байт добавляет 7 бит со сдвигом 6, 13, 20, ...
    pub fn price(&mut self) -> Result<i64, DecodeError> {
        let start = self.pos;
        let first = self.u8()?;
        let negative = first & 0x40 != 0;
        let mut magnitude = u64::from(first & 0x3f);
        let mut more = first & 0x80 != 0;
        let mut shift = 6u32;

        while more {
            let b = self.u8()?;
            let bits = u64::from(b & 0x7f);
            if shift >= 64 || (bits << shift) >> shift != bits {
                return Err(DecodeError::PriceOverflow(start));
            }
            magnitude |= bits << shift;
            shift += 7;
            more = b & 0x80 != 0;
        }

        let value = if negative {
            0i64.checked_sub_unsigned(magnitude)
        } else {
            i64::try_from(magnitude).ok()
        };
        value.ok_or(DecodeError::PriceOverflow(start))
    }

    /// Delta-price, прибавленная к `base`; переполнение суммы тоже ошибка
    pub fn price_from(&mut self, base: i64) -> Result<i64, DecodeError> {
        let start = self.pos;
        let delta = self.price()?;
        base.checked_add(delta).ok_or(DecodeError::PriceOverflow(start))
    }

    /// Упакованный объём/сумма, см. [`decode_volume`]
    pub fn volume(&mut self) -> Result<f64, DecodeError> {
        Ok(decode_volume(self.u32()?))
    }

    /// Время дня: `u16` минут от полуночи -> (час, минута)
    pub fn hour_minute(&mut self) -> Result<(u8, u8), DecodeError> {
        let minutes = self.u16()?;
        Ok(((minutes / 60) as u8, (minutes % 60) as u8))
    }
}

/// Кодирует число в delta-price (обратная операция к [`Cursor::price`]).
pub fn encode_price(value: i64) -> Vec<u8> {
    let mut magnitude = value.unsigned_abs();
    let mut out = Vec::with_capacity(10);

    let mut first = (magnitude & 0x3f) as u8;
    if value < 0 {
        first |= 0x40;
    }
    magnitude >>= 6;
    if magnitude > 0 {
        first |= 0x80;
    }
    out.push(first);

    while magnitude > 0 {
        let mut b = (magnitude & 0x7f) as u8;
        magnitude >>= 7;
        if magnitude > 0 {
            b |= 0x80;
        }
        out.push(b);
    }

    out
}

/// Нестандартный (не IEEE-754) float объёмов и сумм.
///
/// Старший байт задаёт экспоненту `e`, остальные три байта мантиссу.
/// Формула повторяет эталонный клиент бит в бит, включая ветку
/// `1 / 2^(2e-134)` для отрицательной экспоненты второго слагаемого.
pub fn decode_volume(raw: u32) -> f64 {
    let logpoint = (raw >> 24) as i32;
    let hi = ((raw >> 16) & 0xff) as i32;
    let mid = ((raw >> 8) & 0xff) as i32;
    let lo = (raw & 0xff) as i32;

    let exp_base = logpoint * 2 - 0x7f;
    let exp_hi = logpoint * 2 - 0x86;
    let exp_mid = logpoint * 2 - 0x8e;
    let exp_lo = logpoint * 2 - 0x96;

    let base = pow2(exp_base);

    let hi_term = if hi > 0x80 {
        pow2(exp_hi) * 128.0 + f64::from(hi & 0x7f) * pow2(exp_hi + 1)
    } else if exp_hi >= 0 {
        pow2(exp_hi) * f64::from(hi)
    } else {
        (1.0 / pow2(exp_hi)) * f64::from(hi)
    };

    let mut mid_term = pow2(exp_mid) * f64::from(mid);
    let mut lo_term = pow2(exp_lo) * f64::from(lo);
    if hi & 0x80 != 0 {
        mid_term *= 2.0;
        lo_term *= 2.0;
    }

    base + hi_term + mid_term + lo_term
}

fn pow2(exp: i32) -> f64 {
    2.0f64.powi(exp)
}
