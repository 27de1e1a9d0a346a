//! Таймерное колесо (hashed timing wheel).
//!
//! Колесо из `slots` ячеек, каждая ячейка соответствует одному тику.
//! Таймер кладётся в ячейку `(cursor + t) % slots`, где `t` - число тиков
//! до срока, и ждёт `rounds = (t - 1) / slots` полных оборотов. Отдельный
//! поток-драйвер двигает курсор раз в тик и отправляет сработавшие таймеры
//! в канал владельца; колбэки выполняет цикл событий сессии, не драйвер.
//!
//! Отмена - O(1): флаг в таймере + удаление из индекса, сама запись
//! выбрасывается из ячейки лениво. Все таймеры одного владельца
//! гасятся разом через [`OwnerToken::invalidate`].

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, trace, warn};

use crate::error::TimerError;
use crate::lock;

/// Число ячеек по умолчанию
pub const DEFAULT_SLOTS: usize = 64;

/// Колбэк таймера; периодический таймер вызывает его много раз
pub type TimerCallback = Arc<dyn Fn() + Send + Sync>;

/// Хендл таймера для отмены
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// Владелец таймеров (сессия).
///
/// Клоны разделяют один флаг: после [`invalidate`](Self::invalidate)
/// ни один таймер владельца больше не сработает.
#[derive(Debug, Clone)]
pub struct OwnerToken {
    id: u64,
    alive: Arc<AtomicBool>,
}

impl OwnerToken {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn invalidate(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// Сработавший таймер, доставленный в цикл событий
pub struct Fired {
    id: TimerId,
    owner_id: u64,
    cancelled: Arc<AtomicBool>,
    owner_alive: Arc<AtomicBool>,
    callback: TimerCallback,
}

impl Fired {
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Чей это таймер
    pub fn owner_id(&self) -> u64 {
        self.owner_id
    }

    /// Таймер не отменён и владелец жив
    pub fn is_live(&self) -> bool {
        !self.cancelled.load(Ordering::SeqCst) && self.owner_alive.load(Ordering::SeqCst)
    }

    /// Выполняет колбэк, если таймер всё ещё жив. Возвращает, был ли вызов.
    pub fn run(&self) -> bool {
        if !self.is_live() {
            return false;
        }
        (self.callback)();
        true
    }
}

impl fmt::Debug for Fired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fired")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("live", &self.is_live())
            .finish()
    }
}

struct Entry {
    id: u64,
    deadline: Instant,
    interval: Option<Duration>,
    rounds: usize,
    cancelled: Arc<AtomicBool>,
    owner: OwnerToken,
    callback: TimerCallback,
}

impl Entry {
    fn fired(&self) -> Fired {
        Fired {
            id: TimerId(self.id),
            owner_id: self.owner.id,
            cancelled: self.cancelled.clone(),
            owner_alive: self.owner.alive.clone(),
            callback: self.callback.clone(),
        }
    }

    fn is_dead(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst) || !self.owner.is_alive()
    }
}

struct Wheel {
    slots: Vec<VecDeque<Entry>>,
    cursor: usize,
    /// момент, которому соответствует текущая ячейка
    cursor_time: Instant,
    tick: Duration,
    /// живые таймеры: id -> флаг отмены
    index: HashMap<u64, Arc<AtomicBool>>,
}

/// Сколько тиков до срока (с округлением вверх)
fn ticks_for(delay: Duration, tick: Duration) -> usize {
    let tick = tick.as_nanos().max(1);
    delay.as_nanos().div_ceil(tick) as usize
}

impl Wheel {
    fn insert(&mut self, mut e: Entry) {
        let n = self.slots.len();
        let delay = e.deadline.saturating_duration_since(self.cursor_time);
        let ticks = ticks_for(delay, self.tick).max(1);
        e.rounds = (ticks - 1) / n;
        let slot = (self.cursor + ticks) % n;
        self.slots[slot].push_back(e);
    }

    /// Сдвиг на один тик; возвращает таймеры, чей срок наступил, в порядке постановки
    fn advance(&mut self, now: Instant) -> Vec<Entry> {
        self.cursor = (self.cursor + 1) % self.slots.len();
        self.cursor_time += self.tick;

        let slot = std::mem::take(&mut self.slots[self.cursor]);
        let mut due = Vec::new();
        for mut e in slot {
            if e.is_dead() {
                self.index.remove(&e.id);
            } else if e.rounds > 0 {
                e.rounds -= 1;
                self.slots[self.cursor].push_back(e);
            } else if e.deadline > now {
                self.insert(e);
            } else {
                due.push(e);
            }
        }
        due
    }
}

/// Таймерное колесо с собственным потоком-драйвером
pub struct TimingWheel {
    inner: Arc<Mutex<Wheel>>,
    next_id: AtomicU64,
    stop_tx: Mutex<Option<Sender<()>>>,
    driver: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl TimingWheel {
    /// Запускает драйвер. Сработавшие таймеры уходят в `out`.
    pub fn start(tick: Duration, slots: usize, out: Sender<Fired>) -> std::io::Result<Self> {
        let tick = tick.max(Duration::from_millis(1));
        let inner = Arc::new(Mutex::new(Wheel {
            slots: (0..slots.max(1)).map(|_| VecDeque::new()).collect(),
            cursor: 0,
            cursor_time: Instant::now(),
            tick,
            index: HashMap::new(),
        }));

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let driver = {
            let inner = inner.clone();
            thread::Builder::new()
                .name("tdx-timer".into())
                .spawn(move || drive(inner, stop_rx, out))?
        };

        debug!("timing wheel started: tick={tick:?}, slots={slots}");
        Ok(Self {
            inner,
            next_id: AtomicU64::new(0),
            stop_tx: Mutex::new(Some(stop_tx)),
            driver: Mutex::new(Some(driver)),
            stopped: AtomicBool::new(false),
        })
    }

    /// Ставит таймер. `interval` = 0 - однократный, иначе повторяется до отмены.
    pub fn add_timer(
        &self,
        deadline: Instant,
        interval: Duration,
        owner: &OwnerToken,
        callback: TimerCallback,
    ) -> Result<TimerId, TimerError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(TimerError::Stopped);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let cancelled = Arc::new(AtomicBool::new(false));

        let mut w = lock(&self.inner);
        w.index.insert(id, cancelled.clone());
        w.insert(Entry {
            id,
            deadline,
            interval: (!interval.is_zero()).then_some(interval),
            rounds: 0,
            cancelled,
            owner: owner.clone(),
            callback,
        });

        trace!("timer {id} added for owner {}", owner.id());
        Ok(TimerId(id))
    }

    /// Отменяет таймер. Повторная отмена и отмена сработавшего таймера - no-op.
    /// Возвращает `true`, если таймер ещё ждал срабатывания.
    pub fn cancel_timer(&self, id: TimerId) -> bool {
        match lock(&self.inner).index.remove(&id.0) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Сколько таймеров ещё ждут
    pub fn pending(&self) -> usize {
        lock(&self.inner).index.len()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Останавливает драйвер и гасит все таймеры. Повторный вызов - no-op.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        drop(lock(&self.stop_tx).take());
        if let Some(h) = lock(&self.driver).take() {
            if h.thread().id() != thread::current().id() {
                let _ = h.join();
            }
        }

        let mut w = lock(&self.inner);
        for flag in w.index.values() {
            flag.store(true, Ordering::SeqCst);
        }
        w.index.clear();
        for slot in &mut w.slots {
            slot.clear();
        }
        debug!("timing wheel stopped");
    }
}

impl Drop for TimingWheel {
    fn drop(&mut self) {
        self.stop();
    }
}

fn drive(inner: Arc<Mutex<Wheel>>, stop_rx: Receiver<()>, out: Sender<Fired>) {
    loop {
        let next = {
            let w = lock(&inner);
            w.cursor_time + w.tick
        };

        match stop_rx.recv_deadline(next) {
            Err(RecvTimeoutError::Timeout) => {}
            // отправитель сброшен в stop()
            _ => break,
        }

        let now = Instant::now();
        let mut w = lock(&inner);
        for mut e in w.advance(now) {
            deliver(&out, &e);
            match e.interval {
                Some(interval) => {
                    e.deadline += interval;
                    w.insert(e);
                }
                None => {
                    w.index.remove(&e.id);
                }
            }
        }
    }
}

fn deliver(out: &Sender<Fired>, e: &Entry) {
    match out.try_send(e.fired()) {
        Ok(()) => trace!("timer {} fired", e.id),
        Err(TrySendError::Full(_)) => {
            warn!("timer {} dropped: event queue is full", e.id);
        }
        Err(TrySendError::Disconnected(_)) => {
            debug!("timer {} fired with no listener", e.id);
        }
    }
}
