//! Сессия: одно TCP-соединение с сервером котировок.
//!
//! Жизненный цикл:
//! - подключение (`connect_timeout` по каждому адресу) и рукопожатие из двух
//!   фиксированных запросов; [`Session::connect`] возвращает уже готовую сессию
//! - запросы строго по одному: слот-разрешение на сессию, ответ N отвечает
//!   запросу N, номер запроса для сопоставления не используется
//! - поток чтения декодирует ровно один кадр на каждое ожидание
//! - циклы событий выполняют таймеры и превращают сбои в закрытие
//! - heartbeat: раз в `heartbeat_interval` проверяем простой и при
//!   `>= heartbeat_threshold` шлём запрос числа бумаг случайного рынка
//! - закрытие (однократное) будит всех ждущих; после сбоя, если включено
//!   переподключение, публикуется новая сессия с тем же id
//!   ([`Session::replacement`])

use std::fmt;
use std::io::{self, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded, select};
use log::{debug, error, info, trace, warn};
use rand::Rng;

use tdx_core::constants::{HEARTBEAT_INTERVAL, HEARTBEAT_THRESHOLD};
use tdx_core::messages::Market;
use tdx_core::messages::handshake::{Login1Request, Login2Request};
use tdx_core::messages::security::SecurityCountRequest;
use tdx_core::{Codec, CodecError, DecodeContext, Frame, Message, Request};

use crate::error::{SessionError, duplicate};
use crate::lock;
use crate::timing::{DEFAULT_SLOTS, Fired, OwnerToken, TimerCallback, TimerId, TimingWheel};

pub type SessionId = u64;

/// Хук жизненного цикла
pub type Hook = Arc<dyn Fn(&Session) + Send + Sync>;

/// Хук сбоя: сессия и причина
pub type ErrorHook = Arc<dyn Fn(&Session, &SessionError) + Send + Sync>;

/// Параметры сессии. Клонируется целиком при переподключении.
#[derive(Clone)]
pub struct SessionConfig {
    /// `host:port`
    pub addr: String,
    pub codec: Arc<dyn Codec>,
    pub on_connect: Option<Hook>,
    pub on_close: Option<Hook>,
    pub on_error: Option<ErrorHook>,
    /// сколько потоков цикла событий
    pub worker_count: usize,
    /// ёмкость очередей событий и таймеров
    pub buffer_size: usize,
    /// переподключаться после сбоя
    pub reconnect: bool,
    pub heartbeat_threshold: Duration,
    pub heartbeat_interval: Duration,
    /// тик таймерного колеса
    pub timer_tick: Duration,
    pub connect_timeout: Duration,
}

impl SessionConfig {
    pub fn new(addr: impl Into<String>, codec: Arc<dyn Codec>) -> Self {
        Self {
            addr: addr.into(),
            codec,
            on_connect: None,
            on_close: None,
            on_error: None,
            worker_count: 1,
            buffer_size: 256,
            reconnect: true,
            heartbeat_threshold: HEARTBEAT_THRESHOLD,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            timer_tick: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    pub fn with_worker_count(mut self, n: usize) -> Self {
        self.worker_count = n.max(1);
        self
    }

    pub fn with_buffer_size(mut self, n: usize) -> Self {
        self.buffer_size = n.max(1);
        self
    }

    pub fn with_reconnect(mut self, on: bool) -> Self {
        self.reconnect = on;
        self
    }

    pub fn with_heartbeat(mut self, threshold: Duration, interval: Duration) -> Self {
        self.heartbeat_threshold = threshold;
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_timer_tick(mut self, tick: Duration) -> Self {
        self.timer_tick = tick;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn on_connect(mut self, f: impl Fn(&Session) + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(f));
        self
    }

    pub fn on_close(mut self, f: impl Fn(&Session) + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&Session, &SessionError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("addr", &self.addr)
            .field("worker_count", &self.worker_count)
            .field("buffer_size", &self.buffer_size)
            .field("reconnect", &self.reconnect)
            .field("heartbeat_threshold", &self.heartbeat_threshold)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("timer_tick", &self.timer_tick)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

/// Состояние сессии
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// соединение есть, идёт рукопожатие
    Handshaking,
    Ready,
    /// закрывается по запросу
    Closing,
    /// закрывается после сбоя
    Faulted,
    Disconnected,
}

/// Ожидание ответа, переданное потоку чтения
struct Expect {
    ctx: DecodeContext,
    reply: Sender<Result<Frame, CodecError>>,
}

enum LoopEvent {
    Decoded(u16),
    Undefined(u16),
    Fault(SessionError),
}

/// Слот-разрешение на один запрос; возвращается при drop
struct Permit<'a>(&'a Sender<()>);

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let _ = self.0.try_send(());
    }
}

pub struct Session {
    id: SessionId,
    config: SessionConfig,
    peer: SocketAddr,
    stream: TcpStream,

    permit_tx: Sender<()>,
    permit_rx: Receiver<()>,
    /// сброс отправителя = сигнал закрытия для всех ждущих
    closing_tx: Mutex<Option<Sender<()>>>,
    closing_rx: Receiver<()>,

    expect_tx: Sender<Expect>,
    events_tx: Sender<LoopEvent>,

    last_activity: Arc<Mutex<Instant>>,
    state: Mutex<State>,
    owner: OwnerToken,
    wheel: TimingWheel,
    threads: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,

    replacement_tx: Sender<Arc<Session>>,
    replacement_rx: Receiver<Arc<Session>>,
    done_tx: Mutex<Option<Sender<()>>>,
    done_rx: Receiver<()>,
}

impl Session {
    /// Подключается, проходит рукопожатие и запускает heartbeat.
    pub fn connect(id: SessionId, config: SessionConfig) -> Result<Arc<Session>, SessionError> {
        let stream = dial(&config.addr, config.connect_timeout)?;
        stream.set_nodelay(true).ok();
        let peer = stream.peer_addr()?;
        let reader = stream.try_clone()?;

        let buffer = config.buffer_size.max(1);
        let (permit_tx, permit_rx) = bounded(1);
        let _ = permit_tx.try_send(());
        let (closing_tx, closing_rx) = bounded::<()>(0);
        let (expect_tx, expect_rx) = bounded::<Expect>(1);
        let (events_tx, events_rx) = bounded::<LoopEvent>(buffer);
        let (timers_tx, timers_rx) = bounded::<Fired>(buffer);
        let (replacement_tx, replacement_rx) = bounded(1);
        let (done_tx, done_rx) = bounded::<()>(0);

        let wheel = TimingWheel::start(config.timer_tick, DEFAULT_SLOTS, timers_tx)?;
        let last_activity = Arc::new(Mutex::new(Instant::now()));

        let session = Arc::new(Session {
            id,
            config,
            peer,
            stream,
            permit_tx,
            permit_rx,
            closing_tx: Mutex::new(Some(closing_tx)),
            closing_rx,
            expect_tx,
            events_tx,
            last_activity,
            state: Mutex::new(State::Handshaking),
            owner: OwnerToken::new(id),
            wheel,
            threads: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            replacement_tx,
            replacement_rx,
            done_tx: Mutex::new(Some(done_tx)),
            done_rx,
        });

        {
            let mut threads = lock(&session.threads);

            let ctx = ReaderCtx {
                id,
                stream: reader,
                codec: session.config.codec.clone(),
                expect_rx,
                closing_rx: session.closing_rx.clone(),
                events_tx: session.events_tx.clone(),
                last_activity: session.last_activity.clone(),
            };
            threads.push(
                thread::Builder::new()
                    .name(format!("tdx-reader-{id}"))
                    .spawn(move || read_loop(ctx))?,
            );

            for n in 0..session.config.worker_count.max(1) {
                let weak = Arc::downgrade(&session);
                let events_rx = events_rx.clone();
                let timers_rx = timers_rx.clone();
                let closing_rx = session.closing_rx.clone();
                threads.push(
                    thread::Builder::new()
                        .name(format!("tdx-loop-{id}-{n}"))
                        .spawn(move || event_loop(id, weak, events_rx, timers_rx, closing_rx))?,
                );
            }
        }

        info!("session {id} connected to {peer}");

        if let Err(e) = session.handshake() {
            warn!("session {id}: handshake with {peer} failed: {e}");
            session.close();
            return Err(e);
        }
        Ok(session)
    }

    fn handshake(self: &Arc<Self>) -> Result<(), SessionError> {
        self.request(&Login1Request)?;
        self.request(&Login2Request)?;

        let weak = Arc::downgrade(self);
        let interval = self.config.heartbeat_interval;
        self.wheel.add_timer(
            Instant::now() + interval,
            interval,
            &self.owner,
            Arc::new(move || {
                if let Some(s) = weak.upgrade() {
                    s.heartbeat();
                }
            }),
        )?;

        if let Some(hook) = &self.config.on_connect {
            hook(self);
        }
        self.set_state(State::Ready);
        debug!("session {} ready", self.id);
        Ok(())
    }

    /// Один запрос-ответ. Ждёт своей очереди; при закрытии сессии ожидание
    /// прерывается ошибкой [`SessionError::Closed`].
    pub fn call(&self, msg: &dyn Message) -> Result<Frame, SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed(self.id));
        }
        let _permit = self.acquire()?;
        self.exchange(msg)
    }

    /// Запрос с типизированным ответом
    pub fn request<R: Request>(&self, req: &R) -> Result<R::Reply, SessionError> {
        let frame = self.call(req)?;
        R::reply(frame.response).map_err(|other| SessionError::UnexpectedResponse {
            expected: req.msg_type(),
            got: other.kind(),
        })
    }

    fn acquire(&self) -> Result<Permit<'_>, SessionError> {
        select! {
            recv(self.permit_rx) -> _ => {}
            recv(self.closing_rx) -> _ => return Err(SessionError::Closed(self.id)),
        }
        let permit = Permit(&self.permit_tx);
        // сессия могла закрыться, пока мы ждали
        if self.is_closed() {
            return Err(SessionError::Closed(self.id));
        }
        Ok(permit)
    }

    /// Запись запроса и ожидание ответа; разрешение уже взято
    fn exchange(&self, msg: &dyn Message) -> Result<Frame, SessionError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.expect_tx
            .send(Expect {
                ctx: msg.decode_context(),
                reply: reply_tx,
            })
            .map_err(|_| SessionError::Closed(self.id))?;

        let bytes = self.config.codec.encode(msg);
        trace!(
            "session {}: send type={:#06x} len={}",
            self.id,
            msg.msg_type(),
            bytes.len()
        );

        if let Err(e) = (&self.stream).write_all(&bytes) {
            if !self.is_closed() {
                let fault = std::io::Error::new(e.kind(), e.to_string());
                let _ = self.events_tx.send(LoopEvent::Fault(SessionError::Io(fault)));
            }
            return Err(SessionError::Io(e));
        }

        let result = select! {
            recv(reply_rx) -> r => r.map_err(|_| SessionError::Closed(self.id))?,
            recv(self.closing_rx) -> _ => match reply_rx.try_recv() {
                Ok(r) => r,
                Err(_) => return Err(SessionError::Closed(self.id)),
            },
        };
        Ok(result?)
    }

    fn heartbeat(&self) {
        if self.state() != State::Ready {
            return;
        }
        let idle = self.last_activity().elapsed();
        if idle < self.config.heartbeat_threshold {
            return;
        }
        // идёт запрос: соединение и так не простаивает
        if self.permit_rx.try_recv().is_err() {
            trace!("session {}: busy, heartbeat skipped", self.id);
            return;
        }
        let _permit = Permit(&self.permit_tx);

        let market = if rand::rng().random_range(0..2) == 0 {
            Market::Sz
        } else {
            Market::Sh
        };
        debug!("session {}: idle {idle:?}, heartbeat on {market}", self.id);

        if let Err(e) = self.exchange(&SecurityCountRequest::new(market)) {
            warn!("session {}: heartbeat failed: {e}", self.id);
        }
    }

    /// Ставит таймер владельца-сессии; он погаснет вместе с сессией
    pub fn add_timer(
        &self,
        deadline: Instant,
        interval: Duration,
        callback: TimerCallback,
    ) -> Result<TimerId, SessionError> {
        Ok(self.wheel.add_timer(deadline, interval, &self.owner, callback)?)
    }

    pub fn cancel_timer(&self, id: TimerId) -> bool {
        self.wheel.cancel_timer(id)
    }

    /// Закрывает сессию. Повторный вызов - no-op.
    pub fn close(&self) {
        self.teardown(None);
    }

    fn teardown(&self, fault: Option<SessionError>) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let id = self.id;

        match &fault {
            Some(e) => {
                self.set_state(State::Faulted);
                error!("session {id} fault: {e}");
                if let Some(hook) = &self.config.on_error {
                    hook(self, e);
                }
            }
            None => self.set_state(State::Closing),
        }
        if let Some(hook) = &self.config.on_close {
            hook(self);
        }

        let _ = self.stream.shutdown(Shutdown::Both);
        drop(lock(&self.closing_tx).take());
        self.owner.invalidate();
        self.wheel.stop();

        let current = thread::current().id();
        let handles = std::mem::take(&mut *lock(&self.threads));
        for h in handles {
            if h.thread().id() == current {
                continue;
            }
            if let Err(panic) = h.join() {
                warn!("session {id}: thread panicked: {:?}", panic);
            }
        }

        self.set_state(State::Disconnected);
        info!("session {id} closed");

        if fault.is_some() && self.config.reconnect {
            match Session::connect(id, self.config.clone()) {
                Ok(next) => {
                    info!("session {id} reconnected to {}", next.peer);
                    let _ = self.replacement_tx.try_send(next);
                }
                Err(e) => warn!("session {id}: reconnect failed: {e}"),
            }
        }

        drop(lock(&self.done_tx).take());
    }

    /// Новая сессия, поднятая после сбоя этой (забирается один раз)
    pub fn replacement(&self) -> Option<Arc<Session>> {
        self.replacement_rx.try_recv().ok()
    }

    /// Ждёт полного закрытия (включая попытку переподключения)
    pub fn wait_closed(&self, timeout: Duration) -> bool {
        matches!(
            self.done_rx.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> State {
        *lock(&self.state)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Момент последнего принятого кадра
    pub fn last_activity(&self) -> Instant {
        *lock(&self.last_activity)
    }

    fn set_state(&self, state: State) {
        *lock(&self.state) = state;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.is_closed() {
            self.teardown(None);
        }
    }
}

fn dial(addr: &str, timeout: Duration) -> Result<TcpStream, SessionError> {
    let dial_err = |reason: String| SessionError::Dial {
        addr: addr.to_string(),
        reason,
    };

    let addrs = addr.to_socket_addrs().map_err(|e| dial_err(e.to_string()))?;
    let mut last = String::from("no addresses resolved");
    for sa in addrs {
        match TcpStream::connect_timeout(&sa, timeout) {
            Ok(s) => return Ok(s),
            Err(e) => {
                debug!("dial {sa} failed: {e}");
                last = e.to_string();
            }
        }
    }
    Err(dial_err(last))
}

struct ReaderCtx {
    id: SessionId,
    stream: TcpStream,
    codec: Arc<dyn Codec>,
    expect_rx: Receiver<Expect>,
    closing_rx: Receiver<()>,
    events_tx: Sender<LoopEvent>,
    last_activity: Arc<Mutex<Instant>>,
}

fn read_loop(ctx: ReaderCtx) {
    let id = ctx.id;
    loop {
        let expect = select! {
            recv(ctx.expect_rx) -> msg => match msg {
                Ok(e) => e,
                Err(_) => break,
            },
            recv(ctx.closing_rx) -> _ => break,
        };

        let result = decode_guarded(&ctx, &expect);

        let (event, fatal) = match &result {
            Ok(frame) => (LoopEvent::Decoded(frame.header.msg_type), false),
            Err(CodecError::UndefinedMessage(code)) => (LoopEvent::Undefined(*code), false),
            Err(e) => (LoopEvent::Fault(SessionError::Codec(duplicate(e))), true),
        };

        if !fatal {
            *lock(&ctx.last_activity) = Instant::now();
        } else if is_closing(&ctx.closing_rx) {
            // сокет закрыт нами же
            break;
        }

        if expect.reply.send(result).is_err() {
            debug!("session {id}: caller went away before reply");
        }

        if fatal {
            select! {
                send(ctx.events_tx, event) -> _ => {}
                recv(ctx.closing_rx) -> _ => {}
            }
            break;
        }
        match ctx.events_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("session {id}: event queue is full"),
            Err(TrySendError::Disconnected(_)) => break,
        }
    }
    debug!("session {id}: reader stopped");
}

/// Паника декодера становится сбоем сессии, поток чтения не умирает молча
fn decode_guarded(ctx: &ReaderCtx, expect: &Expect) -> Result<Frame, CodecError> {
    let mut stream = &ctx.stream;
    let decoded =
        panic::catch_unwind(AssertUnwindSafe(|| ctx.codec.decode(&mut stream, &expect.ctx)));
    decoded.unwrap_or_else(|_| {
        error!("session {}: decoder panicked", ctx.id);
        Err(CodecError::Io(io::Error::other("decoder panicked")))
    })
}

fn is_closing(closing_rx: &Receiver<()>) -> bool {
    matches!(
        closing_rx.try_recv(),
        Err(crossbeam_channel::TryRecvError::Disconnected)
    )
}

fn event_loop(
    id: SessionId,
    session: Weak<Session>,
    events_rx: Receiver<LoopEvent>,
    timers_rx: Receiver<Fired>,
    closing_rx: Receiver<()>,
) {
    loop {
        select! {
            recv(closing_rx) -> _ => break,
            recv(events_rx) -> ev => match ev {
                Ok(LoopEvent::Decoded(code)) => trace!("session {id}: decoded {code:#06x}"),
                Ok(LoopEvent::Undefined(code)) => {
                    warn!("session {id}: undefined message type {code:#06x}");
                }
                Ok(LoopEvent::Fault(e)) => {
                    if let Some(s) = session.upgrade() {
                        s.teardown(Some(e));
                    }
                    break;
                }
                Err(_) => break,
            },
            recv(timers_rx) -> fired => match fired {
                Ok(f) => {
                    run_timer(id, &f);
                }
                Err(_) => break,
            },
        }
    }
    debug!("session {id}: event loop stopped");
}

/// Выполняет таймер, если он принадлежит этой сессии
fn run_timer(owner_id: SessionId, f: &Fired) -> bool {
    if f.owner_id() != owner_id {
        error!(
            "session {owner_id}: timer {:?} belongs to owner {}, skipped",
            f.id(),
            f.owner_id()
        );
        return false;
    }
    f.run()
}
