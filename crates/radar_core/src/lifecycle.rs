//! Ciclo de vida do componente MR60BHA2.
//!
//! ```text
//! Idle ─▶ Reading ─▶ Decoding ─▶ Dispatching ─▶ Idle
//!   │
//!   └──▶ Faulted ─(transporte saudável)─▶ Idle
//! ```
//!
//! Cada [`Mr60bha2Component::poll`] faz no máximo um frame de trabalho e
//! devolve o controle ao host. Erros de enquadramento e de decodificação
//! só incrementam contadores; falhas de transporte levam a `Faulted` com
//! nova tentativa após backoff exponencial.

use crate::config::AppConfig;
use crate::decoder::{DecodeError, decode};
use crate::dispatch::Dispatcher;
use crate::reader::{FrameReader, FramingError, ReadError, ReadOutcome};
use crate::slots::{SlotId, SlotTable};
use crate::transport::{Transport, TransportError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Estado do ciclo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Reading,
    Decoding,
    Dispatching,
    Faulted,
}

/// Contadores de falhas recuperáveis e de transporte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultCounters {
    pub sync_lost: u64,
    pub oversize: u64,
    pub checksum: u64,
    pub unknown_type: u64,
    pub out_of_range: u64,
    pub truncated: u64,
    pub transport: u64,
}

impl FaultCounters {
    pub fn total(&self) -> u64 {
        self.sync_lost
            + self.oversize
            + self.checksum
            + self.unknown_type
            + self.out_of_range
            + self.truncated
            + self.transport
    }

    fn record_framing(&mut self, err: &FramingError) {
        match err {
            FramingError::SyncLost { .. } => self.sync_lost += 1,
            FramingError::OversizeFrame { .. } => self.oversize += 1,
            FramingError::ChecksumMismatch { .. } => self.checksum += 1,
        }
    }

    fn record_decode(&mut self, err: &DecodeError) {
        match err {
            DecodeError::UnknownFrameType(_) => self.unknown_type += 1,
            DecodeError::FieldOutOfRange { .. } => self.out_of_range += 1,
            DecodeError::Truncated { .. } => self.truncated += 1,
        }
    }
}

/// Motivo do descarte de um frame.
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    Framing(FramingError),
    Decode(DecodeError),
}

/// Resultado de um ciclo de poll.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Bytes insuficientes para um frame
    NoFrameYet,
    /// Frame decodificado e despachado
    Dispatched {
        event: &'static str,
        published: usize,
    },
    /// Frame descartado; o ciclo continua normalmente
    FrameDropped(DropReason),
    /// Falha de transporte neste ciclo
    TransportFault(TransportError),
    /// Em `Faulted`, aguardando o próximo retry
    BackingOff,
}

/// Falha de transporte sustentada, exposta ao host como diagnóstico.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportDiagnostic {
    pub consecutive_failures: u32,
    pub last_error: TransportError,
    pub since: Instant,
}

/// Backoff exponencial entre tentativas de recuperação.
#[derive(Debug, Clone)]
struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
    retry_at: Option<Instant>,
}

impl Backoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
            retry_at: None,
        }
    }

    fn schedule(&mut self, now: Instant) -> Duration {
        let wait = self.current;
        self.retry_at = Some(now + wait);
        self.current = (self.current * 2).min(self.max);
        wait
    }

    fn ready(&self, now: Instant) -> bool {
        self.retry_at.is_none_or(|at| now >= at)
    }

    fn reset(&mut self) {
        self.current = self.initial;
        self.retry_at = None;
    }
}

/// Componente do radar: dono do transporte, do leitor e da tabela de slots.
pub struct Mr60bha2Component<T: Transport> {
    transport: T,
    reader: FrameReader,
    dispatcher: Dispatcher,
    slots: SlotTable,
    state: LifecycleState,
    faults: FaultCounters,
    frames_decoded: u64,
    backoff: Backoff,
    consecutive_failures: u32,
    fault_warn_after: u32,
    fault_since: Option<Instant>,
    diagnostic: Option<TransportDiagnostic>,
}

impl<T: Transport> Mr60bha2Component<T> {
    /// Assume o transporte e registra a configuração no log.
    pub fn setup(transport: T, config: &AppConfig, slots: SlotTable) -> Self {
        let component = Self {
            transport,
            reader: FrameReader::new(&config.reader),
            dispatcher: Dispatcher::new(config.dispatch.absent_targets),
            slots,
            state: LifecycleState::Idle,
            faults: FaultCounters::default(),
            frames_decoded: 0,
            backoff: Backoff::new(
                Duration::from_millis(config.lifecycle.backoff_initial_ms),
                Duration::from_millis(config.lifecycle.backoff_max_ms),
            ),
            consecutive_failures: 0,
            fault_warn_after: config.lifecycle.fault_warn_after.max(1),
            fault_since: None,
            diagnostic: None,
        };
        component.dump_config(config);
        component
    }

    /// Lista cada slot e a entidade ligada a ele.
    pub fn dump_config(&self, config: &AppConfig) {
        info!("MR60BHA2:");
        for id in SlotId::ALL {
            match config.entity(id).filter(|_| self.slots.is_bound(id)) {
                Some(entity) => info!(
                    "  {}: '{}'{}{}",
                    id.label(),
                    entity.name,
                    entity.unit.as_deref().map(|u| format!(" [{u}]")).unwrap_or_default(),
                    entity.icon.as_deref().map(|i| format!(" ({i})")).unwrap_or_default(),
                ),
                None if self.slots.is_bound(id) => info!("  {}: ligado", id.label()),
                None => debug!("  {}: não configurado", id.label()),
            }
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn faults(&self) -> &FaultCounters {
        &self.faults
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

    /// `true` quando não há bytes pendentes para o próximo ciclo.
    ///
    /// Um erro do transporte conta como falha e leva a `Faulted`, como
    /// se tivesse ocorrido no próprio poll.
    pub fn transport_idle(&mut self, now: Instant) -> bool {
        if self.state == LifecycleState::Faulted {
            return true;
        }
        match self.transport.available() {
            Ok(n) => n == 0,
            Err(e) => {
                self.transport_fault(e, now);
                true
            }
        }
    }

    /// Presente enquanto a falha de transporte persistir além do limite.
    pub fn diagnostic(&self) -> Option<&TransportDiagnostic> {
        self.diagnostic.as_ref()
    }

    /// Um ciclo cooperativo: lê, decodifica e despacha no máximo um frame.
    pub fn poll(&mut self, now: Instant) -> TickOutcome {
        if self.state == LifecycleState::Faulted {
            if !self.backoff.ready(now) {
                return TickOutcome::BackingOff;
            }
            if let Err(e) = self.transport.available() {
                return self.transport_fault(e, now);
            }
            self.recover();
        }

        self.state = LifecycleState::Reading;
        let frame = match self.reader.read_next_frame(&mut self.transport) {
            Ok(ReadOutcome::Frame(frame)) => frame,
            Ok(ReadOutcome::NoFrameYet) => {
                self.state = LifecycleState::Idle;
                return TickOutcome::NoFrameYet;
            }
            Err(ReadError::Transport(e)) => return self.transport_fault(e, now),
            Err(ReadError::Framing(e)) => {
                warn!("Frame descartado: {e}");
                self.faults.record_framing(&e);
                self.state = LifecycleState::Idle;
                return TickOutcome::FrameDropped(DropReason::Framing(e));
            }
        };

        self.state = LifecycleState::Decoding;
        let event = match decode(&frame) {
            Ok(event) => event,
            Err(e) => {
                match e {
                    DecodeError::UnknownFrameType(_) => debug!("Frame ignorado: {e}"),
                    _ => warn!("Frame 0x{:04X} inválido: {e}", frame.frame_type),
                }
                self.faults.record_decode(&e);
                self.state = LifecycleState::Idle;
                return TickOutcome::FrameDropped(DropReason::Decode(e));
            }
        };

        self.state = LifecycleState::Dispatching;
        let published = self.dispatcher.dispatch(&event, &mut self.slots);
        self.frames_decoded += 1;
        self.state = LifecycleState::Idle;

        TickOutcome::Dispatched {
            event: event.kind(),
            published,
        }
    }

    /// Encerra o componente liberando o transporte.
    pub fn shutdown(self) {
        info!(
            "Encerrando MR60BHA2: {} frames decodificados, {} falhas",
            self.frames_decoded,
            self.faults.total()
        );
        // O Drop fecha o transporte
    }

    fn transport_fault(&mut self, err: TransportError, now: Instant) -> TickOutcome {
        self.faults.transport += 1;
        self.consecutive_failures += 1;
        let since = *self.fault_since.get_or_insert(now);
        let wait = self.backoff.schedule(now);

        if self.consecutive_failures == self.fault_warn_after {
            error!(
                "Transporte em falha há {} tentativas: {err}",
                self.consecutive_failures
            );
        } else {
            warn!("{err}. Nova tentativa em {} ms", wait.as_millis());
        }
        if self.consecutive_failures >= self.fault_warn_after {
            self.diagnostic = Some(TransportDiagnostic {
                consecutive_failures: self.consecutive_failures,
                last_error: err.clone(),
                since,
            });
        }

        self.state = LifecycleState::Faulted;
        TickOutcome::TransportFault(err)
    }

    fn recover(&mut self) {
        info!(
            "Transporte recuperado após {} falhas consecutivas",
            self.consecutive_failures
        );
        self.backoff.reset();
        self.consecutive_failures = 0;
        self.fault_since = None;
        self.diagnostic = None;
        self.state = LifecycleState::Idle;
    }
}

impl<T: Transport> Drop for Mr60bha2Component<T> {
    fn drop(&mut self) {
        self.transport.close();
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
