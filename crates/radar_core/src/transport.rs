//! Abstração do transporte serial.
//!
//! O componente nunca bloqueia: consulta [`Transport::available`] e lê
//! apenas o que já está no buffer do host.

use crossbeam_channel::{Receiver, TryRecvError};
use std::collections::VecDeque;

/// Erros do transporte.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Falha de I/O no transporte: {0}")]
    IoFailure(String),
}

/// Transporte orientado a bytes fornecido pelo host (UART, arquivo, channel).
pub trait Transport {
    /// Bytes prontos para leitura sem bloquear.
    fn available(&mut self) -> Result<usize, TransportError>;

    /// Lê até `buf.len()` bytes. Retorna quantos foram copiados.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Libera o recurso. Chamado uma única vez no shutdown.
    fn close(&mut self) {}
}

// ──────────────────────────────────────────────
// Memória (replay de captura / testes)
// ──────────────────────────────────────────────

/// Transporte em memória: entrega bytes previamente carregados.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    buffer: VecDeque<u8>,
    closed: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            buffer: bytes.iter().copied().collect(),
            closed: false,
        }
    }

    /// Anexa bytes ao final da fila.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Transport for MemoryTransport {
    fn available(&mut self) -> Result<usize, TransportError> {
        if self.closed {
            return Err(TransportError::IoFailure("transporte fechado".into()));
        }
        Ok(self.buffer.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.closed {
            return Err(TransportError::IoFailure("transporte fechado".into()));
        }
        let n = buf.len().min(self.buffer.len());
        for (dst, src) in buf.iter_mut().zip(self.buffer.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn close(&mut self) {
        self.closed = true;
        self.buffer.clear();
    }
}

// ──────────────────────────────────────────────
// Channel (thread de I/O do host)
// ──────────────────────────────────────────────

/// Mensagem enviada pela thread que lê o dispositivo serial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialMessage {
    /// Dispositivo aberto com sucesso
    Connected,
    /// Bytes lidos do dispositivo
    Data(Vec<u8>),
    /// Falha de abertura/leitura; a thread tenta novamente sozinha
    Fault(String),
}

/// Transporte alimentado por um channel de [`SerialMessage`].
///
/// Uma falha permanece ativa até chegar `Connected` ou dados novos:
/// enquanto isso [`Transport::available`] continua retornando erro.
pub struct ChannelTransport {
    rx: Receiver<SerialMessage>,
    pending: VecDeque<u8>,
    fault: Option<String>,
}

impl ChannelTransport {
    pub fn new(rx: Receiver<SerialMessage>) -> Self {
        Self {
            rx,
            pending: VecDeque::new(),
            fault: None,
        }
    }

    /// `true` enquanto a última mensagem de estado for uma falha.
    pub fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }

    /// Move para `pending` tudo o que já chegou no channel.
    fn drain_channel(&mut self) -> Result<(), TransportError> {
        // Falha vista nesta drenagem, mesmo que já superada por dados
        let mut fresh = None;
        loop {
            match self.rx.try_recv() {
                Ok(SerialMessage::Connected) => self.fault = None,
                Ok(SerialMessage::Data(bytes)) => {
                    self.fault = None;
                    self.pending.extend(bytes);
                }
                Ok(SerialMessage::Fault(reason)) => {
                    self.fault = Some(reason.clone());
                    fresh = Some(reason);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.pending.is_empty() {
                        return Err(TransportError::IoFailure("thread serial encerrada".into()));
                    }
                    break;
                }
            }
        }
        match fresh.or_else(|| self.fault.clone()) {
            Some(reason) => Err(TransportError::IoFailure(reason)),
            None => Ok(()),
        }
    }
}

impl Transport for ChannelTransport {
    fn available(&mut self) -> Result<usize, TransportError> {
        self.drain_channel()?;
        Ok(self.pending.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let n = buf.len().min(self.pending.len());
        for (dst, src) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn close(&mut self) {
        self.pending.clear();
    }
}
