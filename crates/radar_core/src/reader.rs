//! Leitor de frames: sincronismo, limites e checksums.
//!
//! Acumula bytes do transporte num buffer próprio e entrega no máximo um
//! frame (ou um erro) por chamada. Nunca bloqueia: sem bytes suficientes
//! retorna [`ReadOutcome::NoFrameYet`].

use crate::config::ReaderConfig;
use crate::protocol::{FRAME_HEADER, HEADER_CHECKSUM_SPAN, HEADER_SIZE, checksum, format_hex};
use crate::transport::{Transport, TransportError};
use crate::types::RawFrame;
use std::fmt;
use tracing::{debug, trace};

/// Parte do frame coberta por um checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumSection {
    Header,
    Data,
}

impl fmt::Display for ChecksumSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChecksumSection::Header => f.write_str("header"),
            ChecksumSection::Data => f.write_str("payload"),
        }
    }
}

/// Erros de enquadramento. Nenhum é fatal: o leitor já se ressincronizou
/// quando o erro é retornado.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    #[error("Sincronismo perdido: {skipped} bytes descartados sem SOF")]
    SyncLost { skipped: usize },

    #[error("Frame grande demais: {len} bytes (máximo {max})")]
    OversizeFrame { len: usize, max: usize },

    #[error("Checksum do {section} inválido: recebido 0x{received:02X}, calculado 0x{computed:02X}")]
    ChecksumMismatch {
        section: ChecksumSection,
        received: u8,
        computed: u8,
    },
}

/// Erro de uma leitura completa (transporte + enquadramento).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error(transparent)]
    Framing(#[from] FramingError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Resultado de uma tentativa de leitura.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Frame(RawFrame),
    NoFrameYet,
}

/// Leitor incremental de frames.
pub struct FrameReader {
    buffer: Vec<u8>,
    capacity: usize,
    max_payload: usize,
    max_skip: usize,
    read_chunk: usize,
    /// Bytes descartados desde o último SOF encontrado
    skipped: usize,
}

impl FrameReader {
    pub fn new(config: &ReaderConfig) -> Self {
        // Cabe sempre ao menos dois frames máximos
        let capacity = 2 * (HEADER_SIZE + config.max_payload + 1);
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
            max_payload: config.max_payload,
            max_skip: config.max_skip.max(1),
            read_chunk: config.read_chunk.max(1),
            skipped: 0,
        }
    }

    /// Bytes aguardando processamento.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Anexa bytes diretamente ao buffer, respeitando a capacidade.
    /// Retorna quantos foram aceitos.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> usize {
        let room = self.capacity.saturating_sub(self.buffer.len());
        let n = room.min(bytes.len());
        self.buffer.extend_from_slice(&bytes[..n]);
        n
    }

    /// Puxa do transporte o que estiver disponível, sem bloquear.
    pub fn fill<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<usize, TransportError> {
        let available = transport.available()?;
        let room = self.capacity.saturating_sub(self.buffer.len());
        let want = available.min(room).min(self.read_chunk);
        if want == 0 {
            return Ok(0);
        }

        let start = self.buffer.len();
        self.buffer.resize(start + want, 0);
        match transport.read(&mut self.buffer[start..]) {
            Ok(n) => {
                self.buffer.truncate(start + n.min(want));
                Ok(n.min(want))
            }
            Err(e) => {
                self.buffer.truncate(start);
                Err(e)
            }
        }
    }

    /// Lê do transporte e tenta extrair o próximo frame.
    pub fn read_next_frame<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
    ) -> Result<ReadOutcome, ReadError> {
        self.fill(transport)?;
        Ok(self.next_frame()?)
    }

    /// Extrai o próximo frame do buffer interno.
    pub fn next_frame(&mut self) -> Result<ReadOutcome, FramingError> {
        // ── Sincronismo ──
        match self.buffer.iter().position(|&b| b == FRAME_HEADER) {
            Some(0) => self.skipped = 0,
            Some(pos) => {
                if let Some(err) = self.skip(pos) {
                    return Err(err);
                }
                self.skipped = 0;
            }
            None => {
                let len = self.buffer.len();
                if let Some(err) = self.skip(len) {
                    return Err(err);
                }
                return Ok(ReadOutcome::NoFrameYet);
            }
        }

        // ── Header ──
        if self.buffer.len() < HEADER_SIZE {
            return Ok(ReadOutcome::NoFrameYet);
        }

        let received = self.buffer[HEADER_CHECKSUM_SPAN];
        let computed = checksum(&self.buffer[..HEADER_CHECKSUM_SPAN]);
        if received != computed {
            trace!("Header rejeitado: {}", format_hex(&self.buffer[..HEADER_SIZE]));
            // LEN não é confiável: descarta só o SOF
            self.buffer.drain(..1);
            return Err(FramingError::ChecksumMismatch {
                section: ChecksumSection::Header,
                received,
                computed,
            });
        }

        let frame_id = u16::from_be_bytes([self.buffer[1], self.buffer[2]]);
        let len = u16::from_be_bytes([self.buffer[3], self.buffer[4]]) as usize;
        let frame_type = u16::from_be_bytes([self.buffer[5], self.buffer[6]]);

        if len > self.max_payload {
            self.buffer.drain(..1);
            return Err(FramingError::OversizeFrame {
                len,
                max: self.max_payload,
            });
        }

        // ── Payload ──
        let total = HEADER_SIZE + len + 1;
        if self.buffer.len() < total {
            return Ok(ReadOutcome::NoFrameYet);
        }

        let payload = self.buffer[HEADER_SIZE..HEADER_SIZE + len].to_vec();
        let received = self.buffer[HEADER_SIZE + len];
        let computed = checksum(&payload);
        self.buffer.drain(..total);

        if received != computed {
            return Err(FramingError::ChecksumMismatch {
                section: ChecksumSection::Data,
                received,
                computed,
            });
        }

        debug!(
            "Frame recebido: ID 0x{frame_id:04X}, tipo 0x{frame_type:04X}, dados [{}]",
            format_hex(&payload)
        );

        Ok(ReadOutcome::Frame(RawFrame {
            frame_id,
            frame_type,
            payload,
            checksum: received,
        }))
    }

    /// Descarta até `n` bytes de lixo. Retorna `SyncLost` quando o limite é
    /// atingido; o restante do lixo fica para as próximas chamadas.
    fn skip(&mut self, n: usize) -> Option<FramingError> {
        let room = self.max_skip - self.skipped;
        if n >= room {
            self.buffer.drain(..room);
            self.skipped = 0;
            return Some(FramingError::SyncLost {
                skipped: self.max_skip,
            });
        }
        self.buffer.drain(..n);
        self.skipped += n;
        None
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode_frame;
    use crate::transport::MemoryTransport;

    fn reader() -> FrameReader {
        FrameReader::new(&ReaderConfig::default())
    }

    /// Drena o buffer coletando frames e erros até `NoFrameYet`.
    fn drain(r: &mut FrameReader) -> (Vec<RawFrame>, Vec<FramingError>) {
        let mut frames = Vec::new();
        let mut errors = Vec::new();
        loop {
            match r.next_frame() {
                Ok(ReadOutcome::Frame(f)) => frames.push(f),
                Ok(ReadOutcome::NoFrameYet) => break,
                Err(e) => errors.push(e),
            }
        }
        (frames, errors)
    }

    #[test]
    fn reads_single_frame() {
        let mut r = reader();
        r.push_bytes(&encode_frame(7, 0x0A14, &16.5f32.to_le_bytes()));

        let (frames, errors) = drain(&mut r);
        assert!(errors.is_empty());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame_id, 7);
        assert_eq!(frames[0].frame_type, 0x0A14);
        assert_eq!(frames[0].payload, 16.5f32.to_le_bytes().to_vec());
        assert_eq!(r.buffered(), 0);
    }

    #[test]
    fn partial_frame_waits_for_more_bytes() {
        let mut r = reader();
        let frame = encode_frame(1, 0x0A15, &72.0f32.to_le_bytes());
        r.push_bytes(&frame[..5]);
        assert_eq!(r.next_frame(), Ok(ReadOutcome::NoFrameYet));
        r.push_bytes(&frame[5..10]);
        assert_eq!(r.next_frame(), Ok(ReadOutcome::NoFrameYet));
        r.push_bytes(&frame[10..]);
        assert!(matches!(r.next_frame(), Ok(ReadOutcome::Frame(_))));
    }

    #[test]
    fn leading_garbage_is_skipped() {
        let mut r = reader();
        r.push_bytes(&[0xAA, 0xBB, 0xCC]);
        r.push_bytes(&encode_frame(1, 0x0A15, &72.0f32.to_le_bytes()));
        let (frames, errors) = drain(&mut r);
        assert!(errors.is_empty());
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn corrupted_payload_checksum_drops_whole_frame() {
        let mut r = reader();
        let mut bad = encode_frame(1, 0x0A14, &16.5f32.to_le_bytes());
        let last = bad.len() - 1;
        bad[last] ^= 0x5A;
        let good = encode_frame(2, 0x0A15, &72.0f32.to_le_bytes());
        r.push_bytes(&bad);
        r.push_bytes(&good);

        let (frames, errors) = drain(&mut r);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            FramingError::ChecksumMismatch {
                section: ChecksumSection::Data,
                ..
            }
        ));
        // Retoma logo após o frame corrompido
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame_id, 2);
    }

    #[test]
    fn corrupted_header_checksum_drops_only_sof() {
        let mut r = reader();
        let mut bad = encode_frame(1, 0x0A14, &[0x10, 0x20, 0x30, 0x40]);
        bad[7] ^= 0xFF;
        r.push_bytes(&bad);

        assert!(matches!(
            r.next_frame(),
            Err(FramingError::ChecksumMismatch {
                section: ChecksumSection::Header,
                ..
            })
        ));
        assert_eq!(r.buffered(), bad.len() - 1);
    }

    #[test]
    fn oversize_frame_resyncs() {
        let config = ReaderConfig {
            max_payload: 8,
            ..ReaderConfig::default()
        };
        let mut r = FrameReader::new(&config);
        r.push_bytes(&encode_frame(1, 0x0A04, &[0u8; 12]));
        r.push_bytes(&encode_frame(2, 0x0A15, &[1, 2, 3, 4]));
        assert_eq!(
            r.next_frame(),
            Err(FramingError::OversizeFrame { len: 12, max: 8 })
        );

        // Só o SOF é descartado; o restante é reescaneado até o frame válido
        let (frames, _errors) = drain(&mut r);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame_id, 2);
        assert_eq!(frames[0].frame_type, 0x0A15);
        assert_eq!(frames[0].payload, vec![1, 2, 3, 4]);
        assert_eq!(r.buffered(), 0);
    }

    #[test]
    fn garbage_reports_sync_lost_once() {
        let mut r = reader();
        let garbage: Vec<u8> = (0..200).map(|i| 0x10 + (i % 0x40) as u8).collect();
        assert!(!garbage.contains(&FRAME_HEADER));
        r.push_bytes(&garbage);

        let (frames, errors) = drain(&mut r);
        assert!(frames.is_empty());
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0],
            FramingError::SyncLost {
                skipped: ReaderConfig::default().max_skip
            }
        );
        assert_eq!(r.buffered(), 0);
    }

    #[test]
    fn empty_payload_frame() {
        let mut r = reader();
        r.push_bytes(&encode_frame(3, 0x0F09, &[]));
        match r.next_frame() {
            Ok(ReadOutcome::Frame(f)) => {
                assert!(f.is_empty());
                assert_eq!(f.checksum, 0xFF);
            }
            other => panic!("esperado frame, obtido {other:?}"),
        }
    }

    #[test]
    fn fill_respects_read_chunk() {
        let config = ReaderConfig {
            read_chunk: 4,
            ..ReaderConfig::default()
        };
        let mut r = FrameReader::new(&config);
        let mut t = MemoryTransport::from_bytes(&[0u8; 10]);
        assert_eq!(r.fill(&mut t).unwrap(), 4);
        assert_eq!(r.buffered(), 4);
        assert_eq!(t.available().unwrap(), 6);
    }

    #[test]
    fn read_next_frame_from_transport() {
        let mut r = reader();
        let mut t = MemoryTransport::from_bytes(&encode_frame(9, 0x0A16, &[0u8; 8]));
        assert!(matches!(
            r.read_next_frame(&mut t),
            Ok(ReadOutcome::Frame(f)) if f.frame_id == 9
        ));
    }

    #[test]
    fn transport_failure_is_reported() {
        let mut r = reader();
        let mut t = MemoryTransport::new();
        t.close();
        assert!(matches!(
            r.read_next_frame(&mut t),
            Err(ReadError::Transport(TransportError::IoFailure(_)))
        ));
    }
}
