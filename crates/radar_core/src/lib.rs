//! # Radar Core
//!
//! Decoder do protocolo serial do radar mmWave Seeed MR60BHA2 (respiração,
//! batimentos, distância e posição de alvos) e despacho dos valores para
//! entidades configuradas.
//!
//! ## Fluxo
//! ```text
//! Transport ─▶ FrameReader ─▶ decode() ─▶ Dispatcher ─▶ SlotTable ─▶ publisher
//! ```
//!
//! ## Módulos
//! - [`protocol`] – Constantes do frame, checksum e tipos de frame
//! - [`types`] – Frame bruto e eventos de medição
//! - [`reader`] – Sincronismo, limites e validação de checksum
//! - [`decoder`] – Layouts binários → eventos tipados
//! - [`slots`] – Tabela de slots com supressão de valores repetidos
//! - [`dispatch`] – Roteamento de eventos para slots
//! - [`lifecycle`] – Componente com ciclo de poll cooperativo e backoff
//! - [`transport`] – Abstração do transporte (memória, channel)
//! - [`config`] – Configuração unificada via TOML

pub mod config;
pub mod decoder;
pub mod dispatch;
pub mod lifecycle;
pub mod protocol;
pub mod reader;
pub mod slots;
pub mod transport;
pub mod types;

// Re-exports convenientes
pub use config::AppConfig;
pub use decoder::{DecodeError, decode};
pub use lifecycle::{Mr60bha2Component, TickOutcome};
pub use reader::{FrameReader, FramingError};
pub use slots::{SlotId, SlotTable, SlotValue};
pub use transport::{Transport, TransportError};
pub use types::{MeasurementEvent, RawFrame};
