//! Tipos de frame e de medição produzidos pelo radar.

use crate::protocol::MAX_TARGETS;

// ──────────────────────────────────────────────
// Frame bruto
// ──────────────────────────────────────────────

/// Frame completo com checksums já validados pelo [`FrameReader`](crate::reader::FrameReader).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Identificador sequencial enviado pelo radar
    pub frame_id: u16,
    /// Tag de tipo (`TYPE` do header)
    pub frame_type: u16,
    /// Payload (`DATA`), exatamente `LEN` bytes
    pub payload: Vec<u8>,
    /// Checksum de `DATA` como recebido
    pub checksum: u8,
}

impl RawFrame {
    /// Tamanho declarado do payload.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

// ──────────────────────────────────────────────
// Sinais vitais
// ──────────────────────────────────────────────

/// Sinais vitais decodificados.
///
/// O radar envia cada grandeza num frame próprio, então cada campo é
/// opcional: `None` significa "não presente neste frame", nunca zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VitalSigns {
    /// Frequência respiratória (rpm)
    pub breath_rate: Option<f32>,
    /// Frequência cardíaca (bpm)
    pub heart_rate: Option<f32>,
    /// Distância até o alvo (cm)
    pub distance: Option<f32>,
    /// Número de alvos detectados
    pub num_targets: Option<u32>,
    pub total_phase: Option<f32>,
    pub breath_phase: Option<f32>,
    pub heart_phase: Option<f32>,
}

// ──────────────────────────────────────────────
// Alvos
// ──────────────────────────────────────────────

/// Posição 2D de um alvo (metros).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Target {
    pub x: f32,
    pub y: f32,
}

/// Relatório de alvos. O índice do array é o slot fixo (alvo 1..3).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TargetReport {
    /// Quantidade declarada pelo radar (pode exceder [`MAX_TARGETS`])
    pub num_targets: u32,
    /// `None` = alvo ausente no payload; o slot correspondente não muda
    pub targets: [Option<Target>; MAX_TARGETS],
}

impl TargetReport {
    /// Alvos presentes, com o índice 1-based do slot.
    pub fn present(&self) -> impl Iterator<Item = (usize, Target)> + '_ {
        self.targets
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.map(|t| (i + 1, t)))
    }
}

// ──────────────────────────────────────────────
// Firmware
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirmwareInfo {
    /// `major.sub.modified`
    pub version: String,
    pub target_info: String,
}

// ──────────────────────────────────────────────
// Evento
// ──────────────────────────────────────────────

/// Evento de medição decodificado de um único frame.
#[derive(Debug, Clone, PartialEq)]
pub enum MeasurementEvent {
    VitalSigns(VitalSigns),
    TargetReport(TargetReport),
    FirmwareInfo(FirmwareInfo),
    /// Presença de pessoas no campo de visão
    Presence { detected: bool },
}

impl MeasurementEvent {
    /// Nome curto para logs.
    pub fn kind(&self) -> &'static str {
        match self {
            MeasurementEvent::VitalSigns(_) => "vital_signs",
            MeasurementEvent::TargetReport(_) => "target_report",
            MeasurementEvent::FirmwareInfo(_) => "firmware_info",
            MeasurementEvent::Presence { .. } => "presence",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_vitals_are_absent() {
        let v = VitalSigns::default();
        assert!(v.breath_rate.is_none());
        assert!(v.num_targets.is_none());
    }

    #[test]
    fn present_targets_keep_slot_index() {
        let report = TargetReport {
            num_targets: 2,
            targets: [Some(Target { x: 0.5, y: 1.0 }), None, Some(Target { x: -0.2, y: 0.3 })],
        };
        let slots: Vec<usize> = report.present().map(|(slot, _)| slot).collect();
        assert_eq!(slots, vec![1, 3]);
    }
}
