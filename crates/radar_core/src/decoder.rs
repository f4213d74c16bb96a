//! Decoder de frames: tag de tipo + payload → [`MeasurementEvent`].
//!
//! Função pura: o mesmo frame sempre produz o mesmo evento, e nenhum
//! valor sai fora das faixas documentadas abaixo.

use crate::protocol::{FrameType, MAX_TARGETS, TARGET_BLOCK_SIZE};
use crate::types::{FirmwareInfo, MeasurementEvent, RawFrame, Target, TargetReport, VitalSigns};
use byteorder::{ByteOrder, LittleEndian};
use std::ops::RangeInclusive;

/// Frequência respiratória aceita (rpm).
pub const BREATH_RATE_RANGE: RangeInclusive<f32> = 0.0..=60.0;
/// Frequência cardíaca aceita (bpm).
pub const HEART_RATE_RANGE: RangeInclusive<f32> = 0.0..=250.0;
/// Distância aceita (cm).
pub const DISTANCE_RANGE: RangeInclusive<f32> = 0.0..=1000.0;
/// Coordenadas de alvo aceitas (m).
pub const TARGET_AXIS_RANGE: RangeInclusive<f32> = -10.0..=10.0;
/// Fases: qualquer valor finito.
pub const PHASE_RANGE: RangeInclusive<f32> = f32::MIN..=f32::MAX;
/// Quantidade máxima de alvos que o radar pode declarar.
pub const MAX_REPORTED_TARGETS: i32 = 64;

/// Tamanho do relatório agregado de sinais vitais.
const VITAL_SIGNS_SIZE: usize = 28;

/// Erros de decodificação. O frame é descartado, o ciclo continua.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("Tipo de frame desconhecido: 0x{0:04X}")]
    UnknownFrameType(u16),

    #[error("Campo {field} fora da faixa: {value} (esperado {min}..={max})")]
    FieldOutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Payload curto para o tipo 0x{frame_type:04X}: {got} bytes, mínimo {needed}")]
    Truncated {
        frame_type: u16,
        needed: usize,
        got: usize,
    },
}

/// Decodifica um frame validado.
pub fn decode(frame: &RawFrame) -> Result<MeasurementEvent, DecodeError> {
    let frame_type = FrameType::from_u16(frame.frame_type)
        .ok_or(DecodeError::UnknownFrameType(frame.frame_type))?;
    let data = frame.payload.as_slice();

    match frame_type {
        FrameType::VitalSigns => decode_vital_signs(frame.frame_type, data),
        FrameType::HeartBreathPhase => {
            require(frame.frame_type, data, 12)?;
            Ok(MeasurementEvent::VitalSigns(VitalSigns {
                total_phase: Some(field("total_phase", read_f32(data, 0), &PHASE_RANGE)?),
                breath_phase: Some(field("breath_phase", read_f32(data, 4), &PHASE_RANGE)?),
                heart_phase: Some(field("heart_phase", read_f32(data, 8), &PHASE_RANGE)?),
                ..VitalSigns::default()
            }))
        }
        FrameType::BreathRate => {
            require(frame.frame_type, data, 4)?;
            Ok(MeasurementEvent::VitalSigns(VitalSigns {
                breath_rate: Some(field("breath_rate", read_f32(data, 0), &BREATH_RATE_RANGE)?),
                ..VitalSigns::default()
            }))
        }
        FrameType::HeartRate => {
            require(frame.frame_type, data, 4)?;
            Ok(MeasurementEvent::VitalSigns(VitalSigns {
                heart_rate: Some(field("heart_rate", read_f32(data, 0), &HEART_RATE_RANGE)?),
                ..VitalSigns::default()
            }))
        }
        FrameType::Distance => {
            require(frame.frame_type, data, 8)?;
            // Flag zero = radar sem medição de distância neste ciclo
            let distance = if LittleEndian::read_u32(&data[0..4]) != 0 {
                Some(field("distance", read_f32(data, 4), &DISTANCE_RANGE)?)
            } else {
                None
            };
            Ok(MeasurementEvent::VitalSigns(VitalSigns {
                distance,
                ..VitalSigns::default()
            }))
        }
        FrameType::PointCloudTargets => decode_targets(frame.frame_type, data),
        FrameType::PeopleExist => {
            require(frame.frame_type, data, 2)?;
            Ok(MeasurementEvent::Presence {
                detected: LittleEndian::read_u16(&data[0..2]) != 0,
            })
        }
        FrameType::FirmwareVersion => decode_firmware(frame.frame_type, data),
    }
}

fn decode_vital_signs(frame_type: u16, data: &[u8]) -> Result<MeasurementEvent, DecodeError> {
    require(frame_type, data, VITAL_SIGNS_SIZE)?;
    Ok(MeasurementEvent::VitalSigns(VitalSigns {
        breath_rate: Some(field("breath_rate", read_f32(data, 0), &BREATH_RATE_RANGE)?),
        heart_rate: Some(field("heart_rate", read_f32(data, 4), &HEART_RATE_RANGE)?),
        distance: Some(field("distance", read_f32(data, 8), &DISTANCE_RANGE)?),
        num_targets: Some(target_count(LittleEndian::read_i32(&data[12..16]))?),
        total_phase: Some(field("total_phase", read_f32(data, 16), &PHASE_RANGE)?),
        breath_phase: Some(field("breath_phase", read_f32(data, 20), &PHASE_RANGE)?),
        heart_phase: Some(field("heart_phase", read_f32(data, 24), &PHASE_RANGE)?),
    }))
}

/// Relatório de point cloud: contagem + blocos de 16 bytes (x, y, dop, cluster).
///
/// Alvos que não cabem no payload ficam `None`, nunca zerados.
fn decode_targets(frame_type: u16, data: &[u8]) -> Result<MeasurementEvent, DecodeError> {
    require(frame_type, data, 4)?;
    let num_targets = target_count(LittleEndian::read_i32(&data[0..4]))?;

    let blocks = (data.len() - 4) / TARGET_BLOCK_SIZE;
    let present = (num_targets as usize).min(MAX_TARGETS).min(blocks);

    let mut report = TargetReport {
        num_targets,
        ..TargetReport::default()
    };
    for (i, slot) in report.targets.iter_mut().enumerate().take(present) {
        let base = 4 + i * TARGET_BLOCK_SIZE;
        *slot = Some(Target {
            x: field("target.x", read_f32(data, base), &TARGET_AXIS_RANGE)?,
            y: field("target.y", read_f32(data, base + 4), &TARGET_AXIS_RANGE)?,
        });
    }

    Ok(MeasurementEvent::TargetReport(report))
}

fn decode_firmware(frame_type: u16, data: &[u8]) -> Result<MeasurementEvent, DecodeError> {
    require(frame_type, data, 4)?;
    let (project, major, sub, modified) = (data[0], data[1], data[2], data[3]);

    let trailing = String::from_utf8_lossy(&data[4..]);
    let trailing = trailing.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    let target_info = if trailing.is_empty() {
        format!("project 0x{project:02x}")
    } else {
        trailing.to_string()
    };

    Ok(MeasurementEvent::FirmwareInfo(FirmwareInfo {
        version: format!("{major}.{sub}.{modified}"),
        target_info,
    }))
}

fn require(frame_type: u16, data: &[u8], needed: usize) -> Result<(), DecodeError> {
    if data.len() < needed {
        return Err(DecodeError::Truncated {
            frame_type,
            needed,
            got: data.len(),
        });
    }
    Ok(())
}

fn read_f32(data: &[u8], offset: usize) -> f32 {
    LittleEndian::read_f32(&data[offset..offset + 4])
}

fn field(name: &'static str, value: f32, range: &RangeInclusive<f32>) -> Result<f32, DecodeError> {
    if value.is_finite() && range.contains(&value) {
        Ok(value)
    } else {
        Err(DecodeError::FieldOutOfRange {
            field: name,
            value: value as f64,
            min: *range.start() as f64,
            max: *range.end() as f64,
        })
    }
}

fn target_count(raw: i32) -> Result<u32, DecodeError> {
    if (0..=MAX_REPORTED_TARGETS).contains(&raw) {
        Ok(raw as u32)
    } else {
        Err(DecodeError::FieldOutOfRange {
            field: "num_targets",
            value: raw as f64,
            min: 0.0,
            max: MAX_REPORTED_TARGETS as f64,
        })
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
