//! Protocolo serial do radar MR60BHA2.
//!
//! Formato do frame:
//!
//! ```text
//! ┌────────┬───────┬────────┬─────────┬───────────────┬───────────┬───────────────┐
//! │ SOF(1) │ ID(2) │ LEN(2) │ TYPE(2) │ HEAD_CKSUM(1) │ DATA(LEN) │ DATA_CKSUM(1) │
//! └────────┴───────┴────────┴─────────┴───────────────┴───────────┴───────────────┘
//! ```
//!
//! - `SOF` é sempre `0x01` e serve de padrão de sincronismo
//! - `ID`, `LEN` e `TYPE` são big-endian
//! - Os campos numéricos do payload são little-endian (f32 IEEE / i32)
//! - Checksums: NOT do XOR dos bytes cobertos. `HEAD_CKSUM` cobre os 7 bytes
//!   anteriores; `DATA_CKSUM` cobre apenas `DATA`

/// Byte de início de frame.
pub const FRAME_HEADER: u8 = 0x01;

/// Tamanho do header incluindo o checksum do header.
pub const HEADER_SIZE: usize = 8;

/// Bytes do header cobertos pelo checksum do header.
pub const HEADER_CHECKSUM_SPAN: usize = 7;

/// Número fixo de alvos reportados pelo radar.
pub const MAX_TARGETS: usize = 3;

/// Tamanho de cada bloco de alvo no relatório de point cloud.
pub const TARGET_BLOCK_SIZE: usize = 16;

/// Tipos de frame conhecidos pelo decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    /// Relatório agregado de sinais vitais (0x0A10)
    VitalSigns,
    /// Fases total/respiração/coração (0x0A13)
    HeartBreathPhase,
    /// Frequência respiratória (0x0A14)
    BreathRate,
    /// Frequência cardíaca (0x0A15)
    HeartRate,
    /// Distância até o alvo (0x0A16)
    Distance,
    /// Posição dos alvos (0x0A04)
    PointCloudTargets,
    /// Presença de pessoas (0x0F09)
    PeopleExist,
    /// Versão de firmware (0xFFFF)
    FirmwareVersion,
}

impl FrameType {
    pub fn from_u16(raw: u16) -> Option<Self> {
        match raw {
            0x0A10 => Some(FrameType::VitalSigns),
            0x0A13 => Some(FrameType::HeartBreathPhase),
            0x0A14 => Some(FrameType::BreathRate),
            0x0A15 => Some(FrameType::HeartRate),
            0x0A16 => Some(FrameType::Distance),
            0x0A04 => Some(FrameType::PointCloudTargets),
            0x0F09 => Some(FrameType::PeopleExist),
            0xFFFF => Some(FrameType::FirmwareVersion),
            _ => None,
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            FrameType::VitalSigns => 0x0A10,
            FrameType::HeartBreathPhase => 0x0A13,
            FrameType::BreathRate => 0x0A14,
            FrameType::HeartRate => 0x0A15,
            FrameType::Distance => 0x0A16,
            FrameType::PointCloudTargets => 0x0A04,
            FrameType::PeopleExist => 0x0F09,
            FrameType::FirmwareVersion => 0xFFFF,
        }
    }
}

/// Checksum do protocolo: NOT do XOR de todos os bytes.
pub fn checksum(data: &[u8]) -> u8 {
    !data.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Monta um frame completo pronto para ir ao fio.
///
/// Usado pelos testes e por ferramentas de captura; o radar é o único
/// produtor real de frames.
pub fn encode_frame(frame_id: u16, frame_type: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + 1);
    frame.push(FRAME_HEADER);
    frame.extend_from_slice(&frame_id.to_be_bytes());
    frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(&frame_type.to_be_bytes());
    frame.push(checksum(&frame[..HEADER_CHECKSUM_SPAN]));
    frame.extend_from_slice(payload);
    frame.push(checksum(payload));
    frame
}

/// Formata bytes como `01 00 2A ...` para logs de debug.
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_type_conversion() {
        assert_eq!(FrameType::from_u16(0x0A14), Some(FrameType::BreathRate));
        assert_eq!(FrameType::from_u16(0x0F09), Some(FrameType::PeopleExist));
        assert_eq!(FrameType::from_u16(0x1234), None);
        assert_eq!(FrameType::PointCloudTargets.to_u16(), 0x0A04);
        assert_eq!(FrameType::FirmwareVersion.to_u16(), 0xFFFF);
    }

    #[test]
    fn checksum_is_inverted_xor() {
        assert_eq!(checksum(&[]), 0xFF);
        assert_eq!(checksum(&[0x0F, 0xF0]), 0x00);
        assert_eq!(checksum(&[0x01, 0x02]), !0x03);
    }

    #[test]
    fn encoded_header_layout() {
        let frame = encode_frame(0x0102, 0x0A15, &[0xAA, 0xBB]);
        assert_eq!(frame.len(), HEADER_SIZE + 2 + 1);
        assert_eq!(frame[0], FRAME_HEADER);
        assert_eq!(&frame[1..3], &[0x01, 0x02]);
        assert_eq!(&frame[3..5], &[0x00, 0x02]);
        assert_eq!(&frame[5..7], &[0x0A, 0x15]);
        assert_eq!(frame[7], checksum(&frame[..7]));
        assert_eq!(frame[10], checksum(&[0xAA, 0xBB]));
    }

    #[test]
    fn hex_formatting() {
        assert_eq!(format_hex(&[0x01, 0x0A, 0xFF]), "01 0A FF");
        assert_eq!(format_hex(&[]), "");
    }
}
