//! Configuração unificada via TOML.
//!
//! Além dos parâmetros do leitor e do ciclo de vida, define quais campos
//! viram entidades: chave ausente = campo não publicado.

use crate::slots::SlotId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Origem dos bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Dispositivo serial, aberto em 8N1
    pub device: String,
    /// Velocidade da UART do radar
    pub baud_rate: u32,
    /// Arquivo de captura para replay (vazio = usa o dispositivo)
    pub replay_file: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".into(),
            baud_rate: 115_200,
            replay_file: String::new(),
        }
    }
}

/// Limites do leitor de frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Bytes sem SOF tolerados antes de reportar perda de sincronismo
    pub max_skip: usize,
    /// Maior payload aceito (bytes)
    pub max_payload: usize,
    /// Máximo de bytes puxados do transporte por ciclo
    pub read_chunk: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_skip: 128,
            max_payload: 1024,
            read_chunk: 256,
        }
    }
}

/// Ciclo de poll e política de backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Intervalo entre ciclos ociosos (ms)
    pub poll_interval_ms: u64,
    /// Primeira espera após falha de transporte (ms)
    pub backoff_initial_ms: u64,
    /// Teto do backoff exponencial (ms)
    pub backoff_max_ms: u64,
    /// Falhas consecutivas até emitir diagnóstico
    pub fault_warn_after: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 20,
            backoff_initial_ms: 100,
            backoff_max_ms: 5000,
            fault_warn_after: 5,
        }
    }
}

/// O que fazer com slots de alvos ausentes num relatório.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsentTargetPolicy {
    /// Mantém o último valor publicado
    #[default]
    Retain,
    /// Publica 0.0 em x e y
    Clear,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub absent_targets: AbsentTargetPolicy,
}

/// Uma entidade (sensor, text sensor ou binary sensor).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityConfig {
    /// Nome exibido
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Casas decimais nos logs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy_decimals: Option<u8>,
}

impl EntityConfig {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.accuracy_decimals = Some(decimals);
        self
    }
}

/// Sensores x/y de um alvo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetAxesConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<EntityConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<EntityConfig>,
}

/// Sensores numéricos. Chave ausente = não publicar.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breath_rate: Option<EntityConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<EntityConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<EntityConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_targets: Option<EntityConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_phase: Option<EntityConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breath_phase: Option<EntityConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_phase: Option<EntityConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_1: Option<TargetAxesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_2: Option<TargetAxesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_3: Option<TargetAxesConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TextSensorsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<EntityConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_info: Option<EntityConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BinarySensorsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_target: Option<EntityConfig>,
}

/// Configuração raiz.
///
/// Sem a seção `[sensors]` no arquivo, vale o conjunto padrão
/// (respiração, coração, distância e firmware).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub transport: TransportConfig,
    pub reader: ReaderConfig,
    pub lifecycle: LifecycleConfig,
    pub dispatch: DispatchConfig,
    pub sensors: SensorsConfig,
    pub text_sensors: TextSensorsConfig,
    pub binary_sensors: BinarySensorsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            reader: ReaderConfig::default(),
            lifecycle: LifecycleConfig::default(),
            dispatch: DispatchConfig::default(),
            sensors: SensorsConfig {
                breath_rate: Some(EntityConfig::named("Breath Rate").with_unit("rpm").with_decimals(1)),
                heart_rate: Some(EntityConfig::named("Heart Rate").with_unit("bpm").with_decimals(1)),
                distance: Some(EntityConfig::named("Distance").with_unit("cm").with_decimals(1)),
                ..SensorsConfig::default()
            },
            text_sensors: TextSensorsConfig {
                firmware_version: Some(EntityConfig::named("Firmware Version")),
                ..TextSensorsConfig::default()
            },
            binary_sensors: BinarySensorsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        std::fs::write(path, content).map_err(|e| e.to_string())?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do radar.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("radar.toml")
    }

    /// Entidade configurada para um slot, se houver.
    pub fn entity(&self, slot: SlotId) -> Option<&EntityConfig> {
        let s = &self.sensors;
        match slot {
            SlotId::BreathRate => s.breath_rate.as_ref(),
            SlotId::HeartRate => s.heart_rate.as_ref(),
            SlotId::Distance => s.distance.as_ref(),
            SlotId::NumTargets => s.num_targets.as_ref(),
            SlotId::TotalPhase => s.total_phase.as_ref(),
            SlotId::BreathPhase => s.breath_phase.as_ref(),
            SlotId::HeartPhase => s.heart_phase.as_ref(),
            SlotId::Target1X => axis(&s.target_1, true),
            SlotId::Target1Y => axis(&s.target_1, false),
            SlotId::Target2X => axis(&s.target_2, true),
            SlotId::Target2Y => axis(&s.target_2, false),
            SlotId::Target3X => axis(&s.target_3, true),
            SlotId::Target3Y => axis(&s.target_3, false),
            SlotId::FirmwareVersion => self.text_sensors.firmware_version.as_ref(),
            SlotId::TargetInfo => self.text_sensors.target_info.as_ref(),
            SlotId::HasTarget => self.binary_sensors.has_target.as_ref(),
        }
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.transport.device.is_empty() && self.transport.replay_file.is_empty() {
            errors.push("Nenhum dispositivo serial ou arquivo de replay configurado".into());
        }
        if self.transport.replay_file.is_empty() && self.transport.baud_rate == 0 {
            errors.push("transport.baud_rate não pode ser 0".into());
        }
        if self.reader.max_skip == 0 {
            errors.push("reader.max_skip não pode ser 0".into());
        }
        if self.reader.max_payload < 32 || self.reader.max_payload > u16::MAX as usize {
            errors.push(format!(
                "reader.max_payload inválido: {} (32–65535)",
                self.reader.max_payload
            ));
        }
        if self.reader.read_chunk == 0 {
            errors.push("reader.read_chunk não pode ser 0".into());
        }
        if self.lifecycle.poll_interval_ms == 0 {
            errors.push("lifecycle.poll_interval_ms não pode ser 0".into());
        }
        if self.lifecycle.backoff_initial_ms > self.lifecycle.backoff_max_ms {
            errors.push(format!(
                "Backoff inicial ({} ms) maior que o máximo ({} ms)",
                self.lifecycle.backoff_initial_ms, self.lifecycle.backoff_max_ms
            ));
        }

        for slot in SlotId::ALL {
            if let Some(entity) = self.entity(slot) {
                if entity.name.trim().is_empty() {
                    errors.push(format!("Entidade {} sem nome", slot.key()));
                }
                if entity.accuracy_decimals.is_some_and(|d| d > 6) {
                    errors.push(format!("Entidade {}: accuracy_decimals > 6", slot.key()));
                }
            }
        }

        errors
    }
}

fn axis(target: &Option<TargetAxesConfig>, x: bool) -> Option<&EntityConfig> {
    let target = target.as_ref()?;
    if x { target.x.as_ref() } else { target.y.as_ref() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        let errors = config.validate();
        assert!(errors.is_empty(), "Erros: {:?}", errors);
    }

    #[test]
    fn roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.reader.max_skip, parsed.reader.max_skip);
        assert_eq!(config.sensors.heart_rate, parsed.sensors.heart_rate);
        assert!(parsed.sensors.total_phase.is_none());
    }

    #[test]
    fn sensor_section_only_binds_listed_keys() {
        let partial = r#"
[sensors]
heart_rate = { name = "Pulso", unit = "bpm" }

[sensors.target_2]
y = { name = "Alvo 2 Y", accuracy_decimals = 2 }

[dispatch]
absent_targets = "clear"
"#;
        let config: AppConfig = toml::from_str(partial).unwrap();
        assert!(config.entity(SlotId::BreathRate).is_none());
        assert_eq!(config.entity(SlotId::HeartRate).unwrap().name, "Pulso");
        assert!(config.entity(SlotId::Target2X).is_none());
        assert_eq!(
            config.entity(SlotId::Target2Y).unwrap().accuracy_decimals,
            Some(2)
        );
        assert_eq!(config.dispatch.absent_targets, AbsentTargetPolicy::Clear);
        // Outras seções mantêm o padrão
        assert_eq!(config.reader.max_payload, 1024);
        assert!(config.entity(SlotId::FirmwareVersion).is_some());
    }

    #[test]
    fn invalid_values_are_reported() {
        let mut config = AppConfig::default();
        config.transport.baud_rate = 0;
        config.reader.max_skip = 0;
        config.lifecycle.backoff_initial_ms = 10_000;
        config.sensors.num_targets = Some(EntityConfig::named(" "));
        let errors = config.validate();
        assert_eq!(errors.len(), 4, "Erros: {:?}", errors);
    }
}
