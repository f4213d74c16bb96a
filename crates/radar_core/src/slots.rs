//! Tabela de slots: um publicador opcional por campo decodificado.
//!
//! Cada [`SlotId`] é ligado a uma closure no momento da configuração
//! ([`SlotTable::from_config`]). Slots sem ligação descartam valores em
//! silêncio.

use crate::config::{AppConfig, EntityConfig};
use crate::protocol::MAX_TARGETS;
use std::fmt;

/// Identificador fixo de cada campo publicável.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotId {
    BreathRate,
    HeartRate,
    Distance,
    NumTargets,
    TotalPhase,
    BreathPhase,
    HeartPhase,
    Target1X,
    Target1Y,
    Target2X,
    Target2Y,
    Target3X,
    Target3Y,
    FirmwareVersion,
    TargetInfo,
    HasTarget,
}

/// Família da entidade que o slot alimenta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Sensor,
    TextSensor,
    BinarySensor,
}

impl SlotId {
    pub const COUNT: usize = 16;

    pub const ALL: [SlotId; SlotId::COUNT] = [
        SlotId::BreathRate,
        SlotId::HeartRate,
        SlotId::Distance,
        SlotId::NumTargets,
        SlotId::TotalPhase,
        SlotId::BreathPhase,
        SlotId::HeartPhase,
        SlotId::Target1X,
        SlotId::Target1Y,
        SlotId::Target2X,
        SlotId::Target2Y,
        SlotId::Target3X,
        SlotId::Target3Y,
        SlotId::FirmwareVersion,
        SlotId::TargetInfo,
        SlotId::HasTarget,
    ];

    /// Slots x/y do alvo `index` (0-based).
    pub fn target_axes(index: usize) -> Option<(SlotId, SlotId)> {
        match index {
            0 => Some((SlotId::Target1X, SlotId::Target1Y)),
            1 => Some((SlotId::Target2X, SlotId::Target2Y)),
            2 => Some((SlotId::Target3X, SlotId::Target3Y)),
            _ => None,
        }
    }

    /// Chave de configuração (`breath_rate`, `target_1.x`...).
    pub fn key(self) -> &'static str {
        match self {
            SlotId::BreathRate => "breath_rate",
            SlotId::HeartRate => "heart_rate",
            SlotId::Distance => "distance",
            SlotId::NumTargets => "num_targets",
            SlotId::TotalPhase => "total_phase",
            SlotId::BreathPhase => "breath_phase",
            SlotId::HeartPhase => "heart_phase",
            SlotId::Target1X => "target_1.x",
            SlotId::Target1Y => "target_1.y",
            SlotId::Target2X => "target_2.x",
            SlotId::Target2Y => "target_2.y",
            SlotId::Target3X => "target_3.x",
            SlotId::Target3Y => "target_3.y",
            SlotId::FirmwareVersion => "firmware_version",
            SlotId::TargetInfo => "target_info",
            SlotId::HasTarget => "has_target",
        }
    }

    /// Rótulo usado no dump de configuração.
    pub fn label(self) -> &'static str {
        match self {
            SlotId::BreathRate => "Breath Rate",
            SlotId::HeartRate => "Heart Rate",
            SlotId::Distance => "Distance",
            SlotId::NumTargets => "Number of Targets",
            SlotId::TotalPhase => "Total Phase",
            SlotId::BreathPhase => "Breath Phase",
            SlotId::HeartPhase => "Heart Phase",
            SlotId::Target1X => "Target 1 X",
            SlotId::Target1Y => "Target 1 Y",
            SlotId::Target2X => "Target 2 X",
            SlotId::Target2Y => "Target 2 Y",
            SlotId::Target3X => "Target 3 X",
            SlotId::Target3Y => "Target 3 Y",
            SlotId::FirmwareVersion => "Firmware Version",
            SlotId::TargetInfo => "Target Info",
            SlotId::HasTarget => "Has Target",
        }
    }

    pub fn kind(self) -> SlotKind {
        match self {
            SlotId::FirmwareVersion | SlotId::TargetInfo => SlotKind::TextSensor,
            SlotId::HasTarget => SlotKind::BinarySensor,
            _ => SlotKind::Sensor,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Valor publicado numa entidade.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue {
    Number(f32),
    Text(String),
    Binary(bool),
}

impl fmt::Display for SlotValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotValue::Number(v) => match f.precision() {
                Some(p) => write!(f, "{v:.p$}"),
                None => write!(f, "{v}"),
            },
            SlotValue::Text(s) => f.write_str(s),
            SlotValue::Binary(true) => f.write_str("ON"),
            SlotValue::Binary(false) => f.write_str("OFF"),
        }
    }
}

/// Callback do host que entrega o valor à entidade.
pub type Publisher = Box<dyn FnMut(SlotId, &SlotValue)>;

struct Slot {
    publisher: Publisher,
    last: Option<SlotValue>,
    publish_count: u64,
}

/// Tabela fixa de slots indexada por [`SlotId`].
pub struct SlotTable {
    slots: [Option<Slot>; SlotId::COUNT],
}

impl SlotTable {
    /// Tabela vazia: nenhum campo é publicado.
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    /// Liga um slot a um publicador. Uma nova ligação substitui a anterior.
    pub fn bind<F>(&mut self, id: SlotId, publisher: F)
    where
        F: FnMut(SlotId, &SlotValue) + 'static,
    {
        self.slots[id.index()] = Some(Slot {
            publisher: Box::new(publisher),
            last: None,
            publish_count: 0,
        });
    }

    /// Liga todos os slots com entidade configurada.
    ///
    /// `make` recebe o slot e a entidade e devolve o publicador.
    pub fn from_config<F>(config: &AppConfig, mut make: F) -> Self
    where
        F: FnMut(SlotId, &EntityConfig) -> Publisher,
    {
        let mut table = Self::new();
        for id in SlotId::ALL {
            if let Some(entity) = config.entity(id) {
                table.slots[id.index()] = Some(Slot {
                    publisher: make(id, entity),
                    last: None,
                    publish_count: 0,
                });
            }
        }
        table
    }

    pub fn is_bound(&self, id: SlotId) -> bool {
        self.slots[id.index()].is_some()
    }

    pub fn bound_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Último valor publicado no slot.
    pub fn last_value(&self, id: SlotId) -> Option<&SlotValue> {
        self.slots[id.index()].as_ref()?.last.as_ref()
    }

    pub fn publish_count(&self, id: SlotId) -> u64 {
        self.slots[id.index()]
            .as_ref()
            .map_or(0, |s| s.publish_count)
    }

    /// Publica se o slot estiver ligado e o valor mudou.
    ///
    /// Retorna `true` quando o publicador foi chamado.
    pub fn update(&mut self, id: SlotId, value: SlotValue) -> bool {
        let Some(slot) = self.slots[id.index()].as_mut() else {
            return false;
        };
        if slot.last.as_ref() == Some(&value) {
            return false;
        }
        (slot.publisher)(id, &value);
        slot.last = Some(value);
        slot.publish_count += 1;
        true
    }
}

impl Default for SlotTable {
    fn default() -> Self {
        Self::new()
    }
}

const _: () = assert!(SlotId::COUNT == 7 + 2 * MAX_TARGETS + 2 + 1);

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<(SlotId, SlotValue)>>>;

    fn recorder(log: &Log) -> impl FnMut(SlotId, &SlotValue) + 'static {
        let log = Rc::clone(log);
        move |id, v| log.borrow_mut().push((id, v.clone()))
    }

    #[test]
    fn slot_ids_are_dense() {
        for (i, id) in SlotId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i);
        }
    }

    #[test]
    fn target_axes_lookup() {
        assert_eq!(SlotId::target_axes(1), Some((SlotId::Target2X, SlotId::Target2Y)));
        assert_eq!(SlotId::target_axes(3), None);
    }

    #[test]
    fn unbound_slot_discards() {
        let mut table = SlotTable::new();
        assert!(!table.update(SlotId::HeartRate, SlotValue::Number(70.0)));
        assert_eq!(table.publish_count(SlotId::HeartRate), 0);
        assert!(table.last_value(SlotId::HeartRate).is_none());
    }

    #[test]
    fn identical_values_are_suppressed() {
        let log: Log = Rc::default();
        let mut table = SlotTable::new();
        table.bind(SlotId::BreathRate, recorder(&log));

        assert!(table.update(SlotId::BreathRate, SlotValue::Number(16.5)));
        assert!(!table.update(SlotId::BreathRate, SlotValue::Number(16.5)));
        assert!(table.update(SlotId::BreathRate, SlotValue::Number(17.0)));

        assert_eq!(table.publish_count(SlotId::BreathRate), 2);
        assert_eq!(log.borrow().len(), 2);
        assert_eq!(
            table.last_value(SlotId::BreathRate),
            Some(&SlotValue::Number(17.0))
        );
    }

    #[test]
    fn from_config_binds_only_configured_keys() {
        let config = AppConfig::default();
        let table = SlotTable::from_config(&config, |_, _| -> Publisher {
            Box::new(|_: SlotId, _: &SlotValue| {})
        });
        assert!(table.is_bound(SlotId::BreathRate));
        assert!(table.is_bound(SlotId::FirmwareVersion));
        assert!(!table.is_bound(SlotId::Target1X));
        assert!(!table.is_bound(SlotId::HasTarget));
        assert_eq!(table.bound_count(), 4);
    }

    #[test]
    fn value_display_honours_precision() {
        assert_eq!(format!("{:.1}", SlotValue::Number(16.54)), "16.5");
        assert_eq!(SlotValue::Text("1.2.3".into()).to_string(), "1.2.3");
        assert_eq!(SlotValue::Binary(true).to_string(), "ON");
    }
}
