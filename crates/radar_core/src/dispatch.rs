//! Roteamento de eventos decodificados para os slots.

use crate::config::AbsentTargetPolicy;
use crate::slots::{SlotId, SlotTable, SlotValue};
use crate::types::{MeasurementEvent, TargetReport, VitalSigns};

/// Despacha cada campo de um evento para o slot correspondente.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher {
    absent_targets: AbsentTargetPolicy,
}

impl Dispatcher {
    pub fn new(absent_targets: AbsentTargetPolicy) -> Self {
        Self { absent_targets }
    }

    /// Retorna quantas publicações foram feitas.
    pub fn dispatch(&self, event: &MeasurementEvent, slots: &mut SlotTable) -> usize {
        match event {
            MeasurementEvent::VitalSigns(vitals) => dispatch_vitals(vitals, slots),
            MeasurementEvent::TargetReport(report) => self.dispatch_targets(report, slots),
            MeasurementEvent::FirmwareInfo(info) => {
                let mut published = 0;
                published += slots.update(SlotId::FirmwareVersion, SlotValue::Text(info.version.clone())) as usize;
                published += slots.update(SlotId::TargetInfo, SlotValue::Text(info.target_info.clone())) as usize;
                published
            }
            MeasurementEvent::Presence { detected } => {
                let mut published = slots.update(SlotId::HasTarget, SlotValue::Binary(*detected)) as usize;
                // Sem ninguém no campo, zera as leituras vitais
                if !detected {
                    for id in [
                        SlotId::BreathRate,
                        SlotId::HeartRate,
                        SlotId::Distance,
                        SlotId::NumTargets,
                    ] {
                        published += slots.update(id, SlotValue::Number(0.0)) as usize;
                    }
                }
                published
            }
        }
    }

    fn dispatch_targets(&self, report: &TargetReport, slots: &mut SlotTable) -> usize {
        let mut published =
            slots.update(SlotId::NumTargets, SlotValue::Number(report.num_targets as f32)) as usize;

        for (index, target) in report.targets.iter().enumerate() {
            let Some((x_slot, y_slot)) = SlotId::target_axes(index) else {
                continue;
            };
            let (x, y) = match (target, self.absent_targets) {
                (Some(t), _) => (t.x, t.y),
                (None, AbsentTargetPolicy::Clear) => (0.0, 0.0),
                (None, AbsentTargetPolicy::Retain) => continue,
            };
            published += slots.update(x_slot, SlotValue::Number(x)) as usize;
            published += slots.update(y_slot, SlotValue::Number(y)) as usize;
        }

        published
    }
}

fn dispatch_vitals(vitals: &VitalSigns, slots: &mut SlotTable) -> usize {
    let fields = [
        (SlotId::BreathRate, vitals.breath_rate),
        (SlotId::HeartRate, vitals.heart_rate),
        (SlotId::Distance, vitals.distance),
        (SlotId::NumTargets, vitals.num_targets.map(|n| n as f32)),
        (SlotId::TotalPhase, vitals.total_phase),
        (SlotId::BreathPhase, vitals.breath_phase),
        (SlotId::HeartPhase, vitals.heart_phase),
    ];

    let mut published = 0;
    for (id, value) in fields {
        if let Some(v) = value {
            published += slots.update(id, SlotValue::Number(v)) as usize;
        }
    }
    published
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FirmwareInfo, Target};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<(SlotId, SlotValue)>>>;

    fn table_with(ids: &[SlotId]) -> (SlotTable, Log) {
        let log: Log = Rc::default();
        let mut table = SlotTable::new();
        for &id in ids {
            let log = Rc::clone(&log);
            table.bind(id, move |id, v| log.borrow_mut().push((id, v.clone())));
        }
        (table, log)
    }

    fn all_targets() -> Vec<SlotId> {
        (0..3)
            .filter_map(SlotId::target_axes)
            .flat_map(|(x, y)| [x, y])
            .collect()
    }

    fn report(targets: [Option<Target>; 3]) -> MeasurementEvent {
        MeasurementEvent::TargetReport(TargetReport {
            num_targets: targets.iter().filter(|t| t.is_some()).count() as u32,
            targets,
        })
    }

    #[test]
    fn vitals_publish_only_bound_fields() {
        let (mut table, log) = table_with(&[SlotId::BreathRate, SlotId::HeartRate]);
        let event = MeasurementEvent::VitalSigns(VitalSigns {
            breath_rate: Some(16.5),
            heart_rate: Some(72.0),
            distance: Some(120.3),
            num_targets: Some(1),
            ..VitalSigns::default()
        });

        assert_eq!(Dispatcher::default().dispatch(&event, &mut table), 2);
        assert_eq!(
            *log.borrow(),
            vec![
                (SlotId::BreathRate, SlotValue::Number(16.5)),
                (SlotId::HeartRate, SlotValue::Number(72.0)),
            ]
        );
    }

    #[test]
    fn repeated_values_publish_once() {
        let (mut table, log) = table_with(&[SlotId::HeartRate]);
        let event = MeasurementEvent::VitalSigns(VitalSigns {
            heart_rate: Some(60.0),
            ..VitalSigns::default()
        });
        let d = Dispatcher::default();
        assert_eq!(d.dispatch(&event, &mut table), 1);
        assert_eq!(d.dispatch(&event, &mut table), 0);
        assert_eq!(d.dispatch(&event, &mut table), 0);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn absent_targets_are_retained() {
        let (mut table, _log) = table_with(&all_targets());
        let d = Dispatcher::default();

        d.dispatch(
            &report([
                Some(Target { x: 0.1, y: 0.2 }),
                Some(Target { x: 0.3, y: 0.4 }),
                Some(Target { x: 0.5, y: 0.6 }),
            ]),
            &mut table,
        );
        let published = d.dispatch(&report([Some(Target { x: 0.7, y: 0.8 }), None, None]), &mut table);

        assert_eq!(published, 2);
        assert_eq!(table.last_value(SlotId::Target1X), Some(&SlotValue::Number(0.7)));
        assert_eq!(table.last_value(SlotId::Target2Y), Some(&SlotValue::Number(0.4)));
        assert_eq!(table.last_value(SlotId::Target3X), Some(&SlotValue::Number(0.5)));
        assert_eq!(table.publish_count(SlotId::Target2X), 1);
    }

    #[test]
    fn clear_policy_zeroes_absent_targets() {
        let (mut table, _log) = table_with(&all_targets());
        let d = Dispatcher::new(AbsentTargetPolicy::Clear);

        d.dispatch(&report([None, Some(Target { x: 0.3, y: 0.4 }), None]), &mut table);
        d.dispatch(&report([Some(Target { x: 0.1, y: 0.1 }), None, None]), &mut table);

        assert_eq!(table.last_value(SlotId::Target2X), Some(&SlotValue::Number(0.0)));
        assert_eq!(table.last_value(SlotId::Target3Y), Some(&SlotValue::Number(0.0)));
    }

    #[test]
    fn target_axes_are_independent() {
        let (mut table, log) = table_with(&[SlotId::Target1Y]);
        Dispatcher::default().dispatch(&report([Some(Target { x: 1.0, y: 2.0 }), None, None]), &mut table);
        assert_eq!(*log.borrow(), vec![(SlotId::Target1Y, SlotValue::Number(2.0))]);
    }

    #[test]
    fn target_report_updates_count() {
        let (mut table, _log) = table_with(&[SlotId::NumTargets]);
        Dispatcher::default().dispatch(&report([Some(Target::default()), Some(Target::default()), None]), &mut table);
        assert_eq!(table.last_value(SlotId::NumTargets), Some(&SlotValue::Number(2.0)));
    }

    #[test]
    fn firmware_info_goes_to_text_slots() {
        let (mut table, log) = table_with(&[SlotId::FirmwareVersion, SlotId::TargetInfo]);
        let event = MeasurementEvent::FirmwareInfo(FirmwareInfo {
            version: "1.4.7".into(),
            target_info: "project 0x03".into(),
        });
        assert_eq!(Dispatcher::default().dispatch(&event, &mut table), 2);
        assert_eq!(log.borrow()[0], (SlotId::FirmwareVersion, SlotValue::Text("1.4.7".into())));
    }

    #[test]
    fn absence_resets_vitals() {
        let (mut table, _log) = table_with(&[SlotId::HasTarget, SlotId::HeartRate, SlotId::Distance]);
        let d = Dispatcher::default();
        d.dispatch(
            &MeasurementEvent::VitalSigns(VitalSigns {
                heart_rate: Some(70.0),
                distance: Some(80.0),
                ..VitalSigns::default()
            }),
            &mut table,
        );

        let published = d.dispatch(&MeasurementEvent::Presence { detected: false }, &mut table);
        assert_eq!(published, 3);
        assert_eq!(table.last_value(SlotId::HasTarget), Some(&SlotValue::Binary(false)));
        assert_eq!(table.last_value(SlotId::HeartRate), Some(&SlotValue::Number(0.0)));

        // Presença não toca nos sinais vitais
        let published = d.dispatch(&MeasurementEvent::Presence { detected: true }, &mut table);
        assert_eq!(published, 1);
        assert_eq!(table.last_value(SlotId::HeartRate), Some(&SlotValue::Number(0.0)));
    }
}
