/*
 * Test utilities and mock helpers for ThinkFan UI
 *
 * This module provides fake sensor output, mock services and helper
 * functions shared by the unit test modules.
 */

#[cfg(test)]
pub mod test_utils {
    use std::path::PathBuf;

    use crate::app::{App, Services};
    use crate::config::Settings;
    use crate::fan::{FanSink, MockFanSink};
    use crate::level::Level;
    use crate::model::{CurveModel, CurveSet, TempRange, DEFAULT_CURVE};
    use crate::privilege::{MockPrivilegeEscalator, MockPrivilegedWriter};
    use crate::sensors::{CommandOutput, CommandRunner, MockCommandRunner};

    pub const FAN_STATUS: &str = "status:\t\tenabled\nspeed:\t\t2650\nlevel:\t\tauto\ncommands:\tlevel <level> (<level> is 0-7, auto, disengaged, full-speed)\n";

    /// Asserts two floats are within `tol` of each other
    pub fn assert_approx_eq(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() <= tol, "expected {} ~= {} (tolerance {})", a, b, tol);
    }

    /// `sensors -j` output of a ThinkPad with a CPU package sensor, an NVMe
    /// drive and one fan
    pub fn sensors_json() -> String {
        r#"{
  "coretemp-isa-0000": {
    "Adapter": "ISA adapter",
    "Package id 0": { "temp1_input": 52.000, "temp1_max": 100.000, "temp1_crit": 100.000 }
  },
  "nvme-pci-0400": {
    "Adapter": "PCI adapter",
    "Composite": { "temp1_input": 38.850, "temp1_alarm": 0.000 }
  },
  "thinkpad-isa-0000": {
    "Adapter": "ISA adapter",
    "fan1": { "fan1_input": 2650.000 }
  }
}"#
        .to_string()
    }

    /// Model with a single default-named curve holding `ranges`
    pub fn model_with_ranges(ranges: &[(u8, u8, Level)]) -> CurveModel {
        let mut set = CurveSet::new();
        set.insert(
            DEFAULT_CURVE,
            ranges.iter().map(|(min, max, level)| TempRange::new(*min, *max, level.clone())).collect(),
        );
        let mut model = CurveModel::new();
        model.replace_all(set);
        model
    }

    /// Services that succeed at everything they are asked to do
    pub fn fake_services() -> Services {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_, _| {
            Ok(CommandOutput { success: true, code: Some(0), stdout: sensors_json(), stderr: String::new() })
        });

        let mut fan = MockFanSink::new();
        fan.expect_path().return_const(PathBuf::from("/proc/acpi/ibm/fan"));
        fan.expect_read_status().returning(|| Ok(FAN_STATUS.to_string()));
        fan.expect_write_level().returning(|_| Ok(()));

        let mut escalator = MockPrivilegeEscalator::new();
        escalator.expect_grant_fan_access().returning(|_| Ok(()));

        let mut writer = MockPrivilegedWriter::new();
        writer.expect_write_privileged().returning(|_, _| Ok(()));

        Services {
            runner: Box::new(runner),
            fan: Box::new(fan),
            escalator: Box::new(escalator),
            writer: Box::new(writer),
        }
    }

    /// Creates an App with default settings and the given services
    pub fn create_test_app_with(services: Services) -> App {
        App::new(Settings::default(), services)
    }

    /// Creates an App backed by [`fake_services`]
    pub fn create_test_app() -> App {
        create_test_app_with(fake_services())
    }

    #[test]
    fn test_fake_services_read_back() {
        let services = fake_services();
        let out = services.runner.run("sensors", &["-j".to_string()]).unwrap();
        assert!(out.stdout.contains("Package id 0"));
        assert_eq!(services.fan.read_status().unwrap(), FAN_STATUS);
    }

    #[test]
    fn test_model_with_ranges() {
        let model = model_with_ranges(&[(40, 60, Level::Auto)]);
        assert_eq!(model.ranges(None).len(), 1);
        assert_eq!(model.active_key(), Some(DEFAULT_CURVE));
    }
}
