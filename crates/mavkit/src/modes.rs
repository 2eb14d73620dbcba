use crate::state::{AutopilotType, FlightMode, VehicleType};

const COPTER_MODES: &[(u32, &str)] = &[
    (0, "STABILIZE"),
    (1, "ACRO"),
    (2, "ALT_HOLD"),
    (3, "AUTO"),
    (4, "GUIDED"),
    (5, "LOITER"),
    (6, "RTL"),
    (7, "CIRCLE"),
    (9, "LAND"),
    (11, "DRIFT"),
    (13, "SPORT"),
    (15, "AUTOTUNE"),
    (16, "POSHOLD"),
    (17, "BRAKE"),
    (18, "THROW"),
    (21, "SMART_RTL"),
];

const PLANE_MODES: &[(u32, &str)] = &[
    (0, "MANUAL"),
    (1, "CIRCLE"),
    (2, "STABILIZE"),
    (3, "TRAINING"),
    (4, "ACRO"),
    (5, "FLY_BY_WIRE_A"),
    (6, "FLY_BY_WIRE_B"),
    (7, "CRUISE"),
    (8, "AUTOTUNE"),
    (10, "AUTO"),
    (11, "RTL"),
    (12, "LOITER"),
    (15, "GUIDED"),
    (17, "QSTABILIZE"),
    (18, "QHOVER"),
    (19, "QLOITER"),
    (20, "QLAND"),
    (21, "QRTL"),
];

const ROVER_MODES: &[(u32, &str)] = &[
    (0, "MANUAL"),
    (1, "ACRO"),
    (3, "STEERING"),
    (4, "HOLD"),
    (5, "LOITER"),
    (6, "FOLLOW"),
    (7, "SIMPLE"),
    (10, "AUTO"),
    (11, "RTL"),
    (12, "SMART_RTL"),
    (15, "GUIDED"),
];

/// ArduPilot custom-mode table for a vehicle, empty for other autopilots.
/// Unknown airframes are treated as copters, the most common case.
fn table_for(autopilot: AutopilotType, vehicle_type: VehicleType) -> &'static [(u32, &'static str)] {
    if autopilot != AutopilotType::ArduPilotMega {
        return &[];
    }
    match vehicle_type {
        VehicleType::FixedWing => PLANE_MODES,
        VehicleType::GroundRover => ROVER_MODES,
        _ => COPTER_MODES,
    }
}

pub(crate) fn mode_name(autopilot: AutopilotType, vehicle_type: VehicleType, custom_mode: u32) -> String {
    if autopilot != AutopilotType::ArduPilotMega {
        return format!("MODE({custom_mode})");
    }
    table_for(autopilot, vehicle_type)
        .iter()
        .find(|(num, _)| *num == custom_mode)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| format!("UNKNOWN({custom_mode})"))
}

/// Case-insensitive lookup of a mode name.
pub(crate) fn mode_number(autopilot: AutopilotType, vehicle_type: VehicleType, name: &str) -> Option<u32> {
    table_for(autopilot, vehicle_type)
        .iter()
        .find(|(_, mode)| mode.eq_ignore_ascii_case(name.trim()))
        .map(|(num, _)| *num)
}

pub(crate) fn available_modes(autopilot: AutopilotType, vehicle_type: VehicleType) -> Vec<FlightMode> {
    table_for(autopilot, vehicle_type)
        .iter()
        .map(|&(custom_mode, name)| FlightMode {
            custom_mode,
            name: name.to_string(),
        })
        .collect()
}
