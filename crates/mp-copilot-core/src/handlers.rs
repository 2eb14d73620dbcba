use crate::command::{CommandDescriptor, CommandKind};
use crate::config::SettlePolicy;
use crate::dispatch::Outcome;
use crate::error::CommandError;
use crate::geodesic;
use mavkit::{FlightLink, LinkError, MAV_CMD_NAV_TAKEOFF, MAV_CMD_PREFLIGHT_REBOOT_SHUTDOWN};
use tracing::{debug, warn};

const GUIDED: &str = "GUIDED";

pub(crate) async fn execute(
    link: &dyn FlightLink,
    settle: &SettlePolicy,
    kind: CommandKind,
    command: &CommandDescriptor,
) -> Outcome {
    match kind {
        CommandKind::Arm => arm_disarm(link, kind, true).await,
        CommandKind::Disarm => arm_disarm(link, kind, false).await,
        CommandKind::Takeoff => takeoff(link, settle, command).await,
        CommandKind::Land => {
            link.set_mode("LAND").await.map_err(fault(kind))?;
            Ok("Landing".to_string())
        }
        CommandKind::Rtl => {
            link.set_mode("RTL").await.map_err(fault(kind))?;
            Ok("Returning to launch".to_string())
        }
        CommandKind::Reboot => {
            link.send_raw_action(
                MAV_CMD_PREFLIGHT_REBOOT_SHUTDOWN,
                [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            )
            .await
            .map_err(fault(kind))?;
            Ok("Rebooting autopilot".to_string())
        }
        CommandKind::ChangeMode => change_mode(link, command).await,
        CommandKind::Goto => {
            let lat = number(command, kind, "latitude")?;
            let lon = number(command, kind, "longitude")?;
            let alt = optional_number(command, kind, "altitude")?;
            goto(link, kind, lat, lon, alt).await
        }
        CommandKind::AltitudeChange => altitude_change(link, command).await,
        CommandKind::GotoHome => goto_home(link).await,
        CommandKind::MoveDirection => move_direction(link, settle, command).await,
        CommandKind::GetParam => get_param(link, command).await,
        CommandKind::SetParam => set_param(link, command).await,
    }
}

fn fault(kind: CommandKind) -> impl Fn(LinkError) -> CommandError {
    move |err| CommandError::PrimitiveFault(kind, err)
}

// --- Parameter coercion ---

fn number(
    command: &CommandDescriptor,
    kind: CommandKind,
    name: &'static str,
) -> Result<f64, CommandError> {
    let value = command
        .param(name)
        .ok_or(CommandError::MissingParameter(kind, name))?;
    value
        .as_f64()
        .filter(|n| n.is_finite())
        .ok_or(CommandError::InvalidParameter(kind, name, "a number"))
}

/// Narrow to single precision for the wire. Magnitudes past `f32::MAX`
/// would become infinity.
fn single(value: f64, kind: CommandKind, name: &'static str) -> Result<f32, CommandError> {
    if value.abs() > f64::from(f32::MAX) {
        return Err(CommandError::InvalidParameter(
            kind,
            name,
            "a finite single-precision number",
        ));
    }
    Ok(value as f32)
}

fn optional_number(
    command: &CommandDescriptor,
    kind: CommandKind,
    name: &'static str,
) -> Result<Option<f64>, CommandError> {
    match command.param(name) {
        None => Ok(None),
        Some(_) => number(command, kind, name).map(Some),
    }
}

fn text<'a>(
    command: &'a CommandDescriptor,
    kind: CommandKind,
    name: &'static str,
) -> Result<&'a str, CommandError> {
    let value = command
        .param(name)
        .ok_or(CommandError::MissingParameter(kind, name))?;
    value
        .as_text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(CommandError::InvalidParameter(kind, name, "non-empty text"))
}

/// Wait for the vehicle to report `mode`, or sleep when it cannot tell us.
async fn settle_into(link: &dyn FlightLink, policy: &SettlePolicy, mode: &str) {
    match link.wait_for_mode(mode, policy.ack_timeout).await {
        Some(true) => debug!(mode, "mode confirmed"),
        Some(false) => warn!(mode, "mode change not confirmed in time; proceeding"),
        None => tokio::time::sleep(policy.fallback_delay).await,
    }
}

// --- Handlers ---

async fn arm_disarm(link: &dyn FlightLink, kind: CommandKind, arm: bool) -> Outcome {
    let accepted = link.arm_disarm(arm).await.map_err(fault(kind))?;
    match (accepted, arm) {
        (true, true) => Ok("Armed".to_string()),
        (true, false) => Ok("Disarmed".to_string()),
        (false, _) => Err(CommandError::PrimitiveRejected(kind)),
    }
}

async fn takeoff(link: &dyn FlightLink, settle: &SettlePolicy, command: &CommandDescriptor) -> Outcome {
    let kind = CommandKind::Takeoff;
    let altitude = number(command, kind, "altitude")?;
    if altitude <= 0.0 {
        return Err(CommandError::InvalidParameter(
            kind,
            "altitude",
            "a positive number",
        ));
    }
    let wire_altitude = single(altitude, kind, "altitude")?;

    link.set_mode(GUIDED).await.map_err(fault(kind))?;
    settle_into(link, settle, GUIDED).await;
    link.send_raw_action(
        MAV_CMD_NAV_TAKEOFF,
        [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, wire_altitude],
    )
    .await
    .map_err(fault(kind))?;

    Ok(format!("Taking off to {altitude}m"))
}

async fn change_mode(link: &dyn FlightLink, command: &CommandDescriptor) -> Outcome {
    let kind = CommandKind::ChangeMode;
    let mode = text(command, kind, "mode")?.to_ascii_uppercase();
    link.set_mode(&mode).await.map_err(fault(kind))?;
    Ok(format!("Mode changed to {mode}"))
}

/// Fly to a position. `None` or zero altitude keeps the current altitude.
async fn goto(
    link: &dyn FlightLink,
    kind: CommandKind,
    lat: f64,
    lon: f64,
    altitude: Option<f64>,
) -> Outcome {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(CommandError::InvalidParameter(
            kind,
            "latitude",
            "between -90 and 90",
        ));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(CommandError::InvalidParameter(
            kind,
            "longitude",
            "between -180 and 180",
        ));
    }

    match altitude.filter(|alt| *alt != 0.0) {
        Some(alt) if alt < 0.0 => Err(CommandError::NegativeAltitude),
        Some(alt) => {
            fly_to(link, kind, lat, lon, single(alt, kind, "altitude")?).await?;
            Ok(format!("Flying to {lat}, {lon} at {alt}m"))
        }
        None => {
            let current = link.position().map_err(fault(kind))?;
            fly_to(link, kind, lat, lon, single(current.altitude_m, kind, "altitude")?).await?;
            Ok(format!(
                "Flying to {lat}, {lon} at current altitude ({:.1}m)",
                current.altitude_m
            ))
        }
    }
}

async fn fly_to(
    link: &dyn FlightLink,
    kind: CommandKind,
    lat: f64,
    lon: f64,
    alt: f32,
) -> Result<(), CommandError> {
    link.set_guided_waypoint(lat, lon, alt)
        .await
        .map_err(fault(kind))
}

async fn altitude_change(link: &dyn FlightLink, command: &CommandDescriptor) -> Outcome {
    let kind = CommandKind::AltitudeChange;
    let delta = number(command, kind, "altitude_change")?;

    let current = link.position().map_err(fault(kind))?;
    let target = current.altitude_m + delta;
    if target < 0.0 {
        return Err(CommandError::NegativeAltitude);
    }
    let wire_target = single(target, kind, "altitude_change")?;
    if current.is_origin() {
        return Err(CommandError::UnknownPosition);
    }

    fly_to(link, kind, current.latitude_deg, current.longitude_deg, wire_target).await?;
    let direction = if delta < 0.0 { "Descending" } else { "Ascending" };
    Ok(format!("{direction} {}m to {target:.1}m", delta.abs()))
}

async fn goto_home(link: &dyn FlightLink) -> Outcome {
    let kind = CommandKind::GotoHome;
    let home = link
        .home()
        .map_err(fault(kind))?
        .ok_or(CommandError::HomeNotSet)?;
    goto(link, kind, home.latitude_deg, home.longitude_deg, None).await
}

fn bearing_for(direction: &str) -> Option<f64> {
    match direction.trim().to_ascii_lowercase().as_str() {
        "north" => Some(0.0),
        "east" => Some(90.0),
        "south" => Some(180.0),
        "west" => Some(270.0),
        _ => None,
    }
}

async fn move_direction(
    link: &dyn FlightLink,
    settle: &SettlePolicy,
    command: &CommandDescriptor,
) -> Outcome {
    let kind = CommandKind::MoveDirection;
    let direction = text(command, kind, "direction")?;
    let bearing = bearing_for(direction)
        .ok_or_else(|| CommandError::UnsupportedDirection(direction.to_string()))?;
    let distance = number(command, kind, "distance")?;
    if distance <= 0.0 {
        return Err(CommandError::InvalidParameter(
            kind,
            "distance",
            "a positive number",
        ));
    }

    link.set_mode(GUIDED).await.map_err(fault(kind))?;
    settle_into(link, settle, GUIDED).await;

    let current = link.position().map_err(fault(kind))?;
    if current.is_origin() {
        return Err(CommandError::UnknownPosition);
    }

    let (lat, lon) = geodesic::project(
        current.latitude_deg,
        current.longitude_deg,
        bearing,
        distance,
    );
    fly_to(link, kind, lat, lon, single(current.altitude_m, kind, "altitude")?).await?;
    Ok(format!(
        "Moving {distance}m {} to {lat:.6}, {lon:.6}",
        direction.to_ascii_lowercase()
    ))
}

async fn get_param(link: &dyn FlightLink, command: &CommandDescriptor) -> Outcome {
    let kind = CommandKind::GetParam;
    let name = text(command, kind, "name")?;
    match link.read_parameter(name).await.map_err(fault(kind))? {
        Some(value) => Ok(format!("{name} = {value}")),
        None => Err(CommandError::ParameterNotFound(name.to_string())),
    }
}

async fn set_param(link: &dyn FlightLink, command: &CommandDescriptor) -> Outcome {
    let kind = CommandKind::SetParam;
    let name = text(command, kind, "name")?;
    let value = single(number(command, kind, "value")?, kind, "value")?;
    link.write_parameter(name, value)
        .await
        .map_err(fault(kind))?;
    Ok(format!("{name} set to {value}"))
}
