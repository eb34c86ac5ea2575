use crate::robot::ir_remote::IrCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RobotEvents {
    // A valid button press from the IR remote
    Remote(IrCommand),

    // Sonar reported something within the clearance threshold
    ObstacleAhead { distance_cm: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorCommand {
    Forward,
    Reverse,
    TurnLeft,
    TurnRight,
    Stop,
    ToggleEnable,
}
