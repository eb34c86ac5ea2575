use crate::robot::{
    differential_drive::{DriveManager, DriveState},
    events::{MotorCommand, RobotEvents},
    ir_remote::IrCommand,
    motor_driver::MotorError,
};

/// Which remote button triggers which motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonLayout {
    pub forward: IrCommand,
    pub reverse: IrCommand,
    pub turn_left: IrCommand,
    pub turn_right: IrCommand,
    pub stop: IrCommand,
    pub toggle_enable: IrCommand,
}

impl ButtonLayout {
    /// One robot per remote.
    pub const ONE_PLAYER: Self = Self {
        forward: IrCommand::ChUp,
        reverse: IrCommand::ChDown,
        turn_left: IrCommand::Prev,
        turn_right: IrCommand::Next,
        stop: IrCommand::Ch,
        toggle_enable: IrCommand::Play,
    };

    /// Two robots sharing one remote: the top half of the keypad.
    pub const BLUE_TEAM: Self = Self {
        forward: IrCommand::Ch,
        reverse: IrCommand::VolUp,
        turn_left: IrCommand::Prev,
        turn_right: IrCommand::Play,
        stop: IrCommand::Next,
        toggle_enable: IrCommand::Eq,
    };

    /// Two robots sharing one remote: the number pad.
    pub const RED_TEAM: Self = Self {
        forward: IrCommand::Num2,
        reverse: IrCommand::Num8,
        turn_left: IrCommand::Num4,
        turn_right: IrCommand::Num6,
        stop: IrCommand::Num5,
        toggle_enable: IrCommand::Num9,
    };

    /// Layout chosen by the `blue-team` / `red-team` features.
    pub const fn selected() -> Self {
        if cfg!(feature = "blue-team") {
            Self::BLUE_TEAM
        } else if cfg!(feature = "red-team") {
            Self::RED_TEAM
        } else {
            Self::ONE_PLAYER
        }
    }

    pub fn command_for(&self, button: IrCommand) -> Option<MotorCommand> {
        [
            (self.forward, MotorCommand::Forward),
            (self.reverse, MotorCommand::Reverse),
            (self.turn_left, MotorCommand::TurnLeft),
            (self.turn_right, MotorCommand::TurnRight),
            (self.stop, MotorCommand::Stop),
            (self.toggle_enable, MotorCommand::ToggleEnable),
        ]
        .into_iter()
        .find(|(mapped, _)| *mapped == button)
        .map(|(_, command)| command)
    }
}

impl Default for ButtonLayout {
    fn default() -> Self {
        Self::selected()
    }
}

/// Turns robot events into drive commands.
pub struct RobotController<D: DriveManager> {
    drive: D,
    layout: ButtonLayout,
}

impl<D: DriveManager> RobotController<D> {
    pub fn new(drive: D, layout: ButtonLayout) -> Self {
        Self { drive, layout }
    }

    pub fn drive(&self) -> &D {
        &self.drive
    }

    pub fn drive_mut(&mut self) -> &mut D {
        &mut self.drive
    }

    pub fn layout(&self) -> &ButtonLayout {
        &self.layout
    }

    pub fn handle_event(&mut self, event: RobotEvents) -> Result<(), MotorError> {
        match event {
            RobotEvents::Remote(button) => match self.layout.command_for(button) {
                Some(command) => self.execute(command),
                None => {
                    debug!("controller: button {} is not mapped", button.label());
                    Ok(())
                }
            },
            RobotEvents::ObstacleAhead { distance_cm } => {
                if self.drive.state() == DriveState::Forward {
                    warn!("controller: obstacle at {} cm, stopping", distance_cm);
                    self.drive.stop()
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Motion commands reuse the last speed.
    pub fn execute(&mut self, command: MotorCommand) -> Result<(), MotorError> {
        info!("controller: {}", command);
        match command {
            MotorCommand::Forward => self.drive.fwd(None),
            MotorCommand::Reverse => self.drive.rev(None),
            MotorCommand::TurnLeft => self.drive.turn_left(None),
            MotorCommand::TurnRight => self.drive.turn_right(None),
            MotorCommand::Stop => self.drive.stop(),
            MotorCommand::ToggleEnable if self.drive.is_enabled() => self.drive.disable(),
            MotorCommand::ToggleEnable => self.drive.enable(),
        }
    }
}
