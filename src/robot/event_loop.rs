use embassy_time::Instant;

use crate::robot::{
    differential_drive::{DriveManager, DriveState},
    events::RobotEvents,
    ir_remote::{IrDecoder, Remote},
    motor_driver::MotorError,
    robot_controller::RobotController,
    sonar::{Ranger, Sonar},
};

/// Polls the sensors and feeds the resulting events to the controller.
pub struct EventLoop<I: IrDecoder, R: Ranger, D: DriveManager> {
    remote: Remote<I>,
    sonar: Sonar<R>,
    controller: RobotController<D>,
}

impl<I: IrDecoder, R: Ranger, D: DriveManager> EventLoop<I, R, D> {
    pub fn new(remote: Remote<I>, sonar: Sonar<R>, controller: RobotController<D>) -> Self {
        Self {
            remote,
            sonar,
            controller,
        }
    }

    pub fn init(&mut self) {
        self.remote.init();
        self.sonar.init();
    }

    /// One pass of the loop. Never blocks on a timer.
    pub fn tick(&mut self, now: Instant) -> Result<(), MotorError> {
        match self.remote.query(now) {
            Some(button) if button.is_valid() => {
                self.controller.handle_event(RobotEvents::Remote(button))?;
            }
            Some(_) => warn!("remote: unknown button code"),
            None => {}
        }

        // only forward motion can run into something
        if self.controller.drive().state() == DriveState::Forward
            && self.sonar.obstacle_ahead(now)
        {
            let distance_cm = self.sonar.read(now);
            self.controller
                .handle_event(RobotEvents::ObstacleAhead { distance_cm })?;
        }
        Ok(())
    }

    pub fn remote_mut(&mut self) -> &mut Remote<I> {
        &mut self.remote
    }

    pub fn sonar_mut(&mut self) -> &mut Sonar<R> {
        &mut self.sonar
    }

    pub fn controller(&self) -> &RobotController<D> {
        &self.controller
    }
}
