#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

use defmt::{error, info, warn};
use embassy_executor::Spawner;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Delay, Instant, Timer};
use esp_backtrace as _;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::interrupt::software::SoftwareInterruptControl;
use esp_hal::interrupt::Priority;
use esp_hal::ledc::channel::{self, ChannelIFace};
use esp_hal::ledc::timer::{self, TimerIFace};
use esp_hal::ledc::{LSGlobalClkSource, Ledc, LowSpeed};
use esp_hal::time::Rate;
use esp_hal::timer::systimer::SystemTimer;
use esp_hal_embassy::InterruptExecutor;
use ssbot_firmware::config::{DriveConfig, RemoteConfig, SonarConfig};
use ssbot_firmware::robot::differential_drive::DifferentialDrive;
use ssbot_firmware::robot::event_loop::EventLoop;
use ssbot_firmware::robot::ir_remote::{IrEdge, NecReceiver, Remote};
use ssbot_firmware::robot::robot_controller::{ButtonLayout, RobotController};
use ssbot_firmware::robot::sonar::{HcSr04, Sonar};

// When you are okay with using a nightly compiler it's better to use https://docs.rs/static_cell/2.1.0/static_cell/macro.make_static.html
macro_rules! mk_static {
    ($t:ty,$val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write(($val));
        x
    }};
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

/// A full NEC frame is 68 edges; leave room for a held button.
const IR_EDGE_QUEUE: usize = 128;

type EdgeChannel = Channel<CriticalSectionRawMutex, IrEdge, IR_EDGE_QUEUE>;

#[esp_hal_embassy::main]
async fn main(_spawner: Spawner) -> ! {
    rtt_target::rtt_init_defmt!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let timer0 = SystemTimer::new(peripherals.SYSTIMER);
    esp_hal_embassy::init(timer0.alarm0);

    info!("Embassy initialized!");

    let edges: &'static EdgeChannel = mk_static!(EdgeChannel, Channel::new());

    // Motor PWM: 8-bit LEDC at 20 kHz, out of the audible range
    let mut ledc = Ledc::new(peripherals.LEDC);
    ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);

    let mut pwm_timer = ledc.timer::<LowSpeed>(timer::Number::Timer0);
    pwm_timer
        .configure(timer::config::Config {
            duty: timer::config::Duty::Duty8Bit,
            clock_source: timer::LSClockSource::APBClk,
            frequency: Rate::from_khz(20),
        })
        .unwrap();

    let mut left_pwm = ledc.channel(channel::Number::Channel0, peripherals.GPIO6);
    left_pwm
        .configure(channel::config::Config {
            timer: &pwm_timer,
            duty_pct: 0,
            pin_config: channel::config::PinConfig::PushPull,
        })
        .unwrap();

    let mut right_pwm = ledc.channel(channel::Number::Channel1, peripherals.GPIO16);
    right_pwm
        .configure(channel::config::Config {
            timer: &pwm_timer,
            duty_pct: 0,
            pin_config: channel::config::PinConfig::PushPull,
        })
        .unwrap();

    let mut drive = DifferentialDrive::new(
        Output::new(peripherals.GPIO4, Level::Low, OutputConfig::default()),
        Output::new(peripherals.GPIO5, Level::Low, OutputConfig::default()),
        left_pwm,
        Output::new(peripherals.GPIO7, Level::Low, OutputConfig::default()),
        Output::new(peripherals.GPIO15, Level::Low, OutputConfig::default()),
        right_pwm,
        DriveConfig::default(),
    );
    drive.init().unwrap();

    let ranger = HcSr04::new(
        Output::new(peripherals.GPIO18, Level::Low, OutputConfig::default()),
        Input::new(peripherals.GPIO8, InputConfig::default().with_pull(Pull::None)),
        Delay,
        Instant::now,
    );

    // IR receiver output idles high and pulls low while a carrier is seen
    let ir_pin = Input::new(peripherals.GPIO17, InputConfig::default().with_pull(Pull::Up));

    // Edges are timestamped from an interrupt executor so a blocking sonar
    // ping in the main loop cannot delay them.
    let sw_ints = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    let ir_executor = mk_static!(
        InterruptExecutor<2>,
        InterruptExecutor::new(sw_ints.software_interrupt2)
    );
    let ir_spawner = ir_executor.start(Priority::Priority3);
    ir_spawner.spawn(ir_edge_task(ir_pin, edges)).ok();

    let mut event_loop = EventLoop::new(
        Remote::new(NecReceiver::new(), RemoteConfig::default()),
        Sonar::new(ranger, SonarConfig::default()),
        RobotController::new(drive, ButtonLayout::default()),
    );
    event_loop.init();

    info!("Robot ready, waiting for IR commands");

    loop {
        while let Ok(edge) = edges.try_receive() {
            event_loop.remote_mut().decoder_mut().on_edge(edge);
        }

        if let Err(e) = event_loop.tick(Instant::now()) {
            error!("Motor command failed: {}", e);
        }

        Timer::after_millis(1).await;
    }
}

/// Timestamps every level change of the IR receiver.
#[embassy_executor::task]
async fn ir_edge_task(mut pin: Input<'static>, edges: &'static EdgeChannel) {
    loop {
        pin.wait_for_any_edge().await;
        let edge = IrEdge {
            high: pin.is_high(),
            at: Instant::now(),
        };
        if edges.try_send(edge).is_err() {
            warn!("IR edge queue full, dropping edge");
        }
    }
}
